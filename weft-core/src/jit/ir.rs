//! Intermediate Representation for JIT Compilation
//!
//! Defines the IR that expression source is lowered to before code
//! generation: a flat list of SSA-style operations over `f64` values.

use serde::{Deserialize, Serialize};

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpCode {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    /// Floored modulo: the result has the sign of the divisor.
    Mod,
    Neg,

    // Comparison, yielding 0.0 or 1.0
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    // Built-in functions
    Abs,
    Floor,
    Ceil,
    /// Round half away from zero.
    Round,
    Trunc,
    Sqrt,
    Min,
    Max,

    // Other
    Const,
    Load,
}

impl OpCode {
    /// Number of operands the operation consumes.
    pub fn arity(&self) -> usize {
        match self {
            OpCode::Const | OpCode::Load => 1,
            OpCode::Neg
            | OpCode::Abs
            | OpCode::Floor
            | OpCode::Ceil
            | OpCode::Round
            | OpCode::Trunc
            | OpCode::Sqrt => 1,
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Min
            | OpCode::Max => 2,
        }
    }
}

/// A single operation in the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    /// Operation type
    pub op: OpCode,
    /// Result value ID
    pub result: usize,
    /// Operand value IDs or literal values
    pub operands: Vec<Operand>,
}

/// An operand can be a value reference or a literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Reference to a value by ID
    Ref(usize),
    /// Literal float value
    Float(f64),
    /// Input variable name (only for `load`)
    String(String),
}

/// Complete trace IR for compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceIR {
    /// Input variable names. A variable's position is its argument slot.
    pub inputs: Vec<String>,
    /// Output value ID
    pub output: usize,
    /// List of operations
    pub ops: Vec<Op>,
}

impl TraceIR {
    /// Start an empty trace over the given inputs.
    pub fn new(inputs: Vec<String>) -> Self {
        Self {
            inputs,
            output: 0,
            ops: Vec::new(),
        }
    }

    /// Parse IR from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Append an operation and return the id of its result.
    pub fn push(&mut self, op: OpCode, operands: Vec<Operand>) -> usize {
        let result = self.ops.len() + 1;
        self.ops.push(Op {
            op,
            result,
            operands,
        });
        result
    }

    /// Argument slot of an input variable.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|input| input == name)
    }

    /// Get the number of inputs
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }
}
