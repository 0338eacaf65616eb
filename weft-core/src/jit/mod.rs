//! JIT Compilation Module
//!
//! This module compiles the source text of expression nodes to native code
//! using Cranelift.
//!
//! # Architecture
//!
//! 1. `parse` lowers expression source to a [`TraceIR`] (list of operations)
//! 2. `codegen` compiles the IR to native code via Cranelift
//! 3. `cache` memoizes compiled handles per node for one resolution pass
//! 4. The compiled function is called with one `f64` per node input

mod cache;
mod codegen;
mod ir;
mod parse;

pub use cache::{ExpressionCache, ExpressionCompiler};
pub use codegen::{CompiledExpression, JitCompiler};
pub use ir::{Op, OpCode, Operand, TraceIR};
pub use parse::{parse, MAX_NESTING};
