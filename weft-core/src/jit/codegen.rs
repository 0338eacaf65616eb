//! Cranelift Code Generation
//!
//! Compiles TraceIR to native code via Cranelift.
//!
//! Every compiled expression gets its own `JITModule`, which owns the code
//! memory for as long as the [`CompiledExpression`] lives.

use std::collections::HashMap;

use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use target_lexicon::Triple;

use super::ir::{OpCode, Operand, TraceIR};
use super::parse;
use crate::config::JitOptions;
use crate::error::CompileError;

fn codegen_error(e: impl std::fmt::Display) -> CompileError {
    CompileError::Codegen(e.to_string())
}

/// Type alias for JIT-compiled functions: fn(*const f64) -> f64
type JitFn = unsafe extern "C" fn(*const f64) -> f64;

/// A compiled expression that can be called with f64 inputs
pub struct CompiledExpression {
    /// The JIT module (keeps code alive)
    _module: JITModule,
    /// Function pointer
    func_ptr: JitFn,
    /// Input names, in argument order
    inputs: Vec<String>,
}

impl CompiledExpression {
    /// Call the compiled function with one value per input.
    pub fn call(&self, inputs: &[f64]) -> Result<f64, CompileError> {
        if inputs.len() != self.inputs.len() {
            return Err(CompileError::InputCount {
                expected: self.inputs.len(),
                found: inputs.len(),
            });
        }
        // SAFETY: the code was generated for exactly `self.inputs.len()`
        // loads from the argument pointer, and the length was checked above.
        Ok(unsafe { (self.func_ptr)(inputs.as_ptr()) })
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl std::fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// JIT compiler using Cranelift
pub struct JitCompiler {
    /// ISA for the current platform
    isa: isa::OwnedTargetIsa,
}

impl JitCompiler {
    /// Create a new JIT compiler for the host platform
    pub fn new(options: &JitOptions) -> Result<Self, CompileError> {
        tracing::debug!(
            host = %Triple::host(),
            opt_level = options.opt_level.as_cranelift(),
            "building jit isa"
        );

        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", options.opt_level.as_cranelift())
            .map_err(|e| CompileError::Isa(e.to_string()))?;

        let isa_builder = cranelift_native::builder()
            .map_err(|e| CompileError::Isa(format!("failed to create ISA builder: {}", e)))?;

        let flags = settings::Flags::new(flag_builder);
        let isa = isa_builder
            .finish(flags)
            .map_err(|e| CompileError::Isa(e.to_string()))?;

        Ok(Self { isa })
    }

    /// Parse and compile expression source. `inputs` name the arguments.
    pub fn compile_source(
        &self,
        source: &str,
        inputs: &[&str],
    ) -> Result<CompiledExpression, CompileError> {
        let ir = parse::parse(source, inputs)?;
        self.compile(&ir)
    }

    /// Compile a trace to native code
    pub fn compile(&self, ir: &TraceIR) -> Result<CompiledExpression, CompileError> {
        // Create JIT module
        let builder =
            JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        let mut module = JITModule::new(builder);

        // Create function signature: fn(*const f64) -> f64
        let mut ctx = module.make_context();
        let ptr_type = module.target_config().pointer_type();

        ctx.func.signature.params.push(AbiParam::new(ptr_type));
        ctx.func.signature.returns.push(AbiParam::new(types::F64));

        // Declare the function
        let func_id = module
            .declare_function("expr_fn", Linkage::Local, &ctx.func.signature)
            .map_err(codegen_error)?;

        // Build the function
        let mut builder_ctx = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        builder.seal_block(entry_block);

        // Get input pointer
        let input_ptr = builder.block_params(entry_block)[0];

        // Map value IDs to Cranelift values
        let mut values: HashMap<usize, Value> = HashMap::new();

        for op in &ir.ops {
            if op.operands.len() != op.op.arity() {
                return Err(CompileError::Trace(format!(
                    "{:?} expects {} operand(s), got {}",
                    op.op,
                    op.op.arity(),
                    op.operands.len()
                )));
            }

            let result = match op.op {
                OpCode::Load => {
                    let name = match &op.operands[0] {
                        Operand::String(s) => s,
                        _ => return Err(CompileError::Trace("load expects a variable name".into())),
                    };
                    let slot = ir
                        .slot(name)
                        .ok_or_else(|| CompileError::UnknownVariable(name.clone()))?;

                    let offset = (slot * 8) as i32;
                    builder.ins().load(types::F64, MemFlags::trusted(), input_ptr, offset)
                }

                OpCode::Const => {
                    let val = match &op.operands[0] {
                        Operand::Float(f) => *f,
                        Operand::Ref(r) => *r as f64,
                        Operand::String(_) => {
                            let reason = "const expects a numeric operand".into();
                            return Err(CompileError::Trace(reason));
                        }
                    };
                    builder.ins().f64const(val)
                }

                OpCode::Neg
                | OpCode::Abs
                | OpCode::Floor
                | OpCode::Ceil
                | OpCode::Round
                | OpCode::Trunc
                | OpCode::Sqrt => {
                    let x = Self::get_operand(&op.operands[0], &values, &mut builder)?;
                    match op.op {
                        OpCode::Neg => builder.ins().fneg(x),
                        OpCode::Abs => builder.ins().fabs(x),
                        OpCode::Floor => builder.ins().floor(x),
                        OpCode::Ceil => builder.ins().ceil(x),
                        OpCode::Trunc => builder.ins().trunc(x),
                        OpCode::Sqrt => builder.ins().sqrt(x),
                        // trunc(x + copysign(0.5, x))
                        _ => {
                            let half = builder.ins().f64const(0.5);
                            let signed_half = builder.ins().fcopysign(half, x);
                            let shifted = builder.ins().fadd(x, signed_half);
                            builder.ins().trunc(shifted)
                        }
                    }
                }

                OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Mod
                | OpCode::Min
                | OpCode::Max => {
                    let lhs = Self::get_operand(&op.operands[0], &values, &mut builder)?;
                    let rhs = Self::get_operand(&op.operands[1], &values, &mut builder)?;
                    match op.op {
                        OpCode::Add => builder.ins().fadd(lhs, rhs),
                        OpCode::Sub => builder.ins().fsub(lhs, rhs),
                        OpCode::Mul => builder.ins().fmul(lhs, rhs),
                        OpCode::Div => builder.ins().fdiv(lhs, rhs),
                        OpCode::Min => builder.ins().fmin(lhs, rhs),
                        OpCode::Max => builder.ins().fmax(lhs, rhs),
                        // lhs - rhs * floor(lhs / rhs)
                        _ => {
                            let quotient = builder.ins().fdiv(lhs, rhs);
                            let floored = builder.ins().floor(quotient);
                            let product = builder.ins().fmul(rhs, floored);
                            builder.ins().fsub(lhs, product)
                        }
                    }
                }

                // Comparison ops return 0.0 or 1.0
                OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge | OpCode::Eq | OpCode::Ne => {
                    let lhs = Self::get_operand(&op.operands[0], &values, &mut builder)?;
                    let rhs = Self::get_operand(&op.operands[1], &values, &mut builder)?;
                    let cond = match op.op {
                        OpCode::Lt => FloatCC::LessThan,
                        OpCode::Le => FloatCC::LessThanOrEqual,
                        OpCode::Gt => FloatCC::GreaterThan,
                        OpCode::Ge => FloatCC::GreaterThanOrEqual,
                        OpCode::Eq => FloatCC::Equal,
                        _ => FloatCC::NotEqual,
                    };
                    let cmp = builder.ins().fcmp(cond, lhs, rhs);
                    // Convert i8 bool to f64 (0.0 or 1.0)
                    let int_val = builder.ins().uextend(types::I64, cmp);
                    builder.ins().fcvt_from_uint(types::F64, int_val)
                }
            };

            values.insert(op.result, result);
        }

        // Return the output value
        let output = *values
            .get(&ir.output)
            .ok_or_else(|| CompileError::Trace(format!("output value {} not found", ir.output)))?;
        builder.ins().return_(&[output]);

        builder.finalize();

        // Compile the function
        module
            .define_function(func_id, &mut ctx)
            .map_err(codegen_error)?;
        module.clear_context(&mut ctx);
        module.finalize_definitions().map_err(codegen_error)?;

        // Get the function pointer
        let code_ptr = module.get_finalized_function(func_id);
        // SAFETY: the function was declared with the `JitFn` signature above.
        let func_ptr: JitFn = unsafe { std::mem::transmute(code_ptr) };

        Ok(CompiledExpression {
            _module: module,
            func_ptr,
            inputs: ir.inputs.clone(),
        })
    }

    fn get_operand(
        op: &Operand,
        values: &HashMap<usize, Value>,
        builder: &mut FunctionBuilder,
    ) -> Result<Value, CompileError> {
        match op {
            Operand::Ref(id) => values
                .get(id)
                .copied()
                .ok_or_else(|| CompileError::Trace(format!("value {} not found", id))),
            Operand::Float(f) => Ok(builder.ins().f64const(*f)),
            Operand::String(s) => {
                Err(CompileError::Trace(format!("unexpected string operand: {}", s)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> JitCompiler {
        JitCompiler::new(&JitOptions::default()).unwrap()
    }

    fn eval(source: &str, inputs: &[&str], args: &[f64]) -> f64 {
        compiler().compile_source(source, inputs).unwrap().call(args).unwrap()
    }

    #[test]
    fn test_simple_add() {
        let ir = TraceIR::from_json(
            r#"{
            "inputs": ["x", "y"],
            "output": 3,
            "ops": [
                {"op": "load", "result": 1, "operands": ["x"]},
                {"op": "load", "result": 2, "operands": ["y"]},
                {"op": "add", "result": 3, "operands": [1, 2]}
            ]
        }"#,
        )
        .unwrap();

        let func = compiler().compile(&ir).unwrap();
        assert_eq!(func.call(&[5.0, 3.0]).unwrap(), 8.0);
    }

    #[test]
    fn test_complex_expr() {
        // (x + y) * 2
        assert_eq!(eval("(x + y) * 2", &["x", "y"], &[5.0, 3.0]), 16.0);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(eval("a < b", &["a", "b"], &[1.0, 2.0]), 1.0);
        assert_eq!(eval("a >= b", &["a", "b"], &[1.0, 2.0]), 0.0);
        assert_eq!(eval("a != a", &["a"], &[4.0]), 0.0);
    }

    #[test]
    fn modulo_is_floored() {
        assert_eq!(eval("a % b", &["a", "b"], &[7.0, 3.0]), 1.0);
        assert_eq!(eval("a % b", &["a", "b"], &[-7.0, 3.0]), 2.0);
    }

    #[test]
    fn builtin_functions() {
        assert_eq!(eval("max(a, 10) + min(a, 1)", &["a"], &[4.0]), 11.0);
        assert_eq!(eval("floor(x) + ceil(x)", &["x"], &[1.5]), 3.0);
        assert_eq!(eval("round(x)", &["x"], &[-2.5]), -3.0);
        assert_eq!(eval("round(x)", &["x"], &[2.4]), 2.0);
        assert_eq!(eval("sqrt(abs(x))", &["x"], &[-16.0]), 4.0);
    }

    #[test]
    fn expression_without_inputs() {
        let func = compiler().compile_source("-pi", &[]).unwrap();
        assert_eq!(func.num_inputs(), 0);
        assert_eq!(func.call(&[]).unwrap(), -std::f64::consts::PI);
    }

    #[test]
    fn call_checks_input_count() {
        let func = compiler().compile_source("x", &["x"]).unwrap();
        assert_eq!(
            func.call(&[1.0, 2.0]),
            Err(CompileError::InputCount { expected: 1, found: 2 })
        );
    }

    #[test]
    fn malformed_trace_is_rejected() {
        let ir = TraceIR::from_json(r#"{"inputs": [], "output": 9, "ops": []}"#).unwrap();
        assert!(matches!(compiler().compile(&ir), Err(CompileError::Trace(_))));
    }
}
