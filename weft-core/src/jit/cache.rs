//! Expression Compilation Cache
//!
//! A resolution pass compiles each expression node at most once. The cache
//! maps node ids to compiled handles for the lifetime of the pass and is
//! handed to the caller with the pass result.

use indexmap::map::Entry;
use indexmap::IndexMap;

use super::codegen::{CompiledExpression, JitCompiler};
use crate::error::CompileError;
use crate::model::NodeId;

/// A backend that turns expression source into something executable.
pub trait ExpressionCompiler {
    type Compiled;

    /// Compile `source`; `inputs` name the arguments in order.
    fn compile(&self, source: &str, inputs: &[&str]) -> Result<Self::Compiled, CompileError>;
}

impl ExpressionCompiler for JitCompiler {
    type Compiled = CompiledExpression;

    fn compile(&self, source: &str, inputs: &[&str]) -> Result<CompiledExpression, CompileError> {
        self.compile_source(source, inputs)
    }
}

impl<C: ExpressionCompiler + ?Sized> ExpressionCompiler for &C {
    type Compiled = C::Compiled;

    fn compile(&self, source: &str, inputs: &[&str]) -> Result<C::Compiled, CompileError> {
        (**self).compile(source, inputs)
    }
}

/// Per-pass memo of compiled expressions, keyed by node.
pub struct ExpressionCache<C: ExpressionCompiler> {
    compiler: C,
    compiled: IndexMap<NodeId, C::Compiled>,
}

impl<C: ExpressionCompiler> ExpressionCache<C> {
    pub fn new(compiler: C) -> Self {
        Self {
            compiler,
            compiled: IndexMap::new(),
        }
    }

    /// Return the handle for `node`, compiling `source` on first request.
    ///
    /// Later requests for the same node return the first handle without
    /// looking at `source` again.
    pub fn get_or_compile(
        &mut self,
        node: NodeId,
        source: &str,
        inputs: &[&str],
    ) -> Result<&C::Compiled, CompileError> {
        match self.compiled.entry(node) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                tracing::trace!(node = %node, "compiling expression");
                let compiled = self.compiler.compile(source, inputs)?;
                Ok(entry.insert(compiled))
            }
        }
    }

    pub fn get(&self, node: NodeId) -> Option<&C::Compiled> {
        self.compiled.get(&node)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Consume the cache, keeping the handles in compilation order.
    pub fn into_compiled(self) -> IndexMap<NodeId, C::Compiled> {
        self.compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingCompiler {
        calls: Cell<usize>,
    }

    impl ExpressionCompiler for CountingCompiler {
        type Compiled = String;

        fn compile(&self, source: &str, _inputs: &[&str]) -> Result<String, CompileError> {
            self.calls.set(self.calls.get() + 1);
            if source.is_empty() {
                return Err(CompileError::Syntax {
                    offset: 0,
                    message: "empty".into(),
                });
            }
            Ok(source.to_string())
        }
    }

    #[test]
    fn second_request_is_a_cache_hit() {
        let compiler = CountingCompiler::default();
        let mut cache = ExpressionCache::new(&compiler);
        let node = NodeId::new();

        assert_eq!(cache.get_or_compile(node, "a + 1", &["a"]).unwrap(), "a + 1");
        assert_eq!(cache.get_or_compile(node, "a + 1", &["a"]).unwrap(), "a + 1");
        assert_eq!(compiler.calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_nodes_compile_separately() {
        let compiler = CountingCompiler::default();
        let mut cache = ExpressionCache::new(&compiler);

        cache.get_or_compile(NodeId::new(), "1", &[]).unwrap();
        cache.get_or_compile(NodeId::new(), "1", &[]).unwrap();
        assert_eq!(compiler.calls.get(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let compiler = CountingCompiler::default();
        let mut cache = ExpressionCache::new(&compiler);
        let node = NodeId::new();

        assert!(cache.get_or_compile(node, "", &[]).is_err());
        assert!(cache.is_empty());
        assert!(cache.get(node).is_none());
    }

    #[test]
    fn jit_backend_through_cache() {
        let jit = JitCompiler::new(&Default::default()).unwrap();
        let mut cache = ExpressionCache::new(jit);
        let node = NodeId::new();

        let compiled = cache.get_or_compile(node, "t * 2", &["t"]).unwrap();
        assert_eq!(compiled.call(&[21.0]).unwrap(), 42.0);
        assert_eq!(cache.into_compiled().len(), 1);
    }
}
