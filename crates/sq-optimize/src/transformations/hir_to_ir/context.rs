use sq_core::hir;
use sq_core::id::{BlockId, LocalId, VarId};
use sq_core::ir::Operand;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopTarget {
    pub continue_block: BlockId,
    pub break_block: BlockId,
    /// Number of enclosing `try` frames when the loop was entered.
    pub try_depth: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct TryFrame {
    /// A handler installed by this frame is still live and must be popped
    /// when control leaves it normally.
    pub handler_active: bool,
    pub finally: Option<Vec<hir::Stmt>>,
}

/// Emission state of the function currently being generated.
#[derive(Debug, Default)]
pub(crate) struct FunctionState {
    locals: Vec<HashMap<VarId, LocalId>>,
    pub loops: Vec<LoopTarget>,
    pub tries: Vec<TryFrame>,
    pub ellipsis: Vec<Operand>,
    pub generator: bool,
}

impl FunctionState {
    pub fn new(generator: bool) -> Self {
        Self {
            locals: vec![HashMap::new()],
            generator,
            ..Default::default()
        }
    }

    pub fn push_scope(&mut self) {
        self.locals.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.locals.len() <= 1 {
            sq_core::ice!("popped the outermost codegen scope");
        }
        self.locals.pop();
    }

    pub fn bind(&mut self, var: VarId, local: LocalId) {
        match self.locals.last_mut() {
            Some(scope) => {
                scope.insert(var, local);
            }
            None => sq_core::ice!("no codegen scope to bind {}", var),
        }
    }

    pub fn lookup(&self, var: VarId) -> Option<LocalId> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(&var).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_is_dropped_with_its_scope() {
        let mut state = FunctionState::new(false);
        state.bind(VarId(0), LocalId(0));
        state.push_scope();
        state.bind(VarId(1), LocalId(1));
        assert_eq!(state.lookup(VarId(0)), Some(LocalId(0)));
        assert_eq!(state.lookup(VarId(1)), Some(LocalId(1)));
        state.pop_scope();
        assert_eq!(state.lookup(VarId(1)), None);
    }
}
