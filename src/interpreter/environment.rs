use crate::interpreter::value::Value;
use drop_bomb::DropBomb;
use std::collections::HashMap;

/// The variables visible to a running Bolton program.
///
/// Scopes form a stack: a function call pushes a scope on top of the caller's, so the callee
/// sees (and can shadow) every variable of its caller. `VAR` always writes to the innermost
/// scope.
#[derive(Debug, Default)]
pub struct Environment {
    current_scope: Scope,
    parent_scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) -> ScopeGuard {
        let enclosing_scope = std::mem::take(&mut self.current_scope);
        self.parent_scopes.push(enclosing_scope);
        ScopeGuard(DropBomb::new("A scope was entered but never exited"))
    }

    pub fn exit_scope(&mut self, mut guard: ScopeGuard) {
        guard.0.defuse();
        if let Some(parent_scope) = self.parent_scopes.pop() {
            self.current_scope = parent_scope;
        }
    }

    pub fn define(&mut self, variable_name: String, value: Value) {
        self.current_scope.define(variable_name, value);
    }

    pub fn get_value(&self, variable_name: &str) -> Option<Value> {
        if let Some(value) = self.current_scope.get_value(variable_name) {
            return Some(value);
        }
        self.parent_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get_value(variable_name))
    }
}

#[derive(Default, Debug)]
struct Scope(HashMap<String, Value>);

impl Scope {
    pub fn define(&mut self, variable_name: String, value: Value) {
        self.0.insert(variable_name, value);
    }

    pub fn get_value(&self, variable_name: &str) -> Option<Value> {
        self.0.get(variable_name).cloned()
    }
}

/// Returned by [`Environment::enter_scope`]; panics when dropped instead of being handed back
/// to [`Environment::exit_scope`]. Every function call must pop the scope it pushed, including
/// calls that fail.
pub struct ScopeGuard(DropBomb);

#[cfg(test)]
mod tests {
    use super::Environment;
    use crate::interpreter::value::Value;

    #[test]
    fn inner_scopes_shadow_and_then_restore() {
        let mut environment = Environment::new();
        environment.define("a".into(), Value::from(1));

        let guard = environment.enter_scope();
        assert_eq!(environment.get_value("a").unwrap().to_string(), "1");
        environment.define("a".into(), Value::from(2));
        environment.define("b".into(), Value::from(3));
        assert_eq!(environment.get_value("a").unwrap().to_string(), "2");
        environment.exit_scope(guard);

        assert_eq!(environment.get_value("a").unwrap().to_string(), "1");
        assert!(environment.get_value("b").is_none());
    }

    #[test]
    #[should_panic(expected = "A scope was entered but never exited")]
    fn leaking_a_scope_panics() {
        let mut environment = Environment::new();
        let _guard = environment.enter_scope();
    }
}
