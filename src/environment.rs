use crate::ast::FunctionDef;
use crate::callable::NativeFunction;
use crate::interpreter::RuntimeError;
use crate::value::Value;
use log::trace;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Scope<'a> {
    variables: BTreeMap<String, Value<'a>>,
    methods: BTreeMap<String, &'a FunctionDef>,
}

/// Name resolution for a running program.
///
/// Scopes form a stack whose bottom entry is the global scope. Every block and
/// every call pushes a scope, and lookups walk from the top down, so a callee
/// sees whatever its caller had visible at the time of the call.
#[derive(Debug)]
pub struct Environment<'a> {
    scopes: Vec<Scope<'a>>,
    natives: BTreeMap<String, NativeFunction>,
    pending_return: Option<Value<'a>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Environment<'a> {
        Environment {
            scopes: vec![Scope::default()],
            natives: BTreeMap::new(),
            pending_return: None,
        }
    }

    pub fn define_function(&mut self, function: &'a FunctionDef) {
        self.scopes[0]
            .methods
            .insert(function.name.clone(), function);
    }
    pub fn define_native(&mut self, native: NativeFunction) {
        self.natives.insert(native.name.clone(), native);
    }
    pub fn native(&self, name: &str) -> Option<NativeFunction> {
        self.natives.get(name).cloned()
    }

    pub fn start_block(&mut self) {
        self.scopes.push(Scope::default());
        trace!("push scope, depth {}", self.scopes.len());
    }
    pub fn end_block(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
        trace!("pop scope, depth {}", self.scopes.len());
    }
    pub fn enter_call(&mut self) {
        self.start_block();
    }
    /// Pops the call scope and hands back whatever the callee returned.
    pub fn leave_call(&mut self) -> Value<'a> {
        self.end_block();
        self.pending_return.take().unwrap_or(Value::Void)
    }

    pub fn declare(&mut self, name: &str, value: Value<'a>) -> Result<(), RuntimeError> {
        let scope = self.current();
        if scope.variables.contains_key(name) {
            return Err(RuntimeError::AlreadyDeclared {
                name: name.to_string(),
            });
        }
        scope.variables.insert(name.to_string(), value);
        Ok(())
    }
    pub fn declare_method(&mut self, method: &'a FunctionDef) {
        self.current().methods.insert(method.name.clone(), method);
    }
    pub fn contains(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.variables.contains_key(name))
    }
    pub fn get(&self, name: &str) -> Result<Value<'a>, RuntimeError> {
        for scope in self.scopes.iter().rev() {
            if let Some(x) = scope.variables.get(name) {
                return Ok(x.clone());
            }
        }
        Err(RuntimeError::UndeclaredSymbol {
            name: name.to_string(),
        })
    }
    pub fn assign(&mut self, name: &str, value: Value<'a>) -> Result<(), RuntimeError> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(x) = scope.variables.get_mut(name) {
                *x = value;
                return Ok(());
            }
        }
        Err(RuntimeError::UndeclaredSymbol {
            name: name.to_string(),
        })
    }
    pub fn method(&self, name: &str) -> Result<&'a FunctionDef, RuntimeError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.methods.get(name).copied())
            .ok_or_else(|| RuntimeError::UndeclaredMethod {
                name: name.to_string(),
            })
    }

    pub fn set_return(&mut self, value: Value<'a>) {
        self.pending_return = Some(value);
    }
    pub fn is_returning(&self) -> bool {
        self.pending_return.is_some()
    }

    fn current(&mut self) -> &mut Scope<'a> {
        let top = self.scopes.len() - 1;
        &mut self.scopes[top]
    }
}
