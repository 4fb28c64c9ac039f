use std::collections::HashMap;
use std::sync::RwLock;

use common::err::{CResult, ReError};
use common::row::Value;
use session::Session;

use crate::function::{check_arity, Function};

/// Process-wide table of callable functions, keyed by upper-cased name
/// (SQL function names are case-insensitive). `register_udf` lets a
/// deployment add its own entries alongside the built-ins registered at
/// startup; a later registration under the same name replaces the
/// earlier one rather than erroring, so a UDF can shadow a built-in.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Box<dyn Function>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, function: Box<dyn Function>) {
        let key = function.name().to_ascii_uppercase();
        self.functions.write().unwrap().insert(key, function);
    }

    /// Same as `register`, named for the external-facing concept of
    /// adding a user-defined function at runtime.
    pub fn register_udf(&self, function: Box<dyn Function>) {
        self.register(function);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.functions.read().unwrap().contains_key(&name.to_ascii_uppercase())
    }

    pub fn call(&self, name: &str, args: &[Value], session: Option<&Session>) -> CResult<Value> {
        let key = name.to_ascii_uppercase();
        let functions = self.functions.read().unwrap();
        let function = functions
            .get(&key)
            .ok_or_else(|| ReError::Error(format!("unknown function: {name}")))?;
        check_arity(function.as_ref(), args)?;
        function.eval(args, session)
    }

    /// Builds a registry pre-loaded with every built-in function this
    /// server ships.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtins::register_all(&registry);
        registry
    }
}
