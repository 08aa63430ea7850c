use crate::error::CallError;
use crate::import_object::HostError;
use crate::instance::SharedStore;
use crate::types::{FunctionType, ValueType};
use crate::values::{placeholder, Value};
use wasmtime_wasi::I32Exit;

/// An exported function.
///
/// Cloning shares the instance it belongs to.
#[derive(Clone)]
pub struct Function {
    func: wasmtime::Func,
    ty: FunctionType,
    store: SharedStore,
}

impl Function {
    pub(crate) fn new(func: wasmtime::Func, ty: FunctionType, store: SharedStore) -> Self {
        Self { func, ty, store }
    }

    pub fn ty(&self) -> &FunctionType {
        &self.ty
    }

    /// Calls the function with host values.
    ///
    /// Arguments and result types are checked against the signature before
    /// anything runs.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>, CallError> {
        self.check_signature(args)?;

        let params: Vec<_> = args.iter().map(|arg| arg.to_engine()).collect();
        let mut results: Vec<_> = self.ty.results.iter().map(|ty| placeholder(*ty)).collect();

        {
            let mut store = self.store.lock()?;
            self.func
                .call(&mut *store, &params, &mut results)
                .map_err(call_error)?;
        }

        results
            .iter()
            .map(|val| {
                Value::from_engine(val).ok_or_else(|| CallError::SignatureMismatch {
                    expected: self.ty.clone(),
                    reason: "reference results cannot be returned to the host".to_string(),
                })
            })
            .collect()
    }

    fn check_signature(&self, args: &[Value]) -> Result<(), CallError> {
        let mismatch = |reason: String| CallError::SignatureMismatch {
            expected: self.ty.clone(),
            reason,
        };

        if let Some(index) = self.ty.results.iter().position(ValueType::is_reference) {
            return Err(mismatch(format!(
                "result {} is a {}, which cannot be returned to the host",
                index, self.ty.results[index]
            )));
        }
        if args.len() != self.ty.params.len() {
            return Err(mismatch(format!(
                "expected {} argument(s), got {}",
                self.ty.params.len(),
                args.len()
            )));
        }
        for (index, (arg, expected)) in args.iter().zip(&self.ty.params).enumerate() {
            if arg.ty() != *expected {
                return Err(mismatch(format!(
                    "argument {} should be {}, got {}",
                    index,
                    expected,
                    arg.ty()
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function").field("ty", &self.ty).finish_non_exhaustive()
    }
}

/// Classifies an engine failure raised while running guest code.
fn call_error(err: anyhow::Error) -> CallError {
    if let Some(exit) = err.downcast_ref::<I32Exit>() {
        return CallError::Exit { code: exit.0 };
    }
    CallError::Trap {
        message: trap_message(&err),
    }
}

/// The most specific message available for a trap.
pub(crate) fn trap_message(err: &anyhow::Error) -> String {
    if let Some(trap) = err.downcast_ref::<wasmtime::Trap>() {
        return trap.to_string();
    }
    if let Some(host) = err.downcast_ref::<HostError>() {
        return host.to_string();
    }
    format!("{err:#}")
}
