use crate::error::GlobalError;
use crate::instance::SharedStore;
use crate::types::GlobalType;
use crate::values::Value;

/// An exported global.
#[derive(Clone)]
pub struct Global {
    global: wasmtime::Global,
    ty: GlobalType,
    store: SharedStore,
}

impl Global {
    pub(crate) fn new(global: wasmtime::Global, ty: GlobalType, store: SharedStore) -> Self {
        Self { global, ty, store }
    }

    pub fn ty(&self) -> &GlobalType {
        &self.ty
    }

    pub fn is_mutable(&self) -> bool {
        self.ty.mutable
    }

    pub fn get(&self) -> Result<Value, GlobalError> {
        let value = {
            let mut store = self.store.lock()?;
            self.global.get(&mut *store)
        };
        Value::from_engine(&value)
            .ok_or_else(|| GlobalError::Engine(format!("cannot read a {} global", self.ty.ty)))
    }

    pub fn set(&self, value: Value) -> Result<(), GlobalError> {
        if !self.ty.mutable {
            return Err(GlobalError::Immutable);
        }
        if value.ty() != self.ty.ty {
            return Err(GlobalError::TypeMismatch {
                expected: self.ty.ty.to_string(),
                actual: value.ty().to_string(),
            });
        }
        let mut store = self.store.lock()?;
        self.global
            .set(&mut *store, value.to_engine())
            .map_err(|e| GlobalError::Engine(e.to_string()))
    }
}

impl std::fmt::Debug for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Global").field("ty", &self.ty).finish_non_exhaustive()
    }
}
