//! Instantiation.

use crate::error::{InstantiationError, ReentrantAccess};
use crate::exports::Exports;
use crate::externals::trap_message;
use crate::import_object::{HostError, ImportObject};
use crate::module::Module;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::{I32Exit, WasiCtxBuilder};

/// Engine-side data owned by each instance.
pub(crate) struct InstanceState {
    /// Per-instance WASI context. Instances without a WASI environment get
    /// an empty one that grants nothing.
    pub(crate) wasi: WasiP1Ctx,
    /// The instance's exported `memory`, bound once after instantiation so
    /// memory-aware host functions can reach guest buffers.
    memory: OnceLock<wasmtime::Memory>,
}

impl InstanceState {
    pub(crate) fn new(wasi: WasiP1Ctx) -> Self {
        Self {
            wasi,
            memory: OnceLock::new(),
        }
    }

    pub(crate) fn memory(&self) -> Option<wasmtime::Memory> {
        self.memory.get().copied()
    }
}

/// An instance store shared by every export wrapper of the instance.
///
/// The lock remembers which thread holds it, so a host function that calls
/// back into a wrapper of its own instance fails instead of deadlocking.
#[derive(Clone)]
pub(crate) struct SharedStore {
    inner: Arc<StoreCell>,
}

struct StoreCell {
    store: Mutex<wasmtime::Store<InstanceState>>,
    owner: Mutex<Option<ThreadId>>,
}

impl SharedStore {
    fn new(store: wasmtime::Store<InstanceState>) -> Self {
        Self {
            inner: Arc::new(StoreCell {
                store: Mutex::new(store),
                owner: Mutex::new(None),
            }),
        }
    }

    /// Locks the store for the current thread.
    ///
    /// A poisoned lock only means a host function panicked mid-call; the
    /// store itself is still usable.
    pub(crate) fn lock(&self) -> Result<StoreGuard<'_>, ReentrantAccess> {
        let current = thread::current().id();
        if *self.owner() == Some(current) {
            return Err(ReentrantAccess);
        }
        let store = self.inner.store.lock().unwrap_or_else(PoisonError::into_inner);
        *self.owner() = Some(current);
        Ok(StoreGuard { store, cell: self })
    }

    fn owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.inner.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct StoreGuard<'a> {
    store: MutexGuard<'a, wasmtime::Store<InstanceState>>,
    cell: &'a SharedStore,
}

impl Deref for StoreGuard<'_> {
    type Target = wasmtime::Store<InstanceState>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl DerefMut for StoreGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

impl Drop for StoreGuard<'_> {
    fn drop(&mut self) {
        // Cleared while the store lock is still held.
        *self.cell.owner() = None;
    }
}

/// A live instantiation of a [`Module`].
///
/// Calls into an instance are serialized through its store. A host function
/// that calls back into the export wrappers of the instance running it gets
/// a [`ReentrantAccess`] error; memory-aware host functions
/// ([`crate::HostFunction::with_memory`]) are the way to reach guest memory
/// from inside a call.
pub struct Instance {
    module: Module,
    exports: Exports,
    _store: SharedStore,
}

impl Instance {
    /// Instantiates `module`, resolving its imports against `imports`.
    ///
    /// `None` behaves like an empty import object. A start function, if the
    /// module has one, runs before this returns.
    pub fn new(module: &Module, imports: Option<&ImportObject>) -> Result<Self, InstantiationError> {
        let empty = ImportObject::new();
        let imports = imports.unwrap_or(&empty);

        let wasi = match imports.wasi() {
            Some(binding) => binding
                .environment
                .build_context()
                .map_err(|e| InstantiationError::Engine(format!("{e:#}")))?,
            None => WasiCtxBuilder::new().build_p1(),
        };

        let mut store = wasmtime::Store::new(module.inner().engine(), InstanceState::new(wasi));
        let externs = imports.resolve(module, &mut store)?;
        let instance = wasmtime::Instance::new(&mut store, module.inner(), &externs)
            .map_err(instantiation_error)?;

        if let Some(wasmtime::Extern::Memory(memory)) = instance.get_export(&mut store, "memory") {
            // Fresh state, so the cell is always empty here.
            let _ = store.data().memory.set(memory);
        }

        let store = SharedStore::new(store);
        let exports = Exports::new(module, &instance, &store)?;
        tracing::debug!(
            module = module.name(),
            exports = exports.len(),
            wasi = imports.wasi().is_some(),
            "instantiated module"
        );

        Ok(Self {
            module: module.clone(),
            exports,
            _store: store,
        })
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    pub fn module(&self) -> &Module {
        &self.module
    }
}

fn instantiation_error(err: anyhow::Error) -> InstantiationError {
    if let Some(exit) = err.downcast_ref::<I32Exit>() {
        return InstantiationError::Trap {
            message: format!("start function exited with code {}", exit.0),
        };
    }
    let is_trap =
        err.downcast_ref::<wasmtime::Trap>().is_some() || err.downcast_ref::<HostError>().is_some();
    if is_trap {
        InstantiationError::Trap {
            message: trap_message(&err),
        }
    } else {
        InstantiationError::Engine(format!("{err:#}"))
    }
}
