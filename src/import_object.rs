//! Host-supplied imports and their resolution against a module.
//!
//! An [`ImportObject`] is a two-level `namespace -> field -> value` mapping.
//! Values are descriptions (a host closure plus its signature, a global's
//! type and initial value, a memory or table type); they are materialized
//! inside each instance's store, so one import object can be reused for any
//! number of instantiations.

use crate::error::{LinkError, MemoryError};
use crate::instance::InstanceState;
use crate::module::Module;
use crate::types::{
    ExternKind, ExternType, FunctionType, GlobalType, ImportType, MemoryType, TableType,
    ValueType,
};
use crate::values::Value;
use crate::wasi::WasiBinding;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use wasmtime::{Caller, Val};

/// A host function failure, reported to the guest as a trap.
#[derive(Error, Debug)]
#[error("{0}")]
pub(crate) struct HostError(pub(crate) String);

type RawCallback =
    dyn Fn(Caller<'_, InstanceState>, &[Val], &mut [Val]) -> anyhow::Result<()> + Send + Sync;

/// A host function that can be imported by a module.
#[derive(Clone)]
pub struct HostFunction {
    ty: FunctionType,
    callback: Arc<RawCallback>,
}

impl HostFunction {
    /// Wraps a host closure.
    ///
    /// The closure's results are checked against `ty`; a mismatch or an
    /// `Err` from the closure traps the calling guest.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sum = HostFunction::new(
    ///     FunctionType::new([ValueType::I32, ValueType::I32], [ValueType::I32]),
    ///     |args| Ok(vec![Value::I32(args[0].i32().unwrap_or(0) + args[1].i32().unwrap_or(0))]),
    /// );
    /// ```
    pub fn new<F>(ty: FunctionType, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        let expected = ty.results.clone();
        Self::raw(
            ty,
            move |_caller: Caller<'_, InstanceState>, params: &[Val], results: &mut [Val]| {
                let args = host_arguments(params)?;
                let outputs = func(&args).map_err(|e| HostError(format!("{e:#}")))?;
                store_results(results, &outputs, &expected)
            },
        )
    }

    /// Wraps a host closure that also works on the calling instance's
    /// exported `memory`.
    ///
    /// This is the way to read or write guest buffers from a host function;
    /// the instance's own [`crate::Memory`] wrapper is locked while the
    /// guest runs. Calling the function before the instance exists (from a
    /// start function) or from an instance without a `memory` export traps.
    ///
    /// ```ignore
    /// let log = HostFunction::with_memory(
    ///     FunctionType::new([ValueType::I32, ValueType::I32], []),
    ///     |memory, args| {
    ///         let (ptr, len) = (args[0].i32().unwrap_or(0), args[1].i32().unwrap_or(0));
    ///         println!("{}", String::from_utf8_lossy(memory.slice(ptr as usize, len as usize)?));
    ///         Ok(vec![])
    ///     },
    /// );
    /// ```
    pub fn with_memory<F>(ty: FunctionType, func: F) -> Self
    where
        F: Fn(&mut HostMemory<'_>, &[Value]) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        let expected = ty.results.clone();
        Self::raw(
            ty,
            move |mut caller: Caller<'_, InstanceState>, params: &[Val], results: &mut [Val]| {
                let args = host_arguments(params)?;
                let memory = caller.data().memory().ok_or_else(|| {
                    HostError("host function called before the instance memory was bound".into())
                })?;
                let mut view = HostMemory {
                    data: memory.data_mut(&mut caller),
                };
                let outputs = func(&mut view, &args).map_err(|e| HostError(format!("{e:#}")))?;
                store_results(results, &outputs, &expected)
            },
        )
    }

    /// A host function working on engine values directly, with access to the caller.
    fn raw<F>(ty: FunctionType, callback: F) -> Self
    where
        F: Fn(Caller<'_, InstanceState>, &[Val], &mut [Val]) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            ty,
            callback: Arc::new(callback),
        }
    }

    pub fn ty(&self) -> &FunctionType {
        &self.ty
    }
}

fn host_arguments(params: &[Val]) -> Result<Vec<Value>, HostError> {
    params
        .iter()
        .map(|val| {
            Value::from_engine(val)
                .ok_or_else(|| HostError("reference arguments cannot reach host functions".into()))
        })
        .collect()
}

fn store_results(results: &mut [Val], outputs: &[Value], expected: &[ValueType]) -> anyhow::Result<()> {
    if outputs.len() != expected.len() {
        return Err(HostError(format!(
            "host function returned {} value(s), expected {}",
            outputs.len(),
            expected.len()
        ))
        .into());
    }
    for ((slot, value), ty) in results.iter_mut().zip(outputs).zip(expected) {
        if value.ty() != *ty {
            return Err(HostError(format!(
                "host function returned a {} where a {} was expected",
                value.ty(),
                ty
            ))
            .into());
        }
        *slot = value.to_engine();
    }
    Ok(())
}

/// The linear memory of the instance calling a memory-aware host function.
///
/// Every offset is checked against the current memory size.
pub struct HostMemory<'a> {
    data: &'a mut [u8],
}

impl HostMemory<'_> {
    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], MemoryError> {
        let range = self.range(offset, len)?;
        Ok(&mut self.data[range])
    }

    pub fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), MemoryError> {
        buffer.copy_from_slice(self.slice(offset, buffer.len())?);
        Ok(())
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), MemoryError> {
        self.slice_mut(offset, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// The whole memory.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .map(|end| offset..end)
            .ok_or(MemoryError::OutOfBounds { offset, len })
    }
}

/// A global provided by the host: its type and initial value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostGlobal {
    pub ty: GlobalType,
    pub value: Value,
}

impl HostGlobal {
    pub fn new(value: Value, mutable: bool) -> Self {
        Self {
            ty: GlobalType::new(value.ty(), mutable),
            value,
        }
    }
}

/// Any value an import object can hold.
#[derive(Clone)]
pub enum HostExtern {
    Function(HostFunction),
    Global(HostGlobal),
    Memory(MemoryType),
    Table(TableType),
}

impl HostExtern {
    pub fn kind(&self) -> ExternKind {
        match self {
            HostExtern::Function(_) => ExternKind::Function,
            HostExtern::Global(_) => ExternKind::Global,
            HostExtern::Memory(_) => ExternKind::Memory,
            HostExtern::Table(_) => ExternKind::Table,
        }
    }
}

impl From<HostFunction> for HostExtern {
    fn from(value: HostFunction) -> Self {
        HostExtern::Function(value)
    }
}

impl From<HostGlobal> for HostExtern {
    fn from(value: HostGlobal) -> Self {
        HostExtern::Global(value)
    }
}

impl From<MemoryType> for HostExtern {
    fn from(value: MemoryType) -> Self {
        HostExtern::Memory(value)
    }
}

impl From<TableType> for HostExtern {
    fn from(value: TableType) -> Self {
        HostExtern::Table(value)
    }
}

/// Host values offered to a module at instantiation.
///
/// An object generated from a WASI environment also answers imports of its
/// snapshot's namespace; entries defined in that namespace take precedence
/// over the generated functions.
#[derive(Clone, Default)]
pub struct ImportObject {
    namespaces: HashMap<String, HashMap<String, HostExtern>>,
    wasi: Option<WasiBinding>,
    strict: bool,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one entry.
    pub fn define(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<HostExtern>,
    ) -> &mut Self {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Merges entries into a namespace; later entries win on collision.
    pub fn register<I, K, V>(&mut self, namespace: impl Into<String>, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HostExtern>,
    {
        let fields = self.namespaces.entry(namespace.into()).or_default();
        for (name, value) in entries {
            fields.insert(name.into(), value.into());
        }
        self
    }

    /// Merges another import object into this one.
    ///
    /// Entries from `other` win on collision, and its WASI environment, if
    /// any, replaces this one's.
    pub fn extend(&mut self, other: ImportObject) -> &mut Self {
        for (namespace, fields) in other.namespaces {
            self.namespaces.entry(namespace).or_default().extend(fields);
        }
        if other.wasi.is_some() {
            self.wasi = other.wasi;
        }
        self
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace) || self.wasi_namespace() == Some(namespace)
    }

    /// An entry defined by the host. Generated WASI functions are not
    /// entries; they are created per instance.
    pub fn get(&self, namespace: &str, name: &str) -> Option<&HostExtern> {
        self.namespaces.get(namespace)?.get(name)
    }

    /// In strict mode, host-defined entries that the module does not import
    /// fail resolution with [`LinkError::UnusedImport`]. Generated WASI
    /// functions are never reported.
    pub fn set_strict(&mut self, strict: bool) -> &mut Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub(crate) fn with_wasi(wasi: WasiBinding) -> Self {
        Self {
            wasi: Some(wasi),
            ..Self::default()
        }
    }

    pub(crate) fn wasi(&self) -> Option<&WasiBinding> {
        self.wasi.as_ref()
    }

    fn wasi_namespace(&self) -> Option<&'static str> {
        self.wasi.as_ref().map(|binding| binding.version.namespace())
    }

    /// Resolves every import of `module`, in declaration order, into values
    /// living in `store`.
    ///
    /// Resolution is total: the first unsatisfied import fails the whole
    /// operation.
    pub(crate) fn resolve(
        &self,
        module: &Module,
        store: &mut wasmtime::Store<InstanceState>,
    ) -> Result<Vec<wasmtime::Extern>, LinkError> {
        let engine = store.engine().clone();
        if let Some(binding) = &self.wasi {
            if !wasmtime::Engine::same(binding.linker.engine(), &engine) {
                return Err(LinkError::EngineMismatch {
                    module: binding.version.namespace().to_string(),
                });
            }
        }
        let mut resolved = Vec::with_capacity(module.imports().len());

        for import in module.imports() {
            let module_name = import.module.as_str();
            let name = import.name.as_str();
            let Some(provided) = self.get(module_name, name) else {
                resolved.push(self.resolve_generated(import, store)?);
                continue;
            };

            let mismatch = |expected: &dyn std::fmt::Display, actual: &dyn std::fmt::Display| {
                LinkError::SignatureMismatch {
                    module: module_name.to_string(),
                    name: name.to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                }
            };
            let materialize = |message: String| LinkError::Materialize {
                module: module_name.to_string(),
                name: name.to_string(),
                message,
            };

            let value = match (&import.ty, provided) {
                (ExternType::Function(required), HostExtern::Function(host)) => {
                    if host.ty != *required {
                        return Err(mismatch(required, &host.ty));
                    }
                    let callback = host.callback.clone();
                    let func = wasmtime::Func::new(
                        &mut *store,
                        host.ty.to_engine(&engine),
                        move |caller, params, results| callback(caller, params, results),
                    );
                    wasmtime::Extern::Func(func)
                }
                (ExternType::Global(required), HostExtern::Global(host)) => {
                    if host.ty != *required {
                        return Err(mismatch(required, &host.ty));
                    }
                    let global = wasmtime::Global::new(
                        &mut *store,
                        host.ty.to_engine(),
                        host.value.to_engine(),
                    )
                    .map_err(|e| materialize(e.to_string()))?;
                    wasmtime::Extern::Global(global)
                }
                (ExternType::Memory(required), HostExtern::Memory(host)) => {
                    if !host.satisfies(required) {
                        return Err(mismatch(required, host));
                    }
                    let ty = host
                        .to_engine()
                        .ok_or_else(|| materialize(format!("limits of {host} are out of range")))?;
                    let memory = wasmtime::Memory::new(&mut *store, ty)
                        .map_err(|e| materialize(e.to_string()))?;
                    wasmtime::Extern::Memory(memory)
                }
                (ExternType::Table(required), HostExtern::Table(host)) => {
                    if !host.satisfies(required) {
                        return Err(mismatch(required, host));
                    }
                    let ty = host
                        .to_engine()
                        .ok_or_else(|| materialize(format!("limits of {host} are out of range")))?;
                    let init = if host.ty == ValueType::FuncRef {
                        wasmtime::Ref::Func(None)
                    } else {
                        wasmtime::Ref::Extern(None)
                    };
                    let table = wasmtime::Table::new(&mut *store, ty, init)
                        .map_err(|e| materialize(e.to_string()))?;
                    wasmtime::Extern::Table(table)
                }
                _ => {
                    return Err(LinkError::KindMismatch {
                        module: module_name.to_string(),
                        name: name.to_string(),
                        expected: import.kind(),
                        actual: provided.kind(),
                    })
                }
            };
            tracing::trace!(module = module_name, name, "resolved import");
            resolved.push(value);
        }

        if self.strict {
            self.check_unused(module)?;
        }
        tracing::debug!(count = resolved.len(), "resolved imports");
        Ok(resolved)
    }

    /// Resolves an import the host did not define against the generated
    /// WASI functions.
    fn resolve_generated(
        &self,
        import: &ImportType,
        store: &mut wasmtime::Store<InstanceState>,
    ) -> Result<wasmtime::Extern, LinkError> {
        let module_name = import.module.as_str();
        let name = import.name.as_str();
        let missing_field = || LinkError::MissingField {
            module: module_name.to_string(),
            name: name.to_string(),
        };

        let binding = match &self.wasi {
            Some(binding) if binding.version.namespace() == module_name => binding,
            _ if self.namespaces.contains_key(module_name) => return Err(missing_field()),
            _ => {
                return Err(LinkError::MissingModule {
                    module: module_name.to_string(),
                    name: name.to_string(),
                })
            }
        };
        let value = binding
            .linker
            .get(&mut *store, module_name, name)
            .ok_or_else(missing_field)?;

        match (&import.ty, ExternType::from_engine(&value.ty(&*store))) {
            (ExternType::Function(required), Some(ExternType::Function(actual))) => {
                if *required != actual {
                    return Err(LinkError::SignatureMismatch {
                        module: module_name.to_string(),
                        name: name.to_string(),
                        expected: required.to_string(),
                        actual: actual.to_string(),
                    });
                }
            }
            (required, Some(actual)) => {
                return Err(LinkError::KindMismatch {
                    module: module_name.to_string(),
                    name: name.to_string(),
                    expected: required.kind(),
                    actual: actual.kind(),
                })
            }
            (_, None) => {
                return Err(LinkError::Materialize {
                    module: module_name.to_string(),
                    name: name.to_string(),
                    message: "the generated value has no host representation".to_string(),
                })
            }
        }
        tracing::trace!(module = module_name, name, "resolved wasi import");
        Ok(value)
    }

    fn check_unused(&self, module: &Module) -> Result<(), LinkError> {
        let wanted: HashSet<(&str, &str)> = module
            .imports()
            .iter()
            .map(|import| (import.module.as_str(), import.name.as_str()))
            .collect();

        let mut namespaces: Vec<_> = self.namespaces.iter().collect();
        namespaces.sort_by(|a, b| a.0.cmp(b.0));

        for (namespace, fields) in namespaces {
            let mut names: Vec<_> = fields.keys().collect();
            names.sort();
            if let Some(name) = names
                .into_iter()
                .find(|name| !wanted.contains(&(namespace.as_str(), name.as_str())))
            {
                return Err(LinkError::UnusedImport {
                    module: namespace.clone(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}
