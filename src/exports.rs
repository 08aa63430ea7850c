//! Name-indexed access to an instance's exports.

use crate::error::{Error, ExportError, InstantiationError};
use crate::externals::{Extern, Function, Global, Memory, Table};
use crate::instance::SharedStore;
use crate::module::Module;
use crate::types::{ExternKind, ExternType};
use crate::values::Value;
use std::collections::HashMap;

/// One named export of an instance.
#[derive(Clone, Debug)]
pub struct Export {
    name: String,
    value: Extern,
}

impl Export {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ExternKind {
        self.value.kind()
    }

    pub fn value(&self) -> &Extern {
        &self.value
    }

    pub fn as_function(&self) -> Result<&Function, ExportError> {
        match &self.value {
            Extern::Function(func) => Ok(func),
            _ => Err(self.wrong_kind(ExternKind::Function)),
        }
    }

    pub fn as_memory(&self) -> Result<&Memory, ExportError> {
        match &self.value {
            Extern::Memory(memory) => Ok(memory),
            _ => Err(self.wrong_kind(ExternKind::Memory)),
        }
    }

    pub fn as_global(&self) -> Result<&Global, ExportError> {
        match &self.value {
            Extern::Global(global) => Ok(global),
            _ => Err(self.wrong_kind(ExternKind::Global)),
        }
    }

    pub fn as_table(&self) -> Result<&Table, ExportError> {
        match &self.value {
            Extern::Table(table) => Ok(table),
            _ => Err(self.wrong_kind(ExternKind::Table)),
        }
    }

    fn wrong_kind(&self, expected: ExternKind) -> ExportError {
        ExportError::WrongKind {
            name: self.name.clone(),
            expected,
            actual: self.kind(),
        }
    }
}

/// The exports of an instance, in the module's declaration order.
///
/// The set is fixed when the instance is created.
#[derive(Clone, Debug, Default)]
pub struct Exports {
    entries: Vec<Export>,
    index: HashMap<String, usize>,
}

impl Exports {
    pub(crate) fn new(
        module: &Module,
        instance: &wasmtime::Instance,
        store: &SharedStore,
    ) -> Result<Self, InstantiationError> {
        let mut entries = Vec::with_capacity(module.exports().len());
        {
            let mut guard = store
                .lock()
                .map_err(|e| InstantiationError::Engine(e.to_string()))?;
            for export in module.exports() {
                let engine_extern = instance
                    .get_export(&mut *guard, &export.name)
                    .ok_or_else(|| {
                        InstantiationError::Engine(format!("export '{}' is missing", export.name))
                    })?;

                let value = match (engine_extern, &export.ty) {
                    (wasmtime::Extern::Func(func), ExternType::Function(ty)) => {
                        Extern::Function(Function::new(func, ty.clone(), store.clone()))
                    }
                    (wasmtime::Extern::Memory(memory), ExternType::Memory(ty)) => {
                        Extern::Memory(Memory::new(memory, *ty, store.clone()))
                    }
                    (wasmtime::Extern::Global(global), ExternType::Global(ty)) => {
                        Extern::Global(Global::new(global, *ty, store.clone()))
                    }
                    (wasmtime::Extern::Table(table), ExternType::Table(ty)) => {
                        Extern::Table(Table::new(table, *ty, store.clone()))
                    }
                    _ => {
                        return Err(InstantiationError::Engine(format!(
                            "export '{}' has a kind that cannot be exposed to the host",
                            export.name
                        )))
                    }
                };
                entries.push(Export {
                    name: export.name.clone(),
                    value,
                });
            }
        }
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: Vec<Export>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, export)| (export.name.clone(), i))
            .collect();
        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Export, ExportError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ExportError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn function(&self, name: &str) -> Result<&Function, ExportError> {
        self.get(name)?.as_function()
    }

    pub fn memory(&self, name: &str) -> Result<&Memory, ExportError> {
        self.get(name)?.as_memory()
    }

    pub fn global(&self, name: &str) -> Result<&Global, ExportError> {
        self.get(name)?.as_global()
    }

    pub fn table(&self, name: &str) -> Result<&Table, ExportError> {
        self.get(name)?.as_table()
    }

    /// Names and kinds in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ExternKind)> + '_ {
        self.entries
            .iter()
            .map(|export| (export.name.as_str(), export.kind()))
    }

    /// Looks up an exported function and calls it.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, Error> {
        let func = self.function(name)?;
        tracing::trace!(function = name, args = args.len(), "invoking export");
        Ok(func.call(args)?)
    }
}

impl<'a> IntoIterator for &'a Exports {
    type Item = &'a Export;
    type IntoIter = std::slice::Iter<'a, Export>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
