use crate::error::ReentrantAccess;
use crate::instance::SharedStore;
use crate::types::TableType;

/// An exported table.
#[derive(Clone)]
pub struct Table {
    table: wasmtime::Table,
    ty: TableType,
    store: SharedStore,
}

impl Table {
    pub(crate) fn new(table: wasmtime::Table, ty: TableType, store: SharedStore) -> Self {
        Self { table, ty, store }
    }

    pub fn ty(&self) -> TableType {
        self.ty
    }

    /// Number of elements.
    pub fn size(&self) -> Result<u64, ReentrantAccess> {
        let store = self.store.lock()?;
        Ok(self.table.size(&*store))
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("ty", &self.ty).finish_non_exhaustive()
    }
}
