//! Host-side wrappers around an instance's exported entities.

mod function;
mod global;
mod memory;
mod table;

pub use function::Function;
pub use global::Global;
pub use memory::{
    Int16Array, Int32Array, Int8Array, Memory, MemoryView, Uint16Array, Uint32Array, Uint8Array,
    ViewElement, PAGE_SIZE,
};
pub use table::Table;

pub(crate) use function::trap_message;

use crate::types::ExternKind;

/// A live exported entity.
#[derive(Clone)]
pub enum Extern {
    Function(Function),
    Memory(Memory),
    Global(Global),
    Table(Table),
}

impl Extern {
    pub fn kind(&self) -> ExternKind {
        match self {
            Extern::Function(_) => ExternKind::Function,
            Extern::Memory(_) => ExternKind::Memory,
            Extern::Global(_) => ExternKind::Global,
            Extern::Table(_) => ExternKind::Table,
        }
    }
}

impl std::fmt::Debug for Extern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extern::Function(func) => write!(f, "Function({})", func.ty()),
            Extern::Memory(memory) => write!(f, "Memory({})", memory.ty()),
            Extern::Global(global) => write!(f, "Global({})", global.ty()),
            Extern::Table(table) => write!(f, "Table({})", table.ty()),
        }
    }
}
