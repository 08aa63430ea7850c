//! Type descriptors for imports and exports.
//!
//! These mirror the engine's own types but are plain data: they can be
//! compared, printed, serialized, and held without a store.

use serde::Serialize;
use std::fmt;
use wasmtime::{Engine, Mutability, RefType, ValType};

/// A WebAssembly value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    V128,
    ExternRef,
    FuncRef,
}

impl ValueType {
    pub fn is_reference(&self) -> bool {
        matches!(self, ValueType::ExternRef | ValueType::FuncRef)
    }

    pub(crate) fn to_engine(self) -> ValType {
        match self {
            ValueType::I32 => ValType::I32,
            ValueType::I64 => ValType::I64,
            ValueType::F32 => ValType::F32,
            ValueType::F64 => ValType::F64,
            ValueType::V128 => ValType::V128,
            ValueType::ExternRef => ValType::EXTERNREF,
            ValueType::FuncRef => ValType::FUNCREF,
        }
    }

    fn from_ref_type(ty: &RefType) -> Self {
        use wasmtime::HeapType;
        match ty.heap_type() {
            HeapType::Func | HeapType::ConcreteFunc(_) | HeapType::NoFunc => ValueType::FuncRef,
            _ => ValueType::ExternRef,
        }
    }

    fn to_ref_type(self) -> RefType {
        match self {
            ValueType::FuncRef => RefType::FUNCREF,
            _ => RefType::EXTERNREF,
        }
    }
}

impl From<&ValType> for ValueType {
    fn from(value: &ValType) -> Self {
        match value {
            ValType::I32 => ValueType::I32,
            ValType::I64 => ValueType::I64,
            ValType::F32 => ValueType::F32,
            ValType::F64 => ValueType::F64,
            ValType::V128 => ValueType::V128,
            ValType::Ref(r) => ValueType::from_ref_type(r),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::ExternRef => "externref",
            ValueType::FuncRef => "funcref",
        };
        f.write_str(name)
    }
}

/// The signature of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(
        params: impl IntoIterator<Item = ValueType>,
        results: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    pub(crate) fn to_engine(&self, engine: &Engine) -> wasmtime::FuncType {
        wasmtime::FuncType::new(
            engine,
            self.params.iter().map(|ty| ty.to_engine()),
            self.results.iter().map(|ty| ty.to_engine()),
        )
    }
}

impl From<&wasmtime::FuncType> for FunctionType {
    fn from(value: &wasmtime::FuncType) -> Self {
        Self {
            params: value.params().map(|ty| ValueType::from(&ty)).collect(),
            results: value.results().map(|ty| ValueType::from(&ty)).collect(),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValueType]| {
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}

/// Limits of a linear memory, in 64KiB pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MemoryType {
    pub minimum: u64,
    pub maximum: Option<u64>,
    pub shared: bool,
    pub memory64: bool,
}

impl MemoryType {
    pub fn new(minimum: u32, maximum: Option<u32>) -> Self {
        Self {
            minimum: minimum.into(),
            maximum: maximum.map(Into::into),
            shared: false,
            memory64: false,
        }
    }

    /// Whether a memory of this type can be supplied where `required` is imported.
    pub fn satisfies(&self, required: &MemoryType) -> bool {
        self.shared == required.shared
            && self.memory64 == required.memory64
            && limits_satisfy(
                (self.minimum, self.maximum),
                (required.minimum, required.maximum),
            )
    }

    pub(crate) fn to_engine(self) -> Option<wasmtime::MemoryType> {
        if self.memory64 {
            return (!self.shared).then(|| wasmtime::MemoryType::new64(self.minimum, self.maximum));
        }
        let minimum = u32::try_from(self.minimum).ok()?;
        let maximum = match self.maximum {
            Some(max) => Some(u32::try_from(max).ok()?),
            None => None,
        };
        if self.shared {
            Some(wasmtime::MemoryType::shared(minimum, maximum?))
        } else {
            Some(wasmtime::MemoryType::new(minimum, maximum))
        }
    }
}

impl From<&wasmtime::MemoryType> for MemoryType {
    fn from(value: &wasmtime::MemoryType) -> Self {
        Self {
            minimum: value.minimum(),
            maximum: value.maximum(),
            shared: value.is_shared(),
            memory64: value.is_64(),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory {}", self.minimum)?;
        if let Some(max) = self.maximum {
            write!(f, " {}", max)?;
        }
        if self.shared {
            f.write_str(" shared")?;
        }
        Ok(())
    }
}

/// The type of a global: content type and mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GlobalType {
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub mutable: bool,
}

impl GlobalType {
    pub fn new(ty: ValueType, mutable: bool) -> Self {
        Self { ty, mutable }
    }

    pub(crate) fn to_engine(self) -> wasmtime::GlobalType {
        let mutability = if self.mutable {
            Mutability::Var
        } else {
            Mutability::Const
        };
        wasmtime::GlobalType::new(self.ty.to_engine(), mutability)
    }
}

impl From<&wasmtime::GlobalType> for GlobalType {
    fn from(value: &wasmtime::GlobalType) -> Self {
        Self {
            ty: ValueType::from(value.content()),
            mutable: matches!(value.mutability(), Mutability::Var),
        }
    }
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mutable {
            write!(f, "global (mut {})", self.ty)
        } else {
            write!(f, "global {}", self.ty)
        }
    }
}

/// The type of a table: element type and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TableType {
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub minimum: u64,
    pub maximum: Option<u64>,
}

impl TableType {
    pub fn new(ty: ValueType, minimum: u32, maximum: Option<u32>) -> Self {
        Self {
            ty,
            minimum: minimum.into(),
            maximum: maximum.map(Into::into),
        }
    }

    pub fn satisfies(&self, required: &TableType) -> bool {
        self.ty == required.ty
            && limits_satisfy(
                (self.minimum, self.maximum),
                (required.minimum, required.maximum),
            )
    }

    pub(crate) fn to_engine(self) -> Option<wasmtime::TableType> {
        let minimum = u32::try_from(self.minimum).ok()?;
        let maximum = match self.maximum {
            Some(max) => Some(u32::try_from(max).ok()?),
            None => None,
        };
        Some(wasmtime::TableType::new(
            self.ty.to_ref_type(),
            minimum,
            maximum,
        ))
    }
}

impl From<&wasmtime::TableType> for TableType {
    fn from(value: &wasmtime::TableType) -> Self {
        let minimum: u64 = value.minimum().into();
        Self {
            ty: ValueType::from_ref_type(value.element()),
            minimum,
            maximum: value.maximum().map(u64::from),
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {}", self.minimum)?;
        if let Some(max) = self.maximum {
            write!(f, " {}", max)?;
        }
        write!(f, " {}", self.ty)
    }
}

fn limits_satisfy(provided: (u64, Option<u64>), required: (u64, Option<u64>)) -> bool {
    if provided.0 < required.0 {
        return false;
    }
    match (provided.1, required.1) {
        (_, None) => true,
        (Some(p), Some(r)) => p <= r,
        (None, Some(_)) => false,
    }
}

/// The four kinds of importable and exportable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternKind {
    Function,
    Memory,
    Global,
    Table,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternKind::Function => "function",
            ExternKind::Memory => "memory",
            ExternKind::Global => "global",
            ExternKind::Table => "table",
        };
        f.write_str(name)
    }
}

/// The full type of an import or export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExternType {
    Function(FunctionType),
    Memory(MemoryType),
    Global(GlobalType),
    Table(TableType),
}

impl ExternType {
    pub fn kind(&self) -> ExternKind {
        match self {
            ExternType::Function(_) => ExternKind::Function,
            ExternType::Memory(_) => ExternKind::Memory,
            ExternType::Global(_) => ExternKind::Global,
            ExternType::Table(_) => ExternKind::Table,
        }
    }

    /// Converts an engine type; `None` for kinds this layer does not expose.
    pub(crate) fn from_engine(ty: &wasmtime::ExternType) -> Option<Self> {
        #[allow(unreachable_patterns)]
        match ty {
            wasmtime::ExternType::Func(t) => Some(ExternType::Function(t.into())),
            wasmtime::ExternType::Memory(t) => Some(ExternType::Memory(t.into())),
            wasmtime::ExternType::Global(t) => Some(ExternType::Global(t.into())),
            wasmtime::ExternType::Table(t) => Some(ExternType::Table(t.into())),
            _ => None,
        }
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternType::Function(t) => write!(f, "func {}", t),
            ExternType::Memory(t) => t.fmt(f),
            ExternType::Global(t) => t.fmt(f),
            ExternType::Table(t) => t.fmt(f),
        }
    }
}

/// An export descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportType {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ExternType,
}

impl ExportType {
    pub fn kind(&self) -> ExternKind {
        self.ty.kind()
    }
}

/// An import descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportType {
    pub module: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ExternType,
}

impl ImportType {
    pub fn kind(&self) -> ExternKind {
        self.ty.kind()
    }
}
