//! Host-side representation of WebAssembly values.

use crate::types::ValueType;
use std::fmt;
use wasmtime::{Val, V128};

/// A number or vector value crossing the host boundary.
///
/// Reference values are not representable; functions whose signatures use
/// them cannot be called from the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128(u128),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::V128(_) => ValueType::V128,
        }
    }

    pub fn i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Parses a textual value as the given type (used by the CLI).
    pub fn parse(ty: ValueType, text: &str) -> Option<Value> {
        match ty {
            ValueType::I32 => text
                .parse::<i32>()
                .ok()
                .or_else(|| text.parse::<u32>().ok().map(|v| v as i32))
                .map(Value::I32),
            ValueType::I64 => text
                .parse::<i64>()
                .ok()
                .or_else(|| text.parse::<u64>().ok().map(|v| v as i64))
                .map(Value::I64),
            ValueType::F32 => text.parse().ok().map(Value::F32),
            ValueType::F64 => text.parse().ok().map(Value::F64),
            ValueType::V128 => text.parse().ok().map(Value::V128),
            ValueType::ExternRef | ValueType::FuncRef => None,
        }
    }

    pub(crate) fn to_engine(self) -> Val {
        match self {
            Value::I32(v) => Val::I32(v),
            Value::I64(v) => Val::I64(v),
            Value::F32(v) => Val::F32(v.to_bits()),
            Value::F64(v) => Val::F64(v.to_bits()),
            Value::V128(v) => Val::V128(V128::from(v)),
        }
    }

    /// `None` for reference values.
    pub(crate) fn from_engine(val: &Val) -> Option<Value> {
        match val {
            Val::I32(v) => Some(Value::I32(*v)),
            Val::I64(v) => Some(Value::I64(*v)),
            Val::F32(bits) => Some(Value::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Some(Value::F64(f64::from_bits(*bits))),
            Val::V128(v) => Some(Value::V128(v.as_u128())),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::V128(v) => write!(f, "{:#034x}", v),
        }
    }
}

/// A zero value of the given type, used to size result buffers.
pub(crate) fn placeholder(ty: ValueType) -> Val {
    match ty {
        ValueType::I32 => Val::I32(0),
        ValueType::I64 => Val::I64(0),
        ValueType::F32 => Val::F32(0),
        ValueType::F64 => Val::F64(0),
        ValueType::V128 => Val::V128(V128::from(0u128)),
        ValueType::FuncRef => Val::FuncRef(None),
        ValueType::ExternRef => Val::ExternRef(None),
    }
}
