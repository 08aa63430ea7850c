//! wasmhost: embed WebAssembly modules in a Rust host
//!
//! Compile a module, hand it host imports, instantiate it, and talk to its
//! exports through typed handles. WASI programs get a generated import
//! object built from a process-like configuration.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               wasmhost                  │
//! │                                         │
//! │  module        - Compilation, reflection│
//! │  import_object - Host imports, linking  │
//! │  instance      - Instantiation          │
//! │  exports       - Typed export access    │
//! │  wasi          - WASI configuration     │
//! │                                         │
//! ├─────────────────────────────────────────┤
//! │        WASM Execution (wasmtime)        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let store = Store::new();
//! let module = Module::new(&store, r#"(module
//!     (func (export "sum") (param i32 i32) (result i32)
//!         local.get 0 local.get 1 i32.add))"#)?;
//! let instance = Instance::new(&module, None)?;
//! let sum = instance.exports().function("sum")?;
//! assert_eq!(sum.call(&[Value::I32(1), Value::I32(2)])?, [Value::I32(3)]);
//! ```

pub mod error;
pub mod exports;
pub mod externals;
pub mod import_object;
pub mod instance;
pub mod module;
pub mod store;
pub mod types;
pub mod values;
pub mod wasi;
pub mod wat;

pub use error::{
    CallError, CompileError, ConfigError, Error, ExportError, GlobalError, InstantiationError,
    LinkError, MemoryError, ReentrantAccess, StateError, VersionError,
};
pub use exports::{Export, Exports};
pub use externals::{Extern, Function, Global, Memory, MemoryView, Table};
pub use import_object::{HostExtern, HostFunction, HostGlobal, HostMemory, ImportObject};
pub use instance::Instance;
pub use module::Module;
pub use store::{Optimization, Store, StoreConfig};
pub use types::{
    ExportType, ExternKind, ExternType, FunctionType, GlobalType, ImportType, MemoryType,
    TableType, ValueType,
};
pub use values::Value;
