//! WASI support: snapshot detection, program configuration and generation
//! of the host functions a WASI module imports.
//!
//! The system interface itself is `wasmtime-wasi`; mapped directories are
//! opened as capabilities, so guest paths cannot leave them.
//!
//! ```ignore
//! let version = wasi::get_version(&module, true)?;
//! let env = wasi::StateBuilder::new("test-program")
//!     .argument("--foo")
//!     .map_directory("the_host_directory", ".")
//!     .finalize()?;
//! let imports = env.generate_import_object(&store, version)?;
//! let instance = Instance::new(&module, Some(&imports))?;
//! instance.exports().invoke("_start", &[])?;
//! ```

mod imports;
mod state;
mod version;

pub use state::{Environment, InputSource, OutputPipe, OutputSink, StateBuilder};
pub use version::{get_version, Version};

use crate::instance::InstanceState;

/// What an import object generated from an [`Environment`] carries: the
/// environment, the concrete snapshot and a linker defining its functions
/// for one engine.
#[derive(Clone)]
pub(crate) struct WasiBinding {
    pub(crate) environment: Environment,
    pub(crate) version: Version,
    pub(crate) linker: wasmtime::Linker<InstanceState>,
}

impl std::fmt::Debug for WasiBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasiBinding")
            .field("environment", &self.environment)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
