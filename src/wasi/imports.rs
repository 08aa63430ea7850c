//! Generation of the WASI import namespace for an [`Environment`].
//!
//! The functions themselves come from `wasmtime-wasi`; an import object only
//! carries a linker holding them plus the environment each instance's
//! context is built from.

use super::{Environment, Version, WasiBinding};
use crate::error::VersionError;
use crate::import_object::ImportObject;
use crate::instance::InstanceState;
use crate::store::Store;
use wasmtime::{Engine, Linker};
use wasmtime_wasi::{preview0, preview1};

impl Environment {
    /// Builds the import object a WASI module of `version` needs.
    ///
    /// The result is tied to `store`'s engine: it can only instantiate
    /// modules compiled by a store sharing that engine, and resolution
    /// fails with [`crate::LinkError::EngineMismatch`] otherwise. Every
    /// instance created from it gets a fresh WASI context built from this
    /// environment.
    pub fn generate_import_object(
        &self,
        store: &Store,
        version: Version,
    ) -> Result<ImportObject, VersionError> {
        let resolved = version.resolve();
        if !Version::SNAPSHOTS.contains(&resolved) {
            return Err(VersionError::Unsupported(version.to_string()));
        }

        let linker = wasi_linker(store.engine(), resolved)
            .map_err(|e| VersionError::Unsupported(format!("{version}: {e:#}")))?;
        tracing::debug!(namespace = resolved.namespace(), "generated wasi import object");
        Ok(ImportObject::with_wasi(WasiBinding {
            environment: self.clone(),
            version: resolved,
            linker,
        }))
    }
}

/// A linker defining every function of one concrete snapshot.
fn wasi_linker(engine: &Engine, version: Version) -> anyhow::Result<Linker<InstanceState>> {
    let mut linker = Linker::new(engine);
    match version {
        Version::Snapshot0 => {
            preview0::add_to_linker_sync(&mut linker, |state: &mut InstanceState| &mut state.wasi)?
        }
        _ => preview1::add_to_linker_sync(&mut linker, |state: &mut InstanceState| &mut state.wasi)?,
    }
    Ok(linker)
}
