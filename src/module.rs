//! Compiled modules and their import/export descriptors.

use crate::error::CompileError;
use crate::store::Store;
use crate::types::{ExportType, ExternType, ImportType};
use std::sync::Arc;
use wasmparser::{Parser, Payload};

/// A compiled module.
///
/// Cloning is cheap and shares the compiled code and descriptors, so one
/// module can back any number of instances.
#[derive(Clone)]
pub struct Module {
    inner: wasmtime::Module,
    name: Option<String>,
    exports: Arc<[ExportType]>,
    imports: Arc<[ImportType]>,
    custom_sections: Arc<[(String, Vec<u8>)]>,
}

impl Module {
    /// Compiles a module from binary or text.
    pub fn new(store: &Store, source: impl AsRef<[u8]>) -> Result<Self, CompileError> {
        let binary = crate::wat::to_binary(source.as_ref())?;
        let inner = wasmtime::Module::from_binary(store.engine(), &binary)
            .map_err(|e| CompileError::Invalid(format!("{e:#}")))?;
        let custom_sections = custom_sections(&binary)?;

        let module = Self::from_engine(inner, custom_sections)?;
        tracing::debug!(
            name = module.name(),
            imports = module.imports.len(),
            exports = module.exports.len(),
            "compiled module"
        );
        Ok(module)
    }

    /// Checks whether the bytes form a valid module for this store.
    pub fn validate(store: &Store, bytes: impl AsRef<[u8]>) -> bool {
        wasmtime::Module::validate(store.engine(), bytes.as_ref()).is_ok()
    }

    /// Restores a module produced by [`Module::serialize`].
    ///
    /// Custom sections are not part of the serialized artifact.
    ///
    /// # Safety
    ///
    /// `bytes` must come from [`Module::serialize`] with a compatible engine;
    /// the engine trusts the contained machine code.
    pub unsafe fn deserialize(store: &Store, bytes: &[u8]) -> Result<Self, CompileError> {
        let inner = wasmtime::Module::deserialize(store.engine(), bytes)
            .map_err(|e| CompileError::Serialize(e.to_string()))?;
        Self::from_engine(inner, Vec::new())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, CompileError> {
        self.inner
            .serialize()
            .map_err(|e| CompileError::Serialize(e.to_string()))
    }

    fn from_engine(
        inner: wasmtime::Module,
        custom_sections: Vec<(String, Vec<u8>)>,
    ) -> Result<Self, CompileError> {
        let exports = inner
            .exports()
            .map(|export| {
                Ok(ExportType {
                    name: export.name().to_string(),
                    ty: extern_type(export.ty(), export.name())?,
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;
        let imports = inner
            .imports()
            .map(|import| {
                Ok(ImportType {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                    ty: extern_type(import.ty(), import.name())?,
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(Self {
            name: inner.name().map(str::to_string),
            inner,
            exports: exports.into(),
            imports: imports.into(),
            custom_sections: custom_sections.into(),
        })
    }

    /// The module name from its name section, or the one set with [`Module::set_name`].
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Export descriptors in declaration order.
    pub fn exports(&self) -> &[ExportType] {
        &self.exports
    }

    /// Import descriptors in declaration order.
    pub fn imports(&self) -> &[ImportType] {
        &self.imports
    }

    /// Contents of every custom section with the given name, in file order.
    pub fn custom_sections(&self, name: &str) -> Vec<&[u8]> {
        self.custom_sections
            .iter()
            .filter(|(section, _)| section == name)
            .map(|(_, data)| data.as_slice())
            .collect()
    }

    pub(crate) fn inner(&self) -> &wasmtime::Module {
        &self.inner
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("imports", &self.imports)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

fn extern_type(ty: wasmtime::ExternType, name: &str) -> Result<ExternType, CompileError> {
    ExternType::from_engine(&ty)
        .ok_or_else(|| CompileError::Invalid(format!("'{name}' has an unsupported extern kind")))
}

fn custom_sections(binary: &[u8]) -> Result<Vec<(String, Vec<u8>)>, CompileError> {
    let mut sections = Vec::new();
    for payload in Parser::new(0).parse_all(binary) {
        let payload = payload.map_err(|e| CompileError::Invalid(e.to_string()))?;
        if let Payload::CustomSection(reader) = payload {
            sections.push((reader.name().to_string(), reader.data().to_vec()));
        }
    }
    Ok(sections)
}
