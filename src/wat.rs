//! Conversions between the text and binary formats.

use crate::error::CompileError;
use std::borrow::Cow;

/// Converts WebAssembly text to binary.
pub fn wat2wasm(text: &str) -> Result<Vec<u8>, CompileError> {
    wat::parse_str(text).map_err(|e| CompileError::Syntax(e.to_string()))
}

/// Converts a WebAssembly binary to its text representation.
pub fn wasm2wat(bytes: &[u8]) -> Result<String, CompileError> {
    wasmprinter::print_bytes(bytes).map_err(|e| CompileError::Invalid(e.to_string()))
}

/// Returns binary input unchanged and converts text input.
pub(crate) fn to_binary(source: &[u8]) -> Result<Cow<'_, [u8]>, CompileError> {
    wat::parse_bytes(source).map_err(|e| CompileError::Syntax(e.to_string()))
}
