//! Process-like configuration for WASI programs.

use crate::error::StateError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wasmtime_wasi::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

/// Where a guest's standard input comes from.
#[derive(Debug, Clone, Default)]
pub enum InputSource {
    /// The host process's stdin.
    Inherit,
    /// Always at end of file.
    #[default]
    Null,
    /// A fixed buffer; every instance reads it from the start.
    Bytes(Arc<[u8]>),
}

impl InputSource {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        InputSource::Bytes(data.into().into())
    }
}

/// Where a guest's standard output or error goes.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    /// The matching stream of the host process.
    #[default]
    Inherit,
    /// Discarded.
    Null,
    /// Captured in memory.
    Pipe(OutputPipe),
}

/// An in-memory output buffer shared between the host and every instance
/// writing to it.
#[derive(Clone)]
pub struct OutputPipe {
    pipe: MemoryOutputPipe,
}

impl OutputPipe {
    /// A pipe that accepts any amount of output.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// A pipe that accepts at most `capacity` bytes; writes past that fail
    /// in the guest.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pipe: MemoryOutputPipe::new(capacity),
        }
    }

    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.pipe.contents().to_vec()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.pipe.contents()).into_owned()
    }
}

impl Default for OutputPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OutputPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPipe")
            .field("len", &self.pipe.contents().len())
            .finish()
    }
}

/// Accumulates the configuration of a WASI program.
///
/// ```ignore
/// let env = StateBuilder::new("test-program")
///     .argument("--foo")
///     .environments([("ABC", "DEF"), ("X", "YZ")])
///     .map_directory("the_host_directory", ".")
///     .finalize()?;
/// ```
#[derive(Debug, Clone)]
pub struct StateBuilder {
    program_name: String,
    arguments: Vec<String>,
    environment: Vec<(String, String)>,
    directories: Vec<(String, PathBuf)>,
    stdin: InputSource,
    stdout: OutputSink,
    stderr: OutputSink,
}

impl StateBuilder {
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            arguments: Vec::new(),
            environment: Vec::new(),
            directories: Vec::new(),
            stdin: InputSource::default(),
            stdout: OutputSink::default(),
            stderr: OutputSink::default(),
        }
    }

    pub fn argument(&mut self, argument: impl Into<String>) -> &mut Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn arguments<I, S>(&mut self, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments
            .extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Sets one variable. A key that is already present keeps its position
    /// and takes the new value.
    pub fn environment(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.environment.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.environment.push((key, value)),
        }
        self
    }

    pub fn environments<I, K, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.environment(key, value);
        }
        self
    }

    /// Exposes the host directory `host_path` to the guest under `alias`.
    pub fn map_directory(&mut self, alias: impl Into<String>, host_path: impl AsRef<Path>) -> &mut Self {
        self.directories
            .push((alias.into(), host_path.as_ref().to_path_buf()));
        self
    }

    pub fn map_directories<I, A, P>(&mut self, mappings: I) -> &mut Self
    where
        I: IntoIterator<Item = (A, P)>,
        A: Into<String>,
        P: AsRef<Path>,
    {
        for (alias, path) in mappings {
            self.map_directory(alias, path);
        }
        self
    }

    /// Exposes a host directory under its own path.
    pub fn preopen_directory(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref();
        self.map_directory(path.to_string_lossy(), path)
    }

    pub fn preopen_directories<I, P>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.preopen_directory(path);
        }
        self
    }

    pub fn stdin(&mut self, source: InputSource) -> &mut Self {
        self.stdin = source;
        self
    }

    pub fn stdout(&mut self, sink: OutputSink) -> &mut Self {
        self.stdout = sink;
        self
    }

    pub fn stderr(&mut self, sink: OutputSink) -> &mut Self {
        self.stderr = sink;
        self
    }

    /// Validates the accumulated state and copies it into an [`Environment`].
    ///
    /// The builder is left untouched and can keep being used.
    pub fn finalize(&self) -> Result<Environment, StateError> {
        for argument in std::iter::once(&self.program_name).chain(&self.arguments) {
            if argument.contains('\0') {
                return Err(StateError::InvalidArgument(argument.clone()));
            }
        }
        for (key, value) in &self.environment {
            let reason = if key.is_empty() {
                Some("empty key")
            } else if key.contains('=') {
                Some("key contains '='")
            } else if key.contains('\0') || value.contains('\0') {
                Some("contains a NUL byte")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(StateError::InvalidEnvironment {
                    key: key.clone(),
                    reason,
                });
            }
        }

        let mut directories = Vec::with_capacity(self.directories.len());
        for (alias, path) in &self.directories {
            let invalid = |reason: String| StateError::InvalidDirectory {
                alias: alias.clone(),
                path: path.display().to_string(),
                reason,
            };
            if alias.contains('\0') {
                return Err(invalid("alias contains a NUL byte".to_string()));
            }
            let canonical = std::fs::canonicalize(path).map_err(|e| invalid(e.to_string()))?;
            if !canonical.is_dir() {
                return Err(invalid("not a directory".to_string()));
            }
            directories.push((alias.clone(), canonical));
        }

        tracing::debug!(
            program = %self.program_name,
            arguments = self.arguments.len(),
            variables = self.environment.len(),
            directories = directories.len(),
            "finalized wasi environment"
        );
        Ok(Environment {
            inner: Arc::new(EnvironmentInner {
                program_name: self.program_name.clone(),
                arguments: self.arguments.clone(),
                environment: self.environment.clone(),
                directories,
                stdin: self.stdin.clone(),
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            }),
        })
    }
}

/// A finalized, immutable WASI configuration.
///
/// Cloning shares the configuration. Each instance created from an import
/// object generated here gets its own WASI context: descriptor table, stdin
/// position and preopened directories.
#[derive(Debug, Clone)]
pub struct Environment {
    pub(crate) inner: Arc<EnvironmentInner>,
}

#[derive(Debug)]
pub(crate) struct EnvironmentInner {
    pub(crate) program_name: String,
    pub(crate) arguments: Vec<String>,
    pub(crate) environment: Vec<(String, String)>,
    pub(crate) directories: Vec<(String, PathBuf)>,
    pub(crate) stdin: InputSource,
    pub(crate) stdout: OutputSink,
    pub(crate) stderr: OutputSink,
}

impl Environment {
    pub fn program_name(&self) -> &str {
        &self.inner.program_name
    }

    /// Arguments after the program name.
    pub fn arguments(&self) -> &[String] {
        &self.inner.arguments
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.inner.environment
    }

    /// Mapped directories as `(alias, canonical host path)`, in mapping order.
    pub fn directories(&self) -> &[(String, PathBuf)] {
        &self.inner.directories
    }

    /// Builds a fresh WASI context for one instance.
    ///
    /// Directories are opened here, so one removed after `finalize` fails
    /// the instantiation.
    pub(crate) fn build_context(&self) -> anyhow::Result<WasiP1Ctx> {
        let inner = &*self.inner;
        let mut builder = WasiCtxBuilder::new();
        builder
            .arg(&inner.program_name)
            .args(&inner.arguments)
            .envs(&inner.environment);

        match &inner.stdin {
            InputSource::Inherit => {
                builder.inherit_stdin();
            }
            InputSource::Null => {}
            InputSource::Bytes(data) => {
                builder.stdin(MemoryInputPipe::new(data.to_vec()));
            }
        }
        match &inner.stdout {
            OutputSink::Inherit => {
                builder.inherit_stdout();
            }
            OutputSink::Null => {}
            OutputSink::Pipe(out) => {
                builder.stdout(out.pipe.clone());
            }
        }
        match &inner.stderr {
            OutputSink::Inherit => {
                builder.inherit_stderr();
            }
            OutputSink::Null => {}
            OutputSink::Pipe(out) => {
                builder.stderr(out.pipe.clone());
            }
        }

        for (alias, path) in &inner.directories {
            builder.preopened_dir(path, alias, DirPerms::all(), FilePerms::all())?;
        }
        tracing::trace!(
            program = %inner.program_name,
            directories = inner.directories.len(),
            "built wasi context"
        );
        Ok(builder.build_p1())
    }
}
