//! wasmhost CLI - inspect and run WebAssembly modules
//!
//! Commands:
//!   wasmhost inspect <wasm>  - Display a module's imports and exports
//!   wasmhost run <wasm>      - Instantiate a module and call an export

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wasmhost::wasi::{self, StateBuilder};
use wasmhost::{Instance, Module, Store, StoreConfig, Value, ValueType};

#[derive(Parser)]
#[command(name = "wasmhost")]
#[command(about = "Inspect and run WebAssembly modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display a module's imports, exports and WASI version
    Inspect {
        /// Path to a .wasm or .wat file
        wasm_file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Instantiate a module and call one of its exports
    Run {
        /// Path to a .wasm or .wat file
        wasm_file: PathBuf,

        /// Export to call; WASI programs default to `_start`
        #[arg(long)]
        invoke: Option<String>,

        /// Environment variable for WASI programs (KEY=VALUE)
        #[arg(long = "env", value_name = "KEY=VALUE")]
        envs: Vec<String>,

        /// Directory mapping for WASI programs (ALIAS::HOST_PATH, or a path)
        #[arg(long = "dir", value_name = "ALIAS::HOST_PATH")]
        dirs: Vec<String>,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Arguments: program arguments for WASI programs, call arguments otherwise
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { wasm_file, json } => inspect_command(&wasm_file, json),
        Commands::Run {
            wasm_file,
            invoke,
            envs,
            dirs,
            config,
            args,
        } => run_command(&wasm_file, invoke, &envs, &dirs, config.as_deref(), &args),
    }
}

fn load_module(store: &Store, path: &Path) -> anyhow::Result<Module> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut module = Module::new(store, bytes)
        .with_context(|| format!("Failed to compile {}", path.display()))?;
    if module.name().is_none() {
        if let Some(stem) = path.file_stem() {
            module.set_name(stem.to_string_lossy());
        }
    }
    Ok(module)
}

fn inspect_command(wasm_file: &Path, json: bool) -> anyhow::Result<()> {
    let store = Store::new();
    let module = load_module(&store, wasm_file)?;
    let version = wasi::get_version(&module, false).ok();

    if json {
        let output = serde_json::json!({
            "name": module.name(),
            "wasi": version.map(|v| v.to_string()),
            "imports": module.imports(),
            "exports": module.exports(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(name) = module.name() {
        println!("module: {}", name);
    }
    if let Some(version) = version {
        println!("wasi: {}", version);
    }
    if !module.imports().is_empty() {
        println!("imports:");
        for import in module.imports() {
            println!("  {}.{}: {}", import.module, import.name, import.ty);
        }
    }
    if !module.exports().is_empty() {
        println!("exports:");
        for export in module.exports() {
            println!("  {}: {}", export.name, export.ty);
        }
    }
    Ok(())
}

fn run_command(
    wasm_file: &Path,
    invoke: Option<String>,
    envs: &[String],
    dirs: &[String],
    config: Option<&Path>,
    args: &[String],
) -> anyhow::Result<()> {
    let store = match config {
        Some(path) => Store::with_config(StoreConfig::from_file(path)?)?,
        None => Store::new(),
    };
    let module = load_module(&store, wasm_file)?;

    let (imports, is_wasi) = match wasi::get_version(&module, false) {
        Ok(version) => {
            let program = module.name().unwrap_or("main").to_string();
            let mut builder = StateBuilder::new(program);
            builder.arguments(args);
            for pair in envs {
                let (key, value) = pair
                    .split_once('=')
                    .with_context(|| format!("Invalid --env '{}', expected KEY=VALUE", pair))?;
                builder.environment(key, value);
            }
            for dir in dirs {
                match dir.split_once("::") {
                    Some((alias, host)) => builder.map_directory(alias, host),
                    None => builder.preopen_directory(dir),
                };
            }
            let env = builder.finalize()?;
            (Some(env.generate_import_object(&store, version)?), true)
        }
        Err(_) => (None, false),
    };

    let instance = Instance::new(&module, imports.as_ref())?;
    let name = match invoke {
        Some(name) => name,
        None if is_wasi => "_start".to_string(),
        None => anyhow::bail!("--invoke is required for modules that are not WASI programs"),
    };

    let func = instance.exports().function(&name)?;
    let call_args = if is_wasi { Vec::new() } else { parse_args(&func.ty().params, args)? };

    match func.call(&call_args) {
        Ok(results) => {
            for value in results {
                println!("{}", value);
            }
            Ok(())
        }
        Err(wasmhost::CallError::Exit { code }) => std::process::exit(code),
        Err(err) => Err(err.into()),
    }
}

fn parse_args(params: &[ValueType], args: &[String]) -> anyhow::Result<Vec<Value>> {
    if params.len() != args.len() {
        anyhow::bail!("Expected {} argument(s), got {}", params.len(), args.len());
    }
    params
        .iter()
        .zip(args)
        .map(|(ty, text)| {
            Value::parse(*ty, text)
                .with_context(|| format!("Cannot parse '{}' as {}", text, ty))
        })
        .collect()
}
