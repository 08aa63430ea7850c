//! WASI tests
//!
//! Most tests use a harness module whose exports forward to the WASI imports
//! it receives, so the host functions can be driven one call at a time and
//! their effect checked in the instance memory.

use wasmhost::wasi::{self, Environment, InputSource, OutputPipe, OutputSink, StateBuilder, Version};
use wasmhost::{
    CallError, Error, Instance, InstantiationError, LinkError, Memory, Module, Store, Value,
    VersionError,
};

const ESUCCESS: i32 = 0;
const EBADF: i32 = 8;
const ENAMETOOLONG: i32 = 37;

const LOOKUP_SYMLINK_FOLLOW: i32 = 1;
const OFLAGS_CREAT: i32 = 1;
const FDFLAGS_APPEND: i32 = 1;
const RIGHTS_FD_READ: i64 = 1 << 1;
const RIGHTS_FD_WRITE: i64 = 1 << 6;
const WHENCE_SET: i32 = 0;

/// Every `wasi_snapshot_preview1` function: name, parameter types and
/// whether it returns an errno.
const PREVIEW1: &[(&str, &str, bool)] = &[
    ("args_get", "i32 i32", true),
    ("args_sizes_get", "i32 i32", true),
    ("environ_get", "i32 i32", true),
    ("environ_sizes_get", "i32 i32", true),
    ("clock_res_get", "i32 i32", true),
    ("clock_time_get", "i32 i64 i32", true),
    ("fd_advise", "i32 i64 i64 i32", true),
    ("fd_allocate", "i32 i64 i64", true),
    ("fd_close", "i32", true),
    ("fd_datasync", "i32", true),
    ("fd_fdstat_get", "i32 i32", true),
    ("fd_fdstat_set_flags", "i32 i32", true),
    ("fd_fdstat_set_rights", "i32 i64 i64", true),
    ("fd_filestat_get", "i32 i32", true),
    ("fd_filestat_set_size", "i32 i64", true),
    ("fd_filestat_set_times", "i32 i64 i64 i32", true),
    ("fd_pread", "i32 i32 i32 i64 i32", true),
    ("fd_prestat_get", "i32 i32", true),
    ("fd_prestat_dir_name", "i32 i32 i32", true),
    ("fd_pwrite", "i32 i32 i32 i64 i32", true),
    ("fd_read", "i32 i32 i32 i32", true),
    ("fd_readdir", "i32 i32 i32 i64 i32", true),
    ("fd_renumber", "i32 i32", true),
    ("fd_seek", "i32 i64 i32 i32", true),
    ("fd_sync", "i32", true),
    ("fd_tell", "i32 i32", true),
    ("fd_write", "i32 i32 i32 i32", true),
    ("path_create_directory", "i32 i32 i32", true),
    ("path_filestat_get", "i32 i32 i32 i32 i32", true),
    ("path_filestat_set_times", "i32 i32 i32 i32 i64 i64 i32", true),
    ("path_link", "i32 i32 i32 i32 i32 i32 i32", true),
    ("path_open", "i32 i32 i32 i32 i32 i64 i64 i32 i32", true),
    ("path_readlink", "i32 i32 i32 i32 i32 i32", true),
    ("path_remove_directory", "i32 i32 i32", true),
    ("path_rename", "i32 i32 i32 i32 i32 i32", true),
    ("path_symlink", "i32 i32 i32 i32 i32", true),
    ("path_unlink_file", "i32 i32 i32", true),
    ("poll_oneoff", "i32 i32 i32 i32", true),
    ("proc_exit", "i32", false),
    ("proc_raise", "i32", true),
    ("sched_yield", "", true),
    ("random_get", "i32 i32", true),
    ("sock_accept", "i32 i32 i32", true),
    ("sock_recv", "i32 i32 i32 i32 i32 i32", true),
    ("sock_send", "i32 i32 i32 i32 i32", true),
    ("sock_shutdown", "i32 i32", true),
];

/// Functions the harness forwards; all exist in both snapshots.
const HARNESS_FUNCTIONS: &[&str] = &[
    "args_get",
    "args_sizes_get",
    "environ_get",
    "environ_sizes_get",
    "clock_time_get",
    "fd_close",
    "fd_fdstat_set_flags",
    "fd_prestat_get",
    "fd_prestat_dir_name",
    "fd_read",
    "fd_seek",
    "fd_write",
    "path_open",
    "path_unlink_file",
    "proc_exit",
    "random_get",
];

fn signature(name: &str) -> (&'static str, bool) {
    PREVIEW1
        .iter()
        .find(|(candidate, _, _)| *candidate == name)
        .map(|(_, params, errno)| (*params, *errno))
        .unwrap_or_else(|| panic!("unknown wasi function {name}"))
}

fn func_type(params: &str, returns_errno: bool) -> String {
    let mut ty = String::new();
    if !params.is_empty() {
        ty.push_str(&format!(" (param {params})"));
    }
    if returns_errno {
        ty.push_str(" (result i32)");
    }
    ty
}

fn import(namespace: &str, name: &str) -> String {
    let (params, errno) = signature(name);
    format!(
        "(import \"{namespace}\" \"{name}\" (func ${name}{}))\n",
        func_type(params, errno)
    )
}

/// A module exporting one forwarding function per harness import.
fn harness_source(namespace: &str) -> String {
    let mut source = String::from("(module\n");
    for name in HARNESS_FUNCTIONS {
        source.push_str(&import(namespace, name));
    }
    for name in HARNESS_FUNCTIONS {
        let (params, errno) = signature(name);
        let locals: String = (0..params.split_whitespace().count())
            .map(|index| format!("local.get {index} "))
            .collect();
        source.push_str(&format!(
            "(func (export \"{name}\"){} {locals}call ${name})\n",
            func_type(params, errno)
        ));
    }
    source.push_str("(memory (export \"memory\") 1))\n");
    source
}

struct Harness {
    instance: Instance,
}

impl Harness {
    fn new(env: &Environment, version: Version) -> Self {
        let store = Store::new();
        let module =
            Module::new(&store, harness_source(version.namespace())).expect("compile harness");
        assert_eq!(wasi::get_version(&module, true), Ok(version.resolve()));

        let imports = env
            .generate_import_object(&store, version)
            .expect("generate imports");
        let instance = Instance::new(&module, Some(&imports)).expect("instantiate harness");
        Self { instance }
    }

    fn call(&self, name: &str, args: &[Value]) -> i32 {
        let results = self.instance.exports().invoke(name, args).expect(name);
        results[0].i32().expect("errno")
    }

    fn memory(&self) -> &Memory {
        self.instance.exports().memory("memory").unwrap()
    }

    fn u32_at(&self, offset: usize) -> u32 {
        self.memory().uint32_view(offset).get(0).unwrap()
    }

    fn bytes_at(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.memory().read(offset, &mut buf).unwrap();
        buf
    }

    fn put(&self, offset: usize, bytes: &[u8]) {
        self.memory().write(offset, bytes).unwrap();
    }

    /// Opens `path` below descriptor 3 and returns the errno and new descriptor.
    fn open(&self, path: &str, oflags: i32, rights: i64) -> (i32, u32) {
        self.open_with(0, path, oflags, rights)
    }

    fn open_with(&self, lookup: i32, path: &str, oflags: i32, rights: i64) -> (i32, u32) {
        self.put(1000, path.as_bytes());
        let errno = self.call(
            "path_open",
            &[
                Value::I32(3),
                Value::I32(lookup),
                Value::I32(1000),
                Value::I32(path.len() as i32),
                Value::I32(oflags),
                Value::I64(rights),
                Value::I64(0),
                Value::I32(0),
                Value::I32(1200),
            ],
        );
        (errno, self.u32_at(1200))
    }

    /// Writes `data` to `fd` through a single iovec.
    fn write(&self, fd: u32, data: &[u8]) -> i32 {
        self.put(400, data);
        self.put(500, &400u32.to_le_bytes());
        self.put(504, &(data.len() as u32).to_le_bytes());
        self.call("fd_write", &i32s(&[fd as i32, 500, 1, 600]))
    }

    fn unlink(&self, path: &str) -> i32 {
        self.put(1000, path.as_bytes());
        self.call("path_unlink_file", &i32s(&[3, 1000, path.len() as i32]))
    }
}

fn i32s(values: &[i32]) -> Vec<Value> {
    values.iter().copied().map(Value::I32).collect()
}

#[test]
fn version_detection() {
    let store = Store::new();
    let detect = |wat: &str, strict: bool| {
        let module = Module::new(&store, wat).expect("compile");
        wasi::get_version(&module, strict)
    };

    let preview1 = r#"(module (import "wasi_snapshot_preview1" "sched_yield" (func (result i32))))"#;
    let unstable = r#"(module (import "wasi_unstable" "sched_yield" (func (result i32))))"#;
    let both = r#"(module
        (import "wasi_unstable" "sched_yield" (func (result i32)))
        (import "wasi_snapshot_preview1" "sched_yield" (func (result i32))))"#;
    let plain = r#"(module (import "env" "f" (func)))"#;

    assert_eq!(detect(preview1, true), Ok(Version::Snapshot1));
    assert_eq!(detect(unstable, true), Ok(Version::Snapshot0));
    assert_eq!(detect(both, false), Ok(Version::Snapshot1));
    assert!(matches!(
        detect(both, true),
        Err(VersionError::Ambiguous { ref namespaces }) if namespaces.len() == 2
    ));
    assert_eq!(detect(plain, true), Err(VersionError::NotWasi));
    assert_eq!(detect("(module)", false), Err(VersionError::NotWasi));
}

#[test]
fn version_codes() {
    assert_eq!(Version::from_code(1), Ok(Version::Latest));
    assert_eq!(Version::from_code(2), Ok(Version::Snapshot0));
    assert_eq!(Version::from_code(3), Ok(Version::Snapshot1));
    assert!(matches!(
        Version::from_code(0),
        Err(VersionError::Unsupported(_))
    ));
}

#[test]
fn finalize_copies_the_builder_state() {
    let mut builder = StateBuilder::new("test-program");
    builder
        .arguments(["--foo", "--bar"])
        .environments([("ABC", "DEF"), ("X", "YZ")]);
    let first = builder.finalize().expect("finalize");

    builder.argument("--baz").environment("X", "changed");
    let second = builder.finalize().expect("finalize again");

    assert_eq!(first.arguments(), ["--foo", "--bar"]);
    assert_eq!(first.environment()[1], ("X".to_string(), "YZ".to_string()));
    assert_eq!(second.arguments(), ["--foo", "--bar", "--baz"]);
    assert_eq!(
        second.environment()[1],
        ("X".to_string(), "changed".to_string())
    );
}

#[test]
fn program_importing_every_preview1_function_runs_to_completion() {
    let mut source = String::from("(module\n");
    for (name, _, _) in PREVIEW1 {
        source.push_str(&import("wasi_snapshot_preview1", name));
    }
    source.push_str(
        r#"
        (memory (export "memory") 1)
        (data (i32.const 512) "ok\n")
        (func (export "_start")
            (if (call $args_sizes_get (i32.const 0) (i32.const 4)) (then unreachable))
            (if (call $environ_sizes_get (i32.const 8) (i32.const 12)) (then unreachable))
            (if (call $fd_prestat_get (i32.const 3) (i32.const 16)) (then unreachable))
            (if (call $fd_prestat_dir_name (i32.const 3) (i32.const 64) (i32.load (i32.const 20)))
                (then unreachable))
            (i32.store (i32.const 32) (i32.const 512))
            (i32.store (i32.const 36) (i32.const 3))
            (if (call $fd_write (i32.const 1) (i32.const 32) (i32.const 1) (i32.const 40))
                (then unreachable)))
        )
        "#,
    );

    let store = Store::new();
    let module = Module::new(&store, source).expect("compile");
    assert_eq!(module.imports().len(), PREVIEW1.len());
    assert_eq!(wasi::get_version(&module, true), Ok(Version::Snapshot1));

    let dir = tempfile::tempdir().unwrap();
    let stdout = OutputPipe::new();
    let env = StateBuilder::new("test-program")
        .arguments(["--foo", "--bar"])
        .environments([("ABC", "DEF"), ("X", "YZ")])
        .map_directory("the_host_directory", dir.path())
        .stdout(OutputSink::Pipe(stdout.clone()))
        .finalize()
        .unwrap();
    let imports = env.generate_import_object(&store, Version::Latest).unwrap();

    let instance = Instance::new(&module, Some(&imports)).expect("every import resolves");
    instance.exports().invoke("_start", &[]).expect("_start");

    let memory = instance.exports().memory("memory").unwrap();
    let u32_at = |offset| memory.uint32_view(offset).get(0).unwrap();
    assert_eq!(u32_at(0), 3);
    assert_eq!(u32_at(8), 2);
    let mut alias = vec![0u8; "the_host_directory".len()];
    memory.read(64, &mut alias).unwrap();
    assert_eq!(alias, b"the_host_directory");
    assert_eq!(stdout.contents_lossy(), "ok\n");
}

#[test]
fn run_hello_world_with_captured_stdout() {
    let store = Store::new();
    let module = Module::new(
        &store,
        r#"
        (module
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 8) "hello, wasi\n")
            (func (export "_start")
                (i32.store (i32.const 0) (i32.const 8))
                (i32.store (i32.const 4) (i32.const 12))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 100))))
        )
        "#,
    )
    .unwrap();

    let version = wasi::get_version(&module, true).unwrap();
    let stdout = OutputPipe::new();
    let env = StateBuilder::new("hello")
        .stdout(OutputSink::Pipe(stdout.clone()))
        .finalize()
        .unwrap();
    let imports = env.generate_import_object(&store, Version::Latest).unwrap();
    assert_eq!(version, Version::Snapshot1);

    let instance = Instance::new(&module, Some(&imports)).unwrap();
    instance.exports().invoke("_start", &[]).unwrap();
    assert_eq!(stdout.contents_lossy(), "hello, wasi\n");

    // A second instance writes to the same pipe.
    let again = Instance::new(&module, Some(&imports)).unwrap();
    again.exports().invoke("_start", &[]).unwrap();
    assert_eq!(stdout.contents_lossy(), "hello, wasi\nhello, wasi\n");
}

#[test]
fn arguments_are_marshalled_with_the_program_name_first() {
    let env = StateBuilder::new("test-program")
        .argument("--foo")
        .argument("bar")
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    assert_eq!(harness.call("args_sizes_get", &i32s(&[0, 4])), ESUCCESS);
    assert_eq!(harness.u32_at(0), 3);
    let expected = b"test-program\0--foo\0bar\0";
    assert_eq!(harness.u32_at(4), expected.len() as u32);

    assert_eq!(harness.call("args_get", &i32s(&[16, 64])), ESUCCESS);
    assert_eq!(harness.u32_at(16), 64);
    assert_eq!(harness.u32_at(20), 64 + 13);
    assert_eq!(harness.u32_at(24), 64 + 19);
    assert_eq!(harness.bytes_at(64, expected.len()), expected);
}

#[test]
fn environment_is_marshalled_in_insertion_order() {
    let env = StateBuilder::new("prog")
        .environments([("ABC", "DEF"), ("X", "YZ")])
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    assert_eq!(harness.call("environ_sizes_get", &i32s(&[0, 4])), ESUCCESS);
    assert_eq!(harness.u32_at(0), 2);
    let expected = b"ABC=DEF\0X=YZ\0";
    assert_eq!(harness.u32_at(4), expected.len() as u32);

    assert_eq!(harness.call("environ_get", &i32s(&[16, 64])), ESUCCESS);
    assert_eq!(harness.bytes_at(64, expected.len()), expected);
}

#[test]
fn preopened_directory_name() {
    let dir = tempfile::tempdir().unwrap();
    let env = StateBuilder::new("prog")
        .map_directory("the_host_directory", dir.path())
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    assert_eq!(harness.call("fd_prestat_get", &i32s(&[3, 0])), ESUCCESS);
    assert_eq!(harness.bytes_at(0, 1), [0]);
    assert_eq!(harness.u32_at(4), "the_host_directory".len() as u32);

    assert_eq!(
        harness.call("fd_prestat_dir_name", &i32s(&[3, 64, 18])),
        ESUCCESS
    );
    assert_eq!(harness.bytes_at(64, 18), b"the_host_directory");
    assert_eq!(
        harness.call("fd_prestat_dir_name", &i32s(&[3, 64, 5])),
        ENAMETOOLONG
    );

    // Only one directory is mapped.
    assert_eq!(harness.call("fd_prestat_get", &i32s(&[4, 0])), EBADF);
}

#[test]
fn files_are_created_inside_the_mapped_directory() {
    let dir = tempfile::tempdir().unwrap();
    let env = StateBuilder::new("prog")
        .map_directory("sandbox", dir.path())
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    let (errno, fd) = harness.open("out.txt", OFLAGS_CREAT, RIGHTS_FD_WRITE);
    assert_eq!(errno, ESUCCESS);
    assert_eq!(fd, 4);

    assert_eq!(harness.write(fd, b"data"), ESUCCESS);
    assert_eq!(harness.u32_at(600), 4);
    assert_eq!(harness.call("fd_close", &i32s(&[fd as i32])), ESUCCESS);
    assert_eq!(harness.call("fd_close", &i32s(&[fd as i32])), EBADF);

    let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(written, "data");

    assert_eq!(harness.unlink("out.txt"), ESUCCESS);
    assert!(!dir.path().join("out.txt").exists());
}

#[test]
fn append_flag_moves_writes_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let env = StateBuilder::new("prog")
        .map_directory("sandbox", dir.path())
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    let (errno, fd) = harness.open("log.txt", OFLAGS_CREAT, RIGHTS_FD_WRITE);
    assert_eq!(errno, ESUCCESS);
    assert_eq!(harness.write(fd, b"abc"), ESUCCESS);

    let rewind = [
        Value::I32(fd as i32),
        Value::I64(0),
        Value::I32(WHENCE_SET),
        Value::I32(64),
    ];
    assert_eq!(harness.call("fd_seek", &rewind), ESUCCESS);
    assert_eq!(
        harness.call("fd_fdstat_set_flags", &i32s(&[fd as i32, FDFLAGS_APPEND])),
        ESUCCESS
    );
    assert_eq!(harness.write(fd, b"de"), ESUCCESS);
    assert_eq!(harness.call("fd_close", &i32s(&[fd as i32])), ESUCCESS);

    let written = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
    assert_eq!(written, "abcde");
}

#[test]
fn paths_cannot_escape_the_mapped_directory() {
    let parent = tempfile::tempdir().unwrap();
    let sandbox = parent.path().join("sandbox");
    std::fs::create_dir(&sandbox).unwrap();
    std::fs::write(parent.path().join("secret.txt"), "secret").unwrap();

    let env = StateBuilder::new("prog")
        .map_directory("sandbox", &sandbox)
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    // The errno depends on how the platform reports the escape.
    let (errno, _) = harness.open("../secret.txt", 0, RIGHTS_FD_READ);
    assert_ne!(errno, ESUCCESS);
    let (errno, _) = harness.open("/etc/passwd", 0, RIGHTS_FD_READ);
    assert_ne!(errno, ESUCCESS);
    let (errno, _) = harness.open("a/../../secret.txt", OFLAGS_CREAT, RIGHTS_FD_WRITE);
    assert_ne!(errno, ESUCCESS);
    assert!(!parent.path().join("a").exists());
}

#[cfg(unix)]
#[test]
fn symlinks_cannot_escape_the_mapped_directory() {
    let parent = tempfile::tempdir().unwrap();
    let sandbox = parent.path().join("sandbox");
    std::fs::create_dir(&sandbox).unwrap();
    std::fs::write(parent.path().join("secret.txt"), "secret").unwrap();
    std::os::unix::fs::symlink(parent.path(), sandbox.join("up")).unwrap();

    let env = StateBuilder::new("prog")
        .map_directory("sandbox", &sandbox)
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    let (errno, _) = harness.open_with(LOOKUP_SYMLINK_FOLLOW, "up/secret.txt", 0, RIGHTS_FD_READ);
    assert_ne!(errno, ESUCCESS);
}

#[cfg(unix)]
#[test]
fn dangling_symlinks_cannot_create_files_outside() {
    let parent = tempfile::tempdir().unwrap();
    let sandbox = parent.path().join("sandbox");
    std::fs::create_dir(&sandbox).unwrap();
    std::os::unix::fs::symlink("../outside.txt", sandbox.join("evil")).unwrap();

    let env = StateBuilder::new("prog")
        .map_directory("sandbox", &sandbox)
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    for lookup in [0, LOOKUP_SYMLINK_FOLLOW] {
        let (errno, _) = harness.open_with(lookup, "evil", OFLAGS_CREAT, RIGHTS_FD_WRITE);
        assert_ne!(errno, ESUCCESS, "lookup flags {lookup}");
    }
    assert!(!parent.path().join("outside.txt").exists());
}

#[cfg(unix)]
#[test]
fn unlinking_a_symlink_removes_the_link_only() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("real.txt"), "keep me").unwrap();
    std::os::unix::fs::symlink("real.txt", dir.path().join("link")).unwrap();

    let env = StateBuilder::new("prog")
        .map_directory("sandbox", dir.path())
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    assert_eq!(harness.unlink("link"), ESUCCESS);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("real.txt")).unwrap(),
        "keep me"
    );
    assert!(std::fs::symlink_metadata(dir.path().join("link")).is_err());
}

#[test]
fn stdin_reads_from_the_configured_source() {
    let env = StateBuilder::new("prog")
        .stdin(InputSource::bytes("abc"))
        .finalize()
        .unwrap();
    let harness = Harness::new(&env, Version::Latest);

    harness.put(0, &100u32.to_le_bytes());
    harness.put(4, &16u32.to_le_bytes());
    assert_eq!(harness.call("fd_read", &i32s(&[0, 0, 1, 200])), ESUCCESS);
    assert_eq!(harness.u32_at(200), 3);
    assert_eq!(harness.bytes_at(100, 3), b"abc");

    assert_eq!(harness.call("fd_read", &i32s(&[0, 0, 1, 200])), ESUCCESS);
    assert_eq!(harness.u32_at(200), 0);
}

#[test]
fn seek_origins_follow_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("digits"), "0123456789").unwrap();
    let env = StateBuilder::new("prog")
        .map_directory("data", dir.path())
        .finalize()
        .unwrap();

    // (snapshot, whence value meaning "from the end")
    for (version, end) in [(Version::Snapshot0, 1), (Version::Snapshot1, 2)] {
        let harness = Harness::new(&env, version);
        let (errno, fd) = harness.open("digits", 0, RIGHTS_FD_READ);
        assert_eq!(errno, ESUCCESS, "{version}");

        let errno = harness.call(
            "fd_seek",
            &[Value::I32(fd as i32), Value::I64(-2), Value::I32(end), Value::I32(64)],
        );
        assert_eq!(errno, ESUCCESS, "{version}");
        let position = harness.memory().uint32_view(64).get(0).unwrap();
        assert_eq!(position, 8, "{version}");
    }
}

#[test]
fn clocks_and_random() {
    let env = StateBuilder::new("prog").finalize().unwrap();
    let harness = Harness::new(&env, Version::Latest);

    let errno = harness.call(
        "clock_time_get",
        &[Value::I32(0), Value::I64(1), Value::I32(0)],
    );
    assert_eq!(errno, ESUCCESS);
    let nanos = u64::from_le_bytes(harness.bytes_at(0, 8).try_into().unwrap());
    assert!(nanos > 0);

    assert_eq!(harness.call("random_get", &i32s(&[64, 32])), ESUCCESS);
    assert!(harness.bytes_at(64, 32).iter().any(|b| *b != 0));
}

#[test]
fn proc_exit_reports_the_exit_code() {
    let env = StateBuilder::new("prog").finalize().unwrap();
    let harness = Harness::new(&env, Version::Latest);

    let err = harness
        .instance
        .exports()
        .invoke("proc_exit", &[Value::I32(3)])
        .unwrap_err();
    assert!(matches!(err, Error::Call(CallError::Exit { code: 3 })));
}

#[test]
fn proc_exit_from_start_function_fails_instantiation() {
    let store = Store::new();
    let module = Module::new(
        &store,
        r#"
        (module
            (import "wasi_snapshot_preview1" "proc_exit" (func $exit (param i32)))
            (memory (export "memory") 1)
            (func $start (call $exit (i32.const 7)))
            (start $start)
        )
        "#,
    )
    .unwrap();
    let env = StateBuilder::new("prog").finalize().unwrap();
    let imports = env.generate_import_object(&store, Version::Latest).unwrap();

    let err = Instance::new(&module, Some(&imports)).err().unwrap();
    match err {
        InstantiationError::Trap { message } => {
            assert!(message.contains("exited with code 7"), "{message}")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn import_object_is_tied_to_the_store_engine() {
    let wat = r#"(module
        (import "wasi_snapshot_preview1" "sched_yield" (func (result i32)))
        (memory (export "memory") 1))"#;
    let env = StateBuilder::new("prog").finalize().unwrap();

    let generating = Store::new();
    let imports = env
        .generate_import_object(&generating, Version::Latest)
        .unwrap();

    let other = Store::new();
    let module = Module::new(&other, wat).unwrap();
    match Instance::new(&module, Some(&imports)).err().unwrap() {
        InstantiationError::Link(LinkError::EngineMismatch { module }) => {
            assert_eq!(module, "wasi_snapshot_preview1")
        }
        other => panic!("unexpected error: {other}"),
    }

    let module = Module::new(&generating, wat).unwrap();
    assert!(Instance::new(&module, Some(&imports)).is_ok());
}

#[test]
fn generated_functions_are_checked_against_the_import_signature() {
    let store = Store::new();
    let env = StateBuilder::new("prog").finalize().unwrap();
    let imports = env.generate_import_object(&store, Version::Latest).unwrap();

    let module = Module::new(
        &store,
        r#"(module (import "wasi_snapshot_preview1" "sched_yield" (func (param i32) (result i32))))"#,
    )
    .unwrap();
    assert!(matches!(
        Instance::new(&module, Some(&imports)).err().unwrap(),
        InstantiationError::Link(LinkError::SignatureMismatch { .. })
    ));

    let module = Module::new(
        &store,
        r#"(module (import "wasi_snapshot_preview1" "no_such_call" (func)))"#,
    )
    .unwrap();
    assert!(matches!(
        Instance::new(&module, Some(&imports)).err().unwrap(),
        InstantiationError::Link(LinkError::MissingField { .. })
    ));
}

#[test]
fn generated_namespace_is_exempt_from_strict_mode() {
    let store = Store::new();
    let module = Module::new(
        &store,
        r#"(module
            (import "wasi_snapshot_preview1" "sched_yield" (func (result i32)))
            (memory (export "memory") 1))"#,
    )
    .unwrap();
    let env = StateBuilder::new("prog").finalize().unwrap();
    let mut imports = env.generate_import_object(&store, Version::Latest).unwrap();
    imports.set_strict(true);

    assert!(Instance::new(&module, Some(&imports)).is_ok());
}
