//! Integration tests for the compile invocation bridge.
//!
//! Tests validate:
//! - Source text lands at the heap base and the descriptor is decoded
//! - Capacity, failure, out-of-bounds and trap paths are reported
//! - Missing compiler exports fail loading
//! - Separate compilers never share output buffers

use ncc_host::{
    BridgeConfig, BridgeError, CaptureSink, Compiler, CompileResult, Loader,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const HEAP_BASE: u32 = 1024;

/// A compiler module whose entry point body is `body`.
///
/// `$off` and `$len` are the entry point parameters. The module imports
/// `puts` so compile-time diagnostics can be printed.
fn compiler_wat(body: &str, data: &str) -> Vec<u8> {
    wat::parse_str(format!(
        r#"
        (module
          (import "env" "puts" (func $puts (param i32 i32)))
          (memory (export "memory") 1)
          (global (export "__heap_base") i32 (i32.const {HEAP_BASE}))
          {data}
          (func (export "getWasmFromCpp") (param $off i32) (param $len i32) (result i32)
            {body}))
        "#
    ))
    .expect("valid wat")
}

/// Returns the source region itself as the artifact.
fn echo_compiler() -> Vec<u8> {
    compiler_wat(
        "(i32.or (i32.shl (local.get $off) (i32.const 16)) (local.get $len))",
        "",
    )
}

fn load(bytes: &[u8]) -> (Compiler, CaptureSink) {
    load_with(BridgeConfig::default(), bytes)
}

fn load_with(config: BridgeConfig, bytes: &[u8]) -> (Compiler, CaptureSink) {
    let sink = CaptureSink::new();
    let compiler = Compiler::with_config(config, bytes, sink.clone())
        .unwrap_or_else(|e| panic!("compiler failed to load: {e}"));
    (compiler, sink)
}

fn raw_config() -> BridgeConfig {
    BridgeConfig {
        preprocess: false,
        ..BridgeConfig::default()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Descriptor decoding
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn single_byte_artifact_from_address_zero() {
    let bytes = compiler_wat("(i32.const 0x00000001)", r#"(data (i32.const 0) "A")"#);
    let (mut compiler, _) = load(&bytes);
    let artifact = compiler.compile("A").unwrap();
    assert_eq!(artifact.bytes(), &[0x41]);
}

#[test]
fn artifact_location_matches_descriptor() {
    let bytes = compiler_wat(
        "(i32.const 0x00100020)",
        r#"(data (i32.const 16) "0123456789abcdef0123456789ABCDEF")"#,
    );
    let (mut compiler, _) = load(&bytes);
    let artifact = compiler.compile("x").unwrap();
    assert_eq!(artifact.location().range.offset, 16);
    assert_eq!(artifact.len(), 32);
    assert_eq!(artifact.bytes(), b"0123456789abcdef0123456789ABCDEF");
}

#[test]
fn source_is_written_at_heap_base() {
    let (mut compiler, _) = load_with(raw_config(), &echo_compiler());
    assert_eq!(compiler.heap_base(), HEAP_BASE);
    let artifact = compiler.compile("int main() { return 0; }").unwrap();
    assert_eq!(artifact.location().range.offset, HEAP_BASE);
    assert_eq!(artifact.bytes(), b"int main() { return 0; }");
}

#[test]
fn multibyte_source_is_utf8_encoded() {
    let (mut compiler, _) = load_with(raw_config(), &echo_compiler());
    let bytes = compiler.compile_to_vec("π≈3").unwrap();
    assert_eq!(bytes, "π≈3".as_bytes());
}

#[test]
fn zero_descriptor_is_an_empty_artifact() {
    let (mut compiler, _) = load(&compiler_wat("(i32.const 0)", ""));
    let artifact = compiler.compile("anything").unwrap();
    assert!(artifact.is_empty());
}

#[test]
fn source_is_preprocessed_by_default() {
    let (mut compiler, _) = load(&echo_compiler());
    let bytes = compiler
        .compile_to_vec("#define X 1\nint a; // note\n")
        .unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), "\nint a; \n");
}

#[test]
fn wider_length_field_is_honoured() {
    let config = BridgeConfig {
        length_bits: 20,
        ..raw_config()
    };
    let bytes = compiler_wat(
        "(i32.or (i32.shl (local.get $off) (i32.const 20)) (local.get $len))",
        "",
    );
    let (mut compiler, _) = load_with(config, &bytes);
    assert_eq!(compiler.compile_to_vec("wide").unwrap(), b"wide");
}

// ══════════════════════════════════════════════════════════════════════════════
// Failure paths
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn oversized_source_is_a_capacity_error() {
    let (mut compiler, _) = load_with(raw_config(), &echo_compiler());
    let available = compiler.available();
    assert_eq!(available, 65536 - HEAP_BASE as usize);

    let source = "a".repeat(available + 1);
    match compiler.compile(&source) {
        Err(BridgeError::Capacity { needed, available: a }) => {
            assert_eq!(needed, available + 1);
            assert_eq!(a, available);
        }
        other => panic!("expected capacity error, got {other:?}"),
    }
}

#[test]
fn source_filling_the_heap_exactly_fits() {
    let bytes = compiler_wat("(i32.const 0)", "");
    let (mut compiler, _) = load_with(raw_config(), &bytes);
    let source = "a".repeat(compiler.available());
    assert!(compiler.compile(&source).is_ok());
}

#[test]
fn failure_address_carries_the_diagnostic() {
    // The diagnostic is whatever sits at the heap base: here, the source.
    let bytes = compiler_wat(
        "(i32.or (i32.const 0xFFFF0000) (local.get $len))",
        "",
    );
    let (mut compiler, _) = load_with(raw_config(), &bytes);
    match compiler.compile("syntax error at 1:1") {
        Err(BridgeError::CompilerFailed(message)) => {
            assert_eq!(message, "syntax error at 1:1")
        }
        other => panic!("expected compiler failure, got {other:?}"),
    }
}

#[test]
fn descriptor_past_memory_end_is_rejected() {
    let bytes = compiler_wat("(i32.const 0xFFFE0010)", "");
    let (mut compiler, _) = load(&bytes);
    match compiler.compile("x") {
        Err(BridgeError::ArtifactOutOfBounds {
            address,
            len,
            memory_size,
        }) => {
            assert_eq!((address, len, memory_size), (0xFFFE, 16, 65536));
        }
        other => panic!("expected out-of-bounds artifact, got {other:?}"),
    }
}

#[test]
fn compiler_trap_is_reported() {
    let bytes = compiler_wat("unreachable", "");
    let (mut compiler, _) = load(&bytes);
    assert!(matches!(compiler.compile("x"), Err(BridgeError::Trap(_))));
}

#[test]
fn compile_result_reports_both_outcomes() {
    let (mut compiler, _) = load_with(raw_config(), &echo_compiler());
    let ok: CompileResult = compiler.compile_to_result("abc");
    assert!(ok.success);
    assert_eq!(ok.wasm.as_deref(), Some(&b"abc"[..]));
    assert_eq!(
        ok.sha256.as_deref(),
        Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );

    let big = "a".repeat(compiler.available() + 1);
    let err = compiler.compile_to_result(&big);
    assert!(!err.success);
    assert!(err.wasm.is_none());
    assert!(err.error.unwrap().contains("heap base"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Loading
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn missing_heap_base_fails_loading() {
    let bytes = wat::parse_str(
        r#"(module
             (memory (export "memory") 1)
             (func (export "getWasmFromCpp") (param i32 i32) (result i32) (i32.const 0)))"#,
    )
    .unwrap();
    let err = Compiler::with_config(BridgeConfig::default(), &bytes, CaptureSink::new())
        .unwrap_err();
    assert!(matches!(err, BridgeError::MissingExport(name) if name == "__heap_base"));
}

#[test]
fn missing_memory_fails_loading() {
    let bytes = wat::parse_str(
        r#"(module
             (global (export "__heap_base") i32 (i32.const 0))
             (func (export "getWasmFromCpp") (param i32 i32) (result i32) (i32.const 0)))"#,
    )
    .unwrap();
    let err = Compiler::with_config(BridgeConfig::default(), &bytes, CaptureSink::new())
        .unwrap_err();
    assert!(matches!(err, BridgeError::MissingExport(name) if name == "memory"));
}

#[test]
fn entry_point_with_wrong_signature_fails_loading() {
    let bytes = wat::parse_str(
        r#"(module
             (memory (export "memory") 1)
             (global (export "__heap_base") i32 (i32.const 0))
             (func (export "getWasmFromCpp") (param i32) (result i32) (i32.const 0)))"#,
    )
    .unwrap();
    let err = Compiler::with_config(BridgeConfig::default(), &bytes, CaptureSink::new())
        .unwrap_err();
    assert!(matches!(err, BridgeError::MissingExport(name) if name == "getWasmFromCpp"));
}

#[test]
fn custom_entry_point_name() {
    let bytes = wat::parse_str(
        r#"(module
             (memory (export "memory") 1)
             (global (export "__heap_base") i32 (i32.const 64))
             (data (i32.const 0) "C")
             (func (export "getWasmFromC") (param i32 i32) (result i32) (i32.const 1)))"#,
    )
    .unwrap();
    let config = BridgeConfig {
        entry_point: "getWasmFromC".to_string(),
        ..BridgeConfig::default()
    };
    let (mut compiler, _) = load_with(config, &bytes);
    assert_eq!(compiler.compile_to_vec("x").unwrap(), b"C");
}

#[test]
fn garbage_bytes_fail_validation() {
    let loader = Loader::new();
    let err = Compiler::load(&loader, b"not wasm", loader.import_table(CaptureSink::new()))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Validation(_)));
}

#[test]
fn load_file_reads_the_module() {
    let path = std::env::temp_dir().join(format!("ncc-host-{}.wasm", std::process::id()));
    std::fs::write(&path, echo_compiler()).unwrap();
    let loader = Loader::with_config(raw_config()).unwrap();
    let mut compiler =
        Compiler::load_file(&loader, &path, loader.import_table(CaptureSink::new())).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(compiler.compile_to_vec("file").unwrap(), b"file");
}

#[test]
fn missing_file_is_an_io_error() {
    let loader = Loader::new();
    let err = Compiler::load_file(
        &loader,
        "/nonexistent/ncc.wasm",
        loader.import_table(CaptureSink::new()),
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::Io(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Reuse & isolation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn sequential_compiles_reuse_the_heap() {
    let (mut compiler, _) = load_with(raw_config(), &echo_compiler());
    let first = compiler.compile_to_vec("first program").unwrap();
    let second = compiler.compile("second").unwrap();
    assert_eq!(second.bytes(), b"second");
    assert_eq!(first, b"first program");
}

/// Prints the source through `puts` without a newline, then echoes it.
fn chatty_compiler() -> Vec<u8> {
    compiler_wat(
        "(call $puts (local.get $off) (local.get $len))
         (i32.or (i32.shl (local.get $off) (i32.const 16)) (local.get $len))",
        "",
    )
}

#[test]
fn independent_compilers_do_not_share_output() {
    let (mut a, sink_a) = load_with(raw_config(), &chatty_compiler());
    let (mut b, sink_b) = load_with(raw_config(), &chatty_compiler());

    a.compile("from a").unwrap();
    b.compile("from b\n").unwrap();
    assert!(sink_a.chunks().is_empty());
    assert_eq!(sink_b.chunks(), vec!["from b\n"]);

    a.flush_output();
    assert_eq!(sink_a.chunks(), vec!["from a"]);
    assert_eq!(sink_b.text(), "from b\n");
}

#[test]
fn compiler_output_accumulates_across_compiles() {
    let (mut compiler, sink) = load_with(raw_config(), &chatty_compiler());
    compiler.compile("one ").unwrap();
    compiler.compile("two\n").unwrap();
    assert_eq!(sink.chunks(), vec!["one two\n"]);
}
