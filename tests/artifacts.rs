//==============================================
// File: tests/artifacts.rs
//==============================================
// Author: AML Contributors
// License: MIT
// Goal: Compiled artifact lifecycle
// Objective: Compile, inspect, and execute .caml files through the runtime
//==============================================

mod util;

use aml::artifact;
use aml::runtime::{ARTIFACT_EXTENSION, AmlRuntime};
use std::fs;
use util::number;

const PIPELINE: &str = r#"
func transform(values) {
    return [v * 10 for v in values if v > 1]
}
var result = transform([1, 2, 3])
var total = result[0] + result[1]
"#;

#[test]
fn compiled_file_runs_like_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("pipeline.aml");
    fs::write(&source_path, PIPELINE).unwrap();

    let compiler = AmlRuntime::new();
    let bytes = compiler.compile_file(&source_path).expect("compile");
    let artifact_path = source_path.with_extension(ARTIFACT_EXTENSION);
    fs::write(&artifact_path, &bytes).unwrap();

    let from_source = AmlRuntime::new();
    from_source.run_file(&source_path).expect("run source");

    let from_artifact = AmlRuntime::new();
    from_artifact.run_file(&artifact_path).expect("run artifact");

    assert_eq!(number(&from_source, "total"), number(&from_artifact, "total"));
    assert_eq!(number(&from_artifact, "total"), 50.0);
}

#[test]
fn artifact_header_describes_the_source() {
    let compiler = AmlRuntime::new();
    let bytes = compiler.compile_source(PIPELINE, "pipeline.aml").unwrap();
    let decoded = artifact::decode(&bytes).expect("decode");
    assert_eq!(decoded.source_name, "pipeline.aml");
    assert_eq!(
        decoded.source_fingerprint,
        artifact::fingerprint(PIPELINE.as_bytes())
    );
    assert!(decoded.built_at > 0);
}

#[test]
fn corrupted_magic_is_rejected_with_artifact_code() {
    let compiler = AmlRuntime::new();
    let mut bytes = compiler.compile_source(PIPELINE, "pipeline.aml").unwrap();
    bytes[0] = b'X';

    let runtime = AmlRuntime::new();
    let err = runtime.run_artifact(&bytes).unwrap_err();
    assert_eq!(err.code_str(), "E006");
}

#[test]
fn truncated_payload_is_rejected() {
    let compiler = AmlRuntime::new();
    let bytes = compiler.compile_source(PIPELINE, "pipeline.aml").unwrap();

    let runtime = AmlRuntime::new();
    let err = runtime.run_artifact(&bytes[..6]).unwrap_err();
    assert_eq!(err.code_str(), "E006");
}

#[test]
fn artifacts_with_meta_entry_invoke_it() {
    let source = r#"
var ran = 0
meta { entry: "main" }
func main() {
    ran = ran + 1
}
"#;
    let compiler = AmlRuntime::new();
    let bytes = compiler.compile_source(source, "entry.aml").unwrap();

    let runtime = AmlRuntime::new();
    runtime.run_artifact(&bytes).expect("run");
    assert_eq!(number(&runtime, "ran"), 1.0);
}
