//==============================================
// File: tests/imports.rs
//==============================================
// Author: AML Contributors
// License: MIT
// Goal: Script-module imports
// Objective: Search-path resolution, aliasing, caching, and nested module
//            trees on real temporary directories
//==============================================

mod util;

use aml::runtime::AmlRuntime;
use std::fs;
use std::path::Path;
use util::{number, rendered};

fn write_module(dir: &Path, relative: &str, source: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn runtime_with_root(dir: &Path) -> AmlRuntime {
    let runtime = AmlRuntime::new();
    runtime.add_search_path(dir);
    runtime
}

#[test]
fn unaliased_imports_merge_into_scope() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(
        dir.path(),
        "geometry.aml",
        "var pi = 3.14159\nfunc area(r) { return pi * r * r }",
    );

    let runtime = runtime_with_root(dir.path());
    runtime
        .run_source("import_aml { geometry }\nvar a = area(2)", "<test>")
        .expect("run");
    assert!((number(&runtime, "a") - 12.56636).abs() < 1e-6);
}

#[test]
fn aliased_imports_bind_a_namespace() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(dir.path(), "geometry.aml", "var pi = 3.14159");

    let runtime = runtime_with_root(dir.path());
    runtime
        .run_source(
            "import_aml { geometry as geo }\nvar p = geo.pi",
            "<test>",
        )
        .expect("run");
    assert!((number(&runtime, "p") - 3.14159).abs() < 1e-9);
    // The bare module names are not bound.
    assert!(runtime.get_variable("pi").is_err());
}

#[test]
fn dotted_names_resolve_nested_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(dir.path(), "lib/strings.aml", "func shout(s) { return s + \"!\" }");

    let runtime = runtime_with_root(dir.path());
    runtime
        .run_source(
            "import_aml { lib.strings as strings }\nvar s = strings.shout(\"hey\")",
            "<test>",
        )
        .expect("run");
    assert_eq!(rendered(&runtime, "s"), "hey!");
}

#[test]
fn modules_import_their_siblings() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(dir.path(), "pkg/base.aml", "var base_value = 7");
    write_module(
        dir.path(),
        "pkg/derived.aml",
        "import_aml { base }\nvar derived_value = base_value + 1",
    );

    let runtime = runtime_with_root(dir.path());
    runtime
        .run_source(
            "import_aml { pkg.derived as d }\nvar v = d.derived_value",
            "<test>",
        )
        .expect("run");
    assert_eq!(number(&runtime, "v"), 8.0);
}

#[test]
fn repeated_imports_share_one_module_instance() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(dir.path(), "state.aml", "var registry = []");

    let runtime = runtime_with_root(dir.path());
    // Same module imported plainly and under an alias: both names must
    // address the same list, because the module executed once.
    runtime
        .run_source(
            "import_aml { state }\nimport_aml { state as st }\npush(registry, 1)\nvar seen = len(st.registry)",
            "<test>",
        )
        .expect("run");
    assert_eq!(number(&runtime, "seen"), 1.0);
}

#[test]
fn missing_module_reports_resolution_error() {
    let runtime = AmlRuntime::new();
    let err = runtime
        .run_source("import_aml { does_not_exist_anywhere }", "<test>")
        .unwrap_err();
    assert_eq!(err.code_str(), "E002");
    assert!(err.to_string().contains("does_not_exist_anywhere"));
}

#[test]
fn cyclic_imports_fail_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(dir.path(), "ouro.aml", "import_aml { boros }\nvar a = 1");
    write_module(dir.path(), "boros.aml", "import_aml { ouro }\nvar b = 2");

    let runtime = runtime_with_root(dir.path());
    let err = runtime
        .run_source("import_aml { ouro }", "<test>")
        .unwrap_err();
    assert!(err.to_string().contains("cyclic"), "got: {err}");
}

#[test]
fn module_syntax_errors_name_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_module(dir.path(), "broken.aml", "func {");

    let runtime = runtime_with_root(dir.path());
    let err = runtime
        .run_source("import_aml { broken }", "<test>")
        .unwrap_err();
    assert!(err.to_string().contains("broken.aml"), "got: {err}");
}
