//! Integration tests for the complete J5 build pipeline
//!
//! These tests drive repositories on disk through every crate:
//! - `j5.yaml` → DirectorySource → PackageSet
//! - J5 source → descriptors → linked descriptor sets
//! - Multi-package ordering, cycle detection and lint
//!
//! Run with: cargo test --test integration_tests

use j5_protobuild::{
    BuildError, DescriptorSetDependencies, DirectorySource, PackageSet, RepoConfig,
};
use prost::Message;
use prost_types::{DescriptorProto, FileDescriptorProto, FileDescriptorSet};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn open(root: &Path) -> PackageSet {
    let config = RepoConfig::load(root).unwrap();
    let mut set = PackageSet::new(Box::new(DirectorySource::from_config(root, &config)));
    for dep in &config.dependencies {
        let deps = DescriptorSetDependencies::load(&root.join(&dep.descriptor_set)).unwrap();
        set = set.with_dependencies(Box::new(deps));
    }
    set
}

/// One object per package, with a property referencing each `refs` package.
fn object_source(name: &str, refs: &[&str]) -> String {
    let imports: Vec<String> = refs
        .iter()
        .map(|p| format!(r#"{{"package": "{p}.v1"}}"#))
        .collect();
    let properties: Vec<String> = refs
        .iter()
        .map(|p| {
            let schema = p.to_uppercase();
            format!(
                r#"{{"name": "{p}", "schema": {{"type": "object", "schema": {{"ref": {{"package": "{p}", "schema": "{schema}"}}}}}}}}"#
            )
        })
        .collect();
    format!(
        r#"{{"imports": [{}], "elements": [
            {{"element": "object", "name": "{name}", "properties": [{}]}}
        ]}}"#,
        imports.join(", "),
        properties.join(", ")
    )
}

/// Writes `j5.yaml` and one source per `(package, refs)` entry.
fn repo(root: &Path, packages: &[(&str, &[&str])]) {
    let mut config = String::from("version: 1\npackages:\n");
    for (name, refs) in packages {
        config.push_str(&format!("  - name: {name}.v1\n"));
        write(
            root,
            &format!("{name}/v1/{name}.j5s"),
            &object_source(&name.to_uppercase(), refs),
        );
    }
    write(root, "j5.yaml", &config);
}

// ============================================================================
// Build ordering
// ============================================================================

#[test]
fn test_build_order_is_dependencies_first() {
    let dir = tempdir().unwrap();
    repo(
        dir.path(),
        &[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"]), ("d", &[])],
    );
    let mut set = open(dir.path());

    let order = set.build_order(&["a.v1".to_string()]).unwrap();
    assert_eq!(order.len(), 4);
    let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
    assert!(pos("d.v1") < pos("b.v1"));
    assert!(pos("d.v1") < pos("c.v1"));
    assert!(pos("b.v1") < pos("a.v1"));
    assert!(pos("c.v1") < pos("a.v1"));

    let built = set.build_packages(&["a.v1".to_string()]).unwrap();
    let names: Vec<&str> = built.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, order.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn test_unrelated_packages_are_not_built() {
    let dir = tempdir().unwrap();
    repo(dir.path(), &[("a", &["b"]), ("b", &[]), ("z", &[])]);
    let mut set = open(dir.path());

    let built = set.build_packages(&["a.v1".to_string()]).unwrap();
    let names: Vec<&str> = built.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["b.v1", "a.v1"]);
    assert!(set.package_state("z.v1").is_none());
}

// ============================================================================
// Cycle detection
// ============================================================================

#[test]
fn test_cycle_is_reported_from_every_entry_point() {
    let dir = tempdir().unwrap();
    repo(dir.path(), &[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);

    let rotations = [
        ["a.v1", "b.v1", "c.v1"],
        ["b.v1", "c.v1", "a.v1"],
        ["c.v1", "a.v1", "b.v1"],
    ];
    for chain in rotations {
        let start = chain[0];

        let mut set = open(dir.path());
        match set.compile_package(start) {
            Err(BuildError::CircularDependency(err)) => {
                assert_eq!(err.chain, chain);
                assert_eq!(err.dependency, start);
            }
            other => panic!("expected a circular dependency from {start}, got {other:?}"),
        }

        let mut set = open(dir.path());
        match set.build_packages(&[start.to_string()]) {
            Err(BuildError::CircularDependency(err)) => {
                assert_eq!(err.chain, chain);
                assert!(err.to_string().starts_with("circular dependency: "));
            }
            other => panic!("expected a circular dependency from {start}, got {other:?}"),
        }
    }
}

// ============================================================================
// Lint
// ============================================================================

#[test]
fn test_lint_flags_an_unused_file_import() {
    let dir = tempdir().unwrap();
    write(dir.path(), "j5.yaml", "packages:\n  - name: foo.v1\n");
    write(
        dir.path(),
        "foo/v1/foo.j5s",
        r#"{
    "imports": [
        {"path": "j5/messaging/v1/annotations.proto",
         "span": {"start": {"line": 2, "column": 8}, "end": {"line": 2, "column": 43}}}
    ],
    "elements": [
        {"element": "object", "name": "Foo", "properties": [
            {"name": "id", "schema": {"type": "string"}}
        ]}
    ]
}"#,
    );
    let mut set = open(dir.path());

    let report = set.lint_package("foo.v1").unwrap();
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.warning_count(), 1);

    let warning = report.files[0].diagnostics.iter().next().unwrap();
    assert!(warning.is_warning());
    assert!(warning.to_string().contains("not used"));
    let position = warning.position.as_ref().unwrap();
    assert_eq!(position.filename, "foo/v1/foo.j5s");
    assert_eq!(position.start.line, 2);

    let rendered = report.human_string(0);
    assert!(rendered.starts_with("foo/v1/foo.j5s:3:9: warning:"), "{rendered}");

    // Unused imports never fail a build.
    assert!(set.compile_package("foo.v1").is_ok());
}

// ============================================================================
// End to end
// ============================================================================

const ENTITY: &str = r#"{
    "elements": [
        {
            "element": "entity",
            "name": "Order",
            "base_url_path": "/shop/v1/order",
            "keys": [
                {"name": "orderId", "required": true, "entity_key": {"primary": true},
                 "schema": {"type": "key", "format": {"kind": "uuid"}}}
            ],
            "data": [
                {"name": "total", "schema": {"type": "decimal"}},
                {"name": "placedAt", "schema": {"type": "timestamp"}},
                {"name": "customer", "schema": {"type": "object", "schema": {"ref": {"package": "crm", "schema": "Customer"}}}}
            ],
            "status": [{"name": "OPEN"}, {"name": "SHIPPED"}],
            "events": [
                {"name": "Placed", "properties": [
                    {"name": "total", "schema": {"type": "decimal"}}
                ]},
                {"name": "Shipped", "properties": []}
            ]
        }
    ],
    "imports": [{"package": "crm.v1"}]
}"#;

#[test]
fn test_entity_repository_builds_a_self_contained_descriptor_set() {
    let dir = tempdir().unwrap();
    let crm = FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("crm/v1/customer.proto".into()),
            package: Some("crm.v1".into()),
            syntax: Some("proto3".into()),
            message_type: vec![DescriptorProto {
                name: Some("Customer".into()),
                ..Default::default()
            }],
            ..Default::default()
        }],
    };
    fs::write(dir.path().join("crm.binpb"), crm.encode_to_vec()).unwrap();
    write(
        dir.path(),
        "j5.yaml",
        "version: 1\npackages:\n  - name: shop.v1\n    label: Shop\ndependencies:\n  - descriptor_set: crm.binpb\n",
    );
    write(dir.path(), "shop/v1/order.j5s", ENTITY);
    write(dir.path(), "shop/v1/README.md", "# Shop\n");

    let mut set = open(dir.path());
    let built = set.build_packages(&["shop.v1".to_string()]).unwrap();
    assert_eq!(built.len(), 1);
    let shop = &built[0];
    assert_eq!(shop.prose.len(), 1);
    assert_eq!(shop.proto.len(), 3);

    let image = set.descriptor_set_with_imports(&built);
    let mut seen = BTreeSet::new();
    for file in &image.file {
        for dep in &file.dependency {
            assert!(
                seen.contains(dep),
                "{} listed before its import {dep}",
                file.name()
            );
        }
        assert!(seen.insert(file.name().to_string()), "{} listed twice", file.name());
    }
    for name in [
        "crm/v1/customer.proto",
        "google/protobuf/timestamp.proto",
        "j5/types/decimal/v1/decimal.proto",
        "shop/v1/order.j5s.proto",
        "shop/v1/service/order.p.j5s.proto",
        "shop/v1/topic/order.p.j5s.proto",
    ] {
        assert!(seen.contains(name), "missing {name}");
    }

    // Decodes back as a whole.
    let decoded = FileDescriptorSet::decode(image.encode_to_vec().as_slice()).unwrap();
    assert_eq!(decoded, image);
}
