//! Shared helpers for CLI tests: a tiny class-file writer and project layout.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Encode a minimal class file, optionally carrying one runtime-visible
/// marker annotation (dotted type name, no elements).
pub fn class_bytes(fqn: &str, annotation: Option<&str>) -> Vec<u8> {
    let mut pool: Vec<u8> = Vec::new();
    let utf8 = |pool: &mut Vec<u8>, s: &str| {
        pool.push(1);
        pool.extend((s.len() as u16).to_be_bytes());
        pool.extend(s.as_bytes());
    };

    // 1: this name, 2: Class(1), 3: super name, 4: Class(3)
    utf8(&mut pool, &fqn.replace('.', "/"));
    pool.push(7);
    pool.extend(1u16.to_be_bytes());
    utf8(&mut pool, "java/lang/Object");
    pool.push(7);
    pool.extend(3u16.to_be_bytes());
    let mut count = 5u16;
    if let Some(dotted) = annotation {
        // 5: descriptor, 6: attribute name
        utf8(&mut pool, &format!("L{};", dotted.replace('.', "/")));
        utf8(&mut pool, "RuntimeVisibleAnnotations");
        count = 7;
    }

    let mut out = Vec::new();
    out.extend(0xCAFE_BABEu32.to_be_bytes());
    out.extend(0u16.to_be_bytes());
    out.extend(52u16.to_be_bytes());
    out.extend(count.to_be_bytes());
    out.extend(pool);
    out.extend(0x0021u16.to_be_bytes());
    out.extend(2u16.to_be_bytes());
    out.extend(4u16.to_be_bytes());
    out.extend(0u16.to_be_bytes()); // interfaces
    out.extend(0u16.to_be_bytes()); // fields
    out.extend(0u16.to_be_bytes()); // methods
    if annotation.is_some() {
        out.extend(1u16.to_be_bytes());
        out.extend(6u16.to_be_bytes());
        out.extend(6u32.to_be_bytes());
        out.extend(1u16.to_be_bytes()); // one annotation
        out.extend(5u16.to_be_bytes()); // type index
        out.extend(0u16.to_be_bytes()); // no pairs
    } else {
        out.extend(0u16.to_be_bytes());
    }
    out
}

/// Write `fqn` as a class file below `classes`.
pub fn write_class(classes: &Path, fqn: &str, annotation: Option<&str>) -> PathBuf {
    let path = classes.join(format!("{}.class", fqn.replace('.', "/")));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create package dirs");
    }
    fs::write(&path, class_bytes(fqn, annotation)).expect("write class file");
    path
}

pub const SERVICE_STRATEGIES: &str = r#"{
    "strategies": [
        {
            "name": "Services",
            "type": "NAME_SUFFIX",
            "config": { "suffix": "Service" },
            "containerMapping": "api"
        },
        {
            "name": "Repositories",
            "type": "ANNOTATION",
            "config": { "annotationType": "org.acme.Repository" },
            "containerMapping": "data"
        }
    ],
    "globalConfig": {
        "basePaths": { "api": "classes", "data": "classes" },
        "defaultTechnologies": { "data": "JPA" }
    }
}"#;

/// Project with `.archsnap/strategies.json` and a `classes/` tree.
pub fn project(root: &Path, strategies: &str) -> PathBuf {
    let settings = root.join(".archsnap");
    fs::create_dir_all(&settings).expect("create .archsnap");
    fs::write(settings.join("strategies.json"), strategies).expect("write strategies");
    let classes = root.join(".archsnap/classes");
    fs::create_dir_all(&classes).expect("create classes");
    classes
}
