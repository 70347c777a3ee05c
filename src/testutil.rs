//! Fixtures shared by unit tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "maven_inspector_test_{}_{}_{}_{}",
        std::process::id(),
        nanos,
        n,
        name
    ))
}

/// Assembles a class file with the given internal name and methods.
///
/// The pool holds a long constant so the two-slot rule is exercised, plus
/// one field with an attribute so field skipping is exercised.
pub fn class_bytes(internal_name: &str, methods: &[&str]) -> Vec<u8> {
    fn utf8(out: &mut Vec<u8>, s: &str) {
        out.push(1);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    let mut pool = Vec::new();
    utf8(&mut pool, internal_name); // 1
    pool.extend_from_slice(&[7, 0, 1]); // 2
    utf8(&mut pool, "java/lang/Object"); // 3
    pool.extend_from_slice(&[7, 0, 3]); // 4
    utf8(&mut pool, "()V"); // 5
    pool.push(5); // 6 + 7
    pool.extend_from_slice(&42u64.to_be_bytes());
    utf8(&mut pool, "Code"); // 8
    for m in methods {
        utf8(&mut pool, m); // 9..
    }
    let count = 9 + methods.len() as u16;

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&52u16.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(&pool);
    out.extend_from_slice(&0x0021u16.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&[0, 2, 0, 5, 0, 5]);
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&8u16.to_be_bytes());
    out.extend_from_slice(&3u32.to_be_bytes());
    out.extend_from_slice(&[1, 2, 3]);

    out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
    for i in 0..methods.len() as u16 {
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&(9 + i).to_be_bytes());
        out.extend_from_slice(&5u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&8u16.to_be_bytes());
        out.extend_from_slice(&4u32.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
    }

    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

pub fn write_class_jar(path: &Path, classes: &[(&str, &[&str])]) -> anyhow::Result<()> {
    let built: Vec<(String, Vec<u8>)> = classes
        .iter()
        .map(|(name, methods)| (format!("{name}.class"), class_bytes(name, methods)))
        .collect();
    let entries: Vec<(&str, &[u8])> = built
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    write_jar(path, &entries)
}
