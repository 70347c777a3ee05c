#![allow(dead_code)]

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "maven_inspector_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

pub fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    use std::io::Write;
    use zip::write::FileOptions;

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

/// Minimal class file: `internal_name` extends Object and declares `methods`.
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
    for m in methods {
        utf8(&mut pool, m); // 6..
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 52]);
    out.extend_from_slice(&(6 + methods.len() as u16).to_be_bytes());
    out.extend_from_slice(&pool);
    out.extend_from_slice(&[0x00, 0x21, 0, 2, 0, 4, 0, 0, 0, 0]);
    out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
    for i in 0..methods.len() as u16 {
        out.extend_from_slice(&[0, 1]);
        out.extend_from_slice(&(6 + i).to_be_bytes());
        out.extend_from_slice(&[0, 5, 0, 0]);
    }
    out.extend_from_slice(&[0, 0]);
    out
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

pub fn run(args: &[&str]) -> anyhow::Result<Output> {
    let out = Command::new(env!("CARGO_BIN_EXE_maven-inspector"))
        .args(args)
        .env_remove("MAVEN_INSPECTOR_HOME")
        .env_remove("MAVEN_INSPECTOR_LOCAL_REPO")
        .env_remove("MAVEN_INSPECTOR_MVN")
        .env_remove("CFR_JAR")
        .output()?;
    Ok(out)
}

pub fn run_json(args: &[&str]) -> anyhow::Result<Value> {
    let out = run(args)?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}
