use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

fn open_archive(jar_path: &Path) -> Result<(File, Mmap)> {
    let file =
        File::open(jar_path).with_context(|| format!("Failed to open jar: {}", jar_path.display()))?;
    // SAFETY: the map is read-only and dropped before this process writes to the jar.
    let mmap = unsafe {
        Mmap::map(&file).with_context(|| format!("Failed to mmap jar: {}", jar_path.display()))?
    };
    Ok((file, mmap))
}

pub fn jar_contains_entry(jar_path: &Path, entry: &str) -> Result<bool> {
    let (_file, mmap) = open_archive(jar_path)?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", jar_path.display()))?;
    Ok(archive.by_name(entry).is_ok())
}

/// The bytes of `entry`, or `None` when the archive has no such entry.
pub fn read_entry(jar_path: &Path, entry: &str) -> Result<Option<Vec<u8>>> {
    let (_file, mmap) = open_archive(jar_path)?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", jar_path.display()))?;

    let mut file = match archive.by_name(entry) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read {entry} from {}", jar_path.display()));
        }
    };
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {entry} from {}", jar_path.display()))?;
    Ok(Some(buf))
}
