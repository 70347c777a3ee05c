//! Typed failures surfaced by the library.
//!
//! Resolution failures reach the caller verbatim. Class-file and archive
//! failures are absorbed by their callers and only show up in logs.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("descriptor not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("dependency resolution failed:\n{0}")]
    ResolutionFailed(String),

    #[error("resolver reported success but {} is missing:\n{output}", .path.display())]
    OutputMissing { path: PathBuf, output: String },

    #[error("failed to parse {}: {reason}", .path.display())]
    ParseFailed { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassParseError {
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("class file truncated")]
    Truncated,

    #[error("{tag} is not a known constant pool tag (slot {slot})")]
    UnknownTag { tag: u8, slot: u16 },

    #[error("this_class does not resolve to a name")]
    MissingClassName,
}

impl From<std::io::Error> for ClassParseError {
    fn from(_: std::io::Error) -> Self {
        ClassParseError::Truncated
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
