//! # maven-inspector
//!
//! Search and inspect the classes a Maven project depends on.
//!
//! ## Architecture
//!
//! - **classfile**: constant-pool reader recovering class and method names
//! - **hash**: content hashes used to validate cached jar indexes
//! - **persist**: JSON stores with cross-process locking and atomic replace
//! - **jar_index**: per-jar class index, rebuilt when the jar's hash changes
//! - **maven**: dependency resolver and local repository collaborators
//! - **deps**: descriptor to jar list cache, keyed on descriptor mtime
//! - **search**: bounded parallel class and method-name search
//! - **scan**: jar discovery and Maven path conventions
//! - **probe**: jar entry lookups
//! - **source**: ordered providers recovering source text (sources jar, CFR, javap)
//! - **cache**: LMDB store for decompiled sources
//! - **cfr** / **javap**: external tool adapters
//! - **structure**: tree-sitter extraction of fields and methods
//! - **signature**: normalized method definitions
//! - **detail**: class detail model and extractor
//! - **inspector**: composition root exposing the caller-facing operations

pub mod cache;
pub mod cfr;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod deps;
pub mod detail;
pub mod error;
pub mod hash;
pub mod inspector;
pub mod jar_index;
pub mod javap;
pub mod maven;
pub mod persist;
pub mod probe;
pub mod scan;
pub mod search;
pub mod signature;
pub mod source;
pub mod structure;

#[cfg(test)]
mod testutil;
