use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const JAVA_ENV: &str = "MAVEN_INSPECTOR_JAVA";

pub fn default_java() -> PathBuf {
    std::env::var_os(JAVA_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("java"))
}

fn java_command(java_bin: &Path, args: &[&str]) -> Result<std::process::Output> {
    #[cfg(windows)]
    {
        let lower = java_bin.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".cmd") || lower.ends_with(".bat") {
            return Command::new("cmd")
                .arg("/C")
                .arg(java_bin)
                .args(args)
                .output()
                .context("Failed to execute java (ensure JRE/JDK is installed)");
        }
    }

    Command::new(java_bin)
        .args(args)
        .output()
        .context("Failed to execute java (ensure JRE/JDK is installed)")
}

#[derive(Debug, Clone)]
pub struct Cfr {
    cfr_jar: PathBuf,
    java_bin: PathBuf,
}

impl Cfr {
    pub fn new(cfr_jar: PathBuf) -> Self {
        Self {
            cfr_jar,
            java_bin: default_java(),
        }
    }

    pub fn with_java(mut self, java_bin: PathBuf) -> Self {
        self.java_bin = java_bin;
        self
    }

    pub fn decompile_class_file(&self, class_file: &Path, output_dir: &Path) -> Result<Option<PathBuf>> {
        let output = java_command(
            &self.java_bin,
            &[
                "-jar",
                self.cfr_jar
                    .to_str()
                    .context("cfr.jar path is not valid UTF-8")?,
                class_file.to_str().context("class file path is not valid UTF-8")?,
                "--outputdir",
                output_dir.to_str().context("output path is not valid UTF-8")?,
                "--silent",
                "true",
                "--comments",
                "false",
            ],
        )?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("CFR decompilation failed: {}", stderr.trim());
        }

        Ok(first_java_file(output_dir))
    }
}

fn first_java_file(dir: &Path) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|e| e == "java"))
        .collect();
    found.sort();
    found.into_iter().next()
}
