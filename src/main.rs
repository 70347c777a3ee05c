use anyhow::{Context, Result};
use clap::Parser;
use maven_inspector::cli::{Cli, Commands, OutputFormat};
use maven_inspector::config::{LOG_ENV, clear_stores, resolve_settings};
use maven_inspector::detail::ClassDetail;
use maven_inspector::inspector::Inspector;
use maven_inspector::scan::extract_version_from_maven_path;
use maven_inspector::search::SearchHit;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    if let Commands::Clear = cli.command {
        let removed = clear_stores(&settings.home)?;
        print_json(&ClearResult {
            home: settings.home.clone(),
            removed,
        })?;
        return Ok(());
    }

    let inspector = Inspector::open(&settings);

    match cli.command {
        Commands::Resolve { pom, refresh } => {
            let start = Instant::now();
            let jars = if refresh {
                inspector.refresh(&pom)?
            } else {
                inspector.resolve(&pom)?
            };
            print_json(&ResolveResult {
                descriptor: pom,
                duration_ms: start.elapsed().as_millis() as u64,
                jars,
            })?;
        }
        Commands::Classes { pom, pattern } => {
            let start = Instant::now();
            let hits = inspector.search_classes(&pom, &pattern)?;
            print_json(&SearchResult::new(pattern, hits, start))?;
        }
        Commands::Methods { pom, pattern } => {
            let start = Instant::now();
            let hits = inspector.search_methods(&pom, &pattern)?;
            print_json(&SearchResult::new(pattern, hits, start))?;
        }
        Commands::Inspect {
            jar_path,
            class_name,
            format,
            output,
        } => {
            let detail = inspector.inspect(&jar_path, &normalize_class_name(&class_name));
            write_detail_output(&detail, format, output.as_deref())?;
        }
        Commands::Show {
            class_name,
            format,
            output,
        } => {
            let detail = inspector.inspect_by_name(&normalize_class_name(&class_name));
            write_detail_output(&detail, format, output.as_deref())?;
        }
        Commands::Usage {
            class_name,
            definition,
        } => {
            let usage = inspector.find_method_usage(&normalize_class_name(&class_name), &definition);
            print_json(&usage)?;
        }
        Commands::Stats => {
            print_json(&inspector.stats())?;
        }
        Commands::Clear => {}
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn normalize_class_name(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("import") {
        s = rest.trim();
    }
    if let Some(rest) = s.strip_prefix("static ") {
        s = rest.trim();
    }
    if s.ends_with(';') {
        s = s.trim_end_matches(';').trim();
    }
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ResolveResult {
    descriptor: PathBuf,
    duration_ms: u64,
    jars: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    pattern: String,
    count: usize,
    duration_ms: u64,
    hits: Vec<SearchHit>,
}

impl SearchResult {
    fn new(pattern: String, hits: Vec<SearchHit>, start: Instant) -> Self {
        Self {
            pattern,
            count: hits.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            hits,
        }
    }
}

#[derive(Debug, Serialize)]
struct ClearResult {
    home: PathBuf,
    removed: Vec<PathBuf>,
}

fn write_detail_output(detail: &ClassDetail, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(detail)?,
        OutputFormat::Text => render_text(detail),
        OutputFormat::Code => match detail.raw_source.as_ref() {
            Some(source) => source.clone(),
            None => {
                let reason = detail
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "no source".to_string());
                anyhow::bail!("No source for {}: {reason}", detail.class_name);
            }
        },
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

fn render_text(detail: &ClassDetail) -> String {
    let mut out = String::new();
    out.push_str(&format!("class_name: {}\n", detail.class_name));
    if let Some(jar) = detail.jar_path.as_deref() {
        out.push_str(&format!("jar: {}\n", jar.display()));
        if let Some(version) = extract_version_from_maven_path(jar) {
            out.push_str(&format!("version: {version}\n"));
        }
    }
    if let Some(error) = detail.error.as_ref() {
        out.push_str(&format!("unavailable: {error}\n"));
        return out;
    }
    if let Some(origin) = detail.origin {
        out.push_str(&format!("origin: {origin:?}\n"));
    }
    out.push_str(&format!("declaration: {}\n", detail.declaration));
    out.push_str("fields:\n");
    for f in &detail.fields {
        out.push_str(&format!("  {f}\n"));
    }
    out.push_str("methods:\n");
    for m in &detail.methods {
        out.push_str(&format!("  {}  [{}]\n", m.signature, m.normalized_definition));
    }
    out
}
