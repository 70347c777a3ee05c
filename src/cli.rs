use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "maven-inspector")]
#[command(about = "Search and inspect the classes of a Maven project's dependencies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub m2: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub mvn: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub cfr: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub javap: Option<PathBuf>,

    #[arg(long)]
    pub no_javap: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Resolve {
        pom: PathBuf,

        #[arg(long)]
        refresh: bool,
    },
    Classes { pom: PathBuf, pattern: String },
    Methods { pom: PathBuf, pattern: String },
    Inspect {
        jar_path: PathBuf,
        class_name: String,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    Show {
        class_name: String,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    Usage {
        class_name: String,
        definition: String,
    },
    Stats,
    Clear,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
    Code,
}
