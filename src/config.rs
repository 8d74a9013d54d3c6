use crate::file::FileType;
use crate::formats::FormatOptions;
use crate::index::{DEFAULT_ARITY, DEFAULT_MIN_BIN_SIZE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "gbindex")]
#[command(about = "Bin-indexed genomic interval files and a range-query server")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve indexed files over HTTP
    Serve(Config),
    /// Convert a BED file into an indexed file
    Format(FormatArgs),
}

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "GBINDEX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "GBINDEX_PORT", default_value = "8080")]
    pub port: u16,

    /// Directory containing indexed files
    #[arg(long, env = "GBINDEX_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Enable CORS for all origins
    #[arg(long, env = "GBINDEX_CORS", default_value = "true")]
    pub cors: bool,

    /// Maximum number of files kept open, each with its own range cache
    #[arg(long, env = "GBINDEX_MAX_OPEN_FILES", default_value = "64")]
    pub max_open_files: u64,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Args)]
pub struct FormatArgs {
    /// BED file to read
    pub input: PathBuf,

    /// Indexed file to write
    pub output: PathBuf,

    /// Record layout of the output
    #[arg(long, value_enum, default_value = "interval-bed")]
    pub file_type: FileType,

    /// Children per subdivided bin
    #[arg(long, default_value_t = DEFAULT_ARITY)]
    pub arity: usize,

    /// Bins this size or smaller are not subdivided
    #[arg(long, default_value_t = DEFAULT_MIN_BIN_SIZE)]
    pub min_bin_size: i64,
}

impl FormatArgs {
    pub fn options(&self) -> FormatOptions {
        FormatOptions {
            file_type: self.file_type,
            arity: self.arity,
            min_bin_size: self.min_bin_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["gbindex", "serve"]).unwrap();
        match cli.command {
            Command::Serve(config) => {
                assert_eq!(config.port, 8080);
                assert_eq!(config.bind_address(), format!("{}:8080", config.host));
                assert!(config.max_open_files > 0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_serve_custom_address() {
        let cli = Cli::try_parse_from([
            "gbindex", "serve", "--host", "localhost", "--port", "3000",
        ])
        .unwrap();
        match cli.command {
            Command::Serve(config) => assert_eq!(config.bind_address(), "localhost:3000"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_format_arguments() {
        let cli = Cli::try_parse_from([
            "gbindex",
            "format",
            "genes.bed",
            "genes.gbx",
            "--file-type",
            "interval-generic",
            "--arity",
            "4",
        ])
        .unwrap();
        match cli.command {
            Command::Format(args) => {
                let options = args.options();
                assert_eq!(options.file_type, FileType::IntervalGeneric);
                assert_eq!(options.arity, 4);
                assert_eq!(options.min_bin_size, DEFAULT_MIN_BIN_SIZE);
                assert_eq!(args.input, PathBuf::from("genes.bed"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
