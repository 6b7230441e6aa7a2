//! CLI tool for dumping OFX files as JSON

use clap::Parser;
use ofxrs::{parse_document, parse_ofx, ParseOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Parse an OFX/QFX file and print it as JSON.
#[derive(Parser, Debug)]
#[command(name = "ofxrs", version, about)]
struct Cli {
    /// OFX file to parse
    file: PathBuf,

    /// Print the raw element tree instead of the typed response
    #[arg(long)]
    tree: bool,

    /// Fail on the first conversion error
    #[arg(long)]
    strict: bool,

    /// Override the text encoding declared in the header
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Single-line JSON output
    #[arg(long)]
    compact: bool,
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

fn run(cli: &Cli) -> ofxrs::Result<bool> {
    let data = std::fs::read(&cli.file)?;
    let mut options = ParseOptions::new();
    options.strict = cli.strict;
    options.encoding = cli.encoding.clone();

    if cli.tree {
        let document = parse_document(&data, &options)?;
        println!("{}", to_json(&document.tree, cli.compact)?);
        return Ok(true);
    }

    let response = parse_ofx(&data, &options)?;
    println!("{}", to_json(&response, cli.compact)?);
    for warning in &response.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &response.errors {
        eprintln!("error: {error}");
    }
    if !response.signon.status.is_success() {
        eprintln!(
            "sign-on failed: {} {}",
            response.signon.status.code,
            response.signon.status.message.as_deref().unwrap_or("")
        );
    }
    Ok(response.errors.is_empty())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error parsing {}: {}", cli.file.display(), e);
            ExitCode::FAILURE
        }
    }
}
