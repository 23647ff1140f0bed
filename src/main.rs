use anyhow::{bail, Context, Result};
use clap::Parser;
use mathchunk::{
    collect_book, telemetry, write_outputs, BookReport, BookStats, Config, Pipeline,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

/// Split markdown math textbooks into structure-aware, token-bounded chunks
#[derive(Debug, Parser)]
#[command(name = "mathchunk", version, about)]
struct Cli {
    /// Directory holding one subdirectory of markdown files per book
    #[arg(short, long, value_name = "DIR", required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// Directory for the JSONL outputs and manifest
    #[arg(short, long, value_name = "DIR", required_unless_present = "print_config")]
    output: Option<PathBuf>,

    /// Configuration file (replaces the built-in book catalog)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only process these books (skips all.jsonl)
    #[arg(short, long, value_name = "KEY")]
    book: Vec<String>,

    /// Token budget per chunk
    #[arg(long, value_name = "N")]
    max_tokens: Option<usize>,

    /// Drop finished chunks estimated below N tokens
    #[arg(long, value_name = "N")]
    drop_below: Option<usize>,

    /// Strip cross-reference artifacts before chunking
    #[arg(long)]
    preclean: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => Config::builtin().context("Failed to load built-in book catalog")?,
        };

        if let Some(max_tokens) = self.max_tokens {
            config.chunking.max_tokens = max_tokens;
        }
        if let Some(drop_below) = self.drop_below {
            config.chunking.drop_below = drop_below;
        }
        if self.preclean {
            config.chunking.preclean = true;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_level());

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let start = Instant::now();
    let config = cli.load_config()?;

    if cli.print_config {
        let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        print!("{}", text);
        return Ok(ExitCode::SUCCESS);
    }

    let input = cli.input.as_deref().context("--input is required")?;
    let output = cli.output.as_deref().context("--output is required")?;

    let book_keys: Vec<String> = if cli.book.is_empty() {
        config.book_keys().map(str::to_string).collect()
    } else {
        for key in &cli.book {
            config.book(key)?;
        }
        cli.book.clone()
    };

    let max_tokens = config.chunking.max_tokens;
    let pipeline = Pipeline::new(config).context("Failed to initialize pipeline")?;

    let mut reports = Vec::with_capacity(book_keys.len());
    for book_key in &book_keys {
        let book = pipeline.config().book(book_key)?;
        tracing::info!(book = %book_key, title = %book.book, "chunking");

        let sources = collect_book(input, book_key)
            .with_context(|| format!("Failed to list sources for {}", book_key))?;

        let mut report = BookReport {
            book_key: book_key.clone(),
            ..BookReport::default()
        };
        for result in pipeline.process_sources(&sources) {
            match result {
                Ok(output) => report.outputs.push(output),
                Err(failure) => report.failures.push(failure),
            }
        }

        let stats = BookStats::from_report(&report);
        tracing::info!(
            book = %book_key,
            chunks = stats.chunks,
            min = stats.min_tokens,
            med = stats.median_tokens,
            max = stats.max_tokens,
            total = stats.total_tokens,
            oversized = stats.oversized,
            warnings = stats.warnings,
            failed = stats.failed,
            "book done"
        );
        reports.push(report);
    }

    let written = write_outputs(output, &reports, max_tokens, cli.book.is_empty())
        .with_context(|| format!("Failed to write outputs to {}", output.display()))?;

    let documents: usize = reports
        .iter()
        .map(|r| r.outputs.len() + r.failures.len())
        .sum();
    let failed: usize = reports.iter().map(|r| r.failures.len()).sum();
    let chunks: usize = reports.iter().map(|r| r.records().count()).sum();

    tracing::info!(
        books = reports.len(),
        documents,
        failed,
        chunks,
        manifest = %written.manifest.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "done"
    );

    if documents > 0 && failed == documents {
        bail!("all {} documents failed", documents);
    }

    Ok(ExitCode::SUCCESS)
}
