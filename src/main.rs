use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use jobbench::config::BatchConfig;
use jobbench::display;
use jobbench::orchestrate::Orchestrator;
use jobbench::types::{ConcurrencyPolicy, FailurePolicy};

const EXIT_JOBS_FAILED: i32 = 1;
const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(
    name = "jobbench",
    version,
    about = "Run a program over a corpus of input files and record how long it takes"
)]
struct Cli {
    /// TOML batch configuration; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Dimension/category directory under the source root
    #[arg(long)]
    category: Option<String>,

    /// Extra directory level below the category
    #[arg(long)]
    subset: Option<String>,

    #[arg(long)]
    result_root: Option<PathBuf>,

    /// Path to the job program
    #[arg(short, long)]
    program: Option<PathBuf>,

    /// Argument passed to the program before the input path (repeatable)
    #[arg(long = "program-arg", allow_hyphen_values = true)]
    program_args: Vec<String>,

    /// Flag telling the program where to write its output, e.g. -w
    #[arg(long, allow_hyphen_values = true)]
    output_flag: Option<String>,

    /// Runs per input
    #[arg(short = 'n', long)]
    repeat: Option<u32>,

    /// "unbounded", "bounded:N" or N
    #[arg(short = 'j', long)]
    concurrency: Option<ConcurrencyPolicy>,

    /// Run only these items, in this order (repeatable)
    #[arg(long = "item")]
    items: Vec<String>,

    /// Only run inputs with this extension
    #[arg(long)]
    extension: Option<String>,

    /// Only run the first N inputs
    #[arg(long)]
    limit: Option<usize>,

    /// Kill a run after this many seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Discard the program's stdout and stderr
    #[arg(short, long)]
    quiet: bool,

    #[arg(long)]
    failure_policy: Option<FailurePolicy>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Print the command lines that would run, then exit
    #[arg(long)]
    dry_run: bool,

    /// Log every run
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::load(path)?,
            None => BatchConfig::default(),
        };

        if let Some(v) = self.source_root {
            config.source_root = v;
        }
        if let Some(v) = self.category {
            config.category = v;
        }
        if self.subset.is_some() {
            config.subset = self.subset;
        }
        if let Some(v) = self.result_root {
            config.result_root = v;
        }
        if let Some(v) = self.program {
            config.program_path = v;
        }
        if !self.program_args.is_empty() {
            config.program_args = self.program_args;
        }
        if self.output_flag.is_some() {
            config.output_flag = self.output_flag;
        }
        if let Some(v) = self.repeat {
            config.repeat_count = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if !self.items.is_empty() {
            config.items = self.items;
        }
        if self.extension.is_some() {
            config.extension = self.extension;
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if self.timeout.is_some() {
            config.per_run_timeout_secs = self.timeout;
        }
        if self.quiet {
            config.quiet = true;
        }
        if let Some(v) = self.failure_policy {
            config.failure_policy = v;
        }

        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the process exit code.
fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let json = cli.json;
    let dry_run = cli.dry_run;

    let config = cli.into_config()?;
    let orchestrator = Orchestrator::new(config)?;

    if dry_run {
        for job in orchestrator.plan()? {
            let argv: Vec<String> = job
                .command_line(0)
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            println!("{}", argv.join(" "));
        }
        return Ok(0);
    }

    let summary = orchestrator.run().context("batch aborted before dispatch")?;

    let output = if json {
        display::format_json(&summary)
    } else {
        display::format_text(&summary)
    };
    print!("{}", output);
    if json {
        println!();
    }

    Ok(if summary.all_succeeded() {
        0
    } else {
        EXIT_JOBS_FAILED
    })
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(EXIT_FATAL);
        }
    }
}
