//! Evalrun CLI - Bounded-concurrency LLM benchmark runner
//!
//! Main entry point for the evalrun command-line tool.

use clap::{Parser, Subcommand};
use colored::Colorize;
use evalrun::dataset::{load_items, ProcessingOrder};
use evalrun::{report, EvalConfig, EvalError, ShutdownCoordinator};
use llm::remote::OpenAiClient;
use std::path::PathBuf;
use std::sync::Arc;
use tooling::logging::LogFormat;
use tracing::info;

#[derive(Parser)]
#[command(name = "evalrun")]
#[command(about = "Evalrun - Bounded-concurrency LLM benchmark runner", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Extra config file applied over user and project config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. info, evalrun=debug)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format: full, compact, json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a dataset with one strategy
    Run(RunArgs),

    /// List registered strategies
    Strategies {
        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Summarize result files into an accuracy table
    Report {
        /// Directory holding <strategy>.jsonl result files
        #[arg(short, long, default_value = "results")]
        dir: PathBuf,
        /// Where to write the table
        #[arg(short, long, default_value = "results/result.txt")]
        output: PathBuf,
        /// Give unanswered questions a 25% guessing credit
        #[arg(long)]
        compensated: bool,
    },

    /// Merge per-strategy result files into one JSON document
    Unify {
        /// Directory holding <strategy>.jsonl result files
        #[arg(short, long, default_value = "results")]
        dir: PathBuf,
        /// Output file name, relative to --dir unless absolute
        #[arg(short, long, default_value = "unified_results.json")]
        output: PathBuf,
        /// Only these strategies (default: every result file)
        #[arg(short, long, value_delimiter = ',')]
        strategies: Option<Vec<String>>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Dataset file (.json array or JSON Lines)
    dataset: PathBuf,

    /// Strategy name, see `evalrun strategies`
    #[arg(short, long)]
    strategy: Option<String>,

    /// Maximum simultaneous remote calls
    #[arg(short = 'n', long)]
    max_concurrent: Option<usize>,

    /// Items to evaluate after ordering, 0 for all
    #[arg(short = 'e', long)]
    max_entries: Option<usize>,

    /// Submission order
    #[arg(long, value_enum)]
    processing_order: Option<ProcessingOrder>,

    /// Seed for the shuffled order
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for result files
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Keep an audit log of every request and response
    #[arg(long)]
    logging: bool,

    /// Remove result files of an earlier run with the same strategy
    #[arg(long)]
    delete_old: bool,

    /// Model every call is pinned to
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut EvalConfig) {
        let exec = &mut config.execution;
        if let Some(strategy) = &self.strategy {
            exec.strategy = strategy.clone();
        }
        if let Some(n) = self.max_concurrent {
            exec.max_concurrent = n;
        }
        if let Some(n) = self.max_entries {
            exec.max_entries = n;
        }
        if let Some(order) = self.processing_order {
            exec.processing_order = order;
        }
        if let Some(seed) = self.seed {
            exec.seed = seed;
        }

        let output = &mut config.output;
        if let Some(dir) = &self.save_dir {
            output.save_dir = dir.clone();
        }
        output.audit_logging |= self.logging;
        output.delete_old |= self.delete_old;

        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(url) = &self.base_url {
            config.llm.base_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = evalrun::load_config(cli.config.as_deref()).await?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Err(e) = tooling::logging::init(&config.logging.level, config.logging.format) {
        eprintln!("{} {}", "warning:".yellow(), e);
    }
    // the loader ran before any subscriber was installed
    info!(
        config_file = ?cli.config,
        model = %config.llm.model,
        strategy = %config.execution.strategy,
        max_concurrent = config.execution.max_concurrent,
        log_level = %config.logging.level,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            run(config, &args.dataset).await
        }
        Commands::Strategies { format } => {
            let strategies = evalrun::list_strategies();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&strategies)?);
            } else {
                println!("{}", "Available strategies".bold().underline());
                for info in strategies {
                    println!("  {:<16} {}", info.name.cyan(), info.description);
                }
            }
            Ok(())
        }
        Commands::Report {
            dir,
            output,
            compensated,
        } => {
            report::write_report(&dir, &output, compensated)?;
            println!("{}", std::fs::read_to_string(&output)?);
            println!("{} {}", "✓ Report written to".green(), output.display());
            Ok(())
        }
        Commands::Unify {
            dir,
            output,
            strategies,
        } => {
            let (path, unified) = report::write_unified(&dir, &output, strategies.as_deref())?;
            println!(
                "{} {} items from {} strategies to {}",
                "✓ Unified".green(),
                unified.metadata.total_items,
                unified.metadata.agents.len(),
                path.display()
            );
            for (agent, errors) in &unified.metadata.error_counts {
                if *errors > 0 {
                    println!("  {} {} error records", agent.yellow(), errors);
                }
            }
            Ok(())
        }
    }
}

async fn run(config: EvalConfig, dataset: &std::path::Path) -> anyhow::Result<()> {
    config.validate()?;
    let transport = Arc::new(OpenAiClient::new(config.llm.to_remote()?)?);
    let items = load_items(dataset)?;

    let shutdown = ShutdownCoordinator::new();
    let _signal_handler = shutdown.install_signal_handlers();

    let report = match evalrun::run_evaluation(&config, transport, items, &shutdown, true).await {
        Ok(report) => report,
        Err(e @ EvalError::OutputExists(_)) => {
            eprintln!("{} {}", "✗".red(), e);
            eprintln!("  Pass --delete-old to replace them.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let summary = &report.summary;
    let counters = summary.counters;
    println!();
    println!("{}", "Evaluation Summary".bold().underline());
    println!("  Run:       {}", report.run_id);
    println!("  Strategy:  {}", report.strategy);
    println!("  Model:     {}", report.model);
    println!("  Output:    {}", report.paths.output.display());
    println!("  Written:   {}/{}", counters.written, summary.total);
    println!(
        "  Accuracy:  {}",
        format!("{:.2}%", counters.accuracy()).cyan()
    );
    println!(
        "  Errors:    {}",
        if counters.errors > 0 {
            counters.errors.to_string().red()
        } else {
            counters.errors.to_string().normal()
        }
    );

    if summary.is_complete() {
        println!("{}", "✓ Evaluation complete".green().bold());
        return Ok(());
    }

    if summary.cancelled {
        println!("{}", "⚠ Evaluation interrupted".yellow().bold());
    }
    if let Some(e) = &summary.write_error {
        println!("{} {}", "✗ Writing results failed:".red().bold(), e);
    }
    if !summary.panicked.is_empty() {
        println!("  Tasks that panicked: {:?}", summary.panicked);
    }
    println!(
        "  {} tasks not written, first missing index {}",
        summary.unwritten.len(),
        summary.unwritten.first().copied().unwrap_or(summary.total)
    );
    Err(anyhow::anyhow!("evaluation did not complete"))
}
