//! Evaluation CLI for benchmarking QA agents on OpenBookQA.
//!
//! Run evaluations, display stored reports, and list past runs.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use openbook_core::{Agent, LlmClient, LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use openbook_cot::CotAgent;
use openbook_direct::DirectAgent;
use openbook_eval::{
    EvalHarness, ExampleStore, JsonFileStore, JsonReportSink, OpenBookQa, RunConfig, RunProgress,
    RunResult, Split,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Evaluation CLI for benchmarking QA agents on OpenBookQA.
#[derive(Parser, Debug)]
#[command(name = "openbook-eval")]
#[command(about = "Evaluate multiple-choice QA agents on OpenBookQA")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an evaluation and store the report
    Run(RunArgs),

    /// Display a stored report
    Show(ShowArgs),

    /// List stored reports, newest first
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Dataset to use: "openbookqa" or path to a JSON file
    #[arg(long, short = 'd', default_value = "openbookqa")]
    dataset: String,

    /// OpenBookQA split: train, dev, or test
    #[arg(long, default_value = "dev")]
    split: String,

    /// Number of examples to evaluate (default: all)
    #[arg(long, short = 's')]
    sample: Option<usize>,

    /// Shuffle examples (seeded) before sampling
    #[arg(long)]
    shuffle: bool,

    /// Agent to evaluate: direct or cot
    #[arg(long, short = 'a', default_value = "direct")]
    agent: String,

    /// Model to evaluate against
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Master seed for example selection and generation
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Per-example timeout in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// LLM request timeout in seconds
    #[arg(long, default_value = "30")]
    llm_timeout: u64,

    /// Maximum concurrent examples
    #[arg(long, default_value = "5")]
    concurrency: usize,

    /// Metadata key for a per-category breakdown
    #[arg(long)]
    category_field: Option<String>,

    /// Directory reports are written to
    #[arg(long, default_value = "evaluation_results")]
    out_dir: PathBuf,

    /// Output format: table or json
    #[arg(long, short = 'o', default_value = "table")]
    output: String,

    /// OpenAI API key (can also use OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: String,

    /// API base URL (can also use OPENAI_BASE_URL env var)
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Sampling temperature (0.0-2.0)
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Maximum tokens per LLM request
    #[arg(long, default_value = "2048")]
    max_tokens: u32,
}

impl RunArgs {
    /// Validate CLI arguments.
    fn validate(&self) -> Result<(), String> {
        // Validate output format
        if !["table", "json"].contains(&self.output.as_str()) {
            return Err(format!(
                "Invalid output format '{}'. Use 'table' or 'json'.",
                self.output
            ));
        }

        // Validate agent
        if !["direct", "cot"].contains(&self.agent.as_str()) {
            return Err(format!("Invalid agent '{}'. Use direct or cot.", self.agent));
        }

        // Validate split (only consulted for the openbookqa dataset)
        if let Err(e) = self.split.parse::<Split>() {
            return Err(e);
        }

        // Validate concurrency
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }

        // Validate temperature
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            ));
        }

        Ok(())
    }

    /// Build LlmConfig from CLI arguments.
    fn llm_config(&self) -> LlmConfig {
        LlmConfig::default()
            .with_model(self.model.clone())
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.llm_timeout))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }

    /// Build RunConfig from CLI arguments.
    fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new()
            .with_seed(self.seed)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_concurrency(self.concurrency)
            .with_shuffle(self.shuffle);

        if let Some(sample) = self.sample {
            config = config.with_sample(sample);
        }
        if let Some(field) = &self.category_field {
            config = config.with_category_field(field.clone());
        }

        config
    }
}

#[derive(clap::Args, Debug)]
struct ShowArgs {
    /// Path to a stored report
    path: PathBuf,

    /// Also print one line per prediction
    #[arg(long)]
    predictions: bool,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Directory reports are stored in
    #[arg(long, default_value = "evaluation_results")]
    out_dir: PathBuf,
}

/// Create the requested agent.
fn create_agent(name: &str) -> Result<Box<dyn Agent>, String> {
    match name {
        "direct" => DirectAgent::with_defaults()
            .map(|agent| Box::new(agent) as Box<dyn Agent>)
            .map_err(|e| format!("Failed to create agent: {}", e)),
        "cot" => CotAgent::with_defaults()
            .map(|agent| Box::new(agent) as Box<dyn Agent>)
            .map_err(|e| format!("Failed to create agent: {}", e)),
        other => Err(format!("Agent '{}' not found", other)),
    }
}

/// Run evaluation with progress display.
async fn run_evaluation(args: &RunArgs) -> Result<RunResult, String> {
    let llm = LlmClient::new(args.api_key.clone(), args.llm_config())
        .map_err(|e| format!("Failed to create LLM client: {}", e))?;

    let agent = create_agent(&args.agent)?;
    let harness = EvalHarness::new(args.run_config());

    match args.dataset.to_lowercase().as_str() {
        "openbookqa" => {
            let split = args.split.parse::<Split>()?;
            let store = OpenBookQa::with_split(split)
                .map_err(|e| format!("Failed to open OpenBookQA: {}", e))?;
            run_with_progress(&harness, agent.as_ref(), &store, llm).await
        }
        _ => {
            let path = PathBuf::from(&args.dataset);
            if !path.exists() {
                return Err(format!("Dataset file not found: {}", args.dataset));
            }
            let store = JsonFileStore::new(path);
            run_with_progress(&harness, agent.as_ref(), &store, llm).await
        }
    }
}

/// Run evaluation with progress bar.
async fn run_with_progress<S: ExampleStore>(
    harness: &EvalHarness,
    agent: &dyn Agent,
    store: &S,
    llm: LlmClient,
) -> Result<RunResult, String> {
    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = harness
        .run_with_progress(agent, store, llm, |progress| match progress {
            RunProgress::Started { total } => {
                progress_bar.set_length(total as u64);
                progress_bar.set_message("Evaluating...");
            }
            RunProgress::ExampleCompleted {
                completed, success, ..
            } => {
                progress_bar.set_position(completed as u64);
                if !success {
                    progress_bar.set_message("(some failures)");
                }
            }
            _ => {} // Handle future variants gracefully
        })
        .await
        .map_err(|e| format!("Evaluation failed while {}: {}", e.stage(), e))?;

    progress_bar.finish_with_message("Complete");
    Ok(result)
}

/// Output results in the requested format.
fn output_results(result: &RunResult, args: &RunArgs) -> Result<(), String> {
    match args.output.as_str() {
        "table" => result.print_summary(),
        "json" => {
            let json = serde_json::to_string_pretty(result)
                .map_err(|e| format!("Failed to serialize results: {}", e))?;
            println!("{}", json);
        }
        _ => unreachable!(), // Already validated
    }
    Ok(())
}

/// Persist the report and announce where it went.
async fn persist_report(result: &RunResult, out_dir: &Path) -> Result<(), String> {
    let sink = JsonReportSink::new(out_dir);
    let path = sink
        .persist(result)
        .await
        .map_err(|e| format!("Failed to write report: {}", e))?;

    eprintln!(
        "Wrote JSON report to {} (Accuracy: {:.3}, n={})",
        path.display(),
        result.accuracy,
        result.total_examples
    );
    Ok(())
}

async fn show_report(args: &ShowArgs) -> Result<(), String> {
    let dir = args.path.parent().unwrap_or(Path::new("."));
    let sink = JsonReportSink::new(dir);
    let result = sink
        .load(&args.path)
        .await
        .map_err(|e| format!("Failed to read report: {}", e))?;

    result.print_summary();

    if args.predictions {
        println!();
        println!("Predictions:");
        for prediction in &result.predictions {
            match (&prediction.predicted, &prediction.error) {
                (Some(label), _) => println!(
                    "  {}: {} ({}ms)",
                    prediction.example_id,
                    label,
                    prediction.latency.as_millis()
                ),
                (None, Some(error)) => {
                    println!("  {}: error: {}", prediction.example_id, error)
                }
                (None, None) => println!("  {}: no answer", prediction.example_id),
            }
        }
    }

    Ok(())
}

async fn list_reports(args: &ListArgs) -> Result<(), String> {
    let sink = JsonReportSink::new(&args.out_dir);
    let paths = sink
        .list()
        .await
        .map_err(|e| format!("Failed to list reports: {}", e))?;

    if paths.is_empty() {
        eprintln!("No reports found in {}", args.out_dir.display());
        return Ok(());
    }

    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match &cli.command {
        Command::Run(args) => {
            // Validate arguments
            if let Err(e) = args.validate() {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }

            // Print configuration
            eprintln!("=== OpenBookQA Evaluation ===");
            eprintln!("Dataset: {}", args.dataset);
            if args.dataset.to_lowercase() == "openbookqa" {
                eprintln!("Split: {}", args.split);
            }
            eprintln!("Agent: {}", args.agent);
            eprintln!("Model: {}", args.model);
            eprintln!("Seed: {}", args.seed);
            eprintln!(
                "Sample size: {}",
                args.sample
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "all".to_string())
            );
            eprintln!("Concurrency: {}", args.concurrency);
            eprintln!();

            // Run evaluation
            match run_evaluation(args).await {
                Ok(result) => {
                    if let Err(e) = persist_report(&result, &args.out_dir).await {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                    if let Err(e) = output_results(&result, args) {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Show(args) => match show_report(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::List(args) => match list_reports(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
