//! Insight Eval CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use insight_eval::{
    analysis::StatisticalAnalyzer,
    backend::LlmBackend,
    config::Config,
    dataset::Dataset,
    evaluation::{DatasetInput, EvaluationOptions, Evaluator},
    providers::create_provider,
    reporting::{
        output_path, print_batch_summary, print_result, print_validation_report, run_id, JsonReport,
    },
    validation::{parse_claim_list, ClaimGenerator, ValidationDataset, ValidationHarness},
};

#[derive(Parser)]
#[command(name = "insight-eval")]
#[command(about = "Evaluate claims about a dataset with statistical checks and LLM-scored metrics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single claim
    Evaluate {
        /// The claim to evaluate
        claim: String,

        /// Dataset file (CSV or JSON); defaults to dataset.path from config
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Dataset summary given to the model
        #[arg(long)]
        summary: Option<String>,

        /// Task the claim was produced for
        #[arg(long)]
        task: Option<String>,

        /// Run timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output directory for the JSON result
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate every claim in a file
    Batch {
        /// Claims file: one claim per line, or a JSON array
        #[arg(short = 'f', long)]
        claims: PathBuf,

        /// Dataset file (CSV or JSON); defaults to dataset.path from config
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output directory for the JSON results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Measure agreement with expected scores on test claims
    Validate {
        /// Validation dataset (JSON); generated from the data when omitted
        #[arg(long)]
        claims: Option<PathBuf>,

        /// Dataset file (CSV or JSON); defaults to dataset.path from config
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Number of claims to generate when no claims file is given
        #[arg(short, long, default_value = "15")]
        num_claims: usize,

        /// Output directory for the report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a validation dataset from the data
    GenerateClaims {
        /// Dataset file (CSV or JSON); defaults to dataset.path from config
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Number of claims to generate
        #[arg(short, long, default_value = "15")]
        num_claims: usize,

        /// Output path for the validation dataset
        #[arg(short, long, default_value = "validation_dataset.json")]
        output: PathBuf,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/insight-eval.toml")]
        output: PathBuf,
    },

    /// Check that the configured model backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("insight_eval=debug,info")
        } else {
            EnvFilter::new("insight_eval=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::InitConfig { output } => {
            init_config(output)?;
        }

        Commands::GenerateClaims {
            data,
            num_claims,
            output,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            generate_claims(&config, data, num_claims, output)?;
        }

        Commands::Evaluate {
            claim,
            data,
            summary,
            task,
            timeout,
            output,
        } => {
            let config = Arc::new(Config::load(cli.config.as_deref())?);
            let options = EvaluationOptions {
                dataset_summary: summary,
                task_description: task,
                timeout: timeout.map(Duration::from_secs),
            };
            evaluate_claim(config, claim, data, options, output).await?;
        }

        Commands::Batch {
            claims,
            data,
            output,
        } => {
            let config = Arc::new(Config::load(cli.config.as_deref())?);
            run_batch(config, claims, data, output).await?;
        }

        Commands::Validate {
            claims,
            data,
            num_claims,
            output,
        } => {
            let config = Arc::new(Config::load(cli.config.as_deref())?);
            run_validation(config, claims, data, num_claims, output).await?;
        }

        Commands::Health => {
            let config = Config::load(cli.config.as_deref())?;
            health(&config).await?;
        }
    }

    Ok(())
}

fn build_evaluator(config: Arc<Config>) -> Result<Evaluator, Box<dyn std::error::Error>> {
    let provider = create_provider(&config.llm)?;
    let backend = Arc::new(LlmBackend::from_config(provider, &config.llm));
    let analyzer = Arc::new(
        StatisticalAnalyzer::new().with_tolerance(config.evaluation.numeric_tolerance),
    );
    Ok(Evaluator::new(config, backend, analyzer))
}

fn dataset_path(config: &Config, data: Option<PathBuf>) -> PathBuf {
    data.unwrap_or_else(|| PathBuf::from(&config.dataset.path))
}

fn output_dir(config: &Config, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(&config.output.output_dir))
}

async fn evaluate_claim(
    config: Arc<Config>,
    claim: String,
    data: Option<PathBuf>,
    options: EvaluationOptions,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let evaluator = build_evaluator(Arc::clone(&config))?;
    let data = dataset_path(&config, data);

    let result = evaluator
        .evaluate(&claim, DatasetInput::Path(data), options)
        .await;
    print_result(&result);

    if config.output.save_results || output.is_some() {
        let run = run_id(Utc::now());
        let path = output_path(output_dir(&config, output), "evaluation", &run);
        JsonReport::from_results(&run, &config.llm.model, vec![result]).write_to_file(&path)?;
        println!("Result saved to {}", path.display());
    }
    Ok(())
}

async fn run_batch(
    config: Arc<Config>,
    claims_file: PathBuf,
    data: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let claims = parse_claim_list(&std::fs::read_to_string(&claims_file)?)?;
    if claims.is_empty() {
        return Err(format!("no claims found in {}", claims_file.display()).into());
    }

    println!("=== Insight Eval Batch ===");
    println!("Claims: {}", claims.len());
    println!("Model:  {} ({})", config.llm.model, config.llm.provider);
    println!();

    let evaluator = build_evaluator(Arc::clone(&config))?;
    let data = dataset_path(&config, data);
    let results = evaluator
        .evaluate_batch(claims, DatasetInput::Path(data), EvaluationOptions::default())
        .await;
    print_batch_summary(&results);

    if config.output.save_results || output.is_some() {
        let run = run_id(Utc::now());
        let path = output_path(output_dir(&config, output), "batch", &run);
        JsonReport::from_results(&run, &config.llm.model, results).write_to_file(&path)?;
        println!("Results saved to {}", path.display());
    }
    Ok(())
}

async fn run_validation(
    config: Arc<Config>,
    claims_file: Option<PathBuf>,
    data: Option<PathBuf>,
    num_claims: usize,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = dataset_path(&config, data);
    let dataset = Arc::new(Dataset::from_path(&data)?);

    let validation = match claims_file {
        Some(path) => ValidationDataset::load(&path)?,
        None => ValidationDataset::new(ClaimGenerator::new(&dataset).generate(num_claims)),
    };
    println!("=== Insight Eval Validation ===");
    println!("Claims: {}", validation.claims.len());
    println!();

    let harness = ValidationHarness::new(build_evaluator(Arc::clone(&config))?);
    let report = harness
        .run(
            &validation.claims,
            DatasetInput::Loaded(dataset),
            EvaluationOptions::default(),
        )
        .await;
    print_validation_report(&report);

    if config.output.save_results || output.is_some() {
        let path = output_path(output_dir(&config, output), "validation", &run_id(Utc::now()));
        report.save(&path)?;
        println!("Report saved to {}", path.display());
    }
    Ok(())
}

fn generate_claims(
    config: &Config,
    data: Option<PathBuf>,
    num_claims: usize,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = dataset_path(config, data);
    let dataset = Dataset::from_path(&data)?;
    let validation = ValidationDataset::new(ClaimGenerator::new(&dataset).generate(num_claims));
    validation.save(&output)?;

    let info = &validation.dataset_info;
    println!("Validation dataset saved to {}", output.display());
    println!("Generated {} test claims", info.total_claims);
    for (category, count) in &info.categories {
        println!("  {}: {}", category.as_str(), count);
    }
    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    if output.exists() {
        return Err(format!("{} already exists", output.display()).into());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Config::default().save_toml(&output)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}

async fn health(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let provider = create_provider(&config.llm)?;
    let healthy = provider.health_check().await?;
    println!(
        "{} ({} at {}): {}",
        provider.name(),
        provider.default_model(),
        config.llm.base_url,
        if healthy { "reachable" } else { "unreachable" }
    );

    let data = Path::new(&config.dataset.path);
    match Dataset::from_path(data) {
        Ok(dataset) => println!("Dataset: {}", dataset.summary()),
        Err(e) => println!("Dataset {}: {}", data.display(), e),
    }

    if !healthy {
        return Err("model backend is not reachable".into());
    }
    Ok(())
}
