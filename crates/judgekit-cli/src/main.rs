//! Judgekit CLI
//!
//! A command-line tool for running code against test cases.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use judgekit::{
    CodeExecutionResult, Config, Credential, DirectorySubmissionStore, EXAMPLE_CONFIG,
    ExecutionMode, ExecutionService, ResourceLoader, RuntimeManager, SubmissionStore, TestCase,
};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "judgekit")]
#[command(about = "A tool for running code against test cases")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Judge access token; enables the remote judge
    #[arg(long, global = true, env = "JUDGEKIT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// User the token belongs to
    #[arg(long, global = true, env = "JUDGEKIT_USER", default_value = "cli")]
    user: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: judgekit.toml)
        #[arg(short, long, default_value = "judgekit.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program against the first test cases
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., python, go)
        #[arg(short, long)]
        language: String,

        /// Test case as INPUT=EXPECTED file references (repeatable)
        #[arg(short, long = "test", value_name = "INPUT=EXPECTED", value_parser = parse_test)]
        tests: Vec<TestCase>,

        /// Number of test cases to run; 0 runs all of them
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Evaluate a program against every test case and record a submission
    Submit {
        /// Source file to submit
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., python, go)
        #[arg(short, long)]
        language: String,

        /// Test case as INPUT=EXPECTED file references (repeatable)
        #[arg(short, long = "test", value_name = "INPUT=EXPECTED", value_parser = parse_test)]
        tests: Vec<TestCase>,

        /// Question the submission answers
        #[arg(short, long)]
        question: String,

        /// Directory submissions are written to
        #[arg(long, default_value = "submissions")]
        submissions_dir: PathBuf,
    },

    /// List configured languages and their availability
    Languages,

    /// Load every interpreter runtime and report its status
    Preload,

    /// Show the effective configuration
    ShowConfig,
}

/// Parse `INPUT=EXPECTED` into a test case described by its input reference
fn parse_test(value: &str) -> Result<TestCase, String> {
    match value.split_once('=') {
        Some((input, expected)) if !input.is_empty() && !expected.is_empty() => {
            Ok(TestCase::new(input, input, expected))
        }
        _ => Err(format!("expected INPUT=EXPECTED, got '{value}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        Commands::Init { output, force } => return init_config(&output, force).await,
        command => command,
    };

    // Load configuration
    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let credential = cli.token.map(|token| Credential::new(cli.user, token));

    match command {
        Commands::Init { .. } => Ok(()),
        Commands::Run {
            source,
            language,
            tests,
            limit,
        } => run_code(config, credential, &source, &language, &tests, limit).await,
        Commands::Submit {
            source,
            language,
            tests,
            question,
            submissions_dir,
        } => {
            submit_code(
                config,
                credential,
                &source,
                &language,
                &tests,
                &question,
                submissions_dir,
            )
            .await
        }
        Commands::Languages => list_languages(config, credential),
        Commands::Preload => preload(config).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Runtime manager for the loaded configuration
fn runtime_manager(config: &Config) -> Arc<RuntimeManager> {
    let loader = Arc::new(ResourceLoader::new(config.resource_root.clone()));
    Arc::new(RuntimeManager::from_config(config, loader))
}

/// Build a service and load the runtime of `language`, if it has one
async fn prepare_service(
    config: Config,
    credential: Option<Credential>,
    language: &str,
    store: Option<Arc<dyn SubmissionStore>>,
) -> Result<ExecutionService> {
    config
        .get_language(language)
        .context("unknown language")?;

    let manager = runtime_manager(&config);
    if manager.supports(language)
        && let Err(e) = manager.load(language).await
    {
        warn!(%language, error = %e, "interpreter unavailable, relying on the judge");
    }

    let mut builder = ExecutionService::builder(config).runtime_manager(manager);
    if let Some(credential) = credential {
        builder = builder.credential(credential);
    }
    if let Some(store) = store {
        builder = builder.submission_store(store);
    }
    builder.build().context("failed to set up execution service")
}

async fn read_source(source: &Path) -> Result<String> {
    tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")
}

async fn run_code(
    config: Config,
    credential: Option<Credential>,
    source: &Path,
    language: &str,
    tests: &[TestCase],
    limit: Option<usize>,
) -> Result<()> {
    let code = read_source(source).await?;
    let service = prepare_service(config, credential, language, None).await?;

    let mode = match limit {
        Some(limit) => ExecutionMode::run(limit),
        None => service.default_mode(),
    };

    info!(%language, tests = tests.len(), "running program");
    let result = service
        .execute_code(&code, tests, language, mode)
        .await
        .context("execution failed")?;

    report(&result);
    Ok(())
}

async fn submit_code(
    config: Config,
    credential: Option<Credential>,
    source: &Path,
    language: &str,
    tests: &[TestCase],
    question: &str,
    submissions_dir: PathBuf,
) -> Result<()> {
    let code = read_source(source).await?;

    let store = Arc::new(DirectorySubmissionStore::new(submissions_dir));
    let service = prepare_service(config, credential, language, Some(store.clone())).await?;

    info!(%language, %question, tests = tests.len(), "submitting program");
    let (result, submission) = service
        .execute_and_submit(&code, tests, language, question)
        .await
        .context("submission failed")?;

    info!(
        id = %submission.id,
        status = %submission.overall_status,
        path = %store.dir().join(format!("{}.json", submission.id)).display(),
        "submission recorded"
    );
    report(&result);
    Ok(())
}

/// Print the formatted report and exit non-zero when a case failed
fn report(result: &CodeExecutionResult) {
    println!("{}", result.output);

    info!(
        passed = result.passed_count(),
        total = result.total_count(),
        backend = result.backend.as_deref().unwrap_or("unknown"),
        time = format_args!("{}ms", result.execution_time.unwrap_or_default()),
        "execution result"
    );

    if !result.all_passed() {
        std::process::exit(1);
    }
}

fn list_languages(config: Config, credential: Option<Credential>) -> Result<()> {
    let mut builder =
        ExecutionService::builder(config.clone()).runtime_manager(runtime_manager(&config));
    if let Some(credential) = credential {
        builder = builder.credential(credential);
    }
    let service = builder
        .build()
        .context("failed to set up execution service")?;

    println!("Configured languages:\n");

    for (id, status) in service.language_status() {
        let name = config
            .languages
            .get(&id)
            .map(|l| l.name.as_str())
            .unwrap_or_default();
        let backends: Vec<&str> = status.backends.iter().map(|b| b.name.as_str()).collect();
        let note = if status.requires_auth {
            " (requires auth)"
        } else {
            ""
        };
        println!(
            "  {:<12} {:<22} [{}]{}",
            id,
            name,
            backends.join(" -> "),
            note
        );
    }
    Ok(())
}

async fn preload(config: Config) -> Result<()> {
    let manager = runtime_manager(&config);
    manager.load_all().await;

    println!("Interpreter runtimes:\n");
    for status in manager.runtime_status() {
        let state = if status.loaded { "loaded" } else { "unavailable" };
        println!(
            "  {:<12} {:<12} {}",
            status.language,
            state,
            status.version.unwrap_or_default()
        );
    }
    Ok(())
}

fn show_config(config: &Config) {
    println!("Default resource limits:");
    println!(
        "  Wall time limit: {:?} s",
        config.default_limits.wall_time_limit
    );
    println!("  Max output: {:?} KB", config.default_limits.max_output);
    println!();
    println!(
        "Default test case limit: {}",
        config.execution.default_test_case_limit
    );
    println!("Execution timeout: {:?}", config.execution.timeout());
    println!();
    println!("Judge URL: {}", config.judge.url);
    println!(
        "Judge API key: {}",
        if config.judge.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!();
    match config.resource_root {
        Some(ref root) => println!("Resource root: {}", root.display()),
        None => println!("Resource root: working directory"),
    }
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
