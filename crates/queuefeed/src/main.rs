// crates/queuefeed/src/main.rs

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use queuefeed_core::config::{Settings, API_KEY_VAR};
use queuefeed_core::dune::DuneClient;
use queuefeed_core::http::build_client;
use queuefeed_core::secret::{write_env_file, SecretString};
use queuefeed_core::source::{FileRecordSource, HttpRecordSource, RecordSource};
use queuefeed_core::{Job, JobContext, JobReport, Trigger};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Publishes Ethereum validator queue metrics to Dune", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the upload job (provision, materialize secret, fetch, clean, upload)
    Run(RunArgs),
    /// Fetch and clean the dataset, then write it as CSV without uploading
    Fetch(FetchArgs),
    /// Copy a secret from a process variable into an env file
    WriteEnv(WriteEnvArgs),
    /// Print the next scheduled run time in UTC
    NextRun,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TriggerArg {
    /// Detect from GitHub Actions variables
    Auto,
    Schedule,
    Manual,
    Push,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// What caused this run
    #[arg(long, value_enum, default_value_t = TriggerArg::Auto)]
    trigger: TriggerArg,
    /// Branch name for push triggers
    #[arg(long)]
    branch: Option<String>,
    /// Env file the API key is written to and read from
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Read records from a local JSON file instead of the source URL
    #[arg(long)]
    input: Option<PathBuf>,
    /// Write the CSV to --output instead of uploading it
    #[arg(long, requires = "output")]
    dry_run: bool,
    /// Destination CSV file for --dry-run
    #[arg(long, requires = "dry_run")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Destination CSV file
    #[arg(short, long)]
    output: PathBuf,
    /// Read records from a local JSON file instead of the source URL
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct WriteEnvArgs {
    /// Key written to the env file
    #[arg(long, default_value = API_KEY_VAR)]
    key: String,
    /// Process variable holding the value (defaults to --key)
    #[arg(long)]
    from_var: Option<String>,
    /// Env file to write (defaults to QUEUEFEED_ENV_FILE or .env)
    #[arg(long)]
    path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Run(args) => handle_run(settings, args).await,
        Command::Fetch(args) => handle_fetch(settings, args).await,
        Command::WriteEnv(args) => handle_write_env(settings, args),
        Command::NextRun => {
            let next = settings.trigger_policy().next_scheduled_after(Utc::now());
            println!("{}", next.to_rfc3339_opts(SecondsFormat::Secs, true));
            Ok(())
        }
    }
}

async fn handle_run(mut settings: Settings, args: RunArgs) -> Result<()> {
    if let Some(path) = args.env_file {
        settings.env_file = path;
    }

    let trigger = resolve_trigger(args.trigger, args.branch.as_deref())?;
    let http = build_client(settings.dune.timeout).context("failed to build HTTP client")?;
    let source = record_source(&settings, args.input, &http);

    let job = if args.dry_run {
        let output = args.output.context("--dry-run requires --output")?;
        Job::export(&settings, source, output)
    } else {
        let dune = DuneClient::with_client(&settings.dune.base_url, http);
        Job::upload(&settings, source, Arc::new(dune))
    };

    let secret = env::var(API_KEY_VAR)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::new);

    let report = job.run(trigger, JobContext::new(settings, secret)).await;
    finish(report)
}

async fn handle_fetch(settings: Settings, args: FetchArgs) -> Result<()> {
    let http = build_client(settings.dune.timeout).context("failed to build HTTP client")?;
    let source = record_source(&settings, args.input, &http);
    let job = Job::export(&settings, source, args.output);
    let report = job
        .run(Trigger::Manual, JobContext::new(settings, None))
        .await;
    finish(report)
}

fn handle_write_env(settings: Settings, args: WriteEnvArgs) -> Result<()> {
    let var = args.from_var.unwrap_or_else(|| args.key.clone());
    let value = env::var(&var).with_context(|| format!("{var} must be set"))?;
    let path = args.path.unwrap_or(settings.env_file);

    write_env_file(&path, &args.key, &SecretString::new(value))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), key = %args.key, "secret written to env file");
    Ok(())
}

fn resolve_trigger(arg: TriggerArg, branch: Option<&str>) -> Result<Trigger> {
    let trigger = match arg {
        TriggerArg::Auto => Trigger::from_ci_env(|key| env::var(key).ok())?,
        TriggerArg::Schedule => Trigger::parse("schedule", branch)?,
        TriggerArg::Manual => Trigger::parse("manual", branch)?,
        TriggerArg::Push => Trigger::parse("push", branch)?,
    };
    Ok(trigger)
}

fn record_source(
    settings: &Settings,
    input: Option<PathBuf>,
    http: &reqwest::Client,
) -> Arc<dyn RecordSource> {
    match input {
        Some(path) => Arc::new(FileRecordSource::new(path)),
        None => Arc::new(HttpRecordSource::new(
            settings.source_url.clone(),
            http.clone(),
        )),
    }
}

fn finish(report: JobReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.is_failure() {
        bail!("job {} failed", report.run_id);
    }
    Ok(())
}
