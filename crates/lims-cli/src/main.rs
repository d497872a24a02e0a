//! `lims` command line
//!
//! Seeds an in-memory store from a JSON fixture and performs a slot copy
//! request against it.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lims_model::{TransferRequest, User};
use lims_store::Fixture;
use lims_transfer::{LogStoreService, SlotCopyService, TransferConfig, TransferError, TransferRules};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How a command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Done,
    Rejected,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Done => ExitCode::SUCCESS,
            Status::Rejected => ExitCode::from(1),
        }
    }
}

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Transfer configuration (TOML); defaults apply if omitted");

    Command::new("lims")
        .version(lims_transfer::VERSION)
        .about("Labware slot-copy engine")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log as JSON lines"),
        )
        .subcommand(
            Command::new("transfer")
                .about("Perform a slot copy request against a seeded store")
                .arg(
                    Arg::new("fixture")
                        .long("fixture")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON fixture to seed the store from"),
                )
                .arg(
                    Arg::new("request")
                        .long("request")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON slot copy request"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .required(true)
                        .help("Username recorded on the operations"),
                )
                .arg(config.clone()),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate and print the effective configuration")
                .arg(config),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match run(&matches).await {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<Status> {
    match matches.subcommand() {
        Some(("transfer", args)) => transfer(args).await,
        Some(("check-config", args)) => check_config(args),
        _ => anyhow::bail!("no command given"),
    }
}

fn load_config(args: &ArgMatches) -> Result<TransferConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => TransferConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(TransferConfig::default()),
    }
}

fn required_path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("--{name} is required"))
}

fn load_request(path: &Path) -> Result<TransferRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing request {}", path.display()))
}

async fn transfer(args: &ArgMatches) -> Result<Status> {
    let config = load_config(args)?;
    let fixture_path = required_path(args, "fixture")?;
    let db = Fixture::load(fixture_path)
        .and_then(Fixture::into_database)
        .with_context(|| format!("seeding store from {}", fixture_path.display()))?;
    let request = load_request(required_path(args, "request")?)?;
    let user = User::new(
        args.get_one::<String>("user")
            .context("--user is required")?
            .as_str(),
    );

    let service = SlotCopyService::new(Arc::new(db), config, Arc::new(LogStoreService))?;
    match service.perform_detailed(&user, &request).await {
        Ok(outcome) => {
            if let Some(err) = &outcome.eviction_error {
                tracing::warn!(error = %err, evicted = ?outcome.evicted, "storage not updated");
            }
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
            Ok(Status::Done)
        }
        Err(TransferError::Validation(err)) => {
            eprintln!("{}", err.message());
            for problem in err.problems() {
                eprintln!("  - {problem}");
            }
            Ok(Status::Rejected)
        }
        Err(err) => Err(err.into()),
    }
}

fn check_config(args: &ArgMatches) -> Result<Status> {
    let config = load_config(args)?;
    TransferRules::from_config(config.clone())?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(Status::Done)
}
