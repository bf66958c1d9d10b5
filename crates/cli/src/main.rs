mod config;
mod error;

use std::path::{Path, PathBuf};

use audit::{AuditRecord, AuditStore};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use rules::{Request, Ruleset, Suite};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "sierra-rules.toml";

#[derive(Parser)]
#[command(name = "sierra-rules")]
#[command(about = "Evaluate and test document access rules", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single request fixture (JSON)
    Check {
        /// Request file with principal, operation and resource
        request: PathBuf,
        /// Rules file overriding the configured rules
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Do not record the decision in the audit trail
        #[arg(long)]
        no_audit: bool,
    },
    /// Run a scenario suite (TOML)
    Test {
        /// Suite file with [[case]] entries
        suite: PathBuf,
        /// Rules file overriding the configured rules
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Show recorded decisions
    Audit {
        /// Show only the last N decisions
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Show denials only
        #[arg(long)]
        denied: bool,
    },
    /// Print the effective rules as TOML
    Rules {
        /// Rules file overriding the configured rules
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check {
            request,
            rules,
            no_audit,
        } => cmd_check(&config, &request, rules.as_deref(), no_audit),
        Commands::Test { suite, rules } => cmd_test(&config, &suite, rules.as_deref()),
        Commands::Audit { limit, denied } => cmd_audit(&config, limit, denied),
        Commands::Rules { rules } => cmd_rules(&config, rules.as_deref()),
    }
}

fn cmd_check(config: &Config, request: &Path, rules: Option<&Path>, no_audit: bool) -> Result<()> {
    let rules = effective_rules(config, rules)?;
    let request = Request::from_json(&std::fs::read_to_string(request)?)?;
    let decision = rules.evaluate_request(&request);

    println!("{decision}");

    if config.audit.enabled && !no_audit {
        let path = config.audit_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let store = AuditStore::open(&path)?;
        store.record(&AuditRecord::new(
            &request.principal,
            request.operation,
            &request.resource,
            &decision,
        ))?;
        tracing::info!(path = %path.display(), "decision recorded");
    }

    Ok(())
}

fn cmd_test(config: &Config, suite: &Path, rules: Option<&Path>) -> Result<()> {
    let rules = effective_rules(config, rules)?;
    let suite = Suite::load(suite)?;
    let report = suite.run(&rules);

    for outcome in &report.outcomes {
        let status = if outcome.passed { "ok" } else { "FAILED" };
        println!("{status:<6}  {}  -> {}", outcome.name, outcome.decision);
    }

    let failed = report.failures().count();
    let total = report.outcomes.len();
    println!("\n{} passed, {failed} failed", total - failed);

    if failed > 0 {
        return Err(Error::SuiteFailed { failed, total });
    }
    Ok(())
}

fn cmd_audit(config: &Config, limit: usize, denied: bool) -> Result<()> {
    let path = config.audit_path()?;
    if !path.exists() {
        return Err(Error::AuditNotFound { path });
    }
    let store = AuditStore::open(&path)?;

    let records = if denied {
        store.denials(limit)?
    } else {
        store.recent(limit)?
    };

    if records.is_empty() {
        println!("No decisions recorded.");
        return Ok(());
    }

    println!(
        "{:<19}  {:<12}  {:<14}  {:<20}  {:<6}  REASON",
        "TIME", "SUBJECT", "COLLECTION", "DOCUMENT", "OP"
    );
    println!("{}", "-".repeat(100));

    for record in records {
        let time = Local
            .from_utc_datetime(&record.timestamp.naive_utc())
            .format("%Y-%m-%d %H:%M:%S");
        println!(
            "{time:<19}  {:<12}  {:<14}  {:<20}  {:<6}  {}",
            record.subject_id,
            record.collection,
            record.document_id,
            record.operation.as_str(),
            record.reason
        );
    }

    let counts = store.counts()?;
    println!(
        "\n{} allowed, {} denied in total",
        counts.allowed, counts.denied
    );

    Ok(())
}

fn cmd_rules(config: &Config, rules: Option<&Path>) -> Result<()> {
    let rules = effective_rules(config, rules)?;
    print!("{}", rules.to_toml()?);
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default_config())
    }
}

fn effective_rules(config: &Config, path: Option<&Path>) -> Result<Ruleset> {
    match path {
        Some(path) => Ok(Ruleset::load(path)?),
        None => Ok(config.rules.clone()),
    }
}
