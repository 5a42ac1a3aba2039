//! rewardgate admin tool
//!
//! Inspects and resets the verification state stored in a data directory.
//! Access control is the operator's responsibility.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use rewardgate_core::{GuardConfig, Profile, SystemClock, VerificationFacade};
use rewardgate_identity::HostDescriptors;
use rewardgate_store::SledStore;

/// rewardgate admin
///
/// Statistics, suspicious activity and reset for a local verification store.
#[derive(Parser, Debug)]
#[command(name = "rewardgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to data directory
    #[arg(short, long, env = "REWARDGATE_DATA_DIR", default_value = "./rewardgate-data")]
    data_dir: PathBuf,

    /// Threshold profile
    #[arg(long, env = "REWARDGATE_PROFILE", value_enum, default_value_t = ProfileArg::Production)]
    profile: ProfileArg,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REWARDGATE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "REWARDGATE_LOG_FORMAT", default_value = "plain")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ProfileArg {
    Production,
    Debug,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Production => Profile::Production,
            ProfileArg::Debug => Profile::Debug,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print usage statistics as JSON
    Stats,
    /// Print the suspicious activity log as JSON
    Log {
        /// Only show the most recent N entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print this device's fingerprint
    Fingerprint,
    /// Clear quotas, histories, metrics and logs
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("sled=warn".parse()?);

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

fn open_facade(args: &Args) -> Result<VerificationFacade> {
    if !args.data_dir.exists() {
        std::fs::create_dir_all(&args.data_dir).context("Failed to create data directory")?;
        info!(path = %args.data_dir.display(), "Created data directory");
    }

    let store = SledStore::open(&args.data_dir).context("Failed to open store")?;
    let config = GuardConfig::for_profile(args.profile.into());
    VerificationFacade::new(
        config,
        Arc::new(store),
        Arc::new(SystemClock),
        Box::new(HostDescriptors),
    )
    .context("Failed to initialize verification facade")
}

fn run(args: &Args) -> Result<()> {
    let facade = open_facade(args)?;

    match &args.command {
        Command::Stats => {
            let stats = facade.statistics().context("Failed to read statistics")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Log { limit } => {
            let mut entries = facade
                .suspicious_activities()
                .context("Failed to read activity log")?;
            if let Some(limit) = limit {
                let skip = entries.len().saturating_sub(*limit);
                entries.drain(..skip);
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Fingerprint => {
            println!("{}", facade.fingerprint());
            info!(origin = ?facade.fingerprint_origin(), "Fingerprint resolved");
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("Refusing to reset without --yes");
            }
            facade
                .reset_security_data()
                .context("Failed to reset security data")?;
            println!("Security data cleared");
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, &args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %args.data_dir.display(),
        profile = ?args.profile,
        "Starting rewardgate"
    );

    run(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_limit() {
        let args = Args::try_parse_from(["rewardgate", "--profile", "debug", "log", "--limit", "5"])
            .unwrap();
        assert_eq!(args.profile, ProfileArg::Debug);
        assert_eq!(args.command, Command::Log { limit: Some(5) });
    }

    #[test]
    fn test_reset_requires_confirmation() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = Args::try_parse_from([
            "rewardgate",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "reset",
        ])
        .unwrap();
        assert!(run(&args).is_err());
    }

    #[test]
    fn test_stats_on_fresh_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = Args::try_parse_from([
            "rewardgate",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "stats",
        ])
        .unwrap();
        run(&args).unwrap();
    }
}
