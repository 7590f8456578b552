//! Command-line interface.

mod activity;
mod chain;
mod doctor;
mod init;
mod policy;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::activity::ActivityJournal;
use crate::config::Config;
use crate::net::{CancelSignal, cancel_pair};
use crate::store::FileStore;

pub use self::doctor::run_doctor_command;
pub use self::init::InitArgs;

/// starkclaw - policy-gated Starknet actions
#[derive(Parser, Debug)]
#[command(name = "starkclaw")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: ~/.starkclaw/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the config file and store API keys
    Init(InitArgs),

    /// Session policy target helpers
    #[command(subcommand)]
    Policy(PolicyCommand),

    /// Cairo ByteArray encoding
    #[command(subcommand)]
    Codec(CodecCommand),

    /// Look up an agent in the identity registry
    Identity {
        /// Agent id, decimal or 0x hex
        agent_id: String,
    },

    /// Classify a transaction receipt
    TxStatus {
        /// Transaction hash
        hash: String,

        /// Poll until the transaction settles
        #[arg(long)]
        wait: bool,

        /// Seconds between polls
        #[arg(long, default_value_t = 3)]
        interval: u64,

        /// Maximum number of polls
        #[arg(long, default_value_t = 40)]
        max_attempts: u32,
    },

    /// Gas sponsorship service
    #[command(subcommand)]
    Paymaster(PaymasterCommand),

    /// Execute a prepared action through the remote signer
    Execute {
        /// JSON file holding the prepared action
        #[arg(long)]
        action: PathBuf,

        /// Mobile action id (generated when omitted)
        #[arg(long)]
        mobile_action_id: Option<String>,

        /// Padded session targets to enforce, comma separated
        #[arg(long, value_delimiter = ',')]
        session_targets: Option<Vec<String>>,

        /// Require the action to be sponsorship eligible
        #[arg(long)]
        sponsored: bool,
    },

    /// Activity journal
    #[command(subcommand)]
    Activity(ActivityCommand),

    /// Run heartbeat routines until interrupted
    Watch {
        /// Override the configured tick interval, in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Probe configuration and external services
    Doctor {
        /// Exit non-zero when any check fails
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Pad targets to the four on-chain slots
    Pad { targets: Vec<String> },

    /// Drop zero-address slots
    Unpad { slots: Vec<String> },

    /// Classify a target set against the known presets
    Detect {
        #[arg(long, default_value = "sepolia")]
        network: String,
        targets: Vec<String>,
    },

    /// Display label for an address
    Label { address: String },
}

#[derive(Subcommand, Debug)]
pub enum CodecCommand {
    /// Encode text as ByteArray felts
    Encode { text: String },

    /// Decode ByteArray felts back to text
    Decode { felts: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum PaymasterCommand {
    /// Probe service availability
    Status,

    /// Check local sponsorship eligibility
    Check {
        /// Action kind, e.g. transfer or swap
        #[arg(long)]
        kind: String,

        /// Entrypoints the action calls
        #[arg(long = "entrypoint")]
        entrypoints: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
    /// List journal entries, newest first
    List {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,

        /// Print raw JSON records
        #[arg(long)]
        json: bool,
    },

    /// Export the journal as an audit bundle
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = self.config;
        match self.command {
            Command::Init(args) => init::run(config_path, args),
            Command::Policy(cmd) => policy::run_policy(cmd),
            Command::Codec(cmd) => policy::run_codec(cmd),
            Command::Identity { agent_id } => {
                chain::identity(&load_config(config_path)?, &agent_id).await
            }
            Command::TxStatus {
                hash,
                wait,
                interval,
                max_attempts,
            } => {
                let config = load_config(config_path)?;
                chain::tx_status(&config, &hash, wait, interval, max_attempts).await
            }
            Command::Paymaster(cmd) => chain::paymaster(config_path, cmd).await,
            Command::Execute {
                action,
                mobile_action_id,
                session_targets,
                sponsored,
            } => {
                let config = load_config(config_path)?;
                activity::execute(
                    &config,
                    &action,
                    mobile_action_id.as_deref(),
                    session_targets,
                    sponsored,
                )
                .await
            }
            Command::Activity(cmd) => activity::run(&load_config(config_path)?, cmd).await,
            Command::Watch { interval } => {
                let config = load_config(config_path)?;
                chain::watch(&config, interval.map(Duration::from_secs)).await
            }
            Command::Doctor { strict } => run_doctor_command(config_path, strict).await,
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Ok(Config::from_env_with_toml(path.as_deref())?)
}

fn open_journal(config: &Config) -> ActivityJournal {
    ActivityJournal::new(Arc::new(FileStore::new(config.journal.store_path.clone())))
}

/// Signal that fires on Ctrl-C. Keep the returned task alive while waiting.
fn ctrl_c_signal() -> (CancelSignal, tokio::task::JoinHandle<()>) {
    let (handle, signal) = cancel_pair();
    let task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            handle.cancel();
        }
    });
    (signal, task)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn execute_parses_session_targets() {
        let cli = Cli::parse_from([
            "starkclaw",
            "execute",
            "--action",
            "action.json",
            "--session-targets",
            "0x1,0x2,0x0,0x0",
            "--sponsored",
        ]);
        match cli.command {
            Command::Execute {
                session_targets,
                sponsored,
                mobile_action_id,
                ..
            } => {
                assert_eq!(session_targets.unwrap().len(), 4);
                assert!(sponsored);
                assert!(mobile_action_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn init_accepts_signer_flags() {
        let cli = Cli::parse_from([
            "starkclaw",
            "init",
            "--network",
            "mainnet",
            "--signer-url",
            "https://signer.example.com",
            "--signer-requester",
            "mobile",
        ]);
        match cli.command {
            Command::Init(args) => {
                assert_eq!(args.network.as_deref(), Some("mainnet"));
                assert_eq!(args.signer_requester.as_deref(), Some("mobile"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn watch_interval_is_optional() {
        let cli = Cli::parse_from(["starkclaw", "watch"]);
        assert!(matches!(cli.command, Command::Watch { interval: None }));
        let cli = Cli::parse_from(["starkclaw", "watch", "--interval", "30"]);
        assert!(matches!(cli.command, Command::Watch { interval: Some(30) }));
    }

    #[test]
    fn tx_status_defaults() {
        let cli = Cli::parse_from(["starkclaw", "tx-status", "0xabc", "--wait"]);
        match cli.command {
            Command::TxStatus {
                wait,
                interval,
                max_attempts,
                ..
            } => {
                assert!(wait);
                assert_eq!(interval, 3);
                assert_eq!(max_attempts, 40);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
