// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless Tally leaderboard.
//!
//! `watch` polls the service and prints the ranked board with change markers;
//! the admin subcommands run one optimistic mutation against a freshly fetched
//! snapshot and print the resulting notice.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tally_app_core::config::ConfigService;
use tally_app_core::prefs::{BoardPrefs, RollbackPolicy};
use tally_app_core::toast::ToastService;
use tally_client::HttpPlayerService;
use tally_config_fs::FsConfigStore;
use tally_sync::{
    lock, refresh_once, shared, MutationManager, MutationOutcome, PlayerId, PollConfig, PollScheduler,
    SharedStore, SnapshotStore, StatField, TempIdAllocator,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;
mod settings;

use settings::Overrides;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tally leaderboard board and admin tool")]
struct Args {
    /// Base URL of the leaderboard service
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Admin token for mutating commands (overrides the saved one)
    #[arg(long, global = true, env = "TALLY_ADMIN_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Poll interval in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,
    /// How failed mutations interact with refreshes that landed meanwhile
    #[arg(long, global = true, value_enum)]
    rollback_policy: Option<PolicyArg>,
    /// Config directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll and print the board until interrupted
    Watch {
        /// Fetch once, print, and exit
        #[arg(long)]
        once: bool,
    },
    /// Verify an admin token and save it
    Login {
        /// Token to verify
        token: String,
    },
    /// Create a player
    Create {
        /// Display name
        name: String,
    },
    /// Set a player's balance (or adjust it with --add)
    Balance {
        /// Player id
        id: PlayerId,
        /// New balance, or the amount to add with --add
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// Treat the amount as a delta
        #[arg(long)]
        add: bool,
    },
    /// Record a win
    Win {
        /// Player id
        id: PlayerId,
        /// Signed change
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        delta: i64,
    },
    /// Record a loss
    Loss {
        /// Player id
        id: PlayerId,
        /// Signed change
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        delta: i64,
    },
    /// Delete a player
    Delete {
        /// Player id
        id: PlayerId,
    },
    /// Print the resolved preferences
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    LastWriterWins,
    VersionGuarded,
}

impl From<PolicyArg> for RollbackPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LastWriterWins => Self::LastWriterWins,
            PolicyArg::VersionGuarded => Self::VersionGuarded,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(io::stderr)
        .init();

    // Config (best-effort)
    let config = match &args.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .map(ConfigService::new)
    .map_err(|err| warn!(%err, "config store unavailable; using defaults"))
    .ok();

    let overrides = Overrides {
        endpoint: args.endpoint,
        token: args.token,
        poll_interval_ms: args.poll_interval_ms,
        rollback_policy: args.rollback_policy.map(Into::into),
    };
    let prefs = overrides.apply(settings::load(config.as_ref()));

    let mut remote = HttpPlayerService::new(&prefs.endpoint).context("invalid endpoint")?;
    if let Some(token) = &prefs.admin_token {
        remote = remote.with_token(token.clone());
    }
    let remote = Arc::new(remote);
    let store = shared(SnapshotStore::new(prefs.highlight_window()));

    match args.command {
        Command::Watch { once } => watch(&prefs, store, remote, once).await,
        Command::Login { token } => {
            let candidate = remote.as_ref().clone().with_token(token.clone());
            if !candidate.verify_token().await.context("could not reach the service")? {
                bail!("token rejected");
            }
            let config = config.context("no config store to save the token into")?;
            settings::store_token(&config, &token).context("saving token")?;
            info!("admin token verified and saved");
            Ok(())
        }
        Command::Config => {
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &redacted(&prefs))?;
            writeln!(out)?;
            Ok(())
        }
        command => admin(&prefs, store, remote, command).await,
    }
}

fn redacted(prefs: &BoardPrefs) -> BoardPrefs {
    BoardPrefs {
        admin_token: prefs.admin_token.as_ref().map(|_| "<redacted>".into()),
        ..prefs.clone()
    }
}

async fn watch(prefs: &BoardPrefs, store: SharedStore, remote: Arc<HttpPlayerService>, once: bool) -> Result<()> {
    if once {
        refresh_once(&store, remote.as_ref()).await.context("fetching leaderboard")?;
        return print_board(&store);
    }

    let handle = PollScheduler::new(Arc::clone(&store), remote, PollConfig::from(prefs)).spawn();
    let mut updates = handle.subscribe();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(_) => print_board(&store)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "board updates lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    handle.shutdown().await;
    lock(&store).close();
    Ok(())
}

fn print_board(store: &SharedStore) -> Result<()> {
    let store = lock(store);
    let mut out = io::stdout().lock();
    render::board(&mut out, &store, Instant::now())?;
    writeln!(out)?;
    Ok(())
}

async fn admin(prefs: &BoardPrefs, store: SharedStore, remote: Arc<HttpPlayerService>, command: Command) -> Result<()> {
    refresh_once(&store, remote.as_ref()).await.context("fetching leaderboard")?;

    let toasts = Arc::new(Mutex::new(ToastService::new(8)));
    let manager = MutationManager::new(Arc::clone(&store), remote, toasts.clone(), TempIdAllocator::new())
        .with_policy(prefs.rollback_policy);

    let outcome = match command {
        Command::Create { name } => manager.create_optimistic(&name).await,
        Command::Balance { id, amount, add: false } => manager.update_balance_optimistic(&id, amount).await,
        Command::Balance { id, amount, add: true } => manager.adjust_balance(&id, amount).await,
        Command::Win { id, delta } => manager.adjust_stat_optimistic(&id, StatField::Wins, delta).await,
        Command::Loss { id, delta } => manager.adjust_stat_optimistic(&id, StatField::Losses, delta).await,
        Command::Delete { id } => manager.delete_optimistic(&id).await,
        Command::Watch { .. } | Command::Login { .. } | Command::Config => return Ok(()),
    };

    {
        let toasts = toasts.lock().unwrap_or_else(|e| e.into_inner());
        render::toasts(&mut io::stdout().lock(), &toasts, Instant::now())?;
    }
    match outcome {
        MutationOutcome::Confirmed { id } => {
            info!(%id, "mutation confirmed");
            print_board(&store)
        }
        MutationOutcome::RolledBack { reason } => bail!("rolled back: {reason}"),
        MutationOutcome::Rejected(err) => bail!("rejected: {err}"),
    }
}
