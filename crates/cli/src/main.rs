use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chess_coach_core::position::{parse_fen, STARTING_FEN};
use chess_coach_core::{analyze_position, corpus, refresh_corpus, Engine, EngineConfig, Tier};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Skill-tiered move advisor and pattern miner",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mine the tier corpora and write an engine snapshot
    Refresh {
        /// Directory holding <tier>_games.pgn files
        #[arg(long)]
        corpus_dir: Option<PathBuf>,

        /// Tier to load (repeatable)
        #[arg(long = "tier")]
        tiers: Vec<String>,

        /// Where to write the snapshot JSON
        #[arg(long, default_value = "engine.json")]
        out: PathBuf,

        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Suggest a move for a position
    Suggest {
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        tier: String,

        /// Position to move from (defaults to the starting position)
        #[arg(long, default_value = STARTING_FEN)]
        fen: String,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print training recommendations for a tier as JSON
    Recommend {
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        tier: String,
    },

    /// Evaluate a position
    Eval {
        #[arg(long)]
        fen: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Command::Refresh {
            corpus_dir,
            tiers,
            out,
            timeout_secs,
        } => {
            let corpus_dir = corpus_dir.unwrap_or(config.corpus_dir);
            let tiers: Vec<Tier> = if tiers.is_empty() {
                config.tiers
            } else {
                tiers.iter().map(|t| Tier::from(t.as_str())).collect()
            };
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(config.refresh_timeout_secs));

            let sources = corpus::load_dir(&corpus_dir, &tiers).await;
            if sources.is_empty() {
                anyhow::bail!("no tier corpus found in {}", corpus_dir.display());
            }

            let cancel = cancel_on_ctrl_c();
            let (engine, report) =
                refresh_corpus(sources, config.opening_plies, timeout, cancel).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            engine
                .save(&out)
                .await
                .with_context(|| format!("writing snapshot to {}", out.display()))?;
        }

        Command::Suggest {
            snapshot,
            tier,
            fen,
            seed,
        } => {
            let engine = read_snapshot(&snapshot).await?;
            let position = parse_fen(&fen)?;
            let mut rng = match seed.or(config.seed) {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };

            let mv = engine.suggest_for_position(&position, &Tier::from(tier.as_str()), &mut rng)?;
            println!("{}", mv);
        }

        Command::Recommend { snapshot, tier } => {
            let engine = read_snapshot(&snapshot).await?;
            let recommendations = engine.recommendations(&Tier::from(tier.as_str()))?;
            println!("{}", serde_json::to_string_pretty(&recommendations)?);
        }

        Command::Eval { fen } => {
            let position = parse_fen(&fen)?;
            let info = analyze_position(&position);
            println!("{} ({})", info.evaluation, info.side_to_move);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

async fn read_snapshot(path: &Path) -> anyhow::Result<Engine> {
    Engine::load(path)
        .await
        .with_context(|| format!("reading snapshot {}", path.display()))
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling refresh");
            trigger.cancel();
        }
    });
    token
}
