use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use ml_2048::config::AppConfig;
use ml_2048::training::metrics::{EpisodeResult, TrainingMetrics};
use ml_2048::training::{spawn, LoopCommand, LoopEvent, LoopHandle};

/// Train a 2048 value agent against its heuristic lookahead teacher.
#[derive(Parser)]
#[command(name = "ml-2048", about = "Train a 2048 value agent with heuristic lookahead")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of episodes to play before exiting
    #[arg(long, default_value_t = 100)]
    episodes: usize,

    /// Run at full speed (no per-step pacing, throttled reporting)
    #[arg(long)]
    speed: bool,

    /// Resume from a stored model before training
    #[arg(long)]
    resume: bool,

    /// Model store key for loading and the final save (store default when
    /// omitted)
    #[arg(long)]
    model_key: Option<String>,

    /// Override the lookahead depth
    #[arg(long)]
    depth: Option<usize>,
}

const EVENT_TIMEOUT: Duration = Duration::from_secs(600);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if cli.speed {
        config.game_loop.speed_mode = true;
    }
    if let Some(depth) = cli.depth {
        config.search.depth = depth;
    }
    config
        .validate()
        .context("validating config after CLI overrides")?;

    let total_episodes = cli.episodes;
    if total_episodes == 0 {
        bail!("--episodes must be >= 1");
    }

    let handle = spawn(config);
    handle.send(LoopCommand::Init);
    match wait_for(&handle, |e| matches!(e, LoopEvent::Ready { .. }))? {
        LoopEvent::Ready { backend } => println!("Agent ready (backend: {backend})"),
        _ => unreachable!(),
    }

    if cli.resume {
        handle.send(LoopCommand::LoadModel {
            key: cli.model_key.clone(),
        });
        match wait_for(&handle, |e| {
            matches!(e, LoopEvent::LoadDone | LoopEvent::Error { .. })
        })? {
            LoopEvent::LoadDone => println!("Model loaded"),
            LoopEvent::Error { message } => eprintln!("Resume failed: {message}"),
            _ => unreachable!(),
        }
    }

    println!("Playing {total_episodes} episodes...");
    println!("-------------------------------------------");

    handle.send(LoopCommand::StartGame {
        speed_mode: None,
        reward_weights: None,
    });

    let mut metrics = TrainingMetrics::new();
    let mut episode = 0;
    let mut best_tile = 0u32;
    let mut reports = 0usize;

    while episode < total_episodes {
        match handle.recv_timeout(EVENT_TIMEOUT) {
            Some(LoopEvent::Display { tiles, .. }) => {
                reports += 1;
                let max = tiles
                    .iter()
                    .filter(|t| !t.is_ghost())
                    .map(|t| t.value)
                    .max()
                    .unwrap_or(0);
                best_tile = best_tile.max(max);
            }
            Some(LoopEvent::TrainResult { loss }) => {
                if let Some(loss) = loss {
                    metrics.record_loss(loss);
                }
            }
            Some(LoopEvent::GameOver { score }) => {
                episode += 1;
                metrics.record_episode(EpisodeResult {
                    score,
                    steps: reports,
                    best_tile,
                });
                println!(
                    "Episode {}/{} | score: {} | best tile: {} | avg score(100): {:.1} | avg loss: {:.4}",
                    episode,
                    total_episodes,
                    score,
                    best_tile,
                    metrics.average_score(100),
                    metrics.average_loss(100),
                );
                best_tile = 0;
                reports = 0;
                if episode < total_episodes {
                    handle.send(LoopCommand::ResetGame {
                        speed_mode: None,
                        reward_weights: None,
                    });
                }
            }
            Some(LoopEvent::Error { message }) => eprintln!("Loop error: {message}"),
            Some(_) => {}
            None => bail!("training loop stopped responding"),
        }
    }

    println!("-------------------------------------------");
    println!(
        "Done. Episodes: {} | best score: {} | best tile: {}",
        metrics.total_episodes(),
        metrics.best_score(),
        metrics.best_tile(),
    );

    handle.send(LoopCommand::SaveModel {
        key: cli.model_key.clone(),
    });
    match wait_for(&handle, |e| {
        matches!(e, LoopEvent::SaveDone | LoopEvent::Error { .. })
    })? {
        LoopEvent::SaveDone => println!("Model saved"),
        LoopEvent::Error { message } => eprintln!("Final save failed: {message}"),
        _ => unreachable!(),
    }

    handle.send(LoopCommand::StopGame);
    handle.shutdown();
    Ok(())
}

/// Wait for the next event matching the predicate, skipping the rest.
fn wait_for<F>(handle: &LoopHandle, predicate: F) -> Result<LoopEvent>
where
    F: Fn(&LoopEvent) -> bool,
{
    loop {
        match handle.recv_timeout(EVENT_TIMEOUT) {
            Some(event) if predicate(&event) => return Ok(event),
            Some(_) => continue,
            None => bail!("training loop stopped responding"),
        }
    }
}
