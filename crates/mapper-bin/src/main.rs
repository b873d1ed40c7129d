//! Mapper entrypoint: a headless driver for the estimation core.
//!
//! The production surface embeds the core behind a rendering UI; this
//! binary wires the same components to a scripted session so the whole
//! pipeline (loader → estimators → sampler → recommender → persistence)
//! can be exercised and inspected from a terminal.

use anyhow::{Context, Result};
use clap::Parser;
use core_actions::{NoopRenderer, SessionAction, SessionModel, dispatch};
use core_loader::{LoadHooks, LoadProgress, Loader};
use core_state::{ProgressRestored, open_or_memory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "mapper", version, about = "Knowledge-map estimation core")]
struct Args {
    /// Domain to activate at startup.
    #[arg(long, default_value = "all")]
    pub domain: String,
    /// Number of simulated quiz rounds to run.
    #[arg(long, default_value_t = 12)]
    pub rounds: usize,
    /// Optional configuration file path (overrides discovery of
    /// `mapper.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Optional export blob to import before the session starts.
    #[arg(long = "import")]
    pub import: Option<PathBuf>,
    /// Print the export blob on exit.
    #[arg(long, default_value_t = false)]
    pub export: bool,
}

fn configure_logging(filter_fallback: Option<&str>, log_dir: &std::path::Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_fallback.unwrap_or("info")));

    match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(log_dir, "mapper.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            // No writable log dir: fall back to stderr so startup still
            // reports what it is doing.
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn install_panic_hook() {
    let default = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(target: "runtime", panic = %info, "panic");
        default(info);
    }));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = core_config::load_from(args.config.clone())?;

    let _log_guard = configure_logging(
        config.file.log.filter.as_deref(),
        &config.file.storage.dir.join("logs"),
    );
    install_panic_hook();
    info!(target: "runtime", "startup");

    let storage = open_or_memory(&config.file.storage.dir);
    let (mut model, gate) = SessionModel::new(storage);
    let mut renderer = NoopRenderer;
    if gate == ProgressRestored::Incompatible {
        warn!(target: "runtime", "stored progress was incompatible and has been cleared");
    }

    if let Some(path) = &args.import {
        let blob = std::fs::read_to_string(path)
            .with_context(|| format!("reading import blob {}", path.display()))?;
        let result = dispatch(SessionAction::ImportHistory { blob }, &mut model, &mut renderer);
        if !result.history_appended {
            anyhow::bail!("import blob was rejected; see the log for details");
        }
        info!(target: "runtime", "imported response history");
    }

    let loader = Arc::new(
        Loader::new(&config.file.data.dir).with_throttle(config.progress_throttle()),
    );
    let background = loader.start_background_load();

    let registry = loader.registry().await.context("loading domain registry")?;
    info!(
        target: "runtime.startup",
        domains = registry.domains.len(),
        domain = args.domain.as_str(),
        "registry ready"
    );

    let hooks = LoadHooks {
        on_progress: Some(Box::new(|p: &LoadProgress| {
            info!(
                target: "loader",
                domain = p.domain_id.as_str(),
                loaded = p.loaded_bytes,
                total = p.total_bytes,
                "bundle bytes"
            );
        })),
        ..Default::default()
    };
    let bundle = loader
        .load(&args.domain, &hooks)
        .await
        .with_context(|| format!("loading domain bundle `{}`", args.domain))?;

    dispatch(
        SessionAction::SwitchDomain { bundle },
        &mut model,
        &mut renderer,
    );

    let _ = background.await;
    match loader.videos().await {
        Ok(videos) => model.install_videos(videos.as_slice()),
        Err(err) => warn!(target: "runtime", error = %err, "continuing without video catalog"),
    }

    run_scripted_session(&mut model, &mut renderer, args.rounds);

    report(&model);
    if args.export {
        let result = dispatch(SessionAction::Export, &mut model, &mut renderer);
        if let Some(blob) = result.export {
            println!("{blob}");
        }
    }
    Ok(())
}

/// Simulated learner: answers correctly when the question's difficulty
/// sits at or below 2, otherwise picks a wrong option; every fourth
/// round skips instead. Deterministic so repeated runs compare.
fn run_scripted_session(model: &mut SessionModel, renderer: &mut NoopRenderer, rounds: usize) {
    for round in 0..rounds {
        let Some(selection) = model.select_next_question(None) else {
            info!(target: "runtime.session", round, "no unanswered questions remain");
            break;
        };
        let Some(question) = model
            .active_bundle()
            .and_then(|b| b.question(&selection.question_id))
            .cloned()
        else {
            break;
        };

        let action = if round % 4 == 3 {
            SessionAction::Skip {
                question_id: question.id.clone(),
            }
        } else if question.difficulty() <= 2 {
            SessionAction::Answer {
                question_id: question.id.clone(),
                selected: question.correct,
            }
        } else {
            let wrong = question
                .options
                .keys()
                .copied()
                .find(|l| *l != question.correct)
                .unwrap_or(question.correct);
            SessionAction::Answer {
                question_id: question.id.clone(),
                selected: wrong,
            }
        };

        let result = dispatch(action, model, renderer);
        info!(
            target: "runtime.session",
            round,
            question = question.id.as_str(),
            score = selection.score,
            cell_x = selection.cell.0,
            cell_y = selection.cell.1,
            estimates_updated = result.estimates_updated,
            "round complete"
        );
    }
}

fn report(model: &SessionModel) {
    let answered = model.atoms.answered_ids().len();
    info!(
        target: "runtime.session",
        answered,
        coverage = model.atoms.coverage(),
        evidence_coverage = model.atoms.evidence_coverage(),
        insights = model.atoms.insights_available(),
        "session summary"
    );

    let watched = model.atoms.watched_videos.get();
    for ranked in model.recommender().rank(model.videos(), &watched) {
        info!(
            target: "runtime.session",
            video = ranked.video_id.as_str(),
            score = ranked.score,
            watched = ranked.watched,
            "recommendation"
        );
    }
}
