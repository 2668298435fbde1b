pub mod db;
pub mod error;
pub mod models;
pub mod persistence;
pub mod schedule;
pub mod settings;
pub mod timer;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};

use db::Database;
use models::ShowPlan;
use persistence::{MemoryRemoteStore, PersistenceCoordinator, RemoteStore, SupabaseRemoteStore};
use settings::{EngineSettings, SettingsStore};
use timer::{commands, Clock, Phase, PlanController, SystemClock, TimelineState, TimelineView};

/// Live show timeline: segment scheduling, deviation tracking and durable timer state.
#[derive(Parser, Debug)]
#[command(name = "show-timeline")]
#[command(about = "Run a segmented live show plan against the clock")]
pub struct Cli {
    /// Settings file (default: <data-dir>/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the local database and settings
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Activate a plan from a JSON file and drive it from stdin
    Run {
        /// Show plan JSON
        #[arg(long)]
        plan: PathBuf,

        /// Overrides the plan's show id for remote sync
        #[arg(long)]
        show_id: Option<String>,

        /// Host identity used to address the remote record
        #[arg(long)]
        host_id: Option<String>,

        /// Leave the timer paused after activation
        #[arg(long, default_value = "false")]
        no_auto_start: bool,
    },
    /// Restore the last active plan after a restart
    Resume,
    /// Print the stored show state without starting timers
    Status,
    /// List recorded show runs
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

struct AppState {
    db: Database,
    settings: EngineSettings,
}

impl AppState {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| anyhow!("no data directory on this platform; pass --data-dir"))?
                .join("show-timeline"),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let settings_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("settings.json"));
        let settings = SettingsStore::new(settings_path)?
            .settings()
            .with_env_overrides();

        let db = Database::new(data_dir.join("show-timeline.sqlite3"))?;
        Ok(Self { db, settings })
    }

    fn remote_store(&self) -> anyhow::Result<Arc<dyn RemoteStore>> {
        match self.settings.supabase_credentials() {
            Some((url, key)) => {
                let store = SupabaseRemoteStore::new(url, key, &self.settings.remote_table)?;
                Ok(Arc::new(store))
            }
            None => {
                warn!("No Supabase credentials configured; remote sync stays in memory");
                Ok(Arc::new(MemoryRemoteStore::new()))
            }
        }
    }

    fn coordinator(&self) -> anyhow::Result<PersistenceCoordinator> {
        Ok(PersistenceCoordinator::new(
            Arc::new(self.db.clone()),
            self.remote_store()?,
            self.settings.local_state_key.clone(),
        ))
    }

    fn controller(&self, settings: EngineSettings) -> anyhow::Result<PlanController> {
        let controller = PlanController::new(settings, self.coordinator()?, Arc::new(SystemClock))
            .with_journal(Arc::new(self.db.clone()));
        Ok(controller)
    }
}

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let state = AppState::open(&cli)?;
    info!("Show timeline starting up (data at {})", state.db.path().display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(execute(cli.command, state))
}

async fn execute(command: Command, state: AppState) -> anyhow::Result<()> {
    match command {
        Command::Run {
            plan,
            show_id,
            host_id,
            no_auto_start,
        } => {
            let raw = std::fs::read_to_string(&plan)
                .with_context(|| format!("failed to read plan {}", plan.display()))?;
            let mut plan = ShowPlan::from_json(&raw)
                .with_context(|| format!("failed to parse plan {}", plan.display()))?;
            if show_id.is_some() {
                plan.show_id = show_id;
            }

            let mut settings = state.settings.clone();
            if no_auto_start {
                settings.auto_start_on_activate = false;
            }

            if state.coordinator()?.load_local().await.is_some() {
                return Err(anyhow!(
                    "a show is already active; use `resume` or end it first"
                ));
            }
            let controller = state.controller(settings)?;
            controller.activate(plan, host_id).await?;
            commands::interactive(controller).await
        }
        Command::Resume => {
            let controller = state.controller(state.settings.clone())?;
            if controller.restore().await?.is_none() {
                println!("No stored show to resume.");
                return Ok(());
            }
            commands::interactive(controller).await
        }
        Command::Status => {
            let coordinator = state.coordinator()?;
            match coordinator.load_local().await {
                Some(snapshot) => {
                    let now = SystemClock.now();
                    let timeline = TimelineState::restore(&snapshot, now);
                    let phase = if timeline.is_running() {
                        Phase::Running
                    } else {
                        Phase::Paused
                    };
                    let view = TimelineView::build(phase, Some(&snapshot.plan), &timeline, now);
                    commands::print_view(&view);
                    println!("  last saved {}", snapshot.last_updated.to_rfc3339());
                }
                None => println!("No active show."),
            }
            Ok(())
        }
        Command::History { limit } => {
            let runs = state.db.list_show_runs(limit).await?;
            if runs.is_empty() {
                println!("No recorded shows.");
            }
            for run in runs {
                println!(
                    "{}  {:<32} {:>6.1} min  segment {}/{}",
                    run.ended_at.format("%Y-%m-%d %H:%M"),
                    run.title,
                    run.elapsed_minutes,
                    run.planned_segments_reached(),
                    run.segment_count
                );
            }
            Ok(())
        }
    }
}
