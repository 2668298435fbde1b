use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    error::TimelineError,
    models::{LocalSnapshot, RemoteKey, ShowHealth, ShowPlan, ShowRun, TimerStateProjection},
    persistence::{PersistenceCoordinator, RunJournal, SyncOutcome, SyncPayload},
    schedule::timing,
    settings::EngineSettings,
};

use super::{
    state::{Clock, Phase, TimelineState},
    view::TimelineView,
};

#[derive(Default)]
struct EngineState {
    phase: Phase,
    plan: Option<ShowPlan>,
    timeline: TimelineState,
    health: ShowHealth,
    host_id: Option<String>,
    activated_at: Option<DateTime<Utc>>,
    ticks: u32,
}

impl EngineState {
    fn ensure_active(&self) -> Result<&ShowPlan, TimelineError> {
        match self.phase {
            Phase::Idle => Err(TimelineError::NoActivePlan),
            Phase::Ended => Err(TimelineError::ShowEnded),
            Phase::Running | Phase::Paused => {
                self.plan.as_ref().ok_or(TimelineError::NoActivePlan)
            }
        }
    }

    fn remote_key(&self) -> Option<RemoteKey> {
        let show_id = self.plan.as_ref()?.show_id.clone()?;
        let host_id = self.host_id.clone()?;
        Some(RemoteKey::new(show_id, host_id))
    }

    fn local_snapshot(&self, now: DateTime<Utc>) -> Option<LocalSnapshot> {
        let plan = self.plan.as_ref()?;
        Some(LocalSnapshot {
            plan: plan.clone(),
            segment_index: self.timeline.current_segment_index,
            elapsed_minutes: self.timeline.elapsed_minutes(now),
            timer_running: self.timeline.is_running(),
            accumulated_minutes: Some(self.timeline.clock.accumulated_minutes),
            host_id: self.host_id.clone(),
            activated_at: self.activated_at,
            last_updated: now,
        })
    }

    fn sync_payload(&self, now: DateTime<Utc>) -> Option<SyncPayload> {
        if !self.phase.has_active_plan() {
            return None;
        }
        let plan = self.plan.as_ref()?;
        Some(SyncPayload {
            key: self.remote_key()?,
            segments: plan.segments.clone(),
            health: self.health.clone(),
            timer: TimerStateProjection {
                current_segment_index: self.timeline.current_segment_index,
                elapsed_minutes: self.timeline.elapsed_minutes(now),
                timer_running: self.timeline.is_running(),
                last_updated: now,
            },
        })
    }

    fn view(&self, now: DateTime<Utc>) -> TimelineView {
        TimelineView::build(self.phase, self.plan.as_ref(), &self.timeline, now)
    }
}

struct SyncTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl SyncTask {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Drives one show plan through `Idle → Running ⇄ Paused → Ended`.
///
/// Owns at most one tick task and one remote sync task. The tick task and
/// the sync loop exist only while `Running`; activating without auto-start
/// runs a single tracked sync in the same slot.
#[derive(Clone)]
pub struct PlanController {
    state: Arc<Mutex<EngineState>>,
    persistence: Arc<PersistenceCoordinator>,
    journal: Option<Arc<dyn RunJournal>>,
    clock: Arc<dyn Clock>,
    settings: Arc<EngineSettings>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    syncer: Arc<Mutex<Option<SyncTask>>>,
    /// Held across every remote write so ending a show cannot interleave
    /// with a sync that already built its payload.
    remote_gate: Arc<Mutex<()>>,
}

impl PlanController {
    pub fn new(
        settings: EngineSettings,
        persistence: PersistenceCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            persistence: Arc::new(persistence),
            journal: None,
            clock,
            settings: Arc::new(settings),
            ticker: Arc::new(Mutex::new(None)),
            syncer: Arc::new(Mutex::new(None)),
            remote_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_journal(mut self, journal: Arc<dyn RunJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub async fn view(&self) -> TimelineView {
        let guard = self.state.lock().await;
        guard.view(self.clock.now())
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn has_active_timers(&self) -> bool {
        let ticking = self
            .ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        let syncing = self
            .syncer
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished());
        ticking || syncing
    }

    pub async fn activate(
        &self,
        plan: ShowPlan,
        host_id: Option<String>,
    ) -> Result<TimelineView, TimelineError> {
        if plan.segments.is_empty() {
            return Err(TimelineError::EmptyPlan);
        }

        let mut guard = self.state.lock().await;
        if guard.phase.has_active_plan() {
            return Err(TimelineError::PlanAlreadyActive);
        }

        if let Some(message) = malformed_segment_warning(&plan) {
            warn!("{}", message);
        }

        let now = self.clock.now();
        info!(
            "Activating plan '{}' ({} segments, {:.0} min)",
            plan.title(),
            plan.segments.len(),
            plan.planned_duration()
        );

        *guard = EngineState {
            phase: Phase::Paused,
            plan: Some(plan),
            timeline: TimelineState::new(),
            health: ShowHealth::default(),
            host_id: host_id.or_else(|| self.settings.host_id.clone()),
            activated_at: Some(now),
            ticks: 0,
        };

        let auto_start = self.settings.auto_start_on_activate;
        if auto_start {
            guard.timeline.clock.start(now);
            guard.phase = Phase::Running;
        }

        self.persist_local(&guard, now).await;

        if auto_start {
            // The sync loop's first interval fires immediately.
            self.spawn_timers().await;
        } else {
            self.spawn_initial_sync().await;
        }

        Ok(guard.view(now))
    }

    pub async fn start(&self) -> Result<TimelineView, TimelineError> {
        let mut guard = self.state.lock().await;
        guard.ensure_active()?;

        let now = self.clock.now();
        if !guard.timeline.clock.start(now) {
            return Ok(guard.view(now));
        }
        guard.phase = Phase::Running;
        guard.ticks = 0;

        self.persist_local(&guard, now).await;
        self.spawn_timers().await;

        Ok(guard.view(now))
    }

    pub async fn pause(&self) -> Result<TimelineView, TimelineError> {
        let mut guard = self.state.lock().await;
        guard.ensure_active()?;

        let now = self.clock.now();
        if !guard.timeline.clock.pause(now) {
            return Ok(guard.view(now));
        }
        guard.phase = Phase::Paused;

        self.cancel_timers().await;
        self.persist_local(&guard, now).await;

        Ok(guard.view(now))
    }

    pub async fn toggle(&self) -> Result<TimelineView, TimelineError> {
        if self.phase().await == Phase::Running {
            self.pause().await
        } else {
            self.start().await
        }
    }

    /// Jumps to `index` without touching the clock.
    pub async fn select_segment(&self, index: usize) -> Result<TimelineView, TimelineError> {
        let mut guard = self.state.lock().await;
        let len = guard.ensure_active()?.segments.len();
        if index >= len {
            return Err(TimelineError::SegmentOutOfRange { index, len });
        }

        let now = self.clock.now();
        guard.timeline.current_segment_index = index;
        self.persist_local(&guard, now).await;

        Ok(guard.view(now))
    }

    pub async fn adjust_minutes(&self, delta_minutes: f64) -> Result<TimelineView, TimelineError> {
        let mut guard = self.state.lock().await;
        guard.ensure_active()?;

        let now = self.clock.now();
        guard.timeline.clock.adjust(delta_minutes);
        self.persist_local(&guard, now).await;

        Ok(guard.view(now))
    }

    pub async fn update_show_health(&self, health: ShowHealth) {
        let mut guard = self.state.lock().await;
        if guard.phase.has_active_plan() {
            guard.health = health;
        }
    }

    /// One scheduler evaluation. Returns `None` unless running.
    pub async fn tick(&self) -> Option<TimelineView> {
        let mut guard = self.state.lock().await;
        if guard.phase != Phase::Running {
            return None;
        }

        let now = self.clock.now();
        let state = &mut *guard;
        let plan = state.plan.as_ref()?;
        let elapsed = state.timeline.elapsed_minutes(now);
        let current = state.timeline.current_segment_index;
        let next = timing::advance(elapsed, current, &plan.segments);

        state.ticks = state.ticks.wrapping_add(1);
        let heartbeat_due = state.ticks % self.settings.heartbeat_every_ticks() == 0;

        let advanced = next != current;
        if advanced {
            info!(
                "Segment '{}' finished at {:.1} min; now on '{}'",
                plan.segments[current].name, elapsed, plan.segments[next].name
            );
            state.timeline.current_segment_index = next;
        }

        if advanced || heartbeat_due {
            self.persist_local(state, now).await;
        }

        Some(state.view(now))
    }

    pub async fn end(&self) -> Result<ShowRun, TimelineError> {
        let mut guard = self.state.lock().await;
        guard.ensure_active()?;

        let now = self.clock.now();
        guard.timeline.clock.pause(now);
        self.cancel_timers().await;

        let remote_key = guard.remote_key();
        let plan = guard.plan.take().ok_or(TimelineError::NoActivePlan)?;
        let run = ShowRun {
            id: Uuid::new_v4().to_string(),
            plan_id: plan.id.clone(),
            show_id: plan.show_id.clone(),
            title: plan.title().to_string(),
            activated_at: guard.activated_at.unwrap_or(now),
            ended_at: now,
            elapsed_minutes: guard.timeline.clock.accumulated_minutes,
            final_segment_index: guard.timeline.current_segment_index,
            segment_count: plan.segments.len(),
        };

        *guard = EngineState {
            phase: Phase::Ended,
            ..EngineState::default()
        };

        if let Err(err) = self.persistence.clear_local().await {
            error!("Failed to clear local snapshot: {:#}", err);
        }
        drop(guard);

        if self.settings.clear_remote_on_end {
            if let Some(key) = remote_key {
                let _gate = self.remote_gate.lock().await;
                self.persistence.clear_remote_timer(&key, now).await;
            }
        }

        if let Some(journal) = &self.journal {
            if let Err(err) = journal.record_run(&run).await {
                error!("Failed to record show run {}: {:#}", run.id, err);
            }
        }

        info!(
            "Show '{}' ended after {:.1} min on segment {}/{}",
            run.title,
            run.elapsed_minutes,
            run.planned_segments_reached(),
            run.segment_count
        );

        Ok(run)
    }

    /// Reloads the local snapshot after a restart. A running clock is
    /// re-anchored at the current instant; the outage is not credited.
    pub async fn restore(&self) -> Result<Option<TimelineView>, TimelineError> {
        let mut guard = self.state.lock().await;
        if guard.phase.has_active_plan() {
            return Err(TimelineError::PlanAlreadyActive);
        }

        let Some(snapshot) = self.persistence.load_local().await else {
            return Ok(None);
        };
        if snapshot.plan.segments.is_empty() {
            warn!("Ignoring stored plan {} with no segments", snapshot.plan.id);
            return Ok(None);
        }
        if let Some(message) = malformed_segment_warning(&snapshot.plan) {
            warn!("{}", message);
        }

        let now = self.clock.now();
        let timeline = TimelineState::restore(&snapshot, now);
        let running = timeline.is_running();
        if running {
            warn!(
                "Restored running show '{}' at {:.1} min; clock re-anchored, time since {} is not credited",
                snapshot.plan.title(),
                snapshot.credited_minutes(),
                snapshot.last_updated.to_rfc3339()
            );
        } else {
            info!(
                "Restored paused show '{}' at {:.1} min",
                snapshot.plan.title(),
                snapshot.credited_minutes()
            );
        }

        let LocalSnapshot {
            plan,
            host_id,
            activated_at,
            last_updated,
            ..
        } = snapshot;

        *guard = EngineState {
            phase: if running { Phase::Running } else { Phase::Paused },
            plan: Some(plan),
            timeline,
            health: ShowHealth::default(),
            host_id: host_id.or_else(|| self.settings.host_id.clone()),
            activated_at: activated_at.or(Some(last_updated)),
            ticks: 0,
        };

        self.persist_local(&guard, now).await;
        if running {
            self.spawn_timers().await;
        }

        Ok(Some(guard.view(now)))
    }

    /// One awaited remote sync built from the current local state.
    pub async fn sync_remote_now(&self) -> SyncOutcome {
        let _gate = self.remote_gate.lock().await;
        let payload = {
            let guard = self.state.lock().await;
            guard.sync_payload(self.clock.now())
        };

        match payload {
            Some(payload) => self.persistence.sync_remote(&payload).await,
            None => SyncOutcome::Skipped,
        }
    }

    /// Rewrites the local snapshot as-is, e.g. before the process exits.
    pub async fn checkpoint(&self) {
        let guard = self.state.lock().await;
        self.persist_local(&guard, self.clock.now()).await;
    }

    async fn persist_local(&self, state: &EngineState, now: DateTime<Utc>) {
        let Some(snapshot) = state.local_snapshot(now) else {
            return;
        };
        if let Err(err) = self.persistence.save_local(&snapshot).await {
            error!("Failed to save local snapshot: {:#}", err);
        }
    }

    async fn spawn_timers(&self) {
        self.spawn_ticker().await;
        self.spawn_syncer().await;
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.settings.tick_interval();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the immediate first tick.
            interval.tick().await;
            loop {
                interval.tick().await;
                if controller.tick().await.is_none() {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn spawn_syncer(&self) {
        let mut syncer_guard = self.syncer.lock().await;
        if let Some(task) = syncer_guard.take() {
            task.stop();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let sync_interval = self.settings.remote_sync_interval();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(sync_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = controller.sync_remote_now() => {}
                }
            }
        });

        *syncer_guard = Some(SyncTask { handle, cancel });
    }

    /// One sync right after activation, tracked like the interval loop so
    /// `start`, `pause` and `end` can stop it.
    async fn spawn_initial_sync(&self) {
        let mut syncer_guard = self.syncer.lock().await;
        if let Some(task) = syncer_guard.take() {
            task.stop();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = controller.sync_remote_now() => {}
            }
        });

        *syncer_guard = Some(SyncTask { handle, cancel });
    }

    async fn cancel_timers(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
        if let Some(task) = self.syncer.lock().await.take() {
            task.stop();
        }
    }
}

fn malformed_segment_warning(plan: &ShowPlan) -> Option<String> {
    let malformed = plan.malformed_segments();
    if malformed.is_empty() {
        return None;
    }
    Some(format!(
        "Plan {} has segments without a usable duration {:?}; scheduling them as zero-width",
        plan.id, malformed
    ))
}
