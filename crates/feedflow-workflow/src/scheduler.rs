//! Source scheduler
//!
//! Owns one timer task per enabled source, keyed by source id. Each timer
//! fires on its source's cron schedule and runs a tick:
//!
//! 1. Resolve the source identifier unless one is already cached
//! 2. Pause briefly, then list items published after the checkpoint
//! 3. Skip items that already have an execution for this source
//! 4. Run the rest through the engine one at a time
//! 5. Advance the checkpoint and save the source
//!
//! Ticks for the same source never overlap; a tick that finds one already
//! running is skipped.

use crate::config::SchedulerConfig;
use crate::cron::{next_fire, parse_schedule};
use crate::engine::Engine;
use crate::strategy::SourceStrategy;
use chrono::{DateTime, TimeDelta, Utc};
use feedflow_core::{
    ContentSource, EntityKind, Error, ExternalError, PersistenceError, Result, Source,
};
use feedflow_store::Store;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// What started a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        })
    }
}

/// Counts from one completed tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickOutcome {
    pub source_id: String,
    /// Items returned by the listing
    pub listed: usize,
    /// Items skipped because an execution already exists
    pub already_processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items skipped because the dedup lookup itself failed
    pub skipped: usize,
    /// Checkpoint after the tick
    pub checkpoint: Option<DateTime<Utc>>,
}

impl TickOutcome {
    fn new(source_id: &str, listed: usize) -> Self {
        Self {
            source_id: source_id.to_string(),
            listed,
            already_processed: 0,
            completed: 0,
            failed: 0,
            skipped: 0,
            checkpoint: None,
        }
    }

    /// Executions created during the tick
    pub fn created(&self) -> usize {
        self.completed + self.failed
    }
}

/// Result of asking for a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    Ran(TickOutcome),
    /// Another tick for the same source was still running
    AlreadyRunning,
}

/// A source with a live timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredSource {
    pub source_id: String,
    pub schedule: String,
}

struct Timer {
    schedule: String,
    token: CancellationToken,
}

/// Counts consecutive store write failures and reports when the threshold is hit
struct WriteFailureTracker {
    consecutive: AtomicU32,
    threshold: u32,
}

impl WriteFailureTracker {
    fn new(threshold: u32) -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    fn record_failure(&self, err: &PersistenceError) -> Option<PersistenceError> {
        let consecutive = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        (consecutive >= self.threshold).then(|| PersistenceError::Escalated {
            consecutive,
            entity: err.entity(),
            id: failed_entity_id(err),
        })
    }

    fn count(&self) -> u32 {
        self.consecutive.load(Ordering::SeqCst)
    }
}

fn failed_entity_id(err: &PersistenceError) -> String {
    match err {
        PersistenceError::Write { id, .. }
        | PersistenceError::InvalidTransition { id, .. }
        | PersistenceError::Escalated { id, .. } => id.clone(),
        PersistenceError::Read { .. } => String::new(),
    }
}

/// Releases a source's tick slot on drop
struct RunningGuard {
    running: Arc<StdMutex<HashSet<String>>>,
    source_id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source_id);
    }
}

struct Inner {
    store: Arc<dyn Store>,
    engine: Engine,
    content: Option<Arc<dyn ContentSource>>,
    config: SchedulerConfig,
    timers: Mutex<HashMap<String, Timer>>,
    running: Arc<StdMutex<HashSet<String>>>,
    root: CancellationToken,
    tracker: TaskTracker,
    write_failures: WriteFailureTracker,
    halted: AtomicBool,
}

/// Timer registry and tick runner for all sources
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// Without a content source, channel and playlist sources cannot be
    /// resolved or listed and their ticks are abandoned.
    pub fn new(
        store: Arc<dyn Store>,
        engine: Engine,
        content: Option<Arc<dyn ContentSource>>,
        config: SchedulerConfig,
    ) -> Self {
        let write_failures = WriteFailureTracker::new(config.write_failure_threshold);
        Self {
            inner: Arc::new(Inner {
                store,
                engine,
                content,
                config,
                timers: Mutex::new(HashMap::new()),
                running: Arc::new(StdMutex::new(HashSet::new())),
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
                write_failures,
                halted: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Register a timer for every enabled source
    ///
    /// A source whose schedule does not parse is logged and skipped. Returns
    /// the number of timers registered.
    pub async fn start(&self) -> Result<usize> {
        self.ensure_accepting()?;
        if !self.inner.config.enabled {
            info!("Scheduling disabled, no timers registered");
            return Ok(0);
        }

        let sources = self.inner.store.list_sources().await?;
        let mut registered = 0;
        for source in sources.iter().filter(|s| s.enabled) {
            match self.inner.register(source).await {
                Ok(()) => registered += 1,
                Err(e) => warn!(
                    source_id = %source.id,
                    schedule = source.effective_schedule(&self.inner.config.default_schedule),
                    error = %e,
                    "Skipping source with invalid schedule"
                ),
            }
        }

        info!(
            registered,
            total = sources.len(),
            "Scheduler started"
        );
        Ok(registered)
    }

    /// Drop every timer and register again from the store
    pub async fn refresh(&self) -> Result<usize> {
        self.ensure_accepting()?;
        for (_, timer) in self.inner.timers.lock().await.drain() {
            timer.token.cancel();
        }
        self.start().await
    }

    /// Re-register one source after it was created, edited or deleted
    ///
    /// Returns whether a timer is now registered for it.
    pub async fn reload_source(&self, source_id: &str) -> Result<bool> {
        self.ensure_accepting()?;
        self.unregister(source_id).await;
        if !self.inner.config.enabled {
            return Ok(false);
        }

        match self.inner.store.get_source(source_id).await? {
            Some(source) if source.enabled => {
                self.inner.register(&source).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Cancel a source's timer; returns whether one was registered
    pub async fn unregister(&self, source_id: &str) -> bool {
        match self.inner.timers.lock().await.remove(source_id) {
            Some(timer) => {
                timer.token.cancel();
                debug!(source_id, "Timer unregistered");
                true
            }
            None => false,
        }
    }

    /// Sources with a live timer, ordered by id
    pub async fn registered_sources(&self) -> Vec<RegisteredSource> {
        let timers = self.inner.timers.lock().await;
        let mut registered: Vec<RegisteredSource> = timers
            .iter()
            .map(|(id, timer)| RegisteredSource {
                source_id: id.clone(),
                schedule: timer.schedule.clone(),
            })
            .collect();
        registered.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        registered
    }

    /// Start a tick for one source in the background
    ///
    /// Fails up front when the source is missing or disabled; the tick itself
    /// is not awaited.
    pub async fn trigger(&self, source_id: &str) -> Result<()> {
        self.ensure_accepting()?;
        let source = self
            .inner
            .store
            .get_source(source_id)
            .await?
            .ok_or_else(|| Error::SourceNotFound(source_id.to_string()))?;
        if !source.enabled {
            return Err(Error::SourceDisabled(source_id.to_string()));
        }

        self.spawn_tick(source.id);
        Ok(())
    }

    /// Start a background tick for every enabled source; returns how many
    pub async fn trigger_all(&self) -> Result<usize> {
        self.ensure_accepting()?;
        let sources = self.inner.store.list_sources().await?;
        let mut triggered = 0;
        for source in sources.into_iter().filter(|s| s.enabled) {
            self.spawn_tick(source.id);
            triggered += 1;
        }
        info!(triggered, "Triggered all enabled sources");
        Ok(triggered)
    }

    /// Run a tick for one source and wait for it
    pub async fn run_tick(&self, source_id: &str) -> Result<TickReport> {
        self.ensure_accepting()?;
        self.inner.tick(source_id, Trigger::Manual).await
    }

    fn spawn_tick(&self, source_id: String) {
        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            if let Err(e) = inner.tick(&source_id, Trigger::Manual).await {
                warn!(source_id, error = %e, "Manual tick failed");
            }
        });
    }

    /// Whether new ticks are accepted
    pub fn is_accepting(&self) -> bool {
        !self.inner.root.is_cancelled()
    }

    /// Consecutive store write failures seen so far
    pub fn consecutive_write_failures(&self) -> u32 {
        self.inner.write_failures.count()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::SchedulerStopped)
        }
    }

    /// Stop all timers and wait for in-flight ticks to finish
    pub async fn stop(&self) {
        self.inner.root.cancel();
        self.inner.timers.lock().await.clear();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Scheduler stopped");
    }
}

impl Inner {
    async fn register(self: &Arc<Self>, source: &Source) -> Result<()> {
        let expr = source
            .effective_schedule(&self.config.default_schedule)
            .to_string();
        let schedule = parse_schedule(&expr)?;
        let token = self.root.child_token();

        if let Some(previous) = self.timers.lock().await.insert(
            source.id.clone(),
            Timer {
                schedule: expr.clone(),
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        let inner = Arc::clone(self);
        let source_id = source.id.clone();
        self.tracker
            .spawn(async move { inner.timer_loop(source_id, schedule, token).await });

        info!(source_id = %source.id, schedule = %expr, "Timer registered");
        Ok(())
    }

    async fn timer_loop(
        self: Arc<Self>,
        source_id: String,
        schedule: cron::Schedule,
        token: CancellationToken,
    ) {
        let mut last_fire = Utc::now();
        loop {
            let Some(next) = next_fire(&schedule, last_fire.max(Utc::now())) else {
                warn!(source_id, "Schedule has no upcoming fire times");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }
            last_fire = next;

            match self.tick(&source_id, Trigger::Scheduled).await {
                Ok(_) => {}
                Err(Error::SourceDisabled(_)) => {
                    debug!(source_id, "Source disabled since registration, skipping tick");
                }
                Err(Error::SourceNotFound(_)) => {
                    debug!(source_id, "Source deleted since registration, skipping tick");
                }
                Err(Error::SchedulerStopped) => break,
                Err(e) => warn!(source_id, error = %e, "Scheduled tick failed"),
            }
        }
        debug!(source_id, "Timer stopped");
    }

    fn try_acquire(&self, source_id: &str) -> Option<RunningGuard> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(source_id.to_string()) {
            return None;
        }
        Some(RunningGuard {
            running: Arc::clone(&self.running),
            source_id: source_id.to_string(),
        })
    }

    /// Run one tick unless the scheduler has halted
    ///
    /// Ticks already accepted run to completion after `stop`.
    async fn tick(&self, source_id: &str, trigger: Trigger) -> Result<TickReport> {
        if self.halted.load(Ordering::SeqCst) {
            return Err(Error::SchedulerStopped);
        }

        let Some(_guard) = self.try_acquire(source_id) else {
            info!(source_id, %trigger, "Tick already running for source, skipping");
            return Ok(TickReport::AlreadyRunning);
        };

        let source = self
            .store
            .get_source(source_id)
            .await?
            .ok_or_else(|| Error::SourceNotFound(source_id.to_string()))?;
        if !source.enabled {
            return Err(Error::SourceDisabled(source_id.to_string()));
        }

        let outcome = self.process_source(source, trigger).await?;
        info!(
            source_id,
            %trigger,
            listed = outcome.listed,
            already_processed = outcome.already_processed,
            completed = outcome.completed,
            failed = outcome.failed,
            "Tick finished"
        );
        Ok(TickReport::Ran(outcome))
    }

    #[instrument(skip(self, source), fields(source_id = %source.id, kind = %source.kind))]
    async fn process_source(&self, mut source: Source, trigger: Trigger) -> Result<TickOutcome> {
        let strategy = SourceStrategy::for_kind(source.kind);
        let content = self.content.as_ref();

        let newly_resolved = source.resolved_id.is_none();
        let identifier = match source.resolved_id.clone() {
            Some(id) => id,
            None => match strategy.resolve(content, &source).await {
                Ok(id) => {
                    debug!(identifier = %id, "Resolved source identifier");
                    id
                }
                Err(e) => {
                    warn!(url = %source.url, error = %e, "Could not resolve identifier, abandoning tick");
                    return Err(Error::Resolution {
                        url: source.url.clone(),
                        reason: e.to_string(),
                    });
                }
            },
        };
        source.resolved_id = Some(identifier.clone());

        if strategy.lists_remotely() && !self.config.list_delay.is_zero() {
            tokio::time::sleep(self.config.list_delay).await;
        }

        let items = match strategy
            .list(
                content,
                &source,
                &identifier,
                self.config.max_batch_size,
                source.last_processed,
            )
            .await
        {
            Ok(items) => items,
            Err(e) => {
                if matches!(e, ExternalError::QuotaExceeded { .. }) {
                    warn!(error = %e, "Content-source quota exhausted, retrying next tick");
                } else {
                    warn!(error = %e, "Listing items failed");
                }
                if newly_resolved {
                    // keep the identifier so the next tick skips resolution
                    if let Err(save_err) = self.save_source(&source, None).await {
                        debug!(error = %save_err, "Resolved identifier not saved after listing failure");
                    }
                }
                return Err(Error::External(e));
            }
        };

        let mut outcome = TickOutcome::new(&source.id, items.len());
        let mut ordered: Vec<_> = items.iter().collect();
        ordered.sort_by_key(|item| item.published_at);

        let mut latest_observed: Option<DateTime<Utc>> = None;
        // oldest item whose dedup lookup failed; the checkpoint stays below it
        let mut earliest_skipped: Option<DateTime<Utc>> = None;
        for item in ordered {
            if self.halted.load(Ordering::SeqCst) {
                warn!("Scheduler halted mid-batch, leaving remaining items for later");
                break;
            }

            match self.store.has_execution_for_item(&source.id, &item.id).await {
                Ok(true) => {
                    latest_observed = latest_observed.max(Some(item.published_at));
                    outcome.already_processed += 1;
                    debug!(item_id = %item.id, "Item already processed, skipping");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(
                        entity = %EntityKind::Execution,
                        item_id = %item.id,
                        error = %e,
                        "Dedup lookup failed, skipping item"
                    );
                    earliest_skipped = earliest_skipped.or(Some(item.published_at));
                    outcome.skipped += 1;
                    continue;
                }
            }

            latest_observed = latest_observed.max(Some(item.published_at));

            match self.engine.execute_item(item, Some(&source.id)).await {
                Ok(execution) => {
                    self.write_failures.record_success();
                    outcome.completed += 1;
                    debug!(execution_id = %execution.id, item_id = %item.id, "Item processed");
                }
                Err(Error::Persistence(e)) => {
                    outcome.failed += 1;
                    self.record_write_failure(&e);
                }
                Err(e) => {
                    self.write_failures.record_success();
                    outcome.failed += 1;
                    warn!(item_id = %item.id, %trigger, error = %e, "Item failed, continuing with batch");
                }
            }
        }

        let checkpoint = if items.is_empty() {
            Some(Utc::now())
        } else {
            match (latest_observed, earliest_skipped) {
                (Some(latest), Some(skipped)) => Some(latest.min(skipped - TimeDelta::seconds(1))),
                (latest, _) => latest,
            }
        };
        outcome.checkpoint = self.save_source(&source, checkpoint).await?;
        Ok(outcome)
    }

    /// Save the resolved identifier and advance the checkpoint
    ///
    /// Applies the tick's changes to the latest stored copy so edits made
    /// during the tick survive. A source deleted mid-tick is not recreated.
    async fn save_source(
        &self,
        ticked: &Source,
        checkpoint: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut latest = match self.store.get_source(&ticked.id).await {
            Ok(Some(latest)) => latest,
            Ok(None) => {
                info!(source_id = %ticked.id, "Source deleted during tick, not saving checkpoint");
                return Ok(None);
            }
            Err(e) => {
                warn!(source_id = %ticked.id, error = %e, "Could not re-read source, saving tick copy");
                ticked.clone()
            }
        };

        if latest.url == ticked.url && latest.kind == ticked.kind {
            latest.resolved_id.clone_from(&ticked.resolved_id);
            if let Some(checkpoint) = checkpoint {
                latest.advance_checkpoint(checkpoint);
            }
        } else {
            info!(source_id = %ticked.id, "Source URL changed during tick, not saving checkpoint");
            return Ok(latest.last_processed);
        }

        match self.store.upsert_source(&latest).await {
            Ok(()) => {
                self.write_failures.record_success();
                Ok(latest.last_processed)
            }
            Err(e) => {
                error!(
                    entity = %EntityKind::Source,
                    id = %latest.id,
                    operation = "save_checkpoint",
                    error = %e,
                    "Failed to save source"
                );
                self.record_write_failure(&e);
                Err(Error::Persistence(e))
            }
        }
    }

    fn record_write_failure(&self, err: &PersistenceError) {
        let Some(escalated) = self.write_failures.record_failure(err) else {
            return;
        };
        if !self.halted.swap(true, Ordering::SeqCst) {
            error!(
                threshold = self.config.write_failure_threshold,
                error = %escalated,
                "Store writes keep failing, scheduler no longer accepting ticks"
            );
            self.root.cancel();
        }
    }
}
