//! Runs engine objects on behalf of the CLI.
//!
//! This module provides:
//! - Construction of timers and step timers from CLI arguments
//! - The wait loop (progress redraw, Ctrl-C handling)
//! - Saving, listing and resuming persisted records

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::cli::commands::{StepsArgs, TimerArgs};
use crate::cli::display::{Display, ProgressLine};
use crate::config::Settings;
use crate::engine::{StepCallback, StepTimer, Timer, TimerCallback};
use crate::notification::{Notifier, SystemNotifier};
use crate::storage::{JsonFileStore, TimerStorage};
use crate::types::{StepEvent, TimerEvent, TimerStatus};

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    /// The countdown reached a terminal status
    Finished(TimerStatus),
    /// Ctrl-C was pressed first
    Interrupted,
}

/// Turns a display name into a subject id: `"Kimchi Jjigae"` -> `"kimchi-jjigae"`.
fn subject_id_for(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Drives one CLI command against the store and notifier built from [`Settings`].
pub struct Runner {
    refresh: Duration,
    storage: TimerStorage<JsonFileStore>,
    notifier: Arc<dyn Notifier>,
}

impl Runner {
    /// Opens the store and builds the notifier described by `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let store = JsonFileStore::open(&settings.storage_dir).with_context(|| {
            format!(
                "failed to open timer store in {}",
                settings.storage_dir.display()
            )
        })?;
        debug!(path = %store.path().display(), "store opened");

        Ok(Self {
            refresh: Duration::from_millis(settings.refresh_interval_ms),
            storage: TimerStorage::new(store),
            notifier: Arc::new(SystemNotifier::new(settings.notification.clone())),
        })
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Runs a single countdown until it finishes or Ctrl-C is pressed.
    pub async fn run_timer(&self, args: &TimerArgs) -> Result<()> {
        let seconds = args.resolve_seconds().map_err(anyhow::Error::msg)?;
        let timer = Timer::new(subject_id_for(&args.name), args.name.clone(), seconds)
            .with_callback(Self::timer_observer(args.name.clone()))
            .with_notifier(Arc::clone(&self.notifier));

        if !timer.start() {
            bail!("failed to start timer for {}", args.name);
        }
        if args.save {
            self.storage.save_timer(&timer)?;
            Display::show_saved(timer.id());
        }

        self.await_timer(&timer, args.save).await
    }

    /// Runs a multi-step process until it finishes or Ctrl-C is pressed.
    pub async fn run_steps(&self, args: &StepsArgs) -> Result<()> {
        let step_timer = StepTimer::new(
            subject_id_for(&args.name),
            args.name.clone(),
            args.steps.iter().cloned(),
        )?
        .with_callback(Self::step_observer(args.steps.len()))
        .with_notifier(Arc::clone(&self.notifier));

        if !step_timer.start() {
            bail!("failed to start {}", args.name);
        }
        if args.save {
            self.storage.save_step_timer(&step_timer)?;
            Display::show_saved(step_timer.id());
        }

        self.await_step_timer(&step_timer, args.save).await
    }

    /// Lists every saved record.
    pub fn list_saved(&self) -> Result<()> {
        let records = self.storage.records()?;
        Display::show_records(&records);
        Ok(())
    }

    /// Restores a saved step timer or timer and waits on it.
    ///
    /// A record that already finished while nobody was waiting is reported
    /// and removed.
    pub async fn resume(&self, id: &str) -> Result<()> {
        if let Some(step_timer) = self.storage.load_step_timer(id, None)? {
            let total_steps = step_timer.steps().len();
            step_timer.set_callback(Some(Self::step_observer(total_steps)));
            step_timer.set_notifier(Some(Arc::clone(&self.notifier)));
            Display::show_resumed(step_timer.subject_name(), step_timer.status());

            let started = match step_timer.status() {
                TimerStatus::Paused => step_timer.resume(),
                TimerStatus::Ready => step_timer.start(),
                _ => true,
            };
            if !started {
                bail!("failed to resume {}", step_timer.subject_name());
            }
            return self.await_step_timer(&step_timer, true).await;
        }

        if let Some(timer) = self.storage.load_timer(id, None)? {
            timer.set_callback(Some(Self::timer_observer(timer.subject_name().to_string())));
            timer.set_notifier(Some(Arc::clone(&self.notifier)));
            Display::show_resumed(timer.subject_name(), timer.status());

            let started = match timer.status() {
                TimerStatus::Paused => timer.resume(),
                TimerStatus::Ready => timer.start(),
                _ => true,
            };
            if !started {
                bail!("failed to resume {}", timer.subject_name());
            }
            return self.await_timer(&timer, true).await;
        }

        bail!("no saved timer with id {id}")
    }

    // ------------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------------

    async fn await_timer(&self, timer: &Timer, saved: bool) -> Result<()> {
        let outcome = self
            .wait_until_done(|| ProgressLine {
                label: timer.subject_name().to_string(),
                status: timer.status(),
                remaining: timer.remaining_time(),
                progress: timer.progress_percentage(),
            })
            .await;

        match outcome {
            WaitOutcome::Finished(status) => {
                info!(id = timer.id(), %status, "timer finished");
                if saved {
                    self.storage.delete_timer(timer.id())?;
                }
            }
            WaitOutcome::Interrupted if saved => {
                self.storage.save_timer(timer)?;
                Display::show_saved(timer.id());
            }
            WaitOutcome::Interrupted => {
                timer.cancel();
            }
        }
        Ok(())
    }

    async fn await_step_timer(&self, step_timer: &StepTimer, saved: bool) -> Result<()> {
        let outcome = self
            .wait_until_done(|| {
                let current = step_timer.current_step();
                let label = match current.index {
                    Some(index) => format!(
                        "{} {}/{}: {}",
                        step_timer.subject_name(),
                        index + 1,
                        step_timer.steps().len(),
                        current.description
                    ),
                    None => step_timer.subject_name().to_string(),
                };
                ProgressLine {
                    label,
                    status: step_timer.status(),
                    remaining: step_timer.remaining_time(),
                    progress: step_timer.progress_percentage(),
                }
            })
            .await;

        match outcome {
            WaitOutcome::Finished(status) => {
                info!(id = step_timer.id(), %status, "step timer finished");
                if saved {
                    self.storage.delete_step_timer(step_timer.id())?;
                }
            }
            WaitOutcome::Interrupted if saved => {
                self.storage.save_step_timer(step_timer)?;
                Display::show_saved(step_timer.id());
            }
            WaitOutcome::Interrupted => {
                step_timer.cancel();
            }
        }
        Ok(())
    }

    /// Redraws `probe` every refresh period until its status is terminal.
    async fn wait_until_done(&self, probe: impl Fn() -> ProgressLine) -> WaitOutcome {
        let mut ticker = interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    Display::finish_progress();
                    debug!("interrupted");
                    return WaitOutcome::Interrupted;
                }
                _ = ticker.tick() => {
                    let line = probe();
                    Display::show_progress(&line);
                    if line.status.is_terminal() {
                        Display::finish_progress();
                        return WaitOutcome::Finished(line.status);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    fn timer_observer(name: String) -> TimerCallback {
        Arc::new(move |event: &TimerEvent| Display::show_timer_event(&name, event))
    }

    fn step_observer(total_steps: usize) -> StepCallback {
        Arc::new(move |event: &StepEvent| Display::show_step_event(event, total_steps))
    }
}

// ============================================================================
// Tests
// ============================================================================
