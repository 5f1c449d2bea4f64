//! CPU performance snapshotter
//!
//! A single task owns the snapshotter state (iconification, the baseline
//! snapshot and the switch epoch) and processes commands from an
//! unbounded mailbox one at a time. Lifecycle callbacks post
//! `SwitchIconification`; delayed timers post `TakeSnapshot` tagged with
//! the epoch they were scheduled in.
//!
//! A switch bumps the epoch, so a timer scheduled before the switch
//! arrives stale and is dropped. No timer is ever cancelled.
//!
//! Relative CPU usage is logged as a HIGH priority metric attributed to
//! the foreground or background screen. Logging may wait on an upload, so
//! the actor hands each sample to a separate forwarding task and never
//! awaits the metrics controller itself.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::{
    AppIconification, Clock, CpuSnapshot, LoggableMetric, RawMetricsAssessor, ScreenName,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::config::TelemetryConfig;
use crate::error::{TelemetryError, TelemetryResult};
use crate::performance::PerformanceMetricsController;

/// Sampling cadence of the snapshotter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSnapshotterConfig {
    pub foreground_period: Duration,
    pub background_period: Duration,
    /// Wait before assuming background when no lifecycle signal arrived
    pub initial_cutoff: Duration,
    pub initial_iconification: AppIconification,
}

impl Default for CpuSnapshotterConfig {
    fn default() -> Self {
        Self::from(&TelemetryConfig::default())
    }
}

impl From<&TelemetryConfig> for CpuSnapshotterConfig {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            foreground_period: config.foreground_cpu_period,
            background_period: config.background_cpu_period,
            initial_cutoff: config.initial_iconification_cutoff,
            initial_iconification: config.initial_iconification,
        }
    }
}

impl CpuSnapshotterConfig {
    /// Delay before the next sample in `iconification`
    pub fn period_for(&self, iconification: AppIconification) -> Duration {
        match iconification {
            AppIconification::Uninitialized => self.initial_cutoff,
            AppIconification::Foreground => self.foreground_period,
            AppIconification::Background => self.background_period,
        }
    }
}

/// Observable part of the actor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotterState {
    pub iconification: AppIconification,
    pub switch_epoch: u64,
}

/// Messages processed by the snapshotter task
#[derive(Debug)]
enum Command {
    SwitchIconification(AppIconification),
    ScheduleTakeSnapshot {
        iconification: AppIconification,
        epoch: u64,
    },
    TakeSnapshot {
        epoch: u64,
    },
    LogSnapshotDiff {
        relative_usage: f64,
        screen: ScreenName,
    },
    QueryState(oneshot::Sender<SnapshotterState>),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Work handed from the actor to the forwarding task
#[derive(Debug)]
enum Sample {
    Usage {
        timestamp_millis: i64,
        relative_usage: f64,
        screen: ScreenName,
    },
    /// Acknowledged once every earlier sample has been logged
    Flush(oneshot::Sender<()>),
}

/// Handle for posting lifecycle changes to a running snapshotter
///
/// The snapshotter stops when every handle is dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Debug, Clone)]
pub struct SnapshotterHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl SnapshotterHandle {
    /// Tell the snapshotter the app moved to the foreground or background
    pub fn update_app_iconification(&self, iconification: AppIconification) {
        if let Err(e) = self.send(Command::SwitchIconification(iconification)) {
            warn!(error = %e, %iconification, "Dropped iconification update");
        }
    }

    /// Current iconification and switch epoch
    ///
    /// Answered after every previously posted command has been processed.
    pub async fn state(&self) -> TelemetryResult<SnapshotterState> {
        let (reply, response) = oneshot::channel();
        self.send(Command::QueryState(reply))?;
        response
            .await
            .map_err(|_| TelemetryError::Channel("CPU snapshotter stopped".into()))
    }

    /// Wait until every CPU sample posted so far reached the metrics controller
    ///
    /// Does not return while an earlier sample is stuck in a slow upload.
    pub async fn flush(&self) -> TelemetryResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Flush(reply))?;
        response
            .await
            .map_err(|_| TelemetryError::Channel("CPU sample forwarder stopped".into()))
    }

    /// Stop the snapshotter after the commands already queued
    pub fn shutdown(&self) {
        if self.send(Command::Shutdown).is_err() {
            debug!("CPU snapshotter already stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    fn send(&self, command: Command) -> TelemetryResult<()> {
        self.sender
            .send(command)
            .map_err(|_| TelemetryError::Channel("CPU snapshotter stopped".into()))
    }
}

/// Periodically samples CPU usage and logs it per iconification
pub struct CpuPerformanceSnapshotter {
    config: CpuSnapshotterConfig,
    assessor: Arc<dyn RawMetricsAssessor>,
    clock: Arc<dyn Clock>,
    /// Weak so that pending timers never keep the actor alive
    mailbox: mpsc::WeakUnboundedSender<Command>,
    samples: mpsc::UnboundedSender<Sample>,
    iconification: AppIconification,
    previous_snapshot: CpuSnapshot,
    switch_epoch: u64,
}

impl CpuPerformanceSnapshotter {
    /// Start the snapshotter task and schedule its first sample
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: CpuSnapshotterConfig,
        assessor: Arc<dyn RawMetricsAssessor>,
        metrics: Arc<PerformanceMetricsController>,
        clock: Arc<dyn Clock>,
    ) -> SnapshotterHandle {
        let (sender, inbox) = mpsc::unbounded_channel();
        let (samples, pending) = mpsc::unbounded_channel();
        let iconification = config.initial_iconification;
        let actor = Self {
            config,
            previous_snapshot: assessor.compute_cpu_snapshot(iconification),
            assessor,
            clock,
            mailbox: sender.downgrade(),
            samples,
            iconification,
            switch_epoch: 0,
        };

        let handle = SnapshotterHandle { sender };
        if let Err(e) = handle.send(Command::ScheduleTakeSnapshot {
            iconification,
            epoch: 0,
        }) {
            warn!(error = %e, "Failed to schedule first CPU snapshot");
        }

        tokio::spawn(forward_samples(metrics, pending));
        tokio::spawn(actor.run(inbox));
        handle
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        info!(
            iconification = %self.iconification,
            foreground_secs = self.config.foreground_period.as_secs(),
            background_secs = self.config.background_period.as_secs(),
            "CPU snapshotter started"
        );

        while let Some(command) = inbox.recv().await {
            if self.handle(command).is_break() {
                break;
            }
        }

        info!("CPU snapshotter stopped");
    }

    fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::SwitchIconification(next) => self.switch_iconification(next),
            Command::ScheduleTakeSnapshot {
                iconification,
                epoch,
            } => self.schedule_take_snapshot(iconification, epoch),
            Command::TakeSnapshot { epoch } => self.take_snapshot(epoch),
            Command::LogSnapshotDiff {
                relative_usage,
                screen,
            } => self.log_snapshot_diff(relative_usage, screen),
            Command::QueryState(reply) => {
                // The caller may have given up waiting
                let _ = reply.send(self.state());
            }
            Command::Flush(reply) => {
                if self.samples.send(Sample::Flush(reply)).is_err() {
                    warn!("CPU sample forwarder stopped, flush dropped");
                }
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn state(&self) -> SnapshotterState {
        SnapshotterState {
            iconification: self.iconification,
            switch_epoch: self.switch_epoch,
        }
    }

    fn switch_iconification(&mut self, next: AppIconification) {
        let outgoing = self.iconification;
        if next == outgoing {
            trace!(%next, "Iconification unchanged");
            return;
        }
        if next == AppIconification::Uninitialized {
            warn!(from = %outgoing, "Ignoring switch back to uninitialized");
            return;
        }

        if outgoing != AppIconification::Uninitialized {
            let current = self.assessor.compute_cpu_snapshot(outgoing);
            self.post_diff(&self.previous_snapshot, &current, outgoing);
        }

        self.iconification = next;
        self.previous_snapshot = self.assessor.compute_cpu_snapshot(next);
        self.switch_epoch += 1;
        debug!(from = %outgoing, to = %next, epoch = self.switch_epoch, "Switched iconification");

        self.schedule_take_snapshot(next, self.switch_epoch);
    }

    fn schedule_take_snapshot(&self, iconification: AppIconification, epoch: u64) {
        let delay = self.config.period_for(iconification);
        let mailbox = self.mailbox.clone();
        trace!(%iconification, epoch, delay_ms = delay.as_millis() as u64, "Scheduling CPU snapshot");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(sender) = mailbox.upgrade() else {
                trace!(epoch, "CPU snapshotter gone, dropping scheduled snapshot");
                return;
            };
            if sender.send(Command::TakeSnapshot { epoch }).is_err() {
                warn!(epoch, "CPU snapshotter stopped, dropping scheduled snapshot");
            }
        });
    }

    fn take_snapshot(&mut self, epoch: u64) {
        if epoch != self.switch_epoch {
            trace!(epoch, current = self.switch_epoch, "Dropping stale CPU snapshot");
            return;
        }

        match self.iconification {
            AppIconification::Uninitialized => {
                debug!("No lifecycle signal before cutoff, assuming background");
                self.iconification = AppIconification::Background;
                self.previous_snapshot = self
                    .assessor
                    .compute_cpu_snapshot(AppIconification::Background);
            }
            current => {
                let snapshot = self.assessor.compute_cpu_snapshot(current);
                self.post_diff(&self.previous_snapshot, &snapshot, current);
                self.previous_snapshot = snapshot;
            }
        }

        self.schedule_take_snapshot(self.iconification, self.switch_epoch);
    }

    /// Queue a log of the usage between two snapshots taken in `iconification`
    fn post_diff(&self, older: &CpuSnapshot, newer: &CpuSnapshot, iconification: AppIconification) {
        let Some(screen) = screen_for(iconification) else {
            return;
        };
        let Some(relative_usage) = self.assessor.relative_cpu_usage(older, newer) else {
            trace!(%iconification, "No usable CPU interval");
            return;
        };

        let command = Command::LogSnapshotDiff {
            relative_usage,
            screen,
        };
        let posted = self
            .mailbox
            .upgrade()
            .is_some_and(|sender| sender.send(command).is_ok());
        if !posted {
            warn!(relative_usage, "CPU snapshotter stopping, dropped usage sample");
        }
    }

    fn log_snapshot_diff(&self, relative_usage: f64, screen: ScreenName) {
        let sample = Sample::Usage {
            timestamp_millis: self.clock.current_time_millis(),
            relative_usage,
            screen,
        };
        if self.samples.send(sample).is_err() {
            warn!(relative_usage, "CPU sample forwarder stopped, dropped usage sample");
        }
    }
}

/// Log samples in arrival order until the actor drops its sender
async fn forward_samples(
    metrics: Arc<PerformanceMetricsController>,
    mut pending: mpsc::UnboundedReceiver<Sample>,
) {
    while let Some(sample) = pending.recv().await {
        match sample {
            Sample::Usage {
                timestamp_millis,
                relative_usage,
                screen,
            } => {
                trace!(relative_usage, %screen, "Logging CPU usage");
                metrics
                    .log_high_priority_metric(
                        timestamp_millis,
                        screen,
                        LoggableMetric::CpuUsage { relative_usage },
                    )
                    .await;
            }
            Sample::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }
    debug!("CPU sample forwarder stopped");
}

fn screen_for(iconification: AppIconification) -> Option<ScreenName> {
    match iconification {
        AppIconification::Foreground => Some(ScreenName::ForegroundScreen),
        AppIconification::Background => Some(ScreenName::BackgroundScreen),
        AppIconification::Uninitialized => None,
    }
}
