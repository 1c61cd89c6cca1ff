use std::time::Duration;

use chrono::{DateTime, Local, LocalResult, TimeZone, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::scanner::FraudScanner;
use crate::retry::backoff;
use crate::store::WalletStore;

/// When the first scan happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAnchor {
    /// The next local midnight after the runner starts.
    LocalMidnight,
    /// A fixed delay after the runner starts.
    After(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSchedule {
    pub interval: Duration,
    pub anchor: ScanAnchor,
}

impl Default for ScanSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            anchor: ScanAnchor::LocalMidnight,
        }
    }
}

impl ScanSchedule {
    pub fn first_delay(&self, now: DateTime<Local>) -> Duration {
        match self.anchor {
            ScanAnchor::After(delay) => delay,
            ScanAnchor::LocalMidnight => (next_midnight_after(&now) - now)
                .to_std()
                .unwrap_or(Duration::ZERO),
        }
    }
}

/// First instant of the next calendar day in `now`'s zone.
///
/// Where a DST change skips local midnight the first valid local time after
/// it is used; where midnight occurs twice, the earlier one.
pub fn next_midnight_after<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let fallback = now.clone() + chrono::Duration::days(1);

    let Some(midnight) = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
    else {
        return fallback;
    };

    for minutes in (0..=180).step_by(30) {
        match tz.from_local_datetime(&(midnight + chrono::Duration::minutes(minutes))) {
            LocalResult::Single(t) => return t,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => continue,
        }
    }
    fallback
}

/// Shortest interval between scheduled passes.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Config for the background fraud scanner.
#[derive(Debug, Clone)]
pub struct ScannerRunner {
    pub schedule: ScanSchedule,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for ScannerRunner {
    fn default() -> Self {
        Self {
            schedule: ScanSchedule::default(),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for the running scanner (shutdown + trigger hook).
#[derive(Debug)]
pub struct ScannerHandle {
    cancel: CancellationToken,
    trigger: mpsc::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl ScannerHandle {
    /// Request an immediate pass. Triggers are coalesced: if one is already
    /// pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop scheduling, let an in-flight pass stop at its next bulk update,
    /// and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "fraud scanner task ended abnormally");
            }
        }
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ScannerRunner {
    /// Spawn the scanner on the current tokio runtime.
    ///
    /// - Schedule: first pass per `schedule.anchor`, then every `interval`
    /// - Trigger: `handle.trigger()` runs a pass immediately
    /// - Failures: logged + retried with bounded exponential backoff; never propagate
    ///
    /// An interval below [`MIN_SCAN_INTERVAL`] is raised to it.
    pub fn spawn<S>(&self, scanner: FraudScanner<S>) -> ScannerHandle
    where
        S: WalletStore + 'static,
    {
        let cancel = CancellationToken::new();
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);

        let mut cfg = self.clone();
        if cfg.schedule.interval < MIN_SCAN_INTERVAL {
            warn!(
                runner = "fraud_scanner",
                interval_ms = cfg.schedule.interval.as_millis() as u64,
                "scan interval too short; using the minimum"
            );
            cfg.schedule.interval = MIN_SCAN_INTERVAL;
        }
        let token = cancel.clone();
        let join = tokio::spawn(async move { runner_loop(cfg, scanner, token, trigger_rx).await });

        ScannerHandle {
            cancel,
            trigger: trigger_tx,
            join: Some(join),
        }
    }
}

async fn runner_loop<S: WalletStore>(
    cfg: ScannerRunner,
    scanner: FraudScanner<S>,
    cancel: CancellationToken,
    mut trigger_rx: mpsc::Receiver<()>,
) {
    let first = cfg.schedule.first_delay(Local::now());
    info!(
        runner = "fraud_scanner",
        first_run_in_secs = first.as_secs(),
        interval_secs = cfg.schedule.interval.as_secs(),
        "fraud scanner started"
    );

    let mut next_tick = Instant::now() + first;

    loop {
        tokio::select! {
            // Shutdown has priority.
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(next_tick) => {
                let now = Instant::now();
                // Keep a stable cadence even if we were delayed.
                while next_tick <= now {
                    next_tick += cfg.schedule.interval;
                }
            }
            Some(()) = trigger_rx.recv() => {}
        }

        run_pass(&cfg, &scanner, &cancel).await;
    }

    info!(runner = "fraud_scanner", "fraud scanner stopped");
}

async fn run_pass<S: WalletStore>(
    cfg: &ScannerRunner,
    scanner: &FraudScanner<S>,
    cancel: &CancellationToken,
) {
    let mut failures: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        match scanner.scan(Utc::now(), cancel).await {
            Ok(_) => return,
            Err(e) => {
                failures += 1;
                warn!(runner = "fraud_scanner", attempt = failures, error = %e, "fraud scan failed");
                if failures > cfg.max_retries {
                    warn!(runner = "fraud_scanner", "giving up until the next scheduled pass");
                    return;
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(backoff(cfg.base_backoff, failures)) => {}
                }
            }
        }
    }
}
