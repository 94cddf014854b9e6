use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::api::Notifier;
use crate::blockchain::{ChangeDetector, CheckOutcome};
use crate::config::AppConfig;
use crate::error::{MonitorError, StoreError};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{AddressRegistry, WalletEntry};

/// How wallets are fanned out within one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyPolicy {
    /// Wallet checks running at the same time; 1 is strictly sequential
    pub max_in_flight: usize,
    /// Pause between launching consecutive checks
    pub spacing_ms: u64,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            max_in_flight: 1,
            spacing_ms: 1_000,
        }
    }
}

impl ConcurrencyPolicy {
    pub fn sequential(spacing_ms: u64) -> Self {
        Self {
            max_in_flight: 1,
            spacing_ms,
        }
    }

    fn spacing(&self) -> Duration {
        Duration::from_millis(self.spacing_ms)
    }
}

pub struct BalanceMonitorConfig {
    pub interval_seconds: u64,
    /// 0 disables the health check
    pub health_check_interval_seconds: u64,
    pub policy: ConcurrencyPolicy,
}

impl Default for BalanceMonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            health_check_interval_seconds: 60,
            policy: ConcurrencyPolicy::default(),
        }
    }
}

impl BalanceMonitorConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            interval_seconds: config.monitor.interval_seconds,
            health_check_interval_seconds: config.notifier.health_check_interval_seconds,
            policy: ConcurrencyPolicy {
                max_in_flight: config.monitor.max_in_flight,
                spacing_ms: config.monitor.spacing_ms,
            },
        }
    }
}

/// Outcome counts for one pass over the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub wallets: usize,
    pub unavailable: usize,
    pub baseline: usize,
    pub unchanged: usize,
    /// Balance differed from the stored one
    pub changed: usize,
    pub notified: usize,
    /// Store errors and rejected notifications
    pub failed: usize,
}

impl TickSummary {
    pub fn total(&self) -> usize {
        self.wallets
    }

    fn record(&mut self, result: &Result<CheckOutcome, StoreError>) {
        self.wallets += 1;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => {
                self.failed += 1;
                return;
            }
        };

        if outcome.balance_changed() {
            self.changed += 1;
        }
        match outcome {
            CheckOutcome::BalanceUnavailable => self.unavailable += 1,
            CheckOutcome::Baseline { .. } => self.baseline += 1,
            CheckOutcome::Unchanged => self.unchanged += 1,
            CheckOutcome::Notified { .. } => self.notified += 1,
            CheckOutcome::NotificationFailed { .. } => self.failed += 1,
            CheckOutcome::NoNewTransaction { .. } | CheckOutcome::NotificationsDisabled { .. } => {}
        }
    }
}

/// Polls every registered wallet on a fixed interval
pub struct BalanceMonitor {
    registry: Arc<AddressRegistry>,
    detector: ChangeDetector,
    pub config: BalanceMonitorConfig,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl BalanceMonitor {
    pub fn new(
        registry: AddressRegistry,
        detector: ChangeDetector,
        config: Option<BalanceMonitorConfig>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            detector,
            config: config.unwrap_or_default(),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    /// Apply `op` to every wallet under the concurrency policy
    async fn for_each_wallet<T, F, Fut>(&self, op: F) -> Vec<T>
    where
        F: Fn(WalletEntry) -> Fut,
        Fut: Future<Output = T>,
    {
        let policy = self.config.policy;
        let spacing = policy.spacing();

        stream::iter(self.registry.entries().to_vec().into_iter().enumerate())
            .then(move |(index, wallet)| async move {
                if index > 0 && !spacing.is_zero() {
                    sleep(spacing).await;
                }
                wallet
            })
            .map(op)
            .buffer_unordered(policy.max_in_flight.max(1))
            .collect()
            .await
    }

    /// Seed the store with every wallet's current balance.
    /// Returns the number of wallets seeded.
    pub async fn initialize(&self) -> usize {
        let context = LogContext::new("monitor", "initialize")
            .with_metadata("wallets", serde_json::json!(self.registry.len()));
        context.info("Initializing balances");

        let detector = &self.detector;
        let results = self
            .for_each_wallet(move |wallet| async move {
                let result = detector.seed_wallet(&wallet).await;
                (wallet, result)
            })
            .await;

        let mut seeded = 0;
        for (wallet, result) in results {
            match result {
                Ok(Some(_)) => seeded += 1,
                Ok(None) => {}
                Err(e) => ErrorLogger::log_error(
                    &MonitorError::Store(e),
                    Some(LogContext::new("monitor", "initialize").with_user_id(&wallet.user_id)),
                ),
            }
        }

        context
            .with_metadata("seeded", serde_json::json!(seeded))
            .info(&format!("Initialized {} of {} wallets", seeded, self.registry.len()));
        seeded
    }

    /// One pass of `check_wallet` over the registry
    pub async fn run_tick(&self) -> TickSummary {
        let monitor = PerformanceMonitor::new("tick");

        let detector = &self.detector;
        let results = self
            .for_each_wallet(move |wallet| async move {
                let result = detector.check_wallet(&wallet).await;
                (wallet, result)
            })
            .await;

        let mut summary = TickSummary::default();
        for (wallet, result) in &results {
            if let Err(e) = result {
                let context = LogContext::new("monitor", "check_wallet")
                    .with_user_id(&wallet.user_id)
                    .with_address(&wallet.address);
                context.error(&format!("Check aborted: {}", e));
            }
            summary.record(result);
        }

        MetricsLogger::log_tick_summary(&summary, monitor.elapsed_ms());
        summary
    }

    /// Initialization followed by a single tick
    pub async fn run_once(&self) -> TickSummary {
        self.initialize().await;
        self.run_tick().await
    }

    /// Initialize, then tick until shutdown is requested
    pub async fn start(&self) {
        info!(
            "Starting balance monitor for {} wallets with {} second interval",
            self.registry.len(),
            self.config.interval_seconds
        );

        let shutdown_signal = Arc::clone(&self.shutdown_signal);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    shutdown_signal.store(true, Ordering::Relaxed);
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        let health_check = self.spawn_health_check();

        self.initialize().await;

        let mut ticker = interval(Duration::from_secs(self.config.interval_seconds.max(1)));
        // a slow pass swallows the ticks it overran instead of bunching them
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if self.shutdown_signal.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping balance monitor");
                break;
            }

            self.run_tick().await;
        }

        if let Some(handle) = health_check {
            handle.abort();
        }
    }

    fn spawn_health_check(&self) -> Option<JoinHandle<()>> {
        let seconds = self.config.health_check_interval_seconds;
        let notifier: Arc<dyn Notifier> = match self.detector.notifier() {
            Some(notifier) if seconds > 0 => notifier,
            _ => {
                info!("Health check disabled");
                return None;
            }
        };

        let shutdown_signal = Arc::clone(&self.shutdown_signal);
        Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(seconds));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if shutdown_signal.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = notifier.health_check().await {
                    warn!("Health check failed: {}", e);
                }
            }
        }))
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting graceful shutdown");
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }
}
