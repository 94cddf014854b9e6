use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

use crate::api::{Notifier, PriceSource};
use crate::blockchain::ChainReader;
use crate::database::StateStore;
use crate::error::{MonitorError, StoreError};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};
use crate::models::{balance_change, latest_utime, ChangeEvent, WalletEntry};

/// Only the newest transaction matters for the watermark
const LATEST_TRANSACTION_LIMIT: u32 = 1;

/// Result of checking one wallet on one tick
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Balance read failed; nothing was touched
    BalanceUnavailable,
    /// No stored balance yet; the current one was stored
    Baseline { balance: Decimal },
    Unchanged,
    /// Balance moved but no transaction newer than the watermark was seen
    NoNewTransaction { change: Decimal },
    Notified { event: ChangeEvent },
    /// Event was built but the webhook rejected it; it is not retried
    NotificationFailed { event: ChangeEvent },
    /// Balance moved past the watermark while notifications are switched off
    NotificationsDisabled { change: Decimal, tx_timestamp: u64 },
}

impl CheckOutcome {
    pub fn balance_changed(&self) -> bool {
        matches!(
            self,
            CheckOutcome::NoNewTransaction { .. }
                | CheckOutcome::Notified { .. }
                | CheckOutcome::NotificationFailed { .. }
                | CheckOutcome::NotificationsDisabled { .. }
        )
    }
}

/// Compares each wallet against its stored state and reports real movements
#[derive(Clone)]
pub struct ChangeDetector {
    chain: Arc<dyn ChainReader>,
    prices: Arc<dyn PriceSource>,
    notifier: Option<Arc<dyn Notifier>>,
    store: StateStore,
    send_notifications: bool,
}

impl ChangeDetector {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceSource>,
        notifier: Option<Arc<dyn Notifier>>,
        store: StateStore,
        send_notifications: bool,
    ) -> Self {
        Self {
            chain,
            prices,
            notifier,
            store,
            send_notifications,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.notifier.clone()
    }

    /// Overwrite the stored balance with the current one.
    ///
    /// Returns `None` when the balance could not be read; the wallet then
    /// gets its baseline on the first tick instead.
    pub async fn seed_wallet(&self, wallet: &WalletEntry) -> Result<Option<Decimal>, StoreError> {
        let context = LogContext::new("detector", "seed_wallet")
            .with_user_id(&wallet.user_id)
            .with_address(&wallet.address);

        let balance = match self.chain.balance(&wallet.address).await {
            Ok(balance) => balance,
            Err(e) => {
                ErrorLogger::log_error(&e, Some(context));
                return Ok(None);
            }
        };

        self.store.set_balance(&wallet.user_id, balance).await?;
        let watermark = self.store.get_watermark(&wallet.user_id).await?;

        context
            .with_balance(&balance.to_string())
            .with_metadata("watermark", json!(watermark))
            .info(&format!("Initial balance for user {}: {}", wallet.user_id, balance));

        Ok(Some(balance))
    }

    /// Run one balance check for a wallet. Store failures end the check.
    pub async fn check_wallet(&self, wallet: &WalletEntry) -> Result<CheckOutcome, StoreError> {
        let user_id = wallet.user_id.as_str();
        let address = wallet.address.as_str();

        let current = match self.chain.balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                let context = LogContext::new("detector", "check_wallet")
                    .with_user_id(user_id)
                    .with_address(address);
                ErrorLogger::log_error(&e, Some(context));
                return Ok(CheckOutcome::BalanceUnavailable);
            }
        };

        let previous = match self.store.get_balance(user_id).await? {
            Some(previous) => previous,
            None => {
                self.store.set_balance(user_id, current).await?;
                LogContext::new("detector", "check_wallet")
                    .with_user_id(user_id)
                    .with_balance(&current.to_string())
                    .info("No stored balance, recorded baseline");
                return Ok(CheckOutcome::Baseline { balance: current });
            }
        };

        if current == previous {
            return Ok(CheckOutcome::Unchanged);
        }

        let change = balance_change(current, previous);
        self.store.set_balance(user_id, current).await?;
        MetricsLogger::log_balance_change(user_id, address, &change.to_string(), &current.to_string());

        let transactions = match self
            .chain
            .recent_transactions(address, LATEST_TRANSACTION_LIMIT)
            .await
        {
            Ok(transactions) => transactions,
            Err(e) => {
                let context = LogContext::new("detector", "recent_transactions")
                    .with_user_id(user_id)
                    .with_address(address);
                ErrorLogger::log_error(&e, Some(context));
                Vec::new()
            }
        };

        let latest = latest_utime(&transactions);
        let watermark = self.store.get_watermark(user_id).await?;

        if latest == 0 || latest <= watermark {
            LogContext::new("detector", "check_wallet")
                .with_user_id(user_id)
                .with_metadata("latest_utime", json!(latest))
                .with_metadata("watermark", json!(watermark))
                .debug("Balance changed without a new transaction");
            return Ok(CheckOutcome::NoNewTransaction { change });
        }

        self.store.set_watermark(user_id, latest).await?;

        let notifier = match (&self.notifier, self.send_notifications) {
            (Some(notifier), true) => notifier,
            _ => {
                return Ok(CheckOutcome::NotificationsDisabled {
                    change,
                    tx_timestamp: latest,
                })
            }
        };

        let event = ChangeEvent {
            user_id: user_id.to_string(),
            wallet_address: address.to_string(),
            change,
            balance: current,
            tx_timestamp: latest,
            price: self.prices.usd_price().await,
        };

        match notifier.send_balance_update(&event).await {
            Ok(()) => Ok(CheckOutcome::Notified { event }),
            Err(e) => {
                let context = LogContext::new("detector", "notify")
                    .with_user_id(user_id)
                    .with_metadata("tx_timestamp", json!(latest));
                ErrorLogger::log_error(&MonitorError::Notify(e), Some(context));
                Ok(CheckOutcome::NotificationFailed { event })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, RpcError};
    use crate::models::TransactionRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[derive(Default)]
    struct FakeChain {
        balance: Mutex<Option<Decimal>>,
        transactions: Mutex<Option<Vec<TransactionRecord>>>,
    }

    impl FakeChain {
        fn set(&self, balance: Option<&str>, utimes: Option<&[u64]>) {
            *self.balance.lock().unwrap() = balance.map(dec);
            *self.transactions.lock().unwrap() =
                utimes.map(|u| u.iter().copied().map(TransactionRecord::at).collect());
        }
    }

    #[async_trait]
    impl ChainReader for FakeChain {
        async fn balance(&self, _address: &str) -> Result<Decimal, MonitorError> {
            self.balance
                .lock()
                .unwrap()
                .ok_or(MonitorError::Rpc(RpcError::Timeout { seconds: 1 }))
        }

        async fn recent_transactions(
            &self,
            _address: &str,
            _limit: u32,
        ) -> Result<Vec<TransactionRecord>, MonitorError> {
            self.transactions
                .lock()
                .unwrap()
                .clone()
                .ok_or(MonitorError::Rpc(RpcError::RateLimit))
        }
    }

    struct FixedPrice;

    #[async_trait]
    impl PriceSource for FixedPrice {
        async fn usd_price(&self) -> Decimal {
            dec("5.37")
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<ChangeEvent>>,
        reject: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_balance_update(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
            if self.reject {
                return Err(NotifyError::UnexpectedStatus {
                    status: 500,
                    body: String::new(),
                });
            }
            self.sent.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn health_check(&self) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    struct Harness {
        chain: Arc<FakeChain>,
        notifier: Arc<RecordingNotifier>,
        store: StateStore,
        detector: ChangeDetector,
        wallet: WalletEntry,
    }

    fn harness_with(notifier: RecordingNotifier, send_notifications: bool) -> Harness {
        let chain = Arc::new(FakeChain::default());
        let notifier = Arc::new(notifier);
        let store = StateStore::in_memory();
        let detector = ChangeDetector::new(
            chain.clone(),
            Arc::new(FixedPrice),
            Some(notifier.clone() as Arc<dyn Notifier>),
            store.clone(),
            send_notifications,
        );
        Harness {
            chain,
            notifier,
            store,
            detector,
            wallet: WalletEntry::new("42", "EQAaaaa"),
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingNotifier::default(), true)
    }

    async fn seed(h: &Harness, balance: &str, watermark: u64) {
        h.store.set_balance("42", dec(balance)).await.unwrap();
        h.store.set_watermark("42", watermark).await.unwrap();
    }

    #[tokio::test]
    async fn test_equal_balance_is_unchanged() {
        let h = harness();
        seed(&h, "5.0", 1000).await;
        h.chain.set(Some("5.00"), Some(&[1200]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Unchanged);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_change_without_newer_transaction() {
        let h = harness();
        seed(&h, "5.0", 1000).await;
        h.chain.set(Some("7.5"), Some(&[1000]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert_eq!(outcome, CheckOutcome::NoNewTransaction { change: dec("2.5") });
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.get_balance("42").await.unwrap(), Some(dec("7.5")));
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_change_with_newer_transaction_notifies_once() {
        let h = harness();
        seed(&h, "5.0", 1000).await;
        h.chain.set(Some("7.5"), Some(&[1200]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        let expected = ChangeEvent {
            user_id: "42".to_string(),
            wallet_address: "EQAaaaa".to_string(),
            change: dec("2.5"),
            balance: dec("7.5"),
            tx_timestamp: 1200,
            price: dec("5.37"),
        };
        assert_eq!(outcome, CheckOutcome::Notified { event: expected.clone() });
        assert_eq!(*h.notifier.sent.lock().unwrap(), vec![expected]);
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 1200);

        // same external state on the next tick
        let again = h.detector.check_wallet(&h.wallet).await.unwrap();
        assert_eq!(again, CheckOutcome::Unchanged);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_negative_change() {
        let h = harness();
        seed(&h, "10", 0).await;
        h.chain.set(Some("3.25"), Some(&[50]));

        match h.detector.check_wallet(&h.wallet).await.unwrap() {
            CheckOutcome::Notified { event } => assert_eq!(event.change, dec("-6.75")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_balance_read_leaves_state_alone() {
        let h = harness();
        seed(&h, "5.0", 1000).await;
        h.chain.set(None, Some(&[1200]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert_eq!(outcome, CheckOutcome::BalanceUnavailable);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.get_balance("42").await.unwrap(), Some(dec("5.0")));
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_missing_stored_balance_becomes_baseline() {
        let h = harness();
        h.chain.set(Some("4"), Some(&[1200]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Baseline { balance: dec("4") });
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.get_balance("42").await.unwrap(), Some(dec("4")));
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_transaction_read_counts_as_empty() {
        let h = harness();
        seed(&h, "5.0", 0).await;
        h.chain.set(Some("6"), None);

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert_eq!(outcome, CheckOutcome::NoNewTransaction { change: dec("1") });
        assert_eq!(h.store.get_balance("42").await.unwrap(), Some(dec("6")));
    }

    #[tokio::test]
    async fn test_rejected_notification_still_advances_watermark() {
        let h = harness_with(
            RecordingNotifier {
                reject: true,
                ..Default::default()
            },
            true,
        );
        seed(&h, "1", 10).await;
        h.chain.set(Some("2"), Some(&[20]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert!(matches!(outcome, CheckOutcome::NotificationFailed { .. }));
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 20);
        assert_eq!(h.detector.check_wallet(&h.wallet).await.unwrap(), CheckOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_notifications_disabled() {
        let h = harness_with(RecordingNotifier::default(), false);
        seed(&h, "1", 10).await;
        h.chain.set(Some("2"), Some(&[20]));

        let outcome = h.detector.check_wallet(&h.wallet).await.unwrap();

        assert_eq!(
            outcome,
            CheckOutcome::NotificationsDisabled {
                change: dec("1"),
                tx_timestamp: 20
            }
        );
        assert!(outcome.balance_changed());
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_seed_overwrites_balance_and_keeps_watermark() {
        let h = harness();
        seed(&h, "1", 500).await;
        h.chain.set(Some("9"), None);

        let seeded = h.detector.seed_wallet(&h.wallet).await.unwrap();

        assert_eq!(seeded, Some(dec("9")));
        assert_eq!(h.store.get_balance("42").await.unwrap(), Some(dec("9")));
        assert_eq!(h.store.get_watermark("42").await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_seed_skips_unreadable_wallet() {
        let h = harness();
        h.chain.set(None, None);

        assert_eq!(h.detector.seed_wallet(&h.wallet).await.unwrap(), None);
        assert_eq!(h.store.get_balance("42").await.unwrap(), None);
    }
}
