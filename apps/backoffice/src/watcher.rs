//! # Overdue Debt Watcher
//!
//! Polls for open debts past their due date and raises one notification per
//! debt when it first becomes overdue.
//!
//! ## Watcher Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Overdue Watcher Flow                                 │
//! │                                                                         │
//! │  interval.tick()  (first tick fires immediately, then every N secs)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  debts.overdue(now)         settled = 0 AND due_at < now               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OverdueTracker::newly_overdue                                         │
//! │       │   seen = {d1, d2}      current = [d1, d2, d3]  ──► [d3]        │
//! │       │   ids no longer overdue are forgotten                          │
//! │       ▼                                                                 │
//! │  Notifier::dispatch(DebtOverdue { .. })  once per new id               │
//! │                                                                         │
//! │  shutdown_rx.recv() ──► loop exits                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed poll is logged and retried on the next tick; it never stops
//! the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use kassa_core::debt::OverdueTracker;
use kassa_core::DebtOverview;
use kassa_db::{DbResult, DebtRepository};

use crate::notification::{Notification, Notifier};

// =============================================================================
// Source
// =============================================================================

/// Where the watcher reads overdue debts from.
pub trait OverdueSource: Send + Sync + 'static {
    fn overdue(&self, now: DateTime<Utc>) -> impl Future<Output = DbResult<Vec<DebtOverview>>> + Send;
}

impl OverdueSource for DebtRepository {
    fn overdue(&self, now: DateTime<Utc>) -> impl Future<Output = DbResult<Vec<DebtOverview>>> + Send {
        DebtRepository::overdue(self, now)
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// =============================================================================
// Watcher
// =============================================================================

pub struct OverdueWatcher<S: OverdueSource> {
    source: S,
    notifier: Notifier,
    tracker: OverdueTracker,
    interval: Duration,
    clock: Clock,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running watcher.
#[derive(Debug)]
pub struct WatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn shutdown(mut self) {
        // A closed channel means the loop already ended
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Overdue watcher task ended abnormally");
            }
        }
    }
}

impl<S: OverdueSource> OverdueWatcher<S> {
    pub fn new(source: S, notifier: Notifier, interval: Duration) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let watcher = OverdueWatcher {
            source,
            notifier,
            tracker: OverdueTracker::new(),
            interval,
            clock: Arc::new(Utc::now),
            shutdown_rx,
        };

        (watcher, shutdown_tx)
    }

    /// Replaces the wall clock used to decide what is overdue.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Starts the loop on the runtime and returns its handle.
    pub fn spawn(source: S, notifier: Notifier, interval: Duration) -> WatcherHandle {
        let (watcher, shutdown_tx) = Self::new(source, notifier, interval);
        WatcherHandle {
            shutdown_tx,
            task: Some(tokio::spawn(watcher.run())),
        }
    }

    /// Runs until a shutdown signal arrives or every sender is dropped.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Overdue watcher starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = (self.clock)();
                    if let Err(e) = self.check(now).await {
                        error!(error = %e, "Overdue check failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Overdue watcher shutting down");
                    break;
                }
            }
        }

        info!("Overdue watcher stopped");
    }

    /// One poll: notifies about debts that became overdue since the last
    /// poll and returns how many notifications were sent.
    pub async fn check(&mut self, now: DateTime<Utc>) -> DbResult<usize> {
        let overdue = self.source.overdue(now).await?;
        let fresh = self.tracker.newly_overdue(&overdue);

        for debt in &fresh {
            self.notifier.dispatch(&Notification::overdue(debt));
        }

        debug!(overdue = overdue.len(), notified = fresh.len(), "Overdue check complete");
        Ok(fresh.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::RecordingSink;
    use crate::state::{AppSettings, ConfigState};
    use crate::AppContext;
    use chrono::Duration as ChronoDuration;
    use kassa_core::checkout::{CheckoutLine, PaymentDetails};
    use kassa_db::{NewCustomer, NewProduct};
    use std::sync::Mutex;

    /// Debts served from memory, so the loop can run on a paused clock.
    #[derive(Default, Clone)]
    struct FakeDebts {
        current: Arc<Mutex<Vec<DebtOverview>>>,
    }

    impl FakeDebts {
        fn set(&self, debts: Vec<DebtOverview>) {
            *self.current.lock().unwrap() = debts;
        }
    }

    impl OverdueSource for FakeDebts {
        fn overdue(
            &self,
            _now: DateTime<Utc>,
        ) -> impl Future<Output = DbResult<Vec<DebtOverview>>> + Send {
            let debts = self.current.lock().unwrap().clone();
            async move { Ok(debts) }
        }
    }

    fn overview(id: &str) -> DebtOverview {
        let created = Utc::now() - ChronoDuration::days(40);
        DebtOverview {
            id: id.to_string(),
            sale_id: format!("sale-{id}"),
            invoice_number: format!("INV-20260101-{id}"),
            customer_id: "c1".into(),
            customer_name: "Amina".into(),
            customer_phone: "+254712345678".into(),
            amount_cents: 5000,
            paid_cents: 1000,
            due_at: created + ChronoDuration::days(30),
            settled: false,
            settlement: None,
            created_at: created,
        }
    }

    fn recording_notifier() -> (Notifier, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let notifier =
            Notifier::new(ConfigState::in_memory(AppSettings::default())).with_sink(sink.clone());
        (notifier, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_debt_is_announced_once() {
        let debts = FakeDebts::default();
        debts.set(vec![overview("0001")]);
        let (notifier, sink) = recording_notifier();

        let handle = OverdueWatcher::spawn(debts.clone(), notifier, Duration::from_secs(60));

        // First tick is immediate
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.count(), 1);

        // Same debt on later ticks: no repeat
        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(sink.count(), 1);

        debts.set(vec![overview("0001"), overview("0002")]);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.count(), 2);

        handle.shutdown().await;

        let delivered = sink.delivered.lock().unwrap();
        match &delivered[1].0 {
            Notification::DebtOverdue {
                debt_id,
                remaining_cents,
                ..
            } => {
                assert_eq!(debt_id, "0002");
                assert_eq!(*remaining_cents, 4000);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debt_overdue_again_is_announced_again() {
        let debts = FakeDebts::default();
        let (notifier, sink) = recording_notifier();
        let (mut watcher, _tx) = OverdueWatcher::new(debts.clone(), notifier, Duration::from_secs(60));
        let now = Utc::now();

        debts.set(vec![overview("0001")]);
        assert_eq!(watcher.check(now).await.unwrap(), 1);

        debts.set(vec![]);
        assert_eq!(watcher.check(now).await.unwrap(), 0);

        debts.set(vec![overview("0001")]);
        assert_eq!(watcher.check(now).await.unwrap(), 1);
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test]
    async fn test_check_against_database() {
        let ctx = AppContext::in_memory().await.unwrap();
        let shop = ctx.db.shop();
        let product = shop
            .products()
            .insert(NewProduct {
                name: "Radio".into(),
                price_cents: 2500,
                stock: 3,
                category_id: None,
                image_path: None,
            })
            .await
            .unwrap();
        let customer = shop
            .customers()
            .insert(NewCustomer {
                name: "Amina".into(),
                phone: "+254712345678".into(),
            })
            .await
            .unwrap();
        shop.ledger()
            .checkout(&[CheckoutLine::new(&product.id, 1)], &PaymentDetails::debt(&customer.id))
            .await
            .unwrap();

        let (notifier, sink) = recording_notifier();
        let (watcher, _tx) = OverdueWatcher::new(shop.debts(), notifier, Duration::from_secs(60));
        let later = Utc::now() + ChronoDuration::days(31);
        let mut watcher = watcher.with_clock(move || later);

        assert_eq!(watcher.check(Utc::now()).await.unwrap(), 0);
        let now = (watcher.clock)();
        assert_eq!(watcher.check(now).await.unwrap(), 1);
        assert_eq!(watcher.check(now).await.unwrap(), 0);

        let rendered = &sink.delivered.lock().unwrap()[0].1;
        assert!(rendered.body.contains("$25.00"));
    }
}
