//! Periodic re-reads of a view.
//!
//! A [`ViewRefresher`] re-runs a read on a fixed interval in a background task
//! and publishes each completed result on a `watch` channel. Runs for the same
//! view never overlap: a tick or manual refresh that finds a run in flight is
//! skipped. The published value is replaced only once a new read has finished,
//! and a failed read keeps the previous value.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use shopkart_core::{Product, UserId};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::marketplace::Marketplace;
use crate::query::ProductQuery;
use crate::stats::SellerStats;

type ReadFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
type ReadFn<T> = Box<dyn Fn() -> ReadFuture<T> + Send + Sync>;

struct Shared<T> {
    view: &'static str,
    read: ReadFn<T>,
    running: Mutex<()>,
    tx: watch::Sender<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> Shared<T> {
    /// Run one read unless one is in flight. `Ok(false)` means skipped.
    async fn run_once(&self) -> Result<bool> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(false);
        };
        let value = (self.read)().await?;
        self.tx.send_replace(Some(Arc::new(value)));
        Ok(true)
    }
}

/// Background refresh loop for one view. Stops when dropped.
pub struct ViewRefresher<T> {
    shared: Arc<Shared<T>>,
    rx: watch::Receiver<Option<Arc<T>>>,
    task: JoinHandle<()>,
}

impl<T> std::fmt::Debug for ViewRefresher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRefresher")
            .field("view", &self.shared.view)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> ViewRefresher<T> {
    /// Spawn a loop running `read` every `period`, starting immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(view: &'static str, period: Duration, read: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let read: ReadFn<T> = Box::new(move || -> ReadFuture<T> { Box::pin(read()) });
        let (tx, rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            view,
            read,
            running: Mutex::new(()),
            tx,
        });

        let period = period.max(Duration::from_millis(1));
        info!(view, period_ms = period.as_millis(), "Spawning view refresher");
        let task = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                let mut ticker = time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    match shared.run_once().await {
                        Ok(true) => debug!(view, "Refreshed view"),
                        Ok(false) => debug!(view, "Refresh still running, tick skipped"),
                        Err(e) => warn!(view, error = %e, "View refresh failed, keeping last result"),
                    }
                }
            }
        });

        Self { shared, rx, task }
    }

    /// Most recent completed result.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<T>> {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every completed refresh.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.rx.clone()
    }

    /// Wait until the first read has completed and return its result.
    pub async fn first(&self) -> Option<Arc<T>> {
        let mut rx = self.rx.clone();
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.clone())
    }

    /// Refresh now, outside the schedule. Returns `false` when a run was
    /// already in flight and this request was skipped.
    ///
    /// # Errors
    ///
    /// Returns the read's error; the published value is left unchanged.
    pub async fn refresh_now(&self) -> Result<bool> {
        self.shared.run_once().await
    }
}

impl<T> Drop for ViewRefresher<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Marketplace {
    /// Keep `query` fresh at the configured refresh interval.
    #[must_use]
    pub fn watch_products(&self, query: ProductQuery) -> ViewRefresher<Vec<Product>> {
        let market = self.clone();
        let query = Arc::new(query);
        ViewRefresher::spawn("products", self.config().refresh_interval, move || {
            let market = market.clone();
            let query = Arc::clone(&query);
            async move { market.products(&query).await }
        })
    }

    /// Keep `seller`'s dashboard figures fresh at the configured refresh interval.
    #[must_use]
    pub fn watch_seller_stats(&self, seller: UserId) -> ViewRefresher<SellerStats> {
        let market = self.clone();
        ViewRefresher::spawn("seller-stats", self.config().refresh_interval, move || {
            let market = market.clone();
            async move { market.seller_stats(seller).await }
        })
    }
}
