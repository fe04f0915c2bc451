//! Background loop driving the processor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use common::SharedClock;
use futures_util::FutureExt;
use outbox_store::OutboxStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::config::OutboxOptions;
use crate::dispatcher::SubscriberRegistry;
use crate::processor::{BatchSummary, OutboxProcessor};
use crate::retry::RetryPolicy;

/// Repeatedly runs processing passes until cancelled.
///
/// Each iteration builds a fresh [`OutboxProcessor`] so no per-pass state
/// survives between iterations. A failed or panicking pass is logged and
/// counted, never fatal to the loop.
pub struct OutboxPoller<S> {
    store: S,
    registry: Arc<SubscriberRegistry>,
    clock: SharedClock,
    options: OutboxOptions,
}

impl<S: OutboxStore + Clone + 'static> OutboxPoller<S> {
    pub fn new(
        store: S,
        registry: Arc<SubscriberRegistry>,
        clock: SharedClock,
        options: OutboxOptions,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            options: options.normalized(),
        }
    }

    pub fn options(&self) -> &OutboxOptions {
        &self.options
    }

    fn processor(&self) -> OutboxProcessor<S> {
        OutboxProcessor::new(
            self.store.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
            RetryPolicy::from_options(&self.options),
        )
    }

    /// Runs a single processing pass.
    pub async fn run_once(&self) -> Result<BatchSummary> {
        self.processor()
            .process_pending(self.options.batch_size)
            .await
    }

    /// Polls until `shutdown` is cancelled.
    ///
    /// A pass in progress always completes; cancellation only interrupts the
    /// sleep between passes.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.options.batch_size,
            polling_interval_ms = self.options.polling_interval.as_millis() as u64,
            subscribers = self.registry.subscriber_count(),
            "outbox poller started"
        );

        while !shutdown.is_cancelled() {
            match AssertUnwindSafe(self.run_once()).catch_unwind().await {
                Ok(Ok(summary)) if summary.examined > 0 => {
                    tracing::info!(
                        examined = summary.examined,
                        processed = summary.processed,
                        retried = summary.retried,
                        dead_lettered = summary.dead_lettered,
                        "outbox pass complete"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "outbox pass failed");
                    metrics::counter!("outbox_poller_failures_total").increment(1);
                }
                Err(_) => {
                    tracing::error!("outbox pass panicked");
                    metrics::counter!("outbox_poller_failures_total").increment(1);
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.options.polling_interval) => {}
            }
        }

        tracing::info!("outbox poller stopped");
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
