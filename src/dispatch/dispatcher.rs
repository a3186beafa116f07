//! Event dispatch loop

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::config::DispatcherConfig;
use super::queue::EventQueue;
use crate::event::Event;
use crate::registry::{ConnectionHandle, ConnectionRegistry, DeliveryError, EventFrame};
use crate::resolver::{DestinationResolver, MembershipStore};
use crate::stats::DispatchStats;

/// Single consumer of the event queue
///
/// For each event: resolve the destination, snapshot the live handles
/// (minus the sender), serialize once, and deliver to every handle
/// concurrently. All deliveries of one event finish before the next event is
/// taken, which keeps per-connection order equal to enqueue order.
pub struct EventDispatcher<H, M> {
    rx: mpsc::Receiver<Event>,
    registry: Arc<ConnectionRegistry<H>>,
    resolver: DestinationResolver<M>,
    config: DispatcherConfig,
    stats: Arc<DispatchStats>,
}

impl<H, M> EventDispatcher<H, M>
where
    H: ConnectionHandle,
    M: MembershipStore,
{
    /// Create a dispatcher and the queue handle that feeds it
    pub fn new(
        registry: Arc<ConnectionRegistry<H>>,
        resolver: DestinationResolver<M>,
        config: DispatcherConfig,
    ) -> (Self, EventQueue) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        let dispatcher = Self {
            rx,
            registry,
            resolver,
            config,
            stats: Arc::new(DispatchStats::new()),
        };

        (dispatcher, EventQueue::new(tx))
    }

    /// Shared dispatch counters
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Run until cancelled or until every queue handle is dropped
    ///
    /// Cancellation is only observed between events: deliveries already in
    /// flight complete, and events still queued are discarded.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            queue_capacity = self.config.queue_capacity,
            delivery_timeout_ms = self.config.delivery_timeout.as_millis() as u64,
            "Event dispatcher started"
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.dispatch(event).await;

            // Let co-resident tasks run between events
            tokio::task::yield_now().await;
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            events = snapshot.events_received,
            dropped = snapshot.events_dropped,
            deliveries = snapshot.deliveries,
            pending = self.rx.len(),
            "Event dispatcher stopped"
        );
    }

    /// Spawn the dispatch loop on the runtime
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Deliver one event to its live recipients
    ///
    /// Returns the number of successful deliveries. Failures are logged and
    /// counted, never propagated.
    pub async fn dispatch(&self, event: Event) -> usize {
        self.stats.record_event();

        let recipients = match self.resolver.resolve(&event.destination()).await {
            Ok(recipients) => recipients,
            Err(e) => {
                self.stats.record_dropped();
                tracing::warn!(
                    event = %event.kind(),
                    destination = %event.destination(),
                    error = %e,
                    "Dropping event: destination could not be resolved"
                );
                return 0;
            }
        };

        let live = self.registry.resolve_live(&recipients, event.source()).await;
        if live.is_empty() {
            tracing::trace!(
                event = %event.kind(),
                destination = %event.destination(),
                members = recipients.len(),
                "No online recipients"
            );
            return 0;
        }

        let frame = match EventFrame::encode(&event) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_dropped();
                tracing::warn!(event = %event.kind(), error = %e, "Dropping event: encoding failed");
                return 0;
            }
        };

        let timeout = self.config.delivery_timeout;
        let deliveries = live.into_iter().map(|(user_id, handle)| {
            let frame = frame.clone();
            async move {
                let result = match tokio::time::timeout(timeout, handle.send(frame)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::Timeout(timeout)),
                };
                (user_id, result)
            }
        });

        let mut delivered = 0;
        for (user_id, result) in join_all(deliveries).await {
            match result {
                Ok(()) => {
                    delivered += 1;
                    self.stats.record_delivery();
                }
                Err(e @ DeliveryError::Timeout(_)) => {
                    self.stats.record_timeout();
                    tracing::debug!(user_id = user_id, event = %event.kind(), error = %e, "Delivery skipped");
                }
                Err(e) => {
                    self.stats.record_failure();
                    tracing::debug!(user_id = user_id, event = %event.kind(), error = %e, "Delivery skipped");
                }
            }
        }

        tracing::debug!(
            event = %event.kind(),
            destination = %event.destination(),
            members = recipients.len(),
            delivered = delivered,
            "Event dispatched"
        );

        delivered
    }
}
