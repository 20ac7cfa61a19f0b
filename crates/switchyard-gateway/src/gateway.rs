//! The gateway: one outbound connection to the remote control service.
//!
//! Inbound frames are decoded through the [`MessageCatalog`] and dispatched
//! on the bus. Outbound topics bound in the catalog are queued by their bus
//! subscribers and written to the open link. The gateway reconnects
//! forever.
//!
//! Outbound frames are not buffered across disconnects. Whatever sits in
//! the outbox when a new session starts is stale and gets dropped, so a
//! reconnect never replays old telemetry.

use crate::catalog::MessageCatalog;
use crate::traits::{Connector, GatewayError, Link};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::TopicBus;
use switchyard_protocol::Frame;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Metric names.
pub mod names {
    pub const FRAMES_TOTAL: &str = "switchyard_gateway_frames_total";
    pub const DISPATCH_FAILURES_TOTAL: &str = "switchyard_gateway_dispatch_failures_total";
    pub const RECONNECTS_TOTAL: &str = "switchyard_gateway_reconnects_total";
    pub const FRAMES_DROPPED_TOTAL: &str = "switchyard_gateway_frames_dropped_total";
}

/// Describe the gateway metrics to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::FRAMES_TOTAL,
        "Frames moved by the gateway, by direction"
    );
    metrics::describe_counter!(
        names::DISPATCH_FAILURES_TOTAL,
        "Inbound frames that failed to decode or dispatch"
    );
    metrics::describe_counter!(names::RECONNECTS_TOTAL, "Gateway reconnect attempts");
    metrics::describe_counter!(
        names::FRAMES_DROPPED_TOTAL,
        "Outbound frames dropped because the outbox was full or stale"
    );
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Wait between a disconnect and the next connect attempt.
    pub reconnect_delay: Duration,
    /// Token sent in an `authorize` frame right after connecting.
    pub auth_token: Option<String>,
    /// Outbound frames held while a send is in progress.
    pub outbox_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            auth_token: None,
            outbox_capacity: 64,
        }
    }
}

/// Gateway counters.
#[derive(Debug, Default)]
pub struct GatewayStats {
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    frames_queued: AtomicU64,
    frames_dropped: AtomicU64,
    unknown_frames: AtomicU64,
    dispatch_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl GatewayStats {
    pub(crate) fn record_queued(&self) {
        self.frames_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: u64) {
        self.frames_dropped.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(names::FRAMES_DROPPED_TOTAL).increment(count);
    }

    fn record_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::FRAMES_TOTAL, "direction" => "in").increment(1);
    }

    fn record_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::FRAMES_TOTAL, "direction" => "out").increment(1);
    }

    fn record_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::DISPATCH_FAILURES_TOTAL).increment(1);
    }

    fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::RECONNECTS_TOTAL).increment(1);
    }

    /// Take a consistent-enough copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            unknown_frames: self.unknown_frames.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStatsSnapshot {
    /// Frames received from the remote service.
    pub frames_in: u64,
    /// Frames written to the remote service.
    pub frames_out: u64,
    /// Frames queued by outbound subscribers.
    pub frames_queued: u64,
    /// Outbound frames dropped on a full outbox or discarded as stale.
    pub frames_dropped: u64,
    /// Inbound frames with no catalog binding.
    pub unknown_frames: u64,
    /// Inbound frames that failed to decode or dispatch.
    pub dispatch_failures: u64,
    /// Connect attempts after the first.
    pub reconnects: u64,
}

enum Event {
    Outbound(Option<Frame>),
    Inbound(Result<Option<Frame>, GatewayError>),
}

/// Bridges a [`Connector`] onto a [`TopicBus`].
pub struct Gateway {
    bus: Arc<TopicBus>,
    catalog: Arc<MessageCatalog>,
    connector: Arc<dyn Connector>,
    config: GatewayConfig,
    stats: Arc<GatewayStats>,
    outbox_tx: mpsc::Sender<Frame>,
    outbox_rx: mpsc::Receiver<Frame>,
}

impl Gateway {
    /// Create a gateway. Nothing is bound or dialed yet.
    pub fn new(
        bus: Arc<TopicBus>,
        catalog: MessageCatalog,
        connector: Arc<dyn Connector>,
        config: GatewayConfig,
    ) -> Self {
        let (outbox_tx, outbox_rx) = mpsc::channel(config.outbox_capacity.max(1));
        Self {
            bus,
            catalog: Arc::new(catalog),
            connector,
            config,
            stats: Arc::new(GatewayStats::default()),
            outbox_tx,
            outbox_rx,
        }
    }

    /// Subscribe every outbound catalog binding on the bus.
    ///
    /// Call once, during the registration phase.
    pub fn bind(&self) {
        self.catalog
            .bind_outbound(&self.bus, &self.outbox_tx, &self.stats);
        info!(
            connector = self.connector.name(),
            inbound = self.catalog.inbound_tags().len(),
            outbound = self.catalog.outbound_tags().len(),
            "Gateway bound"
        );
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<GatewayStats> {
        self.stats.clone()
    }

    /// Connect and serve forever, reconnecting after every failure.
    pub async fn run(mut self) {
        let mut attempt: u64 = 0;
        loop {
            if attempt > 0 {
                self.stats.record_reconnect();
                tokio::time::sleep(self.config.reconnect_delay).await;
            }
            attempt += 1;

            let mut link = match self.connector.connect().await {
                Ok(link) => link,
                Err(e) => {
                    warn!(
                        connector = self.connector.name(),
                        attempt,
                        error = %e,
                        "Gateway connect failed"
                    );
                    continue;
                }
            };

            info!(
                connector = self.connector.name(),
                peer = ?link.peer(),
                "Gateway connected"
            );

            match self.session(link.as_mut()).await {
                Ok(()) => info!(peer = ?link.peer(), "Gateway link closed"),
                Err(e) => warn!(peer = ?link.peer(), error = %e, "Gateway link failed"),
            }
        }
    }

    /// Drop frames queued while no link was open.
    fn discard_stale(&mut self) {
        let mut stale = 0;
        while self.outbox_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            self.stats.record_dropped(stale);
            debug!(stale, "Discarded outbound frames queued while disconnected");
        }
    }

    async fn session(&mut self, link: &mut dyn Link) -> Result<(), GatewayError> {
        self.discard_stale();

        if let Some(token) = &self.config.auth_token {
            link.send(Frame::authorize(token.clone())).await?;
            self.stats.record_out();
            debug!("Sent authorize frame");
        }

        loop {
            let event = tokio::select! {
                frame = self.outbox_rx.recv() => Event::Outbound(frame),
                frame = link.recv() => Event::Inbound(frame),
            };

            match event {
                Event::Outbound(Some(frame)) => {
                    trace!(tag = %frame.kind, "Sending frame");
                    link.send(frame).await?;
                    self.stats.record_out();
                }
                // The gateway holds a sender, so the queue never closes.
                Event::Outbound(None) => return Ok(()),
                Event::Inbound(Ok(Some(frame))) => self.handle_inbound(frame).await,
                Event::Inbound(Ok(None)) => return Ok(()),
                Event::Inbound(Err(GatewayError::Protocol(e))) => {
                    self.stats.record_failure();
                    warn!(error = %e, "Discarding malformed frame");
                }
                Event::Inbound(Err(e)) => return Err(e),
            }
        }
    }

    async fn handle_inbound(&self, frame: Frame) {
        self.stats.record_in();
        let tag = frame.kind.clone();

        match self.catalog.decode(frame) {
            Ok(Some(topic)) => {
                trace!(tag = %tag, topic = %topic.name(), "Dispatching inbound frame");
                if let Err(e) = self.bus.dispatch(topic).await {
                    self.stats.record_failure();
                    error!(tag = %tag, error = %e, "Inbound dispatch failed");
                }
            }
            Ok(None) => {
                self.stats.unknown_frames.fetch_add(1, Ordering::Relaxed);
                debug!(tag = %tag, "No inbound binding for frame");
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(tag = %tag, error = %e, "Failed to decode inbound frame");
            }
        }
    }
}
