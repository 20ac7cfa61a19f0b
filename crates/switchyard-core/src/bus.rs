//! The topic bus.
//!
//! Every dispatched topic runs through three stages, strictly in order:
//!
//! 1. **Middleware** registered for the topic's name, in registration order.
//!    Any middleware may mutate the topic or drop it.
//! 2. **Transformers** registered for the name, in registration order. Each
//!    produces a variant; once all variants are collected, each one is
//!    handed to the subscribers of its own name.
//! 3. **Subscribers** registered for the name, in registration order.
//!
//! Errors returned by a unit abort the rest of the dispatch and come back
//! to the caller unchanged. Work already done (in-place mutations, earlier
//! deliveries) is not undone.
//!
//! # Registration phase
//!
//! Registrations are expected to finish before steady-state dispatch
//! begins. Registering while a dispatch is in flight is a precondition
//! violation: the in-flight dispatch may or may not observe the new unit.
//! Registrations made after the first dispatch are logged as warnings.

use crate::metrics::names;
use crate::pipeline::{
    BoxError, Flow, Middleware, MiddlewareFn, RawMiddleware, RawSubscriber, RawTransformer,
    Subscriber, SubscriberFn, Transformer, TransformerFn, TypedMiddleware, TypedSubscriber,
    TypedTransformer, Verdict,
};
use crate::registry::TopicRegistry;
use crate::topic::{AnyTopic, Topic};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Errors raised by the bus itself.
///
/// Unit errors are never wrapped in this type; these only describe
/// failures the bus detects on its own.
#[derive(Debug, Error)]
pub enum BusError {
    /// A typed unit was handed a value that carries its topic name but is a
    /// different Rust type.
    #[error("Topic {name} expected {expected}, found {found}")]
    TopicTypeMismatch {
        /// Routing name shared by both types.
        name: &'static str,
        /// Type the unit was registered for.
        expected: &'static str,
        /// Type that was actually dispatched.
        found: &'static str,
    },

    /// Variant re-dispatch nested deeper than [`BusConfig::max_variant_depth`].
    #[error("Variant depth {depth} exceeded while dispatching {name}")]
    VariantDepthExceeded {
        /// Name of the variant that would have gone one level deeper.
        name: &'static str,
        /// Depth reached.
        depth: usize,
    },
}

/// How transformer output is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantDelivery {
    /// Variants go straight to the subscribers of their own name, skipping
    /// middleware and transformers.
    #[default]
    SubscribersOnly,
    /// Variants run through the full pipeline of their own name, bounded by
    /// [`BusConfig::max_variant_depth`].
    Redispatch,
}

/// Bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// How transformer variants are delivered.
    pub variant_delivery: VariantDelivery,
    /// Maximum nesting of re-dispatched variants.
    pub max_variant_depth: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            variant_delivery: VariantDelivery::SubscribersOnly,
            max_variant_depth: 8,
        }
    }
}

/// The topic bus.
///
/// Construct one per process and share it by [`Arc`] with every component
/// that publishes or subscribes.
pub struct TopicBus {
    /// Middleware chains by topic name.
    middlewares: DashMap<String, Vec<Arc<dyn RawMiddleware>>>,
    /// Transformer chains by topic name.
    transformers: DashMap<String, Vec<Arc<dyn RawTransformer>>>,
    /// Subscriber lists by topic name.
    subscribers: DashMap<String, Vec<Arc<dyn RawSubscriber>>>,
    /// Set by the first dispatch.
    dispatching: AtomicBool,
    dispatched: AtomicU64,
    failed: AtomicU64,
    late_registrations: AtomicU64,
    config: BusConfig,
}

impl TopicBus {
    /// Create an empty bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create an empty bus with custom configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        info!("Creating topic bus with config: {:?}", config);
        Self {
            middlewares: DashMap::new(),
            transformers: DashMap::new(),
            subscribers: DashMap::new(),
            dispatching: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            late_registrations: AtomicU64::new(0),
            config,
        }
    }

    /// Get the bus configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Subscribers
    // -----------------------------------------------------------------------

    /// Append a subscriber for topic `T`.
    ///
    /// Duplicates are allowed; each registration fires.
    pub fn subscribe<T, S>(&self, subscriber: S)
    where
        T: Topic,
        S: Subscriber<T> + 'static,
    {
        self.subscribe_raw(T::NAME, TypedSubscriber::<T, S>::new(subscriber));
    }

    /// Append a synchronous closure subscriber for topic `T`.
    pub fn subscribe_fn<T, F>(&self, f: F)
    where
        T: Topic,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.subscribe::<T, _>(SubscriberFn(f));
    }

    /// Append a type-erased subscriber for the topic named `name`.
    pub fn subscribe_raw(&self, name: impl Into<String>, subscriber: impl RawSubscriber + 'static) {
        let name = name.into();
        self.check_phase("subscriber", &name);
        let mut entry = self.subscribers.entry(name.clone()).or_default();
        entry.push(Arc::new(subscriber));
        debug!(topic = %name, subscribers = entry.len(), "Subscribed");
    }

    // -----------------------------------------------------------------------
    // Middleware
    // -----------------------------------------------------------------------

    /// Append middleware for topic `T`.
    pub fn use_middleware<T, M>(&self, middleware: M)
    where
        T: Topic,
        M: Middleware<T> + 'static,
    {
        self.use_raw_middleware(T::NAME, TypedMiddleware::<T, M>::new(middleware));
    }

    /// Append a synchronous closure middleware for topic `T`.
    pub fn use_middleware_fn<T, F>(&self, f: F)
    where
        T: Topic,
        F: Fn(&mut T) -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        self.use_middleware::<T, _>(MiddlewareFn(f));
    }

    /// Append type-erased middleware for the topic named `name`.
    pub fn use_raw_middleware(
        &self,
        name: impl Into<String>,
        middleware: impl RawMiddleware + 'static,
    ) {
        let name = name.into();
        self.check_phase("middleware", &name);
        let mut entry = self.middlewares.entry(name.clone()).or_default();
        entry.push(Arc::new(middleware));
        debug!(topic = %name, middlewares = entry.len(), "Middleware registered");
    }

    // -----------------------------------------------------------------------
    // Transformers
    // -----------------------------------------------------------------------

    /// Append a transformer for topic `T`.
    pub fn use_transformer<T, F>(&self, transformer: F)
    where
        T: Topic,
        F: Transformer<T> + 'static,
    {
        self.use_raw_transformer(T::NAME, TypedTransformer::<T, F>::new(transformer));
    }

    /// Append a synchronous closure transformer from `T` to `U`.
    pub fn use_transformer_fn<T, U, F>(&self, f: F)
    where
        T: Topic,
        U: Topic,
        F: Fn(&T) -> Result<U, BoxError> + Send + Sync + 'static,
    {
        self.use_transformer::<T, _>(TransformerFn::<F, U>::new(f));
    }

    /// Append a type-erased transformer for the topic named `name`.
    pub fn use_raw_transformer(
        &self,
        name: impl Into<String>,
        transformer: impl RawTransformer + 'static,
    ) {
        let name = name.into();
        self.check_phase("transformer", &name);
        let mut entry = self.transformers.entry(name.clone()).or_default();
        entry.push(Arc::new(transformer));
        debug!(topic = %name, transformers = entry.len(), "Transformer registered");
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Dispatch a concrete topic value.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a middleware, transformer or
    /// subscriber, unchanged.
    pub async fn publish<T: Topic>(&self, topic: T) -> Result<(), BoxError> {
        self.dispatch(AnyTopic::new(topic)).await
    }

    /// Run `topic` through the middleware, transform and subscriber stages.
    ///
    /// Runs on the caller's task and returns once every unit has completed.
    /// A topic name with no registrations is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a middleware, transformer or
    /// subscriber, unchanged. Units that ran before the failure keep their
    /// effects.
    pub async fn dispatch(&self, topic: AnyTopic) -> Result<(), BoxError> {
        self.dispatching.store(true, Ordering::Relaxed);
        let name = topic.name();
        let start = Instant::now();

        let result = self.run_pipeline(topic, 0).await;

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::DISPATCH_TOTAL, "topic" => name).increment(1);
        metrics::histogram!(names::DISPATCH_SECONDS).record(start.elapsed().as_secs_f64());
        if result.is_err() {
            self.failed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(names::DISPATCH_FAILURES_TOTAL, "topic" => name).increment(1);
        }

        result
    }

    fn run_pipeline(&self, mut topic: AnyTopic, depth: usize) -> BoxFuture<'_, Result<(), BoxError>> {
        Box::pin(async move {
            let name = topic.name();

            for middleware in snapshot(&self.middlewares, name) {
                match middleware.process(topic.as_dyn_mut()).await? {
                    Verdict::Continue => {}
                    Verdict::Drop => {
                        trace!(topic = %name, "Dropped by middleware");
                        return Ok(());
                    }
                    Verdict::Replace(replacement) if replacement.type_id() == topic.type_id() => {
                        topic = replacement;
                    }
                    Verdict::Replace(replacement) => {
                        debug!(
                            topic = %name,
                            replacement = %replacement.type_name(),
                            "Ignoring middleware replacement of a different type"
                        );
                    }
                }
            }

            let transformers = snapshot(&self.transformers, name);
            if !transformers.is_empty() {
                let mut variants = Vec::with_capacity(transformers.len());
                for transformer in &transformers {
                    variants.push(transformer.transform(topic.as_dyn()).await?);
                }

                for variant in variants {
                    trace!(topic = %name, variant = %variant.name(), "Delivering variant");
                    match self.config.variant_delivery {
                        VariantDelivery::SubscribersOnly => self.deliver(&variant).await?,
                        VariantDelivery::Redispatch => {
                            if depth >= self.config.max_variant_depth {
                                return Err(Box::new(BusError::VariantDepthExceeded {
                                    name: variant.name(),
                                    depth,
                                }) as BoxError);
                            }
                            self.run_pipeline(variant, depth + 1).await?;
                        }
                    }
                }
            }

            self.deliver(&topic).await
        })
    }

    async fn deliver(&self, topic: &AnyTopic) -> Result<(), BoxError> {
        let subscribers = snapshot(&self.subscribers, topic.name());
        trace!(topic = %topic.name(), subscribers = subscribers.len(), "Delivering");
        for subscriber in subscribers {
            subscriber.handle(topic.as_dyn()).await?;
        }
        Ok(())
    }

    fn check_phase(&self, kind: &str, name: &str) {
        if self.dispatching.load(Ordering::Relaxed) {
            self.late_registrations.fetch_add(1, Ordering::Relaxed);
            warn!(topic = %name, kind, "Registration after dispatch began");
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Check if any subscriber is bound to `name`.
    #[must_use]
    pub fn has_subscribers(&self, name: &str) -> bool {
        self.subscribers.get(name).is_some_and(|s| !s.is_empty())
    }

    /// Names with at least one registered unit, sorted.
    #[must_use]
    pub fn topic_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        names.extend(self.middlewares.iter().map(|e| e.key().clone()));
        names.extend(self.transformers.iter().map(|e| e.key().clone()));
        names.extend(self.subscribers.iter().map(|e| e.key().clone()));
        names.into_iter().collect()
    }

    /// Get bus statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            topics: self.topic_names().len(),
            middlewares: self.middlewares.iter().map(|e| e.len()).sum(),
            transformers: self.transformers.iter().map(|e| e.len()).sum(),
            subscribers: self.subscribers.iter().map(|e| e.len()).sum(),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            late_registrations: self.late_registrations.load(Ordering::Relaxed),
        }
    }

    /// Describe every known and bound topic against `registry`.
    ///
    /// Names bound on the bus but missing from the registry are listed in
    /// [`BusReport::unregistered`] and logged.
    #[must_use]
    pub fn report(&self, registry: &TopicRegistry) -> BusReport {
        let mut names: BTreeSet<String> = self.topic_names().into_iter().collect();
        names.extend(registry.iter().map(|info| info.name.to_string()));

        let mut unregistered = Vec::new();
        let topics = names
            .into_iter()
            .map(|name| {
                let type_name = registry.get(&name).map(|info| info.type_name);
                if type_name.is_none() {
                    warn!(topic = %name, "Topic bound on the bus but not registered");
                    unregistered.push(name.clone());
                }
                TopicReport {
                    middlewares: count(&self.middlewares, &name),
                    transformers: count(&self.transformers, &name),
                    subscribers: count(&self.subscribers, &name),
                    type_name,
                    name,
                }
            })
            .collect();

        BusReport {
            topics,
            unregistered,
        }
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Clone a chain out of the map so no shard lock is held across awaits.
fn snapshot<U: ?Sized>(map: &DashMap<String, Vec<Arc<U>>>, name: &str) -> Vec<Arc<U>> {
    map.get(name).map(|e| e.value().clone()).unwrap_or_default()
}

fn count<U: ?Sized>(map: &DashMap<String, Vec<Arc<U>>>, name: &str) -> usize {
    map.get(name).map(|e| e.len()).unwrap_or(0)
}

/// Bus statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BusStats {
    /// Number of names with at least one registered unit.
    pub topics: usize,
    /// Total middleware registrations.
    pub middlewares: usize,
    /// Total transformer registrations.
    pub transformers: usize,
    /// Total subscriber registrations.
    pub subscribers: usize,
    /// Dispatch calls completed.
    pub dispatched: u64,
    /// Dispatch calls that returned an error.
    pub failed: u64,
    /// Registrations made after the first dispatch.
    pub late_registrations: u64,
}

/// Per-topic registration counts.
#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    /// Routing name.
    pub name: String,
    /// Rust type registered under the name, if any.
    pub type_name: Option<&'static str>,
    /// Middleware registrations.
    pub middlewares: usize,
    /// Transformer registrations.
    pub transformers: usize,
    /// Subscriber registrations.
    pub subscribers: usize,
}

/// Diagnostic snapshot of the bus against a topic registry.
#[derive(Debug, Clone, Serialize)]
pub struct BusReport {
    /// Every known or bound topic, sorted by name.
    pub topics: Vec<TopicReport>,
    /// Names bound on the bus but missing from the registry.
    pub unregistered: Vec<String>,
}
