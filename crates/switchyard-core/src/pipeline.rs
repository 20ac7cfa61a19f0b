//! Pipeline units: middleware, transformers and subscribers.
//!
//! Each unit comes in two forms. The typed traits ([`Middleware`],
//! [`Transformer`], [`Subscriber`]) are what drivers and plugins implement;
//! the bus adapts them into the raw, name-keyed traits ([`RawMiddleware`],
//! [`RawTransformer`], [`RawSubscriber`]) it stores internally. Raw units can
//! also be registered directly when the topic type is only known by name.

use crate::bus::BusError;
use crate::topic::{AnyTopic, DynTopic, Topic};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Error type returned by pipeline units.
///
/// The bus passes these through to the caller of `dispatch` untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a typed middleware step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the (possibly mutated) topic and move on.
    Continue,
    /// Discard the topic. Nothing further runs for this dispatch.
    Drop,
}

/// Outcome of a raw middleware step.
#[derive(Debug)]
pub enum Verdict {
    /// Keep the (possibly mutated) topic and move on.
    Continue,
    /// Discard the topic. Nothing further runs for this dispatch.
    Drop,
    /// Replace the topic. Ignored unless the replacement has the same
    /// runtime type as the current value.
    Replace(AnyTopic),
}

impl From<Flow> for Verdict {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Continue => Verdict::Continue,
            Flow::Drop => Verdict::Drop,
        }
    }
}

/// Ordered unit that may mutate or veto a topic before it reaches
/// transformers and subscribers.
#[async_trait]
pub trait Middleware<T: Topic>: Send + Sync {
    /// Inspect or mutate `topic` in place.
    async fn process(&self, topic: &mut T) -> Result<Flow, BoxError>;
}

/// Unit that derives another topic from `T`. Both are delivered.
#[async_trait]
pub trait Transformer<T: Topic>: Send + Sync {
    /// Topic type produced by this transformer.
    type Output: Topic;

    /// Derive the variant.
    async fn transform(&self, topic: &T) -> Result<Self::Output, BoxError>;
}

/// Callback bound to one topic type.
#[async_trait]
pub trait Subscriber<T: Topic>: Send + Sync {
    /// Handle one delivered topic.
    async fn handle(&self, topic: &T) -> Result<(), BoxError>;
}

/// Type-erased middleware.
#[async_trait]
pub trait RawMiddleware: Send + Sync {
    /// Inspect, mutate, replace or veto `topic`.
    async fn process(&self, topic: &mut dyn DynTopic) -> Result<Verdict, BoxError>;
}

/// Type-erased transformer.
#[async_trait]
pub trait RawTransformer: Send + Sync {
    /// Derive a variant of `topic`.
    async fn transform(&self, topic: &dyn DynTopic) -> Result<AnyTopic, BoxError>;
}

/// Type-erased subscriber.
#[async_trait]
pub trait RawSubscriber: Send + Sync {
    /// Handle one delivered topic.
    async fn handle(&self, topic: &dyn DynTopic) -> Result<(), BoxError>;
}

fn mismatch<T: Topic>(found: &dyn DynTopic) -> BoxError {
    Box::new(BusError::TopicTypeMismatch {
        name: T::NAME,
        expected: std::any::type_name::<T>(),
        found: found.type_name(),
    })
}

// ---------------------------------------------------------------------------
// Typed -> raw adapters
// ---------------------------------------------------------------------------

pub(crate) struct TypedMiddleware<T, M> {
    inner: M,
    _topic: PhantomData<fn(T)>,
}

impl<T, M> TypedMiddleware<T, M> {
    pub(crate) fn new(inner: M) -> Self {
        Self {
            inner,
            _topic: PhantomData,
        }
    }
}

#[async_trait]
impl<T, M> RawMiddleware for TypedMiddleware<T, M>
where
    T: Topic,
    M: Middleware<T>,
{
    async fn process(&self, topic: &mut dyn DynTopic) -> Result<Verdict, BoxError> {
        match topic.downcast_mut::<T>() {
            Some(typed) => self.inner.process(typed).await.map(Verdict::from),
            None => Err(mismatch::<T>(topic)),
        }
    }
}

pub(crate) struct TypedTransformer<T, F> {
    inner: F,
    _topic: PhantomData<fn(T)>,
}

impl<T, F> TypedTransformer<T, F> {
    pub(crate) fn new(inner: F) -> Self {
        Self {
            inner,
            _topic: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> RawTransformer for TypedTransformer<T, F>
where
    T: Topic,
    F: Transformer<T>,
{
    async fn transform(&self, topic: &dyn DynTopic) -> Result<AnyTopic, BoxError> {
        let typed = topic.downcast_ref::<T>().ok_or_else(|| mismatch::<T>(topic))?;
        self.inner.transform(typed).await.map(AnyTopic::new)
    }
}

pub(crate) struct TypedSubscriber<T, S> {
    inner: S,
    _topic: PhantomData<fn(T)>,
}

impl<T, S> TypedSubscriber<T, S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            _topic: PhantomData,
        }
    }
}

#[async_trait]
impl<T, S> RawSubscriber for TypedSubscriber<T, S>
where
    T: Topic,
    S: Subscriber<T>,
{
    async fn handle(&self, topic: &dyn DynTopic) -> Result<(), BoxError> {
        let typed = topic.downcast_ref::<T>().ok_or_else(|| mismatch::<T>(topic))?;
        self.inner.handle(typed).await
    }
}

// ---------------------------------------------------------------------------
// Closure units
// ---------------------------------------------------------------------------

/// Middleware built from a synchronous closure.
pub struct MiddlewareFn<F>(pub F);

#[async_trait]
impl<T, F> Middleware<T> for MiddlewareFn<F>
where
    T: Topic,
    F: Fn(&mut T) -> Result<Flow, BoxError> + Send + Sync,
{
    async fn process(&self, topic: &mut T) -> Result<Flow, BoxError> {
        (self.0)(topic)
    }
}

/// Transformer built from a synchronous closure.
pub struct TransformerFn<F, U> {
    f: F,
    _output: PhantomData<fn() -> U>,
}

impl<F, U> TransformerFn<F, U> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<T, U, F> Transformer<T> for TransformerFn<F, U>
where
    T: Topic,
    U: Topic,
    F: Fn(&T) -> Result<U, BoxError> + Send + Sync,
{
    type Output = U;

    async fn transform(&self, topic: &T) -> Result<U, BoxError> {
        (self.f)(topic)
    }
}

/// Subscriber built from a synchronous closure.
pub struct SubscriberFn<F>(pub F);

#[async_trait]
impl<T, F> Subscriber<T> for SubscriberFn<F>
where
    T: Topic,
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync,
{
    async fn handle(&self, topic: &T) -> Result<(), BoxError> {
        (self.0)(topic)
    }
}
