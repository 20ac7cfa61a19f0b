//! # switchyard-core
//!
//! In-process topic bus for Switchyard.
//!
//! Core services, plugins and vehicle drivers exchange typed messages
//! through the bus without holding references to one another:
//!
//! - **Topic** - A typed message value, routed by its name
//! - **Middleware** - Ordered units that may mutate or drop a topic
//! - **Transformer** - Units that derive another topic; both get delivered
//! - **Subscriber** - Callbacks bound to one topic type
//! - **Registry** - Explicit list of known topic types, for diagnostics
//!
//! ## Dispatch pipeline
//!
//! ```text
//!             ┌────────────┐     ┌──────────────┐     ┌──────────────┐
//! dispatch ──▶│ Middleware │────▶│ Transformers │────▶│ Subscribers  │
//!             └────────────┘     └──────────────┘     └──────────────┘
//!                  │ drop               │ variants
//!                  ▼                    ▼
//!                 end          subscribers of each
//!                               variant's own name
//! ```
//!
//! ## Example
//!
//! ```rust
//! use switchyard_core::{Flow, Topic, TopicBus};
//!
//! #[derive(Debug, Clone)]
//! struct DriveInput { throttle: i32 }
//!
//! impl Topic for DriveInput {
//!     const NAME: &'static str = "DriveInput";
//! }
//!
//! # async fn run() -> Result<(), switchyard_core::BoxError> {
//! let bus = TopicBus::new();
//! bus.use_middleware_fn::<DriveInput, _>(|d| {
//!     d.throttle = d.throttle.clamp(-100, 100);
//!     Ok(Flow::Continue)
//! });
//! bus.subscribe_fn::<DriveInput, _>(|d| {
//!     println!("throttle {}", d.throttle);
//!     Ok(())
//! });
//! bus.publish(DriveInput { throttle: 250 }).await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod topic;

pub use bus::{BusConfig, BusError, BusReport, BusStats, TopicBus, TopicReport, VariantDelivery};
pub use pipeline::{
    BoxError, Flow, Middleware, MiddlewareFn, RawMiddleware, RawSubscriber, RawTransformer,
    Subscriber, SubscriberFn, Transformer, TransformerFn, Verdict,
};
pub use registry::{RegistryError, TopicInfo, TopicRegistry};
pub use topic::{AnyTopic, DynTopic, Topic};
