//! Message catalog: which wire tags map to which topics.
//!
//! Inbound tags decode a frame body into a topic that the gateway then
//! dispatches. Outbound bindings subscribe the gateway to a topic type and
//! send every delivered value as a frame carrying the bound tag. The
//! outbox is bounded; frames that do not fit are dropped and counted.

use crate::gateway::GatewayStats;
use crate::traits::GatewayError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use switchyard_core::{AnyTopic, BoxError, Subscriber, Topic, TopicBus};
use switchyard_protocol::{Frame, ProtocolError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

type Decoder = Box<dyn Fn(Frame) -> Result<AnyTopic, ProtocolError> + Send + Sync>;
type Binder = Box<dyn Fn(&TopicBus, mpsc::Sender<Frame>, Arc<GatewayStats>) + Send + Sync>;

struct Outbound {
    topic: &'static str,
    bind: Binder,
}

/// Tag <-> topic table for the gateway.
#[derive(Default)]
pub struct MessageCatalog {
    inbound: HashMap<String, Decoder>,
    outbound: HashMap<String, Outbound>,
}

impl MessageCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode frames tagged `tag` straight into topic `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is already bound for inbound frames.
    pub fn inbound<T>(&mut self, tag: impl Into<String>) -> Result<&mut Self, GatewayError>
    where
        T: Topic + DeserializeOwned,
    {
        self.inbound_with::<T, T, _>(tag, |message| message)
    }

    /// Decode frames tagged `tag` into wire message `M`, then convert it
    /// into topic `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is already bound for inbound frames.
    pub fn inbound_with<M, T, F>(
        &mut self,
        tag: impl Into<String>,
        convert: F,
    ) -> Result<&mut Self, GatewayError>
    where
        M: DeserializeOwned + 'static,
        T: Topic,
        F: Fn(M) -> T + Send + Sync + 'static,
    {
        let tag = tag.into();
        if self.inbound.contains_key(&tag) {
            return Err(GatewayError::DuplicateTag(tag));
        }

        debug!(tag = %tag, topic = %T::NAME, "Registered inbound message");
        self.inbound.insert(
            tag,
            Box::new(move |frame: Frame| {
                let message = frame.into_value::<M>()?;
                Ok(AnyTopic::new(convert(message)))
            }),
        );
        Ok(self)
    }

    /// Send every `T` delivered on the bus as a frame tagged `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is already bound for outbound frames.
    pub fn outbound<T>(&mut self, tag: impl Into<String>) -> Result<&mut Self, GatewayError>
    where
        T: Topic + Serialize,
    {
        let tag = tag.into();
        if self.outbound.contains_key(&tag) {
            return Err(GatewayError::DuplicateTag(tag));
        }

        debug!(tag = %tag, topic = %T::NAME, "Registered outbound message");
        let bound_tag = tag.clone();
        self.outbound.insert(
            tag,
            Outbound {
                topic: T::NAME,
                bind: Box::new(
                    move |bus: &TopicBus,
                          queue: mpsc::Sender<Frame>,
                          stats: Arc<GatewayStats>| {
                        bus.subscribe::<T, _>(OutboundSubscriber::<T> {
                            tag: bound_tag.clone(),
                            queue,
                            stats,
                            _topic: PhantomData,
                        });
                    },
                ),
            },
        );
        Ok(self)
    }

    /// Decode an inbound frame.
    ///
    /// Returns `Ok(None)` for tags with no inbound binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the bound type.
    pub fn decode(&self, frame: Frame) -> Result<Option<AnyTopic>, ProtocolError> {
        match self.inbound.get(&frame.kind) {
            Some(decoder) => decoder(frame).map(Some),
            None => Ok(None),
        }
    }

    /// Inbound tags, sorted.
    #[must_use]
    pub fn inbound_tags(&self) -> Vec<&str> {
        let mut tags: Vec<_> = self.inbound.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Outbound `(tag, topic)` pairs, sorted by tag.
    #[must_use]
    pub fn outbound_tags(&self) -> Vec<(&str, &'static str)> {
        let mut tags: Vec<_> = self
            .outbound
            .iter()
            .map(|(tag, outbound)| (tag.as_str(), outbound.topic))
            .collect();
        tags.sort_unstable();
        tags
    }

    /// Subscribe every outbound binding on `bus`, feeding `queue`.
    pub(crate) fn bind_outbound(
        &self,
        bus: &TopicBus,
        queue: &mpsc::Sender<Frame>,
        stats: &Arc<GatewayStats>,
    ) {
        for outbound in self.outbound.values() {
            (outbound.bind)(bus, queue.clone(), stats.clone());
        }
    }
}

struct OutboundSubscriber<T> {
    tag: String,
    queue: mpsc::Sender<Frame>,
    stats: Arc<GatewayStats>,
    _topic: PhantomData<fn(T)>,
}

#[async_trait]
impl<T> Subscriber<T> for OutboundSubscriber<T>
where
    T: Topic + Serialize,
{
    async fn handle(&self, topic: &T) -> Result<(), BoxError> {
        let frame = Frame::from_value(self.tag.as_str(), topic)?;
        match self.queue.try_send(frame) {
            Ok(()) => self.stats.record_queued(),
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped(1);
                debug!(tag = %self.tag, "Gateway outbox full, frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(tag = %self.tag, "Gateway outbox closed, frame discarded");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct DriveInput {
        throttle: i32,
        steering: i32,
        brake: bool,
    }

    impl Topic for DriveInput {
        const NAME: &'static str = "DriveInput";
    }

    #[derive(Debug, Deserialize)]
    struct KeyboardMessage {
        name: String,
        #[serde(rename = "isPressed")]
        is_pressed: bool,
    }

    #[derive(Debug, PartialEq)]
    struct KeyboardInput {
        name: String,
        pressed: bool,
    }

    impl Topic for KeyboardInput {
        const NAME: &'static str = "KeyboardInput";
    }

    fn frame(value: serde_json::Value) -> Frame {
        Frame::from_text(&value.to_string()).unwrap()
    }

    #[test]
    fn test_inbound_decode() {
        let mut catalog = MessageCatalog::new();
        catalog.inbound::<DriveInput>("drive").unwrap();

        let topic = catalog
            .decode(frame(json!({"type": "drive", "throttle": 5, "steering": -2, "brake": true})))
            .unwrap()
            .unwrap();
        assert_eq!(
            topic.downcast::<DriveInput>().unwrap(),
            DriveInput {
                throttle: 5,
                steering: -2,
                brake: true
            }
        );
    }

    #[test]
    fn test_inbound_with_conversion() {
        let mut catalog = MessageCatalog::new();
        catalog
            .inbound_with::<KeyboardMessage, _, _>("keyboardinput", |m| KeyboardInput {
                name: m.name,
                pressed: m.is_pressed,
            })
            .unwrap();

        let topic = catalog
            .decode(frame(json!({"type": "keyboardinput", "name": "horn", "isPressed": true})))
            .unwrap()
            .unwrap();
        assert_eq!(topic.name(), "KeyboardInput");
        assert!(topic.downcast_ref::<KeyboardInput>().unwrap().pressed);
    }

    #[test]
    fn test_unknown_tag_and_bad_body() {
        let mut catalog = MessageCatalog::new();
        catalog.inbound::<DriveInput>("drive").unwrap();

        assert!(catalog
            .decode(frame(json!({"type": "locomotion"})))
            .unwrap()
            .is_none());
        assert!(catalog
            .decode(frame(json!({"type": "drive", "throttle": "fast"})))
            .is_err());
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let mut catalog = MessageCatalog::new();
        catalog.inbound::<DriveInput>("drive").unwrap();
        catalog.outbound::<DriveInput>("drive").unwrap();

        assert!(matches!(
            catalog.inbound::<DriveInput>("drive"),
            Err(GatewayError::DuplicateTag(_))
        ));
        assert!(matches!(
            catalog.outbound::<DriveInput>("drive"),
            Err(GatewayError::DuplicateTag(_))
        ));
        assert_eq!(catalog.inbound_tags(), vec!["drive"]);
        assert_eq!(catalog.outbound_tags(), vec![("drive", "DriveInput")]);
    }

    #[tokio::test]
    async fn test_outbound_binding_queues_frames() {
        let mut catalog = MessageCatalog::new();
        catalog.outbound::<DriveInput>("drive").unwrap();

        let bus = TopicBus::new();
        let (tx, mut rx) = mpsc::channel(2);
        let stats = Arc::new(GatewayStats::default());
        catalog.bind_outbound(&bus, &tx, &stats);

        for steering in 1..=5 {
            bus.publish(DriveInput {
                throttle: 1,
                steering,
                brake: false,
            })
            .await
            .unwrap();
        }

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.kind, "drive");
        assert_eq!(sent.body["steering"], 1);
        assert_eq!(rx.try_recv().unwrap().body["steering"], 2);
        assert!(rx.try_recv().is_err());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_queued, 2);
        assert_eq!(snapshot.frames_dropped, 3);
    }
}
