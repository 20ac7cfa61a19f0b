//! Topic values for Switchyard.
//!
//! A topic is a plain Rust value routed by its [`Topic::NAME`]. Inside the
//! bus every topic travels as an [`AnyTopic`], an owned type-erased box that
//! can be checked and downcast back to its concrete type.

use std::any::{Any, TypeId};
use std::fmt;

/// A message type that can travel over the topic bus.
///
/// Every concrete topic type carries a routing name. Middleware,
/// transformers and subscribers are all bound to that name.
///
/// ```rust
/// use switchyard_core::Topic;
///
/// #[derive(Debug, Clone)]
/// struct DriveInput {
///     throttle: i32,
///     steering: i32,
/// }
///
/// impl Topic for DriveInput {
///     const NAME: &'static str = "DriveInput";
/// }
/// ```
pub trait Topic: Any + Send + Sync + fmt::Debug {
    /// Routing name of this topic type.
    const NAME: &'static str;
}

/// Object-safe view of a topic value.
///
/// Implemented for every [`Topic`]; raw pipeline units receive topics
/// through this trait.
pub trait DynTopic: Any + Send + Sync + fmt::Debug {
    /// Routing name of the concrete type.
    fn topic_name(&self) -> &'static str;

    /// Borrow as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as [`Any`] for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert the box into a [`Box<dyn Any>`] for owned downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Rust type name of the concrete type, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Topic> DynTopic for T {
    fn topic_name(&self) -> &'static str {
        T::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn DynTopic {
    /// Runtime type of the concrete value.
    #[must_use]
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Check whether the concrete value is a `T`.
    #[must_use]
    pub fn is<T: Topic>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the concrete value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Topic>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the concrete value as `T`.
    pub fn downcast_mut<T: Topic>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// An owned, type-erased topic value.
pub struct AnyTopic {
    inner: Box<dyn DynTopic>,
}

impl AnyTopic {
    /// Erase a concrete topic value.
    #[must_use]
    pub fn new<T: Topic>(topic: T) -> Self {
        Self {
            inner: Box::new(topic),
        }
    }

    /// Routing name of the wrapped value.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.topic_name()
    }

    /// Runtime type of the wrapped value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.inner.concrete_type_id()
    }

    /// Rust type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    /// Check whether the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Topic>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the wrapped value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Topic>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Mutably borrow the wrapped value as `T`.
    pub fn downcast_mut<T: Topic>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }

    /// Take the wrapped value out as `T`, or get `self` back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns the original value if it is not a `T`.
    pub fn downcast<T: Topic>(self) -> Result<T, Self> {
        if self.is::<T>() {
            match self.inner.into_any().downcast::<T>() {
                Ok(topic) => Ok(*topic),
                Err(_) => unreachable!("type checked above"),
            }
        } else {
            Err(self)
        }
    }

    /// Borrow the erased value.
    #[must_use]
    pub fn as_dyn(&self) -> &dyn DynTopic {
        &*self.inner
    }

    /// Mutably borrow the erased value.
    ///
    /// The value behind the reference is unsized, so callers can mutate it
    /// in place but cannot swap in a value of another type.
    pub fn as_dyn_mut(&mut self) -> &mut dyn DynTopic {
        &mut *self.inner
    }
}

impl fmt::Debug for AnyTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl<T: Topic> From<T> for AnyTopic {
    fn from(topic: T) -> Self {
        Self::new(topic)
    }
}
