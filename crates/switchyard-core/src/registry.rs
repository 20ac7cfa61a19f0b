//! Explicit topic registry.
//!
//! Components list the topic types they use during startup. The bus does
//! not route by this table; it only feeds diagnostics.

use crate::topic::Topic;
use std::any::TypeId;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two different types claim the same topic name.
    #[error("Topic name {name} already registered by {existing}, rejected {rejected}")]
    NameCollision {
        /// The contested name.
        name: &'static str,
        /// Type already holding the name.
        existing: &'static str,
        /// Type that tried to claim it.
        rejected: &'static str,
    },
}

/// A registered topic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    /// Routing name.
    pub name: &'static str,
    /// Rust type name.
    pub type_name: &'static str,
    type_id: TypeId,
}

/// Topic types known to this process, keyed by routing name.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: BTreeMap<&'static str, TopicInfo>,
}

impl TopicRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record topic type `T`.
    ///
    /// Registering the same type twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a different type already uses `T::NAME`.
    pub fn register<T: Topic>(&mut self) -> Result<(), RegistryError> {
        let info = TopicInfo {
            name: T::NAME,
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        };

        match self.topics.get(T::NAME) {
            Some(existing) if existing.type_id == info.type_id => Ok(()),
            Some(existing) => Err(RegistryError::NameCollision {
                name: T::NAME,
                existing: existing.type_name,
                rejected: info.type_name,
            }),
            None => {
                debug!(topic = %info.name, type_name = %info.type_name, "Registered topic");
                self.topics.insert(T::NAME, info);
                Ok(())
            }
        }
    }

    /// Check if a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }

    /// Look up a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TopicInfo> {
        self.topics.get(name)
    }

    /// Iterate registered topics in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TopicInfo> {
        self.topics.values()
    }

    /// Number of registered topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Check if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Log every registered topic.
    pub fn log_discovered(&self) {
        for info in self.iter() {
            info!("Discovered topic: {} ({})", info.name, info.type_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct DriveInput;

    impl Topic for DriveInput {
        const NAME: &'static str = "DriveInput";
    }

    #[derive(Debug)]
    struct OtherDriveInput;

    impl Topic for OtherDriveInput {
        const NAME: &'static str = "DriveInput";
    }

    #[derive(Debug)]
    struct PositionUpdate;

    impl Topic for PositionUpdate {
        const NAME: &'static str = "PositionUpdate";
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TopicRegistry::new();
        assert!(registry.is_empty());

        registry.register::<PositionUpdate>().unwrap();
        registry.register::<DriveInput>().unwrap();
        registry.register::<DriveInput>().unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("DriveInput"));
        assert!(!registry.contains("EscCommand"));

        let names: Vec<_> = registry.iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["DriveInput", "PositionUpdate"]);
        assert!(registry.get("DriveInput").unwrap().type_name.ends_with("DriveInput"));
    }

    #[test]
    fn test_name_collision() {
        let mut registry = TopicRegistry::new();
        registry.register::<DriveInput>().unwrap();

        assert!(matches!(
            registry.register::<OtherDriveInput>(),
            Err(RegistryError::NameCollision { name: "DriveInput", .. })
        ));
        assert_eq!(registry.len(), 1);
    }
}
