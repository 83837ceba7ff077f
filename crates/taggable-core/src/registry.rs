//! Explicit registry of taggable entity types.
//!
//! Associations store a type discriminator next to the entity id. The registry
//! is the single place that maps those discriminators back to Rust types, so a
//! typo or a clash between two types is caught at startup instead of silently
//! splitting one entity type's tags across two discriminators.

use std::any::type_name;
use std::collections::BTreeMap;

use crate::defaults;
use crate::traits::Taggable;
use crate::{Error, Result};

/// A registered taggable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredType {
    /// Value stored in `taggable_associations.taggable_type`.
    pub discriminator: &'static str,
    /// Fully qualified Rust type name, for diagnostics.
    pub rust_type: &'static str,
}

/// Discriminator → type mapping.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<&'static str, RegisteredType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Registering the same type twice is a no-op; registering a
    /// different type under an existing discriminator is an error.
    pub fn register<T: Taggable + 'static>(&mut self) -> Result<&mut Self> {
        let discriminator = T::taggable_type();
        validate_discriminator(discriminator)?;

        let entry = RegisteredType {
            discriminator,
            rust_type: type_name::<T>(),
        };

        match self.types.get(discriminator) {
            Some(existing) if existing.rust_type != entry.rust_type => {
                Err(Error::Config(format!(
                    "Taggable type '{}' is already registered for {}, cannot register {}",
                    discriminator, existing.rust_type, entry.rust_type
                )))
            }
            Some(_) => Ok(self),
            None => {
                self.types.insert(discriminator, entry);
                Ok(self)
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: Taggable + 'static>(mut self) -> Result<Self> {
        self.register::<T>()?;
        Ok(self)
    }

    /// Resolve a stored discriminator.
    pub fn resolve(&self, discriminator: &str) -> Option<&RegisteredType> {
        self.types.get(discriminator)
    }

    pub fn is_registered(&self, discriminator: &str) -> bool {
        self.types.contains_key(discriminator)
    }

    /// Fail with `InvalidInput` unless `discriminator` is registered.
    pub fn ensure_registered(&self, discriminator: &str) -> Result<&RegisteredType> {
        self.resolve(discriminator).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Taggable type '{}' is not registered",
                discriminator
            ))
        })
    }

    /// Registered discriminators in sorted order.
    pub fn discriminators(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate_discriminator(discriminator: &str) -> Result<()> {
    if discriminator.trim().is_empty() {
        return Err(Error::Config(
            "Taggable type discriminator cannot be blank".to_string(),
        ));
    }
    if discriminator.trim() != discriminator {
        return Err(Error::Config(format!(
            "Taggable type discriminator '{}' has surrounding whitespace",
            discriminator
        )));
    }
    if discriminator.chars().count() > defaults::MAX_DISCRIMINATOR_LENGTH {
        return Err(Error::Config(format!(
            "Taggable type discriminator exceeds {} characters",
            defaults::MAX_DISCRIMINATOR_LENGTH
        )));
    }
    Ok(())
}
