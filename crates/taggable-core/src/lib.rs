//! # taggable-core
//!
//! Core types, traits, and normalization rules for taggable.
//!
//! This crate holds everything that does not touch the store: the [`Tag`]
//! model, [`TagName`] validation, the pluggable [`Normalizer`], injected
//! [`TaggingConfig`], the [`Taggable`] host contract with its [`TypeRegistry`],
//! and the repository traits implemented by `taggable-db`.

pub mod config;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod normalizer;
pub mod registry;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::TaggingConfig;
pub use error::{Error, Result};
pub use filter::TagFilter;
pub use normalizer::{NormalizeFn, Normalizer};
pub use registry::{RegisteredType, TypeRegistry};
pub use tags::*;
pub use traits::*;
