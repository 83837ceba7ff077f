//! Centralized default constants for taggable.
//!
//! Every crate in the workspace reads its defaults from here instead of
//! repeating literals.

// =============================================================================
// TAG INPUT
// =============================================================================

/// Characters used to split delimited tag input. The first one also joins
/// tag lists on output.
pub const DELIMITERS: &str = ",";

/// Maximum length of a tag display name, in characters.
pub const MAX_TAG_LENGTH: usize = 255;

/// Maximum length of a taggable type discriminator, in characters.
pub const MAX_DISCRIMINATOR_LENGTH: usize = 255;

// =============================================================================
// TAG CREATION
// =============================================================================

/// Attempts made by find-or-create before giving up.
///
/// A retry only happens when a conflicting row is deleted between the
/// conflicting insert and the re-select.
pub const FIND_OR_CREATE_ATTEMPTS: usize = 3;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of idle connections in the pool.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const POOL_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Environment variable naming the normalizer strategy.
pub const ENV_NORMALIZER: &str = "TAGGABLE_NORMALIZER";

/// Environment variable holding the delimiter characters.
pub const ENV_DELIMITERS: &str = "TAGGABLE_DELIMITERS";

/// Environment variable overriding [`MAX_TAG_LENGTH`].
pub const ENV_MAX_TAG_LENGTH: &str = "TAGGABLE_MAX_TAG_LENGTH";

/// Environment variable overriding [`POOL_MAX_CONNECTIONS`].
pub const ENV_POOL_MAX_CONNECTIONS: &str = "TAGGABLE_DB_MAX_CONNECTIONS";
