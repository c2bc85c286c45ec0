//! Key-value storage behind the view counters.
//!
//! The service owns no persistent state; everything lives in a store that
//! implements [KeyValueStore]. Key layout:
//!
//! ```text
//! views:{slug}                        -> integer counter
//! view_cooldown:{slug}:{visitor}      -> epoch millis, expires after the cooldown window
//! analytics:{slug}:{epoch_millis}     -> JSON snapshot, expires after a day
//! ```

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

pub use error::*;
pub use memory::MemoryStore;
pub use remote::RedisStore;

mod error;
pub mod keys;
mod memory;
mod remote;

/// Operations the view tracker needs from a store.
///
/// Every method touches a single round-trip to the store. `increment` and
/// `set_if_absent` must be atomic on their key.
#[async_trait]
pub trait KeyValueStore: Debug + Send + Sync {
    /// Atomically adds one to the integer at `key`, treating an absent key as 0.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Reads the integer at `key`.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Reads the integers at `keys` in a single request, in the same order.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Sets `key` only if it does not exist yet. Returns whether the value was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;
}
