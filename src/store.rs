//! Secret storage contract and built-in stores for bearer credentials.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Key holding the current access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key holding the current refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Boxed future returned by [`SecretStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Opaque key→string store for credentials.
///
/// Implementations must be safe for concurrent use; the transport reads the access
/// token on every attempt while a refresh may be writing it.
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the value stored under `key`.
	fn save<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

	/// Fetches the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Removes `key`; removing an absent key succeeds.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Removes every key.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`SecretStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
