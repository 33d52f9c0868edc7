//! Thread-safe in-memory [`SecretStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{SecretStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Storage backend that keeps secrets in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns a point-in-time copy of every stored pair.
	pub fn snapshot(&self) -> HashMap<String, String> {
		self.0.read().clone()
	}

	fn save_now(map: &StoreMap, key: &str, value: &str) -> Result<(), StoreError> {
		map.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn get_now(map: &StoreMap, key: &str) -> Option<String> {
		map.read().get(key).cloned()
	}

	fn delete_now(map: &StoreMap, key: &str) {
		map.write().remove(key);
	}
}
impl SecretStore for MemoryStore {
	fn save<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move { Self::save_now(&self.0, key, value) })
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.0, key)) })
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			Self::delete_now(&self.0, key);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().clear();

			Ok(())
		})
	}
}
