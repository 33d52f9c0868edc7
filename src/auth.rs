//! Authorization-aware decorator that refreshes bearer tokens on `401`.
//!
//! [`AuthTransport`] wraps any [`Transport`]. Calls pass straight through unless the
//! inner transport reports [`Error::Unauthorized`]; then the shared
//! [`TokenRefresher`] obtains a new access token and the original request is replayed
//! exactly once. A failed refresh surfaces as [`Error::Unauthorized`] so callers can
//! route the user back to sign-in.

pub mod metrics;
pub mod refresh;
pub mod secret;

pub use metrics::RefreshMetrics;
pub use refresh::TokenRefresher;
pub use secret::TokenSecret;

// self
use crate::{
	_prelude::*,
	http::HttpClient,
	request::{Request, Response},
	store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SecretStore, StoreError},
	transport::{HttpTransport, RawTransport, Transport, TransportFuture},
};

/// Transport decorator that recovers from expired access tokens.
pub struct AuthTransport<T>
where
	T: ?Sized + Transport,
{
	inner: Arc<T>,
	store: Arc<dyn SecretStore>,
	refresher: Arc<TokenRefresher>,
}
impl<T> AuthTransport<T>
where
	T: ?Sized + Transport,
{
	/// Wraps `inner`, issuing refresh exchanges at `refresh_path` through `raw`.
	pub fn new(
		inner: impl Into<Arc<T>>,
		raw: Arc<dyn RawTransport>,
		store: Arc<dyn SecretStore>,
		refresh_path: impl Into<String>,
	) -> Self {
		let refresher = TokenRefresher::new(raw, store.clone(), refresh_path);

		Self { inner: inner.into(), store, refresher: Arc::new(refresher) }
	}

	/// Wrapped transport.
	pub fn inner(&self) -> &Arc<T> {
		&self.inner
	}

	/// Shared refresher used by this coordinator.
	pub fn refresher(&self) -> &Arc<TokenRefresher> {
		&self.refresher
	}

	/// Counters describing refresh activity.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresher.metrics()
	}

	/// Stores the credentials issued by a sign-in.
	pub async fn establish_session(
		&self,
		access_token: &str,
		refresh_token: &str,
	) -> Result<(), StoreError> {
		self.store.save(ACCESS_TOKEN_KEY, access_token).await?;
		self.store.save(REFRESH_TOKEN_KEY, refresh_token).await
	}

	/// Forgets both credentials; both deletions are attempted even if the first fails.
	pub async fn end_session(&self) -> Result<(), StoreError> {
		let access = self.store.delete(ACCESS_TOKEN_KEY).await;
		let refresh = self.store.delete(REFRESH_TOKEN_KEY).await;

		access.and(refresh)
	}
}
impl<C> AuthTransport<HttpTransport<C>>
where
	C: ?Sized + HttpClient,
{
	/// Wraps an [`HttpTransport`], reusing it as the raw refresh transport.
	pub fn over_http(transport: HttpTransport<C>) -> Self {
		let store = transport.store().clone();
		let refresh_path = transport.config().refresh_path.clone();
		let inner = Arc::new(transport);
		let raw: Arc<dyn RawTransport> = inner.clone();

		Self::new(inner, raw, store, refresh_path)
	}
}
impl<T> Clone for AuthTransport<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
			store: self.store.clone(),
			refresher: self.refresher.clone(),
		}
	}
}
impl<T> Debug for AuthTransport<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthTransport").field("refresher", &self.refresher).finish()
	}
}
impl<T> Transport for AuthTransport<T>
where
	T: ?Sized + Transport,
{
	fn execute<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, Response> {
		Box::pin(async move {
			match self.inner.execute(request).await {
				Err(Error::Unauthorized) => {
					self.refresher.refresh().await?;
					self.inner.execute(request).await
				},
				outcome => outcome,
			}
		})
	}

	fn execute_void<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, ()> {
		Box::pin(async move {
			match self.inner.execute_void(request).await {
				Err(Error::Unauthorized) => {
					self.refresher.refresh().await?;
					self.inner.execute_void(request).await
				},
				outcome => outcome,
			}
		})
	}
}
