//! Single-flight access-token refresh.
//!
//! [`TokenRefresher::refresh`] is the only way new access tokens enter the store. The
//! first caller to observe an authorization failure publishes a shared refresh handle
//! in the in-flight slot; callers arriving while it runs clone that handle and await
//! the same outcome. The exchange runs on its own task, so it settles even if every waiter
//! is dropped. It clears the slot as its final step, so the next authorization failure
//! after it settles starts a fresh exchange.

// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{RefreshMetrics, TokenSecret},
	obs::{self, CallKind, CallOutcome, CallSpan},
	request::Request,
	store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SecretStore, StoreError},
	transport::{RawTransport, Transport},
};

type RefreshHandle = Shared<BoxFuture<'static, Result<TokenSecret>>>;
type RefreshSlot = Arc<AsyncMutex<Option<RefreshHandle>>>;

#[derive(Serialize)]
struct RefreshRequest<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
	access_token: TokenSecret,
	#[serde(default)]
	refresh_token: Option<TokenSecret>,
}

#[derive(Debug, ThisError)]
enum RefreshFailure {
	#[error("Refresh exchange failed: {0}")]
	Exchange(#[from] Error),
	#[error("Refreshed token could not be stored: {0}")]
	Storage(#[from] StoreError),
}

/// Coordinates refresh-token exchanges so concurrent callers share one network call.
pub struct TokenRefresher {
	transport: Arc<dyn RawTransport>,
	store: Arc<dyn SecretStore>,
	path: String,
	in_flight: RefreshSlot,
	metrics: Arc<RefreshMetrics>,
}
impl TokenRefresher {
	/// Creates a refresher that exchanges tokens at `path` through `transport`.
	pub fn new(
		transport: Arc<dyn RawTransport>,
		store: Arc<dyn SecretStore>,
		path: impl Into<String>,
	) -> Self {
		Self {
			transport,
			store,
			path: path.into(),
			in_flight: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Counters describing refresh activity.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Whether an exchange is currently in flight.
	pub async fn is_refreshing(&self) -> bool {
		self.in_flight.lock().await.is_some()
	}

	/// Obtains a fresh access token, joining an exchange already in flight.
	///
	/// Fails with [`Error::Unauthorized`] when no refresh token is stored or when the
	/// exchange fails; in the latter case both stored tokens are deleted.
	///
	/// The exchange is spawned on the current Tokio runtime.
	pub async fn refresh(&self) -> Result<TokenSecret> {
		let handle = {
			let mut slot = self.in_flight.lock().await;

			match slot.as_ref() {
				Some(handle) => {
					self.metrics.record_join();

					handle.clone()
				},
				None => {
					let Some(refresh_token) =
						self.store.get(REFRESH_TOKEN_KEY).await.ok().flatten()
					else {
						obs::call_failed(CallKind::Refresh, &"no refresh token available");

						return Err(Error::Unauthorized);
					};
					let handle = self.start(TokenSecret::new(refresh_token));

					*slot = Some(handle.clone());

					handle
				},
			}
		};

		handle.await
	}

	fn start(&self, refresh_token: TokenSecret) -> RefreshHandle {
		const KIND: CallKind = CallKind::Refresh;

		let transport = self.transport.clone();
		let store = self.store.clone();
		let path = self.path.clone();
		let in_flight = self.in_flight.clone();
		let metrics = self.metrics.clone();
		let slot = self.in_flight.clone();
		let span = CallSpan::new(KIND, "refresh");

		metrics.record_attempt();
		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let task = tokio::spawn(span.instrument(async move {
			obs::auth_event("refreshing access token");

			let outcome =
				exchange(transport.as_ref(), store.as_ref(), &path, &refresh_token).await;

			if outcome.is_err() {
				for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
					if let Err(e) = store.delete(key).await {
						obs::call_failed(KIND, &e);
					}
				}
			}

			in_flight.lock().await.take();

			match outcome {
				Ok(token) => {
					metrics.record_success();
					obs::record_call_outcome(KIND, CallOutcome::Success);
					obs::auth_event("access token refreshed");

					Ok(token)
				},
				Err(e) => {
					metrics.record_failure();
					obs::record_call_outcome(KIND, CallOutcome::Failure);
					obs::call_failed(KIND, &e);

					Err(Error::Unauthorized)
				},
			}
		}));

		async move {
			match task.await {
				Ok(outcome) => outcome,
				// The task died before clearing the slot.
				Err(e) => {
					slot.lock().await.take();
					obs::call_failed(KIND, &e);

					Err(Error::Unauthorized)
				},
			}
		}
		.boxed()
		.shared()
	}
}
impl Debug for TokenRefresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("path", &self.path)
			.field("metrics", &self.metrics)
			.finish()
	}
}

async fn exchange(
	transport: &dyn RawTransport,
	store: &dyn SecretStore,
	path: &str,
	refresh_token: &TokenSecret,
) -> Result<TokenSecret, RefreshFailure> {
	let request =
		Request::post(path).with_json(&RefreshRequest { refresh_token: refresh_token.expose() })?;
	let response = transport.execute(&request).await?.json::<RefreshResponse>()?;

	store.save(ACCESS_TOKEN_KEY, response.access_token.expose()).await?;

	if let Some(rotated) = response.refresh_token.as_ref() {
		store.save(REFRESH_TOKEN_KEY, rotated.expose()).await?;
	}

	Ok(response.access_token)
}
