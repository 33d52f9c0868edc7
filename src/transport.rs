//! Request execution with status classification and idempotent retries.
//!
//! [`HttpTransport`] resolves a [`Request`] against the configured base URL, attaches
//! JSON and bearer headers, and drives an [`HttpClient`] one attempt at a time. GET and
//! PUT calls that hit a transient status or wire failure are replayed under the
//! [`RetryPolicy`] backoff; everything else is classified immediately into the closed
//! [`Error`] set.

pub mod retry;

mod classify;

pub use retry::RetryPolicy;

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Uri,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	config::TransportConfig,
	error::TransportError,
	http::{HttpClient, HttpRequest},
	obs::{self, CallKind, CallOutcome, CallSpan},
	request::{Request, Response},
	store::{ACCESS_TOKEN_KEY, SecretStore},
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient};

/// Boxed future returned by [`Transport`] operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Transport specialized for the crate's default reqwest stack.
pub type ReqwestTransport = HttpTransport<ReqwestHttpClient>;

/// Caller-facing contract shared by the raw transport and the auth coordinator.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Executes `request`, returning the raw response of a non-failing status.
	fn execute<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, Response>;

	/// Executes `request`, discarding the body and requiring a 2xx status.
	fn execute_void<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, ()>;
}
impl<T> Transport for Arc<T>
where
	T: ?Sized + Transport,
{
	fn execute<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, Response> {
		(**self).execute(request)
	}

	fn execute_void<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, ()> {
		(**self).execute_void(request)
	}
}

/// Marker for transports that never route through the auth coordinator.
///
/// Token refreshes are only issued through a `RawTransport`, which rules out a refresh
/// call triggering another refresh.
pub trait RawTransport: Transport {}

/// Transport that talks to the network through an [`HttpClient`].
pub struct HttpTransport<C>
where
	C: ?Sized + HttpClient,
{
	client: Arc<C>,
	store: Arc<dyn SecretStore>,
	config: Arc<TransportConfig>,
	retry: RetryPolicy,
}
impl<C> HttpTransport<C>
where
	C: ?Sized + HttpClient,
{
	/// Creates a transport over the caller-provided client.
	pub fn with_http_client(
		config: TransportConfig,
		store: Arc<dyn SecretStore>,
		client: impl Into<Arc<C>>,
	) -> Self {
		Self { client: client.into(), store, config: Arc::new(config), retry: Default::default() }
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Configuration the transport was built with.
	pub fn config(&self) -> &TransportConfig {
		&self.config
	}

	/// Secret store the transport reads bearer tokens from.
	pub fn store(&self) -> &Arc<dyn SecretStore> {
		&self.store
	}

	/// Active retry policy.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	/// Resolves the request path and query against the base URL.
	pub fn resolve(&self, request: &Request) -> Url {
		let mut url = self.config.base_url.clone();
		let path = format!(
			"{}/{}",
			url.path().trim_end_matches('/'),
			request.path().trim_start_matches('/')
		);

		url.set_path(&path);

		if !request.query().is_empty() {
			url.query_pairs_mut().extend_pairs(request.query());
		}

		url
	}

	async fn build(&self, request: &Request) -> Result<HttpRequest> {
		let url = self.resolve(request);
		let uri = url
			.as_str()
			.parse::<Uri>()
			.map_err(|e| Error::InvalidRequest(format!("Invalid URL construction: {e}")))?;
		let body = match request.body() {
			Some(value) => serde_json::to_vec(value)
				.map_err(|e| Error::InvalidRequest(format!("Body is not serializable: {e}")))?,
			None => Vec::new(),
		};
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		if let Some(bearer) = self.bearer().await {
			headers.insert(AUTHORIZATION, bearer);
		}

		for (name, value) in request.headers() {
			let name = HeaderName::try_from(name.as_str())
				.map_err(|e| Error::InvalidRequest(format!("Invalid header name `{name}`: {e}")))?;
			let value = HeaderValue::try_from(value.as_str())
				.map_err(|e| Error::InvalidRequest(format!("Invalid value for `{name}`: {e}")))?;

			headers.insert(name, value);
		}

		let mut wire = HttpRequest::new(body);

		*wire.method_mut() = request.method().into();
		*wire.uri_mut() = uri;
		*wire.headers_mut() = headers;

		Ok(wire)
	}

	// Missing, unreadable, or malformed tokens leave the call unauthenticated.
	async fn bearer(&self) -> Option<HeaderValue> {
		let token = self.store.get(ACCESS_TOKEN_KEY).await.ok().flatten()?;
		let mut value = HeaderValue::try_from(format!("Bearer {token}")).ok()?;

		value.set_sensitive(true);

		Some(value)
	}

	async fn round_trip(&self, wire: HttpRequest) -> Result<Response, TransportError> {
		let response = tokio::time::timeout(self.config.timeout, self.client.call(wire))
			.await
			.map_err(|_| TransportError::Timeout)??;
		let status = response.status().as_u16();

		Ok(Response::new(status, response.into_body()))
	}

	async fn send(&self, request: &Request) -> Result<Response> {
		let retryable = self.retry.allows(request.method());
		let mut attempt = 0;

		loop {
			let wire = self.build(request).await?;

			obs::call_started(CallKind::Request, request.method().as_str(), &wire.uri().to_string());

			match self.round_trip(wire).await {
				Ok(response) => {
					let status = response.status();

					if retryable && self.retry.retries_status(status) && self.retry.has_budget(attempt)
					{
						self.back_off(attempt, &format!("HTTP {status}")).await;

						attempt += 1;

						continue;
					}
					if status >= 400 {
						return Err(classify::status_error(status, response.body()));
					}

					return Ok(response);
				},
				Err(e) => {
					if retryable && self.retry.retries_transport(&e) && self.retry.has_budget(attempt)
					{
						self.back_off(attempt, &e).await;

						attempt += 1;

						continue;
					}

					return Err(e.into());
				},
			}
		}
	}

	async fn back_off(&self, attempt: u32, reason: &(dyn Display + Sync)) {
		let delay = self.retry.backoff(attempt);

		obs::retry_scheduled(CallKind::Request, attempt, self.retry.max_retries, delay, reason);
		obs::record_call_outcome(CallKind::Request, CallOutcome::Retry);
		tokio::time::sleep(delay).await;
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport<ReqwestHttpClient> {
	/// Creates a transport that provisions its own reqwest client.
	///
	/// The client's connect timeout mirrors the configured per-attempt timeout.
	pub fn new(config: TransportConfig, store: Arc<dyn SecretStore>) -> Result<Self, ConfigError> {
		let client = ReqwestHttpClient::with_connect_timeout(config.timeout)?;

		Ok(Self::with_http_client(config, store, client))
	}
}
impl<C> Clone for HttpTransport<C>
where
	C: ?Sized + HttpClient,
{
	fn clone(&self) -> Self {
		Self {
			client: self.client.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			retry: self.retry.clone(),
		}
	}
}
impl<C> Debug for HttpTransport<C>
where
	C: ?Sized + HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTransport")
			.field("config", &self.config)
			.field("retry", &self.retry)
			.finish()
	}
}
impl<C> Transport for HttpTransport<C>
where
	C: ?Sized + HttpClient,
{
	fn execute<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, Response> {
		Box::pin(observed("execute", self.send(request)))
	}

	fn execute_void<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, ()> {
		Box::pin(observed("execute_void", async move {
			self.send(request).await?.ensure_success()
		}))
	}
}
impl<C> RawTransport for HttpTransport<C> where C: ?Sized + HttpClient {}

async fn observed<T, F>(stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	const KIND: CallKind = CallKind::Request;

	let span = CallSpan::new(KIND, stage);

	obs::record_call_outcome(KIND, CallOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
		Err(e) => {
			obs::record_call_outcome(KIND, CallOutcome::Failure);
			obs::call_failed(KIND, e);
		},
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{http::HttpFuture, store::MemoryStore};

	struct TimingOut;
	impl HttpClient for TimingOut {
		fn call(&self, _request: HttpRequest) -> HttpFuture<'_> {
			Box::pin(async { Err(TransportError::Timeout) })
		}
	}

	fn fixture(base: &str) -> HttpTransport<TimingOut> {
		let config = TransportConfig::builder(Url::parse(base).expect("Fixture URL should parse."))
			.build()
			.expect("Fixture configuration should be valid.");

		HttpTransport::with_http_client(config, Arc::new(MemoryStore::default()), TimingOut)
	}

	#[test]
	fn resolve_joins_paths_and_keeps_query_order() {
		let transport = fixture("https://api.example.com/v1/");
		let request = Request::get("/items").with_query("page", "2").with_query("q", "a b");

		assert_eq!(
			transport.resolve(&request).as_str(),
			"https://api.example.com/v1/items?page=2&q=a+b"
		);

		let transport = fixture("https://api.example.com");

		assert_eq!(
			transport.resolve(&Request::get("items/7")).as_str(),
			"https://api.example.com/items/7"
		);
	}

	#[tokio::test]
	async fn build_attaches_defaults_bearer_and_overrides() {
		let transport = fixture("https://api.example.com");

		transport
			.store()
			.save(ACCESS_TOKEN_KEY, "token-1")
			.await
			.expect("Seeding the memory store should succeed.");

		let request = Request::put("/items/1")
			.with_header("Accept", "application/vnd.api+json")
			.with_json(&serde_json::json!({ "title": "renamed" }))
			.expect("JSON body should serialize.");
		let wire = transport.build(&request).await.expect("Request should build.");

		assert_eq!(wire.method(), &http::Method::PUT);
		assert_eq!(wire.headers()[CONTENT_TYPE], "application/json");
		assert_eq!(wire.headers()[ACCEPT], "application/vnd.api+json");
		assert_eq!(wire.headers()[AUTHORIZATION], "Bearer token-1");
		assert_eq!(wire.body().as_slice(), b"{\"title\":\"renamed\"}");
	}

	#[tokio::test]
	async fn build_without_token_is_unauthenticated() {
		let wire = fixture("https://api.example.com")
			.build(&Request::delete("/items/1"))
			.await
			.expect("Request should build.");

		assert!(wire.headers().get(AUTHORIZATION).is_none());
		assert!(wire.body().is_empty());
	}

	#[tokio::test]
	async fn build_rejects_invalid_header_names() {
		let err = fixture("https://api.example.com")
			.build(&Request::get("/items").with_header("bad header", "x"))
			.await
			.expect_err("Header names with spaces should be rejected.");

		assert!(matches!(err, Error::InvalidRequest(_)));
	}

	#[tokio::test]
	async fn non_idempotent_timeout_surfaces_immediately() {
		let err = fixture("https://api.example.com")
			.execute(&Request::post("/items"))
			.await
			.expect_err("Timeouts should surface for POST.");

		assert_eq!(err, Error::Timeout);
	}
}
