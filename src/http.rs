//! Byte-moving seam between the transport and a concrete HTTP stack.
//!
//! [`HttpClient`] is the crate's only dependency on an HTTP implementation. The
//! transport hands it a fully built [`HttpRequest`] and expects either an
//! [`HttpResponse`] (any status) or a classified [`TransportError`]. Status handling,
//! retries, and timeouts all live above this layer, so implementations stay thin and
//! test doubles can script responses without a socket.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Fully built request handed to an [`HttpClient`].
pub type HttpRequest = http::Request<Vec<u8>>;
/// Raw response returned by an [`HttpClient`].
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpClient::call`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of performing one round-trip.
///
/// Implementations must not retry, follow authentication challenges, or interpret
/// status codes; every response, including 4xx/5xx, is returned as `Ok`.
pub trait HttpClient
where
	Self: 'static + Send + Sync,
{
	/// Performs exactly one round-trip.
	fn call(&self, request: HttpRequest) -> HttpFuture<'_>;
}
impl<T> HttpClient for Arc<T>
where
	T: ?Sized + HttpClient,
{
	fn call(&self, request: HttpRequest) -> HttpFuture<'_> {
		(**self).call(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with a connect timeout matching the per-attempt budget.
	pub fn with_connect_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().connect_timeout(timeout).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestHttpClient {
	fn call(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::invalid_request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?;
			let mut response_new = HttpResponse::new(body.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
