//! Error taxonomy shared by the transport, the auth coordinator, and callers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Closed set of failures a call can surface.
///
/// Exactly one kind is produced per attempt. The auth coordinator recovers from
/// [`Error::Unauthorized`] only; every other kind reaches the caller untouched.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum Error {
	/// Host unreachable, connection lost, or no network at all.
	#[error("Network is unreachable.")]
	NetworkUnreachable,
	/// The attempt exceeded the configured timeout.
	#[error("Request timed out.")]
	Timeout,
	/// Credentials are missing, expired, or could not be refreshed.
	#[error("Request is unauthorized; re-authentication is required.")]
	Unauthorized,
	/// Server refused access to the resource (HTTP 403).
	#[error("Access to the resource is forbidden.")]
	Forbidden,
	/// Resource does not exist (HTTP 404).
	#[error("Resource was not found.")]
	NotFound,
	/// Any other 4xx response.
	#[error("Validation failed: {0}.")]
	Validation(String),
	/// 5xx response, or a status the caller did not expect.
	#[error("Server responded with {0}: {1}.")]
	ServerError(u16, String),
	/// Success payload did not match the expected shape.
	#[error("Failed to decode response: {0}.")]
	Decoding(String),
	/// The request could not be built.
	#[error("Invalid request: {0}.")]
	InvalidRequest(String),
}
impl Error {
	/// Returns the HTTP status tied to the error, when one is known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized => Some(401),
			Self::Forbidden => Some(403),
			Self::NotFound => Some(404),
			Self::ServerError(status, _) => Some(*status),
			_ => None,
		}
	}
}

/// Configuration problems detected while assembling a transport.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required setting is absent.
	#[error("Missing configuration value `{key}`.")]
	Missing {
		/// Setting name.
		key: &'static str,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL is not an absolute HTTP(S) URL with a host.
	#[error("Base URL must be an absolute http(s) URL with a host: {url}.")]
	UnsupportedBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Non-development environments must talk HTTPS.
	#[error("The {environment} environment requires an HTTPS base URL: {url}.")]
	InsecureBaseUrl {
		/// Environment tag that rejected the URL.
		environment: crate::config::Environment,
		/// URL that failed validation.
		url: String,
	},
	/// Timeout is zero, negative, or not a number.
	#[error("Timeout `{value}` is not a positive number of seconds.")]
	InvalidTimeout {
		/// Raw value supplied by the configuration source.
		value: String,
	},
	/// Environment tag is not recognized.
	#[error("Unknown build environment `{value}`.")]
	UnknownEnvironment {
		/// Raw value supplied by the configuration source.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Wire-level failures reported by [`HttpClient`](crate::http::HttpClient) implementations.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// No response arrived before the deadline.
	#[error("Request timed out before a response arrived.")]
	Timeout,
	/// Host could not be resolved or connected to.
	#[error("Host is unreachable.")]
	Unreachable {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The connection dropped while the request was in flight.
	#[error("Connection was lost mid-request.")]
	ConnectionLost {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The request could not be converted for the underlying HTTP stack; nothing was sent.
	#[error("Request could not be prepared for sending.")]
	InvalidRequest {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Anything the transport cannot classify further.
	#[error("HTTP transport failed.")]
	Other {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a resolution or connect failure.
	pub fn unreachable(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Unreachable { source: Box::new(src) }
	}

	/// Wraps a failure that interrupted an established connection.
	pub fn connection_lost(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::ConnectionLost { source: Box::new(src) }
	}

	/// Wraps a failure to convert the request before sending it.
	pub fn invalid_request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::InvalidRequest { source: Box::new(src) }
	}

	/// Wraps an unclassified transport failure.
	pub fn other(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Other { source: Box::new(src) }
	}

	/// Whether the failure is transient enough to be worth another attempt.
	pub fn is_retryable(&self) -> bool {
		!matches!(self, Self::InvalidRequest { .. } | Self::Other { .. })
	}
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Timeout => Self::Timeout,
			TransportError::InvalidRequest { source } => Self::InvalidRequest(source.to_string()),
			_ => Self::NetworkUnreachable,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::Timeout
		} else if e.is_connect() {
			Self::unreachable(e)
		} else if e.is_request() || e.is_body() {
			Self::connection_lost(e)
		} else {
			Self::other(e)
		}
	}
}
