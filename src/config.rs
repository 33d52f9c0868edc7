//! Read-only transport configuration: base URL, per-attempt timeout, and environment tag.

// self
use crate::{_prelude::*, error::ConfigError};

/// Deployment environment the transport talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
	#[default]
	/// Local development; plain HTTP is allowed.
	Dev,
	/// Pre-production.
	Staging,
	/// Production.
	Prod,
}
impl Environment {
	/// Returns the tag used by configuration sources.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Dev => "DEV",
			Self::Staging => "STAGING",
			Self::Prod => "PROD",
		}
	}

	/// Whether the environment accepts non-HTTPS endpoints.
	pub const fn allows_plain_http(self) -> bool {
		matches!(self, Self::Dev)
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_uppercase().as_str() {
			"DEV" => Ok(Self::Dev),
			"STAGING" => Ok(Self::Staging),
			"PROD" => Ok(Self::Prod),
			_ => Err(ConfigError::UnknownEnvironment { value: s.to_owned() }),
		}
	}
}

/// Validated configuration consumed by [`HttpTransport`](crate::transport::HttpTransport).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
	/// Endpoint every request path is resolved against.
	pub base_url: Url,
	/// Upper bound for a single network attempt.
	pub timeout: Duration,
	/// Environment tag.
	pub environment: Environment,
	/// Path of the token-refresh endpoint.
	pub refresh_path: String,
}
impl TransportConfig {
	/// Environment variable holding the base URL.
	pub const BASE_URL_KEY: &'static str = "API_BASE_URL";
	/// Default per-attempt timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
	/// Environment variable holding the environment tag.
	pub const ENVIRONMENT_KEY: &'static str = "BUILD_ENV";
	/// Default refresh endpoint path.
	pub const REFRESH_PATH: &'static str = "/auth/refresh";
	/// Environment variable holding the timeout in seconds.
	pub const TIMEOUT_KEY: &'static str = "API_TIMEOUT";

	/// Creates a builder for the provided base URL.
	pub fn builder(base_url: Url) -> TransportConfigBuilder {
		TransportConfigBuilder::new(base_url)
	}

	/// Reads `API_BASE_URL`, `API_TIMEOUT`, and `BUILD_ENV` from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the configuration through an arbitrary key lookup.
	///
	/// The timeout falls back to [`Self::DEFAULT_TIMEOUT`] and the environment to
	/// [`Environment::Dev`] when their keys are absent; the base URL is mandatory.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let raw_url =
			lookup(Self::BASE_URL_KEY).ok_or(ConfigError::Missing { key: Self::BASE_URL_KEY })?;
		let base_url =
			Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let mut builder = Self::builder(base_url);

		if let Some(raw) = lookup(Self::TIMEOUT_KEY) {
			builder = builder.timeout(parse_timeout(&raw)?);
		}
		if let Some(raw) = lookup(Self::ENVIRONMENT_KEY) {
			builder = builder.environment(raw.parse()?);
		}

		builder.build()
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let url = &self.base_url;

		if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() || !url.has_host() {
			return Err(ConfigError::UnsupportedBaseUrl { url: url.to_string() });
		}
		if url.scheme() != "https" && !self.environment.allows_plain_http() {
			return Err(ConfigError::InsecureBaseUrl {
				environment: self.environment,
				url: url.to_string(),
			});
		}
		if self.timeout.is_zero() {
			return Err(ConfigError::InvalidTimeout { value: format!("{:?}", self.timeout) });
		}

		Ok(())
	}
}

/// Builder for [`TransportConfig`] values.
#[derive(Debug)]
pub struct TransportConfigBuilder {
	base_url: Url,
	timeout: Duration,
	environment: Environment,
	refresh_path: String,
}
impl TransportConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			timeout: TransportConfig::DEFAULT_TIMEOUT,
			environment: Environment::default(),
			refresh_path: TransportConfig::REFRESH_PATH.into(),
		}
	}

	/// Overrides the per-attempt timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the environment tag.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<TransportConfig, ConfigError> {
		let config = TransportConfig {
			base_url: self.base_url,
			timeout: self.timeout,
			environment: self.environment,
			refresh_path: self.refresh_path,
		};

		config.validate()?;

		Ok(config)
	}
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
	let invalid = || ConfigError::InvalidTimeout { value: raw.to_owned() };
	let secs = raw.trim().parse::<f64>().map_err(|_| invalid())?;

	if !secs.is_finite() || secs <= 0. {
		return Err(invalid());
	}

	Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}
