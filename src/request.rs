//! Wire-neutral description of an outgoing call and its raw response.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// HTTP methods understood by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
	/// `PATCH`
	Patch,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
			Self::Patch => "PATCH",
		}
	}

	/// GET and PUT may be replayed without duplicating side effects.
	pub const fn is_idempotent(self) -> bool {
		matches!(self, Self::Get | Self::Put)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<Method> for http::Method {
	fn from(method: Method) -> Self {
		match method {
			Method::Get => http::Method::GET,
			Method::Post => http::Method::POST,
			Method::Put => http::Method::PUT,
			Method::Delete => http::Method::DELETE,
			Method::Patch => http::Method::PATCH,
		}
	}
}

/// Immutable description of a single API call.
///
/// Requests are built once and may be replayed verbatim, so every field is owned and
/// the body is serialized up front.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
	path: String,
	method: Method,
	query: Vec<(String, String)>,
	headers: BTreeMap<String, String>,
	body: Option<Value>,
}
impl Request {
	/// Creates a request with no query, headers, or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			method,
			query: Vec::new(),
			headers: BTreeMap::new(),
			body: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Appends a query parameter; insertion order is preserved on the wire.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));

		self
	}

	/// Sets a header that overrides transport defaults with the same name.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Attaches a JSON body.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body)
			.map_err(|e| Error::InvalidRequest(format!("Body is not serializable: {e}")))?;

		self.body = Some(value);

		Ok(self)
	}

	/// Path relative to the configured base URL.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// HTTP method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Query parameters in insertion order.
	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	/// Caller-supplied headers.
	pub fn headers(&self) -> &BTreeMap<String, String> {
		&self.headers
	}

	/// JSON body, if any.
	pub fn body(&self) -> Option<&Value> {
		self.body.as_ref()
	}
}

/// Raw response returned by a successful round-trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
	status: u16,
	body: Vec<u8>,
}
impl Response {
	/// Wraps a status code and payload.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// HTTP status code.
	pub fn status(&self) -> u16 {
		self.status
	}

	/// Raw payload.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Consumes the response, returning the raw payload.
	pub fn into_body(self) -> Vec<u8> {
		self.body
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Fails with [`Error::ServerError`] unless the status is 2xx.
	pub fn ensure_success(&self) -> Result<()> {
		if self.is_success() {
			Ok(())
		} else {
			Err(Error::ServerError(self.status, "Unexpected status code".into()))
		}
	}

	/// Decodes a 2xx JSON payload into `T`.
	///
	/// Decoding failures name the JSON path that could not be read.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.ensure_success()?;

		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|e| {
			let path = e.path().to_string();

			if path == "." {
				Error::Decoding(e.into_inner().to_string())
			} else {
				Error::Decoding(format!("{path}: {}", e.into_inner()))
			}
		})
	}
}
