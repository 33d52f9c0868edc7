//! Maps final HTTP statuses onto the closed [`Error`] set.

// self
use crate::_prelude::*;

/// Converts a failing status into an [`Error`], reading the message from the body.
pub(crate) fn status_error(status: u16, body: &[u8]) -> Error {
	match status {
		401 => Error::Unauthorized,
		403 => Error::Forbidden,
		404 => Error::NotFound,
		400..=499 => Error::Validation(error_message(status, body)),
		_ => Error::ServerError(status, error_message(status, body)),
	}
}

// `message` wins over `error`; non-string fields are ignored.
fn error_message(status: u16, body: &[u8]) -> String {
	serde_json::from_slice::<Value>(body)
		.ok()
		.and_then(|value| {
			let object = value.as_object()?;

			["message", "error"]
				.into_iter()
				.find_map(|field| object.get(field)?.as_str().map(ToOwned::to_owned))
		})
		.unwrap_or_else(|| format!("HTTP error {status}"))
}
