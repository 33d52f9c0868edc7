//! Bounded exponential backoff for idempotent calls.

// std
use std::collections::BTreeSet;
// self
use crate::{_prelude::*, error::TransportError, request::Method};

/// Decides whether and when a failed attempt is replayed.
///
/// Only idempotent methods are ever retried. The delay before retry `n` (zero based)
/// is `base_delay * 2^n`, so the defaults wait 1s, 2s, then 4s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Retries allowed after the original attempt.
	pub max_retries: u32,
	/// Delay before the first retry.
	pub base_delay: Duration,
	/// Statuses treated as transient.
	pub retryable_statuses: BTreeSet<u16>,
}
impl RetryPolicy {
	/// Statuses retried by default.
	pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the first backoff delay.
	pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
		self.base_delay = base_delay;

		self
	}

	/// Replaces the transient status set.
	pub fn with_retryable_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.retryable_statuses = statuses.into_iter().collect();

		self
	}

	/// Whether calls with this method may be retried at all.
	pub fn allows(&self, method: Method) -> bool {
		method.is_idempotent()
	}

	/// Whether a response status is transient.
	pub fn retries_status(&self, status: u16) -> bool {
		self.retryable_statuses.contains(&status)
	}

	/// Whether a wire-level failure is transient.
	pub fn retries_transport(&self, error: &TransportError) -> bool {
		error.is_retryable()
	}

	/// Whether another attempt remains after `attempt` retries.
	pub fn has_budget(&self, attempt: u32) -> bool {
		attempt < self.max_retries
	}

	/// Delay before retry number `attempt`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay: Duration::from_secs(1),
			retryable_statuses: Self::DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
		}
	}
}
