// self
use crate::{_prelude::*, obs::CallKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by transport calls.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("rest_transport.call", call = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits the entry event for a call.
pub fn call_started(kind: CallKind, method: &str, target: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(call = kind.as_str(), method, target, "dispatching request");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, method, target);
	}
}

/// Emits a warning when a retry has been scheduled.
pub fn retry_scheduled(
	kind: CallKind,
	attempt: u32,
	max_retries: u32,
	delay: Duration,
	reason: &dyn Display,
) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			call = kind.as_str(),
			attempt = attempt + 1,
			max_retries,
			delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
			%reason,
			"retrying after transient failure"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, attempt, max_retries, delay, reason);
	}
}

/// Emits an error event when a call gives up.
pub fn call_failed(kind: CallKind, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(call = kind.as_str(), %error, "call failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, error);
	}
}

/// Emits an informational event for auth coordinator milestones.
pub fn auth_event(message: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(call = CallKind::Refresh.as_str(), "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}
