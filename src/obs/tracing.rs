// self
use crate::{
	_prelude::*,
	obs::CallKind,
	store::{StoreAction, StoreError},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by coordinator operations.
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
			let span = tracing::info_span!("session_coordinator.call", call = kind.as_str(), stage);

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

/// Logs `err` at `error` level unless it was constructed as silent.
///
/// Returns `true` when the failure was emitted.
pub fn log_failure(kind: CallKind, err: &Error) -> bool {
	if err.is_silent() {
		return false;
	}

	#[cfg(feature = "tracing")]
	{
		tracing::error!(
			call = kind.as_str(),
			failure = err.kind().as_str(),
			error = %err,
			"coordinated call failed"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = kind;
	}

	true
}

/// Emits a refresh state-machine transition at `debug` level.
pub fn trace_transition(from: &'static str, to: &'static str, queued: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(from, to, queued, "refresh state transition");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to, queued);
	}
}

/// Logs a store write that failed after the caller's outcome was already decided.
///
/// The failure is reported at `warn` level and never replaces the caller's result.
pub fn log_store_failure(action: &StoreAction, err: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(action = action.as_str(), error = %err, "credential store write failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (action, err);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{RefreshError, TransportError};

	#[test]
	fn silent_failures_are_not_logged() {
		let silent = Error::AuthenticationFailed(Arc::new(RefreshError::Rejected { status: 401 }));
		let loud = Error::transport(TransportError::Timeout { url: "https://x.test/api".into() });

		assert!(!log_failure(CallKind::Request, &silent));
		assert!(log_failure(CallKind::Request, &loud));
	}

	#[test]
	fn store_failures_are_logged_without_panicking() {
		let err = StoreError::Backend { message: "disk full".into() };

		log_store_failure(&StoreAction::ClearCsrfToken, &err);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CallSpan::new(CallKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
