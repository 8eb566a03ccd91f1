//! Observability for gate decisions.
//!
//! Each decision opens a [`GateSpan`]. With the `tracing` feature the span is named
//! `ig_gateway.gate` and carries `gate` and `outcome` fields. With the `metrics` feature
//! finishing it increments `ig_gateway_gate_total`, labeled by `gate` and `outcome`. Without
//! either feature both are no-ops.

// self
use crate::_prelude::*;

/// Gates observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
	/// Fixed-window rate limiter.
	RateLimit,
	/// Bearer session lookup.
	Session,
	/// OAuth state check.
	OAuthState,
	/// Bootstrap code redemption.
	Bootstrap,
}
impl GateKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GateKind::RateLimit => "rate_limit",
			GateKind::Session => "session",
			GateKind::OAuthState => "oauth_state",
			GateKind::Bootstrap => "bootstrap",
		}
	}
}
impl Display for GateKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each gate decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateOutcome {
	/// Request passed the gate.
	Allowed,
	/// Request was turned away by policy.
	Rejected,
	/// The gate itself failed; the request was failed closed.
	Failed,
}
impl GateOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GateOutcome::Allowed => "allowed",
			GateOutcome::Rejected => "rejected",
			GateOutcome::Failed => "failed",
		}
	}
}
impl Display for GateOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One gate decision in flight.
#[derive(Debug)]
pub struct GateSpan {
	kind: GateKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GateSpan {
	/// Opens a span for a `kind` decision; the outcome is filled in by [`GateSpan::finish`].
	pub fn new(kind: GateKind) -> Self {
		Self {
			kind,
			#[cfg(feature = "tracing")]
			span: tracing::debug_span!(
				"ig_gateway.gate",
				gate = kind.as_str(),
				outcome = tracing::field::Empty
			),
		}
	}

	/// Awaits `fut` inside the span.
	pub async fn run<F>(&self, fut: F) -> F::Output
	where
		F: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone()).await
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut.await
		}
	}

	/// Records `outcome` on the span and the gate counter.
	pub fn finish(self, outcome: GateOutcome) {
		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());
		#[cfg(feature = "metrics")]
		metrics::counter!(
			"ig_gateway_gate_total",
			"gate" => self.kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);

		let _ = (self.kind, outcome);
	}
}
