//! Request admission: rate limit every request, then authenticate protected routes.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	obs::{GateKind, GateOutcome, GateSpan},
	rate_limit::{RateLimitDecision, RateLimiter},
	session::{SessionData, SessionStore},
};

// 12 digest bytes encode to 16 base64url characters.
const KEY_DIGEST_BYTES: usize = 12;

/// The parts of an inbound request the pipeline needs; the host framework extracts them.
#[derive(Clone, Copy, Debug)]
pub struct InboundRequest<'a> {
	/// Request path, without query string.
	pub path: &'a str,
	/// Raw `Authorization` header value, if any.
	pub authorization: Option<&'a str>,
	/// Client network address as seen by the host.
	pub client_addr: &'a str,
}
impl<'a> InboundRequest<'a> {
	/// Creates a request without credentials.
	pub fn new(path: &'a str, client_addr: &'a str) -> Self {
		Self { path, authorization: None, client_addr }
	}

	/// Attaches a raw `Authorization` header value.
	pub fn with_authorization(mut self, value: &'a str) -> Self {
		self.authorization = Some(value);

		self
	}

	/// Bearer token from the `Authorization` header, if well formed.
	pub fn bearer_token(&self) -> Option<&'a str> {
		let (scheme, token) = self.authorization?.trim().split_once(' ')?;
		let token = token.trim();

		(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
	}
}

/// Whether a route requires an authenticated session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAccess {
	/// Rate limited only.
	Public,
	/// Rate limited and requires a valid session.
	Protected,
}

/// Outcome of a successful admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
	/// Health-check path; nothing was checked.
	HealthCheck,
	/// Public route passed the rate limiter.
	Anonymous,
	/// Protected route resolved to this session.
	Authenticated(SessionData),
}
impl Admission {
	/// Authenticated tenant, if any.
	pub fn session(&self) -> Option<&SessionData> {
		match self {
			Admission::Authenticated(session) => Some(session),
			Admission::HealthCheck | Admission::Anonymous => None,
		}
	}
}

/// Rate-limit key for a request: hashed bearer token when present, else the client address.
///
/// Keeping the two namespaces apart means authenticated callers behind a shared NAT do not
/// spend each other's budget.
pub fn rate_limit_key(bearer: Option<&str>, client_addr: &str) -> String {
	match bearer {
		Some(token) => {
			let digest = Sha256::digest(token.as_bytes());

			format!("token:{}", URL_SAFE_NO_PAD.encode(&digest[..KEY_DIGEST_BYTES]))
		},
		None => format!("ip:{client_addr}"),
	}
}

/// Gates every inbound request.
#[derive(Clone)]
pub struct AdmissionPipeline {
	limiter: Arc<dyn RateLimiter>,
	sessions: SessionStore,
	health_path: String,
}
impl AdmissionPipeline {
	/// Composes a limiter and a session store.
	pub fn new(
		limiter: Arc<dyn RateLimiter>,
		sessions: SessionStore,
		health_path: impl Into<String>,
	) -> Self {
		Self { limiter, sessions, health_path: health_path.into() }
	}

	/// Admits `request` using the current clock.
	pub async fn admit(
		&self,
		request: &InboundRequest<'_>,
		access: RouteAccess,
	) -> Result<Admission> {
		self.admit_at(request, access, OffsetDateTime::now_utc()).await
	}

	/// Admits `request` as of `now`.
	///
	/// A limiter failure rejects the request (fail closed) instead of letting it through.
	pub async fn admit_at(
		&self,
		request: &InboundRequest<'_>,
		access: RouteAccess,
		now: OffsetDateTime,
	) -> Result<Admission> {
		if request.path == self.health_path {
			return Ok(Admission::HealthCheck);
		}

		let bearer = request.bearer_token();
		let key = rate_limit_key(bearer, request.client_addr);
		let gate = GateSpan::new(GateKind::RateLimit);
		let decision = gate.run(self.limiter.check_at(&key, now)).await;

		match decision {
			Ok(RateLimitDecision::Allow) => gate.finish(GateOutcome::Allowed),
			Ok(RateLimitDecision::Limited(directive)) => {
				gate.finish(GateOutcome::Rejected);

				#[cfg(feature = "tracing")]
				tracing::debug!(
					key = %key,
					retry_after = directive.retry_after_seconds,
					"Request rate limited."
				);

				return Err(Error::RateLimited {
					retry_after_seconds: directive.retry_after_seconds,
				});
			},
			Err(e) => {
				gate.finish(GateOutcome::Failed);

				#[cfg(feature = "tracing")]
				tracing::warn!(error = %e, "Rate limiter unavailable; rejecting request.");

				return Err(e.into());
			},
		}

		if access == RouteAccess::Public {
			return Ok(Admission::Anonymous);
		}

		let gate = GateSpan::new(GateKind::Session);
		let Some(session) = bearer.and_then(|token| self.sessions.get_session_at(token, now))
		else {
			gate.finish(GateOutcome::Rejected);

			let reason = match bearer {
				Some(_) => "invalid or expired session",
				None => "missing bearer token",
			};

			return Err(Error::auth_required(reason));
		};

		gate.finish(GateOutcome::Allowed);

		Ok(Admission::Authenticated(session))
	}
}
impl Debug for AdmissionPipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdmissionPipeline")
			.field("sessions", &self.sessions)
			.field("health_path", &self.health_path)
			.finish()
	}
}
