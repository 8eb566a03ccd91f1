//! One-stop wiring of every gate from a [`GatewayConfig`].

// self
use crate::{
	_prelude::*,
	admission::{Admission, AdmissionPipeline, InboundRequest, RouteAccess},
	bootstrap::{BootstrapData, BootstrapExchange, IssuedBootstrap},
	config::GatewayConfig,
	obs::{GateKind, GateOutcome, GateSpan},
	oauth::OAuthStateIssuer,
	rate_limit::{FileRateLimiter, RateLimiter},
	session::{IssuedSession, SessionStore},
	token::TokenAuthority,
};

/// Owns the gateway's components; each keeps its own state.
///
/// Sessions and OAuth state share the signing key through cloned [`TokenAuthority`] handles;
/// the rate limiter and the bootstrap exchange share nothing with them.
#[derive(Clone, Debug)]
pub struct Gateway {
	/// Token-backed sessions.
	pub sessions: SessionStore,
	/// CSRF state for the login redirect.
	pub oauth_state: OAuthStateIssuer,
	/// Single-use bootstrap codes.
	pub bootstrap: BootstrapExchange,
	/// Request gate.
	pub admission: AdmissionPipeline,
}
impl Gateway {
	/// Builds every component with the file-backed rate limiter.
	pub fn from_config(config: &GatewayConfig) -> Result<Self> {
		let limiter = FileRateLimiter::new(config.rate_limit_file.clone(), config.rate_limit);

		Self::with_limiter(config, Arc::new(limiter))
	}

	/// Builds every component around a caller-provided rate limiter.
	pub fn with_limiter(config: &GatewayConfig, limiter: Arc<dyn RateLimiter>) -> Result<Self> {
		let authority = TokenAuthority::new(&config.signing_secret)?;
		let sessions = SessionStore::new(authority.clone()).with_ttl(config.session_ttl);
		let oauth_state = OAuthStateIssuer::new(authority).with_ttl(config.oauth_state_ttl);
		let bootstrap = BootstrapExchange::new(config.bootstrap_ttl, config.bootstrap_max_entries);
		let admission =
			AdmissionPipeline::new(limiter, sessions.clone(), config.health_path.clone());

		Ok(Self { sessions, oauth_state, bootstrap, admission })
	}

	/// Runs the admission pipeline.
	pub async fn admit(
		&self,
		request: &InboundRequest<'_>,
		access: RouteAccess,
	) -> Result<Admission> {
		self.admission.admit(request, access).await
	}

	/// Completes the OAuth callback: checks the returned state, then issues a bootstrap code.
	pub fn complete_callback(&self, state: &str, data: BootstrapData) -> Result<IssuedBootstrap> {
		let gate = GateSpan::new(GateKind::OAuthState);

		if let Err(e) = self.oauth_state.require_valid(state) {
			gate.finish(GateOutcome::Rejected);

			return Err(e);
		}

		gate.finish(GateOutcome::Allowed);

		Ok(self.bootstrap.issue(data))
	}

	/// Redeems a bootstrap code and mints a session for its tenant.
	///
	/// Returns `None` when the code is unknown, already used, or expired.
	pub fn exchange_bootstrap(
		&self,
		code: &str,
	) -> Result<Option<(BootstrapData, IssuedSession)>> {
		let gate = GateSpan::new(GateKind::Bootstrap);
		let Some(data) = self.bootstrap.redeem(code)? else {
			gate.finish(GateOutcome::Rejected);

			return Ok(None);
		};
		let session = self.sessions.create_session(data.tenant_id.clone())?;

		gate.finish(GateOutcome::Allowed);

		Ok(Some((data, session)))
	}
}
