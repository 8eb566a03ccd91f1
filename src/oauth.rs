//! Signed CSRF state for the provider login redirect.
//!
//! State tokens are stateless: a token stays valid for its whole TTL and is not tracked as
//! consumed, so the same state can be presented more than once inside that window.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	clock,
	token::{Claims, OAuthStateClaims, TokenAuthority},
};

const NONCE_BYTES: usize = 16;

/// Provider login request parameters used to build the authorize redirect.
#[derive(Clone, Debug)]
pub struct AuthorizeRequest {
	/// Provider authorize endpoint.
	pub endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
	/// Requested permissions.
	pub scopes: Vec<String>,
}

/// Issues and checks OAuth state tokens.
#[derive(Clone, Debug)]
pub struct OAuthStateIssuer {
	authority: TokenAuthority,
	ttl: Duration,
}
impl OAuthStateIssuer {
	/// Default state lifetime.
	pub const DEFAULT_TTL: Duration = Duration::minutes(10);

	/// Creates an issuer with the default lifetime.
	pub fn new(authority: TokenAuthority) -> Self {
		Self { authority, ttl: Self::DEFAULT_TTL }
	}

	/// Overrides the state lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Issues a state token using the current clock.
	pub fn issue_state(&self) -> Result<String> {
		self.issue_state_at(OffsetDateTime::now_utc())
	}

	/// Issues a state token as of `now`.
	pub fn issue_state_at(&self, now: OffsetDateTime) -> Result<String> {
		let iat = clock::epoch_millis(now);
		let exp = iat.saturating_add(clock::duration_millis(self.ttl));
		let mut nonce = [0_u8; NONCE_BYTES];

		rand::rng().fill_bytes(&mut nonce);

		self.authority.sign(&Claims::OAuthState(OAuthStateClaims {
			iat,
			exp,
			nonce: URL_SAFE_NO_PAD.encode(nonce),
		}))
	}

	/// Checks a returned state using the current clock.
	pub fn is_valid(&self, state: &str) -> bool {
		self.is_valid_at(state, OffsetDateTime::now_utc())
	}

	/// Checks a returned state as of `now`.
	pub fn is_valid_at(&self, state: &str, now: OffsetDateTime) -> bool {
		match self.authority.verify::<Claims>(state) {
			Some(Claims::OAuthState(claims)) => claims.exp > clock::epoch_millis(now),
			Some(Claims::Session(_)) | None => false,
		}
	}

	/// Like [`Self::is_valid`] but as a gate result.
	pub fn require_valid(&self, state: &str) -> Result<()> {
		if self.is_valid(state) {
			Ok(())
		} else {
			Err(Error::auth_required("OAuth state is invalid or expired"))
		}
	}

	/// Builds the provider authorize URL carrying a freshly issued state.
	pub fn authorize_url(&self, request: &AuthorizeRequest) -> Result<Url> {
		let state = self.issue_state()?;
		let mut url = request.endpoint.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("client_id", &request.client_id);
		pairs.append_pair("redirect_uri", request.redirect_uri.as_str());
		pairs.append_pair("response_type", "code");

		if !request.scopes.is_empty() {
			pairs.append_pair("scope", &request.scopes.join(","));
		}

		pairs.append_pair("state", &state);

		drop(pairs);

		Ok(url)
	}
}
