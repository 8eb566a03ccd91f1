//! Stateless bearer sessions minted by the [`TokenAuthority`].
//!
//! There is no session table: a token stays valid until its `exp`, and logout is not
//! supported.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenSecret},
	clock,
	token::{Claims, SessionClaims, TokenAuthority},
};

const JTI_BYTES: usize = 16;

/// Freshly minted session returned to the client.
#[derive(Clone, Debug)]
pub struct IssuedSession {
	/// Bearer token for the `Authorization` header.
	pub session_token: TokenSecret,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Session resolved from a valid bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionData {
	/// Authenticated tenant.
	pub tenant_id: TenantId,
	/// Issued-at instant.
	pub created_at: OffsetDateTime,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Mints and validates session tokens.
#[derive(Clone, Debug)]
pub struct SessionStore {
	authority: TokenAuthority,
	ttl: Duration,
}
impl SessionStore {
	/// Default session lifetime.
	pub const DEFAULT_TTL: Duration = Duration::hours(24);

	/// Creates a store with the default lifetime.
	pub fn new(authority: TokenAuthority) -> Self {
		Self { authority, ttl: Self::DEFAULT_TTL }
	}

	/// Overrides the session lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Session lifetime.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Mints a session for `tenant_id` using the current clock.
	pub fn create_session(&self, tenant_id: TenantId) -> Result<IssuedSession> {
		self.create_session_at(tenant_id, OffsetDateTime::now_utc())
	}

	/// Mints a session for `tenant_id` as of `now`.
	pub fn create_session_at(
		&self,
		tenant_id: TenantId,
		now: OffsetDateTime,
	) -> Result<IssuedSession> {
		let iat = clock::epoch_millis(now);
		let exp = iat.saturating_add(clock::duration_millis(self.ttl));
		let claims = Claims::Session(SessionClaims { tenant_id, iat, exp, jti: random_jti() });
		let session_token = TokenSecret::new(self.authority.sign(&claims)?);

		Ok(IssuedSession { session_token, expires_at: clock::from_epoch_millis(exp) })
	}

	/// Resolves a bearer token using the current clock.
	pub fn get_session(&self, token: &str) -> Option<SessionData> {
		self.get_session_at(token, OffsetDateTime::now_utc())
	}

	/// Resolves a bearer token as of `now`; `None` when invalid, not a session, or expired.
	pub fn get_session_at(&self, token: &str, now: OffsetDateTime) -> Option<SessionData> {
		let claims = match self.authority.verify::<Claims>(token)? {
			Claims::Session(claims) => claims,
			Claims::OAuthState(_) => return None,
		};

		if claims.exp <= clock::epoch_millis(now) {
			return None;
		}

		Some(SessionData {
			tenant_id: claims.tenant_id,
			created_at: clock::from_epoch_millis(claims.iat),
			expires_at: clock::from_epoch_millis(claims.exp),
		})
	}
}

fn random_jti() -> String {
	let mut bytes = [0_u8; JTI_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}
