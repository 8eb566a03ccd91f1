//! Stateless HMAC-SHA256 token authority.
//!
//! A token is `base64url(JSON(claims)) + "." + base64url(HMAC-SHA256(claims-segment, secret))`.
//! The authority proves integrity only; expiry and claim-type policy belong to the callers
//! ([`SessionStore`](crate::session::SessionStore) and
//! [`OAuthStateIssuer`](crate::oauth::OAuthStateIssuer)).

pub mod claims;

pub use claims::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::SigningSecret,
	error::{ConfigError, ValidationError},
};

type HmacSha256 = Hmac<Sha256>;

/// Separator between the claims and signature segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Signs and verifies claim sets with one shared secret.
#[derive(Clone)]
pub struct TokenAuthority {
	mac: HmacSha256,
}
impl TokenAuthority {
	/// Prepares a MAC keyed with the provided secret.
	pub fn new(secret: &SigningSecret) -> Result<Self, ConfigError> {
		let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
			ConfigError::InvalidValue { key: "signing_secret", reason: e.to_string() }
		})?;

		Ok(Self { mac })
	}

	/// Serializes and signs `claims`.
	pub fn sign<C>(&self, claims: &C) -> Result<String>
	where
		C: ?Sized + Serialize,
	{
		let payload = serde_json::to_vec(claims)
			.map_err(|e| ValidationError::Claims { message: e.to_string() })?;
		let claims_segment = URL_SAFE_NO_PAD.encode(payload);
		let mut mac = self.mac.clone();

		mac.update(claims_segment.as_bytes());

		let signature_segment = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

		Ok(format!("{claims_segment}{SEGMENT_SEPARATOR}{signature_segment}"))
	}

	/// Verifies `token` and parses its claims.
	///
	/// Returns `None` for anything other than a well-formed, correctly signed token whose
	/// payload parses as `C`. Timestamps are not interpreted.
	pub fn verify<C>(&self, token: &str) -> Option<C>
	where
		C: DeserializeOwned,
	{
		let mut segments = token.split(SEGMENT_SEPARATOR);
		let (Some(claims_segment), Some(signature_segment), None) =
			(segments.next(), segments.next(), segments.next())
		else {
			return None;
		};
		let signature = URL_SAFE_NO_PAD.decode(signature_segment).ok()?;
		let mut mac = self.mac.clone();

		mac.update(claims_segment.as_bytes());
		// Constant-time comparison.
		mac.verify_slice(&signature).ok()?;

		let payload = URL_SAFE_NO_PAD.decode(claims_segment).ok()?;

		serde_json::from_slice(&payload).ok()
	}
}
impl Debug for TokenAuthority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenAuthority(..)")
	}
}

/// One-shot [`TokenAuthority::sign`].
pub fn sign<C>(claims: &C, secret: &SigningSecret) -> Result<String>
where
	C: ?Sized + Serialize,
{
	TokenAuthority::new(secret)?.sign(claims)
}

/// One-shot [`TokenAuthority::verify`].
pub fn verify<C>(token: &str, secret: &SigningSecret) -> Option<C>
where
	C: DeserializeOwned,
{
	TokenAuthority::new(secret).ok()?.verify(token)
}
