//! Claim sets minted by the gateway, discriminated by their `typ` field.

// self
use crate::{_prelude::*, auth::TenantId};

/// Every claim set the gateway signs.
///
/// Verifying callers deserialize into this union and match exhaustively, so a state token can
/// never be replayed as a session (or the reverse) even though both share one signing key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ")]
pub enum Claims {
	/// Bearer session.
	#[serde(rename = "session")]
	Session(SessionClaims),
	/// CSRF state threaded through the OAuth redirect.
	#[serde(rename = "oauth-state")]
	OAuthState(OAuthStateClaims),
}
impl Claims {
	/// Wire value of the `typ` discriminator.
	pub const fn typ(&self) -> &'static str {
		match self {
			Claims::Session(_) => "session",
			Claims::OAuthState(_) => "oauth-state",
		}
	}

	/// Expiry in epoch milliseconds.
	pub const fn exp(&self) -> i64 {
		match self {
			Claims::Session(c) => c.exp,
			Claims::OAuthState(c) => c.exp,
		}
	}
}

/// Claims carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
	/// Tenant the session authenticates.
	pub tenant_id: TenantId,
	/// Issued-at, epoch milliseconds.
	pub iat: i64,
	/// Expiry, epoch milliseconds.
	pub exp: i64,
	/// Random token identifier.
	pub jti: String,
}

/// Claims carried by an OAuth state token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthStateClaims {
	/// Issued-at, epoch milliseconds.
	pub iat: i64,
	/// Expiry, epoch milliseconds.
	pub exp: i64,
	/// Random entropy; not tracked server-side.
	pub nonce: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn session_claims_use_wire_field_names() {
		let claims = Claims::Session(SessionClaims {
			tenant_id: TenantId::new("tenant-1").expect("Tenant fixture should be valid."),
			iat: 1,
			exp: 2,
			jti: "abc".into(),
		});
		let json = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(json["typ"], "session");
		assert_eq!(json["tenantId"], "tenant-1");
		assert_eq!(claims.typ(), "session");
		assert_eq!(claims.exp(), 2);
	}

	#[test]
	fn typ_discriminates_on_parse() {
		let state: Claims =
			serde_json::from_str(r#"{"typ":"oauth-state","iat":1,"exp":5,"nonce":"n"}"#)
				.expect("State claims should parse.");

		assert!(matches!(state, Claims::OAuthState(OAuthStateClaims { exp: 5, .. })));
		assert!(serde_json::from_str::<Claims>(r#"{"typ":"other","iat":1,"exp":5}"#).is_err());
		assert!(
			serde_json::from_str::<Claims>(
				r#"{"typ":"session","tenantId":7,"iat":1,"exp":5,"jti":"j"}"#
			)
			.is_err(),
			"Non-string tenant must be rejected."
		);
		assert!(
			serde_json::from_str::<Claims>(
				r#"{"typ":"session","tenantId":"t","iat":1.5,"exp":5,"jti":"j"}"#
			)
			.is_err(),
			"Fractional timestamps must be rejected."
		);
	}
}
