//! Secret wrappers that keep sensitive material out of logs.

// self
use crate::{_prelude::*, error::ConfigError};

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// HMAC signing key shared by every token-minting gate.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);
impl SigningSecret {
	/// Minimum accepted length in characters.
	pub const MIN_LEN: usize = 32;

	/// Validates and wraps a signing secret.
	pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
		let value = value.into();

		if value.is_empty() {
			return Err(ConfigError::MissingSecret);
		}
		if value.chars().count() < Self::MIN_LEN {
			return Err(ConfigError::SecretTooShort { min: Self::MIN_LEN });
		}

		Ok(Self(value))
	}

	/// Raw key bytes for the MAC.
	pub fn as_bytes(&self) -> &[u8] {
		self.0.as_bytes()
	}
}
impl Debug for SigningSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SigningSecret").field(&"<redacted>").finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(
			serde_json::to_string(&secret).expect("Token secret should serialize."),
			"\"super-secret\""
		);
	}

	#[test]
	fn signing_secret_enforces_minimum_length() {
		assert_eq!(SigningSecret::new(""), Err(ConfigError::MissingSecret));
		assert_eq!(
			SigningSecret::new("x".repeat(31)),
			Err(ConfigError::SecretTooShort { min: SigningSecret::MIN_LEN })
		);

		let secret =
			SigningSecret::new("x".repeat(32)).expect("32-character secret should be accepted.");

		assert_eq!(format!("{secret:?}"), "SigningSecret(\"<redacted>\")");
	}
}
