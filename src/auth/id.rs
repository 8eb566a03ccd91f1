//! Validated identifiers for tenants and the Instagram assets bound to them.
//!
//! Tenants are slugs chosen by the operator. Instagram accounts and Facebook pages are Graph API
//! object ids, which are decimal digit strings.

// self
use crate::_prelude::*;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, account, page).
		kind: &'static str,
	},
	/// The identifier is longer than its kind permits.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, account, page).
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
	/// The identifier contains a character its kind does not allow.
	#[error("{kind} identifier contains invalid character {found:?}.")]
	InvalidCharacter {
		/// Kind of identifier (tenant, account, page).
		kind: &'static str,
		/// First offending character.
		found: char,
	},
}

struct IdRule {
	kind: &'static str,
	max_len: usize,
	allows: fn(char) -> bool,
}
impl IdRule {
	fn check(&self, value: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if let Some(found) = value.chars().find(|c| !(self.allows)(*c)) {
			return Err(IdentifierError::InvalidCharacter { kind, found });
		}
		// Every allowed character is ASCII, so bytes equal characters here.
		if value.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

const TENANT: IdRule = IdRule { kind: "Tenant", max_len: 64, allows: is_slug_char };
const IG_ACCOUNT: IdRule = IdRule { kind: "IgAccount", max_len: 32, allows: is_graph_char };
const PAGE: IdRule = IdRule { kind: "Page", max_len: 32, allows: is_graph_char };

fn is_slug_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn is_graph_char(c: char) -> bool {
	c.is_ascii_digit()
}

macro_rules! def_id {
	($(#[$meta:meta])* $name:ident => $rule:ident) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				$rule.check(&value)?;

				Ok(Self(value))
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $rule.kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

def_id! {
	/// Tenant a session or bootstrap entry is scoped to; ASCII letters, digits, `-`, `_`, `.`.
	TenantId => TENANT
}
def_id! {
	/// Instagram professional account id as returned by the Graph API.
	IgAccountId => IG_ACCOUNT
}
def_id! {
	/// Facebook page id the Instagram account is linked through.
	PageId => PAGE
}
