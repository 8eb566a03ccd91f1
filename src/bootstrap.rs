//! Single-use bootstrap codes handed to the CLI after the OAuth callback completes.
//!
//! Entries live in process memory only. A deployment that routes the callback and the later
//! exchange to different instances loses the entry, so scaling out needs a shared store first.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	auth::{IgAccountId, PageId, TenantId, TokenSecret},
	clock,
};

/// Prefix of every bootstrap code.
pub const CODE_PREFIX: &str = "IGB-";
/// Random characters after the prefix.
pub const CODE_BODY_LEN: usize = 10;

// No 0/O or 1/I.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Error returned when a bootstrap code is malformed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BootstrapCodeError {
	/// Code does not start with [`CODE_PREFIX`].
	#[error("Bootstrap code must start with `{CODE_PREFIX}`.")]
	MissingPrefix,
	/// Code body has the wrong length.
	#[error("Bootstrap code must have {expected} characters after the prefix.")]
	InvalidLength {
		/// Required body length.
		expected: usize,
	},
	/// Code body contains a character outside the alphabet.
	#[error("Bootstrap code contains invalid character `{found}`.")]
	InvalidCharacter {
		/// Offending character.
		found: char,
	},
}

/// Well-formed `IGB-XXXXXXXXXX` code.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BootstrapCode(String);
impl BootstrapCode {
	/// Parses and validates a code.
	pub fn parse(value: impl AsRef<str>) -> Result<Self, BootstrapCodeError> {
		let value = value.as_ref();
		let body = value.strip_prefix(CODE_PREFIX).ok_or(BootstrapCodeError::MissingPrefix)?;

		if let Some(found) =
			body.chars().find(|c| !c.is_ascii() || !CODE_ALPHABET.contains(&(*c as u8)))
		{
			return Err(BootstrapCodeError::InvalidCharacter { found });
		}
		if body.len() != CODE_BODY_LEN {
			return Err(BootstrapCodeError::InvalidLength { expected: CODE_BODY_LEN });
		}

		Ok(Self(value.to_owned()))
	}

	fn generate() -> Self {
		let mut rng = rand::rng();
		let body: String = (0..CODE_BODY_LEN)
			.map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
			.collect();

		Self(format!("{CODE_PREFIX}{body}"))
	}

	/// Code as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for BootstrapCode {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<BootstrapCode> for String {
	fn from(value: BootstrapCode) -> Self {
		value.0
	}
}
impl TryFrom<String> for BootstrapCode {
	type Error = BootstrapCodeError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
impl FromStr for BootstrapCode {
	type Err = BootstrapCodeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Debug for BootstrapCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BootstrapCode").field(&"<redacted>").finish()
	}
}
impl Display for BootstrapCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Account binding produced by a completed OAuth callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapData {
	/// Tenant the binding belongs to.
	pub tenant_id: TenantId,
	/// Instagram business account.
	pub ig_account_id: IgAccountId,
	/// Instagram handle, when the provider returned one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ig_username: Option<String>,
	/// Facebook page linked to the account.
	pub page_id: PageId,
	/// Page display name.
	pub page_name: String,
	/// Long-lived page access token.
	pub page_access_token: TokenSecret,
}

/// Code returned from [`BootstrapExchange::issue`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedBootstrap {
	/// Single-use code.
	pub bootstrap_code: BootstrapCode,
	/// Instant after which the code no longer redeems.
	pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
struct BootstrapEntry {
	data: BootstrapData,
	issued_at: OffsetDateTime,
	expires_at: OffsetDateTime,
	// Breaks `issued_at` ties so eviction is strictly oldest-issued first.
	sequence: u64,
}
impl BootstrapEntry {
	fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at <= now
	}
}

type EntryMap = Arc<Mutex<HashMap<BootstrapCode, BootstrapEntry>>>;

/// In-memory, TTL-bound, single-use code store.
#[derive(Clone, Debug)]
pub struct BootstrapExchange {
	ttl: Duration,
	max_entries: usize,
	entries: EntryMap,
	sequence: Arc<AtomicU64>,
}
impl BootstrapExchange {
	/// Default code lifetime.
	pub const DEFAULT_TTL: Duration = Duration::minutes(5);
	/// Default live-entry capacity.
	pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

	/// Creates an empty exchange.
	pub fn new(ttl: Duration, max_entries: usize) -> Self {
		Self {
			ttl,
			max_entries: max_entries.max(1),
			entries: Default::default(),
			sequence: Default::default(),
		}
	}

	/// Number of stored entries, expired ones included until the next access prunes them.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Issues a code for `data` using the current clock.
	pub fn issue(&self, data: BootstrapData) -> IssuedBootstrap {
		self.issue_at(data, OffsetDateTime::now_utc())
	}

	/// Issues a code for `data` as of `now`.
	pub fn issue_at(&self, data: BootstrapData, now: OffsetDateTime) -> IssuedBootstrap {
		let mut entries = self.entries.lock();

		prune(&mut entries, now);

		let code = loop {
			let candidate = BootstrapCode::generate();

			if !entries.contains_key(&candidate) {
				break candidate;
			}
		};
		let expires_at = clock::saturating_add(now, self.ttl);
		let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

		entries.insert(code.clone(), BootstrapEntry { data, issued_at: now, expires_at, sequence });
		evict_over(&mut entries, self.max_entries);

		IssuedBootstrap { bootstrap_code: code, expires_at }
	}

	/// Redeems `code` using the current clock.
	pub fn consume(&self, code: &BootstrapCode) -> Option<BootstrapData> {
		self.consume_at(code, OffsetDateTime::now_utc())
	}

	/// Redeems `code` as of `now`.
	///
	/// The entry is deleted on the first lookup whether or not it is still valid, so a probe
	/// cannot tell a never-issued code from an expired one.
	pub fn consume_at(&self, code: &BootstrapCode, now: OffsetDateTime) -> Option<BootstrapData> {
		let mut entries = self.entries.lock();

		prune(&mut entries, now);

		let entry = entries.remove(code)?;

		if entry.is_expired_at(now) { None } else { Some(entry.data) }
	}

	/// Parses `raw` and redeems it; malformed codes are validation errors.
	pub fn redeem(&self, raw: &str) -> Result<Option<BootstrapData>> {
		let code = BootstrapCode::parse(raw)?;

		Ok(self.consume(&code))
	}
}
impl Default for BootstrapExchange {
	fn default() -> Self {
		Self::new(Self::DEFAULT_TTL, Self::DEFAULT_MAX_ENTRIES)
	}
}

fn prune(entries: &mut HashMap<BootstrapCode, BootstrapEntry>, now: OffsetDateTime) {
	entries.retain(|_, entry| !entry.is_expired_at(now));
}

fn evict_over(entries: &mut HashMap<BootstrapCode, BootstrapEntry>, max_entries: usize) {
	let len = entries.len();

	if len <= max_entries {
		return;
	}

	let evict = len.div_ceil(10).max(len - max_entries);
	let mut by_age: Vec<_> = entries
		.iter()
		.map(|(code, entry)| (entry.issued_at, entry.sequence, code.clone()))
		.collect();

	by_age.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

	for (_, _, code) in by_age.into_iter().take(evict) {
		entries.remove(&code);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn data() -> BootstrapData {
		BootstrapData {
			tenant_id: TenantId::new("tenant-1").expect("Tenant fixture should be valid."),
			ig_account_id: IgAccountId::new("17841400000000000")
				.expect("Account fixture should be valid."),
			ig_username: Some("acme.shop".into()),
			page_id: PageId::new("100000000000001").expect("Page fixture should be valid."),
			page_name: "Acme Shop".into(),
			page_access_token: TokenSecret::new("EAAB-page-token"),
		}
	}

	#[test]
	fn generated_codes_match_wire_format() {
		for _ in 0..100 {
			let code = BootstrapCode::generate();
			let body = code.as_str().strip_prefix(CODE_PREFIX).expect("Prefix should be present.");

			assert_eq!(body.len(), CODE_BODY_LEN);
			assert!(body.chars().all(|c| c.is_ascii_uppercase() || ('2'..='9').contains(&c)));
			assert!(!body.contains(&['0', '1', 'I', 'O'][..]));
			assert_eq!(BootstrapCode::parse(code.as_str()), Ok(code));
		}
	}

	#[test]
	fn malformed_codes_are_rejected() {
		assert_eq!(BootstrapCode::parse("ABC-2345678923"), Err(BootstrapCodeError::MissingPrefix));
		assert_eq!(
			BootstrapCode::parse("IGB-23456"),
			Err(BootstrapCodeError::InvalidLength { expected: CODE_BODY_LEN })
		);
		assert_eq!(
			BootstrapCode::parse("IGB-ABCDEFGH1J"),
			Err(BootstrapCodeError::InvalidCharacter { found: '1' })
		);
		assert_eq!(
			BootstrapCode::parse("IGB-abcdefghjk"),
			Err(BootstrapCodeError::InvalidCharacter { found: 'a' })
		);
	}

	#[test]
	fn code_is_single_use() {
		let exchange = BootstrapExchange::default();
		let issued = exchange.issue(data());

		assert_eq!(exchange.consume(&issued.bootstrap_code), Some(data()));
		assert_eq!(exchange.consume(&issued.bootstrap_code), None);
	}

	#[test]
	fn expired_code_is_absent_and_deleted() {
		let exchange = BootstrapExchange::new(Duration::seconds(1), 10);
		let now = datetime!(2025-11-10 12:00 UTC);
		let issued = exchange.issue_at(data(), now);
		let later = now + Duration::milliseconds(1_001);

		assert_eq!(issued.expires_at, now + Duration::seconds(1));
		assert_eq!(exchange.consume_at(&issued.bootstrap_code, later), None);
		assert_eq!(exchange.consume_at(&issued.bootstrap_code, now), None);
		assert!(exchange.is_empty());
	}

	#[test]
	fn oversized_ttl_saturates_instead_of_overflowing() {
		let exchange = BootstrapExchange::new(Duration::milliseconds(i64::MAX), 10);
		let now = datetime!(2025-11-10 12:00 UTC);
		let issued = exchange.issue_at(data(), now);

		assert_eq!(issued.expires_at.year(), 9999);
		assert!(exchange.consume_at(&issued.bootstrap_code, now).is_some());
	}

	#[test]
	fn capacity_evicts_oldest_issued() {
		let exchange = BootstrapExchange::new(Duration::minutes(5), 10);
		let now = datetime!(2025-11-10 12:00 UTC);
		let mut codes = Vec::new();

		for _ in 0..25 {
			codes.push(exchange.issue_at(data(), now).bootstrap_code);

			assert!(exchange.len() <= 10);
		}

		assert!(exchange.consume_at(&codes[0], now).is_none());
		assert!(exchange.consume_at(&codes[24], now).is_some());
	}

	#[test]
	fn redeem_validates_before_lookup() {
		let exchange = BootstrapExchange::default();

		assert!(matches!(exchange.redeem("nope"), Err(Error::Validation(_))));
		assert_eq!(
			exchange.redeem("IGB-ABCDEFGHJK").expect("Well-formed code should parse."),
			None
		);
	}
}
