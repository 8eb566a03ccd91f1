//! Gateway configuration assembled from environment-style settings.

// std
use std::{env, path::PathBuf};
// self
use crate::{
	_prelude::*,
	auth::SigningSecret,
	bootstrap::BootstrapExchange,
	error::ConfigError,
	oauth::OAuthStateIssuer,
	rate_limit::{FileRateLimiter, RateLimitPolicy},
	session::SessionStore,
};

/// Environment variable names read by [`GatewayConfig::from_env`].
pub mod keys {
	/// HMAC signing secret (required, at least 32 characters).
	pub const SIGNING_SECRET: &str = "GATEWAY_SIGNING_SECRET";
	/// Session lifetime in milliseconds.
	pub const SESSION_TTL_MS: &str = "GATEWAY_SESSION_TTL_MS";
	/// OAuth state lifetime in milliseconds.
	pub const OAUTH_STATE_TTL_MS: &str = "GATEWAY_OAUTH_STATE_TTL_MS";
	/// Requests allowed per key per window.
	pub const RATE_LIMIT_MAX: &str = "GATEWAY_RATE_LIMIT_MAX";
	/// Rate-limit window in milliseconds.
	pub const RATE_LIMIT_WINDOW_MS: &str = "GATEWAY_RATE_LIMIT_WINDOW_MS";
	/// Rate-limit state file path.
	pub const RATE_LIMIT_FILE: &str = "GATEWAY_RATE_LIMIT_FILE";
	/// Rate-limit bucket capacity.
	pub const RATE_LIMIT_MAX_BUCKETS: &str = "GATEWAY_RATE_LIMIT_MAX_BUCKETS";
	/// Bootstrap code lifetime in milliseconds.
	pub const BOOTSTRAP_TTL_MS: &str = "GATEWAY_BOOTSTRAP_TTL_MS";
	/// Bootstrap entry capacity.
	pub const BOOTSTRAP_MAX_ENTRIES: &str = "GATEWAY_BOOTSTRAP_MAX_ENTRIES";
	/// Path that bypasses admission entirely.
	pub const HEALTH_PATH: &str = "GATEWAY_HEALTH_PATH";
}

/// Every tunable of the gateway core.
///
/// Lifetimes have no upper bound; expiry instants derived from them saturate at the end of
/// year 9999.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// HMAC key shared by sessions and OAuth state.
	pub signing_secret: SigningSecret,
	/// Session lifetime.
	pub session_ttl: Duration,
	/// OAuth state lifetime.
	pub oauth_state_ttl: Duration,
	/// Rate-limit window and capacity.
	pub rate_limit: RateLimitPolicy,
	/// Rate-limit state file.
	pub rate_limit_file: PathBuf,
	/// Bootstrap code lifetime.
	pub bootstrap_ttl: Duration,
	/// Bootstrap entry capacity.
	pub bootstrap_max_entries: usize,
	/// Path that bypasses admission.
	pub health_path: String,
}
impl GatewayConfig {
	/// Default requests per window.
	pub const DEFAULT_RATE_LIMIT_MAX: u64 = 120;
	/// Default rate-limit window.
	pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::minutes(1);
	/// Default health-check path.
	pub const DEFAULT_HEALTH_PATH: &str = "/health";

	/// Starts a builder seeded with defaults.
	pub fn builder(signing_secret: SigningSecret) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(signing_secret)
	}

	/// Reads settings from the process environment; fails fast on a missing or short secret.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Reads settings through `lookup`, treating blank values as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let secret = get(keys::SIGNING_SECRET).ok_or(ConfigError::MissingSecret)?;
		let mut builder = Self::builder(SigningSecret::new(secret)?);

		if let Some(ms) = parse_positive(keys::SESSION_TTL_MS, get(keys::SESSION_TTL_MS))? {
			builder = builder.session_ttl(millis(ms));
		}
		if let Some(ms) = parse_positive(keys::OAUTH_STATE_TTL_MS, get(keys::OAUTH_STATE_TTL_MS))? {
			builder = builder.oauth_state_ttl(millis(ms));
		}
		if let Some(max) = parse_positive(keys::RATE_LIMIT_MAX, get(keys::RATE_LIMIT_MAX))? {
			builder = builder.rate_limit_max(max);
		}
		if let Some(ms) =
			parse_positive(keys::RATE_LIMIT_WINDOW_MS, get(keys::RATE_LIMIT_WINDOW_MS))?
		{
			builder = builder.rate_limit_window(millis(ms));
		}
		if let Some(path) = get(keys::RATE_LIMIT_FILE) {
			builder = builder.rate_limit_file(path);
		}
		if let Some(cap) =
			parse_positive(keys::RATE_LIMIT_MAX_BUCKETS, get(keys::RATE_LIMIT_MAX_BUCKETS))?
		{
			builder = builder.rate_limit_max_buckets(to_usize(keys::RATE_LIMIT_MAX_BUCKETS, cap)?);
		}
		if let Some(ms) = parse_positive(keys::BOOTSTRAP_TTL_MS, get(keys::BOOTSTRAP_TTL_MS))? {
			builder = builder.bootstrap_ttl(millis(ms));
		}
		if let Some(cap) =
			parse_positive(keys::BOOTSTRAP_MAX_ENTRIES, get(keys::BOOTSTRAP_MAX_ENTRIES))?
		{
			builder = builder.bootstrap_max_entries(to_usize(keys::BOOTSTRAP_MAX_ENTRIES, cap)?);
		}
		if let Some(path) = get(keys::HEALTH_PATH) {
			builder = builder.health_path(path);
		}

		builder.build()
	}
}

/// Builder for [`GatewayConfig`].
#[derive(Clone, Debug)]
pub struct GatewayConfigBuilder {
	config: GatewayConfig,
}
impl GatewayConfigBuilder {
	fn new(signing_secret: SigningSecret) -> Self {
		Self {
			config: GatewayConfig {
				signing_secret,
				session_ttl: SessionStore::DEFAULT_TTL,
				oauth_state_ttl: OAuthStateIssuer::DEFAULT_TTL,
				rate_limit: RateLimitPolicy::new(
					GatewayConfig::DEFAULT_RATE_LIMIT_MAX,
					GatewayConfig::DEFAULT_RATE_LIMIT_WINDOW,
				),
				rate_limit_file: FileRateLimiter::default_path(),
				bootstrap_ttl: BootstrapExchange::DEFAULT_TTL,
				bootstrap_max_entries: BootstrapExchange::DEFAULT_MAX_ENTRIES,
				health_path: GatewayConfig::DEFAULT_HEALTH_PATH.into(),
			},
		}
	}

	/// Sets the session lifetime.
	pub fn session_ttl(mut self, ttl: Duration) -> Self {
		self.config.session_ttl = ttl;

		self
	}

	/// Sets the OAuth state lifetime.
	pub fn oauth_state_ttl(mut self, ttl: Duration) -> Self {
		self.config.oauth_state_ttl = ttl;

		self
	}

	/// Sets the requests allowed per window.
	pub fn rate_limit_max(mut self, max: u64) -> Self {
		self.config.rate_limit.max = max;

		self
	}

	/// Sets the rate-limit window.
	pub fn rate_limit_window(mut self, window: Duration) -> Self {
		self.config.rate_limit.window = window;

		self
	}

	/// Sets the rate-limit bucket capacity.
	pub fn rate_limit_max_buckets(mut self, max_buckets: usize) -> Self {
		self.config.rate_limit.max_buckets = max_buckets;

		self
	}

	/// Sets the rate-limit state file.
	pub fn rate_limit_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.config.rate_limit_file = path.into();

		self
	}

	/// Sets the bootstrap code lifetime.
	pub fn bootstrap_ttl(mut self, ttl: Duration) -> Self {
		self.config.bootstrap_ttl = ttl;

		self
	}

	/// Sets the bootstrap entry capacity.
	pub fn bootstrap_max_entries(mut self, max_entries: usize) -> Self {
		self.config.bootstrap_max_entries = max_entries;

		self
	}

	/// Sets the health-check path.
	pub fn health_path(mut self, path: impl Into<String>) -> Self {
		self.config.health_path = path.into();

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		let config = self.config;

		require_positive(keys::SESSION_TTL_MS, config.session_ttl)?;
		require_positive(keys::OAUTH_STATE_TTL_MS, config.oauth_state_ttl)?;
		require_positive(keys::RATE_LIMIT_WINDOW_MS, config.rate_limit.window)?;
		require_positive(keys::BOOTSTRAP_TTL_MS, config.bootstrap_ttl)?;

		if config.rate_limit.max == 0 {
			return Err(ConfigError::Zero { key: keys::RATE_LIMIT_MAX });
		}
		if config.rate_limit.max_buckets == 0 {
			return Err(ConfigError::Zero { key: keys::RATE_LIMIT_MAX_BUCKETS });
		}
		if config.bootstrap_max_entries == 0 {
			return Err(ConfigError::Zero { key: keys::BOOTSTRAP_MAX_ENTRIES });
		}

		Ok(config)
	}
}

fn parse_positive(key: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
	let Some(raw) = raw else {
		return Ok(None);
	};
	let value = raw
		.trim()
		.parse::<u64>()
		.map_err(|e| ConfigError::InvalidValue { key, reason: e.to_string() })?;

	if value == 0 {
		return Err(ConfigError::Zero { key });
	}

	Ok(Some(value))
}

fn to_usize(key: &'static str, value: u64) -> Result<usize, ConfigError> {
	usize::try_from(value).map_err(|e| ConfigError::InvalidValue { key, reason: e.to_string() })
}

fn millis(ms: u64) -> Duration {
	Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

fn require_positive(key: &'static str, duration: Duration) -> Result<(), ConfigError> {
	if duration.is_positive() { Ok(()) } else { Err(ConfigError::Zero { key }) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const SECRET: &str = "config-test-secret-0123456789abcdef";

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	#[test]
	fn defaults_apply_when_only_secret_is_set() {
		let config = GatewayConfig::from_lookup(lookup(&[(keys::SIGNING_SECRET, SECRET)]))
			.expect("Secret alone should be enough.");

		assert_eq!(config.session_ttl, Duration::hours(24));
		assert_eq!(config.oauth_state_ttl, Duration::minutes(10));
		assert_eq!(config.rate_limit.max_buckets, 50_000);
		assert_eq!(config.bootstrap_max_entries, 10_000);
		assert_eq!(config.health_path, "/health");
		assert!(config.rate_limit_file.ends_with("ig-gateway-rate-limit.json"));
	}

	#[test]
	fn missing_or_short_secret_fails_fast() {
		assert_eq!(
			GatewayConfig::from_lookup(lookup(&[])).expect_err("Missing secret should fail."),
			ConfigError::MissingSecret
		);
		assert_eq!(
			GatewayConfig::from_lookup(lookup(&[(keys::SIGNING_SECRET, "   ")]))
				.expect_err("Blank secret should fail."),
			ConfigError::MissingSecret
		);
		assert_eq!(
			GatewayConfig::from_lookup(lookup(&[(keys::SIGNING_SECRET, "short")]))
				.expect_err("Short secret should fail."),
			ConfigError::SecretTooShort { min: 32 }
		);
	}

	#[test]
	fn overrides_are_parsed() {
		let config = GatewayConfig::from_lookup(lookup(&[
			(keys::SIGNING_SECRET, SECRET),
			(keys::RATE_LIMIT_MAX, "2"),
			(keys::RATE_LIMIT_WINDOW_MS, "60000"),
			(keys::RATE_LIMIT_FILE, "/var/run/gw/rate.json"),
			(keys::BOOTSTRAP_TTL_MS, "1000"),
			(keys::HEALTH_PATH, "/healthz"),
		]))
		.expect("Overrides should parse.");

		assert_eq!(config.rate_limit, RateLimitPolicy::new(2, Duration::minutes(1)));
		assert_eq!(config.rate_limit_file, PathBuf::from("/var/run/gw/rate.json"));
		assert_eq!(config.bootstrap_ttl, Duration::seconds(1));
		assert_eq!(config.health_path, "/healthz");
	}

	#[test]
	fn bad_numbers_are_config_errors() {
		assert!(matches!(
			GatewayConfig::from_lookup(lookup(&[
				(keys::SIGNING_SECRET, SECRET),
				(keys::RATE_LIMIT_MAX, "many"),
			])),
			Err(ConfigError::InvalidValue { key: keys::RATE_LIMIT_MAX, .. })
		));
		assert_eq!(
			GatewayConfig::from_lookup(lookup(&[
				(keys::SIGNING_SECRET, SECRET),
				(keys::SESSION_TTL_MS, "0"),
			]))
			.expect_err("Zero TTL should fail."),
			ConfigError::Zero { key: keys::SESSION_TTL_MS }
		);
	}
}
