//! Gateway security core for the Instagram automation API: HMAC-signed session and OAuth
//! state tokens, a cross-process fixed-window rate limiter, single-use bootstrap codes, and
//! the admission pipeline that gates every inbound request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod admission;
pub mod auth;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod session;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::path::Path;
	// self
	use crate::{
		auth::{IgAccountId, PageId, SigningSecret, TenantId, TokenSecret},
		bootstrap::BootstrapData,
		config::GatewayConfig,
		token::TokenAuthority,
	};

	/// Secret shared by every test fixture.
	pub const TEST_SECRET: &str = "integration-test-signing-secret-0123456789";

	/// Builds the fixture signing secret.
	pub fn test_secret() -> SigningSecret {
		SigningSecret::new(TEST_SECRET).expect("Fixture signing secret should be valid.")
	}

	/// Builds a token authority keyed with [`TEST_SECRET`].
	pub fn test_authority() -> TokenAuthority {
		TokenAuthority::new(&test_secret()).expect("Fixture token authority should build.")
	}

	/// Configuration with a `max`-per-minute limiter whose state lives under `dir`.
	pub fn test_config(dir: &Path, max: u64) -> GatewayConfig {
		GatewayConfig::builder(test_secret())
			.rate_limit_max(max)
			.rate_limit_window(Duration::minutes(1))
			.rate_limit_file(dir.join("rate-limit.json"))
			.build()
			.expect("Fixture gateway config should be valid.")
	}

	/// Bootstrap payload for `tenant`.
	pub fn test_bootstrap_data(tenant: &str) -> BootstrapData {
		BootstrapData {
			tenant_id: TenantId::new(tenant).expect("Fixture tenant should be valid."),
			ig_account_id: IgAccountId::new("17841400000000001")
				.expect("Fixture account should be valid."),
			ig_username: None,
			page_id: PageId::new("100000000000002").expect("Fixture page should be valid."),
			page_name: "Fixture Page".into(),
			page_access_token: TokenSecret::new("EAAB-fixture-page-token"),
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use color_eyre as _;
