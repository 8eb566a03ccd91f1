//! Gateway-level error types and the JSON error envelope returned to clients.

// self
use crate::{_prelude::*, auth::IdentifierError, bootstrap::BootstrapCodeError};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal at startup.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Rate limiter backing store is unavailable; the request is failed closed.
	#[error("Rate limiter is unavailable.")]
	RateLimiter(
		#[from]
		#[source]
		crate::rate_limit::RateLimitError,
	),
	/// Request payload failed validation.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Missing, invalid, or expired bearer token or OAuth state.
	#[error("Authentication required: {reason}.")]
	AuthRequired {
		/// Human-readable rejection reason.
		reason: String,
	},
	/// Caller exceeded the fixed-window budget for its key.
	#[error("Too many requests; retry after {retry_after_seconds} seconds.")]
	RateLimited {
		/// Whole seconds until the window resets (at least 1).
		retry_after_seconds: u64,
	},
}
impl Error {
	/// Builds an [`Error::AuthRequired`] with the given reason.
	pub fn auth_required(reason: impl Into<String>) -> Self {
		Self::AuthRequired { reason: reason.into() }
	}

	/// Maps the error onto the wire taxonomy.
	pub fn code(&self) -> ErrorCode {
		match self {
			Error::Config(_) => ErrorCode::ConfigError,
			Error::RateLimiter(_) => ErrorCode::ProviderError,
			Error::Validation(_) => ErrorCode::ValidationError,
			Error::AuthRequired { .. } => ErrorCode::AuthRequired,
			Error::RateLimited { .. } => ErrorCode::RateLimited,
		}
	}

	/// Renders the JSON envelope sent back to the client.
	pub fn to_body(&self) -> ErrorBody {
		let details = match self {
			Error::RateLimited { retry_after_seconds } =>
				Some(ErrorDetails { retry_after_seconds: *retry_after_seconds }),
			_ => None,
		};

		ErrorBody {
			ok: false,
			error: ErrorPayload { code: self.code(), message: self.to_string(), details },
		}
	}
}

/// Configuration failures raised while assembling the gateway.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// The signing secret was not supplied.
	#[error("Signing secret is missing.")]
	MissingSecret,
	/// The signing secret is shorter than the minimum length.
	#[error("Signing secret must be at least {min} characters.")]
	SecretTooShort {
		/// Minimum accepted character count.
		min: usize,
	},
	/// A setting could not be parsed.
	#[error("Setting `{key}` has an invalid value: {reason}.")]
	InvalidValue {
		/// Setting name.
		key: &'static str,
		/// Parser-supplied reason.
		reason: String,
	},
	/// A duration or capacity setting was zero.
	#[error("Setting `{key}` must be greater than zero.")]
	Zero {
		/// Setting name.
		key: &'static str,
	},
}

/// Malformed client input.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
	/// Bootstrap code is not well formed.
	#[error(transparent)]
	BootstrapCode(#[from] BootstrapCodeError),
	/// Claims payload could not be serialized.
	#[error("Claims payload is malformed: {message}.")]
	Claims {
		/// Serializer-supplied message.
		message: String,
	},
}
impl From<IdentifierError> for Error {
	fn from(e: IdentifierError) -> Self {
		Self::Validation(e.into())
	}
}
impl From<BootstrapCodeError> for Error {
	fn from(e: BootstrapCodeError) -> Self {
		Self::Validation(e.into())
	}
}

/// Stable error codes of the client-facing taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// 401.
	AuthRequired,
	/// 400.
	ValidationError,
	/// 429.
	RateLimited,
	/// 503, fatal at startup.
	ConfigError,
	/// 503.
	ProviderError,
}
impl ErrorCode {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorCode::AuthRequired => "AUTH_REQUIRED",
			ErrorCode::ValidationError => "VALIDATION_ERROR",
			ErrorCode::RateLimited => "RATE_LIMITED",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::ProviderError => "PROVIDER_ERROR",
		}
	}

	/// Returns the HTTP status code the host should respond with.
	pub const fn http_status(self) -> u16 {
		match self {
			ErrorCode::AuthRequired => 401,
			ErrorCode::ValidationError => 400,
			ErrorCode::RateLimited => 429,
			ErrorCode::ConfigError | ErrorCode::ProviderError => 503,
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// `{ok:false, error:{...}}` envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Always `false`.
	pub ok: bool,
	/// Error payload.
	pub error: ErrorPayload,
}
impl ErrorBody {
	/// HTTP status matching the payload code.
	pub fn status(&self) -> u16 {
		self.error.code.http_status()
	}
}

/// Error payload inside [`ErrorBody`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Taxonomy code.
	pub code: ErrorCode,
	/// Human-readable message.
	pub message: String,
	/// Extra machine-readable details.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<ErrorDetails>,
}

/// Details attached to `RATE_LIMITED` responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
	/// Whole seconds until the client may retry.
	pub retry_after_seconds: u64,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::rate_limit::RateLimitError;

	#[test]
	fn rate_limited_body_carries_retry_hint() {
		let body = Error::RateLimited { retry_after_seconds: 12 }.to_body();
		let json = serde_json::to_value(&body).expect("Error body should serialize to JSON.");

		assert_eq!(body.status(), 429);
		assert_eq!(json["ok"], false);
		assert_eq!(json["error"]["code"], "RATE_LIMITED");
		assert_eq!(json["error"]["details"]["retry_after_seconds"], 12);
	}

	#[test]
	fn auth_body_omits_details() {
		let body = Error::auth_required("missing bearer token").to_body();
		let json = serde_json::to_value(&body).expect("Error body should serialize to JSON.");

		assert_eq!(body.status(), 401);
		assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
		assert!(json["error"].get("details").is_none());
	}

	#[test]
	fn limiter_failure_is_a_provider_error_with_source() {
		let error: Error = RateLimitError::LockTimeout { attempts: 200 }.into();

		assert_eq!(error.code(), ErrorCode::ProviderError);
		assert_eq!(error.code().http_status(), 503);
		assert!(std::error::Error::source(&error).is_some());
	}

	#[test]
	fn config_errors_map_to_config_code() {
		let error: Error = ConfigError::SecretTooShort { min: 32 }.into();

		assert_eq!(error.code().as_str(), "CONFIG_ERROR");
		assert!(error.to_string().contains("32"));
	}
}
