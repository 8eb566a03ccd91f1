//! Cross-process [`RateLimiter`] persisting every bucket in one JSON file.

// std
use std::{
	env,
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	process,
};
// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	rate_limit::{
		LockOptions, RateLimitDecision, RateLimitError, RateLimitFuture, RateLimitPolicy,
		RateLimitState, RateLimiter, lock::LockFile,
	},
};

/// File name used under the OS temp directory when no path is configured.
pub const DEFAULT_STATE_FILE: &str = "ig-gateway-rate-limit.json";

/// Fixed-window limiter shared by every process pointing at the same state file.
///
/// Each check takes the lock, rewrites the whole file, and releases the lock, so throughput is
/// bounded by the number of live buckets.
#[derive(Clone, Debug)]
pub struct FileRateLimiter {
	path: PathBuf,
	lock_path: PathBuf,
	policy: RateLimitPolicy,
	lock_options: LockOptions,
}
impl FileRateLimiter {
	/// Creates a limiter backed by `path`; the lock lives beside it as `<path>.lock`.
	pub fn new(path: impl Into<PathBuf>, policy: RateLimitPolicy) -> Self {
		let path = path.into();
		let mut lock_path = path.clone().into_os_string();

		lock_path.push(".lock");

		Self { path, lock_path: lock_path.into(), policy, lock_options: LockOptions::default() }
	}

	/// Default state file location.
	pub fn default_path() -> PathBuf {
		env::temp_dir().join(DEFAULT_STATE_FILE)
	}

	/// Overrides the lock acquisition budget.
	pub fn with_lock_options(mut self, options: LockOptions) -> Self {
		self.lock_options = options;

		self
	}

	/// State file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Active policy.
	pub fn policy(&self) -> &RateLimitPolicy {
		&self.policy
	}

	fn check_now(
		&self,
		key: &str,
		now: OffsetDateTime,
	) -> Result<RateLimitDecision, RateLimitError> {
		ensure_parent_exists(&self.path)?;

		let _lock = LockFile::acquire(&self.lock_path, &self.lock_options)?;
		let mut state = self.load_state()?;
		let decision = state.admit(key, &self.policy, now);

		self.persist(&state)?;

		Ok(decision)
	}

	fn load_state(&self) -> Result<RateLimitState, RateLimitError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RateLimitState::default()),
			Err(e) =>
				return Err(RateLimitError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.is_empty() {
			return Ok(RateLimitState::default());
		}

		match serde_json::from_slice(&bytes) {
			Ok(state) => Ok(state),
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					path = %self.path.display(),
					error = %e,
					"Discarding malformed rate-limit state."
				);

				let _ = e;

				Ok(RateLimitState::default())
			},
		}
	}

	fn persist(&self, state: &RateLimitState) -> Result<(), RateLimitError> {
		let serialized = serde_json::to_vec(state).map_err(|e| RateLimitError::Backend {
			message: format!("Failed to serialize rate-limit state: {e}"),
		})?;
		let tmp_path = self.unique_tmp_path();
		let written = write_synced(&tmp_path, &serialized)
			.and_then(|()| fs::rename(&tmp_path, &self.path));

		if let Err(e) = written {
			let _ = fs::remove_file(&tmp_path);

			return Err(RateLimitError::Backend {
				message: format!("Failed to replace {}: {e}", self.path.display()),
			});
		}

		Ok(())
	}

	// Same directory as the target so the rename stays on one filesystem.
	fn unique_tmp_path(&self) -> PathBuf {
		let file_name = self
			.path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| DEFAULT_STATE_FILE.to_owned());
		let suffix: u32 = rand::rng().random();

		self.path.with_file_name(format!(
			"{file_name}.{}.{}.{suffix:08x}.tmp",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}
}
impl RateLimiter for FileRateLimiter {
	fn check_at<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> RateLimitFuture<'a> {
		Box::pin(async move { self.check_now(key, now) })
	}
}

fn ensure_parent_exists(path: &Path) -> Result<(), RateLimitError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| RateLimitError::Backend {
			message: format!("Failed to create state directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
	let mut file = File::create(path)?;

	file.write_all(bytes)?;
	file.sync_all()
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// crates.io
	use tempfile::TempDir;
	use time::macros::datetime;
	// self
	use super::*;

	fn limiter(dir: &TempDir) -> FileRateLimiter {
		FileRateLimiter::new(
			dir.path().join("nested").join("rate.json"),
			RateLimitPolicy::new(2, Duration::seconds(60)),
		)
	}

	#[tokio::test]
	async fn counts_persist_across_instances() {
		let dir = TempDir::new().expect("Temporary directory should be created.");
		let now = datetime!(2025-11-10 12:00 UTC);
		let first = limiter(&dir);
		let second = limiter(&dir);

		assert!(first.check_at("ip:1", now).await.expect("Check should succeed.").is_allowed());
		assert!(second.check_at("ip:1", now).await.expect("Check should succeed.").is_allowed());

		let third = first.check_at("ip:1", now).await.expect("Check should succeed.");

		assert_eq!(third.retry_after_seconds(), Some(60));
		assert!(!dir.path().join("nested").join("rate.json.lock").exists(), "Lock released.");
	}

	#[tokio::test]
	async fn malformed_state_is_treated_as_empty() {
		let dir = TempDir::new().expect("Temporary directory should be created.");
		let limiter = limiter(&dir);

		fs::create_dir_all(dir.path().join("nested")).expect("State directory should exist.");
		fs::write(limiter.path(), b"{not json").expect("Corrupt fixture should be written.");

		let decision = limiter.check("ip:1").await.expect("Corrupt state must not be fatal.");

		assert!(decision.is_allowed());

		let state: RateLimitState = serde_json::from_slice(
			&fs::read(limiter.path()).expect("State file should be rewritten."),
		)
		.expect("Rewritten state should parse.");

		assert_eq!(state.get("ip:1").map(|bucket| bucket.count), Some(1));
	}

	#[tokio::test]
	async fn held_lock_fails_closed() {
		let dir = TempDir::new().expect("Temporary directory should be created.");
		let limiter = limiter(&dir).with_lock_options(LockOptions {
			retry_delay: StdDuration::from_millis(1),
			max_attempts: 3,
			stale_after: None,
		});

		fs::create_dir_all(dir.path().join("nested")).expect("State directory should exist.");
		fs::write(dir.path().join("nested").join("rate.json.lock"), b"1")
			.expect("Foreign lock should be written.");

		assert_eq!(
			limiter.check("ip:1").await.expect_err("Held lock should fail the check."),
			RateLimitError::LockTimeout { attempts: 3 }
		);
	}

	#[test]
	fn no_temp_files_are_left_behind() {
		let dir = TempDir::new().expect("Temporary directory should be created.");
		let limiter = limiter(&dir);

		for _ in 0..5 {
			limiter
				.check_now("ip:1", OffsetDateTime::now_utc())
				.expect("Check should succeed.");
		}

		let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
			.expect("State directory should be readable.")
			.filter_map(|entry| entry.ok())
			.map(|entry| entry.file_name().to_string_lossy().into_owned())
			.collect();

		assert_eq!(leftovers, vec!["rate.json".to_owned()]);
	}
}
