//! Advisory exclusive-create lock file guarding the shared rate-limit state.

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	process, thread,
	time::{Duration as StdDuration, SystemTime},
};
// self
use crate::rate_limit::RateLimitError;

/// Acquisition budget for the rate-limit lock file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockOptions {
	/// Pause between attempts while another process holds the lock.
	pub retry_delay: StdDuration,
	/// Attempts before the check fails with [`RateLimitError::LockTimeout`].
	pub max_attempts: u32,
	/// Age after which an abandoned lock file is removed; `None` never reclaims.
	pub stale_after: Option<StdDuration>,
}
impl Default for LockOptions {
	fn default() -> Self {
		Self {
			retry_delay: StdDuration::from_millis(10),
			max_attempts: 200,
			stale_after: Some(StdDuration::from_secs(30)),
		}
	}
}

/// Held lock; the lock file is removed on drop.
#[derive(Debug)]
pub(crate) struct LockFile {
	path: PathBuf,
}
impl LockFile {
	/// Spins until the lock file is created exclusively or the budget is spent.
	///
	/// This is the only blocking wait in the gateway.
	pub(crate) fn acquire(path: &Path, options: &LockOptions) -> Result<Self, RateLimitError> {
		let attempts = options.max_attempts.max(1);
		let mut reclaimed = false;

		for attempt in 1..=attempts {
			match Self::try_create(path) {
				Ok(lock) => return Ok(lock),
				Err(e) if e.kind() == ErrorKind::AlreadyExists => {
					if !reclaimed && reclaim_stale(path, options.stale_after) {
						reclaimed = true;

						continue;
					}
					if attempt < attempts {
						thread::sleep(options.retry_delay);
					}
				},
				Err(e) =>
					return Err(RateLimitError::Backend {
						message: format!("Failed to create lock {}: {e}", path.display()),
					}),
			}
		}

		Err(RateLimitError::LockTimeout { attempts })
	}

	fn try_create(path: &Path) -> std::io::Result<Self> {
		let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;

		// Owner pid is informational only.
		let _ = writeln!(file, "{}", process::id());

		Ok(Self { path: path.to_owned() })
	}
}
impl Drop for LockFile {
	fn drop(&mut self) {
		if let Err(e) = fs::remove_file(&self.path) {
			#[cfg(feature = "tracing")]
			tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock.");

			let _ = e;
		}
	}
}

/// Path of the guard serializing stale-lock removal for `path`.
pub(crate) fn reclaim_guard_path(path: &Path) -> PathBuf {
	let mut guard = path.as_os_str().to_owned();

	guard.push(".reclaim");

	guard.into()
}

// Only the guard holder may delete a lock it does not own, and it re-checks the age while
// holding the guard. A waiter that saw the old lock as stale therefore cannot delete the fresh
// lock a faster waiter created in its place.
fn reclaim_stale(path: &Path, stale_after: Option<StdDuration>) -> bool {
	if !is_stale(path, stale_after) {
		return false;
	}

	let Ok(_guard) = LockFile::try_create(&reclaim_guard_path(path)) else {
		return false;
	};

	if !is_stale(path, stale_after) {
		return false;
	}

	#[cfg(feature = "tracing")]
	tracing::warn!(path = %path.display(), "Reclaiming stale rate-limit lock.");

	fs::remove_file(path).is_ok()
}

fn is_stale(path: &Path, stale_after: Option<StdDuration>) -> bool {
	let Some(threshold) = stale_after else {
		return false;
	};

	fs::metadata(path)
		.and_then(|metadata| metadata.modified())
		.ok()
		.and_then(|modified| SystemTime::now().duration_since(modified).ok())
		.is_some_and(|age| age > threshold)
}
