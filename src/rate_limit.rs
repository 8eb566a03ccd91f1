//! Fixed-window rate limiting keyed by an opaque client identity.
//!
//! [`FileRateLimiter`] shares one counter per key across every process on the host (or on a
//! shared filesystem) through a JSON state file guarded by an exclusive-create lock file.
//! [`MemoryRateLimiter`] applies the same window semantics inside one process.

pub mod file;
pub mod memory;

mod lock;

pub use file::FileRateLimiter;
pub use lock::LockOptions;
pub use memory::MemoryRateLimiter;

// self
use crate::{_prelude::*, clock};

/// Boxed future returned by [`RateLimiter::check_at`].
pub type RateLimitFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RateLimitDecision, RateLimitError>> + 'a + Send>>;

/// Admission check consulted for every inbound request.
pub trait RateLimiter
where
	Self: Send + Sync,
{
	/// Counts one request for `key` as of `now` and decides whether it may proceed.
	fn check_at<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> RateLimitFuture<'a>;

	/// Counts one request for `key` using the current clock.
	fn check<'a>(&'a self, key: &'a str) -> RateLimitFuture<'a> {
		self.check_at(key, OffsetDateTime::now_utc())
	}
}

/// Window size and capacity shared by every limiter backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	/// Requests allowed per key per window.
	pub max: u64,
	/// Window length.
	pub window: Duration,
	/// Live bucket count above which the oldest buckets are evicted.
	pub max_buckets: usize,
}
impl RateLimitPolicy {
	/// Default bucket capacity.
	pub const DEFAULT_MAX_BUCKETS: usize = 50_000;

	/// Creates a policy with the default bucket capacity.
	pub fn new(max: u64, window: Duration) -> Self {
		Self { max, window, max_buckets: Self::DEFAULT_MAX_BUCKETS }
	}

	/// Overrides the bucket capacity.
	pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
		self.max_buckets = max_buckets;

		self
	}
}

/// Result of a rate-limit check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed.
	Allow,
	/// The key exhausted its window budget.
	Limited(RetryDirective),
}
impl RateLimitDecision {
	/// `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, RateLimitDecision::Allow)
	}

	/// Retry hint when limited.
	pub fn retry_after_seconds(&self) -> Option<u64> {
		match self {
			RateLimitDecision::Allow => None,
			RateLimitDecision::Limited(directive) => Some(directive.retry_after_seconds),
		}
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Limited`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Whole seconds until the window resets, at least 1.
	pub retry_after_seconds: u64,
	/// Instant the window resets.
	pub reset_at: OffsetDateTime,
}

/// Limiter infrastructure failures. Callers must fail closed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RateLimitError {
	/// Another process held the lock for the whole acquisition budget.
	#[error("Rate-limit lock was not acquired after {attempts} attempts.")]
	LockTimeout {
		/// Attempts made before giving up.
		attempts: u32,
	},
	/// Filesystem or serialization failure in the backing store.
	#[error("Rate-limit backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Counter for one key within its current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitBucket {
	/// Requests counted in this window.
	pub count: u64,
	/// Window end, epoch milliseconds.
	pub reset_at: i64,
}

/// Every live bucket, persisted as one JSON object keyed by client identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLimitState(HashMap<String, RateLimitBucket>);
impl RateLimitState {
	/// Number of stored buckets.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// `true` when no bucket is stored.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Bucket stored for `key`, live or not.
	pub fn get(&self, key: &str) -> Option<&RateLimitBucket> {
		self.0.get(key)
	}

	/// Prunes, evicts, and counts one request for `key`.
	pub fn admit(
		&mut self,
		key: &str,
		policy: &RateLimitPolicy,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		let now_ms = clock::epoch_millis(now);

		self.prune(now_ms);
		self.evict_over(policy.max_buckets);

		let Some(bucket) = self.0.get_mut(key) else {
			let reset_at = now_ms.saturating_add(clock::duration_millis(policy.window));

			self.0.insert(key.to_owned(), RateLimitBucket { count: 1, reset_at });

			return RateLimitDecision::Allow;
		};

		bucket.count = bucket.count.saturating_add(1);

		if bucket.count <= policy.max {
			return RateLimitDecision::Allow;
		}

		let remaining_ms = u64::try_from(bucket.reset_at.saturating_sub(now_ms)).unwrap_or(0);

		RateLimitDecision::Limited(RetryDirective {
			retry_after_seconds: remaining_ms.div_ceil(1_000).max(1),
			reset_at: clock::from_epoch_millis(bucket.reset_at),
		})
	}

	fn prune(&mut self, now_ms: i64) {
		self.0.retain(|_, bucket| bucket.reset_at > now_ms);
	}

	// Capacity valve only: under extreme load this can drop a bucket that is still live.
	fn evict_over(&mut self, max_buckets: usize) {
		let len = self.0.len();

		if len <= max_buckets {
			return;
		}

		let evict = len.div_ceil(10).max(len - max_buckets);
		let mut by_age: Vec<_> =
			self.0.iter().map(|(key, bucket)| (bucket.reset_at, key.clone())).collect();

		by_age.sort_unstable();

		for (_, key) in by_age.into_iter().take(evict) {
			self.0.remove(&key);
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn policy() -> RateLimitPolicy {
		RateLimitPolicy::new(2, Duration::seconds(60))
	}

	#[test]
	fn third_request_in_window_is_limited() {
		let mut state = RateLimitState::default();
		let now = datetime!(2025-11-10 12:00 UTC);

		assert!(state.admit("ip:1", &policy(), now).is_allowed());
		assert!(state.admit("ip:1", &policy(), now + Duration::seconds(1)).is_allowed());

		let limited = state.admit("ip:1", &policy(), now + Duration::seconds(2));

		assert_eq!(limited.retry_after_seconds(), Some(58));
		assert!(state.admit("ip:2", &policy(), now).is_allowed(), "Keys are independent.");
	}

	#[test]
	fn retry_hint_rounds_up_and_is_at_least_one() {
		let mut state = RateLimitState::default();
		let now = datetime!(2025-11-10 12:00 UTC);
		let policy = RateLimitPolicy::new(0, Duration::milliseconds(1_500));

		state.admit("k", &policy, now);

		assert_eq!(
			state.admit("k", &policy, now + Duration::milliseconds(1)).retry_after_seconds(),
			Some(2)
		);
		assert_eq!(
			state.admit("k", &policy, now + Duration::milliseconds(1_499)).retry_after_seconds(),
			Some(1)
		);
	}

	#[test]
	fn window_reset_starts_fresh_bucket() {
		let mut state = RateLimitState::default();
		let now = datetime!(2025-11-10 12:00 UTC);

		for _ in 0..3 {
			state.admit("k", &policy(), now);
		}

		let later = now + Duration::seconds(60);

		assert!(state.admit("k", &policy(), later).is_allowed());
		assert_eq!(
			state.get("k"),
			Some(&RateLimitBucket {
				count: 1,
				reset_at: clock::epoch_millis(later + Duration::seconds(60)),
			})
		);
	}

	#[test]
	fn eviction_drops_oldest_buckets_first() {
		let mut state = RateLimitState::default();
		let policy = policy().with_max_buckets(10);
		let now = datetime!(2025-11-10 12:00 UTC);

		for i in 0..11 {
			state.admit(&format!("k{i}"), &policy, now + Duration::milliseconds(i));
		}

		assert_eq!(state.len(), 11);

		state.admit("new", &policy, now + Duration::milliseconds(20));

		assert_eq!(state.len(), 10);
		assert!(state.get("k0").is_none());
		assert!(state.get("k1").is_none());
		assert!(state.get("k2").is_some());
		assert!(state.get("new").is_some());
	}

	#[test]
	fn state_serializes_as_flat_map() {
		let mut state = RateLimitState::default();

		state.admit("ip:127.0.0.1", &policy(), datetime!(1970-01-01 00:00 UTC));

		let json = serde_json::to_value(&state).expect("State should serialize.");

		assert_eq!(json["ip:127.0.0.1"]["count"], 1);
		assert_eq!(json["ip:127.0.0.1"]["resetAt"], 60_000);
	}
}
