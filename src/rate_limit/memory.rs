//! Process-local [`RateLimiter`] for single-instance deployments and tests.

// self
use crate::{
	_prelude::*,
	rate_limit::{RateLimitFuture, RateLimitPolicy, RateLimitState, RateLimiter},
};

/// Same window and eviction rules as [`FileRateLimiter`](super::FileRateLimiter), without the
/// filesystem; counters are lost on restart and are not shared between processes.
#[derive(Clone, Debug)]
pub struct MemoryRateLimiter {
	policy: RateLimitPolicy,
	state: Arc<Mutex<RateLimitState>>,
}
impl MemoryRateLimiter {
	/// Creates an empty limiter.
	pub fn new(policy: RateLimitPolicy) -> Self {
		Self { policy, state: Default::default() }
	}

	/// Number of stored buckets.
	pub fn bucket_count(&self) -> usize {
		self.state.lock().len()
	}
}
impl RateLimiter for MemoryRateLimiter {
	fn check_at<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> RateLimitFuture<'a> {
		let decision = self.state.lock().admit(key, &self.policy, now);

		Box::pin(async move { Ok(decision) })
	}
}
