//! Epoch-millisecond conversions used by claims and persisted state.

// self
use crate::_prelude::*;

/// Milliseconds since the Unix epoch for the given instant.
pub fn epoch_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Instant for the given epoch-millisecond value, clamped to the representable range.
pub fn from_epoch_millis(millis: i64) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
		.unwrap_or(if millis < 0 { OffsetDateTime::UNIX_EPOCH } else { max_instant() })
}

/// Whole milliseconds in a duration, saturating.
pub fn duration_millis(duration: Duration) -> i64 {
	i64::try_from(duration.whole_milliseconds()).unwrap_or(i64::MAX)
}

/// `instant + duration`, clamped to the range [`from_epoch_millis`] produces.
pub fn saturating_add(instant: OffsetDateTime, duration: Duration) -> OffsetDateTime {
	instant.checked_add(duration).map_or_else(
		|| if duration.is_negative() { OffsetDateTime::UNIX_EPOCH } else { max_instant() },
		|sum| sum.min(max_instant()),
	)
}

fn max_instant() -> OffsetDateTime {
	time::macros::datetime!(9999-12-31 23:59:59 UTC)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn millis_round_trip_through_instant() {
		let instant = datetime!(2025-11-10 12:00:00.250 UTC);
		let millis = epoch_millis(instant);

		assert_eq!(millis, 1_762_776_000_250);
		assert_eq!(from_epoch_millis(millis), instant);
	}

	#[test]
	fn out_of_range_millis_clamp() {
		assert_eq!(from_epoch_millis(i64::MAX).year(), 9999);
		assert_eq!(duration_millis(Duration::seconds(2)), 2_000);
	}

	#[test]
	fn saturating_add_clamps_huge_durations() {
		let now = datetime!(2025-11-10 12:00 UTC);

		assert_eq!(saturating_add(now, Duration::minutes(5)), datetime!(2025-11-10 12:05 UTC));
		assert_eq!(saturating_add(now, Duration::milliseconds(i64::MAX)).year(), 9999);
		assert_eq!(saturating_add(now, Duration::MAX), from_epoch_millis(i64::MAX));
	}
}
