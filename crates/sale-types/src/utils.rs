//! Utility functions for common type conversions.
//!
//! HTTP response bodies encode all wei quantities as `0x`-prefixed hex
//! strings and all timestamps as RFC3339 (the convention the frontend
//! expects), so the converters live here next to the types they format.

use alloy_primitives::U256;
use chrono::{DateTime, TimeZone, Utc};

/// Ensures a string has a `0x` prefix.
pub fn with_0x_prefix(hex: &str) -> String {
	if hex.starts_with("0x") {
		hex.to_string()
	} else {
		format!("0x{}", hex)
	}
}

/// Removes the `0x` prefix from a string if present.
pub fn without_0x_prefix(hex: &str) -> &str {
	hex.strip_prefix("0x").unwrap_or(hex)
}

/// Formats a `U256` as a minimal `0x`-prefixed hex string.
pub fn u256_to_hex(value: U256) -> String {
	format!("{:#x}", value)
}

/// Formats a `u64` as a minimal `0x`-prefixed hex string.
pub fn u64_to_hex(value: u64) -> String {
	format!("{:#x}", value)
}

/// Converts a UNIX timestamp in seconds into a UTC datetime.
///
/// Clamps to the epoch for timestamps the chrono range cannot represent,
/// which can only happen with corrupt chain data.
pub fn timestamp_to_datetime(secs: u64) -> DateTime<Utc> {
	Utc.timestamp_opt(secs as i64, 0)
		.single()
		.unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_prefix_roundtrip() {
		assert_eq!(with_0x_prefix("abc"), "0xabc");
		assert_eq!(with_0x_prefix("0xabc"), "0xabc");
		assert_eq!(without_0x_prefix("0xabc"), "abc");
		assert_eq!(without_0x_prefix("abc"), "abc");
	}

	#[test]
	fn u256_hex_is_minimal() {
		assert_eq!(u256_to_hex(U256::ZERO), "0x0");
		assert_eq!(u256_to_hex(U256::from(255u64)), "0xff");
		assert_eq!(u64_to_hex(4305463), "0x41b237");
	}

	#[test]
	fn timestamps_convert_to_utc() {
		let dt = timestamp_to_datetime(1_500_000_000);
		assert_eq!(dt.timestamp(), 1_500_000_000);
	}
}
