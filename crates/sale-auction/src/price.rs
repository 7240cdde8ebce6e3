//! Fixed-point Dutch-auction price curve.
//!
//! All arithmetic is integer `U256`, matching the contract exactly; floats
//! would drift from the on-chain price at large wei magnitudes.

use alloy_primitives::U256;
use sale_types::AuctionConstants;

/// Curve numerator constant from the SecondPriceAuction contract.
const K: u64 = 40_000_000;
/// Seconds the curve is shifted left of `begin_time`.
const OFFSET: u64 = 5760;

/// The auction price curve over a fixed `[begin, end]` domain.
///
/// `end` comes from the live state snapshot (it moves earlier as
/// contributions arrive), so a fresh curve is built per evaluation rather
/// than cached.
#[derive(Debug, Clone)]
pub struct PriceCurve {
	begin: u64,
	end: u64,
	usdwei: U256,
	divisor: U256,
	token_cap: U256,
}

impl PriceCurve {
	pub fn new(constants: &AuctionConstants, end_time: u64) -> Self {
		Self {
			begin: constants.begin_time,
			end: end_time,
			usdwei: constants.usdwei,
			divisor: constants.divisor,
			token_cap: constants.token_cap,
		}
	}

	/// Token price at `time` (UNIX seconds), zero outside `[begin, end]`.
	///
	/// `floor((USDWEI * K) / (time - begin + OFFSET)) - USDWEI * 5`, floor
	/// divided by `DIVISOR`.
	pub fn price(&self, time: u64) -> U256 {
		if time < self.begin || time > self.end || self.divisor.is_zero() {
			return U256::ZERO;
		}

		let elapsed = U256::from(time - self.begin + OFFSET);
		let p1 = self.usdwei * U256::from(K) / elapsed;
		let p2 = self.usdwei * U256::from(5u64);

		if p1 <= p2 {
			return U256::ZERO;
		}

		(p1 - p2) / self.divisor
	}

	/// Inverse of [`Self::price`]: the earliest time the curve reaches
	/// `price`. Returns `begin` when the curve never does.
	pub fn time_from_price(&self, price: U256) -> u64 {
		let f1 = self.usdwei * U256::from(K);
		let f2 = price * self.divisor + self.usdwei * U256::from(5u64);

		if f2.is_zero() {
			return self.begin;
		}

		let shift: u64 = (f1 / f2).saturating_to();
		self.begin.saturating_add(shift).saturating_sub(OFFSET)
	}

	/// Funding target at `time`: `price * DIVISOR * token_cap` wei.
	pub fn target(&self, time: u64) -> U256 {
		self.price(time) * self.divisor * self.token_cap
	}

	/// Time at which the funding target drops to `target` wei.
	pub fn time_from_target(&self, target: U256) -> u64 {
		let scale = self.divisor * self.token_cap;
		if scale.is_zero() {
			return self.begin;
		}
		self.time_from_price(target / scale)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, b256};

	fn curve() -> PriceCurve {
		let constants = AuctionConstants {
			contract_address: address!("1111111111111111111111111111111111111111"),
			dust_limit: U256::from(10u64).pow(U256::from(16u64)),
			statement_hash: b256!(
				"0000000000000000000000000000000000000000000000000000000000000001"
			),
			bonus_latch: U256::from(2u64),
			bonus_min_duration: U256::from(600u64),
			bonus_max_duration: U256::from(3600u64),
			usdwei: U256::from(1_000_000u64),
			divisor: U256::from(1000u64),
			token_cap: U256::from(10_000_000u64),
			begin_time: 100_000,
			admin: address!("2222222222222222222222222222222222222222"),
			treasury: address!("3333333333333333333333333333333333333333"),
		};
		PriceCurve::new(&constants, 200_000)
	}

	#[test]
	fn price_at_begin() {
		// floor(1e6 * 4e7 / 5760) = 6_944_444_444, minus 5e6, over 1000.
		assert_eq!(curve().price(100_000), U256::from(6_939_444u64));
	}

	#[test]
	fn price_is_zero_outside_domain() {
		let curve = curve();
		assert_eq!(curve.price(99_999), U256::ZERO);
		assert_eq!(curve.price(200_001), U256::ZERO);
		assert!(curve.price(200_000) > U256::ZERO);
	}

	#[test]
	fn price_is_non_increasing() {
		let curve = curve();
		let mut previous = curve.price(100_000);
		for time in (100_000..110_000u64).step_by(37) {
			let price = curve.price(time);
			assert!(price <= previous, "price rose at t={}", time);
			previous = price;
		}
	}

	#[test]
	fn time_from_price_inverts_price() {
		let curve = curve();
		// elapsed + OFFSET = 10_000 divides the numerator exactly, so the
		// roundtrip is exact here.
		let time = 104_240;
		let price = curve.price(time);
		assert_eq!(price, U256::from(3_995_000u64));
		assert_eq!(curve.time_from_price(price), time);
	}

	#[test]
	fn price_roundtrips_through_its_inverse() {
		let curve = curve();
		for time in (100_000..150_000u64).step_by(613) {
			let price = curve.price(time);
			assert!(price > U256::ZERO);
			let recovered = curve.time_from_price(price);
			assert!(recovered >= time);
			assert_eq!(curve.price(recovered), price, "at t={}", time);
		}
	}

	#[test]
	fn target_roundtrip() {
		let curve = curve();
		let time = 104_240;
		let target = curve.target(time);
		assert_eq!(
			target,
			U256::from(3_995_000u64) * U256::from(1000u64) * U256::from(10_000_000u64)
		);
		assert_eq!(curve.time_from_target(target), time);
	}
}
