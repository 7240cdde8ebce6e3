//! Auction snapshot and constant types.
//!
//! `AuctionState` is the scalar snapshot of the sale contract. It is owned
//! exclusively by the contract mirror, refreshed wholesale on each new block
//! and replaced atomically, so readers never observe a partial update.

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable constants read once from the sale contract at startup.
///
/// These mirror the `STATICS` getters of the SecondPriceAuction contract;
/// they never change after deployment so they are fetched exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConstants {
	/// Address of the sale contract itself.
	pub contract_address: Address,
	/// Minimum accepted contribution in wei.
	pub dust_limit: U256,
	/// Hash of the terms-and-conditions statement contributors sign.
	pub statement_hash: B256,
	/// Bonus latch constant.
	pub bonus_latch: U256,
	/// Minimum duration of the early-contribution bonus, in seconds.
	pub bonus_min_duration: U256,
	/// Maximum duration of the early-contribution bonus, in seconds.
	pub bonus_max_duration: U256,
	/// Number of wei corresponding to one USD at deployment time.
	pub usdwei: U256,
	/// Fixed-point scaling constant converting raw price units to
	/// token-equivalent units.
	pub divisor: U256,
	/// Total number of tokens for sale.
	pub token_cap: U256,
	/// Sale start time, UNIX seconds.
	pub begin_time: u64,
	/// Contract administrator.
	pub admin: Address,
	/// Treasury receiving the proceeds.
	pub treasury: Address,
}

/// Scalar snapshot of the live auction state.
///
/// Refreshed in one batch per new block; a failed refresh leaves the
/// previous snapshot in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionState {
	/// Block height the snapshot was taken at.
	pub block_number: u64,
	/// Current clearing price in wei per token unit.
	pub current_price: U256,
	/// Total accounted contributions (received plus bonus) in wei.
	pub total_accounted: U256,
	/// Total raw ETH received in wei.
	pub total_received: U256,
	/// Tokens still available at the current price.
	pub tokens_available: U256,
	/// Whether the sale is administratively halted.
	pub halted: bool,
	/// Sale end time, UNIX seconds. Moves earlier as contributions come in.
	pub end_time: u64,
}

/// Result of the contract's `theDeal(value)` probe: what a contribution of
/// `value` wei would currently buy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
	/// Contribution size the deal was quoted for, in wei.
	pub value: U256,
	/// Accounted value (contribution plus bonus) in wei.
	pub accounted: U256,
	/// True when the contribution would overflow the remaining cap and be
	/// refunded.
	pub refund: bool,
	/// Price the deal was quoted at.
	pub price: U256,
}

/// One point of the reconciled contribution series.
///
/// `total_accounted` is cumulative and monotonic non-decreasing; per block
/// only the entry with the highest total survives reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLogPoint {
	/// Block the contribution was mined in.
	pub block_number: u64,
	/// Timestamp of that block.
	pub time: DateTime<Utc>,
	/// Running total of accounted contributions up to this log.
	pub total_accounted: U256,
}

/// One point of the chart series served to the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
	/// Point timestamp.
	pub time: DateTime<Utc>,
	/// Running total of accounted contributions, hex-encoded on the wire.
	#[serde(rename = "totalAccounted")]
	pub total_accounted: U256,
}
