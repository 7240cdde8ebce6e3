//! Typed sale-contract events and transaction outcomes.
//!
//! Raw ABI-decoded logs are turned into this closed set of variants at the
//! connector boundary, before any domain logic inspects them. Downstream
//! code matches on the enum instead of comparing event-name strings.

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted by the sale contract that the backend tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
	/// A contribution was accepted.
	Buyin {
		/// Contributor address.
		who: Address,
		/// Contribution plus time-based bonus, in wei.
		accounted: U256,
		/// Raw ETH sent, in wei.
		received: U256,
		/// Price the contribution was accepted at.
		price: U256,
	},
	/// An administrative token injection.
	Injected {
		/// Beneficiary address.
		who: Address,
		/// Raw value injected, in wei.
		received: U256,
		/// Accounted value injected, in wei.
		accounted: U256,
	},
}

impl SaleEvent {
	/// Accounted wei this event adds to the running total.
	pub fn accounted(&self) -> U256 {
		match self {
			SaleEvent::Buyin { accounted, .. } => *accounted,
			SaleEvent::Injected { accounted, .. } => *accounted,
		}
	}
}

/// A sale event together with its position in the chain.
///
/// Position is `(block_number, transaction_index)`; the reconciler folds
/// events in ascending position order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLogEvent {
	/// Block the event was emitted in.
	pub block_number: u64,
	/// Index of the emitting transaction within the block.
	pub transaction_index: u64,
	/// The decoded event.
	pub event: SaleEvent,
}

/// A positioned sale event with its block timestamp resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedSaleEvent {
	/// Block the event was emitted in.
	pub block_number: u64,
	/// Index of the emitting transaction within the block.
	pub transaction_index: u64,
	/// Timestamp of the containing block.
	pub time: DateTime<Utc>,
	/// The decoded event.
	pub event: SaleEvent,
}

/// Outcome of a mined transaction, with its sale-contract logs decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutcome {
	/// Transaction hash.
	pub hash: B256,
	/// Block the transaction was mined in.
	pub block_number: u64,
	/// Receipt status flag.
	pub success: bool,
	/// Sale-contract events found in the receipt logs.
	pub events: Vec<SaleEvent>,
}

impl TxOutcome {
	/// Returns the first `Buyin` event in the receipt, if any.
	///
	/// A mined contribution without a `Buyin` log means the contract took a
	/// rejection path (e.g. refund) and is treated as a terminal failure.
	pub fn buyin(&self) -> Option<&SaleEvent> {
		self.events
			.iter()
			.find(|event| matches!(event, SaleEvent::Buyin { .. }))
	}
}
