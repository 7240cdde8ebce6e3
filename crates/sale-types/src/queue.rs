//! Persisted transaction-queue entry types.
//!
//! A queue entry is created when a contribution is accepted client-side but
//! the sender's balance does not yet cover it. The queue consumer is the
//! only writer: it either confirms or rejects an entry, and both
//! transitions are terminal.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A pending pre-signed transaction waiting for its sender to be funded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
	/// Sender address (the queue key; at most one entry per address).
	pub address: Address,
	/// RLP-encoded signed transaction, submitted verbatim once funded.
	pub signed_tx: Bytes,
	/// Balance the sender must reach before submission, in wei.
	pub required_wei: U256,
	/// Nonce recovered from the signed transaction at enqueue time.
	pub nonce: u64,
}

/// Terminal outcome of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueueOutcome {
	/// The transaction mined with a `Buyin` event.
	Confirmed {
		/// Nonce of the submitted transaction.
		nonce: u64,
		/// Hash of the submitted transaction.
		hash: B256,
		/// Accounted wei accepted by the contract.
		accepted: U256,
	},
	/// Submission or receipt processing failed; never retried.
	Rejected {
		/// Nonce of the attempted transaction.
		nonce: u64,
		/// Why the entry was rejected.
		error: String,
	},
}

/// Combined queue view for one address, as served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
	/// Still waiting for funds.
	Pending(QueueEntry),
	/// Transitioned out of the queue.
	Settled(QueueOutcome),
}
