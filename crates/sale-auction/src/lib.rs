//! Auction domain logic for the sale backend.
//!
//! Three pieces live here: the fixed-point price curve, the sale-log
//! ledger that rebuilds the contribution series from chain events, and the
//! contract mirror that keeps an atomically swapped state snapshot current
//! and drives the ledger.

pub mod ledger;
pub mod mirror;
pub mod price;

pub use ledger::Ledger;
pub use mirror::AuctionMirror;
pub use price::PriceCurve;

use thiserror::Error;

/// Errors surfaced by the auction domain.
#[derive(Debug, Error)]
pub enum AuctionError {
	/// Error that occurred while talking to the node.
	#[error("Connector error: {0}")]
	Connector(#[from] sale_connector::ConnectorError),
}
