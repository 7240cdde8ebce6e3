//! Common types module for the sale backend.
//!
//! This module defines the core data types and structures shared by the
//! connector, auction, queue and HTTP layers. It provides a centralized
//! location for shared types to ensure consistency across all components.

/// Auction snapshot and constant types.
pub mod auction;
/// Typed sale-contract events and transaction outcomes.
pub mod events;
/// Persisted transaction-queue entry types.
pub mod queue;
/// Utility functions for hex and timestamp conversions.
pub mod utils;

// Re-export all types for convenient access
pub use auction::*;
pub use events::*;
pub use queue::*;
pub use utils::*;
