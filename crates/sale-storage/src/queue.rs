//! Typed store for the persisted transaction queue.
//!
//! The queue is keyed by sender address: at most one pending entry per
//! address. Confirm and reject record a terminal outcome and remove the
//! pending entry, in that order, so a crash between the two writes leaves
//! a settled outcome alongside a stale pending entry rather than a lost
//! transition; the consumer treats an existing outcome as authoritative.

use crate::{StorageError, StorageInterface, StorageService};
use alloy_primitives::{Address, B256, U256};
use sale_types::{QueueEntry, QueueOutcome, QueueStatus};

const PENDING_NS: &str = "queue";
const OUTCOME_NS: &str = "outcome";

/// Persisted queue store, the only cross-restart shared state.
pub struct QueueStore {
	storage: StorageService,
}

impl QueueStore {
	/// Creates a queue store over the given backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			storage: StorageService::new(backend),
		}
	}

	fn id(address: Address) -> String {
		format!("{:#x}", address)
	}

	/// Adds or replaces the pending entry for the entry's sender.
	pub async fn enqueue(&self, entry: &QueueEntry) -> Result<(), StorageError> {
		self.storage
			.store(PENDING_NS, &Self::id(entry.address), entry)
			.await
	}

	/// Returns all pending entries in address order.
	pub async fn pending(&self) -> Result<Vec<QueueEntry>, StorageError> {
		let ids = self.storage.list_ids(PENDING_NS).await?;
		let mut entries = Vec::with_capacity(ids.len());
		for id in ids {
			match self.storage.retrieve::<QueueEntry>(PENDING_NS, &id).await {
				Ok(entry) => entries.push(entry),
				// Entry removed between list and read; skip it.
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(entries)
	}

	/// Marks an entry as confirmed and removes it from the pending queue.
	pub async fn confirm(
		&self,
		address: Address,
		nonce: u64,
		hash: B256,
		accepted: U256,
	) -> Result<(), StorageError> {
		self.settle(
			address,
			QueueOutcome::Confirmed {
				nonce,
				hash,
				accepted,
			},
		)
		.await
	}

	/// Marks an entry as rejected and removes it from the pending queue.
	/// Rejection is terminal; the entry is never retried.
	pub async fn reject(
		&self,
		address: Address,
		nonce: u64,
		error: String,
	) -> Result<(), StorageError> {
		self.settle(address, QueueOutcome::Rejected { nonce, error })
			.await
	}

	async fn settle(&self, address: Address, outcome: QueueOutcome) -> Result<(), StorageError> {
		let id = Self::id(address);
		self.storage.store(OUTCOME_NS, &id, &outcome).await?;
		self.storage.remove(PENDING_NS, &id).await
	}

	/// True when the address already has a terminal outcome recorded.
	pub async fn is_settled(&self, address: Address) -> Result<bool, StorageError> {
		self.storage.exists(OUTCOME_NS, &Self::id(address)).await
	}

	/// Removes a pending entry without recording an outcome. Used to clear
	/// an entry left behind by a crash between the two settle writes.
	pub async fn drop_pending(&self, address: Address) -> Result<(), StorageError> {
		self.storage.remove(PENDING_NS, &Self::id(address)).await
	}

	/// Returns the queue view for one address, if the address was ever
	/// queued. A settled outcome shadows any stale pending entry.
	pub async fn status(&self, address: Address) -> Result<Option<QueueStatus>, StorageError> {
		let id = Self::id(address);

		match self.storage.retrieve::<QueueOutcome>(OUTCOME_NS, &id).await {
			Ok(outcome) => return Ok(Some(QueueStatus::Settled(outcome))),
			Err(StorageError::NotFound) => {}
			Err(e) => return Err(e),
		}

		match self.storage.retrieve::<QueueEntry>(PENDING_NS, &id).await {
			Ok(entry) => Ok(Some(QueueStatus::Pending(entry))),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use alloy_primitives::{address, b256, Bytes};

	fn entry(address: Address, required: u64) -> QueueEntry {
		QueueEntry {
			address,
			signed_tx: Bytes::from(vec![0xf8, 0x6b]),
			required_wei: U256::from(required),
			nonce: 0,
		}
	}

	#[tokio::test]
	async fn enqueue_then_confirm_removes_pending() {
		let store = QueueStore::new(Box::new(MemoryStorage::new()));
		let who = address!("00000000000000000000000000000000000000aa");
		let hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");

		store.enqueue(&entry(who, 100)).await.unwrap();
		assert_eq!(store.pending().await.unwrap().len(), 1);

		store.confirm(who, 0, hash, U256::from(105u64)).await.unwrap();
		assert!(store.pending().await.unwrap().is_empty());

		match store.status(who).await.unwrap() {
			Some(QueueStatus::Settled(QueueOutcome::Confirmed { accepted, .. })) => {
				assert_eq!(accepted, U256::from(105u64));
			}
			other => panic!("unexpected status: {:?}", other),
		}
	}

	#[tokio::test]
	async fn reject_is_terminal() {
		let store = QueueStore::new(Box::new(MemoryStorage::new()));
		let who = address!("00000000000000000000000000000000000000bb");

		store.enqueue(&entry(who, 100)).await.unwrap();
		store
			.reject(who, 3, "Could not find Buyin() event log in 0xdead".to_string())
			.await
			.unwrap();

		assert!(store.pending().await.unwrap().is_empty());
		match store.status(who).await.unwrap() {
			Some(QueueStatus::Settled(QueueOutcome::Rejected { nonce, error })) => {
				assert_eq!(nonce, 3);
				assert!(error.contains("Buyin()"));
			}
			other => panic!("unexpected status: {:?}", other),
		}
	}

	#[tokio::test]
	async fn one_entry_per_address() {
		let store = QueueStore::new(Box::new(MemoryStorage::new()));
		let who = address!("00000000000000000000000000000000000000cc");

		store.enqueue(&entry(who, 100)).await.unwrap();
		store.enqueue(&entry(who, 250)).await.unwrap();

		let pending = store.pending().await.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].required_wei, U256::from(250u64));
	}
}
