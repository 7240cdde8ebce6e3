//! Transaction queue consumer.
//!
//! Holds pre-signed contribution transactions whose senders are not yet
//! funded, and drains them as balances arrive. One scan runs per new-block
//! event; a scan triggered while another is in progress is dropped rather
//! than queued, since the next block re-triggers the same work.

use alloy_primitives::{B256, U256};
use sale_connector::{ConnectorError, SaleConnector};
use sale_storage::{QueueStore, StorageError};
use sale_types::{QueueEntry, SaleEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Errors surfaced by the queue consumer.
#[derive(Debug, Error)]
pub enum QueueError {
	/// Error that occurred while talking to the node.
	#[error("Connector error: {0}")]
	Connector(#[from] ConnectorError),
	/// Error that occurred in the queue store.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	/// The transaction mined without a `Buyin` event.
	#[error("Could not find Buyin() event log in {0}")]
	MissingBuyin(B256),
}

/// Drains the persisted transaction queue as senders become funded.
pub struct QueueConsumer {
	connector: Arc<dyn SaleConnector>,
	store: Arc<QueueStore>,
	scan_lock: Mutex<()>,
}

impl QueueConsumer {
	pub fn new(connector: Arc<dyn SaleConnector>, store: Arc<QueueStore>) -> Self {
		Self {
			connector,
			store,
			scan_lock: Mutex::new(()),
		}
	}

	/// Scans on every new block until the block subscription closes.
	pub async fn run(&self) {
		let mut blocks = self.connector.subscribe_blocks();
		loop {
			match blocks.recv().await {
				Ok(block) => {
					debug!(block, "Scanning transaction queue");
					if let Err(error) = self.scan().await {
						warn!(%error, "Queue scan failed");
					}
				}
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					debug!(skipped, "Block subscription lagged");
				}
				Err(broadcast::error::RecvError::Closed) => break,
			}
		}
	}

	/// One pass over the pending queue, returning how many transactions
	/// were submitted. A no-op when a scan is already in progress.
	pub async fn scan(&self) -> Result<usize, QueueError> {
		let Ok(_guard) = self.scan_lock.try_lock() else {
			debug!("Queue scan already in progress, dropping trigger");
			return Ok(0);
		};

		let mut sent = 0;
		for entry in self.store.pending().await? {
			match self.process(&entry).await {
				Ok(true) => sent += 1,
				Ok(false) => {}
				Err(error) => {
					// Leave the entry queued; the next scan retries it.
					warn!(address = %entry.address, %error, "Queue entry processing failed");
				}
			}
		}

		if sent > 0 {
			info!("Sent {} transactions from the queue", sent);
		}

		Ok(sent)
	}

	/// Processes one entry. `Ok(false)` means the sender is still unfunded
	/// and the entry stays queued silently. Once submission starts, any
	/// failure settles the entry as rejected; rejection is terminal.
	async fn process(&self, entry: &QueueEntry) -> Result<bool, QueueError> {
		// A crash between the outcome write and the pending removal leaves
		// a settled entry behind; the recorded outcome is authoritative.
		if self.store.is_settled(entry.address).await? {
			warn!(address = %entry.address, "Dropping already-settled queue entry");
			self.store.drop_pending(entry.address).await?;
			return Ok(false);
		}

		let balance = self.connector.balance(entry.address).await?;
		if balance < entry.required_wei {
			return Ok(false);
		}

		match self.submit(entry).await {
			Ok((hash, accounted)) => {
				self.store
					.confirm(entry.address, entry.nonce, hash, accounted)
					.await?;
			}
			Err(error) => {
				warn!(address = %entry.address, %error, "Queued transaction failed");
				self.store
					.reject(entry.address, entry.nonce, error.to_string())
					.await?;
			}
		}

		Ok(true)
	}

	/// Submits the stored transaction and waits for a `Buyin` receipt log.
	async fn submit(&self, entry: &QueueEntry) -> Result<(B256, U256), QueueError> {
		let hash = self.connector.send_raw_transaction(&entry.signed_tx).await?;
		debug!(%hash, address = %entry.address, "Submitted queued transaction");

		let outcome = self.connector.wait_for_outcome(hash).await?;
		match outcome.buyin() {
			Some(SaleEvent::Buyin { accounted, .. }) => Ok((hash, *accounted)),
			_ => Err(QueueError::MissingBuyin(hash)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address, Bytes, U256};
	use sale_connector::MockConnector;
	use sale_storage::implementations::memory::MemoryStorage;
	use sale_types::{
		AuctionConstants, AuctionState, QueueOutcome, QueueStatus, TxOutcome,
	};
	use std::time::Duration;

	fn constants() -> AuctionConstants {
		AuctionConstants {
			contract_address: address!("1111111111111111111111111111111111111111"),
			dust_limit: U256::from(10u64),
			statement_hash: Default::default(),
			bonus_latch: U256::from(2u64),
			bonus_min_duration: U256::from(600u64),
			bonus_max_duration: U256::from(3600u64),
			usdwei: U256::from(1_000_000u64),
			divisor: U256::from(1000u64),
			token_cap: U256::from(10_000_000u64),
			begin_time: 990,
			admin: Address::ZERO,
			treasury: Address::ZERO,
		}
	}

	fn state() -> AuctionState {
		AuctionState {
			block_number: 1,
			current_price: U256::from(5000u64),
			total_accounted: U256::ZERO,
			total_received: U256::ZERO,
			tokens_available: U256::from(1_000_000u64),
			halted: false,
			end_time: 100_000,
		}
	}

	fn entry(address: Address, required: u64, raw: &[u8]) -> QueueEntry {
		QueueEntry {
			address,
			signed_tx: Bytes::copy_from_slice(raw),
			required_wei: U256::from(required),
			nonce: 7,
		}
	}

	fn buyin_outcome(hash: alloy_primitives::B256, who: Address) -> TxOutcome {
		TxOutcome {
			hash,
			block_number: 12,
			success: true,
			events: vec![SaleEvent::Buyin {
				who,
				accounted: U256::from(105u64),
				received: U256::from(100u64),
				price: U256::from(5000u64),
			}],
		}
	}

	fn consumer(mock: Arc<MockConnector>) -> (QueueConsumer, Arc<QueueStore>) {
		let store = Arc::new(QueueStore::new(Box::new(MemoryStorage::new())));
		(QueueConsumer::new(mock, store.clone()), store)
	}

	#[tokio::test]
	async fn submits_only_once_funded() {
		let who = address!("00000000000000000000000000000000000000aa");
		let raw = vec![0xf8, 0x01];
		let mock = Arc::new(MockConnector::new(constants(), state()));
		mock.set_balance_sequence(who, vec![U256::from(50u64), U256::from(50u64), U256::from(150u64)]);
		mock.set_outcome(
			MockConnector::tx_hash(&Bytes::copy_from_slice(&raw)),
			buyin_outcome(MockConnector::tx_hash(&Bytes::copy_from_slice(&raw)), who),
		);

		let (consumer, store) = consumer(mock.clone());
		store.enqueue(&entry(who, 100, &raw)).await.unwrap();

		assert_eq!(consumer.scan().await.unwrap(), 0);
		assert_eq!(consumer.scan().await.unwrap(), 0);
		assert!(mock.submitted().is_empty());

		assert_eq!(consumer.scan().await.unwrap(), 1);
		assert_eq!(mock.submitted().len(), 1);

		match store.status(who).await.unwrap() {
			Some(QueueStatus::Settled(QueueOutcome::Confirmed { nonce, accepted, .. })) => {
				assert_eq!(nonce, 7);
				assert_eq!(accepted, U256::from(105u64));
			}
			other => panic!("unexpected status: {:?}", other),
		}
	}

	#[tokio::test]
	async fn rejects_when_buyin_event_is_missing() {
		let who = address!("00000000000000000000000000000000000000bb");
		let raw = vec![0xf8, 0x02];
		let hash = MockConnector::tx_hash(&Bytes::copy_from_slice(&raw));

		let mock = Arc::new(MockConnector::new(constants(), state()));
		mock.set_balance(who, U256::from(200u64));
		mock.set_outcome(
			hash,
			TxOutcome {
				hash,
				block_number: 12,
				success: true,
				events: vec![],
			},
		);

		let (consumer, store) = consumer(mock);
		store.enqueue(&entry(who, 100, &raw)).await.unwrap();

		assert_eq!(consumer.scan().await.unwrap(), 1);
		match store.status(who).await.unwrap() {
			Some(QueueStatus::Settled(QueueOutcome::Rejected { error, .. })) => {
				assert_eq!(
					error,
					format!("Could not find Buyin() event log in {hash}")
				);
			}
			other => panic!("unexpected status: {:?}", other),
		}
	}

	#[tokio::test]
	async fn settled_entry_is_not_resubmitted_after_restart() {
		let who = address!("00000000000000000000000000000000000000ee");
		let raw = vec![0xf8, 0x05];
		let hash = MockConnector::tx_hash(&Bytes::copy_from_slice(&raw));

		let mock = Arc::new(MockConnector::new(constants(), state()));
		mock.set_balance(who, U256::from(200u64));
		mock.set_outcome(hash, buyin_outcome(hash, who));

		let (consumer, store) = consumer(mock.clone());

		// A crash between the two settle writes leaves the confirmed
		// outcome alongside a stale pending entry.
		store.confirm(who, 7, hash, U256::from(105u64)).await.unwrap();
		store.enqueue(&entry(who, 100, &raw)).await.unwrap();

		assert_eq!(consumer.scan().await.unwrap(), 0);
		assert!(mock.submitted().is_empty());
		assert!(store.pending().await.unwrap().is_empty());

		match store.status(who).await.unwrap() {
			Some(QueueStatus::Settled(QueueOutcome::Confirmed { hash: recorded, .. })) => {
				assert_eq!(recorded, hash);
			}
			other => panic!("unexpected status: {:?}", other),
		}
	}

	#[tokio::test]
	async fn unfunded_entry_stays_queued_silently() {
		let who = address!("00000000000000000000000000000000000000cc");
		let mock = Arc::new(MockConnector::new(constants(), state()));
		mock.set_balance(who, U256::from(10u64));

		let (consumer, store) = consumer(mock.clone());
		store.enqueue(&entry(who, 100, &[0xf8, 0x03])).await.unwrap();

		assert_eq!(consumer.scan().await.unwrap(), 0);
		assert!(mock.submitted().is_empty());
		assert_eq!(store.pending().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn overlapping_scan_is_dropped() {
		let who = address!("00000000000000000000000000000000000000dd");
		let raw = vec![0xf8, 0x04];
		let hash = MockConnector::tx_hash(&Bytes::copy_from_slice(&raw));

		let mock = Arc::new(MockConnector::new(constants(), state()));
		mock.set_balance(who, U256::from(200u64));
		mock.set_outcome(hash, buyin_outcome(hash, who));
		mock.set_wait_delay(Duration::from_millis(200));

		let (consumer, store) = consumer(mock.clone());
		let consumer = Arc::new(consumer);
		store.enqueue(&entry(who, 100, &raw)).await.unwrap();

		let first = {
			let consumer = consumer.clone();
			tokio::spawn(async move { consumer.scan().await })
		};
		tokio::time::sleep(Duration::from_millis(50)).await;

		// Second trigger while the first scan holds the lock.
		assert_eq!(consumer.scan().await.unwrap(), 0);

		assert_eq!(first.await.unwrap().unwrap(), 1);
		assert_eq!(mock.submitted().len(), 1);
	}
}
