//! In-memory mock connector for tests.
//!
//! Lets unit tests script balances, receipts and block events without a
//! live node. Balances can be given as a sequence consumed one value per
//! query, which is how the queue tests model funds arriving between scans.

use crate::{ConnectorError, SaleConnector, TxInfo};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use sale_types::{AuctionConstants, AuctionState, Deal, SaleLogEvent, TxOutcome};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

/// Scriptable in-memory implementation of [`SaleConnector`].
pub struct MockConnector {
	balances: Mutex<HashMap<Address, VecDeque<U256>>>,
	nonces: Mutex<HashMap<Address, u64>>,
	outcomes: Mutex<HashMap<B256, TxOutcome>>,
	transactions: Mutex<HashMap<B256, TxInfo>>,
	events: Mutex<Vec<SaleLogEvent>>,
	timestamps: Mutex<HashMap<u64, u64>>,
	submitted: Mutex<Vec<Bytes>>,
	constants: AuctionConstants,
	state: Mutex<AuctionState>,
	deal: Mutex<Option<Deal>>,
	/// Artificial delay inside `wait_for_outcome`, for overlap tests.
	wait_delay: Mutex<Duration>,
	block_tx: broadcast::Sender<u64>,
}

impl MockConnector {
	/// Creates a mock with the given constants and initial state.
	pub fn new(constants: AuctionConstants, state: AuctionState) -> Self {
		let (block_tx, _) = broadcast::channel(64);
		Self {
			balances: Mutex::new(HashMap::new()),
			nonces: Mutex::new(HashMap::new()),
			outcomes: Mutex::new(HashMap::new()),
			transactions: Mutex::new(HashMap::new()),
			events: Mutex::new(Vec::new()),
			timestamps: Mutex::new(HashMap::new()),
			submitted: Mutex::new(Vec::new()),
			constants,
			state: Mutex::new(state),
			deal: Mutex::new(None),
			wait_delay: Mutex::new(Duration::ZERO),
			block_tx,
		}
	}

	/// The hash a raw transaction will be submitted under.
	pub fn tx_hash(raw: &Bytes) -> B256 {
		keccak256(raw)
	}

	/// Sets a fixed balance for an address.
	pub fn set_balance(&self, address: Address, balance: U256) {
		self.set_balance_sequence(address, vec![balance]);
	}

	/// Sets a balance sequence; each query consumes one value and the last
	/// value repeats.
	pub fn set_balance_sequence(&self, address: Address, sequence: Vec<U256>) {
		self.balances
			.lock()
			.unwrap()
			.insert(address, sequence.into());
	}

	/// Sets the nonce returned for an address.
	pub fn set_nonce(&self, address: Address, nonce: u64) {
		self.nonces.lock().unwrap().insert(address, nonce);
	}

	/// Scripts the outcome returned once the given transaction mines.
	pub fn set_outcome(&self, hash: B256, outcome: TxOutcome) {
		self.outcomes.lock().unwrap().insert(hash, outcome);
	}

	/// Scripts a transaction lookup result.
	pub fn set_transaction(&self, hash: B256, info: TxInfo) {
		self.transactions.lock().unwrap().insert(hash, info);
	}

	/// Replaces the scripted sale-event history.
	pub fn set_events(&self, events: Vec<SaleLogEvent>) {
		*self.events.lock().unwrap() = events;
	}

	/// Sets the timestamp of a block.
	pub fn set_block_timestamp(&self, number: u64, timestamp: u64) {
		self.timestamps.lock().unwrap().insert(number, timestamp);
	}

	/// Replaces the scalar auction state.
	pub fn set_state(&self, state: AuctionState) {
		*self.state.lock().unwrap() = state;
	}

	/// Scripts the `theDeal` quote.
	pub fn set_deal(&self, deal: Deal) {
		*self.deal.lock().unwrap() = Some(deal);
	}

	/// Delays every `wait_for_outcome`, to hold a scan open in tests.
	pub fn set_wait_delay(&self, delay: Duration) {
		*self.wait_delay.lock().unwrap() = delay;
	}

	/// Emits a new-block event to subscribers.
	pub fn emit_block(&self, number: u64) {
		let _ = self.block_tx.send(number);
	}

	/// Raw transactions submitted so far, in order.
	pub fn submitted(&self) -> Vec<Bytes> {
		self.submitted.lock().unwrap().clone()
	}
}

#[async_trait]
impl SaleConnector for MockConnector {
	async fn balance(&self, address: Address) -> Result<U256, ConnectorError> {
		let mut balances = self.balances.lock().unwrap();
		let sequence = balances
			.get_mut(&address)
			.ok_or_else(|| ConnectorError::Network(format!("no balance for {}", address)))?;
		if sequence.len() > 1 {
			Ok(sequence.pop_front().unwrap())
		} else {
			sequence
				.front()
				.copied()
				.ok_or_else(|| ConnectorError::Network("balance sequence exhausted".into()))
		}
	}

	async fn next_nonce(&self, address: Address) -> Result<u64, ConnectorError> {
		Ok(*self.nonces.lock().unwrap().get(&address).unwrap_or(&0))
	}

	async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ConnectorError> {
		self.submitted.lock().unwrap().push(raw.clone());
		Ok(Self::tx_hash(raw))
	}

	async fn receipt(&self, hash: B256) -> Result<Option<TxOutcome>, ConnectorError> {
		Ok(self.outcomes.lock().unwrap().get(&hash).cloned())
	}

	async fn wait_for_outcome(&self, hash: B256) -> Result<TxOutcome, ConnectorError> {
		let delay = *self.wait_delay.lock().unwrap();
		if delay > Duration::ZERO {
			tokio::time::sleep(delay).await;
		}
		self.receipt(hash)
			.await?
			.ok_or(ConnectorError::ReceiptTimeout(hash))
	}

	async fn transaction(&self, hash: B256) -> Result<Option<TxInfo>, ConnectorError> {
		Ok(self.transactions.lock().unwrap().get(&hash).cloned())
	}

	async fn block_number(&self) -> Result<u64, ConnectorError> {
		Ok(self.state.lock().unwrap().block_number)
	}

	async fn block_timestamps(
		&self,
		numbers: &[u64],
	) -> Result<HashMap<u64, u64>, ConnectorError> {
		let known = self.timestamps.lock().unwrap();
		let mut result = HashMap::new();
		for number in numbers {
			let timestamp = known
				.get(number)
				.copied()
				.ok_or_else(|| ConnectorError::Network(format!("Block {} not found", number)))?;
			result.insert(*number, timestamp);
		}
		Ok(result)
	}

	async fn fetch_sale_events(
		&self,
		from_block: u64,
		to_block: Option<u64>,
	) -> Result<Vec<SaleLogEvent>, ConnectorError> {
		Ok(self
			.events
			.lock()
			.unwrap()
			.iter()
			.filter(|event| {
				event.block_number >= from_block
					&& to_block.map_or(true, |to| event.block_number <= to)
			})
			.cloned()
			.collect())
	}

	async fn auction_constants(&self) -> Result<AuctionConstants, ConnectorError> {
		Ok(self.constants.clone())
	}

	async fn auction_state(&self) -> Result<AuctionState, ConnectorError> {
		Ok(self.state.lock().unwrap().clone())
	}

	async fn buyin_of(&self, _address: Address) -> Result<(U256, U256), ConnectorError> {
		Ok((U256::ZERO, U256::ZERO))
	}

	async fn the_deal(&self, value: U256) -> Result<Deal, ConnectorError> {
		let state = self.state.lock().unwrap();
		Ok(self.deal.lock().unwrap().clone().unwrap_or(Deal {
			value,
			accounted: value,
			refund: false,
			price: state.current_price,
		}))
	}

	fn subscribe_blocks(&self) -> broadcast::Receiver<u64> {
		self.block_tx.subscribe()
	}
}
