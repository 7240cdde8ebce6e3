//! Alloy-based node connector implementation.
//!
//! Talks to an Ethereum node over HTTP using the Alloy provider, decodes
//! SecondPriceAuction logs with `sol!`-generated bindings, and feeds a
//! broadcast channel with new block numbers from a polling loop.

use crate::{ConnectorError, SaleConnector, TxInfo};
use alloy_consensus::Transaction;
use alloy_primitives::{Address, Bytes, Log as PrimLog, LogData, B256, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionRequest};
use alloy_sol_types::{sol, SolCall, SolEvent};
use alloy_transport_http::Http;
use async_trait::async_trait;
use sale_types::{AuctionConstants, AuctionState, Deal, SaleEvent, SaleLogEvent, TxOutcome};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

// Contract interface of the SecondPriceAuction sale contract.
//
// Matches https://github.com/paritytech/second-price-auction; only the
// getters and events the backend reads are declared.
sol! {
	function DUST_LIMIT() external view returns (uint256);
	function STATEMENT_HASH() external view returns (bytes32);
	function BONUS_LATCH() external view returns (uint256);
	function BONUS_MIN_DURATION() external view returns (uint256);
	function BONUS_MAX_DURATION() external view returns (uint256);
	function USDWEI() external view returns (uint256);
	function DIVISOR() external view returns (uint256);
	function admin() external view returns (address);
	function treasury() external view returns (address);
	function beginTime() external view returns (uint256);
	function endTime() external view returns (uint256);
	function tokenCap() external view returns (uint256);

	function currentPrice() external view returns (uint256);
	function totalAccounted() external view returns (uint256);
	function totalReceived() external view returns (uint256);
	function tokensAvailable() external view returns (uint256);
	function halted() external view returns (bool);

	function buyins(address who) external view returns (uint128 accounted, uint128 received);
	function theDeal(uint256 value) external view returns (uint256 accounted, bool refund, uint256 price);

	event Buyin(address indexed who, uint256 accounted, uint256 received, uint256 price);
	event Injected(address indexed who, uint256 received, uint256 accounted);
}

/// Timing knobs for the alloy connector.
#[derive(Debug, Clone)]
pub struct ConnectorTimings {
	/// Interval between new-block polls.
	pub block_poll: Duration,
	/// Interval between receipt polls inside `wait_for_outcome`.
	pub receipt_poll: Duration,
	/// Upper bound on the receipt wait.
	pub receipt_timeout: Duration,
}

impl Default for ConnectorTimings {
	fn default() -> Self {
		Self {
			block_poll: Duration::from_secs(3),
			receipt_poll: Duration::from_secs(5),
			receipt_timeout: Duration::from_secs(300),
		}
	}
}

/// Alloy-based implementation of [`SaleConnector`].
pub struct AlloyConnector {
	/// The Alloy provider for blockchain interaction.
	provider: RootProvider<Http<reqwest::Client>>,
	/// Address of the sale contract.
	contract: Address,
	timings: ConnectorTimings,
	/// Broadcast feed of new block numbers.
	block_tx: broadcast::Sender<u64>,
}

impl AlloyConnector {
	/// Connects to the node and starts the block watcher.
	///
	/// Fails fast if the node is unreachable so misconfiguration surfaces
	/// at startup rather than on the first scan.
	pub async fn connect(
		rpc_url: &str,
		contract: Address,
		timings: ConnectorTimings,
	) -> Result<Self, ConnectorError> {
		let provider = RootProvider::new_http(
			rpc_url
				.parse()
				.map_err(|e| ConnectorError::Network(format!("Invalid RPC URL: {}", e)))?,
		);

		let current_block = provider
			.get_block_number()
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get block number: {}", e)))?;

		let (block_tx, _) = broadcast::channel(64);

		let connector = Self {
			provider,
			contract,
			timings,
			block_tx,
		};
		connector.spawn_block_watcher(current_block);

		tracing::info!(block = current_block, contract = %contract, "Connected to node");
		Ok(connector)
	}

	/// Spawns the polling loop feeding the block broadcast channel.
	///
	/// Every block number between polls is sent individually, in order, so
	/// subscribers see an in-order, at-least-once stream.
	fn spawn_block_watcher(&self, start_block: u64) {
		let provider = self.provider.clone();
		let block_tx = self.block_tx.clone();
		let poll = self.timings.block_poll;

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(poll);
			interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
			interval.tick().await;

			let mut last_block = start_block;
			loop {
				interval.tick().await;

				let current = match provider.get_block_number().await {
					Ok(block) => block,
					Err(e) => {
						tracing::warn!(error = %e, "Block poll failed");
						continue;
					}
				};

				while last_block < current {
					last_block += 1;
					// No receivers is fine; subscribers come and go.
					let _ = block_tx.send(last_block);
				}
			}
		});
	}

	/// Executes a read-only contract call against the sale contract.
	async fn call<C: SolCall + Send>(&self, call: C) -> Result<C::Return, ConnectorError> {
		let request = TransactionRequest::default()
			.to(self.contract)
			.input(call.abi_encode().into());

		let output = self
			.provider
			.call(&request)
			.await
			.map_err(|e| ConnectorError::Network(format!("Contract call failed: {}", e)))?;

		C::abi_decode_returns(&output, true)
			.map_err(|e| ConnectorError::Decode(format!("Bad return data: {}", e)))
	}

	/// Decodes one raw RPC log into a typed sale event, if it is one.
	fn decode_event(log: &Log) -> Option<SaleEvent> {
		let prim_log = PrimLog {
			address: log.address(),
			data: LogData::new_unchecked(log.topics().to_vec(), log.data().data.clone()),
		};

		match log.topics().first() {
			Some(&topic) if topic == Buyin::SIGNATURE_HASH => Buyin::decode_log(&prim_log, true)
				.ok()
				.map(|event| SaleEvent::Buyin {
					who: event.who,
					accounted: event.accounted,
					received: event.received,
					price: event.price,
				}),
			Some(&topic) if topic == Injected::SIGNATURE_HASH => {
				Injected::decode_log(&prim_log, true)
					.ok()
					.map(|event| SaleEvent::Injected {
						who: event.who,
						received: event.received,
						accounted: event.accounted,
					})
			}
			_ => None,
		}
	}

	/// Decodes the sale-contract events out of a receipt's logs.
	fn decode_receipt_events(&self, logs: &[Log]) -> Vec<SaleEvent> {
		logs.iter()
			.filter(|log| log.address() == self.contract)
			.filter_map(Self::decode_event)
			.collect()
	}
}

#[async_trait]
impl SaleConnector for AlloyConnector {
	async fn balance(&self, address: Address) -> Result<U256, ConnectorError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn next_nonce(&self, address: Address) -> Result<u64, ConnectorError> {
		self.provider
			.get_transaction_count(address)
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get nonce: {}", e)))
	}

	async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ConnectorError> {
		let pending = self
			.provider
			.send_raw_transaction(raw)
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to send transaction: {}", e)))?;

		let hash = *pending.tx_hash();
		tracing::info!(tx_hash = %hash, "Submitted transaction");
		Ok(hash)
	}

	async fn receipt(&self, hash: B256) -> Result<Option<TxOutcome>, ConnectorError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TxOutcome {
			hash: receipt.transaction_hash,
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
			events: self.decode_receipt_events(receipt.inner.logs()),
		}))
	}

	async fn wait_for_outcome(&self, hash: B256) -> Result<TxOutcome, ConnectorError> {
		let start = tokio::time::Instant::now();

		loop {
			if start.elapsed() > self.timings.receipt_timeout {
				return Err(ConnectorError::ReceiptTimeout(hash));
			}

			if let Some(outcome) = self.receipt(hash).await? {
				return Ok(outcome);
			}

			tokio::time::sleep(self.timings.receipt_poll).await;
		}
	}

	async fn transaction(&self, hash: B256) -> Result<Option<TxInfo>, ConnectorError> {
		let transaction = self
			.provider
			.get_transaction_by_hash(hash)
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get transaction: {}", e)))?;

		Ok(transaction.map(|transaction| TxInfo {
			to: transaction.inner.to(),
			block_number: transaction.block_number,
		}))
	}

	async fn block_number(&self) -> Result<u64, ConnectorError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn block_timestamps(
		&self,
		numbers: &[u64],
	) -> Result<HashMap<u64, u64>, ConnectorError> {
		let mut unique: Vec<u64> = numbers.to_vec();
		unique.sort_unstable();
		unique.dedup();

		let mut timestamps = HashMap::with_capacity(unique.len());
		for number in unique {
			let block = self
				.provider
				.get_block_by_number(
					BlockNumberOrTag::Number(number),
					BlockTransactionsKind::Hashes,
				)
				.await
				.map_err(|e| ConnectorError::Network(format!("Failed to get block: {}", e)))?
				.ok_or_else(|| {
					ConnectorError::Network(format!("Block {} not found", number))
				})?;
			timestamps.insert(number, block.header.timestamp);
		}
		Ok(timestamps)
	}

	async fn fetch_sale_events(
		&self,
		from_block: u64,
		to_block: Option<u64>,
	) -> Result<Vec<SaleLogEvent>, ConnectorError> {
		let mut filter = Filter::new()
			.address(vec![self.contract])
			.event_signature(vec![Buyin::SIGNATURE_HASH, Injected::SIGNATURE_HASH])
			.from_block(from_block);
		if let Some(to_block) = to_block {
			filter = filter.to_block(to_block);
		}

		let logs = self
			.provider
			.get_logs(&filter)
			.await
			.map_err(|e| ConnectorError::Network(format!("Failed to get logs: {}", e)))?;

		Ok(logs
			.iter()
			.filter_map(|log| {
				let event = Self::decode_event(log)?;
				// Pending logs carry no position; they re-arrive once mined.
				Some(SaleLogEvent {
					block_number: log.block_number?,
					transaction_index: log.transaction_index?,
					event,
				})
			})
			.collect())
	}

	async fn auction_constants(&self) -> Result<AuctionConstants, ConnectorError> {
		Ok(AuctionConstants {
			contract_address: self.contract,
			dust_limit: self.call(DUST_LIMITCall {}).await?._0,
			statement_hash: self.call(STATEMENT_HASHCall {}).await?._0,
			bonus_latch: self.call(BONUS_LATCHCall {}).await?._0,
			bonus_min_duration: self.call(BONUS_MIN_DURATIONCall {}).await?._0,
			bonus_max_duration: self.call(BONUS_MAX_DURATIONCall {}).await?._0,
			usdwei: self.call(USDWEICall {}).await?._0,
			divisor: self.call(DIVISORCall {}).await?._0,
			token_cap: self.call(tokenCapCall {}).await?._0,
			begin_time: self.call(beginTimeCall {}).await?._0.saturating_to(),
			admin: self.call(adminCall {}).await?._0,
			treasury: self.call(treasuryCall {}).await?._0,
		})
	}

	async fn auction_state(&self) -> Result<AuctionState, ConnectorError> {
		let block_number = self.block_number().await?;

		Ok(AuctionState {
			block_number,
			current_price: self.call(currentPriceCall {}).await?._0,
			total_accounted: self.call(totalAccountedCall {}).await?._0,
			total_received: self.call(totalReceivedCall {}).await?._0,
			tokens_available: self.call(tokensAvailableCall {}).await?._0,
			halted: self.call(haltedCall {}).await?._0,
			end_time: self.call(endTimeCall {}).await?._0.saturating_to(),
		})
	}

	async fn buyin_of(&self, address: Address) -> Result<(U256, U256), ConnectorError> {
		let buyin = self.call(buyinsCall { who: address }).await?;
		Ok((U256::from(buyin.accounted), U256::from(buyin.received)))
	}

	async fn the_deal(&self, value: U256) -> Result<Deal, ConnectorError> {
		let deal = self.call(theDealCall { value }).await?;
		Ok(Deal {
			value,
			accounted: deal.accounted,
			refund: deal.refund,
			price: deal.price,
		})
	}

	fn subscribe_blocks(&self) -> broadcast::Receiver<u64> {
		self.block_tx.subscribe()
	}
}
