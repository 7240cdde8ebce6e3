//! Sale-log ledger: rebuilds the cumulative contribution series.
//!
//! Input events carry a `(block_number, transaction_index)` position and a
//! resolved block timestamp. Each ingest folds the batch in position order,
//! merges with history keeping per block only the highest running total
//! (a refetched batch after a reorg then wins over stale entries), and
//! re-sorts by time.

use alloy_primitives::U256;
use chrono::{DateTime, Duration, Utc};
use sale_types::{ChartPoint, SaleLogPoint, TimedSaleEvent};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// The reconciled contribution series.
#[derive(Debug, Default)]
pub struct Ledger {
	points: Vec<SaleLogPoint>,
}

impl Ledger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Folds a batch of events into the series.
	///
	/// A cold ingest restarts the running total from zero (the batch covers
	/// the whole history); an incremental ingest resumes from the retained
	/// tail.
	pub fn ingest(&mut self, mut events: Vec<TimedSaleEvent>, cold: bool) {
		events.sort_by_key(|event| (event.block_number, event.transaction_index));

		let mut total = if cold {
			U256::ZERO
		} else {
			self.points
				.last()
				.map(|point| point.total_accounted)
				.unwrap_or(U256::ZERO)
		};

		let incoming: Vec<SaleLogPoint> = events
			.into_iter()
			.map(|event| {
				total += event.event.accounted();
				SaleLogPoint {
					block_number: event.block_number,
					time: event.time,
					total_accounted: total,
				}
			})
			.collect();

		let mut per_block: BTreeMap<u64, SaleLogPoint> = BTreeMap::new();
		for point in self.points.drain(..).chain(incoming) {
			match per_block.entry(point.block_number) {
				Entry::Vacant(slot) => {
					slot.insert(point);
				}
				Entry::Occupied(mut slot) => {
					if slot.get().total_accounted < point.total_accounted {
						slot.insert(point);
					}
				}
			}
		}

		self.points = per_block.into_values().collect();
		self.points.sort_by_key(|point| point.time);
	}

	/// The chart series: points at or after `begin_time`, preceded by a
	/// synthetic anchor 500ms before `begin_time` carrying the prior total
	/// when one exists.
	pub fn chart(&self, begin_time: DateTime<Utc>) -> Vec<ChartPoint> {
		let first = match self.points.iter().position(|point| point.time >= begin_time) {
			Some(index) => index,
			None => return Vec::new(),
		};

		let mut chart = Vec::with_capacity(self.points.len() - first + 1);
		if first > 0 {
			chart.push(ChartPoint {
				time: begin_time - Duration::milliseconds(500),
				total_accounted: self.points[first - 1].total_accounted,
			});
		}
		chart.extend(self.points[first..].iter().map(|point| ChartPoint {
			time: point.time,
			total_accounted: point.total_accounted,
		}));
		chart
	}

	/// Running total at the tail of the series.
	pub fn last_total(&self) -> Option<U256> {
		self.points.last().map(|point| point.total_accounted)
	}

	/// The full reconciled series.
	pub fn points(&self) -> &[SaleLogPoint] {
		&self.points
	}
}
