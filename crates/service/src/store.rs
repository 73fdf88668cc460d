//! Ordered in-memory record store.

use std::fmt;

use serde::Serialize;

/// Ordered string records plus the count of successful mutating operations.
///
/// Duplicates are allowed and insertion order is preserved. Queries return
/// owned copies; callers never see the backing vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
	records: Vec<String>,
	operations: u64,
}

impl Store {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store holding `records`. Seeding is not counted as an operation.
	pub fn seeded<I, R>(records: I) -> Self
	where
		I: IntoIterator<Item = R>,
		R: Into<String>,
	{
		Self {
			records: records.into_iter().map(Into::into).collect(),
			operations: 0,
		}
	}

	pub fn add(&mut self, record: String) {
		self.records.push(record);
		self.record_operation();
	}

	/// Removes the first record equal to `record`.
	///
	/// Only a successful removal counts as an operation.
	pub fn remove(&mut self, record: &str) -> bool {
		let Some(pos) = self.records.iter().position(|r| r == record) else {
			return false;
		};
		self.records.remove(pos);
		self.record_operation();
		true
	}

	/// Empties the store and returns how many records were dropped.
	///
	/// Counts as an operation even when the store was already empty.
	pub fn clear(&mut self) -> usize {
		let cleared = self.records.len();
		self.records.clear();
		self.record_operation();
		cleared
	}

	pub fn list(&self) -> Vec<String> {
		self.records.clone()
	}

	/// Case-insensitive substring search in insertion order.
	///
	/// A blank query matches nothing.
	pub fn search(&self, query: &str) -> Vec<String> {
		if query.trim().is_empty() {
			return Vec::new();
		}
		let needle = query.to_lowercase();
		self.records.iter().filter(|r| r.to_lowercase().contains(&needle)).cloned().collect()
	}

	pub fn count(&self) -> usize {
		self.records.len()
	}

	pub fn operation_count(&self) -> u64 {
		self.operations
	}

	pub(crate) fn record_operation(&mut self) {
		self.operations = self.operations.wrapping_add(1);
	}
}

/// Point-in-time service statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
	pub record_count: usize,
	pub operation_count: u64,
	pub is_processing: bool,
}

impl Stats {
	pub(crate) fn of(store: &Store, is_processing: bool) -> Self {
		Self {
			record_count: store.count(),
			operation_count: store.operation_count(),
			is_processing,
		}
	}
}

impl fmt::Display for Stats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Stats{{records={}, operations={}, processing={}}}",
			self.record_count, self.operation_count, self.is_processing
		)
	}
}
