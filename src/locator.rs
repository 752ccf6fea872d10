// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! `RecordLocator`: a per-record descriptor naming the blob offsets and
//! lengths for its columns (spec §3, §6.1).

/// A single blob reference, or the absent-column sentinel.
pub type Slot = Option<(u64, u64)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocator {
	/// A single blob holding the whole value.
	Unstructured((u64, u64)),
	/// One slot per declared column, in column-declaration order.
	Columnar(Vec<Slot>),
}

impl RecordLocator {
	pub fn column_count(&self) -> usize {
		match self {
			RecordLocator::Unstructured(_) => 1,
			RecordLocator::Columnar(slots) => slots.len(),
		}
	}

	/// The maximum byte offset referenced by this locator plus its length,
	/// i.e. the first byte position not covered by any of its blobs. Used
	/// to validate "every (offset,length) in the index refers to a region
	/// strictly before the footer start" (§3 invariants).
	pub fn max_extent(&self) -> u64 {
		match self {
			RecordLocator::Unstructured((offset, len)) => offset + len,
			RecordLocator::Columnar(slots) => slots
				.iter()
				.filter_map(|s| s.map(|(offset, len)| offset + len))
				.max()
				.unwrap_or(0),
		}
	}
}
