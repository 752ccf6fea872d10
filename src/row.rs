// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The row assembly engine (spec §4.D): whole-row and piecewise writes, and
//! the `NEW -> PARTIAL -> COMMITTED` state a piecewise row moves through.

use crate::locator::Slot;
use crate::value::Value;

/// The shapes a whole-row `set(key, record)` call accepts (§4.D form 1).
pub enum RecordInput {
	/// `{"col": value, ...}` — dict/mapping-style assignment, keyed by
	/// column name. Columns absent from the map are stored as absent.
	Map(Vec<(String, Value)>),
	/// `(v0, v1, ...)` — positional assignment against the declared column
	/// order. Shorter than the declaration is allowed; the remaining
	/// columns are absent.
	Tuple(Vec<Value>),
	/// A single value with no column declaration in play (the unstructured
	/// case).
	Single(Value),
}

/// A row under construction via piecewise (`row(key).column = value`)
/// assignment. Lives in the writer's `pending` table from `NEW`
/// (freshly allocated, no slots filled) through `PARTIAL` (some slots
/// filled) until it is moved into the committed index, either by an
/// explicit `finalize()` or implicitly at `close()`.
pub struct PendingRow {
	pub slots: Vec<Slot>,
}

impl PendingRow {
	pub fn new(column_count: usize) -> PendingRow {
		PendingRow { slots: vec![None; column_count] }
	}
}
