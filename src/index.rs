// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The index & split store (spec §4.C): an in-memory, insertion-ordered map
//! from key to [`RecordLocator`], plus named ordered key lists (splits) and
//! file-level properties.
//!
//! Ordering is kept with a plain `Vec` alongside a `HashMap<Key, usize>`
//! position index, the same flavour of hand-rolled structure the teacher
//! crate favours over pulling in an ordered-map crate (`column.rs`'s
//! `rebalancing: VecDeque<IndexTable>` plus a `HashMap` for blobs is the same
//! idea: compose the two standard collections rather than add a dependency).

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::key::Key;
use crate::locator::RecordLocator;
use crate::options::ColumnDef;

/// An insertion-ordered map. Used for both `rows` (key -> locator) and each
/// split's key list doesn't need this (it's a plain `Vec<Key>`), but the
/// index itself benefits from O(1) membership tests alongside order.
#[derive(Default)]
pub struct OrderedMap<V> {
	order: Vec<Key>,
	positions: HashMap<Key, usize>,
	values: Vec<V>,
}

impl<V> OrderedMap<V> {
	pub fn new() -> OrderedMap<V> {
		OrderedMap { order: Vec::new(), positions: HashMap::new(), values: Vec::new() }
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn contains_key(&self, key: &Key) -> bool {
		self.positions.contains_key(key)
	}

	pub fn get(&self, key: &Key) -> Option<&V> {
		self.positions.get(key).map(|&i| &self.values[i])
	}

	/// Inserts a new key, or overwrites the value of an existing one without
	/// disturbing its position. Returns `true` if the key was new.
	pub fn insert(&mut self, key: Key, value: V) -> bool {
		if let Some(&i) = self.positions.get(&key) {
			self.values[i] = value;
			false
		} else {
			self.positions.insert(key.clone(), self.order.len());
			self.order.push(key);
			self.values.push(value);
			true
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Key, &V)> {
		self.order.iter().zip(self.values.iter())
	}

	pub fn keys(&self) -> impl Iterator<Item = &Key> {
		self.order.iter()
	}
}

pub struct IndexStore {
	pub rows: OrderedMap<RecordLocator>,
	pub splits: Vec<(String, Vec<Key>)>,
	/// Raw, codec-encoded property bytes. The writer encodes eagerly on
	/// `set_property`; the reader decodes lazily and caches (§4.F).
	pub properties: HashMap<String, Vec<u8>>,
	pub column_def: Vec<ColumnDef>,
}

impl IndexStore {
	pub fn new(column_def: Vec<ColumnDef>) -> IndexStore {
		IndexStore {
			rows: OrderedMap::new(),
			splits: Vec::new(),
			properties: HashMap::new(),
			column_def,
		}
	}

	fn split_index(&self, name: &str) -> Option<usize> {
		self.splits.iter().position(|(n, _)| n == name)
	}

	pub fn make_split(&mut self, name: &str, keys: Vec<Key>) -> Result<()> {
		if self.split_index(name).is_some() {
			return Err(Error::DuplicateKey(format!("split `{}` already exists", name)));
		}
		for key in &keys {
			if !self.rows.contains_key(key) {
				return Err(Error::NotFound(format!("key {} is not present in the file", key)));
			}
		}
		self.splits.push((name.to_owned(), keys));
		Ok(())
	}

	pub fn add_to_split(&mut self, name: &str, keys: Vec<Key>) -> Result<()> {
		for key in &keys {
			if !self.rows.contains_key(key) {
				return Err(Error::NotFound(format!("key {} is not present in the file", key)));
			}
		}
		match self.split_index(name) {
			Some(i) => {
				self.splits[i].1.extend(keys);
				Ok(())
			}
			None => Err(Error::NotFound(format!("split `{}` does not exist", name))),
		}
	}

	pub fn replace_split(&mut self, name: &str, keys: Vec<Key>) -> Result<()> {
		for key in &keys {
			if !self.rows.contains_key(key) {
				return Err(Error::NotFound(format!("key {} is not present in the file", key)));
			}
		}
		match self.split_index(name) {
			Some(i) => {
				self.splits[i].1 = keys;
			}
			None => {
				self.splits.push((name.to_owned(), keys));
			}
		}
		Ok(())
	}

	pub fn split(&self, name: &str) -> Result<&[Key]> {
		self.split_index(name)
			.map(|i| self.splits[i].1.as_slice())
			.ok_or_else(|| Error::NotFound(format!("split `{}` does not exist", name)))
	}

	/// Builds the ordered key universe named by `spec`: `None` is every key
	/// in insertion order; `Some("a+b")` is the union of named splits, each
	/// contributing its keys in order, deduplicated on first occurrence
	/// (§4.C `view`, §8 "Split union determinism").
	pub fn view_keys(&self, spec: Option<&str>) -> Result<Vec<Key>> {
		match spec {
			None => Ok(self.rows.keys().cloned().collect()),
			Some(spec) => {
				let mut seen = std::collections::HashSet::new();
				let mut out = Vec::new();
				for name in spec.split('+') {
					for key in self.split(name)? {
						if seen.insert(key.clone()) {
							out.push(key.clone());
						}
					}
				}
				Ok(out)
			}
		}
	}
}
