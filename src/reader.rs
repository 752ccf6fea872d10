// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The reader (spec §4.F): parses the footer, exposes a random-access
//! mapping keyed by the user's keys, and materialises values lazily. A
//! reader handle tolerates being duplicated across a `fork()` boundary by
//! checking the current process identity on every access.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::codec::{lookup, CodecRef};
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::footer::{self, Footer};
use crate::index::IndexStore;
use crate::key::Key;
use crate::locator::RecordLocator;
use crate::options::{split_path_spec, ColumnDef, ReaderOptions};
use crate::stream::Stream;
use crate::value::Value;

/// An on-demand row accessor: at most one disk read and one decode per
/// column access (§4.F "row materialisation").
pub struct RowView<'a> {
	reader: &'a Reader,
	locator: RecordLocator,
}

impl<'a> RowView<'a> {
	pub fn by_name(&self, name: &str) -> Result<Value> {
		let idx = self
			.reader
			.column_index(name)
			.ok_or_else(|| Error::NotFound(format!("no such column `{}`", name)))?;
		self.by_index(idx)
	}

	pub fn by_index(&self, index: usize) -> Result<Value> {
		match &self.locator {
			RecordLocator::Unstructured(loc) => {
				if index != 0 {
					return Err(Error::NotFound(format!("no column at index {}", index)));
				}
				let bytes = self.reader.stream_get(loc.0, loc.1)?;
				self.reader.default_codec.decode(&bytes)
			}
			RecordLocator::Columnar(slots) => {
				let slot = slots
					.get(index)
					.copied()
					.ok_or_else(|| Error::NotFound(format!("no column at index {}", index)))?;
				match slot {
					Some((offset, len)) => self.reader.decode_at(offset, len, index),
					None => Ok(Value::Null),
				}
			}
		}
	}

	pub fn column_count(&self) -> usize {
		self.locator.column_count()
	}
}

pub struct Reader {
	stream: RefCell<Stream>,
	path: PathBuf,
	pid: Cell<u32>,
	compression: Compression,
	pub(crate) default_codec: CodecRef,
	index: IndexStore,
	view: Vec<Key>,
	view_spec: Option<String>,
	property_cache: RefCell<HashMap<String, Value>>,
}

impl Reader {
	/// Opens `path_spec`, which may carry a `^split-spec` suffix (§6 Path
	/// surface) equivalent to passing `ReaderOptions::with_split`.
	pub fn open(path_spec: &str) -> Result<Reader> {
		let (path, spec) = split_path_spec(path_spec);
		let options = match spec {
			Some(spec) => ReaderOptions::default().with_split(spec),
			None => ReaderOptions::default(),
		};
		Reader::open_path(path, options)
	}

	pub fn open_path(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Reader> {
		let path = path.as_ref().to_path_buf();
		let file = File::open(&path)?;
		let file_len = file.metadata()?.len();

		let trailer = footer::read_tail(&file, footer::TRAILER_LEN)?;
		let footer_len = u64::from_le_bytes(trailer[4..12].try_into().unwrap());
		if footer_len > file_len.saturating_sub(footer::TRAILER_LEN) {
			return Err(Error::InvalidFile("footer length exceeds file size".into()));
		}
		let body_start = file_len - footer::TRAILER_LEN - footer_len;
		let body = footer::read_at_owned(&file, body_start, footer_len)?;
		footer::verify_trailer(&body, &trailer)?;
		let footer = Footer::decode(&body)?;

		let default_codec = lookup(&footer.default_codec).map_err(|_| {
			Error::InvalidFile(format!("default codec `{}` is not registered", footer.default_codec))
		})?;

		let mut column_def = Vec::with_capacity(footer.column_def.len());
		for (name, codec_name) in &footer.column_def {
			let codec = lookup(codec_name)?;
			column_def.push(ColumnDef::new(name.clone(), codec));
		}

		let mut index = IndexStore::new(column_def);
		for (key, locator) in &footer.index {
			index.rows.insert(key.clone(), locator.clone());
		}
		if !index.column_def.is_empty() {
			for (key, locator) in index.rows.iter() {
				if locator.column_count() != index.column_def.len() {
					return Err(Error::InvalidFile(format!(
						"row {} has {} columns, expected {}",
						key,
						locator.column_count(),
						index.column_def.len()
					)));
				}
			}
		}
		for (key, locator) in index.rows.iter() {
			if locator.max_extent() > body_start {
				return Err(Error::InvalidFile(format!(
					"locator for {} extends into the footer region",
					key
				)));
			}
		}
		index.splits = footer.splits.clone();
		for (name, keys) in &index.splits {
			for key in keys {
				if !index.rows.contains_key(key) {
					return Err(Error::InvalidFile(format!(
						"split `{}` references unknown key {}",
						name, key
					)));
				}
			}
		}
		for (name, raw) in footer.properties {
			index.properties.insert(name, raw);
		}

		let view_spec = options.split.clone();
		let view = index.view_keys(view_spec.as_deref())?;

		log::debug!(target: "fdd", "opened {} with {} rows", path.display(), index.rows.len());

		Ok(Reader {
			stream: RefCell::new(Stream::new(file, footer.compression, body_start)),
			path,
			pid: Cell::new(std::process::id()),
			compression: footer.compression,
			default_codec,
			index,
			view,
			view_spec,
			property_cache: RefCell::new(HashMap::new()),
		})
	}

	fn check_fork(&self) -> Result<()> {
		if self.pid.get() != std::process::id() {
			log::debug!(target: "fdd", "reader for {} crossed a fork, reopening fd", self.path.display());
			let file = File::open(&self.path)?;
			self.stream.borrow_mut().replace_file(file);
			self.pid.set(std::process::id());
		}
		Ok(())
	}

	fn stream_get(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
		self.check_fork()?;
		self.stream.borrow().get(offset, len)
	}

	pub(crate) fn read_raw(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
		self.check_fork()?;
		self.stream.borrow().get_raw(offset, len)
	}

	pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
		self.index.column_def.iter().position(|c| c.name == name)
	}

	pub(crate) fn column_codec_name(&self, index: usize) -> &str {
		self.index.column_def[index].codec.name()
	}

	pub(crate) fn decode_at(&self, offset: u64, len: u64, column_index: usize) -> Result<Value> {
		let bytes = self.stream_get(offset, len)?;
		self.index.column_def[column_index].codec.decode(&bytes)
	}

	/// Decodes an unstructured record's sole blob under this file's default
	/// codec. Used by pass-through copy when source/destination compression
	/// differ and the blob must be decompressed under the source's algorithm
	/// before being re-encoded under the destination's.
	pub(crate) fn decode_default(&self, offset: u64, len: u64) -> Result<Value> {
		let bytes = self.stream_get(offset, len)?;
		self.default_codec.decode(&bytes)
	}

	pub(crate) fn compression(&self) -> Compression {
		self.compression
	}

	pub(crate) fn locator(&self, key: &Key) -> Option<&RecordLocator> {
		self.index.rows.get(key)
	}

	/// Reconstructs the footer representation, used by `Writer::reopen` to
	/// resume a write session from the file this reader opened.
	pub(crate) fn into_footer(self) -> Footer {
		Footer {
			compression: self.compression,
			default_codec: self.default_codec.name().to_owned(),
			column_def: self
				.index
				.column_def
				.iter()
				.map(|c| (c.name.clone(), c.codec.name().to_owned()))
				.collect(),
			properties: self.index.properties.into_iter().collect(),
			splits: self.index.splits,
			index: self.index.rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
		}
	}

	pub fn len(&self) -> usize {
		self.view.len()
	}

	pub fn is_empty(&self) -> bool {
		self.view.is_empty()
	}

	pub fn contains_key(&self, key: &Key) -> bool {
		self.view.contains(key)
	}

	pub fn get(&self, key: &Key) -> Result<RowView<'_>> {
		if !self.view.contains(key) {
			return Err(Error::NotFound(format!("key {} not in active view", key)));
		}
		let locator = self
			.index
			.rows
			.get(key)
			.ok_or_else(|| Error::NotFound(format!("key {} not found", key)))?
			.clone();
		Ok(RowView { reader: self, locator })
	}

	/// Reads back a whole unstructured record, mirroring `set`'s
	/// `RecordInput::Single` path.
	pub fn get_value(&self, key: &Key) -> Result<Value> {
		let row = self.get(key)?;
		row.by_index(0)
	}

	pub fn keys(&self) -> impl Iterator<Item = &Key> {
		self.view.iter()
	}

	pub fn items(&self) -> impl Iterator<Item = (&Key, RowView<'_>)> {
		self.view.iter().map(move |key| {
			let locator = self.index.rows.get(key).expect("view keys are always indexed").clone();
			(key, RowView { reader: self, locator })
		})
	}

	/// Extends the active view with another split's keys, deduplicated and
	/// appended in order (§4.C `load_new_split`).
	pub fn load_new_split(&mut self, name: &str) -> Result<()> {
		let mut seen: std::collections::HashSet<Key> = self.view.iter().cloned().collect();
		for key in self.index.split(name)? {
			if seen.insert(key.clone()) {
				self.view.push(key.clone());
			}
		}
		self.view_spec = Some(match self.view_spec.take() {
			Some(existing) => format!("{}+{}", existing, name),
			None => name.to_owned(),
		});
		Ok(())
	}

	pub fn property(&self, name: &str) -> Result<Value> {
		if let Some(cached) = self.property_cache.borrow().get(name) {
			return Ok(cached.clone());
		}
		let raw = self
			.index
			.properties
			.get(name)
			.ok_or_else(|| Error::NotFound(format!("no such property `{}`", name)))?;
		let value = self.default_codec.decode(raw)?;
		self.property_cache.borrow_mut().insert(name.to_owned(), value.clone());
		Ok(value)
	}

	pub fn property_names(&self) -> impl Iterator<Item = &String> {
		self.index.properties.keys()
	}

	pub fn column_def(&self) -> &[ColumnDef] {
		&self.index.column_def
	}
}

