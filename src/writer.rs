// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The writer (spec §4.E): orchestrates the codec registry, stream layer,
//! index store and row assembly engine during a write session, and emits
//! the footer on close.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::codec::CodecRef;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::footer::Footer;
use crate::index::IndexStore;
use crate::key::Key;
use crate::locator::RecordLocator;
use crate::options::{ColumnDef, WriteMode, WriterOptions};
use crate::reader::Reader;
use crate::row::{PendingRow, RecordInput};
use crate::stream::Stream;
use crate::value::Value;

pub struct Writer {
	stream: Stream,
	path: PathBuf,
	compression: Compression,
	default_codec: CodecRef,
	index: IndexStore,
	pending: HashMap<Key, PendingRow>,
	closed: bool,
}

fn column_defs_match(a: &[ColumnDef], footer: &[(String, String)]) -> bool {
	if a.len() != footer.len() {
		return false;
	}
	a.iter().zip(footer.iter()).all(|(c, (name, codec))| &c.name == name && c.codec.name() == codec)
}

impl Writer {
	pub fn open(path: impl AsRef<Path>, options: WriterOptions) -> Result<Writer> {
		let path = path.as_ref().to_path_buf();
		match options.mode {
			WriteMode::Fresh => {
				if path.exists() {
					return Err(Error::BadState(format!("{} already exists", path.display())));
				}
				let file = OpenOptions::new().create_new(true).read(true).write(true).open(&path)?;
				log::debug!(target: "fdd", "created {}", path.display());
				Ok(Writer {
					stream: Stream::new(file, options.compression, 0),
					path,
					compression: options.compression,
					default_codec: options.default_codec,
					index: IndexStore::new(options.columns),
					pending: HashMap::new(),
					closed: false,
				})
			}
			WriteMode::Overwrite => {
				let file =
					OpenOptions::new().create(true).write(true).read(true).truncate(true).open(&path)?;
				log::debug!(target: "fdd", "overwrote {}", path.display());
				Ok(Writer {
					stream: Stream::new(file, options.compression, 0),
					path,
					compression: options.compression,
					default_codec: options.default_codec,
					index: IndexStore::new(options.columns),
					pending: HashMap::new(),
					closed: false,
				})
			}
			WriteMode::Reopen => Writer::reopen(path, options),
		}
	}

	fn reopen(path: PathBuf, options: WriterOptions) -> Result<Writer> {
		let reader = Reader::open_path(&path, crate::options::ReaderOptions::default())?;
		let footer = reader.into_footer();

		if footer.compression != options.compression {
			return Err(Error::SchemaMismatch(format!(
				"reopen compression {:?} does not match file's {:?}",
				options.compression, footer.compression
			)));
		}
		if !column_defs_match(&options.columns, &footer.column_def) {
			return Err(Error::SchemaMismatch(
				"reopen column definition does not match file's column definition".into(),
			));
		}

		let file = OpenOptions::new().read(true).write(true).open(&path)?;
		let file_len = file.metadata()?.len();
		let trailer_bytes = crate::footer::read_tail(&file, crate::footer::TRAILER_LEN)?;
		let footer_len = u64::from_le_bytes(trailer_bytes[4..12].try_into().unwrap());
		let data_len = file_len - crate::footer::TRAILER_LEN - footer_len;

		let mut stream = Stream::new(file, options.compression, data_len);
		stream.truncate(data_len)?;

		let mut index = IndexStore::new(options.columns);
		for (key, locator) in footer.index {
			index.rows.insert(key, locator);
		}
		index.splits = footer.splits;
		for (name, raw) in footer.properties {
			index.properties.insert(name, raw);
		}

		log::debug!(target: "fdd", "reopened {} at offset {}", path.display(), data_len);

		Ok(Writer {
			stream,
			path,
			compression: options.compression,
			default_codec: options.default_codec,
			index,
			pending: HashMap::new(),
			closed: false,
		})
	}

	fn ensure_open(&self) -> Result<()> {
		if self.closed {
			return Err(Error::BadState("writer is closed".into()));
		}
		Ok(())
	}

	fn ensure_new_key(&self, key: &Key) -> Result<()> {
		if self.index.rows.contains_key(key) || self.pending.contains_key(key) {
			return Err(Error::DuplicateKey(format!("key {} already present", key)));
		}
		Ok(())
	}

	fn column_index(&self, name: &str) -> Result<usize> {
		self.index
			.column_def
			.iter()
			.position(|c| c.name == name)
			.ok_or_else(|| Error::NotFound(format!("no such column `{}`", name)))
	}

	/// Whole-row assignment (§4.D form 1).
	pub fn set(&mut self, key: impl Into<Key>, record: RecordInput) -> Result<()> {
		self.ensure_open()?;
		let key = key.into();
		self.ensure_new_key(&key)?;

		let locator = if self.index.column_def.is_empty() {
			match record {
				RecordInput::Single(value) => {
					let bytes = self.default_codec.encode(&value)?;
					let (offset, len) = self.stream.put(&bytes)?;
					RecordLocator::Unstructured((offset, len))
				}
				_ => {
					return Err(Error::BadState(
						"no columns declared: set() requires a single value".into(),
					))
				}
			}
		} else {
			let mut slots = vec![None; self.index.column_def.len()];
			match record {
				RecordInput::Map(fields) => {
					for (name, value) in fields {
						let idx = self.column_index(&name)?;
						let codec = self.index.column_def[idx].codec.clone();
						let bytes = codec.encode(&value)?;
						let (offset, len) = self.stream.put(&bytes)?;
						slots[idx] = Some((offset, len));
					}
				}
				RecordInput::Tuple(values) => {
					if values.len() > self.index.column_def.len() {
						return Err(Error::BadState("more values than declared columns".into()));
					}
					for (idx, value) in values.into_iter().enumerate() {
						let codec = self.index.column_def[idx].codec.clone();
						let bytes = codec.encode(&value)?;
						let (offset, len) = self.stream.put(&bytes)?;
						slots[idx] = Some((offset, len));
					}
				}
				RecordInput::Single(_) => {
					return Err(Error::BadState(
						"columns are declared: use Map or Tuple, not a single value".into(),
					))
				}
			}
			RecordLocator::Columnar(slots)
		};

		self.index.rows.insert(key, locator);
		Ok(())
	}

	/// Piecewise assignment (§4.D form 2). Returns a handle that assigns
	/// one column at a time; the row is committed on `finalize()` or at
	/// `close()`.
	pub fn row(&mut self, key: impl Into<Key>) -> Result<RowWriter<'_>> {
		self.ensure_open()?;
		let key = key.into();
		if self.index.rows.contains_key(&key) {
			return Err(Error::DuplicateKey(format!("key {} already present", key)));
		}
		self.pending.entry(key.clone()).or_insert_with(|| PendingRow::new(self.index.column_def.len()));
		Ok(RowWriter { writer: self, key })
	}

	/// Commits a pending row immediately (moves its slots into the
	/// committed index). Called by [`RowWriter::finalize`] and, for every
	/// row still pending, by `close()`.
	fn finalize_row(&mut self, key: &Key) -> Result<()> {
		let pending = self
			.pending
			.remove(key)
			.ok_or_else(|| Error::BadState(format!("no pending row for key {}", key)))?;
		self.index.rows.insert(key.clone(), RecordLocator::Columnar(pending.slots));
		Ok(())
	}

	/// The reader-style snapshot of a key's currently known columns,
	/// whatever state the row is in (§4.D "Attempting to access a key that
	/// is currently PARTIAL").
	pub fn peek_row(&self, key: &Key) -> Result<Option<Vec<Option<Value>>>> {
		let slots: &[Option<(u64, u64)>] = if let Some(pending) = self.pending.get(key) {
			&pending.slots
		} else if let Some(locator) = self.index.rows.get(key) {
			match locator {
				RecordLocator::Columnar(slots) => slots.as_slice(),
				RecordLocator::Unstructured(loc) => {
					let bytes = self.stream.get(loc.0, loc.1)?;
					return Ok(Some(vec![Some(self.default_codec.decode(&bytes)?)]));
				}
			}
		} else {
			return Ok(None);
		};

		let mut out = Vec::with_capacity(slots.len());
		for (idx, slot) in slots.iter().enumerate() {
			match slot {
				Some((offset, len)) => {
					let bytes = self.stream.get(*offset, *len)?;
					let codec = &self.index.column_def[idx].codec;
					out.push(Some(codec.decode(&bytes)?));
				}
				None => out.push(None),
			}
		}
		Ok(Some(out))
	}

	pub fn set_property(&mut self, name: impl Into<String>, value: &Value) -> Result<()> {
		self.ensure_open()?;
		let bytes = self.default_codec.encode(value)?;
		self.index.properties.insert(name.into(), bytes);
		Ok(())
	}

	pub fn make_split(&mut self, name: &str, keys: Vec<Key>) -> Result<()> {
		self.ensure_open()?;
		self.index.make_split(name, keys)
	}

	pub fn add_to_split(&mut self, name: &str, keys: Vec<Key>) -> Result<()> {
		self.ensure_open()?;
		self.index.add_to_split(name, keys)
	}

	pub fn replace_split(&mut self, name: &str, keys: Vec<Key>) -> Result<()> {
		self.ensure_open()?;
		self.index.replace_split(name, keys)
	}

	/// Copies one row from `source` into this writer (§4.E
	/// `copy_row_from`). For each declared column, bytes are copied
	/// verbatim from the source blob when `overrides` doesn't supply that
	/// column, the two codecs share a name, *and* the source and
	/// destination files use the same compression algorithm (the stored
	/// bytes are that algorithm's output, not a compression-independent
	/// payload); otherwise the value is decoded from the source and
	/// re-encoded under this writer's codec and compression.
	pub fn copy_row_from(
		&mut self,
		source: &Reader,
		source_key: &Key,
		dest_key: Option<Key>,
		mut overrides: Vec<(String, Value)>,
	) -> Result<()> {
		self.ensure_open()?;
		let dest_key = dest_key.unwrap_or_else(|| source_key.clone());
		self.ensure_new_key(&dest_key)?;
		let same_compression = source.compression() == self.compression;

		let source_locator = source
			.locator(source_key)
			.ok_or_else(|| Error::NotFound(format!("key {} not present in source", source_key)))?
			.clone();

		if self.index.column_def.is_empty() {
			let (offset, len) = match source_locator {
				RecordLocator::Unstructured(loc) => loc,
				RecordLocator::Columnar(_) => {
					return Err(Error::SchemaMismatch("source row is columnar, destination is not".into()))
				}
			};
			let (dest_offset, dest_len) = if same_compression {
				let raw = source.read_raw(offset, len)?;
				self.stream.put_raw(&raw).map(|o| (o, raw.len() as u64))?
			} else {
				let value = source.decode_default(offset, len)?;
				let bytes = self.default_codec.encode(&value)?;
				self.stream.put(&bytes)?
			};
			self.index.rows.insert(dest_key, RecordLocator::Unstructured((dest_offset, dest_len)));
			return Ok(());
		}

		let source_slots = match &source_locator {
			RecordLocator::Columnar(slots) => slots.clone(),
			RecordLocator::Unstructured(_) => {
				return Err(Error::SchemaMismatch("source row is unstructured, destination is not".into()))
			}
		};

		let mut dest_slots = vec![None; self.index.column_def.len()];
		for (dest_idx, column) in self.index.column_def.iter().enumerate() {
			if let Some(pos) = overrides.iter().position(|(name, _)| name == &column.name) {
				let (_, value) = overrides.swap_remove(pos);
				let bytes = column.codec.encode(&value)?;
				let (offset, len) = self.stream.put(&bytes)?;
				dest_slots[dest_idx] = Some((offset, len));
				continue;
			}

			let source_idx = source.column_index(&column.name);
			let source_idx = match source_idx {
				Some(idx) => idx,
				None => continue,
			};
			let source_slot = source_slots.get(source_idx).copied().flatten();
			let source_slot = match source_slot {
				Some(slot) => slot,
				None => continue,
			};

			let source_codec_name = source.column_codec_name(source_idx);
			if same_compression && source_codec_name == column.codec.name() {
				let raw = source.read_raw(source_slot.0, source_slot.1)?;
				let offset = self.stream.put_raw(&raw)?;
				dest_slots[dest_idx] = Some((offset, raw.len() as u64));
			} else {
				let decoded = source.decode_at(source_slot.0, source_slot.1, source_idx)?;
				let bytes = column.codec.encode(&decoded)?;
				let (offset, len) = self.stream.put(&bytes)?;
				dest_slots[dest_idx] = Some((offset, len));
			}
		}

		self.index.rows.insert(dest_key, RecordLocator::Columnar(dest_slots));
		Ok(())
	}

	/// Flushes any pending rows, writes the footer and trailer, and marks
	/// the writer closed. Further operations fail with `BadState`.
	pub fn close(mut self) -> Result<()> {
		self.ensure_open()?;
		let pending_keys: Vec<Key> = self.pending.keys().cloned().collect();
		for key in pending_keys {
			self.finalize_row(&key)?;
		}

		let footer_start = self.stream.cursor();
		for (key, locator) in self.index.rows.iter() {
			if locator.max_extent() > footer_start {
				return Err(Error::BadState(format!(
					"internal error: locator for {} extends past data region",
					key
				)));
			}
		}

		let footer = Footer {
			compression: self.compression,
			default_codec: self.default_codec.name().to_owned(),
			column_def: self
				.index
				.column_def
				.iter()
				.map(|c| (c.name.clone(), c.codec.name().to_owned()))
				.collect(),
			properties: self.index.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
			splits: self.index.splits.clone(),
			index: self.index.rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
		};

		let encoded = footer.encode_with_trailer();
		self.stream.put_raw(&encoded)?;
		self.stream.flush()?;
		self.stream.sync()?;
		self.closed = true;
		log::debug!(target: "fdd", "closed {} with {} rows", self.path.display(), footer.index.len());
		Ok(())
	}
}

/// A handle for piecewise row assignment, returned by [`Writer::row`].
pub struct RowWriter<'a> {
	writer: &'a mut Writer,
	key: Key,
}

impl<'a> RowWriter<'a> {
	pub fn set(&mut self, column: &str, value: Value) -> Result<()> {
		let idx = self.writer.column_index(column)?;
		self.set_by_index(idx, value)
	}

	pub fn set_by_index(&mut self, index: usize, value: Value) -> Result<()> {
		if index >= self.writer.index.column_def.len() {
			return Err(Error::NotFound(format!("no column at index {}", index)));
		}
		let codec = self.writer.index.column_def[index].codec.clone();
		let bytes = codec.encode(&value)?;
		let (offset, len) = self.writer.stream.put(&bytes)?;
		let pending = self
			.writer
			.pending
			.get_mut(&self.key)
			.expect("row() always allocates a pending entry for its key");
		pending.slots[index] = Some((offset, len));
		Ok(())
	}

	/// Commits the row now rather than waiting for `close()`.
	pub fn finalize(self) -> Result<()> {
		self.writer.finalize_row(&self.key)
	}
}
