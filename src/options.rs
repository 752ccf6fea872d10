// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! Constructor options for [`crate::Writer`] and [`crate::Reader`] (spec
//! §4.E, §4.F), following the shape of the teacher crate's
//! `options::ColumnOptions` (referenced from `column.rs`/`table.rs`): a
//! small, explicit struct with a `Default` impl rather than a builder
//! pattern with many chained setters.

use crate::codec::{default_codec, CodecRef};
use crate::compression::Compression;

/// An ordered `(name, codec)` pair declaring one record column.
#[derive(Clone)]
pub struct ColumnDef {
	pub name: String,
	pub codec: CodecRef,
}

impl ColumnDef {
	pub fn new(name: impl Into<String>, codec: CodecRef) -> ColumnDef {
		ColumnDef { name: name.into(), codec }
	}

	/// A plain name list is equivalent to a list of `(name, default_codec)`
	/// (§9 Open Question resolution).
	pub fn with_default_codec(name: impl Into<String>) -> ColumnDef {
		ColumnDef { name: name.into(), codec: default_codec() }
	}
}

/// How the writer should treat an existing file at `path` (§4.E `mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
	/// Fail if the file already exists.
	Fresh,
	/// Truncate any existing file and start empty.
	Overwrite,
	/// Load the existing footer, revert the file to just-before-footer, and
	/// resume appending.
	Reopen,
}

#[derive(Clone)]
pub struct WriterOptions {
	pub mode: WriteMode,
	pub columns: Vec<ColumnDef>,
	pub compression: Compression,
	pub default_codec: CodecRef,
}

impl Default for WriterOptions {
	fn default() -> WriterOptions {
		WriterOptions {
			mode: WriteMode::Fresh,
			columns: Vec::new(),
			compression: Compression::None,
			default_codec: default_codec(),
		}
	}
}

impl WriterOptions {
	pub fn with_columns(mut self, columns: Vec<ColumnDef>) -> WriterOptions {
		self.columns = columns;
		self
	}

	pub fn with_mode(mut self, mode: WriteMode) -> WriterOptions {
		self.mode = mode;
		self
	}

	pub fn with_compression(mut self, compression: Compression) -> WriterOptions {
		self.compression = compression;
		self
	}

	pub fn with_default_codec(mut self, codec: CodecRef) -> WriterOptions {
		self.default_codec = codec;
		self
	}
}

#[derive(Clone, Default)]
pub struct ReaderOptions {
	/// `None` is the union of all keys in insertion order; `Some(spec)` is
	/// a `+`-joined list of split names (§4.C `view`).
	pub split: Option<String>,
}

impl ReaderOptions {
	pub fn with_split(mut self, split: impl Into<String>) -> ReaderOptions {
		self.split = Some(split.into());
		self
	}
}

/// Splits a `"<path>^<split-spec>"` path surface into its components (§6
/// Path surface).
pub fn split_path_spec(path: &str) -> (&str, Option<&str>) {
	match path.find('^') {
		Some(idx) => (&path[..idx], Some(&path[idx + 1..])),
		None => (path, None),
	}
}
