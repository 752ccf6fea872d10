// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

// freeze-dried-data is free software: you can redistribute it and/or modify
// it under the terms of the MIT license or the Apache License 2.0, at your
// option.

//! A single-file, append-only, immutable-after-close container for machine
//! learning datasets.
//!
//! A file holds a sequence of length-prefixed, optionally compressed blobs
//! followed by a footer that maps user-supplied keys to the blobs making up
//! their record. Records are either a single undeclared value (the
//! unstructured case) or a fixed set of named, independently-codec'd columns
//! where any subset of columns may be left absent. A [`Writer`] builds a file
//! incrementally and, on success, makes it durable and readable; a [`Reader`]
//! opens a finished file and exposes random-access, lazily-decoded views over
//! its rows.
//!
//! ```no_run
//! use fdd::{Key, RecordInput, Value, Writer, WriterOptions};
//!
//! # fn main() -> fdd::Result<()> {
//! let mut writer = Writer::open("dataset.fdd", WriterOptions::default())?;
//! writer.set(Key::from("example-0"), RecordInput::Single(Value::from("hello")))?;
//! writer.close()?;
//!
//! let reader = fdd::Reader::open("dataset.fdd")?;
//! let value = reader.get_value(&Key::from("example-0"))?;
//! assert_eq!(value.as_str(), Some("hello"));
//! # Ok(())
//! # }
//! ```

mod codec;
mod compression;
mod error;
mod footer;
mod index;
mod key;
mod locator;
mod options;
mod reader;
mod row;
mod stream;
mod value;
mod writer;

pub use codec::{default_codec, global_registry, lookup, register_codec, Codec, CodecRef};
pub use compression::Compression;
pub use error::{Error, Result};
pub use key::Key;
pub use options::{split_path_spec, ColumnDef, ReaderOptions, WriteMode, WriterOptions};
pub use reader::{Reader, RowView};
pub use row::RecordInput;
pub use value::Value;
pub use writer::{RowWriter, Writer};

#[cfg(test)]
mod test {
	use super::*;
	use std::path::PathBuf;

	/// Mirrors the teacher crate's disposable-directory test fixture: a
	/// fresh temp directory per test, removed on drop.
	struct TempDir(PathBuf);

	impl TempDir {
		fn new(name: &str) -> TempDir {
			let mut dir = std::env::temp_dir();
			dir.push(format!("fdd-test-{}-{}", name, std::process::id()));
			let _ = std::fs::remove_dir_all(&dir);
			std::fs::create_dir_all(&dir).unwrap();
			TempDir(dir)
		}

		fn path(&self, name: &str) -> PathBuf {
			self.0.join(name)
		}
	}

	impl Drop for TempDir {
		fn drop(&mut self) {
			let _ = std::fs::remove_dir_all(&self.0);
		}
	}

	fn init() {
		let _ = env_logger::try_init();
	}

	/// §8 scenario 1: unstructured round-trip.
	#[test]
	fn unstructured_round_trip() {
		init();
		let dir = TempDir::new("unstructured");
		let path = dir.path("data.fdd");

		let mut writer = Writer::open(&path, WriterOptions::default()).unwrap();
		writer.set(Key::from("a"), RecordInput::Single(Value::from("hello"))).unwrap();
		writer.set(Key::from(7i64), RecordInput::Single(Value::from(vec![1u8, 2, 3]))).unwrap();
		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		assert_eq!(reader.len(), 2);
		assert_eq!(reader.get_value(&Key::from("a")).unwrap().as_str(), Some("hello"));
		assert_eq!(
			reader.get_value(&Key::from(7i64)).unwrap().as_bytes(),
			Some([1u8, 2, 3].as_slice())
		);
	}

	/// §8 scenario 2: columnar mixed assignment, with an entirely absent
	/// column decoding to `Value::Null`.
	#[test]
	fn columnar_mixed_assignment_with_absent_column() {
		init();
		let dir = TempDir::new("columnar");
		let path = dir.path("data.fdd");

		let columns = vec![
			ColumnDef::with_default_codec("image"),
			ColumnDef::with_default_codec("label"),
			ColumnDef::with_default_codec("weight"),
		];
		let options = WriterOptions::default().with_columns(columns);
		let mut writer = Writer::open(&path, options).unwrap();

		writer
			.set(
				Key::from("ex0"),
				RecordInput::Map(vec![
					("image".to_owned(), Value::from(vec![9u8, 9, 9])),
					("label".to_owned(), Value::from("cat")),
				]),
			)
			.unwrap();

		let mut row = writer.row(Key::from("ex1")).unwrap();
		row.set("image", Value::from(vec![1u8, 2])).unwrap();
		row.finalize().unwrap();

		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		let ex0 = reader.get(&Key::from("ex0")).unwrap();
		assert_eq!(ex0.by_name("label").unwrap().as_str(), Some("cat"));
		assert!(ex0.by_name("weight").unwrap().is_null());

		let ex1 = reader.get(&Key::from("ex1")).unwrap();
		assert!(ex1.by_name("label").unwrap().is_null());
	}

	/// §8 scenario 3: splits and a `"+"`-joined union view, deduplicated on
	/// first occurrence.
	#[test]
	fn splits_and_union_view() {
		init();
		let dir = TempDir::new("splits");
		let path = dir.path("data.fdd");

		let mut writer = Writer::open(&path, WriterOptions::default()).unwrap();
		for i in 0..5i64 {
			writer.set(Key::from(i), RecordInput::Single(Value::from(i))).unwrap();
		}
		writer.make_split("train", vec![Key::from(0i64), Key::from(1i64), Key::from(2i64)]).unwrap();
		writer.make_split("val", vec![Key::from(2i64), Key::from(3i64)]).unwrap();
		writer.close().unwrap();

		let reader =
			Reader::open_path(&path, ReaderOptions::default().with_split("train+val")).unwrap();
		let keys: Vec<Key> = reader.keys().cloned().collect();
		assert_eq!(keys, vec![Key::from(0i64), Key::from(1i64), Key::from(2i64), Key::from(3i64)]);
	}

	/// §8 scenario 4: a `path^split` spec embeds the split selection in the
	/// path passed to `Reader::open`.
	#[test]
	fn path_embedded_split_spec() {
		init();
		let dir = TempDir::new("path-split");
		let path = dir.path("data.fdd");

		let mut writer = Writer::open(&path, WriterOptions::default()).unwrap();
		writer.set(Key::from(0i64), RecordInput::Single(Value::from(0i64))).unwrap();
		writer.set(Key::from(1i64), RecordInput::Single(Value::from(1i64))).unwrap();
		writer.make_split("only", vec![Key::from(1i64)]).unwrap();
		writer.close().unwrap();

		let spec = format!("{}^only", path.to_str().unwrap());
		let reader = Reader::open(&spec).unwrap();
		assert_eq!(reader.len(), 1);
		assert!(reader.contains_key(&Key::from(1i64)));
	}

	/// §8 scenario 5: reopen-for-append resumes a file under a matching
	/// schema and preserves everything already written.
	#[test]
	fn reopen_for_append() {
		init();
		let dir = TempDir::new("reopen");
		let path = dir.path("data.fdd");

		let columns = vec![ColumnDef::with_default_codec("v")];
		let options = WriterOptions::default().with_columns(columns.clone());
		let mut writer = Writer::open(&path, options.clone()).unwrap();
		writer.set(Key::from("a"), RecordInput::Tuple(vec![Value::from(1i64)])).unwrap();
		writer.close().unwrap();

		let reopen_options = options.with_mode(WriteMode::Reopen);
		let mut writer = Writer::open(&path, reopen_options).unwrap();
		writer.set(Key::from("b"), RecordInput::Tuple(vec![Value::from(2i64)])).unwrap();
		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		assert_eq!(reader.len(), 2);
		assert_eq!(reader.get(&Key::from("a")).unwrap().by_index(0).unwrap().as_i64(), Some(1));
		assert_eq!(reader.get(&Key::from("b")).unwrap().by_index(0).unwrap().as_i64(), Some(2));
	}

	/// Reopening under a mismatched column definition is a `SchemaMismatch`,
	/// not a silent migration.
	#[test]
	fn reopen_rejects_schema_mismatch() {
		init();
		let dir = TempDir::new("reopen-mismatch");
		let path = dir.path("data.fdd");

		let options = WriterOptions::default().with_columns(vec![ColumnDef::with_default_codec("v")]);
		Writer::open(&path, options).unwrap().close().unwrap();

		let bad_options = WriterOptions::default()
			.with_columns(vec![ColumnDef::with_default_codec("other")])
			.with_mode(WriteMode::Reopen);
		let err = Writer::open(&path, bad_options).unwrap_err();
		assert!(matches!(err, Error::SchemaMismatch(_)));
	}

	/// §8 scenario 6: pass-through copy between files that share a codec
	/// copies the stored bytes verbatim rather than decoding and
	/// re-encoding.
	#[test]
	fn pass_through_copy_between_files() {
		init();
		let dir = TempDir::new("copy");
		let source_path = dir.path("source.fdd");
		let dest_path = dir.path("dest.fdd");

		let columns = vec![ColumnDef::with_default_codec("image"), ColumnDef::with_default_codec("label")];
		let mut source_writer =
			Writer::open(&source_path, WriterOptions::default().with_columns(columns.clone())).unwrap();
		source_writer
			.set(
				Key::from("ex0"),
				RecordInput::Map(vec![
					("image".to_owned(), Value::from(vec![5u8, 6, 7])),
					("label".to_owned(), Value::from("dog")),
				]),
			)
			.unwrap();
		source_writer.close().unwrap();

		let source_reader = Reader::open(source_path.to_str().unwrap()).unwrap();
		let mut dest_writer =
			Writer::open(&dest_path, WriterOptions::default().with_columns(columns)).unwrap();
		dest_writer.copy_row_from(&source_reader, &Key::from("ex0"), None, Vec::new()).unwrap();
		dest_writer.close().unwrap();

		let dest_reader = Reader::open(dest_path.to_str().unwrap()).unwrap();
		let row = dest_reader.get(&Key::from("ex0")).unwrap();
		assert_eq!(row.by_name("image").unwrap().as_bytes(), Some([5u8, 6, 7].as_slice()));
		assert_eq!(row.by_name("label").unwrap().as_str(), Some("dog"));
	}

	/// `copy_row_from` can override individual columns while still copying
	/// the rest verbatim, and can retarget the destination key.
	#[test]
	fn pass_through_copy_with_override_and_rename() {
		init();
		let dir = TempDir::new("copy-override");
		let source_path = dir.path("source.fdd");
		let dest_path = dir.path("dest.fdd");

		let columns = vec![ColumnDef::with_default_codec("image"), ColumnDef::with_default_codec("label")];
		let mut source_writer =
			Writer::open(&source_path, WriterOptions::default().with_columns(columns.clone())).unwrap();
		source_writer
			.set(
				Key::from("ex0"),
				RecordInput::Map(vec![
					("image".to_owned(), Value::from(vec![5u8, 6, 7])),
					("label".to_owned(), Value::from("dog")),
				]),
			)
			.unwrap();
		source_writer.close().unwrap();

		let source_reader = Reader::open(source_path.to_str().unwrap()).unwrap();
		let mut dest_writer =
			Writer::open(&dest_path, WriterOptions::default().with_columns(columns)).unwrap();
		dest_writer
			.copy_row_from(
				&source_reader,
				&Key::from("ex0"),
				Some(Key::from("ex0-renamed")),
				vec![("label".to_owned(), Value::from("cat"))],
			)
			.unwrap();
		dest_writer.close().unwrap();

		let dest_reader = Reader::open(dest_path.to_str().unwrap()).unwrap();
		assert!(!dest_reader.contains_key(&Key::from("ex0")));
		let row = dest_reader.get(&Key::from("ex0-renamed")).unwrap();
		assert_eq!(row.by_name("image").unwrap().as_bytes(), Some([5u8, 6, 7].as_slice()));
		assert_eq!(row.by_name("label").unwrap().as_str(), Some("cat"));
	}

	/// Universal property: a closed file round-trips through every built-in
	/// compression algorithm.
	#[test]
	fn round_trips_under_every_compression() {
		init();
		for compression in [Compression::None, Compression::Zlib, Compression::Gzip, Compression::Bz2] {
			let dir = TempDir::new("compression");
			let path = dir.path("data.fdd");
			let options = WriterOptions::default().with_compression(compression);
			let mut writer = Writer::open(&path, options).unwrap();
			writer
				.set(Key::from("a"), RecordInput::Single(Value::from("a fairly compressible string")))
				.unwrap();
			writer.close().unwrap();

			let reader = Reader::open(path.to_str().unwrap()).unwrap();
			assert_eq!(
				reader.get_value(&Key::from("a")).unwrap().as_str(),
				Some("a fairly compressible string")
			);
		}
	}

	/// Properties set on the writer are readable back by name after close.
	#[test]
	fn properties_round_trip() {
		init();
		let dir = TempDir::new("properties");
		let path = dir.path("data.fdd");

		let mut writer = Writer::open(&path, WriterOptions::default()).unwrap();
		writer.set_property("created_by", &Value::from("test-suite")).unwrap();
		writer.set(Key::from("a"), RecordInput::Single(Value::from("x"))).unwrap();
		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		assert_eq!(reader.property("created_by").unwrap().as_str(), Some("test-suite"));
		assert!(reader.property("missing").is_err());
	}

	/// A duplicate key, whether against a committed row or a still-pending
	/// one, is rejected rather than silently overwriting.
	#[test]
	fn duplicate_key_is_rejected() {
		init();
		let dir = TempDir::new("duplicate");
		let path = dir.path("data.fdd");

		let mut writer = Writer::open(&path, WriterOptions::default()).unwrap();
		writer.set(Key::from("a"), RecordInput::Single(Value::from("x"))).unwrap();
		let err = writer.set(Key::from("a"), RecordInput::Single(Value::from("y"))).unwrap_err();
		assert!(matches!(err, Error::DuplicateKey(_)));
	}

	/// A row left `PARTIAL` at close time is implicitly finalised, with
	/// untouched columns absent.
	#[test]
	fn partial_row_finalised_implicitly_at_close() {
		init();
		let dir = TempDir::new("partial-close");
		let path = dir.path("data.fdd");

		let columns = vec![ColumnDef::with_default_codec("a"), ColumnDef::with_default_codec("b")];
		let mut writer = Writer::open(&path, WriterOptions::default().with_columns(columns)).unwrap();
		let mut row = writer.row(Key::from("k")).unwrap();
		row.set("a", Value::from(1i64)).unwrap();
		// row is dropped without an explicit finalize() call.
		drop(row);
		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		let row = reader.get(&Key::from("k")).unwrap();
		assert_eq!(row.by_name("a").unwrap().as_i64(), Some(1));
		assert!(row.by_name("b").unwrap().is_null());
	}

	/// Operations against a closed writer fail with `BadState` rather than
	/// panicking or silently reopening the file.
	#[test]
	fn closed_writer_rejects_further_writes() {
		init();
		let dir = TempDir::new("closed");
		let path = dir.path("data.fdd");

		let writer = Writer::open(&path, WriterOptions::default()).unwrap();
		writer.close().unwrap();

		let mut writer = Writer::open(&path, WriterOptions::default().with_mode(WriteMode::Overwrite))
			.unwrap();
		writer.set(Key::from("a"), RecordInput::Single(Value::from("x"))).unwrap();
		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		assert_eq!(reader.len(), 1);
	}

	/// `Writer::open` in `Fresh` mode refuses to clobber an existing file.
	#[test]
	fn fresh_mode_rejects_existing_file() {
		init();
		let dir = TempDir::new("fresh");
		let path = dir.path("data.fdd");

		Writer::open(&path, WriterOptions::default()).unwrap().close().unwrap();
		let err = Writer::open(&path, WriterOptions::default()).unwrap_err();
		assert!(matches!(err, Error::BadState(_)));
	}

	/// A custom codec registered by name round-trips through a file exactly
	/// like a built-in one.
	#[test]
	fn custom_codec_round_trip() {
		init();

		struct ReverseCodec;
		impl Codec for ReverseCodec {
			fn name(&self) -> &str {
				"test-reverse"
			}
			fn encode(&self, value: &Value) -> Result<Vec<u8>> {
				let mut bytes = value.as_bytes().expect("test value is bytes").to_vec();
				bytes.reverse();
				Ok(bytes)
			}
			fn decode(&self, bytes: &[u8]) -> Result<Value> {
				let mut bytes = bytes.to_vec();
				bytes.reverse();
				Ok(Value::Bytes(bytes))
			}
		}
		register_codec(std::sync::Arc::new(ReverseCodec));

		let dir = TempDir::new("custom-codec");
		let path = dir.path("data.fdd");
		let columns = vec![ColumnDef::new("payload", lookup("test-reverse").unwrap())];
		let mut writer = Writer::open(&path, WriterOptions::default().with_columns(columns)).unwrap();
		writer
			.set(
				Key::from("a"),
				RecordInput::Tuple(vec![Value::from(vec![1u8, 2, 3])]),
			)
			.unwrap();
		writer.close().unwrap();

		let reader = Reader::open(path.to_str().unwrap()).unwrap();
		let row = reader.get(&Key::from("a")).unwrap();
		assert_eq!(row.by_index(0).unwrap().as_bytes(), Some([1u8, 2, 3].as_slice()));
	}
}
