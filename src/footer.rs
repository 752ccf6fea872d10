// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The footer: magic, compression, codecs, column-def, properties, splits
//! and index, all encoded into one trailing blob (spec §6, §6.1).
//!
//! The wire shape generalises the teacher crate's own length-prefixed
//! on-disk framing (see the `SIZE`-prefixed entries in `table.rs`) to
//! nested collections: every section is a `u32` count followed by, per
//! item, one or more `u32`-length-prefixed byte strings.

use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::locator::RecordLocator;

pub const FOOTER_MAGIC: &[u8; 8] = b"FDD\x00fmt1";
/// CRC32 (4 bytes) + FOOTER_LEN (8 bytes).
pub const TRAILER_LEN: u64 = 4 + 8;

/// Reads the last `len` bytes of `file` without disturbing any caller-owned
/// cursor (operates on a cloned handle). Used by both the reader and the
/// writer's reopen path to locate the trailer.
pub(crate) fn read_tail(file: &std::fs::File, len: u64) -> Result<Vec<u8>> {
	use std::io::{Read, Seek, SeekFrom};
	let file_len = file.metadata()?.len();
	if file_len < len {
		return Err(Error::InvalidFile("file too short to contain a trailer".into()));
	}
	let mut file = file.try_clone()?;
	file.seek(SeekFrom::Start(file_len - len))?;
	let mut buf = vec![0u8; len as usize];
	file.read_exact(&mut buf)?;
	Ok(buf)
}

/// Reads `len` bytes at `offset` from a cloned handle, leaving the
/// caller-owned cursor untouched.
pub(crate) fn read_at_owned(file: &std::fs::File, offset: u64, len: u64) -> Result<Vec<u8>> {
	use std::io::{Read, Seek, SeekFrom};
	let mut file = file.try_clone()?;
	file.seek(SeekFrom::Start(offset))?;
	let mut buf = vec![0u8; len as usize];
	file.read_exact(&mut buf)?;
	Ok(buf)
}

pub struct Footer {
	pub compression: Compression,
	pub default_codec: String,
	/// `(name, codec name)`.
	pub column_def: Vec<(String, String)>,
	/// `(name, raw encoded bytes)`.
	pub properties: Vec<(String, Vec<u8>)>,
	pub splits: Vec<(String, Vec<Key>)>,
	pub index: Vec<(Key, RecordLocator)>,
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
	buf.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
	buf.extend_from_slice(&v.to_le_bytes());
}

fn write_bytes(buf: &mut Vec<u8>, b: &[u8]) {
	write_u32(buf, b.len() as u32);
	buf.extend_from_slice(b);
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
	write_bytes(buf, s.as_bytes());
}

fn write_key(buf: &mut Vec<u8>, key: &Key) {
	buf.push(key.tag());
	write_bytes(buf, &key.payload());
}

fn write_slot(buf: &mut Vec<u8>, slot: Option<(u64, u64)>) {
	match slot {
		Some((offset, len)) => {
			buf.push(1);
			write_u64(buf, offset);
			write_u64(buf, len);
		}
		None => buf.push(0),
	}
}

fn write_locator(buf: &mut Vec<u8>, locator: &RecordLocator) {
	match locator {
		RecordLocator::Unstructured((offset, len)) => {
			buf.push(0);
			write_u64(buf, *offset);
			write_u64(buf, *len);
		}
		RecordLocator::Columnar(slots) => {
			buf.push(1);
			write_u32(buf, slots.len() as u32);
			for slot in slots {
				write_slot(buf, *slot);
			}
		}
	}
}

impl Footer {
	pub fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		buf.extend_from_slice(FOOTER_MAGIC);
		buf.push(self.compression.tag());
		write_str(&mut buf, &self.default_codec);

		write_u32(&mut buf, self.column_def.len() as u32);
		for (name, codec) in &self.column_def {
			write_str(&mut buf, name);
			write_str(&mut buf, codec);
		}

		write_u32(&mut buf, self.properties.len() as u32);
		for (name, raw) in &self.properties {
			write_str(&mut buf, name);
			write_bytes(&mut buf, raw);
		}

		write_u32(&mut buf, self.splits.len() as u32);
		for (name, keys) in &self.splits {
			write_str(&mut buf, name);
			write_u32(&mut buf, keys.len() as u32);
			for key in keys {
				write_key(&mut buf, key);
			}
		}

		write_u32(&mut buf, self.index.len() as u32);
		for (key, locator) in &self.index {
			write_key(&mut buf, key);
			write_locator(&mut buf, locator);
		}

		buf
	}

	/// Wraps [`Footer::encode`]'s output with the CRC32 + length trailer
	/// that lands at the very end of the file (§6.1).
	pub fn encode_with_trailer(&self) -> Vec<u8> {
		let body = self.encode();
		let mut out = body.clone();
		let crc = crc32fast::hash(&body);
		out.extend_from_slice(&crc.to_le_bytes());
		out.extend_from_slice(&(body.len() as u64).to_le_bytes());
		out
	}

	pub fn decode(bytes: &[u8]) -> Result<Footer> {
		let mut cursor = Cursor::new(bytes);
		let magic = cursor.take(FOOTER_MAGIC.len())?;
		if magic != FOOTER_MAGIC.as_slice() {
			return Err(Error::InvalidFile("bad magic".into()));
		}
		let compression = Compression::from_tag(cursor.read_u8()?)?;
		let default_codec = cursor.read_string()?;

		let column_count = cursor.read_u32()? as usize;
		let mut column_def = Vec::with_capacity(column_count);
		for _ in 0..column_count {
			let name = cursor.read_string()?;
			let codec = cursor.read_string()?;
			column_def.push((name, codec));
		}

		let property_count = cursor.read_u32()? as usize;
		let mut properties = Vec::with_capacity(property_count);
		for _ in 0..property_count {
			let name = cursor.read_string()?;
			let raw = cursor.read_bytes()?;
			properties.push((name, raw));
		}

		let split_count = cursor.read_u32()? as usize;
		let mut splits = Vec::with_capacity(split_count);
		for _ in 0..split_count {
			let name = cursor.read_string()?;
			let key_count = cursor.read_u32()? as usize;
			let mut keys = Vec::with_capacity(key_count);
			for _ in 0..key_count {
				keys.push(cursor.read_key()?);
			}
			splits.push((name, keys));
		}

		let index_count = cursor.read_u32()? as usize;
		let mut index = Vec::with_capacity(index_count);
		for _ in 0..index_count {
			let key = cursor.read_key()?;
			let locator = cursor.read_locator()?;
			index.push((key, locator));
		}

		if !cursor.is_empty() {
			return Err(Error::InvalidFile("trailing bytes after footer body".into()));
		}

		Ok(Footer { compression, default_codec, column_def, properties, splits, index })
	}
}

struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	fn new(bytes: &'a [u8]) -> Cursor<'a> {
		Cursor { bytes, pos: 0 }
	}

	fn is_empty(&self) -> bool {
		self.pos == self.bytes.len()
	}

	fn take(&mut self, n: usize) -> Result<&'a [u8]> {
		if self.pos + n > self.bytes.len() {
			return Err(Error::InvalidFile("footer truncated".into()));
		}
		let slice = &self.bytes[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	fn read_u8(&mut self) -> Result<u8> {
		Ok(self.take(1)?[0])
	}

	fn read_u32(&mut self) -> Result<u32> {
		let b = self.take(4)?;
		Ok(u32::from_le_bytes(b.try_into().unwrap()))
	}

	fn read_u64(&mut self) -> Result<u64> {
		let b = self.take(8)?;
		Ok(u64::from_le_bytes(b.try_into().unwrap()))
	}

	fn read_bytes(&mut self) -> Result<Vec<u8>> {
		let len = self.read_u32()? as usize;
		Ok(self.take(len)?.to_vec())
	}

	fn read_string(&mut self) -> Result<String> {
		String::from_utf8(self.read_bytes()?).map_err(|e| Error::InvalidFile(e.to_string()))
	}

	fn read_key(&mut self) -> Result<Key> {
		let tag = self.read_u8()?;
		let payload = self.read_bytes()?;
		Key::from_tagged(tag, payload)
	}

	fn read_slot(&mut self) -> Result<Option<(u64, u64)>> {
		match self.read_u8()? {
			0 => Ok(None),
			1 => {
				let offset = self.read_u64()?;
				let len = self.read_u64()?;
				Ok(Some((offset, len)))
			}
			other => Err(Error::InvalidFile(format!("bad slot tag {}", other))),
		}
	}

	fn read_locator(&mut self) -> Result<RecordLocator> {
		match self.read_u8()? {
			0 => {
				let offset = self.read_u64()?;
				let len = self.read_u64()?;
				Ok(RecordLocator::Unstructured((offset, len)))
			}
			1 => {
				let count = self.read_u32()? as usize;
				let mut slots = Vec::with_capacity(count);
				for _ in 0..count {
					slots.push(self.read_slot()?);
				}
				Ok(RecordLocator::Columnar(slots))
			}
			other => Err(Error::InvalidFile(format!("bad locator tag {}", other))),
		}
	}
}

/// Validates the trailing `[CRC32][FOOTER_LEN]` pair against a candidate
/// footer body, per §6.1.
pub fn verify_trailer(body: &[u8], trailer: &[u8]) -> Result<()> {
	if trailer.len() != TRAILER_LEN as usize {
		return Err(Error::InvalidFile("short trailer".into()));
	}
	let crc = u32::from_le_bytes(trailer[0..4].try_into().unwrap());
	let len = u64::from_le_bytes(trailer[4..12].try_into().unwrap());
	if len as usize != body.len() {
		return Err(Error::InvalidFile("footer length mismatch".into()));
	}
	if crc32fast::hash(body) != crc {
		return Err(Error::InvalidFile("footer checksum mismatch".into()));
	}
	Ok(())
}
