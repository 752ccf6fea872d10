// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The stream I/O layer (spec §4.B): length-prefixed blob writes, seek+read
//! of blobs by `(offset, length)`, with optional per-blob compression.
//!
//! Positioned reads/writes follow `ValueTable::read_at`/`write_at` in the
//! teacher crate's `table.rs`: `FileExt::{read_exact_at, write_all_at}` on
//! unix, `FileExt::{seek_read, seek_write}` on windows, so that a shared
//! cursor never has to be synchronised between concurrent positioned
//! accesses on the same handle.

use std::fs::File;
use std::io::Write;

use crate::compression::Compression;
use crate::error::Result;

pub struct Stream {
	file: File,
	compression: Compression,
	cursor: u64,
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
	use std::os::unix::fs::FileExt;
	file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
	use std::os::unix::fs::FileExt;
	file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
	use std::os::windows::fs::FileExt;
	let mut read = 0;
	while read < buf.len() {
		let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
		if n == 0 {
			return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"));
		}
		read += n;
	}
	Ok(())
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
	use std::os::windows::fs::FileExt;
	let mut written = 0;
	while written < buf.len() {
		let n = file.seek_write(&buf[written..], offset + written as u64)?;
		written += n;
	}
	Ok(())
}

impl Stream {
	pub fn new(file: File, compression: Compression, cursor: u64) -> Stream {
		Stream { file, compression, cursor }
	}

	pub fn cursor(&self) -> u64 {
		self.cursor
	}

	/// Appends `payload` (compressed per the file's configured algorithm) at
	/// the current write position and returns `(offset, length)` for the
	/// bytes actually written on disk.
	pub fn put(&mut self, payload: &[u8]) -> Result<(u64, u64)> {
		let encoded = self.compression.compress(payload)?;
		let offset = self.cursor;
		write_at(&self.file, &encoded, offset)?;
		self.cursor += encoded.len() as u64;
		Ok((offset, encoded.len() as u64))
	}

	/// Seeks to `offset` and reads exactly `length` bytes, then
	/// decompresses transparently.
	pub fn get(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
		let mut buf = vec![0u8; length as usize];
		read_at(&self.file, &mut buf, offset)?;
		self.compression.decompress(&buf)
	}

	/// Reads the on-disk bytes at `(offset, length)` without decompressing.
	/// Used by pass-through copy (§4.E `copy_row_from`), which copies a
	/// blob's stored bytes verbatim rather than decode-then-re-encode.
	pub fn get_raw(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
		let mut buf = vec![0u8; length as usize];
		read_at(&self.file, &mut buf, offset)?;
		Ok(buf)
	}

	/// Swaps in a freshly opened file handle, used to re-acquire a file
	/// descriptor after a fork (§4.F "Fork safety").
	pub fn replace_file(&mut self, file: File) {
		self.file = file;
	}

	/// Truncates the underlying file to `len` bytes and resets the write
	/// cursor there. Used by reopen (§4.E) to revert the file to
	/// just-before-footer before resuming appends.
	pub fn truncate(&mut self, len: u64) -> Result<()> {
		self.file.set_len(len)?;
		self.cursor = len;
		Ok(())
	}

	pub fn sync(&self) -> Result<()> {
		self.file.sync_data()?;
		Ok(())
	}

	/// Writes `bytes` at the very end of the current data region and seeks
	/// the shared cursor past it, without going through the compression
	/// path. Used for the footer (which carries its own framing, not the
	/// per-blob compression).
	pub fn put_raw(&mut self, bytes: &[u8]) -> Result<u64> {
		let offset = self.cursor;
		write_at(&self.file, bytes, offset)?;
		self.cursor += bytes.len() as u64;
		Ok(offset)
	}

	pub fn flush(&mut self) -> Result<()> {
		self.file.flush()?;
		Ok(())
	}
}
