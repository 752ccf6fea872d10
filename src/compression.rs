// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! Per-blob compression (spec §4.B). The algorithm is fixed once per file
//! and recorded in the footer; every blob in the file is compressed (or not)
//! uniformly under it.

use std::io::{Read, Write};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
	None,
	Zlib,
	Bz2,
	Gzip,
}

impl Compression {
	pub(crate) fn tag(self) -> u8 {
		match self {
			Compression::None => 0,
			Compression::Zlib => 1,
			Compression::Bz2 => 2,
			Compression::Gzip => 3,
		}
	}

	pub(crate) fn from_tag(tag: u8) -> Result<Compression> {
		match tag {
			0 => Ok(Compression::None),
			1 => Ok(Compression::Zlib),
			2 => Ok(Compression::Bz2),
			3 => Ok(Compression::Gzip),
			other => Err(Error::InvalidFile(format!("unknown compression tag {}", other))),
		}
	}

	pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
		match self {
			Compression::None => Ok(data.to_vec()),
			Compression::Zlib => {
				let mut encoder =
					flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
				encoder.write_all(data)?;
				Ok(encoder.finish()?)
			}
			Compression::Gzip => {
				let mut encoder =
					flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
				encoder.write_all(data)?;
				Ok(encoder.finish()?)
			}
			Compression::Bz2 => {
				let mut encoder =
					bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
				encoder.write_all(data)?;
				Ok(encoder.finish()?)
			}
		}
	}

	pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
		match self {
			Compression::None => Ok(data.to_vec()),
			Compression::Zlib => {
				let mut decoder = flate2::read::ZlibDecoder::new(data);
				let mut out = Vec::new();
				decoder.read_to_end(&mut out)?;
				Ok(out)
			}
			Compression::Gzip => {
				let mut decoder = flate2::read::GzDecoder::new(data);
				let mut out = Vec::new();
				decoder.read_to_end(&mut out)?;
				Ok(out)
			}
			Compression::Bz2 => {
				let mut decoder = bzip2::read::BzDecoder::new(data);
				let mut out = Vec::new();
				decoder.read_to_end(&mut out)?;
				Ok(out)
			}
		}
	}
}

impl Default for Compression {
	fn default() -> Compression {
		Compression::None
	}
}
