// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! User-supplied keys.
//!
//! The original implementation lets any hashable Python value act as a key.
//! A typed port narrows this to the shapes the end-to-end scenarios actually
//! need: opaque bytes, UTF-8 strings, and signed 64-bit integers.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
	Bytes(Vec<u8>),
	Str(String),
	Int(i64),
}

impl Key {
	pub(crate) const TAG_BYTES: u8 = 0;
	pub(crate) const TAG_STR: u8 = 1;
	pub(crate) const TAG_INT: u8 = 2;

	pub(crate) fn tag(&self) -> u8 {
		match self {
			Key::Bytes(_) => Self::TAG_BYTES,
			Key::Str(_) => Self::TAG_STR,
			Key::Int(_) => Self::TAG_INT,
		}
	}

	pub(crate) fn payload(&self) -> Vec<u8> {
		match self {
			Key::Bytes(b) => b.clone(),
			Key::Str(s) => s.as_bytes().to_vec(),
			Key::Int(i) => i.to_le_bytes().to_vec(),
		}
	}

	pub(crate) fn from_tagged(tag: u8, payload: Vec<u8>) -> super::error::Result<Key> {
		use crate::error::Error;
		match tag {
			Self::TAG_BYTES => Ok(Key::Bytes(payload)),
			Self::TAG_STR => Ok(Key::Str(String::from_utf8(payload)?)),
			Self::TAG_INT => {
				if payload.len() != 8 {
					return Err(Error::InvalidFile("malformed integer key".into()));
				}
				let mut buf = [0u8; 8];
				buf.copy_from_slice(&payload);
				Ok(Key::Int(i64::from_le_bytes(buf)))
			}
			other => Err(Error::InvalidFile(format!("unknown key tag {}", other))),
		}
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
			Key::Str(s) => write!(f, "{:?}", s),
			Key::Int(i) => write!(f, "{}", i),
		}
	}
}

impl From<&str> for Key {
	fn from(s: &str) -> Key {
		Key::Str(s.to_owned())
	}
}

impl From<String> for Key {
	fn from(s: String) -> Key {
		Key::Str(s)
	}
}

impl From<i64> for Key {
	fn from(i: i64) -> Key {
		Key::Int(i)
	}
}

impl From<i32> for Key {
	fn from(i: i32) -> Key {
		Key::Int(i as i64)
	}
}

impl From<Vec<u8>> for Key {
	fn from(b: Vec<u8>) -> Key {
		Key::Bytes(b)
	}
}
