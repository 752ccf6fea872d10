// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

// freeze-dried-data is free software: you can redistribute it and/or modify
// it under the terms of the MIT license or the Apache License 2.0, at your
// option.

use std::fmt;

/// Errors surfaced by the container format. See the module docs on
/// [`crate::Writer`] and [`crate::Reader`] for which operations can raise
/// which kind.
#[derive(Debug)]
pub enum Error {
	/// The footer's magic bytes did not match, its length-prefix was
	/// inconsistent with the file size, or it failed to decode.
	InvalidFile(String),
	/// A key is absent from the active view, or a named split does not
	/// exist.
	NotFound(String),
	/// An insertion targeted a key already present in the index.
	DuplicateKey(String),
	/// A reopen was attempted with a column definition or compression
	/// setting that does not match the file being reopened.
	SchemaMismatch(String),
	/// An operation was attempted on a handle in the wrong state (a closed
	/// writer, a write-style call on a reader, access to a `PARTIAL` row
	/// through a finalised accessor, ...).
	BadState(String),
	/// A codec's `encode` or `decode` failed.
	Codec(String),
	/// The underlying file system returned an error.
	Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::InvalidFile(msg) => write!(f, "invalid fdd file: {}", msg),
			Error::NotFound(msg) => write!(f, "not found: {}", msg),
			Error::DuplicateKey(msg) => write!(f, "duplicate key: {}", msg),
			Error::SchemaMismatch(msg) => write!(f, "schema mismatch: {}", msg),
			Error::BadState(msg) => write!(f, "bad state: {}", msg),
			Error::Codec(msg) => write!(f, "codec error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Error {
		Error::Io(err)
	}
}

impl From<std::num::TryFromIntError> for Error {
	fn from(err: std::num::TryFromIntError) -> Error {
		Error::InvalidFile(format!("integer out of range: {}", err))
	}
}

impl From<std::string::FromUtf8Error> for Error {
	fn from(err: std::string::FromUtf8Error) -> Error {
		Error::Codec(format!("invalid utf8: {}", err))
	}
}
