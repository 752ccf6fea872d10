// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! Byte-codec registry (spec §4.A).
//!
//! A codec is a stably-named `(encode, decode)` pair. Only the name is
//! persisted in the footer (§4.A.1); on open, the name is looked up against
//! the process-wide [`CodecRegistry`]. This sidesteps needing to deserialise
//! arbitrary code the way the original Python implementation does, at the
//! cost of requiring a caller to register an equivalent codec by name before
//! opening a file that used one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::value::Value;

/// A named, persistable `(encode, decode)` pair.
pub trait Codec: Send + Sync {
	/// The stable identifier persisted in the footer. Two codecs are
	/// "identical" for pass-through copy purposes (§4.A, §4.E) iff their
	/// names match.
	fn name(&self) -> &str;
	fn encode(&self, value: &Value) -> Result<Vec<u8>>;
	fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

pub type CodecRef = Arc<dyn Codec>;

/// Identity bytes as-is. The default default-codec.
pub struct RawCodec;
impl Codec for RawCodec {
	fn name(&self) -> &str {
		"raw"
	}
	fn encode(&self, value: &Value) -> Result<Vec<u8>> {
		match value {
			Value::Bytes(b) => Ok(b.clone()),
			Value::Str(s) => Ok(s.as_bytes().to_vec()),
			other => Err(Error::Codec(format!("raw codec cannot encode {:?}", other))),
		}
	}
	fn decode(&self, bytes: &[u8]) -> Result<Value> {
		Ok(Value::Bytes(bytes.to_vec()))
	}
}

pub struct Utf8Codec;
impl Codec for Utf8Codec {
	fn name(&self) -> &str {
		"utf8"
	}
	fn encode(&self, value: &Value) -> Result<Vec<u8>> {
		match value {
			Value::Str(s) => Ok(s.as_bytes().to_vec()),
			other => Err(Error::Codec(format!("utf8 codec cannot encode {:?}", other))),
		}
	}
	fn decode(&self, bytes: &[u8]) -> Result<Value> {
		Ok(Value::Str(String::from_utf8(bytes.to_vec())?))
	}
}

pub struct U64LeCodec;
impl Codec for U64LeCodec {
	fn name(&self) -> &str {
		"u64le"
	}
	fn encode(&self, value: &Value) -> Result<Vec<u8>> {
		match value {
			Value::U64(u) => Ok(u.to_le_bytes().to_vec()),
			Value::I64(i) if *i >= 0 => Ok((*i as u64).to_le_bytes().to_vec()),
			other => Err(Error::Codec(format!("u64le codec cannot encode {:?}", other))),
		}
	}
	fn decode(&self, bytes: &[u8]) -> Result<Value> {
		let arr: [u8; 8] = bytes
			.try_into()
			.map_err(|_| Error::Codec("u64le: expected 8 bytes".into()))?;
		Ok(Value::U64(u64::from_le_bytes(arr)))
	}
}

pub struct I64LeCodec;
impl Codec for I64LeCodec {
	fn name(&self) -> &str {
		"i64le"
	}
	fn encode(&self, value: &Value) -> Result<Vec<u8>> {
		match value {
			Value::I64(i) => Ok(i.to_le_bytes().to_vec()),
			other => Err(Error::Codec(format!("i64le codec cannot encode {:?}", other))),
		}
	}
	fn decode(&self, bytes: &[u8]) -> Result<Value> {
		let arr: [u8; 8] = bytes
			.try_into()
			.map_err(|_| Error::Codec("i64le: expected 8 bytes".into()))?;
		Ok(Value::I64(i64::from_le_bytes(arr)))
	}
}

pub struct F64LeCodec;
impl Codec for F64LeCodec {
	fn name(&self) -> &str {
		"f64le"
	}
	fn encode(&self, value: &Value) -> Result<Vec<u8>> {
		match value {
			Value::F64(f) => Ok(f.to_le_bytes().to_vec()),
			other => Err(Error::Codec(format!("f64le codec cannot encode {:?}", other))),
		}
	}
	fn decode(&self, bytes: &[u8]) -> Result<Value> {
		let arr: [u8; 8] = bytes
			.try_into()
			.map_err(|_| Error::Codec("f64le: expected 8 bytes".into()))?;
		Ok(Value::F64(f64::from_le_bytes(arr)))
	}
}

pub struct JsonCodec;
impl Codec for JsonCodec {
	fn name(&self) -> &str {
		"json"
	}
	fn encode(&self, value: &Value) -> Result<Vec<u8>> {
		let json = match value {
			Value::Json(v) => v.clone(),
			Value::Str(s) => serde_json::Value::String(s.clone()),
			Value::I64(i) => serde_json::Value::from(*i),
			Value::U64(u) => serde_json::Value::from(*u),
			Value::F64(f) => serde_json::Value::from(*f),
			Value::Null => serde_json::Value::Null,
			Value::Bytes(_) => return Err(Error::Codec("json codec cannot encode raw bytes".into())),
		};
		serde_json::to_vec(&json).map_err(|e| Error::Codec(e.to_string()))
	}
	fn decode(&self, bytes: &[u8]) -> Result<Value> {
		let json: serde_json::Value =
			serde_json::from_slice(bytes).map_err(|e| Error::Codec(e.to_string()))?;
		Ok(Value::Json(json))
	}
}

/// Process-wide, append-only table of codecs known by name. Guarded with
/// `parking_lot::RwLock`, the same synchronisation primitive the teacher
/// crate reaches for over `std::sync::RwLock`.
pub struct CodecRegistry {
	codecs: RwLock<HashMap<String, CodecRef>>,
}

impl CodecRegistry {
	fn with_builtins() -> CodecRegistry {
		let mut codecs: HashMap<String, CodecRef> = HashMap::new();
		let builtins: Vec<CodecRef> = vec![
			Arc::new(RawCodec),
			Arc::new(Utf8Codec),
			Arc::new(U64LeCodec),
			Arc::new(I64LeCodec),
			Arc::new(F64LeCodec),
			Arc::new(JsonCodec),
		];
		for codec in builtins {
			codecs.insert(codec.name().to_owned(), codec);
		}
		CodecRegistry { codecs: RwLock::new(codecs) }
	}

	/// Registers a custom codec under its own name, overwriting any prior
	/// registration of the same name. Registration never fails: the
	/// registry is append-only in the sense that built-ins can't be
	/// removed, but callers may shadow a name if they know what they're
	/// doing.
	pub fn register(&self, codec: CodecRef) {
		self.codecs.write().insert(codec.name().to_owned(), codec);
	}

	pub fn get(&self, name: &str) -> Result<CodecRef> {
		self.codecs
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| Error::InvalidFile(format!("unregistered codec `{}`", name)))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.codecs.read().contains_key(name)
	}
}

/// The process-wide registry. Lazily built on first use, analogous to the
/// teacher's use of `lazy_static`-free `once_cell`-free atomics for
/// one-time initialisation elsewhere in the crate; here a `parking_lot`
/// primitive plus `std::sync::OnceLock` keeps the same "no extra crate"
/// spirit while remaining safe to call from multiple threads.
static REGISTRY: std::sync::OnceLock<CodecRegistry> = std::sync::OnceLock::new();

pub fn global_registry() -> &'static CodecRegistry {
	REGISTRY.get_or_init(CodecRegistry::with_builtins)
}

/// Registers a codec with the process-wide registry. See
/// [`CodecRegistry::register`].
pub fn register_codec(codec: CodecRef) {
	global_registry().register(codec)
}

pub fn default_codec() -> CodecRef {
	global_registry().get("raw").expect("raw codec is always registered")
}

pub fn lookup(name: &str) -> Result<CodecRef> {
	global_registry().get(name)
}
