// Copyright 2024 Freeze-Dried Data Contributors
// This file is part of freeze-dried-data.

//! The decoded value shapes a codec can produce. A record field, a whole
//! unstructured record, or a property all decode into one of these.

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Bytes(Vec<u8>),
	Str(String),
	I64(i64),
	U64(u64),
	F64(f64),
	Json(serde_json::Value),
	/// Absent-column sentinel (§3 "missing columns ... decode to a null
	/// marker") and the JSON `null` literal share this representation.
	Null,
}

impl Value {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s.as_str()),
			_ => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Value::Bytes(b) => Some(b.as_slice()),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::I64(i) => Some(*i),
			Value::U64(u) => i64::try_from(*u).ok(),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Value {
		Value::Str(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Value {
		Value::Str(s)
	}
}

impl From<Vec<u8>> for Value {
	fn from(b: Vec<u8>) -> Value {
		Value::Bytes(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Value {
		Value::I64(i)
	}
}

impl From<u64> for Value {
	fn from(u: u64) -> Value {
		Value::U64(u)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Value {
		Value::F64(f)
	}
}

impl From<serde_json::Value> for Value {
	fn from(v: serde_json::Value) -> Value {
		Value::Json(v)
	}
}
