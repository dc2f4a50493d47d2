use std::fmt;

use crate::error::{Result, WireError};
use crate::types::TypeRef;

/// Runtime value of a parsed or constructed field.
#[derive(Clone)]
pub enum Value {
	/// Absent value (unset optional field).
	Null,
	Uint(u64),
	Int(i64),
	Bytes(Vec<u8>),
	List(Vec<Value>),
	Struct(Box<StructValue>),
}

impl Value {
	/// Short kind name for diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Uint(_) => "uint",
			Value::Int(_) => "int",
			Value::Bytes(_) => "bytes",
			Value::List(_) => "list",
			Value::Struct(_) => "struct",
		}
	}

	pub(crate) fn as_uint(&self, field: &str) -> Result<u64> {
		match self {
			Value::Uint(v) => Ok(*v),
			Value::Int(v) if *v >= 0 => Ok(*v as u64),
			other => Err(WireError::FieldTypeMismatch {
				field: field.to_owned(),
				expected: "uint",
				got: other.kind(),
			}),
		}
	}

	pub(crate) fn as_int(&self, field: &str) -> Result<i64> {
		match self {
			Value::Int(v) => Ok(*v),
			Value::Uint(v) if *v <= i64::MAX as u64 => Ok(*v as i64),
			other => Err(WireError::FieldTypeMismatch {
				field: field.to_owned(),
				expected: "int",
				got: other.kind(),
			}),
		}
	}

	pub(crate) fn as_bytes(&self, field: &str) -> Result<&[u8]> {
		match self {
			Value::Bytes(v) => Ok(v),
			other => Err(WireError::FieldTypeMismatch {
				field: field.to_owned(),
				expected: "bytes",
				got: other.kind(),
			}),
		}
	}

	pub(crate) fn as_list(&self, field: &str) -> Result<&[Value]> {
		match self {
			Value::List(v) => Ok(v),
			other => Err(WireError::FieldTypeMismatch {
				field: field.to_owned(),
				expected: "list",
				got: other.kind(),
			}),
		}
	}

	pub(crate) fn as_struct(&self, field: &str) -> Result<&StructValue> {
		match self {
			Value::Struct(v) => Ok(v),
			other => Err(WireError::FieldTypeMismatch {
				field: field.to_owned(),
				expected: "struct",
				got: other.kind(),
			}),
		}
	}

	/// Unwrap into a struct value, when this is one.
	pub fn into_struct(self) -> Option<StructValue> {
		match self {
			Value::Struct(v) => Some(*v),
			_ => None,
		}
	}

	pub(crate) fn as_struct_mut(&mut self, field: &str) -> Result<&mut StructValue> {
		match self {
			Value::Struct(v) => Ok(v),
			other => Err(WireError::FieldTypeMismatch {
				field: field.to_owned(),
				expected: "struct",
				got: other.kind(),
			}),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Uint(a), Value::Uint(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Uint(a), Value::Int(b)) | (Value::Int(b), Value::Uint(a)) => *b >= 0 && *a == *b as u64,
			(Value::Bytes(a), Value::Bytes(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Struct(a), Value::Struct(b)) => a == b,
			_ => false,
		}
	}
}

impl From<u64> for Value {
	fn from(v: u64) -> Self {
		Value::Uint(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value::Bytes(v)
	}
}

impl From<&[u8]> for Value {
	fn from(v: &[u8]) -> Self {
		Value::Bytes(v.to_vec())
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Bytes(v.as_bytes().to_vec())
	}
}

impl From<Vec<Value>> for Value {
	fn from(v: Vec<Value>) -> Self {
		Value::List(v)
	}
}

impl From<StructValue> for Value {
	fn from(v: StructValue) -> Self {
		Value::Struct(Box::new(v))
	}
}

/// Mutable struct (or bitfield) value with flattened field slots.
///
/// Slots align with the effective type's flattened view: base-chain fields
/// first, then own fields with embedded-struct fields promoted in place.
/// `extra` holds declared-size-window bytes beyond the known fields; pack
/// re-emits them so unknown extensions survive a round trip.
#[derive(Clone)]
pub struct StructValue {
	ty: TypeRef,
	slots: Vec<Value>,
	extra: Vec<u8>,
}

impl StructValue {
	pub(crate) fn with_slots(ty: TypeRef, slots: Vec<Value>) -> Self {
		Self {
			ty,
			slots,
			extra: Vec::new(),
		}
	}

	/// Effective type of this value.
	///
	/// After parse-time dispatch this is the selected derived type; the
	/// base-to-derived selection is recoverable from its base chain.
	pub fn get_type(&self) -> &TypeRef {
		&self.ty
	}

	/// Name of the effective type.
	pub fn type_name(&self) -> String {
		self.ty.type_name()
	}

	pub(crate) fn set_type(&mut self, ty: TypeRef) {
		self.ty = ty;
	}

	pub(crate) fn slots(&self) -> &[Value] {
		&self.slots
	}

	pub(crate) fn slots_mut(&mut self) -> &mut Vec<Value> {
		&mut self.slots
	}

	pub(crate) fn slot(&self, index: usize) -> &Value {
		&self.slots[index]
	}

	pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Value {
		&mut self.slots[index]
	}

	/// Trailing bytes inside the declared size window beyond the known fields.
	pub fn extra(&self) -> &[u8] {
		&self.extra
	}

	/// Replace the trailing extension bytes.
	pub fn set_extra(&mut self, extra: Vec<u8>) {
		self.extra = extra;
	}

	pub(crate) fn take_extra(&mut self) -> Vec<u8> {
		std::mem::take(&mut self.extra)
	}

	fn index_of(&self, name: &str) -> Result<usize> {
		let found = match &self.ty {
			TypeRef::Struct(def) => def.resolve(name),
			TypeRef::Bitfield(def) => def.slot_index(name),
			_ => None,
		};
		found.ok_or_else(|| WireError::UnknownField {
			type_name: self.type_name(),
			field: name.to_owned(),
		})
	}

	/// Read a field by flattened name.
	pub fn get(&self, name: &str) -> Result<&Value> {
		Ok(&self.slots[self.index_of(name)?])
	}

	/// Mutably access a field by flattened name.
	pub fn get_mut(&mut self, name: &str) -> Result<&mut Value> {
		let index = self.index_of(name)?;
		Ok(&mut self.slots[index])
	}

	/// Assign a field by flattened name.
	pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
		let index = self.index_of(name)?;
		self.slots[index] = value.into();
		Ok(())
	}

	pub fn get_uint(&self, name: &str) -> Result<u64> {
		self.get(name)?.as_uint(name)
	}

	pub fn get_int(&self, name: &str) -> Result<i64> {
		self.get(name)?.as_int(name)
	}

	pub fn get_bytes(&self, name: &str) -> Result<&[u8]> {
		self.get(name)?.as_bytes(name)
	}

	pub fn get_list(&self, name: &str) -> Result<&[Value]> {
		self.get(name)?.as_list(name)
	}

	pub fn get_list_mut(&mut self, name: &str) -> Result<&mut Vec<Value>> {
		let index = self.index_of(name)?;
		match &mut self.slots[index] {
			Value::List(items) => Ok(items),
			other => Err(WireError::FieldTypeMismatch {
				field: name.to_owned(),
				expected: "list",
				got: other.kind(),
			}),
		}
	}

	pub fn get_struct(&self, name: &str) -> Result<&StructValue> {
		self.get(name)?.as_struct(name)
	}

	pub fn get_struct_mut(&mut self, name: &str) -> Result<&mut StructValue> {
		let index = self.index_of(name)?;
		self.slots[index].as_struct_mut(name)
	}

	pub fn set_uint(&mut self, name: &str, value: u64) -> Result<()> {
		self.set(name, Value::Uint(value))
	}

	pub fn set_int(&mut self, name: &str, value: i64) -> Result<()> {
		self.set(name, Value::Int(value))
	}

	pub fn set_bytes(&mut self, name: &str, value: impl Into<Vec<u8>>) -> Result<()> {
		self.set(name, Value::Bytes(value.into()))
	}

	/// Whether a field currently holds a value (optional fields parse absent).
	pub fn is_set(&self, name: &str) -> Result<bool> {
		Ok(!matches!(self.get(name)?, Value::Null))
	}

	/// Read through a dotted field path, descending into nested values.
	pub fn get_path(&self, path: &str) -> Result<&Value> {
		let mut segments = path.split('.');
		let first = segments.next().unwrap_or_default();
		let mut current = self.get(first)?;
		for segment in segments {
			current = current.as_struct(path)?.get(segment)?;
		}
		Ok(current)
	}

	/// Read an unsigned integer through a dotted field path.
	pub fn get_uint_path(&self, path: &str) -> Result<u64> {
		self.get_path(path)?.as_uint(path)
	}

	/// Assign through a dotted field path.
	pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
		let mut segments: Vec<&str> = path.split('.').collect();
		let last = segments.pop().unwrap_or_default();
		let mut current = self;
		for segment in segments {
			current = current.get_struct_mut(segment)?;
		}
		current.set(last, value)
	}
}

impl PartialEq for StructValue {
	fn eq(&self, other: &Self) -> bool {
		self.type_name() == other.type_name() && self.slots == other.slots && self.extra == other.extra
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Uint(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Bytes(v) => write!(f, "{v:02x?}"),
			Value::List(v) => f.debug_list().entries(v).finish(),
			Value::Struct(v) => v.fmt(f),
		}
	}
}

impl fmt::Debug for StructValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<{}: {} slots", self.type_name(), self.slots.len())?;
		if !self.extra.is_empty() {
			write!(f, ", {} extra bytes", self.extra.len())?;
		}
		f.write_str(">")
	}
}
