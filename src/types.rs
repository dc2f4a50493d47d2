use std::fmt;
use std::sync::Arc;

use crate::bitfield::BitfieldType;
use crate::enums::EnumType;
use crate::error::Result;
use crate::structdef::StructType;
use crate::value::{StructValue, Value};

/// Byte order of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
	Big,
	Little,
}

/// Width, signedness, and byte order of a fixed-width integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntSpec {
	/// Width in bytes: 1, 2, 4, or 8.
	pub width: u8,
	pub signed: bool,
	pub endian: Endian,
}

impl IntSpec {
	/// Width in bits.
	pub fn bits(&self) -> u32 {
		u32::from(self.width) * 8
	}
}

/// Size callback: on-wire byte count of a struct, read from its own fields.
pub type SizeFn = Box<dyn Fn(&StructValue) -> Result<usize> + Send + Sync>;
/// Mutating hook run on a value (prepack and init callbacks).
pub type HookFn = Box<dyn Fn(&mut StructValue) -> Result<()> + Send + Sync>;
/// Predicate over a struct value (criteria and optional-field conditions).
pub type PredFn = Box<dyn Fn(&StructValue) -> Result<bool> + Send + Sync>;
/// Classifier callback: dispatch key selecting a derived type.
pub type ClassifierFn = Box<dyn Fn(&StructValue) -> Result<u64> + Send + Sync>;
/// Count callback for dynamic arrays.
pub type CountFn = Box<dyn Fn(&StructValue) -> Result<usize> + Send + Sync>;
/// Dump-time formatter: replaces a dumped JSON value.
pub type FormatFn = Box<dyn Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync>;

/// Fixed- or variable-length array type.
pub struct ArrayType {
	pub elem: TypeRef,
	/// Element count; 0 declares an open trailer sized by the enclosing window.
	pub len: usize,
}

/// Wrapper attaching a dump formatter to an arbitrary type.
///
/// Parse and pack delegate to the inner type unchanged; only `dump` with
/// `human_readable` consults the formatter.
pub struct FormattedType {
	pub inner: TypeRef,
	pub format: FormatFn,
}

/// Conditional field: parsed and packed only when the predicate holds.
pub struct OptionalType {
	pub inner: TypeRef,
	pub name: Box<str>,
	pub pred: PredFn,
}

/// Count-driven array field: exactly `count` elements at parse time.
pub struct DArrayType {
	pub elem: TypeRef,
	pub name: Box<str>,
	pub count: CountFn,
	/// Alignment unit for the packed byte length of the whole array.
	pub padding: usize,
}

/// Frozen type descriptor handle.
///
/// Cheap to clone; composite variants share their descriptor.
#[derive(Clone)]
pub enum TypeRef {
	Int(IntSpec),
	/// Single raw byte.
	Char,
	/// `char[N]`: N raw bytes, trailing NULs stripped on parse.
	CharArray(usize),
	/// Window-delimited byte string; `strip` removes trailing NULs on parse.
	Raw { strip: bool },
	/// Zero-terminated byte string, self-delimiting.
	Cstr,
	Array(Arc<ArrayType>),
	Enum(Arc<EnumType>),
	Bitfield(Arc<BitfieldType>),
	Struct(Arc<StructType>),
	Optional(Arc<OptionalType>),
	DArray(Arc<DArrayType>),
	Formatted(Arc<FormattedType>),
}

pub const UINT8: TypeRef = int_be(1, false);
pub const UINT16: TypeRef = int_be(2, false);
pub const UINT32: TypeRef = int_be(4, false);
pub const UINT64: TypeRef = int_be(8, false);
pub const INT8: TypeRef = int_be(1, true);
pub const INT16: TypeRef = int_be(2, true);
pub const INT32: TypeRef = int_be(4, true);
pub const INT64: TypeRef = int_be(8, true);
pub const UINT16_LE: TypeRef = int_le(2, false);
pub const UINT32_LE: TypeRef = int_le(4, false);
pub const UINT64_LE: TypeRef = int_le(8, false);
pub const INT16_LE: TypeRef = int_le(2, true);
pub const INT32_LE: TypeRef = int_le(4, true);
pub const INT64_LE: TypeRef = int_le(8, true);
pub const CHAR: TypeRef = TypeRef::Char;
pub const RAW: TypeRef = TypeRef::Raw { strip: false };
/// Raw bytes with trailing padding NULs stripped on parse.
pub const VARCHR: TypeRef = TypeRef::Raw { strip: true };
pub const CSTR: TypeRef = TypeRef::Cstr;

const fn int_be(width: u8, signed: bool) -> TypeRef {
	TypeRef::Int(IntSpec {
		width,
		signed,
		endian: Endian::Big,
	})
}

const fn int_le(width: u8, signed: bool) -> TypeRef {
	TypeRef::Int(IntSpec {
		width,
		signed,
		endian: Endian::Little,
	})
}

impl TypeRef {
	/// Human-readable type name, used in errors and `_type` dump tags.
	pub fn type_name(&self) -> String {
		match self {
			TypeRef::Int(spec) => {
				let base = if spec.signed { "int" } else { "uint" };
				let suffix = if spec.endian == Endian::Little { "_le" } else { "" };
				format!("{}{}{}", base, spec.bits(), suffix)
			}
			TypeRef::Char => "char".to_owned(),
			TypeRef::CharArray(n) => format!("char[{n}]"),
			TypeRef::Raw { strip: false } => "raw".to_owned(),
			TypeRef::Raw { strip: true } => "varchr".to_owned(),
			TypeRef::Cstr => "cstr".to_owned(),
			TypeRef::Array(array) => format!("{}[{}]", array.elem.type_name(), array.len),
			TypeRef::Enum(def) => def.name.to_string(),
			TypeRef::Bitfield(def) => def.name.to_string(),
			TypeRef::Struct(def) => def.name.to_string(),
			TypeRef::Optional(def) => format!("{}?", def.inner.type_name()),
			TypeRef::DArray(def) => format!("{}[]", def.elem.type_name()),
			TypeRef::Formatted(def) => def.inner.type_name(),
		}
	}

	/// Constant on-wire byte length, if this type has one.
	pub fn fixed_size(&self) -> Option<usize> {
		match self {
			TypeRef::Int(spec) => Some(spec.width as usize),
			TypeRef::Char => Some(1),
			TypeRef::CharArray(n) => Some(*n),
			TypeRef::Raw { .. } | TypeRef::Cstr => None,
			TypeRef::Array(array) => {
				if array.len == 0 {
					return None;
				}
				array.elem.fixed_size().map(|size| size * array.len)
			}
			TypeRef::Enum(def) => Some(def.base.width as usize),
			TypeRef::Bitfield(def) => Some(def.base.width as usize),
			TypeRef::Struct(def) => def.fixed_size,
			TypeRef::Optional(_) | TypeRef::DArray(_) => None,
			TypeRef::Formatted(def) => def.inner.fixed_size(),
		}
	}

	/// Whether this type greedily consumes the remaining size window.
	pub fn is_open_ended(&self) -> bool {
		match self {
			TypeRef::Raw { .. } => true,
			TypeRef::Array(array) => array.len == 0,
			TypeRef::Struct(def) => def.open_ended,
			TypeRef::Optional(def) => def.inner.is_open_ended(),
			TypeRef::Formatted(def) => def.inner.is_open_ended(),
			_ => false,
		}
	}

	/// Create an array type with `len` elements of this type.
	///
	/// `len == 0` declares an open trailer whose element count is dictated by
	/// the enclosing size window; trailing bytes too short for a whole element
	/// are dropped. `char` arrays are raw byte strings, not lists.
	///
	/// # Panics
	///
	/// Panics when called on a type that cannot form an array (raw, cstr,
	/// optional, darray, open arrays).
	pub fn array(&self, len: usize) -> TypeRef {
		match self {
			TypeRef::Char => {
				if len == 0 {
					RAW
				} else {
					TypeRef::CharArray(len)
				}
			}
			TypeRef::Raw { .. } | TypeRef::Cstr | TypeRef::Optional(_) | TypeRef::DArray(_) => {
				panic!("{} cannot form an array", self.type_name())
			}
			TypeRef::Array(array) if array.len == 0 => {
				panic!("open array cannot form an array")
			}
			_ => TypeRef::Array(Arc::new(ArrayType {
				elem: self.clone(),
				len,
			})),
		}
	}

	/// Attach a dump-time formatter to this type.
	pub fn with_formatter(&self, format: FormatFn) -> TypeRef {
		TypeRef::Formatted(Arc::new(FormattedType {
			inner: self.clone(),
			format,
		}))
	}

	/// Re-map the byte order of integer fields, recursing into arrays.
	///
	/// Used by the struct builder's default-endian option; non-integer types
	/// are returned unchanged.
	pub(crate) fn with_endian(&self, endian: Endian) -> TypeRef {
		match self {
			TypeRef::Int(spec) => TypeRef::Int(IntSpec { endian, ..*spec }),
			TypeRef::Array(array) => TypeRef::Array(Arc::new(ArrayType {
				elem: array.elem.with_endian(endian),
				len: array.len,
			})),
			_ => self.clone(),
		}
	}

	/// Default value for a freshly instantiated field slot.
	///
	/// Nested structs and bitfields are default-instantiated recursively,
	/// which runs their init callbacks and may therefore fail.
	pub fn default_value(&self) -> Result<Value> {
		Ok(match self {
			TypeRef::Int(spec) => {
				if spec.signed {
					Value::Int(0)
				} else {
					Value::Uint(0)
				}
			}
			TypeRef::Char | TypeRef::CharArray(_) | TypeRef::Raw { .. } | TypeRef::Cstr => Value::Bytes(Vec::new()),
			TypeRef::Array(_) | TypeRef::DArray(_) => Value::List(Vec::new()),
			TypeRef::Enum(def) => {
				if def.base.signed {
					Value::Int(0)
				} else {
					Value::Uint(0)
				}
			}
			TypeRef::Bitfield(def) => Value::Struct(Box::new(def.default_value()?)),
			TypeRef::Struct(def) => Value::Struct(Box::new(def.default_value()?)),
			TypeRef::Optional(_) => Value::Null,
			TypeRef::Formatted(def) => def.inner.default_value()?,
		})
	}
}

impl fmt::Debug for TypeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.type_name())
	}
}
