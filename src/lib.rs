//! Declarative C-style binary struct definitions.
//!
//! Describe a wire format once (fixed fields, bitfields, enums,
//! length-prefixed trailers, tagged-union extensions) and get parsing,
//! construction, serialization, and JSON-friendly introspection for free.
//!
//! ```
//! use wirestruct::{StructDef, UINT16, RAW, pack_real_size};
//!
//! let frame = StructDef::new("frame")
//! 	.field(UINT16, "length")
//! 	.field(RAW, "data")
//! 	.padding(1)
//! 	.size(Box::new(|v| Ok(v.get_uint("length")? as usize)))
//! 	.prepack(pack_real_size("length"))
//! 	.build()
//! 	.unwrap();
//!
//! let mut value = frame.new_value().unwrap();
//! value.set_bytes("data", *b"abcde").unwrap();
//! assert_eq!(value.to_bytes().unwrap(), b"\x00\x07abcde");
//!
//! let (parsed, consumed) = frame.parse(b"\x00\x07abcde").unwrap();
//! assert_eq!(consumed, 7);
//! assert_eq!(parsed.into_struct().unwrap().get_bytes("data").unwrap(), b"abcde");
//! ```

mod bitfield;
mod cursor;
mod dump;
mod enums;
mod error;
mod helpers;
mod pack;
mod parse;
mod structdef;
mod types;
mod value;

/// Bitfield declaration and descriptor types.
pub use bitfield::{BitSlot, BitfieldDef, BitfieldType};
/// Dump entry point and options.
pub use dump::{dump, dump_struct, DumpOptions};
/// Enum declaration and descriptor types.
pub use enums::{EnumDef, EnumType};
/// Error and result aliases.
pub use error::{Result, WireError};
/// Variable-size field helpers and prepack/size callback factories.
pub use helpers::{darray, darray_padded, optional, pack_expr, pack_real_size, pack_size, pack_value, size_from_len};
/// Struct declaration builder and frozen descriptor.
pub use structdef::{StructDef, StructType};
/// Type handles, callback signatures, and the primitive registry.
pub use types::{
	ArrayType, ClassifierFn, CountFn, DArrayType, Endian, FormatFn, FormattedType, HookFn, IntSpec, OptionalType,
	PredFn, SizeFn, TypeRef, CHAR, CSTR, INT16, INT16_LE, INT32, INT32_LE, INT64, INT64_LE, INT8, RAW, UINT16,
	UINT16_LE, UINT32, UINT32_LE, UINT64, UINT64_LE, UINT8, VARCHR,
};
/// Runtime value tree types.
pub use value::{StructValue, Value};
