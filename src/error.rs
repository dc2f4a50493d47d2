use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors produced while declaring types, parsing, packing, and dumping.
#[derive(Debug, Error)]
pub enum WireError {
	/// Not enough bytes remained in the parse window for a requested read.
	#[error("unexpected end of data at offset {at}, need {need} bytes, remaining {rem}")]
	InsufficientBytes {
		/// Byte offset where the read was attempted.
		at: usize,
		/// Requested bytes.
		need: usize,
		/// Bytes still available inside the window.
		rem: usize,
	},
	/// A size callback returned less than the already-consumed fixed prefix.
	#[error("declared size {declared} of {type_name} is smaller than its fixed prefix {need}")]
	SizeUnderflow {
		/// Struct type whose size callback misbehaved.
		type_name: String,
		/// Value the size callback returned.
		declared: usize,
		/// Bytes the fixed prefix already requires.
		need: usize,
	},
	/// A length field exceeded the limit configured on its size callback.
	#[error("struct length {got} exceeds limit {limit}")]
	SizeLimitExceeded {
		/// Configured maximum.
		limit: usize,
		/// Length read from the value.
		got: usize,
	},
	/// An initializer or extend entry named a field that does not exist.
	#[error("unknown field {field} on {type_name}")]
	UnknownField {
		/// Struct or bitfield type searched.
		type_name: String,
		/// Requested field name.
		field: String,
	},
	/// Two fields share one name in the flattened view of a struct.
	#[error("duplicate field {field} in {type_name}")]
	DuplicateField {
		/// Struct type being frozen.
		type_name: String,
		/// Offending field name.
		field: String,
	},
	/// A pack-time value does not fit the declared field width.
	#[error("value {value} does not fit {bits} bits in field {field}")]
	FieldWidthOverflow {
		/// Dotted path of the offending field.
		field: String,
		/// Field width in bits.
		bits: u32,
		/// Value that overflowed.
		value: u64,
	},
	/// Declared bitfield widths exceed the backing integer width.
	#[error("bitfield {type_name} declares {declared_bits} bits, backing type has {backing_bits}")]
	BitfieldWidthMismatch {
		/// Bitfield type being frozen.
		type_name: String,
		/// Sum of declared sub-field widths.
		declared_bits: u32,
		/// Bits available in the backing integer.
		backing_bits: u32,
	},
	/// More than one derived type matched during strict-mode dispatch.
	#[error("multiple derived types match base {type_name}")]
	AmbiguousDerived {
		/// Base type whose dispatch was ambiguous.
		type_name: String,
	},
	/// A derived type declared classify keys but its base has no classifier.
	#[error("classify_by on {type_name} requires a classifier on its base")]
	NoClassifier {
		/// Derived type being frozen.
		type_name: String,
	},
	/// A value slot holds a different kind of value than the operation needs.
	#[error("field {field}: expected {expected}, got {got}")]
	FieldTypeMismatch {
		/// Dotted path of the field accessed.
		field: String,
		/// Expected value kind.
		expected: &'static str,
		/// Actual value kind.
		got: &'static str,
	},
	/// A user callback failed.
	#[error("{kind} callback failed in {context}")]
	Callback {
		/// Callback kind: size, prepack, init, criteria, classifier, count, formatter.
		kind: &'static str,
		/// Type or field the callback belongs to.
		context: String,
		/// Underlying failure.
		#[source]
		source: Box<WireError>,
	},
}

impl WireError {
	/// Wrap a callback failure with its kind and owning context.
	pub(crate) fn callback(kind: &'static str, context: &str, source: WireError) -> Self {
		WireError::Callback {
			kind,
			context: context.to_owned(),
			source: Box::new(source),
		}
	}
}
