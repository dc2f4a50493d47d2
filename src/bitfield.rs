use std::sync::Arc;

use crate::error::{Result, WireError};
use crate::types::{FormatFn, HookFn, IntSpec, TypeRef};
use crate::value::{StructValue, Value};

/// One named bit run inside a bitfield.
#[derive(Debug, Clone)]
pub struct BitSlot {
	pub name: Box<str>,
	/// Offset of the first bit, counted from the most significant bit.
	pub offset: u32,
	/// Width of one element in bits.
	pub width: u32,
	/// Element count when the slot is a bit array.
	pub count: Option<usize>,
}

impl BitSlot {
	fn total_bits(&self) -> u32 {
		self.width * self.count.unwrap_or(1) as u32
	}
}

/// Bit-level mini-struct over an unsigned backing integer.
///
/// Sub-fields are packed MSB-first regardless of the backing endianness; the
/// backing integer itself is read and written through its endian rule.
pub struct BitfieldType {
	pub name: Box<str>,
	pub base: IntSpec,
	/// Named slots in declaration order; padding bits have no slot.
	pub slots: Vec<BitSlot>,
	pub init: Option<HookFn>,
	/// Dump-time type overrides per sub-field name.
	pub extend: Vec<(Box<str>, TypeRef)>,
	pub formatter: Option<FormatFn>,
}

impl BitfieldType {
	/// Index of a named slot.
	pub fn slot_index(&self, name: &str) -> Option<usize> {
		self.slots.iter().position(|slot| slot.name.as_ref() == name)
	}

	/// Default value: all bits zero, then the init callback.
	///
	/// Bit-array slots materialize their full element count so elements can
	/// be assigned by index.
	pub fn default_value(self: &Arc<Self>) -> Result<StructValue> {
		let slots = self
			.slots
			.iter()
			.map(|slot| match slot.count {
				Some(count) => Value::List(vec![Value::Uint(0); count]),
				None => Value::Uint(0),
			})
			.collect();
		let mut value = StructValue::with_slots(TypeRef::Bitfield(Arc::clone(self)), slots);
		if let Some(init) = &self.init {
			init(&mut value).map_err(|e| WireError::callback("init", &self.name, e))?;
		}
		Ok(value)
	}

	/// Extract every slot from the backing integer.
	pub(crate) fn extract(self: &Arc<Self>, backing: u64) -> StructValue {
		let total = self.base.bits();
		let slots = self
			.slots
			.iter()
			.map(|slot| {
				let mask = mask_of(slot.width);
				match slot.count {
					Some(count) => Value::List(
						(0..count)
							.map(|i| {
								let offset = slot.offset + slot.width * i as u32;
								Value::Uint((backing >> (total - offset - slot.width)) & mask)
							})
							.collect(),
					),
					None => Value::Uint((backing >> (total - slot.offset - slot.width)) & mask),
				}
			})
			.collect();
		StructValue::with_slots(TypeRef::Bitfield(Arc::clone(self)), slots)
	}

	/// Fold every slot back into the backing integer.
	///
	/// Values wider than their declared slot fail with the dotted field path.
	pub(crate) fn fold(&self, value: &StructValue, path: &str) -> Result<u64> {
		let total = self.base.bits();
		let mut backing = 0_u64;
		for (slot, stored) in self.slots.iter().zip(value.slots()) {
			let mask = mask_of(slot.width);
			match slot.count {
				Some(count) => {
					let elems = match stored {
						Value::List(elems) => elems.as_slice(),
						other => {
							return Err(WireError::FieldTypeMismatch {
								field: format!("{path}.{}", slot.name),
								expected: "list",
								got: other.kind(),
							});
						}
					};
					for i in 0..count {
						let bit = match elems.get(i) {
							Some(value) => value.as_uint(&format!("{path}.{}", slot.name))?,
							None => 0,
						};
						if bit > mask {
							return Err(WireError::FieldWidthOverflow {
								field: format!("{path}.{}[{i}]", slot.name),
								bits: slot.width,
								value: bit,
							});
						}
						let offset = slot.offset + slot.width * i as u32;
						backing |= bit << (total - offset - slot.width);
					}
				}
				None => {
					let bits = stored.as_uint(&format!("{path}.{}", slot.name))?;
					if bits > mask {
						return Err(WireError::FieldWidthOverflow {
							field: format!("{path}.{}", slot.name),
							bits: slot.width,
							value: bits,
						});
					}
					backing |= bits << (total - slot.offset - slot.width);
				}
			}
		}
		Ok(backing)
	}
}

fn mask_of(width: u32) -> u64 {
	if width >= 64 {
		u64::MAX
	} else {
		(1_u64 << width) - 1
	}
}

/// Builder for a [BitfieldType].
pub struct BitfieldDef {
	name: Box<str>,
	base: IntSpec,
	slots: Vec<BitSlot>,
	next_bit: u32,
	init: Option<HookFn>,
	extend: Vec<(Box<str>, TypeRef)>,
	formatter: Option<FormatFn>,
}

impl BitfieldDef {
	/// Start a bitfield over an unsigned backing integer.
	///
	/// # Panics
	///
	/// Panics when `backing` is not an unsigned integer type.
	pub fn new(name: &str, backing: TypeRef) -> Self {
		let TypeRef::Int(base) = backing else {
			panic!("bitfield backing must be an integer type, got {}", backing.type_name());
		};
		if base.signed {
			panic!("bitfield backing must be unsigned");
		}
		Self {
			name: name.into(),
			base,
			slots: Vec::new(),
			next_bit: 0,
			init: None,
			extend: Vec::new(),
			formatter: None,
		}
	}

	/// Add a named sub-field of `width` bits.
	pub fn field(mut self, width: u32, name: &str) -> Self {
		self.slots.push(BitSlot {
			name: name.into(),
			offset: self.next_bit,
			width,
			count: None,
		});
		self.next_bit += width;
		self
	}

	/// Add a named array of `count` sub-fields of `width` bits each.
	pub fn array_field(mut self, width: u32, name: &str, count: usize) -> Self {
		self.slots.push(BitSlot {
			name: name.into(),
			offset: self.next_bit,
			width,
			count: Some(count),
		});
		self.next_bit += width * count as u32;
		self
	}

	/// Add anonymous padding bits.
	pub fn pad(mut self, width: u32) -> Self {
		self.next_bit += width;
		self
	}

	/// Set the init callback run when a new value is created.
	pub fn init(mut self, init: HookFn) -> Self {
		self.init = Some(init);
		self
	}

	/// Override the dump type of a sub-field.
	pub fn extend(mut self, name: &str, ty: TypeRef) -> Self {
		self.extend.push((name.into(), ty));
		self
	}

	/// Set a formatter applied to the whole dumped mapping.
	pub fn formatter(mut self, format: FormatFn) -> Self {
		self.formatter = Some(format);
		self
	}

	/// Freeze the bitfield type.
	///
	/// Declared bits may leave unused low bits in the backing integer (they
	/// act as padding) but must not exceed it.
	pub fn build(self) -> Result<TypeRef> {
		let backing_bits = self.base.bits();
		if self.next_bit > backing_bits {
			return Err(WireError::BitfieldWidthMismatch {
				type_name: self.name.to_string(),
				declared_bits: self.next_bit,
				backing_bits,
			});
		}
		for slot in &self.slots {
			debug_assert!(slot.total_bits() > 0);
		}
		Ok(TypeRef::Bitfield(Arc::new(BitfieldType {
			name: self.name,
			base: self.base,
			slots: self.slots,
			init: self.init,
			extend: self.extend,
			formatter: self.formatter,
		})))
	}
}
