use std::sync::Arc;

use crate::error::{Result, WireError};
use crate::structdef::{round_up, Entry, StructType};
use crate::types::{Endian, IntSpec, TypeRef};
use crate::value::{StructValue, Value};

impl StructValue {
	/// Serialize to bytes: prepack callbacks, measure, write, pad with zeros.
	///
	/// Prepack hooks run over the whole tree first (composite children before
	/// their parent, embedded structs before their enclosing struct, the type
	/// chain from the most derived back to the root), so size fields settle
	/// before any byte is written.
	pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
		run_prepack(self)?;
		self.to_bytes_skip_prepack()
	}

	/// Serialize without running prepack callbacks.
	pub fn to_bytes_skip_prepack(&self) -> Result<Vec<u8>> {
		let mut out = Vec::with_capacity(self.length()?);
		emit_value(self, &mut out, &self.type_name())?;
		Ok(out)
	}

	/// Padded on-wire length.
	pub fn length(&self) -> Result<usize> {
		let real = self.real_size()?;
		Ok(round_up(real, self.root_padding()))
	}

	/// Unpadded byte length: pack arithmetic without materializing bytes.
	pub fn real_size(&self) -> Result<usize> {
		match self.get_type().clone() {
			TypeRef::Struct(def) => struct_real_size(&def, self),
			TypeRef::Bitfield(def) => Ok(def.base.width as usize),
			_ => unreachable!("struct values carry composite types"),
		}
	}

	fn root_padding(&self) -> usize {
		match self.get_type() {
			TypeRef::Struct(def) => def.root().padding,
			_ => 1,
		}
	}
}

impl TypeRef {
	/// Serialize a value of this type to bytes.
	///
	/// Struct and bitfield values run their prepack callbacks first.
	pub fn to_bytes(&self, value: &mut Value) -> Result<Vec<u8>> {
		if let Value::Struct(inner) = value {
			return inner.to_bytes();
		}
		let mut out = Vec::new();
		emit_field(self, value, &mut out, &self.type_name())?;
		Ok(out)
	}

	/// Packed byte length of a value of this type, padding included.
	pub fn packed_size(&self, value: &Value) -> Result<usize> {
		field_size(self, value, &self.type_name())
	}
}

/// Run prepack callbacks over the whole value tree.
pub(crate) fn run_prepack(value: &mut StructValue) -> Result<()> {
	let ty = value.get_type().clone();
	let TypeRef::Struct(def) = ty else {
		return Ok(());
	};
	let chain = def.chain();
	for level in &chain {
		prepack_entries(level, value, level.base_flat_len)?;
	}
	for level in chain.iter().rev() {
		if let Some(prepack) = &level.prepack_fn {
			prepack(value).map_err(|e| WireError::callback("prepack", &level.name, e))?;
		}
	}
	Ok(())
}

fn prepack_entries(level: &StructType, value: &mut StructValue, flat_off: usize) -> Result<()> {
	for entry in &level.entries {
		match entry {
			Entry::Pad { .. } => {}
			Entry::Field { flat } => prepack_slot(value, flat_off + flat)?,
			Entry::Embedded { ty, flat_start, .. } => {
				prepack_entries(ty, value, flat_off + flat_start)?;
				if let Some(prepack) = &ty.prepack_fn {
					prepack(value).map_err(|e| WireError::callback("prepack", &ty.name, e))?;
				}
			}
		}
	}
	Ok(())
}

fn prepack_slot(value: &mut StructValue, index: usize) -> Result<()> {
	match value.slot_mut(index) {
		Value::Struct(child) => run_prepack(child),
		Value::List(items) => {
			for item in items {
				if let Value::Struct(child) = item {
					run_prepack(child)?;
				}
			}
			Ok(())
		}
		_ => Ok(()),
	}
}

fn struct_real_size(def: &Arc<StructType>, value: &StructValue) -> Result<usize> {
	let mut total = 0_usize;
	for level in def.chain() {
		total += entries_size(&level, value, level.base_flat_len)?;
	}
	Ok(total + value.extra().len())
}

fn entries_size(level: &Arc<StructType>, value: &StructValue, flat_off: usize) -> Result<usize> {
	let mut total = 0_usize;
	for entry in &level.entries {
		match entry {
			Entry::Pad { width } => total += width,
			Entry::Field { flat } => {
				let field = &level.flat[*flat];
				let name = field.name.as_deref().unwrap_or_default();
				total += field_size(&field.ty, value.slot(flat_off + flat), name)?;
			}
			Entry::Embedded {
				ty,
				flat_start,
				extra_slot,
			} => {
				let mut segment = entries_size(ty, value, flat_off + flat_start)?;
				if let Some(slot) = extra_slot {
					segment += value.slot(flat_off + slot).as_bytes(&ty.name)?.len();
				}
				total += round_up(segment, ty.padding);
			}
		}
	}
	Ok(total)
}

/// Packed byte length of one field, alignment included for composites.
fn field_size(ty: &TypeRef, slot: &Value, path: &str) -> Result<usize> {
	match ty {
		TypeRef::Int(spec) => Ok(spec.width as usize),
		TypeRef::Char => Ok(1),
		TypeRef::CharArray(n) => Ok(*n),
		TypeRef::Raw { .. } => Ok(slot.as_bytes(path)?.len()),
		TypeRef::Cstr => Ok(slot.as_bytes(path)?.len() + 1),
		TypeRef::Enum(def) => Ok(def.base.width as usize),
		TypeRef::Bitfield(def) => Ok(def.base.width as usize),
		TypeRef::Array(array) => {
			let items = slot.as_list(path)?;
			let mut total = 0_usize;
			let count = if array.len == 0 { items.len() } else { array.len };
			for index in 0..count {
				total += match items.get(index) {
					Some(item) => field_size(&array.elem, item, path)?,
					None => field_size(&array.elem, &array.elem.default_value()?, path)?,
				};
			}
			Ok(total)
		}
		TypeRef::Struct(_) => slot.as_struct(path)?.length(),
		TypeRef::Optional(def) => match slot {
			Value::Null => Ok(0),
			present => field_size(&def.inner, present, path),
		},
		TypeRef::DArray(def) => {
			let items = slot.as_list(path)?;
			let mut total = 0_usize;
			for item in items {
				total += field_size(&def.elem, item, path)?;
			}
			Ok(round_up(total, def.padding))
		}
		TypeRef::Formatted(def) => field_size(&def.inner, slot, path),
	}
}

/// Emit a struct value without its own trailing alignment.
fn emit_level_chain(value: &StructValue, out: &mut Vec<u8>, path: &str) -> Result<()> {
	let TypeRef::Struct(def) = value.get_type().clone() else {
		unreachable!("struct values carry composite types");
	};
	for level in def.chain() {
		emit_entries(&level, value, level.base_flat_len, out, path)?;
	}
	out.extend_from_slice(value.extra());
	Ok(())
}

/// Emit a struct or bitfield value, padded to its own alignment.
fn emit_value(value: &StructValue, out: &mut Vec<u8>, path: &str) -> Result<()> {
	match value.get_type().clone() {
		TypeRef::Struct(def) => {
			let start = out.len();
			emit_level_chain(value, out, path)?;
			let written = out.len() - start;
			let padded = round_up(written, def.root().padding);
			out.resize(start + padded, 0);
			Ok(())
		}
		TypeRef::Bitfield(def) => {
			let backing = def.fold(value, path)?;
			write_uint(def.base, backing, out, path)
		}
		_ => unreachable!("struct values carry composite types"),
	}
}

fn emit_entries(level: &Arc<StructType>, value: &StructValue, flat_off: usize, out: &mut Vec<u8>, path: &str) -> Result<()> {
	for entry in &level.entries {
		match entry {
			Entry::Pad { width } => out.resize(out.len() + width, 0),
			Entry::Field { flat } => {
				let field = &level.flat[*flat];
				let name = field.name.as_deref().unwrap_or_default();
				let field_path = format!("{path}.{name}");
				emit_field(&field.ty, value.slot(flat_off + flat), out, &field_path)?;
			}
			Entry::Embedded {
				ty,
				flat_start,
				extra_slot,
			} => {
				let start = out.len();
				emit_entries(ty, value, flat_off + flat_start, out, path)?;
				if let Some(slot) = extra_slot {
					out.extend_from_slice(value.slot(flat_off + slot).as_bytes(&ty.name)?);
				}
				let written = out.len() - start;
				let padded = round_up(written, ty.padding);
				out.resize(start + padded, 0);
			}
		}
	}
	Ok(())
}

fn emit_field(ty: &TypeRef, slot: &Value, out: &mut Vec<u8>, path: &str) -> Result<()> {
	match ty {
		TypeRef::Int(spec) => {
			if spec.signed {
				write_int(*spec, slot.as_int(path)?, out, path)
			} else {
				write_uint(*spec, slot.as_uint(path)?, out, path)
			}
		}
		TypeRef::Char => {
			let bytes = slot.as_bytes(path)?;
			out.push(bytes.first().copied().unwrap_or(0));
			Ok(())
		}
		TypeRef::CharArray(n) => {
			// Longer values truncate; shorter values are NUL-padded.
			let bytes = slot.as_bytes(path)?;
			let take = bytes.len().min(*n);
			out.extend_from_slice(&bytes[..take]);
			out.resize(out.len() + (n - take), 0);
			Ok(())
		}
		TypeRef::Raw { .. } => {
			out.extend_from_slice(slot.as_bytes(path)?);
			Ok(())
		}
		TypeRef::Cstr => {
			out.extend_from_slice(slot.as_bytes(path)?);
			out.push(0);
			Ok(())
		}
		TypeRef::Enum(def) => {
			if def.base.signed {
				write_int(def.base, slot.as_int(path)?, out, path)
			} else {
				write_uint(def.base, slot.as_uint(path)?, out, path)
			}
		}
		TypeRef::Bitfield(def) => {
			let child = slot.as_struct(path)?;
			let backing = def.fold(child, path)?;
			write_uint(def.base, backing, out, path)
		}
		TypeRef::Array(array) => {
			let items = slot.as_list(path)?;
			let count = if array.len == 0 { items.len() } else { array.len };
			for index in 0..count {
				match items.get(index) {
					Some(item) => emit_field(&array.elem, item, out, path)?,
					None => emit_field(&array.elem, &array.elem.default_value()?, out, path)?,
				}
			}
			Ok(())
		}
		TypeRef::Struct(_) => emit_value(slot.as_struct(path)?, out, path),
		TypeRef::Optional(def) => match slot {
			Value::Null => Ok(()),
			present => emit_field(&def.inner, present, out, path),
		},
		TypeRef::DArray(def) => {
			let start = out.len();
			for item in slot.as_list(path)? {
				emit_field(&def.elem, item, out, path)?;
			}
			let written = out.len() - start;
			out.resize(start + round_up(written, def.padding), 0);
			Ok(())
		}
		TypeRef::Formatted(def) => emit_field(&def.inner, slot, out, path),
	}
}

fn write_uint(spec: IntSpec, value: u64, out: &mut Vec<u8>, path: &str) -> Result<()> {
	let width = spec.width as usize;
	if width < 8 && value >> (width * 8) != 0 {
		return Err(WireError::FieldWidthOverflow {
			field: path.to_owned(),
			bits: spec.bits(),
			value,
		});
	}
	let bytes = match spec.endian {
		Endian::Big => &value.to_be_bytes()[8 - width..],
		Endian::Little => &value.to_le_bytes()[..width],
	};
	out.extend_from_slice(bytes);
	Ok(())
}

fn write_int(spec: IntSpec, value: i64, out: &mut Vec<u8>, path: &str) -> Result<()> {
	let bits = spec.bits();
	if bits < 64 {
		let min = -(1_i64 << (bits - 1));
		let max = (1_i64 << (bits - 1)) - 1;
		if value < min || value > max {
			return Err(WireError::FieldWidthOverflow {
				field: path.to_owned(),
				bits,
				value: value as u64,
			});
		}
	}
	let width = spec.width as usize;
	let bytes = match spec.endian {
		Endian::Big => &value.to_be_bytes()[8 - width..],
		Endian::Little => &value.to_le_bytes()[..width],
	};
	out.extend_from_slice(bytes);
	Ok(())
}
