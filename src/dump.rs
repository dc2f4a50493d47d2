use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, WireError};
use crate::types::TypeRef;
use crate::value::{StructValue, Value};

/// Options for [dump].
#[derive(Debug, Clone, Copy)]
pub struct DumpOptions {
	/// Apply type-defined formatters (enum symbols, custom formatters).
	pub human_readable: bool,
	/// Insert a reserved `_type` key with the effective type name.
	pub include_type: bool,
}

impl Default for DumpOptions {
	fn default() -> Self {
		Self {
			human_readable: false,
			include_type: true,
		}
	}
}

/// Convert a value tree into a JSON-friendly tree.
///
/// Scalars become numbers, byte strings arrays of numbers (length
/// preserving), lists arrays, and struct values ordered maps keyed by their
/// flattened field names. The value is never mutated; formatter failures
/// propagate as callback errors.
pub fn dump(value: &Value, opts: &DumpOptions) -> Result<JsonValue> {
	match value {
		Value::Null => Ok(JsonValue::Null),
		Value::Uint(v) => Ok(JsonValue::from(*v)),
		Value::Int(v) => Ok(JsonValue::from(*v)),
		Value::Bytes(v) => Ok(JsonValue::Array(v.iter().map(|byte| JsonValue::from(*byte)).collect())),
		Value::List(items) => {
			let dumped: Result<Vec<JsonValue>> = items.iter().map(|item| dump(item, opts)).collect();
			Ok(JsonValue::Array(dumped?))
		}
		Value::Struct(inner) => dump_struct(inner, opts),
	}
}

/// Dump a struct or bitfield value; see [dump].
pub fn dump_struct(value: &StructValue, opts: &DumpOptions) -> Result<JsonValue> {
	let mut map = Map::new();
	let ty = value.get_type().clone();

	match &ty {
		TypeRef::Struct(def) => {
			for level in def.chain() {
				for (index, field) in level.flat.iter().enumerate() {
					let Some(name) = &field.name else {
						continue;
					};
					let slot = value.slot(level.base_flat_len + index);
					// Absent optional fields have no key, like unset
					// attributes in a mapping.
					if matches!(slot, Value::Null) {
						continue;
					}
					map.insert(name.to_string(), dump(slot, opts)?);
				}
			}
		}
		TypeRef::Bitfield(def) => {
			for (index, slot) in def.slots.iter().enumerate() {
				map.insert(slot.name.to_string(), dump(value.slot(index), opts)?);
			}
		}
		_ => unreachable!("struct values carry composite types"),
	}

	let mut dumped = JsonValue::Object(map);

	if opts.human_readable {
		match &ty {
			TypeRef::Struct(def) => {
				for (path, rule_ty) in &def.dump_rules {
					apply_rule_at(&mut dumped, path, rule_ty)?;
				}
				if let Some(formatter) = &def.formatter {
					let taken = std::mem::take(&mut dumped);
					dumped = formatter(taken).map_err(|e| WireError::callback("formatter", &def.name, e))?;
				}
			}
			TypeRef::Bitfield(def) => {
				for (name, rule_ty) in &def.extend {
					let path = [name.clone()];
					apply_rule_at(&mut dumped, &path, rule_ty)?;
				}
				if let Some(formatter) = &def.formatter {
					let taken = std::mem::take(&mut dumped);
					dumped = formatter(taken).map_err(|e| WireError::callback("formatter", &def.name, e))?;
				}
			}
			_ => {}
		}
	}

	if opts.include_type {
		if let JsonValue::Object(map) = &mut dumped {
			map.insert("_type".to_owned(), JsonValue::from(format!("<{}>", value.type_name())));
		}
	}
	Ok(dumped)
}

/// Apply a formatting rule at a dotted path inside the dumped tree.
///
/// Missing paths are skipped: extends may target fields of sibling derived
/// types that did not parse this time.
fn apply_rule_at(dumped: &mut JsonValue, path: &[Box<str>], ty: &TypeRef) -> Result<()> {
	let mut current = dumped;
	for segment in path {
		match current.get_mut(segment.as_ref()) {
			Some(next) => current = next,
			None => return Ok(()),
		}
	}
	let taken = std::mem::take(current);
	*current = apply_rule(ty, taken)?;
	Ok(())
}

/// Re-format one dumped value through a formatting type.
///
/// Arrays format elementwise through their element type; a formatter wrapped
/// around an array runs after its elements.
fn apply_rule(ty: &TypeRef, dumped: JsonValue) -> Result<JsonValue> {
	match ty {
		TypeRef::Enum(def) => Ok(match dumped.as_u64() {
			Some(scalar) => def.format(scalar),
			None => dumped,
		}),
		TypeRef::Formatted(def) => {
			let inner = apply_rule(&def.inner, dumped)?;
			(def.format)(inner).map_err(|e| WireError::callback("formatter", &def.inner.type_name(), e))
		}
		TypeRef::Array(array) => apply_elementwise(&array.elem, dumped),
		TypeRef::DArray(def) => apply_elementwise(&def.elem, dumped),
		TypeRef::Optional(def) => apply_rule(&def.inner, dumped),
		_ => Ok(dumped),
	}
}

fn apply_elementwise(elem: &TypeRef, dumped: JsonValue) -> Result<JsonValue> {
	match dumped {
		JsonValue::Array(items) => {
			let formatted: Result<Vec<JsonValue>> = items.into_iter().map(|item| apply_rule(elem, item)).collect();
			Ok(JsonValue::Array(formatted?))
		}
		other => Ok(other),
	}
}
