use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::types::{IntSpec, TypeRef};

/// Symbolic wrapper over a fixed-width integer type.
///
/// Parse and pack delegate to the backing integer; the symbol table only
/// affects human-readable dumps. Bitmask enums format as the space-joined
/// names of the set flags.
pub struct EnumType {
	pub name: Box<str>,
	pub base: IntSpec,
	pub bitmask: bool,
	/// Symbol table in declaration order.
	pub symbols: Vec<(Box<str>, u64)>,
}

impl EnumType {
	/// Look up the symbol for an exact value.
	pub fn name_of(&self, value: u64) -> Option<&str> {
		self.symbols
			.iter()
			.find(|(_, v)| *v == value)
			.map(|(k, _)| k.as_ref())
	}

	/// Look up the value of a symbol.
	pub fn value_of(&self, name: &str) -> Option<u64> {
		self.symbols
			.iter()
			.find(|(k, _)| k.as_ref() == name)
			.map(|(_, v)| *v)
	}

	/// Human-readable form of a value.
	///
	/// Exact-match enums return the symbol, or the number unchanged when no
	/// symbol matches. Bitmask enums match set flags greedily from the
	/// highest value down and append unmatched residual bits as a hex token;
	/// zero stays the number 0.
	pub fn format(&self, value: u64) -> JsonValue {
		if !self.bitmask {
			return match self.name_of(value) {
				Some(name) => JsonValue::from(name),
				None => JsonValue::from(value),
			};
		}

		let mut sorted: Vec<&(Box<str>, u64)> = self.symbols.iter().collect();
		sorted.sort_by(|a, b| b.1.cmp(&a.1));

		let mut rest = value;
		let mut names = Vec::new();
		for (name, v) in sorted {
			if rest & v == *v {
				names.push(name.to_string());
				rest ^= v;
			}
		}
		names.reverse();
		if rest != 0 {
			names.push(format!("{rest:#x}"));
		}
		if names.is_empty() {
			return JsonValue::from(0);
		}
		JsonValue::from(names.join(" "))
	}
}

/// Builder for an [EnumType].
pub struct EnumDef {
	name: Box<str>,
	base: IntSpec,
	bitmask: bool,
	symbols: Vec<(Box<str>, u64)>,
}

impl EnumDef {
	/// Start an enum over a backing integer type.
	///
	/// # Panics
	///
	/// Panics when `backing` is not an integer type.
	pub fn new(name: &str, backing: TypeRef) -> Self {
		let TypeRef::Int(base) = backing else {
			panic!("enum backing must be an integer type, got {}", backing.type_name());
		};
		Self {
			name: name.into(),
			base,
			bitmask: false,
			symbols: Vec::new(),
		}
	}

	/// Mark the enum as a bitmask of OR-combinable flags.
	pub fn bitmask(mut self) -> Self {
		self.bitmask = true;
		self
	}

	/// Add one symbol.
	pub fn value(mut self, name: &str, value: u64) -> Self {
		self.symbols.push((name.into(), value));
		self
	}

	/// Freeze the enum type.
	pub fn build(self) -> TypeRef {
		TypeRef::Enum(Arc::new(EnumType {
			name: self.name,
			base: self.base,
			bitmask: self.bitmask,
			symbols: self.symbols,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{UINT8, UINT16};

	fn abilities() -> Arc<EnumType> {
		let TypeRef::Enum(def) = EnumDef::new("abilities", UINT16)
			.bitmask()
			.value("SWIMMING", 1)
			.value("JUMPING", 2)
			.value("RUNNING", 4)
			.value("CLIMBING", 8)
			.build()
		else {
			unreachable!()
		};
		def
	}

	#[test]
	fn exact_match_formats_to_symbol() {
		let TypeRef::Enum(def) = EnumDef::new("kind", UINT8).value("A", 1).value("B", 2).build() else {
			unreachable!()
		};
		assert_eq!(def.format(2), JsonValue::from("B"));
		assert_eq!(def.format(9), JsonValue::from(9_u64), "unknown value stays numeric");
	}

	#[test]
	fn bitmask_joins_set_flags() {
		let def = abilities();
		assert_eq!(def.format(10), JsonValue::from("JUMPING CLIMBING"));
		assert_eq!(def.format(1), JsonValue::from("SWIMMING"));
	}

	#[test]
	fn bitmask_appends_residual_bits_as_hex() {
		let def = abilities();
		assert_eq!(def.format(0x13), JsonValue::from("SWIMMING JUMPING 0x10"));
	}

	#[test]
	fn bitmask_zero_stays_numeric() {
		let def = abilities();
		assert_eq!(def.format(0), JsonValue::from(0));
	}

	#[test]
	fn bitmask_prefers_wider_merged_flags() {
		let TypeRef::Enum(def) = EnumDef::new("merged", UINT16)
			.bitmask()
			.value("A", 0x1)
			.value("B", 0x2)
			.value("C", 0x4)
			.value("D", 0x8)
			.value("E", 0x9)
			.build()
		else {
			unreachable!()
		};
		assert_eq!(def.format(0x9), JsonValue::from("E"));
		assert_eq!(def.format(0xb), JsonValue::from("B E"));
	}
}
