use wirestruct::{pack_real_size, pack_value, StructDef, TypeRef, WireError, UINT16, UINT32, UINT8};

struct Family {
	base: TypeRef,
	child_a: TypeRef,
	child_b: TypeRef,
}

fn criteria_family() -> Family {
	let base = StructDef::new("base1")
		.field(UINT16, "length")
		.field(UINT8, "type")
		.field(UINT8, "basedata")
		.padding(4)
		.size(Box::new(|v| Ok(v.get_uint("length")? as usize)))
		.prepack(pack_real_size("length"))
		.build()
		.expect("base freezes");
	let child_a = StructDef::new("child_a")
		.field(UINT16, "data1")
		.field(UINT8, "data2")
		.base(&base)
		.criteria(Box::new(|v| Ok(v.get_uint("type")? == 1)))
		.init(pack_value(1, "type"))
		.build()
		.expect("child freezes");
	let child_b = StructDef::new("child_b")
		.field(UINT32, "data3")
		.base(&base)
		.criteria(Box::new(|v| Ok(v.get_uint("type")? == 2)))
		.init(pack_value(2, "type"))
		.build()
		.expect("child freezes");
	Family { base, child_a, child_b }
}

#[test]
fn derived_values_pack_base_fields_first() {
	let family = criteria_family();

	let mut a = family.child_a.new_value().unwrap();
	a.set_uint("basedata", 1).unwrap();
	a.set_uint("data1", 2).unwrap();
	a.set_uint("data2", 3).unwrap();
	assert_eq!(a.to_bytes().unwrap(), [0x00, 0x07, 0x01, 0x01, 0x00, 0x02, 0x03, 0x00]);

	let mut b = family.child_b.new_value().unwrap();
	b.set_uint("basedata", 1).unwrap();
	b.set_uint("data3", 4).unwrap();
	assert_eq!(b.to_bytes().unwrap(), [0x00, 0x08, 0x02, 0x01, 0x00, 0x00, 0x00, 0x04]);
}

#[test]
fn parse_dispatches_to_the_matching_extension() {
	let family = criteria_family();

	let (parsed, consumed) = family.base.parse(&[0x00, 0x07, 0x01, 0x01, 0x00, 0x02, 0x03, 0x00]).unwrap();
	assert_eq!(consumed, 8, "declared size 7 rounds up to the base padding");
	let parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed.type_name(), "child_a");
	assert_eq!(parsed.get_uint("data1").unwrap(), 2);
	assert_eq!(parsed.get_uint("data2").unwrap(), 3);
	assert_eq!(parsed.get_uint("basedata").unwrap(), 1);
}

#[test]
fn dispatch_is_deterministic() {
	let family = criteria_family();
	let bytes = [0x00, 0x08, 0x02, 0x01, 0x00, 0x00, 0x00, 0x04];
	for _ in 0..3 {
		let (parsed, _) = family.base.parse(&bytes).unwrap();
		assert_eq!(parsed.into_struct().unwrap().type_name(), "child_b");
	}
}

#[test]
fn unmatched_tags_stay_the_base_type_and_keep_their_bytes() {
	let family = criteria_family();
	let bytes = [0x00, 0x06, 0x09, 0x01, 0xaa, 0xbb, 0x00, 0x00];

	let (parsed, consumed) = family.base.parse(&bytes).unwrap();
	assert_eq!(consumed, 8);
	let mut parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed.type_name(), "base1");
	assert_eq!(parsed.extra(), &[0xaa, 0xbb], "window bytes beyond known fields are kept");

	assert_eq!(parsed.to_bytes().unwrap(), bytes, "extension bytes survive a round trip");
}

#[test]
fn parsing_via_a_derived_type_still_dispatches_from_the_base() {
	let family = criteria_family();
	let bytes = [0x00, 0x07, 0x01, 0x01, 0x00, 0x02, 0x03, 0x00];
	let (parsed, _) = family.child_b.parse(&bytes).unwrap();
	assert_eq!(parsed.into_struct().unwrap().type_name(), "child_a");
}

#[test]
fn classifier_keys_dispatch_without_criteria() {
	let base = StructDef::new("keyed_base")
		.field(UINT16, "length")
		.field(UINT8, "kind")
		.field(UINT8, "flags")
		.padding(1)
		.size(Box::new(|v| Ok(v.get_uint("length")? as usize)))
		.prepack(pack_real_size("length"))
		.classifier(Box::new(|v| v.get_uint("kind")))
		.build()
		.unwrap();
	let echo = StructDef::new("echo")
		.field(UINT32, "token")
		.base(&base)
		.classify_by(&[7, 8])
		.init(pack_value(7, "kind"))
		.build()
		.unwrap();

	let mut value = echo.new_value().unwrap();
	value.set_uint("token", 0xdead_beef).unwrap();
	let bytes = value.to_bytes().unwrap();
	assert_eq!(bytes, [0x00, 0x08, 0x07, 0x00, 0xde, 0xad, 0xbe, 0xef]);

	let (parsed, _) = base.parse(&bytes).unwrap();
	let parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed.type_name(), "echo");
	assert_eq!(parsed.get_uint("token").unwrap(), 0xdead_beef);
}

#[test]
fn strict_mode_rejects_ambiguous_criteria() {
	let base = StructDef::new("strict_base")
		.field(UINT16, "length")
		.field(UINT8, "kind")
		.pad(UINT8)
		.padding(1)
		.size(Box::new(|v| Ok(v.get_uint("length")? as usize)))
		.prepack(pack_real_size("length"))
		.strict()
		.build()
		.unwrap();
	for name in ["greedy_a", "greedy_b"] {
		StructDef::new(name)
			.field(UINT8, &format!("{name}_data"))
			.base(&base)
			.criteria(Box::new(|v| Ok(v.get_uint("kind")? == 1)))
			.build()
			.unwrap();
	}

	let err = base.parse(&[0x00, 0x05, 0x01, 0x00, 0xff]).unwrap_err();
	assert!(matches!(err, WireError::AmbiguousDerived { .. }));
}

#[test]
fn extend_never_changes_bytes() {
	let plain = StructDef::new("plain")
		.field(UINT16, "flags")
		.padding(1)
		.build()
		.unwrap();
	let extended = StructDef::new("extended")
		.field(UINT16, "flags")
		.padding(1)
		.extend(
			"flags",
			wirestruct::EnumDef::new("flag_names", UINT16).bitmask().value("ON", 1).build(),
		)
		.build()
		.unwrap();

	let mut a = plain.new_value().unwrap();
	a.set_uint("flags", 3).unwrap();
	let mut b = extended.new_value().unwrap();
	b.set_uint("flags", 3).unwrap();
	assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
}
