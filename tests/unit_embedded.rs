use wirestruct::{optional, pack_expr, StructDef, TypeRef, Value, WireError, RAW, UINT16, UINT32, UINT8};

/// Simplified ARP-style layout: two embedded structs carry variable-length
/// addresses whose windows come from length fields of the enclosing struct.
fn pseudo_arp() -> TypeRef {
	let hw = StructDef::new("hw_addr")
		.field(RAW, "hw")
		.padding(1)
		.size(Box::new(|v| Ok(v.get_uint("alen")? as usize)))
		.prepack(pack_expr(|v| Ok(v.get_bytes("hw")?.len() as u64), "alen"))
		.build()
		.expect("embedded type freezes");
	let proto = StructDef::new("proto_addr")
		.field(RAW, "ip")
		.padding(1)
		.size(Box::new(|v| Ok(v.get_uint("plen")? as usize)))
		.prepack(pack_expr(|v| Ok(v.get_bytes("ip")?.len() as u64), "plen"))
		.build()
		.expect("embedded type freezes");

	StructDef::new("pseudo_arp")
		.field(UINT8, "alen")
		.field(UINT8, "plen")
		.embed(hw)
		.embed(proto)
		.padding(1)
		.build()
		.expect("declaration freezes")
}

#[test]
fn embedded_fields_are_promoted_into_the_parent() {
	let ty = pseudo_arp();
	let mut value = ty.new_value().unwrap();
	value.set_bytes("hw", [0x01, 0x3f, 0x11, 0x1b]).unwrap();
	value.set_bytes("ip", [0xc0, 0xa8, 0x01, 0x02]).unwrap();

	let bytes = value.to_bytes().unwrap();
	assert_eq!(bytes, [0x04, 0x04, 0x01, 0x3f, 0x11, 0x1b, 0xc0, 0xa8, 0x01, 0x02]);
	assert_eq!(value.get_uint("alen").unwrap(), 4, "embedded prepack wrote into the parent");
}

#[test]
fn embedded_windows_come_from_parent_fields() {
	let ty = pseudo_arp();
	let bytes = [0x06, 0x04, 0x01, 0x3f, 0x11, 0x1b, 0x00, 0xff, 0xc0, 0xa8, 0x01, 0x03];

	let (parsed, consumed) = ty.parse(&bytes).unwrap();
	assert_eq!(consumed, bytes.len());
	let parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed.get_bytes("hw").unwrap(), [0x01, 0x3f, 0x11, 0x1b, 0x00, 0xff]);
	assert_eq!(parsed.get_bytes("ip").unwrap(), [0xc0, 0xa8, 0x01, 0x03]);
}

#[test]
fn embedded_roundtrip_is_idempotent() {
	let ty = pseudo_arp();
	let mut value = ty.new_value().unwrap();
	value.set_bytes("hw", *b"\x11\x22\x33").unwrap();
	value.set_bytes("ip", *b"\x0a\x00\x00\x01").unwrap();

	let bytes = value.to_bytes().unwrap();
	let (parsed, _) = ty.parse(&bytes).unwrap();
	let mut parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed, value);
	assert_eq!(parsed.to_bytes().unwrap(), bytes);
}

#[test]
fn optional_fields_parse_on_their_predicate() {
	let ty = StructDef::new("myopt")
		.field(UINT16, "data")
		.field(UINT8, "hasextra")
		.embed(optional(
			UINT32,
			"extra",
			Box::new(|v| Ok(v.get_uint("hasextra")? != 0)),
		))
		.padding(1)
		.prepack(pack_expr(|v| Ok(u64::from(v.is_set("extra")?)), "hasextra"))
		.build()
		.unwrap();

	let mut with_extra = ty.new_value().unwrap();
	with_extra.set_uint("data", 7).unwrap();
	with_extra.set("extra", Value::Uint(12)).unwrap();
	let bytes = with_extra.to_bytes().unwrap();
	assert_eq!(bytes, [0x00, 0x07, 0x01, 0x00, 0x00, 0x00, 0x0c]);

	let (parsed, consumed) = ty.parse(&bytes).unwrap();
	assert_eq!(consumed, 7);
	assert_eq!(parsed.into_struct().unwrap().get_uint("extra").unwrap(), 12);

	let mut without = ty.new_value().unwrap();
	without.set_uint("data", 7).unwrap();
	let bytes = without.to_bytes().unwrap();
	assert_eq!(bytes, [0x00, 0x07, 0x00]);

	let (parsed, consumed) = ty.parse(&bytes).unwrap();
	assert_eq!(consumed, 3);
	assert!(!parsed.into_struct().unwrap().is_set("extra").unwrap());
}

#[test]
fn promoted_names_collide_with_parent_names() {
	let inner = StructDef::new("inner")
		.field(UINT8, "alen")
		.padding(1)
		.build()
		.unwrap();
	let err = StructDef::new("outer")
		.field(UINT8, "alen")
		.embed(inner)
		.padding(1)
		.build();
	assert!(matches!(err, Err(WireError::DuplicateField { .. })));
}
