use serde_json::json;
use wirestruct::{dump, dump_struct, DumpOptions, EnumDef, StructDef, Value, WireError, UINT16, UINT8};

fn human() -> DumpOptions {
	DumpOptions {
		human_readable: true,
		include_type: false,
	}
}

fn pet_type() -> wirestruct::TypeRef {
	let abilities = EnumDef::new("abilities", UINT16)
		.bitmask()
		.value("SWIMMING", 1)
		.value("JUMPING", 2)
		.value("RUNNING", 4)
		.value("CLIMBING", 8)
		.build();
	StructDef::new("pet")
		.field(abilities, "abilities")
		.field(UINT8, "age")
		.padding(1)
		.build()
		.expect("declaration freezes")
}

#[test]
fn bitmask_enums_symbolize_only_when_human_readable() {
	let ty = pet_type();
	let mut value = ty.new_value().unwrap();
	value.set_uint("abilities", 10).unwrap();

	let readable = dump_struct(&value, &human()).unwrap();
	assert_eq!(readable["abilities"], json!("JUMPING CLIMBING"));

	let raw = dump_struct(
		&value,
		&DumpOptions {
			human_readable: false,
			include_type: false,
		},
	)
	.unwrap();
	assert_eq!(raw["abilities"], json!(10));
}

#[test]
fn include_type_adds_the_effective_type_name() {
	let ty = pet_type();
	let value = ty.new_value().unwrap();
	let dumped = dump_struct(&value, &DumpOptions::default()).unwrap();
	assert_eq!(dumped["_type"], json!("<pet>"));
}

#[test]
fn dump_preserves_declaration_order() {
	let ty = pet_type();
	let value = ty.new_value().unwrap();
	let dumped = dump_struct(&value, &human()).unwrap();
	let keys: Vec<&String> = dumped.as_object().unwrap().keys().collect();
	assert_eq!(keys, ["abilities", "age"]);
}

#[test]
fn bytes_dump_length_preserving() {
	let dumped = dump(&Value::Bytes(vec![0x61, 0x00, 0x62]), &DumpOptions::default()).unwrap();
	assert_eq!(dumped, json!([0x61, 0x00, 0x62]));
}

#[test]
fn struct_formatter_replaces_the_whole_mapping() {
	let ty = StructDef::new("summary")
		.field(UINT16, "count")
		.padding(1)
		.formatter(Box::new(|dumped| Ok(json!(format!("count={}", dumped["count"])))))
		.build()
		.unwrap();
	let mut value = ty.new_value().unwrap();
	value.set_uint("count", 3).unwrap();

	let dumped = dump_struct(&value, &human()).unwrap();
	assert_eq!(dumped, json!("count=3"));

	let raw = dump_struct(
		&value,
		&DumpOptions {
			human_readable: false,
			include_type: false,
		},
	)
	.unwrap();
	assert_eq!(raw, json!({"count": 3}), "formatter only runs in human mode");
}

#[test]
fn custom_field_formatters_apply_through_with_formatter() {
	let hex16 = UINT16.with_formatter(Box::new(|dumped| {
		let raw = dumped.as_u64().unwrap_or_default();
		Ok(json!(format!("{raw:#06x}")))
	}));
	let ty = StructDef::new("hexed")
		.field(hex16, "code")
		.padding(1)
		.build()
		.unwrap();
	let mut value = ty.new_value().unwrap();
	value.set_uint("code", 0xbeef).unwrap();

	let dumped = dump_struct(&value, &human()).unwrap();
	assert_eq!(dumped["code"], json!("0xbeef"));
}

#[test]
fn formatter_failures_propagate_as_callback_errors() {
	let ty = StructDef::new("failing")
		.field(UINT8, "x")
		.padding(1)
		.formatter(Box::new(|_| {
			Err(WireError::FieldTypeMismatch {
				field: "x".to_owned(),
				expected: "number",
				got: "null",
			})
		}))
		.build()
		.unwrap();
	let value = ty.new_value().unwrap();

	let err = dump_struct(&value, &human()).unwrap_err();
	assert!(matches!(err, WireError::Callback { kind: "formatter", .. }));
}

#[test]
fn derived_extends_override_base_formatting() {
	let kind = EnumDef::new("kind", UINT8).value("PING", 1).value("PONG", 2).build();
	let base = StructDef::new("msg")
		.field(UINT16, "length")
		.field(UINT8, "kind")
		.pad(UINT8)
		.padding(1)
		.size(Box::new(|v| Ok(v.get_uint("length")? as usize)))
		.prepack(wirestruct::pack_real_size("length"))
		.classifier(Box::new(|v| v.get_uint("kind")))
		.extend("kind", kind)
		.build()
		.unwrap();
	let flags = EnumDef::new("ping_flags", UINT8).bitmask().value("URGENT", 1).build();
	StructDef::new("ping")
		.field(UINT8, "flags")
		.base(&base)
		.classify_by(&[1])
		.init(wirestruct::pack_value(1, "kind"))
		.extend("flags", flags)
		.build()
		.unwrap();

	let (parsed, _) = base.parse(&[0x00, 0x05, 0x01, 0x00, 0x01]).unwrap();
	let parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed.type_name(), "ping");

	let dumped = dump_struct(&parsed, &human()).unwrap();
	assert_eq!(dumped["kind"], json!("PING"), "base extend still applies to the derived value");
	assert_eq!(dumped["flags"], json!("URGENT"));
}
