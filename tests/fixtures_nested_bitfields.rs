use serde_json::json;
use wirestruct::{
	dump_struct, pack_size, pack_value, size_from_len, BitfieldDef, DumpOptions, EnumDef, StructDef, TypeRef, Value,
};
use wirestruct::{UINT32, UINT64, UINT8};

const PACKED: [u8; 32] = [
	0x40, 0x00, 0x08, 0x00, 0x80, 0x00, 0x00, 0x20, 0x82, 0x80, 0x00, 0x0c, 0x00, 0x00, 0x48, 0x00, 0x20, 0x00,
	0x00, 0x00, 0x00, 0x00, 0x00, 0x1f, 0x5f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xf8, 0x17,
];

fn bitfield_test() -> TypeRef {
	BitfieldDef::new("bitfield_test", UINT32)
		.field(1, "a")
		.field(9, "r")
		.field(11, "g")
		.field(11, "b")
		.init(pack_value(1, "a"))
		.build()
		.expect("widths fit the backing integer")
}

fn bitfield_array() -> TypeRef {
	BitfieldDef::new("bitfield_array", UINT64)
		.field(3, "pre")
		.array_field(1, "bits", 50)
		.pad(4)
		.field(7, "post")
		.build()
		.expect("widths fit the backing integer")
}

fn test_struct() -> TypeRef {
	let pre_enum = EnumDef::new("pre_enum", UINT8)
		.bitmask()
		.value("PRE_A", 0x1)
		.value("PRE_B", 0x2)
		.value("PRE_C", 0x4)
		.build();

	StructDef::new("test_struct")
		.field(bitfield_array(), "s1")
		.field(bitfield_test().array(2), "colors")
		.field(bitfield_array().array(0), "extras")
		.size(size_from_len(128, "s1.post"))
		.prepack(pack_size("s1.post"))
		.extend("s1.pre", pre_enum)
		.build()
		.expect("declaration freezes")
}

fn build_sample(ty: &TypeRef) -> wirestruct::StructValue {
	let mut value = ty.new_value().expect("defaults instantiate");

	{
		let s1 = value.get_struct_mut("s1").unwrap();
		s1.set_uint("pre", 2).unwrap();
		s1.get_list_mut("bits").unwrap()[17] = Value::Uint(1);
		s1.get_list_mut("bits").unwrap()[29] = Value::Uint(1);
	}

	let mut color0 = bitfield_test().new_value().unwrap();
	color0.set_uint("r", 10).unwrap();
	color0.set_uint("b", 12).unwrap();
	let mut color1 = bitfield_test().new_value().unwrap();
	color1.set_uint("a", 0).unwrap();
	color1.set_uint("g", 9).unwrap();
	value.set("colors", vec![Value::from(color0), Value::from(color1)]).unwrap();

	let mut extra0 = bitfield_array().new_value().unwrap();
	extra0.set_uint("pre", 1).unwrap();
	extra0.set_uint("post", 0x1f).unwrap();
	let mut extra1 = bitfield_array().new_value().unwrap();
	extra1.set_uint("pre", 2).unwrap();
	extra1.set("bits", Value::List(vec![Value::Uint(1); 50])).unwrap();
	extra1.set_uint("post", 0x17).unwrap();
	value.set("extras", vec![Value::from(extra0), Value::from(extra1)]).unwrap();

	value
}

#[test]
fn nested_bitfield_struct_packs_the_golden_vector() {
	let ty = test_struct();
	let mut value = build_sample(&ty);

	let bytes = value.to_bytes().unwrap();
	assert_eq!(bytes, PACKED);
	assert_eq!(
		value.get_struct("s1").unwrap().get_uint("post").unwrap(),
		32,
		"prepack stored the padded length in the nested field"
	);
}

#[test]
fn parse_reads_the_window_from_the_nested_length() {
	let ty = test_struct();
	let mut value = build_sample(&ty);
	let bytes = value.to_bytes().unwrap();

	let (parsed, consumed) = ty.parse(&bytes).unwrap();
	assert_eq!(consumed, 32);
	let parsed = parsed.into_struct().unwrap();
	assert_eq!(parsed, value);
	assert_eq!(parsed.get_list("extras").unwrap().len(), 2);
}

#[test]
fn create_consumes_all_bytes() {
	let ty = test_struct();
	let mut value = build_sample(&ty);
	let bytes = value.to_bytes().unwrap();

	let created = ty.create(&bytes).unwrap().into_struct().unwrap();
	assert_eq!(created, value);
}

#[test]
fn nested_extend_path_symbolizes_on_dump() {
	let ty = test_struct();
	let mut value = build_sample(&ty);
	value.to_bytes().unwrap();

	let dumped = dump_struct(
		&value,
		&DumpOptions {
			human_readable: true,
			include_type: false,
		},
	)
	.unwrap();
	assert_eq!(dumped["s1"]["pre"], json!("PRE_B"));
	assert_eq!(dumped["s1"]["post"], json!(32));
}
