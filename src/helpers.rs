use std::sync::Arc;

use crate::error::{Result, WireError};
use crate::types::{CountFn, DArrayType, HookFn, OptionalType, PredFn, SizeFn, TypeRef};
use crate::value::StructValue;

/// Conditional field: parsed and packed only when `pred` holds on the
/// enclosing struct.
///
/// Place the result as an anonymous member; the field appears in the parent
/// under `name`. The predicate may only read fields declared before it.
pub fn optional(inner: TypeRef, name: &str, pred: PredFn) -> TypeRef {
	TypeRef::Optional(Arc::new(OptionalType {
		inner,
		name: name.into(),
		pred,
	}))
}

/// Dynamic array of exactly `count(parent)` elements.
///
/// Place the result as an anonymous member; the array appears in the parent
/// under `name`. The count callback may only read fields declared before it,
/// typically a sibling length field written back by a prepack helper.
pub fn darray(elem: TypeRef, name: &str, count: CountFn) -> TypeRef {
	darray_padded(elem, name, count, 1)
}

/// [darray] whose packed byte length is aligned to `padding`.
pub fn darray_padded(elem: TypeRef, name: &str, count: CountFn, padding: usize) -> TypeRef {
	TypeRef::DArray(Arc::new(DArrayType {
		elem,
		name: name.into(),
		count,
		padding: padding.max(1),
	}))
}

/// Prepack/init hook writing a constant to a dotted field path.
pub fn pack_value(value: u64, path: &str) -> HookFn {
	let path = path.to_owned();
	Box::new(move |value_tree: &mut StructValue| value_tree.set_path(&path, value))
}

/// Prepack hook writing a computed value to a dotted field path.
pub fn pack_expr<F>(expr: F, path: &str) -> HookFn
where
	F: Fn(&StructValue) -> Result<u64> + Send + Sync + 'static,
{
	let path = path.to_owned();
	Box::new(move |value: &mut StructValue| {
		let computed = expr(value)?;
		value.set_path(&path, computed)
	})
}

/// Prepack hook writing the padded on-wire length to a dotted field path.
pub fn pack_size(path: &str) -> HookFn {
	let path = path.to_owned();
	Box::new(move |value: &mut StructValue| {
		let length = value.length()?;
		value.set_path(&path, length as u64)
	})
}

/// Prepack hook writing the unpadded byte length to a dotted field path.
///
/// The canonical partner of a `size` callback reading the same field.
pub fn pack_real_size(path: &str) -> HookFn {
	let path = path.to_owned();
	Box::new(move |value: &mut StructValue| {
		let real = value.real_size()?;
		value.set_path(&path, real as u64)
	})
}

/// Size callback reading a dotted length-field path, bounded by `limit`.
///
/// Values beyond `limit` fail with `SizeLimitExceeded`, guarding against
/// hostile length fields.
pub fn size_from_len(limit: usize, path: &str) -> SizeFn {
	let path = path.to_owned();
	Box::new(move |value: &StructValue| {
		let got = value.get_uint_path(&path)? as usize;
		if got > limit {
			return Err(WireError::SizeLimitExceeded { limit, got });
		}
		Ok(got)
	})
}
