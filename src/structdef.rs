use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, WireError};
use crate::types::{ClassifierFn, Endian, FormatFn, HookFn, PredFn, SizeFn, TypeRef, RAW};
use crate::value::{StructValue, Value};

/// One named slot in a struct's flattened view.
///
/// Hidden slots (`name == None`) hold the spare window bytes of embedded
/// structs that declare their own size.
#[derive(Clone)]
pub(crate) struct FlatField {
	pub name: Option<Box<str>>,
	pub ty: TypeRef,
}

/// One step of a struct's parse/pack program.
pub(crate) enum Entry {
	/// Named field (primitive, composite, optional, or dynamic array).
	Field { flat: usize },
	/// Anonymous primitive: `width` padding bytes.
	Pad { width: usize },
	/// Anonymous struct whose fields are promoted into the parent.
	Embedded {
		ty: Arc<StructType>,
		/// First promoted slot, relative to the owner's flat table.
		flat_start: usize,
		/// Hidden slot for spare bytes when the embedded struct has a size.
		extra_slot: Option<usize>,
	},
}

/// Registry of derived types on a base struct.
#[derive(Default)]
pub(crate) struct DerivedTable {
	/// Derived types in declaration order (criteria fallback scan).
	pub list: Vec<Arc<StructType>>,
	/// Classifier key to derived index; first declaration wins.
	pub keys: HashMap<u64, usize>,
}

/// Dump-formatting rule: dotted path and the type whose formatter applies.
pub(crate) type DumpRule = (Vec<Box<str>>, TypeRef);

/// Frozen struct type descriptor.
pub struct StructType {
	pub name: Box<str>,
	pub(crate) entries: Vec<Entry>,
	pub(crate) flat: Vec<FlatField>,
	names: HashMap<Box<str>, usize>,
	/// Alignment unit; derived types inherit the root's.
	pub padding: usize,
	pub(crate) size_fn: Option<SizeFn>,
	pub(crate) prepack_fn: Option<HookFn>,
	pub(crate) init_fn: Option<HookFn>,
	pub(crate) classifier: Option<ClassifierFn>,
	pub(crate) strict: bool,
	pub(crate) base: Option<Arc<StructType>>,
	pub(crate) criteria: Option<PredFn>,
	pub(crate) derived: RwLock<DerivedTable>,
	pub(crate) dump_rules: Vec<DumpRule>,
	pub(crate) formatter: Option<FormatFn>,
	/// Total flattened slot count of the base chain.
	pub(crate) base_flat_len: usize,
	/// Constant on-wire length (with padding), when one exists.
	pub(crate) fixed_size: Option<usize>,
	/// Whether this struct greedily consumes the enclosing window.
	pub(crate) open_ended: bool,
	/// Entry index of the variable-length trailer.
	pub(crate) trailer: Option<usize>,
}

impl StructType {
	/// Resolve a flattened field name to its absolute slot index.
	///
	/// Searches own fields (embedded fields included) first, then the base
	/// chain.
	pub(crate) fn resolve(&self, name: &str) -> Option<usize> {
		if let Some(index) = self.names.get(name) {
			return Some(self.base_flat_len + index);
		}
		self.base.as_deref()?.resolve(name)
	}

	/// Total slot count of the flattened view, base chain included.
	pub(crate) fn flat_len_total(&self) -> usize {
		self.base_flat_len + self.flat.len()
	}

	/// Base chain from the root down to this type.
	pub(crate) fn chain(self: &Arc<Self>) -> Vec<Arc<StructType>> {
		let mut chain = match &self.base {
			Some(base) => base.chain(),
			None => Vec::new(),
		};
		chain.push(Arc::clone(self));
		chain
	}

	/// Root of the base chain.
	pub(crate) fn root(self: &Arc<Self>) -> Arc<StructType> {
		match &self.base {
			Some(base) => base.root(),
			None => Arc::clone(self),
		}
	}

	/// Default value: zeroed slots, then init callbacks root-down.
	pub(crate) fn default_value(self: &Arc<Self>) -> Result<StructValue> {
		let chain = self.chain();
		let mut slots = Vec::with_capacity(self.flat_len_total());
		for level in &chain {
			for field in &level.flat {
				match &field.name {
					Some(_) => slots.push(field.ty.default_value()?),
					None => slots.push(Value::Bytes(Vec::new())),
				}
			}
		}
		let mut value = StructValue::with_slots(TypeRef::Struct(Arc::clone(self)), slots);
		for level in &chain {
			run_embedded_inits(level, &mut value)?;
			if let Some(init) = &level.init_fn {
				init(&mut value).map_err(|e| WireError::callback("init", &level.name, e))?;
			}
		}
		Ok(value)
	}

	/// Select a derived type for a parsed value, or `None` to stay concrete.
	pub(crate) fn classify(&self, value: &StructValue) -> Result<Option<Arc<StructType>>> {
		let table = self.derived.read().unwrap_or_else(PoisonError::into_inner);
		if table.list.is_empty() {
			return Ok(None);
		}

		if let Some(classifier) = &self.classifier {
			let key = classifier(value).map_err(|e| WireError::callback("classifier", &self.name, e))?;
			if let Some(index) = table.keys.get(&key) {
				return Ok(Some(Arc::clone(&table.list[*index])));
			}
		}

		let mut found: Option<Arc<StructType>> = None;
		for candidate in &table.list {
			let Some(criteria) = &candidate.criteria else {
				continue;
			};
			if criteria(value).map_err(|e| WireError::callback("criteria", &candidate.name, e))? {
				if !self.strict {
					return Ok(Some(Arc::clone(candidate)));
				}
				if found.is_some() {
					return Err(WireError::AmbiguousDerived {
						type_name: self.name.to_string(),
					});
				}
				found = Some(Arc::clone(candidate));
			}
		}
		Ok(found)
	}
}

fn run_embedded_inits(level: &StructType, value: &mut StructValue) -> Result<()> {
	for entry in &level.entries {
		if let Entry::Embedded { ty, .. } = entry {
			run_embedded_inits(ty, value)?;
			if let Some(init) = &ty.init_fn {
				init(value).map_err(|e| WireError::callback("init", &ty.name, e))?;
			}
		}
	}
	Ok(())
}

impl fmt::Debug for StructType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<nstruct {}: {} fields>", self.name, self.flat.len())
	}
}

enum Member {
	Named(TypeRef, Box<str>),
	Anon(TypeRef),
}

/// Builder freezing a [StructType].
///
/// Field order is declaration order; base fields always parse first. A
/// derived type inherits the root's padding and size semantics.
pub struct StructDef {
	name: Box<str>,
	members: Vec<Member>,
	padding: usize,
	endian: Option<Endian>,
	size_fn: Option<SizeFn>,
	prepack_fn: Option<HookFn>,
	init_fn: Option<HookFn>,
	classifier: Option<ClassifierFn>,
	strict: bool,
	base: Option<Arc<StructType>>,
	criteria: Option<PredFn>,
	classify_by: Vec<u64>,
	extend: Vec<(Box<str>, TypeRef)>,
	formatter: Option<FormatFn>,
}

impl StructDef {
	pub fn new(name: &str) -> Self {
		Self {
			name: name.into(),
			members: Vec::new(),
			padding: 8,
			endian: None,
			size_fn: None,
			prepack_fn: None,
			init_fn: None,
			classifier: None,
			strict: false,
			base: None,
			criteria: None,
			classify_by: Vec::new(),
			extend: Vec::new(),
			formatter: None,
		}
	}

	/// Add a named field.
	pub fn field(mut self, ty: TypeRef, name: &str) -> Self {
		let ty = self.apply_endian(ty);
		self.members.push(Member::Named(ty, name.into()));
		self
	}

	/// Add an anonymous primitive field: padding bytes.
	pub fn pad(mut self, ty: TypeRef) -> Self {
		let ty = self.apply_endian(ty);
		self.members.push(Member::Anon(ty));
		self
	}

	/// Add an anonymous member: an embedded struct whose fields are promoted
	/// into this struct, an optional field, or a dynamic array.
	pub fn embed(mut self, ty: TypeRef) -> Self {
		self.members.push(Member::Anon(ty));
		self
	}

	/// Set the alignment unit (1 disables padding). Default is 8.
	pub fn padding(mut self, padding: usize) -> Self {
		self.padding = padding.max(1);
		self
	}

	/// Set the default byte order applied to integer fields added after this
	/// call.
	pub fn endian(mut self, endian: Endian) -> Self {
		self.endian = Some(endian);
		self
	}

	/// Set the size callback resolving the on-wire window from parsed fields.
	pub fn size(mut self, size: SizeFn) -> Self {
		self.size_fn = Some(size);
		self
	}

	/// Set the callback run immediately before packing.
	pub fn prepack(mut self, prepack: HookFn) -> Self {
		self.prepack_fn = Some(prepack);
		self
	}

	/// Set the callback run when a new value is instantiated.
	pub fn init(mut self, init: HookFn) -> Self {
		self.init_fn = Some(init);
		self
	}

	/// Set the classifier computing a dispatch key on parsed base fields.
	pub fn classifier(mut self, classifier: ClassifierFn) -> Self {
		self.classifier = Some(classifier);
		self
	}

	/// Fail with `AmbiguousDerived` when several criteria match at parse.
	pub fn strict(mut self) -> Self {
		self.strict = true;
		self
	}

	/// Declare this type as an extension of `base`.
	///
	/// # Panics
	///
	/// Panics when `base` is not a struct type.
	pub fn base(mut self, base: &TypeRef) -> Self {
		let TypeRef::Struct(def) = base else {
			panic!("base must be a struct type, got {}", base.type_name());
		};
		self.base = Some(Arc::clone(def));
		self
	}

	/// Set the predicate selecting this extension from its base.
	pub fn criteria(mut self, criteria: PredFn) -> Self {
		self.criteria = Some(criteria);
		self
	}

	/// Register classifier keys selecting this extension from its base.
	pub fn classify_by(mut self, keys: &[u64]) -> Self {
		self.classify_by.extend_from_slice(keys);
		self
	}

	/// Override the dump type of a field; dotted paths reach nested fields.
	pub fn extend(mut self, path: &str, ty: TypeRef) -> Self {
		self.extend.push((path.into(), ty));
		self
	}

	/// Set a formatter applied to the whole dumped mapping last.
	pub fn formatter(mut self, format: FormatFn) -> Self {
		self.formatter = Some(format);
		self
	}

	fn apply_endian(&self, ty: TypeRef) -> TypeRef {
		match self.endian {
			Some(endian) => ty.with_endian(endian),
			None => ty,
		}
	}

	/// Freeze the struct type and register it with its base.
	pub fn build(self) -> Result<TypeRef> {
		if self.criteria.is_some() && self.base.is_none() {
			panic!("criteria on {} requires a base type", self.name);
		}
		if !self.classify_by.is_empty() {
			let has_classifier = self.base.as_deref().is_some_and(|base| base.classifier.is_some());
			if !has_classifier {
				return Err(WireError::NoClassifier {
					type_name: self.name.to_string(),
				});
			}
		}

		let mut entries = Vec::new();
		let mut flat: Vec<FlatField> = Vec::new();
		let mut names: HashMap<Box<str>, usize> = HashMap::new();
		let mut dump_rules: Vec<DumpRule> = self
			.base
			.as_deref()
			.map(|base| base.dump_rules.clone())
			.unwrap_or_default();

		let insert_name = |names: &mut HashMap<Box<str>, usize>, name: &str, index: usize| -> Result<()> {
			if names.contains_key(name) || self.base.as_deref().is_some_and(|base| base.resolve(name).is_some()) {
				return Err(WireError::DuplicateField {
					type_name: self.name.to_string(),
					field: name.to_owned(),
				});
			}
			names.insert(name.into(), index);
			Ok(())
		};

		for member in &self.members {
			match member {
				Member::Named(ty, name) => {
					if matches!(ty, TypeRef::Optional(_) | TypeRef::DArray(_)) {
						panic!("{} carries its own field name and must be an anonymous member", ty.type_name());
					}
					insert_name(&mut names, name, flat.len())?;
					if rule_worthy(ty) {
						upsert_rule(&mut dump_rules, vec![name.clone()], ty.clone());
					}
					entries.push(Entry::Field { flat: flat.len() });
					flat.push(FlatField {
						name: Some(name.clone()),
						ty: ty.clone(),
					});
				}
				Member::Anon(ty) => match ty {
					TypeRef::Struct(embedded) => {
						if embedded.base.is_some() {
							panic!("embedded struct {} cannot have a base type", embedded.name);
						}
						let flat_start = flat.len();
						for field in &embedded.flat {
							if let Some(name) = &field.name {
								insert_name(&mut names, name, flat.len())?;
							}
							flat.push(field.clone());
						}
						for (path, rule_ty) in &embedded.dump_rules {
							upsert_rule(&mut dump_rules, path.clone(), rule_ty.clone());
						}
						let extra_slot = if embedded.size_fn.is_some() && embedded.trailer.is_none() {
							flat.push(FlatField { name: None, ty: RAW });
							Some(flat.len() - 1)
						} else {
							None
						};
						entries.push(Entry::Embedded {
							ty: Arc::clone(embedded),
							flat_start,
							extra_slot,
						});
					}
					TypeRef::Optional(def) => {
						insert_name(&mut names, &def.name, flat.len())?;
						if rule_worthy(&def.inner) {
							upsert_rule(&mut dump_rules, vec![def.name.clone()], ty.clone());
						}
						entries.push(Entry::Field { flat: flat.len() });
						flat.push(FlatField {
							name: Some(def.name.clone()),
							ty: ty.clone(),
						});
					}
					TypeRef::DArray(def) => {
						insert_name(&mut names, &def.name, flat.len())?;
						if rule_worthy(&def.elem) {
							upsert_rule(&mut dump_rules, vec![def.name.clone()], ty.clone());
						}
						entries.push(Entry::Field { flat: flat.len() });
						flat.push(FlatField {
							name: Some(def.name.clone()),
							ty: ty.clone(),
						});
					}
					other => {
						let Some(width) = other.fixed_size() else {
							panic!("anonymous {} cannot act as padding", other.type_name());
						};
						entries.push(Entry::Pad { width });
					}
				},
			}
		}

		let trailer = entries.iter().enumerate().next_back().and_then(|(index, entry)| {
			let variable = match entry {
				Entry::Field { flat: slot } => flat[*slot].ty.is_open_ended(),
				Entry::Embedded { ty, .. } => ty.open_ended,
				Entry::Pad { .. } => false,
			};
			variable.then_some(index)
		});

		let padding = match self.base.as_deref() {
			Some(base) => base.padding,
			None => self.padding,
		};

		let fixed_size = if self.size_fn.is_none() && self.base.is_none() && trailer.is_none() {
			let mut total = 0_usize;
			let mut fixed = true;
			for entry in &entries {
				let width = match entry {
					Entry::Field { flat: slot } => flat[*slot].ty.fixed_size(),
					Entry::Pad { width } => Some(*width),
					Entry::Embedded { ty, .. } => ty.fixed_size,
				};
				match width {
					Some(width) => total += width,
					None => {
						fixed = false;
						break;
					}
				}
			}
			fixed.then(|| round_up(total, padding))
		} else {
			None
		};

		for (path, ty) in &self.extend {
			let segments: Vec<Box<str>> = path.split('.').map(Into::into).collect();
			let head = segments.first().map(|s| s.as_ref()).unwrap_or_default();
			let known = names.contains_key(head) || self.base.as_deref().is_some_and(|base| base.resolve(head).is_some());
			if !known {
				return Err(WireError::UnknownField {
					type_name: self.name.to_string(),
					field: path.to_string(),
				});
			}
			if rule_worthy(ty) {
				upsert_rule(&mut dump_rules, segments, ty.clone());
			}
		}

		let base_flat_len = self
			.base
			.as_deref()
			.map(|base| base.flat_len_total())
			.unwrap_or(0);

		let open_ended = self.size_fn.is_none() && self.base.is_none() && trailer.is_some();

		let frozen = Arc::new(StructType {
			name: self.name,
			entries,
			flat,
			names,
			padding,
			size_fn: self.size_fn,
			prepack_fn: self.prepack_fn,
			init_fn: self.init_fn,
			classifier: self.classifier,
			strict: self.strict,
			base: self.base,
			criteria: self.criteria,
			derived: RwLock::new(DerivedTable::default()),
			dump_rules,
			formatter: self.formatter,
			base_flat_len,
			fixed_size,
			open_ended,
			trailer,
		});

		if let Some(base) = &frozen.base {
			let mut table = base.derived.write().unwrap_or_else(PoisonError::into_inner);
			let index = table.list.len();
			table.list.push(Arc::clone(&frozen));
			for key in &self.classify_by {
				table.keys.entry(*key).or_insert(index);
			}
		}

		Ok(TypeRef::Struct(frozen))
	}
}

/// Whether a type contributes a dump-formatting rule for its field.
fn rule_worthy(ty: &TypeRef) -> bool {
	match ty {
		TypeRef::Enum(_) | TypeRef::Formatted(_) => true,
		TypeRef::Array(array) => rule_worthy(&array.elem),
		TypeRef::Optional(def) => rule_worthy(&def.inner),
		TypeRef::DArray(def) => rule_worthy(&def.elem),
		_ => false,
	}
}

fn upsert_rule(rules: &mut Vec<DumpRule>, path: Vec<Box<str>>, ty: TypeRef) {
	if let Some(existing) = rules.iter_mut().find(|(p, _)| *p == path) {
		existing.1 = ty;
	} else {
		rules.push((path, ty));
	}
}

pub(crate) fn round_up(size: usize, padding: usize) -> usize {
	size.div_ceil(padding) * padding
}
