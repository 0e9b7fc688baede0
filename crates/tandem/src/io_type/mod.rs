//! Serialization contracts.
//!
//! An [`IoType`] names a kind of runtime value and describes how it maps to a
//! state object ([`StateValue`]): a validator over live values, an optional
//! [`StateSchema`], and serialize / deserialize / apply-in-place functions.
//! Types form a single-inheritance hierarchy rooted at `ObjectIO`.

pub(crate) mod builtins;
mod schema;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

pub use schema::{Field, FieldAccess, StateSchema, Validity};

use crate::dynamic::ElementContainer;
use crate::error::StateError;
use crate::instrument::ObjectRef;


/// A serialized state object.
pub type StateValue = serde_json::Value;

/// Predicate over live values.
pub type ValueValidator = Rc<dyn Fn(&dyn Any) -> bool>;
/// Live value to state object.
pub type ToStateFn = Rc<dyn Fn(&dyn Any) -> Result<StateValue, StateError>>;
/// State object to a freshly built live value.
pub type FromStateFn = Rc<dyn Fn(&StateValue) -> Result<Box<dyn Any>, StateError>>;
/// State object applied onto an existing live value.
pub type ApplyStateFn = Rc<dyn Fn(&dyn Any, &StateValue) -> Result<(), StateError>>;
/// Creates a container element for a saved component name.
pub type AddChildElementFn =
	Rc<dyn Fn(&dyn ElementContainer, &str, &StateValue) -> Result<ObjectRef, StateError>>;

/// Catalog-unique numeric identifier of a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(pub(crate) u32);

/// Canonical cache key for a parametric type: the combinator plus the ordered
/// keys of its parameter types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeSignature {
	combinator: &'static str,
	parameters: SmallVec<[TypeKey; 2]>,
}

impl TypeSignature {
	pub fn new<'a>(
		combinator: &'static str,
		parameters: impl IntoIterator<Item = &'a IoType>,
	) -> Self {
		Self {
			combinator,
			parameters: parameters.into_iter().map(IoType::key).collect(),
		}
	}
}

/// How a composite parent should restore a field of this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateMode {
	/// Build a new value with the deserializer and assign it.
	Deserialize,
	/// Apply the state onto the existing value.
	ApplyInPlace,
	/// The type carries no restorable state.
	Stateless,
}

struct IoTypeDef {
	key: TypeKey,
	type_name: String,
	documentation: String,
	supertype: Option<IoType>,
	validator: Option<ValueValidator>,
	parameter_types: Vec<IoType>,
	state_schema: Option<StateSchema>,
	to_state: Option<ToStateFn>,
	from_state: Option<FromStateFn>,
	apply_state: Option<ApplyStateFn>,
	add_child_element: Option<AddChildElementFn>,
}

/// Shared handle to a type definition. Equality is identity.
#[derive(Clone)]
pub struct IoType(Rc<IoTypeDef>);

impl PartialEq for IoType {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for IoType {}

impl fmt::Debug for IoType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("IoType").field(&self.0.type_name).finish()
	}
}

impl fmt::Display for IoType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.type_name)
	}
}

impl IoType {
	/// Starts a type definition; finish it with [`Catalog::define_type`](crate::Catalog::define_type).
	pub fn builder(type_name: impl Into<String>) -> IoTypeBuilder {
		IoTypeBuilder::new(type_name)
	}

	pub fn key(&self) -> TypeKey {
		self.0.key
	}

	pub fn type_name(&self) -> &str {
		&self.0.type_name
	}

	pub fn documentation(&self) -> &str {
		&self.0.documentation
	}

	pub fn supertype(&self) -> Option<&IoType> {
		self.0.supertype.as_ref()
	}

	pub fn parameter_types(&self) -> &[IoType] {
		&self.0.parameter_types
	}

	pub fn state_schema(&self) -> Option<&StateSchema> {
		self.0.state_schema.as_ref()
	}

	/// This type followed by each supertype up to the root.
	pub fn ancestry(&self) -> impl Iterator<Item = &IoType> {
		std::iter::successors(Some(self), |t| t.supertype())
	}

	/// Reflexive: a type is a subtype of itself.
	pub fn is_subtype_of(&self, other: &IoType) -> bool {
		self.ancestry().any(|t| t == other)
	}

	/// Checks the value against this type's validator and every supertype's.
	pub fn is_valid_value(&self, value: &dyn Any) -> bool {
		self.ancestry()
			.all(|t| t.0.validator.as_ref().is_none_or(|v| v(value)))
	}

	pub fn validate_value(&self, value: &dyn Any) -> Result<(), StateError> {
		if self.is_valid_value(value) {
			Ok(())
		} else {
			Err(StateError::InvalidValue {
				type_name: self.0.type_name.clone(),
				reason: "rejected by validator".to_string(),
			})
		}
	}

	fn has_composite_schema(&self) -> bool {
		self.ancestry()
			.any(|t| t.state_schema().is_some_and(StateSchema::is_composite))
	}

	pub fn state_mode(&self) -> StateMode {
		if self.0.from_state.is_some() {
			StateMode::Deserialize
		} else if self.0.apply_state.is_some() || self.has_composite_schema() {
			StateMode::ApplyInPlace
		} else {
			StateMode::Stateless
		}
	}

	/// Serializes a live value.
	///
	/// Uses this type's serializer, else the composite default when the
	/// hierarchy declares fields, else the nearest supertype's serializer.
	pub fn to_state(&self, value: &dyn Any) -> Result<StateValue, StateError> {
		self.validate_value(value)?;
		if let Some(to_state) = &self.0.to_state {
			return to_state(value);
		}
		if self.has_composite_schema() {
			return self.default_to_state(value);
		}
		match self.ancestry().skip(1).find_map(|t| t.0.to_state.clone()) {
			Some(to_state) => to_state(value),
			None => Err(StateError::NotSerializable {
				type_name: self.0.type_name.clone(),
			}),
		}
	}

	/// Builds a new live value from a state object.
	pub fn from_state(&self, state: &StateValue) -> Result<Box<dyn Any>, StateError> {
		let Some(from_state) = &self.0.from_state else {
			return Err(StateError::NotDeserializable {
				type_name: self.0.type_name.clone(),
			});
		};
		self.validate_state(state)?;
		from_state(state)
	}

	/// Applies a state object onto an existing live value.
	pub fn apply_state(&self, value: &dyn Any, state: &StateValue) -> Result<(), StateError> {
		if let Some(apply_state) = &self.0.apply_state {
			return apply_state(value, state);
		}
		if self.has_composite_schema() {
			return self.default_apply_state(value, state);
		}
		Err(StateError::InPlaceUnsupported {
			type_name: self.0.type_name.clone(),
		})
	}

	/// Composite levels from the root down to this type.
	fn composite_levels(&self) -> Vec<&StateSchema> {
		let mut levels: Vec<_> = self
			.ancestry()
			.filter_map(IoType::state_schema)
			.filter(|s| s.is_composite())
			.collect();
		levels.reverse();
		levels
	}

	/// Serializes every declared field through its own type.
	pub fn default_to_state(&self, value: &dyn Any) -> Result<StateValue, StateError> {
		let mut state = serde_json::Map::new();
		for schema in self.composite_levels() {
			for field in schema.fields() {
				state.insert(field.name().to_string(), field.read_state(value)?);
			}
		}
		Ok(StateValue::Object(state))
	}

	/// Restores every declared field, by deserialize-and-assign or in place
	/// according to the field's access variant.
	pub fn default_apply_state(&self, value: &dyn Any, state: &StateValue) -> Result<(), StateError> {
		let Some(object) = state.as_object() else {
			return Err(StateError::InvalidState {
				type_name: self.0.type_name.clone(),
				reason: "expected an object".to_string(),
			});
		};
		for schema in self.composite_levels() {
			for field in schema.fields() {
				let Some(sub_state) = object.get(field.name()) else {
					return Err(StateError::MissingKey {
						type_name: self.0.type_name.clone(),
						key: field.name().to_string(),
					});
				};
				field.write_state(value, sub_state)?;
			}
		}
		Ok(())
	}

	/// Validates a state object against the schema chain.
	///
	/// Composite levels claim their keys and defer to the supertype; the
	/// first value schema decides. Keys no level claimed are rejected.
	pub fn validate_state(&self, state: &StateValue) -> Result<(), StateError> {
		let mut claimed = FxHashSet::default();
		let mut saw_composite = false;
		for level in self.ancestry() {
			let Some(schema) = level.state_schema() else {
				continue;
			};
			match schema.evaluate(level.type_name(), state, &mut claimed)? {
				Validity::Valid => return Ok(()),
				Validity::Indeterminate => saw_composite = true,
				Validity::Invalid => {
					return Err(StateError::InvalidState {
						type_name: level.type_name().to_string(),
						reason: "schema check failed".to_string(),
					});
				}
			}
		}
		if saw_composite
			&& let Some(object) = state.as_object()
			&& let Some(extra) = object.keys().find(|k| !claimed.contains(k.as_str()))
		{
			return Err(StateError::InvalidState {
				type_name: self.0.type_name.clone(),
				reason: format!("unexpected key {extra:?}"),
			});
		}
		Ok(())
	}

	/// Boolean form of [`validate_state`](Self::validate_state).
	///
	/// With `assert_on_fail`, an invalid state also trips a debug assertion
	/// carrying the reason. Types do not know their catalog, so the caller
	/// passes its validation switch here;
	/// [`Catalog::is_state_valid`](crate::Catalog::is_state_valid) does that.
	pub fn is_state_valid(&self, state: &StateValue, assert_on_fail: bool) -> bool {
		match self.validate_state(state) {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!(type_name = %self.0.type_name, error = %e, "invalid state");
				debug_assert!(!assert_on_fail, "{e}");
				false
			}
		}
	}

	/// Creates an element of a dynamic container from saved state, using the
	/// nearest `add_child_element` hook in the hierarchy.
	pub fn add_child_element(
		&self,
		container: &dyn ElementContainer,
		component_name: &str,
		state: &StateValue,
	) -> Result<ObjectRef, StateError> {
		match self
			.ancestry()
			.find_map(|t| t.0.add_child_element.clone())
		{
			Some(hook) => hook(container, component_name, state),
			None => Err(StateError::NoStateConstructor {
				container: container.container_tandem().phetio_id().to_string(),
			}),
		}
	}
}

/// Collects the parts of a type definition.
pub struct IoTypeBuilder {
	type_name: String,
	documentation: String,
	supertype: Option<IoType>,
	validator: Option<ValueValidator>,
	parameter_types: Vec<IoType>,
	state_schema: Option<StateSchema>,
	to_state: Option<ToStateFn>,
	from_state: Option<FromStateFn>,
	apply_state: Option<ApplyStateFn>,
	add_child_element: Option<AddChildElementFn>,
}

impl fmt::Debug for IoTypeBuilder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IoTypeBuilder")
			.field("type_name", &self.type_name)
			.field("supertype", &self.supertype)
			.finish_non_exhaustive()
	}
}

impl IoTypeBuilder {
	fn new(type_name: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			documentation: String::new(),
			supertype: None,
			validator: None,
			parameter_types: Vec::new(),
			state_schema: None,
			to_state: None,
			from_state: None,
			apply_state: None,
			add_child_element: None,
		}
	}

	pub(crate) fn name(&self) -> &str {
		&self.type_name
	}

	pub(crate) fn default_supertype(&mut self, root: &IoType) {
		if self.supertype.is_none() {
			self.supertype = Some(root.clone());
		}
	}

	pub(crate) fn build(self, key: TypeKey) -> IoType {
		IoType(Rc::new(IoTypeDef {
			key,
			type_name: self.type_name,
			documentation: self.documentation,
			supertype: self.supertype,
			validator: self.validator,
			parameter_types: self.parameter_types,
			state_schema: self.state_schema,
			to_state: self.to_state,
			from_state: self.from_state,
			apply_state: self.apply_state,
			add_child_element: self.add_child_element,
		}))
	}

	pub fn documentation(mut self, docs: impl Into<String>) -> Self {
		self.documentation = docs.into();
		self
	}

	pub fn supertype(mut self, supertype: &IoType) -> Self {
		self.supertype = Some(supertype.clone());
		self
	}

	/// Accepts exactly values of Rust type `T`.
	pub fn value_type<T: Any>(self) -> Self {
		self.validator(|v| v.is::<T>())
	}

	/// Accepts values of type `T` that also satisfy `predicate`.
	pub fn value_predicate<T: Any>(self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
		self.validator(move |v| v.downcast_ref::<T>().is_some_and(&predicate))
	}

	pub fn validator(mut self, validator: impl Fn(&dyn Any) -> bool + 'static) -> Self {
		self.validator = Some(Rc::new(validator));
		self
	}

	pub fn parameter_types(mut self, parameters: &[IoType]) -> Self {
		self.parameter_types = parameters.to_vec();
		self
	}

	pub fn state_schema(mut self, schema: StateSchema) -> Self {
		self.state_schema = Some(schema);
		self
	}

	/// Typed serializer for values of type `T`.
	pub fn to_state<T: Any>(
		self,
		to_state: impl Fn(&T) -> Result<StateValue, StateError> + 'static,
	) -> Self {
		self.to_state_erased(move |v| {
			let value = v.downcast_ref::<T>().ok_or_else(StateError::mismatch::<T>)?;
			to_state(value)
		})
	}

	pub fn to_state_erased(
		mut self,
		to_state: impl Fn(&dyn Any) -> Result<StateValue, StateError> + 'static,
	) -> Self {
		self.to_state = Some(Rc::new(to_state));
		self
	}

	/// Typed deserializer producing values of type `T`.
	pub fn from_state<T: Any>(
		self,
		from_state: impl Fn(&StateValue) -> Result<T, StateError> + 'static,
	) -> Self {
		self.from_state_erased(move |s| Ok(Box::new(from_state(s)?) as Box<dyn Any>))
	}

	pub fn from_state_erased(
		mut self,
		from_state: impl Fn(&StateValue) -> Result<Box<dyn Any>, StateError> + 'static,
	) -> Self {
		self.from_state = Some(Rc::new(from_state));
		self
	}

	/// Typed in-place applier for values of type `T`.
	pub fn apply_state<T: Any>(
		self,
		apply_state: impl Fn(&T, &StateValue) -> Result<(), StateError> + 'static,
	) -> Self {
		self.apply_state_erased(move |v, s| {
			let value = v.downcast_ref::<T>().ok_or_else(StateError::mismatch::<T>)?;
			apply_state(value, s)
		})
	}

	pub fn apply_state_erased(
		mut self,
		apply_state: impl Fn(&dyn Any, &StateValue) -> Result<(), StateError> + 'static,
	) -> Self {
		self.apply_state = Some(Rc::new(apply_state));
		self
	}

	pub fn add_child_element(
		mut self,
		hook: impl Fn(&dyn ElementContainer, &str, &StateValue) -> Result<ObjectRef, StateError>
		+ 'static,
	) -> Self {
		self.add_child_element = Some(Rc::new(hook));
		self
	}
}
