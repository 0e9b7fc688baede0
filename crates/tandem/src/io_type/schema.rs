use std::any::Any;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use super::{IoType, StateMode, StateValue};
use crate::error::StateError;

/// Result of checking one level of a schema chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
	Valid,
	Invalid,
	/// The level passed but the supertype still has to be consulted.
	Indeterminate,
}

type ReadFn = Rc<dyn Fn(&dyn Any) -> Result<Box<dyn Any>, StateError>>;
type WriteFn = Rc<dyn Fn(&dyn Any, Box<dyn Any>) -> Result<(), StateError>>;
type GetFn = Rc<dyn Fn(&dyn Any) -> Result<Rc<dyn Any>, StateError>>;

/// How a composite field is read and restored.
#[derive(Clone)]
pub enum FieldAccess {
	/// Read a copy, restore by deserializing a new value and writing it back.
	Assign { read: ReadFn, write: WriteFn },
	/// Borrow the existing value and restore it in place.
	InPlace { get: GetFn },
	/// Schema-only: the owning type serializes this field itself.
	Declared,
}

impl fmt::Debug for FieldAccess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			FieldAccess::Assign { .. } => "Assign",
			FieldAccess::InPlace { .. } => "InPlace",
			FieldAccess::Declared => "Declared",
		})
	}
}

/// One named entry of a composite schema.
#[derive(Clone, Debug)]
pub struct Field {
	name: String,
	io_type: IoType,
	access: FieldAccess,
}

impl Field {
	/// A field restored by deserialize-and-assign.
	pub fn value<O: Any, V: Any>(
		name: impl Into<String>,
		io_type: &IoType,
		read: impl Fn(&O) -> V + 'static,
		write: impl Fn(&O, V) + 'static,
	) -> Self {
		let read: ReadFn = Rc::new(move |object| {
			let object = object.downcast_ref::<O>().ok_or_else(StateError::mismatch::<O>)?;
			Ok(Box::new(read(object)))
		});
		let write: WriteFn = Rc::new(move |object, value| {
			let object = object.downcast_ref::<O>().ok_or_else(StateError::mismatch::<O>)?;
			let value = value.downcast::<V>().map_err(|_| StateError::mismatch::<V>())?;
			write(object, *value);
			Ok(())
		});
		Self {
			name: name.into(),
			io_type: io_type.clone(),
			access: FieldAccess::Assign { read, write },
		}
	}

	/// A field restored in place on the value `get` returns.
	pub fn nested<O: Any, V: Any>(
		name: impl Into<String>,
		io_type: &IoType,
		get: impl Fn(&O) -> Rc<V> + 'static,
	) -> Self {
		let get: GetFn = Rc::new(move |object| {
			let object = object.downcast_ref::<O>().ok_or_else(StateError::mismatch::<O>)?;
			Ok(get(object) as Rc<dyn Any>)
		});
		Self {
			name: name.into(),
			io_type: io_type.clone(),
			access: FieldAccess::InPlace { get },
		}
	}

	/// A schema-only field for types with their own serializers.
	pub fn declared(name: impl Into<String>, io_type: &IoType) -> Self {
		Self {
			name: name.into(),
			io_type: io_type.clone(),
			access: FieldAccess::Declared,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn io_type(&self) -> &IoType {
		&self.io_type
	}

	pub fn access(&self) -> &FieldAccess {
		&self.access
	}

	pub(super) fn read_state(&self, object: &dyn Any) -> Result<StateValue, StateError> {
		match &self.access {
			FieldAccess::Assign { read, .. } => self.io_type.to_state(&*read(object)?),
			FieldAccess::InPlace { get } => self.io_type.to_state(&*get(object)?),
			FieldAccess::Declared => Err(StateError::NotSerializable {
				type_name: format!("{}.{}", self.io_type.type_name(), self.name),
			}),
		}
	}

	pub(super) fn write_state(&self, object: &dyn Any, state: &StateValue) -> Result<(), StateError> {
		match &self.access {
			FieldAccess::Assign { write, .. } => write(object, self.io_type.from_state(state)?),
			FieldAccess::InPlace { get } => self.io_type.apply_state(&*get(object)?, state),
			FieldAccess::Declared => Err(StateError::NotDeserializable {
				type_name: format!("{}.{}", self.io_type.type_name(), self.name),
			}),
		}
	}
}

#[derive(Clone)]
enum SchemaKind {
	Value {
		display: String,
		validator: Rc<dyn Fn(&StateValue) -> bool>,
	},
	Composite {
		fields: Vec<Field>,
		api_state_keys: Option<Vec<String>>,
	},
}

/// Declarative shape of a type's state object.
#[derive(Clone)]
pub struct StateSchema(SchemaKind);

impl fmt::Debug for StateSchema {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.0 {
			SchemaKind::Value { display, .. } => f.debug_tuple("Value").field(display).finish(),
			SchemaKind::Composite { fields, .. } => f
				.debug_map()
				.entries(fields.iter().map(|fd| (&fd.name, fd.io_type.type_name())))
				.finish(),
		}
	}
}

impl StateSchema {
	/// A single validated value; `display` describes it in API output.
	pub fn value(
		display: impl Into<String>,
		validator: impl Fn(&StateValue) -> bool + 'static,
	) -> Self {
		StateSchema(SchemaKind::Value {
			display: display.into(),
			validator: Rc::new(validator),
		})
	}

	/// A field-keyed object.
	///
	/// # Panics
	///
	/// Panics on duplicate field names, or when a field's access variant does
	/// not match how its type restores state.
	pub fn composite(fields: Vec<Field>) -> Self {
		Self::build_composite(fields, None)
	}

	/// A composite whose `api_state_keys` are tracked in API descriptions.
	///
	/// # Panics
	///
	/// As [`composite`](Self::composite), and when a tracked key is not a field.
	pub fn composite_with_api_keys(fields: Vec<Field>, api_state_keys: &[&str]) -> Self {
		for key in api_state_keys {
			assert!(
				fields.iter().any(|f| f.name == *key),
				"API state key {key:?} is not a schema field"
			);
		}
		Self::build_composite(
			fields,
			Some(api_state_keys.iter().map(|k| k.to_string()).collect()),
		)
	}

	fn build_composite(fields: Vec<Field>, api_state_keys: Option<Vec<String>>) -> Self {
		let mut seen = FxHashSet::default();
		for field in &fields {
			assert!(seen.insert(field.name.as_str()), "duplicate schema field {:?}", field.name);
			let mode = field.io_type.state_mode();
			let consistent = match field.access {
				FieldAccess::Assign { .. } => mode == StateMode::Deserialize,
				FieldAccess::InPlace { .. } => mode == StateMode::ApplyInPlace,
				FieldAccess::Declared => true,
			};
			assert!(
				consistent,
				"field {:?} uses {:?} access but {} restores via {:?}",
				field.name,
				field.access,
				field.io_type.type_name(),
				mode
			);
		}
		StateSchema(SchemaKind::Composite {
			fields,
			api_state_keys,
		})
	}

	pub fn is_composite(&self) -> bool {
		matches!(self.0, SchemaKind::Composite { .. })
	}

	/// Composite fields; empty for value schemas.
	pub fn fields(&self) -> &[Field] {
		match &self.0 {
			SchemaKind::Composite { fields, .. } => fields,
			SchemaKind::Value { .. } => &[],
		}
	}

	pub fn api_state_keys(&self) -> Option<&[String]> {
		match &self.0 {
			SchemaKind::Composite { api_state_keys, .. } => api_state_keys.as_deref(),
			SchemaKind::Value { .. } => None,
		}
	}

	/// Display string of a value schema.
	pub fn display(&self) -> Option<&str> {
		match &self.0 {
			SchemaKind::Value { display, .. } => Some(display),
			SchemaKind::Composite { .. } => None,
		}
	}

	/// Checks one level of a state object.
	///
	/// Value schemas answer `Valid` or `Invalid`. Composite schemas add their
	/// keys to `out_keys` and answer `Indeterminate` when every field is
	/// present and valid, leaving the rest to the supertype chain.
	/// `assert_on_fail` is the caller's validation switch, as for
	/// [`IoType::is_state_valid`].
	pub fn check_valid(
		&self,
		state: &StateValue,
		assert_on_fail: bool,
		out_keys: &mut FxHashSet<String>,
	) -> Validity {
		let label = self.display().unwrap_or("composite");
		match self.evaluate(label, state, out_keys) {
			Ok(validity) => validity,
			Err(e) => {
				tracing::warn!(error = %e, "state failed schema check");
				debug_assert!(!assert_on_fail, "{e}");
				Validity::Invalid
			}
		}
	}

	pub(super) fn evaluate(
		&self,
		owner: &str,
		state: &StateValue,
		out_keys: &mut FxHashSet<String>,
	) -> Result<Validity, StateError> {
		match &self.0 {
			SchemaKind::Value { display, validator } => {
				if validator(state) {
					Ok(Validity::Valid)
				} else {
					Err(StateError::InvalidState {
						type_name: owner.to_string(),
						reason: format!("expected {display}, got {state}"),
					})
				}
			}
			SchemaKind::Composite { fields, .. } => {
				let Some(object) = state.as_object() else {
					return Err(StateError::InvalidState {
						type_name: owner.to_string(),
						reason: format!("expected an object, got {state}"),
					});
				};
				for field in fields {
					let Some(sub_state) = object.get(&field.name) else {
						return Err(StateError::MissingKey {
							type_name: owner.to_string(),
							key: field.name.clone(),
						});
					};
					field.io_type.validate_state(sub_state)?;
					out_keys.insert(field.name.clone());
				}
				Ok(Validity::Indeterminate)
			}
		}
	}
}
