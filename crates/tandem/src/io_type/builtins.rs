//! Types every catalog defines up front.

use super::{IoType, IoTypeBuilder, StateSchema, StateValue};
use crate::catalog::TypeTable;
use crate::error::StateError;

pub(crate) struct Builtins {
	pub(crate) object: IoType,
	pub(crate) number: IoType,
	pub(crate) string: IoType,
	pub(crate) boolean: IoType,
}

fn define(types: &mut TypeTable, builder: IoTypeBuilder) -> IoType {
	match types.define(builder) {
		Ok(io_type) => io_type,
		Err(e) => unreachable!("builtin type rejected by empty table: {e}"),
	}
}

impl Builtins {
	/// Defines the builtins into a fresh table. `ObjectIO` goes first and
	/// becomes the hierarchy root.
	pub(crate) fn install(types: &mut TypeTable) -> Self {
		let object = define(
			types,
			IoType::builder("ObjectIO").documentation("The root of the type hierarchy"),
		);

		let number = define(
			types,
			IoType::builder("NumberIO")
				.documentation("A finite floating point number; infinities use InfiniteNumberIO")
				.value_type::<f64>()
				.state_schema(StateSchema::value("number", StateValue::is_number))
				.to_state(|n: &f64| {
					serde_json::Number::from_f64(*n)
						.map(StateValue::Number)
						.ok_or_else(|| StateError::InvalidValue {
							type_name: "NumberIO".to_string(),
							reason: format!("{n} has no state representation"),
						})
				})
				.from_state(|s| {
					s.as_f64().ok_or_else(|| StateError::InvalidState {
						type_name: "NumberIO".to_string(),
						reason: format!("expected number, got {s}"),
					})
				}),
		);

		let string = define(
			types,
			IoType::builder("StringIO")
				.documentation("A UTF-8 string")
				.value_type::<String>()
				.state_schema(StateSchema::value("string", StateValue::is_string))
				.to_state(|s: &String| Ok(StateValue::String(s.clone())))
				.from_state(|s| {
					s.as_str().map(str::to_string).ok_or_else(|| StateError::InvalidState {
						type_name: "StringIO".to_string(),
						reason: format!("expected string, got {s}"),
					})
				}),
		);

		let boolean = define(
			types,
			IoType::builder("BooleanIO")
				.documentation("true or false")
				.value_type::<bool>()
				.state_schema(StateSchema::value("boolean", StateValue::is_boolean))
				.to_state(|b: &bool| Ok(StateValue::Bool(*b)))
				.from_state(|s| {
					s.as_bool().ok_or_else(|| StateError::InvalidState {
						type_name: "BooleanIO".to_string(),
						reason: format!("expected boolean, got {s}"),
					})
				}),
		);

		Self {
			object,
			number,
			string,
			boolean,
		}
	}
}
