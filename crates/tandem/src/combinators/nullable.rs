use std::any::Any;

use super::parametric_name;
use crate::catalog::Catalog;
use crate::error::StateError;
use crate::io_type::{IoType, StateSchema, StateValue, TypeSignature};

impl Catalog {
	/// `NullableIO<T>`: an `Option<T>`; `None` serializes as `null`.
	pub fn nullable_io<T: Any>(&self, inner_type: &IoType) -> IoType {
		self.parametric_type(TypeSignature::new("NullableIO", [inner_type]), || {
			let name = parametric_name("NullableIO", &[inner_type]);
			let for_validator = inner_type.clone();
			let for_schema = inner_type.clone();
			let for_to_state = inner_type.clone();
			let for_from_state = inner_type.clone();

			IoType::builder(name)
				.documentation(format!("{inner_type} or null"))
				.parameter_types(std::slice::from_ref(inner_type))
				.value_predicate::<Option<T>>(move |value| {
					value.as_ref().is_none_or(|inner| for_validator.is_valid_value(inner))
				})
				.state_schema(StateSchema::value(
					format!("{inner_type} | null"),
					move |state| state.is_null() || for_schema.validate_state(state).is_ok(),
				))
				.to_state::<Option<T>>(move |value| match value {
					Some(inner) => for_to_state.to_state(inner),
					None => Ok(StateValue::Null),
				})
				.from_state::<Option<T>>(move |state| {
					if state.is_null() {
						return Ok(None);
					}
					for_from_state
						.from_state(state)?
						.downcast::<T>()
						.map(|inner| Some(*inner))
						.map_err(|_| StateError::mismatch::<T>())
				})
		})
	}
}
