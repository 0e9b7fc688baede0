use std::any::Any;

use super::parametric_name;
use crate::catalog::Catalog;
use crate::error::StateError;
use crate::io_type::{IoType, StateSchema, StateValue, TypeSignature};

impl Catalog {
	/// `ArrayIO<T>`: a `Vec<T>` whose elements serialize through `element_type`.
	pub fn array_io<T: Any>(&self, element_type: &IoType) -> IoType {
		self.parametric_type(TypeSignature::new("ArrayIO", [element_type]), || {
			let name = parametric_name("ArrayIO", &[element_type]);
			let for_validator = element_type.clone();
			let for_schema = element_type.clone();
			let for_to_state = element_type.clone();
			let for_from_state = element_type.clone();

			IoType::builder(name)
				.documentation(format!("An array of {element_type}"))
				.parameter_types(std::slice::from_ref(element_type))
				.value_predicate::<Vec<T>>(move |items| {
					items.iter().all(|item| for_validator.is_valid_value(item))
				})
				.state_schema(StateSchema::value(
					format!("Array<{element_type}>"),
					move |state| {
						state.as_array().is_some_and(|items| {
							items.iter().all(|item| for_schema.validate_state(item).is_ok())
						})
					},
				))
				.to_state::<Vec<T>>(move |items| {
					items
						.iter()
						.map(|item| for_to_state.to_state(item))
						.collect::<Result<Vec<_>, _>>()
						.map(StateValue::Array)
				})
				.from_state::<Vec<T>>(move |state| {
					state
						.as_array()
						.into_iter()
						.flatten()
						.map(|item| {
							for_from_state
								.from_state(item)?
								.downcast::<T>()
								.map(|item| *item)
								.map_err(|_| StateError::mismatch::<T>())
						})
						.collect()
				})
		})
	}
}
