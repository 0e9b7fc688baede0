use serde_json::json;

use super::parametric_name;
use crate::catalog::Catalog;
use crate::error::StateError;
use crate::io_type::{IoType, StateSchema, StateValue, TypeSignature};

/// Splits a tagged union state into its position and inner state.
fn tagged(state: &StateValue) -> Option<(usize, &StateValue)> {
	let index = state.get("index")?.as_u64()?;
	let inner = state.get("state")?;
	let object = state.as_object()?;
	(object.len() == 2).then_some((usize::try_from(index).ok()?, inner))
}

impl Catalog {
	/// `OrIO<A, B, ...>`: a value accepted by any of `parameters`.
	///
	/// Serializes with the first parameter that accepts the value, as
	/// `{"index": <position>, "state": <inner state>}`, and deserializes with
	/// the parameter at that position.
	///
	/// # Panics
	///
	/// Panics if `parameters` is empty.
	pub fn or_io(&self, parameters: &[IoType]) -> IoType {
		assert!(!parameters.is_empty(), "OrIO needs at least one parameter");
		self.parametric_type(TypeSignature::new("OrIO", parameters), || {
			let refs: Vec<&IoType> = parameters.iter().collect();
			let name = parametric_name("OrIO", &refs);
			let for_validator = parameters.to_vec();
			let for_schema = parameters.to_vec();
			let for_to_state = parameters.to_vec();
			let for_from_state = parameters.to_vec();
			let serialize_name = name.clone();
			let deserialize_name = name.clone();

			IoType::builder(name)
				.documentation("A value of one of several types, tagged with the matching position")
				.parameter_types(parameters)
				.validator(move |value| for_validator.iter().any(|p| p.is_valid_value(value)))
				.state_schema(StateSchema::value("{ index: number, state: * }", move |state| {
					tagged(state).is_some_and(|(index, inner)| {
						for_schema
							.get(index)
							.is_some_and(|p| p.validate_state(inner).is_ok())
					})
				}))
				.to_state_erased(move |value| {
					let Some((index, parameter)) = for_to_state
						.iter()
						.enumerate()
						.find(|(_, p)| p.is_valid_value(value))
					else {
						return Err(StateError::InvalidValue {
							type_name: serialize_name.clone(),
							reason: "no parameter type accepts the value".to_string(),
						});
					};
					Ok(json!({ "index": index, "state": parameter.to_state(value)? }))
				})
				.from_state_erased(move |state| {
					let (parameter, inner) = tagged(state)
						.and_then(|(index, inner)| Some((for_from_state.get(index)?, inner)))
						.ok_or_else(|| StateError::InvalidState {
							type_name: deserialize_name.clone(),
							reason: format!("bad tag in {state}"),
						})?;
					parameter.from_state(inner)
				})
		})
	}
}
