use std::any::Any;
use std::hash::Hash;

use indexmap::IndexMap;

use super::parametric_name;
use crate::catalog::Catalog;
use crate::error::StateError;
use crate::io_type::{IoType, StateSchema, StateValue, TypeSignature};

fn is_pair_list(state: &StateValue) -> bool {
	state
		.as_array()
		.is_some_and(|pairs| pairs.iter().all(|pair| pair.as_array().is_some_and(|p| p.len() == 2)))
}

impl Catalog {
	/// `MapIO<K, V>`: an [`IndexMap<K, V>`] serialized as an ordered array of
	/// `[key_state, value_state]` pairs.
	///
	/// State validity only checks the outer pair shape; keys and values are
	/// checked when deserialized.
	pub fn map_io<K, V>(&self, key_type: &IoType, value_type: &IoType) -> IoType
	where
		K: Any + Eq + Hash,
		V: Any,
	{
		self.parametric_type(TypeSignature::new("MapIO", [key_type, value_type]), || {
			let name = parametric_name("MapIO", &[key_type, value_type]);
			let (keys, values) = (key_type.clone(), value_type.clone());
			let (state_keys, state_values) = (key_type.clone(), value_type.clone());
			let type_name = name.clone();

			IoType::builder(name)
				.documentation(format!("A map from {key_type} to {value_type}"))
				.parameter_types(&[key_type.clone(), value_type.clone()])
				.value_type::<IndexMap<K, V>>()
				.state_schema(StateSchema::value("Array<[key, value]>", is_pair_list))
				.to_state::<IndexMap<K, V>>(move |map| {
					let pairs = map
						.iter()
						.map(|(k, v)| {
							Ok(StateValue::Array(vec![
								keys.to_state(k)?,
								values.to_state(v)?,
							]))
						})
						.collect::<Result<Vec<_>, StateError>>()?;
					Ok(StateValue::Array(pairs))
				})
				.from_state::<IndexMap<K, V>>(move |state| {
					let mut map = IndexMap::new();
					for pair in state.as_array().into_iter().flatten() {
						let (Some(k), Some(v)) = (pair.get(0), pair.get(1)) else {
							return Err(StateError::InvalidState {
								type_name: type_name.clone(),
								reason: format!("expected [key, value], got {pair}"),
							});
						};
						let key = state_keys
							.from_state(k)?
							.downcast::<K>()
							.map_err(|_| StateError::mismatch::<K>())?;
						let value = state_values
							.from_state(v)?
							.downcast::<V>()
							.map_err(|_| StateError::mismatch::<V>())?;
						map.insert(*key, *value);
					}
					Ok(map)
				})
		})
	}
}
