use serde_json::json;

use super::parametric_name;
use crate::catalog::Catalog;
use crate::error::{StateError, TandemError};
use crate::instrument::ObjectRef;
use crate::io_type::{Field, IoType, StateSchema, StateValue, TypeSignature};

impl Catalog {
	/// `ReferenceIO<P>`: an [`ObjectRef`] whose type extends `P`, serialized
	/// as `{"id": <phetio id>}`.
	///
	/// Deserializing looks the id up among registered objects and fails with
	/// [`StateError::NotYetCreatable`] while it is absent. In-place
	/// application is unsupported.
	pub fn reference_io(&self, parameter: &IoType) -> IoType {
		self.parametric_type(TypeSignature::new("ReferenceIO", [parameter]), || {
			let name = parametric_name("ReferenceIO", &[parameter]);
			let catalog = self.downgrade();
			let accepted = parameter.clone();
			let target = parameter.clone();
			let type_name = name.clone();
			IoType::builder(name.clone())
				.documentation(format!(
					"Uses reference identity to serialize and deserialize {parameter}"
				))
				.parameter_types(std::slice::from_ref(parameter))
				.value_predicate::<ObjectRef>(move |object| object.io_type().is_subtype_of(&accepted))
				.state_schema(StateSchema::composite(vec![Field::declared(
					"id",
					&self.string_io(),
				)]))
				.to_state::<ObjectRef>(|object| Ok(json!({ "id": object.phetio_id() })))
				.from_state::<ObjectRef>(move |state| {
					let id = state
						.get("id")
						.and_then(StateValue::as_str)
						.ok_or_else(|| StateError::MissingKey {
							type_name: type_name.clone(),
							key: "id".to_string(),
						})?;
					let catalog = catalog
						.upgrade()
						.map(Catalog::from_state)
						.ok_or(TandemError::CatalogDropped)?;
					let object = catalog.get_object(id).ok_or_else(|| StateError::NotYetCreatable {
						id: id.to_string(),
					})?;
					if !object.io_type().is_subtype_of(&target) {
						return Err(StateError::InvalidState {
							type_name: type_name.clone(),
							reason: format!("{id} is a {}, not a {target}", object.io_type()),
						});
					}
					Ok(object)
				})
				.apply_state_erased(move |_, _| {
					Err(StateError::InPlaceUnsupported {
						type_name: name.clone(),
					})
				})
		})
	}
}
