use super::parametric_name;
use crate::catalog::Catalog;
use crate::dynamic::ElementSlot;
use crate::error::TandemError;
use crate::io_type::{IoType, TypeSignature};
use crate::tandem::group_element_index;

impl Catalog {
	/// `PhetioGroupIO<T>`: type of a [`Group`](crate::Group) of `element_type`.
	///
	/// Its `add_child_element` hook reads the index from a saved element's
	/// component name (`particle_3`) and creates that element from state.
	pub fn group_io(&self, element_type: &IoType) -> IoType {
		self.parametric_type(TypeSignature::new("PhetioGroupIO", [element_type]), || {
			IoType::builder(parametric_name("PhetioGroupIO", &[element_type]))
				.documentation(format!("A group of dynamic {element_type} elements"))
				.parameter_types(std::slice::from_ref(element_type))
				.add_child_element(|container, component_name, state| {
					let index = group_element_index(component_name).ok_or_else(|| {
						TandemError::MissingGroupIndex {
							name: component_name.to_string(),
						}
					})?;
					container.create_element_from_state(ElementSlot::Indexed(index), state)
				})
		})
	}

	/// `PhetioCapsuleIO<T>`: type of a [`Capsule`](crate::Capsule) of `element_type`.
	pub fn capsule_io(&self, element_type: &IoType) -> IoType {
		self.parametric_type(TypeSignature::new("PhetioCapsuleIO", [element_type]), || {
			IoType::builder(parametric_name("PhetioCapsuleIO", &[element_type]))
				.documentation(format!("A capsule holding one dynamic {element_type}"))
				.parameter_types(std::slice::from_ref(element_type))
				.add_child_element(|container, _component_name, state| {
					container.create_element_from_state(ElementSlot::Single, state)
				})
		})
	}
}
