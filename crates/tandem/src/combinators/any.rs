use std::any::Any;

use crate::catalog::Catalog;
use crate::error::StateError;
use crate::io_type::{IoType, StateSchema, StateValue, TypeSignature};

const TYPE_NAME: &str = "AnyIO";

/// Converts the primitive live values `AnyIO` understands.
fn passthrough(value: &dyn Any) -> Option<StateValue> {
	if let Some(state) = value.downcast_ref::<StateValue>() {
		return Some(state.clone());
	}
	if let Some(n) = value.downcast_ref::<f64>() {
		return serde_json::Number::from_f64(*n).map(StateValue::Number);
	}
	if let Some(n) = value.downcast_ref::<i64>() {
		return Some(StateValue::from(*n));
	}
	if let Some(b) = value.downcast_ref::<bool>() {
		return Some(StateValue::Bool(*b));
	}
	if let Some(s) = value.downcast_ref::<String>() {
		return Some(StateValue::String(s.clone()));
	}
	value
		.downcast_ref::<&'static str>()
		.map(|s| StateValue::from(*s))
}

impl Catalog {
	/// `AnyIO`: passes values through unchanged.
	///
	/// Live [`StateValue`]s serialize as themselves; `f64`, `i64`, `bool` and
	/// strings become the matching JSON value. Deserializing yields a
	/// [`StateValue`].
	pub fn any_io(&self) -> IoType {
		self.parametric_type(TypeSignature::new(TYPE_NAME, std::iter::empty()), || {
			IoType::builder(TYPE_NAME)
				.documentation("Any primitive value, serialized as-is")
				.state_schema(StateSchema::value("*", |_| true))
				.to_state_erased(|value| {
					passthrough(value).ok_or_else(|| StateError::NotSerializable {
						type_name: TYPE_NAME.to_string(),
					})
				})
				.from_state::<StateValue>(|state| Ok(state.clone()))
		})
	}
}
