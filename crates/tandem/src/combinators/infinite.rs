use crate::catalog::Catalog;
use crate::error::StateError;
use crate::io_type::{IoType, StateSchema, StateValue, TypeSignature};

/// State sentinel for `f64::INFINITY`.
pub const POSITIVE_INFINITY: &str = "POSITIVE_INFINITY";
/// State sentinel for `f64::NEG_INFINITY`.
pub const NEGATIVE_INFINITY: &str = "NEGATIVE_INFINITY";

const TYPE_NAME: &str = "InfiniteNumberIO";

fn is_sentinel_state(state: &StateValue) -> bool {
	state.is_number() || matches!(state.as_str(), Some(POSITIVE_INFINITY | NEGATIVE_INFINITY))
}

impl Catalog {
	/// `InfiniteNumberIO`: an `f64` that may be infinite. Infinities become
	/// string sentinels; NaN is rejected.
	pub fn infinite_number_io(&self) -> IoType {
		self.parametric_type(TypeSignature::new(TYPE_NAME, std::iter::empty()), || {
			IoType::builder(TYPE_NAME)
				.documentation("A number that may be positive or negative infinity")
				.value_predicate::<f64>(|n| !n.is_nan())
				.state_schema(StateSchema::value(
					"number | 'POSITIVE_INFINITY' | 'NEGATIVE_INFINITY'",
					is_sentinel_state,
				))
				.to_state::<f64>(|n| {
					if *n == f64::INFINITY {
						Ok(StateValue::from(POSITIVE_INFINITY))
					} else if *n == f64::NEG_INFINITY {
						Ok(StateValue::from(NEGATIVE_INFINITY))
					} else {
						serde_json::Number::from_f64(*n)
							.map(StateValue::Number)
							.ok_or_else(|| StateError::InvalidValue {
								type_name: TYPE_NAME.to_string(),
								reason: format!("{n} has no state representation"),
							})
					}
				})
				.from_state::<f64>(|state| match state {
					StateValue::String(s) if s == POSITIVE_INFINITY => Ok(f64::INFINITY),
					StateValue::String(s) if s == NEGATIVE_INFINITY => Ok(f64::NEG_INFINITY),
					other => other.as_f64().ok_or_else(|| StateError::InvalidState {
						type_name: TYPE_NAME.to_string(),
						reason: format!("expected number or infinity sentinel, got {other}"),
					}),
				})
		})
	}
}
