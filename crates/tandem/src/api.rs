//! Static API description of a catalog.
//!
//! Describes every defined type and every registered object that is part of
//! the static API. Dynamic elements are described through their container's
//! archetype instead of individually.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::io_type::IoType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiDescription {
	pub types: BTreeMap<String, TypeDescription>,
	pub elements: BTreeMap<String, ElementDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescription {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub supertype: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub parameter_types: Vec<String>,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub documentation: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub state_schema: Option<SchemaDescription>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_state_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchemaDescription {
	/// Display string of a value schema.
	Value(String),
	/// Field name to field type name.
	Composite(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDescription {
	pub type_name: String,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub archetype: bool,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub dynamic_element: bool,
}

fn describe_type(io_type: &IoType) -> TypeDescription {
	let schema = io_type.state_schema();
	TypeDescription {
		supertype: io_type.supertype().map(|s| s.type_name().to_string()),
		parameter_types: io_type
			.parameter_types()
			.iter()
			.map(|p| p.type_name().to_string())
			.collect(),
		documentation: io_type.documentation().to_string(),
		state_schema: schema.map(|schema| match schema.display() {
			Some(display) => SchemaDescription::Value(display.to_string()),
			None => SchemaDescription::Composite(
				schema
					.fields()
					.iter()
					.map(|f| (f.name().to_string(), f.io_type().type_name().to_string()))
					.collect(),
			),
		}),
		api_state_keys: schema
			.and_then(|s| s.api_state_keys())
			.map(<[String]>::to_vec),
	}
}

/// Snapshots the types and static API elements of `catalog`.
pub fn describe(catalog: &Catalog) -> ApiDescription {
	let types = catalog
		.types()
		.iter()
		.map(|t| (t.type_name().to_string(), describe_type(t)))
		.collect();

	let elements = catalog
		.object_ids()
		.into_iter()
		.filter_map(|id| catalog.get_object(&id).map(|object| (id, object)))
		.filter(|(_, object)| {
			let instrumentation = object.instrumentation();
			instrumentation.is_archetype() || !object.tandem().is_dynamic()
		})
		.map(|(id, object)| {
			let instrumentation = object.instrumentation();
			let description = ElementDescription {
				type_name: object.io_type().type_name().to_string(),
				archetype: instrumentation.is_archetype(),
				dynamic_element: instrumentation.is_dynamic_element(),
			};
			(id, description)
		})
		.collect();

	ApiDescription { types, elements }
}

impl ApiDescription {
	pub fn to_json(&self) -> serde_json::Value {
		serde_json::to_value(self).unwrap_or_default()
	}
}
