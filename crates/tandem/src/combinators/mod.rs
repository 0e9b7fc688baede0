//! Cached parametric type factories.
//!
//! Each factory is a [`Catalog`](crate::Catalog) method that names its result
//! after the combinator and its parameters (`OrIO<NumberIO, StringIO>`) and
//! caches it under a [`TypeSignature`](crate::io_type::TypeSignature), so
//! asking twice with the same parameters returns the same [`IoType`](crate::IoType).
//!
//! Factories that take Rust type parameters (`map_io`, `array_io`,
//! `nullable_io`) fix those types on first use; later calls with the same
//! parameter types get the cached type regardless of the Rust types named.

mod any;
mod array;
mod container;
mod infinite;
mod map;
mod nullable;
mod reference;
mod union;

pub use infinite::{NEGATIVE_INFINITY, POSITIVE_INFINITY};


/// `Combinator<A, B>` display name.
fn parametric_name(combinator: &str, parameters: &[&crate::IoType]) -> String {
	let names: Vec<&str> = parameters.iter().map(|p| p.type_name()).collect();
	format!("{combinator}<{}>", names.join(", "))
}
