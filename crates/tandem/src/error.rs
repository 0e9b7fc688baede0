use thiserror::Error;

/// Configuration errors: programmer mistakes in how the identity tree or a
/// dynamic container is driven.
///
/// These are never retried. Lifecycle operations return them instead of
/// silently continuing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TandemError {
	/// The name fails the node's character-class predicate.
	#[error("invalid tandem name: {name:?}")]
	InvalidName { name: String },
	/// The name is reserved for sentinel tandems.
	#[error("reserved tandem name: {name:?}")]
	ReservedName { name: String },
	/// A child was re-requested with different `required`/`supplied` flags.
	#[error(
		"tandem {id} re-requested with mismatched options: existing required={existing_required} supplied={existing_supplied}, requested required={required} supplied={supplied}"
	)]
	OptionsMismatch {
		id: String,
		existing_required: bool,
		existing_supplied: bool,
		required: bool,
		supplied: bool,
	},
	/// A required tandem was never supplied by the caller.
	#[error("required tandem not supplied: {id}")]
	RequiredNotSupplied { id: String },
	/// The tandem has already been disposed.
	#[error("tandem disposed: {id}")]
	Disposed { id: String },
	/// `launch` was called twice.
	#[error("catalog already launched")]
	DoubleLaunch,
	/// An object was removed without ever being added.
	#[error("object was never registered: {id}")]
	NeverAdded { id: String },
	/// An id was registered while another object still holds it.
	#[error("duplicate registration: {id}")]
	DuplicateRegistration { id: String },
	/// The catalog backing a tandem has been dropped.
	#[error("catalog dropped")]
	CatalogDropped,
	/// Two distinct types share a type name.
	#[error("duplicate type name: {name}")]
	DuplicateTypeName { name: String },
	/// The deferred flag was set to its current value.
	#[error("notifications for {id} already deferred={deferred}")]
	DeferredUnchanged { id: String, deferred: bool },
	/// A container flush was re-entered.
	#[error("re-entrant notification flush on {id}")]
	ReentrantFlush { id: String },
	/// A dynamic container was created after the application started.
	#[error("dynamic container {id} created after startup")]
	NestedDynamicContainer { id: String },
	/// A state-restore creation path was used outside of state restoration.
	#[error("element {id} created from state outside of state restoration")]
	OffPathCreation { id: String },
	/// A container's own name lacks its configured suffix.
	#[error("container name {name:?} must end with {suffix:?}")]
	MissingContainerSuffix { name: String, suffix: String },
	/// The element is not (or no longer) owned by the container.
	#[error("element {id} is not in container {container}")]
	ElementNotInContainer { id: String, container: String },
	/// The factory produced something the container cannot manage.
	#[error("invalid dynamic element {id}: {reason}")]
	InvalidDynamicElement { id: String, reason: String },
	/// A component name does not carry a numeric group index.
	#[error("no group index in component name {name:?}")]
	MissingGroupIndex { name: String },
	/// The group index leaves no room for a following index.
	#[error("group index {index} in {container} is out of range")]
	GroupIndexOverflow { container: String, index: usize },
	/// Container elements are disposed through their container.
	#[error("{id} is owned by a dynamic container")]
	ContainerOwned { id: String },
}

/// Errors raised while converting between live values and state objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
	/// The live value failed its type's validator.
	#[error("invalid value for {type_name}: {reason}")]
	InvalidValue { type_name: String, reason: String },
	/// The state object failed its type's schema.
	#[error("invalid state for {type_name}: {reason}")]
	InvalidState { type_name: String, reason: String },
	/// A composite field was absent from the state object.
	#[error("{type_name}: missing key {key:?}")]
	MissingKey { type_name: String, key: String },
	/// A type-erased value was not the expected Rust type.
	#[error("type mismatch: expected {expected}")]
	TypeMismatch { expected: &'static str },
	/// No serializer exists on the type or its supertypes.
	#[error("{type_name} has no serializer")]
	NotSerializable { type_name: String },
	/// No deserializer exists on the type.
	#[error("{type_name} has no deserializer")]
	NotDeserializable { type_name: String },
	/// In-place state application is unsupported by the type.
	#[error("{type_name} does not support in-place state application")]
	InPlaceUnsupported { type_name: String },
	/// The dependency named by `id` does not exist yet; retry on a later pass.
	#[error("not yet creatable: {id}")]
	NotYetCreatable { id: String },
	/// A restoration driver exhausted its retry passes.
	#[error("state restoration exceeded {limit} passes")]
	RetryBudgetExceeded { limit: usize },
	/// The container has no way to turn state into creation arguments.
	#[error("{container} cannot create elements from state")]
	NoStateConstructor { container: String },
	/// A configuration error surfaced during state handling.
	#[error(transparent)]
	Tandem(#[from] TandemError),
}

impl StateError {
	/// Returns true for ordering failures a driver should retry.
	pub fn is_retryable(&self) -> bool {
		matches!(self, StateError::NotYetCreatable { .. })
	}

	pub(crate) fn mismatch<T: ?Sized>() -> Self {
		StateError::TypeMismatch {
			expected: std::any::type_name::<T>(),
		}
	}
}
