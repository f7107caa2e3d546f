//! Naming contract for pluggable backends.

/// Ties a backend's configuration key to the factory that builds it.
///
/// Storage and delivery implementations each expose a `Registry` type
/// implementing this trait. `NAME` is the key under
/// `[<section>.implementations.<NAME>]` in the config file.
pub trait ImplementationRegistry {
	const NAME: &'static str;

	type Factory;

	fn factory() -> Self::Factory;
}
