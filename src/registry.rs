//! Explicit registry mapping a string helper id to a constructor.
//!
//! The source discovers helper classes by importing a module by name and
//! scanning it for `Helper` subclasses. This crate replaces that with an
//! explicit registry populated at startup, per the §9 REDESIGN FLAG: no
//! reflection, no module-scanning.
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
	error::Error,
	helper::{Helper, HelperFactory},
};

/// Maps helper ids (as referenced by [`crate::config::HelperControllerConfig::helper_id`])
/// to the factory that constructs instances of that helper.
#[derive(Default)]
pub struct HelperRegistry {
	factories: HashMap<String, Arc<dyn HelperFactory>>,
}

impl HelperRegistry {
	/// Construct an empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a helper implementation under `id`. Registering the same
	/// id twice replaces the previous factory.
	pub fn register(&mut self, id: impl Into<String>, factory: impl HelperFactory + 'static) {
		self.factories.insert(id.into(), Arc::new(factory));
	}

	/// Register a helper implementation given only its constructor
	/// function, for the common case of a zero-argument `fn() -> Box<dyn
	/// Helper>`.
	pub fn register_fn(
		&mut self,
		id: impl Into<String>,
		constructor: impl Fn() -> Box<dyn Helper> + Send + Sync + 'static,
	) {
		self.register(id, constructor);
	}

	/// Resolve `id` to its factory, or fail with [`Error::HelperNotFound`].
	pub fn resolve(&self, id: &str) -> Result<Arc<dyn HelperFactory>, Error> {
		self.factories.get(id).cloned().ok_or_else(|| Error::HelperNotFound(id.to_owned()))
	}
}

impl fmt::Debug for HelperRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HelperRegistry").field("registered", &self.factories.keys().collect::<Vec<_>>()).finish()
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::items_after_statements)]
	use std::collections::HashMap;

	use async_trait::async_trait;

	use super::HelperRegistry;
	use crate::{
		entry::Entry,
		error::Error,
		helper::{Attributes, Helper, HelperContext},
	};

	struct NoopHelper;

	#[async_trait]
	impl Helper for NoopHelper {
		fn attributes(&self) -> Attributes {
			Attributes::All
		}

		fn parse_options(&self, _options: &HashMap<String, String>) -> Result<HelperContext, Error> {
			Ok(std::sync::Arc::new(()))
		}

		async fn work(&mut self, _context: &HelperContext, _entry: &Entry, _modified: bool) -> Result<(), Error> {
			Ok(())
		}
	}

	#[test]
	fn unregistered_id_is_not_found() {
		let registry = HelperRegistry::new();
		assert!(matches!(registry.resolve("ssh_public_keys"), Err(Error::HelperNotFound(_))));
	}

	#[test]
	fn registered_id_resolves_to_its_factory() {
		let mut registry = HelperRegistry::new();
		registry.register_fn("noop", || Box::new(NoopHelper));
		let factory = registry.resolve("noop").expect("registered");
		let helper = factory.create();
		assert_eq!(helper.attributes(), Attributes::All);
	}

	#[test]
	fn re_registering_an_id_overwrites_the_previous_factory() {
		let mut registry = HelperRegistry::new();
		registry.register_fn("noop", || Box::new(NoopHelper));
		registry.register_fn("noop", || Box::new(NoopHelper));
		assert!(registry.resolve("noop").is_ok());
	}
}
