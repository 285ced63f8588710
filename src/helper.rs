//! The plugin contract every helper implementation honors uniformly.
//!
//! A helper is a capability, not a class hierarchy (§9): implementations
//! need not share code, only this four-operation contract. Shared utility
//! code (e.g. home directory validation) belongs in a free function or
//! module, not a base type.
use std::{any::Any, collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{entry::Entry, error::Error};

/// Opaque, helper-owned configuration handle returned by
/// [`Helper::parse_options`]. The core treats this purely as a handle and
/// never inspects it; only the originating helper implementation
/// downcasts it back to its own concrete type.
pub type HelperContext = Arc<dyn Any + Send + Sync>;

/// Which attributes a helper's search should retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
	/// An explicit, helper-declared set of attribute names.
	Named(Vec<String>),
	/// The sentinel "all user attributes."
	All,
}

/// A four-operation plugin contract: declare required attributes, parse
/// options into an opaque context, perform work on one entry, and
/// optionally flush state once a batch completes.
#[async_trait]
pub trait Helper: Send + Sync {
	/// Declare the search attribute set. Must be constant across calls;
	/// the controller calls this once at construction time.
	fn attributes(&self) -> Attributes;

	/// Validate `options` and return an opaque per-task context. Rejects
	/// unknown keys with [`Error::InvalidOption`] and missing required
	/// keys with [`Error::MissingOption`].
	fn parse_options(&self, options: &HashMap<String, String>) -> Result<HelperContext, Error>;

	/// Perform the side effect for one entry. Must be idempotent when
	/// `modified == false`. May fail with [`Error::HelperError`] on
	/// recoverable failures.
	async fn work(&mut self, context: &HelperContext, entry: &Entry, modified: bool) -> Result<(), Error>;

	/// Called once per batch after every entry has been processed. The
	/// default does nothing; helpers that batch writes override this to
	/// flush them.
	async fn finish(&mut self) -> Result<(), Error> {
		Ok(())
	}
}

/// Constructs fresh [`Helper`] instances.
///
/// A controller instantiates exactly one helper per `work` pass — so the
/// instance may accumulate state between entries, released in `finish` —
/// via a registered factory rather than reflection or module-scanning
/// (§9 REDESIGN FLAG).
pub trait HelperFactory: Send + Sync {
	/// Construct a new helper instance.
	fn create(&self) -> Box<dyn Helper>;
}

impl<F> HelperFactory for F
where
	F: Fn() -> Box<dyn Helper> + Send + Sync,
{
	fn create(&self) -> Box<dyn Helper> {
		(self)()
	}
}

/// Case-insensitively parse a helper option value as exactly `"true"` or
/// `"false"`. Any other value is [`Error::InvalidOption`].
pub fn parse_bool_option(key: &str, value: &str) -> Result<bool, Error> {
	match value.to_ascii_lowercase().as_str() {
		"true" => Ok(true),
		"false" => Ok(false),
		_ => Err(Error::InvalidOption(key.to_owned())),
	}
}

/// Fetch a required option, or fail with [`Error::MissingOption`].
pub fn require_option<'a>(options: &'a HashMap<String, String>, key: &str) -> Result<&'a str, Error> {
	options.get(key).map(String::as_str).ok_or_else(|| Error::MissingOption(key.to_owned()))
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::items_after_statements)]
	use std::collections::HashMap;

	use super::{parse_bool_option, require_option};
	use crate::error::Error;

	#[test]
	fn bool_option_is_case_insensitive() {
		assert_eq!(parse_bool_option("enabled", "TRUE").unwrap(), true);
		assert_eq!(parse_bool_option("enabled", "false").unwrap(), false);
		assert!(matches!(parse_bool_option("enabled", "yes"), Err(Error::InvalidOption(_))));
	}

	#[test]
	fn required_option_missing_is_an_error() {
		let options = HashMap::new();
		assert!(matches!(require_option(&options, "base"), Err(Error::MissingOption(_))));
	}

	#[test]
	fn required_option_present_is_returned() {
		let options = HashMap::from([("base".to_owned(), "/home".to_owned())]);
		assert_eq!(require_option(&options, "base").unwrap(), "/home");
	}
}
