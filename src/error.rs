//! Error taxonomy for the core scheduling, dispatch and LDAP facade.
//!
//! Every variant here maps to a category from the error handling design:
//! configuration errors are raised during construction and never retried;
//! LDAP protocol errors and helper errors are logged and mark a single
//! batch as failed, so the next tick retries; anything else that escapes a
//! controller's `work` pass is fatal and terminates the daemon.

/// Errors that can occur anywhere in the core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// `simpleBind` was called with a non-empty DN and an empty password.
	#[error("invalid bind: DN with no password")]
	InvalidBind,
	/// A SASL/GSSAPI bind failed, or SASL support is unavailable locally.
	#[error("bind failed: {0}")]
	BindFailed(String),
	/// A search operation failed at the protocol or permission level.
	#[error("search failed: {0}")]
	SearchFailed(String),
	/// A compare operation failed.
	#[error("compare failed: {0}")]
	CompareFailed(String),
	/// A modify operation failed.
	#[error("modify failed: {0}")]
	ModifyFailed(String),
	/// A helper's `parseOptions` was given a key it does not recognize.
	#[error("invalid option {0:?}")]
	InvalidOption(String),
	/// A helper's `parseOptions` was missing a required key.
	#[error("missing option {0:?}")]
	MissingOption(String),
	/// A `HelperController` was configured with an id not present in the
	/// registry.
	#[error("no helper registered under id {0:?}")]
	HelperNotFound(String),
	/// A helper's `work` or `finish` raised a recoverable error.
	#[error("helper error: {0}")]
	HelperError(String),
	/// An attribute value was missing where one was required.
	#[error("missing data")]
	Missing,
	/// An attribute value did not conform to the expected syntax.
	#[error("malformed data")]
	Invalid,
	/// An underlying `ldap3` protocol error, or the library was used
	/// incorrectly.
	#[error(transparent)]
	Ldap(#[from] ldap3::LdapError),
}

impl Error {
	/// Whether this error represents a recoverable, per-batch failure
	/// (LDAP protocol errors and helper errors) as opposed to a fatal
	/// daemon-terminating condition.
	#[must_use]
	pub fn is_recoverable(&self) -> bool {
		matches!(
			self,
			Error::SearchFailed(_)
				| Error::CompareFailed(_)
				| Error::ModifyFailed(_)
				| Error::HelperError(_)
				| Error::Ldap(_)
		)
	}
}
