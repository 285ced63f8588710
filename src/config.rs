//! Configuration shapes for the LDAP connection and for wiring up
//! controllers. The file format an embedder reads these from is out of
//! scope for this crate; what's in scope is the serde-deserializable
//! target shape these values land in.
use std::{collections::HashMap, time::Duration};

use ldap3::LdapConnSettings;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::{iso8601, Iso8601};
use url::Url;

/// Configuration for which variant of ISO8601 to use for parsing and
/// serializing time. Configured according the syntax definition
/// `( 1.3.6.1.4.1.1466.115.121.1.24 DESC 'Generalized Time' )` described in
/// RFC4517 section 3.1.13
pub const TIME_CONFIG: iso8601::EncodedConfig =
	iso8601::Config::DEFAULT.set_use_separators(false).encode();
/// The time format used to parse and format `modifyTimestamp` values. See
/// also [`TIME_CONFIG`].
pub const TIME_FORMAT: Iso8601<TIME_CONFIG> = Iso8601;

/// Configuration for how to connect to the LDAP server. Uses defaults from
/// [`LdapConnSettings`] for unset values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
	/// The URL to connect to the server with. Supports `ldap`, `ldaps`,
	/// and `ldapi` schemes.
	pub url: Option<Url>,
	/// Timeout to establish a connection in seconds. Infinite if unset.
	#[serde(default)]
	pub timeout: Option<u64>,

	/// Use StartTLS extended operation for establishing a secure
	/// connection, rather than TLS on a dedicated port. False if unset.
	#[serde(default)]
	pub starttls: Option<bool>,

	/// Disable verification of TLS certificates. False if unset.
	#[serde(default)]
	pub no_tls_verify: Option<bool>,
}

impl ConnectionConfig {
	/// Create an [`LdapConnSettings`] based on this [`ConnectionConfig`].
	pub(crate) fn to_settings(&self) -> LdapConnSettings {
		let mut settings = LdapConnSettings::new();
		if let Some(timeout) = self.timeout {
			settings = settings.set_conn_timeout(Duration::from_secs(timeout));
		}
		if let Some(starttls) = self.starttls {
			settings = settings.set_starttls(starttls);
		}
		if let Some(no_tls_verify) = self.no_tls_verify {
			settings = settings.set_no_tls_verify(no_tls_verify);
		}
		settings
	}
}

/// Search scope, mirroring `ldap3::Scope` so callers of this crate don't
/// need to depend on `ldap3` directly to build a controller or group
/// filter configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
	/// Only the base entry itself.
	Base,
	/// Immediate children of the base entry.
	One,
	/// The base entry and its entire subtree.
	Subtree,
}

impl From<Scope> for ldap3::Scope {
	fn from(scope: Scope) -> Self {
		match scope {
			Scope::Base => ldap3::Scope::Base,
			Scope::One => ldap3::Scope::OneLevel,
			Scope::Subtree => ldap3::Scope::Subtree,
		}
	}
}

/// Declarative, serde-deserializable description of one [`GroupFilter`]
/// override and the options to parse for its context, when not reusing a
/// controller's default context.
///
/// [`GroupFilter`]: crate::group::GroupFilter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupFilterConfig {
	/// LDAP search base for the group search.
	pub base_dn: String,
	/// LDAP search scope for the group search.
	pub scope: Scope,
	/// LDAP search filter identifying matching groups.
	pub filter: String,
	/// Attribute on a group entry containing member DNs. Defaults to
	/// `uniqueMember`.
	#[serde(default)]
	pub member_attribute: Option<String>,
	/// Time-to-live, in seconds, for cached membership answers. `0`
	/// disables caching. Defaults to `0`.
	#[serde(default)]
	pub cache_ttl_secs: u64,
	/// Group-specific helper options; when absent, the controller's
	/// default context is reused for entries matching this group.
	#[serde(default)]
	pub options: Option<HashMap<String, String>>,
}

/// Declarative, serde-deserializable description of one [`HelperController`]
/// before it is resolved against a helper registry.
///
/// [`HelperController`]: crate::controller::HelperController
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HelperControllerConfig {
	/// Unique caller-assigned name.
	pub name: String,
	/// Id of the registered helper implementation to use.
	pub helper_id: String,
	/// Run interval in seconds. `0` means "run once."
	pub interval_secs: u64,
	/// LDAP search base.
	pub search_base: String,
	/// LDAP search filter.
	pub search_filter: String,
	/// Require a matched group for the helper to be invoked.
	#[serde(default)]
	pub require_group: bool,
	/// Default helper options.
	#[serde(default)]
	pub options: HashMap<String, String>,
	/// Group overrides, evaluated in the order listed here.
	#[serde(default)]
	pub groups: Vec<GroupFilterConfig>,
}
