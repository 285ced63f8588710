//! A thin, request/response facade over an LDAP v3 connection.
//!
//! [`DirectoryClient`] is the trait the rest of the core depends on;
//! [`Client`] is the `ldap3`-backed implementation embedders construct via
//! [`Client::connect`]. Keeping the trait separate lets controller and
//! group-filter tests run against an in-memory fake instead of a live
//! directory server.
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings};
use tracing::warn;
use url::Url;

use crate::{
	config::{ConnectionConfig, Scope},
	entry::{ChangeKind, Entry, ModValue, Modification},
	error::Error,
};

/// Request/response operations against a directory server.
///
/// Implementations must not retain [`Entry`] references across calls; each
/// `search` returns freshly allocated values, per the facade's contract.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
	/// Perform a simple bind. Fails with [`Error::InvalidBind`] when
	/// `password` is empty and `dn` is non-empty, rejecting a
	/// misconfiguration some servers silently downgrade to an anonymous
	/// bind.
	async fn simple_bind(&self, dn: &str, password: &str) -> Result<(), Error>;

	/// Perform a SASL GSSAPI (Kerberos 5) bind. Fails with
	/// [`Error::BindFailed`] when SASL is unavailable locally or
	/// negotiation fails.
	async fn sasl_gssapi_bind(&self, authz_id: Option<&str>) -> Result<(), Error>;

	/// Search `base` within `scope`, applying `filter`. `attributes ==
	/// None` means "all user attributes." The operational attribute
	/// `modifyTimestamp` must be retrievable on request even though it is
	/// not a user attribute.
	async fn search(
		&self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: Option<&[String]>,
	) -> Result<Vec<Entry>, Error>;

	/// Server-side compare of `attribute` against `value` for `dn`.
	async fn compare(&self, dn: &str, attribute: &str, value: &str) -> Result<bool, Error>;

	/// Apply a [`Modification`]'s change list, in order.
	async fn modify(&self, modification: Modification) -> Result<(), Error>;
}

/// An LDAP v3 client connection, backed by `ldap3`.
///
/// Cloning is cheap: it clones the lightweight handle to the single
/// connection task `ldap3` drives in the background, so controllers
/// sharing one [`Client`] issue operations concurrently without an
/// additional mutex (`ldap3` multiplexes requests over the wire
/// internally).
#[derive(Debug, Clone)]
pub struct Client {
	inner: ldap3::Ldap,
}

impl Client {
	/// Establish an LDAP v3 connection to `url` using the given
	/// connection settings.
	pub async fn connect(url: &Url, connection: &ConnectionConfig) -> Result<Self, Error> {
		let settings: LdapConnSettings = connection.to_settings();
		let (conn, ldap) = LdapConnAsync::from_url_with_settings(settings, url).await?;
		tokio::spawn(async move {
			if let Err(err) = conn.drive().await {
				warn!("LDAP connection driver exited with an error: {err}");
			}
		});
		Ok(Self { inner: ldap })
	}
}

/// Reject a non-empty DN paired with an empty password, rather than let it
/// through as an accidental anonymous bind. Shared between
/// [`Client::simple_bind`] and its tests so the rule is only expressed once.
fn reject_empty_password(dn: &str, password: &str) -> Result<(), Error> {
	if password.is_empty() && !dn.is_empty() {
		return Err(Error::InvalidBind);
	}
	Ok(())
}

#[async_trait]
impl DirectoryClient for Client {
	async fn simple_bind(&self, dn: &str, password: &str) -> Result<(), Error> {
		reject_empty_password(dn, password)?;
		let mut ldap = self.inner.clone();
		ldap.simple_bind(dn, password)
			.await
			.map_err(|err| Error::BindFailed(err.to_string()))?
			.success()
			.map_err(|err| Error::BindFailed(err.to_string()))?;
		Ok(())
	}

	async fn sasl_gssapi_bind(&self, authz_id: Option<&str>) -> Result<(), Error> {
		// This crate's default feature set does not compile in `ldap3`'s
		// `gssapi` feature (it pulls in a platform Kerberos library that
		// isn't available in every deployment); report unavailable
		// instead of failing to build or panicking, per the facade
		// contract.
		let _ = authz_id;
		Err(Error::BindFailed("GSSAPI/SASL support is not available in this build".to_owned()))
	}

	async fn search(
		&self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: Option<&[String]>,
	) -> Result<Vec<Entry>, Error> {
		let mut ldap = self.inner.clone();
		let owned_attrs: Vec<String>;
		let attrs: &[String] = match attributes {
			Some(attrs) => attrs,
			None => {
				owned_attrs = vec!["*".to_owned()];
				&owned_attrs
			}
		};
		let (results, _stats) = ldap
			.search(base, scope.into(), filter, attrs)
			.await
			.map_err(|err| Error::SearchFailed(err.to_string()))?
			.success()
			.map_err(|err| Error::SearchFailed(err.to_string()))?;
		Ok(results.into_iter().map(ldap3::SearchEntry::construct).map(Entry::from).collect())
	}

	async fn compare(&self, dn: &str, attribute: &str, value: &str) -> Result<bool, Error> {
		let mut ldap = self.inner.clone();
		let result = ldap
			.compare(dn, attribute, value.as_bytes())
			.await
			.map_err(|err| Error::CompareFailed(err.to_string()))?;
		result.equal().map_err(|err| Error::CompareFailed(err.to_string()))
	}

	async fn modify(&self, modification: Modification) -> Result<(), Error> {
		let mut ldap = self.inner.clone();
		let dn = modification.dn.clone();
		let mods: Vec<ldap3::Mod<String>> = modification.changes.into_iter().map(to_ldap3_mod).collect();
		ldap.modify(&dn, mods)
			.await
			.map_err(|err| Error::ModifyFailed(err.to_string()))?
			.success()
			.map_err(|err| Error::ModifyFailed(err.to_string()))?;
		Ok(())
	}
}

/// Convert one of our change descriptions into the `ldap3` wire
/// representation.
fn to_ldap3_mod(change: crate::entry::Change) -> ldap3::Mod<String> {
	use std::collections::HashSet;

	let values: HashSet<String> = match change.value {
		ModValue::One(value) => HashSet::from([value]),
		ModValue::Many(values) => values.into_iter().collect(),
		ModValue::None => HashSet::new(),
	};
	match change.kind {
		ChangeKind::Add => ldap3::Mod::Add(change.attribute, values),
		ChangeKind::Replace => ldap3::Mod::Replace(change.attribute, values),
		ChangeKind::Delete => ldap3::Mod::Delete(change.attribute, values),
	}
}
