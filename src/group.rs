//! A cached predicate: "is DN X a member of any group matching search
//! (base, scope, filter)?"
use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::{client::DirectoryClient, config::Scope, entry::MODIFY_TIMESTAMP, error::Error};

/// Default attribute holding member DNs on a group entry.
pub const DEFAULT_MEMBER_ATTRIBUTE: &str = "uniqueMember";

/// The LDAP OID requesting zero attributes be returned by a search (RFC
/// 4511 §4.5.1.8). An empty attribute list is not equivalent: servers (and
/// this crate's own [`crate::client::DirectoryClient::search`]) treat that
/// as "all user attributes."
const NO_ATTRIBUTES: &str = "1.1";

/// One cached membership answer and when it expires.
#[derive(Debug, Clone, Copy)]
struct CacheSlot {
	is_member: bool,
	expires_at: OffsetDateTime,
}

/// `(baseDN, scope, filter, memberAttribute)` plus a private membership
/// cache keyed by DN. The cache is an optimization only: correctness never
/// depends on it, and a `cacheTTL` of zero disables it entirely.
#[derive(Debug)]
pub struct GroupFilter {
	/// LDAP search base for locating candidate group entries.
	pub base_dn: String,
	/// LDAP search scope.
	pub scope: Scope,
	/// LDAP search filter identifying matching groups.
	pub filter: String,
	/// Attribute on a group entry containing member DNs.
	pub member_attribute: String,
	/// How long a cached membership answer remains valid. Zero disables
	/// caching.
	cache_ttl: Duration,
	/// DN to `(is_member, expires_at)`. Reads and writes are serialized
	/// through the mutex so concurrent tickers observe a consistent
	/// entry.
	cache: Mutex<HashMap<String, CacheSlot>>,
}

impl GroupFilter {
	/// Construct a group filter with the default member attribute
	/// (`uniqueMember`) and caching disabled.
	#[must_use]
	pub fn new(base_dn: impl Into<String>, scope: Scope, filter: impl Into<String>) -> Self {
		Self::with_options(base_dn, scope, filter, DEFAULT_MEMBER_ATTRIBUTE, Duration::ZERO)
	}

	/// Construct a group filter with an explicit member attribute and
	/// cache TTL.
	#[must_use]
	pub fn with_options(
		base_dn: impl Into<String>,
		scope: Scope,
		filter: impl Into<String>,
		member_attribute: impl Into<String>,
		cache_ttl: Duration,
	) -> Self {
		Self {
			base_dn: base_dn.into(),
			scope,
			filter: filter.into(),
			member_attribute: member_attribute.into(),
			cache_ttl,
			cache: Mutex::new(HashMap::new()),
		}
	}

	/// Verify that `dn` is a member of the group(s) returned by this
	/// filter's search, consulting (and updating) the TTL cache.
	pub async fn is_member(&self, client: &dyn DirectoryClient, dn: &str) -> Result<bool, Error> {
		if !self.cache_ttl.is_zero() {
			let cache = self.cache.lock().await;
			if let Some(slot) = cache.get(dn) {
				if OffsetDateTime::now_utc() < slot.expires_at {
					return Ok(slot.is_member);
				}
			}
		}

		// `"1.1"` is the conventional LDAP sentinel for "no attributes" (RFC
		// 4511 §4.5.1.8); an empty attribute list on the wire means "all
		// user attributes," not zero, so it cannot be used here instead.
		let no_attrs = [NO_ATTRIBUTES.to_owned()];
		let groups = client.search(&self.base_dn, self.scope, &self.filter, Some(no_attrs.as_slice())).await?;
		let mut is_member = false;
		for group in &groups {
			if client.compare(&group.dn, &self.member_attribute, dn).await? {
				is_member = true;
				break;
			}
		}

		if !self.cache_ttl.is_zero() {
			let mut cache = self.cache.lock().await;
			cache.insert(
				dn.to_owned(),
				CacheSlot { is_member, expires_at: OffsetDateTime::now_utc() + self.cache_ttl },
			);
		}
		Ok(is_member)
	}

	/// Whether this group's own `modifyTimestamp` is at least as recent
	/// as `since`. A group with no timestamp, or a search returning zero
	/// rows, is conservatively treated as modified (§9 — the source's
	/// "group modified = true to be safe" rule).
	pub async fn modified_since(
		&self,
		client: &dyn DirectoryClient,
		since: OffsetDateTime,
	) -> Result<bool, Error> {
		let attrs = [MODIFY_TIMESTAMP.to_owned()];
		let groups = client.search(&self.base_dn, self.scope, &self.filter, Some(attrs.as_slice())).await?;
		let Some(group) = groups.first() else {
			return Ok(true);
		};
		match group.mod_time() {
			Ok(Some(mod_time)) => Ok(mod_time >= since),
			Ok(None) | Err(_) => Ok(true),
		}
	}
}
