//! Value types that cross the boundary between the LDAP client facade and
//! helpers: immutable search results ([`Entry`]) and builder-style
//! modification requests ([`Modification`]).
use std::collections::HashMap;

use time::OffsetDateTime;

use crate::{config::TIME_FORMAT, error::Error};

/// The operational attribute every search attaches regardless of what a
/// helper declared, and that [`Entry::mod_time`] parses.
pub const MODIFY_TIMESTAMP: &str = "modifyTimestamp";

/// One LDAP result row: a DN plus its attribute multimap.
///
/// Produced fresh by every [`crate::client::DirectoryClient::search`] call
/// and discarded at the end of the tick that produced it; nothing holds a
/// reference to an `Entry` across searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
	/// Distinguished name, globally unique within a directory.
	pub dn: String,
	/// Attribute name to ordered sequence of string values. Names are
	/// treated case-sensitively as returned by the server, per LDAP
	/// convention of case-insensitive but as-given comparison being left
	/// to the caller.
	pub attributes: HashMap<String, Vec<String>>,
}

impl Entry {
	/// Construct an entry from a DN and its attributes.
	#[must_use]
	pub fn new(dn: impl Into<String>, attributes: HashMap<String, Vec<String>>) -> Self {
		Self { dn: dn.into(), attributes }
	}

	/// Get the first value of an attribute, if present.
	#[must_use]
	pub fn attr_first(&self, attribute: &str) -> Option<&str> {
		self.attributes.get(attribute)?.first().map(String::as_str)
	}

	/// Get all values of an attribute, if present.
	#[must_use]
	pub fn attr(&self, attribute: &str) -> Option<&[String]> {
		self.attributes.get(attribute).map(Vec::as_slice)
	}

	/// Parse `modifyTimestamp` into an absolute UTC instant.
	///
	/// Returns `Ok(None)` when the attribute is absent (callers then treat
	/// the entry as modified, per the modification protocol), and
	/// `Err(Error::Invalid)` when it is malformed — callers must skip the
	/// entry entirely in that case rather than guessing a direction.
	pub fn mod_time(&self) -> Result<Option<OffsetDateTime>, Error> {
		match self.attr_first(MODIFY_TIMESTAMP) {
			None => Ok(None),
			Some(raw) => parse_generalized_time(raw).map(Some).ok_or(Error::Invalid),
		}
	}
}

impl From<ldap3::SearchEntry> for Entry {
	fn from(entry: ldap3::SearchEntry) -> Self {
		Self { dn: entry.dn, attributes: entry.attrs }
	}
}

/// Parse an LDAP generalized-time value (`YYYYMMDDHHMMSSZ`, RFC 4517
/// §3.1.13, UTC only) into an absolute instant. Returns `None` for any
/// value that doesn't parse, rather than guessing.
fn parse_generalized_time(raw: &str) -> Option<OffsetDateTime> {
	let parsed = time::PrimitiveDateTime::parse(raw, &TIME_FORMAT).ok()?;
	Some(parsed.assume_utc())
}

/// The kind of change one [`Change`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	/// Append value(s) to an attribute.
	Add,
	/// Overwrite an attribute's value(s).
	Replace,
	/// Remove a value, or all values, from an attribute.
	Delete,
}

/// The value carried by a [`Change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModValue {
	/// A single value.
	One(String),
	/// An ordered sequence of values.
	Many(Vec<String>),
	/// No value — only meaningful for [`ChangeKind::Delete`], meaning
	/// "delete all instances of this attribute."
	None,
}

impl From<String> for ModValue {
	fn from(value: String) -> Self {
		ModValue::One(value)
	}
}

impl From<&str> for ModValue {
	fn from(value: &str) -> Self {
		ModValue::One(value.to_owned())
	}
}

impl From<Vec<String>> for ModValue {
	fn from(values: Vec<String>) -> Self {
		ModValue::Many(values)
	}
}

/// One change operation within a [`Modification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
	/// Whether this adds, replaces, or deletes.
	pub kind: ChangeKind,
	/// The attribute this change applies to.
	pub attribute: String,
	/// The value(s) involved.
	pub value: ModValue,
}

/// A target DN plus an ordered sequence of change operations, built by a
/// helper (or a test) and submitted once to
/// [`crate::client::DirectoryClient::modify`], then discarded.
///
/// Operation order is preserved from the order `add`/`replace`/`delete`
/// were called, matching `splat/ldaputils/client.py`'s append-only
/// `modlist`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modification {
	/// The DN to modify.
	pub dn: String,
	/// Change operations, in submission order.
	pub changes: Vec<Change>,
}

impl Modification {
	/// Start building a modification against the given DN.
	#[must_use]
	pub fn new(dn: impl Into<String>) -> Self {
		Self { dn: dn.into(), changes: Vec::new() }
	}

	/// Append a value, or values, to an attribute.
	#[must_use]
	pub fn add(mut self, attribute: impl Into<String>, value: impl Into<ModValue>) -> Self {
		self.changes.push(Change { kind: ChangeKind::Add, attribute: attribute.into(), value: value.into() });
		self
	}

	/// Replace an attribute's value(s) wholesale.
	#[must_use]
	pub fn replace(mut self, attribute: impl Into<String>, value: impl Into<ModValue>) -> Self {
		self.changes.push(Change {
			kind: ChangeKind::Replace,
			attribute: attribute.into(),
			value: value.into(),
		});
		self
	}

	/// Delete a single value, a set of values, or (with `ModValue::None`)
	/// every instance of an attribute.
	#[must_use]
	pub fn delete(mut self, attribute: impl Into<String>, value: impl Into<ModValue>) -> Self {
		self.changes.push(Change {
			kind: ChangeKind::Delete,
			attribute: attribute.into(),
			value: value.into(),
		});
		self
	}
}
