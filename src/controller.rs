//! One configured rule: a helper, its search, interval, and group-priority
//! overrides. [`HelperController::work`] is one search-and-dispatch pass;
//! this is the hard part of the system (modification protocol, group
//! ordering, per-entry dispatch).
use std::{collections::HashMap, fmt, sync::Arc};

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{
	client::DirectoryClient,
	config::Scope,
	entry::{Entry, MODIFY_TIMESTAMP},
	error::Error,
	group::GroupFilter,
	helper::{Attributes, HelperContext, HelperFactory},
	registry::HelperRegistry,
};

/// One configured `(helper, query, interval, groups)` rule.
pub struct HelperController {
	/// Unique caller-assigned name. Controllers sharing a name in one
	/// [`crate::daemon::DaemonContext`] overwrite one another.
	pub name: String,
	/// The resolved helper factory this controller dispatches to.
	factory: Arc<dyn HelperFactory>,
	/// A standing instance used only to declare attributes and parse
	/// options — never to perform `work`/`finish`, which get a fresh
	/// instance per batch.
	declarations: Box<dyn crate::helper::Helper>,
	/// Run interval in seconds. `0` means "run once."
	pub interval_secs: u64,
	/// LDAP search base.
	pub search_base: String,
	/// LDAP search filter.
	pub search_filter: String,
	/// The attributes requested on every search: the helper's declared
	/// set (or `*` for "all"), always augmented with `modifyTimestamp`.
	search_attributes: Vec<String>,
	/// Whether entries matching zero groups are skipped.
	pub require_group: bool,
	/// The context used when no group matches (and `require_group` is
	/// false).
	default_context: HelperContext,
	/// Group overrides, evaluated in insertion order; the first match
	/// wins.
	groups: Vec<(GroupFilter, HelperContext)>,
	/// Start time of the last successful run. Initialized to the Unix
	/// epoch, which — since every real `modifyTimestamp` postdates it —
	/// naturally makes every entry "modified" on the first tick without
	/// any special-cased first-run branch.
	last_run_started_at: Mutex<OffsetDateTime>,
}

impl HelperController {
	/// Construct a controller: resolves `helper_id` against `registry`,
	/// computes the search attribute set, and parses `options` into the
	/// default context.
	pub fn new(
		name: impl Into<String>,
		registry: &HelperRegistry,
		helper_id: &str,
		interval_secs: u64,
		search_base: impl Into<String>,
		search_filter: impl Into<String>,
		require_group: bool,
		options: &HashMap<String, String>,
	) -> Result<Self, Error> {
		let factory = registry.resolve(helper_id)?;
		let declarations = factory.create();

		let search_attributes = match declarations.attributes() {
			Attributes::All => vec!["*".to_owned(), MODIFY_TIMESTAMP.to_owned()],
			Attributes::Named(mut names) => {
				if !names.iter().any(|name| name.eq_ignore_ascii_case(MODIFY_TIMESTAMP)) {
					names.push(MODIFY_TIMESTAMP.to_owned());
				}
				names
			}
		};

		let default_context = declarations.parse_options(options)?;

		Ok(Self {
			name: name.into(),
			factory,
			declarations,
			interval_secs,
			search_base: search_base.into(),
			search_filter: search_filter.into(),
			search_attributes,
			require_group,
			default_context,
			groups: Vec::new(),
			last_run_started_at: Mutex::new(OffsetDateTime::UNIX_EPOCH),
		})
	}

	/// Add a group filter override. If `options` is provided, it is
	/// parsed into a fresh context; otherwise the controller's default
	/// context is reused. Overrides are tried in the order they were
	/// added.
	pub fn add_group(
		&mut self,
		filter: GroupFilter,
		options: Option<&HashMap<String, String>>,
	) -> Result<(), Error> {
		let context = match options {
			Some(options) => self.declarations.parse_options(options)?,
			None => Arc::clone(&self.default_context),
		};
		self.groups.push((filter, context));
		Ok(())
	}

	/// Start time of the last successful run, for diagnostics and tests.
	pub async fn last_run_started_at(&self) -> OffsetDateTime {
		*self.last_run_started_at.lock().await
	}

	/// Run one search-and-dispatch pass.
	///
	/// Returns `Ok(())` whenever the failure, if any, was recoverable
	/// (an LDAP protocol error or a [`Error::HelperError`]) — those are
	/// logged and leave `last_run_started_at` untouched so the next tick
	/// retries. Returns `Err` only for a non-recoverable error escaping a
	/// helper, which the daemon treats as fatal.
	pub async fn work(&self, client: &dyn DirectoryClient) -> Result<(), Error> {
		let start_time = OffsetDateTime::now_utc();
		let previous_run = self.last_run_started_at().await;
		let mut failed = false;

		let entries = match client
			.search(&self.search_base, Scope::Subtree, &self.search_filter, Some(&self.search_attributes))
			.await
		{
			Ok(entries) => entries,
			Err(err) => {
				error!(controller = %self.name, "search failed: {err}");
				return Ok(());
			}
		};

		let mut helper = self.factory.create();

		for entry in &entries {
			let mut matched_context: Option<&HelperContext> = None;
			let mut group_modified = false;

			for (group, group_context) in &self.groups {
				match group.is_member(client, &entry.dn).await {
					Ok(true) => {
						matched_context = Some(group_context);
						match group.modified_since(client, previous_run).await {
							Ok(modified) => group_modified = modified,
							Err(err) => {
								error!(controller = %self.name, "group modifyTimestamp lookup failed: {err}");
								failed = true;
								// Can't tell; be conservative, as the spec directs for a
								// zero-row group search.
								group_modified = true;
							}
						}
						break;
					}
					Ok(false) => continue,
					Err(err) => {
						error!(controller = %self.name, "group membership check failed: {err}");
						failed = true;
						continue;
					}
				}
			}

			let context = match matched_context {
				Some(context) => context,
				None if self.require_group => {
					debug!(
						dn = %entry.dn,
						controller = %self.name,
						"matched zero groups and requireGroup is enabled",
					);
					continue;
				}
				None => &self.default_context,
			};

			let entry_modified = match entry.mod_time() {
				Ok(Some(mod_time)) => mod_time >= previous_run,
				Ok(None) => true,
				Err(_) => {
					error!(dn = %entry.dn, controller = %self.name, "malformed modifyTimestamp; skipping entry");
					continue;
				}
			};

			if let Err(err) = helper.work(context, entry, entry_modified || group_modified).await {
				if err.is_recoverable() {
					error!(controller = %self.name, "helper invocation failed: {err}");
					failed = true;
				} else {
					return Err(err);
				}
			}
		}

		if let Err(err) = helper.finish().await {
			if err.is_recoverable() {
				error!(controller = %self.name, "helper finish invocation failed: {err}");
				failed = true;
			} else {
				return Err(err);
			}
		}

		// Use the captured start time, not the current time: modifications
		// occurring between when the search started and when the batch
		// finished must still be picked up by the next tick.
		if !failed {
			*self.last_run_started_at.lock().await = start_time;
		}

		Ok(())
	}
}

impl fmt::Debug for HelperController {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HelperController")
			.field("name", &self.name)
			.field("interval_secs", &self.interval_secs)
			.field("search_base", &self.search_base)
			.field("search_filter", &self.search_filter)
			.field("require_group", &self.require_group)
			.field("groups", &self.groups.len())
			.finish_non_exhaustive()
	}
}
