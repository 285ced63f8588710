#![allow(
	clippy::dbg_macro,
	clippy::expect_used,
	clippy::missing_docs_in_private_items,
	clippy::print_stderr,
	clippy::print_stdout,
	clippy::unwrap_used
)]

mod common;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use common::{
	ldap_add_group, ldap_add_organizational_unit, ldap_add_user, ldap_connect,
	ldap_delete_organizational_unit, ldap_delete_user, ldap_user_add_attribute,
};
use serial_test::serial;
use splatd_core::{
	client::{Client, DirectoryClient},
	config::ConnectionConfig,
	controller::HelperController,
	entry::Entry,
	error::Error,
	group::GroupFilter,
	helper::{Attributes, Helper, HelperContext},
	registry::HelperRegistry,
};
use tokio::sync::Mutex;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use url::Url;

/// Records every dn it's invoked on, along with the `modified` flag the
/// controller computed for it.
#[derive(Default)]
struct RecordingHelper {
	seen: Arc<Mutex<Vec<(String, bool)>>>,
}

#[async_trait]
impl Helper for RecordingHelper {
	fn attributes(&self) -> Attributes {
		Attributes::Named(vec!["cn".to_owned()])
	}

	fn parse_options(&self, _options: &HashMap<String, String>) -> Result<HelperContext, Error> {
		Ok(Arc::new(()))
	}

	async fn work(&mut self, _context: &HelperContext, entry: &Entry, modified: bool) -> Result<(), Error> {
		self.seen.lock().await.push((entry.dn.clone(), modified));
		Ok(())
	}
}

#[ignore = "docker"]
#[tokio::test]
#[serial]
async fn first_tick_dispatches_every_entry_as_modified() {
	let tracing_filter = EnvFilter::default().add_directive(LevelFilter::DEBUG.into());
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_filter).try_init();

	let mut admin = ldap_connect().await.expect("connect as admin");
	ldap_add_organizational_unit(&mut admin, "users").await.expect("create ou=users");
	ldap_add_user(&mut admin, "skarl", "Skarl").await.expect("create user");

	let seen = Arc::new(Mutex::new(Vec::new()));
	let mut registry = HelperRegistry::new();
	let seen_for_factory = Arc::clone(&seen);
	registry.register_fn("recording", move || {
		Box::new(RecordingHelper { seen: Arc::clone(&seen_for_factory) })
	});

	let controller = HelperController::new(
		"first sync",
		&registry,
		"recording",
		0,
		"ou=users,dc=example,dc=org",
		"(objectClass=inetOrgPerson)",
		false,
		&HashMap::new(),
	)
	.expect("controller construction");

	let url = Url::parse("ldap://localhost:1389").unwrap();
	let client = Client::connect(&url, &ConnectionConfig::default()).await.expect("connect client");
	client.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await.expect("bind");

	controller.work(&client).await.expect("first tick");

	let seen = seen.lock().await;
	assert_eq!(seen.len(), 1);
	assert!(seen[0].0.starts_with("cn=skarl,"));
	assert!(seen[0].1, "every entry is modified on the first tick");
	drop(seen);

	ldap_delete_user(&mut admin, "skarl").await.expect("cleanup user");
	ldap_delete_organizational_unit(&mut admin, "users").await.expect("cleanup ou=users");
}

#[ignore = "docker"]
#[tokio::test]
#[serial]
async fn group_override_selects_context_by_membership() {
	let mut admin = ldap_connect().await.expect("connect as admin");
	ldap_add_organizational_unit(&mut admin, "users").await.expect("create ou=users");
	ldap_add_organizational_unit(&mut admin, "groups").await.expect("create ou=groups");
	ldap_add_user(&mut admin, "alice", "Alice").await.expect("create alice");
	ldap_add_group(&mut admin, "admins", &["alice"]).await.expect("create admins group");

	let url = Url::parse("ldap://localhost:1389").unwrap();
	let client = Client::connect(&url, &ConnectionConfig::default()).await.expect("connect client");
	client.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await.expect("bind");

	let filter = GroupFilter::new(
		"ou=groups,dc=example,dc=org",
		splatd_core::Scope::Subtree,
		"(cn=admins)",
	);
	assert!(filter.is_member(&client, "cn=alice,ou=users,dc=example,dc=org").await.expect("membership check"));

	ldap_delete_user(&mut admin, "alice").await.expect("cleanup alice");
	ldap_delete_organizational_unit(&mut admin, "groups").await.expect("cleanup ou=groups");
	ldap_delete_organizational_unit(&mut admin, "users").await.expect("cleanup ou=users");
}

#[ignore = "docker"]
#[tokio::test]
#[serial]
async fn modification_between_ticks_is_reported_by_a_live_server() {
	let mut admin = ldap_connect().await.expect("connect as admin");
	ldap_add_organizational_unit(&mut admin, "users").await.expect("create ou=users");
	ldap_add_user(&mut admin, "bob", "Bob").await.expect("create user");

	let seen = Arc::new(Mutex::new(Vec::new()));
	let mut registry = HelperRegistry::new();
	let seen_for_factory = Arc::clone(&seen);
	registry.register_fn("recording", move || {
		Box::new(RecordingHelper { seen: Arc::clone(&seen_for_factory) })
	});

	let controller = HelperController::new(
		"second sync",
		&registry,
		"recording",
		0,
		"ou=users,dc=example,dc=org",
		"(objectClass=inetOrgPerson)",
		false,
		&HashMap::new(),
	)
	.expect("controller construction");

	let url = Url::parse("ldap://localhost:1389").unwrap();
	let client = Client::connect(&url, &ConnectionConfig::default()).await.expect("connect client");
	client.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await.expect("bind");

	controller.work(&client).await.expect("first tick");
	controller.work(&client).await.expect("second tick, unchanged");

	ldap_user_add_attribute(&mut admin, "bob", "description", "promoted")
		.await
		.expect("bump modifyTimestamp");

	controller.work(&client).await.expect("third tick, after modification");

	let seen = seen.lock().await;
	assert_eq!(seen.len(), 3);
	assert!(seen[0].1, "first tick must mark the entry modified");
	assert!(!seen[1].1, "unchanged entry on second tick must be unmodified");
	assert!(seen[2].1, "entry modified between ticks must be reported as modified");
	drop(seen);

	ldap_delete_user(&mut admin, "bob").await.expect("cleanup user");
	ldap_delete_organizational_unit(&mut admin, "users").await.expect("cleanup ou=users");
}
