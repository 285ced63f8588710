//! Scheduling, dispatch, and plugin-contract core of a periodic LDAP
//! distribution daemon.
//!
//! A [`daemon::DaemonContext`] owns a set of named
//! [`controller::HelperController`]s, each pairing one LDAP search with a
//! registered [`helper::Helper`] implementation and an ordered list of
//! [`group::GroupFilter`] overrides. On every tick a controller searches,
//! walks its group list to pick a context per entry, computes whether the
//! entry counts as "modified" since the controller's last successful run,
//! and dispatches to the helper — batching a `finish()` call once the tick
//! completes.
//!
//! Helper implementations are not discovered by reflection: embedders
//! populate a [`registry::HelperRegistry`] explicitly at startup, mapping a
//! string id to a constructor.
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::collections::HashMap;
//!
//! use splatd_core::{
//! 	client::Client,
//! 	config::ConnectionConfig,
//! 	controller::HelperController,
//! 	daemon::DaemonContext,
//! 	registry::HelperRegistry,
//! };
//! use url::Url;
//!
//! let url = Url::parse("ldaps://directory.example.com")?;
//! let client = Client::connect(&url, &ConnectionConfig::default()).await?;
//!
//! let mut registry = HelperRegistry::new();
//! // registry.register_fn("ssh_public_key", || Box::new(MyHelper::default()));
//!
//! let controller = HelperController::new(
//! 	"ssh keys",
//! 	&registry,
//! 	"ssh_public_key",
//! 	300,
//! 	"ou=people,dc=example,dc=com",
//! 	"(objectClass=inetOrgPerson)",
//! 	false,
//! 	&HashMap::new(),
//! )?;
//!
//! let mut daemon = DaemonContext::new(client);
//! daemon.add_helper(controller).await;
//! let daemon = std::sync::Arc::new(daemon);
//! let completion = daemon.start().await;
//! completion.await??;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * No per-tick timeout: a stuck LDAP call blocks cancellation until the
//!   transport itself times out. Layering a deadline on each operation is
//!   left to embedders.
//! * No persistent-search or content-synchronization control support; each
//!   tick is a plain search.
//! * Helper bodies (the actual side effects — writing SSH keys, mail
//!   aliases, and so on) are outside this crate; only the scheduling,
//!   dispatch, and contract they're invoked through live here.

pub mod client;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod entry;
pub mod error;
pub mod group;
pub mod helper;
pub mod registry;

pub use ldap3::{self, SearchEntry};

pub use crate::{
	client::{Client, DirectoryClient},
	config::{ConnectionConfig, GroupFilterConfig, HelperControllerConfig, Scope},
	controller::HelperController,
	daemon::DaemonContext,
	entry::{Change, ChangeKind, Entry, ModValue, Modification},
	error::Error,
	group::GroupFilter,
	helper::{Attributes, Helper, HelperContext, HelperFactory},
	registry::HelperRegistry,
};
