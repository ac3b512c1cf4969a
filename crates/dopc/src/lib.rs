//! # dopc - deployment plan validation
//!
//! `dopc` turns a deployment plan (infrastructures, nodes, steps, credentials, hooks and
//! configuration) into a validated, cross-referenced object graph. Provisioning, talking to cloud
//! APIs and storing plans is left to the consumers of that graph.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `dopc` works internally.
//!
//! ### Plan documents
//!
//! A plan looks like this:
//! ```yaml
//! name: webshop
//! infrastructures:
//!   rhev:
//!     type: ovirt
//!     networks:
//!       management: {ip_pool: {from: 10.0.0.10, to: 10.0.0.99}}
//! nodes:
//!   'web{i}.example.com':
//!     range: '1..3'
//!     infrastructure: rhev
//!     image: rhel7
//!     infrastructure_properties: {datacenter: dc1, cluster: cl1}
//!     interfaces:
//!       eth0: {network: management}
//! steps:
//!   - name: install
//!     roles: web
//!     command: puppet_agent_run
//! ```
//!
//! ### Loading
//!
//! Documents are read with [document::load_file] (yaml, json or hcl) and converted into a
//! [value::Value]. Keys are accessed indifferently, `name` and `:name` are the same key.
//!
//! ### Lazy attributes
//!
//! Nothing is validated up front. Every entity keeps the raw value it was built from and one
//! [lazy::Memo] per attribute. The first access of an attribute
//!
//! 1. checks whether the field is absent (the default is used), present and well formed, or
//!    invalid
//! 2. builds the attribute from the raw field if it is present
//!
//! and the outcome, value or error, is kept for good. Errors are [error::PlanParsingError]s naming
//! the entity, the field and the violated constraint.
//!
//! ### Cross references
//!
//! Entities depend on each other: credentials, infrastructures, nodes.
//! An infrastructure gets the parsed credentials, a node gets the parsed infrastructures. What a
//! node may declare depends on the [provider::Capability]s of its infrastructure's provider, for
//! example only bare metal nodes may omit their `image`.
//!
//! ### Inflation
//!
//! A node whose name contains `{i}` declares a series of nodes, see [node::Node::inflate].
//! [plan::Plan::nodes] only ever returns inflated nodes.
//!
//! ### Validation
//!
//! [error::Validate::validate] walks an entity and its children and collects every issue in
//! [error::Diagnostics] instead of stopping at the first one. When a part of the plan can't be
//! built, its error is wrapped in a context error (`Plan: can't validate the nodes part because of
//! a previous error`) with the original cause as source.
//!
//! ### Lookup
//!
//! [backend::PlanLookup] maps a node name to the plan deploying it and resolves configuration keys
//! for it, see [configuration::Configuration::lookup].
//!
pub mod backend;
pub mod configuration;
pub mod credential;
pub mod document;
pub mod error;
pub mod hooks;
pub mod infrastructure;
pub mod lazy;
pub mod node;
pub mod plan;
pub mod provider;
pub mod step;
mod util;
pub mod value;

pub use error::{Diagnostics, PlanParsingError, Validate};
pub use plan::Plan;
