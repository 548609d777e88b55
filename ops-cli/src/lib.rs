//! Operator CLI for ImageVault access control
//!
//! Loads the static access control configuration into an in-memory store and
//! answers the questions the image server would ask it.
//!
//! # Example Usage
//!
//! ```bash
//! # Validate the configuration
//! imagevault-acl --config acl.yaml validate
//!
//! # Would this request be allowed?
//! imagevault-acl --config acl.yaml check acme image.get --user alice
//! imagevault-acl --config acl.yaml check acme accessrules.get --route-public-key acme
//!
//! # Inspect rules, groups and the resource catalog
//! imagevault-acl --config acl.yaml rules acme --expand-groups
//! imagevault-acl --config acl.yaml groups --page 2 --limit 10
//! imagevault-acl resources --preset read-only
//! ```

pub mod cli;
pub mod commands;

pub use cli::*;
pub use commands::*;
