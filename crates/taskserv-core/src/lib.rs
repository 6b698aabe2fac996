//! # taskserv-core - shared utilities
//!
//! Small building blocks used by every taskserv crate:
//!
//! - [`log`] - leveled stderr logging macros (`terror!` .. `ttrace!`)
//! - [`env`] - typed environment-variable lookups with defaults
//! - [`guard`] - run-on-drop cleanup guard for exit-path safety

pub mod env;
pub mod guard;
pub mod log;

pub use guard::ScopeGuard;
