//! hierreg: a registry of hierarchy nodes that reference their parent by id.
//!
//! Parent links live on the nodes; children are derived on demand through a
//! child index that is rebuilt whenever the node collection changes.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
