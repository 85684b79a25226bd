//! rdpfwd — firewalld port-forward management for remote desktop hosts
//!
//! A thin client over the firewall daemon: validate operator input, then
//! list, add, or remove forward rules in one zone.

pub mod cli;
pub mod config;
pub mod controller;
pub mod firewall;
pub mod rule;
pub mod shell;
pub mod validate;

pub use controller::{ForwardController, Session};
pub use firewall::{FirewallBackend, FirewallCmd, FirewallError};
pub use rule::ForwardRule;
