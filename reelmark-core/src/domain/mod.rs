//! Domain layer entry modules.

pub mod watch;
