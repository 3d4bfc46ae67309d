//! Subcommand implementations.

pub mod init;
pub mod nuke;
pub mod status;
pub mod sync;
