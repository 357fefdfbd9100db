//! One handler module per `autopilot` subcommand.

pub mod gate;
pub mod run;
pub mod status;
pub mod stop;
pub mod validate;
