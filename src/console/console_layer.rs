// Console layer - a line-based frontend over the core services.
//
// Each stdin line is `<user_id> <command> [args...]`. This layer only
// translates text to service calls and results back to text.

#[path = "commands/command_catalog.rs"]
pub mod commands;

pub mod announcements;

pub use commands::{dispatch, Data, Error};
