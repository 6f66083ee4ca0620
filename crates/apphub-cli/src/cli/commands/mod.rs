//! CLI command handlers, one file per command.

mod check;
mod checksum;
mod completions;
mod status;
mod update;

pub use check::run_check;
pub use checksum::run_checksum;
pub use completions::{run_completions, run_manpage};
pub use status::run_status;
pub use update::run_update;
