//! Command-line interface
//!
//! - start: boot the state machine and enqueue job requests from stdin
//! - check-config: validate and print a configuration

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, run, run_command, start};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_request, read_requests, write_error, write_json, write_response, JobRequest};
