//! HUD Protocol - wire formats for the Claude HUD
//!
//! This crate decodes the newline-delimited JSON event stream written by
//! the host's hook scripts and the session handover file that tells the HUD
//! which pipe to follow.

pub mod handover;
pub mod parse;
pub mod version;

pub use handover::{refresh_file_name, HandoverError, SessionTarget};
pub use parse::{
    parse_event, parse_event_result, EventParseError, ParseFailure, ParsedEvent, SchemaWarning,
};
pub use version::SchemaVersion;
