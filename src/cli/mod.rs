//! Development harness CLI layer.
//!
//! A thin `clap`-derive binary for exercising the library during
//! development: load a config, ingest documents, register SQLite
//! databases, and run one query end to end against the reference
//! in-memory backends. Not a product front-end, and it defines no wire
//! protocol of its own.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
