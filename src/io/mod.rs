//! I/O module
//!
//! Handles CSV script parsing and wallet output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `async_reader` - Asynchronous CSV reader with batch reading interface

pub mod async_reader;
pub mod csv_format;

pub use async_reader::{AsyncReader, ScriptLine};
pub use csv_format::{convert_script_record, write_wallets_csv, ScriptRecord};
