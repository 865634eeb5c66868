//! Convert FITS binary tables into database load streams.
//!
//! The crate reads BINTABLE extensions with [`hdu::FitsFile`], derives a
//! column schema via [`schema`], and serializes every row to one of several
//! target encodings (delimited text, IPAC tables, PostgreSQL `COPY` text or
//! binary, MySQL/SQLite `INSERT` statements) through [`convert::convert_source`].
//! Output is written to a byte stream so conversion and database ingest can
//! run concurrently (`fits2db ... | psql`).
#![warn(missing_docs)]

/// FITS 2880-byte block utilities and constants.
pub mod block;
/// Run configuration and mutable run state (serial counter, PRNG).
pub mod config;
/// Chunked row conversion and the per-file processing loop.
pub mod convert;
/// Host byte-order detection and in-place byte-group swaps.
pub mod endian;
/// Per-type cell encoders for text and PostgreSQL binary output.
pub mod emit;
/// Error types used throughout the crate.
pub mod error;
/// Header card parsing and keyword access.
pub mod header;
/// FITS parsing: HDU discovery, table metadata, raw row reads.
pub mod hdu;
/// Input column schema and derived output schema.
pub mod schema;
/// Output framing: preambles, trailers, and bundle positions.
pub mod stream;

pub use config::{RunConfig, RunState};
pub use error::{Error, Result};
pub use stream::OutputFormat;
