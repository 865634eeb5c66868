//! Run configuration and mutable run state.
//!
//! All option flags are collected once into an immutable [`RunConfig`] that
//! the conversion pipeline borrows. The few values that change while a run is
//! in flight (the process-wide serial counter, the PRNG for random-id
//! columns, and the binary-mode veto) live in [`RunState`].

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stream::OutputFormat;

/// Scale applied to random-id values: uniform in `[0, RANDOM_SCALE)`.
pub const RANDOM_SCALE: f32 = 100.0;

/// Immutable options for one conversion run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target output format.
    pub format: OutputFormat,
    /// Cell delimiter for text output.
    pub delimiter: u8,
    /// Quote character for string cells.
    pub quote_char: u8,
    /// Quote string cells in text formats.
    pub do_quote: bool,
    /// Quote string cells and double embedded quote characters.
    pub do_escape: bool,
    /// Strip leading/trailing spaces from string cells.
    pub do_strip: bool,
    /// Emit the PostgreSQL binary COPY stream.
    pub do_binary: bool,
    /// Emit `DROP TABLE` before creating.
    pub do_drop: bool,
    /// Emit `CREATE TABLE` from the input schema.
    pub do_create: bool,
    /// Emit `TRUNCATE TABLE` before loading.
    pub do_truncate: bool,
    /// Emit row data (disabled by `--noload`).
    pub do_load: bool,
    /// Accepted for compatibility; table OIDs are never requested.
    pub do_oids: bool,
    /// Prepend the column-name header row (delimited output).
    pub header: bool,
    /// Expand array columns into one output column per element.
    pub explode: bool,
    /// Concatenate all input files into a single output stream.
    pub concat: bool,
    /// Emit one `INSERT` statement per row (MySQL/SQLite).
    pub single: bool,
    /// Number of consecutive files per SQL ingest statement.
    pub bundle: usize,
    /// Override for the per-chunk row count.
    pub chunk_size: Option<usize>,
    /// Output path; `-` or absence selects stdout for single-stream runs.
    pub output: Option<String>,
    /// Database table name; derived from the file name when absent.
    pub table_name: Option<String>,
    /// Database name (MySQL `CREATE DATABASE`).
    pub dbname: Option<String>,
    /// Name of the serial-id output column.
    pub sid_name: Option<String>,
    /// Name of the random-id output column.
    pub rid_name: Option<String>,
    /// Name of the constant-value output column.
    pub add_name: Option<String>,
    /// Extension number to convert (0 = primary).
    pub extnum: Option<usize>,
    /// Extension name to convert.
    pub extname: Option<String>,
    /// Print per-file progress on stderr.
    pub verbose: bool,
    /// Print option and schema dumps on stderr.
    pub debug: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            format: OutputFormat::Delimited,
            delimiter: b',',
            quote_char: b'"',
            do_quote: true,
            do_escape: false,
            do_strip: true,
            do_binary: false,
            do_drop: false,
            do_create: false,
            do_truncate: false,
            do_load: true,
            do_oids: false,
            header: true,
            explode: false,
            concat: false,
            single: false,
            bundle: 1,
            chunk_size: None,
            output: None,
            table_name: None,
            dbname: None,
            sid_name: None,
            rid_name: None,
            add_name: None,
            extnum: None,
            extname: None,
            verbose: false,
            debug: false,
        }
    }
}

impl RunConfig {
    /// Returns `true` when any synthetic column is configured.
    pub fn has_synthetic_columns(&self) -> bool {
        self.add_name.is_some() || self.sid_name.is_some() || self.rid_name.is_some()
    }
}

/// Mutable state shared across every file of a run.
#[derive(Debug)]
pub struct RunState {
    /// Serial-id counter; never resets during a run.
    pub serial: u32,
    /// Binary mode was vetoed because the schema contains array columns.
    pub binary_vetoed: bool,
    rng: StdRng,
}

impl RunState {
    /// State for a fresh run, with the PRNG seeded from wall-clock time.
    pub fn new() -> RunState {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        RunState::with_seed(seed)
    }

    /// State with a fixed PRNG seed, for deterministic output.
    pub fn with_seed(seed: u64) -> RunState {
        RunState {
            serial: 0,
            binary_vetoed: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The next serial-id value; increments the run-wide counter.
    pub fn next_serial(&mut self) -> u32 {
        let n = self.serial;
        self.serial += 1;
        n
    }

    /// A uniform random value in `[0, 100)`.
    pub fn next_random(&mut self) -> f32 {
        self.rng.gen::<f32>() * RANDOM_SCALE
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::new()
    }
}
