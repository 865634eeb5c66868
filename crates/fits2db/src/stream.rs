//! Output stream framing.
//!
//! Everything that surrounds the row data lives here: the output format and
//! its file extension, the bundle position state machine that decides when a
//! SQL ingest statement opens and closes, and the preamble/trailer writers
//! for each format.

use std::io::Write;

use crate::config::RunConfig;
use crate::error::Result;
use crate::schema::OutputColumn;

/// The PostgreSQL binary COPY stream signature.
pub const PGCOPY_SIGNATURE: &[u8; 11] = b"PGCOPY\n\xff\r\n\0";

/// Target output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Delimiter-separated text (CSV/TSV/BSV/ASV).
    Delimited,
    /// IPAC fixed-width table.
    Ipac,
    /// PostgreSQL `COPY` statements (text or binary).
    Postgres,
    /// MySQL `INSERT` statements.
    Mysql,
    /// SQLite `INSERT` statements.
    Sqlite,
}

impl OutputFormat {
    /// Returns `true` for the SQL dialects.
    pub fn is_sql(self) -> bool {
        matches!(
            self,
            OutputFormat::Postgres | OutputFormat::Mysql | OutputFormat::Sqlite
        )
    }

    /// Returns `true` for the `INSERT`-statement dialects.
    pub fn is_insert_sql(self) -> bool {
        matches!(self, OutputFormat::Mysql | OutputFormat::Sqlite)
    }

    /// The output filename extension for this format and delimiter.
    pub fn extension(self, delimiter: u8) -> &'static str {
        match self {
            OutputFormat::Delimited => match delimiter {
                b' ' => "asv",
                b'|' => "bsv",
                b',' => "csv",
                b'\t' => "tsv",
                _ => "fmt",
            },
            OutputFormat::Ipac => "ipac",
            OutputFormat::Postgres | OutputFormat::Mysql | OutputFormat::Sqlite => "sql",
        }
    }
}

/// The position of one input file within a bundled, possibly concatenated run.
///
/// A "statement" is the span of files whose rows feed a single SQL ingest
/// statement: the whole run when concatenating, otherwise `bundle`
/// consecutive files (the final bundle may be short).
#[derive(Debug, Clone, Copy)]
pub struct BundlePos {
    /// Index of this file within the run (0-based).
    pub filenum: usize,
    /// Index of this file within its bundle (0-based).
    pub bnum: usize,
    /// Total number of input files.
    pub nfiles: usize,
    /// Configured bundle size.
    pub bundle: usize,
    /// All files are concatenated into one output stream.
    pub concat: bool,
}

impl BundlePos {
    /// Position of file `filenum` of `nfiles` under the given options.
    pub fn new(filenum: usize, nfiles: usize, cfg: &RunConfig) -> BundlePos {
        let bundle = cfg.bundle.max(1);
        BundlePos {
            filenum,
            bnum: filenum % bundle,
            nfiles,
            bundle,
            concat: cfg.concat,
        }
    }

    /// Returns `true` when this file opens a new ingest statement.
    pub fn statement_start(&self) -> bool {
        if self.concat {
            self.filenum == 0
        } else {
            self.bnum == 0
        }
    }

    /// Returns `true` when this file closes its ingest statement.
    pub fn statement_end(&self) -> bool {
        if self.concat {
            self.filenum == self.nfiles - 1
        } else {
            self.bnum == self.bundle - 1 || self.filenum == self.nfiles - 1
        }
    }

    /// Returns `true` when this file's schema defines the stream (the first
    /// file when concatenating, every file otherwise).
    pub fn first_of_stream(&self) -> bool {
        !self.concat || self.filenum == 0
    }
}

fn column_list(outcols: &[OutputColumn]) -> String {
    outcols
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Write the comma-separated column-name header line for delimited output.
///
/// The separator is always a comma, whatever the cell delimiter is.
pub fn write_delimited_header(out: &mut dyn Write, outcols: &[OutputColumn]) -> Result<()> {
    writeln!(out, "{}", column_list(outcols))?;
    Ok(())
}

/// Write the IPAC names and types rows.
pub fn write_ipac_header(out: &mut dyn Write, outcols: &[OutputColumn]) -> Result<()> {
    let mut line = String::from("|");
    for col in outcols {
        line.push_str(&format!("{:<1$}|", col.name, col.disp_width));
    }
    writeln!(out, "{line}")?;

    let mut line = String::from("|");
    for col in outcols {
        line.push_str(&format!("{:<1$}|", col.type_name, col.disp_width));
    }
    writeln!(out, "{line}")?;
    Ok(())
}

/// Write the `CREATE TABLE` statement (and for MySQL, the optional
/// `CREATE DATABASE`/`USE` pair), plus `DROP TABLE` when requested.
pub fn write_create_table(
    out: &mut dyn Write,
    cfg: &RunConfig,
    table: &str,
    outcols: &[OutputColumn],
) -> Result<()> {
    if cfg.format == OutputFormat::Mysql {
        if let Some(db) = &cfg.dbname {
            writeln!(out, "CREATE DATABASE IF NOT EXISTS {db};")?;
            writeln!(out, "USE {db};")?;
        }
    }

    if cfg.do_drop {
        writeln!(out, "DROP TABLE IF EXISTS {table} CASCADE;")?;
    }

    writeln!(out, "CREATE TABLE IF NOT EXISTS {table} (")?;
    for (i, col) in outcols.iter().enumerate() {
        let sep = if i + 1 < outcols.len() { ",\n" } else { "\n" };
        write!(out, "    {}\t{}{}", col.name, col.type_name, sep)?;
    }
    writeln!(out, ");")?;
    writeln!(out)?;
    Ok(())
}

/// Write the per-statement SQL ingest header: `COPY ... from stdin;` for
/// PostgreSQL (with the binary signature in binary mode) or
/// `INSERT INTO ... VALUES` for MySQL/SQLite.
pub fn write_statement_header(
    out: &mut dyn Write,
    cfg: &RunConfig,
    table: &str,
    outcols: &[OutputColumn],
    binary: bool,
) -> Result<()> {
    match cfg.format {
        OutputFormat::Postgres => {
            if binary {
                writeln!(out, "COPY {table} FROM stdin WITH BINARY;")?;
                out.write_all(PGCOPY_SIGNATURE)?;
                out.write_all(&0_u32.to_be_bytes())?; // flags
                out.write_all(&0_u32.to_be_bytes())?; // header extension length
            } else {
                write!(out, "\nCOPY {table} ({}) from stdin;\n", column_list(outcols))?;
            }
        }
        OutputFormat::Mysql | OutputFormat::Sqlite => {
            write!(out, "\nINSERT INTO {table} ({}) VALUES\n", column_list(outcols))?;
        }
        _ => {}
    }
    Ok(())
}

/// Write the statement trailer: the end-of-data marker for PostgreSQL, the
/// terminating semicolon for MySQL/SQLite, nothing otherwise.
pub fn write_trailer(out: &mut dyn Write, cfg: &RunConfig, binary: bool) -> Result<()> {
    match cfg.format {
        OutputFormat::Postgres => {
            if binary {
                out.write_all(&(-1_i16).to_be_bytes())?;
            } else {
                out.write_all(b"\\.\n")?;
            }
        }
        OutputFormat::Mysql | OutputFormat::Sqlite => {
            out.write_all(b";\n")?;
        }
        _ => {}
    }
    Ok(())
}
