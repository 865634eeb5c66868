//! The conversion pipeline: chunked row emission and the per-file loop.
//!
//! [`convert_source`] drives one input file through schema handling, stream
//! framing, and the row loop. [`run_files`] is the outer loop the CLI uses:
//! it sniffs inputs, derives output and table names, and keeps going on
//! per-file failures.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{RunConfig, RunState};
use crate::emit::{emit_add, emit_cell, emit_random, emit_serial, Cursor};
use crate::error::{Error, Result};
use crate::hdu::{is_fits, is_gzip, FitsFile, Table};
use crate::schema::{
    build_output_schema, read_input_schema, validate_schema, ColumnType, InputSchema,
    OutputColumn,
};
use crate::stream::{
    write_create_table, write_delimited_header, write_ipac_header, write_statement_header,
    write_trailer, BundlePos, OutputFormat,
};

/// Context shared by every file feeding one run.
#[derive(Debug, Default)]
pub struct StreamContext {
    /// Input schema read from the stream's defining file.
    pub schema: Option<InputSchema>,
    /// Resolved database table name.
    pub table_name: Option<String>,
}

/// Derive a database table name from an input file name: the basename up to
/// the first `.`, with `-` rewritten to `_`.
pub fn make_table_name(path: &str) -> String {
    let base = Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    let stem = base.split('.').next().unwrap_or(base);
    stem.replace('-', "_")
}

/// The output path for input `index` of `nfiles`, or `None` for stdout.
pub fn output_path(cfg: &RunConfig, input: &str, index: usize, nfiles: usize) -> Option<PathBuf> {
    let ext = cfg.format.extension(cfg.delimiter);

    if nfiles == 1 || cfg.concat {
        return match cfg.output.as_deref() {
            None | Some("-") | Some("stdout") => None,
            Some(name) => Some(PathBuf::from(name)),
        };
    }

    let ndigits = (nfiles as f64).log10() as usize + 1;
    match cfg.output.as_deref() {
        Some(base) => Some(PathBuf::from(format!("{base}{index:0ndigits$}.{ext}"))),
        None => Some(Path::new(input).with_extension(ext)),
    }
}

fn select_table<'a>(fits: &'a FitsFile, cfg: &RunConfig) -> Result<Table<'a>> {
    if let Some(n) = cfg.extnum {
        fits.table_by_index(n)
    } else if let Some(name) = &cfg.extname {
        fits.table_by_name(name)
    } else {
        fits.first_table()
    }
}

fn dump_schema(schema: &InputSchema, outcols: &[OutputColumn]) {
    eprintln!("Input Columns [{}]:", schema.len());
    for col in schema {
        eprintln!(
            "  {}  '{}'  {} rep={} nr={} nc={} units='{}'",
            col.colnum,
            col.name,
            col.col_type.code(),
            col.repeat,
            col.nrows,
            col.ncols,
            col.units
        );
    }
    eprintln!("Output Columns [{}]:", outcols.len());
    for (i, col) in outcols.iter().enumerate() {
        eprintln!("  {}  {:<24}  '{}'", i + 1, col.name, col.type_name);
    }
}

/// Binary mode only applies to PostgreSQL output and is vetoed for schemas
/// with non-string array columns.
fn effective_binary(cfg: &RunConfig, state: &mut RunState, schema: &InputSchema) -> bool {
    if !cfg.do_binary || cfg.format != OutputFormat::Postgres {
        return false;
    }
    if !state.binary_vetoed
        && schema
            .iter()
            .any(|c| c.col_type != ColumnType::Ascii && c.repeat > 1)
    {
        eprintln!("Warning: binary mode not supported for array columns, disabling");
        state.binary_vetoed = true;
    }
    !state.binary_vetoed
}

/// Convert one parsed FITS source into the output stream.
///
/// Returns `Ok(false)` when the file was skipped because its schema does not
/// match the stream's schema.
pub fn convert_source(
    fits: &FitsFile,
    source_name: &str,
    out: &mut dyn Write,
    cfg: &RunConfig,
    state: &mut RunState,
    pos: BundlePos,
    ctx: &mut StreamContext,
) -> Result<bool> {
    let table = select_table(fits, cfg)?;

    if pos.first_of_stream() || ctx.schema.is_none() {
        ctx.schema = Some(read_input_schema(&table, cfg)?);
    } else if let Some(schema) = &ctx.schema {
        if !validate_schema(&table, schema, cfg) {
            eprintln!("Skipping unmatching table '{source_name}'");
            return Ok(false);
        }
    }
    if ctx.table_name.is_none() {
        ctx.table_name = Some(
            cfg.table_name
                .clone()
                .unwrap_or_else(|| make_table_name(source_name)),
        );
    }

    let schema = ctx.schema.as_ref().ok_or(Error::NotATable)?;
    let table_name = ctx.table_name.clone().unwrap_or_default();
    let binary = effective_binary(cfg, state, schema);
    let outcols = build_output_schema(schema, cfg);

    if cfg.debug {
        dump_schema(schema, &outcols);
    }

    if pos.first_of_stream() {
        match cfg.format {
            OutputFormat::Delimited => {
                if cfg.header {
                    write_delimited_header(out, &outcols)?;
                }
            }
            OutputFormat::Ipac => write_ipac_header(out, &outcols)?,
            _ => {}
        }
    }

    if pos.statement_start() && cfg.format.is_sql() {
        if cfg.do_create {
            write_create_table(out, cfg, &table_name, &outcols)?;
        }
        if cfg.do_truncate {
            writeln!(out, "TRUNCATE TABLE {table_name};")?;
        }
    }

    if !cfg.do_load {
        out.flush()?;
        return Ok(true);
    }

    let per_row_insert = cfg.single && cfg.format.is_insert_sql();
    if pos.statement_start() && !per_row_insert {
        write_statement_header(out, cfg, &table_name, &outcols, binary)?;
    }

    let col_list = outcols
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let emitter = RowEmitter {
        cfg,
        state,
        pos,
        schema,
        ncols_out: outcols.len(),
        col_list,
        table_name: &table_name,
        binary,
    };
    write_rows(&table, out, emitter)?;

    if pos.statement_end() && !per_row_insert {
        write_trailer(out, cfg, binary)?;
    }
    out.flush()?;
    Ok(true)
}

/// Everything a row needs besides its bytes: options, run state, schema, and
/// the stream position for the inter-tuple comma rule.
struct RowEmitter<'a> {
    cfg: &'a RunConfig,
    state: &'a mut RunState,
    pos: BundlePos,
    schema: &'a InputSchema,
    ncols_out: usize,
    col_list: String,
    table_name: &'a str,
    binary: bool,
}

impl RowEmitter<'_> {
    fn per_row_insert(&self) -> bool {
        self.cfg.single && self.cfg.format.is_insert_sql()
    }

    fn write_row(&mut self, row: &mut [u8], out: &mut Vec<u8>, last_of_table: bool) -> Result<()> {
        let cfg = self.cfg;

        if self.binary {
            out.extend_from_slice(&(self.ncols_out as i16).to_be_bytes());
        } else {
            if self.per_row_insert() {
                out.extend_from_slice(
                    format!("INSERT INTO {} ({}) VALUES ", self.table_name, self.col_list)
                        .as_bytes(),
                );
            }
            if cfg.format == OutputFormat::Ipac {
                out.push(b'|');
            }
            if cfg.format.is_insert_sql() {
                out.push(b'(');
            }
        }

        let mut cur = Cursor::new(row);
        for (i, col) in self.schema.iter().enumerate() {
            emit_cell(&mut cur, col, cfg, out, self.binary)?;
            if !self.binary && i + 1 < self.schema.len() {
                out.push(cfg.delimiter);
            }
        }

        if cfg.add_name.is_some() {
            if !self.binary {
                out.push(cfg.delimiter);
            }
            emit_add(out, self.binary);
        }
        if cfg.sid_name.is_some() {
            if !self.binary {
                out.push(cfg.delimiter);
            }
            emit_serial(out, self.state, self.binary);
        }
        if cfg.rid_name.is_some() {
            if !self.binary {
                out.push(cfg.delimiter);
            }
            emit_random(out, self.state, self.binary);
        }

        if !self.binary {
            if cfg.format == OutputFormat::Ipac {
                out.push(b'|');
            }
            if cfg.format.is_insert_sql() {
                out.push(b')');
                if self.per_row_insert() {
                    out.push(b';');
                } else if !(last_of_table && self.pos.statement_end()) {
                    out.push(b',');
                }
            }
            out.push(b'\n');
        }
        Ok(())
    }
}

fn write_rows(table: &Table, out: &mut dyn Write, mut emitter: RowEmitter<'_>) -> Result<()> {
    let nrows = table.naxis2;
    let naxis1 = table.naxis1;
    if nrows == 0 || naxis1 == 0 {
        return Ok(());
    }

    let chunk = emitter
        .cfg
        .chunk_size
        .unwrap_or_else(|| table.optimal_row_chunk())
        .clamp(1, nrows);

    let mut row_buf: Vec<u8> = Vec::new();
    let mut out_buf: Vec<u8> = Vec::with_capacity(chunk * naxis1 * 2);
    let mut first_row = 1usize;

    while first_row <= nrows {
        let nelem = chunk.min(nrows - first_row + 1);
        table.read_rows_into(first_row, nelem, &mut row_buf)?;
        if emitter.cfg.debug {
            eprintln!(
                "chunk: firstrow={first_row} nelem={nelem} nbytes={}",
                nelem * naxis1
            );
        }

        out_buf.clear();
        for r in 0..nelem {
            let row = &mut row_buf[r * naxis1..(r + 1) * naxis1];
            let last_of_table = first_row + r == nrows;
            emitter.write_row(row, &mut out_buf, last_of_table)?;
        }
        out.write_all(&out_buf)?;
        out.flush()?;

        first_row += nelem;
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        None => Ok(Box::new(io::stdout())),
        Some(p) => {
            let file = File::create(p).map_err(|e| {
                Error::OutputOpen(p.display().to_string(), e)
            })?;
            Ok(Box::new(file))
        }
    }
}

/// Process every input file of a run with fresh run state.
pub fn run_files(cfg: &RunConfig, inputs: &[String]) -> Result<()> {
    let mut state = RunState::new();
    run_files_with_state(cfg, inputs, &mut state)
}

/// Process every input file of a run.
///
/// Per-file failures (unreadable input, non-FITS input, schema mismatch,
/// reader errors) are reported on stderr and the run continues; an output
/// that cannot be opened aborts the run.
pub fn run_files_with_state(
    cfg: &RunConfig,
    inputs: &[String],
    state: &mut RunState,
) -> Result<()> {
    if inputs.is_empty() {
        return Ok(());
    }
    let nfiles = inputs.len();
    let mut ctx = StreamContext::default();

    let mut shared: Option<Box<dyn Write>> = if nfiles == 1 || cfg.concat {
        Some(open_output(output_path(cfg, &inputs[0], 0, nfiles).as_deref())?)
    } else {
        None
    };

    for (i, input) in inputs.iter().enumerate() {
        let pos = BundlePos::new(i, nfiles, cfg);

        let bytes = match std::fs::read(input) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Error: Cannot access file '{input}': {e}");
                continue;
            }
        };
        if !is_fits(&bytes) && !is_gzip(&bytes) {
            eprintln!("Error: Skipping non-FITS file '{input}'.");
            continue;
        }
        if cfg.verbose {
            eprintln!("Processing file: {input}");
        }

        let fits = match FitsFile::from_bytes(bytes) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: cannot parse '{input}': {e}");
                continue;
            }
        };

        let result = match shared.as_mut() {
            Some(w) => convert_source(&fits, input, w, cfg, state, pos, &mut ctx),
            None => {
                let path = output_path(cfg, input, i, nfiles);
                let mut w = open_output(path.as_deref())?;
                convert_source(&fits, input, &mut w, cfg, state, pos, &mut ctx)
            }
        };

        if let Err(e) = result {
            eprintln!("Error: processing '{input}' failed: {e}");
        }
    }

    if let Some(w) = shared.as_mut() {
        w.flush()?;
    }
    Ok(())
}
