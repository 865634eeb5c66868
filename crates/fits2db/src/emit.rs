//! Per-cell encoders for text and PostgreSQL binary output.
//!
//! Row bytes arrive big-endian from the FITS file. Text encoders swap each
//! cell to host order in place before formatting; binary encoders pass the
//! big-endian payload straight through behind a 4-byte big-endian length
//! prefix, so the wire is big-endian regardless of host.

use crate::config::{RunConfig, RunState};
use crate::endian::{host_is_swapped, swap2, swap4, swap8};
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnType};
use crate::stream::OutputFormat;

/// A checked, advancing view over one decoded row's bytes.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// A cursor at the start of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    /// Advance past the next `n` bytes and return them mutably.
    pub fn take(&mut self, n: usize) -> Result<&mut [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::UnexpectedEof);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&mut self.buf[start..start + n])
    }

    /// Advance past `n` bytes without touching them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.pos + n > self.buf.len() {
            return Err(Error::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }

    /// Bytes left in the row.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn trim_spaces(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(start, |i| i + 1);
    &bytes[start..end]
}

// --- Binary cell framing ---

/// One length-prefixed field holding the whole (possibly multi-element) payload.
fn binary_packed(out: &mut Vec<u8>, payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    out.extend_from_slice(payload);
}

/// One length-prefixed field per `size`-byte element.
fn binary_exploded(out: &mut Vec<u8>, payload: &[u8], size: usize) {
    for element in payload.chunks_exact(size) {
        out.extend_from_slice(&(size as i32).to_be_bytes());
        out.extend_from_slice(element);
    }
}

fn binary_scalars(out: &mut Vec<u8>, payload: &[u8], size: usize, explode: bool) {
    if explode {
        binary_exploded(out, payload, size);
    } else {
        binary_packed(out, payload);
    }
}

// --- Text formatting helpers ---

fn push_int_text<T: std::fmt::Display>(out: &mut Vec<u8>, cfg: &RunConfig, width: usize, v: T) {
    if cfg.format == OutputFormat::Ipac {
        out.extend_from_slice(format!("{v:>width$}").as_bytes());
    } else {
        out.extend_from_slice(format!("{v}").as_bytes());
    }
}

fn push_float_text(
    out: &mut Vec<u8>,
    cfg: &RunConfig,
    width: usize,
    precision: usize,
    v: f64,
) {
    let s = if v.is_nan() {
        match cfg.format {
            OutputFormat::Mysql | OutputFormat::Sqlite => String::from("'NaN'"),
            OutputFormat::Postgres => String::from("NaN"),
            _ => format!("{v:.precision$}"),
        }
    } else if v.is_infinite() {
        let name = if v > 0.0 { "Infinity" } else { "-Infinity" };
        match cfg.format {
            OutputFormat::Mysql | OutputFormat::Sqlite => format!("'{name}'"),
            OutputFormat::Postgres => String::from(name),
            _ => format!("{v:.precision$}"),
        }
    } else if cfg.format == OutputFormat::Ipac {
        format!("{v:>width$.6}")
    } else {
        format!("{v:.precision$}")
    };
    out.extend_from_slice(s.as_bytes());
}

fn push_element_sep(out: &mut Vec<u8>, cfg: &RunConfig, col: &Column, index: usize) {
    if col.repeat > 1 && index + 1 < col.repeat {
        out.push(cfg.delimiter);
    }
}

// --- Per-type encoders ---

fn emit_string(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.repeat)?;
    // The field is NUL-padded in some writers; treat the first NUL as the end.
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let raw = &bytes[..end];
    let content = if cfg.do_strip { trim_spaces(raw) } else { raw };

    if binary {
        binary_packed(out, content);
        return Ok(());
    }

    if cfg.do_escape {
        out.push(cfg.quote_char);
        for &b in content {
            out.push(b);
            if b == cfg.quote_char {
                out.push(cfg.quote_char);
            }
        }
        out.push(cfg.quote_char);
    } else if cfg.do_quote {
        out.push(cfg.quote_char);
        out.extend_from_slice(content);
        out.push(cfg.quote_char);
    } else {
        out.extend_from_slice(content);
    }
    Ok(())
}

fn emit_logical(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.byte_width())?;

    if binary {
        // PostgreSQL smallint cells: each logical becomes a 2-byte 0/1.
        let mut payload = Vec::with_capacity(bytes.len() * 2);
        for &b in bytes.iter() {
            let v: i16 = if b.eq_ignore_ascii_case(&b'T') { 1 } else { 0 };
            payload.extend_from_slice(&v.to_be_bytes());
        }
        binary_scalars(out, &payload, 2, cfg.explode);
        return Ok(());
    }

    for (k, &b) in bytes.iter().enumerate() {
        let v: i16 = if b.eq_ignore_ascii_case(&b'T') { 1 } else { 0 };
        push_int_text(out, cfg, col.disp_width, v);
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

fn emit_byte(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let signed = col.col_type == ColumnType::SByte;
    let bytes = cur.take(col.byte_width())?;

    if binary {
        // Bytes widen to smallint on the wire.
        let mut payload = Vec::with_capacity(bytes.len() * 2);
        for &b in bytes.iter() {
            let v: i16 = if signed { (b as i8) as i16 } else { b as i16 };
            payload.extend_from_slice(&v.to_be_bytes());
        }
        binary_scalars(out, &payload, 2, cfg.explode);
        return Ok(());
    }

    for (k, &b) in bytes.iter().enumerate() {
        if signed {
            push_int_text(out, cfg, col.disp_width, b as i8);
        } else {
            push_int_text(out, cfg, col.disp_width, b);
        }
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

fn emit_short(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.byte_width())?;

    if binary {
        binary_scalars(out, bytes, 2, cfg.explode);
        return Ok(());
    }

    if host_is_swapped() {
        swap2(bytes);
    }
    for (k, chunk) in bytes.chunks_exact(2).enumerate() {
        let raw = [chunk[0], chunk[1]];
        if col.col_type == ColumnType::UShort {
            push_int_text(out, cfg, col.disp_width, u16::from_ne_bytes(raw));
        } else {
            push_int_text(out, cfg, col.disp_width, i16::from_ne_bytes(raw));
        }
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

fn emit_int(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.byte_width())?;

    if binary {
        binary_scalars(out, bytes, 4, cfg.explode);
        return Ok(());
    }

    if host_is_swapped() {
        swap4(bytes);
    }
    for (k, chunk) in bytes.chunks_exact(4).enumerate() {
        let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
        if col.col_type == ColumnType::UInt {
            push_int_text(out, cfg, col.disp_width, u32::from_ne_bytes(raw));
        } else {
            push_int_text(out, cfg, col.disp_width, i32::from_ne_bytes(raw));
        }
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

fn emit_long(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.byte_width())?;

    if binary {
        binary_scalars(out, bytes, 8, cfg.explode);
        return Ok(());
    }

    if host_is_swapped() {
        swap8(bytes);
    }
    for (k, chunk) in bytes.chunks_exact(8).enumerate() {
        let raw = [
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ];
        push_int_text(out, cfg, col.disp_width, i64::from_ne_bytes(raw));
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

fn emit_float(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.byte_width())?;

    if binary {
        binary_scalars(out, bytes, 4, cfg.explode);
        return Ok(());
    }

    if host_is_swapped() {
        swap4(bytes);
    }
    for (k, chunk) in bytes.chunks_exact(4).enumerate() {
        let v = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        push_float_text(out, cfg, col.disp_width, 6, v as f64);
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

fn emit_double(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    let bytes = cur.take(col.byte_width())?;

    if binary {
        binary_scalars(out, bytes, 8, cfg.explode);
        return Ok(());
    }

    if host_is_swapped() {
        swap8(bytes);
    }
    for (k, chunk) in bytes.chunks_exact(8).enumerate() {
        let v = f64::from_ne_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        push_float_text(out, cfg, col.disp_width, 16, v);
        push_element_sep(out, cfg, col, k);
    }
    Ok(())
}

/// Encode one cell, consuming its bytes from the cursor and appending the
/// encoded form to `out`.
///
/// Unsupported cell types report to stderr and skip their bytes so the rest
/// of the row still parses.
pub fn emit_cell(
    cur: &mut Cursor,
    col: &Column,
    cfg: &RunConfig,
    out: &mut Vec<u8>,
    binary: bool,
) -> Result<()> {
    if !col.col_type.is_supported() {
        eprintln!(
            "Error: Unsupported column type '{}', col[{}]",
            col.col_type.code(),
            col.name
        );
        return cur.skip(col.byte_width());
    }

    let wrap = !binary
        && !cfg.explode
        && col.repeat > 1
        && col.col_type != ColumnType::Ascii;
    if wrap {
        if cfg.format == OutputFormat::Delimited {
            out.push(cfg.quote_char);
            out.push(b'(');
        } else {
            out.push(b'{');
        }
    }

    match col.col_type {
        ColumnType::Ascii => emit_string(cur, col, cfg, out, binary)?,
        ColumnType::Logical => emit_logical(cur, col, cfg, out, binary)?,
        ColumnType::Byte | ColumnType::SByte => emit_byte(cur, col, cfg, out, binary)?,
        ColumnType::Short | ColumnType::UShort => emit_short(cur, col, cfg, out, binary)?,
        ColumnType::Int | ColumnType::UInt => emit_int(cur, col, cfg, out, binary)?,
        ColumnType::Long => emit_long(cur, col, cfg, out, binary)?,
        ColumnType::Float => emit_float(cur, col, cfg, out, binary)?,
        ColumnType::Double => emit_double(cur, col, cfg, out, binary)?,
        _ => unreachable!("unsupported types are skipped above"),
    }

    if wrap {
        if cfg.format == OutputFormat::Delimited {
            out.push(b')');
            out.push(cfg.quote_char);
        } else {
            out.push(b'}');
        }
    }
    Ok(())
}

// --- Synthetic cells ---

/// Encode the constant add-column value (always 1).
pub fn emit_add(out: &mut Vec<u8>, binary: bool) {
    if binary {
        binary_packed(out, &1_i32.to_be_bytes());
    } else {
        out.push(b'1');
    }
}

/// Encode the next serial-id value.
pub fn emit_serial(out: &mut Vec<u8>, state: &mut RunState, binary: bool) {
    let v = state.next_serial();
    if binary {
        binary_packed(out, &(v as i32).to_be_bytes());
    } else {
        out.extend_from_slice(v.to_string().as_bytes());
    }
}

/// Encode the next random-id value.
pub fn emit_random(out: &mut Vec<u8>, state: &mut RunState, binary: bool) {
    let v = state.next_random();
    if binary {
        binary_packed(out, &v.to_be_bytes());
    } else {
        out.extend_from_slice(format!("{v:.6}").as_bytes());
    }
}
