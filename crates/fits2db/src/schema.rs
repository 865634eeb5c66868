//! Column schemas: the input schema read from a BINTABLE header and the
//! output schema derived from it.
//!
//! The input schema is built once per output stream and re-validated against
//! every subsequent file feeding the same stream. The output schema expands
//! array columns when exploding, maps FITS types to target-format type
//! spellings, and appends the synthetic (add/serial/random) columns.

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::header::indexed_string;
use crate::hdu::Table;

/// The data type of a column in a FITS binary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// L -- logical, stored as a single byte (T/F/0).
    Logical,
    /// X -- bit array (unsupported).
    Bit,
    /// B -- unsigned byte.
    Byte,
    /// S -- signed byte.
    SByte,
    /// I -- 16-bit signed integer.
    Short,
    /// U -- 16-bit unsigned integer.
    UShort,
    /// J -- 32-bit signed integer.
    Int,
    /// V -- 32-bit unsigned integer.
    UInt,
    /// K -- 64-bit signed integer.
    Long,
    /// E -- 32-bit IEEE float.
    Float,
    /// D -- 64-bit IEEE float.
    Double,
    /// A -- ASCII characters.
    Ascii,
    /// C -- complex: pair of 32-bit IEEE floats (unsupported).
    ComplexFloat,
    /// M -- complex: pair of 64-bit IEEE floats (unsupported).
    ComplexDouble,
    /// P/Q -- variable-length array descriptor (unsupported).
    VarArray,
}

impl ColumnType {
    /// Bytes per single element. `Bit` returns 0; bit columns use
    /// `ceil(repeat / 8)` for their total width instead.
    pub fn scalar_size(self) -> usize {
        match self {
            ColumnType::Logical | ColumnType::Byte | ColumnType::SByte | ColumnType::Ascii => 1,
            ColumnType::Bit => 0,
            ColumnType::Short | ColumnType::UShort => 2,
            ColumnType::Int | ColumnType::UInt | ColumnType::Float => 4,
            ColumnType::Long | ColumnType::Double | ColumnType::ComplexFloat => 8,
            ColumnType::ComplexDouble => 16,
            ColumnType::VarArray => 8,
        }
    }

    /// Returns `true` for the types the converter can emit.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            ColumnType::Bit
                | ColumnType::ComplexFloat
                | ColumnType::ComplexDouble
                | ColumnType::VarArray
        )
    }

    /// The TFORM type code, for diagnostics.
    pub fn code(self) -> char {
        match self {
            ColumnType::Logical => 'L',
            ColumnType::Bit => 'X',
            ColumnType::Byte => 'B',
            ColumnType::SByte => 'S',
            ColumnType::Short => 'I',
            ColumnType::UShort => 'U',
            ColumnType::Int => 'J',
            ColumnType::UInt => 'V',
            ColumnType::Long => 'K',
            ColumnType::Float => 'E',
            ColumnType::Double => 'D',
            ColumnType::Ascii => 'A',
            ColumnType::ComplexFloat => 'C',
            ColumnType::ComplexDouble => 'M',
            ColumnType::VarArray => 'P',
        }
    }
}

/// Parse a TFORMn value like "1J", "10E", "20A", "1PB(200)".
///
/// Returns the repeat count and the column type.
pub fn parse_tform(s: &str) -> Result<(usize, ColumnType)> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidValue);
    }

    // Strip the optional (maxlen) suffix used by variable-length arrays.
    let s = if let Some(paren) = s.find('(') {
        &s[..paren]
    } else {
        s
    };
    if s.is_empty() {
        return Err(Error::InvalidValue);
    }

    // rPt / rQt variable-length array descriptors: the element type code
    // follows the descriptor letter.
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        let second_last = bytes[s.len() - 2];
        if second_last == b'P' || second_last == b'Q' {
            let repeat_str = &s[..s.len() - 2];
            let repeat = if repeat_str.is_empty() {
                1
            } else {
                repeat_str
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidValue)?
            };
            return Ok((repeat, ColumnType::VarArray));
        }
    }

    let type_char = s.as_bytes()[s.len() - 1];
    let repeat_str = &s[..s.len() - 1];

    let repeat = if repeat_str.is_empty() {
        1
    } else {
        repeat_str
            .parse::<usize>()
            .map_err(|_| Error::InvalidValue)?
    };

    let col_type = match type_char {
        b'L' => ColumnType::Logical,
        b'X' => ColumnType::Bit,
        b'B' => ColumnType::Byte,
        b'S' => ColumnType::SByte,
        b'I' => ColumnType::Short,
        b'U' => ColumnType::UShort,
        b'J' => ColumnType::Int,
        b'V' => ColumnType::UInt,
        b'K' => ColumnType::Long,
        b'E' => ColumnType::Float,
        b'D' => ColumnType::Double,
        b'A' => ColumnType::Ascii,
        b'C' => ColumnType::ComplexFloat,
        b'M' => ColumnType::ComplexDouble,
        _ => return Err(Error::InvalidValue),
    };

    Ok((repeat, col_type))
}

/// Parse a 2-D TDIMn value `(r,c)`. One-dimensional shapes return `None`;
/// the column keeps its default `(1, repeat)` layout.
pub fn parse_tdim(s: &str) -> Option<(usize, usize)> {
    let inner = s.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(',');
    let rows = parts.next()?.trim().parse::<usize>().ok()?;
    let cols = parts.next()?.trim().parse::<usize>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((rows, cols))
}

/// Extract the field width from a TDISPn value like "I6", "F8.3", "A10".
fn parse_tdisp_width(s: &str) -> Option<usize> {
    let digits: String = s
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Default display width per column type, used when TDISPn is absent.
fn default_disp_width(col_type: ColumnType, repeat: usize) -> usize {
    match col_type {
        ColumnType::Ascii => repeat,
        ColumnType::Logical => 1,
        ColumnType::Byte | ColumnType::SByte => 4,
        ColumnType::Short | ColumnType::UShort => 6,
        ColumnType::Int | ColumnType::UInt => 11,
        ColumnType::Long => 20,
        ColumnType::Float => 15,
        ColumnType::Double => 23,
        _ => 0,
    }
}

/// One input column as described by the BINTABLE header.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// 1-based column ordinal.
    pub colnum: usize,
    /// Column name (TTYPEn), possibly empty.
    pub name: String,
    /// Element data type.
    pub col_type: ColumnType,
    /// Elements per cell (for strings: the field width in bytes).
    pub repeat: usize,
    /// Bytes per single element.
    pub width: usize,
    /// Field width used by fixed-width (IPAC) output.
    pub disp_width: usize,
    /// Number of TDIM dimensions in effect (1 or 2).
    pub ndim: usize,
    /// Logical rows of a 2-D cell; 1 otherwise.
    pub nrows: usize,
    /// Logical columns of a cell; `repeat` for 1-D cells.
    pub ncols: usize,
    /// Units string (TUNITn), possibly empty.
    pub units: String,
}

impl Column {
    /// Total bytes this column occupies in one table row.
    pub fn byte_width(&self) -> usize {
        match self.col_type {
            ColumnType::Bit => self.repeat.div_ceil(8),
            _ => self.repeat * self.width,
        }
    }
}

/// The ordered input schema of a table, indexed 1..N.
pub type InputSchema = Vec<Column>;

fn read_column(table: &Table, colnum: usize, cfg: &RunConfig) -> Result<Column> {
    let tform =
        indexed_string(table.cards, "TFORM", colnum).ok_or(Error::MissingKeyword("TFORMn"))?;
    let (repeat, col_type) = parse_tform(&tform)?;

    let name = indexed_string(table.cards, "TTYPE", colnum).unwrap_or_default();
    let units = indexed_string(table.cards, "TUNIT", colnum).unwrap_or_default();

    let mut disp_width = indexed_string(table.cards, "TDISP", colnum)
        .as_deref()
        .and_then(parse_tdisp_width)
        .unwrap_or_else(|| default_disp_width(col_type, repeat));
    if col_type == ColumnType::Ascii && cfg.do_quote {
        // Account for the two quote characters in fixed-width output.
        disp_width += 2;
    }

    let mut ndim = 1;
    let mut nrows = 1;
    let mut ncols = repeat;
    if cfg.explode && repeat > 1 && col_type != ColumnType::Ascii {
        if let Some((r, c)) =
            indexed_string(table.cards, "TDIM", colnum).as_deref().and_then(parse_tdim)
        {
            ndim = 2;
            nrows = r;
            ncols = c;
        }
    }

    Ok(Column {
        colnum,
        name,
        col_type,
        repeat,
        width: col_type.scalar_size(),
        disp_width,
        ndim,
        nrows,
        ncols,
        units,
    })
}

/// Build the input schema from the table's header cards.
pub fn read_input_schema(table: &Table, cfg: &RunConfig) -> Result<InputSchema> {
    let mut columns = Vec::with_capacity(table.tfields);
    for i in 1..=table.tfields {
        columns.push(read_column(table, i, cfg)?);
    }
    Ok(columns)
}

/// Check that `table` carries the same schema as `schema`.
///
/// Columns are compared on name, type, dimensionality, and shape; repeat is
/// compared for non-string columns only (string repeat is the on-disk field
/// width, which may legitimately differ in display width).
pub fn validate_schema(table: &Table, schema: &InputSchema, cfg: &RunConfig) -> bool {
    let other = match read_input_schema(table, cfg) {
        Ok(s) => s,
        Err(_) => return false,
    };
    if other.len() != schema.len() {
        return false;
    }

    schema.iter().zip(other.iter()).all(|(a, b)| {
        a.name == b.name
            && a.col_type == b.col_type
            && a.ndim == b.ndim
            && a.nrows == b.nrows
            && a.ncols == b.ncols
            && (a.col_type == ColumnType::Ascii || a.repeat == b.repeat)
    })
}

// --- Output schema ---

/// One column of the derived output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    /// Output column name.
    pub name: String,
    /// Target-format type spelling (SQL or IPAC).
    pub type_name: String,
    /// Field width for fixed-width output.
    pub disp_width: usize,
}

/// SQL type spelling for a scalar of the given type.
fn scalar_sql_type(col: &Column) -> &'static str {
    match col.col_type {
        ColumnType::Ascii => {
            if col.repeat > 1 {
                "text"
            } else {
                "char"
            }
        }
        ColumnType::Logical
        | ColumnType::Byte
        | ColumnType::SByte
        | ColumnType::Short
        | ColumnType::UShort => "smallint",
        ColumnType::Int | ColumnType::UInt => "integer",
        ColumnType::Long => "bigint",
        ColumnType::Float => "real",
        ColumnType::Double => "double precision",
        _ => "",
    }
}

/// SQL type spelling for a column, with the `[n]` array suffix for packed
/// (non-exploded) array columns.
pub fn sql_type(col: &Column, explode: bool) -> String {
    let base = scalar_sql_type(col);
    if !explode && col.repeat > 1 && col.col_type != ColumnType::Ascii {
        format!("{}[{}]", base, col.repeat)
    } else {
        String::from(base)
    }
}

/// IPAC table type spelling for a column.
pub fn ipac_type(col: &Column) -> &'static str {
    match col.col_type {
        ColumnType::Ascii => "char",
        ColumnType::Logical
        | ColumnType::Byte
        | ColumnType::SByte
        | ColumnType::Short
        | ColumnType::UShort
        | ColumnType::Int
        | ColumnType::UInt
        | ColumnType::Long => "int",
        ColumnType::Float => "real",
        ColumnType::Double => "double",
        _ => " ",
    }
}

/// The target-format type spelling for a column.
fn target_type(col: &Column, cfg: &RunConfig) -> String {
    if cfg.format.is_sql() {
        sql_type(col, cfg.explode)
    } else {
        String::from(ipac_type(col))
    }
}

fn scalar_target_type(col: &Column, cfg: &RunConfig) -> String {
    if cfg.format.is_sql() {
        String::from(scalar_sql_type(col))
    } else {
        String::from(ipac_type(col))
    }
}

fn synthetic_type(sql: &'static str, ipac: &'static str, cfg: &RunConfig) -> String {
    String::from(if cfg.format.is_sql() { sql } else { ipac })
}

/// Derive the output schema from the input schema and options.
///
/// When exploding, every non-string array column expands into one scalar
/// column per element, named `name_i` (1-D) or `name_i_j` (2-D). The
/// synthetic columns are appended in order: add, serial id, random id.
pub fn build_output_schema(input: &InputSchema, cfg: &RunConfig) -> Vec<OutputColumn> {
    let mut out = Vec::with_capacity(input.len());

    for col in input {
        if cfg.explode && col.repeat > 1 && col.col_type != ColumnType::Ascii {
            let type_name = scalar_target_type(col, cfg);
            if col.ndim > 1 {
                for i in 1..=col.nrows {
                    for j in 1..=col.ncols {
                        out.push(OutputColumn {
                            name: format!("{}_{}_{}", col.name, i, j),
                            type_name: type_name.clone(),
                            disp_width: col.disp_width,
                        });
                    }
                }
            } else {
                for i in 1..=col.repeat {
                    out.push(OutputColumn {
                        name: format!("{}_{}", col.name, i),
                        type_name: type_name.clone(),
                        disp_width: col.disp_width,
                    });
                }
            }
        } else {
            out.push(OutputColumn {
                name: col.name.clone(),
                type_name: target_type(col, cfg),
                disp_width: col.disp_width,
            });
        }
    }

    if let Some(name) = &cfg.add_name {
        out.push(OutputColumn {
            name: name.clone(),
            type_name: synthetic_type("integer", "int", cfg),
            disp_width: 0,
        });
    }
    if let Some(name) = &cfg.sid_name {
        out.push(OutputColumn {
            name: name.clone(),
            type_name: synthetic_type("integer", "int", cfg),
            disp_width: 0,
        });
    }
    if let Some(name) = &cfg.rid_name {
        out.push(OutputColumn {
            name: name.clone(),
            type_name: synthetic_type("real", "real", cfg),
            disp_width: 0,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{padded_byte_len, CARD_SIZE};
    use crate::hdu::FitsFile;
    use crate::stream::OutputFormat;

    // --- TFORM parsing ---

    #[test]
    fn parse_tform_single_int() {
        assert_eq!(parse_tform("1J").unwrap(), (1, ColumnType::Int));
    }

    #[test]
    fn parse_tform_no_repeat_prefix() {
        assert_eq!(parse_tform("J").unwrap(), (1, ColumnType::Int));
    }

    #[test]
    fn parse_tform_every_code() {
        assert_eq!(parse_tform("1L").unwrap(), (1, ColumnType::Logical));
        assert_eq!(parse_tform("8X").unwrap(), (8, ColumnType::Bit));
        assert_eq!(parse_tform("3B").unwrap(), (3, ColumnType::Byte));
        assert_eq!(parse_tform("1S").unwrap(), (1, ColumnType::SByte));
        assert_eq!(parse_tform("2I").unwrap(), (2, ColumnType::Short));
        assert_eq!(parse_tform("1U").unwrap(), (1, ColumnType::UShort));
        assert_eq!(parse_tform("1V").unwrap(), (1, ColumnType::UInt));
        assert_eq!(parse_tform("1K").unwrap(), (1, ColumnType::Long));
        assert_eq!(parse_tform("10E").unwrap(), (10, ColumnType::Float));
        assert_eq!(parse_tform("1D").unwrap(), (1, ColumnType::Double));
        assert_eq!(parse_tform("20A").unwrap(), (20, ColumnType::Ascii));
        assert_eq!(parse_tform("2C").unwrap(), (2, ColumnType::ComplexFloat));
        assert_eq!(parse_tform("1M").unwrap(), (1, ColumnType::ComplexDouble));
    }

    #[test]
    fn parse_tform_var_array() {
        assert_eq!(parse_tform("1PB(200)").unwrap(), (1, ColumnType::VarArray));
        assert_eq!(parse_tform("1QJ").unwrap(), (1, ColumnType::VarArray));
    }

    #[test]
    fn parse_tform_invalid() {
        assert!(parse_tform("").is_err());
        assert!(parse_tform("1Z").is_err());
        assert!(parse_tform("xJ").is_err());
    }

    #[test]
    fn parse_tform_whitespace_trimmed() {
        assert_eq!(parse_tform("  1J  ").unwrap(), (1, ColumnType::Int));
    }

    // --- TDIM parsing ---

    #[test]
    fn parse_tdim_two_dims() {
        assert_eq!(parse_tdim("(3,2)"), Some((3, 2)));
        assert_eq!(parse_tdim(" ( 4 , 5 ) "), Some((4, 5)));
    }

    #[test]
    fn parse_tdim_one_dim_is_none() {
        assert_eq!(parse_tdim("(6)"), None);
        assert_eq!(parse_tdim("(1,2,3)"), None);
        assert_eq!(parse_tdim("junk"), None);
    }

    // --- display widths ---

    #[test]
    fn tdisp_width_parsing() {
        assert_eq!(parse_tdisp_width("I6"), Some(6));
        assert_eq!(parse_tdisp_width("F8.3"), Some(8));
        assert_eq!(parse_tdisp_width("A10"), Some(10));
        assert_eq!(parse_tdisp_width("ES12.4"), Some(12));
        assert_eq!(parse_tdisp_width(""), None);
    }

    // --- byte widths ---

    #[test]
    fn byte_widths() {
        let col = |t, repeat| Column {
            colnum: 1,
            name: String::new(),
            col_type: t,
            repeat,
            width: ColumnType::scalar_size(t),
            disp_width: 0,
            ndim: 1,
            nrows: 1,
            ncols: repeat,
            units: String::new(),
        };
        assert_eq!(col(ColumnType::Int, 3).byte_width(), 12);
        assert_eq!(col(ColumnType::Double, 1).byte_width(), 8);
        assert_eq!(col(ColumnType::Ascii, 20).byte_width(), 20);
        assert_eq!(col(ColumnType::Bit, 9).byte_width(), 2);
        assert_eq!(col(ColumnType::Bit, 1024).byte_width(), 128);
    }

    // --- fixtures ---

    fn card_bytes(text: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        buf[..text.len()].copy_from_slice(text.as_bytes());
        buf
    }

    fn fits_with_header(extra: &[String], naxis1: usize, naxis2: usize, tfields: usize) -> FitsFile {
        let mut cards = vec![
            String::from("SIMPLE  =                    T"),
            String::from("BITPIX  =                    8"),
            String::from("NAXIS   =                    0"),
            String::from("END"),
        ];
        let mut bytes = Vec::new();
        for c in &cards {
            bytes.extend_from_slice(&card_bytes(c));
        }
        bytes.resize(padded_byte_len(bytes.len()), b' ');

        cards = vec![
            String::from("XTENSION= 'BINTABLE'"),
            String::from("BITPIX  =                    8"),
            String::from("NAXIS   =                    2"),
            format!("NAXIS1  = {:>20}", naxis1),
            format!("NAXIS2  = {:>20}", naxis2),
            String::from("PCOUNT  =                    0"),
            String::from("GCOUNT  =                    1"),
            format!("TFIELDS = {:>20}", tfields),
        ];
        cards.extend_from_slice(extra);
        cards.push(String::from("END"));
        let ext_start = bytes.len();
        for c in &cards {
            bytes.extend_from_slice(&card_bytes(c));
        }
        bytes.resize(ext_start + padded_byte_len(bytes.len() - ext_start), b' ');
        let data_start = bytes.len();
        bytes.resize(data_start + padded_byte_len(naxis1 * naxis2), 0);

        FitsFile::from_bytes(bytes).unwrap()
    }

    // --- read_input_schema ---

    #[test]
    fn reads_basic_schema() {
        let fits = fits_with_header(
            &[
                String::from("TFORM1  = '1J'"),
                String::from("TTYPE1  = 'id      '"),
                String::from("TFORM2  = '1D'"),
                String::from("TTYPE2  = 'mag     '"),
                String::from("TUNIT2  = 'mag     '"),
            ],
            12,
            1,
            2,
        );
        let table = fits.first_table().unwrap();
        let schema = read_input_schema(&table, &RunConfig::default()).unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].colnum, 1);
        assert_eq!(schema[0].name, "id");
        assert_eq!(schema[0].col_type, ColumnType::Int);
        assert_eq!(schema[0].repeat, 1);
        assert_eq!(schema[0].width, 4);
        assert_eq!(schema[1].name, "mag");
        assert_eq!(schema[1].col_type, ColumnType::Double);
        assert_eq!(schema[1].units, "mag");
    }

    #[test]
    fn string_disp_width_grows_for_quotes() {
        let fits = fits_with_header(
            &[String::from("TFORM1  = '8A'"), String::from("TTYPE1  = 'name'")],
            8,
            1,
            1,
        );
        let table = fits.first_table().unwrap();

        let quoted = read_input_schema(&table, &RunConfig::default()).unwrap();
        assert_eq!(quoted[0].disp_width, 10);

        let cfg = RunConfig {
            do_quote: false,
            ..RunConfig::default()
        };
        let bare = read_input_schema(&table, &cfg).unwrap();
        assert_eq!(bare[0].disp_width, 8);
    }

    #[test]
    fn tdim_sets_shape_only_when_exploding() {
        let extra = vec![
            String::from("TFORM1  = '6E'"),
            String::from("TTYPE1  = 'grid'"),
            String::from("TDIM1   = '(3,2)'"),
        ];
        let fits = fits_with_header(&extra, 24, 1, 1);
        let table = fits.first_table().unwrap();

        let flat = read_input_schema(&table, &RunConfig::default()).unwrap();
        assert_eq!((flat[0].ndim, flat[0].nrows, flat[0].ncols), (1, 1, 6));

        let cfg = RunConfig {
            explode: true,
            ..RunConfig::default()
        };
        let shaped = read_input_schema(&table, &cfg).unwrap();
        assert_eq!((shaped[0].ndim, shaped[0].nrows, shaped[0].ncols), (2, 3, 2));
    }

    #[test]
    fn missing_tform_is_an_error() {
        let fits = fits_with_header(&[String::from("TFORM1  = '1J'")], 4, 1, 2);
        let table = fits.first_table().unwrap();
        assert!(read_input_schema(&table, &RunConfig::default()).is_err());
    }

    // --- validate_schema ---

    #[test]
    fn validate_accepts_identical() {
        let extra = vec![
            String::from("TFORM1  = '1J'"),
            String::from("TTYPE1  = 'id'"),
        ];
        let fits = fits_with_header(&extra, 4, 1, 1);
        let table = fits.first_table().unwrap();
        let cfg = RunConfig::default();
        let schema = read_input_schema(&table, &cfg).unwrap();
        assert!(validate_schema(&table, &schema, &cfg));
    }

    #[test]
    fn validate_rejects_name_and_type_changes() {
        let cfg = RunConfig::default();
        let a = fits_with_header(
            &[
                String::from("TFORM1  = '1J'"),
                String::from("TTYPE1  = 'id'"),
            ],
            4,
            1,
            1,
        );
        let schema = read_input_schema(&a.first_table().unwrap(), &cfg).unwrap();

        let renamed = fits_with_header(
            &[
                String::from("TFORM1  = '1J'"),
                String::from("TTYPE1  = 'other'"),
            ],
            4,
            1,
            1,
        );
        assert!(!validate_schema(&renamed.first_table().unwrap(), &schema, &cfg));

        let retyped = fits_with_header(
            &[
                String::from("TFORM1  = '1E'"),
                String::from("TTYPE1  = 'id'"),
            ],
            4,
            1,
            1,
        );
        assert!(!validate_schema(&retyped.first_table().unwrap(), &schema, &cfg));

        let repeated = fits_with_header(
            &[
                String::from("TFORM1  = '2J'"),
                String::from("TTYPE1  = 'id'"),
            ],
            8,
            1,
            1,
        );
        assert!(!validate_schema(&repeated.first_table().unwrap(), &schema, &cfg));
    }

    #[test]
    fn validate_rejects_extra_columns() {
        let cfg = RunConfig::default();
        let a = fits_with_header(&[String::from("TFORM1  = '1J'")], 4, 1, 1);
        let schema = read_input_schema(&a.first_table().unwrap(), &cfg).unwrap();

        let b = fits_with_header(
            &[
                String::from("TFORM1  = '1J'"),
                String::from("TFORM2  = '1J'"),
            ],
            8,
            1,
            2,
        );
        assert!(!validate_schema(&b.first_table().unwrap(), &schema, &cfg));
    }

    // --- type spellings ---

    fn scalar_col(t: ColumnType, repeat: usize) -> Column {
        Column {
            colnum: 1,
            name: String::from("c"),
            col_type: t,
            repeat,
            width: t.scalar_size(),
            disp_width: 0,
            ndim: 1,
            nrows: 1,
            ncols: repeat,
            units: String::new(),
        }
    }

    #[test]
    fn sql_type_table() {
        assert_eq!(sql_type(&scalar_col(ColumnType::Ascii, 1), false), "char");
        assert_eq!(sql_type(&scalar_col(ColumnType::Ascii, 16), false), "text");
        assert_eq!(sql_type(&scalar_col(ColumnType::Logical, 1), false), "smallint");
        assert_eq!(sql_type(&scalar_col(ColumnType::Byte, 1), false), "smallint");
        assert_eq!(sql_type(&scalar_col(ColumnType::Short, 1), false), "smallint");
        assert_eq!(sql_type(&scalar_col(ColumnType::Int, 1), false), "integer");
        assert_eq!(sql_type(&scalar_col(ColumnType::UInt, 1), false), "integer");
        assert_eq!(sql_type(&scalar_col(ColumnType::Long, 1), false), "bigint");
        assert_eq!(sql_type(&scalar_col(ColumnType::Float, 1), false), "real");
        assert_eq!(
            sql_type(&scalar_col(ColumnType::Double, 1), false),
            "double precision"
        );
    }

    #[test]
    fn sql_type_array_suffix() {
        assert_eq!(sql_type(&scalar_col(ColumnType::Float, 5), false), "real[5]");
        assert_eq!(sql_type(&scalar_col(ColumnType::Float, 5), true), "real");
        // String arrays never take the suffix.
        assert_eq!(sql_type(&scalar_col(ColumnType::Ascii, 5), false), "text");
    }

    #[test]
    fn ipac_type_table() {
        assert_eq!(ipac_type(&scalar_col(ColumnType::Ascii, 4)), "char");
        assert_eq!(ipac_type(&scalar_col(ColumnType::Short, 1)), "int");
        assert_eq!(ipac_type(&scalar_col(ColumnType::Long, 1)), "int");
        assert_eq!(ipac_type(&scalar_col(ColumnType::Float, 1)), "real");
        assert_eq!(ipac_type(&scalar_col(ColumnType::Double, 1)), "double");
    }

    // --- output schema ---

    fn input_of(cols: Vec<Column>) -> InputSchema {
        cols
    }

    #[test]
    fn output_preserves_columns_without_explode() {
        let cfg = RunConfig {
            format: OutputFormat::Postgres,
            ..RunConfig::default()
        };
        let input = input_of(vec![
            scalar_col(ColumnType::Int, 1),
            scalar_col(ColumnType::Float, 3),
        ]);
        let out = build_output_schema(&input, &cfg);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].type_name, "real[3]");
    }

    #[test]
    fn output_explodes_1d_arrays() {
        let cfg = RunConfig {
            explode: true,
            ..RunConfig::default()
        };
        let mut col = scalar_col(ColumnType::Short, 2);
        col.name = String::from("flux");
        let out = build_output_schema(&input_of(vec![col]), &cfg);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "flux_1");
        assert_eq!(out[1].name, "flux_2");
        assert_eq!(out[0].type_name, "int");
    }

    #[test]
    fn output_explodes_2d_arrays() {
        let cfg = RunConfig {
            explode: true,
            format: OutputFormat::Postgres,
            ..RunConfig::default()
        };
        let mut col = scalar_col(ColumnType::Float, 6);
        col.name = String::from("grid");
        col.ndim = 2;
        col.nrows = 3;
        col.ncols = 2;
        let out = build_output_schema(&input_of(vec![col]), &cfg);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0].name, "grid_1_1");
        assert_eq!(out[1].name, "grid_1_2");
        assert_eq!(out[5].name, "grid_3_2");
        assert_eq!(out[0].type_name, "real");
    }

    #[test]
    fn output_keeps_string_arrays_packed() {
        let cfg = RunConfig {
            explode: true,
            ..RunConfig::default()
        };
        let mut col = scalar_col(ColumnType::Ascii, 16);
        col.name = String::from("name");
        let out = build_output_schema(&input_of(vec![col]), &cfg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "name");
    }

    #[test]
    fn output_appends_synthetic_columns_in_order() {
        let cfg = RunConfig {
            format: OutputFormat::Postgres,
            add_name: Some(String::from("batch")),
            sid_name: Some(String::from("sid")),
            rid_name: Some(String::from("rid")),
            ..RunConfig::default()
        };
        let out = build_output_schema(&input_of(vec![scalar_col(ColumnType::Int, 1)]), &cfg);
        assert_eq!(out.len(), 4);
        assert_eq!(out[1].name, "batch");
        assert_eq!(out[1].type_name, "integer");
        assert_eq!(out[2].name, "sid");
        assert_eq!(out[2].type_name, "integer");
        assert_eq!(out[3].name, "rid");
        assert_eq!(out[3].type_name, "real");
    }

    #[test]
    fn exploded_column_count_matches_repeat_sum() {
        let cfg = RunConfig {
            explode: true,
            ..RunConfig::default()
        };
        let input = input_of(vec![
            scalar_col(ColumnType::Int, 1),
            scalar_col(ColumnType::Float, 4),
            scalar_col(ColumnType::Ascii, 8),
            scalar_col(ColumnType::Short, 3),
        ]);
        let out = build_output_schema(&input, &cfg);
        // 1 scalar + 4 exploded + 1 string + 3 exploded
        assert_eq!(out.len(), 9);
    }
}
