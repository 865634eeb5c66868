//! FITS parsing: HDU discovery and binary-table access.
//!
//! A [`FitsFile`] holds the full (decompressed) byte stream of one FITS file
//! and the offsets of every HDU in it. Table conversion selects a BINTABLE
//! HDU as a [`Table`] view, which exposes the row geometry, header cards, and
//! bulk row-byte reads.

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::{
    header_byte_len, integer_value, parse_header_blocks, string_value, Card,
};

/// Describes the kind of data in a single HDU.
#[derive(Debug, Clone, PartialEq)]
pub enum HduKind {
    /// Primary HDU (image data or empty).
    Primary,
    /// Image extension (XTENSION = 'IMAGE').
    Image,
    /// ASCII table extension (XTENSION = 'TABLE').
    AsciiTable,
    /// Binary table extension (XTENSION = 'BINTABLE').
    BinaryTable {
        /// Row width in bytes.
        naxis1: usize,
        /// Number of rows.
        naxis2: usize,
        /// Number of columns.
        tfields: usize,
    },
    /// Any other extension type.
    Other,
}

/// A single Header Data Unit located within a FITS byte stream.
#[derive(Debug, Clone)]
pub struct Hdu {
    /// Parsed kind and shape of the HDU.
    pub kind: HduKind,
    /// Byte offset where the data segment begins.
    pub data_start: usize,
    /// Length of the data segment in bytes (unpadded).
    pub data_len: usize,
    /// All header cards parsed from this HDU.
    pub cards: Vec<Card>,
}

/// A complete FITS file held in memory, gunzipped if necessary.
#[derive(Debug)]
pub struct FitsFile {
    data: Vec<u8>,
    hdus: Vec<Hdu>,
}

/// A BINTABLE HDU selected for conversion.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    file: &'a FitsFile,
    /// Row width in bytes (NAXIS1).
    pub naxis1: usize,
    /// Number of rows (NAXIS2).
    pub naxis2: usize,
    /// Number of columns (TFIELDS).
    pub tfields: usize,
    /// Header cards of the table HDU.
    pub cards: &'a [Card],
    data_start: usize,
}

/// Returns `true` when `data` begins with the gzip magic bytes.
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B
}

/// Returns `true` when `data` begins with a `SIMPLE = T` FITS record.
pub fn is_fits(data: &[u8]) -> bool {
    if data.len() < 80 || !data.starts_with(b"SIMPLE") {
        return false;
    }
    let card: [u8; 80] = data[..80].try_into().unwrap_or([b' '; 80]);
    matches!(
        crate::header::parse_card(&card),
        Ok(Card {
            value: Some(crate::header::Value::Logical(true)),
            ..
        })
    )
}

/// Strip the gzip header and trailer, returning the raw deflate payload.
fn strip_gzip_header(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 18 || data[0] != 0x1f || data[1] != 0x8b || data[2] != 0x08 {
        return Err(Error::Decompress);
    }
    let flg = data[3];
    let mut pos = 10usize;
    if flg & 0x04 != 0 {
        // FEXTRA
        if pos + 2 > data.len() {
            return Err(Error::Decompress);
        }
        let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2 + xlen;
    }
    if flg & 0x08 != 0 {
        // FNAME: skip null-terminated string
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        pos += 1;
    }
    if flg & 0x10 != 0 {
        // FCOMMENT
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        pos += 1;
    }
    if flg & 0x02 != 0 {
        // FHCRC
        pos += 2;
    }
    if pos >= data.len() || data.len() < pos + 8 {
        return Err(Error::Decompress);
    }
    // Strip the 8-byte trailer (CRC32 + ISIZE)
    Ok(&data[pos..data.len() - 8])
}

/// Decompress a gzip stream into the contained FITS bytes.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let payload = strip_gzip_header(data)?;
    miniz_oxide::inflate::decompress_to_vec(payload).map_err(|_| Error::Decompress)
}

fn compute_data_byte_len(cards: &[Card], is_primary: bool) -> Result<usize> {
    let bitpix = integer_value(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?;
    let naxis = integer_value(cards, "NAXIS").ok_or(Error::MissingKeyword("NAXIS"))? as usize;

    if naxis == 0 {
        return Ok(0);
    }

    let bytes_per_value = (bitpix.unsigned_abs() as usize) / 8;

    let mut total_pixels = 1usize;
    for i in 1..=naxis {
        let kw = format!("NAXIS{}", i);
        let dim = integer_value(cards, &kw).ok_or(Error::MissingKeyword("NAXISn"))? as usize;
        total_pixels = total_pixels
            .checked_mul(dim)
            .ok_or(Error::InvalidHeader)?;
    }

    let pcount = if is_primary {
        0
    } else {
        integer_value(cards, "PCOUNT").unwrap_or(0) as usize
    };
    let gcount = if is_primary {
        1
    } else {
        integer_value(cards, "GCOUNT").unwrap_or(1).max(1) as usize
    };

    total_pixels
        .checked_mul(bytes_per_value)
        .and_then(|n| n.checked_add(pcount))
        .and_then(|n| n.checked_mul(gcount))
        .ok_or(Error::InvalidHeader)
}

fn parse_hdu_kind(cards: &[Card], is_primary: bool) -> HduKind {
    if is_primary {
        return HduKind::Primary;
    }
    match string_value(cards, "XTENSION").as_deref() {
        Some("IMAGE") => HduKind::Image,
        Some("TABLE") => HduKind::AsciiTable,
        Some("BINTABLE") => {
            let naxis1 = integer_value(cards, "NAXIS1").unwrap_or(0) as usize;
            let naxis2 = integer_value(cards, "NAXIS2").unwrap_or(0) as usize;
            let tfields = integer_value(cards, "TFIELDS").unwrap_or(0) as usize;
            HduKind::BinaryTable {
                naxis1,
                naxis2,
                tfields,
            }
        }
        _ => HduKind::Other,
    }
}

impl FitsFile {
    /// Parse a FITS byte stream into its HDUs.
    ///
    /// If the bytes are gzip-compressed they are decompressed first.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<FitsFile> {
        let data = if is_gzip(&bytes) {
            gunzip(&bytes)?
        } else {
            bytes
        };

        let mut hdus = Vec::new();
        let mut offset = 0usize;

        while offset + BLOCK_SIZE <= data.len() {
            let header_len = header_byte_len(&data[offset..])?;
            let cards = parse_header_blocks(&data[offset..offset + header_len])?;
            let is_primary = offset == 0;

            let data_len = compute_data_byte_len(&cards, is_primary)?;
            let data_start = offset + header_len;
            if data_start + data_len > data.len() {
                return Err(Error::UnexpectedEof);
            }

            let kind = parse_hdu_kind(&cards, is_primary);
            hdus.push(Hdu {
                kind,
                data_start,
                data_len,
                cards,
            });

            offset = data_start + padded_byte_len(data_len);
        }

        if hdus.is_empty() {
            return Err(Error::InvalidHeader);
        }

        Ok(FitsFile { data, hdus })
    }

    /// Read and parse a FITS file from disk, gunzipping if necessary.
    pub fn open(path: &str) -> Result<FitsFile> {
        FitsFile::from_bytes(std::fs::read(path)?)
    }

    /// All HDUs in file order, the primary HDU first.
    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    /// Select the first binary-table HDU in the file.
    pub fn first_table(&self) -> Result<Table<'_>> {
        self.hdus
            .iter()
            .find(|h| matches!(h.kind, HduKind::BinaryTable { .. }))
            .ok_or(Error::NotATable)
            .and_then(|h| self.table_view(h))
    }

    /// Select the HDU at `index` (0 = primary) as a binary table.
    pub fn table_by_index(&self, index: usize) -> Result<Table<'_>> {
        let hdu = self.hdus.get(index).ok_or(Error::NoSuchExtension)?;
        self.table_view(hdu)
    }

    /// Select the binary table whose EXTNAME matches `name`.
    pub fn table_by_name(&self, name: &str) -> Result<Table<'_>> {
        self.hdus
            .iter()
            .find(|h| string_value(&h.cards, "EXTNAME").as_deref() == Some(name))
            .ok_or(Error::NoSuchExtension)
            .and_then(|h| self.table_view(h))
    }

    fn table_view<'a>(&'a self, hdu: &'a Hdu) -> Result<Table<'a>> {
        match hdu.kind {
            HduKind::BinaryTable {
                naxis1,
                naxis2,
                tfields,
            } => Ok(Table {
                file: self,
                naxis1,
                naxis2,
                tfields,
                cards: &hdu.cards,
                data_start: hdu.data_start,
            }),
            _ => Err(Error::NotATable),
        }
    }
}

impl Table<'_> {
    /// The recommended number of rows to process per chunk: as many rows as
    /// fit in ten FITS blocks, never fewer than one.
    pub fn optimal_row_chunk(&self) -> usize {
        if self.naxis1 == 0 {
            return 1;
        }
        ((10 * BLOCK_SIZE) / self.naxis1).max(1)
    }

    /// Copy the raw bytes of rows `first_row .. first_row + nrows` (1-based,
    /// inclusive start) into `buf`, replacing its contents.
    pub fn read_rows_into(&self, first_row: usize, nrows: usize, buf: &mut Vec<u8>) -> Result<()> {
        if first_row == 0 || first_row + nrows - 1 > self.naxis2 {
            return Err(Error::UnexpectedEof);
        }
        let start = self.data_start + (first_row - 1) * self.naxis1;
        let end = start + nrows * self.naxis1;
        if end > self.file.data.len() {
            return Err(Error::UnexpectedEof);
        }
        buf.clear();
        buf.extend_from_slice(&self.file.data[start..end]);
        Ok(())
    }
}
