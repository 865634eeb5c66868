//! FITS header card parsing and keyword access.
//!
//! This is a read-only view of a FITS header: 80-byte cards are parsed into
//! [`Card`] records whose values are one of the four [`Value`] kinds the
//! converter cares about. Indexed keywords (`TTYPEn`, `TFORMn`, ...) are
//! looked up by formatted name.

use core::str;

use crate::block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
use crate::error::{Error, Result};

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
}

/// A parsed FITS header card (one 80-byte keyword record).
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword name, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if this card has a value indicator (`= ` in bytes 8..10).
    pub value: Option<Value>,
}

impl Card {
    /// Return the keyword as a trimmed UTF-8 string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    /// Returns `true` if this card is the END keyword.
    pub fn is_end(&self) -> bool {
        &self.keyword == b"END     "
    }
}

/// Split a non-string value field at the ` /` comment separator.
fn strip_comment(field: &[u8]) -> &[u8] {
    let len = field.len();
    let mut i = 0;
    while i + 1 < len {
        if field[i] == b' ' && field[i + 1] == b'/' {
            return &field[..i];
        }
        i += 1;
    }
    field
}

/// Parse a FITS character-string value from the value field.
///
/// String values begin with `'`; a doubled `''` inside the string represents
/// a literal quote. Trailing spaces are trimmed (FITS pads strings to a
/// minimum of 8 characters).
fn parse_string(field: &[u8]) -> Option<Value> {
    if field.is_empty() || field[0] != b'\'' {
        return None;
    }

    let mut value = String::new();
    let mut i = 1;
    let len = field.len();

    loop {
        if i >= len {
            // Unterminated string -- be lenient and accept what we have.
            break;
        }
        if field[i] == b'\'' {
            if i + 1 < len && field[i + 1] == b'\'' {
                value.push('\'');
                i += 2;
            } else {
                break;
            }
        } else {
            value.push(field[i] as char);
            i += 1;
        }
    }

    Some(Value::String(value.trim_end().to_string()))
}

/// Parse a float string, handling FITS `D` exponent notation.
fn parse_float_str(s: &str) -> Option<f64> {
    let normalized = s.replace(['D', 'd'], "E");
    normalized.parse::<f64>().ok()
}

/// Parse a FITS header value from the value portion of an 80-byte card
/// (bytes 10..80). The caller must have checked the `= ` value indicator.
pub fn parse_value(value_bytes: &[u8]) -> Option<Value> {
    if value_bytes.is_empty() {
        return None;
    }

    if value_bytes[0] == b'\'' {
        return parse_string(value_bytes);
    }

    let val_part = strip_comment(value_bytes);
    let val_text = str::from_utf8(val_part).ok()?.trim();
    if val_text.is_empty() {
        return None;
    }

    if val_text == "T" {
        return Some(Value::Logical(true));
    }
    if val_text == "F" {
        return Some(Value::Logical(false));
    }

    if !val_text.contains(['.', 'E', 'e', 'D', 'd']) {
        if let Ok(n) = val_text.parse::<i64>() {
            return Some(Value::Integer(n));
        }
    }

    parse_float_str(val_text).map(Value::Float)
}

/// Parse a single 80-byte FITS header card.
pub fn parse_card(card_bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&card_bytes[..8]);

    for &b in &keyword {
        match b {
            b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_' => {}
            _ => return Err(Error::InvalidKeyword),
        }
    }

    let value = if card_bytes[8] == b'=' && card_bytes[9] == b' ' {
        parse_value(&card_bytes[10..CARD_SIZE])
    } else {
        // END, COMMENT, HISTORY, and blank cards carry no value.
        None
    };

    Ok(Card { keyword, value })
}

/// Parse consecutive 2880-byte header blocks until the END card is found.
///
/// Only complete 2880-byte blocks are scanned; trailing bytes shorter than a
/// full block are ignored, which tolerates files whose total size is not
/// block-aligned.
pub fn parse_header_blocks(data: &[u8]) -> Result<Vec<Card>> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut cards = Vec::new();
    let num_blocks = data.len() / BLOCK_SIZE;

    for block_idx in 0..num_blocks {
        let block_start = block_idx * BLOCK_SIZE;
        for card_idx in 0..CARDS_PER_BLOCK {
            let card_start = block_start + card_idx * CARD_SIZE;
            let card_bytes: &[u8; CARD_SIZE] = data[card_start..card_start + CARD_SIZE]
                .try_into()
                .map_err(|_| Error::InvalidHeader)?;

            let card = parse_card(card_bytes)?;
            let is_end = card.is_end();
            cards.push(card);

            if is_end {
                return Ok(cards);
            }
        }
    }

    Err(Error::UnexpectedEof)
}

/// Return the number of bytes consumed by the header (a multiple of
/// [`BLOCK_SIZE`]), determined by scanning for the END card.
pub fn header_byte_len(data: &[u8]) -> Result<usize> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let num_blocks = data.len() / BLOCK_SIZE;

    for block_idx in 0..num_blocks {
        let block_start = block_idx * BLOCK_SIZE;
        for card_idx in 0..CARDS_PER_BLOCK {
            let card_start = block_start + card_idx * CARD_SIZE;
            if &data[card_start..card_start + 8] == b"END     " {
                return Ok((block_idx + 1) * BLOCK_SIZE);
            }
        }
    }

    Err(Error::UnexpectedEof)
}

// --- Keyword lookup helpers ---

/// Find the string value of `keyword`, trimmed.
pub fn string_value(cards: &[Card], keyword: &str) -> Option<String> {
    cards.iter().find_map(|c| {
        if c.keyword_str() == keyword {
            match &c.value {
                Some(Value::String(s)) => Some(s.trim().into()),
                _ => None,
            }
        } else {
            None
        }
    })
}

/// Find the integer value of `keyword`.
pub fn integer_value(cards: &[Card], keyword: &str) -> Option<i64> {
    cards.iter().find_map(|c| {
        if c.keyword_str() == keyword {
            match &c.value {
                Some(Value::Integer(n)) => Some(*n),
                _ => None,
            }
        } else {
            None
        }
    })
}

/// Find the logical value of `keyword`.
pub fn logical_value(cards: &[Card], keyword: &str) -> Option<bool> {
    cards.iter().find_map(|c| {
        if c.keyword_str() == keyword {
            match &c.value {
                Some(Value::Logical(b)) => Some(*b),
                _ => None,
            }
        } else {
            None
        }
    })
}

/// Find the string value of an indexed keyword such as `TFORM3`.
pub fn indexed_string(cards: &[Card], base: &str, index: usize) -> Option<String> {
    string_value(cards, &format!("{base}{index}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_bytes(text: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        let bytes = text.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }

    // --- card parsing ---

    #[test]
    fn parse_logical_card() {
        let card = parse_card(&card_bytes(
            "SIMPLE  =                    T / conforms to FITS standard",
        ))
        .unwrap();
        assert_eq!(card.keyword_str(), "SIMPLE");
        assert_eq!(card.value, Some(Value::Logical(true)));
    }

    #[test]
    fn parse_integer_card() {
        let card = parse_card(&card_bytes("NAXIS1  =                   12")).unwrap();
        assert_eq!(card.keyword_str(), "NAXIS1");
        assert_eq!(card.value, Some(Value::Integer(12)));
    }

    #[test]
    fn parse_negative_integer() {
        let card = parse_card(&card_bytes("BZERO   =                 -128")).unwrap();
        assert_eq!(card.value, Some(Value::Integer(-128)));
    }

    #[test]
    fn parse_float_card() {
        let card = parse_card(&card_bytes("TSCAL1  =                 1.5E2")).unwrap();
        assert_eq!(card.value, Some(Value::Float(150.0)));
    }

    #[test]
    fn parse_float_d_exponent() {
        let card = parse_card(&card_bytes("TZERO1  =               1.0D3")).unwrap();
        assert_eq!(card.value, Some(Value::Float(1000.0)));
    }

    #[test]
    fn parse_string_card() {
        let card = parse_card(&card_bytes("TTYPE1  = 'ra      '           / right ascension"))
            .unwrap();
        assert_eq!(card.value, Some(Value::String(String::from("ra"))));
    }

    #[test]
    fn parse_string_with_embedded_quote() {
        let card = parse_card(&card_bytes("OBJECT  = 'O''Neill '")).unwrap();
        assert_eq!(card.value, Some(Value::String(String::from("O'Neill"))));
    }

    #[test]
    fn parse_comment_after_integer() {
        let card = parse_card(&card_bytes("BITPIX  =                    8 / bits")).unwrap();
        assert_eq!(card.value, Some(Value::Integer(8)));
    }

    #[test]
    fn parse_end_card() {
        let card = parse_card(&card_bytes("END")).unwrap();
        assert!(card.is_end());
        assert!(card.value.is_none());
    }

    #[test]
    fn parse_commentary_card_has_no_value() {
        let card = parse_card(&card_bytes("COMMENT this is free-form text")).unwrap();
        assert!(card.value.is_none());
    }

    #[test]
    fn parse_invalid_keyword() {
        assert!(parse_card(&card_bytes("bad kw  =                    1")).is_err());
    }

    // --- header block parsing ---

    fn header_block(cards: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for text in cards {
            buf.extend_from_slice(&card_bytes(text));
        }
        buf.extend_from_slice(&card_bytes("END"));
        buf.resize(padded(buf.len()), b' ');
        buf
    }

    fn padded(n: usize) -> usize {
        crate::block::padded_byte_len(n)
    }

    #[test]
    fn parse_header_finds_end() {
        let data = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ]);
        let cards = parse_header_blocks(&data).unwrap();
        assert_eq!(cards.len(), 4);
        assert!(cards[3].is_end());
        assert_eq!(header_byte_len(&data).unwrap(), BLOCK_SIZE);
    }

    #[test]
    fn parse_header_missing_end() {
        let data = vec![b' '; BLOCK_SIZE];
        assert!(parse_header_blocks(&data).is_err());
        assert!(header_byte_len(&data).is_err());
    }

    #[test]
    fn parse_header_too_short() {
        assert!(parse_header_blocks(&[b' '; 100]).is_err());
    }

    // --- keyword lookup ---

    #[test]
    fn lookup_helpers() {
        let data = header_block(&[
            "XTENSION= 'BINTABLE'",
            "NAXIS2  =                  100",
            "TTYPE2  = 'flux    '",
            "GROUPS  =                    F",
        ]);
        let cards = parse_header_blocks(&data).unwrap();

        assert_eq!(
            string_value(&cards, "XTENSION"),
            Some(String::from("BINTABLE"))
        );
        assert_eq!(integer_value(&cards, "NAXIS2"), Some(100));
        assert_eq!(logical_value(&cards, "GROUPS"), Some(false));
        assert_eq!(indexed_string(&cards, "TTYPE", 2), Some(String::from("flux")));
        assert_eq!(indexed_string(&cards, "TTYPE", 3), None);
        assert_eq!(integer_value(&cards, "NAXIS9"), None);
    }
}
