/// All errors that can occur while reading FITS tables or writing output.
#[derive(Debug)]
pub enum Error {
    /// Malformed FITS header block.
    InvalidHeader,
    /// Premature end of data while reading.
    UnexpectedEof,
    /// Malformed keyword name in a header card.
    InvalidKeyword,
    /// A header value could not be parsed correctly.
    InvalidValue,
    /// A required keyword was not found in the header.
    MissingKeyword(&'static str),
    /// The selected HDU is not a binary table.
    NotATable,
    /// The requested extension does not exist.
    NoSuchExtension,
    /// Gzip-compressed input could not be decompressed.
    Decompress,
    /// The requested feature is recognized but not implemented.
    Unimplemented(&'static str),
    /// The output file could not be opened.
    OutputOpen(String, std::io::Error),
    /// An I/O error from the standard library.
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidHeader => write!(f, "invalid FITS header"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::InvalidKeyword => write!(f, "invalid keyword name"),
            Error::InvalidValue => write!(f, "invalid header value"),
            Error::MissingKeyword(kw) => write!(f, "missing required keyword: {kw}"),
            Error::NotATable => write!(f, "HDU is not a binary table"),
            Error::NoSuchExtension => write!(f, "no such extension"),
            Error::Decompress => write!(f, "gzip decompression failed"),
            Error::Unimplemented(what) => write!(f, "{what} is not implemented"),
            Error::OutputOpen(path, e) => write!(f, "cannot open output '{path}': {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::OutputOpen(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(Error::InvalidHeader.to_string(), "invalid FITS header");
        assert_eq!(Error::UnexpectedEof.to_string(), "unexpected end of file");
        assert_eq!(
            Error::MissingKeyword("TFORM3").to_string(),
            "missing required keyword: TFORM3"
        );
        assert_eq!(Error::NotATable.to_string(), "HDU is not a binary table");
        assert_eq!(
            Error::Unimplemented("row ranges").to_string(),
            "row ranges is not implemented"
        );
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = std::io::Error::other("oops");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
    }

    #[test]
    fn output_open_source() {
        use std::error::Error as StdError;

        let e = Error::OutputOpen(
            String::from("out.csv"),
            std::io::Error::other("denied"),
        );
        assert!(e.source().is_some());
        assert!(e.to_string().contains("out.csv"));
    }
}
