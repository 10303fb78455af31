use std::io;
use std::fmt;

macro_rules! impl_error_abbr {
    ($(($func:ident, $ekid:expr)),+ $(,)?) => {
        impl Error {$(
            pub fn $func<E: Into<Box<dyn std::error::Error + Send + Sync>>>(error: E) -> Self {
                Self { kind: $ekid, offset: None, error: error.into() }
            }
        )+}
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    /// bad signature, truncated chunk, crc mismatch, bad chunk order, corrupt zlib stream
    MalformedContainer,
    UnsupportedChunk,
    UnsupportedColorMode,
    UnsupportedBitDepth,
    UnsupportedInterlace,
    TruncatedScanlineData,
    PaletteIndexOutOfBounds,
    /// caller handed the encoder a buffer it cannot represent
    InvalidImage,
    TooLarge,
    InvalidBandConfig,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    offset: Option<usize>,
    error: Box<dyn std::error::Error + Send + Sync>,
}

impl_error_abbr!{
    (io,                 ErrorKind::Io),
    (malformed,          ErrorKind::MalformedContainer),
    (unsupported_chunk,  ErrorKind::UnsupportedChunk),
    (unsupported_color,  ErrorKind::UnsupportedColorMode),
    (unsupported_depth,  ErrorKind::UnsupportedBitDepth),
    (interlaced,         ErrorKind::UnsupportedInterlace),
    (truncated,          ErrorKind::TruncatedScanlineData),
    (palette_index,      ErrorKind::PaletteIndexOutOfBounds),
    (invalid_image,      ErrorKind::InvalidImage),
    (too_large,          ErrorKind::TooLarge),
    (band_config,        ErrorKind::InvalidBandConfig),
}

impl Error {
    /// Attach the byte offset where the problem was found.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Self::io(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.error)?;
        if let Some(offset) = self.offset {
            write!(f, " at byte {}", offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_kind_and_offset() {
        let e = Error::malformed("crc mismatch").at(33);
        assert_eq!(e.kind(), ErrorKind::MalformedContainer);
        assert_eq!(e.offset(), Some(33));
        assert_eq!(e.to_string(), "MalformedContainer: crc mismatch at byte 33");
    }

    #[test]
    fn io_errors_convert() {
        let e: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(e.kind(), ErrorKind::Io);
        assert_eq!(e.offset(), None);
    }
}
