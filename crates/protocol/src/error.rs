use thiserror::Error;

/// Errors raised while decoding wire data.
///
/// Any of these aborts decoding of the current message; the decoder's
/// cursor position is unspecified afterwards and the input must not be
/// reused.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} more bytes at position {position}")]
    UnexpectedEof { position: usize, needed: usize },

    #[error("unknown type tag 0x{tag:02x} at position {position}")]
    UnknownTag { position: usize, tag: u8 },

    #[error("invalid UTF-8 in string at position {position}")]
    InvalidUtf8 { position: usize },

    #[error("invalid length {length} at position {position}")]
    InvalidLength { position: usize, length: i32 },

    #[error("unsupported event version {0}")]
    UnsupportedVersion(u8),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
