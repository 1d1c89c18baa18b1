use std::io;

use thiserror::Error;

/// The stream itself is malformed; nothing in it can be decoded until the
/// session is rewound against a fresh source.
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("signature is invalid")]
    InvalidSignature,

    #[error("version {0} in the header is unsupported")]
    UnsupportedVersion(String),

    #[error("input ended while reading the {0}")]
    TruncatedHeader(&'static str),
}

/// Failure scoped to the frame currently being decoded.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("lzw minimum code size {0} is outside of 2..=8")]
    InvalidCodeSize(u8),

    #[error("lzw code {code} references an empty dictionary slot, next free slot is {next}")]
    InvalidCode { code: u16, next: u16 },

    #[error("image data produced {actual} indices, expected {expected}")]
    MissingIndices { expected: usize, actual: usize },

    #[error("input ended while reading the {0}")]
    TruncatedBlock(&'static str),

    #[error("frame at {left},{top} sized {width}x{height} does not fit the {screen_width}x{screen_height} screen")]
    OutOfBounds {
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        screen_width: u16,
        screen_height: u16,
    },

    #[error("frame has neither a local nor a global color table")]
    MissingColorTable,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("could not allocate {bytes} bytes for the {what}")]
    Allocation { what: &'static str, bytes: usize },

    #[error("decoder is invalid after a previous {cause:?} failure, rewind before decoding further")]
    Invalidated { cause: ErrorKind },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Coarse classification of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Frame,
    Allocation,
    Io,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Structural(_) => ErrorKind::Structural,
            DecodeError::Frame(_) => ErrorKind::Frame,
            DecodeError::Allocation { .. } => ErrorKind::Allocation,
            DecodeError::Invalidated { cause } => *cause,
            DecodeError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
