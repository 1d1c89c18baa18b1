mod bit_reader;
mod compositor;
mod decoder;
mod error;
mod lzw;

pub use decoder::{
    Decoder, DecoderOptions, Frame, FrameInfo, LoopCount, OwnedFrame, ScreenDescriptor, Version,
    DEFAULT_MAX_CANVAS_BYTES,
};
pub use error::{DecodeError, ErrorKind, FrameError, Result, StructuralError};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalMethod {
    /// No disposal specified, the decoder leaves the canvas as is.
    #[default]
    Unspecified = 0,
    DoNotDispose = 1,
    RestoreToBackgroundColor = 2,
    RestoreToPrevious = 3,
}

impl DisposalMethod {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DisposalMethod::Unspecified),
            1 => Some(DisposalMethod::DoNotDispose),
            2 => Some(DisposalMethod::RestoreToBackgroundColor),
            3 => Some(DisposalMethod::RestoreToPrevious),
            _ => None,
        }
    }
}

/// A global or local palette, stored as packed RGB triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    rgb: Box<[u8]>,
}

impl ColorTable {
    /// Number of bytes a table declared with the 3-bit `size` field occupies.
    pub(crate) fn byte_len(size: u8) -> usize {
        3 * (1 << ((size & 0b00000111) + 1))
    }

    pub(crate) fn from_rgb(rgb: Box<[u8]>) -> Self {
        debug_assert_eq!(rgb.len() % 3, 0);
        Self { rgb }
    }

    pub fn len(&self) -> usize {
        self.rgb.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.rgb.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<[u8; 3]> {
        let offset = index as usize * 3;
        self.rgb
            .get(offset..offset + 3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rgb
    }
}
