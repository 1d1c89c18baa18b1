//! Streaming GIF decoder that yields fully composited RGBA frames with their
//! timing, for animation playback.

pub mod animation;
pub mod parser;

pub use animation::{Animation, Source};
pub use parser::{DecodeError, Decoder, DecoderOptions, Frame, OwnedFrame};
