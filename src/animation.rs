//! Playback handle over a GIF stream.
//!
//! [`Animation`] owns its input (a file, a duplicated descriptor or an
//! in-memory copy), copies every decoded canvas into a reference counted
//! buffer and keeps the most recent frames around.

use crate::parser::{DecodeError, Decoder, OwnedFrame, Result};

use log::{debug, warn};

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Number of decoded frames kept by [`Animation`], the last one is current.
pub const HISTORY_LENGTH: usize = 3;

/// Input an [`Animation`] decodes from.
#[derive(Debug)]
pub enum Source {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::File(file) => file.read(buf),
            Source::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for Source {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Source::File(file) => file.seek(pos),
            Source::Memory(cursor) => cursor.seek(pos),
        }
    }
}

#[derive(Debug)]
pub struct Animation {
    decoder: Decoder<Source>,
    // oldest first, `None` marks a slot without a frame (not decoded yet, or
    // the end of the sequence)
    frames: VecDeque<Option<OwnedFrame>>,
}

impl Animation {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("opened {}", path.as_ref().display());
        Ok(Self::from_source(Source::File(BufReader::new(file))))
    }

    /// Decodes from a duplicate of `fd`, starting at offset 0 regardless of
    /// the descriptor's current position.
    ///
    /// The duplicate shares its file offset with `fd`, so the caller should
    /// not read from `fd` while the animation is alive.
    #[cfg(unix)]
    pub fn from_fd(fd: std::os::fd::BorrowedFd<'_>) -> io::Result<Self> {
        let mut file = File::from(fd.try_clone_to_owned()?);
        file.rewind()?;
        Ok(Self::from_source(Source::File(BufReader::new(file))))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::from_source(Source::Memory(Cursor::new(data)))
    }

    pub fn from_source(source: Source) -> Self {
        let mut decoder = Decoder::new(source);
        // failures are reported through `is_valid`
        if let Err(err) = decoder.read_info() {
            debug!("animation is invalid: {}", err);
        }

        Self {
            decoder,
            frames: std::iter::repeat_with(|| None).take(HISTORY_LENGTH).collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.decoder.is_valid()
    }

    /// Logical screen width, 0 when the header could not be read.
    pub fn width(&self) -> u16 {
        self.decoder.width()
    }

    /// Logical screen height, 0 when the header could not be read.
    pub fn height(&self) -> u16 {
        self.decoder.height()
    }

    pub fn decoder(&self) -> &Decoder<Source> {
        &self.decoder
    }

    /// The most recently decoded frame, `None` before the first frame and
    /// after the end of the sequence.
    pub fn current_frame(&self) -> Option<&OwnedFrame> {
        self.frames.back().and_then(Option::as_ref)
    }

    /// Decoded frames still held, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &OwnedFrame> {
        self.frames.iter().flatten()
    }

    /// Decodes the next frame. Returns `false` at the end of the sequence,
    /// after which [`Animation::current_frame`] is empty.
    pub fn advance(&mut self) -> Result<bool> {
        let frame = match self.decoder.next_frame() {
            Ok(frame) => frame.map(|frame| frame.to_owned_frame()),
            Err(err) => {
                warn!("animation stopped: {}", err);
                return Err(err);
            },
        };

        let advanced = frame.is_some();
        self.push_frame(frame);
        Ok(advanced)
    }

    /// Restarts from the first frame. Returns whether the stream is valid.
    pub fn rewind(&mut self) -> Result<bool> {
        self.frames.iter_mut().for_each(|frame| *frame = None);
        match self.decoder.rewind() {
            Ok(()) => Ok(self.is_valid()),
            Err(err @ DecodeError::Io(_)) => Err(err),
            Err(err) => {
                debug!("animation is invalid after rewind: {}", err);
                Ok(false)
            },
        }
    }

    fn push_frame(&mut self, frame: Option<OwnedFrame>) {
        debug_assert_eq!(self.frames.len(), HISTORY_LENGTH);
        self.frames.pop_front();
        self.frames.push_back(frame);
    }
}
