use super::compositor::Compositor;
use super::error::{DecodeError, ErrorKind, FrameError, Result, StructuralError};
use super::lzw::{Decompressor, LzwScratch};
use super::{ColorTable, DisposalMethod};

use log::{debug, trace, warn};

use std::fmt::{self, Debug};
use std::io::{self, prelude::*, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR_LABEL: u8 = 0x2c;
const TRAILER_LABEL: u8 = 0x3b;

// Extension labels
const APPLICATION_EXTENSION: u8 = 0xff;
const COMMENT_EXTENSION: u8 = 0xfe;
const GRAPHIC_CONTROL_EXTENSION: u8 = 0xf9;
const PLAIN_TEXT_EXTENSION: u8 = 0x01;

const MAX_SUB_BLOCK_LENGTH: usize = 255;

#[derive(Debug)]
enum ExtensionType {
    Application,
    Comment,
    GraphicControl,
    PlainText,
    Unknown(u8),
}

impl From<u8> for ExtensionType {
    fn from(value: u8) -> Self {
        use ExtensionType::*;

        match value {
            APPLICATION_EXTENSION => Application,
            COMMENT_EXTENSION => Comment,
            GRAPHIC_CONTROL_EXTENSION => GraphicControl,
            PLAIN_TEXT_EXTENSION => PlainText,
            label => Unknown(label),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicControlExtension {
    disposal_method: DisposalMethod,
    transparent_color_flag: bool,

    delay_time: u16,
    transparent_color_index: u8,
}

#[derive(Debug)]
struct ImageDescriptor {
    left_position: u16,
    top_position: u16,

    width: u16,
    height: u16,

    interlace_flag: bool,
    local_color_table_size: Option<usize>,
}

#[derive(Debug)]
struct GraphicBlock {
    extension: Option<GraphicControlExtension>,
    descriptor: ImageDescriptor,
    local_color_table: Option<ColorTable>,
}

impl GraphicBlock {
    fn frame_info(&self) -> FrameInfo {
        let descriptor = &self.descriptor;
        let extension = self.extension.as_ref();

        FrameInfo {
            left: descriptor.left_position,
            top: descriptor.top_position,
            width: descriptor.width,
            height: descriptor.height,
            interlaced: descriptor.interlace_flag,
            disposal: extension.map_or(DisposalMethod::Unspecified, |ext| ext.disposal_method),
            transparent: extension
                .filter(|ext| ext.transparent_color_flag)
                .map(|ext| ext.transparent_color_index),
            delay: extension.map_or(0, |ext| ext.delay_time),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

impl TryFrom<&[u8]> for Version {
    type Error = StructuralError;

    fn try_from(value: &[u8]) -> std::result::Result<Self, Self::Error> {
        match value {
            b"87a" => Ok(Version::V87a),
            b"89a" => Ok(Version::V89a),
            version => Err(StructuralError::UnsupportedVersion(
                String::from_utf8_lossy(version).into_owned(),
            )),
        }
    }
}

/// Number of times the animation should be played, from the NETSCAPE2.0
/// application extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Infinite,
    Finite(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub color_resolution: u8,
    pub sort_flag: bool,
    /// Entry count of the global color table, if there is one.
    pub global_color_table_size: Option<usize>,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
}

/// Placement and timing of a single frame, taken from its image descriptor
/// and graphic control extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub disposal: DisposalMethod,
    pub transparent: Option<u8>,
    /// Delay before the next frame, in centiseconds.
    pub delay: u16,
}

/// A decoded frame with its timing and placement.
///
/// [`Decoder::next_frame`] hands out frames borrowing the decoder's canvas,
/// which is redrawn by the next call. [`Frame::to_owned_frame`] copies the
/// pixels into an [`OwnedFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<P> {
    pixels: P,
    width: u16,
    height: u16,
    number: usize,
    timepoint: u64,
    info: FrameInfo,
}

/// A frame holding a reference counted copy of the canvas.
pub type OwnedFrame = Frame<Arc<[u8]>>;

impl<P> Frame<P> {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Centiseconds from the start of the stream until this frame is shown.
    pub fn timepoint(&self) -> u64 {
        self.timepoint
    }

    /// Centiseconds this frame stays on screen.
    pub fn delay(&self) -> u16 {
        self.info.delay
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.info.delay) * 10)
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }
}

impl<'a> Frame<&'a [u8]> {
    /// RGBA8 pixels of the whole logical screen.
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    pub fn to_owned_frame(&self) -> OwnedFrame {
        Frame {
            pixels: Arc::from(self.pixels),
            width: self.width,
            height: self.height,
            number: self.number,
            timepoint: self.timepoint,
            info: self.info,
        }
    }
}

impl Frame<Arc<[u8]>> {
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn shared_pixels(&self) -> Arc<[u8]> {
        Arc::clone(&self.pixels)
    }
}

/// Canvas size limit used unless [`DecoderOptions::max_canvas_bytes`] says
/// otherwise, 32 MiB or roughly a 2896x2896 screen.
pub const DEFAULT_MAX_CANVAS_BYTES: usize = 1 << 25;

#[derive(Debug, Clone)]
pub struct DecoderOptions {
    max_canvas_bytes: Option<usize>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_canvas_bytes: Some(DEFAULT_MAX_CANVAS_BYTES),
        }
    }
}

impl DecoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse streams whose RGBA canvas would be larger than `limit` bytes,
    /// `None` lifts the limit.
    pub fn max_canvas_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_canvas_bytes = limit;
        self
    }
}

#[derive(Debug)]
enum ParserState {
    DetermineNextBlock(Option<GraphicControlExtension>),
    ProcessExtension(u8, Option<GraphicControlExtension>),
    ProcessImageDescriptor(Option<GraphicControlExtension>),
    ProcessLocalColorTable(GraphicBlock),
    ProcessImageData(GraphicBlock),
    FrameDone(FrameInfo),

    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    AwaitingHeader,
    StreamReady,
    FrameReady,
    StreamEnded,
    Invalid(ErrorKind),
}

/// Buffers reused for every frame of a session.
struct Scratch {
    block: [u8; MAX_SUB_BLOCK_LENGTH],
    lzw: LzwScratch,
    indices: Vec<u8>,
}

impl Scratch {
    fn new() -> Self {
        Self {
            block: [0; MAX_SUB_BLOCK_LENGTH],
            lzw: LzwScratch::new(),
            indices: Vec::new(),
        }
    }
}

impl Debug for Scratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scratch")
            .field("indices_capacity", &self.indices.capacity())
            .finish_non_exhaustive()
    }
}

fn truncated_header(what: &'static str) -> impl Fn(io::Error) -> DecodeError {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => StructuralError::TruncatedHeader(what).into(),
        _ => err.into(),
    }
}

fn truncated_block(what: &'static str) -> impl Fn(io::Error) -> DecodeError {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => FrameError::TruncatedBlock(what).into(),
        _ => err.into(),
    }
}

fn read_sub_block<R: Read>(inner: &mut R, buffer: &mut [u8; MAX_SUB_BLOCK_LENGTH]) -> io::Result<usize> {
    let mut length = [0; 1];
    inner.read_exact(&mut length)?;

    let length = length[0] as usize;
    inner.read_exact(&mut buffer[..length])?;
    Ok(length)
}

/// Streaming GIF decoder producing one composited RGBA canvas per call to
/// [`Decoder::next_frame`].
#[derive(Debug)]
pub struct Decoder<R: Read> {
    inner: R,
    options: DecoderOptions,
    start_offset: u64,
    state: SessionState,
    version: Option<Version>,
    screen_descriptor: Option<ScreenDescriptor>,
    global_color_table: Option<ColorTable>,
    loop_count: Option<LoopCount>,
    compositor: Option<Compositor>,
    scratch: Scratch,
    frames_decoded: usize,
    timepoint: u64,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self::with_options(inner, DecoderOptions::default())
    }

    pub fn with_options(inner: R, options: DecoderOptions) -> Self {
        Self {
            inner,
            options,
            start_offset: 0,
            state: SessionState::AwaitingHeader,
            version: None,
            screen_descriptor: None,
            global_color_table: None,
            loop_count: None,
            compositor: None,
            scratch: Scratch::new(),
            frames_decoded: 0,
            timepoint: 0,
        }
    }

    /// Parses the header, logical screen descriptor and global color table
    /// unless that already happened.
    pub fn read_info(&mut self) -> Result<&ScreenDescriptor> {
        if self.state == SessionState::AwaitingHeader {
            if let Err(err) = self.read_header() {
                warn!("reading gif header failed: {}", err);
                self.state = SessionState::Invalid(err.kind());
                return Err(err);
            }
        }

        let cause = self.failure();
        self.screen_descriptor.as_ref().ok_or(DecodeError::Invalidated { cause })
    }

    /// Decodes the next frame onto the canvas.
    ///
    /// Returns `Ok(None)` once the trailer is reached. After an error the
    /// decoder refuses to continue until it is rewound.
    pub fn next_frame(&mut self) -> Result<Option<Frame<&[u8]>>> {
        match self.state {
            SessionState::AwaitingHeader => {
                self.read_info()?;
            },
            SessionState::StreamEnded => return Ok(None),
            SessionState::Invalid(cause) => return Err(DecodeError::Invalidated { cause }),
            SessionState::StreamReady | SessionState::FrameReady => {},
        }

        let info = match self.dispatch() {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!("reached end of stream after {} frames", self.frames_decoded);
                self.state = SessionState::StreamEnded;
                return Ok(None);
            },
            Err(err) => {
                warn!("decoding frame {} failed: {}", self.frames_decoded, err);
                self.state = SessionState::Invalid(err.kind());
                return Err(err);
            },
        };

        let number = self.frames_decoded;
        let timepoint = self.timepoint;
        self.frames_decoded += 1;
        self.timepoint += u64::from(info.delay);
        self.state = SessionState::FrameReady;

        let (width, height) = (self.width(), self.height());
        let cause = self.failure();
        let compositor = self.compositor.as_ref().ok_or(DecodeError::Invalidated { cause })?;
        Ok(Some(Frame {
            pixels: compositor.canvas(),
            width,
            height,
            number,
            timepoint,
            info,
        }))
    }

    /// False once the header failed to parse or a frame failed to decode, and
    /// for streams with an empty logical screen.
    pub fn is_valid(&self) -> bool {
        !matches!(self.state, SessionState::Invalid(_))
            && self
                .screen_descriptor
                .as_ref()
                .is_some_and(|screen| screen.width > 0 && screen.height > 0)
    }

    pub fn width(&self) -> u16 {
        self.screen_descriptor.as_ref().map_or(0, |screen| screen.width)
    }

    pub fn height(&self) -> u16 {
        self.screen_descriptor.as_ref().map_or(0, |screen| screen.height)
    }

    pub fn screen_descriptor(&self) -> Option<&ScreenDescriptor> {
        self.screen_descriptor.as_ref()
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.global_color_table.as_ref()
    }

    /// Loop count announced by the stream, known once the application
    /// extension carrying it has been read.
    pub fn loop_count(&self) -> Option<LoopCount> {
        self.loop_count
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Kind of the failure that stopped the session, structural when the
    /// header was never read.
    fn failure(&self) -> ErrorKind {
        match self.state {
            SessionState::Invalid(kind) => kind,
            _ => ErrorKind::Structural,
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let mut signature = [0; 3];
        self.inner
            .read_exact(&mut signature)
            .map_err(truncated_header("signature"))?;
        if &signature != b"GIF" {
            return Err(StructuralError::InvalidSignature.into());
        }
        debug!("processed signature, got GIF");

        let mut version = [0; 3];
        self.inner
            .read_exact(&mut version)
            .map_err(truncated_header("version"))?;
        let version = Version::try_from(&version[..])?;
        self.version = Some(version);
        debug!("processed version, got {:?}", version);

        let truncated = truncated_header("logical screen descriptor");
        let screen_width = self.read_u16().map_err(&truncated)?;
        let screen_height = self.read_u16().map_err(&truncated)?;

        let packed_fields = self.read_byte().map_err(&truncated)?;

        // packed field start
        let global_color_table_flag = packed_fields & 0b10000000 != 0;
        let color_resolution = (packed_fields >> 4) & 0b00000111;
        let sort_flag = packed_fields & 0b00001000 != 0;
        let global_color_table_bytes = global_color_table_flag.then(|| ColorTable::byte_len(packed_fields));
        // packed field end

        let background_color_index = self.read_byte().map_err(&truncated)?;
        let pixel_aspect_ratio = self.read_byte().map_err(&truncated)?;

        let screen_descriptor = ScreenDescriptor {
            width: screen_width,
            height: screen_height,
            color_resolution,
            sort_flag,
            global_color_table_size: global_color_table_bytes.map(|bytes| bytes / 3),
            background_color_index,
            pixel_aspect_ratio,
        };
        debug!("processed logical screen descriptor, got: {:?}", screen_descriptor);

        self.global_color_table = match global_color_table_bytes {
            Some(bytes) => {
                let table = self
                    .read_bytes(bytes)
                    .map_err(truncated_header("global color table"))?;
                debug!("processed global color table with {} entries", bytes / 3);
                Some(ColorTable::from_rgb(table))
            },
            None => None,
        };

        let background = self
            .global_color_table
            .as_ref()
            .and_then(|table| table.get(background_color_index));

        let reusable = self
            .compositor
            .as_ref()
            .is_some_and(|compositor| compositor.dimensions() == (screen_width.into(), screen_height.into()));
        if reusable {
            if let Some(compositor) = self.compositor.as_mut() {
                compositor.reset(background);
            }
        } else {
            self.compositor = Some(Compositor::new(
                screen_width,
                screen_height,
                background,
                self.options.max_canvas_bytes,
            )?);
        }

        self.screen_descriptor = Some(screen_descriptor);
        self.state = SessionState::StreamReady;
        Ok(())
    }

    /// Runs the block loop until a frame has been drawn or the stream ended.
    fn dispatch(&mut self) -> Result<Option<FrameInfo>> {
        let mut state = ParserState::DetermineNextBlock(None);

        loop {
            trace!("begin parsing state {:?}", state);

            state = self.process_next_state(state)?;
            match state {
                ParserState::FrameDone(info) => break Ok(Some(info)),
                ParserState::Done => break Ok(None),
                _ => {},
            }
        }
    }

    fn process_next_state(&mut self, next_state: ParserState) -> Result<ParserState> {
        use ParserState::*;

        match next_state {
            DetermineNextBlock(graphic_control_extension) => {
                let introducer_or_label = match self.read_byte() {
                    Ok(label) => label,
                    Err(err) if err.kind() == io::ErrorKind::UnexpectedEof && self.frames_decoded > 0 => {
                        warn!("stream ended without a trailer after {} frames", self.frames_decoded);
                        return Ok(Done);
                    },
                    Err(err) => return Err(truncated_block("block label")(err)),
                };

                match introducer_or_label {
                    // extension introducer means that a label follows determining what exact type
                    // of extension it is.
                    EXTENSION_INTRODUCER => {
                        let label = self.read_byte().map_err(truncated_block("extension label"))?;
                        Ok(ProcessExtension(label, graphic_control_extension))
                    },
                    IMAGE_DESCRIPTOR_LABEL => Ok(ProcessImageDescriptor(graphic_control_extension)),
                    TRAILER_LABEL => Ok(Done),
                    label => {
                        warn!("skipping block with unknown label 0x{:02x}", label);
                        self.skip_sub_blocks()?;
                        Ok(DetermineNextBlock(graphic_control_extension))
                    },
                }
            },
            ProcessExtension(label, graphic_control_extension) => {
                self.process_extension(ExtensionType::from(label), graphic_control_extension)
            },
            ProcessImageDescriptor(graphic_control_extension) => {
                let truncated = truncated_block("image descriptor");
                let left_position = self.read_u16().map_err(&truncated)?;
                let top_position = self.read_u16().map_err(&truncated)?;

                let width = self.read_u16().map_err(&truncated)?;
                let height = self.read_u16().map_err(&truncated)?;

                let packed_fields = self.read_byte().map_err(&truncated)?;

                let local_color_table_flag = packed_fields & 0b10000000 != 0;
                let interlace_flag = packed_fields & 0b01000000 != 0;
                let local_color_table_size = local_color_table_flag.then(|| ColorTable::byte_len(packed_fields));

                let graphic_block = GraphicBlock {
                    extension: graphic_control_extension,
                    descriptor: ImageDescriptor {
                        left_position,
                        top_position,
                        width,
                        height,
                        interlace_flag,
                        local_color_table_size,
                    },
                    local_color_table: None,
                };
                debug!("processed image descriptor, got: {:?}", graphic_block.descriptor);

                let next_state = if local_color_table_flag {
                    ProcessLocalColorTable(graphic_block)
                } else {
                    ProcessImageData(graphic_block)
                };

                Ok(next_state)
            },
            ProcessLocalColorTable(mut graphic_block) => {
                let size = graphic_block.descriptor.local_color_table_size.unwrap_or_default();

                let table = self
                    .read_bytes(size)
                    .map_err(truncated_block("local color table"))?;
                graphic_block.local_color_table = Some(ColorTable::from_rgb(table));

                Ok(ProcessImageData(graphic_block))
            },
            ProcessImageData(graphic_block) => self.process_image_data(graphic_block),
            state @ (FrameDone(_) | Done) => Ok(state),
        }
    }

    fn process_extension(
        &mut self,
        label: ExtensionType,
        graphic_control_extension: Option<GraphicControlExtension>,
    ) -> Result<ParserState> {
        use ExtensionType::*;

        debug!("processing extension type: {:?}", label);
        match label {
            Application => {
                let length = self.read_extension_sub_block()?;
                if length == 0 {
                    return Ok(ParserState::DetermineNextBlock(graphic_control_extension));
                }

                let identifier = &self.scratch.block[..length];
                let carries_loop_count = identifier == b"NETSCAPE2.0" || identifier == b"ANIMEXTS1.0";
                debug!("processing application block {}", String::from_utf8_lossy(identifier));

                loop {
                    let length = self.read_extension_sub_block()?;
                    if length == 0 {
                        break;
                    }

                    // sub-block id 1 holds the loop count, other ids are not interesting
                    let data = &self.scratch.block[..length];
                    if carries_loop_count && length >= 3 && data[0] == 1 {
                        let loop_number = u16::from_le_bytes([data[1], data[2]]);
                        let loop_count = match loop_number {
                            0 => LoopCount::Infinite,
                            number => LoopCount::Finite(number),
                        };
                        debug!("processed loop count, got {:?}", loop_count);
                        self.loop_count = Some(loop_count);
                    }
                }

                Ok(ParserState::DetermineNextBlock(graphic_control_extension))
            },
            Comment => {
                loop {
                    let length = self.read_extension_sub_block()?;
                    if length == 0 {
                        break;
                    }
                    debug!("comment: {}", String::from_utf8_lossy(&self.scratch.block[..length]));
                }
                Ok(ParserState::DetermineNextBlock(graphic_control_extension))
            },
            GraphicControl => {
                let length = self.read_extension_sub_block()?;
                if length < 4 {
                    warn!("ignoring graphic control extension with {} byte body", length);
                    if length != 0 {
                        self.skip_sub_blocks()?;
                    }
                    return Ok(ParserState::DetermineNextBlock(graphic_control_extension));
                }

                // packed fields definition
                // XXXYYYZW
                // XXX = reserved, not needed
                // YYY = disposal method, indicates what to do with graphic after displaying
                // Z = user input flag, not needed
                // W = transparent color flag
                let data = &self.scratch.block[..length];
                let packed_fields = data[0];
                let delay_time = u16::from_le_bytes([data[1], data[2]]);
                let transparent_color_index = data[3];

                let disposal = (packed_fields >> 2) & 0b00000111;
                let disposal_method = DisposalMethod::from_u8(disposal).unwrap_or_else(|| {
                    debug!("treating reserved disposal method {} as unspecified", disposal);
                    DisposalMethod::Unspecified
                });
                let transparent_color_flag = packed_fields & 0b00000001 != 0;

                let graphic_control_extension = GraphicControlExtension {
                    disposal_method,
                    transparent_color_flag,

                    delay_time,
                    transparent_color_index,
                };
                debug!("processed GraphicControlExtension: {:?}", graphic_control_extension);

                // block terminator, plus anything an encoder appended
                self.skip_sub_blocks()?;

                Ok(ParserState::DetermineNextBlock(Some(graphic_control_extension)))
            },
            PlainText => {
                // plain text is never rendered, but it still consumes the
                // graphic control extension preceding it
                self.skip_sub_blocks()?;
                Ok(ParserState::DetermineNextBlock(None))
            },
            Unknown(label) => {
                warn!("skipping extension with unknown label 0x{:02x}", label);
                self.skip_sub_blocks()?;
                Ok(ParserState::DetermineNextBlock(graphic_control_extension))
            },
        }
    }

    fn process_image_data(&mut self, graphic_block: GraphicBlock) -> Result<ParserState> {
        let cause = self.failure();
        let lzw_code_size = self.read_byte().map_err(truncated_block("lzw minimum code size"))?;
        let info = graphic_block.frame_info();

        let (screen_width, screen_height) = (self.width(), self.height());
        if u32::from(info.left) + u32::from(info.width) > u32::from(screen_width)
            || u32::from(info.top) + u32::from(info.height) > u32::from(screen_height)
        {
            return Err(FrameError::OutOfBounds {
                left: info.left,
                top: info.top,
                width: info.width,
                height: info.height,
                screen_width,
                screen_height,
            }
            .into());
        }

        let palette = match graphic_block.local_color_table {
            Some(ref table) => table,
            None => self
                .global_color_table
                .as_ref()
                .ok_or(FrameError::MissingColorTable)?,
        };

        let expected = usize::from(info.width) * usize::from(info.height);
        let Scratch { block, lzw, indices } = &mut self.scratch;
        read_image_data(&mut self.inner, block, lzw, indices, lzw_code_size, expected)?;

        let compositor = self.compositor.as_mut().ok_or(DecodeError::Invalidated { cause })?;
        compositor.dispose(info.transparent.is_some());
        compositor.draw(&info, indices, palette);
        debug!("composited frame {} from {:?}", self.frames_decoded, info);

        Ok(ParserState::FrameDone(info))
    }

    fn read_extension_sub_block(&mut self) -> Result<usize> {
        read_sub_block(&mut self.inner, &mut self.scratch.block).map_err(truncated_block("extension data"))
    }

    fn skip_sub_blocks(&mut self) -> Result<()> {
        while self.read_extension_sub_block()? != 0 {}
        Ok(())
    }

    fn read_bytes(&mut self, count: usize) -> io::Result<Box<[u8]>> {
        let mut buffer = vec![0; count];
        self.inner.read_exact(&mut buffer)?;
        Ok(buffer.into_boxed_slice())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut buffer: [u8; 1] = [0; 1];
        self.inner.read_exact(&mut buffer)?;
        Ok(buffer[0])
    }

    fn read_u16(&mut self) -> io::Result<u16> {
        // multi-byte fields are little endian
        let mut buffer: [u8; 2] = [0; 2];
        self.inner.read_exact(&mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }
}

impl<R: Read + Seek> Decoder<R> {
    /// Like [`Decoder::with_options`], but [`Decoder::rewind`] returns to the
    /// reader's current position instead of offset 0.
    pub fn rewindable(mut inner: R, options: DecoderOptions) -> Result<Self> {
        let start_offset = inner.stream_position()?;
        let mut decoder = Self::with_options(inner, options);
        decoder.start_offset = start_offset;
        Ok(decoder)
    }

    /// Restarts the session from the beginning of the stream, clearing the
    /// canvas and re-reading the header.
    pub fn rewind(&mut self) -> Result<()> {
        debug!("rewinding to offset {}", self.start_offset);
        self.state = SessionState::AwaitingHeader;
        self.version = None;
        self.screen_descriptor = None;
        self.global_color_table = None;
        self.loop_count = None;
        self.frames_decoded = 0;
        self.timepoint = 0;

        if let Err(err) = self.inner.seek(SeekFrom::Start(self.start_offset)) {
            self.state = SessionState::Invalid(ErrorKind::Io);
            return Err(err.into());
        }
        self.read_info().map(|_| ())
    }
}

fn read_image_data<R: Read>(
    inner: &mut R,
    block: &mut [u8; MAX_SUB_BLOCK_LENGTH],
    lzw: &mut LzwScratch,
    indices: &mut Vec<u8>,
    lzw_code_size: u8,
    expected: usize,
) -> Result<()> {
    indices.clear();
    indices
        .try_reserve_exact(expected)
        .map_err(|_| DecodeError::Allocation { what: "index buffer", bytes: expected })?;

    let mut decompressor = Decompressor::new(lzw, lzw_code_size)?;
    loop {
        let length = read_sub_block(inner, block).map_err(truncated_block("image data"))?;
        if length == 0 {
            break;
        }
        if !decompressor.is_finished() {
            decompressor.feed(&block[..length], indices, expected)?;
        }
    }

    if indices.len() < expected {
        return Err(FrameError::MissingIndices { expected, actual: indices.len() }.into());
    }
    Ok(())
}
