use super::decoder::FrameInfo;
use super::error::DecodeError;
use super::{ColorTable, DisposalMethod};

use log::debug;

const CHANNELS: usize = 4;
const TRANSPARENT: [u8; CHANNELS] = [0, 0, 0, 0];

// (first row, row step) of the four interlace passes
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// Row numbers in the order their data appears in the image data stream.
pub(crate) struct InterlacedRows {
    height: usize,
    pass: usize,
    row: usize,
}

impl InterlacedRows {
    pub(crate) fn new(height: usize) -> Self {
        Self { height, pass: 0, row: INTERLACE_PASSES[0].0 }
    }
}

impl Iterator for InterlacedRows {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.pass < INTERLACE_PASSES.len() {
            if self.row < self.height {
                let row = self.row;
                self.row += INTERLACE_PASSES[self.pass].1;
                return Some(row);
            }

            self.pass += 1;
            if let Some((start, _)) = INTERLACE_PASSES.get(self.pass) {
                self.row = *start;
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

impl From<&FrameInfo> for Rect {
    fn from(info: &FrameInfo) -> Self {
        Self {
            left: info.left.into(),
            top: info.top.into(),
            width: info.width.into(),
            height: info.height.into(),
        }
    }
}

/// What has to happen to the canvas before the next frame is drawn.
#[derive(Debug, Clone, Copy)]
struct PendingDisposal {
    method: DisposalMethod,
    rect: Rect,
}

/// Persistent RGBA canvas the frames of one stream are drawn onto.
#[derive(Debug)]
pub(crate) struct Compositor {
    width: usize,
    height: usize,
    canvas: Vec<u8>,
    // only allocated once a frame asks to be restored to the previous canvas
    history: Option<Vec<u8>>,
    background: [u8; CHANNELS],
    pending: Option<PendingDisposal>,
}

impl Compositor {
    pub(crate) fn new(
        width: u16,
        height: u16,
        background: Option<[u8; 3]>,
        max_canvas_bytes: Option<usize>,
    ) -> Result<Self, DecodeError> {
        let (width, height) = (usize::from(width), usize::from(height));
        let bytes = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .ok_or(DecodeError::Allocation { what: "canvas", bytes: usize::MAX })?;
        if max_canvas_bytes.is_some_and(|max| bytes > max) {
            return Err(DecodeError::Allocation { what: "canvas", bytes });
        }

        Ok(Self {
            width,
            height,
            canvas: vec![0; bytes],
            history: None,
            background: background_pixel(background),
            pending: None,
        })
    }

    pub(crate) fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Brings the canvas back to its state before the first frame.
    pub(crate) fn reset(&mut self, background: Option<[u8; 3]>) {
        self.canvas.fill(0);
        self.history = None;
        self.background = background_pixel(background);
        self.pending = None;
    }

    pub(crate) fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    /// Applies the disposal method of the previously drawn frame.
    pub(crate) fn dispose(&mut self, next_has_transparency: bool) {
        let Some(PendingDisposal { method, rect }) = self.pending.take() else {
            return;
        };

        match method {
            DisposalMethod::RestoreToBackgroundColor => {
                let fill = if next_has_transparency { TRANSPARENT } else { self.background };
                for row in rect.top..rect.top + rect.height {
                    let range = self.row_range(row, &rect);
                    self.canvas[range]
                        .chunks_exact_mut(CHANNELS)
                        .for_each(|pixel| pixel.copy_from_slice(&fill));
                }
            },
            DisposalMethod::RestoreToPrevious => {
                // restore-previous frames always snapshot before drawing
                let Some(history) = self.history.as_ref() else {
                    return;
                };
                for row in rect.top..rect.top + rect.height {
                    let range = self.row_range(row, &rect);
                    self.canvas[range.clone()].copy_from_slice(&history[range]);
                }
            },
            DisposalMethod::Unspecified | DisposalMethod::DoNotDispose => {},
        }
    }

    /// Draws decoded indices onto the canvas and records how to dispose of
    /// the frame afterwards.
    pub(crate) fn draw(&mut self, info: &FrameInfo, indices: &[u8], palette: &ColorTable) {
        let rect = Rect::from(info);

        if info.disposal == DisposalMethod::RestoreToPrevious {
            match self.history.as_mut() {
                Some(history) => history.copy_from_slice(&self.canvas),
                None => {
                    debug!("allocating history buffer for restore to previous disposal");
                    self.history = Some(self.canvas.clone());
                },
            }
        }

        if rect.width > 0 {
            let rows: Box<dyn Iterator<Item = usize>> = if info.interlaced {
                Box::new(InterlacedRows::new(rect.height))
            } else {
                Box::new(0..rect.height)
            };

            for (source, row) in indices.chunks_exact(rect.width).zip(rows) {
                let range = self.row_range(rect.top + row, &rect);
                for (pixel, index) in self.canvas[range].chunks_exact_mut(CHANNELS).zip(source) {
                    if info.transparent == Some(*index) {
                        continue;
                    }
                    // indices past the end of a short palette come out black
                    let [r, g, b] = palette.get(*index).unwrap_or_default();
                    pixel.copy_from_slice(&[r, g, b, 0xff]);
                }
            }
        }

        self.pending = Some(PendingDisposal { method: info.disposal, rect });
    }

    fn row_range(&self, row: usize, rect: &Rect) -> std::ops::Range<usize> {
        let start = (row * self.width + rect.left) * CHANNELS;
        start..start + rect.width * CHANNELS
    }
}

fn background_pixel(background: Option<[u8; 3]>) -> [u8; CHANNELS] {
    match background {
        Some([r, g, b]) => [r, g, b, 0xff],
        None => TRANSPARENT,
    }
}
