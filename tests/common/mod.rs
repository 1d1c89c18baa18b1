//! Builds GIF streams for the integration tests, with a reference LZW encoder.

#![allow(dead_code)]

use rand::Rng;

use std::collections::HashMap;

pub const BLACK: [u8; 3] = [0, 0, 0];
pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

pub const PALETTE: [[u8; 3]; 4] = [BLACK, RED, GREEN, BLUE];

pub const DISPOSE_NONE: u8 = 1;
pub const DISPOSE_BACKGROUND: u8 = 2;
pub const DISPOSE_PREVIOUS: u8 = 3;

const MAX_CODE_SIZE: u32 = 12;

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    buffer: u32,
    length: u32,
}

impl BitWriter {
    fn write(&mut self, code: u16, width: u32) {
        self.buffer |= u32::from(code) << self.length;
        self.length += width;
        while self.length >= 8 {
            self.out.push(self.buffer as u8);
            self.buffer >>= 8;
            self.length -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.length > 0 {
            self.out.push(self.buffer as u8);
        }
        self.out
    }
}

/// GIF flavoured LZW encoder. When `clear_after` is set, a clear code is
/// emitted after that many data codes, on top of the resets forced by a full
/// dictionary.
pub fn lzw_encode(indices: &[u8], minimum_code_size: u8, clear_after: Option<usize>) -> Vec<u8> {
    let clear_code: u16 = 1 << minimum_code_size;
    let end_code = clear_code + 1;

    let mut writer = BitWriter::default();
    let mut code_size = u32::from(minimum_code_size) + 1;
    let mut next_code = end_code + 1;
    let mut table: HashMap<(u16, u8), u16> = HashMap::new();
    let mut emitted = 0;

    writer.write(clear_code, code_size);

    let mut prefix: Option<u16> = None;
    for &index in indices {
        let Some(current) = prefix else {
            prefix = Some(index.into());
            continue;
        };

        if let Some(&code) = table.get(&(current, index)) {
            prefix = Some(code);
            continue;
        }

        writer.write(current, code_size);
        emitted += 1;
        if next_code >= 1 << code_size && code_size < MAX_CODE_SIZE {
            code_size += 1;
        }

        let forced = clear_after.is_some_and(|after| emitted % after == 0);
        if forced || usize::from(next_code) == 1 << MAX_CODE_SIZE {
            writer.write(clear_code, code_size);
            table.clear();
            code_size = u32::from(minimum_code_size) + 1;
            next_code = end_code + 1;
        } else {
            table.insert((current, index), next_code);
            next_code += 1;
        }

        prefix = Some(index.into());
    }

    if let Some(current) = prefix {
        writer.write(current, code_size);
        if next_code >= 1 << code_size && code_size < MAX_CODE_SIZE {
            code_size += 1;
        }
    }
    writer.write(end_code, code_size);
    writer.finish()
}

/// Rows in the order an interlaced image stores them.
pub fn interlace_rows(height: usize) -> Vec<usize> {
    [(0, 8), (4, 8), (2, 4), (1, 2)]
        .iter()
        .flat_map(|&(start, step)| (start..height).step_by(step))
        .collect()
}

fn table_size_field(entries: usize) -> u8 {
    let mut field = 0;
    while (2usize << field) < entries {
        field += 1;
    }
    field
}

fn write_palette(bytes: &mut Vec<u8>, palette: &[[u8; 3]]) -> u8 {
    let field = table_size_field(palette.len());
    for i in 0..(2usize << field) {
        bytes.extend_from_slice(&palette.get(i).copied().unwrap_or(BLACK));
    }
    field
}

fn write_sub_blocks(bytes: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        bytes.push(chunk.len() as u8);
        bytes.extend_from_slice(chunk);
    }
    bytes.push(0);
}

pub struct Image<'a> {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub local_palette: Option<&'a [[u8; 3]]>,
    /// Indices in display order, reordered when `interlaced` is set.
    pub indices: Vec<u8>,
    pub clear_after: Option<usize>,
}

impl<'a> Image<'a> {
    pub fn new(left: u16, top: u16, width: u16, height: u16, indices: Vec<u8>) -> Self {
        assert_eq!(indices.len(), usize::from(width) * usize::from(height));
        Self {
            left,
            top,
            width,
            height,
            interlaced: false,
            local_palette: None,
            indices,
            clear_after: None,
        }
    }

    pub fn filled(left: u16, top: u16, width: u16, height: u16, index: u8) -> Self {
        Self::new(left, top, width, height, vec![index; usize::from(width) * usize::from(height)])
    }
}

pub struct GifBuilder {
    bytes: Vec<u8>,
    palette_entries: usize,
}

impl GifBuilder {
    pub fn new(width: u16, height: u16, palette: Option<&[[u8; 3]]>, background: u8) -> Self {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());

        let packed_at = bytes.len();
        bytes.push(0);
        bytes.push(background);
        bytes.push(0);

        let mut palette_entries = 0;
        if let Some(palette) = palette {
            let field = write_palette(&mut bytes, palette);
            bytes[packed_at] = 0b1000_0000 | 0b0111_0000 | field;
            palette_entries = 2 << field;
        }

        Self { bytes, palette_entries }
    }

    pub fn graphic_control(mut self, disposal: u8, transparent: Option<u8>, delay: u16) -> Self {
        let packed = (disposal << 2) | u8::from(transparent.is_some());
        self.bytes.extend_from_slice(&[0x21, 0xf9, 0x04, packed]);
        self.bytes.extend_from_slice(&delay.to_le_bytes());
        self.bytes.push(transparent.unwrap_or(0));
        self.bytes.push(0);
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xfe]);
        write_sub_blocks(&mut self.bytes, text.as_bytes());
        self
    }

    pub fn extension(mut self, label: u8, payload: &[u8]) -> Self {
        self.bytes.extend_from_slice(&[0x21, label]);
        write_sub_blocks(&mut self.bytes, payload);
        self
    }

    pub fn netscape_loop(mut self, count: u16) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xff, 0x0b]);
        self.bytes.extend_from_slice(b"NETSCAPE2.0");
        self.bytes.extend_from_slice(&[0x03, 0x01]);
        self.bytes.extend_from_slice(&count.to_le_bytes());
        self.bytes.push(0);
        self
    }

    pub fn raw(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn image(mut self, image: Image<'_>) -> Self {
        self.bytes.push(0x2c);
        for value in [image.left, image.top, image.width, image.height] {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }

        let packed_at = self.bytes.len();
        self.bytes.push(if image.interlaced { 0b0100_0000 } else { 0 });
        let palette_entries = match image.local_palette {
            Some(palette) => {
                let field = write_palette(&mut self.bytes, palette);
                self.bytes[packed_at] |= 0b1000_0000 | field;
                2 << field
            },
            None => self.palette_entries,
        };

        let width = usize::from(image.width);
        let indices = if image.interlaced && width > 0 {
            interlace_rows(usize::from(image.height))
                .into_iter()
                .flat_map(|row| image.indices[row * width..(row + 1) * width].iter().copied())
                .collect()
        } else {
            image.indices
        };

        let minimum_code_size = (table_size_field(palette_entries) + 1).max(2);
        self.bytes.push(minimum_code_size);
        let compressed = lzw_encode(&indices, minimum_code_size, image.clear_after);
        write_sub_blocks(&mut self.bytes, &compressed);
        self
    }

    /// Image descriptor followed by hand written image data sub-blocks.
    pub fn raw_image(mut self, width: u16, height: u16, minimum_code_size: u8, data: &[u8]) -> Self {
        self.bytes.push(0x2c);
        for value in [0, 0, width, height] {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.bytes.push(0);
        self.bytes.push(minimum_code_size);
        write_sub_blocks(&mut self.bytes, data);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(0x3b);
        self.bytes
    }

    pub fn finish_without_trailer(self) -> Vec<u8> {
        self.bytes
    }
}

/// Expands indices through a palette the way an opaque frame is drawn.
pub fn rgba(indices: &[u8], palette: &[[u8; 3]]) -> Vec<u8> {
    indices
        .iter()
        .flat_map(|index| {
            let [r, g, b] = palette[usize::from(*index)];
            [r, g, b, 0xff]
        })
        .collect()
}

pub fn pixel(pixels: &[u8], width: u16, x: usize, y: usize) -> [u8; 4] {
    let offset = (y * usize::from(width) + x) * 4;
    pixels[offset..offset + 4].try_into().unwrap()
}

pub fn opaque([r, g, b]: [u8; 3]) -> [u8; 4] {
    [r, g, b, 0xff]
}

/// Random indices below `colors`.
pub fn random_indices(rng: &mut impl Rng, count: usize, colors: u16) -> Vec<u8> {
    (0..count).map(|_| rng.gen_range(0..colors) as u8).collect()
}

/// A palette of `entries` distinct colors.
pub fn gradient_palette(entries: usize) -> Vec<[u8; 3]> {
    (0..entries).map(|i| [i as u8, 255 - i as u8, (i / 2) as u8]).collect()
}
