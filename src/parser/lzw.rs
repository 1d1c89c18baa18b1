use super::bit_reader::BitReader;
use super::error::FrameError;

use log::trace;

pub(crate) const MAX_CODE_SIZE: u32 = 12;
const MAX_TABLE_LENGTH: usize = 1 << MAX_CODE_SIZE;
const NO_PREFIX: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    prefix: u16,
    suffix: u8,
    first: u8,
    length: u16,
}

/// Dictionary and string buffer for one decode session. Reused across frames
/// so decoding a frame never allocates.
#[derive(Debug)]
pub(crate) struct LzwScratch {
    table: Box<[Entry]>,
    string: Box<[u8]>,
}

impl LzwScratch {
    pub(crate) fn new() -> Self {
        Self {
            table: vec![Entry::default(); MAX_TABLE_LENGTH].into_boxed_slice(),
            string: vec![0; MAX_TABLE_LENGTH].into_boxed_slice(),
        }
    }
}

/// GIF flavoured LZW decompressor, fed one data sub-block at a time.
#[derive(Debug)]
pub(crate) struct Decompressor<'s> {
    scratch: &'s mut LzwScratch,
    reader: BitReader,
    minimum_code_size: u32,
    clear_code: u16,
    end_of_information_code: u16,
    code_size: u32,
    next_code: u16,
    last_code: Option<u16>,
    finished: bool,
}

impl<'s> Decompressor<'s> {
    pub(crate) fn new(scratch: &'s mut LzwScratch, minimum_code_size: u8) -> Result<Self, FrameError> {
        if !(2..=8).contains(&minimum_code_size) {
            return Err(FrameError::InvalidCodeSize(minimum_code_size));
        }

        let clear_code: u16 = 1 << minimum_code_size;
        let mut decompressor = Self {
            scratch,
            reader: BitReader::new(),
            minimum_code_size: minimum_code_size.into(),
            clear_code,
            end_of_information_code: clear_code + 1,
            code_size: 0,
            next_code: 0,
            last_code: None,
            finished: false,
        };
        decompressor.reset();
        Ok(decompressor)
    }

    fn reset(&mut self) {
        for i in 0..self.clear_code {
            self.scratch.table[i as usize] = Entry {
                prefix: NO_PREFIX,
                suffix: i as u8,
                first: i as u8,
                length: 1,
            };
        }
        self.code_size = self.minimum_code_size + 1;
        self.next_code = self.end_of_information_code + 1;
        self.last_code = None;
    }

    /// True once the end of information code was read. Further input belongs
    /// to the sub-block padding and is ignored.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decodes `data` and appends the indices to `out`, dropping anything
    /// past `limit` indices.
    pub(crate) fn feed(&mut self, data: &[u8], out: &mut Vec<u8>, limit: usize) -> Result<(), FrameError> {
        for byte in data {
            if self.finished {
                break;
            }

            self.reader.push(*byte);
            while let Some(code) = self.reader.next(self.code_size) {
                if code == self.end_of_information_code {
                    self.finished = true;
                    break;
                }
                self.process_code(code, out, limit)?;
            }
        }
        Ok(())
    }

    fn process_code(&mut self, code: u16, out: &mut Vec<u8>, limit: usize) -> Result<(), FrameError> {
        if code == self.clear_code {
            trace!("clear code, resetting table at {} entries", self.next_code);
            self.reset();
            return Ok(());
        }

        let Some(last_code) = self.last_code else {
            // the first code after a clear has no predecessor and must be a literal
            if code >= self.clear_code {
                return Err(FrameError::InvalidCode { code, next: self.next_code });
            }
            self.emit(code, out, limit);
            self.last_code = Some(code);
            return Ok(());
        };

        // {CODE} is known: K is its first index. {CODE} is the entry about to
        // be added: its string is {CODE-1}+K where K is the first index of {CODE-1}.
        let first = if code < self.next_code {
            self.scratch.table[code as usize].first
        } else if code == self.next_code && (self.next_code as usize) < MAX_TABLE_LENGTH {
            self.scratch.table[last_code as usize].first
        } else {
            return Err(FrameError::InvalidCode { code, next: self.next_code });
        };

        if (self.next_code as usize) < MAX_TABLE_LENGTH {
            let previous = self.scratch.table[last_code as usize];
            self.scratch.table[self.next_code as usize] = Entry {
                prefix: last_code,
                suffix: first,
                first: previous.first,
                length: previous.length + 1,
            };
            self.next_code += 1;

            // early change: the width grows as soon as the next code would not fit
            if self.next_code == 1 << self.code_size && self.code_size < MAX_CODE_SIZE {
                self.code_size += 1;
            }
        }

        self.emit(code, out, limit);
        self.last_code = Some(code);
        Ok(())
    }

    fn emit(&mut self, code: u16, out: &mut Vec<u8>, limit: usize) {
        let length = self.scratch.table[code as usize].length as usize;

        // walk the prefix chain backwards, filling the string from its end
        let mut current = code;
        for slot in self.scratch.string[..length].iter_mut().rev() {
            let entry = self.scratch.table[current as usize];
            *slot = entry.suffix;
            current = entry.prefix;
        }

        let room = limit.saturating_sub(out.len());
        out.extend_from_slice(&self.scratch.string[..length.min(room)]);
    }
}

#[cfg(test)]
pub(crate) fn lzw_decode(buf: &[u8], minimum_code_size: u8, limit: usize) -> Result<Vec<u8>, FrameError> {
    let mut scratch = LzwScratch::new();
    let mut decompressor = Decompressor::new(&mut scratch, minimum_code_size)?;
    let mut indices = Vec::with_capacity(limit);
    // feed in small chunks to exercise codes that straddle sub-blocks
    for chunk in buf.chunks(3) {
        decompressor.feed(chunk, &mut indices, limit)?;
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::{lzw_decode, FrameError};

    // 10x10 sample image from the GIF89a walkthrough, minimum code size 2
    const SAMPLE: &[u8] = &[
        0x8c, 0x2d, 0x99, 0x87, 0x2a, 0x1c, 0xdc, 0x33, 0xa0, 0x02, 0x75, 0xec, 0x95, 0xfa, 0xa8,
        0xde, 0x60, 0x8c, 0x04, 0x91, 0x4c, 0x01,
    ];

    #[test]
    fn decodes_sample_image() {
        let indices = lzw_decode(SAMPLE, 2, 100).unwrap();
        assert_eq!(indices.len(), 100);

        let expected_rows: [[u8; 10]; 10] = [
            [1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
            [1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
            [1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
            [1, 1, 1, 0, 0, 0, 0, 2, 2, 2],
            [1, 1, 1, 0, 0, 0, 0, 2, 2, 2],
            [2, 2, 2, 0, 0, 0, 0, 1, 1, 1],
            [2, 2, 2, 0, 0, 0, 0, 1, 1, 1],
            [2, 2, 2, 2, 2, 1, 1, 1, 1, 1],
            [2, 2, 2, 2, 2, 1, 1, 1, 1, 1],
            [2, 2, 2, 2, 2, 1, 1, 1, 1, 1],
        ];
        for (row, expected) in indices.chunks(10).zip(expected_rows.iter()) {
            assert_eq!(row, expected);
        }
    }

    #[test]
    fn surplus_indices_are_dropped() {
        let indices = lzw_decode(SAMPLE, 2, 7).unwrap();
        assert_eq!(indices, [1, 1, 1, 1, 1, 2, 2]);
    }

    #[test]
    fn rejects_out_of_range_code_size() {
        assert!(matches!(lzw_decode(SAMPLE, 1, 100), Err(FrameError::InvalidCodeSize(1))));
        assert!(matches!(lzw_decode(SAMPLE, 9, 100), Err(FrameError::InvalidCodeSize(9))));
    }

    #[test]
    fn rejects_code_past_next_free_slot() {
        // clear (4), literal 1, then code 7 while the next free slot is 6
        // 3-bit codes packed lsb first: 100 001 111 -> 0b11_001_100, 0b1
        let data = [0b1100_1100, 0b0000_0001];
        assert!(matches!(
            lzw_decode(&data, 2, 100),
            Err(FrameError::InvalidCode { code: 7, next: 6 })
        ));
    }

    #[test]
    fn rejects_dictionary_code_right_after_clear() {
        // clear (4) then 6
        let data = [0b0011_0100];
        assert!(matches!(lzw_decode(&data, 2, 100), Err(FrameError::InvalidCode { code: 6, .. })));
    }
}
