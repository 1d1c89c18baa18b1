/// Least-significant-bit-first reader for the LZW code stream.
///
/// Image data arrives in sub-blocks of at most 255 bytes and a code may
/// straddle two of them, so bytes are pushed in as they are read and codes
/// are pulled out once enough bits have accumulated.
#[derive(Debug, Default)]
pub struct BitReader {
    buffer: u64,
    // number of valid bits in `buffer`, counted from the low end
    length: u32,
}

impl BitReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a byte above the bits already held.
    pub fn push(&mut self, byte: u8) {
        debug_assert!(self.length <= 56, "bit reader overflow, drain codes between pushes");
        self.buffer |= (byte as u64) << self.length;
        self.length += 8;
    }

    pub fn next(&mut self, count: u32) -> Option<u16> {
        debug_assert!(count <= 16);
        if count > self.length {
            return None;
        }

        let value = self.buffer & ((1 << count) - 1);
        self.buffer >>= count;
        self.length -= count;
        Some(value as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::BitReader;

    #[test]
    fn it_works() {
        let buffer = &[0b10000100, 0b10001111, 0b10101001];
        let mut reader = BitReader::new();
        buffer.iter().for_each(|byte| reader.push(*byte));

        assert_eq!(reader.next(3), Some(0b00000100));
        assert_eq!(reader.next(3), Some(0b00000000));
        assert_eq!(reader.next(3), Some(0b00000110));
        assert_eq!(reader.next(3), Some(0b00000111));
        assert_eq!(reader.next(3), Some(0b00000000));
        assert_eq!(reader.next(3), Some(0b00000011));
        assert_eq!(reader.next(3), Some(0b00000010));
        assert_eq!(reader.next(3), Some(0b00000101));
        assert_eq!(reader.next(3), None);
    }

    #[test]
    fn code_straddles_pushes() {
        let mut reader = BitReader::new();
        reader.push(0xff);
        assert_eq!(reader.next(12), None);

        reader.push(0b0000_0101);
        assert_eq!(reader.next(12), Some(0x5ff));
        assert_eq!(reader.next(5), None);
        assert_eq!(reader.next(4), Some(0));
    }
}
