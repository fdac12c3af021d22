use crate::error::{RemuxError, Result};

/// Cursor over packed header fields, most significant bit first.
///
/// This is the bit order of ADTS, PES and PSI headers.
///
/// ```
/// use tsremux::utils::BitReader;
///
/// // ADTS sync word and the MPEG version bit
/// let data = [0xFF, 0xF1];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bits(12).unwrap(), 0xFFF);
/// assert_eq!(reader.read_bit().unwrap(), false);
/// assert_eq!(reader.available_bits(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit position.
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `n` bits (at most 32) as a big-endian number. Nothing is
    /// consumed when fewer than `n` bits remain.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(RemuxError::Parser(format!("cannot read {} bits into a u32", n)));
        }
        self.ensure(n as usize)?;

        let mut value = 0u64;
        let mut remaining = n as usize;
        while remaining > 0 {
            let byte = self.data[self.position / 8];
            let used = self.position % 8;
            let take = (8 - used).min(remaining);
            let bits = (byte >> (8 - used - take)) & (0xFF >> (8 - take));

            value = (value << take) | bits as u64;
            self.position += take;
            remaining -= take;
        }
        Ok(value as u32)
    }

    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        self.ensure(n as usize)?;
        self.position += n as usize;
        Ok(())
    }

    pub fn available_bits(&self) -> usize {
        self.data.len() * 8 - self.position
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if n > self.available_bits() {
            return Err(RemuxError::Parser(format!(
                "need {} bits, {} left",
                n,
                self.available_bits()
            )));
        }
        Ok(())
    }
}

/// Packs fields most significant bit first into a byte vector.
///
/// The final byte is zero padded when the written bit count is not a
/// multiple of eight.
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_offset: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        if self.bit_offset == 0 {
            self.data.push(0);
        }
        if bit {
            if let Some(last) = self.data.last_mut() {
                *last |= 1 << (7 - self.bit_offset);
            }
        }
        self.bit_offset = (self.bit_offset + 1) % 8;
    }

    /// Writes the low `n` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, n: u32) -> Result<()> {
        if n > 32 {
            return Err(RemuxError::Parser(format!("cannot write {} bits from a u32", n)));
        }
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    pub fn bit_len(&self) -> usize {
        match self.bit_offset {
            0 => self.data.len() * 8,
            used => (self.data.len() - 1) * 8 + used as usize,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_adts_fields() {
        // 44.1 kHz stereo LC header, frame length 1031
        let data = [0xFF, 0xF1, 0x50, 0x80, 0x80, 0xFF, 0xFC];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(12).unwrap(), 0xFFF);
        reader.skip_bits(3).unwrap();
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(2).unwrap(), 1);
        assert_eq!(reader.read_bits(4).unwrap(), 4);
        reader.skip_bits(1).unwrap();
        assert_eq!(reader.read_bits(3).unwrap(), 2);
        reader.skip_bits(4).unwrap();
        assert_eq!(reader.read_bits(13).unwrap(), 1031);
        assert_eq!(reader.available_bits(), 13);
    }

    #[test]
    fn test_wide_and_empty_reads() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        reader.skip_bits(4).unwrap();
        assert_eq!(reader.read_bits(32).unwrap(), 0x2345_6789);
        assert!(reader.read_bits(33).is_err());
    }

    #[test]
    fn test_short_read_consumes_nothing() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(4).unwrap();
        assert!(reader.read_bits(5).is_err());
        assert!(reader.skip_bits(5).is_err());
        assert_eq!(reader.available_bits(), 4);
        assert_eq!(reader.read_bits(4).unwrap(), 0xF);
        assert!(reader.read_bit().is_err());
    }

    #[test]
    fn test_writer_packs_fields() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFFF, 12).unwrap();
        writer.write_bits(0, 3).unwrap();
        writer.write_bit(true);
        assert_eq!(writer.bit_len(), 16);
        assert_eq!(writer.into_bytes(), vec![0xFF, 0xF1]);

        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3).unwrap();
        assert_eq!(writer.bit_len(), 3);
        assert!(writer.write_bits(0, 33).is_err());
        assert_eq!(writer.into_bytes(), vec![0b1010_0000]);
    }

    #[quickcheck]
    fn prop_reads_match_single_bits(data: Vec<u8>, widths: Vec<u8>) -> bool {
        let mut chunked = BitReader::new(&data);
        let mut single = BitReader::new(&data);
        for width in widths {
            let width = (width % 33) as u32;
            match chunked.read_bits(width) {
                Ok(value) => {
                    let mut expected = 0u32;
                    for _ in 0..width {
                        expected = (expected << 1) | single.read_bit().map(u32::from).unwrap_or(0);
                    }
                    if value != expected {
                        return false;
                    }
                }
                Err(_) => return (width as usize) > single.available_bits(),
            }
        }
        chunked.available_bits() == single.available_bits()
    }

    #[quickcheck]
    fn prop_writer_reader_agree(fields: Vec<(u32, u8)>) -> bool {
        let fields: Vec<(u32, u32)> = fields
            .into_iter()
            .map(|(v, n)| {
                let n = (n % 33) as u32;
                let mask = if n == 0 { 0 } else { u32::MAX >> (32 - n) };
                (v & mask, n)
            })
            .collect();

        let mut writer = BitWriter::new();
        for &(value, n) in &fields {
            writer.write_bits(value, n).unwrap();
        }
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        fields
            .iter()
            .all(|&(value, n)| reader.read_bits(n).map(|v| v == value).unwrap_or(false))
    }
}
