// Cursor over a borrowed byte slice. Every read either returns the bytes
// asked for or fails with ParseError::Eof.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ParseError, Result};

pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn read_fixed(&mut self, width: usize) -> Result<&'a [u8]> {
        if self.remaining() < width {
            return Err(ParseError::Eof {
                offset: self.pos,
                wanted: width,
            });
        }
        let slice = &self.data[self.pos..self.pos + width];
        self.pos += width;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.read_fixed(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_fixed(4)?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_fixed(4)?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_fixed(4)?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_fixed(8)?))
    }

    // Little-endian base-128 varint, capped at 64 bits of shift.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(ParseError::Overflow);
            }
            result |= u64::from(byte & 0x7F).checked_shl(shift).unwrap_or(0);
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result)
    }

    // Length-prefixed UTF-8 string. Invalid sequences are replaced lossily.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint()?;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_fixed(len as usize)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    // Reads count*width bytes laid out as width columns of count bytes each
    // and reassembles them into count rows of width bytes.
    pub fn read_interleaved(&mut self, count: usize, width: usize) -> Result<Vec<u8>> {
        if count == 0 || width == 0 {
            return Ok(Vec::new());
        }
        let total = count
            .checked_mul(width)
            .ok_or(ParseError::Overflow)?;
        let columns = self.read_fixed(total)?;
        let mut rows = vec![0u8; total];
        for col in 0..width {
            for row in 0..count {
                rows[row * width + col] = columns[col * count + row];
            }
        }
        Ok(rows)
    }

    // One-byte discriminator, then either nine custom floats (0) or an
    // index into the special-orientation table (1..=36, identity for now).
    pub fn read_rotation_matrix(&mut self) -> Result<[f32; 9]> {
        let id = self.read_u8()?;
        match id {
            0 => {
                let mut out = [0f32; 9];
                for slot in &mut out {
                    *slot = self.read_f32_le()?;
                }
                Ok(out)
            }
            1..=36 => Ok(IDENTITY_ROTATION),
            other => Err(ParseError::BadRotationId(other)),
        }
    }
}

pub const IDENTITY_ROTATION: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[cfg(test)]
mod tests {
    use super::*;

    fn write_varint(mut n: u64, out: &mut Vec<u8>) {
        loop {
            let mut byte = (n & 0x7F) as u8;
            n >>= 7;
            if n != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if n == 0 {
                break;
            }
        }
    }

    #[test]
    fn varint_round_trip() {
        let samples: [u64; 9] = [
            0,
            1,
            127,
            128,
            300,
            u32::MAX as u64,
            u64::from(u32::MAX) + 1,
            1u64 << 63,
            u64::MAX,
        ];
        for &n in &samples {
            let mut buf = Vec::new();
            write_varint(n, &mut buf);
            let mut reader = ByteReader::new(&buf);
            assert_eq!(reader.read_varint().unwrap(), n);
        }
    }

    #[test]
    fn varint_too_many_continuations_overflows() {
        let buf = vec![0x80u8; 11];
        let mut reader = ByteReader::new(&buf);
        assert!(matches!(reader.read_varint(), Err(ParseError::Overflow)));
    }

    #[test]
    fn interleaved_round_trip() {
        let matrix: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9], vec![10, 11, 12]];
        let count = matrix.len();
        let width = matrix[0].len();
        let mut columns = vec![0u8; count * width];
        for (row, values) in matrix.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                columns[col * count + row] = value;
            }
        }
        let mut reader = ByteReader::new(&columns);
        let rows = reader.read_interleaved(count, width).unwrap();
        let flat: Vec<u8> = matrix.into_iter().flatten().collect();
        assert_eq!(rows, flat);
    }

    #[test]
    fn read_fixed_eof_on_short_buffer() {
        let buf = [1, 2, 3];
        let mut reader = ByteReader::new(&buf);
        assert!(reader.read_fixed(10).is_err());
    }

    #[test]
    fn string_length_zero_is_empty() {
        let mut reader = ByteReader::new(&[0x00]);
        assert_eq!(reader.read_string().unwrap(), "");
    }

    #[test]
    fn string_invalid_utf8_is_lossy_not_fatal() {
        let mut buf = vec![0x03];
        buf.extend_from_slice(&[0xff, 0xfe, 0x41]);
        let mut reader = ByteReader::new(&buf);
        let s = reader.read_string().unwrap();
        assert!(s.ends_with('A'));
    }

    #[test]
    fn rotation_matrix_identity_fallback() {
        let mut reader = ByteReader::new(&[5]);
        assert_eq!(reader.read_rotation_matrix().unwrap(), IDENTITY_ROTATION);
    }

    #[test]
    fn rotation_matrix_invalid_discriminator() {
        let mut reader = ByteReader::new(&[200]);
        assert!(matches!(
            reader.read_rotation_matrix(),
            Err(ParseError::BadRotationId(200))
        ));
    }
}
