//! Little-endian byte stream primitives used by the ABI wire format.

use crate::abi::AbiError;

pub struct AbiReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AbiReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes consumed since `start`, a value previously returned by `position`.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.pos)..self.pos]
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], AbiError> {
        if len > self.remaining() {
            return Err(AbiError::UnexpectedEof { needed: len, remaining: self.remaining() });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], AbiError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, AbiError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, AbiError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, AbiError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, AbiError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u128(&mut self) -> Result<u128, AbiError> {
        Ok(u128::from_le_bytes(self.read_array()?))
    }

    pub fn read_varuint32(&mut self) -> Result<u32, AbiError> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(AbiError::InvalidData("varuint32 is longer than 5 bytes".to_string()));
            }
        }
        u32::try_from(value).map_err(|_| AbiError::InvalidData("varuint32 overflows 32 bits".to_string()))
    }

    /// Zigzag encoded signed variant of `varuint32`.
    pub fn read_varint32(&mut self) -> Result<i32, AbiError> {
        let raw = self.read_varuint32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Length-prefixed byte blob.
    pub fn read_blob(&mut self) -> Result<&'a [u8], AbiError> {
        let len = self.read_varuint32()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> Result<String, AbiError> {
        let bytes = self.read_blob()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| AbiError::InvalidData(format!("invalid UTF-8 string: {e}")))
    }
}

#[derive(Default)]
pub struct AbiWriter {
    buf: Vec<u8>,
}

impl AbiWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u128(&mut self, value: u128) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_varuint32(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.write_u8(byte);
                break;
            }
            self.write_u8(byte | 0x80);
        }
    }

    pub fn write_varint32(&mut self, value: i32) {
        self.write_varuint32(((value << 1) ^ (value >> 31)) as u32);
    }

    pub fn write_blob(&mut self, bytes: &[u8]) -> Result<(), AbiError> {
        let len = u32::try_from(bytes.len()).map_err(|_| AbiError::InvalidData("blob longer than 4GiB".to_string()))?;
        self.write_varuint32(len);
        self.write_bytes(bytes);
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), AbiError> {
        self.write_blob(s.as_bytes())
    }
}
