pub const SIZE_U16: usize = 2;
pub const SIZE_U32: usize = 4;
pub const SIZE_U64: usize = 8;
pub const SIZE_F64: usize = 8;

pub struct LeSliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeSliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn has_bytes(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        if !self.has_bytes(1) {
            return None;
        }
        let val = self.buf[self.pos];
        self.pos += 1;
        Some(val)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        if !self.has_bytes(SIZE_U16) {
            return None;
        }
        let val = u16::from_le_bytes(self.buf[self.pos..self.pos + SIZE_U16].try_into().ok()?);
        self.pos += SIZE_U16;
        Some(val)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        if !self.has_bytes(SIZE_U32) {
            return None;
        }
        let val = u32::from_le_bytes(self.buf[self.pos..self.pos + SIZE_U32].try_into().ok()?);
        self.pos += SIZE_U32;
        Some(val)
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        if !self.has_bytes(SIZE_U64) {
            return None;
        }
        let val = u64::from_le_bytes(self.buf[self.pos..self.pos + SIZE_U64].try_into().ok()?);
        self.pos += SIZE_U64;
        Some(val)
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }
}

/// Append-only little-endian writer over a `Vec<u8>`.
pub struct LeVecWriter {
    buf: Vec<u8>,
}

impl LeVecWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for LeVecWriter {
    fn default() -> Self {
        Self::new()
    }
}
