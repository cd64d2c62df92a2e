//! Big-endian field codec for snapshots

use super::{PersistError, PersistResult};

/// Append-only big-endian writer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_be_bytes());
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// u16 length prefix followed by UTF-8 bytes
    pub fn put_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.put_u16(len as u16);
        self.buf.extend_from_slice(&bytes[..len]);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a snapshot buffer
///
/// Every read names the field it is decoding so truncation errors say where
/// the stream ended.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize, field: &'static str) -> PersistResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(PersistError::Truncated(field));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> PersistResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    pub fn u8(&mut self, field: &'static str) -> PersistResult<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn u16(&mut self, field: &'static str) -> PersistResult<u16> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    pub fn u32(&mut self, field: &'static str) -> PersistResult<u32> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    pub fn u64(&mut self, field: &'static str) -> PersistResult<u64> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    pub fn f64(&mut self, field: &'static str) -> PersistResult<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.array(field)?)))
    }

    pub fn bool(&mut self, field: &'static str) -> PersistResult<bool> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(PersistError::InvalidBool { field, value }),
        }
    }

    pub fn string(&mut self, field: &'static str) -> PersistResult<String> {
        let len = self.u16(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| PersistError::InvalidColor(String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut w = Writer::new();
        w.put_u16(0x0102);
        w.put_u32(0x0304_0506);
        w.put_bool(true);
        w.put_str("Red");
        assert_eq!(
            w.finish(),
            vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x01, 0x00, 0x03, b'R', b'e', b'd']
        );
    }

    #[test]
    fn test_reader_values() {
        let mut w = Writer::new();
        w.put_u64(u64::MAX - 1);
        w.put_f64(-2.5);
        w.put_str("Gold");
        let bytes = w.finish();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.u64("a").unwrap(), u64::MAX - 1);
        assert_eq!(r.f64("b").unwrap(), -2.5);
        assert_eq!(r.string("c").unwrap(), "Gold");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncated_read_names_field() {
        let mut r = Reader::new(&[0x00, 0x01]);
        assert!(matches!(r.u32("score"), Err(PersistError::Truncated("score"))));
    }

    #[test]
    fn test_invalid_bool() {
        let mut r = Reader::new(&[2]);
        assert!(matches!(
            r.bool("invincible"),
            Err(PersistError::InvalidBool { field: "invincible", value: 2 })
        ));
    }
}
