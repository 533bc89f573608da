use byteorder::{BigEndian, ByteOrder};

use crate::error::{DbError, DbResult};

/// A fixed-size, positionally-addressed byte buffer with a codec for the
/// primitives the rest of the core reads and writes: 32-bit big-endian
/// integers, and length-prefixed byte/string blobs. Every accessor checks
/// its bounds and returns `OffsetOutOfRange` rather than panicking — a
/// page is read from disk, network, or a log block, and a corrupt length
/// prefix must not be allowed to take down the process via a slice panic.
pub struct Page {
    buffer: Vec<u8>,
}

impl Page {
    pub fn new(block_size: usize) -> Self {
        Page {
            buffer: vec![0; block_size],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Page { buffer: bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Page {
            buffer: bytes.to_vec(),
        }
    }

    fn check_bounds(&self, offset: usize, len: usize) -> DbResult<()> {
        if offset + len > self.buffer.len() {
            return Err(DbError::OffsetOutOfRange {
                offset,
                len,
                block_size: self.buffer.len(),
            });
        }
        Ok(())
    }

    pub fn get_int(&self, offset: usize) -> DbResult<i32> {
        self.check_bounds(offset, 4)?;
        Ok(BigEndian::read_i32(&self.buffer[offset..offset + 4]))
    }

    pub fn set_int(&mut self, offset: usize, n: i32) -> DbResult<()> {
        self.check_bounds(offset, 4)?;
        BigEndian::write_i32(&mut self.buffer[offset..offset + 4], n);
        Ok(())
    }

    pub fn get_bytes(&self, offset: usize) -> DbResult<Vec<u8>> {
        let length = self.get_int(offset)? as usize;
        let start = offset + 4;
        self.check_bounds(start, length)?;
        Ok(self.buffer[start..start + length].to_vec())
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> DbResult<()> {
        self.check_bounds(offset, 4 + bytes.len())?;
        self.set_int(offset, bytes.len() as i32)?;
        let start = offset + 4;
        self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Reads the length-prefixed UTF-8 blob at `offset`. Trailing NULs left
    /// over from a slot that previously held a longer string are trimmed.
    pub fn get_string(&self, offset: usize) -> DbResult<String> {
        let bytes = self.get_bytes(offset)?;
        let trimmed = match bytes.iter().rposition(|&b| b != 0) {
            Some(last) => &bytes[..=last],
            None => &bytes[..0],
        };
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }

    pub fn set_string(&mut self, offset: usize, s: &str) -> DbResult<()> {
        self.set_bytes(offset, s.as_bytes())
    }

    pub fn contents(&self) -> &[u8] {
        &self.buffer
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes needed to store a string of `str_len` bytes with its length prefix.
    pub fn max_length(str_len: usize) -> usize {
        4 + str_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_zeroed() {
        let page = Page::new(100);
        assert_eq!(page.len(), 100);
        assert!(page.contents().iter().all(|&b| b == 0));
    }

    #[test]
    fn int_round_trip() {
        let mut page = Page::new(100);
        page.set_int(0, 42).unwrap();
        assert_eq!(page.get_int(0).unwrap(), 42);

        page.set_int(4, -123).unwrap();
        assert_eq!(page.get_int(4).unwrap(), -123);

        page.set_int(8, i32::MAX).unwrap();
        assert_eq!(page.get_int(8).unwrap(), i32::MAX);

        page.set_int(12, i32::MIN).unwrap();
        assert_eq!(page.get_int(12).unwrap(), i32::MIN);
    }

    #[test]
    fn bytes_round_trip() {
        let mut page = Page::new(100);
        let test_data = vec![10, 20, 30, 40, 50];

        page.set_bytes(0, &test_data).unwrap();
        assert_eq!(page.get_bytes(0).unwrap(), test_data);

        page.set_bytes(20, &[]).unwrap();
        assert_eq!(page.get_bytes(20).unwrap(), Vec::<u8>::new());

        let large_data: Vec<u8> = (0..50).collect();
        page.set_bytes(30, &large_data).unwrap();
        assert_eq!(page.get_bytes(30).unwrap(), large_data);
    }

    #[test]
    fn string_round_trip() {
        let mut page = Page::new(100);

        page.set_string(0, "Hello, world!").unwrap();
        assert_eq!(page.get_string(0).unwrap(), "Hello, world!");

        page.set_string(20, "").unwrap();
        assert_eq!(page.get_string(20).unwrap(), "");

        let unicode = "Unicode: 你好, こんにちは, Привет";
        page.set_string(50, unicode).unwrap();
        assert_eq!(page.get_string(50).unwrap(), unicode);
    }

    #[test]
    fn shorter_string_overwrite_trims_trailing_garbage() {
        let mut page = Page::new(100);
        page.set_string(0, "abcdef").unwrap();
        page.set_string(0, "ab").unwrap();
        assert_eq!(page.get_string(0).unwrap(), "ab");
    }

    #[test]
    fn accessors_reject_out_of_range_offsets() {
        let mut page = Page::new(64);
        let err = page.set_int(62, 1).unwrap_err();
        assert!(matches!(err, DbError::OffsetOutOfRange { .. }));

        let err = page.get_int(62).unwrap_err();
        assert!(matches!(err, DbError::OffsetOutOfRange { .. }));

        let err = page.set_bytes(60, &[1, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(err, DbError::OffsetOutOfRange { .. }));
    }

    #[test]
    fn scenario_s1_page_codec() {
        let mut page = Page::new(64);
        page.set_int(0, 1234).unwrap();
        page.set_string(10, "world").unwrap();

        assert_eq!(page.get_int(0).unwrap(), 1234);
        assert_eq!(page.get_string(10).unwrap(), "world");

        assert!(matches!(
            page.set_int(62, 1),
            Err(DbError::OffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn complex_scenario() {
        let mut page = Page::new(1000);

        page.set_int(0, 12345).unwrap();
        page.set_string(4, "This is a test string").unwrap();
        page.set_bytes(100, &[1, 2, 3, 4, 5]).unwrap();
        page.set_int(200, -98765).unwrap();

        assert_eq!(page.get_int(0).unwrap(), 12345);
        assert_eq!(
            page.get_string(4).unwrap(),
            "This is a test string"
        );
        assert_eq!(page.get_bytes(100).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(page.get_int(200).unwrap(), -98765);
    }
}
