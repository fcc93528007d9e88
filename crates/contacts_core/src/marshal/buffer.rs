//! Append-only writer and strictly ordered reader for marshal buffers.
//!
//! All integers are little-endian. Strings are an `i32` byte length
//! followed by UTF-8 bytes; length `-1` encodes NULL.

use crate::error::{ContactsError, ContactsResult};
use bytes::{Buf, BufMut};

const NULL_STRING: i32 = -1;

/// Growable marshal buffer. Allocation failure surfaces as `OutOfMemory`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarshalWriter {
    buf: Vec<u8>,
}

impl MarshalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn reserve(&mut self, additional: usize) -> ContactsResult<()> {
        self.buf
            .try_reserve(additional)
            .map_err(|_| ContactsError::OutOfMemory)
    }

    pub fn put_u8(&mut self, value: u8) -> ContactsResult<()> {
        self.reserve(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn put_bool(&mut self, value: bool) -> ContactsResult<()> {
        self.put_u8(u8::from(value))
    }

    pub fn put_u16(&mut self, value: u16) -> ContactsResult<()> {
        self.reserve(2)?;
        self.buf.put_u16_le(value);
        Ok(())
    }

    pub fn put_i32(&mut self, value: i32) -> ContactsResult<()> {
        self.reserve(4)?;
        self.buf.put_i32_le(value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> ContactsResult<()> {
        self.reserve(4)?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    pub fn put_i64(&mut self, value: i64) -> ContactsResult<()> {
        self.reserve(8)?;
        self.buf.put_i64_le(value);
        Ok(())
    }

    pub fn put_f64(&mut self, value: f64) -> ContactsResult<()> {
        self.reserve(8)?;
        self.buf.put_f64_le(value);
        Ok(())
    }

    /// Writes a collection length.
    pub fn put_len(&mut self, len: usize) -> ContactsResult<()> {
        let len = u32::try_from(len)
            .map_err(|_| ContactsError::invalid(format!("length {len} exceeds wire limit")))?;
        self.put_u32(len)
    }

    pub fn put_str(&mut self, value: Option<&str>) -> ContactsResult<()> {
        let Some(text) = value else {
            return self.put_i32(NULL_STRING);
        };
        let len = i32::try_from(text.len()).map_err(|_| {
            ContactsError::invalid(format!("string of {} bytes exceeds wire limit", text.len()))
        })?;
        self.reserve(4 + text.len())?;
        self.buf.put_i32_le(len);
        self.buf.put_slice(text.as_bytes());
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> ContactsResult<()> {
        self.reserve(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }
}

/// Cursor over a marshal buffer.
///
/// Reads past the end fail with `NoData`; malformed content fails with
/// `InvalidParameter`. A failed read leaves the cursor unusable.
#[derive(Debug, Clone)]
pub struct MarshalReader<'a> {
    buf: &'a [u8],
}

impl<'a> MarshalReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Returns the unread tail.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    /// Fails unless every byte was consumed.
    pub fn finish(&self) -> ContactsResult<()> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(ContactsError::invalid(format!(
                "{} trailing bytes in marshal buffer",
                self.remaining()
            )))
        }
    }

    fn need(&self, len: usize) -> ContactsResult<()> {
        if self.buf.remaining() < len {
            return Err(ContactsError::no_data(format!(
                "marshal buffer truncated: need {len} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> ContactsResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_bool(&mut self) -> ContactsResult<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ContactsError::invalid(format!("invalid bool byte {other}"))),
        }
    }

    pub fn get_u16(&mut self) -> ContactsResult<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn get_i32(&mut self) -> ContactsResult<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_u32(&mut self) -> ContactsResult<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_i64(&mut self) -> ContactsResult<i64> {
        self.need(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn get_f64(&mut self) -> ContactsResult<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Reads a collection length, bounded by the bytes left so a corrupt
    /// count cannot trigger a huge allocation.
    pub fn get_len(&mut self, min_item_bytes: usize) -> ContactsResult<usize> {
        let len = self.get_u32()? as usize;
        if len.saturating_mul(min_item_bytes.max(1)) > self.remaining() {
            return Err(ContactsError::no_data(format!(
                "length {len} exceeds remaining marshal buffer"
            )));
        }
        Ok(len)
    }

    pub fn get_str(&mut self) -> ContactsResult<Option<String>> {
        let len = self.get_i32()?;
        if len == NULL_STRING {
            return Ok(None);
        }
        let len = usize::try_from(len)
            .map_err(|_| ContactsError::invalid(format!("negative string length {len}")))?;
        self.need(len)?;
        let (bytes, rest) = self.buf.split_at(len);
        let text = std::str::from_utf8(bytes)
            .map_err(|err| ContactsError::invalid(format!("string is not utf-8: {err}")))?
            .to_string();
        self.buf = rest;
        Ok(Some(text))
    }

    /// Reads a string that must not be NULL.
    pub fn get_required_str(&mut self, what: &str) -> ContactsResult<String> {
        self.get_str()?
            .ok_or_else(|| ContactsError::invalid(format!("{what} cannot be null")))
    }
}

#[cfg(test)]
mod tests {
    use super::{MarshalReader, MarshalWriter};
    use crate::error::ContactsError;

    #[test]
    fn null_and_empty_strings_stay_distinct() {
        let mut writer = MarshalWriter::new();
        writer.put_str(None).unwrap();
        writer.put_str(Some("")).unwrap();
        writer.put_str(Some("Grüße")).unwrap();

        let bytes = writer.into_bytes();
        let mut reader = MarshalReader::new(&bytes);
        assert_eq!(reader.get_str().unwrap(), None);
        assert_eq!(reader.get_str().unwrap(), Some(String::new()));
        assert_eq!(reader.get_str().unwrap().as_deref(), Some("Grüße"));
        reader.finish().unwrap();
    }

    #[test]
    fn truncated_buffer_reports_no_data() {
        let mut writer = MarshalWriter::new();
        writer.put_i64(42).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = MarshalReader::new(&bytes[..5]);
        assert!(matches!(reader.get_i64(), Err(ContactsError::NoData(_))));
    }

    #[test]
    fn invalid_utf8_and_bool_are_invalid_parameter() {
        let mut reader = MarshalReader::new(&[2, 0, 0, 0, 0xff, 0xfe]);
        assert!(matches!(
            reader.get_str(),
            Err(ContactsError::InvalidParameter(_))
        ));

        let mut reader = MarshalReader::new(&[7]);
        assert!(matches!(
            reader.get_bool(),
            Err(ContactsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_allocation() {
        let mut writer = MarshalWriter::new();
        writer.put_u32(u32::MAX).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = MarshalReader::new(&bytes);
        assert!(reader.get_len(4).is_err());
    }
}
