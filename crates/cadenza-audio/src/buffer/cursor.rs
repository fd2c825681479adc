//! Fixed-capacity byte buffer with a movable cursor.
//!
//! Network readers land raw byte ranges here before the bitstream parser
//! sees them. Numeric fields are always encoded big-endian so header
//! layouts are bit-exact regardless of the host.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use bytes::Bytes;
use cadenza_core::BufferError;

/// A fixed-width value with a big-endian wire encoding.
pub trait WireValue: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Write the big-endian encoding into `out`, which is exactly `SIZE` long.
    fn encode(self, out: &mut [u8]);

    /// Decode from exactly `SIZE` big-endian bytes.
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! impl_wire_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_be_bytes());
                }

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_wire_value!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Owned byte region with a read/write cursor.
///
/// Invariant: `position <= len <= capacity`. Reads never go past the
/// written length and writes never grow the region; both fail instead.
#[derive(Debug, Clone)]
pub struct ByteCursorBuffer {
    storage: Box<[u8]>,
    position: usize,
    len: usize,
}

impl ByteCursorBuffer {
    /// Create a zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            position: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes written so far.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current cursor offset.
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Written bytes left to read from the cursor.
    pub const fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Capacity left to write from the cursor.
    pub fn free(&self) -> usize {
        self.capacity() - self.position
    }

    /// Write `data` at the cursor and advance past it.
    ///
    /// Fails without touching the buffer if `data` does not fit.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), BufferError> {
        let end = self.reserve(data.len())?;
        self.storage[self.position..end].copy_from_slice(data);
        self.commit(end);
        Ok(())
    }

    /// Read the next `count` bytes and advance past them.
    pub fn read_bytes(&mut self, count: usize) -> Result<Bytes, BufferError> {
        let range = self.take(count)?;
        Ok(Bytes::copy_from_slice(&self.storage[range]))
    }

    /// Look at the next `count` bytes without moving the cursor.
    pub fn peek_bytes(&self, count: usize) -> Result<&[u8], BufferError> {
        self.check_available(count)?;
        Ok(&self.storage[self.position..self.position + count])
    }

    /// Encode `value` big-endian at the cursor.
    pub fn put<T: WireValue>(&mut self, value: T) -> Result<(), BufferError> {
        let end = self.reserve(T::SIZE)?;
        value.encode(&mut self.storage[self.position..end]);
        self.commit(end);
        Ok(())
    }

    /// Decode a big-endian value at the cursor.
    pub fn get<T: WireValue>(&mut self) -> Result<T, BufferError> {
        let range = self.take(T::SIZE)?;
        Ok(T::decode(&self.storage[range]))
    }

    pub fn get_u8(&mut self) -> Result<u8, BufferError> {
        self.get()
    }

    pub fn get_u16(&mut self) -> Result<u16, BufferError> {
        self.get()
    }

    pub fn get_u32(&mut self) -> Result<u32, BufferError> {
        self.get()
    }

    pub fn get_u64(&mut self) -> Result<u64, BufferError> {
        self.get()
    }

    pub fn get_i32(&mut self) -> Result<i32, BufferError> {
        self.get()
    }

    pub fn get_f32(&mut self) -> Result<f32, BufferError> {
        self.get()
    }

    pub fn get_f64(&mut self) -> Result<f64, BufferError> {
        self.get()
    }

    /// Move the cursor to the start without discarding written data.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Move the cursor to `position`, which must be within the written bytes.
    pub fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        if position > self.len {
            return Err(BufferError::Underflow {
                requested: position,
                available: self.len,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Drop all written data.
    pub fn clear(&mut self) {
        self.position = 0;
        self.len = 0;
    }

    /// Everything written so far, independent of the cursor.
    pub fn written(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    fn reserve(&self, count: usize) -> Result<usize, BufferError> {
        let remaining = self.free();
        if count > remaining {
            return Err(BufferError::Overflow {
                requested: count,
                remaining,
            });
        }
        Ok(self.position + count)
    }

    fn commit(&mut self, end: usize) {
        self.position = end;
        self.len = self.len.max(end);
    }

    fn check_available(&self, count: usize) -> Result<(), BufferError> {
        let available = self.remaining();
        if count > available {
            return Err(BufferError::Underflow {
                requested: count,
                available,
            });
        }
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<std::ops::Range<usize>, BufferError> {
        self.check_available(count)?;
        let start = self.position;
        self.position += count;
        Ok(start..self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_write_and_read_bytes() {
        let mut buffer = ByteCursorBuffer::new(10);
        buffer.write_bytes(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        buffer.rewind();

        let read = buffer.read_bytes(4).unwrap();
        assert_eq!(&read[..], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_integer_is_big_endian() {
        let mut buffer = ByteCursorBuffer::new(8);
        buffer.put(123_456_789u32).unwrap();
        assert_eq!(buffer.written(), &[0x07, 0x5B, 0xCD, 0x15]);

        buffer.rewind();
        assert_eq!(buffer.get_u32().unwrap(), 123_456_789);
    }

    #[test]
    fn test_float_and_double() {
        let mut buffer = ByteCursorBuffer::new(12);
        buffer.put(123.456f32).unwrap();
        buffer.put(123.456f64).unwrap();
        buffer.rewind();

        assert!((buffer.get_f32().unwrap() - 123.456).abs() < 0.001);
        assert!((buffer.get_f64().unwrap() - 123.456).abs() < 0.001);
    }

    #[test]
    fn test_underflow_on_short_read() {
        let mut buffer = ByteCursorBuffer::new(8);
        buffer.write_bytes(&[1, 2]).unwrap();
        buffer.rewind();

        assert_eq!(
            buffer.read_bytes(3),
            Err(BufferError::Underflow {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(buffer.position(), 0);
        assert!(buffer.get_u32().is_err());
    }

    #[test]
    fn test_overflow_leaves_buffer_untouched() {
        let mut buffer = ByteCursorBuffer::new(4);
        buffer.write_bytes(&[9, 9, 9]).unwrap();

        assert_eq!(
            buffer.put(1u16),
            Err(BufferError::Overflow {
                requested: 2,
                remaining: 1
            })
        );
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.position(), 3);
        assert_eq!(buffer.written(), &[9, 9, 9]);
    }

    #[test]
    fn test_rewrite_after_rewind_keeps_length() {
        let mut buffer = ByteCursorBuffer::new(8);
        buffer.put(0xAABB_CCDDu32).unwrap();
        buffer.rewind();
        buffer.put(0x11u8).unwrap();

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.written(), &[0x11, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_peek_and_seek() {
        let mut buffer = ByteCursorBuffer::new(8);
        buffer.write_bytes(b"ID3\x04").unwrap();
        buffer.seek(1).unwrap();
        assert_eq!(buffer.peek_bytes(2).unwrap(), b"D3");
        assert_eq!(buffer.position(), 1);
        assert!(buffer.seek(5).is_err());

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.free(), 8);
    }

    proptest! {
        #[test]
        fn prop_u32_round_trip(value in any::<u32>()) {
            let mut buffer = ByteCursorBuffer::new(4);
            buffer.put(value).unwrap();
            prop_assert_eq!(buffer.written(), &value.to_be_bytes()[..]);
            buffer.rewind();
            prop_assert_eq!(buffer.get_u32().unwrap(), value);
        }

        #[test]
        fn prop_reads_never_pass_written_length(written in 0usize..16, read in 0usize..32) {
            let mut buffer = ByteCursorBuffer::new(16);
            buffer.write_bytes(&vec![0xAB; written]).unwrap();
            buffer.rewind();
            let result = buffer.read_bytes(read);
            prop_assert_eq!(result.is_ok(), read <= written);
            prop_assert!(buffer.position() <= buffer.len());
            prop_assert!(buffer.len() <= buffer.capacity());
        }
    }
}
