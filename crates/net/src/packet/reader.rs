use std::borrow::Cow;

use crate::codec::{Decode, Endian};

/// Random-access read cursor over an owned or borrowed packet.
///
/// A failed read leaves the cursor where it was and latches the error flag
/// until [`PacketReader::clear_error`].
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: Cow<'a, [u8]>,
    index: usize,
    endian: Endian,
    failed: bool,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endian(data, Endian::NATIVE)
    }

    pub fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data: Cow::Borrowed(data),
            index: 0,
            endian,
            failed: false,
        }
    }

    pub fn owned(data: Vec<u8>, endian: Endian) -> PacketReader<'static> {
        PacketReader {
            data: Cow::Owned(data),
            index: 0,
            endian,
            failed: false,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Decodes a `T` at the cursor, or yields `T::default()` on failure.
    pub fn read<T: Decode + Default>(&mut self) -> T {
        self.try_read().unwrap_or_default()
    }

    pub fn try_read<T: Decode>(&mut self) -> Option<T> {
        match T::decode(&self.data[self.index..], self.endian) {
            Some((value, read)) => {
                self.index += read;
                Some(value)
            }
            None => {
                self.failed = true;
                None
            }
        }
    }

    /// Moves the cursor; positions past the end clamp to the end.
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.data.len());
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes from the cursor to the end.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.index..]
    }

    /// Bytes from `start` to the end, regardless of the cursor.
    pub fn subspan(&self, start: usize) -> &[u8] {
        &self.data[start.min(self.data.len())..]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn clear_error(&mut self) {
        self.failed = false;
    }
}
