use crate::codec::{Encode, Endian};

/// Growable write cursor over a byte vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketBuilder {
    buf: Vec<u8>,
    endian: Endian,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endian(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Appends the encoding of `value`. Returns the number of bytes added.
    pub fn put_back<T: Encode + ?Sized>(&mut self, value: &T) -> usize {
        let size = value.encoded_len(self.endian);
        if size == 0 {
            return 0;
        }
        let start = self.buf.len();
        self.buf.resize(start + size, 0);
        let written = value.encode(&mut self.buf[start..], self.endian);
        // A sizing pass that disagrees with the write means a broken encoder.
        debug_assert_eq!(written, size);
        self.buf.truncate(start + written);
        written
    }

    /// Appends bytes verbatim, with no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl AsRef<[u8]> for PacketBuilder {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
