//! Binary wire codec.
//!
//! Every value put on the wire goes through [`Encode`] and [`Decode`]. The
//! encode side follows a two-pass contract: calling [`Encode::encode`] with an
//! empty span is a pure sizing pass that returns the number of bytes the
//! value needs, and calling it again with a span at least that large writes
//! exactly those bytes. Implementations must therefore be pure: two calls on
//! the same value always agree.
//!
//! Decoding never reads past the input it is given. Truncated inputs and
//! length prefixes that reach past the end decode as `None`.

mod collections;
mod fixed;
mod primitives;

pub use fixed::{FixedPoint, Timespan};

/// Byte order used for fixed-width values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub const NATIVE: Endian = if cfg!(target_endian = "big") {
        Endian::Big
    } else {
        Endian::Little
    };
}

impl Default for Endian {
    fn default() -> Self {
        Endian::NATIVE
    }
}

pub trait Encode {
    /// Writes `self` into `out` and returns the number of bytes written.
    ///
    /// An empty `out` performs a sizing pass and returns the number of bytes
    /// that would be written. A non-empty `out` that is too small yields 0.
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize;

    fn encoded_len(&self, endian: Endian) -> usize {
        self.encode(&mut [], endian)
    }
}

pub trait Decode: Sized {
    /// Reads a value from the front of `input`, returning it together with
    /// the number of bytes consumed.
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        (**self).encode(out, endian)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        (**self).encode(out, endian)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        T::decode(input, endian).map(|(value, read)| (Box::new(value), read))
    }
}

/// Encodes with native byte order.
pub fn encode<T: Encode + ?Sized>(value: &T, out: &mut [u8]) -> usize {
    value.encode(out, Endian::NATIVE)
}

pub fn encoded_len<T: Encode + ?Sized>(value: &T) -> usize {
    value.encoded_len(Endian::NATIVE)
}

/// Encodes into a freshly sized vector.
pub fn to_bytes<T: Encode + ?Sized>(value: &T, endian: Endian) -> Vec<u8> {
    let mut out = vec![0; value.encoded_len(endian)];
    if !out.is_empty() {
        value.encode(&mut out, endian);
    }
    out
}

/// Decodes with native byte order, yielding `(T::default(), 0)` on failure.
pub fn decode<T: Decode + Default>(input: &[u8]) -> (T, usize) {
    T::decode(input, Endian::NATIVE).unwrap_or_default()
}

/// Sequential writer used to compose encoders.
///
/// Mirrors the sizing/writing split of [`Encode::encode`]: when constructed
/// over an empty span it only accumulates sizes. In write mode each member
/// is handed a span of exactly its own size, so a member never mistakes the
/// end of the buffer for a sizing pass.
pub struct Encoder<'a> {
    out: &'a mut [u8],
    endian: Endian,
    written: usize,
    overflow: bool,
}

impl<'a> Encoder<'a> {
    pub fn new(out: &'a mut [u8], endian: Endian) -> Self {
        Self {
            out,
            endian,
            written: 0,
            overflow: false,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_sizing(&self) -> bool {
        self.out.is_empty()
    }

    pub fn put<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        if self.overflow {
            return self;
        }
        let needed = value.encoded_len(self.endian);
        if self.is_sizing() {
            self.written += needed;
            return self;
        }
        if self.out.len() - self.written < needed {
            self.overflow = true;
            return self;
        }
        if needed > 0 {
            let span = &mut self.out[self.written..self.written + needed];
            if value.encode(span, self.endian) != needed {
                self.overflow = true;
                return self;
            }
        }
        self.written += needed;
        self
    }

    /// Writes raw bytes with no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        if self.overflow {
            return self;
        }
        if self.is_sizing() {
            self.written += bytes.len();
        } else if self.out.len() - self.written < bytes.len() {
            self.overflow = true;
        } else {
            self.out[self.written..self.written + bytes.len()].copy_from_slice(bytes);
            self.written += bytes.len();
        }
        self
    }

    /// Writes the alternative index of a tagged union.
    pub fn put_variant(&mut self, index: u32) -> &mut Self {
        self.put(&index)
    }

    /// Total bytes written (or required, in a sizing pass); 0 on overflow.
    pub fn finish(&self) -> usize {
        if self.overflow { 0 } else { self.written }
    }
}

/// Sequential reader used to compose decoders.
pub struct Decoder<'a> {
    input: &'a [u8],
    endian: Endian,
    position: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8], endian: Endian) -> Self {
        Self {
            input,
            endian,
            position: 0,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn take<T: Decode>(&mut self) -> Option<T> {
        let (value, read) = T::decode(&self.input[self.position..], self.endian)?;
        self.position += read;
        Some(value)
    }

    pub fn take_raw(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let bytes = self.input.get(self.position..end)?;
        self.position = end;
        Some(bytes)
    }

    pub fn take_variant(&mut self) -> Option<u32> {
        self.take::<u32>()
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.position
    }

    pub fn consumed(&self) -> usize {
        self.position
    }

    pub fn finish<T>(self, value: T) -> Option<(T, usize)> {
        Some((value, self.position))
    }
}
