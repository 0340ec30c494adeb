use super::{Decode, Encode, Endian};

macro_rules! impl_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
                    const SIZE: usize = std::mem::size_of::<$ty>();
                    if out.is_empty() {
                        return SIZE;
                    }
                    if out.len() < SIZE {
                        return 0;
                    }
                    let bytes = match endian {
                        Endian::Little => self.to_le_bytes(),
                        Endian::Big => self.to_be_bytes(),
                    };
                    out[..SIZE].copy_from_slice(&bytes);
                    SIZE
                }

                fn encoded_len(&self, _endian: Endian) -> usize {
                    std::mem::size_of::<$ty>()
                }
            }

            impl Decode for $ty {
                fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
                    const SIZE: usize = std::mem::size_of::<$ty>();
                    let bytes: [u8; SIZE] = input.get(..SIZE)?.try_into().ok()?;
                    let value = match endian {
                        Endian::Little => <$ty>::from_le_bytes(bytes),
                        Endian::Big => <$ty>::from_be_bytes(bytes),
                    };
                    Some((value, SIZE))
                }
            }
        )*
    };
}

impl_number!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

// Pointer-sized integers always travel as 8 bytes.
impl Encode for usize {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        (*self as u64).encode(out, endian)
    }

    fn encoded_len(&self, _endian: Endian) -> usize {
        8
    }
}

impl Decode for usize {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let (value, read) = u64::decode(input, endian)?;
        Some((usize::try_from(value).ok()?, read))
    }
}

impl Encode for isize {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        (*self as i64).encode(out, endian)
    }

    fn encoded_len(&self, _endian: Endian) -> usize {
        8
    }
}

impl Decode for isize {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let (value, read) = i64::decode(input, endian)?;
        Some((isize::try_from(value).ok()?, read))
    }
}

impl Encode for bool {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        u8::from(*self).encode(out, endian)
    }

    fn encoded_len(&self, _endian: Endian) -> usize {
        1
    }
}

impl Decode for bool {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let (byte, read) = u8::decode(input, endian)?;
        Some((byte != 0, read))
    }
}

impl Encode for char {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        u32::from(*self).encode(out, endian)
    }

    fn encoded_len(&self, _endian: Endian) -> usize {
        4
    }
}

impl Decode for char {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let (code, read) = u32::decode(input, endian)?;
        Some((char::from_u32(code)?, read))
    }
}

impl Encode for () {
    fn encode(&self, _out: &mut [u8], _endian: Endian) -> usize {
        0
    }
}

impl Decode for () {
    fn decode(_input: &[u8], _endian: Endian) -> Option<(Self, usize)> {
        Some(((), 0))
    }
}
