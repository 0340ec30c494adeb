use std::collections::{BTreeMap, VecDeque};

use super::{Decode, Decoder, Encode, Encoder, Endian};

/// Reads a u32 element count and rejects it when the input cannot possibly
/// hold that many elements of at least `min_element` bytes each.
fn decode_count(input: &[u8], endian: Endian, min_element: usize) -> Option<(usize, usize)> {
    let (count, read) = u32::decode(input, endian)?;
    let count = count as usize;
    let remaining = input.len() - read;
    if count.checked_mul(min_element)? > remaining {
        return None;
    }
    Some((count, read))
}

impl Encode for str {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        self.as_bytes().encode(out, endian)
    }
}

impl Encode for String {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        self.as_str().encode(out, endian)
    }
}

impl Decode for String {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let (len, read) = decode_count(input, endian, 1)?;
        let bytes = &input[read..read + len];
        let text = std::str::from_utf8(bytes).ok()?;
        Some((text.to_owned(), read + len))
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let Ok(count) = u32::try_from(self.len()) else {
            return 0;
        };
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&count);
        for item in self {
            encoder.put(item);
        }
        encoder.finish()
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        for item in self {
            encoder.put(item);
        }
        encoder.finish()
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(decoder.take::<T>()?);
        }
        let array: [T; N] = items.try_into().ok()?;
        decoder.finish(array)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        self.as_slice().encode(out, endian)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        // Every element is assumed to occupy at least one byte.
        let (count, read) = decode_count(input, endian, 1)?;
        let mut decoder = Decoder::new(&input[read..], endian);
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(decoder.take::<T>()?);
        }
        Some((items, read + decoder.consumed()))
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let Ok(count) = u32::try_from(self.len()) else {
            return 0;
        };
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&count);
        for item in self {
            encoder.put(item);
        }
        encoder.finish()
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        Vec::<T>::decode(input, endian).map(|(items, read)| (items.into(), read))
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let Ok(count) = u32::try_from(self.len()) else {
            return 0;
        };
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&count);
        for (key, value) in self {
            encoder.put(key).put(value);
        }
        encoder.finish()
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let (count, read) = decode_count(input, endian, 1)?;
        let mut decoder = Decoder::new(&input[read..], endian);
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = decoder.take::<K>()?;
            let value = decoder.take::<V>()?;
            map.insert(key, value);
        }
        Some((map, read + decoder.consumed()))
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        match self {
            None => {
                encoder.put_variant(0);
            }
            Some(value) => {
                encoder.put_variant(1).put(value);
            }
        }
        encoder.finish()
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        match decoder.take_variant()? {
            0 => decoder.finish(None),
            1 => {
                let value = decoder.take::<T>()?;
                decoder.finish(Some(value))
            }
            _ => None,
        }
    }
}

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
                let ($($name,)+) = self;
                let mut encoder = Encoder::new(out, endian);
                $(encoder.put($name);)+
                encoder.finish()
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
                let mut decoder = Decoder::new(input, endian);
                let value = ($(decoder.take::<$name>()?,)+);
                decoder.finish(value)
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_bytes;

    #[test]
    fn test_string_layout() {
        let bytes = to_bytes("hey", Endian::Little);
        assert_eq!(bytes, vec![3, 0, 0, 0, b'h', b'e', b'y']);
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let bytes = [2, 0, 0, 0, 0xff, 0xfe];
        assert_eq!(String::decode(&bytes, Endian::Little), None);
    }

    #[test]
    fn test_oversized_count_rejected() {
        let bytes = [0xff, 0xff, 0xff, 0x7f, 1, 2];
        assert_eq!(Vec::<u8>::decode(&bytes, Endian::Little), None);
    }

    #[test]
    fn test_option_tags() {
        assert_eq!(to_bytes(&None::<u8>, Endian::Little), vec![0, 0, 0, 0]);
        assert_eq!(to_bytes(&Some(9u8), Endian::Little), vec![1, 0, 0, 0, 9]);
        assert_eq!(Option::<u8>::decode(&[2, 0, 0, 0, 9], Endian::Little), None);
    }

    #[test]
    fn test_fixed_array_has_no_prefix() {
        let bytes = to_bytes(&[1u16, 2, 3], Endian::Big);
        assert_eq!(bytes, vec![0, 1, 0, 2, 0, 3]);
        assert_eq!(
            <[u16; 3]>::decode(&bytes, Endian::Big),
            Some(([1, 2, 3], 6))
        );
    }

    #[test]
    fn test_map_round_trip() {
        let mut map = BTreeMap::new();
        map.insert(3u64, String::from("three"));
        map.insert(1u64, String::from("one"));
        let bytes = to_bytes(&map, Endian::Little);
        let (decoded, read) = BTreeMap::<u64, String>::decode(&bytes, Endian::Little).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(read, bytes.len());
    }
}
