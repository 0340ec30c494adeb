use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use super::{Decode, Encode, Endian};

/// Signed fixed-point number with 16 fractional bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixedPoint(i64);

impl FixedPoint {
    pub const FRACTION_BITS: u32 = 16;
    pub const ONE: FixedPoint = FixedPoint(1 << Self::FRACTION_BITS);
    pub const ZERO: FixedPoint = FixedPoint(0);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn from_int(value: i32) -> Self {
        Self((value as i64) << Self::FRACTION_BITS)
    }

    pub fn from_f64(value: f64) -> Self {
        Self((value * (1i64 << Self::FRACTION_BITS) as f64).round() as i64)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1i64 << Self::FRACTION_BITS) as f64
    }

    pub const fn truncate(self) -> i64 {
        self.0 >> Self::FRACTION_BITS
    }
}

impl Add for FixedPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for FixedPoint {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}

/// Calendar span measured in whole days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timespan(i64);

impl Timespan {
    pub const fn from_days(days: i64) -> Self {
        Self(days)
    }

    pub const fn days(self) -> i64 {
        self.0
    }
}

impl Add for Timespan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl Encode for FixedPoint {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        self.0.encode(out, endian)
    }

    fn encoded_len(&self, _endian: Endian) -> usize {
        8
    }
}

impl Decode for FixedPoint {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        i64::decode(input, endian).map(|(raw, read)| (Self(raw), read))
    }
}

impl Encode for Timespan {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        self.0.encode(out, endian)
    }

    fn encoded_len(&self, _endian: Endian) -> usize {
        8
    }
}

impl Decode for Timespan {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        i64::decode(input, endian).map(|(days, read)| (Self(days), read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_conversions() {
        assert_eq!(FixedPoint::from_int(3).raw(), 3 << 16);
        assert_eq!(FixedPoint::from_f64(1.5).raw(), 0x18000);
        assert_eq!(FixedPoint::from_f64(-2.25).to_f64(), -2.25);
        assert_eq!((FixedPoint::ONE + FixedPoint::ONE).truncate(), 2);
    }

    #[test]
    fn test_encodes_as_underlying_integer() {
        let point = FixedPoint::from_int(-1);
        assert_eq!(
            crate::codec::to_bytes(&point, Endian::Little),
            (-65536i64).to_le_bytes().to_vec()
        );
        let span = Timespan::from_days(365);
        assert_eq!(
            Timespan::decode(&crate::codec::to_bytes(&span, Endian::Big), Endian::Big),
            Some((span, 8))
        );
    }
}
