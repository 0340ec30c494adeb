use serde::{Deserialize, Serialize};

use crate::codec::{Decode, Decoder, Encode, Encoder, Endian, FixedPoint};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameActionArgument {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    IdBool(u64, bool),
    IdId(u64, u64),
    IdFixed(u64, FixedPoint),
    IdIdFixed(u64, u64, FixedPoint),
    IdIdBool(u64, u64, bool),
    IdIdBoolFixed(u64, u64, bool, FixedPoint),
}

impl Encode for GameActionArgument {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        match self {
            Self::None => encoder.put_variant(0),
            Self::Bool(value) => encoder.put_variant(1).put(value),
            Self::Int(value) => encoder.put_variant(2).put(value),
            Self::IdBool(id, flag) => encoder.put_variant(3).put(id).put(flag),
            Self::IdId(a, b) => encoder.put_variant(4).put(a).put(b),
            Self::IdFixed(id, value) => encoder.put_variant(5).put(id).put(value),
            Self::IdIdFixed(a, b, value) => encoder.put_variant(6).put(a).put(b).put(value),
            Self::IdIdBool(a, b, flag) => encoder.put_variant(7).put(a).put(b).put(flag),
            Self::IdIdBoolFixed(a, b, flag, value) => {
                encoder.put_variant(8).put(a).put(b).put(flag).put(value)
            }
        };
        encoder.finish()
    }
}

impl Decode for GameActionArgument {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut d = Decoder::new(input, endian);
        let argument = match d.take_variant()? {
            0 => Self::None,
            1 => Self::Bool(d.take()?),
            2 => Self::Int(d.take()?),
            3 => Self::IdBool(d.take()?, d.take()?),
            4 => Self::IdId(d.take()?, d.take()?),
            5 => Self::IdFixed(d.take()?, d.take()?),
            6 => Self::IdIdFixed(d.take()?, d.take()?, d.take()?),
            7 => Self::IdIdBool(d.take()?, d.take()?, d.take()?),
            8 => Self::IdIdBoolFixed(d.take()?, d.take()?, d.take()?, d.take()?),
            _ => return None,
        };
        d.finish(argument)
    }
}

/// Gameplay command queued for execution on every machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAction {
    pub kind: u64,
    pub argument: GameActionArgument,
}

impl GameAction {
    pub fn new(kind: u64, argument: GameActionArgument) -> Self {
        Self { kind, argument }
    }
}

impl Encode for GameAction {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&self.kind).put(&self.argument);
        encoder.finish()
    }
}

impl Decode for GameAction {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let action = GameAction {
            kind: decoder.take()?,
            argument: decoder.take()?,
        };
        decoder.finish(action)
    }
}
