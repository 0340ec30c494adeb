use std::fmt::Debug;

use mpnet::codec::{self, Decode, Encode, Endian, FixedPoint, to_bytes};
use mpnet::{Battleplan, GameAction, GameActionArgument, HostSession, Player};
use proptest::prelude::*;

fn round_trip<T>(value: &T) -> Result<(), TestCaseError>
where
    T: Encode + Decode + PartialEq + Debug,
{
    for endian in [Endian::Little, Endian::Big] {
        let bytes = to_bytes(value, endian);
        prop_assert_eq!(value.encoded_len(endian), bytes.len());

        let (decoded, read) = T::decode(&bytes, endian)
            .ok_or_else(|| TestCaseError::fail("decode failed"))?;
        prop_assert_eq!(&decoded, value);
        prop_assert_eq!(read, bytes.len());

        for cut in 0..bytes.len() {
            prop_assert!(T::decode(&bytes[..cut], endian).is_none());
        }
    }
    Ok(())
}

fn fixed() -> impl Strategy<Value = FixedPoint> {
    any::<i64>().prop_map(FixedPoint::from_raw)
}

fn action_argument() -> impl Strategy<Value = GameActionArgument> {
    prop_oneof![
        Just(GameActionArgument::None),
        any::<bool>().prop_map(GameActionArgument::Bool),
        any::<i64>().prop_map(GameActionArgument::Int),
        (any::<u64>(), any::<bool>()).prop_map(|(a, b)| GameActionArgument::IdBool(a, b)),
        (any::<u64>(), any::<u64>()).prop_map(|(a, b)| GameActionArgument::IdId(a, b)),
        (any::<u64>(), fixed()).prop_map(|(a, f)| GameActionArgument::IdFixed(a, f)),
        (any::<u64>(), any::<u64>(), fixed())
            .prop_map(|(a, b, f)| GameActionArgument::IdIdFixed(a, b, f)),
        (any::<u64>(), any::<u64>(), any::<bool>())
            .prop_map(|(a, b, c)| GameActionArgument::IdIdBool(a, b, c)),
        (any::<u64>(), any::<u64>(), any::<bool>(), fixed())
            .prop_map(|(a, b, c, f)| GameActionArgument::IdIdBoolFixed(a, b, c, f)),
    ]
}

fn player() -> impl Strategy<Value = Player> {
    (any::<u64>(), ".{0,16}", prop::option::of("[A-Z]{3}"), any::<bool>()).prop_map(
        |(client_id, name, country, ready)| Player {
            client_id,
            name,
            country,
            ready,
        },
    )
}

proptest! {
    #[test]
    fn prop_integers_round_trip(a in any::<u8>(), b in any::<i32>(), c in any::<u64>(), d in any::<i128>()) {
        round_trip(&(a, b, c, d))?;
        round_trip(&(c as usize, d as isize))?;
    }

    #[test]
    fn prop_strings_round_trip(text in ".{0,64}", list in prop::collection::vec(".{0,12}", 0..8)) {
        round_trip(&text)?;
        round_trip(&list)?;
    }

    #[test]
    fn prop_tuples_with_bytes_round_trip(
        bytes in prop::collection::vec(any::<u8>(), 0..128),
        flag in any::<bool>(),
        text in ".{0,8}",
        value in any::<i16>(),
    ) {
        round_trip(&(bytes.clone(), flag, text.clone(), value, bytes.clone(), 'x'))?;
        round_trip(&Some((bytes, text)))?;
    }

    #[test]
    fn prop_nested_variants_round_trip(
        argument in action_argument(),
        kind in any::<u64>(),
        nested in prop::option::of(prop::option::of(any::<u32>())),
    ) {
        round_trip(&GameAction::new(kind, argument))?;
        round_trip(&nested)?;
    }

    #[test]
    fn prop_session_round_trip(name in ".{0,24}", players in prop::collection::vec(player(), 0..6)) {
        let mut session = HostSession::new(name);
        for player in players {
            session.add_player(player);
        }
        // The dirty flag is local state and never travels.
        session.take_dirty();
        round_trip(&session)?;
    }

    #[test]
    fn prop_battleplan_round_trip(tag in any::<u32>(), points in prop::collection::vec((fixed(), fixed()), 0..16)) {
        round_trip(&Battleplan { tag, waypoints: points })?;
    }

    #[test]
    fn prop_sizing_pass_matches_write(list in prop::collection::vec(".{0,12}", 0..8), tail in any::<u64>()) {
        let value = (list, tail);
        let size = codec::encode(&value, &mut []);
        let mut out = vec![0u8; size];
        prop_assert_eq!(codec::encode(&value, &mut out), size);
        prop_assert_eq!(codec::encoded_len(&value), size);
    }

    #[test]
    fn prop_garbage_never_panics(input in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = Vec::<String>::decode(&input, Endian::NATIVE);
        let _ = GameAction::decode(&input, Endian::NATIVE);
        let _ = HostSession::decode(&input, Endian::NATIVE);
        let _ = <(u64, Option<String>, Vec<u8>)>::decode(&input, Endian::NATIVE);
        let (_, read) = codec::decode::<Battleplan>(&input);
        prop_assert!(read <= input.len());
    }
}

#[test]
fn test_decode_failure_yields_default() {
    let (value, read) = codec::decode::<String>(&[9, 0, 0, 0, b'a']);
    assert_eq!(value, String::new());
    assert_eq!(read, 0);
}
