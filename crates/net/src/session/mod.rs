//! Replicated session state and the gameplay payloads carried by the
//! catalog.

mod action;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{Decode, Decoder, Encode, Encoder, Endian, FixedPoint};
use crate::net::ClientId;

pub use action::{GameAction, GameActionArgument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub client_id: ClientId,
    pub name: String,
    pub country: Option<String>,
    pub ready: bool,
}

impl Player {
    pub fn new(client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            client_id,
            name: name.into(),
            country: None,
            ready: false,
        }
    }
}

impl Encode for Player {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        encoder
            .put(&self.client_id)
            .put(&self.name)
            .put(&self.country)
            .put(&self.ready);
        encoder.finish()
    }
}

impl Decode for Player {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let player = Player {
            client_id: decoder.take()?,
            name: decoder.take()?,
            country: decoder.take()?,
            ready: decoder.take()?,
        };
        decoder.finish(player)
    }
}

/// Session metadata owned by the host and replicated to every client.
///
/// Every mutation marks the session dirty; the host consumes the flag after
/// running a modification and re-broadcasts the whole structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSession {
    name: String,
    players: BTreeMap<ClientId, Player>,
    #[serde(skip)]
    dirty: bool,
}

impl HostSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            players: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.dirty = true;
        }
    }

    pub fn players(&self) -> &BTreeMap<ClientId, Player> {
        &self.players
    }

    pub fn player(&self, client_id: ClientId) -> Option<&Player> {
        self.players.get(&client_id)
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.insert(player.client_id, player);
        self.dirty = true;
    }

    pub fn remove_player(&mut self, client_id: ClientId) -> Option<Player> {
        let removed = self.players.remove(&client_id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Applies `f` to a player, marking the session dirty if it exists.
    pub fn update_player(&mut self, client_id: ClientId, f: impl FnOnce(&mut Player)) -> bool {
        match self.players.get_mut(&client_id) {
            Some(player) => {
                f(player);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn set_ready(&mut self, client_id: ClientId, ready: bool) -> bool {
        match self.players.get_mut(&client_id) {
            Some(player) if player.ready != ready => {
                player.ready = ready;
                self.dirty = true;
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.ready)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Encode for HostSession {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&self.name).put(&self.players);
        encoder.finish()
    }
}

impl Decode for HostSession {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let session = HostSession {
            name: decoder.take()?,
            players: decoder.take()?,
            dirty: false,
        };
        decoder.finish(session)
    }
}

/// Tagged list of map waypoints shared between allied players.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battleplan {
    pub tag: u32,
    pub waypoints: Vec<(FixedPoint, FixedPoint)>,
}

impl Encode for Battleplan {
    fn encode(&self, out: &mut [u8], endian: Endian) -> usize {
        let mut encoder = Encoder::new(out, endian);
        encoder.put(&self.tag).put(&self.waypoints);
        encoder.finish()
    }
}

impl Decode for Battleplan {
    fn decode(input: &[u8], endian: Endian) -> Option<(Self, usize)> {
        let mut decoder = Decoder::new(input, endian);
        let plan = Battleplan {
            tag: decoder.take()?,
            waypoints: decoder.take()?,
        };
        decoder.finish(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_bytes;

    #[test]
    fn test_session_wire_layout() {
        let mut session = HostSession::new("s");
        session.add_player(Player::new(2, "p"));

        let bytes = to_bytes(&session, Endian::Little);
        let mut expected = vec![1, 0, 0, 0, b's', 1, 0, 0, 0];
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&[1, 0, 0, 0, b'p']);
        expected.extend_from_slice(&[0, 0, 0, 0]);
        expected.push(0);
        assert_eq!(bytes, expected);

        let (decoded, read) = HostSession::decode(&bytes, Endian::Little).unwrap();
        assert_eq!(read, bytes.len());
        assert_eq!(decoded.players(), session.players());
        assert!(!decoded.is_dirty());
    }

    #[test]
    fn test_mutations_mark_dirty() {
        let mut session = HostSession::new("lobby");
        assert!(!session.is_dirty());

        session.set_name("lobby");
        assert!(!session.is_dirty());

        session.add_player(Player::new(0, "host"));
        assert!(session.take_dirty());
        assert!(!session.is_dirty());

        assert!(session.set_ready(0, true));
        assert!(session.take_dirty());
        assert!(session.set_ready(0, true));
        assert!(!session.is_dirty());
        assert!(session.all_ready());

        assert!(!session.set_ready(9, true));
        assert!(session.remove_player(0).is_some());
        assert!(session.take_dirty());
    }

    #[test]
    fn test_battleplan_round_trip() {
        let plan = Battleplan {
            tag: 4,
            waypoints: vec![
                (FixedPoint::from_int(1), FixedPoint::from_f64(-0.5)),
                (FixedPoint::ZERO, FixedPoint::ONE),
            ],
        };
        let bytes = to_bytes(&plan, Endian::Big);
        assert_eq!(bytes.len(), 4 + 4 + 2 * 16);
        assert_eq!(Battleplan::decode(&bytes, Endian::Big), Some((plan, bytes.len())));
    }
}
