//! Structured list values carried inside a single string parameter.
//!
//! Each entry type knows its own field names and how to turn itself into
//! one parameter group. [`encode_entries`] and [`decode_entries`] handle
//! the surrounding `[..;..]`.

use crate::codec::{decode_list, encode_list};
use crate::{find_param, Param, ProtocolError};

/// A type that can be one element of a list value.
pub trait ListEntry: Sized {
    fn to_params(&self) -> Vec<Param>;
    fn from_params(params: &[Param]) -> Result<Self, ProtocolError>;
}

/// Encodes entries as a list value.
pub fn encode_entries<T: ListEntry>(entries: &[T]) -> Result<String, ProtocolError> {
    let groups: Vec<Vec<Param>> = entries.iter().map(ListEntry::to_params).collect();
    encode_list(&groups)
}

/// Decodes a list value into entries.
pub fn decode_entries<T: ListEntry>(value: &str) -> Result<Vec<T>, ProtocolError> {
    decode_list(value)?
        .iter()
        .map(|group| T::from_params(group))
        .collect()
}

fn field<'a>(params: &'a [Param], name: &'static str) -> Result<&'a str, ProtocolError> {
    find_param(params, name).ok_or(ProtocolError::InvalidParam {
        name,
        reason: "missing list field".into(),
    })
}

fn number<T: std::str::FromStr>(
    params: &[Param],
    name: &'static str,
) -> Result<T, ProtocolError> {
    let raw = field(params, name)?;
    raw.parse().map_err(|_| ProtocolError::InvalidParam {
        name,
        reason: format!("{raw:?} is not a number"),
    })
}

fn flag(params: &[Param], name: &'static str) -> Result<bool, ProtocolError> {
    match field(params, name)? {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ProtocolError::InvalidParam {
            name,
            reason: format!("{other:?} is not 0 or 1"),
        }),
    }
}

fn bit(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// One joinable game in a game list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameListEntry {
    pub game_name: String,
    pub max_players: usize,
    pub connected_players: usize,
}

impl ListEntry for GameListEntry {
    fn to_params(&self) -> Vec<Param> {
        vec![
            Param::new("gameName", &self.game_name),
            Param::new("maxPlayers", self.max_players.to_string()),
            Param::new("connectedPlayers", self.connected_players.to_string()),
        ]
    }

    fn from_params(params: &[Param]) -> Result<Self, ProtocolError> {
        Ok(Self {
            game_name: field(params, "gameName")?.to_string(),
            max_players: number(params, "maxPlayers")?,
            connected_players: number(params, "connectedPlayers")?,
        })
    }
}

/// One member of a game that has not started yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerListEntry {
    pub player_name: String,
    pub is_connected: bool,
}

impl ListEntry for PlayerListEntry {
    fn to_params(&self) -> Vec<Param> {
        vec![
            Param::new("playerName", &self.player_name),
            Param::new("isConnected", bit(self.is_connected)),
        ]
    }

    fn from_params(params: &[Param]) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_name: field(params, "playerName")?.to_string(),
            is_connected: flag(params, "isConnected")?,
        })
    }
}

/// One seat in a running game's scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDataEntry {
    pub player_name: String,
    pub is_connected: bool,
    pub score: u32,
    pub is_turn: bool,
}

impl ListEntry for GameDataEntry {
    fn to_params(&self) -> Vec<Param> {
        vec![
            Param::new("playerName", &self.player_name),
            Param::new("isConnected", bit(self.is_connected)),
            Param::new("score", self.score.to_string()),
            Param::new("isTurn", bit(self.is_turn)),
        ]
    }

    fn from_params(params: &[Param]) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_name: field(params, "playerName")?.to_string(),
            is_connected: flag(params, "isConnected")?,
            score: number(params, "score")?,
            is_turn: flag(params, "isTurn")?,
        })
    }
}

/// One die face, as sent in `cubeValues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeValue(pub u8);

impl ListEntry for CubeValue {
    fn to_params(&self) -> Vec<Param> {
        vec![Param::new("value", self.0.to_string())]
    }

    fn from_params(params: &[Param]) -> Result<Self, ProtocolError> {
        let value: u8 = number(params, "value")?;
        if !(1..=6).contains(&value) {
            return Err(ProtocolError::InvalidParam {
                name: "value",
                reason: format!("{value} is not a die face"),
            });
        }
        Ok(Self(value))
    }
}

/// Encodes die faces as a `cubeValues` list.
pub fn encode_cubes(values: &[u8]) -> Result<String, ProtocolError> {
    let cubes: Vec<CubeValue> = values.iter().copied().map(CubeValue).collect();
    encode_entries(&cubes)
}

/// Decodes a `cubeValues` list into die faces.
pub fn decode_cubes(value: &str) -> Result<Vec<u8>, ProtocolError> {
    Ok(decode_entries::<CubeValue>(value)?
        .into_iter()
        .map(|c| c.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_cubes_wire_form() {
        assert_eq!(
            encode_cubes(&[1, 5]).unwrap(),
            "[{\"value\":\"1\"};{\"value\":\"5\"}]"
        );
        assert_eq!(encode_cubes(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_decode_cubes_rejects_non_face() {
        assert!(decode_cubes("[{\"value\":\"7\"}]").is_err());
        assert!(decode_cubes("[{\"value\":\"x\"}]").is_err());
        assert!(decode_cubes("[{\"face\":\"1\"}]").is_err());
    }

    #[test]
    fn test_game_list_entries_round_trip() {
        let entries = vec![
            GameListEntry {
                game_name: "g1".into(),
                max_players: 2,
                connected_players: 1,
            },
            GameListEntry {
                game_name: "g2".into(),
                max_players: 4,
                connected_players: 0,
            },
        ];
        let value = encode_entries(&entries).unwrap();
        assert_eq!(decode_entries::<GameListEntry>(&value).unwrap(), entries);
    }

    #[test]
    fn test_game_data_entry_uses_bit_flags() {
        let entry = GameDataEntry {
            player_name: "alice".into(),
            is_connected: true,
            score: 150,
            is_turn: false,
        };
        assert_eq!(
            encode_entries(&[entry]).unwrap(),
            "[{\"playerName\":\"alice\",\"isConnected\":\"1\",\"score\":\"150\",\"isTurn\":\"0\"}]"
        );
    }

    #[test]
    fn test_player_list_bad_flag_is_rejected() {
        let value = "[{\"playerName\":\"bob\",\"isConnected\":\"yes\"}]";
        assert!(decode_entries::<PlayerListEntry>(value).is_err());
    }
}
