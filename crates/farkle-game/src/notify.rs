//! Building and delivering the server's list messages.
//!
//! Everything here goes through [`Player::send`], so recipients whose
//! state doesn't permit a message simply don't get it.

use farkle_protocol::{
    encode_entries, params, CommandId, GameDataEntry, Message, Param, PlayerListEntry,
};
use farkle_session::{Delivery, Player, PlayerRegistry};

use crate::{lock_game, Game, GameError, GameRegistry, SharedGame};

/// Answers a request, echoing its timestamp.
pub fn respond(player: &Player, command: CommandId, timestamp: &str, params: Vec<Param>) -> Delivery {
    player.send(Message::new(command, player.nickname(), params).with_timestamp(timestamp))
}

/// Sends an unsolicited message with a fresh timestamp.
pub fn update(player: &Player, command: CommandId, params: Vec<Param>) -> Delivery {
    player.send(Message::new(command, player.nickname(), params))
}

fn is_connected(players: &PlayerRegistry, nickname: &str) -> bool {
    players.get(nickname).is_ok_and(|p| p.is_connected())
}

/// The lobby's `gameList` parameter.
pub fn game_list_param(games: &GameRegistry) -> Result<Param, GameError> {
    let list = encode_entries(&games.created_games_list())?;
    Ok(Param::new(params::GAME_LIST, list))
}

/// The `playerList` parameter for a game that hasn't started.
pub fn player_list_param(game: &Game, players: &PlayerRegistry) -> Result<Param, GameError> {
    let entries: Vec<PlayerListEntry> = game
        .players()
        .iter()
        .map(|p| PlayerListEntry {
            player_name: p.nickname.clone(),
            is_connected: is_connected(players, &p.nickname),
        })
        .collect();
    Ok(Param::new(params::PLAYER_LIST, encode_entries(&entries)?))
}

/// The `gameData` scoreboard: seated players in turn order, then departed
/// players, who are always shown as disconnected.
pub fn game_data_param(game: &Game, players: &PlayerRegistry) -> Result<Param, GameError> {
    let current = game.current_turn_player().ok();
    let seated = game.players().iter().map(|p| GameDataEntry {
        player_name: p.nickname.clone(),
        is_connected: is_connected(players, &p.nickname),
        score: p.score,
        is_turn: current == Some(p.nickname.as_str()),
    });
    let departed = game.departed().map(|p| GameDataEntry {
        player_name: p.nickname.clone(),
        is_connected: false,
        score: p.score,
        is_turn: false,
    });
    let entries: Vec<GameDataEntry> = seated.chain(departed).collect();
    Ok(Param::new(params::GAME_DATA, encode_entries(&entries)?))
}

/// Sends the current game list to every player in the lobby.
pub fn broadcast_game_list(players: &PlayerRegistry, games: &GameRegistry) {
    let param = match game_list_param(games) {
        Ok(param) => param,
        Err(e) => {
            tracing::error!(error = %e, "failed to build game list");
            return;
        }
    };
    for player in players.snapshot() {
        if player.is_connected() && player.can_fire(CommandId::ServerUpdateGameList) {
            update(&player, CommandId::ServerUpdateGameList, vec![param.clone()]);
        }
    }
}

/// Sends a game's player list to its members.
pub fn broadcast_player_list(players: &PlayerRegistry, game: &SharedGame) {
    let built = {
        let game = lock_game(game);
        player_list_param(&game, players).map(|param| (game.player_names(), param))
    };
    send_to_members(players, built, CommandId::ServerUpdatePlayerList);
}

/// Sends a running game's scoreboard to its seated players.
pub fn broadcast_game_data(players: &PlayerRegistry, game: &SharedGame) {
    let built = {
        let game = lock_game(game);
        game_data_param(&game, players).map(|param| (game.player_names(), param))
    };
    send_to_members(players, built, CommandId::ServerUpdateGameData);
}

fn send_to_members(
    players: &PlayerRegistry,
    built: Result<(Vec<String>, Param), GameError>,
    command: CommandId,
) {
    let (members, param) = match built {
        Ok(built) => built,
        Err(e) => {
            tracing::error!(error = %e, ?command, "failed to build update");
            return;
        }
    };
    for nickname in members {
        if let Ok(player) = players.get(&nickname) {
            update(&player, command, vec![param.clone()]);
        }
    }
}
