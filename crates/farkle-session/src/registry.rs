//! The player registry: every player the server knows about.
//!
//! Players are keyed by nickname, which is unique for the lifetime of the
//! registration. A player is added on login and removed on logout; a
//! player that merely lost its connection stays here, marked
//! disconnected, until it reconnects.
//!
//! # Concurrency note
//!
//! Every session task and every game coordinator reaches into the
//! registry, so the map sits behind a `Mutex`. The lock is only held for
//! the map operation itself; callers get an `Arc<Player>` back and work
//! with the player's own lock afterwards. A `BTreeMap` keeps iteration in
//! nickname order, which makes broadcasts deterministic.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Player, SessionError};

/// All registered players.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Mutex<BTreeMap<String, Arc<Player>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<Player>>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a player under its nickname.
    ///
    /// # Errors
    /// Returns [`SessionError::DuplicateNickname`] if the nickname is taken,
    /// whether or not the existing player is connected.
    pub fn add(&self, player: Player) -> Result<Arc<Player>, SessionError> {
        let mut players = self.lock();
        if players.contains_key(player.nickname()) {
            return Err(SessionError::DuplicateNickname(player.nickname().to_string()));
        }
        let player = Arc::new(player);
        players.insert(player.nickname().to_string(), Arc::clone(&player));
        Ok(player)
    }

    /// Looks up a player by nickname.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if nobody is registered under it.
    pub fn get(&self, nickname: &str) -> Result<Arc<Player>, SessionError> {
        self.lock()
            .get(nickname)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(nickname.to_string()))
    }

    /// Unregisters a player. Returns it if it was registered.
    pub fn remove(&self, nickname: &str) -> Option<Arc<Player>> {
        self.lock().remove(nickname)
    }

    /// All registered players in nickname order.
    pub fn snapshot(&self) -> Vec<Arc<Player>> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn player(nick: &str) -> Player {
        let (tx, _rx) = mpsc::unbounded_channel();
        Player::new(nick, tx)
    }

    #[test]
    fn test_add_then_get() {
        let registry = PlayerRegistry::new();
        let added = registry.add(player("alice")).unwrap();

        let found = registry.get("alice").unwrap();

        assert!(Arc::ptr_eq(&added, &found));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_duplicate_nickname_fails() {
        let registry = PlayerRegistry::new();
        registry.add(player("alice")).unwrap();

        let err = registry.add(player("alice")).unwrap_err();

        assert!(matches!(err, SessionError::DuplicateNickname(n) if n == "alice"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_check_includes_disconnected_players() {
        let registry = PlayerRegistry::new();
        registry.add(player("alice")).unwrap().disconnect();

        assert!(registry.add(player("alice")).is_err());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = PlayerRegistry::new();
        assert!(matches!(
            registry.get("ghost"),
            Err(SessionError::NotFound(n)) if n == "ghost"
        ));
    }

    #[test]
    fn test_remove_frees_nickname() {
        let registry = PlayerRegistry::new();
        registry.add(player("alice")).unwrap();

        assert!(registry.remove("alice").is_some());
        assert!(registry.remove("alice").is_none());
        assert!(registry.is_empty());
        assert!(registry.add(player("alice")).is_ok());
    }

    #[test]
    fn test_snapshot_is_in_nickname_order() {
        let registry = PlayerRegistry::new();
        for nick in ["carol", "alice", "bob"] {
            registry.add(player(nick)).unwrap();
        }

        let names: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|p| p.nickname().to_string())
            .collect();

        assert_eq!(names, ["alice", "bob", "carol"]);
    }
}
