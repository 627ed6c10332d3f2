//! Room roster and the per-player adrenaline/confusion values the server
//! broadcasts.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub adrenaline: i64,
    pub confusion: i64,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerBoard {
    players: Vec<String>,
    status: BTreeMap<String, PlayerStatus>,
}

impl PlayerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roster(&mut self, players: Vec<String>) {
        self.players = players;
    }

    pub fn join(&mut self, player: &str) {
        if !self.players.iter().any(|p| p == player) {
            self.players.push(player.to_string());
        }
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn set_adrenaline(&mut self, player: &str, value: i64) {
        self.status.entry(player.to_string()).or_default().adrenaline = value;
    }

    pub fn set_confusion(&mut self, player: &str, value: i64) {
        self.status.entry(player.to_string()).or_default().confusion = value;
    }

    pub fn status(&self, player: &str) -> PlayerStatus {
        self.status.get(player).copied().unwrap_or_default()
    }
}
