//! Room-server wire vocabulary.
//!
//! Event names and field names are the server's literals (`successi`,
//! `complicazioni`, `"successo"`, `"complicazione"`, ...). Renaming any of them
//! breaks compatibility with the server.

pub mod frame;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::bag::Bag;
use crate::character::CharacterSheet;
use crate::weather::{Season, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "successo")]
    Success,
    #[serde(rename = "complicazione")]
    Complication,
}

impl TokenKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            TokenKind::Success => "successo",
            TokenKind::Complication => "complicazione",
        }
    }

    pub fn glyph(&self) -> char {
        match self {
            TokenKind::Success => '⚪',
            TokenKind::Complication => '⚫',
        }
    }
}

/// Count successes and complications in a drawn sequence
pub fn tally(drawn: &[TokenKind]) -> (u32, u32) {
    drawn.iter().fold((0, 0), |(s, c), t| match t {
        TokenKind::Success => (s + 1, c),
        TokenKind::Complication => (s, c + 1),
    })
}

/// One line of the room's draw history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub player: String,
    pub drawn: Vec<TokenKind>,
    #[serde(rename = "successi", default)]
    pub success: u32,
    #[serde(rename = "complicazioni", default)]
    pub complication: u32,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub adrenaline: bool,
    #[serde(default)]
    pub confusion: bool,
    #[serde(default)]
    pub risk_all: bool,
    #[serde(rename = "total_successi", default, skip_serializing_if = "Option::is_none")]
    pub total_success: Option<u32>,
    #[serde(rename = "total_complicazioni", default, skip_serializing_if = "Option::is_none")]
    pub total_complication: Option<u32>,
}

impl HistoryEntry {
    /// Wall-clock label for display; the server sends naive ISO timestamps.
    pub fn time_label(&self) -> String {
        chrono::NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|_| self.timestamp.clone())
    }
}

/// `tokens_drawn` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub player: String,
    pub drawn: Vec<TokenKind>,
    #[serde(rename = "successi")]
    pub success: u32,
    #[serde(rename = "complicazioni")]
    pub complication: u32,
    pub bag_remaining: Bag,
    pub history: HistoryEntry,
    #[serde(default)]
    pub adrenaline: bool,
    #[serde(default)]
    pub confusion: bool,
}

/// `risk_all_result` payload. `total_*` are cumulative over the original draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAllOutcome {
    pub player: String,
    pub drawn: Vec<TokenKind>,
    #[serde(rename = "successi")]
    pub success: u32,
    #[serde(rename = "complicazioni")]
    pub complication: u32,
    #[serde(rename = "total_successi")]
    pub total_success: u32,
    #[serde(rename = "total_complicazioni")]
    pub total_complication: u32,
    pub bag_remaining: Bag,
    pub history: HistoryEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub players: Vec<String>,
    #[serde(default)]
    pub bag: Bag,
    /// Newest first, as the server sends it
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(rename = "stagione")]
    pub season: String,
    #[serde(rename = "zona")]
    pub zone: String,
    #[serde(rename = "meteo")]
    pub weather: String,
    #[serde(default)]
    pub player: String,
}

/// Decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    RoomCreated { room_id: String, player_name: String },
    RoomJoined { room_id: String, player_name: String, room: RoomSnapshot },
    PlayerJoined { player_name: String, players: Vec<String> },
    BagConfigured(Bag),
    HelpAdded { helper: String, bag: Bag },
    TokensDrawn(DrawOutcome),
    RiskAllResult(RiskAllOutcome),
    TokensReturned(Bag),
    AdrenalineUpdated { player: String, value: i64 },
    ConfusionUpdated { player: String, value: i64 },
    WeatherGenerated(WeatherReport),
    BagReset,
    CharacterSaved { player_name: String, character: CharacterSheet },
    MyCharacterLoaded(Option<CharacterSheet>),
    CharactersLoaded { characters: BTreeMap<String, CharacterSheet>, is_master: bool },
    Error { message: String },
    Unknown { name: String },
}

#[derive(Deserialize)]
struct RoomCreatedWire {
    room_id: String,
    #[serde(default)]
    player_name: String,
}

#[derive(Deserialize)]
struct RoomJoinedWire {
    room_id: String,
    #[serde(default)]
    player_name: String,
    room_data: RoomSnapshot,
}

#[derive(Deserialize)]
struct PlayerJoinedWire {
    player_name: String,
    #[serde(default)]
    players: Vec<String>,
}

#[derive(Deserialize)]
struct HelpAddedWire {
    #[serde(default)]
    helper: String,
    bag: Bag,
}

#[derive(Deserialize)]
struct BagWire {
    bag: Bag,
}

#[derive(Deserialize)]
struct AdrenalineWire {
    player: String,
    adrenaline: i64,
}

#[derive(Deserialize)]
struct ConfusionWire {
    player: String,
    confusion: i64,
}

#[derive(Deserialize)]
struct CharacterSavedWire {
    player_name: String,
    character: CharacterSheet,
}

#[derive(Deserialize)]
struct MyCharacterWire {
    #[serde(default)]
    character: Option<CharacterSheet>,
}

#[derive(Deserialize)]
struct CharactersWire {
    #[serde(default)]
    characters: BTreeMap<String, CharacterSheet>,
    #[serde(default)]
    is_master: bool,
}

#[derive(Deserialize)]
struct ErrorWire {
    #[serde(default)]
    message: String,
}

impl ServerEvent {
    pub fn decode(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        let ev = match name {
            "room_created" => {
                let w: RoomCreatedWire = serde_json::from_value(data)?;
                ServerEvent::RoomCreated { room_id: w.room_id, player_name: w.player_name }
            }
            "room_joined" => {
                let w: RoomJoinedWire = serde_json::from_value(data)?;
                ServerEvent::RoomJoined {
                    room_id: w.room_id,
                    player_name: w.player_name,
                    room: w.room_data,
                }
            }
            "player_joined" => {
                let w: PlayerJoinedWire = serde_json::from_value(data)?;
                ServerEvent::PlayerJoined { player_name: w.player_name, players: w.players }
            }
            "bag_configured" => ServerEvent::BagConfigured(serde_json::from_value(data)?),
            "help_added" => {
                let w: HelpAddedWire = serde_json::from_value(data)?;
                ServerEvent::HelpAdded { helper: w.helper, bag: w.bag }
            }
            "tokens_drawn" => ServerEvent::TokensDrawn(serde_json::from_value(data)?),
            "risk_all_result" => ServerEvent::RiskAllResult(serde_json::from_value(data)?),
            "tokens_returned" => {
                let w: BagWire = serde_json::from_value(data)?;
                ServerEvent::TokensReturned(w.bag)
            }
            "adrenaline_updated" => {
                let w: AdrenalineWire = serde_json::from_value(data)?;
                ServerEvent::AdrenalineUpdated { player: w.player, value: w.adrenaline }
            }
            "confusion_updated" => {
                let w: ConfusionWire = serde_json::from_value(data)?;
                ServerEvent::ConfusionUpdated { player: w.player, value: w.confusion }
            }
            "weather_generated" => ServerEvent::WeatherGenerated(serde_json::from_value(data)?),
            "bag_reset" => ServerEvent::BagReset,
            "character_saved" => {
                let w: CharacterSavedWire = serde_json::from_value(data)?;
                ServerEvent::CharacterSaved { player_name: w.player_name, character: w.character }
            }
            "my_character_loaded" => {
                let w: MyCharacterWire = serde_json::from_value(data)?;
                ServerEvent::MyCharacterLoaded(w.character)
            }
            "characters_loaded" => {
                let w: CharactersWire = serde_json::from_value(data)?;
                ServerEvent::CharactersLoaded { characters: w.characters, is_master: w.is_master }
            }
            "error" => {
                let w: ErrorWire = serde_json::from_value(data)?;
                ServerEvent::Error { message: w.message }
            }
            other => ServerEvent::Unknown { name: other.to_string() },
        };
        Ok(ev)
    }

    pub fn name(&self) -> &str {
        match self {
            ServerEvent::RoomCreated { .. } => "room_created",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::PlayerJoined { .. } => "player_joined",
            ServerEvent::BagConfigured(_) => "bag_configured",
            ServerEvent::HelpAdded { .. } => "help_added",
            ServerEvent::TokensDrawn(_) => "tokens_drawn",
            ServerEvent::RiskAllResult(_) => "risk_all_result",
            ServerEvent::TokensReturned(_) => "tokens_returned",
            ServerEvent::AdrenalineUpdated { .. } => "adrenaline_updated",
            ServerEvent::ConfusionUpdated { .. } => "confusion_updated",
            ServerEvent::WeatherGenerated(_) => "weather_generated",
            ServerEvent::BagReset => "bag_reset",
            ServerEvent::CharacterSaved { .. } => "character_saved",
            ServerEvent::MyCharacterLoaded(_) => "my_character_loaded",
            ServerEvent::CharactersLoaded { .. } => "characters_loaded",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown { name } => name,
        }
    }
}

/// Requests the client can make. Room and player identity are added when the
/// request is turned into an [`OutboundEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    CreateRoom,
    JoinRoom { room_id: String },
    ConfigureBag(Bag),
    DrawTokens { num_tokens: u32, adrenaline: bool, confusion: bool },
    RiskAll { num_tokens: u32, previous_success: u32, previous_complication: u32 },
    AddHelp,
    ResetBag,
    ReturnTokens(Bag),
    UpdateAdrenaline(i64),
    UpdateConfusion(i64),
    GenerateWeather { season: Season, zone: Zone },
    SaveCharacter(Box<CharacterSheet>),
    LoadMyCharacter,
    GetCharacters,
}

impl ClientRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::CreateRoom => "create_room",
            ClientRequest::JoinRoom { .. } => "join_room",
            ClientRequest::ConfigureBag(_) => "configure_bag",
            ClientRequest::DrawTokens { .. } => "draw_tokens",
            ClientRequest::RiskAll { .. } => "risk_all",
            ClientRequest::AddHelp => "add_help",
            ClientRequest::ResetBag => "reset_bag",
            ClientRequest::ReturnTokens(_) => "return_tokens",
            ClientRequest::UpdateAdrenaline(_) => "update_adrenaline",
            ClientRequest::UpdateConfusion(_) => "update_confusion",
            ClientRequest::GenerateWeather { .. } => "generate_weather",
            ClientRequest::SaveCharacter(_) => "save_character",
            ClientRequest::LoadMyCharacter => "load_my_character",
            ClientRequest::GetCharacters => "get_characters",
        }
    }

    pub fn into_event(self, room_id: Option<&str>, player_name: &str) -> OutboundEvent {
        let name = self.name();
        let body = match self {
            ClientRequest::CreateRoom
            | ClientRequest::AddHelp
            | ClientRequest::ResetBag
            | ClientRequest::LoadMyCharacter
            | ClientRequest::GetCharacters => json!({}),
            ClientRequest::JoinRoom { room_id } => json!({ "room_id": room_id }),
            ClientRequest::ConfigureBag(bag) | ClientRequest::ReturnTokens(bag) => json!({
                "successi": bag.success,
                "complicazioni": bag.complication,
            }),
            ClientRequest::DrawTokens { num_tokens, adrenaline, confusion } => json!({
                "num_tokens": num_tokens,
                "adrenaline": adrenaline,
                "confusion": confusion,
            }),
            ClientRequest::RiskAll { num_tokens, previous_success, previous_complication } => json!({
                "num_tokens": num_tokens,
                "previous_successi": previous_success,
                "previous_complicazioni": previous_complication,
            }),
            ClientRequest::UpdateAdrenaline(v) => json!({ "adrenaline": v }),
            ClientRequest::UpdateConfusion(v) => json!({ "confusion": v }),
            ClientRequest::GenerateWeather { season, zone } => json!({
                "stagione": season.as_wire(),
                "zona": zone.as_wire(),
            }),
            ClientRequest::SaveCharacter(sheet) => json!({ "character": sheet }),
        };

        let mut payload = match body {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        if let Some(room) = room_id {
            payload.entry("room_id").or_insert_with(|| json!(room));
        }
        payload.insert("player_name".to_string(), json!(player_name));

        OutboundEvent { name, payload: Value::Object(payload) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub name: &'static str,
    pub payload: Value,
}

impl OutboundEvent {
    pub fn encode(&self) -> String {
        frame::encode_event(self.name, &self.payload)
    }
}
