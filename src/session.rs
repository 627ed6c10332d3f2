//! Client session: the single owned value the event loop mutates.
//!
//! Three entry points feed it: user [`Action`]s, decoded [`ServerEvent`]s and
//! the passage of time. Every entry point first advances the timer queue to
//! `now`, so timers that are due fire before the new input is handled. User
//! actions return the requests to send; everything the presentation should
//! react to is buffered as [`SessionEvent`]s and collected with
//! [`Session::drain_events`].

use crate::bag::{checked_counts, Bag, BagBridge};
use crate::character::{CharacterEditor, CharacterRoster, SheetField};
use crate::clock::{Millis, TimerId, TimerQueue};
use crate::config::Config;
use crate::draw::{DisplayedDraw, DrawFlow, DrawPhase, DrawResolution, RiskAllOffer};
use crate::error::ClientError;
use crate::history::HistoryLog;
use crate::logging::{log, log_rejected, log_request, obj, v_str, Domain, Level};
use crate::protocol::{
    ClientRequest, DrawOutcome, HistoryEntry, OutboundEvent, RiskAllOutcome, RoomSnapshot, ServerEvent,
    TokenKind, WeatherReport,
};
use crate::reveal::{RevealSequencer, RevealStep};
use crate::status::{PlayerBoard, PlayerStatus};
use crate::traits::TraitKind;
use crate::weather::{Season, Zone};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetName(String),
    CreateRoom,
    JoinRoom(String),
    LeaveRoom,

    AddTrait(TraitKind),
    RemoveTrait(String),
    RenameTrait { id: String, name: String },
    ToggleSelected(String),
    ToggleEmpowered(String),
    SetModifier(i64),
    SetArchetype(String),
    EditSheet { field: SheetField, value: String },
    AddMisfortune(String),
    AddLesson(String),
    SetPhoto { bytes: Vec<u8>, mime: String },

    ConfigureBag { success: i64, complication: i64 },
    ConfigureFromTraits { complication: i64 },
    AddHelp,
    ResetBag,
    ReturnTokens { success: i64, complication: i64 },

    SetAdrenaline(bool),
    SetConfusion(bool),
    Draw(u32),
    RiskAll,
    SkipReveal,

    UpdateAdrenaline(i64),
    UpdateConfusion(i64),
    GenerateWeather { season: Season, zone: Zone },
    ClearHistory,

    SaveCharacter,
    LoadMyCharacter,
    GetCharacters,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::SetName(_) => "set_name",
            Action::CreateRoom => "create_room",
            Action::JoinRoom(_) => "join_room",
            Action::LeaveRoom => "leave_room",
            Action::AddTrait(_) => "add_trait",
            Action::RemoveTrait(_) => "remove_trait",
            Action::RenameTrait { .. } => "rename_trait",
            Action::ToggleSelected(_) => "toggle_selected",
            Action::ToggleEmpowered(_) => "toggle_empowered",
            Action::SetModifier(_) => "set_modifier",
            Action::SetArchetype(_) => "set_archetype",
            Action::EditSheet { .. } => "edit_sheet",
            Action::AddMisfortune(_) => "add_misfortune",
            Action::AddLesson(_) => "add_lesson",
            Action::SetPhoto { .. } => "set_photo",
            Action::ConfigureBag { .. } => "configure_bag",
            Action::ConfigureFromTraits { .. } => "configure_from_traits",
            Action::AddHelp => "add_help",
            Action::ResetBag => "reset_bag",
            Action::ReturnTokens { .. } => "return_tokens",
            Action::SetAdrenaline(_) => "set_adrenaline",
            Action::SetConfusion(_) => "set_confusion",
            Action::Draw(_) => "draw",
            Action::RiskAll => "risk_all",
            Action::SkipReveal => "skip_reveal",
            Action::UpdateAdrenaline(_) => "update_adrenaline",
            Action::UpdateConfusion(_) => "update_confusion",
            Action::GenerateWeather { .. } => "generate_weather",
            Action::ClearHistory => "clear_history",
            Action::SaveCharacter => "save_character",
            Action::LoadMyCharacter => "load_my_character",
            Action::GetCharacters => "get_characters",
        }
    }

    fn domain(&self) -> Domain {
        match self {
            Action::SetName(_) | Action::CreateRoom | Action::JoinRoom(_) | Action::LeaveRoom => Domain::Room,
            Action::AddTrait(_)
            | Action::RemoveTrait(_)
            | Action::RenameTrait { .. }
            | Action::ToggleSelected(_)
            | Action::ToggleEmpowered(_)
            | Action::SetModifier(_)
            | Action::SetArchetype(_) => Domain::Traits,
            Action::ConfigureBag { .. }
            | Action::ConfigureFromTraits { .. }
            | Action::AddHelp
            | Action::ResetBag
            | Action::ReturnTokens { .. } => Domain::Bag,
            Action::SetAdrenaline(_)
            | Action::SetConfusion(_)
            | Action::Draw(_)
            | Action::RiskAll
            | Action::SkipReveal
            | Action::ClearHistory => Domain::Draw,
            Action::UpdateAdrenaline(_) | Action::UpdateConfusion(_) | Action::GenerateWeather { .. } => Domain::Room,
            Action::EditSheet { .. }
            | Action::AddMisfortune(_)
            | Action::AddLesson(_)
            | Action::SetPhoto { .. }
            | Action::SaveCharacter
            | Action::LoadMyCharacter
            | Action::GetCharacters => Domain::Character,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
    /// The server is slow; nothing was undone
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Notice(Notice),
    NoticeExpired(u64),
    RoomEntered { room_id: String },
    RoomLeft,
    PlayersChanged(Vec<String>),
    BagChanged(Bag),
    RevealStarted { tokens: usize },
    TokenRevealed { index: usize, kind: TokenKind },
    DrawShown(DisplayedDraw),
    RiskAllOffered(RiskAllOffer),
    HistoryAdded(HistoryEntry),
    StatusChanged { player: String, status: PlayerStatus },
    WeatherReported(WeatherReport),
    CharacterLoaded,
    CharacterSaved { player: String },
    CharactersLoaded { count: usize, is_master: bool },
}

#[derive(Debug, Clone, PartialEq)]
enum Timer {
    DrawTimeout { cycle: u64 },
    Reveal { cycle: u64, step: RevealStep },
    NoticeExpire(u64),
}

/// State that only exists while in a room
#[derive(Debug)]
pub struct Room {
    id: String,
    bag: BagBridge,
    history: HistoryLog,
    board: PlayerBoard,
    roster: CharacterRoster,
    reveal: Option<RevealSequencer>,
    draw_timer: Option<TimerId>,
}

impl Room {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bag(&self) -> Bag {
        self.bag.mirror()
    }

    pub fn help_available(&self) -> bool {
        self.bag.help_available()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn board(&self) -> &PlayerBoard {
        &self.board
    }

    pub fn roster(&self) -> &CharacterRoster {
        &self.roster
    }
}

pub struct Session {
    player: String,
    config: Config,
    timers: TimerQueue<Timer>,
    room: Option<Room>,
    joining: bool,
    flow: DrawFlow,
    character: CharacterEditor,
    weather: Option<WeatherReport>,
    notices: Vec<Notice>,
    notice_seq: u64,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(player: &str, config: Config) -> Self {
        Self {
            player: player.trim().to_string(),
            config,
            timers: TimerQueue::new(),
            room: None,
            joining: false,
            flow: DrawFlow::new(),
            character: CharacterEditor::new(),
            weather: None,
            notices: Vec::new(),
            notice_seq: 0,
            events: Vec::new(),
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room.as_ref().map(|r| r.id.as_str())
    }

    pub fn is_joining(&self) -> bool {
        self.joining
    }

    pub fn flow(&self) -> &DrawFlow {
        &self.flow
    }

    pub fn character(&self) -> &CharacterEditor {
        &self.character
    }

    pub fn character_mut(&mut self) -> &mut CharacterEditor {
        &mut self.character
    }

    pub fn weather(&self) -> Option<&WeatherReport> {
        self.weather.as_ref()
    }

    /// Notices currently on screen
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn now(&self) -> Millis {
        self.timers.now()
    }

    pub fn next_deadline(&mut self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fire every timer due at `now`
    pub fn tick(&mut self, now: Millis) {
        for (_, timer) in self.timers.advance_to(now) {
            self.on_timer(timer);
        }
    }

    /// Run a user action. Rejections become an error notice and leave the
    /// session untouched.
    pub fn apply(&mut self, action: Action, now: Millis) -> Result<Vec<OutboundEvent>, ClientError> {
        self.tick(now);
        let label = action.label();
        let domain = action.domain();
        match self.dispatch(action) {
            Ok(out) => {
                if out.iter().any(|e| !matches!(e.name, "draw_tokens" | "risk_all")) {
                    self.flow.note_request();
                }
                Ok(out)
            }
            Err(e) => {
                log_rejected(domain, label, &e.to_string());
                self.notify(NoticeKind::Error, e.to_string());
                Err(e)
            }
        }
    }

    pub fn on_server_event(&mut self, ev: ServerEvent, now: Millis) {
        self.tick(now);
        log(Level::Debug, Domain::Net, "event", obj(&[("name", v_str(ev.name()))]));
        match ev {
            ServerEvent::RoomCreated { room_id, player_name } => {
                let mut board = PlayerBoard::new();
                let me = if player_name.is_empty() { self.player.clone() } else { player_name };
                board.join(&me);
                let snapshot = RoomSnapshot {
                    room_id: room_id.clone(),
                    players: Vec::new(),
                    bag: Bag::default(),
                    history: Vec::new(),
                };
                self.enter_room(room_id, snapshot, board);
                self.notify(NoticeKind::Success, format!("room created: {}", self.room_id().unwrap_or_default()));
            }
            ServerEvent::RoomJoined { room_id, room, .. } => {
                let mut board = PlayerBoard::new();
                board.set_roster(room.players.clone());
                self.enter_room(room_id, room, board);
                self.notify(NoticeKind::Success, format!("joined room {}", self.room_id().unwrap_or_default()));
            }
            ServerEvent::PlayerJoined { player_name, players } => {
                let Some(room) = self.room.as_mut() else { return };
                if players.is_empty() {
                    room.board.join(&player_name);
                } else {
                    room.board.set_roster(players);
                }
                let roster = room.board.players().to_vec();
                self.events.push(SessionEvent::PlayersChanged(roster));
                self.notify(NoticeKind::Info, format!("{} joined the room", player_name));
            }
            ServerEvent::BagConfigured(bag) => {
                let Some(room) = self.room.as_mut() else { return };
                room.bag.on_configured(bag);
                self.events.push(SessionEvent::BagChanged(bag));
                self.notify(NoticeKind::Success, "bag configured".to_string());
            }
            ServerEvent::HelpAdded { helper, bag } => {
                self.sync_bag(bag);
                self.notify(NoticeKind::Info, format!("{} added a help token", helper));
            }
            ServerEvent::TokensDrawn(outcome) => self.on_tokens_drawn(outcome),
            ServerEvent::RiskAllResult(outcome) => self.on_risk_all_result(outcome),
            ServerEvent::TokensReturned(bag) => {
                self.sync_bag(bag);
                self.notify(NoticeKind::Info, "tokens returned to the bag".to_string());
            }
            ServerEvent::AdrenalineUpdated { player, value } => {
                let Some(room) = self.room.as_mut() else { return };
                room.board.set_adrenaline(&player, value);
                let status = room.board.status(&player);
                self.events.push(SessionEvent::StatusChanged { player, status });
            }
            ServerEvent::ConfusionUpdated { player, value } => {
                let Some(room) = self.room.as_mut() else { return };
                room.board.set_confusion(&player, value);
                let status = room.board.status(&player);
                self.events.push(SessionEvent::StatusChanged { player, status });
            }
            ServerEvent::WeatherGenerated(report) => {
                self.weather = Some(report.clone());
                self.events.push(SessionEvent::WeatherReported(report));
            }
            ServerEvent::BagReset => {
                let Some(room) = self.room.as_mut() else { return };
                room.bag.on_reset();
                self.flow.clear_display();
                self.events.push(SessionEvent::BagChanged(Bag::default()));
                self.notify(NoticeKind::Info, "bag reset".to_string());
            }
            ServerEvent::CharacterSaved { player_name, character } => {
                if player_name == self.player {
                    self.character.mark_saved(&character);
                    self.notify(NoticeKind::Success, "character saved".to_string());
                }
                if let Some(room) = self.room.as_mut() {
                    room.roster.upsert(&player_name, character);
                }
                self.events.push(SessionEvent::CharacterSaved { player: player_name });
            }
            ServerEvent::MyCharacterLoaded(Some(sheet)) => {
                self.character.load(sheet);
                self.events.push(SessionEvent::CharacterLoaded);
            }
            ServerEvent::MyCharacterLoaded(None) => {
                log(Level::Info, Domain::Character, "no_saved_sheet", obj(&[]));
            }
            ServerEvent::CharactersLoaded { characters, is_master } => {
                let Some(room) = self.room.as_mut() else { return };
                let count = characters.len();
                room.roster.replace(characters, is_master);
                self.events.push(SessionEvent::CharactersLoaded { count, is_master });
            }
            ServerEvent::Error { message } => self.on_server_error(message),
            ServerEvent::Unknown { name } => {
                log(Level::Warn, Domain::Net, "unhandled_event", obj(&[("name", v_str(&name))]));
            }
        }
    }

    fn dispatch(&mut self, action: Action) -> Result<Vec<OutboundEvent>, ClientError> {
        match action {
            Action::SetName(name) => {
                if self.room.is_some() || self.joining {
                    return Err(ClientError::AlreadyInRoom);
                }
                self.player = name.trim().to_string();
                Ok(vec![])
            }
            Action::CreateRoom => {
                self.check_can_enter()?;
                self.joining = true;
                Ok(vec![self.request(ClientRequest::CreateRoom)])
            }
            Action::JoinRoom(room_id) => {
                let room_id = room_id.trim().to_string();
                if room_id.is_empty() {
                    return Err(ClientError::EmptyField("room id"));
                }
                self.check_can_enter()?;
                self.joining = true;
                Ok(vec![self.request(ClientRequest::JoinRoom { room_id })])
            }
            Action::LeaveRoom => {
                if self.room.is_none() {
                    return Err(ClientError::NotInRoom);
                }
                self.leave_room("left_room");
                self.notify(NoticeKind::Info, "left the room".to_string());
                Ok(vec![])
            }

            Action::AddTrait(kind) => {
                self.character.registry_mut().add_trait(kind)?;
                Ok(vec![])
            }
            Action::RemoveTrait(id) => {
                self.character.registry_mut().remove_trait(&id);
                Ok(vec![])
            }
            Action::RenameTrait { id, name } => {
                self.character.registry_mut().rename_trait(&id, &name)?;
                Ok(vec![])
            }
            Action::ToggleSelected(id) => {
                self.character.registry_mut().toggle_selected(&id)?;
                Ok(vec![])
            }
            Action::ToggleEmpowered(id) => {
                self.character.registry_mut().toggle_empowered(&id)?;
                Ok(vec![])
            }
            Action::SetModifier(m) => {
                self.character.registry_mut().set_modifier(m);
                Ok(vec![])
            }
            Action::SetArchetype(name) => {
                self.character.set_archetype(&name)?;
                Ok(vec![])
            }
            Action::EditSheet { field, value } => {
                self.character.details_mut().set_field(field, value);
                Ok(vec![])
            }
            Action::AddMisfortune(text) => {
                if text.trim().is_empty() {
                    return Err(ClientError::EmptyField("misfortune"));
                }
                self.character.details_mut().misfortunes.push(text);
                Ok(vec![])
            }
            Action::AddLesson(text) => {
                if text.trim().is_empty() {
                    return Err(ClientError::EmptyField("lesson"));
                }
                self.character.details_mut().lessons.push(text);
                Ok(vec![])
            }
            Action::SetPhoto { bytes, mime } => {
                if bytes.is_empty() {
                    self.character.details_mut().clear_photo();
                } else {
                    self.character.details_mut().set_photo(&bytes, &mime);
                }
                Ok(vec![])
            }

            Action::ConfigureBag { success, complication } => {
                let bag = self.room_mut()?.bag.configure(success, complication)?;
                Ok(vec![self.request(ClientRequest::ConfigureBag(bag))])
            }
            Action::ConfigureFromTraits { complication } => {
                let tally = self.character.registry().tally();
                let bag = self.room_mut()?.bag.configure_from_tally(&tally, complication)?;
                Ok(vec![self.request(ClientRequest::ConfigureBag(bag))])
            }
            Action::AddHelp => {
                self.room_mut()?.bag.take_help()?;
                Ok(vec![self.request(ClientRequest::AddHelp)])
            }
            Action::ResetBag => {
                self.room_mut()?;
                Ok(vec![self.request(ClientRequest::ResetBag)])
            }
            Action::ReturnTokens { success, complication } => {
                self.room_mut()?;
                let bag = checked_counts(success, complication)?;
                Ok(vec![self.request(ClientRequest::ReturnTokens(bag))])
            }

            Action::SetAdrenaline(on) => {
                self.flow.set_adrenaline(on);
                Ok(vec![])
            }
            Action::SetConfusion(on) => {
                self.flow.set_confusion(on);
                Ok(vec![])
            }
            Action::Draw(requested) => {
                let mirror = self.room_mut()?.bag.mirror();
                let ticket = self.flow.begin_draw(requested, mirror)?;
                let timer = self
                    .timers
                    .schedule_after(self.config.draw_timeout_ms, Timer::DrawTimeout { cycle: ticket.cycle });
                if let Some(room) = self.room.as_mut() {
                    room.draw_timer = Some(timer);
                }
                Ok(vec![self.request(ClientRequest::DrawTokens {
                    num_tokens: ticket.num_tokens,
                    adrenaline: ticket.adrenaline,
                    confusion: ticket.confusion,
                })])
            }
            Action::RiskAll => {
                let mirror = self.room_mut()?.bag.mirror();
                let offer = self.flow.begin_risk_all(mirror)?;
                Ok(vec![self.request(ClientRequest::RiskAll {
                    num_tokens: offer.num_tokens,
                    previous_success: offer.previous_success,
                    previous_complication: offer.previous_complication,
                })])
            }
            Action::SkipReveal => {
                self.skip_reveal("skipped");
                Ok(vec![])
            }

            Action::UpdateAdrenaline(v) => {
                self.room_mut()?;
                Ok(vec![self.request(ClientRequest::UpdateAdrenaline(v))])
            }
            Action::UpdateConfusion(v) => {
                self.room_mut()?;
                Ok(vec![self.request(ClientRequest::UpdateConfusion(v))])
            }
            Action::GenerateWeather { season, zone } => {
                self.check_named()?;
                Ok(vec![self.request(ClientRequest::GenerateWeather { season, zone })])
            }
            Action::ClearHistory => {
                self.room_mut()?.history.clear();
                self.notify(NoticeKind::Success, "history cleared".to_string());
                Ok(vec![])
            }

            Action::SaveCharacter => {
                self.room_mut()?;
                let sheet = self.character.save_request()?;
                Ok(vec![self.request(ClientRequest::SaveCharacter(Box::new(sheet)))])
            }
            Action::LoadMyCharacter => {
                self.room_mut()?;
                Ok(vec![self.request(ClientRequest::LoadMyCharacter)])
            }
            Action::GetCharacters => {
                self.room_mut()?;
                Ok(vec![self.request(ClientRequest::GetCharacters)])
            }
        }
    }

    fn request(&self, req: ClientRequest) -> OutboundEvent {
        let room_id = self.room_id();
        log_request(req.name(), room_id, &self.player);
        req.into_event(room_id, &self.player)
    }

    fn room_mut(&mut self) -> Result<&mut Room, ClientError> {
        self.room.as_mut().ok_or(ClientError::NotInRoom)
    }

    fn check_named(&self) -> Result<(), ClientError> {
        if self.player.is_empty() {
            return Err(ClientError::EmptyField("player name"));
        }
        Ok(())
    }

    fn check_can_enter(&self) -> Result<(), ClientError> {
        self.check_named()?;
        if self.room.is_some() || self.joining {
            return Err(ClientError::AlreadyInRoom);
        }
        Ok(())
    }

    fn enter_room(&mut self, room_id: String, snapshot: RoomSnapshot, board: PlayerBoard) {
        if self.room.is_some() {
            self.leave_room("new_room");
        }
        let mut history = HistoryLog::new(self.config.history_cap);
        history.preload(snapshot.history);
        let room = Room {
            id: room_id.clone(),
            bag: BagBridge::with_mirror(snapshot.bag),
            history,
            board,
            roster: CharacterRoster::default(),
            reveal: None,
            draw_timer: None,
        };
        let players = room.board.players().to_vec();
        self.room = Some(room);
        self.joining = false;
        log(Level::Info, Domain::Room, "entered", obj(&[("room_id", v_str(&room_id))]));
        self.events.push(SessionEvent::RoomEntered { room_id });
        self.events.push(SessionEvent::PlayersChanged(players));
        self.events.push(SessionEvent::BagChanged(snapshot.bag));
    }

    /// Tear down room-scoped state. A reveal in progress is finalized first.
    fn leave_room(&mut self, cause: &str) {
        self.skip_reveal(cause);
        self.cancel_draw_timer();
        self.flow.reset();
        if let Some(room) = self.room.take() {
            log(Level::Info, Domain::Room, "left", obj(&[("room_id", v_str(&room.id)), ("cause", v_str(cause))]));
        }
        self.joining = false;
        self.events.push(SessionEvent::RoomLeft);
    }

    fn on_tokens_drawn(&mut self, outcome: DrawOutcome) {
        if outcome.player != self.player {
            self.apply_broadcast(outcome.bag_remaining, outcome.history.clone());
            self.notify(NoticeKind::Info, format!("{} drew {} tokens", outcome.player, outcome.drawn.len()));
            return;
        }
        match self.flow.on_draw_result(outcome) {
            DrawResolution::Finalized(o) => {
                self.cancel_draw_timer();
                self.finalize_local(o);
            }
            DrawResolution::Reveal { cycle, outcome } => {
                self.cancel_draw_timer();
                self.apply_broadcast(outcome.bag_remaining, outcome.history);
                let timing = self.config.reveal_timing();
                let drawn = outcome.drawn;
                let seq = RevealSequencer::start(&mut self.timers, &drawn, timing, |step| Timer::Reveal { cycle, step });
                if let Some(room) = self.room.as_mut() {
                    room.reveal = Some(seq);
                }
                self.events.push(SessionEvent::RevealStarted { tokens: drawn.len() });
            }
            DrawResolution::Unsolicited(o) => self.apply_broadcast(o.bag_remaining, o.history),
        }
    }

    fn on_risk_all_result(&mut self, outcome: RiskAllOutcome) {
        let mine = outcome.player == self.player && self.flow.on_risk_all_result(&outcome);
        self.apply_broadcast(outcome.bag_remaining, outcome.history.clone());
        if mine {
            if let Some(shown) = self.flow.displayed() {
                self.events.push(SessionEvent::DrawShown(shown.clone()));
            }
            self.notify(
                NoticeKind::Success,
                format!(
                    "risk all: {} successes, {} complications in total",
                    outcome.total_success, outcome.total_complication
                ),
            );
        }
    }

    fn finalize_local(&mut self, outcome: DrawOutcome) {
        self.apply_broadcast(outcome.bag_remaining, outcome.history.clone());
        self.conclude_local(&outcome);
    }

    /// Display side of a finished local draw. Bag and history were applied
    /// when the result arrived.
    fn conclude_local(&mut self, outcome: &DrawOutcome) {
        if let Some(shown) = self.flow.displayed() {
            self.events.push(SessionEvent::DrawShown(shown.clone()));
        }
        if let Some(offer) = self.flow.risk_all_offer() {
            self.events.push(SessionEvent::RiskAllOffered(offer));
        }
        self.character.registry_mut().reset_after_roll();
        self.notify(
            NoticeKind::Success,
            format!("drew {} successes and {} complications", outcome.success, outcome.complication),
        );
    }

    /// Server-reported bag and history, whoever drew
    fn apply_broadcast(&mut self, bag: Bag, entry: HistoryEntry) {
        let Some(room) = self.room.as_mut() else { return };
        room.bag.sync(bag);
        room.history.push(entry.clone());
        self.events.push(SessionEvent::BagChanged(bag));
        self.events.push(SessionEvent::HistoryAdded(entry));
    }

    fn sync_bag(&mut self, bag: Bag) {
        let Some(room) = self.room.as_mut() else { return };
        room.bag.sync(bag);
        self.events.push(SessionEvent::BagChanged(bag));
    }

    fn skip_reveal(&mut self, cause: &str) {
        if let Some(room) = self.room.as_mut() {
            if let Some(mut seq) = room.reveal.take() {
                seq.cancel(&mut self.timers);
            }
        }
        if let Some(outcome) = self.flow.finish_reveal(cause) {
            self.conclude_local(&outcome);
        }
    }

    fn cancel_draw_timer(&mut self) {
        if let Some(id) = self.room.as_mut().and_then(|r| r.draw_timer.take()) {
            self.timers.cancel(id);
        }
    }

    fn on_server_error(&mut self, message: String) {
        self.joining = false;
        if let Some(room) = self.room.as_mut() {
            room.bag.on_server_error();
        }
        if self.flow.on_server_error() {
            self.cancel_draw_timer();
        }
        log(Level::Warn, Domain::Net, "server_error", obj(&[("msg", v_str(&message))]));
        self.notify(NoticeKind::Error, message);
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::DrawTimeout { cycle } => {
                if let Some(room) = self.room.as_mut() {
                    room.draw_timer = None;
                }
                if self.flow.on_timeout(cycle) {
                    log(Level::Warn, Domain::Draw, "timeout", obj(&[("cycle", serde_json::json!(cycle))]));
                    self.notify(NoticeKind::Advisory, "the server is not responding, still waiting".to_string());
                }
            }
            Timer::Reveal { cycle, step } => {
                if self.flow.phase() != DrawPhase::RevealingConfusion || self.flow.cycle() != cycle {
                    return;
                }
                match step {
                    RevealStep::Token { index, kind } => {
                        self.flow.reveal_token(index, kind);
                        self.events.push(SessionEvent::TokenRevealed { index, kind });
                    }
                    RevealStep::Complete { .. } => {
                        if let Some(room) = self.room.as_mut() {
                            room.reveal = None;
                        }
                        if let Some(outcome) = self.flow.finish_reveal("reveal_complete") {
                            self.conclude_local(&outcome);
                        }
                    }
                }
            }
            Timer::NoticeExpire(id) => {
                self.notices.retain(|n| n.id != id);
                self.events.push(SessionEvent::NoticeExpired(id));
            }
        }
    }

    fn notify(&mut self, kind: NoticeKind, text: String) {
        self.notice_seq += 1;
        let notice = Notice { id: self.notice_seq, kind, text };
        self.timers.schedule_after(self.config.notice_ttl_ms, Timer::NoticeExpire(notice.id));
        self.notices.push(notice.clone());
        self.events.push(SessionEvent::Notice(notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn joined(bag: Bag) -> Session {
        let mut s = Session::new("Mira", Config::default());
        s.apply(Action::JoinRoom("ab12cd34".into()), 0).unwrap();
        s.on_server_event(
            ServerEvent::RoomJoined {
                room_id: "ab12cd34".into(),
                player_name: "Mira".into(),
                room: RoomSnapshot { room_id: "ab12cd34".into(), players: vec!["Mira".into()], bag, history: vec![] },
            },
            0,
        );
        s.drain_events();
        s
    }

    #[test]
    fn test_actions_need_a_room() {
        let mut s = Session::new("Mira", Config::default());
        assert_eq!(s.apply(Action::Draw(1), 0), Err(ClientError::NotInRoom));
        assert_eq!(s.apply(Action::AddHelp, 0), Err(ClientError::NotInRoom));
        let events = s.drain_events();
        assert!(matches!(&events[0], SessionEvent::Notice(n) if n.kind == NoticeKind::Error));
    }

    #[test]
    fn test_join_requires_name() {
        let mut s = Session::new("  ", Config::default());
        assert_eq!(s.apply(Action::CreateRoom, 0), Err(ClientError::EmptyField("player name")));
        assert!(!s.is_joining());
    }

    #[test]
    fn test_second_join_rejected_while_pending() {
        let mut s = Session::new("Mira", Config::default());
        s.apply(Action::CreateRoom, 0).unwrap();
        assert_eq!(s.apply(Action::JoinRoom("x".into()), 0), Err(ClientError::AlreadyInRoom));
        s.on_server_event(ServerEvent::Error { message: "Utente non autenticato".into() }, 10);
        assert!(s.apply(Action::JoinRoom("x".into()), 20).is_ok());
    }

    #[test]
    fn test_room_created_enters_empty_room() {
        let mut s = Session::new("Mira", Config::default());
        s.apply(Action::CreateRoom, 0).unwrap();
        s.on_server_event(ServerEvent::RoomCreated { room_id: "ab12cd34".into(), player_name: "Mira".into() }, 5);
        let room = s.room().unwrap();
        assert_eq!(room.id(), "ab12cd34");
        assert_eq!(room.bag(), Bag::default());
        assert_eq!(room.board().players(), &["Mira".to_string()]);
    }

    #[test]
    fn test_requests_carry_room_and_player() {
        let mut s = joined(Bag::new(3, 3));
        let out = s.apply(Action::ConfigureBag { success: 4, complication: 2 }, 0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "configure_bag");
        assert_eq!(out[0].payload, json!({"successi": 4, "complicazioni": 2, "room_id": "ab12cd34", "player_name": "Mira"}));
    }

    #[test]
    fn test_notices_expire_after_ttl() {
        let mut s = joined(Bag::new(3, 3));
        // the join notice from t=0 is gone by t=5000
        s.on_server_event(ServerEvent::BagConfigured(Bag::new(4, 2)), 5000);
        assert_eq!(s.notices().len(), 1);
        s.tick(7999);
        assert_eq!(s.notices().len(), 1);
        s.tick(8000);
        assert!(s.notices().is_empty());
        assert!(s.drain_events().iter().any(|e| matches!(e, SessionEvent::NoticeExpired(_))));
    }

    #[test]
    fn test_status_broadcasts_update_board() {
        let mut s = joined(Bag::new(3, 3));
        s.on_server_event(ServerEvent::AdrenalineUpdated { player: "Tom".into(), value: 2 }, 0);
        assert_eq!(s.room().unwrap().board().status("Tom").adrenaline, 2);
    }

    #[test]
    fn test_leave_room_tears_down() {
        let mut s = joined(Bag::new(3, 3));
        s.apply(Action::Draw(1), 0).unwrap();
        s.apply(Action::LeaveRoom, 10).unwrap();
        assert!(s.room().is_none());
        assert_eq!(s.flow().phase(), DrawPhase::Idle);
        // the draw timeout was cancelled with the room
        s.drain_events();
        s.tick(10_000);
        assert!(!s
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::Advisory)));
    }
}
