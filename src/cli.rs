//! Line commands for the terminal front end, and how session events are
//! printed.

use std::fmt;

use crate::character::SheetField;
use crate::draw::DisplayedDraw;
use crate::session::{Action, NoticeKind, Session, SessionEvent};
use crate::traits::{RegistryChange, RegistryNotice, TraitKind};

pub const HELP: &str = "\
room:       name <name> | create | join <room> | leave
traits:     add quality|ability | rm <id> | rename <id> <name> | sel <id> | emp <id> | mod <n>
sheet:      archetype <name> | sheet name|motivation|resources|notes <text>
            misfortune <text> | lesson <text> | photo <file> | save | load | sheets
bag:        bag <successi> <complicazioni> | bagtraits <complicazioni> | aid | reset
            return <successi> <complicazioni>
draw:       adrenaline on|off | confusion on|off | draw <1-5> | risk | skip | clear
status:     status adrenaline|confusion <n> | weather <season> <zone>
show:       show | traits | history
            help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Act(Action),
    /// Read a photo from disk, then act
    Photo(String),
    Show(View),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    State,
    Traits,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (type 'help')", self.0)
    }
}

impl std::error::Error for ParseError {}

fn err(msg: impl Into<String>) -> ParseError {
    ParseError(msg.into())
}

fn int(arg: Option<&str>, what: &str) -> Result<i64, ParseError> {
    arg.ok_or_else(|| err(format!("missing {}", what)))?
        .parse()
        .map_err(|_| err(format!("{} must be a number", what)))
}

fn switch(arg: Option<&str>) -> Result<bool, ParseError> {
    match arg {
        Some("on") | Some("yes") | Some("1") => Ok(true),
        Some("off") | Some("no") | Some("0") => Ok(false),
        _ => Err(err("expected on or off")),
    }
}

fn word(arg: Option<&str>, what: &str) -> Result<String, ParseError> {
    arg.map(str::to_string).ok_or_else(|| err(format!("missing {}", what)))
}

/// Everything after the first `n` words, original spacing inside kept
fn tail(line: &str, n: usize) -> String {
    let mut rest = line.trim_start();
    for _ in 0..n {
        rest = rest.trim_start();
        rest = rest.find(char::is_whitespace).map(|i| &rest[i..]).unwrap_or("");
    }
    rest.trim().to_string()
}

/// `Ok(None)` for a blank line
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let a1 = words.next();
    let a2 = words.next();

    let command = match cmd.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "show" => Command::Show(View::State),
        "traits" => Command::Show(View::Traits),
        "history" => Command::Show(View::History),

        "name" => Command::Act(Action::SetName(tail(line, 1))),
        "create" => Command::Act(Action::CreateRoom),
        "join" => Command::Act(Action::JoinRoom(word(a1, "room id")?)),
        "leave" => Command::Act(Action::LeaveRoom),

        "add" => {
            let kind = match a1 {
                Some("quality") | Some("q") => TraitKind::Quality,
                Some("ability") | Some("a") => TraitKind::Ability,
                _ => return Err(err("add quality or add ability")),
            };
            Command::Act(Action::AddTrait(kind))
        }
        "rm" | "remove" => Command::Act(Action::RemoveTrait(word(a1, "trait id")?)),
        "rename" => Command::Act(Action::RenameTrait { id: word(a1, "trait id")?, name: tail(line, 2) }),
        "sel" | "select" => Command::Act(Action::ToggleSelected(word(a1, "trait id")?)),
        "emp" | "empower" => Command::Act(Action::ToggleEmpowered(word(a1, "trait id")?)),
        "mod" | "modifier" => Command::Act(Action::SetModifier(int(a1, "modifier")?)),
        "archetype" => Command::Act(Action::SetArchetype(tail(line, 1))),
        "sheet" => {
            let field = match a1 {
                Some("name") => SheetField::Name,
                Some("motivation") => SheetField::Motivation,
                Some("resources") => SheetField::Resources,
                Some("notes") => SheetField::Notes,
                _ => return Err(err("sheet name|motivation|resources|notes <text>")),
            };
            Command::Act(Action::EditSheet { field, value: tail(line, 2) })
        }
        "misfortune" => Command::Act(Action::AddMisfortune(tail(line, 1))),
        "lesson" => Command::Act(Action::AddLesson(tail(line, 1))),
        "photo" => Command::Photo(word(a1, "file")?),
        "save" => Command::Act(Action::SaveCharacter),
        "load" => Command::Act(Action::LoadMyCharacter),
        "sheets" => Command::Act(Action::GetCharacters),

        "bag" => Command::Act(Action::ConfigureBag {
            success: int(a1, "successi")?,
            complication: int(a2, "complicazioni")?,
        }),
        "bagtraits" => Command::Act(Action::ConfigureFromTraits { complication: int(a1, "complicazioni")? }),
        "aid" => Command::Act(Action::AddHelp),
        "reset" => Command::Act(Action::ResetBag),
        "return" => Command::Act(Action::ReturnTokens {
            success: int(a1, "successi")?,
            complication: int(a2, "complicazioni")?,
        }),

        "adrenaline" => Command::Act(Action::SetAdrenaline(switch(a1)?)),
        "confusion" => Command::Act(Action::SetConfusion(switch(a1)?)),
        "draw" => {
            let n = int(a1, "token count")?;
            let n = u32::try_from(n).map_err(|_| err("token count must be 1 to 5"))?;
            Command::Act(Action::Draw(n))
        }
        "risk" => Command::Act(Action::RiskAll),
        "skip" => Command::Act(Action::SkipReveal),
        "clear" => Command::Act(Action::ClearHistory),

        "status" => {
            let value = int(a2, "value")?;
            match a1 {
                Some("adrenaline") => Command::Act(Action::UpdateAdrenaline(value)),
                Some("confusion") => Command::Act(Action::UpdateConfusion(value)),
                _ => return Err(err("status adrenaline|confusion <n>")),
            }
        }
        "weather" => {
            let season = word(a1, "season")?.parse().map_err(|e: crate::error::ClientError| err(e.to_string()))?;
            let zone = word(a2, "zone")?.parse().map_err(|e: crate::error::ClientError| err(e.to_string()))?;
            Command::Act(Action::GenerateWeather { season, zone })
        }

        other => return Err(err(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

pub fn render_draw(d: &DisplayedDraw) -> String {
    let mut line = d
        .tokens
        .iter()
        .map(|t| t.map(|k| k.glyph()).unwrap_or('?').to_string())
        .collect::<Vec<_>>()
        .join(" ");
    if let Some((s, c)) = d.counts {
        line.push_str(&format!("  = {} successi, {} complicazioni", s, c));
    }
    let mut tags = Vec::new();
    if d.adrenaline {
        tags.push("adrenaline");
    }
    if d.confusion {
        tags.push("confusion");
    }
    if d.risk_all {
        tags.push("risk all");
    }
    if !tags.is_empty() {
        line.push_str(&format!("  [{}]", tags.join(", ")));
    }
    line
}

/// One printable line per event; None for events the terminal does not show
pub fn render_event(ev: &SessionEvent) -> Option<String> {
    let line = match ev {
        SessionEvent::Notice(n) => {
            let tag = match n.kind {
                NoticeKind::Info => "info",
                NoticeKind::Success => "ok",
                NoticeKind::Error => "error",
                NoticeKind::Advisory => "wait",
            };
            format!("[{}] {}", tag, n.text)
        }
        SessionEvent::NoticeExpired(_) => return None,
        SessionEvent::RoomEntered { room_id } => format!("room {}", room_id),
        SessionEvent::RoomLeft => "left room".to_string(),
        SessionEvent::PlayersChanged(players) => format!("players: {}", players.join(", ")),
        SessionEvent::BagChanged(bag) => {
            format!("bag: {} successi, {} complicazioni", bag.success, bag.complication)
        }
        SessionEvent::RevealStarted { tokens } => format!("confusion! revealing {} tokens...", tokens),
        SessionEvent::TokenRevealed { index, kind } => format!("  token {}: {}", index + 1, kind.glyph()),
        SessionEvent::DrawShown(d) => format!("draw: {}", render_draw(d)),
        SessionEvent::RiskAllOffered(offer) => {
            format!("risk all available: 'risk' draws {} more", offer.num_tokens)
        }
        SessionEvent::HistoryAdded(e) => format!(
            "{} {}: {}/{}",
            e.time_label(),
            e.player,
            e.total_success.unwrap_or(e.success),
            e.total_complication.unwrap_or(e.complication)
        ),
        SessionEvent::StatusChanged { player, status } => format!(
            "{}: adrenaline {}, confusion {}",
            player, status.adrenaline, status.confusion
        ),
        SessionEvent::WeatherReported(w) => format!("weather ({} / {}): {}", w.season, w.zone, w.weather),
        SessionEvent::CharacterLoaded => "character loaded".to_string(),
        SessionEvent::CharacterSaved { player } => format!("{} saved their character", player),
        SessionEvent::CharactersLoaded { count, is_master } => {
            format!("{} character sheets{}", count, if *is_master { " (master view)" } else { "" })
        }
    };
    Some(line)
}

pub fn render_tally(notice: &RegistryNotice) -> String {
    let t = &notice.tally;
    let what = match &notice.change {
        RegistryChange::Added(tr) => format!("added {} {}", tr.kind.as_str(), tr.id),
        RegistryChange::Removed(id) => format!("removed {}", id),
        RegistryChange::Renamed { id, name } => format!("{} is now '{}'", id, name),
        RegistryChange::Selected { id, on } => format!("{} {}", id, if *on { "selected" } else { "unselected" }),
        RegistryChange::Empowered { id, on } => format!("{} {}", id, if *on { "empowered" } else { "not empowered" }),
        RegistryChange::ModifierChanged(m) => format!("modifier {:+}", m),
        RegistryChange::ResetAfterRoll { cleared } => format!("cleared {} selections", cleared),
        RegistryChange::Replaced => "sheet loaded".to_string(),
    };
    format!("traits: {}  -> {} tokens ({} selected, {} empowered, {:+})", what, t.total, t.selected, t.empowered_used, t.modifier)
}

pub fn render_view(session: &Session, view: View) -> Vec<String> {
    let mut out = Vec::new();
    match view {
        View::State => {
            out.push(format!("player: {}", if session.player().is_empty() { "(unnamed)" } else { session.player() }));
            match session.room() {
                Some(room) => {
                    let bag = room.bag();
                    out.push(format!("room {}: {}", room.id(), room.board().players().join(", ")));
                    out.push(format!(
                        "bag: {} successi, {} complicazioni{}",
                        bag.success,
                        bag.complication,
                        if room.help_available() { "" } else { " (aid used)" }
                    ));
                    for p in room.board().players() {
                        let s = room.board().status(p);
                        out.push(format!("  {}: adrenaline {}, confusion {}", p, s.adrenaline, s.confusion));
                    }
                }
                None if session.is_joining() => out.push("joining...".to_string()),
                None => out.push("not in a room".to_string()),
            }
            let flow = session.flow();
            out.push(format!(
                "draw: {}  adrenaline {}  confusion {}",
                flow.phase().as_str(),
                if flow.adrenaline() { "on" } else { "off" },
                if flow.confusion() { "on" } else { "off" }
            ));
            if let Some(d) = flow.displayed() {
                out.push(format!("  {}", render_draw(d)));
            }
            if let Some(w) = session.weather() {
                out.push(format!("weather: {}", w.weather));
            }
        }
        View::Traits => {
            let reg = session.character().registry();
            for t in reg.traits() {
                let sel = if reg.selected().contains(&t.id) { "x" } else { " " };
                let emp = if reg.empowered().contains(&t.id) { "*" } else { " " };
                out.push(format!("[{}{}] {:<12} {:<10} {}", sel, emp, t.id, t.kind.as_str(), t.name));
            }
            let tally = reg.tally();
            out.push(format!("modifier {:+}, tokens {}", reg.modifier(), tally.total));
        }
        View::History => match session.room() {
            Some(room) if !room.history().is_empty() => {
                for e in room.history().iter() {
                    let tokens: String = e.drawn.iter().map(|t| t.glyph()).collect();
                    out.push(format!("{} {:<12} {} {}/{}", e.time_label(), e.player, tokens, e.success, e.complication));
                }
            }
            _ => out.push("no draws yet".to_string()),
        },
    }
    out
}
