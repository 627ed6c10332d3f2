use anyhow::{Context, Result};
use tokenbag::cli::{self, Command};
use tokenbag::clock::Millis;
use tokenbag::config::Config;
use tokenbag::journal::Journal;
use tokenbag::logging::{log, obj, v_num, v_str, Domain, Level};
use tokenbag::net::{self, ws, Inbound};
use tokenbag::session::{Action, Session, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Duration, Instant};

const IDLE_WAKE: Duration = Duration::from_secs(3600);

fn session_ms(start: Instant) -> Millis {
    start.elapsed().as_millis() as Millis
}

fn photo_mime(path: &str) -> &'static str {
    match path.rsplit('.').next().map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "start",
        obj(&[
            ("server_url", v_str(&cfg.server_url)),
            ("draw_timeout_ms", v_num(cfg.draw_timeout_ms as f64)),
        ]),
    );

    let mut journal = match &cfg.journal_path {
        Some(path) => {
            let mut j = Journal::new(path).with_context(|| format!("opening journal {}", path))?;
            j.init()?;
            Some(j)
        }
        None => None,
    };

    let (outbox, mut inbound) = ws::connect(&cfg.server_url)
        .await
        .with_context(|| format!("connecting to {}", cfg.server_url))?;

    let player = cfg.player_name.clone().unwrap_or_default();
    let auto_room = cfg.room_id.clone();
    let mut session = Session::new(&player, cfg);
    let mut trait_notices = session.character_mut().registry_mut().subscribe();

    let start = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", cli::HELP);

    loop {
        let wake = session
            .next_deadline()
            .map(|ms| start + Duration::from_millis(ms))
            .unwrap_or_else(|| Instant::now() + IDLE_WAKE);

        tokio::select! {
            msg = inbound.recv() => match msg {
                Some(Inbound::Connected { sid }) => {
                    log(Level::Info, Domain::Net, "connected", obj(&[("sid", v_str(sid.as_deref().unwrap_or("")))]));
                    if !session.player().is_empty() {
                        let action = match &auto_room {
                            Some(room) => Action::JoinRoom(room.clone()),
                            None => Action::CreateRoom,
                        };
                        if let Ok(out) = session.apply(action, session_ms(start)) {
                            net::send_all(&outbox, &out).await?;
                        }
                    }
                }
                Some(Inbound::Event(ev)) => session.on_server_event(ev, session_ms(start)),
                Some(Inbound::Closed { reason }) => {
                    eprintln!("connection lost: {}", reason);
                    break;
                }
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match cli::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => println!("{}", cli::HELP),
                    Ok(Some(Command::Show(view))) => {
                        for l in cli::render_view(&session, view) {
                            println!("{}", l);
                        }
                    }
                    Ok(Some(Command::Photo(path))) => match std::fs::read(&path) {
                        Ok(bytes) => {
                            let action = Action::SetPhoto { bytes, mime: photo_mime(&path).to_string() };
                            let _ = session.apply(action, session_ms(start));
                        }
                        Err(e) => eprintln!("cannot read {}: {}", path, e),
                    },
                    Ok(Some(Command::Act(action))) => {
                        if let Ok(out) = session.apply(action, session_ms(start)) {
                            net::send_all(&outbox, &out).await?;
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            },
            Some(notice) = trait_notices.recv() => println!("{}", cli::render_tally(&notice)),
            _ = sleep_until(wake) => session.tick(session_ms(start)),
        }

        for ev in session.drain_events() {
            if let (SessionEvent::HistoryAdded(entry), Some(j)) = (&ev, journal.as_mut()) {
                let room = session.room_id().unwrap_or_default();
                if let Err(e) = j.record(room, entry) {
                    log(Level::Warn, Domain::System, "journal_failed", obj(&[("msg", v_str(&e.to_string()))]));
                }
            }
            if let Some(line) = cli::render_event(&ev) {
                println!("{}", line);
            }
        }
    }

    log(Level::Info, Domain::System, "stop", obj(&[]));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_mime_from_extension() {
        assert_eq!(photo_mime("me.PNG"), "image/png");
        assert_eq!(photo_mime("portrait.jpg"), "image/jpeg");
        assert_eq!(photo_mime("noext"), "image/jpeg");
    }
}
