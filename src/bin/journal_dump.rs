//! Print the local draw journal.
//!
//! Usage:
//!   journal_dump <journal.sqlite> [--room=<id>] [--limit=<n>] [--json]

use anyhow::{anyhow, Result};
use tokenbag::journal::Journal;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("usage: journal_dump <journal.sqlite> [--room=<id>] [--limit=<n>] [--json]"))?;
    let room = args.iter().find_map(|a| a.strip_prefix("--room="));
    let limit = args
        .iter()
        .find_map(|a| a.strip_prefix("--limit="))
        .and_then(|v| v.parse().ok())
        .unwrap_or(50);
    let as_json = args.iter().any(|a| a == "--json");

    let journal = Journal::new(path)?;
    let rows = journal.recent(room, limit)?;
    for row in &rows {
        if as_json {
            let mut v = serde_json::to_value(&row.entry)?;
            if let Some(map) = v.as_object_mut() {
                map.insert("room_id".to_string(), serde_json::json!(row.room_id));
                map.insert("recorded_at".to_string(), serde_json::json!(row.recorded_at));
            }
            println!("{}", v);
        } else {
            let e = &row.entry;
            let tokens: String = e.drawn.iter().map(|t| t.glyph()).collect();
            println!(
                "{:>5} {} {:<8} {:<12} {:<6} {}/{}{}",
                row.id,
                row.recorded_at,
                row.room_id,
                e.player,
                tokens,
                e.success,
                e.complication,
                if e.risk_all { " risk-all" } else { "" }
            );
        }
    }
    if !as_json {
        println!("{} draws", rows.len());
    }
    Ok(())
}
