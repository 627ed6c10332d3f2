//! Local draw journal: every history entry the client sees, appended to a
//! SQLite file for later review.

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::logging::ts_now;
use crate::protocol::{HistoryEntry, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRow {
    pub id: i64,
    pub recorded_at: String,
    pub room_id: String,
    pub entry: HistoryEntry,
}

pub struct Journal {
    conn: Connection,
}

impl Journal {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS draws (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                room_id TEXT NOT NULL,
                player TEXT NOT NULL,
                drawn TEXT NOT NULL,
                successi INTEGER NOT NULL,
                complicazioni INTEGER NOT NULL,
                adrenaline INTEGER NOT NULL,
                confusion INTEGER NOT NULL,
                risk_all INTEGER NOT NULL,
                total_successi INTEGER,
                total_complicazioni INTEGER,
                server_ts TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS draws_room ON draws (room_id, id);
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn record(&mut self, room_id: &str, entry: &HistoryEntry) -> Result<()> {
        let drawn = serde_json::to_string(&entry.drawn)?;
        self.conn.execute(
            "INSERT INTO draws (recorded_at, room_id, player, drawn, successi, complicazioni,
                                adrenaline, confusion, risk_all, total_successi, total_complicazioni, server_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                ts_now(),
                room_id,
                entry.player,
                drawn,
                entry.success as i64,
                entry.complication as i64,
                entry.adrenaline,
                entry.confusion,
                entry.risk_all,
                entry.total_success.map(i64::from),
                entry.total_complication.map(i64::from),
                entry.timestamp
            ],
        )?;
        Ok(())
    }

    /// Newest first. `room_id` of None means every room.
    pub fn recent(&self, room_id: Option<&str>, limit: usize) -> Result<Vec<JournalRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, room_id, player, drawn, successi, complicazioni,
                    adrenaline, confusion, risk_all, total_successi, total_complicazioni, server_ts
             FROM draws
             WHERE (?1 IS NULL OR room_id = ?1)
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![room_id, limit as i64], |row| {
            let drawn: String = row.get(4)?;
            let total_success: Option<i64> = row.get(10)?;
            let total_complication: Option<i64> = row.get(11)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                drawn,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, bool>(8)?,
                row.get::<_, bool>(9)?,
                (total_success, total_complication),
                row.get::<_, String>(12)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, recorded_at, room_id, player, drawn, s, c, adrenaline, confusion, risk_all, totals, server_ts) =
                row?;
            let drawn: Vec<TokenKind> = serde_json::from_str(&drawn)?;
            out.push(JournalRow {
                id,
                recorded_at,
                room_id,
                entry: HistoryEntry {
                    player,
                    drawn,
                    success: s as u32,
                    complication: c as u32,
                    timestamp: server_ts,
                    adrenaline,
                    confusion,
                    risk_all,
                    total_success: totals.0.map(|v| v as u32),
                    total_complication: totals.1.map(|v| v as u32),
                },
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player: &str, drawn: Vec<TokenKind>) -> HistoryEntry {
        let (success, complication) = crate::protocol::tally(&drawn);
        HistoryEntry {
            player: player.into(),
            drawn,
            success,
            complication,
            timestamp: "2024-05-01T20:15:03.123456".into(),
            adrenaline: false,
            confusion: true,
            risk_all: false,
            total_success: None,
            total_complication: None,
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.sqlite");
        let mut j = Journal::new(path.to_str().unwrap()).unwrap();
        j.init().unwrap();
        j.record("room-a", &entry("Mira", vec![TokenKind::Success, TokenKind::Complication])).unwrap();
        let mut ra = entry("Tom", vec![TokenKind::Success]);
        ra.risk_all = true;
        ra.total_success = Some(3);
        ra.total_complication = Some(2);
        j.record("room-b", &ra).unwrap();

        let all = j.recent(None, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].room_id, "room-b");
        assert_eq!(all[0].entry, ra);

        let only_a = j.recent(Some("room-a"), 10).unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].entry.drawn, vec![TokenKind::Success, TokenKind::Complication]);
        assert!(only_a[0].entry.confusion);
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.sqlite");
        let mut j = Journal::new(path.to_str().unwrap()).unwrap();
        j.init().unwrap();
        j.init().unwrap();
        assert!(j.recent(None, 5).unwrap().is_empty());
    }
}
