use crate::clock::Millis;
use crate::reveal::RevealTiming;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub player_name: Option<String>,
    pub room_id: Option<String>,
    pub draw_timeout_ms: Millis,
    pub reveal_delay_ms: Millis,
    pub reveal_interval_ms: Millis,
    pub reveal_settle_ms: Millis,
    pub notice_ttl_ms: Millis,
    pub history_cap: usize,
    pub journal_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            player_name: None,
            room_id: None,
            draw_timeout_ms: 5000,
            reveal_delay_ms: 2000,
            reveal_interval_ms: 300,
            reveal_settle_ms: 500,
            notice_ttl_ms: 3000,
            history_cap: 50,
            journal_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            server_url: std::env::var("SERVER_URL").unwrap_or(d.server_url),
            player_name: std::env::var("PLAYER_NAME").ok().filter(|v| !v.trim().is_empty()),
            room_id: std::env::var("ROOM_ID").ok().filter(|v| !v.trim().is_empty()),
            draw_timeout_ms: std::env::var("DRAW_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.draw_timeout_ms),
            reveal_delay_ms: std::env::var("REVEAL_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.reveal_delay_ms),
            reveal_interval_ms: std::env::var("REVEAL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.reveal_interval_ms),
            reveal_settle_ms: std::env::var("REVEAL_SETTLE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.reveal_settle_ms),
            notice_ttl_ms: std::env::var("NOTICE_TTL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.notice_ttl_ms),
            history_cap: std::env::var("HISTORY_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.history_cap),
            journal_path: std::env::var("JOURNAL_PATH").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn reveal_timing(&self) -> RevealTiming {
        RevealTiming {
            initial_delay_ms: self.reveal_delay_ms,
            interval_ms: self.reveal_interval_ms,
            settle_ms: self.reveal_settle_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        let cfg = Config::default();
        assert_eq!(cfg.draw_timeout_ms, 5000);
        let t = cfg.reveal_timing();
        assert_eq!(t.initial_delay_ms, 2000);
        assert_eq!(t.interval_ms, 300);
        assert_eq!(t.settle_ms, 500);
        assert_eq!(cfg.notice_ttl_ms, 3000);
    }
}
