//! Draw flow state machine.
//!
//! Gates local draws, owns the one-shot adrenaline and confusion flags and the
//! risk-all follow-up, and decides what the player sees while a confusion draw
//! is being revealed. Timers and the network live in the session; this type
//! only answers "is that allowed" and "what now".

use crate::bag::Bag;
use crate::error::ClientError;
use crate::logging::log_transition;
use crate::protocol::{DrawOutcome, RiskAllOutcome, TokenKind};

pub const MAX_DRAW: u32 = 5;
pub const ADRENALINE_DRAW: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPhase {
    Idle,
    AwaitingDrawResult,
    RevealingConfusion,
    AwaitingRiskAllResult,
}

impl DrawPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawPhase::Idle => "idle",
            DrawPhase::AwaitingDrawResult => "awaiting_draw",
            DrawPhase::RevealingConfusion => "revealing",
            DrawPhase::AwaitingRiskAllResult => "awaiting_risk_all",
        }
    }
}

/// What goes into `draw_tokens`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTicket {
    pub cycle: u64,
    pub num_tokens: u32,
    pub adrenaline: bool,
    pub confusion: bool,
}

/// What goes into `risk_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAllOffer {
    pub num_tokens: u32,
    pub previous_success: u32,
    pub previous_complication: u32,
}

/// The draw currently on screen. `None` tokens are still face down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedDraw {
    pub tokens: Vec<Option<TokenKind>>,
    pub counts: Option<(u32, u32)>,
    pub adrenaline: bool,
    pub confusion: bool,
    pub risk_all: bool,
}

impl DisplayedDraw {
    fn revealed(outcome: &DrawOutcome) -> Self {
        Self {
            tokens: outcome.drawn.iter().copied().map(Some).collect(),
            counts: Some((outcome.success, outcome.complication)),
            adrenaline: outcome.adrenaline,
            confusion: outcome.confusion,
            risk_all: false,
        }
    }

    fn face_down(outcome: &DrawOutcome) -> Self {
        Self {
            tokens: vec![None; outcome.drawn.len()],
            counts: None,
            adrenaline: outcome.adrenaline,
            confusion: true,
            risk_all: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawResolution {
    /// Finalized; apply the outcome's bag and history entry
    Finalized(DrawOutcome),
    /// Confusion: apply bag and history now, reveal `outcome.drawn` and show
    /// the counts on completion
    Reveal { cycle: u64, outcome: DrawOutcome },
    /// Not a result this client is waiting for; treat as a broadcast
    Unsolicited(DrawOutcome),
}

#[derive(Debug)]
pub struct DrawFlow {
    phase: DrawPhase,
    adrenaline: bool,
    confusion: bool,
    cycle: u64,
    timed_out: bool,
    staged: Option<DrawOutcome>,
    risk_all: Option<RiskAllOffer>,
    displayed: Option<DisplayedDraw>,
    /// Another request went out while a result was awaited, so a server
    /// error cannot be pinned on the draw.
    interleaved: bool,
    /// Wait released by a server error; its result is still accepted.
    released: Option<DrawPhase>,
}

impl Default for DrawFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawFlow {
    pub fn new() -> Self {
        Self {
            phase: DrawPhase::Idle,
            adrenaline: false,
            confusion: false,
            cycle: 0,
            timed_out: false,
            staged: None,
            risk_all: None,
            displayed: None,
            interleaved: false,
            released: None,
        }
    }

    pub fn phase(&self) -> DrawPhase {
        self.phase
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn adrenaline(&self) -> bool {
        self.adrenaline
    }

    pub fn confusion(&self) -> bool {
        self.confusion
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn risk_all_offer(&self) -> Option<RiskAllOffer> {
        self.risk_all
    }

    pub fn displayed(&self) -> Option<&DisplayedDraw> {
        self.displayed.as_ref()
    }

    pub fn set_adrenaline(&mut self, on: bool) {
        self.adrenaline = on;
    }

    pub fn set_confusion(&mut self, on: bool) {
        self.confusion = on;
    }

    pub fn effective_size(&self, requested: u32) -> u32 {
        if self.adrenaline {
            ADRENALINE_DRAW
        } else {
            requested
        }
    }

    /// Validate and issue a draw. On success the flags are consumed, risk-all
    /// is hidden and the machine waits for the result of the returned cycle.
    pub fn begin_draw(&mut self, requested: u32, bag: Bag) -> Result<DrawTicket, ClientError> {
        if self.phase != DrawPhase::Idle {
            return Err(ClientError::DrawInProgress);
        }
        if !self.adrenaline && !(1..=MAX_DRAW).contains(&requested) {
            return Err(ClientError::InvalidDrawSize(requested));
        }
        let num_tokens = self.effective_size(requested);
        if bag.total() < num_tokens {
            return Err(ClientError::InsufficientTokens { requested: num_tokens, available: bag.total() });
        }

        self.cycle += 1;
        let ticket = DrawTicket {
            cycle: self.cycle,
            num_tokens,
            adrenaline: self.adrenaline,
            confusion: self.confusion,
        };
        self.adrenaline = false;
        self.confusion = false;
        self.risk_all = None;
        self.timed_out = false;
        self.interleaved = false;
        self.released = None;
        self.transition(DrawPhase::AwaitingDrawResult, "draw");
        Ok(ticket)
    }

    /// The draw timeout fired. True when it belongs to the draw still being
    /// awaited, i.e. the advisory should be shown. Nothing is rolled back.
    pub fn on_timeout(&mut self, cycle: u64) -> bool {
        if self.phase != DrawPhase::AwaitingDrawResult || cycle != self.cycle {
            return false;
        }
        self.timed_out = true;
        true
    }

    /// A request other than the awaited draw or risk-all was sent.
    pub fn note_request(&mut self) {
        if self.awaiting() {
            self.interleaved = true;
        }
    }

    fn awaiting(&self) -> bool {
        matches!(self.phase, DrawPhase::AwaitingDrawResult | DrawPhase::AwaitingRiskAllResult)
    }

    /// Whether a result of this kind belongs to the local cycle: either it is
    /// awaited, or the wait was released by an error and nothing began since.
    fn expects(&mut self, kind: DrawPhase) -> bool {
        if self.phase == kind {
            return true;
        }
        if self.phase == DrawPhase::Idle && self.released == Some(kind) {
            self.released = None;
            return true;
        }
        false
    }

    /// Accepted while the draw is awaited or after an error released it.
    /// A confusion result returns the outcome for bag and history at once;
    /// only the displayed tokens stay face down until the reveal ends.
    pub fn on_draw_result(&mut self, outcome: DrawOutcome) -> DrawResolution {
        if !self.expects(DrawPhase::AwaitingDrawResult) {
            return DrawResolution::Unsolicited(outcome);
        }
        if outcome.confusion {
            self.displayed = Some(DisplayedDraw::face_down(&outcome));
            self.staged = Some(outcome.clone());
            self.transition(DrawPhase::RevealingConfusion, "confusion_result");
            return DrawResolution::Reveal { cycle: self.cycle, outcome };
        }
        self.finalize(&outcome, "result");
        DrawResolution::Finalized(outcome)
    }

    /// Turn one face-down token over. Ignored outside a reveal.
    pub fn reveal_token(&mut self, index: usize, kind: TokenKind) {
        if self.phase != DrawPhase::RevealingConfusion {
            return;
        }
        if let Some(slot) = self.displayed.as_mut().and_then(|d| d.tokens.get_mut(index)) {
            *slot = Some(kind);
        }
    }

    /// End the reveal, either because it completed or because it was skipped.
    /// Returns the staged outcome so the caller can conclude the display.
    pub fn finish_reveal(&mut self, cause: &str) -> Option<DrawOutcome> {
        if self.phase != DrawPhase::RevealingConfusion {
            return None;
        }
        let outcome = self.staged.take()?;
        self.finalize(&outcome, cause);
        Some(outcome)
    }

    pub fn begin_risk_all(&mut self, bag: Bag) -> Result<RiskAllOffer, ClientError> {
        if self.phase != DrawPhase::Idle {
            return Err(ClientError::DrawInProgress);
        }
        let offer = self.risk_all.ok_or(ClientError::RiskAllUnavailable)?;
        if bag.total() < offer.num_tokens {
            return Err(ClientError::InsufficientTokens { requested: offer.num_tokens, available: bag.total() });
        }
        self.risk_all = None;
        self.cycle += 1;
        self.interleaved = false;
        self.released = None;
        self.transition(DrawPhase::AwaitingRiskAllResult, "risk_all");
        Ok(offer)
    }

    /// False when no risk-all was outstanding; the caller treats it as a
    /// broadcast.
    pub fn on_risk_all_result(&mut self, outcome: &RiskAllOutcome) -> bool {
        if !self.expects(DrawPhase::AwaitingRiskAllResult) {
            return false;
        }
        let display = self.displayed.get_or_insert_with(|| DisplayedDraw {
            tokens: Vec::new(),
            counts: None,
            adrenaline: false,
            confusion: false,
            risk_all: false,
        });
        display.tokens.extend(outcome.drawn.iter().copied().map(Some));
        display.counts = Some((outcome.total_success, outcome.total_complication));
        display.risk_all = true;
        self.transition(DrawPhase::Idle, "risk_all_result");
        true
    }

    /// The server refused a request. The wait is released only when the draw
    /// or risk-all was the sole request in flight; a late result for it is
    /// still taken. A running reveal is not affected. Returns whether the
    /// wait was released.
    pub fn on_server_error(&mut self) -> bool {
        if !self.awaiting() || self.interleaved {
            return false;
        }
        self.released = Some(self.phase);
        self.timed_out = false;
        self.transition(DrawPhase::Idle, "server_error");
        true
    }

    /// Bag reset hides the last draw and its follow-up. A running reveal
    /// keeps going.
    pub fn clear_display(&mut self) {
        if self.phase == DrawPhase::Idle {
            self.displayed = None;
            self.risk_all = None;
        }
    }

    /// Room teardown. Cycle numbering continues so stale timers stay stale.
    pub fn reset(&mut self) {
        let cycle = self.cycle;
        *self = Self::new();
        self.cycle = cycle;
    }

    fn finalize(&mut self, outcome: &DrawOutcome, cause: &str) {
        self.displayed = Some(DisplayedDraw::revealed(outcome));
        let size = outcome.drawn.len() as u32;
        self.risk_all = (size < MAX_DRAW).then(|| RiskAllOffer {
            num_tokens: MAX_DRAW - size,
            previous_success: outcome.success,
            previous_complication: outcome.complication,
        });
        self.timed_out = false;
        self.transition(DrawPhase::Idle, cause);
    }

    fn transition(&mut self, to: DrawPhase, cause: &str) {
        log_transition(self.cycle, self.phase.as_str(), to.as_str(), cause);
        self.phase = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HistoryEntry;
    use crate::protocol::TokenKind::{Complication as C, Success as S};

    fn outcome(drawn: Vec<TokenKind>, confusion: bool) -> DrawOutcome {
        let (success, complication) = crate::protocol::tally(&drawn);
        DrawOutcome {
            player: "Mira".into(),
            drawn: drawn.clone(),
            success,
            complication,
            bag_remaining: Bag::new(3, 2),
            history: HistoryEntry {
                player: "Mira".into(),
                drawn,
                success,
                complication,
                timestamp: "2024-05-01T20:15:03".into(),
                adrenaline: false,
                confusion,
                risk_all: false,
                total_success: None,
                total_complication: None,
            },
            adrenaline: false,
            confusion,
        }
    }

    #[test]
    fn test_insufficient_tokens_rejected() {
        let mut flow = DrawFlow::new();
        let err = flow.begin_draw(4, Bag::new(2, 1)).unwrap_err();
        assert_eq!(err, ClientError::InsufficientTokens { requested: 4, available: 3 });
        assert_eq!(flow.phase(), DrawPhase::Idle);
        assert_eq!(flow.cycle(), 0);
    }

    #[test]
    fn test_draw_size_bounds() {
        let mut flow = DrawFlow::new();
        assert_eq!(flow.begin_draw(0, Bag::new(9, 9)), Err(ClientError::InvalidDrawSize(0)));
        assert_eq!(flow.begin_draw(6, Bag::new(9, 9)), Err(ClientError::InvalidDrawSize(6)));
    }

    #[test]
    fn test_adrenaline_forces_four_and_resets_flags() {
        let mut flow = DrawFlow::new();
        flow.set_adrenaline(true);
        flow.set_confusion(true);
        let t = flow.begin_draw(1, Bag::new(5, 0)).unwrap();
        assert_eq!(t.num_tokens, 4);
        assert!(t.adrenaline && t.confusion);
        assert!(!flow.adrenaline());
        assert!(!flow.confusion());
        assert_eq!(flow.phase(), DrawPhase::AwaitingDrawResult);
    }

    #[test]
    fn test_adrenaline_checks_effective_size_against_bag() {
        let mut flow = DrawFlow::new();
        flow.set_adrenaline(true);
        let err = flow.begin_draw(2, Bag::new(2, 1)).unwrap_err();
        assert_eq!(err, ClientError::InsufficientTokens { requested: 4, available: 3 });
        assert!(flow.adrenaline());
    }

    #[test]
    fn test_second_draw_rejected_while_waiting() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(2, Bag::new(5, 5)).unwrap();
        assert_eq!(flow.begin_draw(2, Bag::new(5, 5)), Err(ClientError::DrawInProgress));
    }

    #[test]
    fn test_plain_result_finalizes_and_offers_risk_all() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(3, Bag::new(5, 5)).unwrap();
        let res = flow.on_draw_result(outcome(vec![S, C, S], false));
        assert!(matches!(res, DrawResolution::Finalized(_)));
        assert_eq!(flow.phase(), DrawPhase::Idle);
        assert_eq!(
            flow.risk_all_offer(),
            Some(RiskAllOffer { num_tokens: 2, previous_success: 2, previous_complication: 1 })
        );
    }

    #[test]
    fn test_full_draw_has_no_risk_all() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(5, Bag::new(5, 5)).unwrap();
        flow.on_draw_result(outcome(vec![S, S, S, C, C], false));
        assert_eq!(flow.risk_all_offer(), None);
        assert_eq!(flow.begin_risk_all(Bag::new(5, 0)), Err(ClientError::RiskAllUnavailable));
    }

    #[test]
    fn test_confusion_result_stays_face_down_until_finished() {
        let mut flow = DrawFlow::new();
        flow.set_confusion(true);
        flow.begin_draw(3, Bag::new(5, 5)).unwrap();
        let res = flow.on_draw_result(outcome(vec![S, C, S], true));
        match res {
            DrawResolution::Reveal { cycle, outcome } => {
                assert_eq!(cycle, 1);
                assert_eq!(outcome.drawn, vec![S, C, S]);
                assert_eq!(outcome.bag_remaining, Bag::new(3, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(flow.displayed().unwrap().tokens, vec![None, None, None]);
        assert_eq!(flow.risk_all_offer(), None);

        flow.reveal_token(0, S);
        assert_eq!(flow.displayed().unwrap().tokens[0], Some(S));
        assert!(flow.displayed().unwrap().counts.is_none());

        let done = flow.finish_reveal("reveal_complete").unwrap();
        assert_eq!(done.drawn, vec![S, C, S]);
        assert_eq!(flow.displayed().unwrap().counts, Some((2, 1)));
        assert_eq!(flow.phase(), DrawPhase::Idle);
        assert!(flow.risk_all_offer().is_some());
        assert!(flow.finish_reveal("again").is_none());
    }

    #[test]
    fn test_risk_all_appends_and_shows_totals() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(3, Bag::new(5, 5)).unwrap();
        flow.on_draw_result(outcome(vec![S, C, S], false));
        let offer = flow.begin_risk_all(Bag::new(3, 2)).unwrap();
        assert_eq!(offer.num_tokens, 2);
        assert_eq!(flow.risk_all_offer(), None);

        let ra = RiskAllOutcome {
            player: "Mira".into(),
            drawn: vec![C, S],
            success: 1,
            complication: 1,
            total_success: 3,
            total_complication: 2,
            bag_remaining: Bag::new(2, 1),
            history: outcome(vec![C, S], false).history,
        };
        assert!(flow.on_risk_all_result(&ra));
        let shown = flow.displayed().unwrap();
        assert_eq!(shown.tokens.len(), 5);
        assert_eq!(shown.tokens[3..], [Some(C), Some(S)]);
        assert_eq!(shown.counts, Some((3, 2)));
        assert!(shown.risk_all);
        assert_eq!(flow.phase(), DrawPhase::Idle);
    }

    #[test]
    fn test_timeout_only_flags_current_cycle() {
        let mut flow = DrawFlow::new();
        let t = flow.begin_draw(1, Bag::new(1, 0)).unwrap();
        assert!(!flow.on_timeout(t.cycle + 1));
        assert!(flow.on_timeout(t.cycle));
        assert_eq!(flow.phase(), DrawPhase::AwaitingDrawResult);
        // late result is still accepted
        assert!(matches!(flow.on_draw_result(outcome(vec![S], false)), DrawResolution::Finalized(_)));
        assert!(!flow.on_timeout(t.cycle));
    }

    #[test]
    fn test_server_error_releases_waiting_draw() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(1, Bag::new(1, 0)).unwrap();
        assert!(flow.on_server_error());
        assert_eq!(flow.phase(), DrawPhase::Idle);
        assert!(!flow.on_server_error());
    }

    #[test]
    fn test_server_error_keeps_draw_when_other_request_sent() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(3, Bag::new(5, 5)).unwrap();
        flow.note_request();
        assert!(!flow.on_server_error());
        assert_eq!(flow.phase(), DrawPhase::AwaitingDrawResult);
        assert!(matches!(flow.on_draw_result(outcome(vec![S, C, S], false)), DrawResolution::Finalized(_)));
        assert!(flow.risk_all_offer().is_some());
    }

    #[test]
    fn test_result_after_released_wait_is_still_local() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(3, Bag::new(5, 5)).unwrap();
        assert!(flow.on_server_error());
        let res = flow.on_draw_result(outcome(vec![S, C, S], false));
        assert!(matches!(res, DrawResolution::Finalized(_)));
        assert_eq!(flow.risk_all_offer().map(|o| o.num_tokens), Some(2));
        // taken once only
        assert!(matches!(flow.on_draw_result(outcome(vec![S], false)), DrawResolution::Unsolicited(_)));
    }

    #[test]
    fn test_new_draw_drops_released_wait() {
        let mut flow = DrawFlow::new();
        flow.begin_draw(1, Bag::new(5, 5)).unwrap();
        assert!(flow.on_server_error());
        flow.begin_draw(2, Bag::new(5, 5)).unwrap();
        assert_eq!(flow.cycle(), 2);
        flow.on_draw_result(outcome(vec![S, C], false));
        assert_eq!(flow.phase(), DrawPhase::Idle);
        assert!(matches!(flow.on_draw_result(outcome(vec![S], false)), DrawResolution::Unsolicited(_)));
    }

    #[test]
    fn test_note_request_ignored_while_idle() {
        let mut flow = DrawFlow::new();
        flow.note_request();
        flow.begin_draw(1, Bag::new(1, 0)).unwrap();
        assert!(flow.on_server_error());
    }

    #[test]
    fn test_result_while_idle_is_unsolicited() {
        let mut flow = DrawFlow::new();
        let res = flow.on_draw_result(outcome(vec![S], false));
        assert!(matches!(res, DrawResolution::Unsolicited(_)));
        assert_eq!(flow.risk_all_offer(), None);
    }
}
