//! Bag mirror and configuration bridge.
//!
//! The mirror only ever takes values the server sent. Local requests never
//! touch it, even `configure`, whose values the client itself chose.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::scoring::TokenTally;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    #[serde(rename = "successi")]
    pub success: u32,
    #[serde(rename = "complicazioni")]
    pub complication: u32,
}

impl Bag {
    pub fn new(success: u32, complication: u32) -> Self {
        Self { success, complication }
    }

    pub fn total(&self) -> u32 {
        self.success.saturating_add(self.complication)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Validate signed user input into bag counts
pub fn checked_counts(success: i64, complication: i64) -> Result<Bag, ClientError> {
    if success < 0 || complication < 0 {
        return Err(ClientError::NegativeCount);
    }
    let success = u32::try_from(success).map_err(|_| ClientError::NegativeCount)?;
    let complication = u32::try_from(complication).map_err(|_| ClientError::NegativeCount)?;
    Ok(Bag::new(success, complication))
}

#[derive(Debug, Clone, Default)]
pub struct BagBridge {
    mirror: Bag,
    help_armed: bool,
    awaiting_ack: bool,
}

impl BagBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the bag a freshly joined room reports
    pub fn with_mirror(mirror: Bag) -> Self {
        Self { mirror, ..Self::default() }
    }

    pub fn mirror(&self) -> Bag {
        self.mirror
    }

    pub fn help_available(&self) -> bool {
        self.help_armed
    }

    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// Returns the counts to send in `configure_bag`. Arms the help action.
    pub fn configure(&mut self, success: i64, complication: i64) -> Result<Bag, ClientError> {
        if self.awaiting_ack {
            return Err(ClientError::ConfigurePending);
        }
        let counts = checked_counts(success, complication)?;
        self.awaiting_ack = true;
        self.help_armed = true;
        Ok(counts)
    }

    /// Success count taken from the trait score
    pub fn configure_from_tally(&mut self, tally: &TokenTally, complication: i64) -> Result<Bag, ClientError> {
        self.configure(tally.total, complication)
    }

    pub fn on_configured(&mut self, ack: Bag) {
        self.mirror = ack;
        self.awaiting_ack = false;
    }

    /// Single use until the next configuration or reset
    pub fn take_help(&mut self) -> Result<(), ClientError> {
        if !self.help_armed {
            return Err(ClientError::HelpUnavailable);
        }
        self.help_armed = false;
        Ok(())
    }

    pub fn on_reset(&mut self) {
        self.mirror = Bag::default();
        self.help_armed = true;
        self.awaiting_ack = false;
    }

    /// Any other server-reported bag state (help, returns, draws)
    pub fn sync(&mut self, bag: Bag) {
        self.mirror = bag;
    }

    /// The server refused something; stop waiting for an acknowledgment
    pub fn on_server_error(&mut self) {
        self.awaiting_ack = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_counts_rejected_without_side_effects() {
        let mut b = BagBridge::new();
        assert_eq!(b.configure(-1, 2), Err(ClientError::NegativeCount));
        assert_eq!(b.configure(3, -2), Err(ClientError::NegativeCount));
        assert!(!b.awaiting_ack());
        assert!(!b.help_available());
    }

    #[test]
    fn test_mirror_takes_server_values_not_requested_ones() {
        let mut b = BagBridge::new();
        let sent = b.configure(5, 2).unwrap();
        assert_eq!(sent, Bag::new(5, 2));
        assert_eq!(b.mirror(), Bag::default());
        b.on_configured(Bag::new(6, 2));
        assert_eq!(b.mirror(), Bag::new(6, 2));
        assert!(!b.awaiting_ack());
    }

    #[test]
    fn test_second_configure_waits_for_ack() {
        let mut b = BagBridge::new();
        b.configure(1, 1).unwrap();
        assert_eq!(b.configure(2, 2), Err(ClientError::ConfigurePending));
        b.on_server_error();
        assert!(b.configure(2, 2).is_ok());
    }

    #[test]
    fn test_help_is_single_use_until_rearmed() {
        let mut b = BagBridge::new();
        assert_eq!(b.take_help(), Err(ClientError::HelpUnavailable));
        b.configure(3, 1).unwrap();
        b.on_configured(Bag::new(3, 1));
        assert!(b.take_help().is_ok());
        assert_eq!(b.take_help(), Err(ClientError::HelpUnavailable));
        b.on_reset();
        assert_eq!(b.mirror(), Bag::default());
        assert!(b.take_help().is_ok());
    }

    #[test]
    fn test_configure_from_negative_tally_rejected() {
        let mut b = BagBridge::new();
        let tally = TokenTally { selected: 0, empowered_used: 0, modifier: -2, total: -2 };
        assert_eq!(b.configure_from_tally(&tally, 1), Err(ClientError::NegativeCount));
    }

    #[test]
    fn test_total_of_huge_server_counts_saturates() {
        let bag = Bag::new(u32::MAX, 7);
        assert_eq!(bag.total(), u32::MAX);
        assert!(!bag.is_empty());
    }
}
