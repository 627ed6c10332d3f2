use std::fmt;

use crate::traits::TraitKind;

/// Local validation failures. Raised before any request leaves the client and
/// never leave state half-mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    CapacityExceeded { kind: TraitKind, cap: usize },
    UnknownTrait(String),
    ArchetypeLocked,
    NegativeCount,
    EmptyField(&'static str),
    InsufficientTokens { requested: u32, available: u32 },
    InvalidDrawSize(u32),
    DrawInProgress,
    RiskAllUnavailable,
    HelpUnavailable,
    ConfigurePending,
    NotInRoom,
    AlreadyInRoom,
    InvalidWeather(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::CapacityExceeded { kind, cap } => {
                write!(f, "cannot add more than {} {} traits", cap, kind.as_str())
            }
            ClientError::UnknownTrait(id) => write!(f, "unknown trait '{}'", id),
            ClientError::ArchetypeLocked => write!(f, "the archetype cannot be selected or empowered"),
            ClientError::NegativeCount => write!(f, "token counts must not be negative"),
            ClientError::EmptyField(field) => write!(f, "{} is required", field),
            ClientError::InsufficientTokens { requested, available } => write!(
                f,
                "not enough tokens in the bag ({} requested, {} available)",
                requested, available
            ),
            ClientError::InvalidDrawSize(n) => write!(f, "cannot draw {} tokens (1 to 5)", n),
            ClientError::DrawInProgress => write!(f, "a draw is already in progress"),
            ClientError::RiskAllUnavailable => write!(f, "risk all is not available"),
            ClientError::HelpUnavailable => write!(f, "help has already been used for this bag"),
            ClientError::ConfigurePending => write!(f, "waiting for the server to confirm the bag"),
            ClientError::NotInRoom => write!(f, "join or create a room first"),
            ClientError::AlreadyInRoom => write!(f, "leave the current room first"),
            ClientError::InvalidWeather(what) => write!(f, "unknown season or zone '{}'", what),
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let e = ClientError::InsufficientTokens { requested: 4, available: 3 };
        assert_eq!(e.to_string(), "not enough tokens in the bag (4 requested, 3 available)");
        let e = ClientError::CapacityExceeded { kind: TraitKind::Quality, cap: 6 };
        assert_eq!(e.to_string(), "cannot add more than 6 quality traits");
    }
}
