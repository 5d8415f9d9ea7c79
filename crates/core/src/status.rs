//! Batch lifecycle state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Batch lifecycle status.
///
/// `RECEIVED → VALIDATING → {ENRICHING | INVALID} → PROCESSING → COMPLETE`.
/// `INVALID` and `COMPLETE` are terminal; advancing a terminal status is a
/// no-op. The only non-deterministic transition is out of `VALIDATING`,
/// decided by the caller's coin flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Received,
    Validating,
    Enriching,
    Processing,
    Complete,
    Invalid,
}

impl BatchStatus {
    /// The status one step ahead of this one.
    ///
    /// `validation_passed` decides the `VALIDATING` fork: `true` goes to
    /// `ENRICHING`, `false` to `INVALID`. Terminal statuses return
    /// themselves.
    pub fn next(self, validation_passed: bool) -> Self {
        match self {
            Self::Received => Self::Validating,
            Self::Validating if validation_passed => Self::Enriching,
            Self::Validating => Self::Invalid,
            Self::Enriching => Self::Processing,
            Self::Processing => Self::Complete,
            terminal => terminal,
        }
    }

    /// Outcome derived from this status.
    pub fn outcome(self) -> Outcome {
        match self {
            Self::Invalid => Outcome::Failure,
            Self::Complete => Outcome::Success,
            _ => Outcome::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Validating => "VALIDATING",
            Self::Enriching => "ENRICHING",
            Self::Processing => "PROCESSING",
            Self::Complete => "COMPLETE",
            Self::Invalid => "INVALID",
        }
    }
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(Self::Received),
            "VALIDATING" => Ok(Self::Validating),
            "ENRICHING" => Ok(Self::Enriching),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETE" => Ok(Self::Complete),
            "INVALID" => Ok(Self::Invalid),
            other => Err(DomainError::validation(format!(
                "unknown batch status {other:?}"
            ))),
        }
    }
}

/// Batch outcome: `-` until a terminal status is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "-")]
    Pending,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "-",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(DomainError::validation(format!(
                "unknown outcome {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_transitions() {
        assert_eq!(BatchStatus::Received.next(true), BatchStatus::Validating);
        assert_eq!(BatchStatus::Received.next(false), BatchStatus::Validating);
        assert_eq!(BatchStatus::Enriching.next(false), BatchStatus::Processing);
        assert_eq!(BatchStatus::Processing.next(true), BatchStatus::Complete);
    }

    #[test]
    fn validating_forks_on_the_coin_flip() {
        assert_eq!(BatchStatus::Validating.next(true), BatchStatus::Enriching);
        assert_eq!(BatchStatus::Validating.next(false), BatchStatus::Invalid);
    }

    #[test]
    fn terminal_statuses_do_not_advance() {
        for terminal in [BatchStatus::Complete, BatchStatus::Invalid] {
            assert_eq!(terminal.next(true), terminal);
            assert_eq!(terminal.next(false), terminal);
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(BatchStatus::Invalid.outcome(), Outcome::Failure);
        assert_eq!(BatchStatus::Complete.outcome(), Outcome::Success);
        for pending in [
            BatchStatus::Received,
            BatchStatus::Validating,
            BatchStatus::Enriching,
            BatchStatus::Processing,
        ] {
            assert_eq!(pending.outcome(), Outcome::Pending);
        }
    }

    #[test]
    fn every_walk_terminates() {
        // From RECEIVED, both coin-flip outcomes reach a terminal status
        // in at most four steps.
        for passed in [true, false] {
            let mut status = BatchStatus::Received;
            let mut steps = 0;
            while !status.is_terminal() {
                status = status.next(passed);
                steps += 1;
                assert!(steps <= 4, "walk did not terminate");
            }
        }
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for status in [
            BatchStatus::Received,
            BatchStatus::Validating,
            BatchStatus::Enriching,
            BatchStatus::Processing,
            BatchStatus::Complete,
            BatchStatus::Invalid,
        ] {
            assert_eq!(status.as_str().parse::<BatchStatus>().unwrap(), status);
        }
        for outcome in [Outcome::Pending, Outcome::Success, Outcome::Failure] {
            assert_eq!(outcome.as_str().parse::<Outcome>().unwrap(), outcome);
        }
        assert!("DONE".parse::<BatchStatus>().is_err());
        assert!("PENDING".parse::<Outcome>().is_err());
    }

    #[test]
    fn wire_names_are_screaming_snake() {
        let json = serde_json::to_string(&BatchStatus::Received).unwrap();
        assert_eq!(json, "\"RECEIVED\"");
        let json = serde_json::to_string(&Outcome::Pending).unwrap();
        assert_eq!(json, "\"-\"");

        let parsed: BatchStatus = serde_json::from_str("\"COMPLETE\"").unwrap();
        assert_eq!(parsed, BatchStatus::Complete);
        let parsed: Outcome = serde_json::from_str("\"FAILURE\"").unwrap();
        assert_eq!(parsed, Outcome::Failure);
    }
}
