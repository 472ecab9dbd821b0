use safeguard_core::{Classify, ErrorKind};
use thiserror::Error;

/// Why a recovery did not produce a value.
#[derive(Debug, Error)]
pub enum RecoveryError<E> {
    /// No strategy is registered under the requested name.
    #[error("no recovery strategy named {0}")]
    UnknownStrategy(String),
    /// The strategy stopped recovery before the attempts ran out.
    #[error("recovery via {strategy} abandoned after {attempts} attempts: {reason}")]
    Abandoned {
        strategy: String,
        attempts: u32,
        reason: String,
        /// Error of the last attempt made, if any was made.
        last: Option<E>,
    },
    /// Every attempt failed.
    #[error("recovery via {strategy} failed after {attempts} attempts: {last}")]
    Exhausted {
        strategy: String,
        attempts: u32,
        last: E,
    },
}

impl<E> RecoveryError<E> {
    /// Recovery attempts actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            RecoveryError::UnknownStrategy(_) => 0,
            RecoveryError::Abandoned { attempts, .. } | RecoveryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Error of the last attempt, if one was made.
    pub fn into_last(self) -> Option<E> {
        match self {
            RecoveryError::UnknownStrategy(_) => None,
            RecoveryError::Abandoned { last, .. } => last,
            RecoveryError::Exhausted { last, .. } => Some(last),
        }
    }
}

impl<E: Classify> Classify for RecoveryError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            RecoveryError::UnknownStrategy(_) => ErrorKind::Unknown,
            RecoveryError::Abandoned { last: Some(last), .. } => last.kind(),
            RecoveryError::Abandoned { last: None, .. } => ErrorKind::ServiceUnavailable,
            RecoveryError::Exhausted { last, .. } => last.kind(),
        }
    }
}
