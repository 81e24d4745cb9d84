//! Events recorded by the host

use crate::core::types::Address;
use crate::safe::SafeEvent;
use crate::token::{ConfidentialEvent, TokenEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Any event a deployed contract can emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainEvent {
    Safe(SafeEvent),
    Token(TokenEvent),
    Confidential(ConfidentialEvent),
}

impl fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEvent::Safe(event) => write!(f, "{}", event),
            ChainEvent::Token(TokenEvent::Transfer { from, to, amount }) => {
                write!(f, "Transfer({} -> {}, {})", from, to, amount)
            }
            ChainEvent::Token(TokenEvent::Approval {
                owner,
                spender,
                amount,
            }) => write!(f, "Approval({} -> {}, {})", owner, spender, amount),
            ChainEvent::Confidential(event) => write!(f, "{:?}", event),
        }
    }
}

/// An emitted event with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub emitter: Address,
    pub event: ChainEvent,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(emitter: Address, event: ChainEvent) -> Self {
        Self {
            emitter,
            event,
            timestamp: Utc::now(),
        }
    }

    /// The account event, if this entry carries one
    pub fn safe_event(&self) -> Option<&SafeEvent> {
        match &self.event {
            ChainEvent::Safe(event) => Some(event),
            _ => None,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.emitter,
            self.event
        )
    }
}
