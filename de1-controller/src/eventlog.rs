//! Timestamped, categorised event log with a bounded view

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use log::{error, info, warn};

const VIEW_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Info,
    Rx,
    Tx,
    Pi,
    Warn,
    Error,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Info => "INFO",
            Category::Rx => "RX",
            Category::Tx => "TX",
            Category::Pi => "PI",
            Category::Warn => "WARN",
            Category::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub timestamp: DateTime<Local>,
    pub category: Category,
    pub text: String,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.category.as_str(),
            self.text
        )
    }
}

/// Append-only log. Entries mirror to the `log` facade as they arrive; the
/// retained view keeps the most recent thousand lines for an operator
/// surface.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: VecDeque<Entry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: Category, text: impl Into<String>) {
        let entry = Entry {
            timestamp: Local::now(),
            category,
            text: text.into(),
        };
        match category {
            Category::Warn => warn!("{}", entry.text),
            Category::Error => error!("{}", entry.text),
            _ => info!("[{}] {}", category.as_str(), entry.text),
        }
        self.entries.push_back(entry);
        while self.entries.len() > VIEW_CAP {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
