//! Operator notifications: command results and background errors.

use std::collections::VecDeque;
use std::time::SystemTime;

/// Severity of an operator notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub at: SystemTime,
    pub level: NoticeLevel,
    pub text: String,
}

/// Bounded queue of notifications, newest last.
#[derive(Debug)]
pub struct Notices {
    pub cap: usize,
    items: VecDeque<Notice>,
}

impl Notices {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.items.push_back(Notice {
            at: SystemTime::now(),
            level,
            text: text.into(),
        });
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
