//! Chat session state and its reducer
//!
//! `SessionState` holds everything the chat screen shows: the message log,
//! the draft question and the awaiting-response flag. It only changes through
//! [`SessionState::reduce`], which computes the next state from the current
//! one and a [`SessionEvent`], and reports any request the caller must send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{IdClock, Message};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    messages: Vec<Message>,
    welcome: Message,
    pub draft: String,
    pub awaiting_response: bool,
    ids: IdClock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DraftChanged(String),
    Submit,
    AnswerReceived(String),
    AskFailed,
    Clear,
}

/// Work the caller has to perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Ask { question: String },
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        let welcome = Message::welcome(now);
        Self {
            messages: vec![welcome.clone()],
            welcome,
            draft: String::new(),
            awaiting_response: false,
            ids: IdClock::default(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn welcome(&self) -> &Message {
        &self.welcome
    }

    /// Whether the current draft may be sent
    pub fn can_submit(&self) -> bool {
        !self.draft.trim().is_empty() && !self.awaiting_response
    }

    pub fn reduce(mut self, event: SessionEvent, now: DateTime<Utc>) -> (Self, Option<Effect>) {
        let effect = self.apply(event, now);
        (self, effect)
    }

    /// In-place form of [`SessionState::reduce`].
    pub fn apply(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Option<Effect> {
        match event {
            SessionEvent::DraftChanged(text) => {
                self.draft = text;
                None
            }
            SessionEvent::Submit => {
                if self.draft.trim().is_empty() {
                    return None;
                }
                let question = std::mem::take(&mut self.draft);
                let id = self.ids.next(now);
                self.messages.push(Message::user(id, question.clone(), now));
                self.awaiting_response = true;
                Some(Effect::Ask { question })
            }
            SessionEvent::AnswerReceived(body) => {
                let id = self.ids.next(now);
                self.messages.push(Message::assistant(id, body, now));
                self.awaiting_response = false;
                None
            }
            SessionEvent::AskFailed => {
                let id = self.ids.next(now);
                self.messages.push(Message::error(id, now));
                self.awaiting_response = false;
                None
            }
            SessionEvent::Clear => {
                self.messages.clear();
                self.messages.push(self.welcome.clone());
                None
            }
        }
    }
}
