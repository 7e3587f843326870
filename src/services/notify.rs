use std::sync::Mutex;
use tracing::{error, info, warn};

pub const VOTE_SAVED: &str = "Your vote has been saved.";
pub const VOTE_DELETED: &str = "Your vote has been deleted.";
pub const VOTES_REMOVED: &str = "Your votes have been successfully removed.";
pub const BACKLOG_UPDATED: &str = "Your backlog has been successfully updated.";
pub const NOTHING_TO_RANK: &str = "There are no voted items to apply to the backlog.";
pub const GENERIC_FAILURE: &str = "An error occured.\nPlease refresh the page and try again";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Danger,
}

/// Where user-facing messages go.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    /// Tells the host whether there is anything left to vote on.
    fn nothing_to_vote(&self, _anything_to_vote: bool) {}
}

/// Writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Success => info!(notification = "success", "{}", message),
            NotificationLevel::Warning => warn!(notification = "warning", "{}", message),
            NotificationLevel::Danger => error!(notification = "danger", "{}", message),
        }
    }

    fn nothing_to_vote(&self, anything_to_vote: bool) {
        if !anything_to_vote {
            warn!("Some backlog items could not be loaded");
        }
    }
}

/// Keeps notifications for a host that renders them later.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NotificationLevel, String)>>,
    nothing_to_vote: Mutex<Vec<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(NotificationLevel, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn nothing_to_vote_signals(&self) -> Vec<bool> {
        self.nothing_to_vote
            .lock()
            .map(|signals| signals.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_owned()));
        }
    }

    fn nothing_to_vote(&self, anything_to_vote: bool) {
        if let Ok(mut signals) = self.nothing_to_vote.lock() {
            signals.push(anything_to_vote);
        }
    }
}
