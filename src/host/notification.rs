use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::info;

/// Single on-screen message slot. Posting again replaces what is displayed.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenMessage {
    pub text: String,
    pub duration: Duration,
    pub posted_at: Option<DateTime<Local>>,
}

impl ScreenMessage {
    pub fn new(duration: Duration) -> Self {
        Self {
            text: String::new(),
            duration,
            posted_at: None,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.posted_at = Some(Local::now());
    }

    /// Whether the message is still on screen at `now`.
    pub fn is_visible_at(&self, now: DateTime<Local>) -> bool {
        match (self.posted_at, chrono::Duration::from_std(self.duration)) {
            (Some(posted_at), Ok(duration)) => now >= posted_at && now < posted_at + duration,
            _ => false,
        }
    }
}

/// User-visible text display. The core only ever posts.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink {
    fn post(&self, message: &ScreenMessage);
}

/// Sink for headless runs: every message goes to the log.
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn post(&self, message: &ScreenMessage) {
        let at = message.posted_at.unwrap_or_else(Local::now);
        info!(
            "[screen {}] {} ({}s)",
            at.format("%H:%M:%S%.3f"),
            message.text,
            message.duration.as_secs()
        );
    }
}
