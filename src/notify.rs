use chrono::{DateTime, Local};

/// Tag carried by every notification, mirrors the service's reply `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Complete,
    Exception,
    Data,
}

impl NotificationKind {
    /// Unknown wire tags are shown as plain messages
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "complete" => NotificationKind::Complete,
            "exception" => NotificationKind::Exception,
            "data" => NotificationKind::Data,
            _ => NotificationKind::Message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
    pub posted_at: DateTime<Local>,
}

/// Append-only message list with manual removal
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Vec<Notification>,
    next_id: u64,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, kind: NotificationKind, message: impl Into<String>) -> NotificationId {
        let id = NotificationId(self.next_id);
        self.next_id += 1;
        let message = message.into();
        tracing::debug!(%kind, %message, "notification");
        self.entries.push(Notification {
            id,
            kind,
            message,
            posted_at: Local::now(),
        });
        id
    }

    /// Returns false when the entry was already gone
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.id != id);
        before != self.entries.len()
    }

    pub fn dismiss_all(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
