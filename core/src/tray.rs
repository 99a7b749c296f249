/// Notification tray: the persistent, dismissible list of notifications
use crate::model::{NotificationEvent, NotificationId};
use crate::pager::{PageRequest, Pager};
use crate::sinks::Alert;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// First tray snapshot page
pub const FIRST_TRAY_PAGE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayEntry {
    pub id: NotificationId,
    pub title: String,
    pub content: String,
    pub link: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub read: bool,
}

impl TrayEntry {
    pub fn new(event: &NotificationEvent, alert: Alert, read: bool) -> Self {
        Self {
            id: event.id,
            title: alert.title,
            content: alert.content,
            link: alert.link,
            created: event.created,
            read: read || event.read,
        }
    }
}

#[derive(Debug)]
pub struct Tray {
    entries: VecDeque<TrayEntry>,
    pager: Pager<()>,
}

impl Tray {
    pub fn new(page_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            pager: Pager::new((), FIRST_TRAY_PAGE, page_size),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TrayEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread(&self) -> usize {
        self.entries.iter().filter(|e| !e.read).count()
    }

    pub fn pager_mut(&mut self) -> &mut Pager<()> {
        &mut self.pager
    }

    pub fn next_page(&mut self) -> Option<PageRequest<()>> {
        self.pager.next_page()
    }

    /// Live event: newest first
    pub fn push_front(&mut self, entry: TrayEntry) {
        self.entries.push_front(entry);
    }

    /// Snapshot page: older entries go to the back
    pub fn push_back(&mut self, entry: TrayEntry) {
        self.entries.push_back(entry);
    }

    /// Tray closed: nothing is "new" any more
    pub fn mark_all_read(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.read = true;
        }
    }
}
