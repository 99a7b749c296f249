/// Acknowledgment protocol: keeps the server's unread state aligned with what
/// has been shown, and owns the badge counters.
///
/// Exactly two triggers send an ack:
///   - the tray goes closed → open: one bulk `-R<newest>`, badge zeroed
///     optimistically;
///   - an event arrives while the tray is open (bulk) or targets the active
///     conversation (single `-r<id>`).
/// Anything else only bumps the badge.
use crate::model::NotificationId;
use crate::transport::protocol::AckFrame;

/// Outbound side of the acknowledgment protocol. Fire-and-forget.
pub trait AckSink {
    fn send_ack(&mut self, frame: AckFrame);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Badges {
    pub notifications: u32,
    pub messages: u32,
}

#[derive(Debug, Default)]
pub struct AckProtocol {
    newest: NotificationId,
    tray_open: bool,
    badges: Badges,
}

impl AckProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// High-water mark: greatest notification id observed
    pub fn newest(&self) -> NotificationId {
        self.newest
    }

    pub fn badges(&self) -> Badges {
        self.badges
    }

    pub fn is_tray_open(&self) -> bool {
        self.tray_open
    }

    /// Seed the counters from the counts snapshot
    pub fn seed(&mut self, badges: Badges) {
        self.badges = badges;
    }

    /// Advance the high-water mark. Never moves backwards.
    pub fn observe(&mut self, id: NotificationId) {
        self.newest = self.newest.max(id);
    }

    /// Closed → open sends one bulk ack and zeroes the badge. Opening an
    /// already-open tray does nothing.
    pub fn open_tray(&mut self) -> Option<AckFrame> {
        if self.tray_open {
            return None;
        }
        self.tray_open = true;
        self.badges.notifications = 0;
        (self.newest > 0).then_some(AckFrame::ReadUpTo(self.newest))
    }

    /// Returns true when the tray was open
    pub fn close_tray(&mut self) -> bool {
        std::mem::replace(&mut self.tray_open, false)
    }

    /// Account for one routed event. Returns the ack to send, if any; `None`
    /// means the badge was incremented instead.
    pub fn on_event(&mut self, id: NotificationId, targets_active: bool) -> Option<AckFrame> {
        self.observe(id);
        if self.tray_open {
            Some(AckFrame::ReadUpTo(self.newest))
        } else if targets_active {
            Some(AckFrame::Read(id))
        } else {
            self.badges.notifications += 1;
            None
        }
    }

    /// New message received outside the message view
    pub fn bump_messages(&mut self) {
        self.badges.messages += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_tray_inactive_target_bumps_badge() {
        let mut ack = AckProtocol::new();
        ack.observe(5);
        assert_eq!(ack.on_event(6, false), None);
        assert_eq!(ack.badges().notifications, 1);
        assert_eq!(ack.newest(), 6);
    }

    #[test]
    fn test_open_tray_sends_bulk_once() {
        let mut ack = AckProtocol::new();
        ack.on_event(6, false);
        assert_eq!(ack.open_tray(), Some(AckFrame::ReadUpTo(6)));
        assert_eq!(ack.badges().notifications, 0);
        assert_eq!(ack.open_tray(), None);
    }

    #[test]
    fn test_event_while_open_is_bulk_acked() {
        let mut ack = AckProtocol::new();
        ack.open_tray();
        assert_eq!(ack.on_event(9, false), Some(AckFrame::ReadUpTo(9)));
        assert_eq!(ack.on_event(8, true), Some(AckFrame::ReadUpTo(9)));
        assert_eq!(ack.badges().notifications, 0);
    }

    #[test]
    fn test_active_target_is_single_acked() {
        let mut ack = AckProtocol::new();
        assert_eq!(ack.on_event(7, true), Some(AckFrame::Read(7)));
        assert_eq!(ack.badges().notifications, 0);
    }

    #[test]
    fn test_high_water_mark_is_monotonic() {
        let mut ack = AckProtocol::new();
        ack.observe(10);
        ack.on_event(4, false);
        assert_eq!(ack.newest(), 10);
    }

    #[test]
    fn test_nothing_observed_skips_bulk() {
        let mut ack = AckProtocol::new();
        assert_eq!(ack.open_tray(), None);
        assert!(ack.is_tray_open());
        assert!(ack.close_tray());
        assert!(!ack.close_tray());
    }
}
