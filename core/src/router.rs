/// Notification router: classifies each inbound event and dispatches it to the
/// page context, the alert sink and the tray.
///
/// Per event, in order:
///   1. new-message events from the current user are own echoes: the page may
///      splice them into the rendered history, nothing else sees them; a
///      new-message naming a conversation the page does not know is dropped;
///   2. the page context gets the event; if it handled it in place, no toast;
///   3. otherwise the toast rendering goes to the alert sink;
///   4. the tray rendering always goes to the tray updater.
use crate::error::SyncError;
use crate::model::{ConversationId, Message, Notification, NotificationEvent, Offer, UserId};
use crate::sinks::Alert;
use tracing::{debug, warn};

const TOAST_TEXT_LIMIT: usize = 50;
const TRAY_TEXT_LIMIT: usize = 40;

/// Where a rendering is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Toast,
    Tray,
}

impl Surface {
    fn text_limit(&self) -> usize {
        match self {
            Surface::Toast => TOAST_TEXT_LIMIT,
            Surface::Tray => TRAY_TEXT_LIMIT,
        }
    }
}

/// Why an event went nowhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    StaleReference(ConversationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Page context updated visible UI; tray updated, no toast
    HandledInPlace,
    /// Toast raised and tray updated
    Toasted,
    /// Own message echoed back; only offered to the page
    OwnEcho,
    Dropped(DropReason),
}

/// The consumers an event is routed to
pub trait RouteTarget {
    /// Whether a new-message for this conversation can be applied. Page
    /// contexts without a conversation store accept every id.
    fn knows_conversation(&self, id: ConversationId) -> bool;

    /// Offer the event to the current page context. Returns true if it was
    /// handled in place.
    fn deliver_to_page(&mut self, event: &NotificationEvent, own_echo: bool) -> bool;

    fn raise_toast(&mut self, alert: Alert);

    /// Persistent list append, badge update and acknowledgment trigger
    fn update_tray(&mut self, event: &NotificationEvent, entry: Alert);
}

#[derive(Debug, Clone, Copy)]
pub struct NotificationRouter {
    current_user: UserId,
}

impl NotificationRouter {
    pub fn new(current_user: UserId) -> Self {
        Self { current_user }
    }

    pub fn current_user(&self) -> UserId {
        self.current_user
    }

    pub fn is_own_echo(&self, event: &NotificationEvent) -> bool {
        matches!(&event.notification, Notification::NewMessage(m) if m.sender.id == self.current_user)
    }

    pub fn route<T: RouteTarget + ?Sized>(
        &self,
        event: &NotificationEvent,
        target: &mut T,
    ) -> RouteOutcome {
        if let Notification::NewMessage(message) = &event.notification {
            if !target.knows_conversation(message.conversation_id) {
                warn!(
                    "Dropping notification {}: {}",
                    event.id,
                    SyncError::StaleReference(message.conversation_id)
                );
                return RouteOutcome::Dropped(DropReason::StaleReference(message.conversation_id));
            }
            if message.sender.id == self.current_user {
                target.deliver_to_page(event, true);
                return RouteOutcome::OwnEcho;
            }
        }

        let handled = target.deliver_to_page(event, false);
        if !handled {
            target.raise_toast(self.render(&event.notification, Surface::Toast));
        }
        target.update_tray(event, self.render(&event.notification, Surface::Tray));

        debug!("Routed {} #{} (handled in place: {})", event.notification.kind(), event.id, handled);
        if handled {
            RouteOutcome::HandledInPlace
        } else {
            RouteOutcome::Toasted
        }
    }

    /// Render `{title, content, link}` for a surface
    pub fn render(&self, notification: &Notification, surface: Surface) -> Alert {
        match (notification, surface) {
            (Notification::NewOffer(o), Surface::Toast) => listing_alert(
                "New Offer",
                format!(
                    "You received an offer of ${} from {} for {}",
                    o.price, o.buyer.display_name, o.listing.name
                ),
                o,
            ),
            (Notification::NewOffer(o), Surface::Tray) => listing_alert(
                "New Offer",
                format!(
                    "You received a new offer of ${} for your listing {}.",
                    o.price, o.listing.name
                ),
                o,
            ),
            (Notification::OfferUpdated(o), Surface::Toast) => listing_alert(
                "Offer Changed",
                format!(
                    "{}'s offer for {} was changed to ${}",
                    o.buyer.display_name, o.listing.name, o.price
                ),
                o,
            ),
            (Notification::OfferUpdated(o), Surface::Tray) => listing_alert(
                "Offer Changed",
                format!(
                    "{}'s offer on your listing {} was changed to ${}.",
                    o.buyer.display_name, o.listing.name, o.price
                ),
                o,
            ),
            (Notification::OfferCountered(o), Surface::Toast) => listing_alert(
                "Offer Countered",
                format!(
                    "{} countered your offer for {} with ${}",
                    o.seller.display_name, o.listing.name, o.counter
                ),
                o,
            ),
            (Notification::OfferCountered(o), Surface::Tray) => listing_alert(
                "Offer Countered",
                format!(
                    "{} countered your offer of ${} for {} with ${}.",
                    o.seller.display_name, o.price, o.listing.name, o.counter
                ),
                o,
            ),
            (Notification::OfferRevoked(o), Surface::Toast) => listing_alert(
                "Offer Revoked",
                format!(
                    "{} revoked the offer of ${} for {}.",
                    o.buyer.display_name, o.price, o.listing.name
                ),
                o,
            ),
            (Notification::OfferRevoked(o), Surface::Tray) => listing_alert(
                "Offer Revoked",
                format!(
                    "{} took back an offer of ${} for your listing {}.",
                    o.buyer.display_name, o.price, o.listing.name
                ),
                o,
            ),
            (Notification::OfferRejected(o), Surface::Toast) => listing_alert(
                "Offer Rejected",
                format!(
                    "{} rejected your offer of ${} for {}",
                    o.seller.display_name, o.price, o.listing.name
                ),
                o,
            ),
            (Notification::OfferRejected(o), Surface::Tray) => listing_alert(
                "Offer Rejected",
                format!(
                    "{} rejected your offer of ${} for {}.",
                    o.seller.display_name, o.price, o.listing.name
                ),
                o,
            ),
            (Notification::OfferAccepted(o), Surface::Toast) => conversation_alert(
                "Offer Accepted",
                format!(
                    "{} has accepted your offer of ${} for {}",
                    o.seller.display_name, o.price, o.listing.name
                ),
                o.id,
            ),
            (Notification::OfferAccepted(o), Surface::Tray) => conversation_alert(
                "Offer Accepted",
                format!(
                    "{} accepted your offer of ${} for {}. You can now chat with them by clicking here!",
                    o.seller.display_name, o.price, o.listing.name
                ),
                o.id,
            ),
            (Notification::NewMessage(m), Surface::Toast) => conversation_alert(
                "New Message",
                format!(
                    "New message from {}: {}",
                    m.sender.display_name,
                    preview(m, surface)
                ),
                m.conversation_id,
            ),
            (Notification::NewMessage(m), Surface::Tray) => conversation_alert(
                "New Message",
                format!("{}: {}", m.sender.display_name, preview(m, surface)),
                m.conversation_id,
            ),
        }
    }
}

fn listing_alert(title: &str, content: String, offer: &Offer) -> Alert {
    Alert {
        title: title.to_string(),
        content,
        link: Some(format!("/listing/view/{}", offer.listing.id)),
    }
}

fn conversation_alert(title: &str, content: String, id: ConversationId) -> Alert {
    Alert {
        title: title.to_string(),
        content,
        link: Some(format!("/message/client/#conversation{}", id)),
    }
}

fn preview(message: &Message, surface: Surface) -> String {
    truncate(&message.message, surface.text_limit())
}

/// Longer than `limit` chars: keep `limit - 3` and add "..."
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ListingRef, Party};

    #[derive(Default)]
    struct FakeTarget {
        known: Vec<ConversationId>,
        handles: bool,
        delivered: Vec<(i64, bool)>,
        toasts: Vec<Alert>,
        tray: Vec<Alert>,
    }

    impl RouteTarget for FakeTarget {
        fn knows_conversation(&self, id: ConversationId) -> bool {
            self.known.contains(&id)
        }
        fn deliver_to_page(&mut self, event: &NotificationEvent, own_echo: bool) -> bool {
            self.delivered.push((event.id, own_echo));
            self.handles
        }
        fn raise_toast(&mut self, alert: Alert) {
            self.toasts.push(alert);
        }
        fn update_tray(&mut self, _event: &NotificationEvent, entry: Alert) {
            self.tray.push(entry);
        }
    }

    fn party(id: UserId, name: &str) -> Party {
        Party {
            id,
            display_name: name.to_string(),
        }
    }

    fn message_event(id: i64, sender: UserId, text: &str) -> NotificationEvent {
        NotificationEvent {
            id,
            notification: Notification::NewMessage(Message {
                id: id * 100,
                sender: party(sender, "Bob"),
                message: text.to_string(),
                created: None,
                conversation_id: 12,
            }),
            created: None,
            read: false,
        }
    }

    fn offer() -> Offer {
        Offer {
            id: 12,
            listing: ListingRef {
                id: 77,
                name: "Desk".to_string(),
            },
            buyer: party(2, "Bob"),
            seller: party(1, "Sue"),
            price: "40.00".to_string(),
            counter: "45.00".to_string(),
            unread_count: 0,
        }
    }

    #[test]
    fn test_unhandled_event_toasts_and_reaches_tray() {
        let router = NotificationRouter::new(1);
        let mut target = FakeTarget {
            known: vec![12],
            ..Default::default()
        };
        let outcome = router.route(&message_event(6, 2, "hello"), &mut target);
        assert_eq!(outcome, RouteOutcome::Toasted);
        assert_eq!(target.toasts.len(), 1);
        assert_eq!(target.toasts[0].content, "New message from Bob: hello");
        assert_eq!(target.tray.len(), 1);
        assert_eq!(target.tray[0].content, "Bob: hello");
    }

    #[test]
    fn test_handled_event_skips_toast_but_not_tray() {
        let router = NotificationRouter::new(1);
        let mut target = FakeTarget {
            known: vec![12],
            handles: true,
            ..Default::default()
        };
        let outcome = router.route(&message_event(7, 2, "hello"), &mut target);
        assert_eq!(outcome, RouteOutcome::HandledInPlace);
        assert!(target.toasts.is_empty());
        assert_eq!(target.tray.len(), 1);
    }

    #[test]
    fn test_own_message_only_reaches_page() {
        let router = NotificationRouter::new(2);
        let mut target = FakeTarget {
            known: vec![12],
            ..Default::default()
        };
        let outcome = router.route(&message_event(8, 2, "mine"), &mut target);
        assert_eq!(outcome, RouteOutcome::OwnEcho);
        assert_eq!(target.delivered, vec![(8, true)]);
        assert!(target.toasts.is_empty());
        assert!(target.tray.is_empty());
    }

    #[test]
    fn test_stale_reference_is_dropped() {
        let router = NotificationRouter::new(1);
        let mut target = FakeTarget::default();
        let outcome = router.route(&message_event(9, 2, "hello"), &mut target);
        assert_eq!(outcome, RouteOutcome::Dropped(DropReason::StaleReference(12)));
        assert!(target.delivered.is_empty());
        assert!(target.tray.is_empty());
    }

    #[test]
    fn test_offer_renderings() {
        let router = NotificationRouter::new(2);
        let countered = router.render(&Notification::OfferCountered(offer()), Surface::Tray);
        assert_eq!(countered.title, "Offer Countered");
        assert_eq!(countered.content, "Sue countered your offer of $40.00 for Desk with $45.00.");
        assert_eq!(countered.link.as_deref(), Some("/listing/view/77"));

        let accepted = router.render(&Notification::OfferAccepted(offer()), Surface::Toast);
        assert_eq!(accepted.link.as_deref(), Some("/message/client/#conversation12"));
    }

    #[test]
    fn test_truncation_per_surface() {
        let router = NotificationRouter::new(1);
        let long = "x".repeat(60);
        let event = message_event(1, 2, &long);
        let toast = router.render(&event.notification, Surface::Toast);
        let tray = router.render(&event.notification, Surface::Tray);
        assert_eq!(toast.content, format!("New message from Bob: {}...", "x".repeat(47)));
        assert_eq!(tray.content, format!("Bob: {}...", "x".repeat(37)));
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate(&"é".repeat(41), 40).chars().count(), 40);
    }
}
