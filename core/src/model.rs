/// Domain types shared by the store, the router and the snapshot client
use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type ConversationId = i64;
pub type NotificationId = i64;
pub type MessageId = i64;
pub type UserId = i64;

/// A participant as embedded in offer and message payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: UserId,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Which side of the offer the viewer is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Seller,
    Buyer,
}

/// One conversation thread. A conversation is an accepted offer, so its id is
/// the offer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub listing: ListingRef,
    pub seller: Party,
    pub buyer: Party,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    pub fn role_of(&self, user: UserId) -> Role {
        if self.seller.id == user {
            Role::Seller
        } else {
            Role::Buyer
        }
    }

    /// The other party, seen from `user`
    pub fn counterpart(&self, user: UserId) -> &Party {
        match self.role_of(user) {
            Role::Seller => &self.buyer,
            Role::Buyer => &self.seller,
        }
    }
}

/// Offer payload carried by the offer notification kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: ConversationId,
    pub listing: ListingRef,
    pub buyer: Party,
    pub seller: Party,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub counter: String,
    #[serde(default)]
    pub unread_count: u32,
}

impl From<Offer> for Conversation {
    fn from(offer: Offer) -> Self {
        Self {
            id: offer.id,
            listing: offer.listing,
            seller: offer.seller,
            buyer: offer.buyer,
            price: offer.price,
            unread_count: offer.unread_count,
        }
    }
}

/// Chat message. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Party,
    pub message: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(rename = "offer", deserialize_with = "offer_ref_id")]
    pub conversation_id: ConversationId,
}

fn offer_ref_id<'de, D>(deserializer: D) -> std::result::Result<ConversationId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct OfferRef {
        id: ConversationId,
    }
    OfferRef::deserialize(deserializer).map(|r| r.id)
}

/// The closed set of push notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    NewOffer,
    OfferUpdated,
    OfferCountered,
    OfferRevoked,
    OfferRejected,
    OfferAccepted,
    NewMessage,
}

impl NotificationKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            NotificationKind::NewOffer => "NOTIF_NEW_OFFER",
            NotificationKind::OfferUpdated => "NOTIF_UPDATE_OFFER",
            NotificationKind::OfferCountered => "NOTIF_OFFER_COUNTER",
            NotificationKind::OfferRevoked => "NOTIF_OFFER_REVOKED",
            NotificationKind::OfferRejected => "NOTIF_OFFER_REJECTED",
            NotificationKind::OfferAccepted => "OFFER_ACCEPTED",
            NotificationKind::NewMessage => "NEW_MESSAGE",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Decoded inner value of a notification: `{notif_type, notification}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "notif_type", content = "notification")]
pub enum Notification {
    #[serde(rename = "NOTIF_NEW_OFFER")]
    NewOffer(Offer),
    #[serde(rename = "NOTIF_UPDATE_OFFER")]
    OfferUpdated(Offer),
    #[serde(rename = "NOTIF_OFFER_COUNTER")]
    OfferCountered(Offer),
    #[serde(rename = "NOTIF_OFFER_REVOKED")]
    OfferRevoked(Offer),
    #[serde(rename = "NOTIF_OFFER_REJECTED")]
    OfferRejected(Offer),
    #[serde(rename = "OFFER_ACCEPTED")]
    OfferAccepted(Offer),
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage(Message),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::NewOffer(_) => NotificationKind::NewOffer,
            Notification::OfferUpdated(_) => NotificationKind::OfferUpdated,
            Notification::OfferCountered(_) => NotificationKind::OfferCountered,
            Notification::OfferRevoked(_) => NotificationKind::OfferRevoked,
            Notification::OfferRejected(_) => NotificationKind::OfferRejected,
            Notification::OfferAccepted(_) => NotificationKind::OfferAccepted,
            Notification::NewMessage(_) => NotificationKind::NewMessage,
        }
    }

    /// Conversation (offer) this notification is about
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Notification::NewOffer(o)
            | Notification::OfferUpdated(o)
            | Notification::OfferCountered(o)
            | Notification::OfferRevoked(o)
            | Notification::OfferRejected(o)
            | Notification::OfferAccepted(o) => o.id,
            Notification::NewMessage(m) => m.conversation_id,
        }
    }
}

/// A fully decoded push or tray notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub notification: Notification,
    pub created: Option<DateTime<Utc>>,
    pub read: bool,
}

/// Notification record as it travels on the wire: the outer envelope of a data
/// frame and the element type of a tray snapshot page. `value` is itself JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub value: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Decode the inner `value` layer
    pub fn decode(self) -> Result<NotificationEvent> {
        let notification: Notification = serde_json::from_str(&self.value)
            .map_err(|e| SyncError::MalformedEvent(format!("notification {}: {}", self.id, e)))?;
        Ok(NotificationEvent {
            id: self.id,
            notification,
            created: self.created,
            read: self.read,
        })
    }
}

/// Which surface of the message view is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveSelection {
    #[default]
    List,
    Conversation(ConversationId),
}

impl ActiveSelection {
    pub fn is_conversation(&self, id: ConversationId) -> bool {
        *self == ActiveSelection::Conversation(id)
    }
}

/// Unread counters reported by the counts snapshot endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NotificationCounts {
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub notification_count: u32,
}
