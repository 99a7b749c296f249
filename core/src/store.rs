/// Conversation store: authoritative local cache of conversation metadata.
///
/// Two write paths with different trust:
///   - snapshot pages overwrite everything, unread_count included;
///   - push merges overwrite metadata but keep the local unread_count.
use crate::model::{ActiveSelection, Conversation, ConversationId, Message};
use std::collections::HashMap;
use tracing::debug;

/// Effect of a pushed message on the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEffect {
    /// Counter incremented to the given value
    Incremented(u32),
    /// Conversation is active; counter stays at 0
    PinnedActive,
    /// Conversation unknown to the store
    Unknown,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationId, Conversation>,
    /// Sidebar order: snapshot order, push-created entries appended
    order: Vec<ConversationId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.conversations.contains_key(&id)
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// Conversations in sidebar order
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.order.iter().filter_map(|id| self.conversations.get(id))
    }

    fn insert(&mut self, conversation: Conversation) {
        if !self.conversations.contains_key(&conversation.id) {
            self.order.push(conversation.id);
        }
        self.conversations.insert(conversation.id, conversation);
    }

    /// Insert/overwrite a snapshot page. Server unread counts are taken as is,
    /// except that the active conversation stays at 0.
    pub fn merge_snapshot_page(&mut self, page: Vec<Conversation>, active: ActiveSelection) {
        for mut conversation in page {
            if active.is_conversation(conversation.id) {
                conversation.unread_count = 0;
            }
            self.insert(conversation);
        }
    }

    /// Insert/overwrite from a push payload, keeping a known unread_count
    pub fn merge_push(&mut self, mut conversation: Conversation, active: ActiveSelection) {
        if let Some(known) = self.conversations.get(&conversation.id) {
            conversation.unread_count = known.unread_count;
        }
        if active.is_conversation(conversation.id) {
            conversation.unread_count = 0;
        }
        self.insert(conversation);
    }

    /// Count a pushed message against its conversation
    pub fn apply_push_update(&mut self, message: &Message, active: ActiveSelection) -> PushEffect {
        let Some(conversation) = self.conversations.get_mut(&message.conversation_id) else {
            return PushEffect::Unknown;
        };
        if active.is_conversation(conversation.id) {
            conversation.unread_count = 0;
            return PushEffect::PinnedActive;
        }
        conversation.unread_count += 1;
        PushEffect::Incremented(conversation.unread_count)
    }

    /// Zero the counter of a conversation that became active
    pub fn mark_read(&mut self, id: ConversationId) -> bool {
        match self.conversations.get_mut(&id) {
            Some(conversation) => {
                conversation.unread_count = 0;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ConversationId) -> Option<Conversation> {
        let removed = self.conversations.remove(&id);
        if removed.is_some() {
            self.order.retain(|known| *known != id);
            debug!("Evicted conversation {}", id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ListingRef, Party};

    fn conversation(id: ConversationId, unread: u32) -> Conversation {
        Conversation {
            id,
            listing: ListingRef {
                id: id * 10,
                name: format!("Listing {}", id),
            },
            seller: Party {
                id: 1,
                display_name: "Sam".to_string(),
            },
            buyer: Party {
                id: 2,
                display_name: "Bea".to_string(),
            },
            price: "20.00".to_string(),
            unread_count: unread,
        }
    }

    fn message(conversation_id: ConversationId) -> Message {
        Message {
            id: 1,
            sender: Party {
                id: 2,
                display_name: "Bea".to_string(),
            },
            message: "hi".to_string(),
            created: None,
            conversation_id,
        }
    }

    #[test]
    fn test_snapshot_is_ground_truth() {
        let mut store = ConversationStore::new();
        store.merge_snapshot_page(vec![conversation(1, 4)], ActiveSelection::List);
        store.apply_push_update(&message(1), ActiveSelection::List);
        assert_eq!(store.get(1).unwrap().unread_count, 5);

        store.merge_snapshot_page(vec![conversation(1, 2)], ActiveSelection::List);
        assert_eq!(store.get(1).unwrap().unread_count, 2);
    }

    #[test]
    fn test_push_merge_preserves_unread() {
        let mut store = ConversationStore::new();
        store.merge_snapshot_page(vec![conversation(1, 3)], ActiveSelection::List);
        let mut updated = conversation(1, 0);
        updated.price = "25.00".to_string();
        store.merge_push(updated, ActiveSelection::List);
        let known = store.get(1).unwrap();
        assert_eq!(known.unread_count, 3);
        assert_eq!(known.price, "25.00");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_active_conversation_is_pinned() {
        let mut store = ConversationStore::new();
        let active = ActiveSelection::Conversation(1);
        store.merge_snapshot_page(vec![conversation(1, 3), conversation(2, 0)], active);
        assert_eq!(store.get(1).unwrap().unread_count, 0);

        assert_eq!(store.apply_push_update(&message(1), active), PushEffect::PinnedActive);
        assert_eq!(store.apply_push_update(&message(2), active), PushEffect::Incremented(1));
        assert_eq!(store.apply_push_update(&message(3), active), PushEffect::Unknown);
    }

    #[test]
    fn test_order_and_remove() {
        let mut store = ConversationStore::new();
        store.merge_snapshot_page(
            vec![conversation(3, 0), conversation(1, 0), conversation(2, 0)],
            ActiveSelection::List,
        );
        store.merge_push(conversation(9, 0), ActiveSelection::List);
        let ids: Vec<_> = store.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 2, 9]);

        assert!(store.remove(1).is_some());
        assert!(store.remove(1).is_none());
        let ids: Vec<_> = store.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 2, 9]);
    }
}
