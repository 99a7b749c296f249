/// Message-view page context: the conversation sidebar, the history of the
/// displayed conversation and the navigation state between them.
use crate::api::{OfferAction, SnapshotRequest, SnapshotRequests};
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    ActiveSelection, Conversation, ConversationId, Message, MessageId, Notification,
    NotificationEvent, UserId,
};
use crate::pager::{PageOutcome, PageRequest, Pager};
use crate::sinks::{PagedList, RenderOp, RenderSink};
use crate::store::{ConversationStore, PushEffect};
use crate::view::{Transition, ViewRouter};
use std::collections::HashSet;
use tracing::{debug, info};

pub const FIRST_CONVERSATION_PAGE: u32 = 1;
pub const FIRST_HISTORY_PAGE: u32 = 1;

pub struct MessageView {
    current_user: UserId,
    store: ConversationStore,
    view: ViewRouter,
    list_pager: Pager<()>,
    history: Option<Pager<ConversationId>>,
    /// Ids already in the rendered history of the loaded conversation
    rendered: HashSet<MessageId>,
    list_loaded: bool,
    /// Navigation waiting for the first conversation page
    pending: Option<String>,
    message_page_size: usize,
}

impl MessageView {
    pub fn new(config: &Config) -> Self {
        Self {
            current_user: config.current_user_id,
            store: ConversationStore::new(),
            view: ViewRouter::new(),
            list_pager: Pager::new((), FIRST_CONVERSATION_PAGE, config.conversation_page_size),
            history: None,
            rendered: HashSet::new(),
            list_loaded: false,
            pending: config.initial_fragment.clone(),
            message_page_size: config.message_page_size,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn view(&self) -> &ViewRouter {
        &self.view
    }

    pub fn selection(&self) -> ActiveSelection {
        self.view.selection()
    }

    pub fn is_list_loaded(&self) -> bool {
        self.list_loaded
    }

    pub fn history_pager(&self) -> Option<&Pager<ConversationId>> {
        self.history.as_ref()
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        match self.view.selection() {
            ActiveSelection::Conversation(id) => Some(id),
            ActiveSelection::List => None,
        }
    }

    pub fn load_more_conversations(&mut self, requests: &mut dyn SnapshotRequests) -> bool {
        match self.list_pager.next_page() {
            Some(PageRequest {
                page, page_size, ..
            }) => {
                requests.submit(SnapshotRequest::Conversations { page, page_size });
                true
            }
            None => false,
        }
    }

    pub fn load_older_messages(&mut self, requests: &mut dyn SnapshotRequests) -> bool {
        let Some(request) = self.history.as_mut().and_then(|pager| pager.next_page()) else {
            return false;
        };
        requests.submit(SnapshotRequest::Messages {
            conversation_id: request.key,
            page: request.page,
            page_size: request.page_size,
        });
        true
    }

    pub fn navigate(
        &mut self,
        fragment: &str,
        render: &mut dyn RenderSink,
        requests: &mut dyn SnapshotRequests,
    ) {
        if !self.list_loaded {
            debug!("Deferring navigation to {:?} until conversations load", fragment);
            self.pending = Some(fragment.to_string());
            return;
        }
        let transition = self.view.navigate(fragment, &self.store);
        self.apply(transition, render, requests);
    }

    fn apply(
        &mut self,
        transition: Transition,
        render: &mut dyn RenderSink,
        requests: &mut dyn SnapshotRequests,
    ) {
        match transition {
            Transition::Enter { id, fresh } => {
                self.store.mark_read(id);
                let Some(conversation) = self.store.get(id) else {
                    return;
                };
                render.render(RenderOp::UpsertConversation(conversation.clone()));
                render.render(RenderOp::Highlight(Some(id)));
                render.render(RenderOp::ShowConversation {
                    id,
                    title: conversation.listing.name.clone(),
                    role: conversation.role_of(self.current_user),
                });
                if fresh {
                    self.rendered.clear();
                    render.render(RenderOp::ResetHistory);
                    self.history = Some(Pager::new(id, FIRST_HISTORY_PAGE, self.message_page_size));
                    self.load_older_messages(requests);
                } else {
                    render.render(RenderOp::ScrollToBottom);
                }
            }
            Transition::ShowList { left } | Transition::Coerced { left, .. } => {
                if left.is_some() {
                    render.render(RenderOp::Highlight(None));
                }
                render.render(RenderOp::ShowList);
            }
        }
    }

    pub fn on_conversations_page(
        &mut self,
        page: u32,
        result: Result<Vec<Conversation>>,
        render: &mut dyn RenderSink,
        requests: &mut dyn SnapshotRequests,
    ) -> Result<()> {
        let conversations = match result {
            Ok(conversations) => conversations,
            Err(e) => {
                self.list_pager.fail(page);
                return Err(e);
            }
        };
        let outcome = self.list_pager.complete(page, conversations.len());
        if outcome == PageOutcome::Stale {
            debug!("Ignoring stale conversation page {}", page);
            return Ok(());
        }

        let ids: Vec<ConversationId> = conversations.iter().map(|c| c.id).collect();
        self.store.merge_snapshot_page(conversations, self.view.selection());
        for id in ids {
            if let Some(conversation) = self.store.get(id) {
                render.render(RenderOp::UpsertConversation(conversation.clone()));
            }
        }
        if outcome == PageOutcome::Final {
            render.render(RenderOp::RemoveLoadMore(PagedList::Conversations));
        }
        if self.store.is_empty() {
            render.render(RenderOp::ConversationListEmpty);
        }

        if !self.list_loaded {
            self.list_loaded = true;
            info!("Loaded {} conversations", self.store.len());
            let fragment = self.pending.take().unwrap_or_default();
            self.navigate(&fragment, render, requests);
        }
        Ok(())
    }

    pub fn on_messages_page(
        &mut self,
        conversation_id: ConversationId,
        page: u32,
        result: Result<Vec<Message>>,
        render: &mut dyn RenderSink,
    ) -> Result<()> {
        let Some(pager) = self
            .history
            .as_mut()
            .filter(|pager| *pager.key() == conversation_id)
        else {
            debug!("Ignoring history page for unloaded conversation {}", conversation_id);
            return Ok(());
        };
        let mut messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                pager.fail(page);
                return Err(e);
            }
        };
        let outcome = pager.complete(page, messages.len());
        if outcome == PageOutcome::Stale {
            return Ok(());
        }

        messages.retain(|m| !self.rendered.contains(&m.id));
        messages.sort_by_key(|m| (m.created, m.id));
        self.rendered.extend(messages.iter().map(|m| m.id));
        if !messages.is_empty() {
            render.render(RenderOp::PrependHistory(messages));
        }
        if page == FIRST_HISTORY_PAGE {
            render.render(RenderOp::HideHistoryLoading);
            render.render(RenderOp::ScrollToBottom);
        }
        if outcome == PageOutcome::Final {
            render.render(RenderOp::RemoveLoadMore(PagedList::History));
        }
        Ok(())
    }

    pub fn knows_conversation(&self, id: ConversationId) -> bool {
        self.store.contains(id)
    }

    /// Page-context handler. Returns true when the event was spliced into the
    /// rendered history.
    pub fn deliver(
        &mut self,
        event: &NotificationEvent,
        own_echo: bool,
        render: &mut dyn RenderSink,
        requests: &mut dyn SnapshotRequests,
    ) -> bool {
        match &event.notification {
            Notification::NewMessage(message) => {
                let handled = self.splice(message, render);
                if own_echo {
                    return handled;
                }
                match self.store.apply_push_update(message, self.view.selection()) {
                    PushEffect::PinnedActive => requests.submit(SnapshotRequest::MarkMessageRead {
                        message_id: message.id,
                    }),
                    PushEffect::Incremented(_) => {
                        if let Some(conversation) = self.store.get(message.conversation_id) {
                            render.render(RenderOp::UpsertConversation(conversation.clone()));
                        }
                    }
                    PushEffect::Unknown => {}
                }
                handled
            }
            Notification::OfferAccepted(offer) => {
                self.store
                    .merge_push(Conversation::from(offer.clone()), self.view.selection());
                if let Some(conversation) = self.store.get(offer.id) {
                    render.render(RenderOp::UpsertConversation(conversation.clone()));
                }
                false
            }
            Notification::OfferUpdated(offer) | Notification::OfferCountered(offer) => {
                // Offers that never became conversations are not listed
                if self.store.contains(offer.id) {
                    self.store
                        .merge_push(Conversation::from(offer.clone()), self.view.selection());
                    if let Some(conversation) = self.store.get(offer.id) {
                        render.render(RenderOp::UpsertConversation(conversation.clone()));
                    }
                }
                false
            }
            Notification::OfferRevoked(offer) | Notification::OfferRejected(offer) => {
                self.remove(offer.id, render);
                false
            }
            Notification::NewOffer(_) => false,
        }
    }

    /// Append to the displayed history. A message for a conversation whose
    /// history is kept but not displayed invalidates that history instead, so
    /// re-entry refetches page 1 rather than splicing into a hidden list.
    fn splice(&mut self, message: &Message, render: &mut dyn RenderSink) -> bool {
        let id = message.conversation_id;
        if self.view.loaded() != Some(id) {
            return false;
        }
        if !self.view.is_active(id) {
            self.view.forget(id);
            self.history = None;
            return false;
        }
        if self.rendered.insert(message.id) {
            render.render(RenderOp::AppendMessage(message.clone()));
        }
        render.render(RenderOp::ScrollToBottom);
        true
    }

    pub fn remove(&mut self, id: ConversationId, render: &mut dyn RenderSink) {
        if self.store.remove(id).is_none() {
            return;
        }
        if self.history.as_ref().is_some_and(|pager| *pager.key() == id) {
            self.history = None;
            self.rendered.clear();
        }
        render.render(RenderOp::RemoveConversation(id));
        if self.view.forget(id) {
            render.render(RenderOp::Highlight(None));
            render.render(RenderOp::ShowList);
        }
        if self.store.is_empty() {
            render.render(RenderOp::ConversationListEmpty);
        }
    }

    /// Queue a send for the active conversation. Returns false when nothing
    /// was sent.
    pub fn send_message(&mut self, text: &str, requests: &mut dyn SnapshotRequests) -> bool {
        let text = text.trim();
        let Some(conversation_id) = self.active_id() else {
            return false;
        };
        if text.is_empty() {
            return false;
        }
        requests.submit(SnapshotRequest::SendMessage {
            conversation_id,
            text: text.to_string(),
        });
        true
    }

    /// Submit a confirmed delete or finalize. Returns false if the
    /// conversation is gone by the time the answer arrives.
    pub fn close_offer(
        &mut self,
        conversation_id: ConversationId,
        action: OfferAction,
        requests: &mut dyn SnapshotRequests,
    ) -> bool {
        if !self.store.contains(conversation_id) {
            return false;
        }
        requests.submit(SnapshotRequest::CloseOffer {
            conversation_id,
            action,
        });
        true
    }
}
