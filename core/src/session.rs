/// Session: the single state object owning the store, the acknowledgment
/// state and the tray. Every reaction runs to completion on one task, so
/// nothing here is locked.
use crate::ack::{AckProtocol, AckSink, Badges};
use crate::api::{OfferAction, SnapshotReply, SnapshotRequest, SnapshotRequests};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::message_view::MessageView;
use crate::model::{
    ActiveSelection, Conversation, ConversationId, Notification, NotificationEvent, NotificationId,
    NotificationRecord,
};
use crate::pager::PageOutcome;
use crate::router::{NotificationRouter, RouteOutcome, RouteTarget, Surface};
use crate::sinks::{Alert, AlertSink, Dialog, PagedList, RenderOp, RenderSink, UserPrompt};
use crate::transport::ChannelEvent;
use crate::tray::{Tray, TrayEntry, FIRST_TRAY_PAGE};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Which page the session is embedded in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageContext {
    MessageView,
    Elsewhere,
}

impl PageContext {
    pub fn from_config(config: &Config) -> Self {
        if config.message_view {
            PageContext::MessageView
        } else {
            PageContext::Elsewhere
        }
    }
}

/// Everything the session reacts to
#[derive(Debug)]
pub enum Input {
    Channel(ChannelEvent),
    Snapshot(SnapshotReply),
    Navigate(String),
    OpenTray,
    CloseTray,
    ToggleTray,
    LoadMoreConversations,
    LoadOlderMessages,
    LoadMoreNotifications,
    SendMessage(String),
    DeleteOffer,
    FinalizeOffer,
    /// Answer to the pending delete/finalize confirmation
    Confirm(bool),
}

pub struct Collaborators {
    pub render: Box<dyn RenderSink>,
    pub alerts: Box<dyn AlertSink>,
    pub prompt: Box<dyn UserPrompt>,
    pub requests: Box<dyn SnapshotRequests>,
    pub acks: Box<dyn AckSink>,
}

pub struct Session {
    id: Uuid,
    router: NotificationRouter,
    message_view: Option<MessageView>,
    ack: AckProtocol,
    tray: Tray,
    /// Notification ids already routed or listed in the tray
    seen: HashSet<NotificationId>,
    /// Delete/finalize awaiting the user's answer
    pending_close: Option<(ConversationId, OfferAction)>,
    capability_warned: bool,
    render: Box<dyn RenderSink>,
    alerts: Box<dyn AlertSink>,
    prompt: Box<dyn UserPrompt>,
    requests: Box<dyn SnapshotRequests>,
    acks: Box<dyn AckSink>,
}

impl Session {
    pub fn new(config: &Config, context: PageContext, collaborators: Collaborators) -> Self {
        let message_view = match context {
            PageContext::MessageView => Some(MessageView::new(config)),
            PageContext::Elsewhere => None,
        };
        let session = Self {
            id: Uuid::new_v4(),
            router: NotificationRouter::new(config.current_user_id),
            message_view,
            ack: AckProtocol::new(),
            tray: Tray::new(config.notification_page_size),
            seen: HashSet::new(),
            pending_close: None,
            capability_warned: false,
            render: collaborators.render,
            alerts: collaborators.alerts,
            prompt: collaborators.prompt,
            requests: collaborators.requests,
            acks: collaborators.acks,
        };
        info!("Session {} created ({:?})", session.id, context);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn badges(&self) -> Badges {
        self.ack.badges()
    }

    pub fn newest_notification_id(&self) -> NotificationId {
        self.ack.newest()
    }

    pub fn is_tray_open(&self) -> bool {
        self.ack.is_tray_open()
    }

    pub fn tray(&self) -> &Tray {
        &self.tray
    }

    pub fn message_view(&self) -> Option<&MessageView> {
        self.message_view.as_ref()
    }

    pub fn selection(&self) -> ActiveSelection {
        self.message_view
            .as_ref()
            .map(|mv| mv.selection())
            .unwrap_or_default()
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.message_view.as_ref().and_then(|mv| mv.store().get(id))
    }

    /// Issue the initial snapshot loads
    pub fn start(&mut self) {
        self.load_more_notifications();
        self.requests.submit(SnapshotRequest::Counts);
        if let Some(mv) = self.message_view.as_mut() {
            mv.load_more_conversations(self.requests.as_mut());
        }
    }

    pub fn handle(&mut self, input: Input) {
        match input {
            Input::Channel(event) => self.on_channel(event),
            Input::Snapshot(reply) => self.on_snapshot(reply),
            Input::Navigate(fragment) => match self.message_view.as_mut() {
                Some(mv) => mv.navigate(&fragment, self.render.as_mut(), self.requests.as_mut()),
                None => debug!("Navigation to {} outside the message view", fragment),
            },
            Input::OpenTray => self.open_tray(),
            Input::CloseTray => self.close_tray(),
            Input::ToggleTray => {
                if self.ack.is_tray_open() {
                    self.close_tray()
                } else {
                    self.open_tray()
                }
            }
            Input::LoadMoreConversations => {
                if let Some(mv) = self.message_view.as_mut() {
                    mv.load_more_conversations(self.requests.as_mut());
                }
            }
            Input::LoadOlderMessages => {
                if let Some(mv) = self.message_view.as_mut() {
                    mv.load_older_messages(self.requests.as_mut());
                }
            }
            Input::LoadMoreNotifications => self.load_more_notifications(),
            Input::SendMessage(text) => {
                if let Some(mv) = self.message_view.as_mut() {
                    mv.send_message(&text, self.requests.as_mut());
                }
            }
            Input::DeleteOffer => self.close_offer(OfferAction::Delete),
            Input::FinalizeOffer => self.close_offer(OfferAction::Finalize),
            Input::Confirm(confirmed) => self.confirm_close(confirmed),
        }
    }

    /// Drive the session until the input stream ends
    pub async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<Input>,
        mut channel: mpsc::UnboundedReceiver<ChannelEvent>,
        mut replies: mpsc::UnboundedReceiver<SnapshotReply>,
    ) {
        self.start();
        let mut streaming = true;
        let mut replying = true;
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
                event = channel.recv(), if streaming => match event {
                    Some(event) => self.on_channel(event),
                    None => {
                        debug!("Channel event stream ended");
                        streaming = false;
                    }
                },
                reply = replies.recv(), if replying => match reply {
                    Some(reply) => self.on_snapshot(reply),
                    None => replying = false,
                },
            }
        }
        info!("Session {} ended", self.id);
    }

    fn on_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => info!("Session {} streaming", self.id),
            ChannelEvent::Notification(event) => {
                if self.seen.contains(&event.id) {
                    debug!("Notification {} already delivered", event.id);
                    return;
                }
                let router = self.router;
                let outcome = router.route(&event, self);
                if !matches!(outcome, RouteOutcome::Dropped(_)) {
                    self.seen.insert(event.id);
                }
                debug!("Notification {} -> {:?}", event.id, outcome);
            }
            ChannelEvent::Lost { retry_in } => {
                self.alerts.toast(Alert {
                    title: "Disconnected".to_string(),
                    content: format!(
                        "Lost connection to the notification server. Attempting to reconnect in {} seconds...",
                        retry_in.as_secs()
                    ),
                    link: None,
                });
            }
            ChannelEvent::Unsupported => {
                if !std::mem::replace(&mut self.capability_warned, true) {
                    self.prompt.show(Dialog::notice(
                        "Notifications Unavailable",
                        "Live notifications are not supported here. New messages and offers \
                         will appear when the page is reloaded.",
                        "OK",
                    ));
                }
            }
        }
    }

    fn fail(&mut self, title: &str, err: &SyncError) {
        error!("{}: {}", title, err);
        self.prompt.show(Dialog::notice(
            title,
            format!("{}. Please try again later.", err),
            "OK",
        ));
    }

    fn on_snapshot(&mut self, reply: SnapshotReply) {
        match reply {
            SnapshotReply::Conversations { page, result } => {
                let outcome = match self.message_view.as_mut() {
                    Some(mv) => mv.on_conversations_page(
                        page,
                        result,
                        self.render.as_mut(),
                        self.requests.as_mut(),
                    ),
                    None => Ok(()),
                };
                if let Err(e) = outcome {
                    self.fail("Failed to Load Conversations", &e);
                }
            }
            SnapshotReply::Messages {
                conversation_id,
                page,
                result,
            } => {
                let outcome = match self.message_view.as_mut() {
                    Some(mv) => mv.on_messages_page(conversation_id, page, result, self.render.as_mut()),
                    None => Ok(()),
                };
                if let Err(e) = outcome {
                    self.fail("Failed to Load Messages", &e);
                }
            }
            SnapshotReply::Notifications { page, result } => {
                if let Err(e) = self.on_notifications_page(page, result) {
                    self.fail("Failed to Load Notifications", &e);
                }
            }
            SnapshotReply::Counts(Ok(counts)) => {
                self.ack.seed(Badges {
                    notifications: counts.notification_count,
                    messages: counts.message_count,
                });
                self.render.render(RenderOp::Badges(self.ack.badges()));
            }
            SnapshotReply::Counts(Err(e)) => warn!("Notification counts unavailable: {}", e),
            SnapshotReply::MessageSent {
                conversation_id,
                text,
                result,
            } => match result {
                Ok(()) => debug!("Message sent to conversation {}", conversation_id),
                Err(e) => {
                    warn!("Send to conversation {} failed: {}", conversation_id, e);
                    self.prompt.show(Dialog::notice(
                        "Failed to Send",
                        format!(
                            "Your message, \"{}\" failed to send. It is possible that this is because \
                             you are not connected to the internet, or because this offer has already \
                             been deleted.",
                            text
                        ),
                        "Got It",
                    ));
                }
            },
            SnapshotReply::MessageRead { message_id, result } => {
                if let Err(e) = result {
                    debug!("Mark-read for message {} failed: {}", message_id, e);
                }
            }
            SnapshotReply::OfferClosed {
                conversation_id,
                action,
                result,
            } => match result {
                Ok(()) => {
                    info!("Offer {} closed ({})", conversation_id, action);
                    if let Some(mv) = self.message_view.as_mut() {
                        mv.remove(conversation_id, self.render.as_mut());
                    }
                }
                Err(e) => {
                    warn!("Closing offer {} failed: {}", conversation_id, e);
                    let (title, content) = match action {
                        OfferAction::Delete => (
                            "Failed To Delete Offer",
                            "The offer could not be deleted due to an unexpected error. Please try again later.",
                        ),
                        OfferAction::Finalize => (
                            "Failed To Finalize Transaction",
                            "The transaction could not be finalized due to an unexpected error. Please try again later.",
                        ),
                    };
                    self.prompt.show(Dialog::notice(title, content, "OK"));
                }
            },
        }
    }

    fn on_notifications_page(
        &mut self,
        page: u32,
        result: Result<Vec<NotificationRecord>>,
    ) -> Result<()> {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                self.tray.pager_mut().fail(page);
                return Err(e);
            }
        };
        let outcome = self.tray.pager_mut().complete(page, records.len());
        if outcome == PageOutcome::Stale {
            return Ok(());
        }
        for record in records {
            match record.decode() {
                Ok(event) => {
                    self.ack.observe(event.id);
                    if !self.seen.insert(event.id) {
                        continue;
                    }
                    let alert = self.router.render(&event.notification, Surface::Tray);
                    let entry = TrayEntry::new(&event, alert, false);
                    self.tray.push_back(entry.clone());
                    self.render.render(RenderOp::TrayInsert {
                        entry,
                        at_front: false,
                    });
                }
                Err(e) => warn!("Skipping tray record: {}", e),
            }
        }
        if page == FIRST_TRAY_PAGE && self.tray.is_empty() {
            self.render.render(RenderOp::TrayEmpty);
        }
        if outcome == PageOutcome::Final {
            self.render.render(RenderOp::RemoveLoadMore(PagedList::Notifications));
        }
        Ok(())
    }

    fn load_more_notifications(&mut self) {
        if let Some(request) = self.tray.next_page() {
            self.requests.submit(SnapshotRequest::Notifications {
                page: request.page,
                page_size: request.page_size,
            });
        }
    }

    fn open_tray(&mut self) {
        if self.ack.is_tray_open() {
            return;
        }
        if let Some(frame) = self.ack.open_tray() {
            info!("Tray opened; acknowledging up to {}", frame.id());
            self.acks.send_ack(frame);
        }
        self.render.render(RenderOp::TrayOpen(true));
        self.render.render(RenderOp::Badges(self.ack.badges()));
    }

    fn close_tray(&mut self) {
        if self.ack.close_tray() {
            self.tray.mark_all_read();
            self.render.render(RenderOp::TrayMarkedRead);
            self.render.render(RenderOp::TrayOpen(false));
        }
    }

    /// Ask before deleting or finalizing the active conversation
    fn close_offer(&mut self, action: OfferAction) {
        let Some(mv) = self.message_view.as_ref() else {
            debug!("Offer {} outside the message view", action);
            return;
        };
        let Some(conversation_id) = mv.active_id() else {
            debug!("No active conversation to {}", action);
            return;
        };
        let dialog = match action {
            OfferAction::Delete => Dialog::confirm(
                "Delete Offer",
                "Are you sure you would like to delete this offer? This action cannot be reversed.",
            ),
            OfferAction::Finalize => Dialog::confirm(
                "Finalize Transaction",
                "Are you sure you would like to finalize this transaction? This will delete any \
                 associated messages, mark your listing sold, and remove your listing from the \
                 marketplace. This action cannot be reversed.",
            ),
        };
        self.pending_close = Some((conversation_id, action));
        self.prompt.show(dialog);
    }

    fn confirm_close(&mut self, confirmed: bool) {
        let Some((conversation_id, action)) = self.pending_close.take() else {
            debug!("No pending confirmation");
            return;
        };
        if !confirmed {
            debug!("Cancelled {} of offer {}", action, conversation_id);
            return;
        }
        if let Some(mv) = self.message_view.as_mut() {
            if !mv.close_offer(conversation_id, action, self.requests.as_mut()) {
                debug!("Offer {} is gone; nothing to {}", conversation_id, action);
            }
        }
    }

    fn targets_active(&self, notification: &Notification) -> bool {
        self.message_view
            .as_ref()
            .is_some_and(|mv| mv.view().is_active(notification.conversation_id()))
    }
}

impl RouteTarget for Session {
    fn knows_conversation(&self, id: ConversationId) -> bool {
        self.message_view
            .as_ref()
            .map_or(true, |mv| mv.knows_conversation(id))
    }

    fn deliver_to_page(&mut self, event: &NotificationEvent, own_echo: bool) -> bool {
        match self.message_view.as_mut() {
            Some(mv) => mv.deliver(event, own_echo, self.render.as_mut(), self.requests.as_mut()),
            None => {
                if !own_echo && matches!(event.notification, Notification::NewMessage(_)) {
                    self.ack.bump_messages();
                }
                false
            }
        }
    }

    fn raise_toast(&mut self, alert: Alert) {
        self.alerts.toast(alert);
    }

    fn update_tray(&mut self, event: &NotificationEvent, entry: Alert) {
        let targets_active = self.targets_active(&event.notification);
        let ack = self.ack.on_event(event.id, targets_active);
        let acknowledged = ack.is_some();
        if let Some(frame) = ack {
            self.acks.send_ack(frame);
        }
        let entry = TrayEntry::new(event, entry, acknowledged);
        self.tray.push_front(entry.clone());
        self.render.render(RenderOp::TrayInsert {
            entry,
            at_front: true,
        });
        self.render.render(RenderOp::Badges(self.ack.badges()));
    }
}
