/// Snapshot request/response facility.
///
/// Requests are submitted without blocking; each one runs in its own task and
/// its completion comes back to the session loop as a `SnapshotReply`.
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::model::{
    Conversation, ConversationId, Message, MessageId, NotificationCounts, NotificationRecord, Offer,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Terminal actions on an accepted offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Delete,
    Finalize,
}

impl OfferAction {
    fn path(&self) -> &'static str {
        match self {
            OfferAction::Delete => "delete",
            OfferAction::Finalize => "finalize",
        }
    }
}

impl fmt::Display for OfferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRequest {
    Conversations {
        page: u32,
        page_size: usize,
    },
    Messages {
        conversation_id: ConversationId,
        page: u32,
        page_size: usize,
    },
    Notifications {
        page: u32,
        page_size: usize,
    },
    Counts,
    SendMessage {
        conversation_id: ConversationId,
        text: String,
    },
    MarkMessageRead {
        message_id: MessageId,
    },
    CloseOffer {
        conversation_id: ConversationId,
        action: OfferAction,
    },
}

/// Completion of a `SnapshotRequest`, carrying enough of the request to be
/// matched against current state
#[derive(Debug)]
pub enum SnapshotReply {
    Conversations {
        page: u32,
        result: Result<Vec<Conversation>>,
    },
    Messages {
        conversation_id: ConversationId,
        page: u32,
        result: Result<Vec<Message>>,
    },
    Notifications {
        page: u32,
        result: Result<Vec<NotificationRecord>>,
    },
    Counts(Result<NotificationCounts>),
    MessageSent {
        conversation_id: ConversationId,
        text: String,
        result: Result<()>,
    },
    MessageRead {
        message_id: MessageId,
        result: Result<()>,
    },
    OfferClosed {
        conversation_id: ConversationId,
        action: OfferAction,
        result: Result<()>,
    },
}

pub trait SnapshotRequests {
    fn submit(&mut self, request: SnapshotRequest);
}

#[derive(Deserialize)]
struct ConversationListBody {
    #[serde(default)]
    offers: Option<Vec<Offer>>,
    #[serde(default)]
    has_error: bool,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct MessagesBody {
    #[serde(default)]
    messages: Option<Vec<Message>>,
    #[serde(default)]
    has_error: bool,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct NotificationsBody {
    #[serde(default)]
    notifications: Option<Vec<NotificationRecord>>,
}

#[derive(Deserialize)]
struct OutcomeBody {
    #[serde(default)]
    successful: bool,
    #[serde(default)]
    has_error: bool,
    #[serde(default)]
    error: String,
}

fn server_error(has_error: bool, error: String) -> Result<()> {
    if has_error {
        Err(SyncError::Snapshot(if error.is_empty() {
            "server reported an error".to_string()
        } else {
            error
        }))
    } else {
        Ok(())
    }
}

#[derive(Clone)]
struct Endpoint {
    http: reqwest::Client,
    base_url: String,
    cookie: Option<String>,
    csrf: Option<String>,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.get(self.url(path));
        match &self.cookie {
            Some(cookie) => builder.header(reqwest::header::COOKIE, cookie.as_str()),
            None => builder,
        }
    }

    fn csrf_query(&self) -> Vec<(&'static str, String)> {
        self.csrf
            .iter()
            .map(|token| ("csrfToken", token.clone()))
            .collect()
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn conversations(&self, page: u32, page_size: usize) -> Result<Vec<Conversation>> {
        let body: ConversationListBody = self
            .fetch(
                self.get("/webapi/conversation/list/")
                    .query(&[("page", page.to_string()), ("page_size", page_size.to_string())]),
            )
            .await?;
        server_error(body.has_error, body.error)?;
        Ok(body
            .offers
            .unwrap_or_default()
            .into_iter()
            .map(Conversation::from)
            .collect())
    }

    async fn messages(&self, conversation_id: ConversationId, page: u32) -> Result<Vec<Message>> {
        let body: MessagesBody = self
            .fetch(self.get(&format!("/webapi/messages/{}/{}", conversation_id, page)))
            .await?;
        server_error(body.has_error, body.error)?;
        Ok(body.messages.unwrap_or_default())
    }

    async fn notifications(&self, page: u32) -> Result<Vec<NotificationRecord>> {
        let body: NotificationsBody = self
            .fetch(self.get(&format!("/webapi/notifications/{}", page)))
            .await?;
        Ok(body.notifications.unwrap_or_default())
    }

    async fn counts(&self) -> Result<NotificationCounts> {
        self.fetch(self.get("/webapi/notification/counts/")).await
    }

    async fn send_message(&self, conversation_id: ConversationId, text: &str) -> Result<()> {
        let mut query = self.csrf_query();
        query.push(("message", text.to_string()));
        let body: OutcomeBody = self
            .fetch(
                self.get(&format!("/webapi/message/send/{}", conversation_id))
                    .query(&query),
            )
            .await?;
        server_error(body.has_error, body.error)
    }

    async fn mark_read(&self, message_id: MessageId) -> Result<()> {
        self.get(&format!("/message/read/{}", message_id))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn close_offer(&self, conversation_id: ConversationId, action: OfferAction) -> Result<()> {
        let body: OutcomeBody = self
            .fetch(
                self.get(&format!("/webapi/offer/{}/{}", action.path(), conversation_id))
                    .query(&self.csrf_query()),
            )
            .await?;
        if body.successful {
            Ok(())
        } else {
            Err(SyncError::Snapshot(format!(
                "offer {} {} refused: {}",
                conversation_id, action, body.error
            )))
        }
    }

    async fn execute(&self, request: SnapshotRequest) -> SnapshotReply {
        match request {
            SnapshotRequest::Conversations { page, page_size } => SnapshotReply::Conversations {
                page,
                result: self.conversations(page, page_size).await,
            },
            SnapshotRequest::Messages {
                conversation_id,
                page,
                ..
            } => SnapshotReply::Messages {
                conversation_id,
                page,
                result: self.messages(conversation_id, page).await,
            },
            SnapshotRequest::Notifications { page, .. } => SnapshotReply::Notifications {
                page,
                result: self.notifications(page).await,
            },
            SnapshotRequest::Counts => SnapshotReply::Counts(self.counts().await),
            SnapshotRequest::SendMessage {
                conversation_id,
                text,
            } => {
                let result = self.send_message(conversation_id, &text).await;
                SnapshotReply::MessageSent {
                    conversation_id,
                    text,
                    result,
                }
            }
            SnapshotRequest::MarkMessageRead { message_id } => SnapshotReply::MessageRead {
                message_id,
                result: self.mark_read(message_id).await,
            },
            SnapshotRequest::CloseOffer {
                conversation_id,
                action,
            } => SnapshotReply::OfferClosed {
                conversation_id,
                action,
                result: self.close_offer(conversation_id, action).await,
            },
        }
    }
}

/// reqwest-backed snapshot client for the marketplace web API
pub struct HttpSnapshotClient {
    endpoint: Endpoint,
    replies: mpsc::UnboundedSender<SnapshotReply>,
}

impl HttpSnapshotClient {
    pub fn new(config: &Config, replies: mpsc::UnboundedSender<SnapshotReply>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            endpoint: Endpoint {
                http,
                base_url: config.base_url.clone(),
                cookie: config.session_cookie.clone(),
                csrf: config.csrf_token.clone(),
            },
            replies,
        })
    }
}

impl SnapshotRequests for HttpSnapshotClient {
    fn submit(&mut self, request: SnapshotRequest) {
        debug!("Snapshot request {:?}", request);
        let endpoint = self.endpoint.clone();
        let replies = self.replies.clone();
        tokio::spawn(async move {
            let reply = endpoint.execute(request).await;
            if replies.send(reply).is_err() {
                warn!("Snapshot reply dropped: session ended");
            }
        });
    }
}
