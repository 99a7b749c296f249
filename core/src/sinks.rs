/// Outbound collaborators: the render sink, the alert (toast) sink and the
/// modal prompt. The engine only describes what to show; these decide how.
use crate::ack::Badges;
use crate::model::{Conversation, ConversationId, Message, Role};
use crate::tray::TrayEntry;
use colored::*;
use tracing::{debug, info};

/// Which paged list a load-more control belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagedList {
    Conversations,
    History,
    Notifications,
}

/// One instruction for the rendering layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    ShowList,
    ShowConversation {
        id: ConversationId,
        title: String,
        role: Role,
    },
    /// Sidebar highlight; `None` clears every highlight
    Highlight(Option<ConversationId>),
    /// Empty the rendered history and show a loading placeholder
    ResetHistory,
    HideHistoryLoading,
    /// Older messages, oldest first, placed above what is rendered
    PrependHistory(Vec<Message>),
    /// Splice a message at the bottom of the rendered history
    AppendMessage(Message),
    ScrollToBottom,
    UpsertConversation(Conversation),
    RemoveConversation(ConversationId),
    ConversationListEmpty,
    RemoveLoadMore(PagedList),
    Badges(Badges),
    TrayOpen(bool),
    TrayInsert { entry: TrayEntry, at_front: bool },
    TrayMarkedRead,
    TrayEmpty,
}

pub trait RenderSink {
    fn render(&mut self, op: RenderOp);
}

/// Rendered `{title, content, link}` of a notification or notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub content: String,
    pub link: Option<String>,
}

/// Transient, auto-dismissing alerts
pub trait AlertSink {
    fn toast(&mut self, alert: Alert);
}

/// Blocking modal with explicit acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub content: String,
    pub buttons: Vec<String>,
}

impl Dialog {
    /// Single-button acknowledgment dialog
    pub fn notice(title: impl Into<String>, content: impl Into<String>, button: &str) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            buttons: vec![button.to_string()],
        }
    }

    /// Yes/No question; the answer comes back as `Input::Confirm`
    pub fn confirm(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            buttons: vec!["Yes".to_string(), "No".to_string()],
        }
    }
}

pub trait UserPrompt {
    fn show(&mut self, dialog: Dialog);
}

/// Console implementation of all three sinks for the headless client
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink;

impl RenderSink for ConsoleSink {
    fn render(&mut self, op: RenderOp) {
        match op {
            RenderOp::ShowConversation { id, title, role } => {
                println!("{} {} ({:?}) #{}", "▶".cyan(), title.bright_white().bold(), role, id);
            }
            RenderOp::PrependHistory(messages) => {
                for m in messages {
                    print_message(&m);
                }
            }
            RenderOp::AppendMessage(m) => print_message(&m),
            RenderOp::UpsertConversation(c) => {
                let unread = if c.unread_count > 0 {
                    format!(" [{} unread]", c.unread_count).yellow().to_string()
                } else {
                    String::new()
                };
                println!("  {} {} ${}{}", format!("#{}", c.id).dimmed(), c.listing.name, c.price, unread);
            }
            RenderOp::Badges(b) => {
                println!(
                    "{} notifications: {}  messages: {}",
                    "●".magenta(),
                    b.notifications,
                    b.messages
                );
            }
            RenderOp::TrayInsert { entry, .. } => {
                let marker = if entry.read { " " } else { "*" };
                println!("{} {} {}: {}", "≡".blue(), marker, entry.title.bold(), entry.content);
            }
            RenderOp::ConversationListEmpty => println!("{}", "No conversations to display.".dimmed()),
            RenderOp::TrayEmpty => println!("{}", "You have no notifications.".dimmed()),
            other => debug!("render {:?}", other),
        }
    }
}

fn print_message(m: &Message) {
    let when = m
        .created
        .map(|t| t.format("%m/%d/%Y %H:%M").to_string())
        .unwrap_or_default();
    println!(
        "  {} {} {}",
        m.sender.display_name.green().bold(),
        when.dimmed(),
        m.message
    );
}

impl AlertSink for ConsoleSink {
    fn toast(&mut self, alert: Alert) {
        info!("toast: {}", alert.title);
        match alert.link {
            Some(link) => println!("{} {} {}", "⚡".yellow(), alert.content, link.dimmed()),
            None => println!("{} {}", "⚡".yellow(), alert.content),
        }
    }
}

impl UserPrompt for ConsoleSink {
    fn show(&mut self, dialog: Dialog) {
        println!("{} {}", "✗".red().bold(), dialog.title.red().bold());
        println!("  {}", dialog.content);
        println!("  [{}]", dialog.buttons.join("] ["));
    }
}
