/// Maps navigation fragments onto `{List, Conversation(id)}`
use crate::model::{ActiveSelection, ConversationId};
use crate::store::ConversationStore;
use tracing::debug;

const LIST_FRAGMENT: &str = "list";
const CONVERSATION_FRAGMENT: &str = "conversation";

/// Parsed navigation target. Anything unrecognised means the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    List,
    Conversation(ConversationId),
}

impl Fragment {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('#').unwrap_or(raw);
        if raw == LIST_FRAGMENT {
            return Fragment::List;
        }
        raw.strip_prefix(CONVERSATION_FRAGMENT)
            .and_then(|id| id.parse::<ConversationId>().ok())
            .map(Fragment::Conversation)
            .unwrap_or(Fragment::List)
    }

    pub fn to_hash(&self) -> String {
        match self {
            Fragment::List => format!("#{}", LIST_FRAGMENT),
            Fragment::Conversation(id) => format!("#{}{}", CONVERSATION_FRAGMENT, id),
        }
    }
}

/// What a navigation requires of the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Show the list; `left` is the conversation whose highlight must clear
    ShowList { left: Option<ConversationId> },
    /// Enter a conversation. `fresh` means its history must be reset and
    /// page 1 fetched; otherwise only rescroll.
    Enter { id: ConversationId, fresh: bool },
    /// Requested conversation is unknown; coerced back to the list
    Coerced {
        requested: ConversationId,
        left: Option<ConversationId>,
    },
}

#[derive(Debug, Default)]
pub struct ViewRouter {
    selection: ActiveSelection,
    /// Conversation whose history is currently in the rendered list. Survives
    /// a trip through the list so re-entering does not re-fetch.
    loaded: Option<ConversationId>,
}

impl ViewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> ActiveSelection {
        self.selection
    }

    pub fn loaded(&self) -> Option<ConversationId> {
        self.loaded
    }

    pub fn is_active(&self, id: ConversationId) -> bool {
        self.selection.is_conversation(id)
    }

    fn active_id(&self) -> Option<ConversationId> {
        match self.selection {
            ActiveSelection::Conversation(id) => Some(id),
            ActiveSelection::List => None,
        }
    }

    pub fn navigate(&mut self, fragment: &str, store: &ConversationStore) -> Transition {
        self.apply(Fragment::parse(fragment), store)
    }

    pub fn apply(&mut self, fragment: Fragment, store: &ConversationStore) -> Transition {
        let left = self.active_id();
        match fragment {
            Fragment::List => {
                self.selection = ActiveSelection::List;
                Transition::ShowList { left }
            }
            Fragment::Conversation(id) if !store.contains(id) => {
                debug!("Unknown conversation {}; showing list", id);
                self.selection = ActiveSelection::List;
                Transition::Coerced { requested: id, left }
            }
            Fragment::Conversation(id) => {
                self.selection = ActiveSelection::Conversation(id);
                let fresh = self.loaded != Some(id);
                self.loaded = Some(id);
                Transition::Enter { id, fresh }
            }
        }
    }

    /// A conversation disappeared from the store. Returns true if the view was
    /// forced back to the list.
    pub fn forget(&mut self, id: ConversationId) -> bool {
        if self.loaded == Some(id) {
            self.loaded = None;
        }
        if self.selection.is_conversation(id) {
            self.selection = ActiveSelection::List;
            return true;
        }
        false
    }
}
