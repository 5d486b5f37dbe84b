//! Selection and responsive list/detail visibility.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ChatResult;
use crate::models::{Conversation, ConversationId};
use crate::store::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    // Single pane: list and detail take turns
    Narrow,
    #[default]
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneState {
    ListOnly,
    DetailOnly,
    ListAndDetail,
}

#[derive(Debug, Clone)]
pub struct ViewController {
    layout: Layout,
    selected_id: Option<ConversationId>,
    list_visible: bool,
}

impl ViewController {
    pub fn new(layout: Layout) -> Self {
        ViewController {
            layout,
            selected_id: None,
            list_visible: true,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn list_visible(&self) -> bool {
        self.list_visible
    }

    pub fn panes(&self) -> PaneState {
        match self.layout {
            Layout::Wide => PaneState::ListAndDetail,
            Layout::Narrow if self.selected_id.is_some() && !self.list_visible => {
                PaneState::DetailOnly
            }
            Layout::Narrow => PaneState::ListOnly,
        }
    }

    /// Open a conversation. The store reconciles read state; if it refuses,
    /// the controller stays as it was.
    pub fn select_conversation<'s>(
        &mut self,
        store: &'s mut ConversationStore,
        conversation_id: &str,
    ) -> ChatResult<&'s Conversation> {
        let convo = store.select(conversation_id)?;
        self.selected_id = Some(conversation_id.to_string());
        if self.layout == Layout::Narrow {
            self.list_visible = false;
        }
        debug!("View now {:?} on {}", self.panes(), conversation_id);
        Ok(convo)
    }

    /// Return to the list in narrow layout. The selection is kept.
    pub fn back(&mut self) {
        if self.layout == Layout::Narrow {
            self.list_visible = true;
        }
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
        if layout == Layout::Wide {
            self.list_visible = true;
        }
    }

    /// Forget the selection, e.g. after the store was reloaded.
    pub fn reset(&mut self) {
        self.selected_id = None;
        self.list_visible = true;
    }
}
