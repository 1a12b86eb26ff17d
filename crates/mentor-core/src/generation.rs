use crate::{AppView, InlineAttachment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationKind {
    ReasoningReply,
    Flashcards,
    Quiz,
    StudyPlan,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 4] = [
        GenerationKind::ReasoningReply,
        GenerationKind::Flashcards,
        GenerationKind::Quiz,
        GenerationKind::StudyPlan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::ReasoningReply => "reasoning-reply",
            GenerationKind::Flashcards => "flashcards",
            GenerationKind::Quiz => "quiz",
            GenerationKind::StudyPlan => "study-plan",
        }
    }

    /// Size the prompt asks for. The provider is guided, not forced.
    pub fn nominal_batch_size(self) -> usize {
        match self {
            GenerationKind::ReasoningReply => 1,
            GenerationKind::Flashcards | GenerationKind::Quiz => 5,
            GenerationKind::StudyPlan => 4,
        }
    }

    pub fn is_batch(self) -> bool {
        !matches!(self, GenerationKind::ReasoningReply)
    }

    /// View that displays results of this kind.
    pub fn target_view(self) -> AppView {
        match self {
            GenerationKind::ReasoningReply => AppView::Chat,
            GenerationKind::Flashcards => AppView::Flashcards,
            GenerationKind::Quiz => AppView::Quiz,
            GenerationKind::StudyPlan => AppView::Planner,
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub attachments: Vec<InlineAttachment>,
    #[serde(default)]
    pub system_instruction: Option<String>,
    /// When set the provider is asked for `application/json` matching this schema.
    #[serde(default)]
    pub response_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub thinking_budget: Option<u32>,
}

fn default_finish_reason() -> String {
    "STOP".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thinking: None,
            finish_reason: default_finish_reason(),
        }
    }
}

/// Identifies one issued request of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub kind: GenerationKind,
    pub seq: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    latest: u64,
    latest_open: bool,
    pending: usize,
}

/// Request generations per kind. Batch kinds are single-slot: only the
/// newest ticket may write its result. Chat replies are appended, so every
/// reply ticket stays valid and the kind is loading while any is pending.
#[derive(Debug, Default)]
pub struct RequestTracker {
    slots: HashMap<GenerationKind, Slot>,
}

impl RequestTracker {
    pub fn issue(&mut self, kind: GenerationKind) -> RequestTicket {
        let slot = self.slots.entry(kind).or_default();
        slot.latest += 1;
        slot.latest_open = true;
        slot.pending += 1;
        RequestTicket {
            kind,
            seq: slot.latest,
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        if !ticket.kind.is_batch() {
            return true;
        }
        self.slots
            .get(&ticket.kind)
            .is_some_and(|slot| slot.latest == ticket.seq)
    }

    /// Marks the ticket finished. Returns false for a superseded ticket,
    /// whose result must be discarded.
    pub fn resolve(&mut self, ticket: &RequestTicket) -> bool {
        let current = self.is_current(ticket);
        if let Some(slot) = self.slots.get_mut(&ticket.kind) {
            slot.pending = slot.pending.saturating_sub(1);
            if slot.latest == ticket.seq {
                slot.latest_open = false;
            }
        }
        current
    }

    pub fn is_loading(&self, kind: GenerationKind) -> bool {
        self.slots.get(&kind).is_some_and(|slot| {
            if kind.is_batch() {
                slot.latest_open
            } else {
                slot.pending > 0
            }
        })
    }
}
