use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod attachment;
pub mod conversation;
pub mod generation;
pub mod quiz;

pub use attachment::{AttachmentError, InlineAttachment};
pub use conversation::Conversation;
pub use generation::{
    GenerateRequest, GenerateResponse, GenerationKind, RequestTicket, RequestTracker,
};
pub use quiz::{QuizError, QuizPhase, QuizSession};

pub type Result<T> = anyhow::Result<T>;

// Gemini model aliases.
pub const GEMINI_REASONING_MODEL: &str = "gemini-3-pro-preview";
pub const GEMINI_SPEED_MODEL: &str = "gemini-3-flash-preview";
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_THINKING_BUDGET: u32 = 32_768;
pub const TUTOR_SYSTEM_INSTRUCTION: &str = "You are MentorAI. Format your responses with clear headers (###), bold key terms, and bullet points. Focus on educational clarity and pedagogical structure.";

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".mentor")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One chat turn. Never mutated after it is appended to a [`Conversation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    /// Reasoning trace; only model replies carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Inline attachments as `data:` URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl Message {
    pub fn user(text: impl Into<String>, attachments: &[InlineAttachment]) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: Role::User,
            text: text.into(),
            thinking: None,
            timestamp: Utc::now(),
            attachments: attachments.iter().map(InlineAttachment::to_data_url).collect(),
        }
    }

    pub fn model(text: impl Into<String>, thinking: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: Role::Model,
            text: text.into(),
            thinking: thinking.filter(|t| !t.trim().is_empty()),
            timestamp: Utc::now(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

impl QuizQuestion {
    /// Checks `0 <= correct_answer < options.len()`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.options.is_empty() {
            return Err(format!("question '{}' has no options", self.id));
        }
        if self.correct_answer >= self.options.len() {
            return Err(format!(
                "question '{}' has correctAnswer={} but only {} options",
                self.id,
                self.correct_answer,
                self.options.len()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyPlanItem {
    pub id: String,
    pub title: String,
    /// Free-text label such as "2 days".
    pub duration: String,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppView {
    #[default]
    Chat,
    Flashcards,
    Quiz,
    Planner,
}

impl AppView {
    pub const ALL: [AppView; 4] = [
        AppView::Chat,
        AppView::Flashcards,
        AppView::Quiz,
        AppView::Planner,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AppView::Chat => "Chat",
            AppView::Flashcards => "Cards",
            AppView::Quiz => "Quiz",
            AppView::Planner => "Path",
        }
    }

    pub fn index(self) -> usize {
        match self {
            AppView::Chat => 0,
            AppView::Flashcards => 1,
            AppView::Quiz => 2,
            AppView::Planner => 3,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for AppView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AppView::Chat => "chat",
            AppView::Flashcards => "flashcards",
            AppView::Quiz => "quiz",
            AppView::Planner => "planner",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for AppView {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(AppView::Chat),
            "flashcards" | "cards" => Ok(AppView::Flashcards),
            "quiz" => Ok(AppView::Quiz),
            "planner" | "plan" | "path" => Ok(AppView::Planner),
            other => Err(anyhow::anyhow!(
                "unknown view '{other}' (expected chat, flashcards, quiz or planner)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(anyhow::anyhow!("unknown theme '{other}' (expected dark or light)")),
        }
    }
}

/// The single persisted state bag. Owned by the engine; everything else
/// reads it and sends [`Command`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub active_view: AppView,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
    pub study_plan: Vec<StudyPlanItem>,
    pub messages: Conversation,
}

/// Change requests emitted by views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SwitchView(AppView),
    SendMessage {
        text: String,
        attachments: Vec<InlineAttachment>,
    },
    /// Generate a batch. `None` content falls back to the last model reply.
    Generate {
        kind: GenerationKind,
        content: Option<String>,
    },
    SelectOption(usize),
    AdvanceQuiz,
    RestartQuiz,
    SetTheme(Theme),
    ToggleTheme,
}

/// Notifications flowing back to views after a command or a finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    RequestStarted(GenerationKind),
    ReplyReceived { message_id: Uuid },
    BatchLoaded { kind: GenerationKind, count: usize },
    /// Malformed batch replaced by an empty one.
    BatchRecovered { kind: GenerationKind, detail: String },
    /// A response arrived after a newer request of the same kind and was dropped.
    Superseded(GenerationKind),
    RequestFailed { kind: GenerationKind, detail: String },
    Alert(String),
    ViewChanged(AppView),
    ThemeChanged(Theme),
    QuizAnswered { correct: bool },
    QuizAdvanced { index: usize },
    QuizCompleted { score: usize, total: usize },
    QuizRestarted,
}

/// What a view layer needs from the controller.
pub trait StudyHost {
    fn state(&self) -> &AppState;
    fn quiz_session(&self) -> &QuizSession;
    fn theme(&self) -> Theme;
    fn is_loading(&self, kind: GenerationKind) -> bool;
    fn dispatch(&mut self, command: Command) -> Result<Vec<EngineEvent>>;
    /// Applies any finished background requests without blocking.
    fn poll(&mut self) -> Vec<EngineEvent>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".mentor/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    pub fn load(workspace: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));
        paths.push(Self::project_local_settings_path(workspace));
        Self::load_layers(&Self::legacy_toml_path(workspace), &paths)
    }

    fn load_layers(legacy: &Path, json_layers: &[PathBuf]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        for path in json_layers {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn ensure(workspace: &Path) -> Result<Self> {
        let path = Self::project_settings_path(workspace);
        if path.exists()
            || Self::project_local_settings_path(workspace).exists()
            || Self::legacy_toml_path(workspace).exists()
            || Self::user_settings_path().is_some_and(|p| p.exists())
        {
            return Self::load(workspace);
        }
        let cfg = Self::default();
        cfg.save(workspace)?;
        Ok(cfg)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    /// Base URL; requests go to `{endpoint}/models/{model}:generateContent`.
    pub endpoint: String,
    pub reasoning_model: String,
    pub speed_model: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub thinking_budget: u32,
    pub system_instruction: String,
    /// 0 disables the client-side timeout.
    pub timeout_seconds: u64,
    pub max_retries: u8,
    pub retry_base_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            endpoint: GEMINI_ENDPOINT.to_string(),
            reasoning_model: GEMINI_REASONING_MODEL.to_string(),
            speed_model: GEMINI_SPEED_MODEL.to_string(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            system_instruction: TUTOR_SYSTEM_INSTRUCTION.to_string(),
            timeout_seconds: 0,
            max_retries: 3,
            retry_base_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Used until a theme preference has been stored.
    pub default_theme: Theme,
    pub show_reasoning: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_theme: Theme::Dark,
            show_reasoning: true,
        }
    }
}
