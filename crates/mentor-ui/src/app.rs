use crate::slash::SlashCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use mentor_core::{
    AppView, Command, EngineEvent, GenerationKind, InlineAttachment, Role, StudyHost, Theme,
};
use std::path::PathBuf;

const IDLE_STATUS: &str = "Ask anything. /help lists commands.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub name: String,
    pub attachment: InlineAttachment,
}

/// Presentation state that never reaches the store.
#[derive(Debug, Clone)]
pub struct UiState {
    pub input: String,
    /// Byte offset into `input`, always on a char boundary.
    pub cursor: usize,
    pub pending: Vec<PendingAttachment>,
    /// Rows scrolled up from the bottom of the transcript; 0 follows new output.
    pub chat_scroll_back: u16,
    /// Transcript index of the model reply batches are built from. `None`
    /// means the latest reply.
    pub picked_reply: Option<usize>,
    pub selected_card: usize,
    pub flipped: Vec<bool>,
    pub plan_scroll: u16,
    pub status: String,
    pub alert: Option<String>,
    pub show_help: bool,
    pub show_reasoning: bool,
    pub should_quit: bool,
    pub tick: usize,
}

impl UiState {
    pub fn new(show_reasoning: bool) -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            pending: Vec::new(),
            chat_scroll_back: 0,
            picked_reply: None,
            selected_card: 0,
            flipped: Vec::new(),
            plan_scroll: 0,
            status: IDLE_STATUS.to_string(),
            alert: None,
            show_help: false,
            show_reasoning,
            should_quit: false,
            tick: 0,
        }
    }

    pub fn is_flipped(&self, index: usize) -> bool {
        self.flipped.get(index).copied().unwrap_or(false)
    }

    pub fn handle_key(&mut self, host: &mut dyn StudyHost, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }
        if self.alert.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                self.alert = None;
            }
            return;
        }
        if self.show_help {
            self.show_help = false;
            return;
        }

        let view = host.state().active_view;
        let global = match key.code {
            KeyCode::Tab => Some(Command::SwitchView(view.next())),
            KeyCode::BackTab => Some(Command::SwitchView(view.prev())),
            KeyCode::F(n @ 1..=4) => Some(Command::SwitchView(AppView::ALL[usize::from(n) - 1])),
            KeyCode::Char('t') if ctrl => Some(Command::ToggleTheme),
            KeyCode::Char('g') if ctrl => Some(self.batch_command(&*host, GenerationKind::StudyPlan)),
            KeyCode::Char('f') if ctrl => Some(self.batch_command(&*host, GenerationKind::Flashcards)),
            KeyCode::Char('q') if ctrl => Some(self.batch_command(&*host, GenerationKind::Quiz)),
            _ => None,
        };
        if let Some(command) = global {
            self.run(host, command);
            return;
        }
        if ctrl {
            return;
        }

        match view {
            AppView::Chat => self.chat_key(host, key),
            AppView::Flashcards => self.flashcards_key(host, key),
            AppView::Quiz => self.quiz_key(host, key),
            AppView::Planner => self.planner_key(key),
        }
    }

    /// Folds engine notifications into presentation state.
    pub fn absorb(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            match event {
                EngineEvent::RequestStarted(kind) => {
                    self.status = format!("Generating {}...", kind_label(kind));
                }
                EngineEvent::ReplyReceived { .. } => {
                    self.chat_scroll_back = 0;
                    self.status = "Reply received.".to_string();
                }
                EngineEvent::BatchLoaded { kind, count } => {
                    self.reset_for_batch(kind, count);
                    self.status = format!("Loaded {count} {}.", kind_label(kind));
                }
                EngineEvent::BatchRecovered { kind, .. } => {
                    self.reset_for_batch(kind, 0);
                    self.status = format!(
                        "The model returned malformed {}; nothing to show.",
                        kind_label(kind)
                    );
                }
                EngineEvent::Superseded(_) | EngineEvent::ViewChanged(_) => {}
                // Chat failures only reach the log.
                EngineEvent::RequestFailed {
                    kind: GenerationKind::ReasoningReply,
                    ..
                } => self.status = IDLE_STATUS.to_string(),
                EngineEvent::RequestFailed { kind, detail } => {
                    let first_line = detail.lines().next().unwrap_or_default();
                    self.status = format!("{} failed: {first_line}", capitalize(kind_label(kind)));
                }
                EngineEvent::Alert(message) => self.alert = Some(message),
                EngineEvent::ThemeChanged(theme) => {
                    self.status = format!("Theme: {theme}");
                }
                EngineEvent::QuizAnswered { correct } => {
                    self.status = if correct { "Correct!" } else { "Not quite." }.to_string();
                }
                EngineEvent::QuizAdvanced { index } => {
                    self.status = format!("Question {}.", index + 1);
                }
                EngineEvent::QuizCompleted { score, total } => {
                    self.status = format!("Challenge complete: {score} / {total}.");
                }
                EngineEvent::QuizRestarted => self.status = "Challenge restarted.".to_string(),
            }
        }
    }

    fn run(&mut self, host: &mut dyn StudyHost, command: Command) {
        match host.dispatch(command) {
            Ok(events) => self.absorb(events),
            Err(err) => self.alert = Some(format!("{err:#}")),
        }
    }

    fn reset_for_batch(&mut self, kind: GenerationKind, count: usize) {
        match kind {
            GenerationKind::Flashcards => {
                self.selected_card = 0;
                self.flipped = vec![false; count];
            }
            GenerationKind::StudyPlan => self.plan_scroll = 0,
            GenerationKind::Quiz | GenerationKind::ReasoningReply => {}
        }
    }

    /// Batch request built from the picked reply, or from the latest one.
    fn batch_command(&self, host: &dyn StudyHost, kind: GenerationKind) -> Command {
        let content = self
            .picked_reply
            .and_then(|index| host.state().messages.get(index))
            .map(|message| message.text.clone());
        Command::Generate { kind, content }
    }

    fn pick_older_reply(&mut self, host: &dyn StudyHost) {
        let messages = host.state().messages.messages();
        let end = self.picked_reply.unwrap_or(messages.len()).min(messages.len());
        if let Some(index) = messages[..end].iter().rposition(|m| m.role == Role::Model) {
            self.picked_reply = Some(index);
            self.status = "Cards, quiz and path will use the highlighted reply.".to_string();
        }
    }

    fn pick_newer_reply(&mut self, host: &dyn StudyHost) {
        let Some(current) = self.picked_reply else {
            return;
        };
        self.picked_reply = host
            .state()
            .messages
            .iter()
            .enumerate()
            .skip(current + 1)
            .find(|(_, m)| m.role == Role::Model)
            .map(|(index, _)| index);
        if self.picked_reply.is_none() {
            self.status = "Cards, quiz and path will use the latest reply.".to_string();
        }
    }

    fn chat_key(&mut self, host: &mut dyn StudyHost, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::ALT) {
            match key.code {
                KeyCode::Up => self.pick_older_reply(&*host),
                KeyCode::Down => self.pick_newer_reply(&*host),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Enter => self.submit(host),
            KeyCode::Char(c) => {
                self.input.insert(self.cursor, c);
                self.cursor += c.len_utf8();
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.input[..self.cursor].chars().next_back() {
                    self.cursor -= prev.len_utf8();
                    self.input.remove(self.cursor);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.input.len() {
                    self.input.remove(self.cursor);
                }
            }
            KeyCode::Left => {
                if let Some(prev) = self.input[..self.cursor].chars().next_back() {
                    self.cursor -= prev.len_utf8();
                }
            }
            KeyCode::Right => {
                if let Some(next) = self.input[self.cursor..].chars().next() {
                    self.cursor += next.len_utf8();
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.len(),
            KeyCode::Esc => {
                self.input.clear();
                self.cursor = 0;
                self.picked_reply = None;
            }
            KeyCode::Up => self.chat_scroll_back = self.chat_scroll_back.saturating_add(1),
            KeyCode::Down => self.chat_scroll_back = self.chat_scroll_back.saturating_sub(1),
            KeyCode::PageUp => self.chat_scroll_back = self.chat_scroll_back.saturating_add(10),
            KeyCode::PageDown => self.chat_scroll_back = self.chat_scroll_back.saturating_sub(10),
            _ => {}
        }
    }

    fn submit(&mut self, host: &mut dyn StudyHost) {
        let line = std::mem::take(&mut self.input);
        self.cursor = 0;
        if let Some(slash) = SlashCommand::parse(&line) {
            self.slash(host, slash);
            return;
        }
        let text = line.trim().to_string();
        if text.is_empty() && self.pending.is_empty() {
            return;
        }
        let attachments = self
            .pending
            .drain(..)
            .map(|pending| pending.attachment)
            .collect();
        self.chat_scroll_back = 0;
        self.run(host, Command::SendMessage { text, attachments });
    }

    fn slash(&mut self, host: &mut dyn StudyHost, command: SlashCommand) {
        match command {
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Attach(raw) if raw.is_empty() => {
                self.status = "Usage: /attach <path>".to_string();
            }
            SlashCommand::Attach(raw) => {
                let path = expand_home(&raw);
                match InlineAttachment::from_path(&path) {
                    Ok(attachment) => {
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or(raw);
                        self.status = format!(
                            "Attached {name} ({}, {} bytes).",
                            attachment.mime_type,
                            attachment.byte_len()
                        );
                        self.pending.push(PendingAttachment { name, attachment });
                    }
                    Err(err) => self.alert = Some(err.to_string()),
                }
            }
            SlashCommand::Detach(Some(n)) if (1..=self.pending.len()).contains(&n) => {
                let removed = self.pending.remove(n - 1);
                self.status = format!("Removed {}.", removed.name);
            }
            SlashCommand::Detach(_) => {
                self.status = if self.pending.is_empty() {
                    "No pending attachments.".to_string()
                } else {
                    format!("Usage: /detach <n> (1-{})", self.pending.len())
                };
            }
            SlashCommand::Cards => {
                let command = self.batch_command(&*host, GenerationKind::Flashcards);
                self.run(host, command);
            }
            SlashCommand::Quiz => {
                let command = self.batch_command(&*host, GenerationKind::Quiz);
                self.run(host, command);
            }
            SlashCommand::Plan => {
                let command = self.batch_command(&*host, GenerationKind::StudyPlan);
                self.run(host, command);
            }
            SlashCommand::Theme(None) => self.run(host, Command::ToggleTheme),
            SlashCommand::Theme(Some(name)) => match name.parse::<Theme>() {
                Ok(theme) => self.run(host, Command::SetTheme(theme)),
                Err(err) => self.status = err.to_string(),
            },
            SlashCommand::Unknown { name, .. } => {
                self.status = format!("Unknown command /{name}. Type /help for commands.");
            }
        }
    }

    fn flashcards_key(&mut self, host: &mut dyn StudyHost, key: KeyEvent) {
        let count = host.state().flashcards.len();
        if count == 0 {
            return;
        }
        if self.flipped.len() != count {
            self.flipped.resize(count, false);
        }
        let last = count - 1;
        match key.code {
            KeyCode::Left => self.selected_card = self.selected_card.saturating_sub(1),
            KeyCode::Right => self.selected_card = (self.selected_card + 1).min(last),
            KeyCode::Up => self.selected_card = self.selected_card.saturating_sub(3),
            KeyCode::Down => self.selected_card = (self.selected_card + 3).min(last),
            KeyCode::Char(' ') | KeyCode::Enter => {
                let index = self.selected_card.min(last);
                self.flipped[index] = !self.flipped[index];
            }
            _ => {}
        }
    }

    fn quiz_key(&mut self, host: &mut dyn StudyHost, key: KeyEvent) {
        let command = match key.code {
            KeyCode::Char(c @ '1'..='9') => Some(Command::SelectOption(c as usize - '1' as usize)),
            KeyCode::Char(c @ 'a'..='d') => Some(Command::SelectOption(c as usize - 'a' as usize)),
            KeyCode::Enter => Some(Command::AdvanceQuiz),
            KeyCode::Char('r') => Some(Command::RestartQuiz),
            _ => None,
        };
        if let Some(command) = command {
            self.run(host, command);
        }
    }

    fn planner_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.plan_scroll = self.plan_scroll.saturating_sub(1),
            KeyCode::Down => self.plan_scroll = self.plan_scroll.saturating_add(1),
            KeyCode::PageUp => self.plan_scroll = self.plan_scroll.saturating_sub(10),
            KeyCode::PageDown => self.plan_scroll = self.plan_scroll.saturating_add(10),
            KeyCode::Home => self.plan_scroll = 0,
            _ => {}
        }
    }
}

pub fn kind_label(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::ReasoningReply => "reply",
        GenerationKind::Flashcards => "flashcards",
        GenerationKind::Quiz => "quiz",
        GenerationKind::StudyPlan => "study path",
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(raw)
}
