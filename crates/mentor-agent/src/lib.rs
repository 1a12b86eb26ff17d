use anyhow::{Result, anyhow};
use mentor_core::{
    AppConfig, AppState, Command, EngineEvent, GenerationKind, Message, QuizPhase,
    QuizSession, RequestTicket, RequestTracker, StudyHost, Theme,
};
use mentor_llm::{Batch, GenerationError, Generator};
use mentor_observe::{GenerationOutcome, Observer};
use mentor_store::{Store, StoredValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

mod jobs;

use jobs::{Completion, Job, Outcome};

pub const NO_CONVERSATION_ALERT: &str = "Start a conversation first!";
pub const GENERATION_FAILED_ALERT: &str = "Error generating content.";

/// Owns the application state bag and applies every change to it.
///
/// Generation requests run on worker threads. Their results come back over a
/// channel and are applied by [`StudyEngine::poll`] or [`StudyEngine::wait`],
/// always on the thread that owns the engine.
pub struct StudyEngine {
    workspace: PathBuf,
    cfg: AppConfig,
    store: Store,
    observer: Observer,
    generator: Arc<Generator>,
    state: AppState,
    quiz: QuizSession,
    theme: Theme,
    tracker: RequestTracker,
    /// Spawned jobs whose completion has not been applied yet.
    in_flight: usize,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl StudyEngine {
    pub fn new(workspace: &Path) -> Result<Self> {
        let cfg = AppConfig::ensure(workspace)?;
        let generator = Generator::from_config(&cfg.llm)?;
        Self::new_with_components(workspace, cfg, generator)
    }

    pub fn new_with_generator(workspace: &Path, generator: Generator) -> Result<Self> {
        let cfg = AppConfig::ensure(workspace)?;
        Self::new_with_components(workspace, cfg, generator)
    }

    pub fn new_with_components(
        workspace: &Path,
        cfg: AppConfig,
        generator: Generator,
    ) -> Result<Self> {
        let store = Store::new(workspace)?;
        let observer = Observer::new(workspace)?;

        let state = match store.load_state()? {
            StoredValue::Loaded(state) => state,
            StoredValue::Missing => AppState::default(),
            StoredValue::Corrupt { error } => {
                observer.warn_log(&format!(
                    "stored application state is corrupt, starting fresh: {error}"
                ));
                AppState::default()
            }
        };
        let theme = match store.load_theme()? {
            StoredValue::Loaded(theme) => theme,
            StoredValue::Missing => cfg.ui.default_theme,
            StoredValue::Corrupt { error } => {
                observer.warn_log(&format!("stored theme is invalid, using dark: {error}"));
                Theme::Dark
            }
        };
        let quiz = QuizSession::new(&state.quiz);
        let (tx, rx) = mpsc::channel();

        Ok(Self {
            workspace: workspace.to_path_buf(),
            cfg,
            store,
            observer,
            generator: Arc::new(generator),
            state,
            quiz,
            theme,
            tracker: RequestTracker::default(),
            in_flight: 0,
            tx,
            rx,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut Observer {
        &mut self.observer
    }

    /// True while any kind has an outstanding request.
    pub fn is_busy(&self) -> bool {
        GenerationKind::ALL
            .iter()
            .any(|kind| self.tracker.is_loading(*kind))
    }

    /// Blocks until every spawned request has reported back, superseded ones
    /// included, and returns everything applied.
    pub fn wait(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while self.in_flight > 0 {
            match self.rx.recv() {
                Ok(completion) => events.extend(self.apply(completion)),
                Err(_) => break,
            }
        }
        events
    }

    fn persist(&self) -> Result<()> {
        self.store.save_state(&self.state)
    }

    fn persist_or_log(&self) {
        if let Err(err) = self.persist() {
            self.observer
                .error_log(&format!("failed to persist application state: {err:#}"));
        }
    }

    fn start(&mut self, kind: GenerationKind, job: Job) -> Result<Vec<EngineEvent>> {
        let ticket = self.tracker.issue(kind);
        self.observer
            .verbose_log(&format!("issuing {kind} request #{}", ticket.seq));
        jobs::spawn(Arc::clone(&self.generator), ticket, job, self.tx.clone())
            .map_err(|err| anyhow!("failed to start {kind} request: {err}"))?;
        self.in_flight += 1;
        Ok(vec![EngineEvent::RequestStarted(kind)])
    }

    fn send_message(
        &mut self,
        text: String,
        attachments: Vec<mentor_core::InlineAttachment>,
    ) -> Result<Vec<EngineEvent>> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Ok(Vec::new());
        }
        self.state
            .messages
            .add_message(Message::user(text.clone(), &attachments));
        self.persist()?;
        self.start(
            GenerationKind::ReasoningReply,
            Job::Reply {
                prompt: text,
                attachments,
            },
        )
    }

    fn generate(&mut self, kind: GenerationKind, content: Option<String>) -> Result<Vec<EngineEvent>> {
        if !kind.is_batch() {
            return Err(anyhow!("chat replies are requested with a message, not a batch"));
        }
        let content = match content.filter(|c| !c.trim().is_empty()) {
            Some(content) => content,
            None => match self.state.messages.last_model_message() {
                Some(message) => message.text.clone(),
                None => return Ok(vec![EngineEvent::Alert(NO_CONVERSATION_ALERT.to_string())]),
            },
        };
        self.start(kind, Job::Batch { kind, content })
    }

    fn apply(&mut self, completion: Completion) -> Vec<EngineEvent> {
        let Completion { ticket, outcome } = completion;
        self.in_flight = self.in_flight.saturating_sub(1);
        if !self.tracker.resolve(&ticket) {
            self.record(&ticket, &GenerationOutcome::Superseded);
            return vec![EngineEvent::Superseded(ticket.kind)];
        }
        match outcome {
            Outcome::Reply(result) => self.apply_reply(&ticket, result),
            Outcome::Flashcards(result) => {
                self.apply_batch(&ticket, result, |state, items| state.flashcards = items)
            }
            Outcome::Quiz(result) => {
                let loaded = result.is_ok();
                let events = self.apply_batch(&ticket, result, |state, items| state.quiz = items);
                if loaded {
                    self.quiz = QuizSession::new(&self.state.quiz);
                }
                events
            }
            Outcome::StudyPlan(result) => {
                self.apply_batch(&ticket, result, |state, items| state.study_plan = items)
            }
        }
    }

    fn apply_reply(
        &mut self,
        ticket: &RequestTicket,
        result: Result<mentor_llm::ReasoningReply, GenerationError>,
    ) -> Vec<EngineEvent> {
        match result {
            Ok(reply) => {
                let message = Message::model(reply.text, reply.thinking);
                let message_id = message.id;
                self.observer
                    .info_log(&format!("reply #{} appended as {message_id}", ticket.seq));
                self.state.messages.add_message(message);
                self.persist_or_log();
                self.record(ticket, &GenerationOutcome::Accepted { items: 1 });
                vec![EngineEvent::ReplyReceived { message_id }]
            }
            Err(err) => {
                let detail = format!("{err:#}");
                self.observer
                    .error_log(&format!("chat reply failed: {detail}"));
                self.record(ticket, &GenerationOutcome::Failed {
                    detail: detail.clone(),
                });
                vec![EngineEvent::RequestFailed {
                    kind: ticket.kind,
                    detail,
                }]
            }
        }
    }

    fn apply_batch<T>(
        &mut self,
        ticket: &RequestTicket,
        result: Result<Batch<T>, GenerationError>,
        assign: impl FnOnce(&mut AppState, Vec<T>),
    ) -> Vec<EngineEvent> {
        let kind = ticket.kind;
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                let detail = format!("{err:#}");
                self.observer
                    .error_log(&format!("{kind} generation failed: {detail}"));
                self.record(ticket, &GenerationOutcome::Failed {
                    detail: detail.clone(),
                });
                return vec![
                    EngineEvent::RequestFailed { kind, detail },
                    EngineEvent::Alert(GENERATION_FAILED_ALERT.to_string()),
                ];
            }
        };

        let mut events = Vec::new();
        match &batch.violation {
            Some(violation) => {
                self.observer
                    .warn_log(&format!("discarding malformed batch: {violation}"));
                self.record(ticket, &GenerationOutcome::Recovered {
                    detail: violation.to_string(),
                });
                events.push(EngineEvent::BatchRecovered {
                    kind,
                    detail: violation.to_string(),
                });
            }
            None => {
                self.observer
                    .info_log(&format!("loaded {} {kind} items", batch.items.len()));
                self.record(ticket, &GenerationOutcome::Accepted {
                    items: batch.items.len(),
                });
                events.push(EngineEvent::BatchLoaded {
                    kind,
                    count: batch.items.len(),
                });
            }
        }

        assign(&mut self.state, batch.items);
        let view = kind.target_view();
        self.state.active_view = view;
        self.persist_or_log();
        events.push(EngineEvent::ViewChanged(view));
        events
    }

    fn record(&self, ticket: &RequestTicket, outcome: &GenerationOutcome) {
        if let Err(err) = self.observer.record_generation(ticket.kind, ticket.seq, outcome) {
            self.observer
                .warn_log(&format!("failed to record generation outcome: {err:#}"));
        }
    }

    fn quiz_command(&mut self, command: Command) -> Vec<EngineEvent> {
        let result = match command {
            Command::SelectOption(option) => self
                .quiz
                .select_option(option)
                .map(|correct| EngineEvent::QuizAnswered { correct }),
            Command::AdvanceQuiz => self.quiz.advance().map(|phase| match phase {
                QuizPhase::InProgress { index, .. } => EngineEvent::QuizAdvanced { index },
                QuizPhase::Completed { final_score } => EngineEvent::QuizCompleted {
                    score: final_score,
                    total: self.state.quiz.len(),
                },
            }),
            Command::RestartQuiz => self.quiz.restart().map(|()| EngineEvent::QuizRestarted),
            _ => return Vec::new(),
        };
        match result {
            Ok(event) => vec![event],
            Err(err) => {
                self.observer.verbose_log(&format!("quiz: {err}"));
                Vec::new()
            }
        }
    }

    fn set_theme(&mut self, theme: Theme) -> Result<Vec<EngineEvent>> {
        self.theme = theme;
        self.store.save_theme(theme)?;
        Ok(vec![EngineEvent::ThemeChanged(theme)])
    }
}

impl StudyHost for StudyEngine {
    fn state(&self) -> &AppState {
        &self.state
    }

    fn quiz_session(&self) -> &QuizSession {
        &self.quiz
    }

    fn theme(&self) -> Theme {
        self.theme
    }

    fn is_loading(&self, kind: GenerationKind) -> bool {
        self.tracker.is_loading(kind)
    }

    fn dispatch(&mut self, command: Command) -> Result<Vec<EngineEvent>> {
        match command {
            Command::SwitchView(view) => {
                self.state.active_view = view;
                self.persist()?;
                Ok(vec![EngineEvent::ViewChanged(view)])
            }
            Command::SendMessage { text, attachments } => self.send_message(text, attachments),
            Command::Generate { kind, content } => self.generate(kind, content),
            Command::SetTheme(theme) => self.set_theme(theme),
            Command::ToggleTheme => self.set_theme(self.theme.toggled()),
            quiz @ (Command::SelectOption(_) | Command::AdvanceQuiz | Command::RestartQuiz) => {
                Ok(self.quiz_command(quiz))
            }
        }
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            events.extend(self.apply(completion));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::{AppView, InlineAttachment, Role};
    use mentor_store::{STATE_KEY, THEME_KEY};
    use mentor_testkit::{
        Gate, ScriptedClient, reply, sample_flashcards_json, sample_plan_json, sample_quiz_json,
        temp_workspace,
    };

    fn engine_with(workspace: &Path, client: ScriptedClient) -> StudyEngine {
        let mut engine =
            StudyEngine::new_with_components(workspace, AppConfig::default(), client.into_generator())
                .expect("engine");
        engine.observer_mut().set_stderr_enabled(false);
        engine
    }

    fn chat_then(workspace: &Path, follow_up: Vec<Result<mentor_core::GenerateResponse, String>>) -> StudyEngine {
        let mut replies = vec![Ok(reply("### Photosynthesis\n* light reactions", Some("recall inputs")))];
        replies.extend(follow_up);
        let mut engine = engine_with(workspace, ScriptedClient::new(replies));
        engine
            .dispatch(Command::SendMessage {
                text: "explain photosynthesis".to_string(),
                attachments: vec![],
            })
            .expect("send");
        engine.wait();
        engine
    }

    #[test]
    fn chat_reply_is_appended_with_reasoning_trace() {
        let workspace = temp_workspace().expect("workspace");
        let attachment = InlineAttachment::from_bytes(b"img", "image/png");
        let client = ScriptedClient::new(vec![Ok(reply("answer", Some("step 1\nstep 2")))]);
        let seen = client.requests();
        let mut engine = engine_with(workspace.path(), client);

        let started = engine
            .dispatch(Command::SendMessage {
                text: "what is this?".to_string(),
                attachments: vec![attachment.clone()],
            })
            .expect("send");
        assert_eq!(started, vec![EngineEvent::RequestStarted(GenerationKind::ReasoningReply)]);
        assert_eq!(engine.state().messages.len(), 1);

        let events = engine.wait();
        assert!(matches!(events.as_slice(), [EngineEvent::ReplyReceived { .. }]));
        let messages = engine.state().messages.messages();
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].attachments, vec![attachment.to_data_url()]);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].thinking.as_deref(), Some("step 1\nstep 2"));
        assert_eq!(seen.lock().expect("seen")[0].attachments, vec![attachment]);
        assert!(!engine.is_loading(GenerationKind::ReasoningReply));
    }

    #[test]
    fn blank_message_without_attachments_is_ignored() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = engine_with(workspace.path(), ScriptedClient::new(vec![]));
        let events = engine
            .dispatch(Command::SendMessage {
                text: "   ".to_string(),
                attachments: vec![],
            })
            .expect("send");
        assert!(events.is_empty());
        assert!(engine.state().messages.is_empty());
    }

    #[test]
    fn chat_failure_is_logged_without_alert() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = engine_with(
            workspace.path(),
            ScriptedClient::new(vec![Err("Invalid or missing API key (HTTP 401).".to_string())]),
        );
        engine
            .dispatch(Command::SendMessage {
                text: "hello".to_string(),
                attachments: vec![],
            })
            .expect("send");
        let events = engine.wait();
        assert!(matches!(
            events.as_slice(),
            [EngineEvent::RequestFailed { kind: GenerationKind::ReasoningReply, .. }]
        ));
        assert_eq!(engine.state().messages.len(), 1);
        let log = std::fs::read_to_string(engine.observer().log_path()).expect("log");
        assert!(log.contains("ERROR chat reply failed"));
    }

    #[test]
    fn generate_without_model_message_raises_alert() {
        let workspace = temp_workspace().expect("workspace");
        let client = ScriptedClient::new(vec![]);
        let seen = client.requests();
        let mut engine = engine_with(workspace.path(), client);
        let events = engine
            .dispatch(Command::Generate {
                kind: GenerationKind::StudyPlan,
                content: None,
            })
            .expect("dispatch");
        assert_eq!(events, vec![EngineEvent::Alert(NO_CONVERSATION_ALERT.to_string())]);
        assert!(!engine.is_busy());
        assert!(seen.lock().expect("seen").is_empty());
    }

    #[test]
    fn generate_from_last_reply_switches_to_kind_view() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = chat_then(
            workspace.path(),
            vec![Ok(reply(&sample_plan_json(), None))],
        );
        engine
            .dispatch(Command::Generate {
                kind: GenerationKind::StudyPlan,
                content: None,
            })
            .expect("generate");
        let events = engine.wait();
        assert_eq!(
            events,
            vec![
                EngineEvent::BatchLoaded {
                    kind: GenerationKind::StudyPlan,
                    count: 4
                },
                EngineEvent::ViewChanged(AppView::Planner),
            ]
        );
        assert_eq!(engine.state().study_plan.len(), 4);
        assert_eq!(engine.state().active_view, AppView::Planner);
        let log = std::fs::read_to_string(engine.observer().log_path()).expect("log");
        assert!(log.contains("INFO loaded 4 study-plan items"));
    }

    #[test]
    fn explicit_content_is_sent_in_the_prompt() {
        let workspace = temp_workspace().expect("workspace");
        let client = ScriptedClient::new(vec![Ok(reply(&sample_flashcards_json(3), None))]);
        let seen = client.requests();
        let mut engine = engine_with(workspace.path(), client);
        engine
            .dispatch(Command::Generate {
                kind: GenerationKind::Flashcards,
                content: Some("Mitochondria produce ATP.".to_string()),
            })
            .expect("generate");
        engine.wait();
        assert_eq!(engine.state().flashcards.len(), 3);
        assert!(seen.lock().expect("seen")[0].prompt.ends_with("Mitochondria produce ATP."));
    }

    #[test]
    fn malformed_batch_is_replaced_by_empty_and_logged() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = chat_then(
            workspace.path(),
            vec![
                Ok(reply(&sample_flashcards_json(5), None)),
                Ok(reply("not json at all", None)),
            ],
        );
        for _ in 0..2 {
            engine
                .dispatch(Command::Generate {
                    kind: GenerationKind::Flashcards,
                    content: None,
                })
                .expect("generate");
            engine.wait();
        }
        assert!(engine.state().flashcards.is_empty());
        assert_eq!(engine.state().active_view, AppView::Flashcards);
        let log = std::fs::read_to_string(engine.observer().log_path()).expect("log");
        assert!(log.contains("\"outcome\":\"recovered\""));
    }

    #[test]
    fn batch_transport_failure_raises_alert_and_keeps_previous_items() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = chat_then(
            workspace.path(),
            vec![
                Ok(reply(&sample_quiz_json(), None)),
                Err("Gemini server error (HTTP 503).".to_string()),
            ],
        );
        engine
            .dispatch(Command::Generate {
                kind: GenerationKind::Quiz,
                content: None,
            })
            .expect("first quiz");
        engine.wait();
        engine
            .dispatch(Command::Generate {
                kind: GenerationKind::Quiz,
                content: None,
            })
            .expect("second quiz");
        let events = engine.wait();
        assert!(events.contains(&EngineEvent::Alert(GENERATION_FAILED_ALERT.to_string())));
        assert_eq!(engine.state().quiz.len(), 5);
    }

    #[test]
    fn superseded_response_is_discarded() {
        let workspace = temp_workspace().expect("workspace");
        let gate = Gate::default();
        let client = ScriptedClient::from_fn(|req| {
            let count = if req.prompt.ends_with("first") { 2 } else { 5 };
            Ok(reply(&sample_flashcards_json(count), None))
        })
        .with_gate(gate.clone());
        let mut engine = engine_with(workspace.path(), client);

        for content in ["first", "second"] {
            engine
                .dispatch(Command::Generate {
                    kind: GenerationKind::Flashcards,
                    content: Some(content.to_string()),
                })
                .expect("generate");
        }
        assert!(engine.is_loading(GenerationKind::Flashcards));
        assert!(engine.poll().is_empty());
        gate.open();

        let events = engine.wait();
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == EngineEvent::Superseded(GenerationKind::Flashcards))
                .count(),
            1
        );
        assert_eq!(engine.state().flashcards.len(), 5);
        assert!(!engine.is_loading(GenerationKind::Flashcards));
        let log = std::fs::read_to_string(engine.observer().log_path()).expect("log");
        assert!(log.contains("\"outcome\":\"superseded\""));
    }

    #[test]
    fn overlapping_chat_messages_each_get_a_reply() {
        let workspace = temp_workspace().expect("workspace");
        let gate = Gate::default();
        let client = ScriptedClient::from_fn(|req| Ok(reply(&format!("answer to {}", req.prompt), None)))
            .with_gate(gate.clone());
        let mut engine = engine_with(workspace.path(), client);

        for text in ["first question", "second question"] {
            engine
                .dispatch(Command::SendMessage {
                    text: text.to_string(),
                    attachments: vec![],
                })
                .expect("send");
        }
        assert!(engine.is_loading(GenerationKind::ReasoningReply));
        gate.open();

        let events = engine.wait();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, EngineEvent::ReplyReceived { .. }))
                .count(),
            2
        );
        assert!(!events.contains(&EngineEvent::Superseded(GenerationKind::ReasoningReply)));
        assert!(!engine.is_loading(GenerationKind::ReasoningReply));

        let messages = engine.state().messages.messages();
        assert_eq!(messages.len(), 4);
        let mut answers: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::Model)
            .map(|m| m.text.as_str())
            .collect();
        answers.sort_unstable();
        assert_eq!(answers, ["answer to first question", "answer to second question"]);
    }

    #[test]
    fn loaded_quiz_resets_session() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = engine_with(
            workspace.path(),
            ScriptedClient::new(vec![
                Ok(reply(&sample_quiz_json(), None)),
                Ok(reply(&sample_quiz_json(), None)),
            ]),
        );
        let generate = Command::Generate {
            kind: GenerationKind::Quiz,
            content: Some("cells".to_string()),
        };
        engine.dispatch(generate.clone()).expect("quiz");
        engine.wait();
        assert_eq!(
            engine.dispatch(Command::SelectOption(1)).expect("select"),
            vec![EngineEvent::QuizAnswered { correct: true }]
        );
        engine.dispatch(Command::AdvanceQuiz).expect("advance");
        assert_eq!(engine.quiz_session().phase(), QuizPhase::InProgress { index: 1, score: 1 });

        engine.dispatch(generate).expect("quiz again");
        engine.wait();
        assert_eq!(engine.quiz_session().phase(), QuizPhase::InProgress { index: 0, score: 0 });
        assert_eq!(engine.quiz_session().selected(), None);
    }

    #[test]
    fn rejected_quiz_moves_change_nothing() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = engine_with(workspace.path(), ScriptedClient::new(vec![]));
        assert!(engine.dispatch(Command::SelectOption(0)).expect("select").is_empty());
        assert!(engine.dispatch(Command::AdvanceQuiz).expect("advance").is_empty());
        assert!(engine.dispatch(Command::RestartQuiz).expect("restart").is_empty());
    }

    #[test]
    fn quiz_runs_to_completion_and_restarts() {
        let workspace = temp_workspace().expect("workspace");
        let mut engine = engine_with(
            workspace.path(),
            ScriptedClient::new(vec![Ok(reply(&sample_quiz_json(), None))]),
        );
        engine
            .dispatch(Command::Generate {
                kind: GenerationKind::Quiz,
                content: Some("cells".to_string()),
            })
            .expect("quiz");
        engine.wait();

        let mut last = Vec::new();
        for option in [1, 0, 0, 2, 1] {
            engine.dispatch(Command::SelectOption(option)).expect("select");
            last = engine.dispatch(Command::AdvanceQuiz).expect("advance");
        }
        assert_eq!(last, vec![EngineEvent::QuizCompleted { score: 4, total: 5 }]);
        assert_eq!(
            engine.dispatch(Command::RestartQuiz).expect("restart"),
            vec![EngineEvent::QuizRestarted]
        );
        assert_eq!(engine.quiz_session().phase(), QuizPhase::InProgress { index: 0, score: 0 });
    }

    #[test]
    fn state_and_theme_survive_restart() {
        let workspace = temp_workspace().expect("workspace");
        {
            let mut engine = chat_then(
                workspace.path(),
                vec![Ok(reply(&sample_flashcards_json(5), None))],
            );
            engine
                .dispatch(Command::Generate {
                    kind: GenerationKind::Flashcards,
                    content: None,
                })
                .expect("cards");
            engine.wait();
            engine.dispatch(Command::ToggleTheme).expect("theme");
            engine
                .dispatch(Command::SwitchView(AppView::Quiz))
                .expect("view");
        }

        let engine = engine_with(workspace.path(), ScriptedClient::new(vec![]));
        assert_eq!(engine.state().messages.len(), 2);
        assert_eq!(engine.state().flashcards.len(), 5);
        assert_eq!(engine.state().active_view, AppView::Quiz);
        assert_eq!(engine.theme(), Theme::Light);
    }

    #[test]
    fn corrupt_stored_values_fall_back_to_defaults() {
        let workspace = temp_workspace().expect("workspace");
        let store = Store::new(workspace.path()).expect("store");
        store.put_raw(STATE_KEY, "{\"activeView\": 42").expect("state");
        store.put_raw(THEME_KEY, "neon").expect("theme");

        let engine = engine_with(workspace.path(), ScriptedClient::new(vec![]));
        assert_eq!(engine.state(), &AppState::default());
        assert_eq!(engine.theme(), Theme::Dark);
        let log = std::fs::read_to_string(engine.observer().log_path()).expect("log");
        assert!(log.contains("WARN stored application state is corrupt"));
    }

    #[test]
    fn restored_quiz_starts_a_fresh_session() {
        let workspace = temp_workspace().expect("workspace");
        let store = Store::new(workspace.path()).expect("store");
        let state = AppState {
            quiz: mentor_testkit::sample_quiz(),
            active_view: AppView::Quiz,
            ..AppState::default()
        };
        store.save_state(&state).expect("save");

        let engine = engine_with(workspace.path(), ScriptedClient::new(vec![]));
        assert_eq!(engine.quiz_session().len(), 5);
        assert_eq!(engine.quiz_session().phase(), QuizPhase::InProgress { index: 0, score: 0 });
        assert_eq!(engine.state().active_view, AppView::Quiz);
    }
}
