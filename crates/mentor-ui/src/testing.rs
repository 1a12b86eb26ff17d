use anyhow::Result;
use mentor_core::{
    AppState, Command, EngineEvent, GenerationKind, QuizSession, StudyHost, Theme,
};
use std::collections::{HashSet, VecDeque};

/// In-memory host that records commands and replays queued event batches.
#[derive(Default)]
pub struct FakeHost {
    pub state: AppState,
    pub quiz: QuizSession,
    pub theme: Theme,
    pub loading: HashSet<GenerationKind>,
    pub commands: Vec<Command>,
    pub replies: VecDeque<Vec<EngineEvent>>,
}

impl FakeHost {
    pub fn with_state(state: AppState) -> Self {
        let quiz = QuizSession::new(&state.quiz);
        Self {
            state,
            quiz,
            ..Self::default()
        }
    }
}

impl StudyHost for FakeHost {
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
        self.loading.contains(&kind)
    }

    fn dispatch(&mut self, command: Command) -> Result<Vec<EngineEvent>> {
        match &command {
            Command::SwitchView(view) => self.state.active_view = *view,
            Command::ToggleTheme => self.theme = self.theme.toggled(),
            Command::SetTheme(theme) => self.theme = *theme,
            _ => {}
        }
        self.commands.push(command);
        Ok(self.replies.pop_front().unwrap_or_default())
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        Vec::new()
    }
}
