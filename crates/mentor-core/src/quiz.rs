//! One-question-at-a-time quiz progression.
//!
//! A session is rebuilt from scratch whenever a new quiz batch is loaded.
//! Rejected transitions return a [`QuizError`] and leave the session exactly
//! as it was.

use crate::QuizQuestion;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizPhase {
    InProgress { index: usize, score: usize },
    Completed { final_score: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("no quiz is loaded")]
    Empty,
    #[error("the quiz is already completed")]
    AlreadyCompleted,
    #[error("question {} is already answered", .index + 1)]
    AlreadyAnswered { index: usize },
    #[error("option {option} is out of range ({available} options)")]
    OptionOutOfRange { option: usize, available: usize },
    #[error("select an option before moving on")]
    NoSelection,
    #[error("restart is only available once the quiz is completed")]
    NotCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    answer_key: Vec<usize>,
    option_counts: Vec<usize>,
    phase: QuizPhase,
    selected: Option<usize>,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl QuizSession {
    pub fn new(questions: &[QuizQuestion]) -> Self {
        Self {
            answer_key: questions.iter().map(|q| q.correct_answer).collect(),
            option_counts: questions.iter().map(|q| q.options.len()).collect(),
            phase: QuizPhase::InProgress { index: 0, score: 0 },
            selected: None,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.answer_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answer_key.is_empty()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.phase, QuizPhase::Completed { .. })
    }

    /// Index of the question on screen; `None` once completed.
    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            QuizPhase::InProgress { index, .. } => Some(index),
            QuizPhase::Completed { .. } => None,
        }
    }

    pub fn score(&self) -> usize {
        match self.phase {
            QuizPhase::InProgress { score, .. } => score,
            QuizPhase::Completed { final_score } => final_score,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Feedback is shown exactly when the current question is locked.
    pub fn feedback_visible(&self) -> bool {
        self.selected.is_some()
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index()
            .is_some_and(|index| index + 1 == self.answer_key.len())
    }

    /// Questions the user has actually answered so far.
    pub fn answered_count(&self) -> usize {
        match self.phase {
            QuizPhase::InProgress { index, .. } => index + usize::from(self.selected.is_some()),
            QuizPhase::Completed { .. } => self.answer_key.len(),
        }
    }

    /// Whole-number accuracy over answered questions (0 before any answer).
    pub fn accuracy_percent(&self) -> u32 {
        let answered = self.answered_count().max(1);
        ((self.score() as f64 / answered as f64) * 100.0).round() as u32
    }

    /// Records a selection for the current question. Returns whether it was correct.
    pub fn select_option(&mut self, option: usize) -> Result<bool, QuizError> {
        let (index, score) = match self.phase {
            QuizPhase::Completed { .. } => return Err(QuizError::AlreadyCompleted),
            QuizPhase::InProgress { .. } if self.is_empty() => return Err(QuizError::Empty),
            QuizPhase::InProgress { index, score } => (index, score),
        };
        if self.selected.is_some() {
            return Err(QuizError::AlreadyAnswered { index });
        }
        let available = self.option_counts[index];
        if option >= available {
            return Err(QuizError::OptionOutOfRange { option, available });
        }

        let correct = option == self.answer_key[index];
        self.selected = Some(option);
        if correct {
            self.phase = QuizPhase::InProgress {
                index,
                score: score + 1,
            };
        }
        Ok(correct)
    }

    pub fn advance(&mut self) -> Result<QuizPhase, QuizError> {
        let (index, score) = match self.phase {
            QuizPhase::Completed { .. } => return Err(QuizError::AlreadyCompleted),
            QuizPhase::InProgress { .. } if self.is_empty() => return Err(QuizError::Empty),
            QuizPhase::InProgress { index, score } => (index, score),
        };
        if self.selected.is_none() {
            return Err(QuizError::NoSelection);
        }

        self.phase = if index + 1 >= self.answer_key.len() {
            QuizPhase::Completed { final_score: score }
        } else {
            QuizPhase::InProgress {
                index: index + 1,
                score,
            }
        };
        self.selected = None;
        Ok(self.phase)
    }

    pub fn restart(&mut self) -> Result<(), QuizError> {
        if !self.is_completed() {
            return Err(QuizError::NotCompleted);
        }
        self.phase = QuizPhase::InProgress { index: 0, score: 0 };
        self.selected = None;
        Ok(())
    }
}
