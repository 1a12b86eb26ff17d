use mentor_core::{
    Flashcard, GenerationKind, InlineAttachment, QuizQuestion, RequestTicket, StudyPlanItem,
};
use mentor_llm::{Batch, GenerationError, Generator, ReasoningReply};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

/// Work handed to a generation thread.
pub(crate) enum Job {
    Reply {
        prompt: String,
        attachments: Vec<InlineAttachment>,
    },
    Batch {
        kind: GenerationKind,
        content: String,
    },
}

pub(crate) enum Outcome {
    Reply(Result<ReasoningReply, GenerationError>),
    Flashcards(Result<Batch<Flashcard>, GenerationError>),
    Quiz(Result<Batch<QuizQuestion>, GenerationError>),
    StudyPlan(Result<Batch<StudyPlanItem>, GenerationError>),
}

pub(crate) struct Completion {
    pub ticket: RequestTicket,
    pub outcome: Outcome,
}

/// Runs `job` on its own thread and reports back over `tx`.
pub(crate) fn spawn(
    generator: Arc<Generator>,
    ticket: RequestTicket,
    job: Job,
    tx: Sender<Completion>,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("mentor-{}-{}", ticket.kind, ticket.seq))
        .spawn(move || {
            let outcome = run(&generator, job);
            // The engine may already be gone; nothing to report to then.
            let _ = tx.send(Completion { ticket, outcome });
        })?;
    Ok(())
}

fn run(generator: &Generator, job: Job) -> Outcome {
    match job {
        Job::Reply {
            prompt,
            attachments,
        } => Outcome::Reply(generator.reasoning_reply(&prompt, &attachments)),
        Job::Batch { kind, content } => match kind {
            GenerationKind::Flashcards => Outcome::Flashcards(generator.flashcards(&content)),
            GenerationKind::Quiz => Outcome::Quiz(generator.quiz(&content)),
            GenerationKind::StudyPlan => Outcome::StudyPlan(generator.study_plan(&content)),
            GenerationKind::ReasoningReply => {
                Outcome::Reply(generator.reasoning_reply(&content, &[]))
            }
        },
    }
}
