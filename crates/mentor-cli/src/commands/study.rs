use crate::output::{print_flashcards, print_json, print_message, print_plan, print_quiz};
use anyhow::{Context, Result, anyhow, bail};
use mentor_agent::StudyEngine;
use mentor_core::{AppView, Command, EngineEvent, GenerationKind, InlineAttachment, StudyHost};
use serde_json::json;
use std::path::PathBuf;

/// Surfaces the first failure in `events` as an error. Transport detail wins
/// over the generic alert text.
fn fail_on_error(events: &[EngineEvent]) -> Result<()> {
    if let Some(detail) = events.iter().find_map(|event| match event {
        EngineEvent::RequestFailed { detail, .. } => Some(detail),
        _ => None,
    }) {
        bail!("{detail}");
    }
    if let Some(alert) = events.iter().find_map(|event| match event {
        EngineEvent::Alert(alert) => Some(alert),
        _ => None,
    }) {
        bail!("{alert}");
    }
    Ok(())
}

pub(crate) fn run_ask(
    engine: &mut StudyEngine,
    prompt: &str,
    attach: &[PathBuf],
    json_mode: bool,
) -> Result<()> {
    if prompt.trim().is_empty() && attach.is_empty() {
        bail!("prompt is empty");
    }
    let attachments = attach
        .iter()
        .map(|path| {
            InlineAttachment::from_path(path)
                .with_context(|| format!("cannot attach {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut events = engine.dispatch(Command::SendMessage {
        text: prompt.trim().to_string(),
        attachments,
    })?;
    events.extend(engine.wait());
    fail_on_error(&events)?;

    let message_id = events
        .iter()
        .find_map(|event| match event {
            EngineEvent::ReplyReceived { message_id } => Some(*message_id),
            _ => None,
        })
        .ok_or_else(|| anyhow!("no reply was produced"))?;
    let reply = engine
        .state()
        .messages
        .iter()
        .find(|message| message.id == message_id)
        .ok_or_else(|| anyhow!("reply {message_id} missing from the conversation"))?;

    if json_mode {
        print_json(&json!({
            "message_id": reply.id,
            "text": reply.text,
            "thinking": reply.thinking,
        }))?;
    } else {
        print_message(reply, engine.config().ui.show_reasoning);
    }
    Ok(())
}

pub(crate) fn run_generate(
    engine: &mut StudyEngine,
    kind: GenerationKind,
    content: Option<String>,
    json_mode: bool,
) -> Result<()> {
    let mut events = engine.dispatch(Command::Generate { kind, content })?;
    events.extend(engine.wait());
    fail_on_error(&events)?;

    let recovered = events.iter().find_map(|event| match event {
        EngineEvent::BatchRecovered { detail, .. } => Some(detail.clone()),
        _ => None,
    });
    let state = engine.state();
    if json_mode {
        let items = match kind {
            GenerationKind::Flashcards => serde_json::to_value(&state.flashcards)?,
            GenerationKind::Quiz => serde_json::to_value(&state.quiz)?,
            GenerationKind::StudyPlan => serde_json::to_value(&state.study_plan)?,
            GenerationKind::ReasoningReply => bail!("{kind} is not a batch kind"),
        };
        return print_json(&json!({
            "kind": kind,
            "items": items,
            "recovered": recovered,
        }));
    }

    if let Some(detail) = &recovered {
        eprintln!("warning: {detail}");
    }
    match kind {
        GenerationKind::Flashcards => print_flashcards(&state.flashcards),
        GenerationKind::Quiz => print_quiz(&state.quiz),
        GenerationKind::StudyPlan => print_plan(&state.study_plan),
        GenerationKind::ReasoningReply => bail!("{kind} is not a batch kind"),
    }
    Ok(())
}

pub(crate) fn run_show(engine: &mut StudyEngine, view: &str, json_mode: bool) -> Result<()> {
    let view: AppView = view.parse()?;
    engine.dispatch(Command::SwitchView(view))?;
    let state = engine.state();

    if json_mode {
        let payload = match view {
            AppView::Chat => json!({"view": view, "messages": state.messages}),
            AppView::Flashcards => json!({"view": view, "flashcards": state.flashcards}),
            AppView::Quiz => json!({
                "view": view,
                "quiz": state.quiz,
                "session": engine.quiz_session().phase(),
            }),
            AppView::Planner => json!({"view": view, "study_plan": state.study_plan}),
        };
        return print_json(&payload);
    }

    match view {
        AppView::Chat => {
            if state.messages.is_empty() {
                println!("Awaiting Input...");
            }
            let show_reasoning = engine.config().ui.show_reasoning;
            for message in &state.messages {
                print_message(message, show_reasoning);
                println!();
            }
        }
        AppView::Flashcards => print_flashcards(&state.flashcards),
        AppView::Quiz => print_quiz(&state.quiz),
        AppView::Planner => print_plan(&state.study_plan),
    }
    Ok(())
}
