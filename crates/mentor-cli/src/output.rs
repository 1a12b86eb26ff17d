use anyhow::Result;
use mentor_core::{AppConfig, Flashcard, Message, QuizQuestion, Role, StudyPlanItem};
use mentor_ui::reasoning_steps;
use serde::Serialize;
use serde_json::json;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub(crate) fn redact_config_for_display(cfg: &AppConfig) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(llm) = value.get_mut("llm").and_then(|entry| entry.as_object_mut())
        && llm.get("api_key").is_some_and(|key| !key.is_null())
    {
        llm.insert("api_key".to_string(), json!("***REDACTED***"));
    }
    Ok(value)
}

pub(crate) fn print_message(message: &Message, show_reasoning: bool) {
    let speaker = match message.role {
        Role::User => "You",
        Role::Model => "Mentor",
    };
    println!("[{}] {speaker}", message.timestamp.format("%Y-%m-%d %H:%M"));
    if show_reasoning && let Some(thinking) = &message.thinking {
        let steps = reasoning_steps(thinking);
        if !steps.is_empty() {
            println!("AI Reasoning:");
            for step in steps {
                println!("  - {step}");
            }
            println!();
        }
    }
    println!("{}", message.text);
    if !message.attachments.is_empty() {
        println!("({} attachment(s))", message.attachments.len());
    }
}

pub(crate) fn print_flashcards(cards: &[Flashcard]) {
    if cards.is_empty() {
        println!("No Cards Generated");
        return;
    }
    for (i, card) in cards.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, card.category, card.question);
        println!("   -> {}", card.answer);
    }
}

pub(crate) fn print_quiz(questions: &[QuizQuestion]) {
    if questions.is_empty() {
        println!("No Quiz Available");
        return;
    }
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.question);
        for (j, option) in question.options.iter().enumerate() {
            let letter = char::from(b'A' + (j % 26) as u8);
            let marker = if j == question.correct_answer { "*" } else { " " };
            println!("  {marker} {letter}. {option}");
        }
        println!("   {}", question.explanation);
    }
}

pub(crate) fn print_plan(plan: &[StudyPlanItem]) {
    if plan.is_empty() {
        println!("Your study roadmap will appear here. Ask MentorAI to plan your session!");
        return;
    }
    for (i, item) in plan.iter().enumerate() {
        println!("{:02}. {} ({})", i + 1, item.title, item.duration);
        for task in &item.tasks {
            println!("    - {task}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_only_a_configured_key() {
        let mut cfg = AppConfig::default();
        let shown = redact_config_for_display(&cfg).expect("redact");
        assert!(shown["llm"]["api_key"].is_null());

        cfg.llm.api_key = Some("secret".to_string());
        let shown = redact_config_for_display(&cfg).expect("redact");
        assert_eq!(shown["llm"]["api_key"], "***REDACTED***");
        assert_eq!(shown["llm"]["api_key_env"], "GEMINI_API_KEY");
    }
}
