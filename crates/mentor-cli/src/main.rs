use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mentor_agent::StudyEngine;
use mentor_core::GenerationKind;
use std::path::{Path, PathBuf};

mod commands;
mod output;

use commands::admin::{run_config, run_theme};
use commands::study::{run_ask, run_generate, run_show};

#[derive(Parser)]
#[command(name = "mentor")]
#[command(about = "MentorAI study assistant: chat, flashcards, quizzes and study paths", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the tutor a question; the reply joins the conversation.
    Ask(AskArgs),
    /// Generate a flashcard deck.
    Flashcards(GenerateArgs),
    /// Generate a multiple-choice quiz.
    Quiz(GenerateArgs),
    /// Generate a study path.
    Plan(GenerateArgs),
    /// Print the stored content of a view and make it active.
    Show(ShowArgs),
    /// Show or change the theme.
    Theme(ThemeArgs),
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[derive(Args)]
struct AskArgs {
    prompt: String,
    /// Image or PDF to send along with the prompt (repeatable).
    #[arg(long = "attach")]
    attach: Vec<PathBuf>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Source text. Defaults to the most recent tutor reply.
    #[arg(long)]
    content: Option<String>,
}

#[derive(Args)]
struct ShowArgs {
    /// chat, flashcards, quiz or planner
    view: String,
}

#[derive(Args)]
struct ThemeArgs {
    /// dark, light or toggle; omit to print the current theme.
    value: Option<String>,
}

fn open_engine(cwd: &Path, verbose: bool) -> Result<StudyEngine> {
    let mut engine = StudyEngine::new(cwd)?;
    engine.observer_mut().set_verbose(verbose);
    Ok(engine)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let Some(command) = cli.command else {
        let mut engine = open_engine(&cwd, cli.verbose)?;
        engine.observer_mut().set_stderr_enabled(false);
        let options = mentor_ui::UiOptions {
            show_reasoning: engine.config().ui.show_reasoning,
        };
        return mentor_ui::run_tui(&mut engine, options);
    };

    match command {
        Commands::Ask(args) => {
            let mut engine = open_engine(&cwd, cli.verbose)?;
            run_ask(&mut engine, &args.prompt, &args.attach, cli.json)
        }
        Commands::Flashcards(args) => {
            let mut engine = open_engine(&cwd, cli.verbose)?;
            run_generate(&mut engine, GenerationKind::Flashcards, args.content, cli.json)
        }
        Commands::Quiz(args) => {
            let mut engine = open_engine(&cwd, cli.verbose)?;
            run_generate(&mut engine, GenerationKind::Quiz, args.content, cli.json)
        }
        Commands::Plan(args) => {
            let mut engine = open_engine(&cwd, cli.verbose)?;
            run_generate(&mut engine, GenerationKind::StudyPlan, args.content, cli.json)
        }
        Commands::Show(args) => {
            let mut engine = open_engine(&cwd, cli.verbose)?;
            run_show(&mut engine, &args.view, cli.json)
        }
        Commands::Theme(args) => {
            let mut engine = open_engine(&cwd, cli.verbose)?;
            run_theme(&mut engine, args.value.as_deref(), cli.json)
        }
        Commands::Config => run_config(&cwd, cli.json),
    }
}
