use crate::output::{print_json, redact_config_for_display};
use anyhow::Result;
use mentor_agent::StudyEngine;
use mentor_core::{AppConfig, Command, StudyHost, Theme};
use serde_json::json;
use std::path::Path;

pub(crate) fn run_theme(engine: &mut StudyEngine, value: Option<&str>, json_mode: bool) -> Result<()> {
    match value.map(str::trim) {
        None => {}
        Some(v) if v.eq_ignore_ascii_case("toggle") => {
            engine.dispatch(Command::ToggleTheme)?;
        }
        Some(v) => {
            let theme: Theme = v.parse()?;
            engine.dispatch(Command::SetTheme(theme))?;
        }
    }
    let theme = engine.theme();
    if json_mode {
        print_json(&json!({"theme": theme}))?;
    } else {
        println!("{theme}");
    }
    Ok(())
}

pub(crate) fn run_config(cwd: &Path, json_mode: bool) -> Result<()> {
    let cfg = AppConfig::ensure(cwd)?;
    let display_cfg = redact_config_for_display(&cfg)?;
    if json_mode {
        print_json(&display_cfg)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&display_cfg)?);
        println!(
            "settings: {}",
            AppConfig::project_settings_path(cwd).display()
        );
    }
    Ok(())
}
