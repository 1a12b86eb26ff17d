/// Commands typed into the chat input with a leading `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// Remaining input after `/attach`, so paths may contain spaces.
    Attach(String),
    /// 1-based index into the pending attachments.
    Detach(Option<usize>),
    Cards,
    Quiz,
    Plan,
    Theme(Option<String>),
    Unknown { name: String, args: Vec<String> },
}

impl SlashCommand {
    pub fn parse(input: &str) -> Option<Self> {
        let line = input.trim();
        let body = line.strip_prefix('/')?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        if name.is_empty() {
            return None;
        }
        let args = rest.split_whitespace().map(ToString::to_string).collect::<Vec<_>>();

        let cmd = match name.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "attach" => Self::Attach(rest.to_string()),
            "detach" => Self::Detach(args.first().and_then(|n| n.parse().ok())),
            "cards" | "flashcards" => Self::Cards,
            "quiz" => Self::Quiz,
            "plan" | "path" => Self::Plan,
            "theme" => Self::Theme(args.first().cloned()),
            other => Self::Unknown {
                name: other.to_string(),
                args,
            },
        };
        Some(cmd)
    }
}

pub const HELP_LINES: &[&str] = &[
    "Tab / Shift+Tab, F1-F4   switch view",
    "Ctrl+T                   toggle theme",
    "Ctrl+G                   study path from the chosen answer",
    "Ctrl+F / Ctrl+Q          flashcards / quiz from the chosen answer",
    "Alt+↑ / Alt+↓            choose an earlier answer (latest by default)",
    "Ctrl+C                   exit",
    "",
    "/attach <path>           attach an image or PDF to the next message",
    "/detach <n>              remove pending attachment n",
    "/cards  /quiz  /plan     generate from the chosen answer",
    "/theme [dark|light]      switch theme",
    "",
    "Cards: ←/→ select, Space flip   Quiz: 1-4 or a-d answer, Enter next, r restart",
    "Path: ↑/↓ scroll",
];
