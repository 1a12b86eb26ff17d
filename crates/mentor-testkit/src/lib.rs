//! Test doubles shared by the engine, UI and CLI tests.

use anyhow::{Result, anyhow};
use mentor_core::{
    GenerateRequest, GenerateResponse, LlmConfig, QuizQuestion, runtime_dir,
};
use mentor_llm::{Generator, LlmClient};
use serde_json::json;
use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

type Responder = dyn Fn(&GenerateRequest) -> Result<GenerateResponse> + Send + Sync;

/// Blocks scripted replies until opened.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        if let Ok(mut opened) = lock.lock() {
            *opened = true;
            cvar.notify_all();
        }
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let Ok(mut opened) = lock.lock() else {
            return;
        };
        while !*opened {
            opened = match cvar.wait(opened) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }
}

/// In-process [`LlmClient`] with canned replies.
pub struct ScriptedClient {
    responder: Box<Responder>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    gate: Option<Gate>,
}

impl ScriptedClient {
    /// Replies in call order; once the queue is empty every call fails.
    pub fn new(replies: Vec<Result<GenerateResponse, String>>) -> Self {
        let queue = Mutex::new(VecDeque::from(replies));
        Self::from_fn(move |_| {
            let next = queue
                .lock()
                .map_err(|_| anyhow!("scripted queue poisoned"))?
                .pop_front();
            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("scripted client has no replies left")),
            }
        })
    }

    pub fn from_fn(
        responder: impl Fn(&GenerateRequest) -> Result<GenerateResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handle to the requests seen so far; stays valid after the client is boxed.
    pub fn requests(&self) -> Arc<Mutex<Vec<GenerateRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn into_generator(self) -> Generator {
        Generator::new(Box::new(self), &LlmConfig::default())
    }
}

impl LlmClient for ScriptedClient {
    fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(req.clone());
        }
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        (self.responder)(req)
    }
}

pub fn reply(text: &str, thinking: Option<&str>) -> GenerateResponse {
    GenerateResponse {
        text: text.to_string(),
        thinking: thinking.map(ToString::to_string),
        finish_reason: "STOP".to_string(),
    }
}

pub fn sample_flashcards_json(count: usize) -> String {
    let cards: Vec<_> = (1..=count)
        .map(|i| {
            json!({
                "id": format!("card-{i}"),
                "question": format!("What is concept {i}?"),
                "answer": format!("Concept {i} is a key idea."),
                "category": "Biology"
            })
        })
        .collect();
    serde_json::Value::Array(cards).to_string()
}

/// Five questions whose correct answers are `[1, 3, 0, 2, 1]`.
pub fn sample_quiz() -> Vec<QuizQuestion> {
    [1usize, 3, 0, 2, 1]
        .iter()
        .enumerate()
        .map(|(i, correct)| QuizQuestion {
            id: format!("q{}", i + 1),
            question: format!("Question {}?", i + 1),
            options: vec![
                "Alpha".to_string(),
                "Beta".to_string(),
                "Gamma".to_string(),
                "Delta".to_string(),
            ],
            correct_answer: *correct,
            explanation: format!("Option {correct} is right."),
        })
        .collect()
}

pub fn sample_quiz_json() -> String {
    serde_json::to_string(&sample_quiz()).unwrap_or_else(|_| "[]".to_string())
}

pub fn sample_plan_json() -> String {
    json!([
        {"id": "m1", "title": "Foundations", "duration": "2 days", "tasks": ["Read chapter 1", "Summarize terms"]},
        {"id": "m2", "title": "Core processes", "duration": "3 days", "tasks": ["Draw the cycle"]},
        {"id": "m3", "title": "Practice", "duration": "2 days", "tasks": ["Flashcards", "Quiz"]},
        {"id": "m4", "title": "Review", "duration": "1 day", "tasks": ["Teach it back"]}
    ])
    .to_string()
}

/// A `generateContent` success body with optional thought part.
pub fn gemini_body(text: &str, thinking: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(thought) = thinking {
        parts.push(json!({ "text": thought, "thought": true }));
    }
    parts.push(json!({ "text": text }));
    json!({
        "candidates": [{ "content": { "role": "model", "parts": parts }, "finishReason": "STOP" }]
    })
    .to_string()
}

pub fn temp_workspace() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(runtime_dir(dir.path()))?;
    Ok(dir)
}

/// Points the workspace's project settings at `endpoint` with a fixed key.
pub fn write_settings(workspace: &Path, endpoint: &str) -> Result<()> {
    let dir = runtime_dir(workspace);
    fs::create_dir_all(&dir)?;
    let settings = json!({
        "llm": {
            "endpoint": endpoint,
            "api_key": "test-key",
            "api_key_env": "MENTOR_TESTKIT_UNSET_KEY",
            "max_retries": 0,
            "retry_base_ms": 1
        }
    });
    fs::write(dir.join("settings.json"), serde_json::to_vec_pretty(&settings)?)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct MockHttpResponse {
    pub status: u16,
    pub body: String,
}

impl MockHttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Local HTTP server that answers `generateContent` calls from a script.
/// The last scripted response repeats once the script runs out.
pub struct MockGeminiServer {
    pub endpoint: String,
    request_count: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<String>>>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockGeminiServer {
    pub fn start(scripted: Vec<MockHttpResponse>) -> Result<Self> {
        if scripted.is_empty() {
            return Err(anyhow!("mock server needs at least one scripted response"));
        }
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let request_count = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let count_thread = Arc::clone(&request_count);
        let bodies_thread = Arc::clone(&bodies);
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                if rx.try_recv().is_ok() {
                    break;
                }
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let body = read_request_body(&mut stream).unwrap_or_default();
                        if let Ok(mut seen) = bodies_thread.lock() {
                            seen.push(body);
                        }
                        let idx = count_thread.fetch_add(1, Ordering::SeqCst);
                        let selected = scripted
                            .get(idx)
                            .or_else(|| scripted.last())
                            .cloned()
                            .unwrap_or_else(|| MockHttpResponse::status(500, "{}"));
                        let response = format!(
                            "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            selected.status,
                            selected.body.len(),
                            selected.body
                        );
                        let _ = stream.write_all(response.as_bytes());
                        let _ = stream.flush();
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(2));
                    }
                    Err(_) => break,
                }
            }
        });
        Ok(Self {
            endpoint: format!("http://{addr}"),
            request_count,
            bodies,
            stop_tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// JSON bodies of the requests received so far.
    pub fn request_bodies(&self) -> Vec<serde_json::Value> {
        self.bodies
            .lock()
            .map(|seen| {
                seen.iter()
                    .filter_map(|raw| serde_json::from_str(raw).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_request_body(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let mut header_end = None;
    while header_end.is_none() {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|idx| idx + 4);
    }
    let header_len = header_end.unwrap_or(buffer.len());
    let content_length = String::from_utf8_lossy(&buffer[..header_len])
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    while buffer.len() < header_len + content_length {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    Ok(String::from_utf8_lossy(&buffer[header_len..]).into_owned())
}
