use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use mentor_core::{GenerateRequest, GenerateResponse, LlmConfig};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use std::thread;
use std::time::Duration;

pub mod generator;

pub use generator::{
    Batch, GenerationError, Generator, ReasoningReply, SchemaViolation, flashcard_schema,
    quiz_schema, study_plan_schema,
};

/// Base delay for network/transport error retries (1s, 2s, 4s exponential backoff).
const NETWORK_RETRY_BASE_MS: u64 = 1000;

const API_KEY_URL: &str = "https://aistudio.google.com/apikey";

pub trait LlmClient: Send + Sync {
    /// One `generateContent` round trip, retried on transient failures.
    fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    cfg: LlmConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        let timeout = (cfg.timeout_seconds > 0).then(|| Duration::from_secs(cfg.timeout_seconds));
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { cfg, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.cfg
    }

    fn request_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.cfg.endpoint.trim_end_matches('/'),
            model
        )
    }

    fn generate_inner(&self, req: &GenerateRequest, api_key: &str) -> Result<GenerateResponse> {
        let url = self.request_url(&req.model);
        let payload = build_payload(req);

        let mut last_err: Option<anyhow::Error> = None;
        let mut attempt: u8 = 0;
        while attempt <= self.cfg.max_retries {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&payload)
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = parse_retry_after_seconds(resp.headers().get(RETRY_AFTER));
                    let body = resp.text()?;
                    if status.is_success() {
                        return parse_generate_payload(&body);
                    }

                    last_err = Some(format_api_error(
                        status,
                        &body,
                        attempt,
                        self.cfg.max_retries,
                        &self.cfg.api_key_env,
                    ));
                    if should_retry_status(status) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay_ms(self.cfg.retry_base_ms, attempt, retry_after));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    last_err = Some(format_transport_error(&e));
                    if should_retry_transport_error(&e) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay_ms(NETWORK_RETRY_BASE_MS, attempt, None));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("gemini request failed without detailed error")))
    }

    fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.cfg.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.cfg
                    .api_key
                    .as_ref()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        if !self.cfg.provider.eq_ignore_ascii_case("gemini") {
            return Err(anyhow!(
                "unsupported llm.provider '{}' (only 'gemini' is supported)",
                self.cfg.provider
            ));
        }
        let key = self.resolve_api_key().ok_or_else(|| {
            anyhow!(
                "Missing Gemini API key. Set {} or configure llm.api_key in .mentor/settings.json.\n\
                 Get an API key at {API_KEY_URL}",
                self.cfg.api_key_env
            )
        })?;
        self.generate_inner(req, &key)
    }
}

/// Builds the `generateContent` body: one user turn with the prompt text
/// followed by inline attachments.
fn build_payload(req: &GenerateRequest) -> Value {
    let mut parts = vec![json!({ "text": req.prompt })];
    for att in &req.attachments {
        parts.push(json!({
            "inlineData": { "mimeType": att.mime_type, "data": att.data }
        }));
    }
    let mut payload = json!({ "contents": [{ "role": "user", "parts": parts }] });

    if let Some(instruction) = req
        .system_instruction
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        payload["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }

    let mut generation_config = Map::new();
    if let Some(schema) = &req.response_schema {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
        generation_config.insert("responseSchema".into(), schema.clone());
    }
    if let Some(budget) = req.thinking_budget {
        generation_config.insert(
            "thinkingConfig".into(),
            json!({ "thinkingBudget": budget, "includeThoughts": true }),
        );
    }
    if !generation_config.is_empty() {
        payload["generationConfig"] = Value::Object(generation_config);
    }
    payload
}

/// Produce a user-friendly error from a Gemini API HTTP response.
fn format_api_error(
    status: StatusCode,
    body: &str,
    attempt: u8,
    max_retries: u8,
    api_key_env: &str,
) -> anyhow::Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED => anyhow!(
            "Invalid or missing API key (HTTP 401).\n\
             Set {api_key_env} environment variable or configure llm.api_key in settings.\n\
             Get an API key at {API_KEY_URL}"
        ),
        StatusCode::FORBIDDEN => anyhow!(
            "Permission denied (HTTP 403). The API key cannot use this model or endpoint.\n\
             Check the key's project settings at {API_KEY_URL}. Detail: {detail}"
        ),
        StatusCode::TOO_MANY_REQUESTS => anyhow!(
            "Rate limited (HTTP 429). Exhausted {}/{} retries. Try again shortly or reduce request frequency. Detail: {}",
            attempt + 1,
            max_retries + 1,
            detail
        ),
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => anyhow!(
            "Gemini server error (HTTP {}). Exhausted {}/{} retries. The service may be temporarily unavailable. Detail: {}",
            status.as_u16(),
            attempt + 1,
            max_retries + 1,
            detail
        ),
        _ => anyhow!("Gemini API error (HTTP {}): {}", status.as_u16(), detail),
    }
}

/// Produce a user-friendly error from a transport/network failure.
fn format_transport_error(err: &reqwest::Error) -> anyhow::Error {
    let inner_msg = err
        .source()
        .map(|e| e.to_string())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_dns = inner_msg.contains("dns")
        || inner_msg.contains("resolve")
        || inner_msg.contains("name or service not known")
        || inner_msg.contains("no such host")
        || inner_msg.contains("getaddrinfo");

    if err.is_timeout() {
        anyhow!(
            "Request timed out. The Gemini API did not respond in time.\n\
             Increase llm.timeout_seconds (0 disables the timeout) if this persists."
        )
    } else if is_dns {
        anyhow!(
            "DNS resolution failed. Could not resolve the Gemini API hostname.\n\
             Check your internet connection and DNS settings."
        )
    } else if err.is_connect() {
        anyhow!(
            "Connection refused. Could not reach the Gemini API at the configured endpoint.\n\
             Check llm.endpoint, your network connection and firewall settings."
        )
    } else {
        anyhow!("Network error: {err}")
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn should_retry_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn parse_retry_after_seconds(header: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    let value = header?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    parse_retry_after_http_date(value)
}

fn parse_retry_after_http_date(value: &str) -> Option<u64> {
    let retry_at = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
        .ok()?;
    let delta = retry_at.signed_duration_since(Utc::now()).num_seconds();
    Some(delta.max(0) as u64)
}

fn retry_delay_ms(base_ms: u64, attempt: u8, retry_after_seconds: Option<u64>) -> Duration {
    if let Some(seconds) = retry_after_seconds {
        return Duration::from_millis(seconds.saturating_mul(1000));
    }
    let exponential = base_ms.saturating_mul(2_u64.saturating_pow(u32::from(attempt)));
    Duration::from_millis(exponential.max(base_ms.max(1)))
}

/// Splits `candidates[0].content.parts` into answer text and thought parts.
fn parse_generate_payload(body: &str) -> Result<GenerateResponse> {
    let value: Value = serde_json::from_str(body)?;
    let candidate = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first());
    let Some(candidate) = candidate else {
        if let Some(reason) = value
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(anyhow!("prompt was blocked by the provider ({reason})"));
        }
        return Err(anyhow!("unexpected generateContent payload: missing candidates[0]"));
    };

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or("STOP")
        .to_string();

    let mut text = String::new();
    let mut thinking = String::new();
    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for part in parts {
        let Some(chunk) = part.get("text").and_then(Value::as_str) else {
            continue;
        };
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            thinking.push_str(chunk);
        } else {
            text.push_str(chunk);
        }
    }

    Ok(GenerateResponse {
        text,
        thinking: (!thinking.trim().is_empty()).then_some(thinking),
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::InlineAttachment;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, mpsc};
    use std::time::Duration as StdDuration;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "gemini-3-flash-preview".to_string(),
            prompt: prompt.to_string(),
            attachments: vec![],
            system_instruction: None,
            response_schema: None,
            thinking_budget: None,
        }
    }

    fn test_config(endpoint: &str, key_env: &str) -> LlmConfig {
        LlmConfig {
            endpoint: endpoint.to_string(),
            api_key_env: key_env.to_string(),
            api_key: Some("test-key".to_string()),
            max_retries: 2,
            retry_base_ms: 1,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn parses_text_and_thought_parts_separately() {
        let body = r####"{"candidates":[{"content":{"parts":[
            {"text":"Recall the definition. ","thought":true},
            {"text":"Then apply it.","thought":true},
            {"text":"### Osmosis\n* water moves"}
        ]},"finishReason":"STOP"}]}"####;
        let parsed = parse_generate_payload(body).expect("parse");
        assert_eq!(parsed.text, "### Osmosis\n* water moves");
        assert_eq!(
            parsed.thinking.as_deref(),
            Some("Recall the definition. Then apply it.")
        );
        assert_eq!(parsed.finish_reason, "STOP");
    }

    #[test]
    fn reply_without_thought_part_has_no_thinking() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"plain answer"}]}}]}"#;
        let parsed = parse_generate_payload(body).expect("parse");
        assert_eq!(parsed.text, "plain answer");
        assert!(parsed.thinking.is_none());
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let err = parse_generate_payload(r#"{"candidates":[]}"#).expect_err("no candidates");
        assert!(err.to_string().contains("missing candidates[0]"));

        let blocked = parse_generate_payload(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .expect_err("blocked");
        assert!(blocked.to_string().contains("SAFETY"));
    }

    #[test]
    fn payload_carries_attachments_schema_and_thinking_config() {
        let mut req = request("explain this diagram");
        req.attachments = vec![InlineAttachment::from_bytes(b"png", "image/png")];
        req.system_instruction = Some("You are MentorAI.".to_string());
        req.thinking_budget = Some(32_768);
        let payload = build_payload(&req);

        let parts = payload["contents"][0]["parts"].as_array().expect("parts");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "explain this diagram");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "You are MentorAI.");
        assert_eq!(
            payload["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            32_768
        );
        assert!(payload["generationConfig"].get("responseSchema").is_none());

        let mut batch = request("cards");
        batch.response_schema = Some(flashcard_schema());
        let payload = build_payload(&batch);
        assert_eq!(payload["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(payload["generationConfig"]["responseSchema"]["type"], "ARRAY");
        assert!(payload.get("systemInstruction").is_none());
    }

    #[test]
    fn retry_status_classification() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!should_retry_status(StatusCode::UNAUTHORIZED));
        assert!(!should_retry_status(StatusCode::FORBIDDEN));
        assert!(!should_retry_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn format_api_error_401_includes_setup_instructions() {
        let err = format_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"code":401,"message":"API key not valid","status":"UNAUTHENTICATED"}}"#,
            0,
            3,
            "GEMINI_API_KEY",
        );
        let msg = err.to_string();
        assert!(msg.contains("Invalid or missing API key"), "{msg}");
        assert!(msg.contains("GEMINI_API_KEY"), "{msg}");
        assert!(msg.contains("llm.api_key"), "{msg}");
        assert!(msg.contains(API_KEY_URL), "{msg}");
    }

    #[test]
    fn format_api_error_extracts_nested_message() {
        let err = format_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"Invalid JSON payload","status":"INVALID_ARGUMENT"}}"#,
            0,
            3,
            "GEMINI_API_KEY",
        );
        assert_eq!(
            err.to_string(),
            "Gemini API error (HTTP 400): Invalid JSON payload"
        );
    }

    #[test]
    fn network_retry_base_uses_one_second_delays() {
        assert_eq!(NETWORK_RETRY_BASE_MS, 1000);
        assert_eq!(
            retry_delay_ms(NETWORK_RETRY_BASE_MS, 0, None),
            Duration::from_millis(1000)
        );
        assert_eq!(
            retry_delay_ms(NETWORK_RETRY_BASE_MS, 2, None),
            Duration::from_millis(4000)
        );
        assert_eq!(retry_delay_ms(400, 1, Some(3)), Duration::from_millis(3000));
    }

    #[test]
    fn retry_after_parses_seconds_and_http_date() {
        let seconds_header = reqwest::header::HeaderValue::from_static("7");
        assert_eq!(parse_retry_after_seconds(Some(&seconds_header)), Some(7));

        let future = Utc::now() + chrono::Duration::seconds(5);
        let http_date = future.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let date_header = reqwest::header::HeaderValue::from_str(&http_date).expect("header");
        let parsed = parse_retry_after_seconds(Some(&date_header)).expect("parsed");
        assert!(parsed <= 10);
    }

    #[test]
    fn resolve_api_key_uses_config_fallback() {
        let cfg = test_config("http://127.0.0.1:9", "GEMINI_API_KEY_TEST_FALLBACK");
        let client = GeminiClient::new(cfg).expect("client");
        // SAFETY: test-only process-level env mutation.
        unsafe {
            std::env::remove_var("GEMINI_API_KEY_TEST_FALLBACK");
        }
        assert_eq!(client.resolve_api_key().as_deref(), Some("test-key"));
    }

    #[test]
    fn missing_api_key_fails_before_any_request() {
        let server = start_mock_server(vec![MockHttpResponse::ok(
            r#"{"candidates":[{"content":{"parts":[{"text":"never"}]}}]}"#,
        )]);
        let cfg = LlmConfig {
            api_key: None,
            ..test_config(&server.endpoint, "GEMINI_API_KEY_MISSING_TEST")
        };
        // SAFETY: test-only process-level env mutation.
        unsafe {
            std::env::remove_var("GEMINI_API_KEY_MISSING_TEST");
        }
        let client = GeminiClient::new(cfg).expect("client");
        let err = client.generate(&request("hi")).expect_err("no key");
        assert!(err.to_string().contains("Missing Gemini API key"));
        assert!(err.to_string().contains("GEMINI_API_KEY_MISSING_TEST"));
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn generate_posts_to_model_endpoint_with_key_header() {
        let server = start_mock_server(vec![MockHttpResponse::ok(
            r#"{"candidates":[{"content":{"parts":[{"text":"[]"}]}}]}"#,
        )]);
        let client = GeminiClient::new(test_config(&server.endpoint, "GEMINI_KEY_HEADER_TEST"))
            .expect("client");
        let response = client.generate(&request("cards please")).expect("generate");
        assert_eq!(response.text, "[]");

        let seen = server.requests();
        assert_eq!(seen.len(), 1);
        assert!(
            seen[0]
                .starts_with("POST /models/gemini-3-flash-preview:generateContent HTTP/1.1"),
            "{}",
            seen[0]
        );
        assert!(seen[0].to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(seen[0].contains("cards please"));
    }

    #[test]
    fn generate_retries_transient_status_then_succeeds() {
        let server = start_mock_server(vec![
            MockHttpResponse {
                status: 503,
                body: r#"{"error":{"code":503,"message":"overloaded"}}"#.to_string(),
                retry_after: Some("0".to_string()),
            },
            MockHttpResponse::ok(
                r#"{"candidates":[{"content":{"parts":[{"text":"ok-after-retry"}]}}]}"#,
            ),
        ]);
        let client = GeminiClient::new(test_config(&server.endpoint, "GEMINI_KEY_RETRY_TEST"))
            .expect("client");
        let response = client.generate(&request("retry")).expect("success after retry");
        assert_eq!(response.text, "ok-after-retry");
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn generate_stops_after_bounded_retries() {
        let server = start_mock_server(vec![MockHttpResponse {
            status: 429,
            body: r#"{"error":{"code":429,"message":"quota"}}"#.to_string(),
            retry_after: Some("0".to_string()),
        }]);
        let client = GeminiClient::new(test_config(&server.endpoint, "GEMINI_KEY_LIMIT_TEST"))
            .expect("client");
        let err = client.generate(&request("limit")).expect_err("exhausted");
        assert!(err.to_string().contains("Rate limited (HTTP 429)"));
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn generate_does_not_retry_auth_failures() {
        let server = start_mock_server(vec![MockHttpResponse {
            status: 401,
            body: r#"{"error":{"code":401,"message":"API key not valid"}}"#.to_string(),
            retry_after: None,
        }]);
        let client = GeminiClient::new(test_config(&server.endpoint, "GEMINI_KEY_401_TEST"))
            .expect("client");
        let err = client.generate(&request("hello")).expect_err("401");
        assert!(err.to_string().contains("Invalid or missing API key"));
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn unsupported_provider_is_rejected() {
        let cfg = LlmConfig {
            provider: "openai".to_string(),
            ..test_config("http://127.0.0.1:9", "GEMINI_KEY_PROVIDER_TEST")
        };
        let client = GeminiClient::new(cfg).expect("client");
        let err = client.generate(&request("x")).expect_err("provider");
        assert!(err.to_string().contains("unsupported llm.provider"));
    }

    #[derive(Clone)]
    struct MockHttpResponse {
        status: u16,
        body: String,
        retry_after: Option<String>,
    }

    impl MockHttpResponse {
        fn ok(body: &str) -> Self {
            Self {
                status: 200,
                body: body.to_string(),
                retry_after: None,
            }
        }
    }

    struct MockServer {
        endpoint: String,
        request_count: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<String>>>,
        stop_tx: Option<mpsc::Sender<()>>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl MockServer {
        fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("requests").clone()
        }
    }

    impl Drop for MockServer {
        fn drop(&mut self) {
            if let Some(tx) = self.stop_tx.take() {
                let _ = tx.send(());
            }
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn start_mock_server(scripted: Vec<MockHttpResponse>) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        listener
            .set_nonblocking(true)
            .expect("set nonblocking listener");
        let addr = listener.local_addr().expect("addr");
        let request_count = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let count_thread = Arc::clone(&request_count);
        let requests_thread = Arc::clone(&requests);
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                if rx.try_recv().is_ok() {
                    break;
                }
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let raw = read_http_request(&mut stream).unwrap_or_default();
                        requests_thread.lock().expect("requests").push(raw);
                        let idx = count_thread.fetch_add(1, Ordering::SeqCst);
                        let Some(selected) = scripted.get(idx).or_else(|| scripted.last()) else {
                            break;
                        };
                        let mut headers = format!(
                            "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                            selected.status,
                            selected.body.len()
                        );
                        if let Some(retry_after) = &selected.retry_after {
                            headers.push_str(&format!("Retry-After: {retry_after}\r\n"));
                        }
                        headers.push_str("\r\n");
                        let _ = stream.write_all(format!("{headers}{}", selected.body).as_bytes());
                        let _ = stream.flush();
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(StdDuration::from_millis(2));
                    }
                    Err(_) => break,
                }
            }
        });
        MockServer {
            endpoint: format!("http://{addr}"),
            request_count,
            requests,
            stop_tx: Some(tx),
            handle: Some(handle),
        }
    }

    fn read_http_request(stream: &mut std::net::TcpStream) -> std::io::Result<String> {
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
                key.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buffer.len() < header_len + content_length {
            let read = stream.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
