//! Heavy render strategy
//!
//! Pages that come back as JavaScript shells are rendered by a headless
//! browser reachable over HTTP (a browserless-style `/content` endpoint).
//! The engine is optionally launched as a child process on first use.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, OnceCell};

/// Errors from the render engine
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer disabled")]
    Disabled,

    #[error("render engine failed to start: {0}")]
    Launch(String),

    #[error("render request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("render engine answered HTTP {0}")]
    Status(u16),
}

/// A strategy that returns the fully rendered HTML of a page
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders a page and returns its HTML after network idleness
    async fn render(&self, url: &str) -> Result<String, RenderError>;

    /// Returns false when `render` can never succeed
    fn is_enabled(&self) -> bool {
        true
    }

    /// Releases the engine
    async fn shutdown(&self) {}
}

/// Renderer used when no engine is configured
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, _url: &str) -> Result<String, RenderError> {
        Err(RenderError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Headless browser driven over HTTP
pub struct HeadlessRenderer {
    client: Client,
    endpoint: String,
    launch_command: Vec<String>,
    timeout: Duration,
    startup_timeout: Duration,
    started: OnceCell<Result<(), String>>,
    child: Mutex<Option<Child>>,
}

impl HeadlessRenderer {
    /// Creates a renderer for an engine at `endpoint`
    ///
    /// Nothing is started until the first render.
    pub fn new(
        endpoint: &str,
        launch_command: Vec<String>,
        timeout: Duration,
        startup_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            launch_command,
            timeout,
            startup_timeout,
            started: OnceCell::new(),
            child: Mutex::new(None),
        })
    }

    /// Starts the engine at most once; a failed start is not retried
    async fn ensure_started(&self) -> Result<(), RenderError> {
        self.started
            .get_or_init(|| async { self.start().await })
            .await
            .clone()
            .map_err(RenderError::Launch)
    }

    async fn start(&self) -> Result<(), String> {
        let (program, args) = match self.launch_command.split_first() {
            Some(split) => split,
            // Engine is managed externally
            None => return Ok(()),
        };

        tracing::info!("Launching render engine: {}", self.launch_command.join(" "));
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("{}: {}", program, e))?;
        *self.child.lock().await = Some(child);

        let deadline = tokio::time::Instant::now() + self.startup_timeout;
        loop {
            if self.client.get(&self.endpoint).send().await.is_ok() {
                tracing::info!("Render engine ready at {}", self.endpoint);
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(format!(
                    "engine not reachable at {} after {:?}",
                    self.endpoint, self.startup_timeout
                ));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        self.ensure_started().await?;

        let body = json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": "networkidle2",
                "timeout": self.timeout.as_millis() as u64,
            },
        });

        let response = self
            .client
            .post(format!("{}/content", self.endpoint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    async fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            match child.kill().await {
                Ok(()) => tracing::info!("Render engine stopped"),
                Err(e) => tracing::warn!("Failed to stop render engine: {}", e),
            }
        }
    }
}
