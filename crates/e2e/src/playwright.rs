//! Playwright browser automation
//!
//! Each page is backed by a long-lived Node.js bridge process that owns one
//! browser and one isolated context. Rust talks to it over stdin/stdout with
//! newline-delimited JSON:
//!
//! ```text
//! bridge → {"ready":true}
//! rust   → {"id":1,"op":"goto","url":"...","timeoutMs":30000}
//! bridge → {"id":1,"ok":true,"value":null}
//! rust   → {"id":2,"op":"candidates"}
//! bridge → {"id":2,"ok":true,"value":[{"is_input":true,"text":"mama"},{"is_input":false,"text":"මම"}]}
//! ```
//!
//! The bridge only reports what matches the output signature. Which node
//! counts as the output is decided on the Rust side by
//! [`crate::driver::rendered_text`], the same rule the convergence detector
//! applies.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use crate::config::HarnessConfig;
use crate::driver::{
    rendered_text, DriverFactory, ElementHandle, OutputCandidate, PageDriver, Region,
};
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');
const opts = JSON.parse(process.argv[2]);

(async () => {
  const browser = await playwright[opts.browser].launch({ headless: opts.headless });
  const context = await browser.newContext();
  const page = await context.newPage();
  page.setDefaultTimeout(opts.actionTimeoutMs);

  const input = () => page.getByRole('textbox', { name: opts.inputLabel });

  const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
  const fail = (kind, message) => Object.assign(new Error(message), { kind });

  let closing = false;
  const shutdown = async () => {
    if (closing) return;
    closing = true;
    try { await browser.close(); } catch (_) {}
    process.exit(0);
  };
  process.on('SIGTERM', shutdown);

  const handlers = {
    goto: async (req) => {
      try {
        await page.goto(req.url, { waitUntil: 'load', timeout: req.timeoutMs });
        await page.waitForLoadState('networkidle', { timeout: req.timeoutMs });
      } catch (e) {
        throw fail('navigation', String(e.message || e));
      }
      return null;
    },
    count: async () => input().count(),
    clear: async () => { await input().clear(); return null; },
    fill: async (req) => { await input().fill(req.text); return null; },
    type: async (req) => {
      await input().pressSequentially(req.text, { delay: req.delayMs });
      return null;
    },
    candidates: async () => page.evaluate((selector) =>
      Array.from(document.querySelectorAll(selector)).map((el) => {
        const editable = el.tagName === 'TEXTAREA' || el.tagName === 'INPUT';
        return {
          is_input: editable
            || el.getAttribute('role') === 'textbox'
            || el.isContentEditable,
          text: (editable ? el.value : el.textContent) || '',
        };
      }), opts.outputSelector),
    close: async () => { setImmediate(shutdown); return null; },
  };

  send({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      send({ id: null, ok: false, kind: 'protocol', message: String(e.message || e) });
      continue;
    }
    const handler = handlers[req.op];
    if (!handler) {
      send({ id: req.id, ok: false, kind: 'protocol', message: 'unknown op ' + req.op });
      continue;
    }
    try {
      send({ id: req.id, ok: true, value: await handler(req) });
    } catch (e) {
      send({ id: req.id, ok: false, kind: e.kind || 'playwright', message: String(e.message || e) });
    }
  }
  await shutdown();
})().catch((e) => {
  process.stdout.write(JSON.stringify({ ready: false, message: String((e && e.message) || e) }) + '\n');
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("Unknown browser: {}", other))),
        }
    }
}

/// Configuration for the Playwright bridge
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,

    /// Node.js executable
    pub node_binary: PathBuf,

    /// Extra module search path, for a `playwright` install outside the cwd
    pub node_path: Option<PathBuf>,

    /// Bound on any single bridge command besides navigation and typing
    pub command_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node_binary: PathBuf::from("node"),
            node_path: None,
            command_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeMessage {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// A command the bridge rejected
#[derive(Debug)]
struct BridgeFailure {
    kind: String,
    message: String,
}

/// One browser page behind a bridge process
pub struct PlaywrightPage {
    config: Arc<HarnessConfig>,
    command_timeout: Duration,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    /// A request line may have been cut short by a cancelled write
    torn_write: bool,
    _script: Arc<tempfile::TempDir>,
}

impl PlaywrightPage {
    async fn launch(
        config: Arc<HarnessConfig>,
        pw: &PlaywrightConfig,
        script: Arc<tempfile::TempDir>,
    ) -> E2eResult<Self> {
        let opts = json!({
            "browser": pw.browser.as_str(),
            "headless": pw.headless,
            "actionTimeoutMs": pw.command_timeout.as_millis() as u64,
            "inputLabel": config.selectors.input_label,
            "outputSelector": config.selectors.output_container,
        });

        let mut cmd = TokioCommand::new(&pw.node_binary);
        cmd.arg(script.path().join("bridge.js"))
            .arg(opts.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = &pw.node_path {
            cmd.env("NODE_PATH", path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::Bridge(format!("Failed to spawn {}: {}", pw.node_binary.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[bridge] {}", line);
                }
            });
        }

        let mut page = Self {
            config,
            command_timeout: pw.command_timeout,
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            torn_write: false,
            _script: script,
        };

        let launch_timeout = page.config.timeouts.navigation();
        let greeting = timeout(launch_timeout, page.read_message())
            .await
            .map_err(|_| E2eError::Bridge(format!("browser did not start within {:?}", launch_timeout)))??;
        match greeting.ready {
            Some(true) => {
                debug!("Bridge ready ({})", pw.browser.as_str());
                Ok(page)
            }
            _ => Err(E2eError::Bridge(format!(
                "browser launch failed: {}",
                greeting.message.unwrap_or_default()
            ))),
        }
    }

    async fn read_message(&mut self) -> E2eResult<BridgeMessage> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Bridge("bridge exited".to_string()))?;
            trace!("bridge <- {}", line);
            match serde_json::from_str::<BridgeMessage>(&line) {
                Ok(msg) => return Ok(msg),
                Err(_) => debug!("[bridge stdout] {}", line),
            }
        }
    }

    /// Send one command and wait for its reply
    async fn request(
        &mut self,
        op: &str,
        args: Value,
        limit: Duration,
    ) -> E2eResult<Result<Value, BridgeFailure>> {
        let id = self.next_id;
        self.next_id += 1;

        let mut payload = json!({ "id": id, "op": op });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), args) {
            target.extend(extra);
        }
        let line = payload.to_string();
        trace!("bridge -> {}", line);

        if self.torn_write {
            // Terminate the partial line; the bridge answers it with id null
            debug!("Recovering from an interrupted request write");
            self.stdin.write_all(b"\n").await?;
        }
        self.torn_write = true;
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        self.torn_write = false;

        let reply = timeout(limit, async {
            loop {
                let msg = self.read_message().await?;
                if msg.id == Some(id) {
                    return Ok::<_, E2eError>(msg);
                }
                warn!("Discarding bridge reply for id {:?} while waiting for {}", msg.id, id);
            }
        })
        .await
        .map_err(|_| E2eError::Bridge(format!("'{}' did not answer within {:?}", op, limit)))??;

        if reply.ok {
            Ok(Ok(reply.value))
        } else {
            Ok(Err(BridgeFailure {
                kind: reply.kind.unwrap_or_else(|| "unknown".to_string()),
                message: reply.message.unwrap_or_default(),
            }))
        }
    }

    /// `request` for commands whose failures carry no special meaning
    async fn call(&mut self, op: &str, args: Value) -> E2eResult<Value> {
        let limit = self.command_timeout;
        self.request(op, args, limit)
            .await?
            .map_err(|f| E2eError::Bridge(format!("{} failed ({}): {}", op, f.kind, f.message)))
    }

    fn not_found(&self, region: Region) -> E2eError {
        let selector = match region {
            Region::Input => &self.config.selectors.input_label,
            Region::Output => &self.config.selectors.output_container,
        };
        E2eError::ElementNotFound {
            region: region.to_string(),
            selector: selector.clone(),
        }
    }

    async fn locate(&mut self, region: Region) -> E2eResult<ElementHandle> {
        let count = match region {
            Region::Input => self.call("count", json!({})).await?.as_u64().unwrap_or(0) as usize,
            Region::Output => self
                .output_candidates()
                .await?
                .iter()
                .filter(|c| !c.is_input)
                .count(),
        };
        if count == 0 {
            return Err(self.not_found(region));
        }
        let selector = match region {
            Region::Input => self.config.selectors.input_label.clone(),
            Region::Output => self.config.selectors.output_container.clone(),
        };
        Ok(ElementHandle {
            region,
            selector,
            matches: count,
        })
    }

    fn terminate(&mut self) {
        // SIGTERM lets the bridge close its browser before exiting
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn open(&mut self) -> E2eResult<()> {
        let url = self.config.url.clone();
        let navigation = self.config.timeouts.navigation();
        debug!("Navigating to {}", url);

        let reply = self
            .request(
                "goto",
                json!({ "url": url, "timeoutMs": navigation.as_millis() as u64 }),
                navigation * 2 + self.command_timeout,
            )
            .await
            .map_err(|e| E2eError::Navigation {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        reply.map_err(|f| E2eError::Navigation {
            url,
            reason: f.message,
        })?;

        sleep(self.config.timeouts.page_load_settle()).await;
        Ok(())
    }

    async fn locate_input(&mut self) -> E2eResult<ElementHandle> {
        self.locate(Region::Input).await
    }

    async fn locate_output(&mut self) -> E2eResult<ElementHandle> {
        self.locate(Region::Output).await
    }

    async fn clear_input(&mut self) -> E2eResult<()> {
        self.call("clear", json!({})).await?;
        Ok(())
    }

    async fn set_input_text(&mut self, text: &str) -> E2eResult<()> {
        self.call("fill", json!({ "text": text })).await?;
        Ok(())
    }

    async fn simulate_keystrokes(&mut self, text: &str, per_char_delay: Duration) -> E2eResult<()> {
        let typing = per_char_delay * text.chars().count() as u32;
        let limit = typing + self.command_timeout;
        self.request(
            "type",
            json!({ "text": text, "delayMs": per_char_delay.as_millis() as u64 }),
            limit,
        )
        .await?
        .map_err(|f| E2eError::Bridge(format!("type failed ({}): {}", f.kind, f.message)))?;
        Ok(())
    }

    async fn read_output_text(&mut self) -> E2eResult<String> {
        let candidates = self.output_candidates().await?;
        rendered_text(&candidates).ok_or_else(|| self.not_found(Region::Output))
    }

    async fn output_candidates(&mut self) -> E2eResult<Vec<OutputCandidate>> {
        let value = self.call("candidates", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&mut self) -> E2eResult<()> {
        let limit = self.command_timeout;
        if let Err(e) = self.request("close", json!({}), limit).await {
            debug!("Bridge close request failed: {}", e);
        }
        match timeout(limit, self.child.wait()).await {
            Ok(status) => {
                debug!("Bridge exited: {:?}", status?);
            }
            Err(_) => {
                warn!("Bridge did not exit within {:?}, killing it", limit);
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

impl Drop for PlaywrightPage {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.terminate();
        }
    }
}

/// Launches one bridge process, and so one browser context, per case
pub struct PlaywrightFactory {
    config: Arc<HarnessConfig>,
    playwright: PlaywrightConfig,
    script: Arc<tempfile::TempDir>,
}

impl PlaywrightFactory {
    pub fn new(config: Arc<HarnessConfig>, playwright: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&playwright)?;

        let script = tempfile::tempdir()?;
        std::fs::write(script.path().join("bridge.js"), BRIDGE_SCRIPT)?;
        debug!("Bridge script staged at {}", script.path().display());

        Ok(Self {
            config,
            playwright,
            script: Arc::new(script),
        })
    }

    /// Check that node can resolve the `playwright` package
    fn check_playwright_installed(playwright: &PlaywrightConfig) -> E2eResult<()> {
        let mut cmd = Command::new(&playwright.node_binary);
        cmd.args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(path) = &playwright.node_path {
            cmd.env("NODE_PATH", path);
        }

        match cmd.status() {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    type Driver = PlaywrightPage;

    async fn new_session(&self) -> E2eResult<PlaywrightPage> {
        PlaywrightPage::launch(self.config.clone(), &self.playwright, self.script.clone()).await
    }
}
