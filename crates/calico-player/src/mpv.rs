/// mpv as the stream transport, driven over its JSON IPC socket.
///
/// Architecture:
///
/// ```text
///   MpvTransport::load()
///         │  spawn mpv, connect IPC
///         ├── writer_task   ← PendingRequest via mpsc, serialised → socket
///         ├── reader_task   ← JSON lines from socket
///         │                      ├── response (has request_id) → matching oneshot
///         │                      └── unsolicited event          → MpvEvent channel
///         └── watch_events  ← MpvEvent → classify → RecoveryBudget → TransportEvent
/// ```
///
/// Platform notes:
/// - Unix:    Unix domain socket at a per-process temp path
/// - Windows: Named pipe  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calico_proto::platform;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::schedule::ScheduledTask;
use crate::session::FatalKind;
use crate::transport::{OutputSink, Transport, TransportEvent};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type Reply = oneshot::Sender<Result<Value, TransportError>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line, '\n' included
    reply: Reply,
}

/// An mpv event that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.raw.get(key)?.as_str()
    }
}

// ── classification ────────────────────────────────────────────────────────────

/// Map an mpv event to what the player cares about.  Everything else
/// (start-file, playback-restart, audio-reconfig, ...) is dropped.
pub fn classify(event: &MpvEvent) -> Option<TransportEvent> {
    match event.name()? {
        "file-loaded" => Some(TransportEvent::ManifestReady),
        "end-file" => {
            let reason = event.field("reason").unwrap_or("unknown");
            let kind = end_file_kind(reason, event.field("file_error"))?;
            let detail = match event.field("file_error") {
                Some(err) => format!("end-file ({}): {}", reason, err),
                None => format!("end-file ({})", reason),
            };
            Some(TransportEvent::Fatal { kind, detail })
        }
        _ => None,
    }
}

fn end_file_kind(reason: &str, file_error: Option<&str>) -> Option<FatalKind> {
    match reason {
        "error" => Some(file_error_kind(file_error.unwrap_or(""))),
        // A live stream never ends on its own.
        "eof" => Some(FatalKind::Network),
        _ => None,
    }
}

fn file_error_kind(file_error: &str) -> FatalKind {
    let err = file_error.to_ascii_lowercase();
    if ["loading failed", "network", "timeout", "http"]
        .iter()
        .any(|needle| err.contains(needle))
    {
        FatalKind::Network
    } else if ["unrecognized file format", "no audio or video data played", "decod"]
        .iter()
        .any(|needle| err.contains(needle))
    {
        FatalKind::Media
    } else {
        FatalKind::Other
    }
}

/// Caps in-place recoveries between two successful loads.
#[derive(Debug)]
struct RecoveryBudget {
    max_attempts: u32,
    used: u32,
}

impl RecoveryBudget {
    fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            used: 0,
        }
    }

    fn admit(&mut self, event: TransportEvent) -> TransportEvent {
        match &event {
            TransportEvent::ManifestReady => self.used = 0,
            TransportEvent::Fatal {
                kind: FatalKind::Network | FatalKind::Media,
                ..
            } => {
                self.used += 1;
                if self.used > self.max_attempts {
                    return TransportEvent::Fatal {
                        kind: FatalKind::Other,
                        detail: "recovery attempts exhausted".to_string(),
                    };
                }
            }
            TransportEvent::Fatal { .. } => {}
        }
        event
    }
}

async fn watch_events(
    mut mpv_events: mpsc::Receiver<MpvEvent>,
    events: mpsc::Sender<TransportEvent>,
    max_attempts: u32,
) {
    let mut budget = RecoveryBudget::new(max_attempts);
    while let Some(evt) = mpv_events.recv().await {
        let Some(event) = classify(&evt) else {
            continue;
        };
        if events.send(budget.admit(event)).await.is_err() {
            return;
        }
    }
    let _ = events
        .send(TransportEvent::Fatal {
            kind: FatalKind::Other,
            detail: "mpv IPC connection closed".to_string(),
        })
        .await;
}

// ── IPC handle ────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    async fn send(&self, command: Value) -> Result<Value, TransportError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = msg.to_string();
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::Ipc("writer task gone".to_string()))?;

        tokio::time::timeout(REPLY_TIMEOUT, reply_rx)
            .await
            .map_err(|_| TransportError::Ipc(format!("timeout for req={}", req_id)))?
            .map_err(|_| TransportError::Ipc(format!("reply dropped for req={}", req_id)))?
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), TransportError> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }
}

fn start_io_tasks<S>(stream: S) -> (MpvHandle, mpsc::Receiver<MpvEvent>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    let (event_tx, event_rx) = mpsc::channel::<MpvEvent>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    (MpvHandle { tx: cmd_tx }, event_rx)
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(TransportError::Ipc(reason.to_string())));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    let Some(tx) = pending.lock().await.remove(&req_id) else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                        continue;
                    };
                    let result = match val["error"].as_str() {
                        Some("success") => Ok(val),
                        other => Err(TransportError::Ipc(
                            other.unwrap_or("unknown error").to_string(),
                        )),
                    };
                    let _ = tx.send(result);
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, &format!("read error: {}", e)).await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} {}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(TransportError::Ipc(format!("write error: {}", e))));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── connection ────────────────────────────────────────────────────────────────

#[cfg(unix)]
async fn connect_ipc(socket_name: &str) -> Result<tokio::net::UnixStream, TransportError> {
    let socket_path = std::path::Path::new(socket_name);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if socket_path.exists() {
            if let Ok(stream) = tokio::net::UnixStream::connect(socket_path).await {
                return Ok(stream);
            }
        }
    }
    Err(TransportError::Ipc("IPC socket did not appear".to_string()))
}

#[cfg(windows)]
async fn connect_ipc(
    socket_name: &str,
) -> Result<tokio::net::windows::named_pipe::NamedPipeClient, TransportError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let pipe_path = format!(r"\\.\pipe\{}", socket_name);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(client) = ClientOptions::new().open(&pipe_path) {
            return Ok(client);
        }
    }
    Err(TransportError::Ipc("named pipe did not appear".to_string()))
}

// ── transport ─────────────────────────────────────────────────────────────────

/// One mpv process per load; `destroy` kills it.
pub struct MpvTransport {
    socket_name: String,
    max_recovery_attempts: u32,
    process: Option<Child>,
    handle: Option<MpvHandle>,
    watcher: Option<ScheduledTask>,
    source_url: Option<String>,
}

impl MpvTransport {
    pub fn new(max_recovery_attempts: u32) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            max_recovery_attempts,
            process: None,
            handle: None,
            watcher: None,
            source_url: None,
        }
    }

    fn handle(&self) -> Result<&MpvHandle, TransportError> {
        self.handle.as_ref().ok_or(TransportError::NotLoaded)
    }

    async fn spawn(&mut self) -> Result<(MpvHandle, mpsc::Receiver<MpvEvent>), TransportError> {
        let binary = platform::find_mpv_binary().ok_or(TransportError::NotFound)?;

        #[cfg(unix)]
        let _ = tokio::fs::remove_file(&self.socket_name).await;

        info!("mpv: spawning {}", binary.display());
        let child = tokio::process::Command::new(binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--pause")
            .arg("--quiet")
            .arg(platform::mpv_socket_arg(&self.socket_name))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.process = Some(child);

        let stream = connect_ipc(&self.socket_name).await?;
        info!("mpv: connected to IPC");
        Ok(start_io_tasks(stream))
    }

    fn source(&self) -> Result<&str, TransportError> {
        self.source_url.as_deref().ok_or(TransportError::NotLoaded)
    }
}

async fn reload(handle: &MpvHandle, url: &str) -> Result<(), TransportError> {
    handle.send(json!(["loadfile", url, "replace"])).await?;
    Ok(())
}

#[async_trait]
impl Transport for MpvTransport {
    async fn load(
        &mut self,
        source_url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        self.destroy().await;

        let (handle, mpv_events) = self.spawn().await?;
        self.watcher = Some(ScheduledTask::spawn(watch_events(
            mpv_events,
            events,
            self.max_recovery_attempts,
        )));
        self.handle = Some(handle);

        info!("mpv: loading {}", source_url);
        self.handle()?.send(json!(["loadfile", source_url])).await?;
        self.source_url = Some(source_url.to_string());
        Ok(())
    }

    async fn attach(&mut self, sink: &OutputSink) -> Result<(), TransportError> {
        let handle = self.handle()?;
        let volume = (sink.volume * 100.0).clamp(0.0, 100.0);
        handle.set_property("volume", json!(volume)).await?;
        if let Some(device) = &sink.device {
            handle.set_property("audio-device", json!(device)).await?;
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), TransportError> {
        self.handle()?.set_property("pause", json!(false)).await
    }

    async fn start_load(&mut self) -> Result<(), TransportError> {
        debug!("mpv: reloading source");
        reload(self.handle()?, self.source()?).await
    }

    async fn recover_media_error(&mut self) -> Result<(), TransportError> {
        debug!("mpv: reloading audio output");
        let (handle, url) = (self.handle()?, self.source()?);
        handle.send(json!(["ao-reload"])).await?;
        reload(handle, url).await
    }

    async fn destroy(&mut self) {
        // Stop listening first so the teardown's own end-file is never reported.
        self.watcher = None;
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.send(json!(["stop"])).await {
                debug!("mpv: stop failed: {}", e);
            }
        }
        if let Some(mut child) = self.process.take() {
            let _ = child.kill().await;
            info!("mpv: process stopped");
        }
        #[cfg(unix)]
        let _ = tokio::fs::remove_file(&self.socket_name).await;
        self.source_url = None;
    }
}
