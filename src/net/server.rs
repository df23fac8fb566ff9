//! The TCP chunk server.
//!
//! One connection task per client reads requests off the socket; chunk
//! requests are dispatched to a small per-connection worker pool so a
//! slow generation never stalls the read loop. Replies are serialized
//! through a per-connection output lock and may leave in a different
//! order than their requests arrived; every reply carries enough
//! identity for the client to match it up.

use std::io::{Error, ErrorKind, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, System};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::constants::{CHUNK_WORKERS, EMERGENCY_EVICT_RADIUS};
use crate::net::protocol::{Request, Response};
use crate::service::ChunkService;

type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Best-effort view of this process's memory pressure. Tracks the
/// server's own resident set, not load from the rest of the host.
struct MemoryMonitor {
    pid: Pid,
    sys: parking_lot::Mutex<System>,
}

impl MemoryMonitor {
    fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
            sys: parking_lot::Mutex::new(System::new()),
        }
    }

    /// (used, total) in bytes: process resident set, total system
    /// memory.
    fn sample(&self) -> (u64, u64) {
        let mut sys = self.sys.lock();
        sys.refresh_memory();
        sys.refresh_process(self.pid);
        let used = sys.process(self.pid).map(|p| p.memory()).unwrap_or(0);
        (used, sys.total_memory())
    }

    fn usage_ratio(&self) -> f64 {
        let (used, total) = self.sample();
        if total == 0 {
            return 0.0;
        }
        used as f64 / total as f64
    }
}

/// Counts requests against a wall-clock second window.
struct RateLimiter {
    max_per_second: u32,
    window: u64,
    count: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            window: 0,
            count: 0,
        }
    }

    fn allow(&mut self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if now != self.window {
            self.window = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.max_per_second
    }
}

/// Accepts connections and serves the chunk protocol.
pub struct GameServer {
    config: ServerConfig,
    service: Arc<ChunkService>,
    memory: MemoryMonitor,
}

impl GameServer {
    pub fn new(config: ServerConfig, service: Arc<ChunkService>) -> Arc<Self> {
        Arc::new(Self {
            config,
            service,
            memory: MemoryMonitor::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<ChunkService> {
        &self.service
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(("0.0.0.0", self.config.port)).await
    }

    /// Runs the accept loop and the autosave task. Only returns on a
    /// listener failure; shutdown is driven externally (see `shutdown`).
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let autosave = tokio::spawn(autosave_loop(
            Arc::clone(&self.service),
            self.config.autosave_interval_seconds,
        ));

        let result = loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("client connected: {peer}");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        match server.drive_connection(stream, peer).await {
                            Ok(()) => info!("client disconnected: {peer}"),
                            Err(e) => info!("client {peer} dropped: {e}"),
                        }
                    });
                }
                Err(e) => break Err(e),
            }
        };

        autosave.abort();
        result
    }

    /// Final save-and-release pass, run once the accept loop has stopped.
    pub async fn shutdown(&self) {
        info!("saving all chunks before shutdown...");
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || {
            let saved = service.save_all();
            service.storage().close_all();
            saved
        })
        .await
        {
            Ok(saved) => info!("shutdown complete, {saved} chunks saved"),
            Err(e) => warn!("shutdown save task failed: {e}"),
        }
    }

    /// Per-connection protocol loop: handshake, then independent
    /// requests until disconnect.
    async fn drive_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        stream.set_nodelay(true)?;
        let (mut reader, writer) = stream.into_split();
        let writer: SharedWriter = Arc::new(Mutex::new(writer));

        // Handshake: nothing but LOGIN is acceptable on a fresh
        // connection.
        match Request::read_from(&mut reader).await? {
            Request::Login => {
                send_bytes(
                    &writer,
                    Response::LoginOk {
                        seed: self.config.world_seed,
                    }
                    .to_bytes(),
                )
                .await?;
            }
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("expected LOGIN, got {other:?}"),
                ));
            }
        }

        let workers = Arc::new(Semaphore::new(CHUNK_WORKERS));
        let mut limiter = RateLimiter::new(self.config.max_requests_per_second);

        loop {
            let request = match Request::read_from(&mut reader).await {
                Ok(request) => request,
                // A vanished peer is a normal way to end a connection.
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            };

            match request {
                Request::Login => {
                    send_bytes(
                        &writer,
                        Response::LoginOk {
                            seed: self.config.world_seed,
                        }
                        .to_bytes(),
                    )
                    .await?;
                }
                Request::GetChunk { cx, cy } => {
                    if !limiter.allow() {
                        warn!("throttling client {peer}: rate limit exceeded");
                        continue;
                    }
                    if cx.abs() > self.config.max_coordinate
                        || cy.abs() > self.config.max_coordinate
                    {
                        warn!("client {peer} requested out-of-range chunk ({cx}, {cy})");
                        continue;
                    }

                    self.check_memory_pressure();

                    let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
                        return Ok(());
                    };
                    let service = Arc::clone(&self.service);
                    let writer = Arc::clone(&writer);
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = send_chunk(&service, &writer, cx, cy).await {
                            warn!("error sending chunk ({cx}, {cy}): {e}");
                        }
                    });
                }
                Request::GetStats => {
                    let (used, total) = self.memory.sample();
                    let response = Response::StatsData {
                        used_memory: used as i64,
                        total_memory: total as i64,
                        // Live task count, one per connection loop and
                        // in-flight chunk worker.
                        active_threads: tokio::runtime::Handle::current()
                            .metrics()
                            .num_alive_tasks() as i32,
                        loaded_chunks: self.service.cache().len() as i32,
                    };
                    send_bytes(&writer, response.to_bytes()).await?;
                }
                Request::Disconnect => return Ok(()),
            }
        }
    }

    /// Under memory pressure, synchronously trim the cache back to the
    /// spawn neighborhood before taking on more work.
    fn check_memory_pressure(&self) {
        let ratio = self.memory.usage_ratio();
        if ratio > self.config.emergency_threshold {
            warn!(
                "high memory usage ({}%), performing emergency unload",
                (ratio * 100.0) as u32
            );
            self.service
                .cache()
                .evict_outside(0, 0, EMERGENCY_EVICT_RADIUS);
        }
        if self.service.cache().over_capacity() {
            warn!(
                "chunk cache over its configured ceiling ({} loaded)",
                self.service.cache().len()
            );
        }
    }
}

/// Resolves one chunk and writes the reply under the output lock.
/// Unmodified chunks ship as a coordinates-only regenerate hint, which
/// costs a few bytes instead of a full frame.
async fn send_chunk(
    service: &Arc<ChunkService>,
    writer: &SharedWriter,
    cx: i32,
    cy: i32,
) -> Result<()> {
    let chunk = Arc::clone(service).get_chunk(cx, cy).await;

    let response = {
        let chunk = chunk.read();
        if chunk.modified {
            Response::ChunkData {
                data: chunk.serialize()?,
            }
        } else {
            Response::ChunkProcedural { cx, cy }
        }
    };

    send_bytes(writer, response.to_bytes()).await
}

async fn send_bytes(writer: &SharedWriter, bytes: Vec<u8>) -> Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

async fn autosave_loop(service: Arc<ChunkService>, interval_seconds: u64) {
    if interval_seconds == 0 {
        return;
    }
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
    // The first tick fires immediately; skip it so saves start one full
    // interval after boot.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let service = Arc::clone(&service);
        match tokio::task::spawn_blocking(move || service.save_all()).await {
            Ok(saved) if saved > 0 => info!("[auto-save] saved {saved} chunks"),
            Ok(_) => {}
            Err(e) => warn!("auto-save task failed: {e}"),
        }
    }
}
