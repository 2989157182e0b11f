//! Origin response relay with cache population.
//!
//! # Responsibilities
//! - Inspect the first bytes of the origin reply for `304`
//! - On 304 with a usable artifact, send the artifact and drain the origin
//! - Otherwise tee every origin byte to the client and a replacement artifact
//!
//! # Design Decisions
//! - Bytes reach client and artifact in arrival order, in blocks
//! - The replacement is committed only when the origin closed cleanly; an
//!   error or an idle timeout leaves the previous artifact in place
//! - The artifact is never touched on the 304 path

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cache::{CacheSink, CacheStore};
use crate::http::response::{is_not_modified, INITIAL_CHUNK_LEN};

const RELAY_BUFFER_LEN: usize = 8 * 1024;

/// How the client's response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Origin said 304; the cached artifact was sent.
    ServedFromCache,
    /// Origin bytes were sent and stored as the new artifact.
    Stored,
    /// Origin bytes were sent without touching the cache.
    Passthrough,
    /// Origin went idle mid-response; what arrived was sent but not stored.
    Truncated,
}

impl RelayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::ServedFromCache => "cache_hit",
            RelayMode::Stored => "stored",
            RelayMode::Passthrough => "passthrough",
            RelayMode::Truncated => "truncated",
        }
    }
}

/// Result of a completed relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub mode: RelayMode,
    /// Bytes written to the client.
    pub client_bytes: u64,
}

/// First bytes of an origin reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialChunk {
    pub bytes: Vec<u8>,
    /// The idle timeout fired before the chunk was full or the origin closed.
    pub stalled: bool,
}

/// One read from the origin, with idleness kept apart from end of stream.
enum Read {
    Data(usize),
    Closed,
    Idle,
}

/// Relays one origin response for the artifact at `artifact`.
pub struct Relay<'a> {
    pub cache: &'a CacheStore,
    pub artifact: &'a Path,
    /// Whether a usable artifact existed when the request was built.
    pub has_artifact: bool,
    pub idle_timeout: Option<Duration>,
}

impl Relay<'_> {
    pub async fn run<O, C>(&self, origin: &mut O, client: &mut C) -> io::Result<RelayReport>
    where
        O: AsyncRead + Unpin,
        C: AsyncWrite + Unpin,
    {
        let chunk = read_initial_chunk(origin, self.idle_timeout).await?;
        let not_modified = is_not_modified(&chunk.bytes);

        if not_modified && self.has_artifact {
            tracing::debug!(artifact = ?self.artifact, "Origin not modified, serving artifact");
            let mut file = self.cache.open_for_read(self.artifact).await?;
            let sent = tokio::io::copy(&mut file, client).await?;
            client.flush().await?;

            if !chunk.stalled {
                let drained = self.drain(origin).await?;
                tracing::trace!(drained, "Origin stream drained");
            }
            return Ok(RelayReport {
                mode: RelayMode::ServedFromCache,
                client_bytes: sent,
            });
        }

        // Dropped on any early return below, which removes the unfinished file.
        let mut sink = if chunk.bytes.is_empty() || not_modified {
            None
        } else {
            Some(self.cache.open_for_write(self.artifact).await?)
        };

        let mut total = 0u64;
        tee(&chunk.bytes, client, sink.as_mut()).await?;
        total += chunk.bytes.len() as u64;

        let mut stalled = chunk.stalled;
        let mut buf = vec![0u8; RELAY_BUFFER_LEN];
        while !stalled {
            match read_idle(origin, &mut buf, self.idle_timeout).await? {
                Read::Data(n) => {
                    tee(&buf[..n], client, sink.as_mut()).await?;
                    total += n as u64;
                }
                Read::Closed => break,
                Read::Idle => stalled = true,
            }
        }
        client.flush().await?;

        let mode = match sink {
            Some(sink) if stalled => {
                sink.discard().await;
                tracing::warn!(
                    artifact = ?self.artifact,
                    bytes = total,
                    "Origin stalled mid-response, artifact not replaced"
                );
                RelayMode::Truncated
            }
            Some(sink) => {
                let stored = sink.finish().await?;
                tracing::debug!(artifact = ?self.artifact, bytes = stored, "Artifact stored");
                RelayMode::Stored
            }
            None if stalled => RelayMode::Truncated,
            None => RelayMode::Passthrough,
        };

        Ok(RelayReport {
            mode,
            client_bytes: total,
        })
    }

    async fn drain<O>(&self, origin: &mut O) -> io::Result<u64>
    where
        O: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; RELAY_BUFFER_LEN];
        let mut drained = 0u64;
        loop {
            match read_idle(origin, &mut buf, self.idle_timeout).await? {
                Read::Data(n) => drained += n as u64,
                Read::Closed | Read::Idle => return Ok(drained),
            }
        }
    }
}

async fn tee<C>(bytes: &[u8], client: &mut C, sink: Option<&mut CacheSink>) -> io::Result<()>
where
    C: AsyncWrite + Unpin,
{
    if bytes.is_empty() {
        return Ok(());
    }
    client.write_all(bytes).await?;
    if let Some(sink) = sink {
        sink.write(bytes).await?;
    }
    Ok(())
}

/// Read up to `INITIAL_CHUNK_LEN` bytes, stopping early at end of stream or
/// when the origin goes idle.
pub async fn read_initial_chunk<R>(origin: &mut R, idle: Option<Duration>) -> io::Result<InitialChunk>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = vec![0u8; INITIAL_CHUNK_LEN];
    let mut filled = 0;
    let mut stalled = false;
    while filled < bytes.len() {
        match read_idle(origin, &mut bytes[filled..], idle).await? {
            Read::Data(n) => filled += n,
            Read::Closed => break,
            Read::Idle => {
                stalled = true;
                break;
            }
        }
    }
    bytes.truncate(filled);
    Ok(InitialChunk { bytes, stalled })
}

/// A read that gives up once the origin has been silent for `idle`.
async fn read_idle<R>(origin: &mut R, buf: &mut [u8], idle: Option<Duration>) -> io::Result<Read>
where
    R: AsyncRead + Unpin,
{
    let n = match idle {
        None => origin.read(buf).await?,
        Some(limit) => match tokio::time::timeout(limit, origin.read(buf)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(idle_secs = limit.as_secs_f64(), "Origin idle, ending relay");
                return Ok(Read::Idle);
            }
        },
    };
    Ok(if n == 0 { Read::Closed } else { Read::Data(n) })
}
