//! Wire protocol framing.
//!
//! Commands travel as length-prefixed UTF-8 strings (unsigned 16-bit
//! big-endian length, then the bytes) followed by fixed-width big-endian
//! scalars. The framing is symmetrical: both peers encode with
//! `to_bytes` and decode with `read_from`.

use std::io::{Error, ErrorKind, Result};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::MAX_CHUNK_PAYLOAD;

pub const CMD_LOGIN: &str = "LOGIN";
pub const CMD_GET_CHUNK: &str = "GET_CHUNK";
pub const CMD_GET_STATS: &str = "GET_STATS";
pub const CMD_DISCONNECT: &str = "DISCONNECT";

pub const CMD_LOGIN_OK: &str = "LOGIN_OK";
pub const CMD_CHUNK_DATA: &str = "CHUNK_DATA";
pub const CMD_CHUNK_PROCEDURAL: &str = "CHUNK_PROCEDURAL";
pub const CMD_STATS_DATA: &str = "STATS_DATA";

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login,
    GetChunk { cx: i32, cy: i32 },
    GetStats,
    Disconnect,
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    LoginOk {
        seed: i64,
    },
    /// Full chunk bytes, sent for chunks diverging from their procedural
    /// state.
    ChunkData {
        data: Vec<u8>,
    },
    /// Coordinates only; the peer regenerates the chunk locally from the
    /// shared seed.
    ChunkProcedural {
        cx: i32,
        cy: i32,
    },
    StatsData {
        used_memory: i64,
        total_memory: i64,
        active_threads: i32,
        loaded_chunks: i32,
    },
}

impl Request {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Request::Login => write_utf(&mut buf, CMD_LOGIN),
            Request::GetChunk { cx, cy } => {
                write_utf(&mut buf, CMD_GET_CHUNK);
                buf.extend_from_slice(&cx.to_be_bytes());
                buf.extend_from_slice(&cy.to_be_bytes());
            }
            Request::GetStats => write_utf(&mut buf, CMD_GET_STATS),
            Request::Disconnect => write_utf(&mut buf, CMD_DISCONNECT),
        }
        buf
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Request> {
        let command = read_utf(reader).await?;
        match command.as_str() {
            CMD_LOGIN => Ok(Request::Login),
            CMD_GET_CHUNK => {
                let cx = read_i32(reader).await?;
                let cy = read_i32(reader).await?;
                Ok(Request::GetChunk { cx, cy })
            }
            CMD_GET_STATS => Ok(Request::GetStats),
            CMD_DISCONNECT => Ok(Request::Disconnect),
            other => Err(Error::new(
                ErrorKind::InvalidData,
                format!("unknown command: {other:?}"),
            )),
        }
    }
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Response::LoginOk { seed } => {
                write_utf(&mut buf, CMD_LOGIN_OK);
                buf.extend_from_slice(&seed.to_be_bytes());
            }
            Response::ChunkData { data } => {
                write_utf(&mut buf, CMD_CHUNK_DATA);
                buf.extend_from_slice(&(data.len() as i32).to_be_bytes());
                buf.extend_from_slice(data);
            }
            Response::ChunkProcedural { cx, cy } => {
                write_utf(&mut buf, CMD_CHUNK_PROCEDURAL);
                buf.extend_from_slice(&cx.to_be_bytes());
                buf.extend_from_slice(&cy.to_be_bytes());
            }
            Response::StatsData {
                used_memory,
                total_memory,
                active_threads,
                loaded_chunks,
            } => {
                write_utf(&mut buf, CMD_STATS_DATA);
                buf.extend_from_slice(&used_memory.to_be_bytes());
                buf.extend_from_slice(&total_memory.to_be_bytes());
                buf.extend_from_slice(&active_threads.to_be_bytes());
                buf.extend_from_slice(&loaded_chunks.to_be_bytes());
            }
        }
        buf
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Response> {
        let command = read_utf(reader).await?;
        match command.as_str() {
            CMD_LOGIN_OK => Ok(Response::LoginOk {
                seed: read_i64(reader).await?,
            }),
            CMD_CHUNK_DATA => {
                let length = read_i32(reader).await?;
                if length <= 0 || length as usize > MAX_CHUNK_PAYLOAD {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("bad chunk payload length: {length}"),
                    ));
                }
                let mut data = vec![0u8; length as usize];
                reader.read_exact(&mut data).await?;
                Ok(Response::ChunkData { data })
            }
            CMD_CHUNK_PROCEDURAL => {
                let cx = read_i32(reader).await?;
                let cy = read_i32(reader).await?;
                Ok(Response::ChunkProcedural { cx, cy })
            }
            CMD_STATS_DATA => Ok(Response::StatsData {
                used_memory: read_i64(reader).await?,
                total_memory: read_i64(reader).await?,
                active_threads: read_i32(reader).await?,
                loaded_chunks: read_i32(reader).await?,
            }),
            other => Err(Error::new(
                ErrorKind::InvalidData,
                format!("unknown reply: {other:?}"),
            )),
        }
    }
}

fn write_utf(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

async fn read_utf<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes).await?;
    let len = u16::from_be_bytes(len_bytes) as usize;

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    String::from_utf8(data).map_err(|_| Error::new(ErrorKind::InvalidData, "malformed string"))
}

async fn read_i32<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).await?;
    Ok(i32::from_be_bytes(bytes))
}

async fn read_i64<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes).await?;
    Ok(i64::from_be_bytes(bytes))
}
