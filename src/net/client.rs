//! Minimal client for the chunk protocol.
//!
//! Requests may be pipelined; chunk replies can arrive out of request
//! order, so callers match replies by the coordinates carried in every
//! frame.

use std::io::{Error, ErrorKind, Result};
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::net::protocol::{Request, Response};

pub struct WorldClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl WorldClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self { reader, writer })
    }

    /// Performs the handshake and returns the world seed.
    pub async fn login(&mut self) -> Result<i64> {
        self.send(&Request::Login).await?;
        match self.next_response().await? {
            Response::LoginOk { seed } => Ok(seed),
            other => Err(Error::new(
                ErrorKind::InvalidData,
                format!("expected LOGIN_OK, got {other:?}"),
            )),
        }
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        self.writer.write_all(&request.to_bytes()).await?;
        self.writer.flush().await
    }

    pub async fn request_chunk(&mut self, cx: i32, cy: i32) -> Result<()> {
        self.send(&Request::GetChunk { cx, cy }).await
    }

    pub async fn next_response(&mut self) -> Result<Response> {
        Response::read_from(&mut self.reader).await
    }

    pub async fn disconnect(mut self) -> Result<()> {
        self.send(&Request::Disconnect).await?;
        self.writer.shutdown().await
    }
}
