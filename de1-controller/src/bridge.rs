//! Bridge to the radio agent: TCP connect and line-framed message I/O

use std::io;

use log::warn;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use de1_proto::async_io::{write_line, LineReader};
use de1_proto::{Command, Event};

pub async fn connect(host: &str, port: u16) -> io::Result<TcpStream> {
    TcpStream::connect((host, port)).await
}

/// The attached control link. Commands flush immediately; inbound lines
/// that fail to parse are dropped with a diagnostic and the link stays up.
pub struct Link {
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Link {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: LineReader::new(read_half),
            writer: write_half,
        }
    }

    /// Next well-formed event; `Ok(None)` when the agent hangs up.
    pub async fn next_event(&mut self) -> io::Result<Option<Event>> {
        loop {
            let Some(line) = self.reader.next_line().await? else {
                return Ok(None);
            };
            match serde_json::from_slice::<Event>(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => warn!("dropping malformed event line: {e}"),
            }
        }
    }

    pub async fn send(&mut self, command: &Command) -> io::Result<()> {
        write_line(&mut self.writer, command).await
    }
}
