//! Control link between controller and radio agent: newline-delimited
//! JSON objects over TCP
//!
//! Controller-to-agent objects carry a `cmd` discriminator, agent-to-
//! controller objects an `event` discriminator. Binary payloads travel as
//! lowercase ASCII hex; parsing accepts either case.

use serde::{Deserialize, Serialize};

use crate::characteristic::CharId;

/// Controller-to-agent command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    /// Write the value and fire a GATT notification.
    Notify {
        #[serde(rename = "char")]
        characteristic: CharId,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// Replace the cached read value only.
    Update {
        #[serde(rename = "char")]
        characteristic: CharId,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// Start advertising.
    Start,
    /// Stop advertising.
    Stop,
}

/// Agent-to-controller event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Ready {
        version: String,
    },
    Advertising,
    Connected {
        client: String,
    },
    Disconnected,
    Write {
        #[serde(rename = "char")]
        characteristic: CharId,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    Read {
        #[serde(rename = "char")]
        characteristic: CharId,
    },
    Error {
        code: i32,
    },
}

/// Hex string codec for binary payload fields.
pub mod hex_bytes {
    use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&HEXLOWER.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid hex payload: {e}")))
    }
}

/// Receive-side reassembly: append raw TCP bytes, take out complete
/// `\n`-terminated lines. Empty lines are swallowed here; whether a line is
/// valid JSON is the caller's problem.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let newline = self.buf.iter().position(|&b| b == b'\n')?;
            let mut line: Vec<u8> = self.buf.drain(..=newline).collect();
            line.pop(); // the newline itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Bytes of an incomplete trailing line, if any.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Async line transport for tokio streams.
#[cfg(feature = "async")]
pub mod async_io {
    use std::io;

    use serde::Serialize;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::LineBuffer;

    /// Serialize one message, terminate it with `\n` and flush immediately.
    pub async fn write_line<W, T>(writer: &mut W, msg: &T) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
        T: Serialize,
    {
        let mut line = serde_json::to_vec(msg)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await
    }

    /// Buffered reader yielding complete lines; `Ok(None)` on clean EOF.
    pub struct LineReader<R> {
        reader: R,
        buf: LineBuffer,
        chunk: [u8; 4096],
    }

    impl<R: AsyncRead + Unpin> LineReader<R> {
        pub fn new(reader: R) -> Self {
            Self {
                reader,
                buf: LineBuffer::new(),
                chunk: [0; 4096],
            }
        }

        pub async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
            loop {
                if let Some(line) = self.buf.next_line() {
                    return Ok(Some(line));
                }
                let n = self.reader.read(&mut self.chunk).await?;
                if n == 0 {
                    // EOF; a partial trailing line is discarded
                    return Ok(None);
                }
                self.buf.push(&self.chunk[..n]);
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::characteristic::CharId;
        use crate::link::{Command, Event};

        #[tokio::test]
        async fn writes_one_flushed_line_per_message() {
            let (mut a, b) = tokio::io::duplex(256);
            let cmd = Command::Notify {
                characteristic: CharId::StateInfo,
                data: vec![0x04, 0x01],
            };
            write_line(&mut a, &cmd).await.unwrap();
            write_line(&mut a, &Command::Start).await.unwrap();
            drop(a);

            let mut reader = LineReader::new(b);
            let first = reader.next_line().await.unwrap().unwrap();
            assert_eq!(
                first,
                br#"{"cmd":"notify","char":"A00E","data":"0401"}"#.to_vec()
            );
            let second = reader.next_line().await.unwrap().unwrap();
            assert_eq!(second, br#"{"cmd":"start"}"#.to_vec());
            assert!(reader.next_line().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn reassembles_lines_split_across_reads() {
            let (mut a, b) = tokio::io::duplex(8);
            let mut reader = LineReader::new(b);
            let writer = tokio::spawn(async move {
                a.write_all(b"{\"event\":\"adver").await.unwrap();
                a.write_all(b"tising\"}\n\n{\"event\":\"disconnected\"}\n")
                    .await
                    .unwrap();
            });

            let first = reader.next_line().await.unwrap().unwrap();
            let ev: Event = serde_json::from_slice(&first).unwrap();
            assert_eq!(ev, Event::Advertising);
            let second = reader.next_line().await.unwrap().unwrap();
            let ev: Event = serde_json::from_slice(&second).unwrap();
            assert_eq!(ev, Event::Disconnected);
            writer.await.unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format() {
        let cmd = Command::Notify {
            characteristic: CharId::ShotSample,
            data: vec![0x00, 0xC8, 0x19],
        };
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"cmd":"notify","char":"A00D","data":"00c819"}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::Stop).unwrap(),
            r#"{"cmd":"stop"}"#
        );
    }

    #[test]
    fn command_parse_is_case_insensitive_on_payload() {
        let cmd: Command =
            serde_json::from_str(r#"{"cmd":"update","char":"a011","data":"4B00"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Update {
                characteristic: CharId::WaterLevels,
                data: vec![0x4B, 0x00],
            }
        );
    }

    #[test]
    fn event_wire_format() {
        let ev = Event::Write {
            characteristic: CharId::RequestedState,
            data: vec![0x04],
        };
        assert_eq!(
            serde_json::to_string(&ev).unwrap(),
            r#"{"event":"write","char":"A002","data":"04"}"#
        );
        let parsed: Event =
            serde_json::from_str(r#"{"event":"ready","version":"1.0.0"}"#).unwrap();
        assert_eq!(
            parsed,
            Event::Ready {
                version: "1.0.0".into()
            }
        );
        let parsed: Event = serde_json::from_str(r#"{"event":"error","code":2}"#).unwrap();
        assert_eq!(parsed, Event::Error { code: 2 });
    }

    #[test]
    fn malformed_json_is_a_parse_error_not_a_panic() {
        assert!(serde_json::from_str::<Event>("{\"event\":").is_err());
        assert!(serde_json::from_str::<Event>(r#"{"event":"warp"}"#).is_err());
        assert!(serde_json::from_str::<Command>(r#"{"cmd":"notify","char":"A00D","data":"zz"}"#).is_err());
    }

    #[test]
    fn line_buffer_extracts_terminated_lines() {
        let mut buf = LineBuffer::new();
        buf.push(b"{\"event\":\"adv");
        assert_eq!(buf.next_line(), None);
        buf.push(b"ertising\"}\n{\"event\":\"disco");
        assert_eq!(buf.next_line(), Some(b"{\"event\":\"advertising\"}".to_vec()));
        assert_eq!(buf.next_line(), None);
        assert!(buf.pending() > 0);
        buf.push(b"nnected\"}\n");
        assert_eq!(buf.next_line(), Some(b"{\"event\":\"disconnected\"}".to_vec()));
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn line_buffer_skips_empty_lines() {
        let mut buf = LineBuffer::new();
        buf.push(b"\n\r\n{\"cmd\":\"start\"}\r\n\n");
        assert_eq!(buf.next_line(), Some(b"{\"cmd\":\"start\"}".to_vec()));
        assert_eq!(buf.next_line(), None);
    }
}
