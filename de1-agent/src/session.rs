//! Session: handles the attached controller connection

use std::io;

use log::{info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use de1_proto::async_io::{write_line, LineReader};
use de1_proto::{Command, Event};

use crate::gatt::Peripheral;

pub struct Session {
    stream: TcpStream,
}

impl Session {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn run(
        &mut self,
        peripheral: &mut Peripheral,
        events: &mut mpsc::Receiver<Event>,
        listener: &TcpListener,
    ) -> io::Result<()> {
        let (read_half, mut write_half) = self.stream.split();
        let mut reader = LineReader::new(read_half);

        write_line(
            &mut write_half,
            &Event::Ready {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
        .await?;

        loop {
            tokio::select! {
                line = reader.next_line() => {
                    let line = match line? {
                        Some(line) => line,
                        None => return Ok(()),
                    };
                    match serde_json::from_slice::<Command>(&line) {
                        Ok(cmd) => apply_command(peripheral, cmd).await,
                        Err(e) => warn!("dropping malformed command line: {e}"),
                    }
                }

                Some(event) = events.recv() => {
                    handle_peripheral_event(peripheral, &event).await;
                    write_line(&mut write_half, &event).await?;
                }

                // One controller at a time; late arrivals are turned away.
                extra = listener.accept() => {
                    if let Ok((stream, addr)) = extra {
                        warn!("rejecting second controller from {addr}");
                        drop(stream);
                    }
                }
            }
        }
    }
}

async fn apply_command(peripheral: &mut Peripheral, cmd: Command) {
    match cmd {
        Command::Notify {
            characteristic,
            data,
        } => peripheral.set_value(characteristic, data, true).await,
        Command::Update {
            characteristic,
            data,
        } => peripheral.set_value(characteristic, data, false).await,
        Command::Start => {
            if let Err(e) = peripheral.advertise().await {
                warn!("failed to start advertising: {e}");
            }
        }
        Command::Stop => peripheral.stop_advertising(),
    }
}

/// Local side effects of a peripheral event, independent of whether a
/// controller is attached.
pub async fn handle_peripheral_event(peripheral: &mut Peripheral, event: &Event) {
    if let Event::Disconnected = event {
        info!("restarting advertising after disconnect");
        if let Err(e) = peripheral.advertise().await {
            warn!("failed to restart advertising: {e}");
        }
    }
}
