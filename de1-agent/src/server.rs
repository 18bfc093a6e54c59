//! TCP control server: accepts the single controller session

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use de1_proto::Event;
use log::{error, info};

use crate::gatt::Peripheral;
use crate::session::{handle_peripheral_event, Session};

pub struct Server {
    listener: TcpListener,
    peripheral: Peripheral,
    events: mpsc::Receiver<Event>,
}

impl Server {
    pub async fn bind(
        port: u16,
        peripheral: Peripheral,
        events: mpsc::Receiver<Event>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!("control server listening on port {port}");
        Ok(Self {
            listener,
            peripheral,
            events,
        })
    }

    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    info!("controller connected from {addr}");

                    let mut session = Session::new(stream);
                    match session.run(&mut self.peripheral, &mut self.events, &self.listener).await {
                        Ok(()) => info!("controller disconnected"),
                        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                            info!("controller disconnected")
                        }
                        Err(e) => error!("controller session error: {e}"),
                    }
                    // BLE state and advertising persist across controller
                    // sessions.
                }

                // With no controller attached, peripheral events still need
                // their local side effects.
                Some(event) = self.events.recv() => {
                    handle_peripheral_event(&mut self.peripheral, &event).await;
                }
            }
        }
    }
}
