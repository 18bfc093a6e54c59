//! BlueZ peripheral: the DE1 GATT service, advertising control and
//! connection watching

use std::collections::HashMap;
use std::sync::Arc;

use bluer::adv::{Advertisement, AdvertisementHandle};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicNotifier, CharacteristicRead, CharacteristicWrite,
    CharacteristicWriteMethod, Service,
};
use bluer::{Adapter, AdapterEvent, Device};
use futures::{FutureExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};

use de1_proto::{CharId, Event, LOCAL_NAME, REGISTRY, SERVICE_UUID};

type Values = Arc<Mutex<HashMap<CharId, Vec<u8>>>>;
type Notifiers = Arc<Mutex<HashMap<CharId, CharacteristicNotifier>>>;

/// The hosted DE1 peripheral. GATT state lives here and survives controller
/// sessions; only the event channel connects it to the TCP side.
pub struct Peripheral {
    adapter: Adapter,
    values: Values,
    notifiers: Notifiers,
    events_tx: mpsc::Sender<Event>,
    adv: Option<AdvertisementHandle>,
    _app: ApplicationHandle,
    _session: bluer::Session,
}

impl Peripheral {
    pub async fn new(events_tx: mpsc::Sender<Event>) -> bluer::Result<Self> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        info!(
            "hosting DE1 service on adapter {} ({})",
            adapter.name(),
            adapter.address().await?
        );

        let values: Values = Arc::new(Mutex::new(
            REGISTRY
                .iter()
                .map(|spec| (spec.id, spec.initial_value.to_vec()))
                .collect(),
        ));
        let notifiers: Notifiers = Arc::new(Mutex::new(HashMap::new()));

        let app = Application {
            services: vec![Service {
                uuid: SERVICE_UUID,
                primary: true,
                characteristics: REGISTRY
                    .iter()
                    .map(|spec| build_characteristic(spec.id, spec.properties, &values, &notifiers, &events_tx))
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let app_handle = adapter.serve_gatt_application(app).await?;

        tokio::spawn(watch_connections(adapter.clone(), events_tx.clone()));

        Ok(Self {
            adapter,
            values,
            notifiers,
            events_tx,
            adv: None,
            _app: app_handle,
            _session: session,
        })
    }

    /// Start advertising if not already doing so. The service UUID rides in
    /// both advertising data and scan response.
    pub async fn advertise(&mut self) -> bluer::Result<()> {
        if self.adv.is_some() {
            return Ok(());
        }
        let adv = Advertisement {
            advertisement_type: bluer::adv::Type::Peripheral,
            service_uuids: vec![SERVICE_UUID].into_iter().collect(),
            discoverable: Some(true),
            local_name: Some(LOCAL_NAME.to_string()),
            ..Default::default()
        };
        self.adv = Some(self.adapter.advertise(adv).await?);
        info!("advertising as '{LOCAL_NAME}'");
        let _ = self.events_tx.send(Event::Advertising).await;
        Ok(())
    }

    pub fn stop_advertising(&mut self) {
        if self.adv.take().is_some() {
            info!("stopped advertising");
        }
    }

    /// Store a characteristic value; with `notify` also push it to a
    /// subscribed central.
    pub async fn set_value(&mut self, id: CharId, data: Vec<u8>, notify: bool) {
        if let CharId::Unknown(short) = id {
            warn!("characteristic not found: {short:04X}");
            return;
        }
        self.values.lock().await.insert(id, data.clone());

        if !notify {
            return;
        }
        let mut notifiers = self.notifiers.lock().await;
        if let Some(notifier) = notifiers.get_mut(&id) {
            if notifier.is_stopped() {
                notifiers.remove(&id);
                return;
            }
            if let Err(e) = notifier.notify(data).await {
                warn!("notify on {id} failed: {e}");
                notifiers.remove(&id);
                let _ = self.events_tx.send(Event::Error { code: error_code(&e) }).await;
            }
        }
    }
}

fn build_characteristic(
    id: CharId,
    props: de1_proto::Properties,
    values: &Values,
    notifiers: &Notifiers,
    events_tx: &mpsc::Sender<Event>,
) -> Characteristic {
    let mut characteristic = Characteristic {
        uuid: id.uuid(),
        ..Default::default()
    };

    if props.read {
        let values = values.clone();
        let tx = events_tx.clone();
        characteristic.read = Some(CharacteristicRead {
            read: true,
            fun: Box::new(move |_req| {
                let values = values.clone();
                let tx = tx.clone();
                async move {
                    debug!("characteristic read: {id}");
                    let _ = tx.send(Event::Read { characteristic: id }).await;
                    let value = values.lock().await.get(&id).cloned().unwrap_or_default();
                    Ok(value)
                }
                .boxed()
            }),
            ..Default::default()
        });
    }

    if props.write {
        let values = values.clone();
        let tx = events_tx.clone();
        characteristic.write = Some(CharacteristicWrite {
            write: true,
            method: CharacteristicWriteMethod::Fun(Box::new(move |new_value, _req| {
                let values = values.clone();
                let tx = tx.clone();
                async move {
                    debug!("characteristic written: {id} <- {} bytes", new_value.len());
                    values.lock().await.insert(id, new_value.clone());
                    let _ = tx
                        .send(Event::Write {
                            characteristic: id,
                            data: new_value,
                        })
                        .await;
                    Ok(())
                }
                .boxed()
            })),
            ..Default::default()
        });
    }

    if props.notify {
        // BlueZ materialises the CCCD for us; we only keep the notifier.
        let notifiers = notifiers.clone();
        characteristic.notify = Some(CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                let notifiers = notifiers.clone();
                async move {
                    debug!("notifications enabled on {id}");
                    notifiers.lock().await.insert(id, notifier);
                }
                .boxed()
            })),
            ..Default::default()
        });
    }

    characteristic
}

/// Surface central connects and disconnects as link events. BlueZ exposes a
/// device object for the connecting central; we watch its Connected
/// property.
async fn watch_connections(adapter: Adapter, tx: mpsc::Sender<Event>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("cannot watch adapter events: {e}");
            return;
        }
    };

    while let Some(event) = events.next().await {
        if let AdapterEvent::DeviceAdded(addr) = event {
            match adapter.device(addr) {
                Ok(device) => {
                    tokio::spawn(watch_device(device, tx.clone()));
                }
                Err(e) => warn!("device {addr} vanished before watch: {e}"),
            }
        }
    }
}

async fn watch_device(device: Device, tx: mpsc::Sender<Event>) {
    use bluer::{DeviceEvent, DeviceProperty};

    let mut events = match device.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("cannot watch device {}: {e}", device.address());
            return;
        }
    };

    let mut connected = device.is_connected().await.unwrap_or(false);
    if connected {
        info!("BLE client connected: {}", device.address());
        let _ = tx
            .send(Event::Connected {
                client: device.address().to_string(),
            })
            .await;
    }

    while let Some(DeviceEvent::PropertyChanged(prop)) = events.next().await {
        if let DeviceProperty::Connected(now) = prop {
            if now == connected {
                continue;
            }
            connected = now;
            if now {
                info!("BLE client connected: {}", device.address());
                let _ = tx
                    .send(Event::Connected {
                        client: device.address().to_string(),
                    })
                    .await;
            } else {
                info!("BLE client disconnected: {}", device.address());
                let _ = tx.send(Event::Disconnected).await;
            }
        }
    }
}

/// Numeric code forwarded on `error` events. BlueZ reports failures as
/// D-Bus error names with no numeric equivalent, so the link carries this
/// fixed numbering of the kinds a GATT operation can hit.
fn error_code(e: &bluer::Error) -> i32 {
    use bluer::ErrorKind;
    match e.kind {
        ErrorKind::NotReady => 1,
        ErrorKind::NotAvailable => 2,
        ErrorKind::DoesNotExist => 3,
        ErrorKind::NotPermitted => 4,
        ErrorKind::NotSupported => 5,
        ErrorKind::InvalidArguments => 6,
        ErrorKind::InProgress => 7,
        ErrorKind::Failed => 8,
        _ => 0,
    }
}
