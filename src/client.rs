//! Client side of the broker connection
//!
//! One [`BrokerConnection`] is shared by every remote dialog of a process. The
//! D-Bus connection is opened on first use. A call that fails because the
//! connection dropped is retried exactly once over a fresh connection.
//! `RunDone` signals are routed to the dialog they name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::names::BusName;
use zbus::proxy::SignalStream;
use zbus::zvariant::{DynamicDeserialize, DynamicType};
use zbus::{Connection, Proxy};

use crate::broker::{INTERFACE, OBJECT_PATH};
use crate::config::{BusConfig, BusKind};
use crate::dialog::{DialogNotification, DialogState, ResponseType, RunDone};
use crate::error::{ErrorKind, Result, SfcdError};

type Routes = Arc<Mutex<HashMap<String, broadcast::Sender<DialogNotification>>>>;

/// Shared, lazily connected proxy to the broker
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<Shared>,
}

struct Shared {
    bus: BusConfig,
    reconnect: bool,
    proxy: tokio::sync::Mutex<Option<Proxy<'static>>>,
    routes: Routes,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(router) = self.router.get_mut().take() {
            router.abort();
        }
    }
}

impl BrokerConnection {
    /// Nothing is connected until the first call.
    pub fn new(bus: BusConfig, reconnect: bool) -> Self {
        Self {
            inner: Arc::new(Shared {
                bus,
                reconnect,
                proxy: tokio::sync::Mutex::new(None),
                routes: Arc::new(Mutex::new(HashMap::new())),
                router: Mutex::new(None),
            }),
        }
    }

    /// Start routing `RunDone` for `id` to the returned sender's receivers.
    pub(crate) fn register(&self, id: &str) -> broadcast::Sender<DialogNotification> {
        self.inner
            .routes
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(16).0)
            .clone()
    }

    pub(crate) fn unregister(&self, id: &str) {
        self.inner.routes.lock().remove(id);
    }

    /// Heartbeat
    pub async fn ping(&self) -> Result<String> {
        self.call("Ping", &()).await
    }

    /// Broker version and load, as JSON
    pub async fn info(&self) -> Result<String> {
        self.call("GetInfo", &()).await
    }

    /// Call `method` on the broker, reconnecting once if the bus went away.
    pub(crate) async fn call<B, R>(&self, method: &'static str, body: &B) -> Result<R>
    where
        B: Serialize + DynamicType,
        R: for<'d> DynamicDeserialize<'d>,
    {
        debug!("Broker call {}", method);
        retry_once(
            method,
            self.inner.reconnect,
            move || async move {
                let proxy = self.proxy().await?;
                Ok::<_, SfcdError>(proxy.call(method, body).await)
            },
            move || self.reset(),
        )
        .await
    }

    async fn proxy(&self) -> Result<Proxy<'static>> {
        let mut slot = self.inner.proxy.lock().await;
        if let Some(proxy) = slot.as_ref() {
            return Ok(proxy.clone());
        }
        let proxy = self.connect().await?;
        *slot = Some(proxy.clone());
        Ok(proxy)
    }

    async fn reset(&self) {
        self.inner.proxy.lock().await.take();
        if let Some(router) = self.inner.router.lock().take() {
            router.abort();
        }
    }

    async fn connect(&self) -> Result<Proxy<'static>> {
        let connection = match self.inner.bus.kind {
            BusKind::Session => Connection::session().await,
            BusKind::System => Connection::system().await,
        }
        .map_err(transport)?;

        let destination = BusName::try_from(self.inner.bus.name.clone())
            .map_err(|e| SfcdError::Transport(format!("invalid bus name: {}", e)))?;
        let proxy = Proxy::new(&connection, destination, OBJECT_PATH, INTERFACE)
            .await
            .map_err(transport)?;

        let signals = proxy.receive_signal("RunDone").await.map_err(transport)?;
        let router = tokio::spawn(route_run_done(signals, self.inner.routes.clone()));
        if let Some(old) = self.inner.router.lock().replace(router) {
            old.abort();
        }

        info!("Connected to broker {}", self.inner.bus.name);
        Ok(proxy)
    }
}

/// Run `attempt`. If it lost the connection and `reconnect` is set, run
/// `reset` and try exactly once more.
///
/// The outer result of an attempt is the connection setup, the inner one the
/// call itself.
async fn retry_once<T, A, AFut, Z, ZFut>(
    method: &str,
    reconnect: bool,
    mut attempt: A,
    reset: Z,
) -> Result<T>
where
    A: FnMut() -> AFut,
    AFut: Future<Output = Result<zbus::Result<T>>>,
    Z: FnOnce() -> ZFut,
    ZFut: Future<Output = ()>,
{
    match attempt().await? {
        Ok(reply) => Ok(reply),
        Err(err) if reconnect && is_connection_lost(&err) => {
            warn!("Broker connection lost during {}: {}; reconnecting", method, err);
            reset().await;
            attempt().await?.map_err(from_wire)
        }
        Err(err) => Err(from_wire(err)),
    }
}

async fn route_run_done(mut signals: SignalStream<'static>, routes: Routes) {
    while let Some(message) = signals.next().await {
        let body = message.body();
        let (id, response, state, destroyed): (String, i32, u32, bool) = match body.deserialize()
        {
            Ok(args) => args,
            Err(e) => {
                warn!("Malformed RunDone signal: {}", e);
                continue;
            }
        };

        let done = RunDone {
            id,
            response: ResponseType::from_code(response),
            state: DialogState::from_code(state).unwrap_or(DialogState::Invalid),
            destroyed,
        };

        let route = {
            let mut routes = routes.lock();
            if done.destroyed {
                routes.remove(&done.id)
            } else {
                routes.get(&done.id).cloned()
            }
        };
        match route {
            Some(tx) => {
                let _ = tx.send(DialogNotification::RunDone(done));
            }
            None => debug!("RunDone for unknown dialog {}", done.id),
        }
    }
    debug!("RunDone stream ended");
}

fn transport(err: zbus::Error) -> SfcdError {
    SfcdError::Transport(err.to_string())
}

/// Whether `err` means the broker or the bus is gone, not that the call failed.
fn is_connection_lost(err: &zbus::Error) -> bool {
    const LOST: [&str; 4] = [
        "org.freedesktop.DBus.Error.ServiceUnknown",
        "org.freedesktop.DBus.Error.NameHasNoOwner",
        "org.freedesktop.DBus.Error.NoReply",
        "org.freedesktop.DBus.Error.Disconnected",
    ];
    match err {
        zbus::Error::InputOutput(_) => true,
        zbus::Error::MethodError(name, _, _) => LOST.contains(&name.as_str()),
        zbus::Error::FDO(fdo) => matches!(
            **fdo,
            zbus::fdo::Error::ServiceUnknown(_)
                | zbus::fdo::Error::NameHasNoOwner(_)
                | zbus::fdo::Error::NoReply(_)
                | zbus::fdo::Error::Disconnected(_)
        ),
        _ => false,
    }
}

/// Turn a broker reply error back into the error the broker relayed.
fn from_wire(err: zbus::Error) -> SfcdError {
    if let zbus::Error::MethodError(name, detail, _) = &err {
        if let Some(kind) = ErrorKind::from_wire_name(name.as_str()) {
            return SfcdError::from_kind(kind, detail.clone().unwrap_or_default());
        }
    }
    transport(err)
}
