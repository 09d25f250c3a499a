//! D-Bus interface of the broker
//!
//! Service: org.sfcd.FileChooser (configurable)
//! Object Path: /org/sfcd/FileChooser
//!
//! Every method resolves the dialog id through the [`DialogRegistry`], runs
//! the matching state machine operation and relays its error unchanged. Run
//! completions go back to the owning client as a unicast `RunDone` signal.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use zbus::message::Header;
use zbus::names::BusName;
use zbus::{fdo, interface, Connection, Result as ZbusResult};

use crate::backend::LocalBackend;
use crate::config::{BusConfig, BusKind};
use crate::dialog::{ButtonSpec, ChooserAction, DialogNotification, LocalDialog, RunDone};
use crate::error::SfcdError;
use crate::registry::DialogRegistry;

pub const OBJECT_PATH: &str = "/org/sfcd/FileChooser";
pub const INTERFACE: &str = "org.sfcd.FileChooser1";

/// Error reply of a broker method
#[derive(Debug, zbus::DBusError)]
#[zbus(prefix = "org.sfcd.Error")]
pub enum BrokerError {
    #[zbus(error)]
    ZBus(zbus::Error),
    Creation(String),
    Lookup(String),
    ForbiddenChange(String),
    ForbiddenQuery(String),
    ToolkitCallFailed(String),
    Unknown(String),
}

impl From<SfcdError> for BrokerError {
    fn from(err: SfcdError) -> Self {
        match err {
            SfcdError::Creation(m) => BrokerError::Creation(m),
            SfcdError::Lookup(m) => BrokerError::Lookup(m),
            SfcdError::ForbiddenChange(m) => BrokerError::ForbiddenChange(m),
            SfcdError::ForbiddenQuery(m) => BrokerError::ForbiddenQuery(m),
            SfcdError::ToolkitCallFailed(m) => BrokerError::ToolkitCallFailed(m),
            SfcdError::Unknown(m) | SfcdError::Transport(m) => BrokerError::Unknown(m),
        }
    }
}

type MethodResult<T> = Result<T, BrokerError>;

/// Object served at [`OBJECT_PATH`]
pub struct FileChooserBroker {
    registry: Arc<DialogRegistry>,
    local: LocalBackend,
}

fn caller(header: &Header<'_>) -> MethodResult<String> {
    header
        .sender()
        .map(|sender| sender.to_string())
        .ok_or_else(|| BrokerError::Unknown("method call without a sender".to_string()))
}

fn path_out(path: Option<PathBuf>) -> String {
    path.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn paths_out(paths: Vec<PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

impl FileChooserBroker {
    pub fn new(local: LocalBackend) -> Self {
        Self {
            registry: Arc::new(DialogRegistry::new()),
            local,
        }
    }

    pub fn registry(&self) -> Arc<DialogRegistry> {
        self.registry.clone()
    }

    /// Create a dialog owned by `owner` and hand each of its completions to
    /// `emit`.
    fn create_for<F, Fut>(
        &self,
        owner: &str,
        title: &str,
        parent_id: &str,
        action: u32,
        buttons: Vec<(String, i32)>,
        emit: F,
    ) -> MethodResult<String>
    where
        F: FnMut(RunDone) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action = ChooserAction::from_code(action)
            .ok_or_else(|| BrokerError::Creation(format!("unknown action code {}", action)))?;
        let parent = (!parent_id.is_empty()).then_some(parent_id);
        let buttons = buttons.into_iter().map(ButtonSpec::from_wire).collect();

        let dialog = self.local.create(title, parent, action, buttons)?;
        let id = dialog.get_id().to_string();

        tokio::spawn(relay_run_done(
            owner.to_string(),
            dialog.subscribe(),
            self.registry.clone(),
            emit,
        ));
        self.registry.insert(owner, dialog);

        Ok(id)
    }

    fn with_dialog<R>(
        &self,
        header: &Header<'_>,
        id: &str,
        op: impl FnOnce(&LocalDialog) -> crate::error::Result<R>,
    ) -> MethodResult<R> {
        self.with_owner(&caller(header)?, id, op)
    }

    /// Resolve `id` among the dialogs of `owner` and run `op` on it. The
    /// lookup reference is released on every path.
    fn with_owner<R>(
        &self,
        owner: &str,
        id: &str,
        op: impl FnOnce(&LocalDialog) -> crate::error::Result<R>,
    ) -> MethodResult<R> {
        let dialog = self.registry.lookup(owner, id)?;
        Ok(op(&*dialog)?)
    }

    fn destroy_for(&self, owner: &str, id: &str) -> MethodResult<()> {
        let dialog = self.registry.lookup_and_remove(owner, id)?;
        dialog.destroy();
        Ok(())
    }
}

#[interface(name = "org.sfcd.FileChooser1")]
impl FileChooserBroker {
    /// Create a dialog owned by the caller
    ///
    /// # Arguments
    /// * `title` - Dialog window title
    /// * `parent_id` - Parent window handle (empty for none)
    /// * `action` - Open=0, Save=1, SelectFolder=2, CreateFolder=3
    /// * `buttons` - (label, response code) pairs
    ///
    /// # Returns
    /// The new dialog id
    #[zbus(name = "New")]
    async fn new_dialog(
        &self,
        #[zbus(header)] header: Header<'_>,
        #[zbus(connection)] connection: &Connection,
        title: String,
        parent_id: String,
        action: u32,
        buttons: Vec<(String, i32)>,
    ) -> Result<String, BrokerError> {
        let owner = caller(&header)?;
        info!("D-Bus: New request from {} title={:?}", owner, title);

        let connection = connection.clone();
        let target = owner.clone();
        self.create_for(&owner, &title, &parent_id, action, buttons, move |done| {
            emit_run_done(connection.clone(), target.clone(), done)
        })
    }

    async fn get_state(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<u32, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(d.get_state().code()))
    }

    async fn destroy(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<(), BrokerError> {
        debug!("D-Bus: Destroy {}", id);
        self.destroy_for(&caller(&header)?, &id)
    }

    async fn run(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<(), BrokerError> {
        debug!("D-Bus: Run {}", id);
        self.with_dialog(&header, &id, |d| d.run())
    }

    async fn present(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.present())
    }

    async fn cancel_run(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<(), BrokerError> {
        debug!("D-Bus: CancelRun {}", id);
        self.with_dialog(&header, &id, |d| d.cancel_run())
    }

    async fn set_action(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        action: u32,
    ) -> Result<(), BrokerError> {
        let action = ChooserAction::from_code(action).ok_or_else(|| {
            BrokerError::ToolkitCallFailed(format!("unknown action code {}", action))
        })?;
        self.with_dialog(&header, &id, |d| d.set_action(action))
    }

    async fn get_action(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<u32, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(d.get_action()?.code()))
    }

    async fn set_local_only(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        local_only: bool,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_local_only(local_only))
    }

    async fn get_local_only(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.get_local_only())
    }

    async fn set_select_multiple(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        select_multiple: bool,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_select_multiple(select_multiple))
    }

    async fn get_select_multiple(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.get_select_multiple())
    }

    async fn set_show_hidden(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        show_hidden: bool,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_show_hidden(show_hidden))
    }

    async fn get_show_hidden(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.get_show_hidden())
    }

    async fn set_do_overwrite_confirmation(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        confirm: bool,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_do_overwrite_confirmation(confirm))
    }

    async fn get_do_overwrite_confirmation(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.get_do_overwrite_confirmation())
    }

    async fn set_create_folders(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        create_folders: bool,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_create_folders(create_folders))
    }

    async fn get_create_folders(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.get_create_folders())
    }

    async fn set_current_name(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        name: String,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_current_name(&name))
    }

    async fn set_filename(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        filename: String,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_filename(Path::new(&filename)))
    }

    async fn set_current_folder(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        folder: String,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_current_folder(Path::new(&folder)))
    }

    async fn set_uri(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        uri: String,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_uri(&uri))
    }

    async fn set_current_folder_uri(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        uri: String,
    ) -> Result<(), BrokerError> {
        self.with_dialog(&header, &id, |d| d.set_current_folder_uri(&uri))
    }

    async fn add_shortcut_folder(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        folder: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.add_shortcut_folder(Path::new(&folder)))
    }

    async fn remove_shortcut_folder(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        folder: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| {
            d.remove_shortcut_folder(Path::new(&folder))
        })
    }

    async fn add_shortcut_folder_uri(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        uri: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.add_shortcut_folder_uri(&uri))
    }

    async fn remove_shortcut_folder_uri(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
        uri: String,
    ) -> Result<bool, BrokerError> {
        self.with_dialog(&header, &id, |d| d.remove_shortcut_folder_uri(&uri))
    }

    async fn list_shortcut_folders(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<Vec<String>, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(paths_out(d.list_shortcut_folders()?)))
    }

    async fn list_shortcut_folder_uris(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<Vec<String>, BrokerError> {
        self.with_dialog(&header, &id, |d| d.list_shortcut_folder_uris())
    }

    async fn get_current_name(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<String, BrokerError> {
        self.with_dialog(&header, &id, |d| {
            Ok(d.get_current_name()?.unwrap_or_default())
        })
    }

    async fn get_filename(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<String, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(path_out(d.get_filename()?)))
    }

    async fn get_filenames(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<Vec<String>, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(paths_out(d.get_filenames()?)))
    }

    async fn get_current_folder(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<String, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(path_out(d.get_current_folder()?)))
    }

    async fn get_uri(&self, #[zbus(header)] header: Header<'_>, id: String) -> Result<String, BrokerError> {
        self.with_dialog(&header, &id, |d| Ok(d.get_uri()?.unwrap_or_default()))
    }

    async fn get_uris(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<Vec<String>, BrokerError> {
        self.with_dialog(&header, &id, |d| d.get_uris())
    }

    async fn get_current_folder_uri(
        &self,
        #[zbus(header)] header: Header<'_>,
        id: String,
    ) -> Result<String, BrokerError> {
        self.with_dialog(&header, &id, |d| {
            Ok(d.get_current_folder_uri()?.unwrap_or_default())
        })
    }

    /// Get broker version and load
    async fn get_info(&self) -> String {
        serde_json::to_string(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dialogs": self.registry.len(),
            "toolkit": self.local.toolkit_name(),
            "platform": std::env::consts::OS,
        }))
        .unwrap_or_default()
    }

    /// Ping to check if the broker is alive
    async fn ping(&self) -> String {
        "pong".to_string()
    }
}

/// Send a `RunDone` signal to the client that owns the dialog.
async fn emit_run_done(connection: Connection, owner: String, done: RunDone) {
    let body = (
        done.id.as_str(),
        done.response.code(),
        done.state.code(),
        done.destroyed,
    );
    if let Err(e) = connection
        .emit_signal(Some(owner.as_str()), OBJECT_PATH, INTERFACE, "RunDone", &body)
        .await
    {
        warn!("Failed to send RunDone for {} to {}: {}", done.id, owner, e);
    }
}

/// Relay run completions of one dialog until it goes away.
///
/// A completion that destroyed the dialog also removes it from the registry.
async fn relay_run_done<F, Fut>(
    owner: String,
    mut notifications: broadcast::Receiver<DialogNotification>,
    registry: Arc<DialogRegistry>,
    mut emit: F,
) where
    F: FnMut(RunDone) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        match notifications.recv().await {
            Ok(DialogNotification::RunDone(done)) => {
                let destroyed = done.destroyed;
                let id = done.id.clone();
                emit(done).await;

                if destroyed {
                    if let Ok(dialog) = registry.lookup_and_remove(&owner, &id) {
                        dialog.destroy();
                    }
                    break;
                }
            }
            Ok(DialogNotification::Destroyed { .. }) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                error!("Dropped {} notifications for a dialog of {}", skipped, owner);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Destroy every dialog `owner` left behind. Returns how many there were.
fn destroy_orphans(registry: &DialogRegistry, owner: &str) -> usize {
    let orphans = registry.remove_owner(owner);
    let count = orphans.len();
    if count > 0 {
        info!("Client {} left; destroying {} dialog(s)", owner, count);
    }
    for dialog in orphans {
        dialog.destroy();
    }
    count
}

/// Destroy the dialogs of clients that leave the bus.
async fn watch_vanished_clients(
    connection: &Connection,
    registry: Arc<DialogRegistry>,
) -> ZbusResult<()> {
    let dbus: fdo::DBusProxy<'static> = fdo::DBusProxy::new(connection).await?;
    let mut changes = dbus.receive_name_owner_changed().await?;

    tokio::spawn(async move {
        while let Some(signal) = changes.next().await {
            let args = match signal.args() {
                Ok(args) => args,
                Err(e) => {
                    warn!("Malformed NameOwnerChanged: {}", e);
                    continue;
                }
            };
            let BusName::Unique(name) = args.name() else {
                continue;
            };
            if args.new_owner().is_some() {
                continue;
            }
            destroy_orphans(&registry, name.as_str());
        }
        debug!("NameOwnerChanged stream ended");
    });

    Ok(())
}

/// Start the D-Bus service
pub async fn start_broker_service(
    bus: &BusConfig,
    broker: FileChooserBroker,
) -> ZbusResult<Connection> {
    let registry = broker.registry();

    let connection = match bus.kind {
        BusKind::Session => Connection::session().await?,
        BusKind::System => Connection::system().await?,
    };

    connection.object_server().at(OBJECT_PATH, broker).await?;
    watch_vanished_clients(&connection, registry).await?;

    // Request the well-known name once the object can answer
    connection.request_name(bus.name.as_str()).await?;

    info!("D-Bus service registered: {}", bus.name);
    info!("Object path: {}", OBJECT_PATH);
    info!("Interface: {}", INTERFACE);

    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use zbus::DBusError;

    use crate::dialog::{DialogState, ResponseType, UiContext};
    use crate::error::{ErrorKind, ERROR_DOMAIN};
    use crate::native::{HeadlessHandle, HeadlessToolkit};

    const OWNER: &str = ":1.10";

    fn broker(toolkit: &HeadlessToolkit) -> FileChooserBroker {
        FileChooserBroker::new(LocalBackend::new(
            Arc::new(toolkit.clone()),
            UiContext::current(),
        ))
    }

    /// Create an Open dialog for `owner`, collecting its completions.
    fn open_for(
        broker: &FileChooserBroker,
        toolkit: &HeadlessToolkit,
        owner: &str,
    ) -> (String, HeadlessHandle, mpsc::UnboundedReceiver<RunDone>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = broker
            .create_for(
                owner,
                "Open File",
                "",
                ChooserAction::Open.code(),
                vec![("_Cancel".to_string(), -6), ("_Open".to_string(), -3)],
                move |done| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(done);
                    }
                },
            )
            .unwrap();
        (id, toolkit.last().unwrap(), rx)
    }

    async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_error_names_match_kinds() {
        for kind in ErrorKind::WIRE {
            let err = BrokerError::from(SfcdError::from_kind(kind, "boom"));
            assert_eq!(
                err.name().as_str(),
                format!("{}.{}", ERROR_DOMAIN, kind.name())
            );
            assert_eq!(err.description(), Some("boom"));
            assert_eq!(ErrorKind::from_wire_name(err.name().as_str()), Some(kind));
        }
    }

    #[test]
    fn test_transport_relayed_as_unknown() {
        let err = BrokerError::from(SfcdError::Transport("bus gone".to_string()));
        assert!(matches!(err, BrokerError::Unknown(_)));
    }

    #[test]
    fn test_absent_values_are_empty_strings() {
        assert_eq!(path_out(None), "");
        assert_eq!(path_out(Some(PathBuf::from("/tmp/a"))), "/tmp/a");
        assert_eq!(
            paths_out(vec![PathBuf::from("/a"), PathBuf::from("/b")]),
            vec!["/a".to_string(), "/b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_new_rejects_unknown_action() {
        let toolkit = HeadlessToolkit::new();
        let broker = broker(&toolkit);
        let err = broker
            .create_for(OWNER, "Open", "", 9, Vec::new(), |_| async {})
            .unwrap_err();
        assert!(matches!(err, BrokerError::Creation(_)));
        assert!(broker.registry().is_empty());

        toolkit.set_fail_creation(true);
        let err = broker
            .create_for(OWNER, "Open", "", 0, Vec::new(), |_| async {})
            .unwrap_err();
        assert!(matches!(err, BrokerError::Creation(_)));
    }

    #[tokio::test]
    async fn test_failed_call_releases_lookup() {
        let toolkit = HeadlessToolkit::new();
        let broker = broker(&toolkit);
        let (id, _handle, _rx) = open_for(&broker, &toolkit, OWNER);

        let err = broker.with_owner(OWNER, &id, |d| d.get_filename()).unwrap_err();
        assert!(matches!(err, BrokerError::ForbiddenQuery(_)));
        let err = broker.with_owner(":1.99", &id, |d| Ok(d.get_state())).unwrap_err();
        assert!(matches!(err, BrokerError::Lookup(_)));

        // Registry plus the lookup in flight
        assert_eq!(broker.with_owner(OWNER, &id, |d| Ok(d.ref_count())).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_destroy_removes_and_tears_down() {
        let toolkit = HeadlessToolkit::new();
        let broker = broker(&toolkit);
        let (id, handle, _rx) = open_for(&broker, &toolkit, OWNER);

        assert!(matches!(
            broker.destroy_for(":1.99", &id),
            Err(BrokerError::Lookup(_))
        ));
        assert_eq!(broker.registry().len(), 1);
        assert!(!handle.is_destroyed());

        broker.destroy_for(OWNER, &id).unwrap();
        assert!(broker.registry().is_empty());
        assert!(handle.is_destroyed());
        assert!(matches!(
            broker.destroy_for(OWNER, &id),
            Err(BrokerError::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_reaches_owner() {
        let toolkit = HeadlessToolkit::new();
        let broker = broker(&toolkit);
        let (id, handle, mut rx) = open_for(&broker, &toolkit, OWNER);

        broker.with_owner(OWNER, &id, |d| d.run()).unwrap();
        handle.respond(ResponseType::Cancel);

        let done = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.id, id);
        assert_eq!(done.response, ResponseType::Cancel);
        assert_eq!(done.state, DialogState::Configuration);
        assert!(!done.destroyed);
        assert_eq!(broker.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_window_leaves_registry() {
        let toolkit = HeadlessToolkit::new();
        let broker = broker(&toolkit);
        let (id, handle, mut rx) = open_for(&broker, &toolkit, OWNER);

        broker.with_owner(OWNER, &id, |d| d.run()).unwrap();
        handle.close();

        let done = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.response, ResponseType::DeleteEvent);
        assert!(done.destroyed);

        let registry = broker.registry();
        assert!(wait_for(|| registry.is_empty()).await);
        assert!(wait_for(|| handle.is_destroyed()).await);
        assert!(matches!(
            broker.with_owner(OWNER, &id, |d| d.run()),
            Err(BrokerError::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn test_vanished_client_dialogs_destroyed() {
        let toolkit = HeadlessToolkit::new();
        let broker = broker(&toolkit);
        let (_, first, _rx1) = open_for(&broker, &toolkit, OWNER);
        let (_, second, _rx2) = open_for(&broker, &toolkit, OWNER);
        let (other_id, other, _rx3) = open_for(&broker, &toolkit, ":1.20");

        assert_eq!(destroy_orphans(&broker.registry(), OWNER), 2);
        assert!(first.is_destroyed());
        assert!(second.is_destroyed());
        assert!(!other.is_destroyed());
        assert!(broker.with_owner(":1.20", &other_id, |d| Ok(d.get_state())).is_ok());
        assert_eq!(destroy_orphans(&broker.registry(), OWNER), 0);
    }
}
