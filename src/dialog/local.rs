//! In-process dialog state machine
//!
//! A [`LocalDialog`] owns a native dialog and guards it with a state lock.
//! Every operation takes the lock for its whole check-then-act sequence.
//! Cloning the handle takes a reference; the native dialog is destroyed when
//! the last reference is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use super::run_loop::{self, Observers, UiContext};
use super::{ButtonSpec, ChooserAction, DialogNotification, DialogState};
use crate::accept;
use crate::error::{Result, SfcdError};
use crate::native::{NativeDialog, NativeDialogSpec, NativeToolkit};

/// State guarded by the dialog lock
pub(crate) struct Core {
    pub(crate) state: DialogState,
    pub(crate) native: Box<dyn NativeDialog>,
    /// Modality to put back once the current run ends
    pub(crate) restore_modal: Option<bool>,
}

struct LocalInner {
    id: String,
    title: String,
    parent: Option<String>,
    ui: UiContext,
    core: Mutex<Core>,
    observers: Arc<Observers>,
}

impl Drop for LocalInner {
    fn drop(&mut self) {
        self.core.get_mut().native.destroy();
        debug!("Dialog {} torn down", self.id);
    }
}

/// A dialog driven in this process
#[derive(Clone)]
pub struct LocalDialog {
    inner: Arc<LocalInner>,
}

impl LocalDialog {
    /// Build a dialog in `Configuration` state.
    ///
    /// Accept-class buttons with a label that does not say "accept" are
    /// dropped before the native dialog sees them.
    pub fn new(
        toolkit: &dyn NativeToolkit,
        ui: UiContext,
        title: &str,
        parent: Option<&str>,
        action: ChooserAction,
        buttons: Vec<ButtonSpec>,
    ) -> Result<Self> {
        let spec = NativeDialogSpec {
            title: title.to_string(),
            parent: parent.map(str::to_string),
            action,
            buttons: accept::filter_buttons(buttons),
        };

        let observers = Observers::new();
        let native = toolkit
            .create(&spec, observers.sink())
            .map_err(SfcdError::Creation)?;

        let id = Uuid::new_v4().to_string();
        info!(
            "Created dialog {} {:?} ({:?}, toolkit={})",
            id,
            title,
            action,
            toolkit.name()
        );

        Ok(Self {
            inner: Arc::new(LocalInner {
                id,
                title: spec.title,
                parent: spec.parent,
                ui,
                core: Mutex::new(Core {
                    state: DialogState::Configuration,
                    native,
                    restore_modal: None,
                }),
                observers,
            }),
        })
    }

    /// Notify listeners and release this reference.
    ///
    /// A running dialog stays alive until its run completes.
    pub fn destroy(self) {
        debug!("Destroying dialog {}", self.inner.id);
        self.inner.observers.notify(DialogNotification::Destroyed {
            id: self.inner.id.clone(),
        });
    }

    pub fn get_id(&self) -> &str {
        &self.inner.id
    }

    pub fn get_dialog_title(&self) -> String {
        self.inner.title.clone()
    }

    pub fn get_parent(&self) -> Option<&str> {
        self.inner.parent.as_deref()
    }

    pub fn get_state(&self) -> DialogState {
        self.lock_core().state
    }

    pub fn get_state_printable(&self) -> &'static str {
        self.get_state().printable()
    }

    pub fn is_running(&self) -> bool {
        self.get_state() == DialogState::Running
    }

    /// Buttons that survived validation
    pub fn get_buttons(&self) -> Vec<ButtonSpec> {
        self.lock_core().native.model().buttons()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DialogNotification> {
        self.inner.observers.subscribe()
    }

    /// Number of live handles, including one held by a pending run
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn ui(&self) -> &UiContext {
        &self.inner.ui
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    pub(crate) fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.inner.core.lock()
    }

    /// Show the dialog and return; completion arrives as `RunDone`.
    pub fn run(&self) -> Result<()> {
        let completion = {
            let mut core = self.lock_core();
            match core.state {
                DialogState::Running => {
                    return Err(SfcdError::ForbiddenChange(format!(
                        "dialog {} is already running",
                        self.inner.id
                    )))
                }
                DialogState::Invalid => {
                    return Err(SfcdError::ForbiddenChange(format!(
                        "dialog {} is no longer valid",
                        self.inner.id
                    )))
                }
                DialogState::Configuration | DialogState::DataRetrieval => {}
            }

            let completion = self.inner.observers.connect();
            let model = core.native.model().clone();
            if !model.is_modal() {
                model.set_modal(true);
                core.restore_modal = Some(false);
            }
            core.state = DialogState::Running;
            core.native.show();
            completion
        };

        debug!("Dialog {} running", self.inner.id);
        run_loop::spawn_bridge(self.clone(), completion);
        Ok(())
    }

    pub fn present(&self) -> Result<()> {
        let mut core = self.require_running("present")?;
        core.native.present();
        Ok(())
    }

    /// Hide a running dialog; the run completes with no response.
    pub fn cancel_run(&self) -> Result<()> {
        let mut core = self.require_running("cancel_run")?;
        debug!("Cancelling run of dialog {}", self.inner.id);
        core.native.hide();
        Ok(())
    }

    fn require_running(&self, op: &str) -> Result<MutexGuard<'_, Core>> {
        let core = self.lock_core();
        if core.state != DialogState::Running {
            return Err(SfcdError::ForbiddenChange(format!(
                "{}: dialog {} is not running ({})",
                op, self.inner.id, core.state
            )));
        }
        Ok(core)
    }

    /// Apply a change in `Configuration`, demoting from `DataRetrieval`.
    ///
    /// The state only changes when `apply` succeeds.
    fn mutate<R>(&self, op: &str, apply: impl FnOnce(&mut Core) -> Result<R>) -> Result<R> {
        let mut core = self.lock_core();
        match core.state {
            DialogState::Configuration | DialogState::DataRetrieval => {}
            state => {
                return Err(SfcdError::ForbiddenChange(format!(
                    "{}: dialog {} is {}",
                    op, self.inner.id, state
                )))
            }
        }
        let result = apply(&mut core)?;
        if core.state == DialogState::DataRetrieval {
            debug!("Dialog {} back to configuration", self.inner.id);
            core.state = DialogState::Configuration;
        }
        Ok(result)
    }

    /// Read live configuration; anything but `Running` (or invalid) will do.
    fn query<R>(&self, op: &str, read: impl FnOnce(&Core) -> R) -> Result<R> {
        let core = self.lock_core();
        match core.state {
            DialogState::Configuration | DialogState::DataRetrieval => Ok(read(&core)),
            state => Err(SfcdError::ForbiddenQuery(format!(
                "{}: dialog {} is {}",
                op, self.inner.id, state
            ))),
        }
    }

    /// Read the user's selection; only in `DataRetrieval`.
    fn retrieve<R>(&self, op: &str, read: impl FnOnce(&Core) -> R) -> Result<R> {
        let core = self.lock_core();
        if core.state != DialogState::DataRetrieval {
            return Err(SfcdError::ForbiddenQuery(format!(
                "{}: dialog {} has no selection ({})",
                op, self.inner.id, core.state
            )));
        }
        Ok(read(&core))
    }

    fn toolkit_check(op: &str, accepted: bool, subject: &str) -> Result<()> {
        if accepted {
            Ok(())
        } else {
            Err(SfcdError::ToolkitCallFailed(format!(
                "{}: toolkit rejected {:?}",
                op, subject
            )))
        }
    }

    fn shortcut_result(op: &str, outcome: std::result::Result<(), String>) -> bool {
        match outcome {
            Ok(()) => true,
            Err(reason) => {
                debug!("{}: {}", op, reason);
                false
            }
        }
    }

    pub fn set_action(&self, action: ChooserAction) -> Result<()> {
        self.mutate("set_action", |core| {
            core.native.model().set_action(action);
            Ok(())
        })
    }

    pub fn get_action(&self) -> Result<ChooserAction> {
        self.query("get_action", |core| core.native.model().action())
    }

    pub fn set_local_only(&self, local_only: bool) -> Result<()> {
        self.mutate("set_local_only", |core| {
            core.native.model().set_local_only(local_only);
            Ok(())
        })
    }

    pub fn get_local_only(&self) -> Result<bool> {
        self.query("get_local_only", |core| core.native.model().local_only())
    }

    pub fn set_select_multiple(&self, select_multiple: bool) -> Result<()> {
        self.mutate("set_select_multiple", |core| {
            core.native.model().set_select_multiple(select_multiple);
            Ok(())
        })
    }

    pub fn get_select_multiple(&self) -> Result<bool> {
        self.query("get_select_multiple", |core| {
            core.native.model().select_multiple()
        })
    }

    pub fn set_show_hidden(&self, show_hidden: bool) -> Result<()> {
        self.mutate("set_show_hidden", |core| {
            core.native.model().set_show_hidden(show_hidden);
            Ok(())
        })
    }

    pub fn get_show_hidden(&self) -> Result<bool> {
        self.query("get_show_hidden", |core| core.native.model().show_hidden())
    }

    pub fn set_do_overwrite_confirmation(&self, confirm: bool) -> Result<()> {
        self.mutate("set_do_overwrite_confirmation", |core| {
            core.native.model().set_do_overwrite_confirmation(confirm);
            Ok(())
        })
    }

    pub fn get_do_overwrite_confirmation(&self) -> Result<bool> {
        self.query("get_do_overwrite_confirmation", |core| {
            core.native.model().do_overwrite_confirmation()
        })
    }

    pub fn set_create_folders(&self, create_folders: bool) -> Result<()> {
        self.mutate("set_create_folders", |core| {
            core.native.model().set_create_folders(create_folders);
            Ok(())
        })
    }

    pub fn get_create_folders(&self) -> Result<bool> {
        self.query("get_create_folders", |core| {
            core.native.model().create_folders()
        })
    }

    pub fn set_current_name(&self, name: &str) -> Result<()> {
        self.mutate("set_current_name", |core| {
            core.native.model().set_current_name(name);
            Ok(())
        })
    }

    pub fn set_filename(&self, filename: &Path) -> Result<()> {
        self.mutate("set_filename", |core| {
            let accepted = core.native.model().set_filename(filename);
            Self::toolkit_check("set_filename", accepted, &filename.to_string_lossy())
        })
    }

    pub fn set_current_folder(&self, folder: &Path) -> Result<()> {
        self.mutate("set_current_folder", |core| {
            let accepted = core.native.model().set_current_folder(folder);
            Self::toolkit_check("set_current_folder", accepted, &folder.to_string_lossy())
        })
    }

    pub fn set_uri(&self, uri: &str) -> Result<()> {
        self.mutate("set_uri", |core| {
            let accepted = core.native.model().set_uri(uri);
            Self::toolkit_check("set_uri", accepted, uri)
        })
    }

    pub fn set_current_folder_uri(&self, uri: &str) -> Result<()> {
        self.mutate("set_current_folder_uri", |core| {
            let accepted = core.native.model().set_current_folder_uri(uri);
            Self::toolkit_check("set_current_folder_uri", accepted, uri)
        })
    }

    pub fn add_shortcut_folder(&self, folder: &Path) -> Result<bool> {
        self.mutate("add_shortcut_folder", |core| {
            let outcome = core.native.model().add_shortcut_folder(folder);
            Ok(Self::shortcut_result("add_shortcut_folder", outcome))
        })
    }

    pub fn remove_shortcut_folder(&self, folder: &Path) -> Result<bool> {
        self.mutate("remove_shortcut_folder", |core| {
            let outcome = core.native.model().remove_shortcut_folder(folder);
            Ok(Self::shortcut_result("remove_shortcut_folder", outcome))
        })
    }

    pub fn add_shortcut_folder_uri(&self, uri: &str) -> Result<bool> {
        self.mutate("add_shortcut_folder_uri", |core| {
            let outcome = core.native.model().add_shortcut_folder_uri(uri);
            Ok(Self::shortcut_result("add_shortcut_folder_uri", outcome))
        })
    }

    pub fn remove_shortcut_folder_uri(&self, uri: &str) -> Result<bool> {
        self.mutate("remove_shortcut_folder_uri", |core| {
            let outcome = core.native.model().remove_shortcut_folder_uri(uri);
            Ok(Self::shortcut_result("remove_shortcut_folder_uri", outcome))
        })
    }

    pub fn list_shortcut_folders(&self) -> Result<Vec<PathBuf>> {
        self.query("list_shortcut_folders", |core| {
            core.native.model().shortcut_folders()
        })
    }

    pub fn list_shortcut_folder_uris(&self) -> Result<Vec<String>> {
        self.query("list_shortcut_folder_uris", |core| {
            core.native.model().shortcut_folder_uris()
        })
    }

    pub fn get_current_folder(&self) -> Result<Option<PathBuf>> {
        self.query("get_current_folder", |core| {
            core.native.model().current_folder()
        })
    }

    pub fn get_current_folder_uri(&self) -> Result<Option<String>> {
        self.query("get_current_folder_uri", |core| {
            core.native.model().current_folder_uri()
        })
    }

    pub fn get_current_name(&self) -> Result<Option<String>> {
        self.retrieve("get_current_name", |core| core.native.model().current_name())
    }

    pub fn get_filename(&self) -> Result<Option<PathBuf>> {
        self.retrieve("get_filename", |core| core.native.model().filename())
    }

    pub fn get_filenames(&self) -> Result<Vec<PathBuf>> {
        self.retrieve("get_filenames", |core| core.native.model().filenames())
    }

    pub fn get_uri(&self) -> Result<Option<String>> {
        self.retrieve("get_uri", |core| core.native.model().uri())
    }

    pub fn get_uris(&self) -> Result<Vec<String>> {
        self.retrieve("get_uris", |core| core.native.model().uris())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ResponseType;
    use crate::native::HeadlessToolkit;

    fn open_dialog(toolkit: &HeadlessToolkit) -> LocalDialog {
        LocalDialog::new(
            toolkit,
            UiContext::current(),
            "Open File",
            None,
            ChooserAction::Open,
            vec![
                ButtonSpec::new("_Cancel", ResponseType::Reject),
                ButtonSpec::new("_Open", ResponseType::Accept),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_new_dialog_in_configuration() {
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);

        assert_eq!(dialog.get_state(), DialogState::Configuration);
        assert_eq!(dialog.get_state_printable(), "configuration");
        assert_eq!(dialog.get_dialog_title(), "Open File");
        assert!(!dialog.is_running());
        assert!(Uuid::parse_str(dialog.get_id()).is_ok());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let toolkit = HeadlessToolkit::new();
        let a = open_dialog(&toolkit);
        let b = open_dialog(&toolkit);
        assert_ne!(a.get_id(), b.get_id());
    }

    #[tokio::test]
    async fn test_creation_failure() {
        let toolkit = HeadlessToolkit::new();
        toolkit.set_fail_creation(true);
        let err = LocalDialog::new(
            &toolkit,
            UiContext::current(),
            "Broken",
            None,
            ChooserAction::Open,
            Vec::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SfcdError::Creation(_)));
    }

    #[tokio::test]
    async fn test_mislabeled_accept_button_dropped() {
        let toolkit = HeadlessToolkit::new();
        let dialog = LocalDialog::new(
            &toolkit,
            UiContext::current(),
            "Sneaky",
            None,
            ChooserAction::Open,
            vec![
                ButtonSpec::new("Cancel", ResponseType::Accept),
                ButtonSpec::new("Cancel", ResponseType::Reject),
            ],
        )
        .unwrap();

        assert_eq!(
            dialog.get_buttons(),
            vec![ButtonSpec::new("Cancel", ResponseType::Reject)]
        );
    }

    #[tokio::test]
    async fn test_setter_getter_roundtrip() {
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);

        dialog.set_action(ChooserAction::Save).unwrap();
        dialog.set_local_only(false).unwrap();
        dialog.set_select_multiple(true).unwrap();
        dialog.set_show_hidden(true).unwrap();
        dialog.set_do_overwrite_confirmation(true).unwrap();
        dialog.set_create_folders(false).unwrap();

        assert_eq!(dialog.get_action().unwrap(), ChooserAction::Save);
        assert!(!dialog.get_local_only().unwrap());
        assert!(dialog.get_select_multiple().unwrap());
        assert!(dialog.get_show_hidden().unwrap());
        assert!(dialog.get_do_overwrite_confirmation().unwrap());
        assert!(!dialog.get_create_folders().unwrap());
    }

    #[tokio::test]
    async fn test_retrieval_needs_selection() {
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);
        dialog.set_filename(Path::new("/tmp/preset.txt")).unwrap();

        assert!(matches!(dialog.get_filename(), Err(SfcdError::ForbiddenQuery(_))));
        assert!(matches!(dialog.get_filenames(), Err(SfcdError::ForbiddenQuery(_))));
        assert!(matches!(dialog.get_uri(), Err(SfcdError::ForbiddenQuery(_))));
        assert!(matches!(dialog.get_uris(), Err(SfcdError::ForbiddenQuery(_))));
        assert!(matches!(dialog.get_current_name(), Err(SfcdError::ForbiddenQuery(_))));

        // Current folder only needs "not running"
        assert_eq!(dialog.get_current_folder().unwrap(), Some(PathBuf::from("/tmp")));
        assert_eq!(
            dialog.get_current_folder_uri().unwrap().as_deref(),
            Some("file:///tmp")
        );
    }

    #[tokio::test]
    async fn test_toolkit_rejection_keeps_state() {
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);

        let err = dialog.set_filename(Path::new("relative.txt")).unwrap_err();
        assert!(matches!(err, SfcdError::ToolkitCallFailed(_)));
        let err = dialog.set_uri("https://example.com/x").unwrap_err();
        assert!(matches!(err, SfcdError::ToolkitCallFailed(_)));
        assert_eq!(dialog.get_state(), DialogState::Configuration);
    }

    #[tokio::test]
    async fn test_shortcut_folders_report_toolkit_result() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);

        assert!(dialog.add_shortcut_folder(dir.path()).unwrap());
        assert!(!dialog.add_shortcut_folder(dir.path()).unwrap());
        assert!(!dialog.add_shortcut_folder(Path::new("/definitely/not/here")).unwrap());
        assert_eq!(dialog.list_shortcut_folders().unwrap(), vec![dir.path().to_path_buf()]);

        let uri = crate::uri::from_path(dir.path()).unwrap();
        assert_eq!(dialog.list_shortcut_folder_uris().unwrap(), vec![uri.clone()]);
        assert!(dialog.remove_shortcut_folder_uri(&uri).unwrap());
        assert!(!dialog.remove_shortcut_folder(dir.path()).unwrap());
        assert!(dialog.add_shortcut_folder_uri(&uri).unwrap());
    }

    #[tokio::test]
    async fn test_present_and_cancel_need_running() {
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);

        assert!(matches!(dialog.present(), Err(SfcdError::ForbiddenChange(_))));
        assert!(matches!(dialog.cancel_run(), Err(SfcdError::ForbiddenChange(_))));
    }

    #[tokio::test]
    async fn test_drop_of_last_reference_tears_down() {
        let toolkit = HeadlessToolkit::new();
        let dialog = open_dialog(&toolkit);
        let handle = toolkit.last().unwrap();

        let extra = dialog.clone();
        assert_eq!(dialog.ref_count(), 2);
        dialog.destroy();
        assert!(!handle.is_destroyed());
        drop(extra);
        assert!(handle.is_destroyed());
    }
}
