//! Native dialog capability
//!
//! The broker does not draw anything itself. A [`NativeToolkit`] builds
//! [`NativeDialog`]s, which only know how to appear, disappear and report what
//! happened to them through an [`EventSink`]. Everything a file chooser
//! remembers (options, current folder, selection, shortcut folders) lives in a
//! [`ChooserModel`] shared between the dialog and whoever drives it.

pub mod headless;
pub mod system;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dialog::{ButtonSpec, ChooserAction, ResponseType};
use crate::uri;

pub use headless::{HeadlessHandle, HeadlessToolkit};
pub use system::SystemToolkit;

/// Something that happened to a native dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEvent {
    Show,
    Hide,
    /// The window left the screen (hidden or minimized)
    Unmap,
    /// The user clicked an action button
    Response(ResponseType),
    /// The window manager asked to close the window
    Delete,
    /// The widget itself was destroyed
    Destroy,
}

/// Where a native dialog reports its events
#[derive(Clone)]
pub struct EventSink {
    handler: Arc<dyn Fn(NativeEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(NativeEvent) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn emit(&self, event: NativeEvent) {
        (self.handler)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Construction parameters for a native dialog
#[derive(Debug, Clone)]
pub struct NativeDialogSpec {
    pub title: String,
    /// Toolkit-specific id of the window the dialog is transient for
    pub parent: Option<String>,
    pub action: ChooserAction,
    /// Already validated button list
    pub buttons: Vec<ButtonSpec>,
}

/// Factory for native dialogs
pub trait NativeToolkit: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build a hidden dialog. The error string explains why it could not be built.
    fn create(
        &self,
        spec: &NativeDialogSpec,
        events: EventSink,
    ) -> Result<Box<dyn NativeDialog>, String>;
}

/// A native file chooser window
///
/// Implementations must not call back into the dialog that owns them from
/// inside these methods; events go through the [`EventSink`] only.
pub trait NativeDialog: Send {
    fn model(&self) -> &ChooserModel;

    fn show(&mut self);

    /// Hide the window. Emits `Hide` and `Unmap` if it was visible.
    fn hide(&mut self);

    /// Raise the window to the foreground.
    fn present(&mut self);

    fn is_visible(&self) -> bool;

    /// Tear the widget down. Called exactly once, when the last reference to
    /// the owning dialog goes away.
    fn destroy(&mut self);
}

/// Everything a chooser remembers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooserProperties {
    pub title: String,
    pub parent: Option<String>,
    pub modal: bool,
    pub buttons: Vec<ButtonSpec>,
    pub action: ChooserAction,
    pub local_only: bool,
    pub select_multiple: bool,
    pub show_hidden: bool,
    pub do_overwrite_confirmation: bool,
    pub create_folders: bool,
    pub current_folder: Option<PathBuf>,
    pub current_name: Option<String>,
    pub selection: Vec<PathBuf>,
    pub shortcut_folders: Vec<PathBuf>,
}

impl ChooserProperties {
    pub fn from_spec(spec: &NativeDialogSpec) -> Self {
        Self {
            title: spec.title.clone(),
            parent: spec.parent.clone(),
            modal: false,
            buttons: spec.buttons.clone(),
            action: spec.action,
            local_only: true,
            select_multiple: false,
            show_hidden: false,
            do_overwrite_confirmation: false,
            create_folders: true,
            current_folder: None,
            current_name: None,
            selection: Vec::new(),
            shortcut_folders: Vec::new(),
        }
    }
}

/// Shared, lockable chooser state
#[derive(Debug, Clone)]
pub struct ChooserModel {
    props: Arc<Mutex<ChooserProperties>>,
}

macro_rules! flag_accessors {
    ($($get:ident / $set:ident),* $(,)?) => {
        $(
            pub fn $get(&self) -> bool {
                self.props.lock().$get
            }

            pub fn $set(&self, value: bool) {
                self.props.lock().$get = value;
            }
        )*
    };
}

impl ChooserModel {
    pub fn new(props: ChooserProperties) -> Self {
        Self {
            props: Arc::new(Mutex::new(props)),
        }
    }

    pub fn from_spec(spec: &NativeDialogSpec) -> Self {
        Self::new(ChooserProperties::from_spec(spec))
    }

    /// Copy of the current properties
    pub fn properties(&self) -> ChooserProperties {
        self.props.lock().clone()
    }

    pub fn title(&self) -> String {
        self.props.lock().title.clone()
    }

    pub fn parent(&self) -> Option<String> {
        self.props.lock().parent.clone()
    }

    pub fn buttons(&self) -> Vec<ButtonSpec> {
        self.props.lock().buttons.clone()
    }

    pub fn is_modal(&self) -> bool {
        self.props.lock().modal
    }

    pub fn set_modal(&self, modal: bool) {
        self.props.lock().modal = modal;
    }

    pub fn action(&self) -> ChooserAction {
        self.props.lock().action
    }

    pub fn set_action(&self, action: ChooserAction) {
        self.props.lock().action = action;
    }

    flag_accessors!(
        local_only / set_local_only,
        show_hidden / set_show_hidden,
        do_overwrite_confirmation / set_do_overwrite_confirmation,
        create_folders / set_create_folders,
    );

    pub fn select_multiple(&self) -> bool {
        self.props.lock().select_multiple
    }

    pub fn set_select_multiple(&self, select_multiple: bool) {
        let mut props = self.props.lock();
        props.select_multiple = select_multiple;
        if !select_multiple {
            props.selection.truncate(1);
        }
    }

    pub fn current_name(&self) -> Option<String> {
        self.props.lock().current_name.clone()
    }

    pub fn set_current_name(&self, name: &str) {
        self.props.lock().current_name = Some(name.to_string());
    }

    pub fn filename(&self) -> Option<PathBuf> {
        self.props.lock().selection.first().cloned()
    }

    pub fn filenames(&self) -> Vec<PathBuf> {
        self.props.lock().selection.clone()
    }

    /// Preselect `path`. Returns false for relative paths.
    pub fn set_filename(&self, path: &Path) -> bool {
        if !path.is_absolute() {
            return false;
        }
        let mut props = self.props.lock();
        props.current_folder = path.parent().map(Path::to_path_buf);
        if props.action.names_new_item() {
            props.current_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        props.selection = vec![path.to_path_buf()];
        true
    }

    pub fn current_folder(&self) -> Option<PathBuf> {
        self.props.lock().current_folder.clone()
    }

    pub fn set_current_folder(&self, folder: &Path) -> bool {
        if !folder.is_absolute() {
            return false;
        }
        self.props.lock().current_folder = Some(folder.to_path_buf());
        true
    }

    pub fn uri(&self) -> Option<String> {
        self.filename().and_then(|path| uri::from_path(&path))
    }

    pub fn uris(&self) -> Vec<String> {
        self.filenames().iter().filter_map(|path| uri::from_path(path)).collect()
    }

    pub fn set_uri(&self, uri: &str) -> bool {
        uri::to_path(uri).is_some_and(|path| self.set_filename(&path))
    }

    pub fn current_folder_uri(&self) -> Option<String> {
        self.current_folder().and_then(|path| uri::from_path(&path))
    }

    pub fn set_current_folder_uri(&self, uri: &str) -> bool {
        uri::to_path(uri).is_some_and(|path| self.set_current_folder(&path))
    }

    pub fn shortcut_folders(&self) -> Vec<PathBuf> {
        self.props.lock().shortcut_folders.clone()
    }

    pub fn shortcut_folder_uris(&self) -> Vec<String> {
        self.shortcut_folders()
            .iter()
            .filter_map(|path| uri::from_path(path))
            .collect()
    }

    pub fn add_shortcut_folder(&self, folder: &Path) -> Result<(), String> {
        if !folder.is_absolute() || !folder.is_dir() {
            return Err(format!("{} is not an existing folder", folder.display()));
        }
        let mut props = self.props.lock();
        if props.shortcut_folders.iter().any(|f| f == folder) {
            return Err(format!("shortcut {} already exists", folder.display()));
        }
        props.shortcut_folders.push(folder.to_path_buf());
        Ok(())
    }

    pub fn remove_shortcut_folder(&self, folder: &Path) -> Result<(), String> {
        let mut props = self.props.lock();
        let before = props.shortcut_folders.len();
        props.shortcut_folders.retain(|f| f != folder);
        if props.shortcut_folders.len() == before {
            return Err(format!("shortcut {} does not exist", folder.display()));
        }
        Ok(())
    }

    pub fn add_shortcut_folder_uri(&self, uri: &str) -> Result<(), String> {
        let path = uri::to_path(uri).ok_or_else(|| format!("not a local file URI: {}", uri))?;
        self.add_shortcut_folder(&path)
    }

    pub fn remove_shortcut_folder_uri(&self, uri: &str) -> Result<(), String> {
        let path = uri::to_path(uri).ok_or_else(|| format!("not a local file URI: {}", uri))?;
        self.remove_shortcut_folder(&path)
    }

    /// Record what the user picked in the native window.
    pub fn select(&self, paths: Vec<PathBuf>) {
        let mut props = self.props.lock();
        let mut paths = paths;
        if !props.select_multiple {
            paths.truncate(1);
        }
        if let Some(first) = paths.first() {
            props.current_folder = first.parent().map(Path::to_path_buf);
            if props.action.names_new_item() {
                props.current_name = first
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
            }
        }
        props.selection = paths;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(action: ChooserAction) -> ChooserModel {
        ChooserModel::from_spec(&NativeDialogSpec {
            title: "Test".to_string(),
            parent: None,
            action,
            buttons: Vec::new(),
        })
    }

    #[test]
    fn test_defaults() {
        let props = model(ChooserAction::Open).properties();
        assert!(props.local_only);
        assert!(props.create_folders);
        assert!(!props.select_multiple);
        assert!(!props.modal);
        assert!(props.selection.is_empty());
    }

    #[test]
    fn test_set_filename_requires_absolute_path() {
        let model = model(ChooserAction::Open);
        assert!(!model.set_filename(Path::new("relative.txt")));
        assert!(model.set_filename(Path::new("/tmp/a.txt")));
        assert_eq!(model.filename(), Some(PathBuf::from("/tmp/a.txt")));
        assert_eq!(model.current_folder(), Some(PathBuf::from("/tmp")));
        assert_eq!(model.current_name(), None);
    }

    #[test]
    fn test_save_tracks_current_name() {
        let model = model(ChooserAction::Save);
        assert!(model.set_uri("file:///tmp/report%201.txt"));
        assert_eq!(model.current_name().as_deref(), Some("report 1.txt"));
        assert_eq!(model.uri().as_deref(), Some("file:///tmp/report%201.txt"));
    }

    #[test]
    fn test_single_selection_truncates() {
        let model = model(ChooserAction::Open);
        model.select(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(model.filenames(), vec![PathBuf::from("/a")]);

        model.set_select_multiple(true);
        model.select(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(model.filenames().len(), 2);
        model.set_select_multiple(false);
        assert_eq!(model.filenames(), vec![PathBuf::from("/a")]);
    }

    #[test]
    fn test_shortcut_folders() {
        let dir = tempfile::tempdir().unwrap();
        let model = model(ChooserAction::Open);

        assert!(model.add_shortcut_folder(dir.path()).is_ok());
        assert!(model.add_shortcut_folder(dir.path()).is_err());
        assert!(model.add_shortcut_folder(&dir.path().join("missing")).is_err());
        assert_eq!(model.shortcut_folders(), vec![dir.path().to_path_buf()]);

        let uri = uri::from_path(dir.path()).unwrap();
        assert_eq!(model.shortcut_folder_uris(), vec![uri.clone()]);
        assert!(model.remove_shortcut_folder_uri(&uri).is_ok());
        assert!(model.remove_shortcut_folder(dir.path()).is_err());
        assert!(model.shortcut_folders().is_empty());
    }
}
