//! Dialog types and the backend-independent dialog handle
//!
//! A [`Dialog`] is either driven in-process ([`LocalDialog`]) or proxied to
//! the broker ([`RemoteDialog`]). The choice is made once, when the dialog is
//! created; every operation afterwards goes through the same API.

pub mod local;
pub mod remote;
pub mod run_loop;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

pub use local::LocalDialog;
pub use remote::RemoteDialog;
pub use run_loop::{UiContext, UiThread};

/// Lifecycle state of a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// Error sentinel, never a normal value
    Invalid,
    /// Options may be changed
    Configuration,
    /// The native dialog is up and waiting for the user
    Running,
    /// The user accepted a selection that can now be read
    DataRetrieval,
}

impl DialogState {
    pub fn code(self) -> u32 {
        match self {
            DialogState::Invalid => 0,
            DialogState::Configuration => 1,
            DialogState::Running => 2,
            DialogState::DataRetrieval => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(DialogState::Invalid),
            1 => Some(DialogState::Configuration),
            2 => Some(DialogState::Running),
            3 => Some(DialogState::DataRetrieval),
            _ => None,
        }
    }

    pub fn printable(self) -> &'static str {
        match self {
            DialogState::Invalid => "invalid",
            DialogState::Configuration => "configuration",
            DialogState::Running => "running",
            DialogState::DataRetrieval => "data-retrieval",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.printable())
    }
}

/// What the file chooser is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChooserAction {
    #[default]
    Open,
    Save,
    SelectFolder,
    CreateFolder,
}

impl ChooserAction {
    pub fn code(self) -> u32 {
        match self {
            ChooserAction::Open => 0,
            ChooserAction::Save => 1,
            ChooserAction::SelectFolder => 2,
            ChooserAction::CreateFolder => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ChooserAction::Open),
            1 => Some(ChooserAction::Save),
            2 => Some(ChooserAction::SelectFolder),
            3 => Some(ChooserAction::CreateFolder),
            _ => None,
        }
    }

    /// Whether the user types a name for something that may not exist yet.
    pub fn names_new_item(self) -> bool {
        matches!(self, ChooserAction::Save | ChooserAction::CreateFolder)
    }
}

/// Response code carried by a dialog button
///
/// Codes match the GTK response ids so existing clients can keep theirs.
/// Non-negative values are application-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    None,
    Reject,
    Accept,
    DeleteEvent,
    Ok,
    Cancel,
    Close,
    Yes,
    No,
    Apply,
    Help,
    Custom(i32),
}

impl ResponseType {
    pub fn code(self) -> i32 {
        match self {
            ResponseType::None => -1,
            ResponseType::Reject => -2,
            ResponseType::Accept => -3,
            ResponseType::DeleteEvent => -4,
            ResponseType::Ok => -5,
            ResponseType::Cancel => -6,
            ResponseType::Close => -7,
            ResponseType::Yes => -8,
            ResponseType::No => -9,
            ResponseType::Apply => -10,
            ResponseType::Help => -11,
            ResponseType::Custom(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => ResponseType::None,
            -2 => ResponseType::Reject,
            -3 => ResponseType::Accept,
            -4 => ResponseType::DeleteEvent,
            -5 => ResponseType::Ok,
            -6 => ResponseType::Cancel,
            -7 => ResponseType::Close,
            -8 => ResponseType::Yes,
            -9 => ResponseType::No,
            -10 => ResponseType::Apply,
            -11 => ResponseType::Help,
            other => ResponseType::Custom(other),
        }
    }

    /// Canonical form: a `Custom` holding a reserved code becomes the named
    /// variant.
    pub fn normalized(self) -> Self {
        Self::from_code(self.code())
    }

    /// Responses meaning "the user approved this selection".
    pub fn is_accept_class(self) -> bool {
        matches!(
            self.normalized(),
            ResponseType::Accept | ResponseType::Ok | ResponseType::Yes | ResponseType::Apply
        )
    }
}

/// A button to put on the dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub label: String,
    pub response: ResponseType,
}

impl ButtonSpec {
    pub fn new(label: impl Into<String>, response: ResponseType) -> Self {
        Self {
            label: label.into(),
            response: response.normalized(),
        }
    }

    /// Wire form `(label, response-code)`
    pub fn to_wire(&self) -> (String, i32) {
        (self.label.clone(), self.response.code())
    }

    pub fn from_wire((label, code): (String, i32)) -> Self {
        Self::new(label, ResponseType::from_code(code))
    }

    /// The usual `_Cancel` / accept pair for an action.
    pub fn standard_pair(action: ChooserAction) -> Vec<ButtonSpec> {
        let accept = match action {
            ChooserAction::Open => "_Open",
            ChooserAction::Save => "_Save",
            ChooserAction::SelectFolder => "_Select",
            ChooserAction::CreateFolder => "_Create",
        };
        vec![
            ButtonSpec::new("_Cancel", ResponseType::Cancel),
            ButtonSpec::new(accept, ResponseType::Accept),
        ]
    }
}

/// Completion of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDone {
    pub id: String,
    pub response: ResponseType,
    pub state: DialogState,
    /// The dialog was closed by the window manager and is gone
    pub destroyed: bool,
}

/// Notifications a dialog sends to its listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogNotification {
    Shown,
    Hidden,
    RunDone(RunDone),
    Destroyed { id: String },
}

/// A file chooser dialog, local or brokered
pub enum Dialog {
    Local(LocalDialog),
    Remote(RemoteDialog),
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            Dialog::Local(dialog) => dialog.$method($($arg),*),
            Dialog::Remote(dialog) => dialog.$method($($arg),*).await,
        }
    };
}

impl Dialog {
    pub fn is_remote(&self) -> bool {
        matches!(self, Dialog::Remote(_))
    }

    pub fn get_id(&self) -> &str {
        match self {
            Dialog::Local(dialog) => dialog.get_id(),
            Dialog::Remote(dialog) => dialog.get_id(),
        }
    }

    pub fn get_dialog_title(&self) -> String {
        match self {
            Dialog::Local(dialog) => dialog.get_dialog_title(),
            Dialog::Remote(dialog) => dialog.get_dialog_title(),
        }
    }

    /// Listen for show/hide, run completion and destruction.
    pub fn subscribe(&self) -> broadcast::Receiver<DialogNotification> {
        match self {
            Dialog::Local(dialog) => dialog.subscribe(),
            Dialog::Remote(dialog) => dialog.subscribe(),
        }
    }

    pub async fn destroy(self) -> Result<()> {
        match self {
            Dialog::Local(dialog) => {
                dialog.destroy();
                Ok(())
            }
            Dialog::Remote(dialog) => dialog.destroy().await,
        }
    }

    pub async fn get_state(&self) -> Result<DialogState> {
        match self {
            Dialog::Local(dialog) => Ok(dialog.get_state()),
            Dialog::Remote(dialog) => dialog.get_state().await,
        }
    }

    pub async fn get_state_printable(&self) -> Result<&'static str> {
        Ok(self.get_state().await?.printable())
    }

    pub async fn is_running(&self) -> Result<bool> {
        Ok(self.get_state().await? == DialogState::Running)
    }

    pub async fn run(&self) -> Result<()> {
        dispatch!(self.run())
    }

    pub async fn present(&self) -> Result<()> {
        dispatch!(self.present())
    }

    pub async fn cancel_run(&self) -> Result<()> {
        dispatch!(self.cancel_run())
    }

    pub async fn set_action(&self, action: ChooserAction) -> Result<()> {
        dispatch!(self.set_action(action))
    }

    pub async fn get_action(&self) -> Result<ChooserAction> {
        dispatch!(self.get_action())
    }

    pub async fn set_local_only(&self, local_only: bool) -> Result<()> {
        dispatch!(self.set_local_only(local_only))
    }

    pub async fn get_local_only(&self) -> Result<bool> {
        dispatch!(self.get_local_only())
    }

    pub async fn set_select_multiple(&self, select_multiple: bool) -> Result<()> {
        dispatch!(self.set_select_multiple(select_multiple))
    }

    pub async fn get_select_multiple(&self) -> Result<bool> {
        dispatch!(self.get_select_multiple())
    }

    pub async fn set_show_hidden(&self, show_hidden: bool) -> Result<()> {
        dispatch!(self.set_show_hidden(show_hidden))
    }

    pub async fn get_show_hidden(&self) -> Result<bool> {
        dispatch!(self.get_show_hidden())
    }

    pub async fn set_do_overwrite_confirmation(&self, confirm: bool) -> Result<()> {
        dispatch!(self.set_do_overwrite_confirmation(confirm))
    }

    pub async fn get_do_overwrite_confirmation(&self) -> Result<bool> {
        dispatch!(self.get_do_overwrite_confirmation())
    }

    pub async fn set_create_folders(&self, create_folders: bool) -> Result<()> {
        dispatch!(self.set_create_folders(create_folders))
    }

    pub async fn get_create_folders(&self) -> Result<bool> {
        dispatch!(self.get_create_folders())
    }

    pub async fn set_current_name(&self, name: &str) -> Result<()> {
        dispatch!(self.set_current_name(name))
    }

    pub async fn set_filename(&self, filename: &Path) -> Result<()> {
        dispatch!(self.set_filename(filename))
    }

    pub async fn set_current_folder(&self, folder: &Path) -> Result<()> {
        dispatch!(self.set_current_folder(folder))
    }

    pub async fn set_uri(&self, uri: &str) -> Result<()> {
        dispatch!(self.set_uri(uri))
    }

    pub async fn set_current_folder_uri(&self, uri: &str) -> Result<()> {
        dispatch!(self.set_current_folder_uri(uri))
    }

    pub async fn add_shortcut_folder(&self, folder: &Path) -> Result<bool> {
        dispatch!(self.add_shortcut_folder(folder))
    }

    pub async fn remove_shortcut_folder(&self, folder: &Path) -> Result<bool> {
        dispatch!(self.remove_shortcut_folder(folder))
    }

    pub async fn add_shortcut_folder_uri(&self, uri: &str) -> Result<bool> {
        dispatch!(self.add_shortcut_folder_uri(uri))
    }

    pub async fn remove_shortcut_folder_uri(&self, uri: &str) -> Result<bool> {
        dispatch!(self.remove_shortcut_folder_uri(uri))
    }

    pub async fn list_shortcut_folders(&self) -> Result<Vec<PathBuf>> {
        dispatch!(self.list_shortcut_folders())
    }

    pub async fn list_shortcut_folder_uris(&self) -> Result<Vec<String>> {
        dispatch!(self.list_shortcut_folder_uris())
    }

    pub async fn get_current_name(&self) -> Result<Option<String>> {
        dispatch!(self.get_current_name())
    }

    pub async fn get_filename(&self) -> Result<Option<PathBuf>> {
        dispatch!(self.get_filename())
    }

    pub async fn get_filenames(&self) -> Result<Vec<PathBuf>> {
        dispatch!(self.get_filenames())
    }

    pub async fn get_uri(&self) -> Result<Option<String>> {
        dispatch!(self.get_uri())
    }

    pub async fn get_uris(&self) -> Result<Vec<String>> {
        dispatch!(self.get_uris())
    }

    pub async fn get_current_folder(&self) -> Result<Option<PathBuf>> {
        dispatch!(self.get_current_folder())
    }

    pub async fn get_current_folder_uri(&self) -> Result<Option<String>> {
        dispatch!(self.get_current_folder_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes() {
        for code in -11..=3 {
            assert_eq!(ResponseType::from_code(code).code(), code);
        }
        assert_eq!(ResponseType::from_code(-3), ResponseType::Accept);
        assert_eq!(ResponseType::from_code(42), ResponseType::Custom(42));
        assert!(!ResponseType::Custom(42).is_accept_class());
        assert!(!ResponseType::None.is_accept_class());
        assert!(!ResponseType::DeleteEvent.is_accept_class());
    }

    #[test]
    fn test_reserved_custom_codes_normalize() {
        assert_eq!(ResponseType::Custom(-3).normalized(), ResponseType::Accept);
        assert_eq!(ResponseType::Custom(-6).normalized(), ResponseType::Cancel);
        assert_eq!(ResponseType::Custom(5).normalized(), ResponseType::Custom(5));
        assert!(ResponseType::Custom(-8).is_accept_class());

        let button = ButtonSpec::new("Cancel", ResponseType::Custom(-3));
        assert_eq!(button.response, ResponseType::Accept);
        assert_eq!(
            ButtonSpec::from_wire(("Cancel".to_string(), -10)).response,
            ResponseType::Apply
        );
    }

    #[test]
    fn test_state_codes() {
        for state in [
            DialogState::Invalid,
            DialogState::Configuration,
            DialogState::Running,
            DialogState::DataRetrieval,
        ] {
            assert_eq!(DialogState::from_code(state.code()), Some(state));
        }
        assert_eq!(DialogState::from_code(9), None);
        assert_eq!(DialogState::DataRetrieval.to_string(), "data-retrieval");
    }

    #[test]
    fn test_action_codes() {
        assert_eq!(ChooserAction::from_code(1), Some(ChooserAction::Save));
        assert_eq!(ChooserAction::from_code(4), None);
        assert!(ChooserAction::Save.names_new_item());
        assert!(!ChooserAction::Open.names_new_item());
    }

    #[test]
    fn test_standard_pair_passes_validation() {
        for action in [
            ChooserAction::Open,
            ChooserAction::Save,
            ChooserAction::SelectFolder,
            ChooserAction::CreateFolder,
        ] {
            let pair = ButtonSpec::standard_pair(action);
            assert_eq!(crate::accept::filter_buttons(pair.clone()), pair);
        }
    }
}
