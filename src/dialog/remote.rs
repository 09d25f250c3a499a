//! Brokered dialog
//!
//! Every operation is a round-trip to the broker, which runs the same state
//! machine as [`super::LocalDialog`]. Only the id, title and parent are kept
//! here.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::debug;

use super::{ButtonSpec, ChooserAction, DialogNotification, DialogState};
use crate::client::BrokerConnection;
use crate::error::{Result, SfcdError};

/// A dialog living in the broker process
pub struct RemoteDialog {
    id: String,
    title: String,
    parent: Option<String>,
    broker: BrokerConnection,
    notify: broadcast::Sender<DialogNotification>,
}

fn optional(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl RemoteDialog {
    pub async fn new(
        broker: BrokerConnection,
        title: &str,
        parent: Option<&str>,
        action: ChooserAction,
        buttons: Vec<ButtonSpec>,
    ) -> Result<Self> {
        let wire_buttons: Vec<(String, i32)> = buttons.iter().map(ButtonSpec::to_wire).collect();
        let id: String = broker
            .call(
                "New",
                &(title, parent.unwrap_or(""), action.code(), wire_buttons),
            )
            .await?;
        debug!("Broker created dialog {}", id);

        let notify = broker.register(&id);
        Ok(Self {
            id,
            title: title.to_string(),
            parent: parent.map(str::to_string),
            broker,
            notify,
        })
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_dialog_title(&self) -> String {
        self.title.clone()
    }

    pub fn get_parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DialogNotification> {
        self.notify.subscribe()
    }

    pub async fn destroy(self) -> Result<()> {
        let _ = self.notify.send(DialogNotification::Destroyed {
            id: self.id.clone(),
        });
        self.broker.unregister(&self.id);
        self.broker.call("Destroy", &self.id).await
    }

    pub async fn get_state(&self) -> Result<DialogState> {
        let code: u32 = self.broker.call("GetState", &self.id).await?;
        DialogState::from_code(code)
            .ok_or_else(|| SfcdError::Unknown(format!("broker sent unknown state code {}", code)))
    }

    pub async fn run(&self) -> Result<()> {
        self.broker.call("Run", &self.id).await
    }

    pub async fn present(&self) -> Result<()> {
        self.broker.call("Present", &self.id).await
    }

    pub async fn cancel_run(&self) -> Result<()> {
        self.broker.call("CancelRun", &self.id).await
    }

    async fn set_flag(&self, method: &'static str, value: bool) -> Result<()> {
        self.broker.call(method, &(self.id.as_str(), value)).await
    }

    async fn get_flag(&self, method: &'static str) -> Result<bool> {
        self.broker.call(method, &self.id).await
    }

    async fn set_string(&self, method: &'static str, value: &str) -> Result<()> {
        self.broker.call(method, &(self.id.as_str(), value)).await
    }

    async fn get_string(&self, method: &'static str) -> Result<Option<String>> {
        let value: String = self.broker.call(method, &self.id).await?;
        Ok(optional(value))
    }

    async fn get_strings(&self, method: &'static str) -> Result<Vec<String>> {
        self.broker.call(method, &self.id).await
    }

    async fn shortcut(&self, method: &'static str, value: &str) -> Result<bool> {
        self.broker.call(method, &(self.id.as_str(), value)).await
    }

    pub async fn set_action(&self, action: ChooserAction) -> Result<()> {
        self.broker
            .call("SetAction", &(self.id.as_str(), action.code()))
            .await
    }

    pub async fn get_action(&self) -> Result<ChooserAction> {
        let code: u32 = self.broker.call("GetAction", &self.id).await?;
        ChooserAction::from_code(code)
            .ok_or_else(|| SfcdError::Unknown(format!("broker sent unknown action code {}", code)))
    }

    pub async fn set_local_only(&self, local_only: bool) -> Result<()> {
        self.set_flag("SetLocalOnly", local_only).await
    }

    pub async fn get_local_only(&self) -> Result<bool> {
        self.get_flag("GetLocalOnly").await
    }

    pub async fn set_select_multiple(&self, select_multiple: bool) -> Result<()> {
        self.set_flag("SetSelectMultiple", select_multiple).await
    }

    pub async fn get_select_multiple(&self) -> Result<bool> {
        self.get_flag("GetSelectMultiple").await
    }

    pub async fn set_show_hidden(&self, show_hidden: bool) -> Result<()> {
        self.set_flag("SetShowHidden", show_hidden).await
    }

    pub async fn get_show_hidden(&self) -> Result<bool> {
        self.get_flag("GetShowHidden").await
    }

    pub async fn set_do_overwrite_confirmation(&self, confirm: bool) -> Result<()> {
        self.set_flag("SetDoOverwriteConfirmation", confirm).await
    }

    pub async fn get_do_overwrite_confirmation(&self) -> Result<bool> {
        self.get_flag("GetDoOverwriteConfirmation").await
    }

    pub async fn set_create_folders(&self, create_folders: bool) -> Result<()> {
        self.set_flag("SetCreateFolders", create_folders).await
    }

    pub async fn get_create_folders(&self) -> Result<bool> {
        self.get_flag("GetCreateFolders").await
    }

    pub async fn set_current_name(&self, name: &str) -> Result<()> {
        self.set_string("SetCurrentName", name).await
    }

    pub async fn set_filename(&self, filename: &Path) -> Result<()> {
        self.set_string("SetFilename", &path_arg(filename)).await
    }

    pub async fn set_current_folder(&self, folder: &Path) -> Result<()> {
        self.set_string("SetCurrentFolder", &path_arg(folder)).await
    }

    pub async fn set_uri(&self, uri: &str) -> Result<()> {
        self.set_string("SetUri", uri).await
    }

    pub async fn set_current_folder_uri(&self, uri: &str) -> Result<()> {
        self.set_string("SetCurrentFolderUri", uri).await
    }

    pub async fn add_shortcut_folder(&self, folder: &Path) -> Result<bool> {
        self.shortcut("AddShortcutFolder", &path_arg(folder)).await
    }

    pub async fn remove_shortcut_folder(&self, folder: &Path) -> Result<bool> {
        self.shortcut("RemoveShortcutFolder", &path_arg(folder)).await
    }

    pub async fn add_shortcut_folder_uri(&self, uri: &str) -> Result<bool> {
        self.shortcut("AddShortcutFolderUri", uri).await
    }

    pub async fn remove_shortcut_folder_uri(&self, uri: &str) -> Result<bool> {
        self.shortcut("RemoveShortcutFolderUri", uri).await
    }

    pub async fn list_shortcut_folders(&self) -> Result<Vec<PathBuf>> {
        let folders = self.get_strings("ListShortcutFolders").await?;
        Ok(folders.into_iter().map(PathBuf::from).collect())
    }

    pub async fn list_shortcut_folder_uris(&self) -> Result<Vec<String>> {
        self.get_strings("ListShortcutFolderUris").await
    }

    pub async fn get_current_name(&self) -> Result<Option<String>> {
        self.get_string("GetCurrentName").await
    }

    pub async fn get_filename(&self) -> Result<Option<PathBuf>> {
        Ok(self.get_string("GetFilename").await?.map(PathBuf::from))
    }

    pub async fn get_filenames(&self) -> Result<Vec<PathBuf>> {
        let files = self.get_strings("GetFilenames").await?;
        Ok(files.into_iter().map(PathBuf::from).collect())
    }

    pub async fn get_uri(&self) -> Result<Option<String>> {
        self.get_string("GetUri").await
    }

    pub async fn get_uris(&self) -> Result<Vec<String>> {
        self.get_strings("GetUris").await
    }

    pub async fn get_current_folder(&self) -> Result<Option<PathBuf>> {
        Ok(self.get_string("GetCurrentFolder").await?.map(PathBuf::from))
    }

    pub async fn get_current_folder_uri(&self) -> Result<Option<String>> {
        self.get_string("GetCurrentFolderUri").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_means_none() {
        assert_eq!(optional(String::new()), None);
        assert_eq!(optional("/tmp".to_string()), Some("/tmp".to_string()));
    }
}
