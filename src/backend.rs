//! Choosing where dialogs live
//!
//! A process decides once whether it drives native dialogs itself or asks the
//! broker to. Everything after that goes through [`Dialog`], which hides the
//! choice.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::BrokerConnection;
use crate::config::{BrokerConfig, Config, DispatchMode, ToolkitKind};
use crate::dialog::{ButtonSpec, ChooserAction, Dialog, LocalDialog, RemoteDialog, UiContext};
use crate::error::Result;
use crate::native::{HeadlessToolkit, NativeToolkit, SystemToolkit};

/// Creates dialogs on a native toolkit in this process
#[derive(Clone)]
pub struct LocalBackend {
    toolkit: Arc<dyn NativeToolkit>,
    ui: UiContext,
}

impl LocalBackend {
    pub fn new(toolkit: Arc<dyn NativeToolkit>, ui: UiContext) -> Self {
        Self { toolkit, ui }
    }

    /// Backend for the toolkit named in the configuration.
    pub fn from_config(config: &BrokerConfig, ui: UiContext) -> Self {
        let toolkit: Arc<dyn NativeToolkit> = match config.toolkit {
            ToolkitKind::System => Arc::new(SystemToolkit::new(ui.clone())),
            ToolkitKind::Headless => Arc::new(HeadlessToolkit::new()),
        };
        Self::new(toolkit, ui)
    }

    pub fn toolkit_name(&self) -> &'static str {
        self.toolkit.name()
    }

    pub fn create(
        &self,
        title: &str,
        parent: Option<&str>,
        action: ChooserAction,
        buttons: Vec<ButtonSpec>,
    ) -> Result<LocalDialog> {
        LocalDialog::new(
            self.toolkit.as_ref(),
            self.ui.clone(),
            title,
            parent,
            action,
            buttons,
        )
    }
}

/// Where this process's dialogs are created
#[derive(Clone)]
pub enum Backend {
    Local(LocalBackend),
    Remote(BrokerConnection),
}

impl Backend {
    /// Pick Local or Remote for the lifetime of the process.
    ///
    /// `Auto` goes Remote when [`is_confined`] says so.
    pub fn from_config(config: &Config, mode: DispatchMode, ui: UiContext) -> Self {
        let remote = match mode {
            DispatchMode::Local => false,
            DispatchMode::Remote => true,
            DispatchMode::Auto => is_confined(),
        };

        if remote {
            info!("Dialogs go through broker {}", config.bus.name);
            Backend::Remote(BrokerConnection::new(
                config.bus.clone(),
                config.client.reconnect,
            ))
        } else {
            let local = LocalBackend::from_config(&config.broker, ui);
            info!("Dialogs run locally on the {} toolkit", local.toolkit_name());
            Backend::Local(local)
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Backend::Remote(_))
    }

    pub async fn new_dialog(
        &self,
        title: &str,
        parent: Option<&str>,
        action: ChooserAction,
        buttons: Vec<ButtonSpec>,
    ) -> Result<Dialog> {
        match self {
            Backend::Local(local) => Ok(Dialog::Local(
                local.create(title, parent, action, buttons)?,
            )),
            Backend::Remote(broker) => Ok(Dialog::Remote(
                RemoteDialog::new(broker.clone(), title, parent, action, buttons).await?,
            )),
        }
    }
}

/// Whether this process runs inside a sandbox and must use the broker
pub fn is_confined() -> bool {
    confined(
        |key| std::env::var(key).ok(),
        Path::new("/.flatpak-info").exists(),
    )
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn confined(env: impl Fn(&str) -> Option<String>, flatpak_info: bool) -> bool {
    if env("SFCD_CONFINED").is_some_and(|v| truthy(&v)) {
        debug!("Confinement forced by SFCD_CONFINED");
        return true;
    }
    flatpak_info || env("SNAP").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_confinement_detection() {
        assert!(!confined(env_of(&[]), false));
        assert!(confined(env_of(&[]), true));
        assert!(confined(env_of(&[("SNAP", "/snap/app/1")]), false));
        assert!(confined(env_of(&[("SFCD_CONFINED", "yes")]), false));
        assert!(!confined(env_of(&[("SFCD_CONFINED", "0")]), false));
    }

    #[tokio::test]
    async fn test_explicit_dispatch() {
        let mut config = Config::default();
        config.broker.toolkit = ToolkitKind::Headless;

        let local = Backend::from_config(&config, DispatchMode::Local, UiContext::current());
        assert!(!local.is_remote());
        let remote = Backend::from_config(&config, DispatchMode::Remote, UiContext::current());
        assert!(remote.is_remote());
    }

    #[tokio::test]
    async fn test_local_backend_creates_dialogs() {
        let mut config = Config::default();
        config.broker.toolkit = ToolkitKind::Headless;
        let backend = Backend::from_config(&config, DispatchMode::Local, UiContext::current());

        let dialog = backend
            .new_dialog(
                "Save As",
                None,
                ChooserAction::Save,
                ButtonSpec::standard_pair(ChooserAction::Save),
            )
            .await
            .unwrap();
        assert!(!dialog.is_remote());
        assert_eq!(dialog.get_dialog_title(), "Save As");
    }
}
