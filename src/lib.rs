//! Sandboxed File Chooser Dialog
//!
//! File chooser dialogs for processes that may not touch the filesystem
//! themselves. A dialog is either driven in-process on a native toolkit or
//! brokered over D-Bus by the `sfcd` daemon; callers see the same [`Dialog`]
//! either way.

pub mod accept;
pub mod backend;
pub mod broker;
pub mod client;
pub mod config;
pub mod dialog;
pub mod error;
pub mod native;
pub mod registry;
pub mod uri;

pub use backend::{is_confined, Backend, LocalBackend};
pub use broker::{start_broker_service, FileChooserBroker};
pub use client::BrokerConnection;
pub use config::Config;
pub use dialog::{
    ButtonSpec, ChooserAction, Dialog, DialogNotification, DialogState, LocalDialog,
    RemoteDialog, ResponseType, RunDone, UiContext, UiThread,
};
pub use error::{ErrorKind, Result, SfcdError};
