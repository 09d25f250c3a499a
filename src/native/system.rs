//! Platform file dialogs through `rfd`
//!
//! `show` opens the platform dialog on the UI runtime; its result fills the
//! model and is reported as `Response(Accept)` or `Response(Cancel)`. `hide`
//! abandons an outstanding pick. The platform dialog cannot be raised, and it
//! has no notion of custom buttons, hidden files, local-only browsing,
//! overwrite confirmation or folder creation: those options are stored in the
//! model and reported back as set.

use std::path::PathBuf;

use rfd::AsyncFileDialog;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{
    ChooserModel, ChooserProperties, EventSink, NativeDialog, NativeDialogSpec, NativeEvent,
    NativeToolkit,
};
use crate::dialog::{ChooserAction, ResponseType, UiContext};

/// Toolkit backed by the platform file dialog
pub struct SystemToolkit {
    ui: UiContext,
}

impl SystemToolkit {
    pub fn new(ui: UiContext) -> Self {
        Self { ui }
    }
}

impl NativeToolkit for SystemToolkit {
    fn name(&self) -> &'static str {
        "system"
    }

    fn create(
        &self,
        spec: &NativeDialogSpec,
        events: EventSink,
    ) -> Result<Box<dyn NativeDialog>, String> {
        Ok(Box::new(SystemDialog {
            model: ChooserModel::from_spec(spec),
            events,
            ui: self.ui.clone(),
            pick: None,
            visible: false,
        }))
    }
}

struct SystemDialog {
    model: ChooserModel,
    events: EventSink,
    ui: UiContext,
    pick: Option<JoinHandle<()>>,
    visible: bool,
}

impl SystemDialog {
    fn abandon_pick(&mut self) {
        if let Some(pick) = self.pick.take() {
            pick.abort();
        }
    }
}

impl NativeDialog for SystemDialog {
    fn model(&self) -> &ChooserModel {
        &self.model
    }

    fn show(&mut self) {
        if self.visible {
            return;
        }
        self.visible = true;
        self.events.emit(NativeEvent::Show);

        let props = self.model.properties();
        let model = self.model.clone();
        let events = self.events.clone();
        self.pick = Some(self.ui.spawn_idle(async move {
            match pick(props).await {
                Some(paths) => {
                    model.select(paths);
                    events.emit(NativeEvent::Response(ResponseType::Accept));
                }
                None => events.emit(NativeEvent::Response(ResponseType::Cancel)),
            }
        }));
    }

    fn hide(&mut self) {
        self.abandon_pick();
        if std::mem::replace(&mut self.visible, false) {
            self.events.emit(NativeEvent::Hide);
            self.events.emit(NativeEvent::Unmap);
        }
    }

    fn present(&mut self) {
        debug!("Platform dialog {:?} cannot be raised", self.model.title());
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn destroy(&mut self) {
        self.abandon_pick();
        self.visible = false;
    }
}

async fn pick(props: ChooserProperties) -> Option<Vec<PathBuf>> {
    let mut dialog = AsyncFileDialog::new().set_title(props.title.as_str());
    if let Some(folder) = &props.current_folder {
        dialog = dialog.set_directory(folder);
    }
    if let Some(name) = &props.current_name {
        dialog = dialog.set_file_name(name.as_str());
    }

    info!("Opening platform dialog {:?} ({:?})", props.title, props.action);

    let single = |handle: rfd::FileHandle| vec![handle.path().to_path_buf()];
    let many = |handles: Vec<rfd::FileHandle>| {
        handles
            .iter()
            .map(|handle| handle.path().to_path_buf())
            .collect::<Vec<_>>()
    };

    match props.action {
        ChooserAction::Open if props.select_multiple => dialog.pick_files().await.map(many),
        ChooserAction::Open => dialog.pick_file().await.map(single),
        ChooserAction::Save => dialog.save_file().await.map(single),
        ChooserAction::SelectFolder | ChooserAction::CreateFolder if props.select_multiple => {
            dialog.pick_folders().await.map(many)
        }
        ChooserAction::SelectFolder | ChooserAction::CreateFolder => {
            dialog.pick_folder().await.map(single)
        }
    }
}
