//! Headless toolkit
//!
//! Dialogs that never reach a screen. Each one can be driven through a
//! [`HeadlessHandle`]: pick paths, click a button, close the window. The broker
//! uses it with `--headless`; the tests use it everywhere.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{ChooserModel, EventSink, NativeDialog, NativeDialogSpec, NativeEvent, NativeToolkit};
use crate::dialog::ResponseType;

#[derive(Debug, Default)]
struct WindowState {
    visible: bool,
    destroyed: bool,
    presented: u32,
}

/// Toolkit whose dialogs are driven programmatically
#[derive(Clone, Default)]
pub struct HeadlessToolkit {
    created: Arc<Mutex<Vec<HeadlessHandle>>>,
    fail_creation: Arc<AtomicBool>,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create` fail until switched back.
    pub fn set_fail_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::Relaxed);
    }

    /// Handles of dialogs that are still alive, oldest first
    pub fn handles(&self) -> Vec<HeadlessHandle> {
        self.created.lock().clone()
    }

    /// Handle of the most recently created dialog
    pub fn last(&self) -> Option<HeadlessHandle> {
        self.created.lock().last().cloned()
    }

    /// Handle of the dialog with the given title
    pub fn find(&self, title: &str) -> Option<HeadlessHandle> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|handle| handle.model.title() == title)
            .cloned()
    }
}

impl NativeToolkit for HeadlessToolkit {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create(
        &self,
        spec: &NativeDialogSpec,
        events: EventSink,
    ) -> Result<Box<dyn NativeDialog>, String> {
        if self.fail_creation.load(Ordering::Relaxed) {
            return Err("headless toolkit refused to create a dialog".to_string());
        }

        let handle = HeadlessHandle {
            window: Arc::new(Mutex::new(WindowState::default())),
            model: ChooserModel::from_spec(spec),
            events,
        };

        let mut created = self.created.lock();
        created.retain(|h| !h.is_destroyed());
        created.push(handle.clone());

        Ok(Box::new(HeadlessDialog { handle }))
    }
}

/// Remote control for one headless dialog
#[derive(Clone)]
pub struct HeadlessHandle {
    window: Arc<Mutex<WindowState>>,
    model: ChooserModel,
    events: EventSink,
}

impl HeadlessHandle {
    pub fn model(&self) -> &ChooserModel {
        &self.model
    }

    pub fn is_visible(&self) -> bool {
        self.window.lock().visible
    }

    pub fn is_destroyed(&self) -> bool {
        self.window.lock().destroyed
    }

    pub fn present_count(&self) -> u32 {
        self.window.lock().presented
    }

    /// Mark paths as selected in the window, without responding yet.
    pub fn select(&self, paths: Vec<PathBuf>) {
        self.model.select(paths);
    }

    /// Click the button carrying `response`.
    pub fn respond(&self, response: ResponseType) {
        self.events.emit(NativeEvent::Response(response));
    }

    /// Select `paths` and click the accept button.
    pub fn choose(&self, paths: Vec<PathBuf>) {
        self.select(paths);
        self.respond(ResponseType::Accept);
    }

    /// Close the window from the window manager.
    pub fn close(&self) {
        self.events.emit(NativeEvent::Delete);
    }

    /// Destroy the widget behind the dialog's back.
    pub fn destroy_widget(&self) {
        self.events.emit(NativeEvent::Destroy);
    }
}

struct HeadlessDialog {
    handle: HeadlessHandle,
}

impl NativeDialog for HeadlessDialog {
    fn model(&self) -> &ChooserModel {
        &self.handle.model
    }

    fn show(&mut self) {
        let was_visible = std::mem::replace(&mut self.handle.window.lock().visible, true);
        if !was_visible {
            self.handle.events.emit(NativeEvent::Show);
        }
    }

    fn hide(&mut self) {
        let was_visible = std::mem::replace(&mut self.handle.window.lock().visible, false);
        if was_visible {
            self.handle.events.emit(NativeEvent::Hide);
            self.handle.events.emit(NativeEvent::Unmap);
        }
    }

    fn present(&mut self) {
        self.handle.window.lock().presented += 1;
    }

    fn is_visible(&self) -> bool {
        self.handle.is_visible()
    }

    fn destroy(&mut self) {
        let mut window = self.handle.window.lock();
        window.visible = false;
        window.destroyed = true;
        debug!("Headless dialog {:?} destroyed", self.handle.model.title());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ChooserAction;

    fn spec(title: &str) -> NativeDialogSpec {
        NativeDialogSpec {
            title: title.to_string(),
            parent: None,
            action: ChooserAction::Open,
            buttons: Vec::new(),
        }
    }

    fn recording_sink() -> (EventSink, Arc<Mutex<Vec<NativeEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        (EventSink::new(move |ev| recorded.lock().push(ev)), events)
    }

    #[test]
    fn test_show_hide_events() {
        let toolkit = HeadlessToolkit::new();
        let (sink, events) = recording_sink();
        let mut dialog = toolkit.create(&spec("Events"), sink).unwrap();

        dialog.hide(); // not visible yet: silent
        dialog.show();
        dialog.show();
        dialog.hide();

        assert_eq!(
            *events.lock(),
            vec![NativeEvent::Show, NativeEvent::Hide, NativeEvent::Unmap]
        );
    }

    #[test]
    fn test_handle_drives_dialog() {
        let toolkit = HeadlessToolkit::new();
        let (sink, events) = recording_sink();
        let mut dialog = toolkit.create(&spec("Driven"), sink).unwrap();
        let handle = toolkit.find("Driven").unwrap();

        dialog.show();
        dialog.present();
        handle.choose(vec![PathBuf::from("/tmp/x")]);
        handle.close();

        assert!(handle.is_visible());
        assert_eq!(handle.present_count(), 1);
        assert_eq!(dialog.model().filename(), Some(PathBuf::from("/tmp/x")));
        assert_eq!(
            *events.lock(),
            vec![
                NativeEvent::Show,
                NativeEvent::Response(ResponseType::Accept),
                NativeEvent::Delete
            ]
        );

        dialog.destroy();
        assert!(handle.is_destroyed());
        assert!(!handle.is_visible());
    }

    #[test]
    fn test_creation_failure_and_pruning() {
        let toolkit = HeadlessToolkit::new();
        toolkit.set_fail_creation(true);
        assert!(toolkit.create(&spec("Nope"), recording_sink().0).is_err());
        toolkit.set_fail_creation(false);

        let mut first = toolkit.create(&spec("First"), recording_sink().0).unwrap();
        first.destroy();
        let _second = toolkit.create(&spec("Second"), recording_sink().0).unwrap();

        let titles: Vec<String> = toolkit.handles().iter().map(|h| h.model().title()).collect();
        assert_eq!(titles, vec!["Second".to_string()]);
    }
}
