//! Run-loop bridge
//!
//! `run` must return to its caller right away while the native dialog waits
//! for the user. The bridge connects observers for `response`, `unmap`,
//! `delete` and `destroy`, then parks a task on the UI runtime until one of
//! them fires. That task commits the resulting state, emits `RunDone` and only
//! then releases the reference `run` took, so a concurrent `destroy` never
//! tears the native dialog down underneath it.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::local::LocalDialog;
use super::{DialogNotification, DialogState, ResponseType, RunDone};
use crate::error::SfcdError;
use crate::native::{EventSink, NativeEvent};

/// Handle to the runtime that owns native dialogs and their idle tasks
#[derive(Debug, Clone)]
pub struct UiContext {
    handle: Handle,
}

impl UiContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// The runtime the caller is running on.
    ///
    /// Panics outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Queue `task` on the UI runtime without waiting for it.
    pub fn spawn_idle<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(task)
    }
}

/// Dedicated thread driving a single-threaded UI runtime
pub struct UiThread {
    context: UiContext,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl UiThread {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let context = UiContext::new(runtime.handle().clone());
        let (shutdown, stop) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop.await;
                });
                debug!("UI thread stopped");
            })?;

        Ok(Self {
            context,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    pub fn context(&self) -> UiContext {
        self.context.clone()
    }

    /// Stop the UI runtime and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("UI thread panicked");
            }
        }
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Which observer ended a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Responded(ResponseType),
    Unmapped,
    Deleted,
    Destroyed,
}

/// Event observers of one dialog
///
/// Show and hide are always forwarded to listeners. The run observers are only
/// connected between `run` and the bridge picking up the completion.
pub(crate) struct Observers {
    run: Mutex<Option<oneshot::Sender<Completion>>>,
    notify: broadcast::Sender<DialogNotification>,
}

impl Observers {
    pub(crate) fn new() -> Arc<Self> {
        let (notify, _) = broadcast::channel(16);
        Arc::new(Self {
            run: Mutex::new(None),
            notify,
        })
    }

    /// Sink handed to the native toolkit
    pub(crate) fn sink(self: &Arc<Self>) -> EventSink {
        let observers = Arc::clone(self);
        EventSink::new(move |event| observers.on_native_event(event))
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<DialogNotification> {
        self.notify.subscribe()
    }

    pub(crate) fn notify(&self, notification: DialogNotification) {
        // No listeners is fine
        let _ = self.notify.send(notification);
    }

    /// Connect the run observers. The receiver fires once.
    pub(crate) fn connect(&self) -> oneshot::Receiver<Completion> {
        let (tx, rx) = oneshot::channel();
        if self.run.lock().replace(tx).is_some() {
            warn!("Run observers were still connected");
        }
        rx
    }

    pub(crate) fn disconnect(&self) {
        self.run.lock().take();
    }

    fn complete(&self, completion: Completion) -> bool {
        match self.run.lock().take() {
            Some(tx) => tx.send(completion).is_ok(),
            None => false,
        }
    }

    fn on_native_event(&self, event: NativeEvent) {
        match event {
            NativeEvent::Show => self.notify(DialogNotification::Shown),
            NativeEvent::Hide => self.notify(DialogNotification::Hidden),
            NativeEvent::Response(response) => {
                if !self.complete(Completion::Responded(response)) {
                    debug!("Ignoring response {:?} outside a run", response);
                }
            }
            NativeEvent::Unmap => {
                self.complete(Completion::Unmapped);
            }
            NativeEvent::Delete => {
                if !self.complete(Completion::Deleted) {
                    debug!("Ignoring delete event outside a run");
                }
            }
            NativeEvent::Destroy => {
                if !self.complete(Completion::Destroyed) {
                    debug!("Native dialog destroyed outside a run");
                }
            }
        }
    }
}

/// Hand a started run over to the UI runtime.
///
/// `dialog` is the extra reference taken by `run`; it is released when the
/// bridge task ends.
pub(crate) fn spawn_bridge(dialog: LocalDialog, completion: oneshot::Receiver<Completion>) {
    let ui = dialog.ui().clone();
    ui.spawn_idle(async move {
        let completion = match completion.await {
            Ok(completion) => completion,
            Err(_) => {
                let err = SfcdError::Unknown(format!(
                    "run observers of dialog {} vanished",
                    dialog.get_id()
                ));
                error!("{}", err);
                Completion::Destroyed
            }
        };
        let done = finish_run(&dialog, completion);
        dialog.observers().notify(DialogNotification::RunDone(done));
        drop(dialog);
    });
}

/// Commit the outcome of a run and describe it.
fn finish_run(dialog: &LocalDialog, completion: Completion) -> RunDone {
    dialog.observers().disconnect();

    let response = match completion {
        Completion::Responded(response) => response,
        Completion::Unmapped => ResponseType::None,
        Completion::Deleted => ResponseType::DeleteEvent,
        Completion::Destroyed => {
            let err = SfcdError::Unknown(format!(
                "native dialog of {} destroyed while running",
                dialog.get_id()
            ));
            error!("{}", err);
            ResponseType::DeleteEvent
        }
    };

    let mut core = dialog.lock_core();
    if core.state != DialogState::Running {
        let err = SfcdError::Unknown(format!(
            "dialog {} finished a run in state {}",
            dialog.get_id(),
            core.state
        ));
        error!("{}", err);
    }

    if let Some(modal) = core.restore_modal.take() {
        core.native.model().set_modal(modal);
    }
    core.native.hide();

    let destroyed = response == ResponseType::DeleteEvent;
    core.state = if destroyed {
        DialogState::Invalid
    } else if response.is_accept_class() {
        DialogState::DataRetrieval
    } else {
        DialogState::Configuration
    };
    let state = core.state;
    drop(core);

    info!(
        "Dialog {} run finished: response={:?} state={} destroyed={}",
        dialog.get_id(),
        response,
        state,
        destroyed
    );

    RunDone {
        id: dialog.get_id().to_string(),
        response,
        state,
        destroyed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_hide_forwarded() {
        let observers = Observers::new();
        let mut rx = observers.subscribe();
        let sink = observers.sink();

        sink.emit(NativeEvent::Show);
        sink.emit(NativeEvent::Hide);

        assert_eq!(rx.try_recv().unwrap(), DialogNotification::Shown);
        assert_eq!(rx.try_recv().unwrap(), DialogNotification::Hidden);
    }

    #[test]
    fn test_first_observer_wins() {
        let observers = Observers::new();
        let mut completion = observers.connect();
        let sink = observers.sink();

        sink.emit(NativeEvent::Response(ResponseType::Accept));
        sink.emit(NativeEvent::Unmap);

        assert_eq!(
            completion.try_recv().unwrap(),
            Completion::Responded(ResponseType::Accept)
        );
    }

    #[test]
    fn test_events_outside_run_ignored() {
        let observers = Observers::new();
        let sink = observers.sink();
        sink.emit(NativeEvent::Delete);
        sink.emit(NativeEvent::Destroy);

        let mut completion = observers.connect();
        sink.emit(NativeEvent::Unmap);
        assert_eq!(completion.try_recv().unwrap(), Completion::Unmapped);
    }

    #[test]
    fn test_disconnect_drops_sender() {
        let observers = Observers::new();
        let mut completion = observers.connect();
        observers.disconnect();
        assert!(completion.try_recv().is_err());
    }
}
