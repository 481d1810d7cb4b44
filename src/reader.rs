//! Background receive loop.
//!
//! One dedicated thread polls the attached serial link for incoming bytes and
//! forwards complete lines to the UI. Nothing here touches UI state:
//!
//! - UI -> reader: a `std::sync::mpsc` command channel (`Attach`, `Detach`).
//! - reader -> UI: a bounded `tokio::sync::mpsc` queue of [`ReaderEvent`]s,
//!   drained by the UI thread once per frame.
//!
//! The reader owns its own clone of the link, so the UI can keep writing
//! commands without sharing a lock with the blocking read. A read error is
//! reported once and ends the thread for good.

use crate::config::ReaderSettings;
use crate::error::AppResult;
use crate::serial::SerialLink;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc as queue;
use tracing::{debug, warn};

/// Callback run after each event is queued, e.g. to wake the GUI.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Instructions from the UI thread.
pub enum ReaderCommand {
    /// Start polling this link.
    Attach(Box<dyn SerialLink>),
    /// Drop the current link and go idle.
    Detach,
}

/// Output of the reader thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// One decoded, trimmed line from the device.
    Line(String),
    /// The link failed; the reader has stopped.
    Failed(String),
}

/// UI-side ends of the reader channels.
pub struct ReaderHandle {
    commands: mpsc::Sender<ReaderCommand>,
    events: queue::Receiver<ReaderEvent>,
}

impl ReaderHandle {
    /// Hand `link` to the reader. Returns false if the reader has exited.
    pub fn attach(&self, link: Box<dyn SerialLink>) -> bool {
        self.commands.send(ReaderCommand::Attach(link)).is_ok()
    }

    /// Ask the reader to drop its link.
    pub fn detach(&self) {
        let _ = self.commands.send(ReaderCommand::Detach);
    }

    /// Take every queued event without blocking.
    pub fn drain_events(&mut self) -> Vec<ReaderEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

/// Start the reader thread.
///
/// The returned `JoinHandle` is never required: the thread ends on a read
/// error or when the `ReaderHandle` is dropped.
pub fn spawn_reader(
    settings: &ReaderSettings,
    notify: Option<Notify>,
) -> AppResult<(ReaderHandle, JoinHandle<()>)> {
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = queue::channel(settings.queue_capacity.max(1));

    let reader = Reader {
        commands: command_rx,
        events: event_tx,
        notify,
        poll_interval: settings.poll_interval(),
        link: None,
    };

    let join = thread::Builder::new()
        .name("serial-reader".to_string())
        .spawn(move || reader.run())?;

    Ok((
        ReaderHandle {
            commands: command_tx,
            events: event_rx,
        },
        join,
    ))
}

struct Reader {
    commands: mpsc::Receiver<ReaderCommand>,
    events: queue::Sender<ReaderEvent>,
    notify: Option<Notify>,
    poll_interval: Duration,
    link: Option<Box<dyn SerialLink>>,
}

impl Reader {
    fn run(mut self) {
        debug!("Serial reader started");
        loop {
            if !self.apply_commands() {
                debug!("Serial reader exiting: UI side closed");
                return;
            }

            let Some(link) = self.link.as_mut() else {
                continue;
            };

            match read_available(link.as_mut()) {
                Ok(Some(line)) => {
                    debug!("Received: {}", line);
                    if !self.emit(ReaderEvent::Line(line)) {
                        return;
                    }
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    warn!("Serial read failed, reader stopping: {}", e);
                    self.link = None;
                    self.emit(ReaderEvent::Failed(e.to_string()));
                    return;
                }
            }
        }
    }

    /// Apply pending commands. Blocks while no link is attached.
    /// Returns false once the command channel is closed.
    fn apply_commands(&mut self) -> bool {
        loop {
            let command = if self.link.is_some() {
                match self.commands.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => return true,
                    Err(TryRecvError::Disconnected) => return false,
                }
            } else {
                match self.commands.recv() {
                    Ok(command) => command,
                    Err(_) => return false,
                }
            };

            match command {
                ReaderCommand::Attach(link) => {
                    debug!("Reader attached to {}", link.name());
                    self.link = Some(link);
                }
                ReaderCommand::Detach => {
                    debug!("Reader detached");
                    self.link = None;
                }
            }
        }
    }

    fn emit(&self, event: ReaderEvent) -> bool {
        if self.events.blocking_send(event).is_err() {
            return false;
        }
        if let Some(notify) = &self.notify {
            notify();
        }
        true
    }
}

/// Read one line if bytes are waiting.
fn read_available(link: &mut dyn SerialLink) -> AppResult<Option<String>> {
    if link.bytes_to_read()? == 0 {
        return Ok(None);
    }
    let raw = link.read_line()?;
    Ok(Some(String::from_utf8_lossy(&raw).trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SerialSettings;
    use crate::serial::mock::MockBackend;
    use crate::serial::SerialBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn wait_for_events(handle: &mut ReaderHandle, count: usize) -> Vec<ReaderEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < count && Instant::now() < deadline {
            events.extend(handle.drain_events());
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    fn settings() -> ReaderSettings {
        ReaderSettings {
            poll_interval_ms: 1,
            queue_capacity: 16,
        }
    }

    #[test]
    fn test_lines_are_decoded_and_trimmed() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let link = backend.open("COM3", &SerialSettings::default()).unwrap();
        let (mut handle, _join) = spawn_reader(&settings(), None).unwrap();

        device.push_incoming("  hello\r\n");
        device.push_bytes(b"caf\xc3\xa9\n");
        assert!(handle.attach(link));

        let events = wait_for_events(&mut handle, 2);
        assert_eq!(
            events,
            vec![
                ReaderEvent::Line("hello".to_string()),
                ReaderEvent::Line("café".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let link = backend.open("COM3", &SerialSettings::default()).unwrap();
        let (mut handle, _join) = spawn_reader(&settings(), None).unwrap();

        device.push_bytes(b"\xff\xfeok\n");
        handle.attach(link);

        let events = wait_for_events(&mut handle, 1);
        assert_eq!(events, vec![ReaderEvent::Line("\u{fffd}\u{fffd}ok".to_string())]);
    }

    #[test]
    fn test_read_failure_stops_the_thread() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let link = backend.open("COM3", &SerialSettings::default()).unwrap();
        let (mut handle, join) = spawn_reader(&settings(), None).unwrap();

        device.fail_reads("device disconnected");
        handle.attach(link);

        let events = wait_for_events(&mut handle, 1);
        assert_eq!(
            events,
            vec![ReaderEvent::Failed("device disconnected".to_string())]
        );
        join.join().unwrap();

        // Nothing else arrives once the reader is gone.
        device.push_incoming("late\n");
        thread::sleep(Duration::from_millis(20));
        assert!(handle.drain_events().is_empty());
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn test_notify_runs_per_event() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let link = backend.open("COM3", &SerialSettings::default()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let notify: Notify = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let (mut handle, _join) = spawn_reader(&settings(), Some(notify)).unwrap();

        device.push_incoming("a\nb\nc\n");
        handle.attach(link);

        assert_eq!(wait_for_events(&mut handle, 3).len(), 3);
        // The callback runs just after each send, so give the last one a moment.
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_detach_releases_the_link() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let link = backend.open("COM3", &SerialSettings::default()).unwrap();
        let (handle, _join) = spawn_reader(&settings(), None).unwrap();

        handle.attach(link);
        handle.detach();

        let deadline = Instant::now() + Duration::from_secs(5);
        while device.open_handles() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn test_dropping_the_handle_ends_the_thread() {
        let (handle, join) = spawn_reader(&settings(), None).unwrap();
        drop(handle);
        join.join().unwrap();
    }
}
