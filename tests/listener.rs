use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use keystroke_events::{
    Error, KeyEvent, KeyTables, Listener, ListenerConfig, RawModeKind, ReadOutcome,
    ScanCodeTable, TerminalBackend, TerminalType,
};
use pretty_assertions::assert_eq;

enum Input {
    Bytes(&'static [u8]),
    Scan(u16),
    Fail,
}

/// Terminal stand-in fed from the test thread.
struct ChannelBackend {
    input: mpsc::Receiver<Input>,
    queued: Vec<u8>,
    entered: Arc<AtomicUsize>,
    restored: Arc<AtomicUsize>,
}

struct Harness {
    input: mpsc::Sender<Input>,
    entered: Arc<AtomicUsize>,
    restored: Arc<AtomicUsize>,
}

fn backend() -> (ChannelBackend, Harness) {
    let (tx, rx) = mpsc::channel();
    let entered = Arc::new(AtomicUsize::new(0));
    let restored = Arc::new(AtomicUsize::new(0));
    (
        ChannelBackend {
            input: rx,
            queued: Vec::new(),
            entered: Arc::clone(&entered),
            restored: Arc::clone(&restored),
        },
        Harness {
            input: tx,
            entered,
            restored,
        },
    )
}

impl TerminalBackend for ChannelBackend {
    type Mode = ();

    fn enter_raw_mode(&mut self, _kind: RawModeKind) -> keystroke_events::Result<()> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore_mode(&mut self, _mode: &()) -> keystroke_events::Result<()> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        if !self.queued.is_empty() {
            return Ok(ReadOutcome::Byte(self.queued.remove(0)));
        }
        match self.input.recv_timeout(Duration::from_millis(5)) {
            Ok(Input::Bytes(bytes)) => {
                self.queued.extend_from_slice(bytes);
                Ok(ReadOutcome::Byte(self.queued.remove(0)))
            }
            Ok(Input::Scan(code)) => Ok(ReadOutcome::ScanCode(code)),
            Ok(Input::Fail) => Err(io::Error::other("terminal hung up")),
            Err(RecvTimeoutError::Timeout) => Ok(ReadOutcome::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(ReadOutcome::Closed),
        }
    }

    fn translate_scan_code(&self, scan_code: u16) -> Option<&'static str> {
        ScanCodeTable::windows_console().get(scan_code)
    }
}

/// A terminal that refuses to leave canonical mode.
struct StuckTerminal {
    reads: Arc<AtomicUsize>,
}

impl TerminalBackend for StuckTerminal {
    type Mode = ();

    fn enter_raw_mode(&mut self, _kind: RawModeKind) -> keystroke_events::Result<()> {
        Err(Error::RawMode(io::Error::other("tcsetattr failed")))
    }

    fn restore_mode(&mut self, _mode: &()) -> keystroke_events::Result<()> {
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(ReadOutcome::Idle)
    }
}

fn tables() -> Arc<KeyTables> {
    Arc::new(KeyTables::for_terminal(TerminalType::XtermNew))
}

fn collect(listener: &Listener, count: usize) -> Vec<KeyEvent> {
    let mut events = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while events.len() < count && Instant::now() < deadline {
        match listener.try_next() {
            Some(event) => events.push(event),
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
    events
}

fn render(events: &[KeyEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            KeyEvent::Control(code) => format!("<{}>", code.name()),
            other => other.to_string(),
        })
        .collect()
}

#[test]
fn decodes_keys_in_arrival_order() {
    let (backend, harness) = backend();
    // Bytes of one key may straddle a poll window.
    let config = ListenerConfig::new()
        .carry_partial_escape(true)
        .escape_timeout(Duration::from_millis(500));
    let listener = Listener::spawn(backend, tables(), config).unwrap();

    harness.input.send(Input::Bytes(b"a")).unwrap();
    harness.input.send(Input::Bytes(b"\x1b[A")).unwrap();
    harness.input.send(Input::Bytes("é".as_bytes())).unwrap();
    harness.input.send(Input::Bytes(b"\x03")).unwrap();

    let events = collect(&listener, 4);
    assert_eq!(render(&events), vec!["a", "ArrowUp", "é", "<ETX>"]);
    assert_eq!(events[3].to_string(), "Ctrl-c");

    listener.stop().unwrap();
    assert_eq!(harness.entered.load(Ordering::SeqCst), 1);
    assert_eq!(harness.restored.load(Ordering::SeqCst), 1);
}

#[test]
fn stop_deactivates_the_event_queue() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();
    let events = listener.events();
    assert!(events.is_active());

    listener.stop().unwrap();

    assert!(!events.is_active());
    events.put(KeyEvent::Char('x'));
    assert_eq!(events.get(), None);
    assert_eq!(harness.restored.load(Ordering::SeqCst), 1);
}

#[test]
fn read_failure_surfaces_from_stop_after_restore() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();

    harness.input.send(Input::Fail).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !listener.reader_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(harness.restored.load(Ordering::SeqCst), 1);

    assert!(matches!(listener.stop(), Err(Error::Read(_))));
}

#[test]
fn closed_input_ends_the_reader() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();

    harness.input.send(Input::Bytes(b"z")).unwrap();
    drop(harness.input);

    assert_eq!(render(&collect(&listener, 1)), vec!["z"]);
    listener.stop().unwrap();
    assert_eq!(harness.restored.load(Ordering::SeqCst), 1);
}

#[test]
fn sequence_split_across_windows_without_carry() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();

    harness.input.send(Input::Bytes(b"\x1b")).unwrap();
    assert_eq!(render(&collect(&listener, 1)), vec!["<ESC>"]);
    harness.input.send(Input::Bytes(b"[A")).unwrap();
    assert_eq!(render(&collect(&listener, 2)), vec!["[", "A"]);

    listener.stop().unwrap();
}

#[test]
fn sequence_split_across_windows_with_carry() {
    let (backend, harness) = backend();
    let config = ListenerConfig::new()
        .carry_partial_escape(true)
        .escape_timeout(Duration::from_secs(2));
    let listener = Listener::spawn(backend, tables(), config).unwrap();

    harness.input.send(Input::Bytes(b"\x1b")).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(listener.try_next(), None);
    harness.input.send(Input::Bytes(b"[A")).unwrap();

    assert_eq!(collect(&listener, 1), vec![KeyEvent::key("ArrowUp")]);
    listener.stop().unwrap();
}

#[test]
fn dropping_the_listener_signals_shutdown() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();
    let events = listener.events();

    drop(listener);

    assert!(!events.is_active());
    let deadline = Instant::now() + Duration::from_secs(5);
    while harness.restored.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(harness.restored.load(Ordering::SeqCst), 1);
}

#[test]
fn raw_mode_failure_aborts_startup() {
    let reads = Arc::new(AtomicUsize::new(0));
    let backend = StuckTerminal {
        reads: Arc::clone(&reads),
    };

    let result = Listener::spawn(backend, tables(), ListenerConfig::new());

    assert!(matches!(result, Err(Error::RawMode(_))));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn raw_mode_is_entered_before_spawn_returns() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();

    assert_eq!(harness.entered.load(Ordering::SeqCst), 1);
    listener.stop().unwrap();
}

#[test]
fn scan_codes_arrive_as_named_keys() {
    let (backend, harness) = backend();
    let listener = Listener::spawn(backend, tables(), ListenerConfig::new()).unwrap();

    harness.input.send(Input::Bytes(b"a")).unwrap();
    harness
        .input
        .send(Input::Scan(ScanCodeTable::encode(224, 80)))
        .unwrap();
    harness
        .input
        .send(Input::Scan(ScanCodeTable::encode(224, 134)))
        .unwrap();
    harness.input.send(Input::Bytes(b"b")).unwrap();

    assert_eq!(
        render(&collect(&listener, 4)),
        vec!["a", "ArrowDown", "F12", "b"]
    );
    listener.stop().unwrap();
}
