//! Lookup tables mapping raw input to symbolic key names.
//!
//! The tables are plain immutable values built once at startup and handed to
//! the decoder, so the terminal type in use is an explicit choice rather than
//! process-wide state.

use std::collections::{HashMap, HashSet};
use std::env;

use crate::error::{Error, Result};
use crate::event::ControlCode;

/// ASCII control-code names indexed by byte value (0-31); DEL (127) is handled separately.
const ASCII_CONTROL_NAMES: [&str; 32] = [
    "NUL", "SOH", "STX", "ETX", "EOT", "ENQ", "ACK", "BEL", "BS", "TAB", "LF", "VT", "FF", "CR",
    "SO", "SI", "DLE", "DC1", "DC2", "DC3", "DC4", "NAK", "SYN", "ETB", "CAN", "EM", "SUB", "ESC",
    "FS", "GS", "RS", "US",
];

const DEL_NAME: &str = "DEL";

const CONTROL_KEYS: &[(&str, &[&str])] = &[
    ("NUL", &["Ctrl-@", "Ctrl-Space", "Ctrl-2"]),
    ("SOH", &["Ctrl-a"]),
    ("STX", &["Ctrl-b"]),
    ("ETX", &["Ctrl-c"]),
    ("EOT", &["Ctrl-d"]),
    ("ENQ", &["Ctrl-e"]),
    ("ACK", &["Ctrl-f"]),
    ("BEL", &["Ctrl-g"]),
    ("BS", &["Ctrl-h", "Ctrl-Backspace"]),
    ("TAB", &["Ctrl-i", "Tab"]),
    ("LF", &["Ctrl-j"]),
    ("VT", &["Ctrl-k"]),
    ("FF", &["Ctrl-l"]),
    ("CR", &["Ctrl-m", "Enter"]),
    ("SO", &["Ctrl-n"]),
    ("SI", &["Ctrl-o"]),
    ("DLE", &["Ctrl-p"]),
    ("DC1", &["Ctrl-q"]),
    ("DC2", &["Ctrl-r"]),
    ("DC3", &["Ctrl-s"]),
    ("DC4", &["Ctrl-t"]),
    ("NAK", &["Ctrl-u"]),
    ("SYN", &["Ctrl-v"]),
    ("ETB", &["Ctrl-w"]),
    ("CAN", &["Ctrl-x"]),
    ("EM", &["Ctrl-y"]),
    ("SUB", &["Ctrl-z"]),
    ("ESC", &["Ctrl-[", "Esc"]),
    ("FS", &["Ctrl-\\", "Ctrl-4"]),
    ("GS", &["Ctrl-]", "Ctrl-5"]),
    ("RS", &["Ctrl-^", "Ctrl-6"]),
    ("US", &["Ctrl-_", "Ctrl-7"]),
    ("DEL", &["Backspace", "Ctrl-8"]),
];

/// Maps the single-byte control codes (0-31 and 127) to names and key combinations.
#[derive(Debug, Clone)]
pub struct ControlCodeTable {
    names: HashMap<u8, &'static str>,
    keys: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for ControlCodeTable {
    fn default() -> Self {
        Self::ascii()
    }
}

impl ControlCodeTable {
    /// The standard ASCII names with the key combinations an xterm-like keyboard uses.
    pub fn ascii() -> Self {
        let names = (0u8..)
            .zip(ASCII_CONTROL_NAMES)
            .chain(std::iter::once((0x7F, DEL_NAME)))
            .collect();
        Self::from_parts(names, CONTROL_KEYS.iter().copied())
    }

    pub fn from_parts(
        names: HashMap<u8, &'static str>,
        keys: impl IntoIterator<Item = (&'static str, &'static [&'static str])>,
    ) -> Self {
        Self {
            names,
            keys: keys.into_iter().collect(),
        }
    }

    pub fn name(&self, byte: u8) -> Option<&'static str> {
        self.names.get(&byte).copied()
    }

    pub fn keys(&self, name: &str) -> &'static [&'static str] {
        self.keys
            .get(name)
            .copied()
            .unwrap_or(ControlCode::UNDEFINED_KEYS)
    }

    pub fn lookup(&self, byte: u8) -> Option<ControlCode> {
        let name = self.name(byte)?;
        Some(ControlCode::new(name, self.keys(name)))
    }

    /// Control code for a decoded character, if its code point is a control code.
    pub fn lookup_char(&self, ch: char) -> Option<ControlCode> {
        u8::try_from(u32::from(ch))
            .ok()
            .and_then(|byte| self.lookup(byte))
    }

    /// The bare Escape key.
    pub fn escape(&self) -> ControlCode {
        ControlCode::new("ESC", self.keys("ESC"))
    }
}

/// Exact ESC-prefixed byte sequences mapped to symbolic key names.
#[derive(Debug, Clone, Default)]
pub struct CsiTable {
    entries: HashMap<&'static [u8], &'static str>,
    prefixes: HashSet<&'static [u8]>,
}

impl CsiTable {
    pub fn from_entries(
        entries: impl IntoIterator<Item = (&'static [u8], &'static str)>,
    ) -> Self {
        let entries: HashMap<_, _> = entries.into_iter().collect();
        let prefixes = entries
            .keys()
            .flat_map(|&seq| (1..seq.len()).map(move |len| &seq[..len]))
            .collect();
        Self { entries, prefixes }
    }

    pub fn get(&self, seq: &[u8]) -> Option<&'static str> {
        self.entries.get(seq).copied()
    }

    /// Whether `seq` is a proper prefix of some entry, i.e. more bytes could
    /// still complete it into a known sequence.
    pub fn is_partial(&self, seq: &[u8]) -> bool {
        self.prefixes.contains(seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Terminal families with a known key-sequence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalType {
    XtermNew,
    Linux,
}

impl TerminalType {
    /// Read `$TERM` and map it to a supported terminal type.
    pub fn detect() -> Result<Self> {
        let term = env::var("TERM").unwrap_or_default();
        let terminal = Self::from_term_name(&term)?;
        tracing::debug!(term = %term, ?terminal, "detected terminal type");
        Ok(terminal)
    }

    pub fn from_term_name(term: &str) -> Result<Self> {
        match term {
            "xterm" | "xterm-new" | "xterm-256color" => Ok(Self::XtermNew),
            "linux" => Ok(Self::Linux),
            other => Err(Error::UnsupportedTerminal(other.to_string())),
        }
    }

    pub fn csi_table(self) -> CsiTable {
        match self {
            Self::XtermNew => CsiTable::from_entries(XTERM_SEQUENCES.iter().copied()),
            Self::Linux => CsiTable::from_entries(
                XTERM_SEQUENCES
                    .iter()
                    .chain(LINUX_CONSOLE_SEQUENCES)
                    .copied(),
            ),
        }
    }
}

const XTERM_SEQUENCES: &[(&[u8], &str)] = &[
    (b"\x1b[A", "ArrowUp"),
    (b"\x1b[B", "ArrowDown"),
    (b"\x1b[C", "ArrowRight"),
    (b"\x1b[D", "ArrowLeft"),
    (b"\x1bOA", "ArrowUp"),
    (b"\x1bOB", "ArrowDown"),
    (b"\x1bOC", "ArrowRight"),
    (b"\x1bOD", "ArrowLeft"),
    (b"\x1b[H", "Home"),
    (b"\x1b[F", "End"),
    (b"\x1bOH", "Home"),
    (b"\x1bOF", "End"),
    (b"\x1b[1~", "Home"),
    (b"\x1b[7~", "Home"),
    (b"\x1b[4~", "End"),
    (b"\x1b[8~", "End"),
    (b"\x1b[2~", "Insert"),
    (b"\x1b[3~", "Delete"),
    (b"\x1b[5~", "PageUp"),
    (b"\x1b[6~", "PageDown"),
    (b"\x1b[Z", "Shift-Tab"),
    (b"\x1bOP", "F1"),
    (b"\x1bOQ", "F2"),
    (b"\x1bOR", "F3"),
    (b"\x1bOS", "F4"),
    (b"\x1b[15~", "F5"),
    (b"\x1b[17~", "F6"),
    (b"\x1b[18~", "F7"),
    (b"\x1b[19~", "F8"),
    (b"\x1b[20~", "F9"),
    (b"\x1b[21~", "F10"),
    (b"\x1b[23~", "F11"),
    (b"\x1b[24~", "F12"),
    (b"\x1b[1;2A", "Shift-ArrowUp"),
    (b"\x1b[1;2B", "Shift-ArrowDown"),
    (b"\x1b[1;2C", "Shift-ArrowRight"),
    (b"\x1b[1;2D", "Shift-ArrowLeft"),
    (b"\x1b[1;3A", "Alt-ArrowUp"),
    (b"\x1b[1;3B", "Alt-ArrowDown"),
    (b"\x1b[1;3C", "Alt-ArrowRight"),
    (b"\x1b[1;3D", "Alt-ArrowLeft"),
    (b"\x1b[1;5A", "Ctrl-ArrowUp"),
    (b"\x1b[1;5B", "Ctrl-ArrowDown"),
    (b"\x1b[1;5C", "Ctrl-ArrowRight"),
    (b"\x1b[1;5D", "Ctrl-ArrowLeft"),
    (b"\x1b[3;5~", "Ctrl-Delete"),
];

const LINUX_CONSOLE_SEQUENCES: &[(&[u8], &str)] = &[
    (b"\x1b[[A", "F1"),
    (b"\x1b[[B", "F2"),
    (b"\x1b[[C", "F3"),
    (b"\x1b[[D", "F4"),
    (b"\x1b[[E", "F5"),
];

/// Control-code names, key combinations and escape sequences for one terminal.
#[derive(Debug, Clone, Default)]
pub struct KeyTables {
    pub control_codes: ControlCodeTable,
    pub csi: CsiTable,
}

impl KeyTables {
    pub fn new(control_codes: ControlCodeTable, csi: CsiTable) -> Self {
        Self { control_codes, csi }
    }

    pub fn for_terminal(terminal: TerminalType) -> Self {
        Self::new(ControlCodeTable::ascii(), terminal.csi_table())
    }

    /// Tables for the terminal named by `$TERM`. Fails for unsupported terminals.
    pub fn detect() -> Result<Self> {
        TerminalType::detect().map(Self::for_terminal)
    }
}

/// Console scan codes as reported by a two-unit read: `prefix + second * 256`,
/// where the prefix is 0 or 224.
#[derive(Debug, Clone)]
pub struct ScanCodeTable {
    codes: HashMap<u16, &'static str>,
}

impl Default for ScanCodeTable {
    fn default() -> Self {
        Self::windows_console()
    }
}

impl ScanCodeTable {
    pub fn windows_console() -> Self {
        const NAVIGATION: &[(u8, &str)] = &[
            (72, "ArrowUp"),
            (80, "ArrowDown"),
            (75, "ArrowLeft"),
            (77, "ArrowRight"),
            (71, "Home"),
            (79, "End"),
            (73, "PageUp"),
            (81, "PageDown"),
            (82, "Insert"),
            (83, "Delete"),
        ];
        const FUNCTION: &[(u8, &str)] = &[
            (59, "F1"),
            (60, "F2"),
            (61, "F3"),
            (62, "F4"),
            (63, "F5"),
            (64, "F6"),
            (65, "F7"),
            (66, "F8"),
            (67, "F9"),
            (68, "F10"),
        ];

        // Navigation keys arrive with either prefix (numpad vs. dedicated keys).
        let navigation = NAVIGATION.iter().flat_map(|&(code, name)| {
            [(Self::encode(0, code), name), (Self::encode(224, code), name)]
        });
        let function = FUNCTION
            .iter()
            .map(|&(code, name)| (Self::encode(0, code), name));
        let extended = [(Self::encode(224, 133), "F11"), (Self::encode(224, 134), "F12")];

        Self {
            codes: navigation.chain(function).chain(extended).collect(),
        }
    }

    pub fn encode(prefix: u8, code: u8) -> u16 {
        u16::from(prefix) | (u16::from(code) << 8)
    }

    pub fn get(&self, scan_code: u16) -> Option<&'static str> {
        self.codes.get(&scan_code).copied()
    }
}
