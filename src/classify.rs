//! Pure classification of accumulated input bytes into key events.

use crate::event::KeyEvent;
use crate::tables::KeyTables;

pub const ESC: u8 = 0x1b;

/// Split decoded text into one event per character; control characters
/// become [`KeyEvent::Control`], everything else [`KeyEvent::Char`].
pub fn split_characters(text: &str, tables: &KeyTables) -> Vec<KeyEvent> {
    let mut events = Vec::with_capacity(text.len());
    push_characters(&mut events, text, tables);
    events
}

fn push_characters(events: &mut Vec<KeyEvent>, text: &str, tables: &KeyTables) {
    events.extend(text.chars().map(|ch| match tables.control_codes.lookup_char(ch) {
        Some(code) => KeyEvent::Control(code),
        None => KeyEvent::Char(ch),
    }));
}

fn push_bytes(events: &mut Vec<KeyEvent>, bytes: &[u8], tables: &KeyTables) {
    if !bytes.is_empty() {
        push_characters(events, &String::from_utf8_lossy(bytes), tables);
    }
}

/// Classify one ESC-prefixed group.
///
/// The longest prefix (the whole group included) found in the CSI table wins
/// and the rest is treated as ordinary characters. Failing that, `ESC` plus a
/// printable ASCII byte is an Alt combination. Anything else is a bare `ESC`
/// followed by the remaining bytes as ordinary characters.
pub fn classify_escape(group: &[u8], tables: &KeyTables) -> Vec<KeyEvent> {
    let mut events = Vec::new();
    push_escape(&mut events, group, tables);
    events
}

fn push_escape(events: &mut Vec<KeyEvent>, group: &[u8], tables: &KeyTables) {
    debug_assert_eq!(group.first(), Some(&ESC));

    let matched = (2..=group.len())
        .rev()
        .find_map(|len| tables.csi.get(&group[..len]).map(|name| (len, name)));
    if let Some((len, name)) = matched {
        events.push(KeyEvent::key(name));
        push_bytes(events, &group[len..], tables);
        return;
    }

    match group.get(1) {
        Some(&byte) if (0x20..=0x7E).contains(&byte) => {
            events.push(KeyEvent::alt(char::from(byte)));
            push_bytes(events, &group[2..], tables);
        }
        _ => {
            events.push(KeyEvent::Control(tables.control_codes.escape()));
            push_bytes(events, group.get(1..).unwrap_or_default(), tables);
        }
    }
}

/// Classify a complete drain of raw bytes into key events, in input order.
pub fn classify(bytes: &[u8], tables: &KeyTables) -> Vec<KeyEvent> {
    let mut events = Vec::new();
    let Some(first_escape) = bytes.iter().position(|&b| b == ESC) else {
        push_bytes(&mut events, bytes, tables);
        return events;
    };

    push_bytes(&mut events, &bytes[..first_escape], tables);
    for group in escape_groups(&bytes[first_escape..]) {
        push_escape(&mut events, group, tables);
    }
    events
}

/// Split `bytes` (which must start with ESC) at every ESC byte.
pub fn escape_groups(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = bytes;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest[1..]
            .iter()
            .position(|&b| b == ESC)
            .map_or(rest.len(), |idx| idx + 1);
        let (group, tail) = rest.split_at(end);
        rest = tail;
        Some(group)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{CsiTable, TerminalType};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn xterm() -> KeyTables {
        KeyTables::for_terminal(TerminalType::XtermNew)
    }

    fn names(events: &[KeyEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                KeyEvent::Control(code) => format!("<{}>", code.name()),
                other => other.to_string(),
            })
            .collect()
    }

    #[test]
    fn escape_groups_split_at_each_escape() {
        let groups: Vec<&[u8]> = escape_groups(b"\x1b[A\x1b\x1bOPx").collect();
        let expected: Vec<&[u8]> = vec![b"\x1b[A", b"\x1b", b"\x1bOPx"];
        assert_eq!(groups, expected);
    }

    #[test]
    fn exact_csi_match_yields_one_event() {
        let events = classify(b"\x1b[A", &xterm());
        assert_eq!(events, vec![KeyEvent::key("ArrowUp")]);
    }

    #[test]
    fn custom_table_mapping_is_used() {
        let tables = KeyTables::new(
            Default::default(),
            CsiTable::from_entries([(&b"\x1b[A"[..], "Up")]),
        );
        assert_eq!(classify(b"\x1b[A", &tables), vec![KeyEvent::key("Up")]);
    }

    #[test]
    fn csi_prefix_then_printable_yields_two_events() {
        let events = classify(b"\x1b[Ax", &xterm());
        assert_eq!(events, vec![KeyEvent::key("ArrowUp"), KeyEvent::Char('x')]);
    }

    #[test]
    fn longest_prefix_wins() {
        let events = classify(b"\x1b[15~z", &xterm());
        assert_eq!(names(&events), vec!["F5", "z"]);
    }

    #[test]
    fn escape_and_printable_is_alt() {
        assert_eq!(classify(b"\x1bA", &xterm()), vec![KeyEvent::key("Alt-A")]);
        assert_eq!(
            names(&classify(b"\x1bab\t", &xterm())),
            vec!["Alt-a", "b", "<TAB>"]
        );
    }

    #[test]
    fn lone_escape_is_bare_escape() {
        let events = classify(b"\x1b", &xterm());
        assert_eq!(names(&events), vec!["<ESC>"]);
        assert_eq!(events[0].to_string(), "Ctrl-[ or Esc");
    }

    #[test]
    fn unmatched_non_printable_keeps_remaining_input() {
        let events = classify(b"\x1b\x01", &xterm());
        assert_eq!(names(&events), vec!["<ESC>", "<SOH>"]);
    }

    #[test]
    fn consecutive_escapes_are_separate_groups() {
        let events = classify(b"\x1b\x1b[B", &xterm());
        assert_eq!(names(&events), vec!["<ESC>", "ArrowDown"]);
    }

    #[test]
    fn leading_characters_precede_escape_groups() {
        let events = classify("hé\x1bOQ".as_bytes(), &xterm());
        assert_eq!(names(&events), vec!["h", "é", "F2"]);
    }

    #[test]
    fn multibyte_utf8_without_escape_is_one_char() {
        assert_eq!(classify("€".as_bytes(), &xterm()), vec![KeyEvent::Char('€')]);
    }

    #[test]
    fn invalid_utf8_becomes_replacement_character() {
        assert_eq!(classify(&[0xFF], &xterm()), vec![KeyEvent::Char('\u{FFFD}')]);
    }

    #[test]
    fn space_is_a_literal() {
        assert_eq!(classify(b" ", &xterm()), vec![KeyEvent::Char(' ')]);
    }

    proptest! {
        #[test]
        fn printable_ascii_byte_is_literal(byte in 0x20u8..=0x7E) {
            let events = classify(&[byte], &xterm());
            prop_assert_eq!(events, vec![KeyEvent::Char(char::from(byte))]);
        }

        #[test]
        fn control_byte_is_named_control(byte in prop_oneof![0u8..32, Just(127u8)]) {
            let tables = xterm();
            let events = classify(&[byte], &tables);
            prop_assert_eq!(events.len(), 1);
            let expected = tables.control_codes.name(byte);
            prop_assert_eq!(events[0].as_control().map(|code| code.name()), expected);
        }

        #[test]
        fn escape_groups_reassemble_input(tail in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut bytes = vec![ESC];
            bytes.extend(tail);
            let joined: Vec<u8> = escape_groups(&bytes).flatten().copied().collect();
            prop_assert_eq!(joined, bytes.clone());
            for group in escape_groups(&bytes) {
                prop_assert_eq!(group[0], ESC);
                prop_assert!(!group[1..].contains(&ESC));
            }
        }
    }
}
