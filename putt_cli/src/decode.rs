use putt_core::error::CourseError;
use putt_core::payload::{decode_course_state, decode_dispense, decode_settings};
use putt_core::{Command, CoursePositions, Mode, NUM_COLUMNS};
use serde_json::json;

use crate::cli::PayloadKind;

/// Parse hex text into bytes. Whitespace, `:` and a leading `0x` are ignored.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, CourseError> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CourseError::Payload(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }
    digits
        .chunks(2)
        .map(|pair| -> Result<u8, CourseError> {
            let hi = nibble(pair[0])?;
            let lo = nibble(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn nibble(c: u8) -> Result<u8, CourseError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(CourseError::Payload(format!(
            "invalid hex digit {:?}",
            char::from(c)
        ))),
    }
}

pub fn decode(kind: PayloadKind, hex: &str) -> Result<Command, CourseError> {
    let body = parse_hex(hex)?;
    match kind {
        PayloadKind::Course => decode_course_state(&body),
        PayloadKind::Dispense => decode_dispense(&body),
        PayloadKind::Settings => decode_settings(&body),
    }
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Static => "static",
    }
}

pub fn command_json(cmd: &Command) -> serde_json::Value {
    match cmd {
        Command::SetCourse { mode, positions } => json!({
            "command": "set_course",
            "mode": mode_name(*mode),
            "positions": positions.to_vec(),
        }),
        Command::Dispense { balls } => json!({ "command": "dispense", "balls": balls }),
        Command::Settings { auto_dispense } => {
            json!({ "command": "settings", "auto_dispense": auto_dispense })
        }
        Command::ResetStats => json!({ "command": "reset_stats" }),
        Command::ClearSequence => json!({ "command": "clear_sequence" }),
    }
}

/// One line per row, columns right-aligned.
pub fn course_grid(positions: &CoursePositions) -> String {
    let mut out = String::new();
    for (row, chunk) in positions.chunks(NUM_COLUMNS).enumerate() {
        let cells: Vec<String> = chunk.iter().map(|p| format!("{p:>3}")).collect();
        out.push_str(&format!("row {row}: {}\n", cells.join(" ")));
    }
    out
}

pub fn command_text(cmd: &Command) -> String {
    match cmd {
        Command::SetCourse { mode, positions } => {
            format!("set course, mode {}\n{}", mode_name(*mode), course_grid(positions))
        }
        Command::Dispense { balls } => format!("dispense {balls} ball(s)\n"),
        Command::Settings { auto_dispense } => {
            format!("auto-dispense {}\n", if *auto_dispense { "on" } else { "off" })
        }
        Command::ResetStats => "reset stats\n".to_string(),
        Command::ClearSequence => "clear sequence\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0a", vec![0x0a])]
    #[case("0x0A 5a", vec![0x0a, 0x5a])]
    #[case("de:ad:BE:ef", vec![0xde, 0xad, 0xbe, 0xef])]
    #[case("", vec![])]
    fn hex_forms(#[case] text: &str, #[case] expect: Vec<u8>) {
        assert_eq!(parse_hex(text).unwrap(), expect);
    }

    #[rstest]
    #[case("abc")]
    #[case("zz")]
    fn bad_hex(#[case] text: &str) {
        assert!(matches!(parse_hex(text), Err(CourseError::Payload(_))));
    }

    #[test]
    fn dispense_renders_both_ways() {
        let cmd = decode(PayloadKind::Dispense, "03").unwrap();
        assert_eq!(command_text(&cmd), "dispense 3 ball(s)\n");
        assert_eq!(command_json(&cmd)["balls"], 3);
    }

    #[test]
    fn course_text_has_nine_rows() {
        let hex = format!("00{}", "5a".repeat(45));
        let cmd = decode(PayloadKind::Course, &hex).unwrap();
        let text = command_text(&cmd);
        assert_eq!(text.lines().count(), 10);
        assert!(text.contains("row 8:  90  90  90  90  90"));
    }
}
