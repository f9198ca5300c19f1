//! GRBL Response Parser
//!
//! Classifies lines received from a GRBL controller: acknowledgements,
//! error and alarm codes, status reports, the startup version line, and
//! bracketed feedback messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Banner GRBL prints once it is ready to accept commands but still locked.
const UNLOCK_BANNER: &str = "['$H'|'$X' to unlock]";

/// The same banner as reported by GRBL 1.1 feedback messages.
const UNLOCK_BANNER_MSG: &str = "[MSG:'$H'|'$X' to unlock]";

/// GRBL response types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrblResponse {
    /// OK acknowledgment
    Ok,
    /// Error response with error code
    Error(u8),
    /// Alarm response with alarm code
    Alarm(u8),
    /// Status report, brackets stripped
    Status(String),
    /// Startup version line (e.g. "Grbl 1.1h ['$' for help]")
    Version(String),
    /// Bracketed feedback such as `[MSG:...]` or `[PRB:...]`
    Feedback(String),
    /// Anything else
    Message(String),
}

impl fmt::Display for GrblResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error(code) => write!(f, "error:{} ({})", code, error_description(*code)),
            Self::Alarm(code) => write!(f, "ALARM:{} ({})", code, alarm_description(*code)),
            Self::Status(status) => write!(f, "status:{}", status),
            Self::Version(version) => write!(f, "version:{}", version),
            Self::Feedback(feedback) => write!(f, "feedback:{}", feedback),
            Self::Message(msg) => write!(f, "message:{}", msg),
        }
    }
}

/// GRBL response parser
#[derive(Debug, Clone, Copy, Default)]
pub struct GrblResponseParser;

impl GrblResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a GRBL response line. Blank lines yield `None`.
    pub fn parse(&self, line: &str) -> Option<GrblResponse> {
        let line = line.trim();

        if line.is_empty() {
            return None;
        }

        if line == "ok" {
            return Some(GrblResponse::Ok);
        }

        if let Some(code) = strip_prefix_ignore_case(line, "error:") {
            if let Ok(code) = code.trim().parse::<u8>() {
                return Some(GrblResponse::Error(code));
            }
        }

        if let Some(code) = strip_prefix_ignore_case(line, "alarm:") {
            if let Ok(code) = code.trim().parse::<u8>() {
                return Some(GrblResponse::Alarm(code));
            }
        }

        if line.starts_with('<') && line.ends_with('>') {
            return Some(GrblResponse::Status(line[1..line.len() - 1].to_string()));
        }

        if line.starts_with("Grbl ") {
            return Some(GrblResponse::Version(line.to_string()));
        }

        if line.starts_with('[') && line.ends_with(']') {
            return Some(GrblResponse::Feedback(line.to_string()));
        }

        Some(GrblResponse::Message(line.to_string()))
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

/// Whether `line` is the banner GRBL prints when it is ready for commands.
pub fn is_unlock_banner(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with(UNLOCK_BANNER) || line.starts_with(UNLOCK_BANNER_MSG)
}

/// Short description of a GRBL error code
pub fn error_description(code: u8) -> &'static str {
    match code {
        1 => "Expected command letter",
        2 => "Bad number format",
        3 => "Invalid statement",
        4 => "Negative value",
        5 => "Setting disabled",
        6 => "Step pulse time too short",
        7 => "EEPROM read failed",
        8 => "Not idle",
        9 => "G-code lock",
        10 => "Homing not enabled",
        11 => "Line overflow",
        12 => "Step rate exceeded",
        13 => "Check door",
        14 => "Line length exceeded",
        15 => "Travel exceeded",
        16 => "Invalid jog command",
        17 => "Laser mode requires PWM output",
        20 => "Unsupported or invalid g-code command",
        21 => "Modal group violation",
        22 => "Undefined feed rate",
        23 => "Invalid g-code ID:23",
        24 => "Invalid g-code ID:24",
        25 => "Invalid g-code ID:25",
        26 => "Invalid g-code ID:26",
        27 => "Invalid g-code ID:27",
        28 => "Invalid g-code ID:28",
        29 => "Invalid g-code ID:29",
        30 => "Invalid g-code ID:30",
        31 => "Invalid g-code ID:31",
        32 => "Invalid g-code ID:32",
        33 => "Invalid motion target",
        34 => "Invalid g-code ID:34",
        35 => "Invalid g-code ID:35",
        36 => "Unused g-code words",
        37 => "Invalid g-code ID:37",
        38 => "Invalid g-code ID:38",
        _ => "Unknown error",
    }
}

/// Short description of a GRBL alarm code
pub fn alarm_description(code: u8) -> &'static str {
    match code {
        1 => "Hard limit triggered",
        2 => "Soft limit exceeded",
        3 => "Abort during cycle",
        4 => "Probe fail: probe not in expected initial state",
        5 => "Probe fail: no contact within travel",
        6 => "Homing fail: reset during cycle",
        7 => "Homing fail: safety door opened",
        8 => "Homing fail: pull-off did not clear limit switch",
        9 => "Homing fail: limit switch not found",
        _ => "Unknown alarm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_and_blank() {
        let parser = GrblResponseParser::new();
        assert_eq!(parser.parse("ok\r\n"), Some(GrblResponse::Ok));
        assert_eq!(parser.parse("   "), None);
    }

    #[test]
    fn test_parse_error_and_alarm() {
        let parser = GrblResponseParser::new();
        assert_eq!(parser.parse("error:22"), Some(GrblResponse::Error(22)));
        assert_eq!(parser.parse("ALARM:5"), Some(GrblResponse::Alarm(5)));
        assert_eq!(parser.parse("alarm:1"), Some(GrblResponse::Alarm(1)));
    }

    #[test]
    fn test_parse_status_version_feedback() {
        let parser = GrblResponseParser::new();
        assert_eq!(
            parser.parse("<Idle|MPos:0.000,0.000,0.000|FS:0,0>"),
            Some(GrblResponse::Status("Idle|MPos:0.000,0.000,0.000|FS:0,0".into()))
        );
        assert!(matches!(
            parser.parse("Grbl 1.1h ['$' for help]"),
            Some(GrblResponse::Version(_))
        ));
        assert!(matches!(
            parser.parse("[PRB:0.000,0.000,-105.123:1]"),
            Some(GrblResponse::Feedback(_))
        ));
        assert!(matches!(parser.parse("hello"), Some(GrblResponse::Message(_))));
    }

    #[test]
    fn test_unlock_banner() {
        assert!(is_unlock_banner("['$H'|'$X' to unlock]"));
        assert!(is_unlock_banner("[MSG:'$H'|'$X' to unlock]"));
        assert!(!is_unlock_banner("Grbl 1.1h ['$' for help]"));
        assert!(!is_unlock_banner("[MSG:Caution: Unlocked]"));
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(error_description(22), "Undefined feed rate");
        assert_eq!(alarm_description(5), "Probe fail: no contact within travel");
        assert_eq!(alarm_description(200), "Unknown alarm");
    }
}
