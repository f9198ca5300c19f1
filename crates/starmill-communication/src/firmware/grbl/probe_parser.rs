//! Probe result parsing
//!
//! GRBL reports the outcome of a `G38.x` probing cycle as
//! `[PRB:<x>,<y>,<z>:<status>]`, with status `1` when the probe made
//! contact and `0` when it reached the end of travel without contact.

use regex::Regex;
use starmill_core::{ProbeError, ProbeOutcome, ProbePosition};

const PROBE_PREFIX: &str = "[PRB:";

fn probe_regex() -> &'static Regex {
    static PROBE_REGEX: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PROBE_REGEX.get_or_init(|| {
        Regex::new(
            r"^\[PRB:([+-]?\d+(?:\.\d+)?),([+-]?\d+(?:\.\d+)?),([+-]?\d+(?:\.\d+)?)(?:,[+-]?\d+(?:\.\d+)?)*:([01])\]$",
        )
        .expect("invalid regex pattern")
    })
}

/// Extracts probe contact positions from controller messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeResultParser;

impl ProbeResultParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a controller message.
    ///
    /// Returns `None` for lines that are not probe results. Probe results
    /// without contact yield [`ProbeError::NotTriggered`], and lines that
    /// start like a probe result but cannot be read yield
    /// [`ProbeError::Malformed`]. Numbers always use `.` as the decimal
    /// separator.
    pub fn parse(&self, line: &str) -> Option<ProbeOutcome> {
        let line = line.trim();
        if !line.starts_with(PROBE_PREFIX) {
            return None;
        }

        let malformed = || ProbeError::Malformed {
            line: line.to_string(),
        };

        let Some(captures) = probe_regex().captures(line) else {
            return Some(Err(malformed()));
        };

        if &captures[4] == "0" {
            return Some(Err(ProbeError::NotTriggered {
                line: line.to_string(),
            }));
        }

        let axis = |i: usize| captures[i].parse::<f64>();
        match (axis(1), axis(2), axis(3)) {
            (Ok(x), Ok(y), Ok(z)) => Some(Ok(ProbePosition::new(x, y, z))),
            _ => Some(Err(malformed())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contact() {
        let parser = ProbeResultParser::new();
        let position = parser
            .parse("[PRB:-2.500,-1.000,-105.123:1]")
            .unwrap()
            .unwrap();
        assert_eq!(position, ProbePosition::new(-2.5, -1.0, -105.123));
    }

    #[test]
    fn test_parse_extra_axes_and_whitespace() {
        let parser = ProbeResultParser::new();
        let position = parser
            .parse("  [PRB:1.000,2.000,-3.250,0.000:1]\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(position.z, -3.25);
    }

    #[test]
    fn test_parse_no_contact() {
        let parser = ProbeResultParser::new();
        assert!(matches!(
            parser.parse("[PRB:0.000,0.000,-182.675:0]"),
            Some(Err(ProbeError::NotTriggered { .. }))
        ));
    }

    #[test]
    fn test_parse_malformed() {
        let parser = ProbeResultParser::new();
        for line in ["[PRB:1,2:1]", "[PRB:a,b,c:1]", "[PRB:1,0,2,5:1", "[PRB:1,2,3:7]"] {
            assert!(
                matches!(parser.parse(line), Some(Err(ProbeError::Malformed { .. }))),
                "{line}"
            );
        }
    }

    #[test]
    fn test_unrelated_lines_ignored() {
        let parser = ProbeResultParser::new();
        assert_eq!(parser.parse("ok"), None);
        assert_eq!(parser.parse("[MSG:'$H'|'$X' to unlock]"), None);
        assert_eq!(parser.parse("<Idle|MPos:0.000,0.000,0.000>"), None);
        assert_eq!(parser.parse("[GC:G0 G54 G17 G21 G90 G94 M5 M9 T0 F0 S0]"), None);
    }

    #[test]
    fn test_comma_decimal_is_not_accepted() {
        let parser = ProbeResultParser::new();
        assert!(matches!(
            parser.parse("[PRB:0,500;0,000;-1,250:1]"),
            Some(Err(ProbeError::Malformed { .. }))
        ));
    }
}
