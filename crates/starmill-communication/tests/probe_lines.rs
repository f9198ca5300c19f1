use proptest::prelude::*;
use starmill_communication::{GrblResponse, GrblResponseParser, ProbeResultParser};
use starmill_core::ProbeError;

proptest! {
    #[test]
    fn contact_lines_yield_their_z(
        x in -500.0f64..500.0,
        y in -500.0f64..500.0,
        z in -500.0f64..500.0,
    ) {
        let line = format!("[PRB:{:.3},{:.3},{:.3}:1]", x, y, z);
        let position = ProbeResultParser::new().parse(&line).unwrap().unwrap();
        let expected: f64 = format!("{:.3}", z).parse().unwrap();
        prop_assert_eq!(position.z, expected);
    }

    #[test]
    fn no_contact_is_never_a_position(z in -500.0f64..0.0) {
        let line = format!("[PRB:0.000,0.000,{:.3}:0]", z);
        let outcome = ProbeResultParser::new().parse(&line);
        let not_triggered = matches!(outcome, Some(Err(ProbeError::NotTriggered { .. })));
        prop_assert!(not_triggered);
    }

    #[test]
    fn other_lines_are_ignored(line in "[^\\[]{0,40}") {
        prop_assert_eq!(ProbeResultParser::new().parse(&line), None);
    }
}

#[test]
fn probe_result_is_feedback_for_the_line_parser() {
    let line = "[PRB:-2.500,-1.000,-105.123:1]";
    assert_eq!(
        GrblResponseParser::new().parse(line),
        Some(GrblResponse::Feedback(line.to_string()))
    );
}
