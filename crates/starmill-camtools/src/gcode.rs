//! G-code line builders.
//!
//! Coordinates and feed rates are always rendered with exactly three decimal
//! places and a `.` separator, independent of host locale.

use crate::star::Point;

/// Fixed three-decimal rendering of a coordinate or rate.
///
/// Values that round to zero are rendered without a sign.
pub fn format_coord(value: f64) -> String {
    let text = format!("{:.3}", value);
    match text.strip_prefix('-') {
        Some(unsigned) if unsigned.bytes().all(|b| b == b'0' || b == b'.') => unsigned.to_string(),
        _ => text,
    }
}

/// Up to three decimals with trailing zeros trimmed (`220`, `2.5`).
pub fn format_compact(value: f64) -> String {
    let text = format_coord(value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

/// `G0 X<x> Y<y> Z<z>`
pub fn rapid_move(point: Point, z: f64) -> String {
    format!(
        "G0 X{} Y{} Z{}",
        format_coord(point.x),
        format_coord(point.y),
        format_coord(z)
    )
}

/// `G1 X<x> Y<y>`
pub fn linear_move(point: Point) -> String {
    format!("G1 X{} Y{}", format_coord(point.x), format_coord(point.y))
}

/// `G1 Z<z> F<feed>`
pub fn plunge(z: f64, feed_rate: f64) -> String {
    format!("G1 Z{} F{}", format_coord(z), format_coord(feed_rate))
}

/// `F<feed>`
pub fn feed_rate(rate: f64) -> String {
    format!("F{}", format_coord(rate))
}

/// `M3 S<rpm>`
pub fn spindle_on(rpm: f64) -> String {
    format!("M3 S{:.0}", rpm)
}

/// `G10 L20 P0 X<x> Y<y> Z<z>`: make the current position read as (x, y, z)
/// in the active work coordinate system.
pub fn set_work_origin(x: f64, y: f64, z: f64) -> String {
    format!(
        "G10 L20 P0 X{} Y{} Z{}",
        format_compact(x),
        format_compact(y),
        format_coord(z)
    )
}
