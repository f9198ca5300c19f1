use proptest::prelude::*;
use starmill_camtools::{gcode, pass_depths, star_outline, Point};
use std::f64::consts::PI;

proptest! {
    #[test]
    fn star_outline_is_closed(
        points in 3u32..64,
        inner in 0.5f64..100.0,
        extra in 0.5f64..100.0,
        offset in -500.0f64..500.0,
    ) {
        let star = star_outline(points, inner, inner + extra, offset).unwrap();
        let vertices: Vec<Point> = star.iter().collect();

        prop_assert_eq!(vertices.len(), 2 * points as usize + 1);
        prop_assert_eq!(vertices.first(), vertices.last());
    }

    #[test]
    fn star_outline_is_deterministic(points in 3u32..32, inner in 1.0f64..10.0) {
        let star = star_outline(points, inner, inner * 2.0, 100.0).unwrap();
        let first: Vec<Point> = star.iter().collect();
        let second: Vec<Point> = star.iter().collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn pass_depths_decrease_to_zero(passes in 1u32..200, thickness in 0.01f64..100.0) {
        let depths: Vec<f64> = pass_depths(passes, thickness).unwrap().depths().collect();

        prop_assert_eq!(depths.len(), passes as usize);
        prop_assert!(depths.windows(2).all(|w| w[0] > w[1]));
        prop_assert_eq!(*depths.last().unwrap(), 0.0);
    }

    #[test]
    fn coordinates_always_have_three_decimals(value in -10_000.0f64..10_000.0) {
        let text = gcode::format_coord(value);
        let (_, decimals) = text.split_once('.').unwrap();
        prop_assert_eq!(decimals.len(), 3);
        prop_assert!(!text.contains(','));
    }
}

/// `2 * points` steps of `PI / points` must sweep exactly one turn, so the
/// step after the last vertex lands back on the first one.
#[test]
fn angle_steps_sweep_full_turn() {
    for points in 3u32..=24 {
        let star = star_outline(points, 50.0, 90.0, 100.0).unwrap();
        let sweep = (2 * points) as f64 * PI / points as f64;
        let wrapped = Point::new(sweep.cos() * 50.0 + 100.0, sweep.sin() * 50.0 + 100.0);
        let start = star.start();

        assert!((wrapped.x - start.x).abs() < 1e-9, "points = {points}");
        assert!((wrapped.y - start.y).abs() < 1e-9, "points = {points}");
    }
}

#[test]
fn star_vertices_are_distinct_before_closing() {
    let star = star_outline(9, 50.0, 90.0, 100.0).unwrap();
    let open: Vec<Point> = star.iter().take(18).collect();
    for (i, a) in open.iter().enumerate() {
        for b in &open[i + 1..] {
            assert!((a.x - b.x).abs() > 1e-6 || (a.y - b.y).abs() > 1e-6);
        }
    }
}
