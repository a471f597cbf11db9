//! Viewport tile covering.
//!
//! [`tile_cover`] maps a viewport transform and a target zoom to the ordered
//! set of tiles whose footprints intersect the visible area. The viewport is
//! unprojected corner by corner into tile space (a rotated quadrilateral once
//! bearing is involved), split into two triangles, and rasterized with an
//! edge-walking scanline. The result is sorted by Manhattan distance from the
//! viewport-center cell, which downstream code treats as fetch priority:
//! closer tiles are requested and parsed first.

use crate::coord::TileId;
use crate::transform::TransformState;

/// Computes the tiles covering the viewport at integer zoom `z`, ordered by
/// Manhattan distance of the cell center from the viewport-center cell.
///
/// Rows outside the world are discarded; columns are left unwrapped so that
/// antimeridian-crossing viewports produce cells in neighboring world
/// copies. A degenerate viewport yields an empty sequence.
pub fn tile_cover(state: &TransformState, z: u8) -> Vec<TileId> {
    let w = state.width();
    let h = state.height();
    if w <= 0.0 || h <= 0.0 {
        return Vec::new();
    }

    let tl = state.point_to_tile(0.0, 0.0, z);
    let tr = state.point_to_tile(w, 0.0, z);
    let br = state.point_to_tile(w, h, z);
    let bl = state.point_to_tile(0.0, h, z);
    let center = state.point_to_tile(w * 0.5, h * 0.5, z);

    let corners = [tl, tr, br, bl, center];
    if corners
        .iter()
        .any(|p| !p.0.is_finite() || !p.1.is_finite())
    {
        return Vec::new();
    }

    let dim = TileId::dim(z);
    let mut tiles: Vec<TileId> = Vec::new();
    {
        let mut scan_line = |x0: i32, x1: i32, y: i32| {
            if y >= 0 && y < dim {
                for x in x0..x1 {
                    tiles.push(TileId::new(z, x, y));
                }
            }
        };

        // Split the viewport quadrilateral into two triangles and scan each.
        scan_triangle(tl, tr, br, 0, dim, &mut scan_line);
        scan_triangle(tl, br, bl, 0, dim, &mut scan_line);
    }

    tiles.sort_unstable();
    tiles.dedup();

    let (cx, cy) = center;
    tiles.sort_by(|a, b| {
        let da = (a.x as f64 + 0.5 - cx).abs() + (a.y as f64 + 0.5 - cy).abs();
        let db = (b.x as f64 + 0.5 - cx).abs() + (b.y as f64 + 0.5 - cy).abs();
        da.total_cmp(&db)
    });

    tiles
}

#[derive(Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    dx: f64,
    dy: f64,
}

impl Edge {
    fn new(a: (f64, f64), b: (f64, f64)) -> Self {
        let ((x0, y0), (x1, y1)) = if a.1 > b.1 { (b, a) } else { (a, b) };
        Self {
            x0,
            y0,
            x1,
            y1,
            dx: x1 - x0,
            dy: y1 - y0,
        }
    }
}

/// Walks the scanlines between a long edge `e0` and a shorter edge `e1`,
/// emitting one `[x0, x1)` span per row. Both edges must have nonzero dy.
fn scan_spans(
    mut e0: Edge,
    mut e1: Edge,
    ymin: i32,
    ymax: i32,
    scan_line: &mut impl FnMut(i32, i32, i32),
) {
    let y0 = (ymin as f64).max(e1.y0.floor());
    let y1 = (ymax as f64).min(e1.y1.ceil());

    // Keep e0 to the right of e1.
    let swap = if e0.x0 == e1.x0 && e0.y0 == e1.y0 {
        e0.x0 + e1.dy / e0.dy * e0.dx < e1.x1
    } else {
        e0.x1 - e1.dy / e0.dy * e0.dx < e1.x0
    };
    if swap {
        std::mem::swap(&mut e0, &mut e1);
    }

    let m0 = e0.dx / e0.dy;
    let m1 = e1.dx / e1.dy;
    let d0 = if e0.dx > 0.0 { 1.0 } else { 0.0 };
    let d1 = if e1.dx < 0.0 { 1.0 } else { 0.0 };

    let mut y = y0 as i32;
    while (y as f64) < y1 {
        let x0 = m0 * ((y as f64 + d0 - e0.y0).min(e0.dy)).max(0.0) + e0.x0;
        let x1 = m1 * ((y as f64 + d1 - e1.y0).min(e1.dy)).max(0.0) + e1.x0;
        scan_line(x1.floor() as i32, x0.ceil() as i32, y);
        y += 1;
    }
}

fn scan_triangle(
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
    ymin: i32,
    ymax: i32,
    scan_line: &mut impl FnMut(i32, i32, i32),
) {
    let mut ab = Edge::new(a, b);
    let mut bc = Edge::new(b, c);
    let mut ca = Edge::new(c, a);

    // Sort edges so `ca` ends up spanning the full vertical extent.
    if ab.dy > bc.dy {
        std::mem::swap(&mut ab, &mut bc);
    }
    if ab.dy > ca.dy {
        std::mem::swap(&mut ab, &mut ca);
    }
    if bc.dy > ca.dy {
        std::mem::swap(&mut bc, &mut ca);
    }

    if ab.dy != 0.0 {
        scan_spans(ca, ab, ymin, ymax, scan_line);
    }
    if bc.dy != 0.0 {
        scan_spans(ca, bc, ymin, ymax, scan_line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLng;

    fn state(width: f64, height: f64, zoom: f64) -> TransformState {
        let mut s = TransformState::new();
        s.set_size(width, height);
        s.set_zoom(zoom);
        s
    }

    #[test]
    fn test_single_tile_at_zoom_zero() {
        let s = state(512.0, 512.0, 0.0);
        let cover = tile_cover(&s, 0);
        assert_eq!(cover, vec![TileId::new(0, 0, 0)]);
    }

    #[test]
    fn test_four_tiles_at_zoom_one() {
        let s = state(1024.0, 1024.0, 1.0);
        let cover = tile_cover(&s, 1);
        assert_eq!(cover.len(), 4);
        for x in 0..2 {
            for y in 0..2 {
                assert!(cover.contains(&TileId::new(1, x, y)), "missing {}/{}", x, y);
            }
        }
    }

    #[test]
    fn test_no_duplicates() {
        let s = state(1024.0, 1024.0, 2.0);
        let cover = tile_cover(&s, 2);
        let mut seen = std::collections::HashSet::new();
        for id in &cover {
            assert!(seen.insert(*id), "duplicate {}", id);
        }
    }

    #[test]
    fn test_center_tile_first() {
        let s = state(1024.0, 1024.0, 3.0);
        let cover = tile_cover(&s, 3);
        assert!(!cover.is_empty());
        let (cx, cy) = s.point_to_tile(512.0, 512.0, 3);
        let first = cover[0];
        let d_first = (first.x as f64 + 0.5 - cx).abs() + (first.y as f64 + 0.5 - cy).abs();
        for id in &cover {
            let d = (id.x as f64 + 0.5 - cx).abs() + (id.y as f64 + 0.5 - cy).abs();
            assert!(d_first <= d);
        }
    }

    #[test]
    fn test_degenerate_viewport_is_empty() {
        let s = state(0.0, 0.0, 4.0);
        assert!(tile_cover(&s, 4).is_empty());
    }

    #[test]
    fn test_rotated_viewport_covers_corner_tiles() {
        let mut s = state(1024.0, 1024.0, 4.0);
        s.set_center(LatLng::new(30.0, 45.0)).unwrap();
        s.set_bearing(0.7);
        let cover = tile_cover(&s, 4);

        for (px, py) in [(0.0, 0.0), (1024.0, 0.0), (1024.0, 1024.0), (0.0, 1024.0)] {
            let (x, y) = s.point_to_tile(px, py, 4);
            let id = TileId::new(4, x.floor() as i32, y.floor() as i32);
            assert!(cover.contains(&id), "corner tile {} not covered", id);
        }
    }

    #[test]
    fn test_antimeridian_produces_wrapped_columns() {
        let mut s = state(1024.0, 512.0, 2.0);
        s.set_center(LatLng::new(0.0, 179.9)).unwrap();
        let cover = tile_cover(&s, 2);

        // The eastern half of the viewport hangs past the antimeridian.
        assert!(cover.iter().any(|id| id.x >= TileId::dim(2)));
        assert!(cover.iter().any(|id| id.wrap() == 1));
        assert!(cover.iter().any(|id| id.wrap() == 0));
    }

    #[test]
    fn test_rows_outside_world_are_discarded() {
        let mut s = state(512.0, 2048.0, 0.0);
        // Taller than the world at z0: rows above and below must be clipped.
        s.set_zoom(0.0);
        let cover = tile_cover(&s, 0);
        assert_eq!(cover, vec![TileId::new(0, 0, 0)]);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_cover_contains_all_corner_tiles(
                lat in -60.0..60.0f64,
                lon in -170.0..170.0f64,
                zoom in 2.0..10.0f64,
                bearing in -3.1..3.1f64
            ) {
                let mut s = TransformState::new();
                s.set_size(800.0, 600.0);
                s.set_zoom(zoom);
                s.set_bearing(bearing);
                s.set_center(LatLng::new(lat, lon)).unwrap();

                let z = zoom.floor() as u8;
                let cover = tile_cover(&s, z);
                prop_assert!(!cover.is_empty());

                let dim = TileId::dim(z);
                for (px, py) in [(0.0, 0.0), (800.0, 0.0), (800.0, 600.0), (0.0, 600.0), (400.0, 300.0)] {
                    let (x, y) = s.point_to_tile(px, py, z);
                    let ty = y.floor() as i32;
                    if ty < 0 || ty >= dim {
                        continue;
                    }
                    let id = TileId::new(z, x.floor() as i32, ty);
                    prop_assert!(cover.contains(&id), "corner tile {} missing", id);
                }
            }

            #[test]
            fn test_cover_is_duplicate_free(
                zoom in 0.0..8.0f64
            ) {
                let mut s = TransformState::new();
                s.set_size(1024.0, 768.0);
                s.set_zoom(zoom);

                let z = zoom.floor() as u8;
                let cover = tile_cover(&s, z);
                let unique: std::collections::HashSet<_> = cover.iter().collect();
                prop_assert_eq!(unique.len(), cover.len());
            }
        }
    }
}
