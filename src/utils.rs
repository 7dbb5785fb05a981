//! Heading arithmetic shared across modules.
//!
//! Headings are in degrees, clockwise, with 0 pointing along +Y of the grid
//! (up) and 90 along +X (right).

/// Reduce a rotation to its shortest signed equivalent.
///
/// Assumes the input lies within (-540, 540), which holds for the difference
/// of two headings in [0, 360).
#[inline]
pub fn shortest_rotation(angle: f32) -> f32 {
    if angle > 180.0 {
        angle - 360.0
    } else if angle < -180.0 {
        angle + 360.0
    } else {
        angle
    }
}

/// Wrap a heading into [0, 360).
#[inline]
pub fn wrap_heading(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Unit vector for a heading: (sin h, cos h).
#[inline]
pub fn heading_vector(heading_deg: f32) -> (f32, f32) {
    let rad = heading_deg.to_radians();
    (rad.sin(), rad.cos())
}
