//! Map marker placement for deeds.

/// How far a marker gets nudged per collision cycle, in degrees
const OFFSET_STEP: f64 = 0.0001;

/// Place a marker at `(lat, lng)`, nudging it so it never lands exactly on
/// an existing marker.
///
/// Candidates are tried in a fixed order relative to the original
/// coordinate: +lat, +lng, +lat+lng, -lat, -lng, -lat-lng. When a whole
/// cycle collides the offset grows by another step and the cycle restarts
/// from the original coordinate. Deterministic for a given set of existing
/// markers.
pub fn deconflict(existing: &[(f64, f64)], lat: f64, lng: f64) -> (f64, f64) {
    let occupied = |candidate: (f64, f64)| existing.iter().any(|&marker| marker == candidate);

    if !occupied((lat, lng)) {
        return (lat, lng);
    }

    let mut offset = OFFSET_STEP;
    loop {
        let cycle = [
            (lat + offset, lng),
            (lat, lng + offset),
            (lat + offset, lng + offset),
            (lat - offset, lng),
            (lat, lng - offset),
            (lat - offset, lng - offset),
        ];
        if let Some(free) = cycle.into_iter().find(|&candidate| !occupied(candidate)) {
            return free;
        }
        offset += OFFSET_STEP;
    }
}
