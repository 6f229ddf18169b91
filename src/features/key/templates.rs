//! Krumhansl-Schmuckler key profiles
//!
//! Tonal hierarchy ratings from the probe-tone experiments, used as
//! correlation templates for all 24 keys.
//!
//! # Reference
//!
//! Krumhansl, C. L. (1990). Cognitive Foundations of Musical Pitch.
//! Oxford University Press.

/// Major profile anchored at C
pub const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Minor profile anchored at C
pub const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Profile rotated so that `root` becomes pitch class 0's reference
///
/// `rotated[pc]` is the profile weight of pitch class `pc` in the key
/// whose tonic is `root`.
pub fn rotate(profile: &[f64; 12], root: usize) -> [f64; 12] {
    let mut rotated = [0.0f64; 12];
    for (pc, slot) in rotated.iter_mut().enumerate() {
        *slot = profile[(pc + 12 - root) % 12];
    }
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_identity() {
        assert_eq!(rotate(&MAJOR_PROFILE, 0), MAJOR_PROFILE);
    }

    #[test]
    fn test_rotation_moves_tonic() {
        // In G major (root 7), the tonic weight sits at pitch class 7
        let g_major = rotate(&MAJOR_PROFILE, 7);
        assert_eq!(g_major[7], MAJOR_PROFILE[0]);
        // And its dominant (D, pc 2) carries the fifth's weight
        assert_eq!(g_major[2], MAJOR_PROFILE[7]);
    }

    #[test]
    fn test_profiles_peak_on_tonic() {
        let max_major = MAJOR_PROFILE.iter().copied().fold(0.0f64, f64::max);
        let max_minor = MINOR_PROFILE.iter().copied().fold(0.0f64, f64::max);
        assert_eq!(MAJOR_PROFILE[0], max_major);
        assert_eq!(MINOR_PROFILE[0], max_minor);
    }
}
