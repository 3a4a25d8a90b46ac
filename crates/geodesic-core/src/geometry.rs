//! Helpers for fixed-point positions.
//!
//! Planet-scale positions are `I64Vec3`s where `2^precision` units make up one meter. Squaring those
//! coordinates would overflow an `i64`, so distance tests are done on the differences in `f64`.

use glam::I64Vec3;

/// `|a - b|` without overflowing.
#[inline]
pub fn abs_difference(a: i64, b: i64) -> u64 {
    a.abs_diff(b)
}

/// `2^exponent`.
#[inline]
pub const fn int_2pow(exponent: u32) -> i64 {
    1 << exponent
}

/// True if `a` and `b` are strictly closer than `threshold`.
pub fn is_distance_near(a: I64Vec3, b: I64Vec3, threshold: u64) -> bool {
    let dx = abs_difference(a.x, b.x) as f64;
    let dy = abs_difference(a.y, b.y) as f64;
    let dz = abs_difference(a.z, b.z) as f64;
    let threshold = threshold as f64;

    dx * dx + dy * dy + dz * dz < threshold * threshold
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn abs_difference_spans_full_range() {
        assert_eq!(abs_difference(i64::MIN, i64::MAX), u64::MAX);
        assert_eq!(abs_difference(-3, 4), 7);
    }

    #[test]
    fn distance_test_is_strict() {
        let a = I64Vec3::new(0, 0, 0);
        let b = I64Vec3::new(3, 4, 0);
        assert!(is_distance_near(a, b, 6));
        assert!(!is_distance_near(a, b, 5));
    }

    #[test]
    fn distance_test_handles_planet_scale() {
        let a = I64Vec3::new(-(1 << 50), 0, 0);
        let b = I64Vec3::new(1 << 50, 0, 0);
        assert!(!is_distance_near(a, b, 1 << 51));
        assert!(is_distance_near(a, b, (1 << 51) + (1 << 20)));
    }
}
