//! 16-bit modular sequence-number arithmetic.
//!
//! Sequence numbers live in a 65536-value circular space, so plain `<` is
//! meaningless across the wrap point.  Ordering uses the half-window rule:
//! `b` is ahead of `a` when the forward distance from `a` to `b` is strictly
//! less than half the modulus.  The comparison is correct as long as the two
//! values are less than 32768 apart, which the bounded window guarantees.

/// Half of the sequence-number modulus; distances at or beyond this are
/// treated as "behind".
const HALF_WINDOW: u16 = 32768;

/// Advance `cursor` by `n` bytes, wrapping modulo 65536.
#[inline]
pub fn advance(cursor: u16, n: usize) -> u16 {
    cursor.wrapping_add((n % 65536) as u16)
}

/// Returns `true` when `candidate` is strictly ahead of `base` in the
/// circular sequence space.
///
/// Equal values are not ahead, and neither is the ambiguous antipode at
/// exactly half the modulus.
#[inline]
pub fn is_ahead(base: u16, candidate: u16) -> bool {
    let diff = candidate.wrapping_sub(base);
    diff != 0 && diff < HALF_WINDOW
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_modulo_65536() {
        assert_eq!(advance(0, 1000), 1000);
        assert_eq!(advance(65000, 1000), 464);
        assert_eq!(advance(65535, 1), 0);
        assert_eq!(advance(7, 65536), 7);
    }

    #[test]
    fn ahead_holds_for_any_distance_below_half_window() {
        for &base in &[0u16, 1, 12345, 32767, 32768, 65535] {
            for &d in &[1usize, 2, 100, 1000, 32766, 32767] {
                assert!(
                    is_ahead(base, advance(base, d)),
                    "advance({base}, {d}) should be ahead of {base}"
                );
            }
        }
    }

    #[test]
    fn ahead_fails_for_any_distance_beyond_half_window() {
        for &base in &[0u16, 1, 12345, 32768, 65535] {
            for &d in &[32769usize, 40000, 65000, 65535] {
                assert!(
                    !is_ahead(base, advance(base, d)),
                    "advance({base}, {d}) should be behind {base}"
                );
            }
        }
    }

    #[test]
    fn equal_cursors_are_not_ahead() {
        assert!(!is_ahead(0, 0));
        assert!(!is_ahead(40000, 40000));
    }

    #[test]
    fn antipode_is_neither_ahead_nor_behind() {
        assert!(!is_ahead(0, 32768));
        assert!(!is_ahead(32768, 0));
    }

    #[test]
    fn ahead_is_antisymmetric_off_the_antipode() {
        let pairs = [(100u16, 200u16), (65000, 500), (0, 1), (32767, 32769)];
        for (a, b) in pairs {
            assert!(is_ahead(a, b));
            assert!(!is_ahead(b, a));
        }
    }
}
