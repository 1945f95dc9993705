use crate::consts::FIXATION_SATURATION;

/// Relative fixation probability `h(S) = S / (1 - e^-S)` of a mutation with
/// scaled selection coefficient `S`.
///
/// Saturates to `S` and `0` beyond `|S| > 1000`, and uses `expm1` so the
/// neighbourhood of `S = 0` stays finite.
#[inline]
pub fn fixation_kernel(s: f64) -> f64 {
    if s == 0.0 {
        1.0
    } else if s > FIXATION_SATURATION {
        s
    } else if s < -FIXATION_SATURATION {
        0.0
    } else {
        s / -(-s).exp_m1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(1e-12, 1.0)]
    #[case(-1e-12, 1.0)]
    #[case(2000.0, 2000.0)]
    #[case(-2000.0, 0.0)]
    fn test_kernel_limits(#[case] s: f64, #[case] expected: f64) {
        assert!((fixation_kernel(s) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_kernel_detailed_balance() {
        // h(S) / h(-S) = e^S keeps the process reversible
        for s in [-20.0, -3.0, -0.5, 0.25, 4.0, 20.0] {
            let ratio = fixation_kernel(s) / fixation_kernel(-s);
            assert!((ratio - f64::exp(s)).abs() / f64::exp(s) < 1e-12);
        }
    }

    proptest! {
        #[test]
        fn prop_kernel_finite_and_positive(s in -40.0..40.0f64) {
            let h = fixation_kernel(s);
            prop_assert!(h.is_finite());
            prop_assert!(h > 0.0);
        }
    }
}
