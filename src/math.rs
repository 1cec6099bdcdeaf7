use crate::scalar::Real;
use num_complex::Complex64;

pub const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Computes `|actual - expected| / |expected|`.
///
/// Falls back to the absolute error `|actual - expected|` if the expected
/// magnitude is exactly zero.
pub fn relative_error<R: Real>(error_magnitude: R, expected_magnitude: R) -> R {
    if expected_magnitude.is_zero() {
        error_magnitude
    } else {
        error_magnitude / expected_magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_error() {
        assert_eq!(relative_error(0.5, 2.0), 0.25);
        assert_eq!(relative_error(0.5, 0.0), 0.5);
    }

    #[test]
    fn test_cmplx() {
        assert_eq!(cmplx!(), Complex64::new(0.0, 0.0));
        assert_eq!(cmplx!(1.5), Complex64::new(1.5, 0.0));
        assert_eq!(cmplx!(1.5, -2.0) * J, Complex64::new(2.0, 1.5));
    }
}
