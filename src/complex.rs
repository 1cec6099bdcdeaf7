use crate::scalar::{BigReal, Real};
use num_complex::Complex64;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Complex number over any [`Real`].
///
/// Equality is exact; callers apply their own tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct Complex<R> {
    pub re: R,
    pub im: R,
}

impl<R: Real> Complex<R> {
    pub fn new(re: R, im: R) -> Self {
        Self { re, im }
    }

    pub fn from_f64(ctx: R::Context, re: f64, im: f64) -> Self {
        Self::new(R::from_f64(ctx, re), R::from_f64(ctx, im))
    }

    /// Upcasts a boundary value into the working precision.
    pub fn from_c64(ctx: R::Context, z: Complex64) -> Self {
        Self::from_f64(ctx, z.re, z.im)
    }

    pub fn from_real(re: R) -> Self {
        let im = R::zero(re.ctx());
        Self { re, im }
    }

    /// Downcasts to the boundary representation.
    pub fn to_c64(&self) -> Complex64 {
        Complex64::new(self.re.as_f64(), self.im.as_f64())
    }

    pub fn zero(ctx: R::Context) -> Self {
        Self::new(R::zero(ctx), R::zero(ctx))
    }

    pub fn one(ctx: R::Context) -> Self {
        Self::new(R::one(ctx), R::zero(ctx))
    }

    pub fn ctx(&self) -> R::Context {
        self.re.ctx()
    }

    pub fn conj(&self) -> Self {
        Self::new(self.re.clone(), -self.im.clone())
    }

    /// Squared magnitude.
    pub fn norm_sqr(&self) -> R {
        self.re.clone() * self.re.clone() + self.im.clone() * self.im.clone()
    }

    /// Magnitude.
    pub fn abs(&self) -> R {
        self.norm_sqr().sqrt()
    }

    pub fn scale(&self, factor: &R) -> Self {
        Self::new(
            self.re.clone() * factor.clone(),
            self.im.clone() * factor.clone(),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }

    pub fn is_zero(&self) -> bool {
        self.re.is_zero() && self.im.is_zero()
    }
}

impl<R: Real> Add for Complex<R> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl<R: Real> Sub for Complex<R> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl<R: Real> Mul for Complex<R> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let re = self.re.clone() * rhs.re.clone() - self.im.clone() * rhs.im.clone();
        let im = self.re * rhs.im + self.im * rhs.re;
        Self::new(re, im)
    }
}

impl<R: Real> Div for Complex<R> {
    type Output = Self;

    /// The divisor must not be exactly zero.
    fn div(self, rhs: Self) -> Self {
        let denominator = rhs.norm_sqr();
        let re = self.re.clone() * rhs.re.clone() + self.im.clone() * rhs.im.clone();
        let im = self.im * rhs.re - self.re * rhs.im;
        Self::new(re / denominator.clone(), im / denominator)
    }
}

impl<R: Real> Neg for Complex<R> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.re, -self.im)
    }
}

impl<R: Real> AddAssign for Complex<R> {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.clone() + rhs;
    }
}

impl<R: Real> SubAssign for Complex<R> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.clone() - rhs;
    }
}

/// Element type of vectors and sparse matrices: a real or a complex number.
pub trait Scalar:
    Clone
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    type Real: Real;

    fn zero_in(ctx: <Self::Real as Real>::Context) -> Self;

    fn one_in(ctx: <Self::Real as Real>::Context) -> Self;

    fn from_real(value: Self::Real) -> Self;

    fn context(&self) -> <Self::Real as Real>::Context;

    /// Complex conjugate; identity for reals.
    fn conjugate(&self) -> Self;

    fn squared_magnitude(&self) -> Self::Real;

    fn magnitude(&self) -> Self::Real;

    fn finite(&self) -> bool;

    fn zero_valued(&self) -> bool;
}

macro_rules! real_scalar {
    ($t:ty) => {
        impl Scalar for $t {
            type Real = $t;

            fn zero_in(ctx: <$t as Real>::Context) -> Self {
                <$t as Real>::zero(ctx)
            }

            fn one_in(ctx: <$t as Real>::Context) -> Self {
                <$t as Real>::one(ctx)
            }

            fn from_real(value: $t) -> Self {
                value
            }

            fn context(&self) -> <$t as Real>::Context {
                Real::ctx(self)
            }

            fn conjugate(&self) -> Self {
                self.clone()
            }

            fn squared_magnitude(&self) -> $t {
                self.clone() * self.clone()
            }

            fn magnitude(&self) -> $t {
                Real::abs(self)
            }

            fn finite(&self) -> bool {
                Real::is_finite(self)
            }

            fn zero_valued(&self) -> bool {
                Real::is_zero(self)
            }
        }
    };
}

real_scalar!(f64);
real_scalar!(BigReal);

impl<R: Real> Scalar for Complex<R> {
    type Real = R;

    fn zero_in(ctx: R::Context) -> Self {
        Complex::zero(ctx)
    }

    fn one_in(ctx: R::Context) -> Self {
        Complex::one(ctx)
    }

    fn from_real(value: R) -> Self {
        Complex::from_real(value)
    }

    fn context(&self) -> R::Context {
        self.ctx()
    }

    fn conjugate(&self) -> Self {
        self.conj()
    }

    fn squared_magnitude(&self) -> R {
        self.norm_sqr()
    }

    fn magnitude(&self) -> R {
        Complex::abs(self)
    }

    fn finite(&self) -> bool {
        self.is_finite()
    }

    fn zero_valued(&self) -> bool {
        self.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Precision;

    fn close(a: &Complex<f64>, re: f64, im: f64, tol: f64) -> bool {
        (a.re - re).abs() < tol && (a.im - im).abs() < tol
    }

    #[test]
    fn arithmetic() {
        let a = Complex::new(2.0, 3.0);
        let b = Complex::new(5.0, 7.0);

        assert_eq!(a.clone() + b.clone(), Complex::new(7.0, 10.0));
        assert_eq!(a.clone() - b.clone(), Complex::new(-3.0, -4.0));
        assert_eq!(a.clone() * b.clone(), Complex::new(-11.0, 29.0));
        assert!(close(&(a / b), 0.4189189, 0.0135135, 1e-4));
    }

    #[test]
    fn conj_and_magnitude() {
        let a = Complex::new(3.0, -4.0);
        assert_eq!(a.conj(), Complex::new(3.0, 4.0));
        assert_eq!(a.norm_sqr(), 25.0);
        assert_eq!(Complex::abs(&a), 5.0);
        assert!(!Complex::new(f64::NAN, 0.0).is_finite());
        assert!(Complex::<f64>::zero(()).is_zero());
    }

    #[test]
    fn arbitrary_precision_arithmetic() {
        let p = Precision::new(128);
        let a = Complex::<BigReal>::from_f64(p, 2.0, 3.0);
        let b = Complex::<BigReal>::from_f64(p, 5.0, 7.0);

        let q = (a.clone() / b.clone()).to_c64();
        assert!((q.re - 31.0 / 74.0).abs() < 1e-15);
        assert!((q.im - 1.0 / 74.0).abs() < 1e-15);

        let back = (a.clone() / b.clone()) * b;
        assert!((back - a).abs() < BigReal::from_f64(p, 1e-30));
    }

    #[test]
    fn boundary_round_trip() {
        let z = Complex64::new(0.25, -1.5);
        assert_eq!(Complex::<f64>::from_c64((), z).to_c64(), z);
        assert_eq!(Complex::<BigReal>::from_c64(Precision::new(80), z).to_c64(), z);
    }
}
