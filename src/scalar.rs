use dashu_base::{Abs, Sign, SquareRoot};
use dashu_float::round::mode::HalfEven;
use dashu_float::FBig;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Binary arbitrary-precision float rounded half-to-even.
pub type BigReal = FBig<HalfEven, 2>;

/// Bit precision of a [`BigReal`] calculation.
///
/// Every arbitrary-precision value is created through a `Precision`, so two
/// calculations at different precisions share no state and may run at the
/// same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precision {
    pub bits: usize,
}

impl Precision {
    pub fn new(bits: usize) -> Self {
        assert!(bits >= 2, "precision must be at least 2 bits (got {})", bits);
        Self { bits }
    }
}

/// Real number type used by the numerical core.
///
/// Values are created from `f64` literals within a context, which is `()`
/// for the fixed-width `f64` and a [`Precision`] for [`BigReal`].
pub trait Real:
    'static
    + Clone
    + Debug
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    type Context: Copy + Debug + PartialEq + Send + Sync;

    fn from_f64(ctx: Self::Context, value: f64) -> Self;

    /// Context this value was created in.
    fn ctx(&self) -> Self::Context;

    /// Nearest `f64`, used at the calculator boundary only.
    fn as_f64(&self) -> f64;

    fn abs(&self) -> Self;

    /// Square root; the argument must not be negative.
    fn sqrt(&self) -> Self;

    /// Not NaN and not infinite.
    fn is_finite(&self) -> bool;

    fn is_zero(&self) -> bool;

    /// Relative spacing of representable values at this precision.
    fn epsilon(ctx: Self::Context) -> Self;

    fn zero(ctx: Self::Context) -> Self {
        Self::from_f64(ctx, 0.0)
    }

    fn one(ctx: Self::Context) -> Self {
        Self::from_f64(ctx, 1.0)
    }
}

impl Real for f64 {
    type Context = ();

    #[inline]
    fn from_f64(_ctx: (), value: f64) -> Self {
        value
    }

    #[inline]
    fn ctx(&self) {}

    #[inline]
    fn as_f64(&self) -> f64 {
        *self
    }

    #[inline]
    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    #[inline]
    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }

    #[inline]
    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn epsilon(_ctx: ()) -> Self {
        f64::EPSILON
    }
}

impl Real for BigReal {
    type Context = Precision;

    /// Panics for NaN, which has no arbitrary-precision representation.
    fn from_f64(ctx: Precision, value: f64) -> Self {
        match BigReal::try_from(value) {
            Ok(v) => v.with_precision(ctx.bits).value(),
            Err(_) => panic!("{} has no arbitrary-precision representation", value),
        }
    }

    fn ctx(&self) -> Precision {
        Precision {
            bits: self.precision(),
        }
    }

    fn as_f64(&self) -> f64 {
        self.to_f64().value()
    }

    fn abs(&self) -> Self {
        Abs::abs(self.clone())
    }

    fn sqrt(&self) -> Self {
        SquareRoot::sqrt(self)
    }

    fn is_finite(&self) -> bool {
        !self.repr().is_infinite()
    }

    fn is_zero(&self) -> bool {
        self.repr().is_zero()
    }

    fn epsilon(ctx: Precision) -> Self {
        BigReal::from_parts_const(Sign::Positive, 1, -(ctx.bits as isize), None)
            .with_precision(ctx.bits)
            .value()
    }
}
