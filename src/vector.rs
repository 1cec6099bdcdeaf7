use crate::complex::Scalar;
use crate::scalar::Real;
use std::ops::{Index, IndexMut};

type Ctx<T> = <<T as Scalar>::Real as Real>::Context;

/// Fixed-length vector of reals or complex numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T> {
    values: Vec<T>,
}

impl<T: Scalar> Vector<T> {
    pub fn zeros(ctx: Ctx<T>, len: usize) -> Self {
        Self {
            values: vec![T::zero_in(ctx); len],
        }
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, i: usize, value: T) {
        self.values[i] = value;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Computes `Σ conj(self[i]) * other[i]`.
    pub fn dot(&self, other: &Self) -> T {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        let ctx = self.ctx_of(other);
        self.values
            .iter()
            .zip(&other.values)
            .fold(T::zero_in(ctx), |acc, (a, b)| acc + a.conjugate() * b.clone())
    }

    pub fn squared_norm(&self) -> T::Real {
        let ctx = self.ctx_of(self);
        self.values
            .iter()
            .fold(<T::Real as Real>::zero(ctx), |acc, v| {
                acc + v.squared_magnitude()
            })
    }

    pub fn norm(&self) -> T::Real {
        self.squared_norm().sqrt()
    }

    /// Returns `self + weight * other`.
    pub fn weighted_sum(&self, weight: &T, other: &Self) -> Self {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.clone() + weight.clone() * b.clone())
            .collect();
        Self { values }
    }

    /// Returns `w1 * x + w2 * y`.
    pub fn add_weighted_sum(w1: &T, x: &Self, w2: &T, y: &Self) -> Self {
        assert_eq!(x.len(), y.len(), "vector lengths must match");
        let values = x
            .values
            .iter()
            .zip(&y.values)
            .map(|(a, b)| w1.clone() * a.clone() + w2.clone() * b.clone())
            .collect();
        Self { values }
    }

    /// Returns `self - other`.
    pub fn subtract(&self, other: &Self) -> Self {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.clone() - b.clone())
            .collect();
        Self { values }
    }

    /// Element-wise product.
    pub fn pointwise(&self, other: &Self) -> Self {
        assert_eq!(self.len(), other.len(), "vector lengths must match");
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.clone() * b.clone())
            .collect();
        Self { values }
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.finite())
    }

    fn ctx_of(&self, other: &Self) -> Ctx<T> {
        match self.values.first().or(other.values.first()) {
            Some(v) => v.context(),
            None => panic!("cannot infer the precision of an empty vector"),
        }
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        &self.values[i]
    }
}

impl<T> IndexMut<usize> for Vector<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.values[i]
    }
}

impl<T> From<Vec<T>> for Vector<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;

    #[test]
    fn test_dot_is_conjugate_linear() {
        let a = Vector::from(vec![Complex::new(0.0, 1.0), Complex::new(2.0, 0.0)]);
        let b = Vector::from(vec![Complex::new(0.0, 1.0), Complex::new(1.0, 1.0)]);
        // conj(i) * i + 2 * (1 + i)
        assert_eq!(a.dot(&b), Complex::new(3.0, 2.0));
        assert_eq!(a.squared_norm(), 5.0);
    }

    #[test]
    fn test_weighted_sums() {
        let x = Vector::from(vec![1.0, 2.0, 3.0]);
        let y = Vector::from(vec![-1.0, 0.5, 4.0]);

        assert_eq!(x.weighted_sum(&2.0, &y).as_slice(), &[-1.0, 3.0, 11.0]);
        assert_eq!(
            Vector::add_weighted_sum(&0.5, &x, &-1.0, &y).as_slice(),
            &[1.5, 0.5, -2.5]
        );
        assert_eq!(x.subtract(&y).as_slice(), &[2.0, 1.5, -1.0]);
        assert_eq!(x.pointwise(&y).as_slice(), &[-1.0, 1.0, 12.0]);
    }

    #[test]
    fn test_finiteness() {
        let mut x = Vector::<f64>::zeros((), 3);
        assert!(x.is_finite());
        x.set(1, f64::INFINITY);
        assert!(!x.is_finite());
        x[1] = 7.0;
        assert_eq!(x[1], 7.0);
        assert_eq!(x.norm(), 7.0);
    }
}
