mod bicgstab;
mod bus_types;
mod calculator;
mod coefficients;
mod complex;
mod continuation;
mod error;
mod graph;
mod lu;
mod math;
mod options;
mod pivot;
mod registry;
mod scalar;
mod sor;
mod sparse;
mod traits;
mod vector;

pub mod debug;

#[cfg(test)]
mod tests;

pub use bicgstab::*;
pub use bus_types::*;
pub use calculator::*;
pub use coefficients::*;
pub use complex::*;
pub use continuation::*;
pub use error::*;
pub use graph::*;
pub use lu::*;
pub use math::*;
pub use options::*;
pub use pivot::*;
pub use registry::*;
pub use scalar::*;
pub use sor::*;
pub use sparse::*;
pub use traits::*;
pub use vector::*;
