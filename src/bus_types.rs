use crate::error::{HelmError, Result};
use num_complex::Complex64;

/// Bus with specified complex power injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PQBus {
    pub id: usize,
    pub power: Complex64,
}

/// Bus with specified real power and voltage magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PVBus {
    pub id: usize,
    pub real_power: f64,
    pub voltage_magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// Position in the PQ list.
    PQ(usize),
    /// Position in the PV list.
    PV(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Buses {
    pub pq: Vec<PQBus>,
    pub pv: Vec<PVBus>,
}

impl Buses {
    pub fn new(pq: Vec<PQBus>, pv: Vec<PVBus>) -> Self {
        Self { pq, pv }
    }

    /// Node ids of the PQ buses, in list order.
    pub fn pq_ids(&self) -> Vec<usize> {
        self.pq.iter().map(|b| b.id).collect()
    }

    /// Node ids of the PV buses, in list order.
    pub fn pv_ids(&self) -> Vec<usize> {
        self.pv.iter().map(|b| b.id).collect()
    }

    /// Checks that every node `0..node_count` is exactly one PQ or PV bus and
    /// returns the kind of each node.
    pub fn bus_kinds(&self, node_count: usize) -> Result<Vec<BusKind>> {
        if self.pq.len() + self.pv.len() != node_count {
            return Err(HelmError::Config(format!(
                "{} PQ and {} PV buses do not cover {} nodes",
                self.pq.len(),
                self.pv.len(),
                node_count
            )));
        }

        let mut kinds: Vec<Option<BusKind>> = vec![None; node_count];
        let assigned = self
            .pq
            .iter()
            .enumerate()
            .map(|(k, b)| (b.id, BusKind::PQ(k)))
            .chain(self.pv.iter().enumerate().map(|(k, b)| (b.id, BusKind::PV(k))));
        for (id, kind) in assigned {
            match kinds.get_mut(id) {
                None => {
                    return Err(HelmError::Config(format!(
                        "bus id {} is out of range for {} nodes",
                        id, node_count
                    )))
                }
                Some(Some(_)) => {
                    return Err(HelmError::Config(format!("bus id {} is assigned twice", id)))
                }
                Some(slot) => *slot = Some(kind),
            }
        }

        kinds
            .into_iter()
            .enumerate()
            .map(|(id, kind)| {
                kind.ok_or_else(|| HelmError::Config(format!("node {} has no bus", id)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use anyhow::Result;

    fn pq(id: usize) -> PQBus {
        PQBus {
            id,
            power: cmplx!(-0.5, -0.1),
        }
    }

    fn pv(id: usize) -> PVBus {
        PVBus {
            id,
            real_power: 0.3,
            voltage_magnitude: 1.02,
        }
    }

    #[test]
    fn test_bus_kinds() -> Result<()> {
        let buses = Buses::new(vec![pq(2), pq(0)], vec![pv(1)]);
        let kinds = buses.bus_kinds(3)?;
        assert_eq!(kinds, vec![BusKind::PQ(1), BusKind::PV(0), BusKind::PQ(0)]);
        assert_eq!(buses.pq_ids(), vec![2, 0]);
        assert_eq!(buses.pv_ids(), vec![1]);
        Ok(())
    }

    #[test]
    fn test_invalid_assignments() {
        let duplicate = Buses::new(vec![pq(0), pq(0)], vec![]);
        assert!(matches!(duplicate.bus_kinds(2), Err(HelmError::Config(_))));

        let out_of_range = Buses::new(vec![pq(0)], vec![pv(4)]);
        assert!(matches!(out_of_range.bus_kinds(2), Err(HelmError::Config(_))));

        let too_few = Buses::new(vec![pq(0)], vec![]);
        assert!(matches!(too_few.bus_kinds(2), Err(HelmError::Config(_))));
    }
}
