use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub index: usize,
    neighbours: Vec<usize>,
}

impl Node {
    pub fn degree(&self) -> usize {
        self.neighbours.len()
    }

    pub fn neighbours(&self) -> &[usize] {
        &self.neighbours
    }
}

/// Undirected graph over the nodes `0..n`.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new(n: usize) -> Self {
        Self {
            nodes: (0..n)
                .map(|index| Node {
                    index,
                    neighbours: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Adds the edge `a - b`. Self loops and repeated edges are ignored.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b || self.nodes[a].neighbours.contains(&b) {
            return;
        }
        self.nodes[a].neighbours.push(b);
        self.nodes[b].neighbours.push(a);
    }

    /// Reverse Cuthill-McKee ordering.
    ///
    /// Each component is traversed breadth first from its lowest-indexed
    /// node, visiting neighbours by ascending degree and then index. The
    /// returned vector lists old node indices in their new order.
    pub fn cuthill_mckee(&self) -> Vec<usize> {
        let n = self.nodes.len();
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut queue = VecDeque::new();

        for seed in 0..n {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            queue.push_back(seed);

            while let Some(current) = queue.pop_front() {
                order.push(current);

                let mut next: Vec<usize> = self.nodes[current]
                    .neighbours
                    .iter()
                    .copied()
                    .filter(|&k| !visited[k])
                    .collect();
                next.sort_by_key(|&k| (self.nodes[k].degree(), k));
                for k in next {
                    visited[k] = true;
                    queue.push_back(k);
                }
            }
        }

        order.reverse();
        log::trace!("rcm order: {:?}", order);
        order
    }
}
