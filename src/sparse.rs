use crate::complex::{Complex, Scalar};
use crate::graph::Graph;
use crate::scalar::Real;
use crate::vector::Vector;
use num_complex::Complex64;

type Ctx<T> = <<T as Scalar>::Real as Real>::Context;

/// Row-compressed sparse matrix.
///
/// `row_pointers` always holds `rows + 1` offsets into `columns`/`values`
/// and the columns of each row are strictly increasing. Entries that are not
/// stored are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T: Scalar> {
    ctx: Ctx<T>,
    rows: usize,
    cols: usize,
    row_pointers: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<T>,
}

impl<T: Scalar> SparseMatrix<T> {
    pub fn new(ctx: Ctx<T>, rows: usize, cols: usize) -> Self {
        Self {
            ctx,
            rows,
            cols,
            row_pointers: vec![0; rows + 1],
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn identity(ctx: Ctx<T>, n: usize) -> Self {
        Self {
            ctx,
            rows: n,
            cols: n,
            row_pointers: (0..=n).collect(),
            columns: (0..n).collect(),
            values: vec![T::one_in(ctx); n],
        }
    }

    /// Builds a matrix from `(row, col, value)` entries. Duplicate entries
    /// are summed.
    pub fn from_triplets(
        ctx: Ctx<T>,
        rows: usize,
        cols: usize,
        triplets: Vec<(usize, usize, T)>,
    ) -> Self {
        let mut m = Self::new(ctx, rows, cols);
        for (i, j, v) in triplets {
            let sum = m.get(i, j) + v;
            m.set(i, j, sum);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn ctx(&self) -> Ctx<T> {
        self.ctx
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    fn find(&self, row: usize, col: usize) -> Result<usize, usize> {
        let start = self.row_pointers[row];
        let end = self.row_pointers[row + 1];
        self.columns[start..end]
            .binary_search(&col)
            .map(|k| start + k)
            .map_err(|k| start + k)
    }

    fn check_bounds(&self, row: usize, col: usize) {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for a {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.check_bounds(row, col);
        match self.find(row, col) {
            Ok(k) => self.values[k].clone(),
            Err(_) => T::zero_in(self.ctx),
        }
    }

    /// Overwrites an existing entry or inserts a new one at its sorted
    /// position. Zeros are stored like any other value.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.check_bounds(row, col);
        match self.find(row, col) {
            Ok(k) => self.values[k] = value,
            Err(k) => {
                self.columns.insert(k, col);
                self.values.insert(k, value);
                self.row_pointers[row + 1..]
                    .iter_mut()
                    .for_each(|p| *p += 1);
            }
        }
    }

    /// Iterates over the stored `(column, value)` pairs of a row whose column
    /// is at least `start_col`, in increasing column order.
    pub fn row(&self, row: usize, start_col: usize) -> impl Iterator<Item = (usize, &T)> + '_ {
        let end = self.row_pointers[row + 1];
        let start = match self.find(row, start_col) {
            Ok(k) | Err(k) => k,
        };
        self.columns[start..end]
            .iter()
            .copied()
            .zip(&self.values[start..end])
    }

    /// Computes `dest = self * src`.
    pub fn multiply(&self, dest: &mut Vector<T>, src: &Vector<T>) {
        assert_eq!(dest.len(), self.rows, "destination length must equal row count");
        assert_eq!(src.len(), self.cols, "source length must equal column count");
        for i in 0..self.rows {
            dest[i] = self
                .row(i, 0)
                .fold(T::zero_in(self.ctx), |acc, (j, v)| acc + v.clone() * src[j].clone());
        }
    }

    pub fn mul_vec(&self, src: &Vector<T>) -> Vector<T> {
        let mut dest = Vector::zeros(self.ctx, self.rows);
        self.multiply(&mut dest, src);
        dest
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        let (sa, ea) = (self.row_pointers[a], self.row_pointers[a + 1]);
        let (sb, eb) = (self.row_pointers[b], self.row_pointers[b + 1]);

        let reorder = |v: &[usize]| -> Vec<usize> {
            [&v[..sa], &v[sb..eb], &v[ea..sb], &v[sa..ea], &v[eb..]].concat()
        };
        let columns = reorder(&self.columns);
        let values = [
            &self.values[..sa],
            &self.values[sb..eb],
            &self.values[ea..sb],
            &self.values[sa..ea],
            &self.values[eb..],
        ]
        .concat();
        self.columns = columns;
        self.values = values;

        let (len_a, len_b) = (ea - sa, eb - sb);
        for p in &mut self.row_pointers[a + 1..=b] {
            *p = *p + len_b - len_a;
        }
    }

    /// Computes `row[target] += weight * row[source]` over the columns at or
    /// after `start_col`.
    pub fn add_weighted_row(&mut self, target: usize, source: usize, weight: &T, start_col: usize) {
        assert_ne!(target, source, "a row cannot be added to itself");
        let (ts, te) = (self.row_pointers[target], self.row_pointers[target + 1]);

        let mut columns = Vec::with_capacity(te - ts);
        let mut values = Vec::with_capacity(te - ts);
        let mut t = ts;
        let mut src = self.row(source, start_col).peekable();
        while t < te || src.peek().is_some() {
            let tc = if t < te { Some(self.columns[t]) } else { None };
            match (tc, src.peek()) {
                (Some(c), Some(&(sc, _))) if c < sc => {
                    columns.push(c);
                    values.push(self.values[t].clone());
                    t += 1;
                }
                (Some(c), Some(&(sc, sv))) if c == sc => {
                    columns.push(c);
                    values.push(self.values[t].clone() + weight.clone() * sv.clone());
                    t += 1;
                    src.next();
                }
                (_, Some(&(sc, sv))) => {
                    columns.push(sc);
                    values.push(weight.clone() * sv.clone());
                    src.next();
                }
                (Some(c), None) => {
                    columns.push(c);
                    values.push(self.values[t].clone());
                    t += 1;
                }
                (None, None) => break,
            }
        }

        drop(src);

        let grown = columns.len() - (te - ts);
        self.columns.splice(ts..te, columns);
        self.values.splice(ts..te, values);
        if grown > 0 {
            self.row_pointers[target + 1..]
                .iter_mut()
                .for_each(|p| *p += grown);
        }
    }

    pub fn diagonal(&self) -> Vector<T> {
        let n = self.rows.min(self.cols);
        Vector::from_vec((0..n).map(|i| self.get(i, i)).collect())
    }

    /// Multiplies every row `i` by `factors[i]`.
    pub fn scale_rows(&mut self, factors: &Vector<T>) {
        assert_eq!(factors.len(), self.rows, "one factor per row is required");
        for i in 0..self.rows {
            for k in self.row_pointers[i]..self.row_pointers[i + 1] {
                self.values[k] = factors[i].clone() * self.values[k].clone();
            }
        }
    }

    /// Returns the row at or below `row_start` holding the entry of largest
    /// magnitude in `col`. Ties go to the lowest row; an empty column yields
    /// `row_start`.
    pub fn find_absolute_maximum_of_column(&self, col: usize, row_start: usize) -> usize {
        let mut best_row = row_start;
        let mut best: Option<T::Real> = None;
        for i in row_start..self.rows {
            if let Ok(k) = self.find(i, col) {
                let m = self.values[k].magnitude();
                if best.as_ref().map_or(true, |b| m > *b) {
                    best = Some(m);
                    best_row = i;
                }
            }
        }
        best_row
    }

    /// Largest `|row - col|` over the stored entries.
    pub fn bandwidth(&self) -> usize {
        (0..self.rows)
            .flat_map(|i| self.row(i, 0).map(move |(j, _)| i.abs_diff(j)))
            .max()
            .unwrap_or(0)
    }

    /// Reverse Cuthill-McKee ordering of the symmetric sparsity pattern.
    pub fn reduce_bandwidth(&self) -> Vec<usize> {
        let mut graph = Graph::new(self.rows.max(self.cols));
        for i in 0..self.rows {
            for (j, _) in self.row(i, 0) {
                graph.connect(i, j);
            }
        }
        graph.cuthill_mckee()
    }

    /// Returns `A'` with `A'[i][j] = A[perm[i]][perm[j]]`.
    pub fn permute(&self, perm: &[usize]) -> Self {
        assert_eq!(self.rows, self.cols, "only square matrices can be permuted");
        assert_eq!(perm.len(), self.rows, "permutation length must equal row count");
        let inverse = invert_permutation(perm);
        let mut out = Self::new(self.ctx, self.rows, self.cols);
        out.columns.reserve(self.nnz());
        out.values.reserve(self.nnz());
        for (i, &old_row) in perm.iter().enumerate() {
            let mut entries: Vec<(usize, T)> = self
                .row(old_row, 0)
                .map(|(j, v)| (inverse[j], v.clone()))
                .collect();
            entries.sort_by_key(|(j, _)| *j);
            for (j, v) in entries {
                out.columns.push(j);
                out.values.push(v);
            }
            out.row_pointers[i + 1] = out.columns.len();
        }
        out
    }

    /// Drops stored exact zeros.
    pub fn compress(&mut self) {
        let mut columns = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.values.len());
        let mut row_pointers = Vec::with_capacity(self.rows + 1);
        row_pointers.push(0);
        for i in 0..self.rows {
            for k in self.row_pointers[i]..self.row_pointers[i + 1] {
                if !self.values[k].zero_valued() {
                    columns.push(self.columns[k]);
                    values.push(self.values[k].clone());
                }
            }
            row_pointers.push(columns.len());
        }
        self.columns = columns;
        self.values = values;
        self.row_pointers = row_pointers;
    }

    pub fn transpose(&self) -> Self {
        let mut counts = vec![0; self.cols + 1];
        for &j in &self.columns {
            counts[j + 1] += 1;
        }
        for j in 0..self.cols {
            counts[j + 1] += counts[j];
        }
        let row_pointers = counts.clone();
        let mut next = counts;
        let mut columns = vec![0; self.nnz()];
        let mut values = vec![T::zero_in(self.ctx); self.nnz()];
        for i in 0..self.rows {
            for (j, v) in self.row(i, 0) {
                let k = next[j];
                columns[k] = i;
                values[k] = v.clone();
                next[j] += 1;
            }
        }
        Self {
            ctx: self.ctx,
            rows: self.cols,
            cols: self.rows,
            row_pointers,
            columns,
            values,
        }
    }
}

impl<R: Real> SparseMatrix<Complex<R>> {
    /// Upcasts a boundary matrix into the working precision.
    pub fn from_c64(ctx: R::Context, m: &SparseMatrix<Complex<f64>>) -> Self {
        Self {
            ctx,
            rows: m.rows,
            cols: m.cols,
            row_pointers: m.row_pointers.clone(),
            columns: m.columns.clone(),
            values: m.values.iter().map(|z| Complex::from_c64(ctx, z.to_c64())).collect(),
        }
    }

    /// Downcasts to `f64` entries.
    pub fn to_c64(&self) -> Vec<(usize, usize, Complex64)> {
        (0..self.rows)
            .flat_map(|i| self.row(i, 0).map(move |(j, v)| (i, j, v.to_c64())))
            .collect()
    }
}

/// Returns `inv` with `inv[perm[i]] = i`.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![usize::MAX; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        assert!(
            p < perm.len() && inverse[p] == usize::MAX,
            "not a permutation: {:?}",
            perm
        );
        inverse[p] = i;
    }
    inverse
}
