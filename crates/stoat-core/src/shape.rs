use std::fmt;

// Shape — N-dimensional tensor extent, outermost-last convention
//
// The hardware iteration domain indexes dimensions from the innermost
// (fastest-varying) axis outward, so dims are stored innermost-first:
//
//   - Vector [5]       — dim 0 has extent 5
//   - Matrix [W, H]    — dim 0 = width (innermost), dim 1 = height
//   - Volume [W, H, D] — dim 2 = outermost
//
// This is the opposite of the row-major [batch, ..., width] convention
// most frameworks print; it matches the dispatch grid, which is addressed
// as (x, y, z) with x innermost.

/// N-dimensional shape of a tensor, innermost axis first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The dimension sizes as a slice, innermost first.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    /// A scalar shape [] has 1 element.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>().max(1)
    }

    /// Size of a specific dimension, or `Msg` error if out of range.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0
            .get(d)
            .copied()
            .ok_or_else(|| crate::Error::msg(format!("dim {} out of range for rank {}", d, self.rank())))
    }

    /// Extent of dimension `d`, treating missing trailing dims as 1.
    ///
    /// The grid planner addresses axes 0..3 regardless of tensor rank; a
    /// rank-2 tensor has extent 1 along axis 2.
    pub fn dim_or_one(&self, d: usize) -> usize {
        self.0.get(d).copied().unwrap_or(1)
    }

    /// Whether any dimension has zero extent.
    pub fn has_zero_dim(&self) -> bool {
        self.0.iter().any(|&d| d == 0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<usize> for Shape {
    /// 1-D shape.
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}
