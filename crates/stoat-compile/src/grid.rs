use stoat_core::{Error, Result, Shape};

// DispatchGrid — The hardware iteration domain of one kernel launch
//
// A kernel instance is launched over a 2-D or 3-D grid of work-items. Each
// work-item produces `global_scale[k]` output elements along axis k, so the
// grid must cover the output shape exactly: too few items leave gaps, too
// many write out of bounds. Axis 0 is additionally rounded up to the
// hardware tile width so the innermost loop always runs full vectors.
// This planner is the single place that contract is enforced.

/// The iteration domain a kernel instance is launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchGrid {
    /// 2 or 3. Collapsed to 2 when the output is logically two-dimensional.
    pub dim: u32,
    /// Output elements produced per work-item along each axis.
    pub global_scale: [u32; 3],
    /// Work-items per axis, alignment-rounded along axis 0.
    pub global_size: [u32; 3],
}

impl DispatchGrid {
    /// Whether the launch is a 2-D (image-like) iteration. Feeds the
    /// `is_image_2d` discriminator of variant keys.
    pub fn is_image_2d(&self) -> bool {
        self.dim == 2
    }
}

/// Whether a shape collapses to a 2-D iteration: rank below 3, or a
/// third dimension of extent 1. Computable before any kernel is chosen,
/// which is why variant keys can depend on it.
pub fn collapses_to_2d(shape: &Shape) -> bool {
    shape.rank() < 3 || shape.dim_or_one(2) == 1
}

fn ceil_div(a: u32, b: u32) -> u32 {
    a.div_ceil(b)
}

/// Compute the dispatch grid for an output shape.
///
/// `global_scale[k]` is how many output elements one work-item produces
/// along axis k; `align` is the hardware tile width axis 0 is rounded to
/// (typically 4, or a kernel-declared local size).
pub fn plan_grid(shape: &Shape, global_scale: [u32; 3], align: u32) -> Result<DispatchGrid> {
    if shape.rank() == 0 || shape.has_zero_dim() {
        return Err(Error::InvalidShape {
            shape: shape.clone(),
            reason: "dispatch grid requires rank >= 1 and no zero extents".to_string(),
        });
    }
    if global_scale.iter().any(|&s| s == 0) || align == 0 {
        return Err(Error::InvalidShape {
            shape: shape.clone(),
            reason: format!(
                "global_scale {:?} and alignment {} must be nonzero",
                global_scale, align
            ),
        });
    }

    let collapse = collapses_to_2d(shape);
    let d0 = shape.dim_or_one(0) as u32;
    let d1 = shape.dim_or_one(1) as u32;
    let d2 = shape.dim_or_one(2) as u32;

    // Axis 0: divide out per-item work, then round up to the tile width.
    let gs0 = ceil_div(ceil_div(d0, global_scale[0]), align) * align;
    let gs1 = ceil_div(d1, global_scale[1]);
    let gs2 = if collapse { 1 } else { ceil_div(d2, global_scale[2]) };

    Ok(DispatchGrid {
        dim: if collapse { 2 } else { 3 },
        global_scale,
        global_size: [gs0, gs1, gs2],
    })
}
