// eval/bounds.rs - Clipping regions that override generated values
//
// At most one bounds shape is active. Voxels outside it get fixed SDF and
// type values no matter what the graph computes. Bounds are applied after
// generation, and can also decide a whole block up front when the block
// lies entirely on one overridden side.

use crate::eval::error::BoundsError;
use serde::{Deserialize, Serialize};

/// Vertical clipping: voxels below `min_y` take the bottom values, voxels
/// above `max_y` take the top values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerticalBounds {
    pub min_y: i32,
    pub max_y: i32,
    pub bottom_sdf: f32,
    pub top_sdf: f32,
    pub bottom_type: u64,
    pub top_type: u64,
}

impl Default for VerticalBounds {
    fn default() -> Self {
        VerticalBounds {
            min_y: i32::MIN,
            max_y: i32::MAX,
            bottom_sdf: 1.0,
            top_sdf: 1.0,
            bottom_type: 0,
            top_type: 0,
        }
    }
}

/// Box clipping: voxels outside `[min, max]` (inclusive) take the fixed
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoxBounds {
    pub min: [i32; 3],
    pub max: [i32; 3],
    pub sdf: f32,
    pub voxel_type: u64,
}

impl Default for BoxBounds {
    fn default() -> Self {
        BoxBounds {
            min: [i32::MIN; 3],
            max: [i32::MAX; 3],
            sdf: 1.0,
            voxel_type: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Bounds {
    #[default]
    None,
    Vertical(VerticalBounds),
    Box(BoxBounds),
}

/// Replacement values for one voxel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Override {
    pub sdf: f32,
    pub voxel_type: u64,
}

const AXES: [char; 3] = ['x', 'y', 'z'];

impl Bounds {
    pub fn vertical(min_y: i32, max_y: i32, bottom_sdf: f32, top_sdf: f32, bottom_type: u64, top_type: u64) -> Self {
        Bounds::Vertical(VerticalBounds {
            min_y,
            max_y,
            bottom_sdf,
            top_sdf,
            bottom_type,
            top_type,
        })
    }

    pub fn boxed(min: [i32; 3], max: [i32; 3], sdf: f32, voxel_type: u64) -> Self {
        Bounds::Box(BoxBounds {
            min,
            max,
            sdf,
            voxel_type,
        })
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Bounds::None)
    }

    /// Reject inverted extents and non-finite replacement values.
    pub fn validate(&self) -> Result<(), BoundsError> {
        match self {
            Bounds::None => Ok(()),
            Bounds::Vertical(v) => {
                if v.min_y > v.max_y {
                    return Err(BoundsError::Inverted {
                        axis: 'y',
                        min: v.min_y,
                        max: v.max_y,
                    });
                }
                if !(v.bottom_sdf.is_finite() && v.top_sdf.is_finite()) {
                    return Err(BoundsError::NonFiniteValue);
                }
                Ok(())
            }
            Bounds::Box(b) => {
                for axis in 0..3 {
                    if b.min[axis] > b.max[axis] {
                        return Err(BoundsError::Inverted {
                            axis: AXES[axis],
                            min: b.min[axis],
                            max: b.max[axis],
                        });
                    }
                }
                if !b.sdf.is_finite() {
                    return Err(BoundsError::NonFiniteValue);
                }
                Ok(())
            }
        }
    }

    /// Replacement for the voxel at `pos`, or `None` inside the bounds.
    #[inline]
    pub fn override_at(&self, pos: [i32; 3]) -> Option<Override> {
        match self {
            Bounds::None => None,
            Bounds::Vertical(v) => {
                if pos[1] < v.min_y {
                    Some(Override {
                        sdf: v.bottom_sdf,
                        voxel_type: v.bottom_type,
                    })
                } else if pos[1] > v.max_y {
                    Some(Override {
                        sdf: v.top_sdf,
                        voxel_type: v.top_type,
                    })
                } else {
                    None
                }
            }
            Bounds::Box(b) => {
                let inside = (0..3).all(|i| pos[i] >= b.min[i] && pos[i] <= b.max[i]);
                if inside {
                    None
                } else {
                    Some(Override {
                        sdf: b.sdf,
                        voxel_type: b.voxel_type,
                    })
                }
            }
        }
    }

    /// If every voxel in the inclusive region `[min, max]` gets the same
    /// override, return it.
    pub fn region_override(&self, min: [i32; 3], max: [i32; 3]) -> Option<Override> {
        match self {
            Bounds::None => None,
            Bounds::Vertical(v) => {
                if max[1] < v.min_y || min[1] > v.max_y {
                    self.override_at(min)
                } else {
                    None
                }
            }
            Bounds::Box(b) => {
                let outside = (0..3).any(|i| max[i] < b.min[i] || min[i] > b.max[i]);
                if outside {
                    Some(Override {
                        sdf: b.sdf,
                        voxel_type: b.voxel_type,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// True if no voxel in the inclusive region is overridden.
    pub fn region_inside(&self, min: [i32; 3], max: [i32; 3]) -> bool {
        match self {
            Bounds::None => true,
            Bounds::Vertical(v) => min[1] >= v.min_y && max[1] <= v.max_y,
            Bounds::Box(b) => (0..3).all(|i| min[i] >= b.min[i] && max[i] <= b.max[i]),
        }
    }
}
