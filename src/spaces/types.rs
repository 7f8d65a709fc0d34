//! Space Types
//!
//! Closed set of space shapes plus a passthrough variant for kinds this
//! server does not understand.

use serde_json::{Map, Value};

use crate::error::{GymError, GymResult};

// ---------------------------------------------------------------------------
// Space
// ---------------------------------------------------------------------------

/// Structural description of valid actions or observations.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    /// Single choice in `[0, n)`.
    Discrete { n: u64 },
    /// Bounded numeric array. `low` and `high` are flattened row-major and
    /// hold `shape.iter().product()` elements each.
    Box {
        shape: Vec<usize>,
        low: Vec<f64>,
        high: Vec<f64>,
    },
    /// Ordered product of sub-spaces.
    Tuple { spaces: Vec<Space> },
    /// Unrecognized kind. Carries whatever structural fields the
    /// environment exposed; values in it can be encoded but never decoded.
    Other {
        name: String,
        fields: Map<String, Value>,
    },
}

impl Space {
    /// Box with identical bounds for every element.
    pub fn uniform_box(shape: Vec<usize>, low: f64, high: f64) -> Self {
        // An overflowing shape yields empty bounds, which `validate` rejects.
        let size = box_size(&shape).unwrap_or(0);
        Space::Box {
            shape,
            low: vec![low; size],
            high: vec![high; size],
        }
    }

    /// Space class name as reported in descriptors.
    pub fn name(&self) -> &str {
        match self {
            Space::Discrete { .. } => "Discrete",
            Space::Box { .. } => "Box",
            Space::Tuple { .. } => "Tuple",
            Space::Other { name, .. } => name,
        }
    }

    /// Number of scalar elements one value of this space holds, or `None`
    /// if that count overflows.
    pub fn flat_size(&self) -> Option<usize> {
        match self {
            Space::Discrete { .. } => Some(1),
            Space::Box { shape, .. } => box_size(shape),
            Space::Tuple { spaces } => spaces
                .iter()
                .try_fold(0usize, |acc, s| acc.checked_add(s.flat_size()?)),
            Space::Other { .. } => Some(0),
        }
    }

    /// Check that every box has positive dimensions and bounds matching its
    /// shape.
    pub fn validate(&self) -> GymResult<()> {
        match self {
            Space::Box { shape, low, high } => {
                if shape.contains(&0) {
                    return Err(GymError::InvalidArgument(format!(
                        "Box shape {:?} has a zero dimension",
                        shape
                    )));
                }
                let size = box_size(shape).ok_or_else(|| {
                    GymError::InvalidArgument(format!("Box shape {:?} is too large", shape))
                })?;
                if low.len() != size || high.len() != size {
                    return Err(GymError::InvalidArgument(format!(
                        "Box shape {:?} needs {} bounds, got {} low and {} high",
                        shape,
                        size,
                        low.len(),
                        high.len()
                    )));
                }
                Ok(())
            }
            Space::Tuple { spaces } => spaces.iter().try_for_each(Space::validate),
            Space::Discrete { .. } | Space::Other { .. } => Ok(()),
        }
    }

    /// Whether `value` is a member of this space.
    pub fn contains(&self, value: &SpaceValue) -> bool {
        match (self, value) {
            (Space::Discrete { n }, SpaceValue::Discrete(i)) => i < n,
            (Space::Box { low, high, .. }, SpaceValue::Box(data)) => {
                data.len() == low.len()
                    && data
                        .iter()
                        .zip(low.iter().zip(high.iter()))
                        .all(|(v, (l, h))| v >= l && v <= h)
            }
            (Space::Tuple { spaces }, SpaceValue::Tuple(values)) => {
                spaces.len() == values.len()
                    && spaces.iter().zip(values.iter()).all(|(s, v)| s.contains(v))
            }
            _ => false,
        }
    }
}

/// Element count of a box shape; `None` on overflow.
pub fn box_size(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

// ---------------------------------------------------------------------------
// SpaceValue
// ---------------------------------------------------------------------------

/// A concrete action or observation.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceValue {
    Discrete(u64),
    /// Flattened row-major data; the owning space supplies the shape.
    Box(Vec<f64>),
    Tuple(Vec<SpaceValue>),
    /// Opaque value belonging to a [`Space::Other`].
    Raw(Value),
}

impl SpaceValue {
    /// Discrete index, if this is a discrete value.
    pub fn as_discrete(&self) -> Option<u64> {
        match self {
            SpaceValue::Discrete(i) => Some(*i),
            _ => None,
        }
    }

    /// Flat numeric data, if this is a box value.
    pub fn as_box(&self) -> Option<&[f64]> {
        match self {
            SpaceValue::Box(data) => Some(data),
            _ => None,
        }
    }
}
