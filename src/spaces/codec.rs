//! Space Descriptor Codec
//!
//! Converts spaces into JSON descriptors and concrete values to and from
//! their JSON-safe encoding. Numeric arrays are always nested JSON
//! sequences shaped like the owning box.

use log::{debug, warn};
use serde_json::{Map, Value};

use super::types::{box_size, Space, SpaceValue};
use crate::error::{GymError, GymResult};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Canonical descriptor for a space, e.g. `{"name": "Discrete", "n": 2}`.
pub fn describe(space: &Space) -> Value {
    let mut info = Map::new();
    info.insert("name".into(), Value::String(space.name().to_string()));

    match space {
        Space::Discrete { n } => {
            info.insert("n".into(), Value::from(*n));
        }
        Space::Box { shape, low, high } => {
            info.insert("shape".into(), Value::from(shape.clone()));
            info.insert("low".into(), nest(shape, low));
            info.insert("high".into(), nest(shape, high));
        }
        Space::Tuple { spaces } => {
            info.insert(
                "spaces".into(),
                Value::Array(spaces.iter().map(describe).collect()),
            );
        }
        Space::Other { fields, .. } => {
            for (key, value) in fields {
                if key != "name" {
                    info.insert(key.clone(), value.clone());
                }
            }
        }
    }

    Value::Object(info)
}

/// Parse a descriptor produced by [`describe`] back into a [`Space`].
///
/// Unknown space names come back as [`Space::Other`].
pub fn parse_descriptor(info: &Value) -> GymResult<Space> {
    let object = info
        .as_object()
        .ok_or_else(|| invalid("space descriptor must be an object"))?;
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("space descriptor is missing 'name'"))?;

    match name {
        "Discrete" => {
            let n = object
                .get("n")
                .and_then(Value::as_u64)
                .ok_or_else(|| invalid("Discrete descriptor needs an integer 'n'"))?;
            Ok(Space::Discrete { n })
        }
        "Box" => {
            let shape = object
                .get("shape")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("Box descriptor needs a 'shape' array"))?
                .iter()
                .map(|d| d.as_u64().and_then(|d| usize::try_from(d).ok()))
                .collect::<Option<Vec<usize>>>()
                .ok_or_else(|| invalid("Box shape must hold non-negative integers"))?;
            let low = bound(object, "low", &shape)?;
            let high = bound(object, "high", &shape)?;
            let space = Space::Box { shape, low, high };
            space.validate()?;
            Ok(space)
        }
        "Tuple" => {
            let spaces = object
                .get("spaces")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("Tuple descriptor needs a 'spaces' array"))?
                .iter()
                .map(parse_descriptor)
                .collect::<GymResult<Vec<Space>>>()?;
            Ok(Space::Tuple { spaces })
        }
        other => {
            let mut fields = object.clone();
            fields.remove("name");
            Ok(Space::Other {
                name: other.to_string(),
                fields,
            })
        }
    }
}

fn bound(object: &Map<String, Value>, key: &str, shape: &[usize]) -> GymResult<Vec<f64>> {
    let value = object
        .get(key)
        .ok_or_else(|| invalid(format!("Box descriptor is missing '{}'", key)))?;
    flatten(shape, value).map_err(|e| invalid(format!("Box '{}': {}", key, e)))
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Encode a value of `space` into JSON.
///
/// A mismatch between the space and the value means the environment broke
/// its own contract, so it is reported as [`GymError::Internal`].
pub fn encode(space: &Space, value: &SpaceValue) -> GymResult<Value> {
    match (space, value) {
        (Space::Discrete { .. }, SpaceValue::Discrete(i)) => Ok(Value::from(*i)),
        (Space::Box { shape, .. }, SpaceValue::Box(data)) => {
            let expected = box_size(shape).ok_or_else(|| {
                GymError::Internal(format!("Box shape {:?} is too large", shape))
            })?;
            if data.len() != expected {
                return Err(GymError::Internal(format!(
                    "Box value has {} elements, shape {:?} needs {}",
                    data.len(),
                    shape,
                    expected
                )));
            }
            Ok(nest(shape, data))
        }
        (Space::Tuple { spaces }, SpaceValue::Tuple(values)) if spaces.len() == values.len() => {
            let encoded = spaces
                .iter()
                .zip(values.iter())
                .map(|(s, v)| encode(s, v))
                .collect::<GymResult<Vec<Value>>>()?;
            Ok(Value::Array(encoded))
        }
        (Space::Other { .. }, SpaceValue::Raw(raw)) => Ok(raw.clone()),
        (space, value) => Err(GymError::Internal(format!(
            "Value {:?} does not belong to a {} space",
            value,
            space.name()
        ))),
    }
}

/// Decode and validate an action against `space`.
///
/// Wrong type, wrong arity, wrong shape and out-of-range values are all
/// [`GymError::InvalidArgument`]. Unrecognized space kinds are rejected.
pub fn decode(space: &Space, action: &Value) -> GymResult<SpaceValue> {
    let decoded = decode_inner(space, action).map_err(|e| {
        debug!("Rejected action {} for {} space: {}", action, space.name(), e);
        invalid(format!("Invalid action for {} space: {}", space.name(), e))
    })?;
    Ok(decoded)
}

fn decode_inner(space: &Space, action: &Value) -> Result<SpaceValue, String> {
    match space {
        Space::Discrete { n } => {
            let index = discrete_index(action)?;
            if index >= *n {
                return Err(format!("index {} is out of range [0, {})", index, n));
            }
            Ok(SpaceValue::Discrete(index))
        }
        Space::Box { shape, low, high } => {
            let data = flatten(shape, action)?;
            if data.len() != low.len() || data.len() != high.len() {
                return Err(format!(
                    "space bounds hold {} elements but shape {:?} gives {}",
                    low.len(),
                    shape,
                    data.len()
                ));
            }
            for (i, (v, (l, h))) in data.iter().zip(low.iter().zip(high.iter())).enumerate() {
                if v < l || v > h {
                    return Err(format!("element {} = {} is outside [{}, {}]", i, v, l, h));
                }
            }
            Ok(SpaceValue::Box(data))
        }
        Space::Tuple { spaces } => {
            let items = action
                .as_array()
                .ok_or_else(|| "expected an array".to_string())?;
            if items.len() != spaces.len() {
                return Err(format!(
                    "expected {} components, got {}",
                    spaces.len(),
                    items.len()
                ));
            }
            spaces
                .iter()
                .zip(items.iter())
                .map(|(s, v)| decode_inner(s, v))
                .collect::<Result<Vec<_>, _>>()
                .map(SpaceValue::Tuple)
        }
        Space::Other { name, .. } => Err(format!("decoding {} actions is not supported", name)),
    }
}

fn discrete_index(action: &Value) -> Result<u64, String> {
    if let Some(i) = action.as_u64() {
        return Ok(i);
    }
    match action.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        Some(f) => Err(format!("{} is not a non-negative integer", f)),
        None => Err(format!("expected an integer, got {}", action)),
    }
}

/// JSON-safe number: infinities clamp to `±f64::MAX`, NaN becomes `null`.
pub fn json_number(v: f64) -> Value {
    if v.is_nan() {
        Value::Null
    } else if v.is_infinite() {
        Value::from(if v > 0.0 { f64::MAX } else { f64::MIN })
    } else {
        Value::from(v)
    }
}

/// Nest flat row-major `data` into JSON arrays shaped like `shape`.
///
/// Data that does not fit the shape is emitted flat rather than sliced.
fn nest(shape: &[usize], data: &[f64]) -> Value {
    if shape.contains(&0) || box_size(shape) != Some(data.len()) {
        warn!(
            "{} values do not fill shape {:?}; emitting them flat",
            data.len(),
            shape
        );
        return Value::Array(data.iter().copied().map(json_number).collect());
    }
    match shape.split_first() {
        None => data.first().copied().map(json_number).unwrap_or(Value::Null),
        Some((&dim, rest)) => {
            let stride = data.len() / dim;
            Value::Array(
                (0..dim)
                    .map(|i| nest(rest, &data[i * stride..(i + 1) * stride]))
                    .collect(),
            )
        }
    }
}

/// Flatten nested JSON arrays, checking they match `shape` exactly.
fn flatten(shape: &[usize], value: &Value) -> Result<Vec<f64>, String> {
    // No pre-allocation: `shape` may come from an untrusted descriptor.
    let mut out = Vec::new();
    flatten_into(shape, value, 0, &mut out)?;
    Ok(out)
}

fn flatten_into(shape: &[usize], value: &Value, depth: usize, out: &mut Vec<f64>) -> Result<(), String> {
    match shape.split_first() {
        None => {
            let v = value
                .as_f64()
                .ok_or_else(|| format!("expected a number at depth {}, got {}", depth, value))?;
            if !v.is_finite() {
                return Err(format!("non-finite number at depth {}", depth));
            }
            out.push(v);
            Ok(())
        }
        Some((&dim, rest)) => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("expected an array at depth {}, got {}", depth, value))?;
            if items.len() != dim {
                return Err(format!(
                    "expected {} elements at depth {}, got {}",
                    dim,
                    depth,
                    items.len()
                ));
            }
            for item in items {
                flatten_into(rest, item, depth + 1, out)?;
            }
            Ok(())
        }
    }
}

fn invalid(message: impl Into<String>) -> GymError {
    GymError::InvalidArgument(message.into())
}
