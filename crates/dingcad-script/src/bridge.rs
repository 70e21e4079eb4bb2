//! Conversions between Rhai values and kernel geometry types.
//!
//! Decoders are strict: vectors must be arrays of exactly the right length
//! holding `INT` or `FLOAT` values, and nothing else is coerced. A failed
//! decode never leaves a partially built value behind.

use dingcad_kernel::prelude::*;
use rhai::{Array, Dynamic, EvalAltResult, FLOAT, Map, Position};
use thiserror::Error;

use crate::handle::SolidHandle;

/// Result type for script-visible operations
pub type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Errors thrown into scripts by bindings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Wrong value shape or type
    #[error("TypeError: {0}")]
    Type(String),

    /// Value of the right type outside its allowed range
    #[error("RangeError: {0}")]
    Range(String),

    /// Host-side failure unrelated to the script's values
    #[error("InternalError: {0}")]
    Internal(String),
}

impl BindingError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }
}

/// Message of the innermost error, with a thrown value rendered as-is.
///
/// Rhai displays a thrown value as `Runtime error: <value> (line .., position ..)`;
/// this returns just the value, so binding errors read `TypeError: ...`.
pub fn thrown_message(err: &EvalAltResult) -> String {
    let mut current = err;
    while let EvalAltResult::ErrorInFunctionCall(_, _, inner, _) | EvalAltResult::ErrorInModule(_, inner, _) = current {
        current = inner;
    }
    match current {
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        other => other.to_string(),
    }
}

impl From<BindingError> for Box<EvalAltResult> {
    fn from(err: BindingError) -> Self {
        Box::new(EvalAltResult::ErrorRuntime(
            Dynamic::from(err.to_string()),
            Position::NONE,
        ))
    }
}

pub type BindResult<T> = Result<T, BindingError>;

// ============================================================================
// Numbers and vectors
// ============================================================================

/// A number from an `INT` or `FLOAT` value
pub fn as_number(value: &Dynamic) -> Option<f64> {
    if let Ok(f) = value.as_float() {
        Some(f)
    } else {
        value.as_int().ok().map(|i| i as f64)
    }
}

pub fn decode_number(value: &Dynamic, what: &str) -> BindResult<f64> {
    as_number(value).ok_or_else(|| {
        BindingError::type_error(format!("{what} must be a number (found {})", value.type_name()))
    })
}

fn decode_fixed<const N: usize>(value: &Dynamic, shape: &str, count: &str) -> BindResult<[f64; N]> {
    let Some(array) = value.clone().try_cast::<Array>() else {
        return Err(BindingError::type_error(format!("expected array of {count} numbers")));
    };
    if array.len() != N {
        return Err(BindingError::type_error(format!("{shape} requires {count} entries")));
    }
    let mut out = [0.0; N];
    for (i, entry) in array.iter().enumerate() {
        out[i] = as_number(entry).ok_or_else(|| {
            BindingError::type_error(format!(
                "{shape} entry {i} is not a number (found {})",
                entry.type_name()
            ))
        })?;
    }
    Ok(out)
}

pub fn decode_vec2(value: &Dynamic) -> BindResult<[f64; 2]> {
    decode_fixed::<2>(value, "vector", "two")
}

pub fn decode_vec3(value: &Dynamic) -> BindResult<[f64; 3]> {
    decode_fixed::<3>(value, "vector", "three")
}

/// Row-major 3x4 affine matrix
pub fn decode_mat3x4(value: &Dynamic) -> BindResult<[f64; 12]> {
    let well_formed = value
        .clone()
        .try_cast::<Array>()
        .is_some_and(|a| a.len() == 12 && a.iter().all(|v| as_number(v).is_some()));
    if !well_formed {
        return Err(BindingError::type_error("transform expects array of 12 numbers"));
    }
    decode_fixed::<12>(value, "transform", "12")
}

pub fn encode_vec2(v: DVec2) -> Dynamic {
    Dynamic::from_array(vec![Dynamic::from_float(v.x), Dynamic::from_float(v.y)])
}

pub fn encode_vec3(v: DVec3) -> Dynamic {
    Dynamic::from_array(v.to_array().iter().map(|&x| Dynamic::from_float(x)).collect())
}

pub fn to_dvec3(v: [f64; 3]) -> DVec3 {
    DVec3::from_array(v)
}

// ============================================================================
// Polygons and point sets
// ============================================================================

/// Loops of `[x, y]` points; winding and loop order are kept as given
pub fn decode_polygons(value: &Dynamic) -> BindResult<Polygons> {
    let Some(loops) = value.clone().try_cast::<Array>() else {
        return Err(BindingError::type_error("polygons must be an array of loops"));
    };
    loops
        .iter()
        .map(|lp| {
            let Some(points) = lp.clone().try_cast::<Array>() else {
                return Err(BindingError::type_error("each loop must be an array of [x,y] points"));
            };
            points
                .iter()
                .map(|p| {
                    decode_vec2(p)
                        .map(DVec2::from_array)
                        .map_err(|_| BindingError::type_error("each loop must be an array of [x,y] points"))
                })
                .collect()
        })
        .collect()
}

pub fn encode_polygons(polygons: &Polygons) -> Dynamic {
    Dynamic::from_array(
        polygons
            .iter()
            .map(|lp| Dynamic::from_array(lp.iter().map(|p| encode_vec2(*p)).collect()))
            .collect(),
    )
}

/// Array of `[x, y, z]` points
pub fn decode_points3(value: &Dynamic) -> BindResult<Vec<DVec3>> {
    let Some(points) = value.clone().try_cast::<Array>() else {
        return Err(BindingError::type_error("points must be an array of [x,y,z]"));
    };
    points.iter().map(|p| decode_vec3(p).map(to_dvec3)).collect()
}

// ============================================================================
// Bounds
// ============================================================================

pub fn decode_bounds(value: &Dynamic) -> BindResult<BoundingBox> {
    let Some(map) = value.clone().try_cast::<Map>() else {
        return Err(BindingError::type_error("bounds must be an object with min/max"));
    };
    let (Some(min), Some(max)) = (map.get("min"), map.get("max")) else {
        return Err(BindingError::type_error("bounds requires min and max arrays"));
    };
    let min = decode_vec3(min).map_err(|_| BindingError::type_error("bounds requires min and max arrays"))?;
    let max = decode_vec3(max).map_err(|_| BindingError::type_error("bounds requires min and max arrays"))?;
    Ok(BoundingBox::new(to_dvec3(min), to_dvec3(max)))
}

pub fn encode_bounds(bounds: &BoundingBox) -> Dynamic {
    let mut map = Map::new();
    map.insert("min".into(), encode_vec3(bounds.min));
    map.insert("max".into(), encode_vec3(bounds.max));
    Dynamic::from_map(map)
}

// ============================================================================
// Solids
// ============================================================================

pub fn wrap_solid(solid: Solid) -> Dynamic {
    Dynamic::from(SolidHandle::new(solid))
}

pub fn wrap_handle(handle: SolidHandle) -> Dynamic {
    Dynamic::from(handle)
}

/// The handle inside a value, or `None` for anything that is not a solid
pub fn unwrap_solid(value: &Dynamic) -> Option<SolidHandle> {
    value.clone().flatten().try_cast::<SolidHandle>()
}

/// A solid argument, or a type error carrying the operation's usage line
pub fn expect_solid(value: &Dynamic, usage: &str) -> BindResult<SolidHandle> {
    unwrap_solid(value).ok_or_else(|| BindingError::type_error(usage))
}

// ============================================================================
// Option objects
// ============================================================================

/// Read access to an optional options map
pub struct Options<'a> {
    op: &'a str,
    map: Option<Map>,
}

impl<'a> Options<'a> {
    /// Options from a map value; anything else yields all defaults
    pub fn lenient(op: &'a str, value: Option<&Dynamic>) -> Self {
        Self {
            op,
            map: value.and_then(|v| v.clone().try_cast::<Map>()),
        }
    }

    /// Options that must be a map
    pub fn required(op: &'a str, value: &Dynamic) -> BindResult<Self> {
        match value.clone().try_cast::<Map>() {
            Some(map) => Ok(Self { op, map: Some(map) }),
            None => Err(BindingError::type_error(format!("{op} expects options object"))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Dynamic> {
        self.map.as_ref()?.get(key).filter(|v| !v.is_unit())
    }

    pub fn number(&self, key: &str, default: f64) -> BindResult<f64> {
        match self.get(key) {
            Some(v) => decode_number(v, &format!("{} {key}", self.op)),
            None => Ok(default),
        }
    }

    pub fn opt_number(&self, key: &str) -> BindResult<Option<f64>> {
        self.get(key)
            .map(|v| decode_number(v, &format!("{} {key}", self.op)))
            .transpose()
    }

    pub fn count(&self, key: &str, default: usize) -> BindResult<usize> {
        let n = self.number(key, default as f64)?;
        if n < 0.0 || !n.is_finite() {
            return Err(BindingError::range_error(format!("{} {key} must be >= 0", self.op)));
        }
        Ok(n as usize)
    }

    pub fn flag(&self, key: &str, default: bool) -> BindResult<bool> {
        match self.get(key) {
            Some(v) => v.as_bool().map_err(|found| {
                BindingError::type_error(format!("{} {key} must be a boolean (found {found})", self.op))
            }),
            None => Ok(default),
        }
    }

    pub fn vec3(&self, key: &str, default: [f64; 3]) -> BindResult<[f64; 3]> {
        self.get(key).map_or(Ok(default), decode_vec3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::INT;

    fn array(values: Vec<Dynamic>) -> Dynamic {
        Dynamic::from_array(values)
    }

    #[test]
    fn test_vec3_round_trip() {
        let v = encode_vec3(DVec3::new(1.5, -2.0, 3.25));
        assert_eq!(decode_vec3(&v), Ok([1.5, -2.0, 3.25]));
    }

    #[test]
    fn test_ints_are_numbers() {
        let v = array(vec![Dynamic::from(1 as INT), Dynamic::from_float(2.5), Dynamic::from(3 as INT)]);
        assert_eq!(decode_vec3(&v), Ok([1.0, 2.5, 3.0]));
    }

    #[test]
    fn test_vec3_errors_name_the_shape() {
        let short = array(vec![Dynamic::from_float(1.0)]);
        assert_eq!(
            decode_vec3(&short).unwrap_err().to_string(),
            "TypeError: vector requires three entries"
        );
        let text = array(vec![Dynamic::from_float(1.0), Dynamic::from("x"), Dynamic::from_float(1.0)]);
        assert_eq!(
            decode_vec3(&text).unwrap_err().to_string(),
            "TypeError: vector entry 1 is not a number (found string)"
        );
        assert_eq!(
            decode_vec3(&Dynamic::from(true)).unwrap_err().to_string(),
            "TypeError: expected array of three numbers"
        );
    }

    #[test]
    fn test_mat3x4_round_trip() {
        let m: Vec<FLOAT> = (0..12).map(|i| i as FLOAT * 0.5).collect();
        let value = array(m.iter().map(|&x| Dynamic::from_float(x)).collect());
        let decoded = decode_mat3x4(&value).unwrap_or([0.0; 12]);
        assert_eq!(decoded.to_vec(), m);
        let short = array(vec![Dynamic::from_float(1.0); 9]);
        assert_eq!(
            decode_mat3x4(&short).unwrap_err().to_string(),
            "TypeError: transform expects array of 12 numbers"
        );
    }

    #[test]
    fn test_polygons_keep_order_and_winding() {
        let square = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
        let value = array(vec![array(
            square
                .iter()
                .map(|p| array(vec![Dynamic::from_float(p[0]), Dynamic::from_float(p[1])]))
                .collect(),
        )]);
        let polys = decode_polygons(&value).unwrap_or_default();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 4);
        assert_eq!(polys[0][1], DVec2::new(0.0, 1.0));
        assert!(decode_polygons(&array(Vec::new())).unwrap_or_default().is_empty());
        assert!(decode_polygons(&Dynamic::from(1 as INT)).is_err());
    }

    #[test]
    fn test_bounds() {
        let bounds = BoundingBox::new(DVec3::splat(-1.0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(decode_bounds(&encode_bounds(&bounds)), Ok(bounds));
        let mut partial = Map::new();
        partial.insert("min".into(), encode_vec3(DVec3::ZERO));
        assert_eq!(
            decode_bounds(&Dynamic::from_map(partial)).unwrap_err().to_string(),
            "TypeError: bounds requires min and max arrays"
        );
    }

    #[test]
    fn test_wrap_unwrap_identity() {
        let handle = SolidHandle::new(Solid::cube(DVec3::ONE, false));
        let value = wrap_handle(handle.clone());
        let back = unwrap_solid(&value);
        assert!(back.is_some_and(|b| b.ptr_eq(&handle)));
        assert!(unwrap_solid(&Dynamic::from(1 as INT)).is_none());
        assert!(unwrap_solid(&Dynamic::UNIT).is_none());
    }

    #[test]
    fn test_binding_error_prefixes() {
        let err: Box<EvalAltResult> = BindingError::range_error("boolean op index must be 0,1,2").into();
        assert_eq!(thrown_message(&err), "RangeError: boolean op index must be 0,1,2");
        assert!(err.to_string().starts_with("Runtime error: "));
    }
}
