//! Per-vertex property channels

use rhai::{Dynamic, Engine, INT};

use super::register_query;
use crate::bridge::{BindingError, ScriptResult, decode_number, expect_solid, wrap_solid};

const DEFAULT_SHARP_ANGLE: f64 = 60.0;

pub(super) fn register(engine: &mut Engine) {
    register_query(engine, "numProperties", |s| Dynamic::from_int(s.num_prop() as INT));
    register_query(engine, "numPropertyVertices", |s| Dynamic::from_int(s.num_prop_vert() as INT));

    engine
        .register_fn("calculateNormals", |s: Dynamic, idx: Dynamic| {
            calculate_normals(&s, &idx, None)
        })
        .register_fn(
            "calculateNormals",
            |s: Dynamic, idx: Dynamic, angle: Dynamic| calculate_normals(&s, &idx, Some(&angle)),
        )
        .register_fn(
            "calculateCurvature",
            |s: Dynamic, gaussian: Dynamic, mean: Dynamic| -> ScriptResult<Dynamic> {
                const USAGE: &str = "calculateCurvature expects (solid, gaussianIdx, meanIdx)";
                let solid = expect_solid(&s, USAGE)?;
                let gaussian = channel(&gaussian, USAGE)?;
                let mean = channel(&mean, USAGE)?;
                Ok(wrap_solid(solid.calculate_curvature(gaussian, mean)))
            },
        );
}

fn calculate_normals(s: &Dynamic, idx: &Dynamic, angle: Option<&Dynamic>) -> ScriptResult<Dynamic> {
    const USAGE: &str = "calculateNormals expects (solid, normalIdx, minSharpAngle?)";
    let solid = expect_solid(s, USAGE)?;
    let idx = usize::try_from(channel(idx, USAGE)?)
        .map_err(|_| BindingError::range_error("calculateNormals normalIdx must be >= 0"))?;
    let angle = match angle {
        Some(a) => decode_number(a, "calculateNormals minSharpAngle")?,
        None => DEFAULT_SHARP_ANGLE,
    };
    Ok(wrap_solid(solid.calculate_normals(idx, angle)))
}

/// Channel index; negative values are kept so callers can skip a channel
fn channel(value: &Dynamic, usage: &str) -> ScriptResult<i64> {
    match decode_number(value, usage) {
        Ok(n) if n.fract() == 0.0 && n.abs() < f64::from(u16::MAX) => Ok(n as i64),
        _ => Err(BindingError::type_error(usage).into()),
    }
}
