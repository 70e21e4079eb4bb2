//! Boolean set operations and the op selector

use dingcad_kernel::prelude::*;
use rhai::{Dynamic, Engine, ImmutableString, INT};

use super::{collect_solids, register_variadic};
use crate::bridge::{BindResult, BindingError, ScriptResult, expect_solid, wrap_solid};
use crate::handle::SolidHandle;

pub(super) fn register(engine: &mut Engine) {
    for (name, op) in [
        ("union", OpType::Add),
        ("difference", OpType::Subtract),
        ("intersection", OpType::Intersect),
    ] {
        register_variadic(engine, name, 0, move |_, args| reduce(name, op, args));
    }

    engine.register_fn(
        "boolean",
        |a: Dynamic, b: Dynamic, op: Dynamic| -> ScriptResult<Dynamic> {
            const USAGE: &str = "boolean expects (solidA, solidB, op)";
            let a = expect_solid(&a, USAGE)?;
            let b = expect_solid(&b, USAGE)?;
            let op = parse_op(&op)?;
            Ok(wrap_solid(a.boolean(&b, op)))
        },
    );

    register_variadic(engine, "batchBoolean", 0, |_, args| {
        let Some((op, rest)) = args.split_first() else {
            return Err(BindingError::type_error("batchBoolean expects (op, solids)").into());
        };
        let op = parse_op(op)?;
        let solids = collect_solids(rest, "batchBoolean")?;
        if solids.is_empty() {
            return Err(BindingError::type_error("batchBoolean requires solids").into());
        }
        tracing::trace!(%op, count = solids.len(), "batch boolean");
        let refs: Vec<&Solid> = solids.iter().map(SolidHandle::solid).collect();
        Ok(wrap_solid(Solid::batch_boolean(&refs, op)))
    });
}

/// Strict left fold: `((a op b) op c) op ...`
fn reduce(name: &str, op: OpType, args: &[Dynamic]) -> ScriptResult<Dynamic> {
    let solids = collect_solids(args, name)?;
    let [first, second, rest @ ..] = solids.as_slice() else {
        return Err(BindingError::type_error(format!("{name} requires at least two solids")).into());
    };
    tracing::trace!(%op, count = solids.len(), "boolean reduction");
    let mut acc = first.boolean(second, op);
    for solid in rest {
        acc = acc.boolean(solid, op);
    }
    Ok(wrap_solid(acc))
}

/// Decode a boolean op given by name or by index `0..=2`
pub fn parse_op(value: &Dynamic) -> BindResult<OpType> {
    if let Some(name) = value.clone().try_cast::<ImmutableString>() {
        return OpType::from_name(&name)
            .ok_or_else(|| BindingError::type_error(format!("unknown boolean op '{name}'")));
    }
    let index = if let Ok(i) = value.as_int() {
        Some(i)
    } else if let Ok(f) = value.as_float() {
        (f.fract() == 0.0 && f.is_finite()).then_some(f as INT)
    } else {
        return Err(BindingError::type_error("op must be string or number"));
    };
    index
        .and_then(OpType::from_index)
        .ok_or_else(|| BindingError::range_error("boolean op index must be 0,1,2"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::thrown_message;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_op_names_and_indices() {
        assert_eq!(parse_op(&Dynamic::from("Union")), Ok(OpType::Add));
        assert_eq!(parse_op(&Dynamic::from("difference")), Ok(OpType::Subtract));
        assert_eq!(parse_op(&Dynamic::from("INTERSECT")), Ok(OpType::Intersect));
        assert_eq!(parse_op(&Dynamic::from(1 as INT)), Ok(OpType::Subtract));
        assert_eq!(parse_op(&Dynamic::from_float(2.0)), Ok(OpType::Intersect));
    }

    #[test]
    fn test_parse_op_errors() {
        assert_eq!(
            parse_op(&Dynamic::from("xor")).unwrap_err().to_string(),
            "TypeError: unknown boolean op 'xor'"
        );
        assert_eq!(
            parse_op(&Dynamic::from(3 as INT)).unwrap_err().to_string(),
            "RangeError: boolean op index must be 0,1,2"
        );
        assert_eq!(
            parse_op(&Dynamic::from_float(0.5)).unwrap_err().to_string(),
            "RangeError: boolean op index must be 0,1,2"
        );
        assert_eq!(
            parse_op(&Dynamic::from(true)).unwrap_err().to_string(),
            "TypeError: op must be string or number"
        );
    }

    #[test]
    fn test_reduce_is_left_to_right() {
        let big = wrap_solid(Solid::cube(DVec3::splat(10.0), false));
        let a = wrap_solid(Solid::cube(DVec3::splat(2.0), false).translate(DVec3::ONE));
        let b = wrap_solid(Solid::cube(DVec3::splat(2.0), false).translate(DVec3::new(5.0, 1.0, 1.0)));
        let result = reduce("difference", OpType::Subtract, &[big, a, b]).unwrap();
        let solid = result.try_cast::<SolidHandle>().unwrap();
        assert_relative_eq!(solid.volume(), 1000.0 - 16.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reduce_needs_two() {
        let a = wrap_solid(Solid::cube(DVec3::ONE, false));
        let err = reduce("union", OpType::Add, &[a]).unwrap_err();
        assert!(thrown_message(&err).starts_with("TypeError: union requires at least two solids"));
    }
}
