//! Measurement queries

use rhai::{Dynamic, Engine, INT};

use super::register_query;
use crate::bridge::{ScriptResult, decode_number, encode_bounds, expect_solid};

pub(super) fn register(engine: &mut Engine) {
    register_query(engine, "surfaceArea", |s| Dynamic::from_float(s.surface_area()));
    register_query(engine, "volume", |s| Dynamic::from_float(s.volume()));
    register_query(engine, "boundingBox", |s| encode_bounds(&s.bounding_box()));
    register_query(engine, "numTriangles", |s| Dynamic::from_int(s.num_tri() as INT));
    register_query(engine, "numVertices", |s| Dynamic::from_int(s.num_vert() as INT));
    register_query(engine, "numEdges", |s| Dynamic::from_int(s.num_edge() as INT));
    register_query(engine, "genus", |s| Dynamic::from_int(s.genus()));
    register_query(engine, "getTolerance", |s| Dynamic::from_float(s.tolerance()));
    register_query(engine, "isEmpty", |s| Dynamic::from_bool(s.is_empty()));
    register_query(engine, "status", |s| Dynamic::from(s.status().as_str()));

    engine.register_fn(
        "minGap",
        |a: Dynamic, b: Dynamic, search: Dynamic| -> ScriptResult<Dynamic> {
            const USAGE: &str = "minGap expects (solidA, solidB, searchLength)";
            let a = expect_solid(&a, USAGE)?;
            let b = expect_solid(&b, USAGE)?;
            let search = decode_number(&search, "minGap searchLength")?;
            Ok(Dynamic::from_float(a.min_gap(&b, search)))
        },
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::thrown_message;
    use crate::bridge::wrap_solid;
    use crate::handle::SolidHandle;
    use approx::assert_relative_eq;
    use dingcad_kernel::prelude::*;
    use rhai::Map;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_type_with_name::<SolidHandle>("Solid");
        engine.register_fn("block", || wrap_solid(Solid::cube(DVec3::splat(10.0), false)));
        engine.register_fn("far_block", || {
            wrap_solid(Solid::cube(DVec3::splat(10.0), false).translate(DVec3::new(13.0, 0.0, 0.0)))
        });
        register(&mut engine);
        engine
    }

    #[test]
    fn test_cube_measurements() {
        let engine = engine();
        assert_relative_eq!(engine.eval::<f64>("volume(block())").unwrap(), 1000.0, epsilon = 1e-9);
        assert_relative_eq!(engine.eval::<f64>("block().surfaceArea()").unwrap(), 600.0, epsilon = 1e-9);
        assert_eq!(engine.eval::<INT>("numTriangles(block())").unwrap(), 12);
        assert_eq!(engine.eval::<INT>("numVertices(block())").unwrap(), 8);
        assert_eq!(engine.eval::<INT>("numEdges(block())").unwrap(), 18);
        assert_eq!(engine.eval::<INT>("genus(block())").unwrap(), 0);
        assert!(!engine.eval::<bool>("isEmpty(block())").unwrap());
        assert_eq!(engine.eval::<String>("status(block())").unwrap(), "NoError");
    }

    #[test]
    fn test_bounding_box_object() {
        let bb = engine().eval::<Map>("boundingBox(block())").unwrap();
        let max = bb["max"].clone().into_typed_array::<f64>().unwrap();
        assert_eq!(max, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_min_gap_is_capped() {
        let engine = engine();
        assert_relative_eq!(engine.eval::<f64>("minGap(block(), far_block(), 10)").unwrap(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(engine.eval::<f64>("minGap(block(), far_block(), 1)").unwrap(), 1.0);
    }

    #[test]
    fn test_query_usage_error() {
        let err = engine().eval::<f64>("volume(42)").unwrap_err();
        assert!(thrown_message(&err).starts_with("TypeError: volume expects a solid"));
    }
}
