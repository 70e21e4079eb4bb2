//! Original-id bookkeeping

use dingcad_kernel::reserve_ids;
use rhai::{Dynamic, Engine, INT};

use super::register_query;
use crate::bridge::{BindingError, ScriptResult, decode_number, wrap_solid};

pub(super) fn register(engine: &mut Engine) {
    register_query(engine, "asOriginal", |s| wrap_solid(s.as_original()));
    register_query(engine, "originalId", |s| {
        Dynamic::from_int(s.original_id().map_or(-1, INT::from))
    });

    engine.register_fn("reserveIds", |n: Dynamic| -> ScriptResult<Dynamic> {
        let n = decode_number(&n, "reserveIds count")
            .map_err(|_| BindingError::type_error("reserveIds expects count"))?;
        if n.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&n) {
            return Err(BindingError::range_error("reserveIds count must be a non-negative integer").into());
        }
        Ok(Dynamic::from_int(INT::from(reserve_ids(n as u32))))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handle::SolidHandle;
    use dingcad_kernel::prelude::*;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_type_with_name::<SolidHandle>("Solid");
        engine.register_fn("block", || wrap_solid(Solid::cube(DVec3::ONE, false)));
        engine.register_fn("merged", || {
            let a = Solid::cube(DVec3::ONE, false);
            let b = a.translate(DVec3::splat(3.0));
            wrap_solid(Solid::compose(&[&a, &b]))
        });
        register(&mut engine);
        engine
    }

    #[test]
    fn test_as_original_assigns_fresh_id() {
        let engine = engine();
        let ids = engine
            .eval::<rhai::Array>("let a = block(); [originalId(a), originalId(asOriginal(a))]")
            .unwrap();
        let (a, b) = (ids[0].as_int().unwrap(), ids[1].as_int().unwrap());
        assert!(a >= 0 && b >= 0);
        assert_ne!(a, b);
        assert_eq!(engine.eval::<INT>("originalId(merged())").unwrap(), -1);
    }

    #[test]
    fn test_reserve_ids_are_consecutive_blocks() {
        let engine = engine();
        let (first, second) = (
            engine.eval::<INT>("reserveIds(10)").unwrap(),
            engine.eval::<INT>("reserveIds(1)").unwrap(),
        );
        assert!(second >= first + 10);
        assert!(engine.eval::<INT>("reserveIds(-1)").is_err());
    }
}
