//! Script-backed signed distance sampling for level sets
//!
//! The kernel's sampling loop cannot unwind through a script error, so the
//! first failure poisons the sampler: every later sample returns 0.0 and the
//! recorded error is handed back once the kernel call has finished.

use dingcad_kernel::prelude::DVec3;
use rhai::{Array, Dynamic, EvalAltResult, FnPtr, NativeCallContext};

use crate::bridge::{BindingError, ScriptResult, as_number};

/// Lifecycle of a [`ScriptSampler`]
#[derive(Debug)]
pub enum SamplerState {
    /// Holding the function, nothing sampled yet
    Armed,
    /// At least one sample returned a number
    Sampling,
    /// A sample failed; later samples are no-ops
    Faulted(Box<EvalAltResult>),
    /// The function has been released
    Drained,
}

/// Adapter from a script function to the kernel's `FnMut(DVec3) -> f64`
#[derive(Debug)]
pub struct ScriptSampler {
    function: Option<FnPtr>,
    state: SamplerState,
    samples: usize,
}

impl ScriptSampler {
    pub fn arm(function: FnPtr) -> Self {
        Self {
            function: Some(function),
            state: SamplerState::Armed,
            samples: 0,
        }
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    /// Number of times the script function was called
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Evaluate the script function at `p`
    pub fn sample(&mut self, ctx: &NativeCallContext, p: DVec3) -> f64 {
        if matches!(self.state, SamplerState::Faulted(_) | SamplerState::Drained) {
            return 0.0;
        }
        let Some(function) = &self.function else {
            return 0.0;
        };
        self.samples += 1;
        let point: Array = p.to_array().iter().map(|&x| Dynamic::from_float(x)).collect();
        match function.call_within_context::<Dynamic>(ctx, (point,)) {
            Ok(value) => {
                if let Some(d) = as_number(&value) {
                    self.state = SamplerState::Sampling;
                    d
                } else {
                    let err = BindingError::Internal(format!(
                        "levelSet SDF must return number (found {})",
                        value.type_name()
                    ));
                    self.state = SamplerState::Faulted(err.into());
                    0.0
                }
            }
            Err(err) => {
                self.state = SamplerState::Faulted(err);
                0.0
            }
        }
    }

    /// Release the function and report the first fault, if any.
    ///
    /// A second call finds the sampler drained and reports success.
    pub fn finish(&mut self) -> ScriptResult<usize> {
        self.function = None;
        match std::mem::replace(&mut self.state, SamplerState::Drained) {
            SamplerState::Faulted(err) => Err(err),
            _ => Ok(self.samples),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rhai::{Engine, INT};

    /// Engine with `probe(f, n)`, which samples `f` n times along x and
    /// reports the sum and the sampler's final state
    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_fn(
            "probe",
            |ctx: NativeCallContext, f: FnPtr, n: INT| -> ScriptResult<Array> {
                let mut sampler = ScriptSampler::arm(f);
                let mut sum = 0.0;
                for i in 0..n {
                    sum += sampler.sample(&ctx, DVec3::new(i as f64, 0.0, 0.0));
                }
                let state = format!("{:?}", sampler.state());
                let count = sampler.samples() as INT;
                let result = sampler.finish();
                let drained = matches!(sampler.state(), SamplerState::Drained);
                result?;
                Ok(vec![
                    Dynamic::from_float(sum),
                    Dynamic::from(count),
                    Dynamic::from(state),
                    Dynamic::from(drained),
                ])
            },
        );
        engine
    }

    #[test]
    fn test_samples_closure() {
        let out = engine().eval::<Array>("let k = 2.0; probe(|p| p[0] * k, 4)").unwrap();
        assert_eq!(out[0].as_float().unwrap(), 12.0);
        assert_eq!(out[1].as_int().unwrap(), 4);
        assert!(out[2].clone().into_string().unwrap().starts_with("Sampling"));
        assert!(out[3].as_bool().unwrap());
    }

    #[test]
    fn test_integer_returns_are_numbers() {
        let out = engine().eval::<Array>("probe(|p| 1, 3)").unwrap();
        assert_eq!(out[0].as_float().unwrap(), 3.0);
    }

    #[test]
    fn test_first_error_poisons() {
        let mut engine = engine();
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = calls.clone();
        engine.register_fn("tick", move || seen.set(seen.get() + 1));
        let err = engine
            .eval::<Array>("probe(|p| { tick(); if p[0] >= 1.0 { throw \"boom\" } 0.5 }, 5)")
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_non_number_return_faults() {
        let err = engine().eval::<Array>("probe(|p| \"far\", 3)").unwrap_err();
        assert!(
            err.to_string()
                .contains("InternalError: levelSet SDF must return number (found string)")
        );
    }

    #[test]
    fn test_finish_twice() {
        let mut sampler = ScriptSampler::arm(FnPtr::new("noop").unwrap());
        assert!(matches!(sampler.state(), SamplerState::Armed));
        assert_eq!(sampler.finish().unwrap(), 0);
        assert_eq!(sampler.finish().unwrap(), 0);
    }
}
