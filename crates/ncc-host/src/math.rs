//! Math intrinsics exposed to guests.
//!
//! The guest's calling convention resolves every external reference to a
//! concrete import, so the whole standard math set is registered whether
//! or not a module uses it. All operate on `f64`. Functions whose native
//! semantics differ from Rust's (`round`, `sign`, `max`, `min`, `clz32`,
//! `imul`) are defined here explicitly.

use wasmi::{Caller, Linker};

use crate::error::BridgeResult;
use crate::imports::{link_error, HostState};

type Unary = fn(f64) -> f64;
type Binary = fn(f64, f64) -> f64;

pub const UNARY: &[(&str, Unary)] = &[
    ("abs", f64::abs),
    ("acos", f64::acos),
    ("acosh", f64::acosh),
    ("asin", f64::asin),
    ("asinh", f64::asinh),
    ("atan", f64::atan),
    ("atanh", f64::atanh),
    ("cbrt", f64::cbrt),
    ("ceil", f64::ceil),
    ("clz32", clz32),
    ("cos", f64::cos),
    ("cosh", f64::cosh),
    ("exp", f64::exp),
    ("expm1", f64::exp_m1),
    ("floor", f64::floor),
    ("fround", fround),
    ("log", f64::ln),
    ("log1p", f64::ln_1p),
    ("log10", f64::log10),
    ("log2", f64::log2),
    ("round", round),
    ("sign", sign),
    ("sin", f64::sin),
    ("sinh", f64::sinh),
    ("sqrt", f64::sqrt),
    ("tan", f64::tan),
    ("tanh", f64::tanh),
    ("trunc", f64::trunc),
];

pub const BINARY: &[(&str, Binary)] = &[
    ("atan2", f64::atan2),
    ("hypot", f64::hypot),
    ("imul", imul),
    ("max", max),
    ("min", min),
    ("pow", f64::powf),
];

/// Register the math set under `namespace`.
pub(crate) fn register(linker: &mut Linker<HostState>, namespace: &str) -> BridgeResult<()> {
    for &(name, f) in UNARY {
        linker
            .func_wrap(namespace, name, move |x: f64| -> f64 { f(x) })
            .map_err(link_error)?;
    }
    for &(name, f) in BINARY {
        linker
            .func_wrap(namespace, name, move |a: f64, b: f64| -> f64 { f(a, b) })
            .map_err(link_error)?;
    }
    linker
        .func_wrap(
            namespace,
            "random",
            |mut caller: Caller<'_, HostState>| -> f64 { caller.data_mut().rng.f64() },
        )
        .map_err(link_error)?;
    Ok(())
}

/// Modular conversion to a 32-bit unsigned integer; non-finite maps to 0.
fn to_uint32(x: f64) -> u32 {
    if !x.is_finite() {
        return 0;
    }
    (x.trunc() % 4_294_967_296.0) as i64 as u32
}

fn clz32(x: f64) -> f64 {
    f64::from(to_uint32(x).leading_zeros())
}

fn imul(a: f64, b: f64) -> f64 {
    f64::from((to_uint32(a) as i32).wrapping_mul(to_uint32(b) as i32))
}

fn fround(x: f64) -> f64 {
    f64::from(x as f32)
}

/// Rounds half-way cases toward positive infinity.
fn round(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

fn max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

fn min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_goes_half_up() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(-2.6), -3.0);
        assert_eq!(round(0.49999999999999994), 0.0);
    }

    #[test]
    fn sign_keeps_zero_and_nan() {
        assert_eq!(sign(-4.0), -1.0);
        assert_eq!(sign(9.0), 1.0);
        assert_eq!(sign(0.0), 0.0);
        assert!(sign(f64::NAN).is_nan());
    }

    #[test]
    fn min_max_propagate_nan() {
        assert!(max(1.0, f64::NAN).is_nan());
        assert!(min(f64::NAN, 1.0).is_nan());
        assert_eq!(max(1.0, 2.0), 2.0);
        assert_eq!(min(1.0, 2.0), 1.0);
    }

    #[test]
    fn integer_ops_wrap_at_32_bits() {
        assert_eq!(clz32(1.0), 31.0);
        assert_eq!(clz32(0.0), 32.0);
        assert_eq!(clz32(-1.0), 0.0);
        assert_eq!(clz32(4_294_967_296.0), 32.0);
        assert_eq!(imul(3.0, 4.0), 12.0);
        assert_eq!(imul(4_294_967_295.0, 5.0), -5.0);
        assert_eq!(imul(f64::NAN, 5.0), 0.0);
    }

    #[test]
    fn fround_narrows_to_f32() {
        assert_eq!(fround(5.5), 5.5);
        assert_eq!(fround(0.1), f64::from(0.1f32));
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = UNARY
            .iter()
            .map(|(n, _)| *n)
            .chain(BINARY.iter().map(|(n, _)| *n))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
