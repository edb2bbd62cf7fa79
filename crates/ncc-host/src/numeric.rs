//! Text rendering of scalar values the guest prints.
//!
//! Every `put*` import funnels into [`HostValue::render`]. The wire value
//! is a plain host number; the variant only selects the formatting rule.

/// A scalar received from the guest, tagged with how it should print.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostValue {
    /// A character code. Negative codes are shifted up by 128.
    Char(i32),
    Bool(i32),
    Signed32(i32),
    /// An unsigned value that crossed the boundary as a signed `i32`.
    Unsigned32(i32),
    Float32(f32),
    Float64(f64),
}

impl HostValue {
    pub fn render(self) -> String {
        match self {
            HostValue::Char(code) => {
                let code = if code < 0 { code + 128 } else { code };
                u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
                    .to_string()
            }
            HostValue::Bool(v) => (v != 0).to_string(),
            HostValue::Signed32(v) => v.to_string(),
            HostValue::Unsigned32(v) => {
                let v = i64::from(v);
                let v = if v < 0 { v + (1i64 << 32) } else { v };
                v.to_string()
            }
            HostValue::Float32(v) => render_float(f64::from(v)),
            HostValue::Float64(v) => render_float(v),
        }
    }
}

/// Shortest decimal form; integral values print without a fraction.
fn render_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "Infinity".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if v == 0.0 {
        "0".to_string()
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_wraps_negative_input() {
        assert_eq!(HostValue::Unsigned32(-1).render(), "4294967295");
        assert_eq!(HostValue::Unsigned32(i32::MIN).render(), "2147483648");
        assert_eq!(HostValue::Unsigned32(42).render(), "42");
    }

    #[test]
    fn negative_char_is_shifted() {
        assert_eq!(HostValue::Char(-56).render(), HostValue::Char(72).render());
        assert_eq!(HostValue::Char(72).render(), "H");
    }

    #[test]
    fn unrepresentable_char_is_replaced() {
        assert_eq!(HostValue::Char(-500).render(), "\u{FFFD}");
        assert_eq!(HostValue::Char(0xD800).render(), "\u{FFFD}");
        assert_eq!(HostValue::Char(0x10041).render(), "\u{FFFD}");
        assert_eq!(HostValue::Char(0x11_0000).render(), "\u{FFFD}");
        assert_eq!(HostValue::Char(0x10FFFF).render(), "\u{10FFFF}");
    }

    #[test]
    fn signed_and_bool() {
        assert_eq!(HostValue::Signed32(-7).render(), "-7");
        assert_eq!(HostValue::Bool(0).render(), "false");
        assert_eq!(HostValue::Bool(-3).render(), "true");
    }

    #[test]
    fn floats_print_like_numbers() {
        assert_eq!(HostValue::Float64(3.0).render(), "3");
        assert_eq!(HostValue::Float64(-0.0).render(), "0");
        assert_eq!(HostValue::Float64(1.5).render(), "1.5");
        assert_eq!(HostValue::Float32(0.25).render(), "0.25");
        assert_eq!(HostValue::Float64(f64::NAN).render(), "NaN");
        assert_eq!(HostValue::Float64(f64::INFINITY).render(), "Infinity");
        assert_eq!(HostValue::Float32(f32::NEG_INFINITY).render(), "-Infinity");
    }
}
