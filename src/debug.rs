use num_complex::Complex64;
use pretty_dtoa::{dtoa, FmtFloatConfig};
use std::f64::consts::PI;

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(9);

/// Formats `f` with at most nine significant digits.
pub fn format_f64(f: f64) -> String {
    dtoa(f, FLOAT_CONFIG)
}

fn format_complex(z: &Complex64) -> String {
    format!(
        "{}{}j{}",
        format_f64(z.re),
        if z.im.is_sign_negative() { "-" } else { "+" },
        format_f64(z.im.abs())
    )
}

pub fn format_rect_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_complex).collect();
    format!("[{}]", a.join(", "))
}

fn format_polar(z: &Complex64) -> String {
    format!(
        "{}\u{2220}{}\u{00B0}",
        format_f64(z.norm()),
        format_f64(z.arg() * 180.0 / PI)
    )
}

pub fn format_polar_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_polar).collect();
    format!("[{}]", a.join(", "))
}
