//! Presentation rounding.

/// Rounds a monetary amount to cents, half away from zero.
///
/// Only used when figures leave the engine (payslip summary, exports);
/// every internal sum keeps full precision.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round_cents;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_cents(115.117_553), 115.12);
        assert_eq!(round_cents(0.125), 0.13);
        assert_eq!(round_cents(-0.125), -0.13);
        assert_eq!(round_cents(1818.37), 1818.37);
    }
}
