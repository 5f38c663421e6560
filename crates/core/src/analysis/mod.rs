pub mod aspects;
pub mod holdings;
pub mod theme;

/// Rounds half away from zero to `places` decimals.
pub(crate) fn round_dp(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::round_dp;

    #[test]
    fn rounds_to_requested_places() {
        assert_eq!(round_dp(33.33333, 2), 33.33);
        assert_eq!(round_dp(66.666666, 2), 66.67);
        assert_eq!(round_dp(0.12345, 3), 0.123);
        assert_eq!(round_dp(-0.756, 1), -0.8);
    }
}
