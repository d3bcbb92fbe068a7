use std::ops::Mul;

quantity!(Rupees, f64, "₹");
quantity!(
    /// Rupees per kilowatt-hour.
    UnitRate, f64, "₹/kWh"
);

impl Rupees {
    /// Round to whole paise, half away from zero.
    pub fn round_to_paise(self) -> Self {
        Self((self.0 * 100.0).round() / 100.0)
    }
}

impl Mul<f64> for Rupees {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}
