use std::ops::Mul;

use crate::quantity::money::{Rupees, UnitRate};

quantity!(
    /// Kilowatt-hours, also the billing "unit": one unit is one kWh.
    KilowattHours, f64, "kWh"
);

impl KilowattHours {
    /// Round to the precision the meter displays.
    pub fn round_to_watt_hours(self) -> Self {
        Self((self.0 * 1000.0).round() / 1000.0)
    }
}

impl Mul<UnitRate> for KilowattHours {
    type Output = Rupees;

    fn mul(self, rhs: UnitRate) -> Self::Output {
        Rupees(self.0 * rhs.0)
    }
}
