use bon::Builder;
use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    quantity::{
        energy::KilowattHours,
        money::{Rupees, UnitRate},
        ratios::Percentage,
    },
};

/// One tier of the unit-rate schedule.
///
/// Slabs are reference data: ordered by `min_units` ascending and
/// non-overlapping by construction. The calculator sorts defensively but does
/// not validate overlap.
#[derive(Builder, Clone, Debug, Deserialize, Serialize)]
#[must_use]
pub struct TariffSlab {
    /// Inclusive lower bound, in units.
    pub min_units: KilowattHours,

    /// Inclusive upper bound; `None` marks the unbounded top slab.
    pub max_units: Option<KilowattHours>,

    pub rate_per_unit: UnitRate,

    /// Flat charge applied once total usage reaches this slab.
    #[builder(default)]
    #[serde(default)]
    pub fixed_charge: Rupees,

    /// Share of this slab's cost that is waived.
    #[builder(default)]
    #[serde(default)]
    pub subsidy_percentage: Percentage,

    #[builder(default = true)]
    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
}

const fn default_active() -> bool {
    true
}

impl TariffSlab {
    /// Units this slab can absorb.
    ///
    /// Consecutive slabs are published as `0–100, 101–200, …`, so a bounded
    /// slab covers the stretch from just above the previous boundary up to
    /// its own: `max − (min − 1)` units, with the zero-based first slab
    /// covering `max` units. `None` for the unbounded top slab.
    fn capacity(&self) -> Option<KilowattHours> {
        self.max_units
            .map(|max_units| KilowattHours(max_units.0 - (self.min_units.0 - 1.0).max(0.0)))
    }

    pub fn label(&self) -> String {
        match self.max_units {
            Some(max_units) => format!("{} – {} units", self.min_units.0, max_units.0),
            None => format!("{} – ∞ units", self.min_units.0),
        }
    }

    fn labelled_rate(&self) -> String {
        format!("{} @ {}", self.label(), self.rate_per_unit)
    }
}

/// One row of slab-attributed cost.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BillEntry {
    pub slab: String,
    pub units: KilowattHours,
    pub rate: UnitRate,
    pub gross_cost: Rupees,
    pub subsidy: Rupees,
    pub net_cost: Rupees,
}

/// Usage is approaching the next, more expensive slab.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct NextSlabWarning {
    pub units_to_next_slab: KilowattHours,
    pub next_slab_rate: UnitRate,
    pub current_rate: UnitRate,
}

/// Degraded-mode marker: the projection is still a valid zero result, but the
/// caller should surface the reason instead of the numbers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    /// No active tariff slabs were supplied (upstream misconfiguration).
    NoTariffData,

    /// The unit count was not a finite non-negative number; coerced to zero.
    MalformedUnits,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[must_use]
pub struct BillProjection {
    pub total_units: KilowattHours,

    /// Sum of all net slab costs plus the applicable fixed charge, rounded
    /// to whole paise. Intermediate slab values keep full precision.
    pub total_bill: Rupees,

    pub fixed_charge: Rupees,
    pub total_subsidy: Rupees,
    pub breakdown: Vec<BillEntry>,

    /// Human-readable label of the slab the usage currently falls into.
    pub slab: String,

    pub warning: Option<NextSlabWarning>,
    pub diagnostic: Option<Diagnostic>,
}

impl BillProjection {
    fn degraded(total_units: KilowattHours, diagnostic: Diagnostic) -> Self {
        Self {
            total_units,
            total_bill: Rupees::zero(),
            fixed_charge: Rupees::zero(),
            total_subsidy: Rupees::zero(),
            breakdown: Vec::new(),
            slab: "no tariff data".to_string(),
            warning: None,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Convert a total energy quantity into a monetary bill using ordered,
/// non-overlapping slabs.
///
/// Billing is advisory, not an invoice: malformed input degrades to a zero
/// result with a [`Diagnostic`] instead of failing.
pub fn compute_bill(total_units: KilowattHours, slabs: &[TariffSlab]) -> BillProjection {
    let (total_units, diagnostic) = sanitize_units(total_units);

    let slabs = slabs
        .iter()
        .filter(|slab| slab.active)
        .sorted_by_key(|slab| slab.min_units)
        .collect_vec();
    let Some(first_slab) = slabs.first() else {
        warn!("no active tariff slabs, returning an empty projection");
        return BillProjection::degraded(total_units, Diagnostic::NoTariffData);
    };

    let mut remaining_units = total_units;
    let mut total_cost = Rupees::zero();
    let mut total_subsidy = Rupees::zero();
    let mut breakdown = Vec::new();

    for slab in &slabs {
        if remaining_units <= KilowattHours::zero() {
            break;
        }
        if total_units < slab.min_units {
            continue;
        }
        let units_in_slab = match slab.capacity() {
            Some(capacity) => remaining_units.min(capacity),
            None => remaining_units,
        };
        if units_in_slab <= KilowattHours::zero() {
            continue;
        }
        let gross_cost = units_in_slab * slab.rate_per_unit;
        let subsidy = gross_cost * slab.subsidy_percentage.to_ratio().clamp(0.0, 1.0);
        let net_cost = gross_cost - subsidy;
        breakdown.push(BillEntry {
            slab: slab.label(),
            units: units_in_slab,
            rate: slab.rate_per_unit,
            gross_cost,
            subsidy,
            net_cost,
        });
        total_cost += net_cost;
        total_subsidy += subsidy;
        remaining_units -= units_in_slab;
    }

    // The fixed charge of the highest slab reached, not a sum across slabs.
    let fixed_charge = slabs
        .iter()
        .filter(|slab| total_units >= slab.min_units)
        .map(|slab| slab.fixed_charge)
        .max()
        .unwrap_or_else(Rupees::zero);

    let warning = slabs
        .iter()
        .position(|slab| total_units < slab.min_units)
        .map(|index| NextSlabWarning {
            units_to_next_slab: slabs[index].min_units - total_units,
            next_slab_rate: slabs[index].rate_per_unit,
            current_rate: if index > 0 {
                slabs[index - 1].rate_per_unit
            } else {
                first_slab.rate_per_unit
            },
        });

    let current_slab =
        slabs.iter().rev().find(|slab| total_units >= slab.min_units).unwrap_or(first_slab);

    BillProjection {
        total_units,
        total_bill: (total_cost + fixed_charge).round_to_paise(),
        fixed_charge,
        total_subsidy: total_subsidy.round_to_paise(),
        breakdown,
        slab: current_slab.labelled_rate(),
        warning,
        diagnostic,
    }
}

fn sanitize_units(total_units: KilowattHours) -> (KilowattHours, Option<Diagnostic>) {
    if total_units.0.is_finite() && total_units.0 >= 0.0 {
        (total_units, None)
    } else {
        warn!(units = total_units.0, "malformed unit count, treating as zero");
        (KilowattHours::zero(), Some(Diagnostic::MalformedUnits))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    /// A schedule whose first slab is fully subsidised, with a mid slab
    /// and an unbounded top slab.
    fn subsidised_slabs() -> Vec<TariffSlab> {
        vec![
            TariffSlab::builder()
                .min_units(KilowattHours(0.0))
                .max_units(KilowattHours(100.0))
                .rate_per_unit(UnitRate(0.0))
                .subsidy_percentage(Percentage(100.0))
                .build(),
            TariffSlab::builder()
                .min_units(KilowattHours(101.0))
                .max_units(KilowattHours(200.0))
                .rate_per_unit(UnitRate(2.25))
                .build(),
            TariffSlab::builder()
                .min_units(KilowattHours(201.0))
                .rate_per_unit(UnitRate(4.5))
                .build(),
        ]
    }

    /// The TNEB-style production schedule.
    fn seed_slabs() -> Vec<TariffSlab> {
        let slab = |min: f64, max: Option<f64>, rate: f64, fixed: f64, subsidy: f64| {
            TariffSlab::builder()
                .min_units(KilowattHours(min))
                .maybe_max_units(max.map(KilowattHours))
                .rate_per_unit(UnitRate(rate))
                .fixed_charge(Rupees(fixed))
                .subsidy_percentage(Percentage(subsidy))
                .build()
        };
        vec![
            slab(0.0, Some(100.0), 2.5, 20.0, 50.0),
            slab(101.0, Some(200.0), 3.0, 30.0, 25.0),
            slab(201.0, Some(400.0), 4.5, 50.0, 0.0),
            slab(401.0, Some(500.0), 6.0, 75.0, 0.0),
            slab(501.0, Some(800.0), 7.5, 100.0, 0.0),
            slab(801.0, None, 9.0, 150.0, 0.0),
        ]
    }

    #[test]
    fn test_mid_slab_usage() {
        let projection = compute_bill(KilowattHours(150.0), &subsidised_slabs());

        assert_eq!(projection.breakdown.len(), 2);
        assert_abs_diff_eq!(projection.breakdown[0].units.0, 100.0);
        assert_abs_diff_eq!(projection.breakdown[0].net_cost.0, 0.0);
        assert_abs_diff_eq!(projection.breakdown[1].units.0, 50.0);
        assert_abs_diff_eq!(projection.breakdown[1].gross_cost.0, 112.5);
        assert_abs_diff_eq!(projection.breakdown[1].subsidy.0, 0.0);
        assert_abs_diff_eq!(projection.total_bill.0, 112.5);

        let warning = projection.warning.unwrap();
        assert_abs_diff_eq!(warning.units_to_next_slab.0, 51.0);
        assert_abs_diff_eq!(warning.next_slab_rate.0, 4.5);
        assert_abs_diff_eq!(warning.current_rate.0, 2.25);

        assert_eq!(projection.slab, "101 – 200 units @ 2.25 ₹/kWh");
        assert_eq!(projection.diagnostic, None);
    }

    #[test]
    fn test_empty_slabs_degrade_to_no_tariff_data() {
        let projection = compute_bill(KilowattHours(50.0), &[]);
        assert_eq!(projection.total_bill, Rupees::zero());
        assert!(projection.breakdown.is_empty());
        assert_eq!(projection.diagnostic, Some(Diagnostic::NoTariffData));
    }

    #[test]
    fn test_malformed_units_are_coerced_to_zero() {
        let projection = compute_bill(KilowattHours(-5.0), &subsidised_slabs());
        assert_eq!(projection.total_units, KilowattHours::zero());
        assert_eq!(projection.total_bill, Rupees::zero());
        assert_eq!(projection.diagnostic, Some(Diagnostic::MalformedUnits));

        let projection = compute_bill(KilowattHours(f64::NAN), &subsidised_slabs());
        assert_eq!(projection.total_units, KilowattHours::zero());
        assert_eq!(projection.diagnostic, Some(Diagnostic::MalformedUnits));
    }

    #[test]
    fn test_breakdown_covers_all_units() {
        // Fractions sit inside a slab: the published schedule quantizes its
        // boundaries at whole units, so values strictly between two slabs
        // (say 200.5) belong to neither.
        for units in [0.5, 99.0, 100.0, 101.0, 150.0, 150.5, 250.0, 1000.0] {
            let projection = compute_bill(KilowattHours(units), &subsidised_slabs());
            let covered: KilowattHours =
                projection.breakdown.iter().map(|entry| entry.units).sum();
            assert_abs_diff_eq!(covered.0, units, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_subsidy_stays_within_gross_cost() {
        for units in [50.0, 150.0, 450.0, 900.0] {
            let projection = compute_bill(KilowattHours(units), &seed_slabs());
            for entry in &projection.breakdown {
                assert!(entry.subsidy >= Rupees::zero());
                assert!(entry.subsidy <= entry.gross_cost);
            }
        }
    }

    #[test]
    fn test_pure_function() {
        let first = compute_bill(KilowattHours(345.6), &seed_slabs());
        let second = compute_bill(KilowattHours(345.6), &seed_slabs());
        assert_eq!(first, second);
    }

    #[test]
    fn test_seed_tariff_at_150_units() {
        let projection = compute_bill(KilowattHours(150.0), &seed_slabs());

        // 100 × 2.50 = 250 gross, 125 subsidised; 50 × 3.00 = 150 gross,
        // 37.50 subsidised; fixed charge of the highest reached slab is 30.
        assert_abs_diff_eq!(projection.breakdown[0].net_cost.0, 125.0);
        assert_abs_diff_eq!(projection.breakdown[1].net_cost.0, 112.5);
        assert_abs_diff_eq!(projection.fixed_charge.0, 30.0);
        assert_abs_diff_eq!(projection.total_bill.0, 267.5);
        assert_abs_diff_eq!(projection.total_subsidy.0, 162.5);
    }

    #[test]
    fn test_top_slab_has_no_warning() {
        let projection = compute_bill(KilowattHours(900.0), &seed_slabs());
        assert_eq!(projection.warning, None);
        assert_eq!(projection.slab, "801 – ∞ units @ 9 ₹/kWh");
    }

    #[test]
    fn test_below_all_slabs_warns_with_first_rate() {
        let slabs = vec![
            TariffSlab::builder()
                .min_units(KilowattHours(50.0))
                .max_units(KilowattHours(100.0))
                .rate_per_unit(UnitRate(1.0))
                .build(),
            TariffSlab::builder().min_units(KilowattHours(101.0)).rate_per_unit(UnitRate(2.0)).build(),
        ];
        let projection = compute_bill(KilowattHours(10.0), &slabs);
        let warning = projection.warning.unwrap();
        assert_abs_diff_eq!(warning.units_to_next_slab.0, 40.0);
        assert_abs_diff_eq!(warning.current_rate.0, 1.0);
        // Nothing consumed in any reached slab.
        assert!(projection.breakdown.is_empty());
    }

    #[test]
    fn test_inactive_slabs_are_ignored() {
        let mut slabs = subsidised_slabs();
        slabs[1].active = false;
        let projection = compute_bill(KilowattHours(150.0), &slabs);
        // The 101–200 slab is gone, leaving a gap below 201: only the first
        // slab absorbs units, and the warning now points at the top slab.
        assert_eq!(projection.breakdown.len(), 1);
        assert_abs_diff_eq!(projection.breakdown[0].units.0, 100.0);
        assert_abs_diff_eq!(projection.warning.unwrap().units_to_next_slab.0, 51.0);
    }

    #[test]
    fn test_fixed_charge_is_max_not_sum() {
        let projection = compute_bill(KilowattHours(450.0), &seed_slabs());
        assert_abs_diff_eq!(projection.fixed_charge.0, 75.0);
    }
}
