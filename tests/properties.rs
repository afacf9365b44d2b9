//! Property tests for the profit and allocation arithmetic

use proptest::prelude::*;
use regional_devsim::accounts::{AccountDefinition, Coffer};
use regional_devsim::allocation::{
    prefix_within_budget, CapacityPlacement, CarryOver, DemandTargets, SubsidizedResidentialAllocator,
};
use regional_devsim::core::types::{Form, ParcelId};
use regional_devsim::core::AllocationSettings;
use regional_devsim::feasibility::{FeasibilityRecord, FeasibilityTable, ParcelTable};
use regional_devsim::policy::apply_pct;

proptest! {
    #[test]
    fn pct_adjustment_keeps_sign(profit in -1e9_f64..1e9, pct in -0.99_f64..0.99) {
        let adjusted = apply_pct(profit, pct);
        if profit > 0.0 {
            prop_assert!(adjusted > 0.0);
        } else if profit < 0.0 {
            prop_assert!(adjusted < 0.0);
        }
        // Positive pct always helps, negative always hurts
        if pct >= 0.0 {
            prop_assert!(adjusted >= profit);
        } else {
            prop_assert!(adjusted <= profit);
        }
    }

    #[test]
    fn prefix_never_exceeds_budget(
        costs in prop::collection::vec(0.0_f64..1e6, 0..40),
        budget in -1e5_f64..1e7,
    ) {
        let taken = prefix_within_budget(&costs, budget);
        let spent: f64 = costs[..taken].iter().sum();
        prop_assert!(taken <= costs.len());
        if taken > 0 {
            prop_assert!(spent <= budget);
        }
        if taken < costs.len() && budget > 0.0 {
            prop_assert!(spent + costs[taken] > budget);
        }
    }

    #[test]
    fn carry_over_conserves_fractional_units(
        grants in prop::collection::vec((1.0_f64..2e6, 50_000.0_f64..900_000.0), 1..30),
    ) {
        let mut carry = CarryOver::new();
        let mut minted = 0_u64;
        let mut raw = 0.0;
        for (subsidy, rpu) in &grants {
            minted += carry.mint(*subsidy, *rpu) as u64;
            raw += subsidy / rpu;
        }
        prop_assert!(minted as f64 <= raw + 1e-6);
        prop_assert!(raw - (minted as f64) < 1.0 + 1e-6);
        prop_assert!(carry.remainder() >= 0.0 && carry.remainder() < 1.0);
    }

    #[test]
    fn allocator_stays_within_budget(
        projects in prop::collection::vec((1_000.0_f64..400_000.0, 1_u32..6, 0_u32..2), 1..25),
        budget in 0.0_f64..1_500_000.0,
    ) {
        let table: FeasibilityTable = projects
            .iter()
            .enumerate()
            .map(|(i, (loss, units, existing))| {
                FeasibilityRecord::new(ParcelId(i as u64 + 1), Form::Residential, -loss)
                    .with_residential(*units as f64 * 900.0, 900.0)
                    .with_finances(*units as f64 * 500_000.0, *units as f64 * 450_000.0)
                    .with_existing_units(*existing)
            })
            .collect();
        let mut coffer = Coffer::from_definitions(&[AccountDefinition::new("housing", budget)], 2025).unwrap();
        let mut placement = CapacityPlacement::new(DemandTargets {
            residential_units: 1_000,
            ..Default::default()
        });
        let allocator = SubsidizedResidentialAllocator::new("housing", AllocationSettings::default());

        let outcome = allocator
            .allocate(&table, &ParcelTable::new(), &mut coffer, &mut placement, 2025)
            .unwrap();

        let spent: f64 = outcome.buildings.iter().map(|b| b.subsidy_amount).sum();
        prop_assert!(spent <= budget + 1e-6);
        prop_assert!(coffer.require("housing").unwrap().total_balance() >= -1e-6);
        for building in &outcome.buildings {
            prop_assert!(building.residential_units > building.total_residential_units);
            prop_assert!(building.deed_restricted_units <= building.residential_units);
        }
    }
}
