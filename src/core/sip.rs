use tracing::debug;

use super::error::EngineError;
use super::types::{SipPlan, TrajectoryPoint};

const TRAJECTORY_SAMPLES: u32 = 12;

/// Longest supported goal horizon (100 years).
pub const MAX_HORIZON_MONTHS: i64 = 1200;

pub fn monthly_rate(annual_return_percent: f64) -> f64 {
    annual_return_percent / 100.0 / 12.0
}

pub fn compute_sip(
    target_amount: f64,
    months_remaining: i64,
    current_savings: f64,
    annual_return_percent: f64,
) -> Result<SipPlan, EngineError> {
    validate_amount(target_amount, "target amount")?;
    validate_amount(current_savings, "current savings")?;
    if !annual_return_percent.is_finite() || annual_return_percent <= -100.0 {
        return Err(EngineError::InvalidReturnRate);
    }
    if months_remaining <= 0 {
        return Err(EngineError::InvalidHorizon { months_remaining });
    }
    if months_remaining > MAX_HORIZON_MONTHS {
        return Err(EngineError::HorizonTooLong {
            months_remaining,
            max_months: MAX_HORIZON_MONTHS,
        });
    }
    let months = u32::try_from(months_remaining).map_err(|_| EngineError::InvalidHorizon {
        months_remaining,
    })?;

    let rate = monthly_rate(annual_return_percent);
    let growth = growth_factor(rate, months);
    if !growth.is_finite() {
        return Err(EngineError::ReturnOverflow {
            annual_return_percent,
            months,
        });
    }
    let future_value_of_savings = current_savings * growth;
    let remaining = target_amount - future_value_of_savings;

    let exact = if remaining <= 0.0 {
        debug!(
            target_amount,
            future_value_of_savings, "goal already funded by projected savings"
        );
        0.0
    } else {
        remaining / annuity_factor(rate, months)
    };

    Ok(SipPlan {
        months_remaining: months,
        monthly_rate: rate,
        monthly_contribution: exact.round(),
        exact_monthly_contribution: exact,
        future_value_of_savings,
        shortfall: remaining.max(0.0),
        funded_by_savings: remaining <= 0.0,
        trajectory: build_trajectory(current_savings, rate, exact, months),
    })
}

pub fn trajectory_step(months: u32) -> u32 {
    (months / TRAJECTORY_SAMPLES).max(1)
}

/// Projected balance every `trajectory_step` months plus the final month.
/// `contribution` is the unrounded monthly payment, so the last point lands on the target.
pub fn build_trajectory(
    current_savings: f64,
    rate: f64,
    contribution: f64,
    months: u32,
) -> Vec<TrajectoryPoint> {
    let step = trajectory_step(months);
    let mut points: Vec<TrajectoryPoint> = (0..=months)
        .step_by(step as usize)
        .map(|month| balance_point(current_savings, rate, contribution, month))
        .collect();
    if points.last().is_some_and(|point| point.month < months) {
        points.push(balance_point(current_savings, rate, contribution, months));
    }
    points
}

fn balance_point(
    current_savings: f64,
    rate: f64,
    contribution: f64,
    month: u32,
) -> TrajectoryPoint {
    let value =
        current_savings * growth_factor(rate, month) + contribution * annuity_factor(rate, month);
    TrajectoryPoint {
        month,
        value: value.round(),
    }
}

/// `(1 + r)^n - 1`, accurate for rates near zero.
fn growth_minus_one(rate: f64, months: u32) -> f64 {
    (f64::from(months) * rate.ln_1p()).exp_m1()
}

fn growth_factor(rate: f64, months: u32) -> f64 {
    1.0 + growth_minus_one(rate, months)
}

/// Future value of one unit paid at the end of each month: `((1 + r)^n - 1) / r`.
fn annuity_factor(rate: f64, months: u32) -> f64 {
    if rate == 0.0 {
        return f64::from(months);
    }
    let factor = growth_minus_one(rate, months) / rate;
    if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        f64::from(months)
    }
}

fn validate_amount(value: f64, field: &'static str) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidAmount { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn savings_growth_alone_funds_reference_goal() {
        let plan = compute_sip(1_000_000.0, 120, 500_000.0, 12.0).expect("valid inputs");
        assert_eq!(plan.monthly_contribution, 0.0);
        assert!(plan.funded_by_savings);
        assert_eq!(plan.shortfall, 0.0);
        assert_approx_tol(plan.future_value_of_savings, 1_650_193.45, 1.0);
    }

    #[test]
    fn annuity_contribution_matches_reference_values() {
        let cases = [
            (1_000_000.0, 120, 100_000.0, 12.0, 2_912.0),
            (5_000_000.0, 240, 0.0, 12.0, 5_054.0),
            (500_000.0, 36, 50_000.0, 8.0, 10_768.0),
            (1_000_000.0, 125, 100_000.0, 12.0, 2_646.0),
        ];
        for (target, months, savings, annual, expected) in cases {
            let plan = compute_sip(target, months, savings, annual).expect("valid inputs");
            assert_eq!(
                plan.monthly_contribution, expected,
                "target={target} months={months} savings={savings} annual={annual}"
            );
            assert!(!plan.funded_by_savings);
        }
    }

    #[test]
    fn zero_return_uses_linear_accumulation() {
        let plan = compute_sip(1_200_000.0, 60, 0.0, 0.0).expect("valid inputs");
        assert_eq!(plan.monthly_contribution, 20_000.0);
        assert_eq!(plan.monthly_rate, 0.0);
        let last = plan.trajectory.last().expect("trajectory");
        assert_eq!(last.month, 60);
        assert_approx_tol(last.value, 1_200_000.0, 1.0);
    }

    #[test]
    fn zero_return_with_savings_only_covers_the_gap() {
        let plan = compute_sip(100_000.0, 10, 40_000.0, 0.0).expect("valid inputs");
        assert_eq!(plan.monthly_contribution, 6_000.0);
        assert_eq!(plan.shortfall, 60_000.0);
    }

    #[test]
    fn non_positive_horizon_is_rejected() {
        for months in [0, -1, -24] {
            let err = compute_sip(100_000.0, months, 0.0, 12.0).expect_err("must reject");
            assert_eq!(
                err,
                EngineError::InvalidHorizon {
                    months_remaining: months
                }
            );
            assert!(err.is_invalid_horizon());
        }
    }

    #[test]
    fn invalid_amounts_and_rates_are_rejected() {
        assert_eq!(
            compute_sip(-1.0, 12, 0.0, 12.0),
            Err(EngineError::InvalidAmount {
                field: "target amount"
            })
        );
        assert_eq!(
            compute_sip(1_000.0, 12, f64::NAN, 12.0),
            Err(EngineError::InvalidAmount {
                field: "current savings"
            })
        );
        assert_eq!(
            compute_sip(1_000.0, 12, 0.0, f64::INFINITY),
            Err(EngineError::InvalidReturnRate)
        );
        assert_eq!(
            compute_sip(1_000.0, 12, 0.0, -100.0),
            Err(EngineError::InvalidReturnRate)
        );
    }

    #[test]
    fn trajectory_samples_every_step_and_ends_at_horizon() {
        let plan = compute_sip(1_000_000.0, 120, 100_000.0, 12.0).expect("valid inputs");
        let months: Vec<u32> = plan.trajectory.iter().map(|p| p.month).collect();
        assert_eq!(months, (0..=120u32).step_by(10).collect::<Vec<_>>());
        assert_eq!(plan.trajectory[0].value, 100_000.0);
        assert_eq!(plan.trajectory[1].value, 140_932.0);
        assert_eq!(plan.trajectory[12].value, 1_000_000.0);
    }

    #[test]
    fn trajectory_appends_horizon_when_step_does_not_divide_it() {
        let plan = compute_sip(1_000_000.0, 125, 100_000.0, 12.0).expect("valid inputs");
        assert_eq!(plan.trajectory.len(), 14);
        assert_eq!(plan.trajectory[12].month, 120);
        let last = plan.trajectory.last().expect("trajectory");
        assert_eq!(last.month, 125);
        assert_eq!(last.value, 1_000_000.0);
    }

    #[test]
    fn short_horizon_samples_every_month() {
        let plan = compute_sip(1_000_000.0, 5, 0.0, 12.0).expect("valid inputs");
        let months: Vec<u32> = plan.trajectory.iter().map(|p| p.month).collect();
        assert_eq!(months, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(plan.trajectory[0].value, 0.0);
    }

    #[test]
    fn funded_goal_trajectory_is_pure_compounding() {
        let plan = compute_sip(10_000.0, 24, 50_000.0, 6.0).expect("valid inputs");
        assert_eq!(plan.monthly_contribution, 0.0);
        for point in &plan.trajectory {
            let expected = (50_000.0 * (1.005f64).powi(point.month as i32)).round();
            assert_approx_tol(point.value, expected, 1.0);
        }
    }

    #[test]
    fn near_zero_rate_behaves_like_linear_accumulation() {
        let plan = compute_sip(1_000.0, 12, 0.0, 1e-15).expect("valid inputs");
        assert!(plan.exact_monthly_contribution.is_finite());
        assert_approx_tol(plan.exact_monthly_contribution, 1_000.0 / 12.0, 1e-6);
        assert_eq!(plan.monthly_contribution, 83.0);
        let last = plan.trajectory.last().expect("trajectory");
        assert_eq!(last.month, 12);
        assert_approx_tol(last.value, 1_000.0, 1.0);
    }

    #[test]
    fn horizon_beyond_supported_maximum_is_rejected() {
        for months in [MAX_HORIZON_MONTHS + 1, 600_000_000, 3_000_000_000] {
            assert_eq!(
                compute_sip(1_000_000.0, months, 0.0, 12.0),
                Err(EngineError::HorizonTooLong {
                    months_remaining: months,
                    max_months: MAX_HORIZON_MONTHS,
                })
            );
        }
    }

    #[test]
    fn longest_horizon_at_high_return_stays_finite() {
        let plan = compute_sip(1_000_000.0, MAX_HORIZON_MONTHS, 0.0, 100.0).expect("valid inputs");
        assert!(plan.exact_monthly_contribution.is_finite());
        assert!(plan.exact_monthly_contribution > 0.0);
        assert!(!plan.funded_by_savings);
        assert_eq!(plan.shortfall, 1_000_000.0);
        assert!(plan.trajectory.len() <= 14);
        let last = plan.trajectory.last().expect("trajectory");
        assert_eq!(i64::from(last.month), MAX_HORIZON_MONTHS);
        assert_approx_tol(last.value, 1_000_000.0, 1.0);
    }

    #[test]
    fn overflowing_growth_is_rejected() {
        assert_eq!(
            compute_sip(1_000_000.0, MAX_HORIZON_MONTHS, 0.0, 5_000.0),
            Err(EngineError::ReturnOverflow {
                annual_return_percent: 5_000.0,
                months: 1200,
            })
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_annuity_trajectory_reaches_target(
            target in 1_000u32..50_000_000,
            savings in 0u32..5_000_000,
            months in 1i64..480,
            annual_bp in 1u32..3000,
        ) {
            let plan = compute_sip(target as f64, months, savings as f64, annual_bp as f64 / 100.0)
                .expect("valid inputs");
            let last = plan.trajectory.last().expect("trajectory");
            prop_assert_eq!(last.month as i64, months);
            prop_assert!(last.value >= target as f64 - 1.0);
            prop_assert!(plan.monthly_contribution >= 0.0);
        }

        #[test]
        fn prop_zero_rate_is_linear_within_rounding(
            target in 1_000u32..10_000_000,
            savings in 0u32..1_000_000,
            months in 1i64..480,
        ) {
            let plan = compute_sip(target as f64, months, savings as f64, 0.0).expect("valid inputs");
            if savings >= target {
                prop_assert_eq!(plan.monthly_contribution, 0.0);
            } else {
                let reached = plan.monthly_contribution * months as f64 + savings as f64;
                prop_assert!((reached - target as f64).abs() <= 0.5 * months as f64 + 1e-6);
            }
        }

        #[test]
        fn prop_already_funded_goal_needs_no_contribution(
            savings in 1_000u32..10_000_000,
            months in 1i64..480,
            annual_bp in 0u32..3000,
            shortfall_pct in 0u32..100,
        ) {
            let target = savings as f64 * shortfall_pct as f64 / 100.0;
            let plan = compute_sip(target, months, savings as f64, annual_bp as f64 / 100.0)
                .expect("valid inputs");
            prop_assert_eq!(plan.monthly_contribution, 0.0);
            prop_assert!(plan.funded_by_savings);
        }

        #[test]
        fn prop_trajectory_is_bounded_and_starts_at_savings(
            savings in 0u32..5_000_000,
            months in 1i64..600,
        ) {
            let plan = compute_sip(10_000_000.0, months, savings as f64, 10.0).expect("valid inputs");
            prop_assert_eq!(plan.trajectory[0].month, 0);
            prop_assert_eq!(plan.trajectory[0].value, (savings as f64).round());
            prop_assert!(plan.trajectory.len() <= 25);
            let increasing = plan.trajectory.windows(2).all(|w| w[0].month < w[1].month);
            prop_assert!(increasing);
        }

        #[test]
        fn prop_tiny_rates_stay_finite_and_reach_target(
            target in 1_000u32..10_000_000,
            months in 1i64..=MAX_HORIZON_MONTHS,
            annual in 0.0f64..1e-6,
        ) {
            let plan = compute_sip(target as f64, months, 0.0, annual).expect("valid inputs");
            prop_assert!(plan.exact_monthly_contribution.is_finite());
            let linear = target as f64 / months as f64;
            prop_assert!((plan.exact_monthly_contribution - linear).abs() <= linear * 1e-5);
            let last = plan.trajectory.last().expect("trajectory");
            prop_assert!((last.value - target as f64).abs() <= 1.0);
        }
    }
}
