use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::error::EngineError;
use super::sip::compute_sip;
use super::types::{Goal, GoalPlan};

/// Whole calendar months from `from` to `to`, ignoring the day of month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year()) - i64::from(from.year());
    let months = i64::from(to.month()) - i64::from(from.month());
    years * 12 + months
}

impl Goal {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidGoal("goal name must not be empty".to_string()));
        }
        if !self.target_amount.is_finite() || self.target_amount <= 0.0 {
            return Err(EngineError::InvalidGoal(format!(
                "target amount for '{}' must be > 0",
                self.name
            )));
        }
        if !self.current_savings.is_finite() || self.current_savings < 0.0 {
            return Err(EngineError::InvalidGoal(format!(
                "current savings for '{}' must be >= 0",
                self.name
            )));
        }
        Ok(())
    }

    pub fn months_remaining(&self, as_of: NaiveDate) -> i64 {
        months_between(as_of, self.target_date)
    }
}

pub fn plan_goal(goal: &Goal, as_of: NaiveDate) -> Result<GoalPlan, EngineError> {
    goal.validate()?;
    let sip = compute_sip(
        goal.target_amount,
        goal.months_remaining(as_of),
        goal.current_savings,
        goal.expected_annual_return_percent,
    )?;
    Ok(GoalPlan {
        name: goal.name.clone(),
        goal_type: goal.goal_type,
        target_amount: goal.target_amount,
        target_date: goal.target_date,
        sip,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalsSummary {
    pub as_of: NaiveDate,
    pub plans: Vec<GoalPlan>,
    pub failures: Vec<GoalFailure>,
    pub total_monthly_contribution: f64,
}

pub fn plan_goals(goals: &[Goal], as_of: NaiveDate) -> GoalsSummary {
    let mut plans = Vec::with_capacity(goals.len());
    let mut failures = Vec::new();

    for goal in goals {
        match plan_goal(goal, as_of) {
            Ok(plan) => plans.push(plan),
            Err(err) => failures.push(GoalFailure {
                name: goal.name.clone(),
                error: err.to_string(),
            }),
        }
    }

    let total_monthly_contribution = plans.iter().map(|p| p.sip.monthly_contribution).sum();
    GoalsSummary {
        as_of,
        plans,
        failures,
        total_monthly_contribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GoalType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn sample_goal() -> Goal {
        Goal {
            name: "Child education".to_string(),
            goal_type: GoalType::ChildEducation,
            target_amount: 1_000_000.0,
            target_date: date(2036, 10, 1),
            current_savings: 100_000.0,
            expected_annual_return_percent: 12.0,
        }
    }

    #[test]
    fn months_between_ignores_day_of_month() {
        assert_eq!(months_between(date(2026, 10, 18), date(2036, 10, 1)), 120);
        assert_eq!(months_between(date(2026, 10, 1), date(2026, 11, 30)), 1);
        assert_eq!(months_between(date(2026, 10, 31), date(2026, 10, 1)), 0);
        assert_eq!(months_between(date(2026, 10, 18), date(2025, 12, 1)), -10);
    }

    #[test]
    fn plan_goal_uses_calendar_months() {
        let plan = plan_goal(&sample_goal(), date(2026, 10, 18)).expect("plannable goal");
        assert_eq!(plan.sip.months_remaining, 120);
        assert_eq!(plan.sip.monthly_contribution, 2_912.0);
        assert_eq!(plan.goal_type, GoalType::ChildEducation);
    }

    #[test]
    fn plan_goal_in_current_month_is_invalid_horizon() {
        let mut goal = sample_goal();
        goal.target_date = date(2026, 10, 30);
        let err = plan_goal(&goal, date(2026, 10, 18)).expect_err("same month");
        assert!(err.is_invalid_horizon());
    }

    #[test]
    fn validate_rejects_blank_name_and_non_positive_target() {
        let mut goal = sample_goal();
        goal.name = "  ".to_string();
        assert!(matches!(goal.validate(), Err(EngineError::InvalidGoal(_))));

        let mut goal = sample_goal();
        goal.target_amount = 0.0;
        let err = goal.validate().expect_err("zero target");
        assert!(err.to_string().contains("target amount"));

        let mut goal = sample_goal();
        goal.current_savings = -5.0;
        assert!(goal.validate().is_err());
    }

    #[test]
    fn plan_goals_collects_failures_and_sums_contributions() {
        let mut expired = sample_goal();
        expired.name = "Old wedding".to_string();
        expired.goal_type = GoalType::Wedding;
        expired.target_date = date(2024, 1, 1);

        let mut house = sample_goal();
        house.name = "House".to_string();
        house.goal_type = GoalType::House;
        house.target_amount = 1_200_000.0;
        house.target_date = date(2031, 10, 1);
        house.current_savings = 0.0;
        house.expected_annual_return_percent = 0.0;

        let summary = plan_goals(&[sample_goal(), expired, house], date(2026, 10, 18));
        assert_eq!(summary.plans.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "Old wedding");
        assert!(summary.failures[0].error.contains("future"));
        assert_eq!(summary.total_monthly_contribution, 2_912.0 + 20_000.0);
    }
}
