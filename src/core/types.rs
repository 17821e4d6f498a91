use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Retirement,
    #[serde(alias = "childEducation", alias = "education")]
    ChildEducation,
    House,
    Wedding,
    Emergency,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub name: String,
    pub goal_type: GoalType,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    #[serde(default)]
    pub current_savings: f64,
    pub expected_annual_return_percent: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskProfile {
    #[serde(alias = "conservative")]
    Conservative,
    #[serde(alias = "moderate")]
    Moderate,
    #[serde(alias = "aggressive")]
    Aggressive,
}

impl RiskProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskProfile::Conservative => "Conservative",
            RiskProfile::Moderate => "Moderate",
            RiskProfile::Aggressive => "Aggressive",
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskProfile::Conservative),
            "moderate" => Ok(RiskProfile::Moderate),
            "aggressive" => Ok(RiskProfile::Aggressive),
            other => Err(format!(
                "unknown risk profile '{other}' (expected conservative, moderate or aggressive)"
            )),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[serde(alias = "medium")]
    Moderate,
    High,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundCategory {
    Debt,
    Hybrid,
    Equity,
    Elss,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundInstrument {
    pub id: String,
    #[serde(default)]
    pub scheme_name: String,
    pub risk_level: RiskLevel,
    pub category: FundCategory,
    #[serde(alias = "expectedReturn")]
    pub expected_return_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub fund_id: String,
    #[serde(alias = "allocationPercentage")]
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub month: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipPlan {
    pub months_remaining: u32,
    pub monthly_rate: f64,
    pub monthly_contribution: f64,
    pub exact_monthly_contribution: f64,
    pub future_value_of_savings: f64,
    pub shortfall: f64,
    pub funded_by_savings: bool,
    pub trajectory: Vec<TrajectoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPlan {
    pub name: String,
    pub goal_type: GoalType,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    pub sip: SipPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub total_score: u32,
    pub max_score: u32,
    pub profile: RiskProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationCheck {
    pub valid: bool,
    pub total: u64,
    pub remaining: i64,
}
