mod error;
mod goals;
mod recommend;
mod risk;
mod sip;
mod types;

pub use error::EngineError;
pub use goals::{GoalFailure, GoalsSummary, months_between, plan_goal, plan_goals};
pub use recommend::{
    FULL_ALLOCATION, MAX_RECOMMENDATIONS, equal_split, is_eligible, recommend, recommend_top,
    validate_allocation,
};
pub use risk::{
    Completeness, DEFAULT_CONSERVATIVE_MAX, DEFAULT_MAX_SCORE, DEFAULT_MODERATE_MAX,
    Questionnaire, RiskOption, RiskPolicy, RiskQuestion, score_risk, score_risk_with,
};
pub use sip::{
    MAX_HORIZON_MONTHS, build_trajectory, compute_sip, monthly_rate, trajectory_step,
};
pub use types::{
    Allocation, AllocationCheck, FundCategory, FundInstrument, Goal, GoalPlan, GoalType,
    RiskAssessment, RiskLevel, RiskProfile, SipPlan, TrajectoryPoint,
};
