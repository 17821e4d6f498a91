use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::core::{
    DEFAULT_CONSERVATIVE_MAX, DEFAULT_MAX_SCORE, DEFAULT_MODERATE_MAX, MAX_RECOMMENDATIONS,
    RiskProfile,
};

#[derive(Parser, Debug)]
#[command(
    name = "folio-plan",
    about = "Goal SIP projections, risk profiling and fund recommendations for investor onboarding"
)]
pub struct Cli {
    #[arg(long, short, global = true, help = "Only log errors")]
    pub quiet: bool,
    #[arg(long, short, global = true, help = "Log debug detail")]
    pub verbose: bool,
    #[command(flatten)]
    pub engine: EngineArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(
        long,
        global = true,
        env = "FOLIO_RISK_CONSERVATIVE_MAX",
        default_value_t = DEFAULT_CONSERVATIVE_MAX,
        help = "Highest total risk score classified as Conservative"
    )]
    pub risk_conservative_max: u32,
    #[arg(
        long,
        global = true,
        env = "FOLIO_RISK_MODERATE_MAX",
        default_value_t = DEFAULT_MODERATE_MAX,
        help = "Highest total risk score classified as Moderate"
    )]
    pub risk_moderate_max: u32,
    #[arg(
        long,
        global = true,
        env = "FOLIO_RISK_MAX_SCORE",
        default_value_t = DEFAULT_MAX_SCORE,
        help = "Highest score the configured questionnaire can produce"
    )]
    pub risk_max_score: u32,
    #[arg(
        long,
        global = true,
        env = "FOLIO_MAX_RECOMMENDATIONS",
        default_value_t = MAX_RECOMMENDATIONS,
        help = "Number of funds returned by the recommender"
    )]
    pub max_recommendations: usize,
    #[arg(
        long,
        global = true,
        env = "FOLIO_DEFAULT_RETURN",
        default_value_t = 12.0,
        help = "Expected annual return in percent when a goal does not specify one"
    )]
    pub default_return: f64,
}

impl Default for EngineArgs {
    fn default() -> Self {
        Self {
            risk_conservative_max: DEFAULT_CONSERVATIVE_MAX,
            risk_moderate_max: DEFAULT_MODERATE_MAX,
            risk_max_score: DEFAULT_MAX_SCORE,
            max_recommendations: MAX_RECOMMENDATIONS,
            default_return: 12.0,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the JSON HTTP API
    Serve(ServeArgs),
    /// Monthly contribution and trajectory for one goal
    Sip(SipArgs),
    /// Total score and risk profile for questionnaire answers
    Risk(RiskArgs),
    /// Ranked funds for a risk profile from a JSON catalog file
    Recommend(RecommendArgs),
    /// Check that fund allocations total exactly 100%
    Allocate(AllocateArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "FOLIO_PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Args, Debug, Default)]
pub struct SipArgs {
    #[arg(long)]
    pub target_amount: f64,
    #[arg(long, help = "Goal date, YYYY-MM-DD")]
    pub target_date: Option<NaiveDate>,
    #[arg(long, help = "Months until the goal; alternative to --target-date")]
    pub months: Option<i64>,
    #[arg(long, default_value_t = 0.0)]
    pub current_savings: f64,
    #[arg(long, help = "Expected annual return in percent, e.g. 12")]
    pub expected_return: Option<f64>,
    #[arg(long, help = "Evaluation date, YYYY-MM-DD; defaults to today")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub struct RiskArgs {
    #[arg(
        long = "answer",
        value_parser = parse_answer,
        help = "Question score as QUESTION=SCORE; repeat per question"
    )]
    pub answers: Vec<(String, u32)>,
}

#[derive(Args, Debug)]
pub struct RecommendArgs {
    #[arg(long, help = "conservative, moderate or aggressive")]
    pub profile: RiskProfile,
    #[arg(long, help = "JSON file holding an array of funds")]
    pub catalog: PathBuf,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct AllocateArgs {
    #[arg(
        long = "allocation",
        value_parser = parse_allocation,
        help = "Fund share as FUND=PERCENT; repeat per fund"
    )]
    pub allocations: Vec<(String, u32)>,
}

fn parse_answer(raw: &str) -> Result<(String, u32), String> {
    parse_pair(raw, "QUESTION=SCORE")
}

fn parse_allocation(raw: &str) -> Result<(String, u32), String> {
    let (fund, percentage) = parse_pair(raw, "FUND=PERCENT")?;
    if percentage > 100 {
        return Err(format!("allocation for '{fund}' must be between 0 and 100"));
    }
    Ok((fund, percentage))
}

fn parse_pair(raw: &str, shape: &str) -> Result<(String, u32), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected {shape}, got '{raw}'"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("expected {shape}, got '{raw}'"));
    }
    let value = value
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid number in '{raw}': {e}"))?;
    Ok((key.to_string(), value))
}
