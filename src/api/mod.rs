use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    Allocation, AllocationCheck, Completeness, EngineError, FundInstrument, Goal, GoalType,
    GoalsSummary, MAX_HORIZON_MONTHS, Questionnaire, RiskAssessment, RiskPolicy, RiskProfile,
    SipPlan, compute_sip, equal_split, months_between, plan_goals, recommend_top,
    score_risk_with, validate_allocation,
};

pub mod cli;

use cli::{AllocateArgs, Command, EngineArgs, RecommendArgs, RiskArgs, SipArgs};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub risk_policy: RiskPolicy,
    pub max_recommendations: usize,
    pub default_return_percent: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        build_config(&EngineArgs::default()).unwrap_or(Self {
            risk_policy: RiskPolicy::default(),
            max_recommendations: crate::core::MAX_RECOMMENDATIONS,
            default_return_percent: 12.0,
        })
    }
}

pub fn build_config(args: &EngineArgs) -> Result<EngineConfig, String> {
    if args.risk_moderate_max <= args.risk_conservative_max {
        return Err("--risk-moderate-max must be > --risk-conservative-max".to_string());
    }

    if args.risk_max_score <= args.risk_moderate_max {
        return Err("--risk-max-score must be > --risk-moderate-max".to_string());
    }

    if args.max_recommendations == 0 {
        return Err("--max-recommendations must be > 0".to_string());
    }

    if !(0.0..=100.0).contains(&args.default_return) {
        return Err("--default-return must be between 0 and 100".to_string());
    }

    let risk_policy = RiskPolicy::new(
        args.risk_conservative_max,
        args.risk_moderate_max,
        args.risk_max_score,
    )
    .map_err(|e| e.to_string())?;

    Ok(EngineConfig {
        risk_policy,
        max_recommendations: args.max_recommendations,
        default_return_percent: args.default_return,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SipPayload {
    target_amount: Option<f64>,
    current_savings: Option<f64>,
    #[serde(alias = "expectedReturnRate", alias = "expectedAnnualReturnPercent")]
    expected_return: Option<f64>,
    target_date: Option<NaiveDate>,
    months_remaining: Option<i64>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalPayload {
    #[serde(alias = "goalName")]
    name: String,
    goal_type: Option<GoalType>,
    target_amount: f64,
    target_date: NaiveDate,
    #[serde(default)]
    current_savings: f64,
    #[serde(alias = "expectedReturnRate", alias = "expectedAnnualReturnPercent")]
    expected_return: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GoalsPayload {
    goals: Vec<GoalPayload>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RiskPayload {
    answers: Option<BTreeMap<String, u32>>,
    questionnaire: Option<Questionnaire>,
    responses: Option<BTreeMap<String, String>>,
    rescale_thresholds: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RecommendPayload {
    risk_profile: Option<String>,
    catalog: Vec<FundInstrument>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AllocationPayload {
    allocations: Vec<Allocation>,
}

#[derive(Debug, Clone, PartialEq)]
struct SipRequest {
    target_amount: f64,
    current_savings: f64,
    expected_return: f64,
    target_date: Option<NaiveDate>,
    months_remaining: i64,
    as_of: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SipResponse {
    as_of: NaiveDate,
    target_date: Option<NaiveDate>,
    target_amount: f64,
    current_savings: f64,
    expected_return: f64,
    #[serde(flatten)]
    plan: SipPlan,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RiskResponse {
    total_score: u32,
    max_score: u32,
    profile: RiskProfile,
    conservative_max: u32,
    moderate_max: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    completeness: Option<Completeness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    questionnaire_max_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendResponse {
    risk_profile: RiskProfile,
    funds: Vec<FundInstrument>,
    suggested_allocation: Vec<Allocation>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

enum ApiError {
    BadRequest(String),
    Unprocessable(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        if err.is_invalid_horizon() {
            ApiError::Unprocessable(err.to_string())
        } else {
            ApiError::BadRequest(err.to_string())
        }
    }
}

impl ApiError {
    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Unprocessable(msg) => msg,
        }
    }

    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
            ApiError::Unprocessable(msg) => {
                error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg)
            }
        }
    }
}

pub fn router(config: EngineConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sip", get(sip_get_handler).post(sip_post_handler))
        .route("/api/goals/plan", post(goals_handler))
        .route("/api/risk/score", post(risk_handler))
        .route("/api/recommendations", post(recommend_handler))
        .route("/api/allocations/validate", post(allocation_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(config))
}

pub async fn run_http_server(port: u16, config: EngineConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(config);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "folio-plan HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, app).await
}

/// Runs a one-shot CLI command and returns its pretty-printed JSON result.
pub fn run_command(command: Command, config: &EngineConfig) -> Result<String, String> {
    let body = match command {
        Command::Serve(_) => {
            return Err("serve runs the HTTP API; it has no one-shot output".to_string());
        }
        Command::Sip(args) => to_pretty_json(&sip_from_args(args, config, today())?)?,
        Command::Risk(args) => to_pretty_json(&risk_from_args(args, config))?,
        Command::Recommend(args) => to_pretty_json(&recommend_from_args(args, config)?)?,
        Command::Allocate(args) => to_pretty_json(&allocation_from_args(args))?,
    };
    Ok(body)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to encode JSON output: {e}"))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn sip_get_handler(
    State(config): State<Arc<EngineConfig>>,
    Query(payload): Query<SipPayload>,
) -> Response {
    sip_handler_impl(&config, payload)
}

async fn sip_post_handler(
    State(config): State<Arc<EngineConfig>>,
    Json(payload): Json<SipPayload>,
) -> Response {
    sip_handler_impl(&config, payload)
}

fn sip_handler_impl(config: &EngineConfig, payload: SipPayload) -> Response {
    let result = sip_request_from_payload(payload, config, today())
        .map_err(ApiError::BadRequest)
        .and_then(|request| run_sip(&request).map_err(ApiError::from));
    match result {
        Ok(response) => {
            info!(
                months = response.plan.months_remaining,
                monthly_contribution = response.plan.monthly_contribution,
                "computed SIP plan"
            );
            json_response(StatusCode::OK, response)
        }
        Err(err) => {
            warn!(error = err.message(), "rejected SIP request");
            err.into_response()
        }
    }
}

async fn goals_handler(
    State(config): State<Arc<EngineConfig>>,
    Json(payload): Json<GoalsPayload>,
) -> Response {
    let summary = goals_summary_from_payload(payload, &config, today());
    info!(
        planned = summary.plans.len(),
        failed = summary.failures.len(),
        total = summary.total_monthly_contribution,
        "planned goals"
    );
    json_response(StatusCode::OK, summary)
}

async fn risk_handler(
    State(config): State<Arc<EngineConfig>>,
    Json(payload): Json<RiskPayload>,
) -> Response {
    match risk_from_payload(payload, &config) {
        Ok(response) => {
            info!(
                total_score = response.total_score,
                profile = %response.profile,
                "scored risk answers"
            );
            json_response(StatusCode::OK, response)
        }
        Err(err) => {
            warn!(error = err.message(), "rejected risk scoring request");
            err.into_response()
        }
    }
}

async fn recommend_handler(
    State(config): State<Arc<EngineConfig>>,
    Json(payload): Json<RecommendPayload>,
) -> Response {
    match recommend_from_payload(payload, &config) {
        Ok(response) => {
            if response.funds.is_empty() {
                warn!(profile = %response.risk_profile, "empty fund catalog, nothing to recommend");
            }
            json_response(StatusCode::OK, response)
        }
        Err(msg) => {
            warn!(error = %msg, "rejected recommendation request");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

async fn allocation_handler(Json(payload): Json<AllocationPayload>) -> Response {
    let check = validate_allocation(&payload.allocations);
    debug!(total = check.total, valid = check.valid, "validated allocation");
    json_response(StatusCode::OK, check)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn sip_request_from_json(
    json: &str,
    config: &EngineConfig,
    today: NaiveDate,
) -> Result<SipRequest, String> {
    let payload = serde_json::from_str::<SipPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    sip_request_from_payload(payload, config, today)
}

fn sip_request_from_payload(
    payload: SipPayload,
    config: &EngineConfig,
    today: NaiveDate,
) -> Result<SipRequest, String> {
    let Some(target_amount) = payload.target_amount else {
        return Err("targetAmount is required".to_string());
    };
    if !target_amount.is_finite() || target_amount <= 0.0 {
        return Err("targetAmount must be > 0".to_string());
    }

    let current_savings = payload.current_savings.unwrap_or(0.0);
    if !current_savings.is_finite() || current_savings < 0.0 {
        return Err("currentSavings must be >= 0".to_string());
    }

    let expected_return = payload
        .expected_return
        .unwrap_or(config.default_return_percent);
    if !(0.0..=100.0).contains(&expected_return) {
        return Err("expectedReturn must be between 0 and 100".to_string());
    }

    let as_of = payload.as_of.unwrap_or(today);
    let months_remaining = match (payload.target_date, payload.months_remaining) {
        (Some(_), Some(_)) => {
            return Err("provide either targetDate or monthsRemaining, not both".to_string());
        }
        (Some(date), None) => months_between(as_of, date),
        (None, Some(months)) => months,
        (None, None) => return Err("targetDate or monthsRemaining is required".to_string()),
    };
    if months_remaining > MAX_HORIZON_MONTHS {
        return Err(format!(
            "goal horizon must be at most {MAX_HORIZON_MONTHS} months, got {months_remaining}"
        ));
    }

    Ok(SipRequest {
        target_amount,
        current_savings,
        expected_return,
        target_date: payload.target_date,
        months_remaining,
        as_of,
    })
}

fn run_sip(request: &SipRequest) -> Result<SipResponse, EngineError> {
    let plan = compute_sip(
        request.target_amount,
        request.months_remaining,
        request.current_savings,
        request.expected_return,
    )?;
    Ok(SipResponse {
        as_of: request.as_of,
        target_date: request.target_date,
        target_amount: request.target_amount,
        current_savings: request.current_savings,
        expected_return: request.expected_return,
        plan,
    })
}

fn sip_from_args(
    args: SipArgs,
    config: &EngineConfig,
    today: NaiveDate,
) -> Result<SipResponse, String> {
    let payload = SipPayload {
        target_amount: Some(args.target_amount),
        current_savings: Some(args.current_savings),
        expected_return: args.expected_return,
        target_date: args.target_date,
        months_remaining: args.months,
        as_of: args.as_of,
    };
    let request = sip_request_from_payload(payload, config, today)?;
    run_sip(&request).map_err(|e| e.to_string())
}

fn goals_summary_from_payload(
    payload: GoalsPayload,
    config: &EngineConfig,
    today: NaiveDate,
) -> GoalsSummary {
    let goals: Vec<Goal> = payload
        .goals
        .into_iter()
        .map(|goal| Goal {
            name: goal.name,
            goal_type: goal.goal_type.unwrap_or(GoalType::Other),
            target_amount: goal.target_amount,
            target_date: goal.target_date,
            current_savings: goal.current_savings,
            expected_annual_return_percent: goal
                .expected_return
                .unwrap_or(config.default_return_percent),
        })
        .collect();
    plan_goals(&goals, payload.as_of.unwrap_or(today))
}

fn risk_from_payload(
    payload: RiskPayload,
    config: &EngineConfig,
) -> Result<RiskResponse, ApiError> {
    match (payload.answers, payload.questionnaire, payload.responses) {
        (Some(answers), None, None) => {
            let assessment = score_risk_with(&answers, &config.risk_policy);
            Ok(risk_response(assessment, &config.risk_policy, None))
        }
        (None, Some(questionnaire), Some(responses)) => {
            let questionnaire_max = questionnaire.max_score();
            let policy = if payload.rescale_thresholds {
                config.risk_policy.rescaled(questionnaire_max)
            } else {
                config.risk_policy
            };
            let assessment = questionnaire.score_with(&responses, &policy)?;
            let completeness = questionnaire.completeness(&responses);
            let mut response = risk_response(assessment, &policy, Some(completeness));
            response.questionnaire_max_score = Some(questionnaire_max);
            if questionnaire_max != policy.max_score() {
                warn!(
                    questionnaire_max,
                    policy_max = policy.max_score(),
                    "questionnaire maximum differs from risk policy maximum"
                );
                response.warning = Some(format!(
                    "questionnaire maximum score {questionnaire_max} differs from the risk policy \
                     maximum {}; thresholds {}/{} were applied unchanged",
                    policy.max_score(),
                    policy.conservative_max(),
                    policy.moderate_max()
                ));
            }
            Ok(response)
        }
        (None, Some(_), None) => Err(ApiError::BadRequest(
            "responses are required with a questionnaire".to_string(),
        )),
        (None, None, _) => Err(ApiError::BadRequest(
            "answers or questionnaire with responses is required".to_string(),
        )),
        (Some(_), _, _) => Err(ApiError::BadRequest(
            "provide either answers or questionnaire responses, not both".to_string(),
        )),
    }
}

fn risk_response(
    assessment: RiskAssessment,
    policy: &RiskPolicy,
    completeness: Option<Completeness>,
) -> RiskResponse {
    RiskResponse {
        total_score: assessment.total_score,
        max_score: assessment.max_score,
        profile: assessment.profile,
        conservative_max: policy.conservative_max(),
        moderate_max: policy.moderate_max(),
        completeness,
        questionnaire_max_score: None,
        warning: None,
    }
}

fn risk_from_args(args: RiskArgs, config: &EngineConfig) -> RiskResponse {
    let answers: BTreeMap<String, u32> = args.answers.into_iter().collect();
    let assessment = score_risk_with(&answers, &config.risk_policy);
    risk_response(assessment, &config.risk_policy, None)
}

fn recommend_from_payload(
    payload: RecommendPayload,
    config: &EngineConfig,
) -> Result<RecommendResponse, String> {
    let Some(raw_profile) = payload.risk_profile else {
        return Err("riskProfile is required".to_string());
    };
    let profile = raw_profile.parse::<RiskProfile>()?;
    let limit = payload.limit.unwrap_or(config.max_recommendations);
    if limit == 0 {
        return Err("limit must be > 0".to_string());
    }
    Ok(build_recommend_response(profile, &payload.catalog, limit))
}

fn build_recommend_response(
    profile: RiskProfile,
    catalog: &[FundInstrument],
    limit: usize,
) -> RecommendResponse {
    let funds = recommend_top(profile, catalog, limit);
    let suggested_allocation = equal_split(&funds);
    RecommendResponse {
        risk_profile: profile,
        funds,
        suggested_allocation,
    }
}

fn recommend_from_args(
    args: RecommendArgs,
    config: &EngineConfig,
) -> Result<RecommendResponse, String> {
    let raw = std::fs::read_to_string(&args.catalog)
        .map_err(|e| format!("failed to read catalog {}: {e}", args.catalog.display()))?;
    let catalog: Vec<FundInstrument> = serde_json::from_str(&raw)
        .map_err(|e| format!("invalid catalog JSON in {}: {e}", args.catalog.display()))?;
    let limit = args.limit.unwrap_or(config.max_recommendations);
    if limit == 0 {
        return Err("--limit must be > 0".to_string());
    }
    Ok(build_recommend_response(args.profile, &catalog, limit))
}

fn allocation_from_args(args: AllocateArgs) -> AllocationCheck {
    let allocations: Vec<Allocation> = args
        .allocations
        .into_iter()
        .map(|(fund_id, percentage)| Allocation {
            fund_id,
            percentage,
        })
        .collect();
    validate_allocation(&allocations)
}
