use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("target date must be in the future (months remaining: {months_remaining})")]
    InvalidHorizon { months_remaining: i64 },

    #[error("goal horizon of {months_remaining} months exceeds the supported {max_months} months")]
    HorizonTooLong { months_remaining: i64, max_months: i64 },

    #[error("{field} must be a finite, non-negative amount")]
    InvalidAmount { field: &'static str },

    #[error("expected annual return must be finite and above -100%")]
    InvalidReturnRate,

    #[error("expected annual return of {annual_return_percent}% overflows over {months} months")]
    ReturnOverflow { annual_return_percent: f64, months: u32 },

    #[error("invalid risk policy: {0}")]
    InvalidPolicy(String),

    #[error("unknown option '{option_id}' for question '{question_id}'")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },

    #[error("invalid goal: {0}")]
    InvalidGoal(String),
}

impl EngineError {
    pub fn is_invalid_horizon(&self) -> bool {
        matches!(self, EngineError::InvalidHorizon { .. })
    }
}
