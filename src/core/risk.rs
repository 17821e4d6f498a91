use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::types::{RiskAssessment, RiskProfile};

pub const DEFAULT_CONSERVATIVE_MAX: u32 = 8;
pub const DEFAULT_MODERATE_MAX: u32 = 16;
pub const DEFAULT_MAX_SCORE: u32 = 24;

/// Inclusive upper bounds for the Conservative and Moderate tiers, together
/// with the highest score the questionnaire can produce. Changing any of these
/// breaks comparability with profiles assigned under earlier values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPolicy {
    conservative_max: u32,
    moderate_max: u32,
    max_score: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            conservative_max: DEFAULT_CONSERVATIVE_MAX,
            moderate_max: DEFAULT_MODERATE_MAX,
            max_score: DEFAULT_MAX_SCORE,
        }
    }
}

impl RiskPolicy {
    pub fn new(
        conservative_max: u32,
        moderate_max: u32,
        max_score: u32,
    ) -> Result<Self, EngineError> {
        if conservative_max >= moderate_max {
            return Err(EngineError::InvalidPolicy(format!(
                "conservative max ({conservative_max}) must be below moderate max ({moderate_max})"
            )));
        }
        if moderate_max >= max_score {
            return Err(EngineError::InvalidPolicy(format!(
                "moderate max ({moderate_max}) must be below the maximum score ({max_score})"
            )));
        }
        Ok(Self {
            conservative_max,
            moderate_max,
            max_score,
        })
    }

    /// Default tier proportions (thirds) over a different achievable maximum.
    /// Never applied implicitly; callers opt in.
    pub fn scaled_to(max_score: u32) -> Self {
        RiskPolicy::default().rescaled(max_score)
    }

    /// Moves both tier bounds proportionally to a new achievable maximum.
    pub fn rescaled(&self, max_score: u32) -> Self {
        if max_score == self.max_score {
            return *self;
        }
        let max_score = max_score.max(3);
        let scale = |bound: u32| {
            (u64::from(bound) * u64::from(max_score) / u64::from(self.max_score.max(1))) as u32
        };
        let conservative_max = scale(self.conservative_max).min(max_score - 2);
        let moderate_max = scale(self.moderate_max)
            .max(conservative_max + 1)
            .min(max_score - 1);
        Self {
            conservative_max,
            moderate_max,
            max_score,
        }
    }

    pub fn conservative_max(&self) -> u32 {
        self.conservative_max
    }

    pub fn moderate_max(&self) -> u32 {
        self.moderate_max
    }

    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    pub fn classify(&self, total_score: u32) -> RiskProfile {
        if total_score <= self.conservative_max {
            RiskProfile::Conservative
        } else if total_score <= self.moderate_max {
            RiskProfile::Moderate
        } else {
            RiskProfile::Aggressive
        }
    }
}

pub fn score_risk(answers: &BTreeMap<String, u32>) -> RiskAssessment {
    score_risk_with(answers, &RiskPolicy::default())
}

pub fn score_risk_with(answers: &BTreeMap<String, u32>, policy: &RiskPolicy) -> RiskAssessment {
    let total_score = answers
        .values()
        .fold(0u32, |acc, score| acc.saturating_add(*score));
    RiskAssessment {
        total_score,
        max_score: policy.max_score(),
        profile: policy.classify(total_score),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskQuestion {
    pub id: String,
    #[serde(default, alias = "questionText")]
    pub text: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub order_sequence: u32,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskOption {
    pub id: String,
    pub question_id: String,
    #[serde(default, alias = "optionText")]
    pub text: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    pub answered: usize,
    pub required: usize,
    pub missing_questions: Vec<String>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.missing_questions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub questions: Vec<RiskQuestion>,
    pub options: Vec<RiskOption>,
}

impl Questionnaire {
    pub fn active_questions(&self) -> Vec<&RiskQuestion> {
        let mut active: Vec<&RiskQuestion> =
            self.questions.iter().filter(|q| q.is_active).collect();
        active.sort_by_key(|q| q.order_sequence);
        active
    }

    pub fn options_for<'a>(
        &'a self,
        question_id: &'a str,
    ) -> impl Iterator<Item = &'a RiskOption> {
        self.options
            .iter()
            .filter(move |option| option.question_id == question_id)
    }

    pub fn max_score(&self) -> u32 {
        self.active_questions()
            .iter()
            .map(|q| self.options_for(&q.id).map(|o| o.score).max().unwrap_or(0))
            .fold(0u32, u32::saturating_add)
    }

    /// Maps question id -> chosen option id into question id -> option score.
    pub fn resolve(
        &self,
        responses: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, u32>, EngineError> {
        responses
            .iter()
            .map(|(question_id, option_id)| {
                self.options
                    .iter()
                    .find(|o| &o.id == option_id && &o.question_id == question_id)
                    .map(|o| (question_id.clone(), o.score))
                    .ok_or_else(|| EngineError::UnknownOption {
                        question_id: question_id.clone(),
                        option_id: option_id.clone(),
                    })
            })
            .collect()
    }

    pub fn completeness(&self, responses: &BTreeMap<String, String>) -> Completeness {
        let active = self.active_questions();
        let missing_questions: Vec<String> = active
            .iter()
            .filter(|q| !responses.contains_key(&q.id))
            .map(|q| q.id.clone())
            .collect();
        Completeness {
            answered: active.len() - missing_questions.len(),
            required: active.len(),
            missing_questions,
        }
    }

    pub fn score(
        &self,
        responses: &BTreeMap<String, String>,
    ) -> Result<RiskAssessment, EngineError> {
        self.score_with(responses, &RiskPolicy::default())
    }

    pub fn score_with(
        &self,
        responses: &BTreeMap<String, String>,
        policy: &RiskPolicy,
    ) -> Result<RiskAssessment, EngineError> {
        let answers = self.resolve(responses)?;
        Ok(score_risk_with(&answers, policy))
    }
}
