use tracing::debug;

use super::types::{
    Allocation, AllocationCheck, FundCategory, FundInstrument, RiskLevel, RiskProfile,
};

pub const MAX_RECOMMENDATIONS: usize = 5;
pub const FULL_ALLOCATION: u64 = 100;

pub fn is_eligible(profile: RiskProfile, fund: &FundInstrument) -> bool {
    match profile {
        RiskProfile::Conservative => {
            fund.risk_level == RiskLevel::Low || fund.category == FundCategory::Debt
        }
        RiskProfile::Moderate => {
            fund.risk_level == RiskLevel::Moderate || fund.category == FundCategory::Hybrid
        }
        RiskProfile::Aggressive => {
            fund.risk_level == RiskLevel::High
                || matches!(fund.category, FundCategory::Equity | FundCategory::Elss)
        }
    }
}

pub fn recommend(profile: RiskProfile, catalog: &[FundInstrument]) -> Vec<FundInstrument> {
    recommend_top(profile, catalog, MAX_RECOMMENDATIONS)
}

pub fn recommend_top(
    profile: RiskProfile,
    catalog: &[FundInstrument],
    limit: usize,
) -> Vec<FundInstrument> {
    let mut candidates: Vec<&FundInstrument> =
        catalog.iter().filter(|fund| is_eligible(profile, fund)).collect();
    if candidates.is_empty() {
        debug!(
            %profile,
            catalog_size = catalog.len(),
            "no eligible funds for profile, falling back to full catalog"
        );
        candidates = catalog.iter().collect();
    }

    match profile {
        RiskProfile::Conservative => candidates
            .sort_by(|a, b| a.expected_return_percent.total_cmp(&b.expected_return_percent)),
        RiskProfile::Moderate | RiskProfile::Aggressive => candidates
            .sort_by(|a, b| b.expected_return_percent.total_cmp(&a.expected_return_percent)),
    }

    candidates.into_iter().take(limit).cloned().collect()
}

pub fn validate_allocation(allocations: &[Allocation]) -> AllocationCheck {
    let total: u64 = allocations.iter().map(|a| u64::from(a.percentage)).sum();
    AllocationCheck {
        valid: total == FULL_ALLOCATION,
        total,
        remaining: FULL_ALLOCATION as i64 - total as i64,
    }
}

/// Whole-percent split that always sums to 100; leading funds absorb the remainder.
pub fn equal_split(funds: &[FundInstrument]) -> Vec<Allocation> {
    if funds.is_empty() {
        return Vec::new();
    }
    let count = funds.len() as u64;
    let base = FULL_ALLOCATION / count;
    let extra = (FULL_ALLOCATION % count) as usize;
    funds
        .iter()
        .enumerate()
        .map(|(idx, fund)| Allocation {
            fund_id: fund.id.clone(),
            percentage: (base + u64::from(idx < extra)) as u32,
        })
        .collect()
}
