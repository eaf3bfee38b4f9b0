//! Allocation plan validation against live bank inventory.
//!
//! Pure with respect to storage: callers pass the per-bank available counts
//! they read inside whatever transaction scope they need. Invoked both at
//! assessment save time (eager validation) and at session creation (banks may
//! have shrunk since the assessment was configured).

use std::collections::HashMap;

use thiserror::Error;

use crate::db::models::AllocationSlice;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AllocationError {
    #[error("allocation plan is empty")]
    PlanEmpty,
    #[error("allocation count for bank '{bank_code}' must be positive, got {count}")]
    NonPositiveCount { bank_code: String, count: i32 },
    #[error("bank '{bank_code}' referenced more than once in allocation plan")]
    DuplicateBank { bank_code: String },
    #[error("question bank '{bank_code}' not found")]
    BankNotFound { bank_code: String },
    #[error(
        "bank '{bank_code}' has {available} questions, {requested} requested (short by {deficit})"
    )]
    InsufficientBankQuestions { bank_code: String, requested: i64, available: i64, deficit: i64 },
    #[error("allocation plan sums to {plan_total} questions but assessment declares {declared_total}")]
    TotalMismatch { plan_total: i64, declared_total: i64 },
}

impl AllocationError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            AllocationError::PlanEmpty => "allocation_plan_empty",
            AllocationError::NonPositiveCount { .. } => "allocation_count_not_positive",
            AllocationError::DuplicateBank { .. } => "allocation_duplicate_bank",
            AllocationError::BankNotFound { .. } => "bank_not_found",
            AllocationError::InsufficientBankQuestions { .. } => "insufficient_bank_questions",
            AllocationError::TotalMismatch { .. } => "allocation_total_mismatch",
        }
    }
}

/// Validates `plan` against `available` (bank code -> question count) and the
/// assessment's declared total. Read-only; returns the first violation found.
pub(crate) fn resolve_plan(
    plan: &[AllocationSlice],
    available: &HashMap<String, i64>,
    declared_total: i64,
) -> Result<(), AllocationError> {
    if plan.is_empty() {
        return Err(AllocationError::PlanEmpty);
    }

    let mut seen: Vec<&str> = Vec::with_capacity(plan.len());
    let mut plan_total: i64 = 0;

    for slice in plan {
        if slice.count <= 0 {
            return Err(AllocationError::NonPositiveCount {
                bank_code: slice.bank_code.clone(),
                count: slice.count,
            });
        }

        if seen.contains(&slice.bank_code.as_str()) {
            return Err(AllocationError::DuplicateBank { bank_code: slice.bank_code.clone() });
        }
        seen.push(&slice.bank_code);

        let Some(&bank_available) = available.get(&slice.bank_code) else {
            return Err(AllocationError::BankNotFound { bank_code: slice.bank_code.clone() });
        };

        let requested = slice.count as i64;
        if requested > bank_available {
            return Err(AllocationError::InsufficientBankQuestions {
                bank_code: slice.bank_code.clone(),
                requested,
                available: bank_available,
                deficit: requested - bank_available,
            });
        }

        plan_total += requested;
    }

    if plan_total != declared_total {
        return Err(AllocationError::TotalMismatch { plan_total, declared_total });
    }

    Ok(())
}

/// Normalized bank code: lowercase, `a-z0-9_-` only.
pub(crate) fn normalize_bank_code(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(bank_code: &str, count: i32) -> AllocationSlice {
        AllocationSlice { bank_code: bank_code.to_string(), count }
    }

    fn inventory(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries.iter().map(|(code, count)| (code.to_string(), *count)).collect()
    }

    #[test]
    fn accepts_valid_plan() {
        let plan = vec![slice("anatomy", 6), slice("pharma", 4)];
        let available = inventory(&[("anatomy", 20), ("pharma", 4)]);
        assert_eq!(resolve_plan(&plan, &available, 10), Ok(()));
    }

    #[test]
    fn rejects_empty_plan() {
        assert_eq!(resolve_plan(&[], &HashMap::new(), 0), Err(AllocationError::PlanEmpty));
    }

    #[test]
    fn rejects_unknown_bank() {
        let plan = vec![slice("ghost", 2)];
        let err = resolve_plan(&plan, &inventory(&[("anatomy", 5)]), 2).unwrap_err();
        assert_eq!(err, AllocationError::BankNotFound { bank_code: "ghost".to_string() });
        assert_eq!(err.code(), "bank_not_found");
    }

    #[test]
    fn reports_deficit_when_bank_too_small() {
        let plan = vec![slice("anatomy", 8)];
        let err = resolve_plan(&plan, &inventory(&[("anatomy", 5)]), 8).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientBankQuestions {
                bank_code: "anatomy".to_string(),
                requested: 8,
                available: 5,
                deficit: 3,
            }
        );
        assert_eq!(err.code(), "insufficient_bank_questions");
    }

    #[test]
    fn rejects_total_mismatch() {
        let plan = vec![slice("anatomy", 3), slice("pharma", 3)];
        let err = resolve_plan(&plan, &inventory(&[("anatomy", 5), ("pharma", 5)]), 10).unwrap_err();
        assert_eq!(err, AllocationError::TotalMismatch { plan_total: 6, declared_total: 10 });
        assert_eq!(err.code(), "allocation_total_mismatch");
    }

    #[test]
    fn rejects_duplicate_bank_and_non_positive_count() {
        let available = inventory(&[("anatomy", 5)]);
        let dup = vec![slice("anatomy", 2), slice("anatomy", 2)];
        assert_eq!(
            resolve_plan(&dup, &available, 4),
            Err(AllocationError::DuplicateBank { bank_code: "anatomy".to_string() })
        );

        let zero = vec![slice("anatomy", 0)];
        assert_eq!(
            resolve_plan(&zero, &available, 0),
            Err(AllocationError::NonPositiveCount { bank_code: "anatomy".to_string(), count: 0 })
        );
    }

    #[test]
    fn normalizes_bank_codes() {
        assert_eq!(normalize_bank_code("  Default Bank!  "), "defaultbank");
        assert_eq!(normalize_bank_code("phys-101_b"), "phys-101_b");
    }
}
