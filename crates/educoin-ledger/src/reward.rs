//! Reward Calculator: grades to coins.
//!
//! [`coins`] is pure. [`GradeRewarder`] is the entry point the grading
//! subsystem calls once a submission is graded; it never opens a wallet
//! on its own.

use std::sync::Arc;

use educoin_types::{GroupId, Result, RewardPolicy, UserId, WalletId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{PeriodManager, WalletService};

/// Coins earned for grade `nota` on an activity graded out of
/// `valor_notas` and worth `valor_educoins` coins.
///
/// `floor(nota * valor_educoins / valor_notas)`, plus a bonus of
/// `floor(base * rate / 100)` when the grade reaches the policy threshold.
/// Never negative; zero when `valor_notas` is zero. A grade so large the
/// reward doesn't fit in a `u64` earns nothing and is logged.
#[must_use]
pub fn coins(nota: Decimal, valor_notas: u32, valor_educoins: u32, policy: &RewardPolicy) -> u64 {
    if valor_notas == 0 || nota <= Decimal::ZERO {
        return 0;
    }
    let notas = Decimal::from(valor_notas);
    let base = nota
        .checked_mul(Decimal::from(valor_educoins))
        .and_then(|scaled| scaled.checked_div(notas))
        .map(|b| b.floor());

    let reaches_threshold = nota
        .checked_mul(Decimal::ONE_HUNDRED)
        .is_some_and(|n| n >= Decimal::from(policy.bonus_threshold_percent) * notas);
    let bonus = match base {
        Some(base) if reaches_threshold => base
            .checked_mul(Decimal::from(policy.bonus_rate_percent))
            .map(|b| (b / Decimal::ONE_HUNDRED).floor()),
        _ => Some(Decimal::ZERO),
    };

    let total = base
        .zip(bonus)
        .and_then(|(base, bonus)| base.to_u64()?.checked_add(bonus.to_u64()?));
    total.unwrap_or_else(|| {
        warn!(%nota, valor_notas, valor_educoins, "Reward out of range, nothing earned");
        0
    })
}

/// A graded submission as reported by the grading subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedSubmission {
    pub student: UserId,
    pub group: GroupId,
    /// Label for the transaction reason, e.g. the activity title.
    pub activity: String,
    pub nota: Decimal,
    pub valor_notas: u32,
    pub valor_educoins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    Deposited {
        wallet: WalletId,
        amount: u64,
        balance: u64,
    },
    /// The grade was worth zero coins.
    NothingEarned,
    /// No active period, or no wallet in it. Reported, never retried.
    SkippedNoWallet { student: UserId, group: GroupId },
}

pub struct GradeRewarder {
    wallets: Arc<WalletService>,
    periods: Arc<PeriodManager>,
    policy: RewardPolicy,
}

impl GradeRewarder {
    #[must_use]
    pub fn new(wallets: Arc<WalletService>, periods: Arc<PeriodManager>, policy: RewardPolicy) -> Self {
        Self {
            wallets,
            periods,
            policy,
        }
    }

    pub fn award(&self, submission: &GradedSubmission) -> Result<RewardOutcome> {
        let amount = coins(
            submission.nota,
            submission.valor_notas,
            submission.valor_educoins,
            &self.policy,
        );
        if amount == 0 {
            debug!(student = %submission.student, activity = %submission.activity, "Grade earned no coins");
            return Ok(RewardOutcome::NothingEarned);
        }

        let wallet = self.periods.current(submission.group).and_then(|period| {
            self.wallets
                .wallet_for(submission.student, submission.group, period.id)
        });
        let Some(wallet) = wallet else {
            warn!(
                student = %submission.student,
                group = %submission.group,
                amount,
                activity = %submission.activity,
                "No active wallet, reward skipped"
            );
            return Ok(RewardOutcome::SkippedNoWallet {
                student: submission.student,
                group: submission.group,
            });
        };

        let reason = format!("grade reward: {}", submission.activity);
        let balance = self.wallets.deposit(wallet, amount, &reason)?;
        Ok(RewardOutcome::Deposited {
            wallet,
            amount,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RewardPolicy {
        RewardPolicy::default()
    }

    #[test]
    fn proportional_base() {
        assert_eq!(coins(Decimal::new(8, 0), 10, 100, &policy()), 80);
        // 7/3 * 10 = 23.33.. floors to 23
        assert_eq!(coins(Decimal::new(7, 0), 3, 10, &policy()), 23);
    }

    #[test]
    fn bonus_at_threshold() {
        // Exactly 90%: base 90, bonus 9.
        assert_eq!(coins(Decimal::new(9, 0), 10, 100, &policy()), 99);
        // 9.5/10: base 95, bonus floor(9.5) = 9.
        assert_eq!(coins(Decimal::new(95, 1), 10, 100, &policy()), 104);
        // Just under: no bonus.
        assert_eq!(coins(Decimal::new(899, 2), 10, 100, &policy()), 89);
    }

    #[test]
    fn degenerate_inputs_give_zero() {
        assert_eq!(coins(Decimal::new(5, 0), 0, 100, &policy()), 0);
        assert_eq!(coins(Decimal::new(-5, 0), 10, 100, &policy()), 0);
        assert_eq!(coins(Decimal::ZERO, 10, 100, &policy()), 0);
    }

    #[test]
    fn policy_without_bonus() {
        let flat = RewardPolicy {
            bonus_threshold_percent: 100,
            bonus_rate_percent: 0,
        };
        assert_eq!(coins(Decimal::new(10, 0), 10, 100, &flat), 100);
    }

    #[test]
    fn submission_from_grading_json() {
        let student = UserId::new();
        let group = GroupId::new();
        let raw = serde_json::json!({
            "student": student,
            "group": group,
            "activity": "Quiz 3",
            "nota": "9.5",
            "valor_notas": 10,
            "valor_educoins": 100,
        });
        let sub: GradedSubmission = serde_json::from_value(raw).unwrap();
        assert_eq!(sub.student, student);
        assert_eq!(sub.nota, Decimal::new(95, 1));
        assert_eq!(
            coins(sub.nota, sub.valor_notas, sub.valor_educoins, &policy()),
            104
        );
    }

    #[test]
    fn out_of_range_rewards_earn_nothing() {
        // Overflows the multiplication.
        assert_eq!(coins(Decimal::MAX, 1, 2, &policy()), 0);
        // Fits a Decimal but not a u64.
        let huge = Decimal::from_i128_with_scale(10_i128.pow(25), 0);
        assert_eq!(coins(huge, 1, 1, &policy()), 0);
    }

    #[test]
    fn small_rewards_floor_the_bonus() {
        // base 9, bonus floor(0.9) = 0
        assert_eq!(coins(Decimal::new(10, 0), 10, 9, &policy()), 9);
    }
}
