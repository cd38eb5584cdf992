//! Ledger-wide invariants under concurrent load, and the grading reward
//! pipeline end to end.

use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use educoin_ledger::{
    ChannelNotifier, InMemoryRoster, Ledger, NullNotifier, RewardOutcome, Roster, SystemClock,
    GradedSubmission,
};
use educoin_types::{
    EducoinError, GroupId, LedgerConfig, Notification, PeriodId, TransactionKind, UserId, WalletId,
};
use rand::Rng;
use rust_decimal::Decimal;

struct Classroom {
    ledger: Ledger,
    roster: Arc<InMemoryRoster>,
    group: GroupId,
    period: PeriodId,
}

fn classroom(students: &[UserId]) -> Classroom {
    let roster = Arc::new(InMemoryRoster::new());
    let group = GroupId::new();
    roster.add_group(group, UserId::new());
    for s in students {
        roster.add_member(group, *s).unwrap();
    }
    let ledger = Ledger::new(
        LedgerConfig::default(),
        Arc::clone(&roster) as Arc<dyn Roster>,
        Arc::new(NullNotifier),
        Arc::new(SystemClock),
    )
    .unwrap();
    let period = ledger
        .periods
        .create_period(
            group,
            "2025-1",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .unwrap();
    ledger.periods.activate(group, period.id).unwrap();
    Classroom {
        ledger,
        roster,
        group,
        period: period.id,
    }
}

fn wallet(c: &Classroom, student: UserId) -> WalletId {
    c.ledger
        .wallets
        .wallet_for(student, c.group, c.period)
        .unwrap()
}

#[test]
fn concurrent_locks_never_oversubscribe() {
    let student = UserId::new();
    let c = classroom(&[student]);
    let w = wallet(&c, student);
    c.ledger.wallets.deposit(w, 100, "seed").unwrap();

    let mut rng = rand::thread_rng();
    let amounts: Vec<u64> = (0..32).map(|_| rng.gen_range(4..=20)).collect();
    let requested: u64 = amounts.iter().sum();
    assert!(requested > 100);

    let handles: Vec<_> = amounts
        .iter()
        .map(|&amount| {
            let wallets = Arc::clone(&c.ledger.wallets);
            thread::spawn(move || wallets.lock(w, amount).map(|_| amount))
        })
        .collect();

    let mut accepted = 0u64;
    for h in handles {
        match h.join().unwrap() {
            Ok(amount) => accepted += amount,
            Err(err) => assert!(
                matches!(err, EducoinError::InsufficientFunds { .. }),
                "unexpected error: {err}"
            ),
        }
    }

    let b = c.ledger.wallets.balance(w).unwrap();
    assert_eq!(b.locked, accepted);
    assert!(b.locked <= b.balance);
    assert_eq!(b.balance, 100);
}

#[test]
fn balance_always_equals_journal_sum() {
    let students: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
    let c = classroom(&students);

    let handles: Vec<_> = students
        .iter()
        .map(|&student| {
            let w = wallet(&c, student);
            let wallets = Arc::clone(&c.ledger.wallets);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..50 {
                    let amount = rng.gen_range(1..=10);
                    match rng.gen_range(0..4) {
                        0 | 1 => {
                            wallets.deposit(w, amount, "reward").unwrap();
                        }
                        2 => {
                            let _ = wallets.withdraw(w, amount, "shop");
                        }
                        _ => {
                            if wallets.lock(w, amount).is_ok() {
                                wallets.settle(w, amount, "auction payment").unwrap();
                            }
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let report = c.ledger.store.audit().unwrap();
    assert_eq!(report.wallets, students.len());
    assert_eq!(report.total_locked, 0);

    for student in &students {
        let w = wallet(&c, *student);
        let journal = c.ledger.store.journal(w).unwrap();
        let sum = journal.iter().fold(0i128, |acc, tx| match tx.kind {
            TransactionKind::Earn => acc + i128::from(tx.amount),
            TransactionKind::Spend | TransactionKind::Reset => acc - i128::from(tx.amount),
        });
        assert_eq!(sum, i128::from(c.ledger.wallets.balance(w).unwrap().balance));
    }
}

#[test]
fn reset_keeps_the_journal_balanced() {
    let student = UserId::new();
    let c = classroom(&[student]);
    let w = wallet(&c, student);
    c.ledger.wallets.deposit(w, 30, "a").unwrap();
    c.ledger.wallets.withdraw(w, 5, "b").unwrap();
    assert_eq!(c.ledger.wallets.reset(w, "rollover").unwrap(), 25);
    c.ledger.store.audit().unwrap();
}

#[test]
fn grading_rewards_land_in_the_active_wallet() {
    let student = UserId::new();
    let roster = Arc::new(InMemoryRoster::new());
    let group = GroupId::new();
    roster.add_group(group, UserId::new());
    roster.add_member(group, student).unwrap();
    let (notifier, mut rx) = ChannelNotifier::new();
    let ledger = Ledger::new(
        LedgerConfig::default(),
        Arc::clone(&roster) as Arc<dyn Roster>,
        Arc::new(notifier),
        Arc::new(SystemClock),
    )
    .unwrap();
    let rewarder = ledger.rewarder();

    let submission = GradedSubmission {
        student,
        group,
        activity: "Essay 1".into(),
        nota: Decimal::new(95, 1),
        valor_notas: 10,
        valor_educoins: 100,
    };

    // No period yet: reported and skipped, no wallet conjured.
    assert_eq!(
        rewarder.award(&submission).unwrap(),
        RewardOutcome::SkippedNoWallet { student, group }
    );
    assert_eq!(ledger.store.wallet_count(), 0);

    let period = ledger
        .periods
        .create_period(
            group,
            "2025-1",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .unwrap();
    ledger.periods.activate(group, period.id).unwrap();

    let outcome = rewarder.award(&submission).unwrap();
    let RewardOutcome::Deposited {
        wallet,
        amount,
        balance,
    } = outcome
    else {
        panic!("expected a deposit, got {outcome:?}");
    };
    assert_eq!(amount, 104);
    assert_eq!(balance, 104);
    assert_eq!(ledger.wallets.history(wallet, None).unwrap()[0].reason, "grade reward: Essay 1");
    assert!(matches!(
        rx.try_recv().unwrap(),
        Notification::CoinsEarned { amount: 104, .. }
    ));

    let zero = GradedSubmission {
        nota: Decimal::ZERO,
        ..submission
    };
    assert_eq!(rewarder.award(&zero).unwrap(), RewardOutcome::NothingEarned);
}

#[test]
fn new_period_starts_fresh_and_keeps_the_archive() {
    let student = UserId::new();
    let c = classroom(&[student]);
    let old = wallet(&c, student);
    c.ledger.wallets.deposit(old, 70, "reward").unwrap();

    let next = c
        .ledger
        .periods
        .create_period(
            c.group,
            "2025-2",
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        )
        .unwrap();
    let activation = c.ledger.periods.activate(c.group, next.id).unwrap();
    assert_eq!(activation.previous, Some(c.period));
    assert_eq!(activation.wallets_created.len(), 1);

    let fresh = activation.wallets_created[0];
    assert_eq!(c.ledger.wallets.balance(fresh).unwrap().balance, 0);
    assert_eq!(c.ledger.wallets.balance(old).unwrap().balance, 70);
    assert_eq!(c.ledger.wallets.total_balance(student).unwrap(), 70);

    // Joining late still gets a wallet in the current period only.
    let late = UserId::new();
    c.roster.add_member(c.group, late).unwrap();
    let w = c.ledger.periods.enroll(c.group, late).unwrap().unwrap();
    assert_eq!(c.ledger.wallets.wallets_for_student(late).unwrap().len(), 1);
    assert_eq!(c.ledger.wallets.wallet(w).unwrap().key.period, next.id);
}
