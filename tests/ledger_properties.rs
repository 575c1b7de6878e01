//! Ledger-wide properties
//!
//! Property-based checks on currency conversion and balance bookkeeping,
//! plus scenario tests for atomicity, idempotency and concurrent payments
//! driven through the public recorder API.

use course_payment_ledger::core::{
    FailPoint, InMemoryLedgerStore, LedgerStore, PaymentRecorder, RateSource, RateTable,
};
use course_payment_ledger::types::{
    Currency, Enrollment, EnrollmentStatus, ErrorKind, LedgerError, NewEnrollment,
    PaymentMethod, PaymentRequest,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

type Recorder = PaymentRecorder<InMemoryLedgerStore, RateTable>;

fn recorder() -> Recorder {
    PaymentRecorder::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(RateTable::default()),
    )
}

fn enroll(recorder: &Recorder, student: &str, total: Decimal, currency: Currency) -> Enrollment {
    recorder
        .enroll(
            student,
            NewEnrollment {
                course: "rust-101".to_string(),
                total_expected_payment: total,
                currency,
            },
        )
        .unwrap()
}

fn pay(enrollment: &Enrollment, amount: Decimal, currency: Currency, reference: &str) -> PaymentRequest {
    PaymentRequest::new(
        enrollment.id,
        amount,
        currency,
        PaymentMethod::BankTransfer,
        reference,
    )
}

/// Positive amounts with two decimal places (0.01 to 1,000,000.00)
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn currency() -> impl Strategy<Value = Currency> {
    prop::sample::select(Currency::ALL.to_vec())
}

/// Currency pairs ordered so the first conversion goes toward the higher rate
fn widening_pair() -> impl Strategy<Value = (Currency, Currency)> {
    (currency(), currency()).prop_map(|(a, b)| {
        let rates = RateTable::default();
        if rates.rate(a) <= rates.rate(b) {
            (a, b)
        } else {
            (b, a)
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Converting into the same currency never changes the amount
    #[test]
    fn prop_same_currency_conversion_is_identity(
        amount in positive_amount(),
        currency in currency(),
    ) {
        let conversion = RateTable::default().convert(amount, currency, currency).unwrap();
        prop_assert_eq!(conversion.amount, amount);
        prop_assert_eq!(conversion.rate, Decimal::ONE);
    }

    /// There and back again lands within one cent
    #[test]
    fn prop_round_trip_within_one_cent(
        amount in positive_amount(),
        (from, to) in widening_pair(),
    ) {
        let rates = RateTable::default();
        let there = rates.convert(amount, from, to).unwrap();
        let back = rates.convert(there.amount, to, from).unwrap();

        prop_assert!(
            (back.amount - amount).abs() <= dec!(0.01),
            "{} {} -> {} {} -> {} {}",
            amount, from, there.amount, to, back.amount, from
        );
    }

    /// No sequence of payments pushes an enrollment past its total
    #[test]
    fn prop_paid_amount_never_exceeds_total(
        total in positive_amount(),
        payments in prop::collection::vec((positive_amount(), currency()), 1..20),
    ) {
        let recorder = recorder();
        let enrollment = enroll(&recorder, "alice", total, Currency::Usd);

        for (index, (amount, currency)) in payments.into_iter().enumerate() {
            let _ = recorder.record("alice", pay(&enrollment, amount, currency, &format!("p-{}", index)));

            let current = recorder.enrollment(enrollment.id).unwrap();
            prop_assert!(current.paid_amount >= Decimal::ZERO);
            prop_assert!(current.paid_amount <= current.total_expected_payment);
            prop_assert!(current.balance() >= Decimal::ZERO);
            prop_assert_eq!(
                current.status == EnrollmentStatus::Active,
                current.is_fully_paid()
            );
        }

        prop_assert!(recorder.reconcile(enrollment.id).unwrap().consistent);
    }
}

#[test]
fn test_fault_between_writes_leaves_no_entry() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(1000), Currency::Usd);

    recorder.store().inject_fault(FailPoint::EnrollmentWrite);
    let err = recorder
        .record("alice", pay(&enrollment, dec!(400), Currency::Usd, "ref-1"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransactionFailure);
    assert!(err.is_retryable());
    assert!(recorder.payments(enrollment.id).unwrap().is_empty());
    assert!(!recorder.store().contains_reference("ref-1"));
    assert_eq!(
        recorder.enrollment(enrollment.id).unwrap().paid_amount,
        Decimal::ZERO
    );

    // the fault is one-shot, a retry with the same reference goes through
    let result = recorder
        .record("alice", pay(&enrollment, dec!(400), Currency::Usd, "ref-1"))
        .unwrap();
    assert_eq!(result.new_balance, dec!(600));
}

#[test]
fn test_duplicate_reference_applies_once() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(1000), Currency::Usd);

    recorder
        .record("alice", pay(&enrollment, dec!(100), Currency::Usd, "ref-1"))
        .unwrap();
    let err = recorder
        .record("alice", pay(&enrollment, dec!(100), Currency::Usd, "ref-1"))
        .unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateReference { ref reference } if reference == "ref-1"));
    assert_eq!(recorder.enrollment(enrollment.id).unwrap().paid_amount, dec!(100));
    assert_eq!(recorder.payments(enrollment.id).unwrap().len(), 1);
}

#[test]
fn test_partial_then_full_payment_activates() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(1000), Currency::Usd);
    assert_eq!(enrollment.status, EnrollmentStatus::Pending);

    let first = recorder
        .record("alice", pay(&enrollment, dec!(400), Currency::Usd, "ref-1"))
        .unwrap();
    assert_eq!(first.enrollment_status, EnrollmentStatus::Pending);
    assert_eq!(first.new_balance, dec!(600));
    assert!(!first.is_fully_paid);

    let second = recorder
        .record("alice", pay(&enrollment, dec!(600), Currency::Usd, "ref-2"))
        .unwrap();
    assert_eq!(second.enrollment_status, EnrollmentStatus::Active);
    assert_eq!(second.previous_balance, dec!(600));
    assert_eq!(second.new_balance, Decimal::ZERO);
    assert!(second.is_fully_paid);
}

#[test]
fn test_cross_currency_payment_settles_in_enrollment_currency() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(100), Currency::Usd);

    let result = recorder
        .record("alice", pay(&enrollment, dec!(15000), Currency::Kes, "stk-1"))
        .unwrap();

    assert_eq!(result.amount_paid, dec!(100.00));
    assert_eq!(result.enrollment_status, EnrollmentStatus::Active);

    let entry = recorder.payment("stk-1").unwrap();
    assert_eq!(entry.original_amount, dec!(15000));
    assert_eq!(entry.original_currency, Currency::Kes);
    assert_eq!(entry.amount_paid, dec!(100.00));
}

#[test]
fn test_overpayment_is_rejected_without_mutation() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(100), Currency::Usd);
    recorder
        .record("alice", pay(&enrollment, dec!(50), Currency::Usd, "ref-1"))
        .unwrap();

    let err = recorder
        .record("alice", pay(&enrollment, dec!(60), Currency::Usd, "ref-2"))
        .unwrap_err();

    match err {
        LedgerError::BalanceExceeded {
            remaining,
            currency,
            ..
        } => {
            assert_eq!(remaining, dec!(50));
            assert_eq!(currency, Currency::Usd);
        }
        other => panic!("expected BalanceExceeded, got {:?}", other),
    }
    assert_eq!(recorder.enrollment(enrollment.id).unwrap().paid_amount, dec!(50));
    assert!(!recorder.store().contains_reference("ref-2"));
}

fn spawn_payments(recorder: &Recorder, requests: Vec<PaymentRequest>) -> Vec<Result<(), LedgerError>> {
    let barrier = Arc::new(Barrier::new(requests.len()));

    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let recorder = recorder.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                recorder.record("alice", request).map(|_| ())
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_concurrent_full_balance_payments_settle_once() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(500), Currency::Usd);

    let results = spawn_payments(
        &recorder,
        vec![
            pay(&enrollment, dec!(500), Currency::Usd, "ref-0"),
            pay(&enrollment, dec!(500), Currency::Usd, "ref-1"),
        ],
    );

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        err.kind(),
        ErrorKind::AlreadySettled | ErrorKind::BalanceExceeded
    ));

    let settled = recorder.enrollment(enrollment.id).unwrap();
    assert_eq!(settled.paid_amount, dec!(500));
    assert_eq!(settled.status, EnrollmentStatus::Active);
    assert_eq!(recorder.payments(enrollment.id).unwrap().len(), 1);
}

#[test]
fn test_concurrent_same_reference_applies_once() {
    let recorder = recorder();
    let enrollment = enroll(&recorder, "alice", dec!(500), Currency::Usd);

    let results = spawn_payments(
        &recorder,
        (0..4)
            .map(|_| pay(&enrollment, dec!(100), Currency::Usd, "ref-shared"))
            .collect(),
    );

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert_eq!(err.kind(), ErrorKind::DuplicateReference);
    }
    assert_eq!(recorder.enrollment(enrollment.id).unwrap().paid_amount, dec!(100));
}
