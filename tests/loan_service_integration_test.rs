use chrono::Duration;
use rusty_loan_saga::application::loan::{
    FaultCode, LoanApplicationError, create_loan, get_all_loans, get_loan_by_id,
    get_loans_by_user, RecoveryReport, recover_pending_sagas, return_loan,
};
use rusty_loan_saga::domain::commands::*;
use rusty_loan_saga::domain::loan::LoanStatus;
use rusty_loan_saga::domain::saga::{SagaKind, SagaRecord, SagaState};
use rusty_loan_saga::domain::value_objects::*;
use rusty_loan_saga::ports::{BookRecord, LoanStore as _, SagaLog as _};
use serde_json::json;

mod common;

use common::TestContext;

fn create_cmd(user_id: i64, book_id: i64) -> CreateLoan {
    CreateLoan {
        user_id: Some(UserId::new(user_id)),
        book_id: Some(BookId::new(book_id)),
    }
}

fn return_cmd(loan_id: LoanId) -> ReturnLoan {
    ReturnLoan {
        loan_id: Some(loan_id),
    }
}

// ============================================================================
// 貸出作成
// ============================================================================

#[tokio::test]
async fn test_create_loan_decrements_availability() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);

    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    assert_eq!(loan.user_id, UserId::new(3));
    assert_eq!(loan.book_id, BookId::new(7));
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.return_date, None);
    assert_eq!(loan.due_date - loan.loan_date, Duration::days(14));
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));

    let records = ctx.saga_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, SagaKind::Checkout);
    assert_eq!(records[0].state, SagaState::Completed);
}

#[tokio::test]
async fn test_create_loan_preserves_other_book_fields() {
    let ctx = TestContext::new();
    let mut record = BookRecord::new(BookId::new(7), 1);
    record.extra.insert("title".into(), json!("Dune"));
    ctx.catalog.put_record(record);

    create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    let stored = ctx.catalog.record(BookId::new(7)).unwrap();
    assert_eq!(stored.available_quantity, 0);
    assert_eq!(stored.extra.get("title"), Some(&json!("Dune")));
}

#[tokio::test]
async fn test_create_loan_unavailable_book_writes_nothing() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 0);

    let err = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap_err();

    assert!(matches!(err, LoanApplicationError::BookNotAvailable));
    assert_eq!(err.to_string(), "Book is not available");
    assert_eq!(err.fault_code(), FaultCode::Conflict);
    assert!(ctx.loan_store.is_empty());
    assert_eq!(ctx.catalog.update_count(), 0);
    assert!(ctx.saga_log.records().is_empty());
}

#[tokio::test]
async fn test_create_loan_missing_ids() {
    let ctx = TestContext::new();

    let err = create_loan(
        &ctx.deps,
        CreateLoan {
            user_id: Some(UserId::new(3)),
            book_id: None,
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "User ID and Book ID are required");
    assert_eq!(err.fault_code(), FaultCode::Validation);
}

#[tokio::test]
async fn test_create_loan_unknown_book() {
    let ctx = TestContext::new();

    let err = create_loan(&ctx.deps, create_cmd(3, 99)).await.unwrap_err();

    assert_eq!(err.to_string(), "Book not found or book service unavailable");
    assert_eq!(err.fault_code(), FaultCode::NotFound);
    assert!(ctx.loan_store.is_empty());
}

#[tokio::test]
async fn test_create_loan_catalog_unreachable() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);
    ctx.catalog.set_unreachable(true);

    let err = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap_err();

    assert_eq!(err.fault_code(), FaultCode::UpstreamUnavailable);
    assert!(ctx.loan_store.is_empty());
}

#[tokio::test]
async fn test_create_loan_saga_log_failure_writes_nothing() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);
    ctx.saga_log.set_fail_opens(true);
    ctx.loan_store.set_fail_deletes(true);

    let err = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap_err();

    assert_eq!(err.fault_code(), FaultCode::Internal);
    assert!(ctx.loan_store.is_empty());
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(2));

    // 意図レコードのない貸出は残らない
    ctx.saga_log.set_fail_opens(false);
    ctx.loan_store.set_fail_deletes(false);
    let report = recover_pending_sagas(&ctx.deps).await.unwrap();
    assert_eq!(report, RecoveryReport::default());
    assert!(ctx.loan_store.is_empty());
}

#[tokio::test]
async fn test_create_loan_insert_failure_closes_saga() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);
    ctx.loan_store.set_fail_inserts(true);

    let err = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap_err();

    assert_eq!(err.to_string(), "Loan store error");
    assert!(ctx.loan_store.is_empty());
    assert_eq!(ctx.catalog.update_count(), 0);

    let records = ctx.saga_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, SagaKind::Checkout);
    assert_eq!(records[0].state, SagaState::Compensated);
}

#[tokio::test]
async fn test_every_created_loan_has_checkout_saga() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 3);

    let first = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    let second = create_loan(&ctx.deps, create_cmd(4, 7)).await.unwrap();

    let saga_loans: Vec<LoanId> = ctx
        .saga_log
        .records()
        .iter()
        .filter(|r| r.kind == SagaKind::Checkout)
        .map(|r| r.loan_id)
        .collect();
    assert_eq!(saga_loans, vec![first.id, second.id]);
}

// ============================================================================
// 補償
// ============================================================================

#[tokio::test]
async fn test_catalog_update_failure_compensates() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);
    ctx.catalog.set_fail_updates(true);

    let err = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to update book quantity");
    assert!(ctx.loan_store.is_empty());
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(2));

    let records = ctx.saga_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, SagaState::Compensated);
}

#[tokio::test]
async fn test_failed_compensation_is_recovered_on_restart() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);
    ctx.catalog.set_fail_updates(true);
    ctx.loan_store.set_fail_deletes(true);

    create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap_err();

    // 補償に失敗した貸出が残り、サガは未確定
    assert_eq!(ctx.loan_store.len(), 1);
    assert_eq!(ctx.saga_log.pending().await.unwrap().len(), 1);

    ctx.catalog.set_fail_updates(false);
    ctx.loan_store.set_fail_deletes(false);

    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.compensated, 1);
    assert!(ctx.loan_store.is_empty());
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(2));
    assert!(ctx.saga_log.pending().await.unwrap().is_empty());
}

// ============================================================================
// 返却
// ============================================================================

#[tokio::test]
async fn test_return_loan_increments_availability() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(0));

    let returned = return_loan(&ctx.deps, return_cmd(loan.id)).await.unwrap();

    assert_eq!(returned.id, loan.id);
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(returned.return_date.is_some());
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));
}

#[tokio::test]
async fn test_return_loan_is_not_idempotent() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    return_loan(&ctx.deps, return_cmd(loan.id)).await.unwrap();

    let err = return_loan(&ctx.deps, return_cmd(loan.id)).await.unwrap_err();

    assert_eq!(err.to_string(), "Loan already returned");
    assert_eq!(err.fault_code(), FaultCode::Conflict);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));
}

#[tokio::test]
async fn test_return_unknown_loan() {
    let ctx = TestContext::new();

    let err = return_loan(&ctx.deps, return_cmd(LoanId::new(42)))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Loan not found");
    assert_eq!(err.fault_code(), FaultCode::NotFound);

    let err = return_loan(&ctx.deps, ReturnLoan { loan_id: None })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Loan ID is required");
}

#[tokio::test]
async fn test_return_catalog_failure_keeps_loan_returned_and_recovers() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    ctx.catalog.set_fail_updates(true);

    let err = return_loan(&ctx.deps, return_cmd(loan.id)).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to update book quantity on return");
    let stored = get_loan_by_id(&ctx.deps, Some(loan.id)).await.unwrap();
    assert_eq!(stored.status, LoanStatus::Returned);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(0));

    ctx.catalog.set_fail_updates(false);
    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));
}

#[tokio::test]
async fn test_return_observe_failure_does_not_write_twice() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    ctx.saga_log.set_fail_observes(true);
    ctx.catalog.set_lose_update_replies(true);

    let err = return_loan(&ctx.deps, return_cmd(loan.id)).await.unwrap_err();

    // 観測値を記録できないまま在庫を書き換えない
    assert_eq!(err.fault_code(), FaultCode::Internal);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(0));
    let pending = ctx.saga_log.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].observed_quantity, None);

    ctx.saga_log.set_fail_observes(false);
    ctx.catalog.set_lose_update_replies(false);
    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));
    assert!(ctx.saga_log.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_lost_reply_is_completed_without_second_write() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    ctx.catalog.set_lose_update_replies(true);

    let err = return_loan(&ctx.deps, return_cmd(loan.id)).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to update book quantity on return");
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));

    ctx.catalog.set_lose_update_replies(false);
    let updates_before = ctx.catalog.update_count();
    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(ctx.catalog.update_count(), updates_before);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));
}

// ============================================================================
// 復旧
// ============================================================================

#[tokio::test]
async fn test_recovery_completes_checkout_whose_write_landed() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    // 在庫更新後、サガを閉じる前に停止した状態を再現
    let saga = SagaRecord::open(
        SagaKind::Checkout,
        loan.id,
        loan.book_id,
        Some(1),
        loan.loan_date,
    );
    ctx.saga_log.open(saga).await.unwrap();

    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(ctx.loan_store.len(), 1);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(0));
}

#[tokio::test]
async fn test_recovery_compensates_checkout_interrupted_before_insert() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 2);

    // 意図レコードの記録後、貸出の挿入前に停止した状態を再現
    let loan_id = ctx.loan_store.reserve_id().await.unwrap();
    let saga = SagaRecord::open(
        SagaKind::Checkout,
        loan_id,
        BookId::new(7),
        Some(2),
        chrono::Utc::now(),
    );
    ctx.saga_log.open(saga).await.unwrap();

    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.compensated, 1);
    assert!(ctx.loan_store.is_empty());
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(2));
}

#[tokio::test]
async fn test_recovery_leaves_drifted_saga_pending() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 10);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    let saga = SagaRecord::open(
        SagaKind::Checkout,
        loan.id,
        loan.book_id,
        Some(3),
        loan.loan_date,
    );
    ctx.saga_log.open(saga).await.unwrap();

    let report = recover_pending_sagas(&ctx.deps).await.unwrap();

    assert_eq!(report.left_pending, 1);
    assert_eq!(ctx.saga_log.pending().await.unwrap().len(), 1);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(9));
}

// ============================================================================
// 同時実行
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_oversell() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);

    let mut handles = Vec::new();
    for user in 1..=10 {
        let deps = ctx.deps.clone();
        handles.push(tokio::spawn(async move {
            create_loan(&deps, create_cmd(user, 7)).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, LoanApplicationError::BookNotAvailable)),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ctx.loan_store.len(), 1);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_returns_increment_once() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let deps = ctx.deps.clone();
        handles.push(tokio::spawn(async move {
            return_loan(&deps, return_cmd(loan.id)).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ctx.catalog.quantity(BookId::new(7)), Some(1));
}

// ============================================================================
// 参照
// ============================================================================

#[tokio::test]
async fn test_get_loan_by_id() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 1);
    let loan = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    assert_eq!(get_loan_by_id(&ctx.deps, Some(loan.id)).await.unwrap(), loan);

    let err = get_loan_by_id(&ctx.deps, Some(LoanId::new(999)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Loan not found");
}

#[tokio::test]
async fn test_list_queries_are_newest_first() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 5);
    ctx.catalog.add_book(BookId::new(8), 5);

    let first = create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();
    let second = create_loan(&ctx.deps, create_cmd(4, 8)).await.unwrap();
    let third = create_loan(&ctx.deps, create_cmd(3, 8)).await.unwrap();

    let all: Vec<LoanId> = get_all_loans(&ctx.deps).await.iter().map(|l| l.id).collect();
    assert_eq!(all, vec![third.id, second.id, first.id]);

    let by_user: Vec<LoanId> = get_loans_by_user(&ctx.deps, Some(UserId::new(3)))
        .await
        .iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(by_user, vec![third.id, first.id]);
}

#[tokio::test]
async fn test_list_queries_degrade_to_empty() {
    let ctx = TestContext::new();
    ctx.catalog.add_book(BookId::new(7), 5);
    create_loan(&ctx.deps, create_cmd(3, 7)).await.unwrap();

    assert!(get_loans_by_user(&ctx.deps, Some(UserId::new(99))).await.is_empty());
    assert!(get_loans_by_user(&ctx.deps, None).await.is_empty());

    ctx.loan_store.set_fail_queries(true);
    assert!(get_all_loans(&ctx.deps).await.is_empty());
    assert!(get_loans_by_user(&ctx.deps, Some(UserId::new(3))).await.is_empty());
}
