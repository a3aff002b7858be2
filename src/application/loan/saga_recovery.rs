use crate::domain::{
    loan::LoanStatus,
    saga::{CatalogProgress, SagaKind, SagaRecord, SagaState},
};

use super::loan_service::{ServiceDependencies, restock};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 復旧処理の結果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// 第2段階を確認・再実行して完了にした件数
    pub completed: usize,
    /// 補償済みとして閉じた件数
    pub compensated: usize,
    /// 判定できず`Pending`のまま残した件数
    pub left_pending: usize,
}

/// 未確定サガの復旧（純粋な関数）
///
/// 起動時に実行され、チェックポイント後に中断したサガを検出して再開する。
///
/// 処理フロー：
/// 1. サガログから`Pending`のサガを取得
/// 2. 各サガについて書籍ごとのロックを取得し、
///    貸出ストアとカタログの現在値から第2段階の進捗を判定
///    - 反映済み → 完了
///    - 未反映 → 貸出作成は補償、返却はやり直して完了
///    - 判定不能 → そのまま残して警告
/// 3. 件数を返す
///
/// # エラー
/// サガログの読み込み・更新のI/Oエラー
pub async fn recover_pending_sagas(
    deps: &ServiceDependencies,
) -> std::result::Result<RecoveryReport, BoxError> {
    let mut report = RecoveryReport::default();

    let pending = deps.saga_log.pending().await?;

    for saga in pending {
        let _guard = deps.book_locks.acquire(saga.book_id).await;

        let outcome = match saga.kind {
            SagaKind::Checkout => recover_checkout(deps, &saga).await,
            SagaKind::Return => recover_return(deps, &saga).await,
        };

        match outcome {
            Ok(Some(state)) => {
                deps.saga_log.close(saga.id, state).await?;
                match state {
                    SagaState::Compensated => report.compensated += 1,
                    _ => report.completed += 1,
                }
                tracing::info!(
                    saga_id = %saga.id,
                    loan_id = %saga.loan_id,
                    "Recovered {} saga as {}",
                    saga.kind.as_str(),
                    state.as_str()
                );
            }
            Ok(None) => {
                tracing::warn!(
                    saga_id = %saga.id,
                    loan_id = %saga.loan_id,
                    book_id = %saga.book_id,
                    "Catalog quantity drifted, leaving {} saga pending",
                    saga.kind.as_str()
                );
                report.left_pending += 1;
            }
            Err(e) => {
                tracing::warn!(
                    saga_id = %saga.id,
                    loan_id = %saga.loan_id,
                    "Saga recovery attempt failed: {}",
                    e
                );
                report.left_pending += 1;
            }
        }
    }

    Ok(report)
}

/// 貸出作成サガの判定
///
/// 作成が成功として応答されるのは両段階が完了した場合だけなので、
/// 在庫が未反映のまま残った貸出は削除して補償する。
pub(super) async fn recover_checkout(
    deps: &ServiceDependencies,
    saga: &SagaRecord,
) -> std::result::Result<Option<SagaState>, BoxError> {
    let loan = deps.loan_store.get_by_id(saga.loan_id).await?;
    let book = deps.book_catalog.fetch(saga.book_id).await?;

    let state = match (loan, saga.progress(book.available_quantity)) {
        (Some(_), CatalogProgress::Applied) => Some(SagaState::Completed),
        (Some(_), CatalogProgress::NotApplied) => {
            deps.loan_store.delete(saga.loan_id).await?;
            Some(SagaState::Compensated)
        }
        // 補償の削除は済んでいる
        (None, CatalogProgress::NotApplied) => Some(SagaState::Compensated),
        // 貸出は消えたが在庫だけ減っている
        (None, CatalogProgress::Applied) => {
            let updated = book.with_quantity(book.available_quantity + 1);
            deps.book_catalog.update(saga.book_id, &updated).await?;
            Some(SagaState::Compensated)
        }
        (_, CatalogProgress::Drifted | CatalogProgress::Unobserved) => None,
    };

    Ok(state)
}

async fn recover_return(
    deps: &ServiceDependencies,
    saga: &SagaRecord,
) -> std::result::Result<Option<SagaState>, BoxError> {
    let loan = deps.loan_store.get_by_id(saga.loan_id).await?;

    // チェックポイント前に中断した
    match loan {
        Some(loan) if loan.status == LoanStatus::Returned => {}
        _ => return Ok(Some(SagaState::Compensated)),
    }

    if saga.observed_quantity.is_none() {
        restock(deps, saga).await?;
        return Ok(Some(SagaState::Completed));
    }

    let book = deps.book_catalog.fetch(saga.book_id).await?;
    let state = match saga.progress(book.available_quantity) {
        CatalogProgress::Applied => Some(SagaState::Completed),
        CatalogProgress::NotApplied => {
            let updated = book.with_quantity(book.available_quantity + 1);
            deps.book_catalog.update(saga.book_id, &updated).await?;
            Some(SagaState::Completed)
        }
        CatalogProgress::Drifted | CatalogProgress::Unobserved => None,
    };

    Ok(state)
}
