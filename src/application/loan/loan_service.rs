use crate::domain::{
    self,
    commands::*,
    loan::Loan,
    saga::{SagaKind, SagaRecord, SagaState},
    value_objects::*,
};
use crate::ports::*;
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;

use super::book_locks::BookLocks;
use super::errors::{LoanApplicationError, Result};
use super::saga_recovery::recover_checkout;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
/// プロセス全体のグローバル変数は使わず、起動時に一度だけ組み立てて共有する。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub loan_store: Arc<dyn LoanStore>,
    pub saga_log: Arc<dyn SagaLog>,
    pub book_catalog: Arc<dyn BookCatalog>,
    pub book_locks: Arc<BookLocks>,
}

impl ServiceDependencies {
    pub fn new(
        loan_store: Arc<dyn LoanStore>,
        saga_log: Arc<dyn SagaLog>,
        book_catalog: Arc<dyn BookCatalog>,
    ) -> Self {
        Self {
            loan_store,
            saga_log,
            book_catalog,
            book_locks: Arc::new(BookLocks::new()),
        }
    }
}

/// 現在時刻（ワイヤ表現に合わせてマイクロ秒に丸める）
pub(super) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// 未確定のサガを終了状態にするヘルパー関数
///
/// 失敗してもサガは`Pending`のまま残り、復旧処理で再判定されるため、
/// 呼び出し元にはエラーを返さずログのみ出力する。
pub(super) async fn close_saga(deps: &ServiceDependencies, saga: &SagaRecord, state: SagaState) {
    if let Err(e) = deps.saga_log.close(saga.id, state).await {
        tracing::error!(
            saga_id = %saga.id,
            loan_id = %saga.loan_id,
            "Failed to close saga as {}: {}",
            state.as_str(),
            e
        );
    }
}

/// 書籍を貸し出す
///
/// サガの手順：
/// 1. 書籍ごとのロックを取得（同じ書籍への同時貸出を直列化）
/// 2. カタログから書籍を取得し、在庫を確認
/// 3. 貸出IDを予約し、そのIDで意図レコードを記録
/// 4. 貸出を挿入（チェックポイント）
/// 5. 在庫を1減らして書籍レコードを丸ごと書き戻す
/// 6. 5が失敗した場合は貸出を削除し、在庫の状態を確かめて補償する
///    （タイムアウトでも書き込みが届いていれば在庫を戻す）
///
/// # 一貫性保証
///
/// 貸出の行は必ず意図レコードより後に作られる。
/// 挿入や補償の途中で失敗・停止しても、サガは`Pending`のまま残り、
/// `recover_pending_sagas`で検出・補償できる。
pub async fn create_loan(deps: &ServiceDependencies, cmd: CreateLoan) -> Result<Loan> {
    let (Some(user_id), Some(book_id)) = (cmd.user_id, cmd.book_id) else {
        return Err(LoanApplicationError::Validation(
            "User ID and Book ID are required",
        ));
    };

    // 1. 書籍ごとの排他
    let _guard = deps.book_locks.acquire(book_id).await;

    // 2. 書籍の取得と在庫確認
    let book = deps.book_catalog.fetch(book_id).await.map_err(|e| {
        tracing::warn!(book_id = %book_id, "Error fetching book: {}", e);
        LoanApplicationError::BookLookupFailed(e)
    })?;

    if book.available_quantity <= 0 {
        return Err(LoanApplicationError::BookNotAvailable);
    }

    // 3. 意図レコード（この時点ではどこにも書き込んでいない）
    let loan_id = deps
        .loan_store
        .reserve_id()
        .await
        .map_err(LoanApplicationError::LoanStoreError)?;

    let saga = SagaRecord::open(
        SagaKind::Checkout,
        loan_id,
        book_id,
        Some(book.available_quantity),
        now(),
    );
    deps.saga_log
        .open(saga.clone())
        .await
        .map_err(LoanApplicationError::SagaLogError)?;

    // 4. チェックポイント
    let new_loan = domain::loan::open_loan(user_id, book_id, now());
    let loan = match deps.loan_store.insert(loan_id, new_loan).await {
        Ok(loan) => loan,
        Err(e) => {
            tracing::warn!(saga_id = %saga.id, loan_id = %loan_id, "Error inserting loan: {}", e);
            settle_checkout(deps, &saga).await;
            return Err(LoanApplicationError::LoanStoreError(e));
        }
    };

    // 5. 在庫の減算
    let updated = book.with_quantity(book.available_quantity - 1);
    if let Err(e) = deps.book_catalog.update(book_id, &updated).await {
        tracing::warn!(
            loan_id = %loan.id,
            book_id = %book_id,
            "Error updating book quantity, compensating: {}",
            e
        );

        // 6. 補償：貸出を削除し、在庫が本当に動いていないかを確かめてから閉じる
        match deps.loan_store.delete(loan.id).await {
            Ok(()) => settle_checkout(deps, &saga).await,
            Err(delete_err) => tracing::error!(
                saga_id = %saga.id,
                loan_id = %loan.id,
                "Compensation failed, saga left pending: {}",
                delete_err
            ),
        }

        return Err(LoanApplicationError::CheckoutCatalogUpdateFailed(e));
    }

    close_saga(deps, &saga, SagaState::Completed).await;

    tracing::info!(
        loan_id = %loan.id,
        user_id = %user_id,
        book_id = %book_id,
        "Created loan"
    );
    Ok(loan)
}

/// 失敗した貸出作成サガを、貸出ストアとカタログの現在値から閉じる
///
/// 判定できない場合は`Pending`のまま残す。
async fn settle_checkout(deps: &ServiceDependencies, saga: &SagaRecord) {
    match recover_checkout(deps, saga).await {
        Ok(Some(state)) => close_saga(deps, saga, state).await,
        Ok(None) => tracing::warn!(
            saga_id = %saga.id,
            book_id = %saga.book_id,
            "Catalog quantity drifted during compensation, saga left pending"
        ),
        Err(e) => tracing::warn!(
            saga_id = %saga.id,
            "Could not confirm catalog state, saga left pending: {}",
            e
        ),
    }
}

/// 書籍を返却する
///
/// サガの手順：
/// 1. 貸出を取得し、返却済みでないことを確認（冪等ではない）
/// 2. 意図レコードを記録
/// 3. 返却日・ステータスを更新（チェックポイント）
/// 4. 在庫を1増やして書籍レコードを丸ごと書き戻す
///
/// # 一貫性保証
///
/// 4が失敗しても返却は取り消さない。サガは`Pending`のまま残り、
/// `recover_pending_sagas`が在庫の加算をやり直す。
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<Loan> {
    let Some(loan_id) = cmd.loan_id else {
        return Err(LoanApplicationError::Validation("Loan ID is required"));
    };

    // 1. 貸出の取得と状態確認
    let loan = deps
        .loan_store
        .get_by_id(loan_id)
        .await
        .map_err(LoanApplicationError::LoanStoreError)?
        .ok_or(LoanApplicationError::LoanNotFound)?;

    let returned_at = now();
    domain::loan::return_loan(&loan, returned_at)
        .map_err(|_| LoanApplicationError::LoanAlreadyReturned)?;

    let _guard = deps.book_locks.acquire(loan.book_id).await;

    // 2. 意図レコード
    let saga = SagaRecord::open(SagaKind::Return, loan_id, loan.book_id, None, returned_at);
    deps.saga_log
        .open(saga.clone())
        .await
        .map_err(LoanApplicationError::SagaLogError)?;

    // 3. チェックポイント（ACTIVEの行だけを更新する）
    let returned = match deps.loan_store.mark_returned(loan_id, returned_at).await {
        Ok(Some(returned)) => returned,
        Ok(None) => {
            close_saga(deps, &saga, SagaState::Compensated).await;
            return Err(LoanApplicationError::LoanAlreadyReturned);
        }
        Err(e) => {
            close_saga(deps, &saga, SagaState::Compensated).await;
            return Err(LoanApplicationError::LoanStoreError(e));
        }
    };

    // 4. 在庫の加算
    if let Err(e) = restock(deps, &saga).await {
        tracing::error!(
            saga_id = %saga.id,
            loan_id = %loan_id,
            book_id = %loan.book_id,
            "Error updating book quantity on return, saga left pending: {:?}",
            e
        );
        return Err(e);
    }

    close_saga(deps, &saga, SagaState::Completed).await;

    tracing::info!(loan_id = %loan_id, "Returned loan");
    Ok(returned)
}

/// 返却サガの第2段階：書籍を取得し、観測値を記録してから在庫を1増やす
///
/// 観測値を記録できなければ書き込まない。
pub(super) async fn restock(deps: &ServiceDependencies, saga: &SagaRecord) -> Result<()> {
    let book = deps
        .book_catalog
        .fetch(saga.book_id)
        .await
        .map_err(LoanApplicationError::ReturnCatalogUpdateFailed)?;

    deps.saga_log
        .observe(saga.id, book.available_quantity)
        .await
        .map_err(LoanApplicationError::SagaLogError)?;

    let updated = book.with_quantity(book.available_quantity + 1);
    deps.book_catalog
        .update(saga.book_id, &updated)
        .await
        .map_err(LoanApplicationError::ReturnCatalogUpdateFailed)
}

/// IDで貸出を取得する
///
/// 存在しない場合は`LoanNotFound`。
pub async fn get_loan_by_id(deps: &ServiceDependencies, loan_id: Option<LoanId>) -> Result<Loan> {
    let Some(loan_id) = loan_id else {
        return Err(LoanApplicationError::Validation("Loan ID is required"));
    };

    deps.loan_store
        .get_by_id(loan_id)
        .await
        .map_err(LoanApplicationError::LoanStoreError)?
        .ok_or(LoanApplicationError::LoanNotFound)
}

/// 利用者の貸出一覧を取得する
///
/// 該当なし・ストア障害のどちらでも空の一覧を返す（障害にはしない）。
/// 並び順は貸出日の新しい順。
pub async fn get_loans_by_user(deps: &ServiceDependencies, user_id: Option<UserId>) -> Vec<Loan> {
    let Some(user_id) = user_id else {
        return Vec::new();
    };

    match deps.loan_store.find_by_user(user_id).await {
        Ok(mut loans) => {
            domain::loan::sort_newest_first(&mut loans);
            loans
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, "Error querying loans for user: {}", e);
            Vec::new()
        }
    }
}

/// 全貸出を取得する
///
/// ストア障害時は空の一覧を返す。並び順は貸出日の新しい順。
pub async fn get_all_loans(deps: &ServiceDependencies) -> Vec<Loan> {
    match deps.loan_store.find_all().await {
        Ok(mut loans) => {
            domain::loan::sort_newest_first(&mut loans);
            loans
        }
        Err(e) => {
            tracing::error!("Error querying all loans: {}", e);
            Vec::new()
        }
    }
}
