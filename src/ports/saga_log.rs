use crate::domain::saga::{SagaRecord, SagaState};
use crate::domain::value_objects::SagaId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// サガ意図ログポート
///
/// 貸出ストアとカタログの間に共有トランザクションがないため、
/// 第2段階が未確定のサガを永続的に記録し、中断後に検出・再開できるようにする。
#[async_trait]
pub trait SagaLog: Send + Sync {
    /// 意図レコードを記録する
    async fn open(&self, record: SagaRecord) -> Result<()>;

    /// カタログ更新直前に観測した在庫数を記録する
    async fn observe(&self, saga_id: SagaId, quantity: i32) -> Result<()>;

    /// サガを終了状態にする
    async fn close(&self, saga_id: SagaId, state: SagaState) -> Result<()>;

    /// 未確定のサガを古い順に取得する
    async fn pending(&self) -> Result<Vec<SagaRecord>>;
}
