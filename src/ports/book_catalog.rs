use crate::domain::value_objects::BookId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// カタログサービスのエラー
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 書籍が存在しない
    #[error("book {0} not found")]
    NotFound(BookId),

    /// 200以外のステータス
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// 接続失敗・タイムアウトなど
    #[error("transport error: {0}")]
    Transport(String),

    /// レスポンスの形式が不正
    #[error("invalid book record: {0}")]
    InvalidRecord(String),

    /// 接続先が1つも設定されていない
    #[error("no catalog address configured")]
    NoAddress,
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// カタログの書籍レコード
///
/// 貸出コンテキストが扱うのは在庫数のみ。
/// それ以外のフィールドは`extra`にそのまま保持し、丸ごと書き戻す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: BookId,
    pub available_quantity: i32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BookRecord {
    pub fn new(id: BookId, available_quantity: i32) -> Self {
        Self {
            id,
            available_quantity,
            extra: serde_json::Map::new(),
        }
    }

    /// 在庫数を差し替えたレコードを返す
    pub fn with_quantity(&self, available_quantity: i32) -> Self {
        Self {
            available_quantity,
            ..self.clone()
        }
    }
}

/// カタログサービスポート
///
/// 貸出コンテキストとカタログコンテキストの境界。
/// 書籍レコードは取得と全体置換のみで、部分更新は行わない。
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// 書籍レコードを取得する
    async fn fetch(&self, book_id: BookId) -> Result<BookRecord>;

    /// 書籍レコードを丸ごと置き換える
    async fn update(&self, book_id: BookId, record: &BookRecord) -> Result<()>;
}
