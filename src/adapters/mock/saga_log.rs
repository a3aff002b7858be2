use crate::domain::saga::{SagaRecord, SagaState};
use crate::domain::value_objects::SagaId;
use crate::ports::saga_log::{Result, SagaLog as SagaLogTrait};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// SagaLogのインメモリ実装
///
/// 記録はすべて保持し、テストから状態を確認できる。
pub struct SagaLog {
    records: Mutex<Vec<SagaRecord>>,
    fail_opens: AtomicBool,
    fail_observes: AtomicBool,
}

impl SagaLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_opens: AtomicBool::new(false),
            fail_observes: AtomicBool::new(false),
        }
    }

    /// 意図レコードの記録を失敗させる
    pub fn set_fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// 観測値の記録を失敗させる
    pub fn set_fail_observes(&self, fail: bool) {
        self.fail_observes.store(fail, Ordering::SeqCst);
    }

    /// 記録順のスナップショット
    pub fn records(&self) -> Vec<SagaRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for SagaLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SagaLogTrait for SagaLog {
    async fn open(&self, record: SagaRecord) -> Result<()> {
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err("saga log unavailable".into());
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn observe(&self, saga_id: SagaId, quantity: i32) -> Result<()> {
        if self.fail_observes.load(Ordering::SeqCst) {
            return Err("saga log unavailable".into());
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == saga_id)
            .ok_or_else(|| format!("saga {} not found", saga_id))?;
        record.observed_quantity = Some(quantity);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn close(&self, saga_id: SagaId, state: SagaState) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == saga_id)
            .ok_or_else(|| format!("saga {} not found", saga_id))?;
        record.state = state;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<SagaRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.state == SagaState::Pending)
            .cloned()
            .collect())
    }
}
