// テスト用のインメモリ・リモート

use super::remote::RemoteExpenseApi;
use crate::features::expenses::models::Expense;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    records: Vec<Expense>,
    calls: Vec<String>,
    unreachable: bool,
    id_prefix: Option<String>,
    next_id: usize,
    rejected: HashSet<String>,
}

/// 呼び出しを記録するリモートの代役
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn seed(&self, records: Vec<Expense>) {
        self.state.lock().unwrap().records = records;
    }

    pub fn records(&self) -> Vec<Expense> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().unreachable = !reachable;
    }

    /// 作成時にサーバー側でIDを採番する
    pub fn assign_ids(&self, prefix: &str) {
        self.state.lock().unwrap().id_prefix = Some(prefix.to_string());
    }

    /// 指定IDの作成・更新を400で拒否する
    pub fn reject_id(&self, id: &str) {
        self.state.lock().unwrap().rejected.insert(id.to_string());
    }

    fn begin(&self, call: String) -> AppResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(AppError::transport("connection refused"));
        }
        state.calls.push(call);
        Ok(state)
    }
}

#[async_trait]
impl RemoteExpenseApi for FakeRemote {
    async fn list(&self) -> AppResult<Vec<Expense>> {
        let state = self.begin("GET".to_string())?;
        Ok(state.records.clone())
    }

    async fn create(&self, expense: &Expense) -> AppResult<Expense> {
        let mut state = self.begin(format!("POST {}", expense.id))?;
        if state.rejected.contains(&expense.id) {
            return Err(AppError::validation("rejected"));
        }

        let mut stored = expense.clone();
        if let Some(prefix) = state.id_prefix.clone() {
            state.next_id += 1;
            stored.id = format!("{prefix}{}", state.next_id);
        }

        match state.records.iter_mut().find(|r| r.id == stored.id) {
            Some(existing) => *existing = stored.clone(),
            None => state.records.push(stored.clone()),
        }
        Ok(stored)
    }

    async fn update(&self, expense: &Expense) -> AppResult<Expense> {
        let mut state = self.begin(format!("PUT {}", expense.id))?;
        if state.rejected.contains(&expense.id) {
            return Err(AppError::validation("rejected"));
        }

        let existing = state
            .records
            .iter_mut()
            .find(|r| r.id == expense.id)
            .ok_or_else(|| AppError::not_found("Expense"))?;
        *existing = expense.clone();
        Ok(expense.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut state = self.begin(format!("DELETE {id}"))?;
        let index = state
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AppError::not_found("Expense"))?;
        state.records.remove(index);
        Ok(())
    }

    async fn probe(&self) -> AppResult<()> {
        if self.state.lock().unwrap().unreachable {
            return Err(AppError::transport("connection refused"));
        }
        Ok(())
    }
}
