use super::models::{LocalExpense, SyncState};
use crate::features::expenses::models::Expense;
use crate::shared::database::{
    date_to_sql, expense_from_row, open_local_database, open_local_in_memory, EXPENSE_COLUMNS,
};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// クライアント側のローカル経費ストア
///
/// 接続は `Mutex` で保護し、await をまたいで保持しない。
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// データベースファイルを開く
    pub fn open(path: &Path) -> AppResult<Self> {
        Ok(Self::from_connection(open_local_database(path)?))
    }

    /// インメモリのストアを開く
    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::from_connection(open_local_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::concurrency(format!("ローカルストアのロック取得に失敗: {e}")))
    }

    /// レコードを書き込む（既存IDは挿入順を保ったまま上書き）
    pub fn put(&self, record: &LocalExpense) -> AppResult<()> {
        let conn = self.lock()?;
        upsert(&conn, &record.expense, record.state)?;
        Ok(())
    }

    /// IDでレコードを取得する
    pub fn get(&self, id: &str) -> AppResult<Option<LocalExpense>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {EXPENSE_COLUMNS}, sync_state FROM local_expenses WHERE id = ?1"),
                params![id],
                local_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 全件を挿入順で取得する
    pub fn get_all(&self) -> AppResult<Vec<LocalExpense>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXPENSE_COLUMNS}, sync_state FROM local_expenses ORDER BY rowid"
        ))?;
        let records = stmt.query_map([], local_from_row)?;
        Ok(records.collect::<Result<Vec<_>, _>>()?)
    }

    /// レコードを削除する
    ///
    /// # 戻り値
    /// 削除した場合はtrue
    pub fn delete(&self, id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM local_expenses WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// 同期状態だけを更新する
    pub fn set_state(&self, id: &str, state: SyncState) -> AppResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE local_expenses SET sync_state = ?2 WHERE id = ?1",
            params![id, state.as_str()],
        )?;

        if changed == 0 {
            return Err(AppError::not_found("Expense"));
        }
        Ok(())
    }

    /// リモートが別のIDを返した場合にローカルのレコードを付け替える
    ///
    /// # 引数
    /// * `old_id` - ローカルで採番したID
    /// * `expense` - リモートが返したレコード（新しいIDを含む）
    /// * `state` - 付け替え後の同期状態
    pub fn rekey(&self, old_id: &str, expense: &Expense, state: SyncState) -> AppResult<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM local_expenses WHERE id = ?1 AND id <> ?2",
            params![expense.id, old_id],
        )?;
        let changed = tx.execute(
            "UPDATE local_expenses
             SET id = ?2, amount = ?3, description = ?4, category = ?5, date = ?6, sync_state = ?7
             WHERE id = ?1",
            params![
                old_id,
                expense.id,
                expense.amount,
                expense.description,
                expense.category.as_str(),
                date_to_sql(expense.date),
                state.as_str()
            ],
        )?;

        if changed == 0 {
            return Err(AppError::not_found("Expense"));
        }

        tx.commit()?;
        log::info!("ローカルIDを付け替えました: {old_id} -> {}", expense.id);
        Ok(())
    }

    /// リモートの一覧をローカルに書き戻す（単一トランザクション）
    ///
    /// - リモートの各レコードを Clean として上書きする。ただし PendingUpdate / PendingDelete は残す
    /// - リモートに存在しない Clean レコードは削除する
    pub fn apply_remote(&self, remote: &[Expense]) -> AppResult<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut write_back = tx.prepare(
                "INSERT INTO local_expenses (id, amount, description, category, date, sync_state)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'clean')
                 ON CONFLICT(id) DO UPDATE SET
                    amount = excluded.amount,
                    description = excluded.description,
                    category = excluded.category,
                    date = excluded.date,
                    sync_state = 'clean'
                 WHERE local_expenses.sync_state NOT IN ('pending_update', 'pending_delete')",
            )?;
            for expense in remote {
                write_back.execute(params![
                    expense.id,
                    expense.amount,
                    expense.description,
                    expense.category.as_str(),
                    date_to_sql(expense.date)
                ])?;
            }
        }

        let remote_ids: HashSet<&str> = remote.iter().map(|e| e.id.as_str()).collect();
        let clean_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM local_expenses WHERE sync_state = 'clean'")?;
            let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;
            ids.collect::<Result<Vec<_>, _>>()?
        };

        let mut pruned = 0;
        for id in clean_ids.iter().filter(|id| !remote_ids.contains(id.as_str())) {
            pruned += tx.execute("DELETE FROM local_expenses WHERE id = ?1", params![id])?;
        }

        tx.commit()?;
        log::debug!(
            "リモート一覧を書き戻しました: remote={}, pruned={pruned}",
            remote.len()
        );
        Ok(())
    }
}

fn upsert(conn: &Connection, expense: &Expense, state: SyncState) -> AppResult<()> {
    conn.execute(
        "INSERT INTO local_expenses (id, amount, description, category, date, sync_state)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            amount = excluded.amount,
            description = excluded.description,
            category = excluded.category,
            date = excluded.date,
            sync_state = excluded.sync_state",
        params![
            expense.id,
            expense.amount,
            expense.description,
            expense.category.as_str(),
            date_to_sql(expense.date),
            state.as_str()
        ],
    )?;
    Ok(())
}

fn local_from_row(row: &Row<'_>) -> rusqlite::Result<LocalExpense> {
    let expense = expense_from_row(row)?;
    let state: String = row.get(5)?;
    let state = state
        .parse::<SyncState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(LocalExpense { expense, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::expenses::models::Category;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn expense(id: &str, amount: f64) -> Expense {
        Expense {
            id: id.to_string(),
            amount,
            description: format!("item {id}"),
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    fn ids(store: &LocalStore) -> Vec<(String, SyncState)> {
        store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|r| (r.expense.id, r.state))
            .collect()
    }

    #[test]
    fn test_put_get_delete() {
        let store = LocalStore::in_memory().unwrap();
        let record = LocalExpense::new(expense("1", 12.5), SyncState::PendingCreate);

        store.put(&record).unwrap();
        assert_eq!(store.get("1").unwrap(), Some(record));
        assert_eq!(store.get("2").unwrap(), None);

        assert!(store.delete("1").unwrap());
        assert!(!store.delete("1").unwrap());
    }

    #[test]
    fn test_put_keeps_insertion_order() {
        let store = LocalStore::in_memory().unwrap();
        for id in ["a", "b", "c"] {
            store
                .put(&LocalExpense::new(expense(id, 1.0), SyncState::Clean))
                .unwrap();
        }
        store
            .put(&LocalExpense::new(expense("a", 9.0), SyncState::PendingUpdate))
            .unwrap();

        assert_eq!(
            ids(&store),
            vec![
                ("a".to_string(), SyncState::PendingUpdate),
                ("b".to_string(), SyncState::Clean),
                ("c".to_string(), SyncState::Clean),
            ]
        );
    }

    #[test]
    fn test_set_state_unknown_id() {
        let store = LocalStore::in_memory().unwrap();
        assert!(matches!(
            store.set_state("missing", SyncState::Clean),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_rekey_preserves_position() {
        let store = LocalStore::in_memory().unwrap();
        store
            .put(&LocalExpense::new(expense("local", 1.0), SyncState::PendingCreate))
            .unwrap();
        store
            .put(&LocalExpense::new(expense("other", 2.0), SyncState::Clean))
            .unwrap();

        store
            .rekey("local", &expense("server-7", 1.0), SyncState::Clean)
            .unwrap();

        assert_eq!(
            ids(&store),
            vec![
                ("server-7".to_string(), SyncState::Clean),
                ("other".to_string(), SyncState::Clean),
            ]
        );
        assert!(store.get("local").unwrap().is_none());
    }

    #[test]
    fn test_apply_remote_rules() {
        let store = LocalStore::in_memory().unwrap();
        let put = |id: &str, amount: f64, state: SyncState| {
            store
                .put(&LocalExpense::new(expense(id, amount), state))
                .unwrap()
        };
        put("clean-stale", 1.0, SyncState::Clean);
        put("clean-gone", 1.0, SyncState::Clean);
        put("landed", 1.0, SyncState::PendingCreate);
        put("edited", 5.0, SyncState::PendingUpdate);
        put("deleted", 1.0, SyncState::PendingDelete);
        put("new-local", 1.0, SyncState::PendingCreate);

        let remote = vec![
            expense("clean-stale", 2.0),
            expense("landed", 1.0),
            expense("edited", 3.0),
            expense("deleted", 1.0),
            expense("remote-only", 4.0),
        ];
        store.apply_remote(&remote).unwrap();

        assert_eq!(
            ids(&store),
            vec![
                ("clean-stale".to_string(), SyncState::Clean),
                ("landed".to_string(), SyncState::Clean),
                ("edited".to_string(), SyncState::PendingUpdate),
                ("deleted".to_string(), SyncState::PendingDelete),
                ("new-local".to_string(), SyncState::PendingCreate),
                ("remote-only".to_string(), SyncState::Clean),
            ]
        );
        assert_eq!(store.get("clean-stale").unwrap().unwrap().expense.amount, 2.0);
        assert_eq!(store.get("edited").unwrap().unwrap().expense.amount, 5.0);
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.db");

        {
            let store = LocalStore::open(&path).unwrap();
            store
                .put(&LocalExpense::new(expense("1", 12.5), SyncState::PendingCreate))
                .unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(
            ids(&store),
            vec![("1".to_string(), SyncState::PendingCreate)]
        );
    }
}
