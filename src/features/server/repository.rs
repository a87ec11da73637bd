use crate::features::expenses::models::Expense;
use crate::shared::config::{ServerConfig, StoreKind};
use crate::shared::database::{date_to_sql, expense_from_row, open_server_database, EXPENSE_COLUMNS};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// レコードサービスの永続化インターフェース
///
/// すべての変更操作は実装内の単一の書き込みロックを通る。
pub trait ExpenseRepository: Send + Sync {
    /// 全件を保存順で取得する
    fn list(&self) -> AppResult<Vec<Expense>>;

    /// 作成する（同じIDが既にあれば内容を置き換える）
    fn create(&self, expense: Expense) -> AppResult<Expense>;

    /// 既存レコードを更新する（未知のIDは NotFound）
    fn update(&self, expense: Expense) -> AppResult<Expense>;

    /// 削除する（未知のIDは NotFound）
    fn delete(&self, id: &str) -> AppResult<()>;
}

/// 設定に応じたリポジトリを開く
///
/// # 引数
/// * `config` - サーバー設定
///
/// # 戻り値
/// 共有可能なリポジトリ。JSONファイルが解析できない場合は起動エラー
pub fn open_repository(config: &ServerConfig) -> AppResult<Arc<dyn ExpenseRepository>> {
    let path = config.store_path();
    let repository: Arc<dyn ExpenseRepository> = match config.store {
        StoreKind::JsonFile => Arc::new(JsonFileRepository::open(path)?),
        StoreKind::Sqlite => Arc::new(SqliteRepository::open(&path)?),
    };
    Ok(repository)
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> AppResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| AppError::concurrency(format!("ストアのロック取得に失敗: {e}")))
}

/// 単一JSONファイルに全件を保存するリポジトリ
pub struct JsonFileRepository {
    path: PathBuf,
    records: Mutex<Vec<Expense>>,
}

impl JsonFileRepository {
    /// ファイルから読み込む
    ///
    /// ファイルが無ければ空のストアとして開始する。
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let records = Self::load(&path)?;

        log::info!(
            "JSONストアを開きました: path={path:?}, records={}",
            records.len()
        );

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn load(path: &Path) -> AppResult<Vec<Expense>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AppError::configuration(format!("ストアファイルを解析できません {path:?}: {e}"))
        })
    }

    /// 一時ファイルに書き出してから置き換える
    fn write_all(&self, records: &[Expense]) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(records)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// 書き込み失敗はログのみ（メモリ上の状態は維持する）
    fn persist(&self, records: &[Expense]) {
        if let Err(e) = self.write_all(records) {
            log::error!("ストアファイルの書き込みに失敗しました: {}", e.details());
        }
    }
}

impl ExpenseRepository for JsonFileRepository {
    fn list(&self) -> AppResult<Vec<Expense>> {
        Ok(lock(&self.records)?.clone())
    }

    fn create(&self, expense: Expense) -> AppResult<Expense> {
        let mut records = lock(&self.records)?;

        match records.iter_mut().find(|r| r.id == expense.id) {
            Some(existing) => {
                log::debug!("既存IDへの作成を上書きとして扱います: {}", expense.id);
                *existing = expense.clone();
            }
            None => records.push(expense.clone()),
        }

        self.persist(&records);
        Ok(expense)
    }

    fn update(&self, expense: Expense) -> AppResult<Expense> {
        let mut records = lock(&self.records)?;

        let existing = records
            .iter_mut()
            .find(|r| r.id == expense.id)
            .ok_or_else(|| AppError::not_found("Expense"))?;
        *existing = expense.clone();

        self.persist(&records);
        Ok(expense)
    }

    fn delete(&self, id: &str) -> AppResult<()> {
        let mut records = lock(&self.records)?;

        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AppError::not_found("Expense"))?;
        records.remove(index);

        self.persist(&records);
        Ok(())
    }
}

/// SQLiteに保存するリポジトリ
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// データベースファイルを開く
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = open_server_database(path)?;
        Ok(Self::from_connection(conn))
    }

    /// 初期化済みの接続から作成する
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl ExpenseRepository for SqliteRepository {
    fn list(&self) -> AppResult<Vec<Expense>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY rowid"
        ))?;
        let expenses = stmt.query_map([], expense_from_row)?;
        Ok(expenses.collect::<Result<Vec<_>, _>>()?)
    }

    fn create(&self, expense: Expense) -> AppResult<Expense> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO expenses (id, amount, description, category, date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                amount = excluded.amount,
                description = excluded.description,
                category = excluded.category,
                date = excluded.date",
            params![
                expense.id,
                expense.amount,
                expense.description,
                expense.category.as_str(),
                date_to_sql(expense.date)
            ],
        )?;
        Ok(expense)
    }

    fn update(&self, expense: Expense) -> AppResult<Expense> {
        let conn = lock(&self.conn)?;
        let changed = conn.execute(
            "UPDATE expenses SET amount = ?2, description = ?3, category = ?4, date = ?5
             WHERE id = ?1",
            params![
                expense.id,
                expense.amount,
                expense.description,
                expense.category.as_str(),
                date_to_sql(expense.date)
            ],
        )?;

        if changed == 0 {
            return Err(AppError::not_found("Expense"));
        }
        Ok(expense)
    }

    fn delete(&self, id: &str) -> AppResult<()> {
        let conn = lock(&self.conn)?;
        let changed = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

        if changed == 0 {
            return Err(AppError::not_found("Expense"));
        }
        Ok(())
    }
}
