use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::Path;

/// ローカルデータベースを開き、テーブルを作成する
///
/// # 引数
/// * `path` - データベースファイルのパス（親ディレクトリは必要に応じて作成）
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
pub fn open_local_database(path: &Path) -> AppResult<Connection> {
    ensure_parent_dir(path)?;

    let conn = Connection::open(path)?;
    create_local_tables(&conn)?;

    log::info!("ローカルデータベースを初期化しました: {path:?}");
    Ok(conn)
}

/// インメモリのローカルデータベースを開く（テスト用）
pub fn open_local_in_memory() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_local_tables(&conn)?;
    Ok(conn)
}

/// サーバー側SQLiteストアを開く
///
/// # 引数
/// * `path` - データベースファイルのパス
pub fn open_server_database(path: &Path) -> AppResult<Connection> {
    ensure_parent_dir(path)?;

    let conn = Connection::open(path)?;
    create_server_tables(&conn)?;

    log::info!("サーバーデータベースを初期化しました: {path:?}");
    Ok(conn)
}

fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::configuration(format!("データディレクトリの作成に失敗: {e}"))
            })?;
            log::info!("データディレクトリを作成: {parent:?}");
        }
    }
    Ok(())
}

/// クライアント側のテーブルを作成する
///
/// 挿入順は rowid で保持する。id を書き換えても rowid は変わらない。
pub fn create_local_tables(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS local_expenses (
            id TEXT PRIMARY KEY NOT NULL,
            amount REAL NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            sync_state TEXT NOT NULL DEFAULT 'pending_create'
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_local_expenses_state ON local_expenses(sync_state)",
        [],
    )?;

    log::debug!("ローカル経費テーブルを確認しました");
    Ok(())
}

/// サーバー側SQLiteストアのテーブルを作成する
pub fn create_server_tables(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY NOT NULL,
            amount REAL NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)",
        [],
    )?;

    Ok(())
}
