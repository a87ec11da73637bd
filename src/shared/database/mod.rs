/// データベース接続・スキーマ管理
pub mod connection;
/// 行と経費モデルの相互変換
pub mod rows;

pub use connection::{
    create_local_tables, create_server_tables, open_local_database, open_local_in_memory,
    open_server_database,
};
pub use rows::{date_to_sql, expense_from_row, EXPENSE_COLUMNS};
