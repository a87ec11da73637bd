/// 機能モジュール（経費・レコードサービス・同期）
pub mod features;

/// 共有モジュール（エラー・設定・データベース・ユーティリティ）
pub mod shared;

/// コマンドラインクライアント
pub mod cli;

pub use shared::errors::{AppError, AppResult};
