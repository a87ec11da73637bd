use clap::Parser;
use keihi_sync_lib::cli::{self, Cli};
use keihi_sync_lib::shared::config::{initialize_logging_system, load_environment_variables};
use keihi_sync_lib::AppResult;

#[tokio::main]
async fn main() -> AppResult<()> {
    // 環境変数を読み込んでからログを初期化する
    load_environment_variables();
    initialize_logging_system();

    let cli = Cli::parse();

    if let Err(e) = cli::run(cli).await {
        log::error!("コマンドの実行に失敗しました: {}", e.details());
        eprintln!("エラー: {}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}
