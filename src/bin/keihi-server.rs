use keihi_sync_lib::features::server::{open_repository, ExpenseServer};
use keihi_sync_lib::shared::config::{
    initialize_logging_system, load_environment_variables, ServerConfig,
};
use keihi_sync_lib::{AppError, AppResult};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> AppResult<()> {
    load_environment_variables();
    initialize_logging_system();

    log::info!("経費レコードサービスの初期化を開始します...");

    let config = ServerConfig::from_env()?;
    log::debug!("サーバー設定: {:?}", config.get_debug_info());

    // 壊れたストアファイルはここで起動エラーになる
    let repository = open_repository(&config)?;

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| AppError::configuration(format!("invalid listen address: {e}")))?;
    let server = ExpenseServer::bind(addr, repository).await?;

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("シグナル待機エラー: {e}");
            }
        })
        .await?;

    log::info!("経費レコードサービスを終了しました");
    Ok(())
}
