/// コマンドラインクライアント
///
/// 起動のたびに1回プローブし、オフライン→オンライン遷移なら送信とマージを行ってから
/// コマンドを実行する。
pub mod args;
pub mod render;

pub use args::{Cli, Commands};

use crate::features::expenses::models::Expense;
use crate::features::expenses::summary::{summarize_now, totals_by_category};
use crate::features::sync::{
    nudge_channel, ConnectivityHandle, ConnectivityMonitor, ExpenseView, HttpExpenseApi,
    LocalStore, Reconciler, RemoteExpenseApi, SyncService,
};
use crate::shared::config::ApiConfig;
use crate::shared::errors::{AppError, AppResult};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// 環境変数とCLI引数から設定を組み立てる
pub fn resolve_config(cli: &Cli) -> AppResult<ApiConfig> {
    let mut config = ApiConfig::from_env();
    if let Some(server) = &cli.server {
        config.base_url = server.trim_end_matches('/').to_string();
    }
    if let Some(db) = &cli.db {
        config.local_db_path = Some(db.clone());
    }
    config.validate()?;
    Ok(config)
}

/// CLIを実行する
pub async fn run(cli: Cli) -> AppResult<()> {
    let config = resolve_config(&cli)?;
    log::debug!("クライアント設定: {:?}", config.get_debug_info());

    let db_path = config.resolve_local_db_path()?;
    let store = LocalStore::open(&db_path)?;
    let remote: Arc<dyn RemoteExpenseApi> = Arc::new(HttpExpenseApi::new(&config)?);
    let connectivity = ConnectivityHandle::new(false);
    let reconciler = Arc::new(Reconciler::new(store, remote.clone(), connectivity.clone()));
    let mut monitor = ConnectivityMonitor::new(remote, connectivity.clone(), &config);

    if monitor.probe_once().await {
        let (report, _) = reconciler.sync_on_online().await?;
        if report.pushed > 0 || report.failed > 0 {
            println!(
                "未同期の変更を送信しました: 成功 {}件, 失敗 {}件",
                report.pushed, report.failed
            );
        }
    }

    match cli.command {
        Commands::List => print_view(&reconciler).await?,
        Commands::Add(args) => {
            let created = reconciler.create(args.into_draft()).await?;
            println!("追加しました: {}", created.id);
            print_view(&reconciler).await?;
        }
        Commands::Edit(args) => {
            let existing = find_visible(&reconciler, &args.id).await?;
            let edited = reconciler.edit(&args.id, args.apply_to(&existing)).await?;
            println!("更新しました: {}", edited.id);
            print_view(&reconciler).await?;
        }
        Commands::Delete { id } => {
            reconciler.delete(&id).await?;
            println!("削除しました: {id}");
            print_view(&reconciler).await?;
        }
        Commands::Summary => {
            let view = reconciler.load_view().await?;
            print_summary(&view, true);
        }
        Commands::Sync => {
            if !connectivity.is_online() {
                println!("リモートに接続できません。変更はローカルに保持されています");
            }
            print_view(&reconciler).await?;
        }
        Commands::Watch => watch_loop(reconciler, monitor).await?,
    }

    Ok(())
}

async fn find_visible(reconciler: &Reconciler, id: &str) -> AppResult<Expense> {
    reconciler
        .load_view()
        .await?
        .into_iter()
        .find(|item| item.expense.id == id)
        .map(|item| item.expense)
        .ok_or_else(|| AppError::not_found("Expense"))
}

async fn print_view(reconciler: &Reconciler) -> AppResult<()> {
    let view = reconciler.load_view().await?;
    print!(
        "{}",
        render::render_view(&view, reconciler.connectivity().is_online())
    );
    print_summary(&view, false);
    Ok(())
}

fn print_summary(view: &[ExpenseView], with_categories: bool) {
    let expenses: Vec<&Expense> = view.iter().map(|item| &item.expense).collect();
    print!(
        "{}",
        render::render_summary(&summarize_now(expenses.iter().copied()))
    );
    if with_categories {
        print!(
            "{}",
            render::render_category_totals(&totals_by_category(expenses.iter().copied()))
        );
    }
}

/// Ctrl-C まで監視と同期を続ける（Enterで即時プローブ）
async fn watch_loop(reconciler: Arc<Reconciler>, monitor: ConnectivityMonitor) -> AppResult<()> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (nudge_tx, nudge_rx) = nudge_channel();

    let service = SyncService::new(Arc::clone(&reconciler));
    let service_task = tokio::spawn(service.run(wait_for_stop(stop_rx.clone())));
    let monitor_task = tokio::spawn(monitor.run(nudge_rx, wait_for_stop(stop_rx)));

    println!("監視を開始しました（Enterで再確認、Ctrl-Cで終了）");
    print_view(&reconciler).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    log::error!("シグナル待機エラー: {e}");
                }
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    let _ = nudge_tx.try_send(());
                    print_view(&reconciler).await?;
                }
                Ok(None) | Err(_) => stdin_open = false,
            }
        }
    }

    let _ = stop_tx.send(true);
    for task in [service_task, monitor_task] {
        task.await
            .map_err(|e| AppError::concurrency(format!("バックグラウンドタスクの終了待ちに失敗: {e}")))?;
    }
    println!("監視を終了しました");
    Ok(())
}

async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
