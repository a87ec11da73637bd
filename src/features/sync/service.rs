use super::connectivity::Connectivity;
use super::reconciler::Reconciler;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// 接続状態を監視し、オンライン遷移ごとに送信とマージを1回実行する
pub struct SyncService {
    reconciler: Arc<Reconciler>,
    rx: watch::Receiver<Connectivity>,
    handled_epoch: u64,
}

impl SyncService {
    /// 作成時点の状態を処理済みとして購読を開始する
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let mut rx = reconciler.connectivity().subscribe();
        let handled_epoch = rx.borrow_and_update().online_epoch;
        Self {
            reconciler,
            rx,
            handled_epoch,
        }
    }

    /// `shutdown` が完了するまで遷移を待ち続ける
    ///
    /// 短時間に複数回遷移した場合はまとめて1回のスイープになる。
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let rx = &mut self.rx;
        let mut handled_epoch = self.handled_epoch;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let state = *rx.borrow_and_update();
            if !state.online || state.online_epoch == handled_epoch {
                continue;
            }
            handled_epoch = state.online_epoch;

            match self.reconciler.sync_on_online().await {
                Ok((report, view)) => log::info!(
                    "同期しました: 送信={}, 失敗={}, 表示={}件",
                    report.pushed,
                    report.failed,
                    view.len()
                ),
                Err(e) => log::error!("同期処理エラー: {}", e.details()),
            }
        }

        log::debug!("同期サービスを終了しました");
    }
}
