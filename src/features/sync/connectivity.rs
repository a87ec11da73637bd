use super::remote::RemoteExpenseApi;
use crate::shared::config::ApiConfig;
use crate::shared::errors::AppResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// 接続状態のスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
    pub online: bool,
    /// オフライン→オンライン遷移の通し番号
    pub online_epoch: u64,
}

/// 共有の「オンライン」シグナル
///
/// 通信失敗を観測したコンポーネントはどれでもオフラインに落とせる。
#[derive(Clone)]
pub struct ConnectivityHandle {
    tx: Arc<watch::Sender<Connectivity>>,
}

impl Default for ConnectivityHandle {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ConnectivityHandle {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(Connectivity {
            online,
            online_epoch: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }

    pub fn snapshot(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// 状態を設定する
    ///
    /// # 戻り値
    /// オフラインからオンラインへ遷移した場合はtrue
    pub fn set_online(&self, online: bool) -> bool {
        let mut came_online = false;
        self.tx.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            if online {
                state.online_epoch += 1;
                came_online = true;
            }
            true
        });

        if came_online {
            log::info!("オンラインになりました");
        }
        came_online
    }

    /// 通信失敗を観測したときにオフラインへ落とす
    pub fn force_offline(&self) {
        if self.is_online() {
            log::warn!("通信エラーのためオフラインに切り替えます");
        }
        self.set_online(false);
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

/// 外部からの接続変化通知（ナッジ）用チャンネルを作る
pub fn nudge_channel() -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
    mpsc::channel(8)
}

/// 定期プローブとナッジでリモートの到達性を監視する
pub struct ConnectivityMonitor {
    remote: Arc<dyn RemoteExpenseApi>,
    handle: ConnectivityHandle,
    interval: Duration,
    offline_after_failures: u32,
    consecutive_failures: u32,
}

impl ConnectivityMonitor {
    pub fn new(
        remote: Arc<dyn RemoteExpenseApi>,
        handle: ConnectivityHandle,
        config: &ApiConfig,
    ) -> Self {
        Self::with_settings(
            remote,
            handle,
            config.probe_interval(),
            config.offline_after_failures,
        )
    }

    pub fn with_settings(
        remote: Arc<dyn RemoteExpenseApi>,
        handle: ConnectivityHandle,
        interval: Duration,
        offline_after_failures: u32,
    ) -> Self {
        Self {
            remote,
            handle,
            interval,
            offline_after_failures: offline_after_failures.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn handle(&self) -> &ConnectivityHandle {
        &self.handle
    }

    /// プローブ結果を反映する
    ///
    /// 成功は即座にオンライン。失敗は連続 `offline_after_failures` 回でオフライン。
    ///
    /// # 戻り値
    /// オフラインからオンラインへ遷移した場合はtrue
    pub fn record_probe(&mut self, result: &AppResult<()>) -> bool {
        match result {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.handle.set_online(true)
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                log::debug!(
                    "プローブ失敗 ({}/{}): {}",
                    self.consecutive_failures,
                    self.offline_after_failures,
                    e.details()
                );
                if self.consecutive_failures >= self.offline_after_failures {
                    if self.handle.is_online() {
                        log::warn!("リモートに到達できないためオフラインに切り替えます");
                    }
                    self.handle.set_online(false);
                }
                false
            }
        }
    }

    /// 1回プローブする
    pub async fn probe_once(&mut self) -> bool {
        let result = self.remote.probe().await;
        self.record_probe(&result)
    }

    /// `shutdown` が完了するまで監視を続ける
    pub async fn run<F>(mut self, mut nudges: mpsc::Receiver<()>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut nudges_open = true;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
                nudge = nudges.recv(), if nudges_open => {
                    if nudge.is_none() {
                        nudges_open = false;
                        continue;
                    }
                    log::debug!("接続変化の通知を受信しました");
                }
            }

            self.probe_once().await;
        }

        log::debug!("接続監視を終了しました");
    }
}
