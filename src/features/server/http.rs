use super::handlers::handle_request;
use super::repository::ExpenseRepository;
use crate::shared::errors::{AppError, AppResult};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// 経費レコードサービスのHTTPサーバー
pub struct ExpenseServer {
    listener: TcpListener,
    repository: Arc<dyn ExpenseRepository>,
}

impl ExpenseServer {
    /// アドレスにバインドする（ポート0で空きポートを自動選択）
    pub async fn bind(addr: SocketAddr, repository: Arc<dyn ExpenseRepository>) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            repository,
        })
    }

    /// 実際に待ち受けているアドレス
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// `shutdown` が完了するまで接続を受け付ける
    ///
    /// 接続ごとにタスクを起動する。処理中の接続は停止後も完了まで続く。
    pub async fn serve<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        log::info!("経費レコードサービスを開始しました: http://{addr}");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("経費レコードサービスを停止します");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("接続を受け付けました: {peer}");
                        let repository = Arc::clone(&self.repository);
                        tokio::spawn(handle_connection(stream, repository));
                    }
                    Err(e) => {
                        log::error!("接続受け入れエラー: {e}");
                    }
                }
            }
        }

        Ok(())
    }

    /// バックグラウンドタスクで起動する
    pub fn spawn(self) -> AppResult<RunningServer> {
        let addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(self.serve(async move {
            let _ = shutdown_rx.await;
        }));

        Ok(RunningServer {
            addr,
            shutdown: shutdown_tx,
            handle,
        })
    }
}

/// 起動中のサーバーへのハンドル
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<AppResult<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// クライアントが使うベースURL
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// 停止を通知し、受け付けループの終了を待つ
    pub async fn shutdown(self) -> AppResult<()> {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .map_err(|e| AppError::concurrency(format!("サーバータスクの終了待ちに失敗: {e}")))?
    }
}

async fn handle_connection(stream: TcpStream, repository: Arc<dyn ExpenseRepository>) {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| handle_request(req, Arc::clone(&repository)));

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        log::error!("HTTP接続処理エラー: {err}");
    }
}
