use crate::features::expenses::models::Expense;
use crate::shared::config::ApiConfig;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// リモート経費サービスとの通信インターフェース
///
/// 通信不能・タイムアウトは `AppError::Transport`、404は `AppError::NotFound` を返す。
#[async_trait]
pub trait RemoteExpenseApi: Send + Sync {
    /// 全件を取得する
    async fn list(&self) -> AppResult<Vec<Expense>>;

    /// 作成する（同じIDなら上書き）。保存されたレコードを返す
    async fn create(&self, expense: &Expense) -> AppResult<Expense>;

    /// 更新する
    async fn update(&self, expense: &Expense) -> AppResult<Expense>;

    /// 削除する
    async fn delete(&self, id: &str) -> AppResult<()>;

    /// 到達確認（HEAD /expenses）
    async fn probe(&self) -> AppResult<()>;
}

/// サーバーからのエラーレスポンス
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// reqwestによるHTTP実装
pub struct HttpExpenseApi {
    client: Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpExpenseApi {
    /// 設定からクライアントを作成する
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            probe_timeout: config.probe_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/expenses", self.base_url)
    }

    /// 個別レコードのURL（IDはパスセグメントとしてエンコードする）
    fn item_url(&self, id: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.collection_url()).map_err(|e| {
            AppError::configuration(format!("invalid API base URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::configuration(format!("API base URL cannot hold path segments: {}", self.base_url))
            })?
            .push(id);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, method: &str) -> AppResult<Response> {
        let response = request.send().await.map_err(|e| {
            log::debug!("{method}リクエスト送信失敗: {e}");
            AppError::transport(e.to_string())
        })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(handle_error_response(response).await)
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                AppError::transport(e.to_string())
            } else {
                AppError::external_service("expense api".to_string(), format!("レスポンス解析エラー: {e}"))
            }
        })
    }
}

#[async_trait]
impl RemoteExpenseApi for HttpExpenseApi {
    async fn list(&self) -> AppResult<Vec<Expense>> {
        let response = self
            .send(self.client.get(self.collection_url()), "GET")
            .await?;
        Self::read_json(response).await
    }

    async fn create(&self, expense: &Expense) -> AppResult<Expense> {
        log::info!("POSTリクエスト送信: id={}", expense.id);
        let response = self
            .send(self.client.post(self.collection_url()).json(expense), "POST")
            .await?;
        Self::read_json(response).await
    }

    async fn update(&self, expense: &Expense) -> AppResult<Expense> {
        log::info!("PUTリクエスト送信: id={}", expense.id);
        let response = self
            .send(
                self.client.put(self.item_url(&expense.id)?).json(expense),
                "PUT",
            )
            .await?;
        Self::read_json(response).await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        log::info!("DELETEリクエスト送信: id={id}");
        self.send(self.client.delete(self.item_url(id)?), "DELETE")
            .await?;
        Ok(())
    }

    async fn probe(&self) -> AppResult<()> {
        self.send(
            self.client
                .head(self.collection_url())
                .timeout(self.probe_timeout),
            "HEAD",
        )
        .await?;
        Ok(())
    }
}

/// エラーステータスをAppErrorに変換する
async fn handle_error_response(response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.clone());

    log::warn!("APIサーバーからエラーレスポンス: status={status}, body={body}");

    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::BAD_REQUEST => AppError::Validation(message),
        _ => AppError::external_service(
            "expense api".to_string(),
            format!("status {}: {message}", status.as_u16()),
        ),
    }
}
