use super::repository::ExpenseRepository;
use crate::features::expenses::models::ExpenseInput;
use crate::shared::errors::{AppError, AppResult, ErrorSeverity};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, HEAD, OPTIONS";

/// リクエストの対象
#[derive(Debug, PartialEq, Eq)]
enum Route {
    /// `/expenses`
    Collection,
    /// `/expenses/:id`
    Item(String),
    Unknown,
}

impl Route {
    fn parse(path: &str) -> Self {
        let path = path.trim_end_matches('/');
        if path == "/expenses" {
            return Route::Collection;
        }

        // 生のセグメントに '/' があれば別パス。エンコード済みの %2F はIDの一部
        let Some(raw) = path.strip_prefix("/expenses/") else {
            return Route::Unknown;
        };
        if raw.is_empty() || raw.contains('/') {
            return Route::Unknown;
        }

        match urlencoding::decode(raw) {
            Ok(id) if !id.is_empty() => Route::Item(id.into_owned()),
            _ => Route::Unknown,
        }
    }
}

/// HTTPリクエストを処理する
///
/// エラーはすべてステータスコードと `{"error": ...}` に変換されるため失敗しない。
pub async fn handle_request(
    req: Request<Incoming>,
    repository: Arc<dyn ExpenseRepository>,
) -> Result<Response<String>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = route(req, repository.as_ref()).await;

    log::info!("{method} {path} -> {}", response.status().as_u16());
    Ok(response)
}

async fn route(req: Request<Incoming>, repository: &dyn ExpenseRepository) -> Response<String> {
    let method = req.method().clone();
    if method == Method::OPTIONS {
        return empty_response(StatusCode::NO_CONTENT);
    }

    let target = Route::parse(req.uri().path());
    let result = match (method, target) {
        (Method::HEAD, Route::Collection) => Ok(empty_response(StatusCode::OK)),
        (Method::GET, Route::Collection) => list_expenses(repository),
        (Method::POST, Route::Collection) => create_expense(req, repository).await,
        (Method::PUT, Route::Item(id)) => update_expense(req, &id, repository).await,
        (Method::DELETE, Route::Item(id)) => delete_expense(&id, repository),
        (_, Route::Unknown) => return error_body(StatusCode::NOT_FOUND, "Not found"),
        _ => return error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

fn list_expenses(repository: &dyn ExpenseRepository) -> AppResult<Response<String>> {
    let expenses = repository.list()?;
    log::debug!("経費一覧を返します: {}件", expenses.len());
    json_response(StatusCode::OK, &expenses)
}

async fn create_expense(
    req: Request<Incoming>,
    repository: &dyn ExpenseRepository,
) -> AppResult<Response<String>> {
    let input = read_input(req).await?;
    let expense = input.into_new_expense()?;
    let created = repository.create(expense)?;

    log::debug!("経費を作成しました: id={}", created.id);
    json_response(StatusCode::CREATED, &created)
}

async fn update_expense(
    req: Request<Incoming>,
    id: &str,
    repository: &dyn ExpenseRepository,
) -> AppResult<Response<String>> {
    let input = read_input(req).await?;
    let expense = input.into_update(id)?;
    let updated = repository.update(expense)?;

    log::debug!("経費を更新しました: id={id}");
    json_response(StatusCode::OK, &updated)
}

fn delete_expense(id: &str, repository: &dyn ExpenseRepository) -> AppResult<Response<String>> {
    repository.delete(id)?;
    log::debug!("経費を削除しました: id={id}");
    Ok(empty_response(StatusCode::NO_CONTENT))
}

/// リクエストボディをJSONとして読み取る
async fn read_input(req: Request<Incoming>) -> AppResult<ExpenseInput> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?
        .to_bytes();

    serde_json::from_slice(&bytes).map_err(|e| AppError::validation(format!("Invalid JSON: {e}")))
}

/// AppErrorをHTTPステータスに対応付ける
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &AppError) -> Response<String> {
    match error.severity() {
        ErrorSeverity::High | ErrorSeverity::Medium => {
            log::error!("リクエスト処理エラー: {}", error.details())
        }
        ErrorSeverity::Low => log::debug!("リクエスト拒否: {}", error.details()),
    }

    error_body(status_for(error), error.user_message())
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn error_body(status: StatusCode, message: &str) -> Response<String> {
    let body = serde_json::to_string(&ErrorBody { error: message })
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());
    with_headers(status, body, true)
}

fn json_response<T: Serialize + ?Sized>(
    status: StatusCode,
    value: &T,
) -> AppResult<Response<String>> {
    let body = serde_json::to_string(value)?;
    Ok(with_headers(status, body, true))
}

fn empty_response(status: StatusCode) -> Response<String> {
    with_headers(status, String::new(), false)
}

fn with_headers(status: StatusCode, body: String, is_json: bool) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    if is_json {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/expenses"), Route::Collection);
        assert_eq!(Route::parse("/expenses/"), Route::Collection);
        assert_eq!(Route::parse("/expenses/42"), Route::Item("42".to_string()));
        assert_eq!(Route::parse("/expenses/42/extra"), Route::Unknown);
        assert_eq!(Route::parse("/expenses/a%20b"), Route::Item("a b".to_string()));
        assert_eq!(Route::parse("/expenses/x%2Fy"), Route::Item("x/y".to_string()));
        assert_eq!(Route::parse("/expenses/%FF"), Route::Unknown);
        assert_eq!(Route::parse("/other"), Route::Unknown);
        assert_eq!(Route::parse("/"), Route::Unknown);
    }

    #[test]
    fn test_status_for() {
        assert_eq!(
            status_for(&AppError::validation("Missing required field: id")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AppError::not_found("Expense")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AppError::Database("disk".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_body_is_exact() {
        let response = error_response(&AppError::not_found("Expense"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), r#"{"error":"Expense not found"}"#);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[test]
    fn test_internal_errors_are_hidden() {
        let response = error_response(&AppError::Database("no such table".to_string()));
        assert_eq!(response.body(), r#"{"error":"Database error"}"#);
    }
}
