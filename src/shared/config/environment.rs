use crate::shared::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        let environment = get_environment();
        let debug_mode = environment == Environment::Development;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            debug_mode,
            log_level,
        }
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたローカルデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_expenses.db"
/// - プロダクション環境: "expenses.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_expenses.db",
        Environment::Production => "expenses.db",
    }
}

/// 環境に応じた.envファイルを読み込む
pub fn load_environment_variables() {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    log::info!("環境: {environment}, 読み込み対象: {env_file}");

    match dotenv::from_filename(env_file) {
        Ok(_) => {
            log::info!("{env_file}ファイルを読み込みました");
        }
        Err(_) => {
            // 環境固有のファイルがない場合は、デフォルトの.envを試行
            if env_file != ".env" && dotenv::dotenv().is_ok() {
                log::warn!("{env_file}が見つからないため、デフォルトの.envファイルを読み込みました");
            } else {
                log::warn!("環境変数ファイルが見つかりません。直接設定された環境変数を使用します。");
            }
        }
    }
}

/// ログシステムを初期化する
///
/// # 処理内容
/// 1. 環境設定を取得
/// 2. ログレベルを設定
/// 3. env_loggerを初期化
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();

    log::info!(
        "ログシステムを初期化しました: level={}, environment={}",
        env_config.log_level,
        env_config.environment
    );
}

/// 環境変数を読み、パースできなければデフォルト値を使う
fn parse_env_or<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("{key}のパースに失敗しました。デフォルト値{default}を使用します");
            default
        }),
        Err(_) => default,
    }
}

/// サーバー側の永続化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// 単一JSONファイル（変更のたびに全体を書き直す）
    JsonFile,
    /// 組み込みSQLite
    Sqlite,
}

impl std::str::FromStr for StoreKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StoreKind::JsonFile),
            "sqlite" => Ok(StoreKind::Sqlite),
            other => Err(AppError::configuration(format!(
                "unknown store kind: {other} (expected json or sqlite)"
            ))),
        }
    }
}

/// レコードサービスの設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 待ち受けアドレス
    pub listen_addr: String,
    /// データディレクトリ（存在しなければ作成する）
    pub data_dir: PathBuf,
    /// 永続化方式
    pub store: StoreKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("data"),
            store: StoreKind::JsonFile,
        }
    }
}

impl ServerConfig {
    /// 環境変数からサーバー設定を読み込む
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let listen_addr = std::env::var("KEIHI_LISTEN_ADDR").unwrap_or(defaults.listen_addr);
        let data_dir = std::env::var("KEIHI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let store = match std::env::var("KEIHI_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store,
        };

        let config = Self {
            listen_addr,
            data_dir,
            store,
        };
        config.validate()?;
        log::info!(
            "サーバー設定: listen={}, data_dir={:?}, store={:?}",
            config.listen_addr,
            config.data_dir,
            config.store
        );
        Ok(config)
    }

    /// 設定を検証する
    pub fn validate(&self) -> AppResult<()> {
        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                AppError::configuration(format!("invalid listen address {}: {e}", self.listen_addr))
            })?;
        Ok(())
    }

    /// 永続化ファイルのパスを取得
    pub fn store_path(&self) -> PathBuf {
        match self.store {
            StoreKind::JsonFile => self.data_dir.join("expenses.json"),
            StoreKind::Sqlite => self.data_dir.join("expenses.db"),
        }
    }

    /// デバッグ情報を取得
    pub fn get_debug_info(&self) -> HashMap<String, String> {
        let mut info = HashMap::new();
        info.insert("listen_addr".to_string(), self.listen_addr.clone());
        info.insert("store_path".to_string(), format!("{:?}", self.store_path()));
        info.insert("store".to_string(), format!("{:?}", self.store));
        info
    }
}

/// クライアント側のAPI・同期設定
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// APIサーバーのベースURL
    pub base_url: String,
    /// APIリクエストのタイムアウト（秒）
    pub timeout_seconds: u64,
    /// 疎通確認のタイムアウト（ミリ秒）
    pub probe_timeout_ms: u64,
    /// 疎通確認の間隔（秒）
    pub probe_interval_seconds: u64,
    /// オフラインと判定するまでの連続失敗回数
    pub offline_after_failures: u32,
    /// ローカルデータベースの明示パス
    pub local_db_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_seconds: 10,
            probe_timeout_ms: 2000,
            probe_interval_seconds: 5,
            offline_after_failures: 2,
            local_db_path: None,
        }
    }
}

impl ApiConfig {
    /// 環境変数からAPI設定を読み込む
    pub fn from_env() -> Self {
        log::debug!("ApiConfig::from_env() - 環境変数の読み込みを開始");
        let defaults = Self::default();

        let base_url = std::env::var("API_SERVER_URL").unwrap_or_else(|_| {
            log::debug!("API_SERVER_URL が設定されていないため、デフォルト値を使用");
            defaults.base_url.clone()
        });

        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds: parse_env_or("API_TIMEOUT_SECONDS", defaults.timeout_seconds),
            probe_timeout_ms: parse_env_or("API_PROBE_TIMEOUT_MS", defaults.probe_timeout_ms),
            probe_interval_seconds: parse_env_or(
                "PROBE_INTERVAL_SECONDS",
                defaults.probe_interval_seconds,
            ),
            offline_after_failures: parse_env_or(
                "OFFLINE_AFTER_FAILURES",
                defaults.offline_after_failures,
            ),
            local_db_path: std::env::var("KEIHI_LOCAL_DB").ok().map(PathBuf::from),
        };

        log::info!(
            "API設定: base_url={}, timeout={}s, probe_interval={}s, offline_after={}",
            config.base_url,
            config.timeout_seconds,
            config.probe_interval_seconds,
            config.offline_after_failures
        );
        config
    }

    /// 設定を検証する
    pub fn validate(&self) -> AppResult<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            AppError::configuration(format!("invalid API_SERVER_URL {}: {e}", self.base_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AppError::configuration(format!(
                "API_SERVER_URL must be http or https: {}",
                self.base_url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(AppError::configuration("API_TIMEOUT_SECONDS must be > 0"));
        }
        if self.probe_interval_seconds == 0 {
            return Err(AppError::configuration("PROBE_INTERVAL_SECONDS must be > 0"));
        }
        if self.offline_after_failures == 0 {
            return Err(AppError::configuration("OFFLINE_AFTER_FAILURES must be >= 1"));
        }
        Ok(())
    }

    /// リクエストタイムアウト
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// 疎通確認タイムアウト
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// 疎通確認の間隔
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds)
    }

    /// ローカルデータベースのパスを決定する
    ///
    /// 明示パスがなければユーザーデータディレクトリ配下を使う。
    pub fn resolve_local_db_path(&self) -> AppResult<PathBuf> {
        if let Some(path) = &self.local_db_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir().ok_or_else(|| {
            AppError::configuration("could not determine the user data directory")
        })?;
        let app_dir = data_dir.join("keihi-sync");
        if !app_dir.exists() {
            std::fs::create_dir_all(&app_dir)?;
            log::info!("アプリケーションデータディレクトリを作成: {app_dir:?}");
        }

        Ok(app_dir.join(get_database_filename(get_environment())))
    }

    /// デバッグ情報を取得
    pub fn get_debug_info(&self) -> HashMap<String, String> {
        let mut info = HashMap::new();
        info.insert("base_url".to_string(), self.base_url.clone());
        info.insert(
            "timeout_seconds".to_string(),
            self.timeout_seconds.to_string(),
        );
        info.insert(
            "probe_interval_seconds".to_string(),
            self.probe_interval_seconds.to_string(),
        );
        info.insert(
            "offline_after_failures".to_string(),
            self.offline_after_failures.to_string(),
        );
        info
    }
}
