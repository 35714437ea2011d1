//! 错误类型定义

use crate::validation::ValidationError;
use thiserror::Error;

/// 非 2xx 响应且响应体没有 message 时使用的兜底提示
pub const FALLBACK_MESSAGE: &str = "请求失败";

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 表单校验错误（不会发出网络请求）
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 状态码错误
    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// API 错误（HTTP 成功但 code 非 0）
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// 编解码错误
    #[error("Encoding/Decoding error: {0}")]
    Encoding(String),

    /// 未认证错误
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 状态错误
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 页面上展示给用户的单条提示
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(e) => e.to_string(),
            Error::Http { message, .. } | Error::Api { message, .. } => message.clone(),
            Error::NotAuthenticated => "请先登录".to_string(),
            other => other.to_string(),
        }
    }

    /// 是否为 401 响应
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Http { status: 401, .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
