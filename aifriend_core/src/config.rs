//! 客户端配置

/// 指定后端地址的环境变量
pub const API_URL_ENV: &str = "AIFRIEND_API_URL";

/// 默认后端地址
pub const DEFAULT_API_URL: &str = "http://localhost:8888";

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务器 URL
    pub server_url: String,
    /// 请求超时（秒）
    pub timeout: u64,
    /// 是否验证 TLS 证书
    pub verify_tls: bool,
    /// 收到 401 时是否自动刷新令牌并重试一次
    pub auto_refresh: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_API_URL.to_string(),
            timeout: 30,
            verify_tls: true,
            auto_refresh: false,
        }
    }
}

impl ClientConfig {
    /// 从环境变量读取服务器地址，其余取默认值
    pub fn from_env() -> Self {
        let server_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty());
        Self::default().with_server_url(server_url.as_deref().unwrap_or(DEFAULT_API_URL))
    }

    pub fn with_server_url(mut self, server_url: &str) -> Self {
        self.server_url = server_url.trim_end_matches('/').to_string();
        self
    }

    /// 拼接完整的请求地址
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// 头像、角色图片等资源地址：完整 URL 原样返回，相对路径拼上服务器地址
    pub fn asset_url(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            None
        } else if path.starts_with("http://") || path.starts_with("https://") {
            Some(path.to_string())
        } else {
            Some(self.url(path))
        }
    }
}
