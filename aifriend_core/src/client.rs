//! AIFriend API 客户端
//!
//! 所有出站请求都经过 [`ApiClient::request`]：拼接 URL、附加 Bearer 令牌、
//! 发送请求并解析统一响应信封。令牌刷新默认由调用方显式调用
//! [`ApiClient::refresh_token`]；开启 `auto_refresh` 后，401 会触发一次
//! 单飞刷新并重试。

use crate::config::ClientConfig;
use crate::error::{Error, Result, FALLBACK_MESSAGE};
use crate::token_store::TokenStore;
use crate::types::*;
use reqwest::header::HeaderMap;
use reqwest::multipart::Form;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 请求体
#[derive(Debug)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Form),
}

impl RequestBody {
    /// multipart 表单无法复制
    fn try_clone(&self) -> Option<Self> {
        match self {
            RequestBody::Empty => Some(RequestBody::Empty),
            RequestBody::Json(value) => Some(RequestBody::Json(value.clone())),
            RequestBody::Multipart(_) => None,
        }
    }
}

/// API 客户端
pub struct ApiClient {
    config: ClientConfig,
    http_client: Client,
    tokens: Arc<dyn TokenStore>,
    /// 保证同一时间只有一个刷新请求
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    /// 创建新的客户端实例
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            tokens,
            refresh_lock: Mutex::new(()),
        })
    }

    /// 使用默认配置创建客户端
    pub fn with_server_url(server_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        Self::new(ClientConfig::default().with_server_url(server_url), tokens)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    pub fn clear_tokens(&self) -> Result<()> {
        self.tokens.clear()
    }

    /// 通用请求
    ///
    /// 非 2xx 响应返回 `Error::Http`，消息取信封中的 message，没有则为兜底文案。
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Result<Envelope> {
        let retry = if self.config.auto_refresh {
            body.try_clone()
        } else {
            None
        };
        self.dispatch(method, path, body, retry, &headers).await
    }

    /// multipart 请求，表单由 `build` 生成，重试时重新生成
    async fn request_form<F>(&self, method: Method, path: &str, build: F) -> Result<Envelope>
    where
        F: Fn() -> Result<Form>,
    {
        let body = RequestBody::Multipart(build()?);
        let retry = if self.config.auto_refresh {
            Some(RequestBody::Multipart(build()?))
        } else {
            None
        };
        self.dispatch(method, path, body, retry, &HeaderMap::new())
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        retry: Option<RequestBody>,
        headers: &HeaderMap,
    ) -> Result<Envelope> {
        let token = self.tokens.access_token();
        let result = self
            .send(method.clone(), path, body, headers, token.as_deref())
            .await;

        match (result, retry, token) {
            (Err(e), Some(body), Some(stale)) if e.is_unauthorized() => {
                debug!("{} {} unauthorized, refreshing token", method, path);
                self.refresh_after_unauthorized(&stale).await?;
                let token = self.tokens.access_token();
                self.send(method, path, body, headers, token.as_deref())
                    .await
            }
            (result, _, _) => result,
        }
    }

    /// 发送一次请求
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: &HeaderMap,
        token: Option<&str>,
    ) -> Result<Envelope> {
        let url = self.config.url(path);
        let mut request = self.http_client.request(method.clone(), &url);

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if !headers.is_empty() {
            request = request.headers(headers.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let status = response.status();
        debug!("{} {} -> {}", method, path, status);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response from {}: {}", url, e)))?;

        // 检查 HTTP 状态码
        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
            return Err(Error::Http {
                status: status.as_u16(),
                message,
            });
        }

        parse_envelope(&body)
            .map_err(|e| Error::Encoding(format!("Failed to parse response from {}: {}", url, e)))
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Envelope> {
        self.request(Method::POST, path, RequestBody::Json(body), HeaderMap::new())
            .await
    }

    async fn get(&self, path: &str) -> Result<Envelope> {
        self.request(Method::GET, path, RequestBody::Empty, HeaderMap::new())
            .await
    }

    /// 用户注册
    pub async fn register(&self, username: &str, password: &str, email: Option<&str>) -> Result<Ack> {
        info!("Registering user: {}", username);

        let mut body = json!({
            "username": username,
            "password": password,
        });
        if let Some(email) = email.filter(|email| !email.is_empty()) {
            body["email"] = json!(email);
        }

        let ack = self
            .post_json("/api/v1/auth/register", body)
            .await?
            .into_reply::<Value>()?
            .into_ack()?;

        info!("User registered successfully: {}", username);
        Ok(ack)
    }

    /// 用户登录，两个令牌都返回时才写入存储
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenGrant> {
        info!("Logging in user: {}", username);

        let reply = self
            .post_json(
                "/api/v1/auth/login",
                json!({
                    "username": username,
                    "password": password,
                }),
            )
            .await?
            .into_reply::<Value>()?;

        let grant = match reply.into_tokens() {
            Ok(grant) => grant,
            Err(e) => {
                warn!("Login response did not carry a token pair");
                return Err(e);
            }
        };
        self.tokens.set(&grant.tokens)?;

        info!("User logged in successfully");
        Ok(grant)
    }

    /// 用刷新令牌换一对新令牌
    pub async fn refresh_token(&self) -> Result<TokenGrant> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// 401 之后的刷新；若其他请求已经换过令牌则直接返回
    async fn refresh_after_unauthorized(&self, stale: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        if self.tokens.access_token().as_deref() != Some(stale) {
            debug!("Access token already refreshed by another request");
            return Ok(());
        }
        self.refresh_locked().await.map(|_| ())
    }

    async fn refresh_locked(&self) -> Result<TokenGrant> {
        let refresh_token = self.tokens.refresh_token().ok_or(Error::NotAuthenticated)?;
        let access_token = self.tokens.access_token();

        let reply = self
            .send(
                Method::POST,
                "/api/v1/auth/refresh",
                RequestBody::Json(json!({ "refresh_token": refresh_token })),
                &HeaderMap::new(),
                access_token.as_deref(),
            )
            .await?
            .into_reply::<Value>()?;

        let grant = reply.into_tokens()?;
        self.tokens.set(&grant.tokens)?;

        info!("Token refreshed");
        Ok(grant)
    }

    /// 用户登出，只清除本地令牌
    pub fn logout(&self) -> Result<()> {
        self.tokens.clear()?;
        info!("User logged out successfully");
        Ok(())
    }

    /// 获取用户信息
    pub async fn get_user_info(&self) -> Result<UserInfo> {
        self.get("/api/v1/user/info").await?.into_payload()
    }

    /// 更新用户信息
    pub async fn update_user_info(&self, update: &UserUpdate) -> Result<Ack> {
        self.request(
            Method::PUT,
            "/api/v1/user/info",
            RequestBody::Json(serde_json::to_value(update)?),
            HeaderMap::new(),
        )
        .await?
        .into_reply::<Value>()?
        .into_ack()
    }

    /// 修改密码
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<Ack> {
        let ack = self
            .post_json(
                "/api/v1/user/password",
                json!({
                    "old_password": old_password,
                    "new_password": new_password,
                }),
            )
            .await?
            .into_reply::<Value>()?
            .into_ack()?;

        info!("Password changed");
        Ok(ack)
    }

    /// 上传头像
    pub async fn upload_avatar(&self, avatar: &ImageFile) -> Result<AvatarUpload> {
        debug!("Uploading avatar of {} bytes", avatar.size());
        self.request_form(Method::POST, "/api/v1/user/avatar", || {
            Ok(Form::new().part("avatar", avatar.to_part()?))
        })
        .await?
        .into_reply()?
        .into_data()
    }

    /// 创建角色
    pub async fn create_character(&self, draft: &CharacterDraft) -> Result<CharacterInfo> {
        let character: CharacterInfo = self
            .request_form(Method::POST, "/api/v1/character", || draft.to_form())
            .await?
            .into_reply()?
            .into_data()?;

        info!("Character created: {}", character.id);
        Ok(character)
    }

    /// 更新角色，未提供的图片保持不变
    pub async fn update_character(&self, id: i64, draft: &CharacterDraft) -> Result<CharacterInfo> {
        let path = format!("/api/v1/character/{}", id);
        let character = self
            .request_form(Method::PUT, &path, || draft.to_form())
            .await?
            .into_reply()?
            .into_data()?;

        info!("Character updated: {}", id);
        Ok(character)
    }

    /// 获取角色列表，没有数据时为空列表
    pub async fn get_character_list(&self) -> Result<Vec<CharacterInfo>> {
        match self.get("/api/v1/character/list").await?.into_reply()? {
            Reply::Data { data, .. } => Ok(data.unwrap_or_default()),
            Reply::Tokens(_) => Err(Error::InvalidState(
                "Unexpected token pair in character list response".to_string(),
            )),
            Reply::Failure { code, message } => Err(Error::Api { code, message }),
        }
    }

    /// 获取单个角色
    pub async fn get_character(&self, id: i64) -> Result<CharacterInfo> {
        self.get(&format!("/api/v1/character/{}", id))
            .await?
            .into_reply()?
            .into_data()
    }

    /// 删除角色
    pub async fn remove_character(&self, id: i64) -> Result<Ack> {
        let ack = self
            .request(
                Method::DELETE,
                &format!("/api/v1/character/{}", id),
                RequestBody::Empty,
                HeaderMap::new(),
            )
            .await?
            .into_reply::<Value>()?
            .into_ack()?;

        info!("Character removed: {}", id);
        Ok(ack)
    }
}

fn parse_envelope(body: &[u8]) -> std::result::Result<Envelope, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Envelope::default());
    }
    serde_json::from_slice(body)
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("authenticated", &self.tokens.is_authenticated())
            .finish()
    }
}
