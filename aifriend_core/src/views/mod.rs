//! 会话相关页面
//!
//! 页面是无界面的控制器：持有 [`ApiClient`] 引用和本地状态，
//! 每个操作返回新的状态以及是否需要跳转，渲染交给调用方。

mod auth;
mod characters;
mod home;
mod profile;

pub use auth::{LoginView, RegisterView};
pub use characters::{CharactersPage, CharactersView};
pub use home::HomeView;
pub use profile::ProfileView;

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::types::UserInfo;
use crate::validation::ValidationError;
use tracing::warn;

/// 页面路由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Profile,
    Characters,
}

/// 操作之后的导航
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Redirect(Route),
}

/// 页面加载状态
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Authenticated(T),
    Unauthenticated,
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ViewState::Authenticated(data) => Some(data),
            _ => None,
        }
    }
}

/// 表单状态
///
/// `Success` 与 `Error` 都是可以再次提交的空闲态，只是带着提示信息。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    Idle,
    Submitting,
    Success(String),
    Error(String),
}

impl FormState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, FormState::Submitting)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            FormState::Success(message) | FormState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FormState::Error(message) => Some(message),
            _ => None,
        }
    }

    /// 用户修改输入后清除上一次的提示
    pub fn touch(&mut self) {
        if !self.is_submitting() {
            *self = FormState::Idle;
        }
    }

    /// 提交前的本地校验，失败时记录错误且不发请求
    pub(crate) fn check<T>(&mut self, validated: std::result::Result<T, ValidationError>) -> Result<T> {
        if self.is_submitting() {
            return Err(Error::InvalidState("表单正在提交".to_string()));
        }
        validated.map_err(|e| {
            *self = FormState::Error(e.to_string());
            Error::Validation(e)
        })
    }
}

/// 一次表单提交
///
/// 创建时进入 `Submitting`；`settle` 写入结果；若提前被丢弃（例如 future
/// 被取消）则回到 `Idle`，保证提交标志一定会被复位。
pub(crate) struct Submission<'a> {
    form: &'a mut FormState,
    settled: bool,
}

impl<'a> Submission<'a> {
    pub(crate) fn begin(form: &'a mut FormState) -> Result<Self> {
        if form.is_submitting() {
            return Err(Error::InvalidState("表单正在提交".to_string()));
        }
        *form = FormState::Submitting;
        Ok(Self {
            form,
            settled: false,
        })
    }

    pub(crate) fn settle<T>(mut self, result: Result<T>, success: &str) -> Result<T> {
        *self.form = match &result {
            Ok(_) => FormState::Success(success.to_string()),
            Err(e) => FormState::Error(e.user_message()),
        };
        self.settled = true;
        result
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.form = FormState::Idle;
        }
    }
}

/// 页面挂载时的会话检查
///
/// 没有访问令牌时不发请求；获取用户信息失败视为会话失效并清除令牌。
pub(crate) async fn load_session(client: &ApiClient) -> ViewState<UserInfo> {
    if !client.is_authenticated() {
        return ViewState::Unauthenticated;
    }

    match client.get_user_info().await {
        Ok(user) => ViewState::Authenticated(user),
        Err(e) => {
            invalidate_session(client, &e);
            ViewState::Unauthenticated
        }
    }
}

pub(crate) fn invalidate_session(client: &ApiClient, cause: &Error) {
    warn!("Session invalidated: {}", cause);
    if let Err(e) = client.clear_tokens() {
        warn!("Failed to clear tokens: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::client::ApiClient;
    use crate::token_store::MemoryTokenStore;
    use crate::types::TokenPair;
    use std::sync::Arc;

    pub const USER_JSON: &str = r#"{"id":1,"username":"alice","email":"alice@example.com","avatar":"/api/v1/uploads/avatars/a.png","created_at":"2025-01-01 00:00:00"}"#;

    pub fn logged_in(url: &str) -> (ApiClient, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair {
            access_token: "a".to_string(),
            refresh_token: "b".to_string(),
        }));
        (ApiClient::with_server_url(url, store.clone()).unwrap(), store)
    }

    pub fn anonymous(url: &str) -> (ApiClient, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        (ApiClient::with_server_url(url, store.clone()).unwrap(), store)
    }
}
