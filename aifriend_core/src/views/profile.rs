//! 个人资料页

use super::{load_session, FormState, Navigation, Route, Submission, ViewState};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::types::{ImageFile, UserInfo};
use crate::validation;
use tracing::warn;

/// 个人资料页（需要登录）
///
/// 基本信息、头像、密码三个表单各自维护提交状态。
pub struct ProfileView<'a> {
    client: &'a ApiClient,
    state: ViewState<UserInfo>,
    basic: FormState,
    avatar: FormState,
    password: FormState,
}

impl<'a> ProfileView<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            state: ViewState::Loading,
            basic: FormState::Idle,
            avatar: FormState::Idle,
            password: FormState::Idle,
        }
    }

    pub async fn mount(&mut self) -> Navigation {
        self.state = load_session(self.client).await;
        match self.state {
            ViewState::Authenticated(_) => Navigation::Stay,
            _ => Navigation::Redirect(Route::Login),
        }
    }

    pub fn state(&self) -> &ViewState<UserInfo> {
        &self.state
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.state.data()
    }

    pub fn basic_form(&self) -> &FormState {
        &self.basic
    }

    pub fn avatar_form(&self) -> &FormState {
        &self.avatar
    }

    pub fn password_form(&self) -> &FormState {
        &self.password
    }

    /// 头像完整地址
    pub fn avatar_url(&self) -> Option<String> {
        self.user()
            .and_then(|user| self.client.config().asset_url(&user.avatar))
    }

    /// 保存基本信息，只提交有变化的字段
    ///
    /// 保存成功后重新拉取用户信息；拉取失败不影响保存结果，改为就地更新邮箱。
    pub async fn save_basic(&mut self, username: &str, email: &str) -> Result<()> {
        let current = self.user().cloned().ok_or(Error::NotAuthenticated)?;
        let update = self
            .basic
            .check(validation::validate_profile_update(&current, username, email))?;

        let submission = Submission::begin(&mut self.basic)?;
        let result = self.client.update_user_info(&update).await;
        submission.settle(result, "保存成功")?;

        let user = self.refetch_user().await.unwrap_or_else(|| {
            let mut user = current;
            if let Some(email) = update.email {
                user.email = email;
            }
            user
        });
        self.state = ViewState::Authenticated(user);
        Ok(())
    }

    /// 上传头像，返回新的头像完整地址
    pub async fn upload_avatar(&mut self, file: &ImageFile) -> Result<Option<String>> {
        let current = self.user().cloned().ok_or(Error::NotAuthenticated)?;
        self.avatar.check(validation::validate_avatar(file.size()))?;

        let submission = Submission::begin(&mut self.avatar)?;
        let result = self.client.upload_avatar(file).await;
        let upload = submission.settle(result, "头像上传成功")?;

        let user = self.refetch_user().await.unwrap_or_else(|| {
            let mut user = current;
            if !upload.avatar.is_empty() {
                user.avatar = upload.avatar;
            }
            user
        });
        self.state = ViewState::Authenticated(user);
        Ok(self.avatar_url())
    }

    pub async fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if self.user().is_none() {
            return Err(Error::NotAuthenticated);
        }
        self.password.check(validation::validate_password_change(
            old_password,
            new_password,
            confirm_password,
        ))?;

        let submission = Submission::begin(&mut self.password)?;
        let result = self
            .client
            .change_password(old_password, new_password)
            .await;
        submission.settle(result, "密码修改成功")?;
        Ok(())
    }

    /// 修改成功后的重新拉取，失败只记录日志
    async fn refetch_user(&self) -> Option<UserInfo> {
        match self.client.get_user_info().await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Failed to refetch user info: {}", e);
                None
            }
        }
    }

    /// 登出后回到首页
    pub fn logout(&mut self) -> Result<Navigation> {
        self.client.logout()?;
        self.state = ViewState::Unauthenticated;
        Ok(Navigation::Redirect(Route::Home))
    }
}
