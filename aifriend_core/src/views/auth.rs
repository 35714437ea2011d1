//! 登录与注册页

use super::{FormState, Navigation, Route, Submission};
use crate::client::ApiClient;
use crate::error::Result;
use crate::validation;

/// 登录页
pub struct LoginView<'a> {
    client: &'a ApiClient,
    form: FormState,
}

impl<'a> LoginView<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            form: FormState::Idle,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn edit(&mut self) {
        self.form.touch();
    }

    /// 登录成功后跳转首页
    pub async fn submit(&mut self, username: &str, password: &str) -> Result<Navigation> {
        self.form.check(validation::validate_login(username, password))?;

        let submission = Submission::begin(&mut self.form)?;
        let result = self.client.login(username.trim(), password).await;
        submission.settle(result, "登录成功")?;

        Ok(Navigation::Redirect(Route::Home))
    }
}

/// 注册页
pub struct RegisterView<'a> {
    client: &'a ApiClient,
    form: FormState,
}

impl<'a> RegisterView<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            form: FormState::Idle,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn edit(&mut self) {
        self.form.touch();
    }

    /// 注册成功后跳转登录页，邮箱为空时不提交
    pub async fn submit(
        &mut self,
        username: &str,
        password: &str,
        confirm_password: &str,
        email: &str,
    ) -> Result<Navigation> {
        self.form.check(validation::validate_registration(
            username,
            password,
            confirm_password,
        ))?;

        let email = email.trim();
        let submission = Submission::begin(&mut self.form)?;
        let result = self
            .client
            .register(username.trim(), password, (!email.is_empty()).then_some(email))
            .await;
        submission.settle(result, "注册成功")?;

        Ok(Navigation::Redirect(Route::Login))
    }
}
