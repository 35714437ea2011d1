//! 角色管理页

use super::{invalidate_session, FormState, Navigation, Route, Submission, ViewState};
use crate::client::ApiClient;
use crate::error::Result;
use crate::types::{CharacterDraft, CharacterInfo, UserInfo};
use tracing::warn;

/// 角色页数据：当前用户与其全部角色
#[derive(Debug, Clone, PartialEq)]
pub struct CharactersPage {
    pub user: UserInfo,
    pub characters: Vec<CharacterInfo>,
}

/// 角色管理页（需要登录）
///
/// 每次增删改成功后都会整页重新拉取，不在本地合并列表。
pub struct CharactersView<'a> {
    client: &'a ApiClient,
    state: ViewState<CharactersPage>,
    form: FormState,
    load_error: Option<String>,
    delete_error: Option<String>,
}

impl<'a> CharactersView<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            state: ViewState::Loading,
            form: FormState::Idle,
            load_error: None,
            delete_error: None,
        }
    }

    pub fn state(&self) -> &ViewState<CharactersPage> {
        &self.state
    }

    pub fn characters(&self) -> &[CharacterInfo] {
        self.state
            .data()
            .map(|page| page.characters.as_slice())
            .unwrap_or_default()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn edit(&mut self) {
        self.form.touch();
    }

    /// 最近一次列表拉取的错误
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn delete_error(&self) -> Option<&str> {
        self.delete_error.as_deref()
    }

    pub async fn mount(&mut self) -> Navigation {
        self.reload().await
    }

    /// 同时拉取用户信息与角色列表
    ///
    /// 用户信息失败视为会话失效；只有列表失败时保留会话与上一次的列表，
    /// 错误记录在 [`load_error`](Self::load_error)。
    pub async fn reload(&mut self) -> Navigation {
        if !self.client.is_authenticated() {
            self.state = ViewState::Unauthenticated;
            return Navigation::Redirect(Route::Login);
        }

        let (user, characters) = tokio::join!(
            self.client.get_user_info(),
            self.client.get_character_list()
        );
        let user = match user {
            Ok(user) => user,
            Err(e) => {
                invalidate_session(self.client, &e);
                self.state = ViewState::Unauthenticated;
                return Navigation::Redirect(Route::Login);
            }
        };

        let characters = match characters {
            Ok(characters) => {
                self.load_error = None;
                characters
            }
            Err(e) => {
                warn!("Failed to load characters: {}", e);
                self.load_error = Some(e.user_message());
                match std::mem::replace(&mut self.state, ViewState::Loading) {
                    ViewState::Authenticated(page) => page.characters,
                    _ => Vec::new(),
                }
            }
        };
        self.state = ViewState::Authenticated(CharactersPage { user, characters });
        Navigation::Stay
    }

    pub async fn create(&mut self, draft: &CharacterDraft) -> Result<Navigation> {
        let draft = self.form.check(draft.validated())?;

        let submission = Submission::begin(&mut self.form)?;
        let result = self.client.create_character(&draft).await;
        submission.settle(result, "创建成功")?;

        Ok(self.reload().await)
    }

    pub async fn update(&mut self, id: i64, draft: &CharacterDraft) -> Result<Navigation> {
        let draft = self.form.check(draft.validated())?;

        let submission = Submission::begin(&mut self.form)?;
        let result = self.client.update_character(id, &draft).await;
        submission.settle(result, "保存成功")?;

        Ok(self.reload().await)
    }

    /// 删除失败时列表保持不变，只记录错误
    pub async fn delete(&mut self, id: i64) -> Result<Navigation> {
        self.delete_error = None;
        match self.client.remove_character(id).await {
            Ok(_) => Ok(self.reload().await),
            Err(e) => {
                warn!("Failed to remove character {}: {}", id, e);
                self.delete_error = Some(e.user_message());
                Err(e)
            }
        }
    }
}
