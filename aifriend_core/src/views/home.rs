//! 首页

use super::{load_session, Navigation, ViewState};
use crate::client::ApiClient;
use crate::error::Result;
use crate::types::UserInfo;

/// 首页，未登录也可访问
pub struct HomeView<'a> {
    client: &'a ApiClient,
    state: ViewState<UserInfo>,
}

impl<'a> HomeView<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            state: ViewState::Loading,
        }
    }

    pub async fn mount(&mut self) -> Navigation {
        self.state = load_session(self.client).await;
        Navigation::Stay
    }

    pub fn state(&self) -> &ViewState<UserInfo> {
        &self.state
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.state.data()
    }

    pub fn greeting(&self) -> String {
        match self.user() {
            Some(user) => format!("欢迎回来，{}", user.username),
            None => "您的AI伙伴".to_string(),
        }
    }

    pub fn logout(&mut self) -> Result<Navigation> {
        self.client.logout()?;
        self.state = ViewState::Unauthenticated;
        Ok(Navigation::Stay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::TokenStore;
    use crate::views::test_support::{anonymous, logged_in, USER_JSON};
    use mockito::Server;

    #[tokio::test]
    async fn test_mount_without_token_skips_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/user/info")
            .expect(0)
            .create_async()
            .await;

        let (client, _) = anonymous(&server.url());
        let mut view = HomeView::new(&client);
        assert!(view.state().is_loading());

        assert_eq!(view.mount().await, Navigation::Stay);
        assert_eq!(view.state(), &ViewState::Unauthenticated);
        assert_eq!(view.greeting(), "您的AI伙伴");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_mount_with_valid_session() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/user/info")
            .match_header("authorization", "Bearer a")
            .with_status(200)
            .with_body(USER_JSON)
            .create_async()
            .await;

        let (client, _) = logged_in(&server.url());
        let mut view = HomeView::new(&client);
        view.mount().await;
        assert_eq!(view.greeting(), "欢迎回来，alice");
    }

    #[tokio::test]
    async fn test_mount_failure_clears_tokens() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/user/info")
            .with_status(401)
            .create_async()
            .await;

        let (client, store) = logged_in(&server.url());
        let mut view = HomeView::new(&client);
        view.mount().await;
        assert_eq!(view.state(), &ViewState::Unauthenticated);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/user/info")
            .with_status(200)
            .with_body(USER_JSON)
            .create_async()
            .await;

        let (client, store) = logged_in(&server.url());
        let mut view = HomeView::new(&client);
        view.mount().await;
        view.logout().unwrap();
        assert!(view.user().is_none());
        assert!(!store.is_authenticated());
    }
}
