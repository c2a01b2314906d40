#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::models::UserStore;
    use crate::tests::support::TestApp;

    const PAGE: &str = "/account/password/update";

    #[tokio::test]
    async fn test_account_page_shows_user() {
        let mut app = TestApp::new();
        app.login_as("alice@example.com", "pa$$word123").await;

        let res = app.get("/account/view").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("cache-control"), Some("no-store"));
        assert!(res.body.contains("Alice"));
        assert!(res.body.contains("alice@example.com"));
        assert!(res.body.contains("Change password"));
    }

    #[tokio::test]
    async fn test_password_update() {
        let mut app = TestApp::new();
        app.login_as("alice@example.com", "pa$$word123").await;

        let res = app
            .submit(
                PAGE,
                PAGE,
                &[
                    ("current_password", "pa$$word123"),
                    ("new_password", "n3w-pa$$word"),
                    ("new_password_confirmation", "n3w-pa$$word"),
                ],
            )
            .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/account/view"));

        let account = app.get("/account/view").await;
        assert!(account.body.contains("Your password has been updated!"));

        assert!(app.users.authenticate("alice@example.com", "n3w-pa$$word").await.is_ok());
        assert!(app.users.authenticate("alice@example.com", "pa$$word123").await.is_err());
    }

    #[tokio::test]
    async fn test_password_update_wrong_current_password() {
        let mut app = TestApp::new();
        app.login_as("alice@example.com", "pa$$word123").await;

        let res = app
            .submit(
                PAGE,
                PAGE,
                &[
                    ("current_password", "not-my-password"),
                    ("new_password", "n3w-pa$$word"),
                    ("new_password_confirmation", "n3w-pa$$word"),
                ],
            )
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(res.body.contains("Current password is incorrect"));
        assert!(app.users.authenticate("alice@example.com", "pa$$word123").await.is_ok());
    }

    #[tokio::test]
    async fn test_password_update_validation() {
        let mut app = TestApp::new();
        app.login_as("alice@example.com", "pa$$word123").await;

        let res = app
            .submit(
                PAGE,
                PAGE,
                &[
                    ("current_password", "pa$$word123"),
                    ("new_password", "n3w-pa$$word"),
                    ("new_password_confirmation", "something-else"),
                ],
            )
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(res.body.contains("Passwords do not match"));
        assert!(app.users.authenticate("alice@example.com", "pa$$word123").await.is_ok());
    }
}
