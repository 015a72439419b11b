//! Login, logout and the stored session
//!
//! Login exchanges a display name and shared secret code for a bearer token
//! and user record, which are kept in the config file until logout.

pub mod session;

pub use session::{Session, SessionEvent, SessionState};

use crate::api::{self, ApiClient};
use crate::config::Config;
use crate::error::{ChatError, ChatResult};

/// Log in and persist the session, then register for push notifications.
///
/// A non-blank `partner` is stored as the partner's display name alongside
/// the session.
pub async fn login(
    config: &mut Config,
    name: &str,
    code: &str,
    partner: Option<&str>,
) -> ChatResult<Session> {
    let name = name.trim();
    let code = code.trim();
    if name.is_empty() {
        return Err(ChatError::Auth("Please enter your name".into()));
    }
    if code.is_empty() {
        return Err(ChatError::Auth("Please enter the secret code".into()));
    }

    let anonymous = ApiClient::new(config.api_base());
    let resp = api::auth::login(&anonymous, name, code).await?;
    let session = Session::new(resp.token, resp.user);
    tracing::info!("Logged in as {} ({})", session.user.name, session.user.id);

    config.set_session(session.clone());
    if let Some(partner) = partner.map(str::trim).filter(|p| !p.is_empty()) {
        config.partner_name = Some(partner.to_string());
    }
    if config.partner_name.is_none() {
        tracing::warn!("No partner configured; run 'pairchat login --partner <name>' to set one");
    }
    config.save()?;

    let client = ApiClient::with_session(config.api_base(), &session);
    api::notifications::subscribe_best_effort(&client, config.push.as_ref()).await;

    Ok(session)
}

/// Clear the stored session. Server-side cleanup is best effort.
pub async fn logout(config: &mut Config) -> anyhow::Result<()> {
    let Some(session) = config.session.clone() else {
        println!("Not logged in.");
        return Ok(());
    };

    let client = ApiClient::with_session(config.api_base(), &session);
    if config.push.is_some() {
        api::notifications::unsubscribe_best_effort(&client).await;
    }
    if let Err(e) = api::users::set_status(&client, false).await {
        tracing::warn!("Failed to publish offline status: {:#}", e);
    }

    config.clear_session();
    config.save()?;
    println!("Logged out {}.", session.user.name);
    Ok(())
}

/// Print the stored identity.
pub fn status(config: &Config) {
    match config.session {
        Some(ref session) => {
            println!("Logged in as {} (id {})", session.user.name, session.user.id);
            println!("API:    {}", config.api_base());
            println!("Socket: {}", config.socket_url);
            match config.partner_name {
                Some(ref partner) => println!("Partner: {}", partner),
                None => println!("Partner: (not configured)"),
            }
        }
        None => println!("Not logged in. Run 'pairchat login'."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server::TestServer;
    use crate::config::PushSubscription;
    use crate::models::User;
    use serde_json::json;

    fn login_reply() -> serde_json::Value {
        json!({
            "user": { "_id": "u1", "name": "Allu", "isOnline": true },
            "token": "tok-1"
        })
    }

    fn config_for(server: &TestServer, dir: &tempfile::TempDir) -> Config {
        let mut config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        config.api_url = server.base().to_string();
        config
    }

    fn stored_session(config: &mut Config) {
        config.set_session(Session::new(
            "tok-1".into(),
            User {
                id: "u1".into(),
                name: "Allu".into(),
                is_online: true,
            },
        ));
    }

    #[tokio::test]
    async fn test_login_persists_session_and_subscribes() {
        let server = TestServer::start(&[
            ("POST /auth/login", 200, login_reply()),
            ("POST /notifications/subscribe", 201, json!({})),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, &dir);
        config.push = Some(PushSubscription {
            endpoint: "https://push.example/1".into(),
            p256dh: "key".into(),
            auth: "secret".into(),
        });

        let session = login(&mut config, " Allu ", "1234", Some(" Safa "))
            .await
            .unwrap();
        assert_eq!(session.token, "tok-1");

        let requests = server.requests();
        assert_eq!(
            server.routes_hit(),
            vec!["POST /auth/login", "POST /notifications/subscribe"]
        );
        assert_eq!(requests[0].json(), json!({ "name": "Allu", "userId": "1234" }));
        assert_eq!(requests[0].authorization, None);
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer tok-1"));
        assert_eq!(requests[1].json()["keys"]["p256dh"], "key");

        let saved = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.require_session().unwrap().user.name, "Allu");
        assert_eq!(saved.partner_name.as_deref(), Some("Safa"));
    }

    #[tokio::test]
    async fn test_login_without_partner_keeps_stored_one() {
        let server = TestServer::start(&[("POST /auth/login", 200, login_reply())]).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, &dir);
        config.partner_name = Some("Safa".into());

        login(&mut config, "Allu", "1234", None).await.unwrap();
        // No push configured, so nothing after the login call
        assert_eq!(server.routes_hit(), vec!["POST /auth/login"]);

        let saved = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.partner_name.as_deref(), Some("Safa"));
    }

    #[tokio::test]
    async fn test_rejected_login_is_auth_error() {
        let server = TestServer::start(&[(
            "POST /auth/login",
            401,
            json!({ "message": "Invalid code" }),
        )])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, &dir);

        let err = login(&mut config, "Allu", "0000", None).await.unwrap_err();
        match err {
            ChatError::Auth(msg) => assert_eq!(msg, "Invalid code"),
            other => panic!("expected auth error, got {:?}", other),
        }
        assert!(config.session.is_none());
        assert!(!dir.path().join("config.toml").exists());
    }

    #[tokio::test]
    async fn test_blank_credentials_never_reach_server() {
        let server = TestServer::start(&[]).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, &dir);

        let err = login(&mut config, "  ", "1234", None).await.unwrap_err();
        assert!(matches!(err, ChatError::Auth(ref m) if m == "Please enter your name"));
        let err = login(&mut config, "Allu", "", None).await.unwrap_err();
        assert!(matches!(err, ChatError::Auth(ref m) if m == "Please enter the secret code"));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_session_when_server_fails() {
        let server = TestServer::start(&[
            (
                "DELETE /notifications/unsubscribe",
                500,
                json!({ "message": "boom" }),
            ),
            ("POST /users/status", 500, json!({ "message": "boom" })),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, &dir);
        stored_session(&mut config);
        config.push = Some(PushSubscription {
            endpoint: "https://push.example/1".into(),
            p256dh: "key".into(),
            auth: "secret".into(),
        });
        config.save().unwrap();

        logout(&mut config).await.unwrap();

        assert_eq!(
            server.routes_hit(),
            vec!["DELETE /notifications/unsubscribe", "POST /users/status"]
        );
        assert_eq!(server.requests()[1].json(), json!({ "isOnline": false }));
        assert!(config.session.is_none());
        let saved = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(saved.session.is_none());
    }
}
