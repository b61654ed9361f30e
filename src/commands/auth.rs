//! Session command handlers.
//!
//! This module implements the CLI commands for:
//! - `expenses login` - Exchange an email and password for a stored session
//! - `expenses register` - Create an account and log in to it
//! - `expenses logout` - Forget the stored session
//! - `expenses whoami` - Resolve the stored session and show the user
//! - `expenses password` - Change the password of the logged-in user

use crate::api::Mode;
use crate::args::{LoginArgs, PasswordArgs, RegisterArgs};
use crate::commands::Out;
use crate::model::{PasswordChange, Profile, RegisterRequest};
use crate::nav::Route;
use crate::{Client, Config, Result};

/// Handles `expenses login`. The token pair is written to the credential storage.
pub async fn login(config: Config, mode: Mode, args: &LoginArgs) -> Result<Out<Profile>> {
    let client = Client::connect(&config, mode).await?;
    let user = client.session().login(args.email(), args.password()).await?;
    client.navigator().redirect(Route::Dashboard);
    Ok(Out::new(
        format!("Welcome back, {}!", user.display_name()),
        user,
    ))
}

/// Handles `expenses register`.
pub async fn register(config: Config, mode: Mode, args: &RegisterArgs) -> Result<Out<Profile>> {
    let client = Client::connect(&config, mode).await?;
    let form = RegisterRequest {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        email: args.email.trim().to_string(),
        password: args.password.clone(),
        confirm_password: args.confirm_password.clone(),
    };
    let user = client.session().register(&form).await?;
    client.navigator().redirect(Route::Dashboard);
    Ok(Out::new(
        format!("Welcome, {}! Your account has been created", user.display_name()),
        user,
    ))
}

/// Handles `expenses logout`. No request is made, the stored session is simply forgotten.
pub async fn logout(config: Config, mode: Mode) -> Result<Out<()>> {
    let client = Client::connect(&config, mode).await?;
    let was_logged_in = client.credentials().is_authenticated();
    client.session().logout().await?;
    Ok(if was_logged_in {
        "Logged out".into()
    } else {
        "You were not logged in".into()
    })
}

/// Handles `expenses whoami`.
pub async fn whoami(config: Config, mode: Mode) -> Result<Out<Profile>> {
    let client = Client::connect(&config, mode).await?;
    let user = client.require_user(Route::Settings).await?;
    Ok(Out::new(
        format!(
            "Logged in as {} {} <{}>",
            user.first_name, user.last_name, user.email
        ),
        user,
    ))
}

/// Handles `expenses password`. The confirmation is checked before anything is sent.
pub async fn password(config: Config, mode: Mode, args: &PasswordArgs) -> Result<Out<()>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::Settings).await?;
    let change = PasswordChange {
        old_password: args.old.clone(),
        new_password: args.new.clone(),
        confirm_password: args.confirm.clone(),
    };
    client.session().change_password(&change).await?;
    Ok("Password changed successfully".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiErrorKind;
    use crate::error::ErrorType;
    use crate::test::TestEnv;

    fn register_args(email: &str, password: &str, confirm: &str) -> RegisterArgs {
        RegisterArgs {
            first_name: "Ana".to_string(),
            last_name: "Ng".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_whoami_logout() {
        let env = TestEnv::new().await;
        let args = LoginArgs::new(TestEnv::EMAIL, TestEnv::PASSWORD);
        let out = login(env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.structure().unwrap().email, TestEnv::EMAIL);

        let out = whoami(env.config(), Mode::Test).await.unwrap();
        assert!(out.message().contains(TestEnv::EMAIL));

        let out = logout(env.config(), Mode::Test).await.unwrap();
        assert_eq!(out.message(), "Logged out");
        let e = whoami(env.config(), Mode::Test).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let env = TestEnv::new().await;
        let args = LoginArgs::new(TestEnv::EMAIL, "not-the-password");
        let e = login(env.config(), Mode::Test, &args).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
        assert_eq!(e.api_error().unwrap().kind(), ApiErrorKind::AuthInvalid);
    }

    #[tokio::test]
    async fn test_register_new_account() {
        let env = TestEnv::new().await;
        let args = register_args("ana@example.com", "correct-horse", "correct-horse");
        let out = register(env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.structure().unwrap().first_name, "Ana");
        let out = whoami(env.config(), Mode::Test).await.unwrap();
        assert!(out.message().contains("ana@example.com"));
    }

    #[tokio::test]
    async fn test_register_rejects_numeric_password() {
        let env = TestEnv::new().await;
        let args = register_args("ana@example.com", "12345678", "12345678");
        let e = register(env.config(), Mode::Test, &args).await.unwrap_err();
        let api = e.api_error().unwrap();
        assert_eq!(api.kind(), ApiErrorKind::ValidationFailed);
        assert!(api.field("password").is_some());
    }

    #[tokio::test]
    async fn test_password_mismatch_sends_nothing() {
        let env = TestEnv::new().await;
        env.logged_in_client().await;
        let args = PasswordArgs {
            old: TestEnv::PASSWORD.to_string(),
            new: "new-password-1".to_string(),
            confirm: "new-password-2".to_string(),
        };
        let e = password(env.config(), Mode::Test, &args).await.unwrap_err();
        assert!(e.api_error().unwrap().field("confirm_password").is_some());
        let requests = env.server().requests();
        assert!(!requests.iter().any(|r| r.contains("change-password")));
    }

    #[tokio::test]
    async fn test_password_change() {
        let env = TestEnv::new().await;
        env.logged_in_client().await;
        let args = PasswordArgs {
            old: TestEnv::PASSWORD.to_string(),
            new: "new-password-1".to_string(),
            confirm: "new-password-1".to_string(),
        };
        password(env.config(), Mode::Test, &args).await.unwrap();
        logout(env.config(), Mode::Test).await.unwrap();
        let args = LoginArgs::new(TestEnv::EMAIL, "new-password-1");
        login(env.config(), Mode::Test, &args).await.unwrap();
    }
}
