use crate::api::Mode;
use crate::args::ProfileUpdateArgs;
use crate::commands::Out;
use crate::model::{Profile, ProfileUpdate};
use crate::nav::Route;
use crate::{Client, Config, Result};

/// Handles `expenses profile update`. The cached user is replaced with the server's answer.
pub async fn update_profile(
    config: Config,
    mode: Mode,
    args: &ProfileUpdateArgs,
) -> Result<Out<Profile>> {
    let client = Client::connect(&config, mode).await?;
    client.require_user(Route::Settings).await?;
    let update = ProfileUpdate {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
    };
    let user = client.session().update_profile(&update).await?;
    Ok(Out::new("Profile updated successfully", user))
}

/// Handles `expenses profile delete`. The account is deleted on the server and the stored
/// session is forgotten.
pub async fn delete_profile(config: Config, mode: Mode) -> Result<Out<()>> {
    let client = Client::connect(&config, mode).await?;
    let user = client.require_user(Route::Settings).await?;
    client.session().delete_account().await?;
    Ok(format!("Deleted the account of {}", user.email).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiErrorKind;
    use crate::args::LoginArgs;
    use crate::commands::{login, whoami};
    use crate::error::ErrorType;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_update_profile() {
        let env = TestEnv::new().await;
        env.logged_in_client().await;
        let args = ProfileUpdateArgs {
            first_name: "Dee".to_string(),
            last_name: "Mo".to_string(),
        };
        let out = update_profile(env.config(), Mode::Test, &args)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().first_name, "Dee");
        let out = whoami(env.config(), Mode::Test).await.unwrap();
        assert!(out.message().contains("Dee Mo"));
    }

    #[tokio::test]
    async fn test_delete_profile() {
        let env = TestEnv::new().await;
        env.logged_in_client().await;
        delete_profile(env.config(), Mode::Test).await.unwrap();

        let e = whoami(env.config(), Mode::Test).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Auth);
        let args = LoginArgs::new(TestEnv::EMAIL, TestEnv::PASSWORD);
        let e = login(env.config(), Mode::Test, &args).await.unwrap_err();
        assert_eq!(e.api_error().unwrap().kind(), ApiErrorKind::AuthInvalid);
    }
}
