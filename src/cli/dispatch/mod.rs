use crate::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::{Context, Result};

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let revocation_dir = matches
        .get_one::<String>("revocation-dir")
        .context("missing required argument: --revocation-dir")?;
    let pam_helper = matches
        .get_one::<String>("pam-helper")
        .context("missing required argument: --pam-helper")?;

    let mut config = AuthConfig::new(revocation_dir, pam_helper)
        .with_timeout_minutes(
            matches
                .get_one::<u32>("auth-timeout-minutes")
                .copied()
                .unwrap_or(60),
        )
        .with_stay_signed_in_days(
            matches
                .get_one::<u32>("auth-stay-signed-in-days")
                .copied()
                .unwrap_or(30),
        )
        .with_throttle_seconds(
            matches
                .get_one::<u64>("auth-throttle-seconds")
                .copied()
                .unwrap_or(5),
        )
        .with_encrypt_password(
            matches
                .get_one::<bool>("auth-encrypt-password")
                .copied()
                .unwrap_or(true),
        )
        .with_cookies_force_secure(matches.get_flag("auth-cookies-force-secure"))
        .with_require_user_list_cookie(matches.get_flag("auth-require-user-list-cookie"));

    if let Some(key_file) = matches.get_one::<String>("secure-cookie-key-file") {
        config = config.with_secure_cookie_key_file(key_file);
    }

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8087),
        config,
    })
}
