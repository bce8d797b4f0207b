use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("guardpost")
        .about("PAM-backed sign-in and session credentials")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8087")
                .env("GUARDPOST_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("revocation-dir")
                .short('r')
                .long("revocation-dir")
                .help("Directory holding the revocation list and its lock file")
                .default_value("/var/lib/guardpost")
                .env("GUARDPOST_REVOCATION_DIR"),
        )
        .arg(
            Arg::new("pam-helper")
                .long("pam-helper")
                .help("Path to the setuid PAM conversation helper")
                .default_value("/usr/lib/guardpost/pam-helper")
                .env("GUARDPOST_PAM_HELPER"),
        )
        .arg(
            Arg::new("auth-timeout-minutes")
                .long("auth-timeout-minutes")
                .help("Idle session timeout in minutes, 0 disables the sliding window")
                .default_value("60")
                .env("GUARDPOST_AUTH_TIMEOUT_MINUTES")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("auth-stay-signed-in-days")
                .long("auth-stay-signed-in-days")
                .help("Validity in days for persistent sign-ins when the idle timeout is 0")
                .default_value("30")
                .env("GUARDPOST_AUTH_STAY_SIGNED_IN_DAYS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("auth-throttle-seconds")
                .long("auth-throttle-seconds")
                .help("Minimum seconds between sign-in attempts per user")
                .default_value("5")
                .env("GUARDPOST_AUTH_THROTTLE_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("auth-encrypt-password")
                .long("auth-encrypt-password")
                .help("Expect RSA-encrypted credentials from the sign-in form")
                .default_value("true")
                .env("GUARDPOST_AUTH_ENCRYPT_PASSWORD")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new("auth-cookies-force-secure")
                .long("auth-cookies-force-secure")
                .help("Mark auth cookies Secure even when the request looks like plain HTTP")
                .env("GUARDPOST_AUTH_COOKIES_FORCE_SECURE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("auth-require-user-list-cookie")
                .long("auth-require-user-list-cookie")
                .help("Reject sessions whose user-list fingerprint cookie is stale")
                .env("GUARDPOST_AUTH_REQUIRE_USER_LIST_COOKIE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("secure-cookie-key-file")
                .long("secure-cookie-key-file")
                .help("Path to the shared cookie signing key, defaults to one under the revocation dir")
                .env("GUARDPOST_SECURE_COOKIE_KEY_FILE"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("GUARDPOST_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "guardpost");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "PAM-backed sign-in and session credentials"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_defaults() {
        let command = new();
        let matches = command.get_matches_from(vec!["guardpost"]);

        assert_eq!(matches.get_one::<u16>("port").map(|s| *s), Some(8087));
        assert_eq!(
            matches
                .get_one::<String>("revocation-dir")
                .map(|s| s.to_string()),
            Some("/var/lib/guardpost".to_string())
        );
        assert_eq!(
            matches.get_one::<u32>("auth-timeout-minutes").map(|s| *s),
            Some(60)
        );
        assert_eq!(
            matches.get_one::<bool>("auth-encrypt-password").map(|s| *s),
            Some(true)
        );
        assert!(!matches.get_flag("auth-cookies-force-secure"));
        assert!(!matches.get_flag("auth-require-user-list-cookie"));
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("GUARDPOST_PORT", Some("443")),
                ("GUARDPOST_REVOCATION_DIR", Some("/tmp/guardpost")),
                ("GUARDPOST_PAM_HELPER", Some("/opt/pam-helper")),
                ("GUARDPOST_AUTH_TIMEOUT_MINUTES", Some("0")),
                ("GUARDPOST_AUTH_ENCRYPT_PASSWORD", Some("false")),
                ("GUARDPOST_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["guardpost"]);
                assert_eq!(matches.get_one::<u16>("port").map(|s| *s), Some(443));
                assert_eq!(
                    matches
                        .get_one::<String>("revocation-dir")
                        .map(|s| s.to_string()),
                    Some("/tmp/guardpost".to_string())
                );
                assert_eq!(
                    matches
                        .get_one::<String>("pam-helper")
                        .map(|s| s.to_string()),
                    Some("/opt/pam-helper".to_string())
                );
                assert_eq!(
                    matches.get_one::<u32>("auth-timeout-minutes").map(|s| *s),
                    Some(0)
                );
                assert_eq!(
                    matches.get_one::<bool>("auth-encrypt-password").map(|s| *s),
                    Some(false)
                );
                assert_eq!(matches.get_one::<u8>("verbosity").map(|s| *s), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("GUARDPOST_LOG_LEVEL", Some(level))], || {
                let command = new();
                let matches = command.get_matches_from(vec!["guardpost"]);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").map(|s| *s),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("GUARDPOST_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["guardpost".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();

                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").map(|s| *s),
                    Some(index as u8)
                );
            });
        }
    }
}
