//! Validation helpers for binding configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BindingConfig, SessionDefaults};

const SESSION: &str = "session";
const CALLBACK_SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

/// Check a configuration for values the engine cannot accept.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] describing the first offending field.
pub fn validate(config: &BindingConfig) -> ConfigResult<()> {
    if let Some(path) = &config.library_path
        && path.as_os_str().is_empty()
    {
        return Err(ConfigError::InvalidField {
            section: "binding",
            field: "library_path",
            value: None,
            reason: "must not be empty",
        });
    }
    validate_session(&config.session)
}

fn validate_session(session: &SessionDefaults) -> ConfigResult<()> {
    ensure_c_int_count("thread_count", session.thread_count)?;
    ensure_c_int_count("chunk_size_mb", session.chunk_size_mb)?;

    if let Some(agent) = &session.user_agent {
        ensure_c_string("user_agent", agent)?;
    }

    match (&session.remote_callback_url, session.use_callback_url) {
        (Some(url), _) => {
            ensure_c_string("remote_callback_url", url)?;
            if !session.use_callback_url {
                return Err(invalid(
                    "remote_callback_url",
                    Some(url),
                    "requires use_callback_url",
                ));
            }
            let lowered = url.to_ascii_lowercase();
            if !CALLBACK_SCHEMES
                .iter()
                .any(|scheme| lowered.starts_with(scheme) && lowered.len() > scheme.len())
            {
                return Err(invalid(
                    "remote_callback_url",
                    Some(url),
                    "must be an http(s) or ws(s) URL",
                ));
            }
        }
        (None, true) => {
            return Err(invalid(
                "use_callback_url",
                None,
                "requires remote_callback_url",
            ));
        }
        (None, false) => {
            if session.use_socket.is_some() {
                return Err(invalid(
                    "use_socket",
                    None,
                    "only applies with remote_callback_url",
                ));
            }
        }
    }

    Ok(())
}

fn ensure_c_int_count(field: &'static str, value: u32) -> ConfigResult<()> {
    if value == 0 {
        return Err(invalid(field, Some(&value.to_string()), "must be positive"));
    }
    if i32::try_from(value).is_err() {
        return Err(invalid(
            field,
            Some(&value.to_string()),
            "must fit within 32-bit signed integer range",
        ));
    }
    Ok(())
}

fn ensure_c_string(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.contains('\0') {
        return Err(invalid(field, None, "must not contain NUL bytes"));
    }
    Ok(())
}

fn invalid(field: &'static str, value: Option<&str>, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        section: SESSION,
        field,
        value: value.map(str::to_owned),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn reason_of(result: ConfigResult<()>) -> (&'static str, &'static str) {
        match result {
            Err(ConfigError::InvalidField { field, reason, .. }) => (field, reason),
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        validate(&BindingConfig::default()).expect("defaults validate");
    }

    #[test]
    fn zero_and_oversized_counts_are_rejected() {
        let mut config = BindingConfig::default();
        config.session.thread_count = 0;
        assert_eq!(
            reason_of(validate(&config)),
            ("thread_count", "must be positive")
        );

        config.session.thread_count = 8;
        config.session.chunk_size_mb = u32::MAX;
        assert_eq!(
            reason_of(validate(&config)),
            (
                "chunk_size_mb",
                "must fit within 32-bit signed integer range"
            )
        );
    }

    #[test]
    fn remote_callback_requires_flag_and_scheme() {
        let mut config = BindingConfig::default();
        config.session.remote_callback_url = Some("ws://127.0.0.1:9000".to_string());
        assert_eq!(
            reason_of(validate(&config)),
            ("remote_callback_url", "requires use_callback_url")
        );

        config.session.use_callback_url = true;
        validate(&config).expect("websocket callback url accepted");

        config.session.remote_callback_url = Some("ftp://host".to_string());
        assert_eq!(
            reason_of(validate(&config)),
            ("remote_callback_url", "must be an http(s) or ws(s) URL")
        );

        config.session.remote_callback_url = None;
        assert_eq!(
            reason_of(validate(&config)),
            ("use_callback_url", "requires remote_callback_url")
        );
    }

    #[test]
    fn socket_flag_without_remote_url_is_rejected() {
        let mut config = BindingConfig::default();
        config.session.use_socket = Some(true);
        assert_eq!(
            reason_of(validate(&config)),
            ("use_socket", "only applies with remote_callback_url")
        );
    }

    #[test]
    fn nul_bytes_and_empty_paths_are_rejected() {
        let mut config = BindingConfig::default();
        config.session.user_agent = Some("agent\0".to_string());
        assert_eq!(
            reason_of(validate(&config)),
            ("user_agent", "must not contain NUL bytes")
        );

        let config = BindingConfig {
            library_path: Some(PathBuf::new()),
            ..BindingConfig::default()
        };
        assert_eq!(
            reason_of(validate(&config)),
            ("library_path", "must not be empty")
        );
    }
}
