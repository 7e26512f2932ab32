use std::sync::Mutex;

use super::*;

// Env mutation is process-wide; every test here holds this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Caller must hold `ENV_LOCK`.
unsafe fn clear_client_env() {
    unsafe {
        std::env::remove_var(API_BASE_URL_ENV);
        std::env::remove_var(STORAGE_PATH_ENV);
        std::env::remove_var(TIMEOUT_MS_ENV);
    }
}

// =============================================================================
// build_config
// =============================================================================

#[test]
fn defaults_when_no_flags_or_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_client_env() };

    let cli = Cli::try_parse_from(["mini-cms", "whoami"]).unwrap();
    let config = build_config(&cli).unwrap();
    assert_eq!(config.base_url, DEFAULT_API_BASE_URL);
    assert_eq!(config.storage_path, PathBuf::from(DEFAULT_STORAGE_PATH));
    assert_eq!(config.timeout, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS));
}

#[test]
fn env_values_apply_without_flags() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_client_env();
        std::env::set_var(API_BASE_URL_ENV, "http://env.test/");
        std::env::set_var(STORAGE_PATH_ENV, "/tmp/env-store.json");
        std::env::set_var(TIMEOUT_MS_ENV, "2500");
    }

    let cli = Cli::try_parse_from(["mini-cms", "whoami"]).unwrap();
    let config = build_config(&cli).unwrap();
    assert_eq!(config.base_url, "http://env.test");
    assert_eq!(config.storage_path, PathBuf::from("/tmp/env-store.json"));
    assert_eq!(config.timeout, Duration::from_millis(2500));

    unsafe { clear_client_env() };
}

#[test]
fn base_url_flag_overrides_invalid_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_client_env();
        std::env::set_var(API_BASE_URL_ENV, "not a url");
    }

    let cli = Cli::try_parse_from(["mini-cms", "--base-url", "http://ok.test", "whoami"]).unwrap();
    let config = build_config(&cli).unwrap();
    assert_eq!(config.base_url, "http://ok.test");

    unsafe { clear_client_env() };
}

#[test]
fn flags_override_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_client_env();
        std::env::set_var(STORAGE_PATH_ENV, "/tmp/env-store.json");
        std::env::set_var(TIMEOUT_MS_ENV, "2500");
    }

    let cli = Cli::try_parse_from([
        "mini-cms",
        "--storage-path",
        "/tmp/flag-store.json",
        "--timeout-ms",
        "100",
        "logout",
    ])
    .unwrap();
    let config = build_config(&cli).unwrap();
    assert_eq!(config.storage_path, PathBuf::from("/tmp/flag-store.json"));
    assert_eq!(config.timeout, Duration::from_millis(100));

    unsafe { clear_client_env() };
}

#[test]
fn invalid_base_url_flag_is_config_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_client_env() };

    let cli = Cli::try_parse_from(["mini-cms", "--base-url", "not a url", "whoami"]).unwrap();
    assert!(matches!(build_config(&cli), Err(CliError::Config(ConfigError::InvalidBaseUrl(_)))));
}
