//! Environment overrides live in their own test binary so no other test sees them.

use odzen::settings::Settings;
use std::fs;
use std::time::Duration;

#[test]
fn environment_overrides_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odzen.toml");
    fs::write(&path, "busy_timeout_ms = 100\nlog_filter = \"warn\"\n").unwrap();

    // SAFETY: this is the only test in the binary, so nothing reads the
    // environment concurrently.
    unsafe {
        std::env::set_var("ODZEN_BUSY_TIMEOUT_MS", "250");
        std::env::set_var("ODZEN_DATABASE_URL", "/var/lib/odzen/od.sqlite3");
    }
    let loaded = Settings::load_from(path.to_str().unwrap());
    unsafe {
        std::env::remove_var("ODZEN_BUSY_TIMEOUT_MS");
        std::env::remove_var("ODZEN_DATABASE_URL");
    }

    let settings = loaded.unwrap();
    assert_eq!(settings.busy_timeout(), Duration::from_millis(250));
    assert_eq!(settings.database_url, "/var/lib/odzen/od.sqlite3");
    assert_eq!(settings.log_filter, "warn");
    assert_eq!(settings.attachment_max_mb, Settings::default().attachment_max_mb);
}
