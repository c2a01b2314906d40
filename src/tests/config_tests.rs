#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig, Cli};
    use std::env;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests that touch the process environment must not interleave.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 5] = [
        "PORT",
        "DATABASE_URL",
        "SNIPPETBOX__SERVER__ADDR",
        "SNIPPETBOX__DATABASE__URL",
        "SNIPPETBOX__SESSION__LIFETIME_HOURS",
    ];

    /// Clears the override variables for the duration of a test.
    struct CleanEnv {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl CleanEnv {
        fn new() -> Self {
            let saved = OVERRIDE_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
            for k in OVERRIDE_VARS {
                env::remove_var(k);
            }
            Self { saved }
        }
    }

    impl Drop for CleanEnv {
        fn drop(&mut self) {
            for (k, v) in &self.saved {
                match v {
                    Some(v) => env::set_var(k, v),
                    None => env::remove_var(k),
                }
            }
        }
    }

    fn write_temp_config(content: &str) -> NamedTempFile {
        let temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        fs::write(temp_file.path(), content).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.addr, "127.0.0.1:4000");
        assert!(!config.server.debug);
        assert!(!config.server.tls);
        assert_eq!(config.database.url, "sqlite://data/snippetbox.db");
        assert_eq!(config.database.query_timeout_secs, 5);
        assert_eq!(config.session.cookie_name, "session");
        assert_eq!(config.session.lifetime_hours, 12);
        assert_eq!(config.security.server_header, "Go");
        assert!(config.security.csp.starts_with("default-src 'self'"));
        assert!(!config.security.enable_hsts);
    }

    #[test]
    fn test_load_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = CleanEnv::new();

        let config = config::load(&Cli::default()).unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 4000);
        assert_eq!(config.query_timeout(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_addr_shorthand() {
        let mut config = AppConfig::default();
        config.server.addr = ":4000".into();
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:4000");

        config.server.addr = "not an address".into();
        assert!(config.listen_addr().is_err());
    }

    #[test]
    fn test_precedence_file_env_flags() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = CleanEnv::new();

        let file = write_temp_config(
            r#"
[server]
addr = "127.0.0.1:5000"

[database]
url = "sqlite://from-file.db"

[session]
lifetime_hours = 24
"#,
        );

        let mut cli = Cli { config: Some(file.path().to_path_buf()), ..Default::default() };
        let config = config::load(&cli).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:5000");
        assert_eq!(config.database.url, "sqlite://from-file.db");
        assert_eq!(config.session.lifetime_hours, 24);

        // Environment beats the file.
        env::set_var("SNIPPETBOX__DATABASE__URL", "sqlite://from-env.db");
        env::set_var("SNIPPETBOX__SESSION__LIFETIME_HOURS", "6");
        let config = config::load(&cli).unwrap();
        assert_eq!(config.database.url, "sqlite://from-env.db");
        assert_eq!(config.session.lifetime_hours, 6);

        // DATABASE_URL beats the generic variables.
        env::set_var("DATABASE_URL", "sqlite://database-url.db");
        let config = config::load(&cli).unwrap();
        assert_eq!(config.database.url, "sqlite://database-url.db");

        // Flags beat everything.
        cli.dsn = Some("sqlite://from-flag.db".into());
        cli.addr = Some(":4100".into());
        cli.debug = true;
        let config = config::load(&cli).unwrap();
        assert_eq!(config.database.url, "sqlite://from-flag.db");
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:4100");
        assert!(config.server.debug);
    }

    #[test]
    fn test_port_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = CleanEnv::new();

        env::set_var("PORT", "8081");
        let config = config::load(&Cli::default()).unwrap();
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:8081");

        // An explicit --addr still wins.
        let cli = Cli { addr: Some("127.0.0.1:9000".into()), ..Default::default() };
        let config = config::load(&cli).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:9000");

        env::set_var("PORT", "eighty");
        let err = config::load(&Cli::default()).unwrap_err();
        assert!(err.to_string().contains("invalid PORT"));
    }

    #[test]
    fn test_validation_errors() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = CleanEnv::new();

        let cli = Cli { dsn: Some("   ".into()), ..Default::default() };
        let err = config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("database.url must not be empty"));

        let cli = Cli { addr: Some("nowhere".into()), ..Default::default() };
        let err = config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("invalid server.addr"));

        let cli = Cli { tls: true, cert: Some(String::new()), ..Default::default() };
        let err = config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("TLS requires both a certificate and a key"));

        let file = write_temp_config("[database]\nmax_connections = 0\n");
        let cli = Cli { config: Some(file.path().to_path_buf()), ..Default::default() };
        let err = config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("database.max_connections must be > 0"));

        let file = write_temp_config("[session]\nlifetime_hours = 9223372036854775807\n");
        let cli = Cli { config: Some(file.path().to_path_buf()), ..Default::default() };
        let err = config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("session.lifetime_hours must be between 1 and 8784"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = CleanEnv::new();

        let cli = Cli {
            config: Some(std::path::PathBuf::from("/definitely/not/here/snippetbox.toml")),
            ..Default::default()
        };
        assert!(config::load(&cli).is_err());
    }

    #[test]
    fn test_ensure_sqlite_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("app.db");
        let url = format!("sqlite://{}", db_path.display());

        config::ensure_sqlite_parent_dir(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());

        config::ensure_sqlite_parent_dir("sqlite::memory:").unwrap();
    }
}
