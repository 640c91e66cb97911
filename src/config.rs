use std::{env, fmt, path::PathBuf};

const DEFAULT_DATABASE_URL: &str = "sqlite://site.db?mode=rwc";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_MB: usize = 512;

/// Process-wide settings, read once at startup.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub admin: AdminCredentials,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// The single administrator login. Lives in the environment, never in the binary.
#[derive(Clone)]
pub struct AdminCredentials {
    email: String,
    pin: String,
}

impl AdminCredentials {
    pub fn new(email: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            pin: pin.into().trim().to_string(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Exact comparison of the trimmed submission against the configured pair.
    pub fn matches(&self, email: &str, pin: &str) -> bool {
        email.trim() == self.email && pin.trim() == self.pin
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("pin", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} env var is missing"),
            ConfigError::Invalid { key, value } => {
                write!(f, "{key} env var has an invalid value: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let admin_email = non_blank("ADMIN_EMAIL").ok_or(ConfigError::Missing("ADMIN_EMAIL"))?;
        let admin_pin = non_blank("ADMIN_PIN").ok_or(ConfigError::Missing("ADMIN_PIN"))?;

        let port = match non_blank("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let max_upload_mb: usize = match non_blank("MAX_UPLOAD_MB") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "MAX_UPLOAD_MB",
                value: raw,
            })?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        Ok(Self {
            database_url: non_blank("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            upload_dir: PathBuf::from(
                non_blank("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            admin: AdminCredentials::new(admin_email, admin_pin),
            port,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let config =
            PortalConfig::from_lookup(lookup_from(&[("ADMIN_EMAIL", "a@b.c"), ("ADMIN_PIN", "1")]))
                .expect("config");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes, 512 * 1024 * 1024);
    }

    #[test]
    fn admin_credentials_are_required() {
        let err = PortalConfig::from_lookup(lookup_from(&[("ADMIN_PIN", "1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ADMIN_EMAIL")));

        let err = PortalConfig::from_lookup(lookup_from(&[
            ("ADMIN_EMAIL", "a@b.c"),
            ("ADMIN_PIN", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ADMIN_PIN")));
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = PortalConfig::from_lookup(lookup_from(&[
            ("ADMIN_EMAIL", "a@b.c"),
            ("ADMIN_PIN", "1"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn admin_match_requires_both_fields_after_trim() {
        let admin = AdminCredentials::new("admin@escola.br", "hercul1");
        assert!(admin.matches("admin@escola.br", "hercul1"));
        assert!(admin.matches("  admin@escola.br \n", " hercul1\t"));
        assert!(!admin.matches("admin@escola.br", "hercul2"));
        assert!(!admin.matches("other@escola.br", "hercul1"));
        assert!(!admin.matches("ADMIN@escola.br", "hercul1"));
        assert!(!admin.matches("", ""));
    }

    #[test]
    fn debug_output_hides_pin() {
        let admin = AdminCredentials::new("admin@escola.br", "segredo");
        let rendered = format!("{admin:?}");
        assert!(!rendered.contains("segredo"));
    }
}
