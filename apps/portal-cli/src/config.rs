//! Configuração resolvida uma única vez na inicialização
//!
//! Ordem de precedência: flag da linha de comando, variável de ambiente (incluindo
//! `.env`), valor padrão.

use common_registry::{RegistryConfig, SessionDbConfig};

use crate::cli::Cli;

pub const REGISTRY_URL_VAR: &str = "PORTAL_REGISTRY_URL";
pub const SESSION_DB_VAR: &str = "PORTAL_SESSION_DB";
pub const LOG_FILTER_VAR: &str = "PORTAL_LOG";
pub const DEFAULT_LOG_FILTER: &str = "portal=warn,common_registry=warn";

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub registry: RegistryConfig,
    pub session_db: SessionDbConfig,
    pub log_json: bool,
}

fn pick(flag: Option<String>, env: Option<String>) -> Option<String> {
    flag.or(env)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl PortalConfig {
    pub fn resolve(cli: &Cli) -> Self {
        Self::from_sources(
            cli.registry_url.clone(),
            std::env::var(REGISTRY_URL_VAR).ok(),
            cli.session_db.clone(),
            std::env::var(SESSION_DB_VAR).ok(),
            cli.log_json,
        )
    }

    fn from_sources(
        registry_flag: Option<String>,
        registry_env: Option<String>,
        session_flag: Option<String>,
        session_env: Option<String>,
        log_json: bool,
    ) -> Self {
        let mut registry = RegistryConfig::default();
        if let Some(base_url) = pick(registry_flag, registry_env) {
            registry.base_url = base_url;
        }

        let mut session_db = SessionDbConfig::default();
        if let Some(db_path) = pick(session_flag, session_env) {
            session_db.db_path = db_path;
        }

        Self {
            registry,
            session_db,
            log_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_env() {
        let config = PortalConfig::from_sources(
            Some("http://registry:4000".to_string()),
            Some("http://env:3000".to_string()),
            None,
            Some("/tmp/portal.db".to_string()),
            false,
        );

        assert_eq!(config.registry.base_url, "http://registry:4000");
        assert_eq!(config.session_db.db_path, "/tmp/portal.db");
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = PortalConfig::from_sources(None, Some("  ".to_string()), None, None, true);

        assert_eq!(config.registry.base_url, RegistryConfig::default().base_url);
        assert_eq!(config.session_db.db_path, SessionDbConfig::default().db_path);
        assert!(config.log_json);
    }
}
