//! Common Registry - Biblioteca compartilhada do portal de telemedicina
//!
//! Esta biblioteca fornece:
//! - Modelos de pacientes, cuidadores e consultas no formato do Registry
//! - Cliente do Registry (HTTP) e cache local com recarga após cada escrita
//! - Ciclo de vida das consultas (agendar, reagendar, cancelar)
//! - Resolução de papéis e vínculos paciente/cuidador pelo CPF
//! - Sessão persistida em um banco SQLite local
//! - Validação dos formulários de cadastro

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

pub mod association;
pub mod error;
pub mod forms;
pub mod lifecycle;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod migrations;
pub mod models;
pub mod record_set;
pub mod registry;
pub mod session;
pub mod store;

pub use association::{Identity, Role};
pub use error::{RegistrationError, RegistryError, SessionError};
pub use lifecycle::AppointmentManager;
pub use models::{Appointment, AppointmentChanges, Caregiver, Cpf, EntityId, NewAppointment, Patient};
pub use registry::{Collection, HttpRegistry, Registry};
pub use session::{Session, SessionSlot};
pub use store::EntityStore;

/// Configuração de acesso ao Registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// URL base do Registry, sem a coleção (`http://localhost:3000`)
    pub base_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Configuração do banco local que guarda a sessão
#[derive(Debug, Clone)]
pub struct SessionDbConfig {
    /// Caminho para o arquivo SQLite
    pub db_path: String,
    /// Número máximo de conexões no pool
    pub max_connections: u32,
}

impl Default for SessionDbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/portal.db".to_string(),
            max_connections: 1,
        }
    }
}

/// Abre (ou cria) o banco da sessão e aplica as migrações pendentes
pub async fn init_session_db(config: &SessionDbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context("Falha ao criar diretório para banco de dados")?;
        }
    }

    let connection_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .pragma("synchronous", "NORMAL");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connection_options)
        .await
        .context("Falha ao conectar ao banco de dados SQLite")?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao aplicar migrações")?;

    info!("Banco da sessão inicializado: {}", config.db_path);
    Ok(pool)
}
