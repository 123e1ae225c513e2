//! Definições de erro para a biblioteca common-registry
//!
//! Este módulo define os tipos de erro usados pela biblioteca

use thiserror::Error;

use crate::models::Cpf;
use crate::registry::Collection;

/// Erros de comunicação com o Registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Falha de comunicação com o Registry: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Registry respondeu {status} para {method} {path}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    #[error("Resposta inválida do Registry para /{collection}: {source}")]
    Decode {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("Falha ao serializar registro: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Erros do fluxo de cadastro
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Dados inválidos: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("CPF já cadastrado: {0}")]
    DuplicateCpf(Cpf),

    #[error("E-mail já cadastrado: {0}")]
    DuplicateEmail(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Erros do armazenamento local da sessão
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Erro de conexão com banco de dados da sessão: {0}")]
    Connection(String),

    #[error("Erro de consulta na sessão: {0}")]
    Query(String),

    #[error("Erro interno da sessão: {0}")]
    Internal(String),
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for SessionError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(dbe) => SessionError::Query(dbe.message().to_string()),
            sqlx::Error::ColumnNotFound(col) => {
                SessionError::Query(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                SessionError::Query(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => SessionError::Connection(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => SessionError::Connection(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                SessionError::Connection("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                SessionError::Connection("Timeout no pool de conexões".to_string())
            }
            _ => SessionError::Internal(format!("Erro inesperado: {:?}", error)),
        }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;
pub type SessionResult<T> = std::result::Result<T, SessionError>;
