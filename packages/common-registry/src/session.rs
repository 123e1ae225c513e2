//! Sessão do usuário logado
//!
//! A sessão é um objeto explícito, criado a partir do slot persistido e passado a
//! quem precisa. O identificador é guardado como digitado, sem validação de e-mail.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::SessionResult;

/// Chave do slot que guarda o login
pub const SESSION_KEY: &str = "usuarioLogado";

/// Slot chave/valor persistido no banco local
#[derive(Debug, Clone)]
pub struct SessionSlot {
    pool: SqlitePool,
    key: String,
}

impl SessionSlot {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            key: SESSION_KEY.to_string(),
        }
    }

    pub async fn read(&self) -> SessionResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM session_slots WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn write(&self, value: &str) -> SessionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO session_slots (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&self.key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear(&self) -> SessionResult<()> {
        sqlx::query("DELETE FROM session_slots WHERE key = ?")
            .bind(&self.key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Session {
    slot: SessionSlot,
    current: Option<String>,
}

impl Session {
    /// Lê o login persistido, se houver
    pub async fn restore(slot: SessionSlot) -> SessionResult<Self> {
        let current = slot.read().await?;
        if let Some(identifier) = &current {
            info!("Sessão restaurada para {}", identifier);
        }
        Ok(Self { slot, current })
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.is_some()
    }

    pub async fn login(&mut self, identifier: impl Into<String>) -> SessionResult<()> {
        let identifier = identifier.into();
        self.slot.write(&identifier).await?;
        info!("Login de {}", identifier);
        self.current = Some(identifier);
        Ok(())
    }

    pub async fn logout(&mut self) -> SessionResult<()> {
        self.slot.clear().await?;
        if let Some(identifier) = self.current.take() {
            info!("Logout de {}", identifier);
        }
        Ok(())
    }
}
