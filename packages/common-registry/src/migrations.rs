//! Sistema de migrações para o banco local da sessão
//!
//! Este módulo gerencia as migrações do banco SQLite que guarda o login persistido

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_session_slots.sql
    r#"
    -- Slots chave/valor persistidos entre execuções
    CREATE TABLE IF NOT EXISTS session_slots (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações do banco da sessão...");

    // banco novo responde 0
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .context("Falha ao obter versão do banco")?;

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool
            .begin()
            .await
            .context(format!("Falha ao iniciar transação para migração {}", migration_version))?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .context(format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .context(format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction
            .commit()
            .await
            .context(format!("Falha ao confirmar transação para migração {}", migration_version))?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migrations.db");

        let conn_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;
        // segunda execução não reaplica nada
        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;
        assert!(tables.contains(&"session_slots".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_version_is_an_error() -> Result<()> {
        let temp_dir = tempdir()?;
        let conn_options = SqliteConnectOptions::new()
            .filename(temp_dir.path().join("fechado.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(conn_options).await?;
        pool.close().await;

        let err = run_migrations(&pool).await.unwrap_err();
        assert!(err.to_string().contains("versão do banco"));
        Ok(())
    }
}
