//! SQLite result store.
//!
//! One `TB_FUND` row is appended per completed fund x period run.

use crate::domain::error::GridError;
use crate::domain::summary::RunSummary;
use crate::ports::config_port::ConfigPort;
use crate::ports::result_store_port::ResultStorePort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "fund.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> GridError {
    GridError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> GridError {
    GridError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, GridError> {
        let db_path = config
            .get_string("storage", "path")
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let pool_size = config.get_int("storage", "pool_size", 4);
        if pool_size < 1 {
            return Err(GridError::invalid(
                "storage",
                "pool_size",
                format!("must be at least 1, got {}", pool_size),
            ));
        }

        // Workers write concurrently; wait on the file lock instead of failing.
        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, GridError> {
        // Every in-memory connection is its own database, so keep exactly one.
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, GridError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), GridError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS TB_FUND (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fund_code TEXT,
                period TEXT,
                total_value REAL,
                balance REAL,
                holdings_value REAL,
                profit REAL,
                loss REAL,
                percentile_70_price REAL,
                percentile_30_price REAL,
                operation_id INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_tb_fund_code ON TB_FUND(fund_code);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Rows for one fund in insertion order.
    pub fn load_summaries(&self, fund_code: &str) -> Result<Vec<RunSummary>, GridError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT fund_code, period, total_value, balance, holdings_value, profit, loss,
                        percentile_70_price, percentile_30_price, operation_id
                 FROM TB_FUND
                 WHERE fund_code = ?1
                 ORDER BY id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![fund_code], |row| {
                Ok(RunSummary {
                    fund_code: row.get(0)?,
                    period: row.get(1)?,
                    total_value: row.get(2)?,
                    balance: row.get(3)?,
                    holdings_value: row.get(4)?,
                    profit: row.get(5)?,
                    loss: row.get(6)?,
                    percentile_70_price: row.get(7)?,
                    percentile_30_price: row.get(8)?,
                    operation_id: row.get(9)?,
                })
            })
            .map_err(query_err)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row.map_err(query_err)?);
        }
        Ok(summaries)
    }
}

impl ResultStorePort for SqliteAdapter {
    fn save(&self, summary: &RunSummary) -> Result<(), GridError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "INSERT INTO TB_FUND (fund_code, period, total_value, balance, holdings_value,
                                  profit, loss, percentile_70_price, percentile_30_price,
                                  operation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                summary.fund_code,
                summary.period,
                summary.total_value,
                summary.balance,
                summary.holdings_value,
                summary.profit,
                summary.loss,
                summary.percentile_70_price,
                summary.percentile_30_price,
                summary.operation_id
            ],
        )
        .map_err(query_err)?;

        tx.commit().map_err(query_err)?;
        Ok(())
    }
}
