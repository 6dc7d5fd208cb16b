//! PostgreSQL ledger backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxwallet_common::{Currency, TransactionId, UserId};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres};
use tracing::{debug, info};

use crate::account::{User, Wallet};
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{NewTransaction, Transaction, TransactionKind, TransactionQuery, TransactionType};
use crate::repository::{LedgerStore, LedgerUnit};

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, currency, amount, \
     from_currency, to_currency, from_amount, to_amount, fx_rate, created_at";

/// Ledger backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Connect to the database.
    pub async fn connect(url: &str, max_connections: u32) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;

        info!(max_connections, "Connected to ledger database");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Ledger schema up to date");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn begin(&self) -> LedgerResult<Box<dyn LedgerUnit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnit { tx }))
    }
}

/// One database transaction. Rolled back by sqlx when dropped uncommitted.
struct PgUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[derive(Debug, FromRow)]
struct WalletRow {
    user_id: i64,
    currency: String,
    balance: Decimal,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = LedgerError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet {
            user_id: UserId::new(row.user_id),
            currency: parse_currency(&row.currency)?,
            balance: row.balance,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: i64,
    user_id: i64,
    transaction_type: String,
    currency: Option<String>,
    amount: Option<Decimal>,
    from_currency: Option<String>,
    to_currency: Option<String>,
    from_amount: Option<Decimal>,
    to_amount: Option<Decimal>,
    fx_rate: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let transaction_type: TransactionType = row
            .transaction_type
            .parse()
            .map_err(LedgerError::CorruptRecord)?;

        let kind = match transaction_type {
            TransactionType::Fund => TransactionKind::Fund {
                currency: parse_currency(required(row.id, "currency", row.currency.as_deref())?)?,
                amount: required(row.id, "amount", row.amount)?,
            },
            TransactionType::Withdraw => TransactionKind::Withdraw {
                currency: parse_currency(required(row.id, "currency", row.currency.as_deref())?)?,
                amount: required(row.id, "amount", row.amount)?,
            },
            TransactionType::Convert => TransactionKind::Convert {
                from_currency: parse_currency(required(
                    row.id,
                    "from_currency",
                    row.from_currency.as_deref(),
                )?)?,
                to_currency: parse_currency(required(
                    row.id,
                    "to_currency",
                    row.to_currency.as_deref(),
                )?)?,
                from_amount: required(row.id, "from_amount", row.from_amount)?,
                to_amount: required(row.id, "to_amount", row.to_amount)?,
                fx_rate: required(row.id, "fx_rate", row.fx_rate)?,
            },
        };

        Ok(Transaction {
            id: TransactionId::new(row.id),
            user_id: UserId::new(row.user_id),
            kind,
            created_at: row.created_at,
        })
    }
}

fn required<T>(id: i64, column: &str, value: Option<T>) -> LedgerResult<T> {
    value.ok_or_else(|| LedgerError::CorruptRecord(format!("transaction {} has no {}", id, column)))
}

fn parse_currency(code: &str) -> LedgerResult<Currency> {
    code.parse()
        .map_err(|_| LedgerError::CorruptRecord(format!("unknown currency '{}'", code)))
}

/// Flat column values for an insert.
struct TransactionColumns<'a> {
    currency: Option<&'a str>,
    amount: Option<Decimal>,
    from_currency: Option<&'a str>,
    to_currency: Option<&'a str>,
    from_amount: Option<Decimal>,
    to_amount: Option<Decimal>,
    fx_rate: Option<Decimal>,
}

impl<'a> From<&'a TransactionKind> for TransactionColumns<'a> {
    fn from(kind: &'a TransactionKind) -> Self {
        let empty = TransactionColumns {
            currency: None,
            amount: None,
            from_currency: None,
            to_currency: None,
            from_amount: None,
            to_amount: None,
            fx_rate: None,
        };

        match kind {
            TransactionKind::Fund { currency, amount }
            | TransactionKind::Withdraw { currency, amount } => TransactionColumns {
                currency: Some(currency.code()),
                amount: Some(*amount),
                ..empty
            },
            TransactionKind::Convert {
                from_currency,
                to_currency,
                from_amount,
                to_amount,
                fx_rate,
            } => TransactionColumns {
                from_currency: Some(from_currency.code()),
                to_currency: Some(to_currency.code()),
                from_amount: Some(*from_amount),
                to_amount: Some(*to_amount),
                fx_rate: Some(*fx_rate),
                ..empty
            },
        }
    }
}

#[async_trait]
impl LedgerUnit for PgUnit {
    async fn user_exists(&mut self, user_id: UserId) -> LedgerResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id.value())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn create_user(&mut self, user: &User) -> LedgerResult<bool> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, name, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(user.id.value())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_wallet(
        &mut self,
        user_id: UserId,
        currency: Currency,
    ) -> LedgerResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(
            "SELECT user_id, currency, balance FROM wallets \
             WHERE user_id = $1 AND currency = $2 FOR UPDATE",
        )
        .bind(user_id.value())
        .bind(currency.code())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Wallet::try_from).transpose()
    }

    async fn get_or_create_wallet(
        &mut self,
        user_id: UserId,
        currency: Currency,
    ) -> LedgerResult<Wallet> {
        let inserted = sqlx::query(
            "INSERT INTO wallets (user_id, currency, balance) VALUES ($1, $2, 0) \
             ON CONFLICT (user_id, currency) DO NOTHING",
        )
        .bind(user_id.value())
        .bind(currency.code())
        .execute(&mut *self.tx)
        .await?;

        if inserted.rows_affected() == 1 {
            debug!(user_id = %user_id, currency = %currency, "Created wallet");
        }

        self.get_wallet(user_id, currency)
            .await?
            .ok_or(LedgerError::WalletMissing { user_id, currency })
    }

    async fn update_balance(
        &mut self,
        user_id: UserId,
        currency: Currency,
        balance: Decimal,
    ) -> LedgerResult<Wallet> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance {
                user_id,
                currency,
                balance,
            });
        }

        let row = sqlx::query_as::<_, WalletRow>(
            "UPDATE wallets SET balance = $3, updated_at = NOW() \
             WHERE user_id = $1 AND currency = $2 \
             RETURNING user_id, currency, balance",
        )
        .bind(user_id.value())
        .bind(currency.code())
        .bind(balance)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.ok_or(LedgerError::WalletMissing { user_id, currency })
            .and_then(Wallet::try_from)
    }

    async fn list_wallets(&mut self, user_id: UserId) -> LedgerResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>(
            "SELECT user_id, currency, balance FROM wallets WHERE user_id = $1 ORDER BY currency",
        )
        .bind(user_id.value())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Wallet::try_from).collect()
    }

    async fn create_transaction(&mut self, tx: NewTransaction) -> LedgerResult<Transaction> {
        let columns = TransactionColumns::from(&tx.kind);
        let sql = format!(
            "INSERT INTO transactions (user_id, transaction_type, currency, amount, \
             from_currency, to_currency, from_amount, to_amount, fx_rate) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.user_id.value())
            .bind(tx.kind.transaction_type().as_str())
            .bind(columns.currency)
            .bind(columns.amount)
            .bind(columns.from_currency)
            .bind(columns.to_currency)
            .bind(columns.from_amount)
            .bind(columns.to_amount)
            .bind(columns.fx_rate)
            .fetch_one(&mut *self.tx)
            .await?;

        Transaction::try_from(row)
    }

    async fn list_transactions(
        &mut self,
        user_id: UserId,
        query: TransactionQuery,
    ) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions \
             WHERE user_id = $1 AND ($2::VARCHAR IS NULL OR transaction_type = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3",
            TRANSACTION_COLUMNS
        );

        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(user_id.value())
            .bind(query.transaction_type.map(|t| t.as_str()))
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
