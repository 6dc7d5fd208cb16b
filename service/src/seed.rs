//! Demo data for local runs.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use fxwallet_common::{Currency, Result, UserId};
use fxwallet_ledger::User;

use crate::engine::WalletEngine;

struct DemoAccount {
    id: i64,
    email: &'static str,
    name: &'static str,
    /// Opening balances in cents.
    usd: i64,
    mxn: i64,
}

const DEMO_ACCOUNTS: [DemoAccount; 3] = [
    DemoAccount {
        id: 1,
        email: "john.doe@example.com",
        name: "John Doe",
        usd: 100_000,
        mxn: 500_000,
    },
    DemoAccount {
        id: 2,
        email: "jane.smith@example.com",
        name: "Jane Smith",
        usd: 250_000,
        mxn: 0,
    },
    DemoAccount {
        id: 3,
        email: "bob.johnson@example.com",
        name: "Bob Johnson",
        usd: 50_000,
        mxn: 935_000,
    },
];

/// What a seeding run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users_created: usize,
    pub wallets_funded: usize,
    /// True when demo data was already present.
    pub skipped: bool,
}

/// Create the demo users and fund their wallets.
///
/// Balances are funded through the engine so each one has a matching fund
/// transaction. Does nothing if the first demo user already exists.
pub async fn seed_demo_data(engine: &WalletEngine) -> Result<SeedReport> {
    let mut unit = engine.ledger().begin().await?;

    if unit.user_exists(UserId::new(DEMO_ACCOUNTS[0].id)).await? {
        info!("Demo data already present, skipping seed");
        return Ok(SeedReport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = SeedReport::default();
    for account in &DEMO_ACCOUNTS {
        let user = User::new(UserId::new(account.id), account.email, account.name);
        if unit.create_user(&user).await? {
            report.users_created += 1;
        }
        for (currency, cents) in [(Currency::Usd, account.usd), (Currency::Mxn, account.mxn)] {
            if cents == 0 {
                unit.get_or_create_wallet(user.id, currency).await?;
            }
        }
    }
    unit.commit().await?;

    for account in &DEMO_ACCOUNTS {
        for (currency, cents) in [(Currency::Usd, account.usd), (Currency::Mxn, account.mxn)] {
            if cents > 0 {
                engine
                    .fund(UserId::new(account.id), currency, Decimal::new(cents, 2))
                    .await?;
                report.wallets_funded += 1;
            }
        }
    }

    info!(
        users_created = report.users_created,
        wallets_funded = report.wallets_funded,
        "Demo data seeded"
    );
    Ok(report)
}
