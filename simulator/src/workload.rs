//! Random wallet operation generator.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use fxwallet_common::{Currency, UserId};

/// One wallet operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fund {
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    },
    Withdraw {
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    },
    Convert {
        user_id: UserId,
        from: Currency,
        to: Currency,
        amount: Decimal,
    },
}

impl Operation {
    /// Short name for reports.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Fund { .. } => "fund",
            Operation::Withdraw { .. } => "withdraw",
            Operation::Convert { .. } => "convert",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Fund {
                user_id,
                currency,
                amount,
            } => write!(f, "fund {} {} for user {}", amount, currency, user_id),
            Operation::Withdraw {
                user_id,
                currency,
                amount,
            } => write!(f, "withdraw {} {} for user {}", amount, currency, user_id),
            Operation::Convert {
                user_id,
                from,
                to,
                amount,
            } => write!(f, "convert {} {}->{} for user {}", amount, from, to, user_id),
        }
    }
}

/// Produces a reproducible stream of operations for a seed.
pub struct WorkloadGenerator {
    rng: StdRng,
    user_count: i64,
}

impl WorkloadGenerator {
    /// Create a generator over users `1..=user_count`.
    pub fn new(user_count: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            rng,
            user_count: user_count.max(1) as i64,
        }
    }

    /// Next random operation.
    ///
    /// Mix: 40% fund, 30% withdraw, 30% convert. Amounts are whole cents
    /// between 1.00 and 500.00.
    pub fn next_operation(&mut self) -> Operation {
        let user_id = UserId::new(self.rng.gen_range(1..=self.user_count));
        let currency = if self.rng.gen_bool(0.5) {
            Currency::Usd
        } else {
            Currency::Mxn
        };
        let amount = Decimal::new(self.rng.gen_range(100..=50_000), 2);

        match self.rng.gen_range(0..10) {
            0..=3 => Operation::Fund {
                user_id,
                currency,
                amount,
            },
            4..=6 => Operation::Withdraw {
                user_id,
                currency,
                amount,
            },
            _ => Operation::Convert {
                user_id,
                from: currency,
                to: currency.counterpart(),
                amount,
            },
        }
    }
}
