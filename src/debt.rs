//! Debt totals and amount-weighted rates per currency.

use crate::ledger::{Ledger, LedgerRow};
use crate::schema::{BankDebt, CommercialDebt, Currency, MarketDebt};
use log::warn;

/// What the rollup needs from a debt row.
pub trait DebtLine: LedgerRow {
    fn currency(&self) -> Currency;
    /// Outstanding amount the row contributes to its currency total.
    fn amount(&self) -> f64;
    fn rate(&self) -> f64;
}

fn rate_for(currency: Currency, rate_ars: f64, rate_usd: f64) -> f64 {
    match currency {
        Currency::Ars => rate_ars,
        Currency::Usd => rate_usd,
    }
}

impl DebtLine for BankDebt {
    fn currency(&self) -> Currency {
        self.currency
    }

    fn amount(&self) -> f64 {
        self.amortizing_balance
            + self.check_discount
            + self.overdraft
            + self.sgr_guarantees
            + self.credit_card
            + self.leasing
            + self.trade_finance
    }

    fn rate(&self) -> f64 {
        rate_for(self.currency, self.rate_ars, self.rate_usd)
    }
}

impl DebtLine for MarketDebt {
    fn currency(&self) -> Currency {
        self.currency
    }

    fn amount(&self) -> f64 {
        self.negotiable_obligations + self.own_check_discount + self.promissory_notes + self.multilateral
    }

    fn rate(&self) -> f64 {
        rate_for(self.currency, self.rate_ars, self.rate_usd)
    }
}

impl DebtLine for CommercialDebt {
    fn currency(&self) -> Currency {
        self.currency
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyRollup {
    pub currency: Currency,
    pub total: f64,
    pub weighted_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebtRollup {
    pub category: String,
    /// One entry per currency in [`Currency::ALL`] order, zero when unused.
    pub by_currency: Vec<CurrencyRollup>,
}

impl DebtRollup {
    pub fn currency(&self, currency: Currency) -> CurrencyRollup {
        self.by_currency
            .iter()
            .find(|c| c.currency == currency)
            .copied()
            .unwrap_or(CurrencyRollup {
                currency,
                total: 0.0,
                weighted_rate: 0.0,
            })
    }
}

fn finite_or_zero(value: f64, what: &str, category: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!("Non-finite {} in '{}' treated as zero", what, category);
        0.0
    }
}

/// Σ(amount × rate) / Σ amount per currency; 0 when the currency total is 0.
pub fn weighted_by_currency<I>(category: &str, lines: I) -> DebtRollup
where
    I: IntoIterator<Item = (Currency, f64, f64)>,
{
    let mut totals = [(0.0_f64, 0.0_f64); Currency::ALL.len()];

    for (currency, amount, rate) in lines {
        let amount = finite_or_zero(amount, "amount", category);
        let rate = finite_or_zero(rate, "rate", category);
        let slot = &mut totals[currency as usize];
        slot.0 += amount;
        slot.1 += amount * rate;
    }

    let by_currency = Currency::ALL
        .iter()
        .zip(totals)
        .map(|(currency, (total, weighted))| CurrencyRollup {
            currency: *currency,
            total,
            weighted_rate: if total == 0.0 { 0.0 } else { weighted / total },
        })
        .collect();

    DebtRollup {
        category: category.to_string(),
        by_currency,
    }
}

pub fn rollup<R: DebtLine>(ledger: &Ledger<R>) -> DebtRollup {
    weighted_by_currency(
        R::LEDGER,
        ledger.rows().map(|r| (r.currency(), r.amount(), r.rate())),
    )
}

/// Grand total across categories, weighted by each category's total rather than by row.
pub fn grand_total(categories: &[DebtRollup]) -> DebtRollup {
    weighted_by_currency(
        "Total",
        categories.iter().flat_map(|c| {
            c.by_currency
                .iter()
                .map(|r| (r.currency, r.total, r.weighted_rate))
        }),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebtSummary {
    pub bank: DebtRollup,
    pub market: DebtRollup,
    pub commercial: DebtRollup,
    pub total: DebtRollup,
}

impl DebtSummary {
    pub fn categories(&self) -> [&DebtRollup; 4] {
        [&self.bank, &self.market, &self.commercial, &self.total]
    }
}

pub fn summarize(
    bank: &Ledger<BankDebt>,
    market: &Ledger<MarketDebt>,
    commercial: &Ledger<CommercialDebt>,
) -> DebtSummary {
    let bank = rollup(bank);
    let market = rollup(market);
    let commercial = rollup(commercial);
    let total = grand_total(&[bank.clone(), market.clone(), commercial.clone()]);

    DebtSummary {
        bank,
        market,
        commercial,
        total,
    }
}
