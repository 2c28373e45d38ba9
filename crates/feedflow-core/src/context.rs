//! Portfolio context handed to the analysis service
//!
//! The engine snapshots current holdings once per execution. The snapshot is
//! owned data; later changes to holdings never reach an execution in flight.

use crate::error::ExternalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One position in the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub value: f64,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, quantity: f64, value: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            value,
        }
    }
}

/// Snapshot of holdings passed along with an item
///
/// # Example
///
/// ```
/// use feedflow_core::{Holding, PortfolioContext};
///
/// let ctx = PortfolioContext::new()
///     .with_holding(Holding::new("BTC", 0.5, 30_000.0))
///     .with_holding(Holding::new("VTI", 10.0, 2_500.0));
///
/// assert_eq!(ctx.holdings().len(), 2);
/// assert!((ctx.total_value() - 32_500.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioContext {
    holdings: Vec<Holding>,
    total_value: f64,
}

impl PortfolioContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a list of holdings
    pub fn from_holdings(holdings: impl IntoIterator<Item = Holding>) -> Self {
        holdings
            .into_iter()
            .fold(Self::new(), PortfolioContext::with_holding)
    }

    /// Add a holding
    pub fn with_holding(mut self, holding: Holding) -> Self {
        self.push(holding);
        self
    }

    /// Add a holding in place, keeping the total in step
    pub fn push(&mut self, holding: Holding) {
        self.total_value += holding.value;
        self.holdings.push(holding);
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// Source of current holdings
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Current holdings; an empty list means nothing to pass along
    async fn holdings(&self) -> Result<Vec<Holding>, ExternalError>;
}

/// Fixed holdings, for configuration-driven setups and tests
#[derive(Debug, Clone, Default)]
pub struct StaticHoldings {
    holdings: Vec<Holding>,
}

impl StaticHoldings {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self { holdings }
    }
}

#[async_trait]
impl HoldingsProvider for StaticHoldings {
    async fn holdings(&self) -> Result<Vec<Holding>, ExternalError> {
        Ok(self.holdings.clone())
    }
}
