use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::config::{AssetOverride, TradingConfig};

/// Resolves the quote notional to spend on a symbol.
#[derive(Debug, Clone)]
pub struct NotionalPolicy {
    default_notional: Decimal,
    max_notional: Decimal,
    overrides: HashMap<String, AssetOverride>,
}

impl NotionalPolicy {
    pub fn new(trading: &TradingConfig, overrides: &HashMap<String, AssetOverride>) -> Self {
        Self {
            default_notional: trading.default_base_notional,
            max_notional: trading.max_notional,
            overrides: overrides
                .iter()
                .map(|(symbol, ov)| (symbol.to_uppercase(), ov.clone()))
                .collect(),
        }
    }

    /// Override default first, then the override cap, then the global cap.
    /// Zero-valued override fields are treated as unset.
    pub fn resolve(&self, symbol: &str) -> Decimal {
        let mut size = self.default_notional;

        if let Some(ov) = self.overrides.get(&symbol.to_uppercase()) {
            if ov.default_base_notional > Decimal::ZERO {
                size = ov.default_base_notional;
            }
            if ov.max_notional > Decimal::ZERO && size > ov.max_notional {
                size = ov.max_notional;
            }
        }

        size.min(self.max_notional)
    }
}
