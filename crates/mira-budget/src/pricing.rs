use std::collections::HashMap;

/// Cents per million tokens, one direction.
#[derive(Debug, Clone, Copy)]
pub struct ModelRate {
    pub input_cents_per_million: i64,
    pub output_cents_per_million: i64,
}

/// Versioned pricing table keyed by model name. Rates mirror the
/// provider's published per-million-token USD pricing, converted to
/// integer cents.
#[derive(Debug, Clone)]
pub struct PricingTable {
    pub version: u32,
    rates: HashMap<String, ModelRate>,
}

impl PricingTable {
    pub fn default_table() -> Self {
        let mut rates = HashMap::new();
        rates.insert(
            "gemini-3-pro".to_string(),
            ModelRate { input_cents_per_million: 200, output_cents_per_million: 1200 },
        );
        rates.insert(
            "gemini-3-pro-large-context".to_string(),
            ModelRate { input_cents_per_million: 400, output_cents_per_million: 1800 },
        );
        Self { version: 1, rates }
    }

    pub fn rate(&self, model: &str) -> Option<ModelRate> {
        self.rates.get(model).copied()
    }
}

/// `ceil(tokens / 1e6 * rate_cents)`, computed in integer arithmetic.
pub fn cost_cents(tokens: i64, rate_cents_per_million: i64) -> i64 {
    let numerator = tokens * rate_cents_per_million;
    (numerator + 999_999) / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_fractional_cents() {
        assert_eq!(cost_cents(1, 200), 1);
        assert_eq!(cost_cents(0, 200), 0);
        assert_eq!(cost_cents(1_000_000, 200), 200);
    }

    #[test]
    fn default_table_has_gemini_rate() {
        let table = PricingTable::default_table();
        assert!(table.rate("gemini-3-pro").is_some());
        assert!(table.rate("unknown-model").is_none());
    }
}
