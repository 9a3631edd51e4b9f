use deal_core::Currency;
use std::collections::HashMap;

/// Fixed-rate conversion into the pipeline's working currency.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    working: Currency,
    /// Units of the working currency per one unit of the keyed currency.
    rates: HashMap<Currency, f64>,
}

impl Default for CurrencyConverter {
    /// Rupees, with the dollar at 83.
    fn default() -> Self {
        Self::new(Currency::Inr).with_rate(Currency::Usd, 83.0)
    }
}

impl CurrencyConverter {
    pub fn new(working: Currency) -> Self {
        Self {
            working,
            rates: HashMap::new(),
        }
    }

    /// Register a rate. Non-positive or non-finite rates are ignored.
    pub fn with_rate(mut self, currency: Currency, rate: f64) -> Self {
        if rate.is_finite() && rate > 0.0 {
            self.rates.insert(currency, rate);
        } else {
            tracing::warn!("Ignoring invalid {} rate {}", currency, rate);
        }
        self
    }

    pub fn working(&self) -> Currency {
        self.working
    }

    pub fn rate(&self, currency: Currency) -> Option<f64> {
        if currency == self.working {
            Some(1.0)
        } else {
            self.rates.get(&currency).copied()
        }
    }

    /// `None` when no rate is known for `from`.
    pub fn convert(&self, amount: f64, from: Currency) -> Option<f64> {
        self.rate(from).map(|rate| amount * rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_converts_usd_to_inr() {
        let converter = CurrencyConverter::default();
        assert_eq!(converter.working(), Currency::Inr);
        assert_eq!(converter.convert(2.0, Currency::Usd), Some(166.0));
        assert_eq!(converter.convert(500.0, Currency::Inr), Some(500.0));
        assert_eq!(converter.convert(1.0, Currency::Eur), None);
    }

    #[test]
    fn test_invalid_rates_are_ignored() {
        let converter = CurrencyConverter::new(Currency::Inr)
            .with_rate(Currency::Eur, 0.0)
            .with_rate(Currency::Gbp, f64::NAN);
        assert_eq!(converter.rate(Currency::Eur), None);
        assert_eq!(converter.rate(Currency::Gbp), None);
    }
}
