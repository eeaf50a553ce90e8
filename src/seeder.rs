// src/seeder.rs
// Predefined symbol universes and per-symbol base prices for seeding
// subscriptions at startup.
use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::types::SecurityId;

pub struct EquityInfo {
    pub symbol: &'static str,
    pub name: &'static str,
    pub base_price: f64,
}

static EQUITY_INFO: Lazy<HashMap<&'static str, EquityInfo>> = Lazy::new(|| {
    let rows = [
        ("AAPL", "Apple Inc.", 175.0),
        ("MSFT", "Microsoft Corporation", 350.0),
        ("GOOGL", "Alphabet Inc.", 2800.0),
        ("AMZN", "Amazon.com Inc.", 3200.0),
        ("TSLA", "Tesla Inc.", 250.0),
        ("META", "Meta Platforms Inc.", 320.0),
        ("NVDA", "NVIDIA Corporation", 450.0),
        ("JPM", "JPMorgan Chase & Co.", 145.0),
        ("JNJ", "Johnson & Johnson", 165.0),
        ("V", "Visa Inc.", 240.0),
        ("PG", "Procter & Gamble Co.", 140.0),
        ("UNH", "UnitedHealth Group Inc.", 520.0),
        ("HD", "Home Depot Inc.", 330.0),
        ("MA", "Mastercard Inc.", 380.0),
        ("BAC", "Bank of America Corp.", 32.0),
        ("XOM", "Exxon Mobil Corporation", 110.0),
        ("DIS", "Walt Disney Co.", 95.0),
        ("ADBE", "Adobe Inc.", 480.0),
        ("CRM", "Salesforce Inc.", 220.0),
        ("NFLX", "Netflix Inc.", 450.0),
    ];
    rows.into_iter()
        .map(|(symbol, name, base_price)| {
            (symbol, EquityInfo { symbol, name, base_price })
        })
        .collect()
});

/// Base price for a symbol, or `default_price` for unknown symbols.
pub fn base_price(symbol: &str, default_price: f64) -> f64 {
    EQUITY_INFO
        .get(symbol)
        .map(|info| info.base_price)
        .unwrap_or(default_price)
}

pub fn equity_info(symbol: &str) -> Option<&'static EquityInfo> {
    EQUITY_INFO.get(symbol)
}

pub fn major_us_equities() -> Vec<SecurityId> {
    EQUITY_INFO.keys().map(|s| SecurityId::new(s)).collect()
}

pub fn major_fx_pairs() -> Vec<SecurityId> {
    [
        "EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "USDCAD", "NZDUSD",
        "EURGBP", "EURJPY", "GBPJPY", "CHFJPY", "EURCHF", "AUDCAD", "CADJPY",
        "NZDJPY",
    ]
    .iter()
    .map(|s| SecurityId::new(s))
    .collect()
}

pub fn major_crypto_pairs() -> Vec<SecurityId> {
    [
        "BTCUSD", "ETHUSD", "ADAUSD", "BNBUSD", "XRPUSD", "SOLUSD", "DOTUSD",
        "AVAXUSD", "MATICUSD", "LINKUSD", "LTCUSD", "BCHUSD", "XLMUSD",
        "VETUSD", "FILUSD",
    ]
    .iter()
    .map(|s| SecurityId::new(s))
    .collect()
}

/// First ten equities, a convenient subset for tests and demos.
pub fn test_securities() -> Vec<SecurityId> {
    let mut equities = major_us_equities();
    equities.truncate(10);
    equities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_have_preset_prices() {
        assert_eq!(base_price("AAPL", 150.0), 175.0);
        assert_eq!(base_price("GOOGL", 150.0), 2800.0);
        assert_eq!(base_price("BAC", 150.0), 32.0);
        assert_eq!(equity_info("NVDA").unwrap().name, "NVIDIA Corporation");
    }

    #[test]
    fn unknown_symbols_use_default() {
        assert_eq!(base_price("ZZZZ", 150.0), 150.0);
        assert_eq!(base_price("", 42.5), 42.5);
    }

    #[test]
    fn preset_universes() {
        assert_eq!(major_us_equities().len(), 20);
        assert_eq!(major_fx_pairs().len(), 15);
        assert_eq!(major_crypto_pairs().len(), 15);
        assert_eq!(test_securities().len(), 10);
        assert!(major_fx_pairs().contains(&SecurityId::new("EURUSD")));
    }
}
