//! Indicator registry: catalog names resolved to indicator instances.
//!
//! Names are resolved once, at construction. A name the factory does not
//! recognize stays in the registry as an unknown entry so the engine can
//! still emit an (all-NaN) column for it. Order is preserved; the engine
//! evaluates entries in registry order.

use super::{
    Adx, Bollinger, Cci, Ema, Indicator, Macd, RollingExtreme, Rsi, Sma, Stochastic, WilliamsR,
};

/// Indicators computed when no catalog is configured.
pub const DEFAULT_CATALOG: [&str; 13] = [
    "low_14",
    "high_14",
    "macd",
    "rsi_14",
    "boll",
    "close_30_sma",
    "close_60_sma",
    "cci_20",
    "stoch_k",
    "stoch_d",
    "adx",
    "wr_14",
    "ema_20",
];

struct Entry {
    name: String,
    indicator: Option<Box<dyn Indicator>>,
}

/// Ordered collection of catalog entries.
pub struct IndicatorRegistry {
    entries: Vec<Entry>,
}

impl IndicatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Resolve every name through [`resolve`]. Duplicates are kept once.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut registry = Self::new();
        for name in names {
            registry.push_name(name.as_ref());
        }
        registry
    }

    /// Append a catalog name, resolving it through the built-in factory.
    pub fn push_name(&mut self, name: &str) {
        if self.contains(name) {
            return;
        }
        self.entries.push(Entry {
            name: name.to_string(),
            indicator: resolve(name),
        });
    }

    /// Register an indicator under its own name, replacing an existing entry
    /// in place or appending a new one.
    pub fn register(&mut self, indicator: Box<dyn Indicator>) {
        let name = indicator.name().to_string();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.indicator = Some(indicator),
            None => self.entries.push(Entry {
                name,
                indicator: Some(indicator),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Names the factory could not resolve.
    pub fn unknown_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.indicator.is_none())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Entries in evaluation order; `None` marks an unknown name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&dyn Indicator>)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.indicator.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IndicatorRegistry {
    fn default() -> Self {
        Self::from_names(&DEFAULT_CATALOG)
    }
}

impl std::fmt::Debug for IndicatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorRegistry")
            .field("names", &self.names())
            .field("unknown", &self.unknown_names())
            .finish()
    }
}

/// Build the indicator for a catalog name.
///
/// Fixed names: `macd`, `boll`, `stoch_k`, `stoch_d`, `adx`. Parameterized
/// names: `low_{n}`, `high_{n}`, `rsi_{n}`, `ema_{n}`, `cci_{n}`, `wr_{n}`,
/// `close_{n}_sma`, with n >= 1.
pub fn resolve(name: &str) -> Option<Box<dyn Indicator>> {
    match name {
        "macd" => return Some(Box::new(Macd::standard())),
        "boll" => return Some(Box::new(Bollinger::standard())),
        "stoch_k" => return Some(Box::new(Stochastic::k())),
        "stoch_d" => return Some(Box::new(Stochastic::d())),
        "adx" => return Some(Box::new(Adx::default())),
        _ => {}
    }

    if let Some(n) = name
        .strip_prefix("close_")
        .and_then(|rest| rest.strip_suffix("_sma"))
        .and_then(parse_period)
    {
        return Some(Box::new(Sma::new(n)));
    }

    let (prefix, n) = name.rsplit_once('_')?;
    let n = parse_period(n)?;
    let indicator: Box<dyn Indicator> = match prefix {
        "low" => Box::new(RollingExtreme::lowest_low(n)),
        "high" => Box::new(RollingExtreme::highest_high(n)),
        "rsi" => Box::new(Rsi::new(n)),
        "ema" => Box::new(Ema::new(n)),
        "cci" => Box::new(Cci::new(n)),
        "wr" => Box::new(WilliamsR::new(n)),
        _ => return None,
    };
    Some(indicator)
}

fn parse_period(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().filter(|&n| n >= 1)
}
