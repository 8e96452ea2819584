use std::collections::BTreeMap;
use tracing::info;

/// Sink for scalar diagnostics recorded once per epoch.
pub trait Tabular {
    fn record(&mut self, key: &str, value: f64);
}

/// Prepends `prefix` to every key recorded through it.
pub struct Prefixed<'a, T: Tabular + ?Sized> {
    inner: &'a mut T,
    prefix: &'a str,
}

impl<'a, T: Tabular + ?Sized> Prefixed<'a, T> {
    pub fn new(inner: &'a mut T, prefix: &'a str) -> Self {
        Self { inner, prefix }
    }
}

impl<T: Tabular + ?Sized> Tabular for Prefixed<'_, T> {
    fn record(&mut self, key: &str, value: f64) {
        self.inner.record(&format!("{}{key}", self.prefix), value);
    }
}

/// In memory recorder holding the current epoch's row.
#[derive(Debug, Default, Clone)]
pub struct TabularLog {
    row: BTreeMap<String, f64>,
}

impl TabularLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.row.get(key).copied()
    }

    pub fn row(&self) -> &BTreeMap<String, f64> {
        &self.row
    }

    /// Logs the current row and starts a new one.
    pub fn dump(&mut self) -> BTreeMap<String, f64> {
        for (key, value) in self.row.iter() {
            info!(key = key.as_str(), value, "tabular");
        }
        std::mem::take(&mut self.row)
    }
}

impl Tabular for TabularLog {
    fn record(&mut self, key: &str, value: f64) {
        self.row.insert(key.to_string(), value);
    }
}
