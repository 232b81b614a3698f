//! Daily bars from Yahoo's unofficial v8 chart endpoint.
//!
//! Connect errors, timeouts, 429 and 5xx are retried with exponential
//! backoff. The payload format can change without notice; `CsvProvider` is
//! the offline fallback.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

/// Every series is optional so a dropped column surfaces as `MissingColumn`
/// instead of a parse failure.
#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Option<Vec<Option<f64>>>,
    #[serde(default)]
    high: Option<Vec<Option<f64>>>,
    #[serde(default)]
    low: Option<Vec<Option<f64>>>,
    #[serde(default)]
    close: Option<Vec<Option<f64>>>,
    #[serde(default)]
    volume: Option<Vec<Option<u64>>>,
}

/// Backoff schedule for transient Yahoo failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base, 2x base, 4x base...
    fn delay(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

/// Outcome of a single HTTP round trip.
enum Attempt {
    Finished(Result<Vec<RawBar>, DataError>),
    Transient(DataError),
}

/// Daily bars from the Yahoo Finance v8 chart endpoint.
pub struct YahooProvider {
    http: reqwest::blocking::Client,
    retry: RetryPolicy,
}

const CHART_ROOT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Result<Self, DataError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) featurelab/0.1")
            .build()
            .map_err(|e| DataError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, retry })
    }

    /// `period1`/`period2` are UTC midnights, so `end` is excluded.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let epoch = |d: NaiveDate| d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{CHART_ROOT}/{symbol}?period1={}&period2={}&interval=1d",
            epoch(start),
            epoch(end)
        )
    }

    fn chart_failure(symbol: &str, error: Option<ChartError>) -> DataError {
        match error {
            Some(e) if e.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(e) => DataError::ResponseFormatChanged(format!("{}: {}", e.code, e.description)),
            None => DataError::ResponseFormatChanged("chart has neither result nor error".into()),
        }
    }

    /// Turn a chart payload into bars inside `[start, end)`.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let no_data = || DataError::NoData {
            symbol: symbol.to_string(),
            start,
            end,
        };
        let missing = |column: &str| DataError::MissingColumn {
            symbol: symbol.to_string(),
            column: column.to_string(),
        };

        let ChartResult { result, error } = resp.chart;
        let Some(data) = result.and_then(|r| r.into_iter().next()) else {
            return Err(Self::chart_failure(symbol, error));
        };
        let timestamps = data.timestamp.ok_or_else(no_data)?;
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("quote block missing".into()))?;

        let close = quote.close.ok_or_else(|| missing("close"))?;
        let volume = quote.volume.ok_or_else(|| missing("volume"))?;
        let low = quote.low.ok_or_else(|| missing("low"))?;
        let high = quote.high.ok_or_else(|| missing("high"))?;
        let open = quote.open.unwrap_or_default();

        let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();
        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, ts) in timestamps.into_iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad epoch {ts}")))?
                .date_naive();
            if !(start..end).contains(&date) {
                continue;
            }

            let row = [at(&open, i), at(&high, i), at(&low, i), at(&close, i)];
            let vol = volume.get(i).copied().flatten();
            // Non-trading day.
            if row.iter().all(Option::is_none) && vol.is_none() {
                continue;
            }

            let [o, h, l, c] = row.map(|v| v.unwrap_or(f64::NAN));
            bars.push(RawBar {
                date,
                open: o,
                high: h,
                low: l,
                close: c,
                volume: vol,
            });
        }

        if bars.is_empty() {
            return Err(no_data());
        }
        Ok(bars)
    }

    fn attempt(&self, url: &str, symbol: &str, start: NaiveDate, end: NaiveDate) -> Attempt {
        let resp = match self.http.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Attempt::Transient(DataError::NetworkUnreachable(e.to_string()))
            }
            Err(e) => return Attempt::Finished(Err(DataError::NetworkUnreachable(e.to_string()))),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(60);
            warn!(symbol, retry_after_secs, "Yahoo rate limit hit");
            return Attempt::Transient(DataError::RateLimited { retry_after_secs });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Attempt::Finished(Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }));
        }
        if status.is_server_error() {
            return Attempt::Transient(DataError::Other(format!("{symbol}: HTTP {status}")));
        }
        if !status.is_success() {
            return Attempt::Finished(Err(DataError::Other(format!("{symbol}: HTTP {status}"))));
        }

        let parsed = resp
            .json::<ChartResponse>()
            .map_err(|e| {
                DataError::ResponseFormatChanged(format!("{symbol}: undecodable chart: {e}"))
            })
            .and_then(|chart| Self::parse_response(symbol, chart, start, end));
        Attempt::Finished(parsed)
    }

    fn download(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let mut retry = 0;
        loop {
            match self.attempt(&url, symbol, start, end) {
                Attempt::Finished(result) => return result,
                Attempt::Transient(err) if retry >= self.retry.max_retries => return Err(err),
                Attempt::Transient(err) => {
                    retry += 1;
                    let delay = self.retry.delay(retry);
                    debug!(symbol, retry, ?delay, error = %err, "transient failure, backing off");
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        info!(symbol, %start, %end, "downloading daily bars");
        let bars = self.download(symbol, start, end)?;
        info!(symbol, rows = bars.len(), "download finished");
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }
}
