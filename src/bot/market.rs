//! Price lookups scraped from the market-overview page.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use scraper::Html;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::bot::extract::{CardExtractor, MarketCard, OverviewExtractor};

/// The page serves a stripped-down document to clients it does not recognize.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:87.0) Gecko/20100101 Firefox/87.0";

#[derive(Debug)]
pub enum PriceError {
    /// Transport failure, including timeouts.
    Http(String),
    /// Upstream answered with a non-success status.
    Status(u16),
    /// The page no longer has the shape the extractor expects.
    Layout(String),
    /// The page was read but no card carries this symbol.
    NotFound(String),
}

impl PriceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PriceError::NotFound(_))
    }
}

impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceError::Http(e) => write!(f, "HTTP error: {e}"),
            PriceError::Status(code) => write!(f, "upstream returned status {code}"),
            PriceError::Layout(e) => write!(f, "unexpected page layout: {e}"),
            PriceError::NotFound(symbol) => write!(f, "no market card for symbol '{symbol}'"),
        }
    }
}

impl std::error::Error for PriceError {}

/// Point-in-time price of one asset. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub display_price: String,
    pub daily_change: String,
}

impl From<MarketCard> for PriceSnapshot {
    fn from(card: MarketCard) -> Self {
        Self { display_price: card.price, daily_change: card.change }
    }
}

impl fmt::Display for PriceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price: {}\nDaily change: {}", self.display_price, self.daily_change)
    }
}

/// Anything that can quote a price for a currency symbol.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn price(&self, symbol: &str) -> Result<PriceSnapshot, PriceError>;
}

/// Fetches the market page and picks the requested card.
///
/// The HTTP client is created on the first lookup and reused until
/// [`MarketPrices::close`].
pub struct MarketPrices {
    url: String,
    timeout: Duration,
    extractor: Box<dyn CardExtractor>,
    client: Mutex<Option<reqwest::Client>>,
}

impl MarketPrices {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_extractor(url, timeout, Box::new(OverviewExtractor::new()))
    }

    pub fn with_extractor(
        url: impl Into<String>,
        timeout: Duration,
        extractor: Box<dyn CardExtractor>,
    ) -> Self {
        Self {
            url: url.into(),
            timeout,
            extractor,
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<reqwest::Client, PriceError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,ru;q=0.9,en;q=0.8"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| PriceError::Http(format!("failed to build client: {e}")))?;
        info!("HTTP client ready for {}", self.url);
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Look up the current price of `symbol` (case-insensitive).
    pub async fn get_price(&self, symbol: &str) -> Result<PriceSnapshot, PriceError> {
        let client = self.client().await?;
        debug!("Fetching {} for {}", self.url, symbol);

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PriceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PriceError::Http(format!("failed to read response: {e}")))?;
        debug!("Market page: {} bytes", body.len());

        self.snapshot_from_page(&body, symbol)
    }

    /// Parse a fetched page and return the snapshot for `symbol`.
    pub fn snapshot_from_page(&self, body: &str, symbol: &str) -> Result<PriceSnapshot, PriceError> {
        let document = Html::parse_document(body);
        let cards = self.extractor.extract(&document)?;
        let card = find_card(cards, symbol)?;
        debug!("Matched {} ({})", card.symbol, card.name);
        Ok(card.into())
    }

    /// Drop the HTTP client. A later lookup builds a fresh one.
    pub async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            info!("HTTP client closed");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }
}

#[async_trait]
impl PriceSource for MarketPrices {
    async fn price(&self, symbol: &str) -> Result<PriceSnapshot, PriceError> {
        self.get_price(symbol).await
    }
}

/// First card whose ticker equals `symbol`, ignoring ASCII case.
pub fn find_card(cards: Vec<MarketCard>, symbol: &str) -> Result<MarketCard, PriceError> {
    let wanted = symbol.trim();
    cards
        .into_iter()
        .find(|card| card.symbol.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| PriceError::NotFound(wanted.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::extract::fixtures::{card, page};

    fn prices() -> MarketPrices {
        MarketPrices::new("http://127.0.0.1:9/markets", Duration::from_secs(1))
    }

    #[test]
    fn test_snapshot_matches_symbol_case_insensitively() {
        let html = page(&[
            card("ETH", "Ethereum", "3100", "+0.4%"),
            card("BTC", "Bitcoin", "63000", "-1.2%"),
        ]);

        let snapshot = prices().snapshot_from_page(&html, "btc").unwrap();
        let rendered = snapshot.to_string();
        assert!(rendered.contains("63000"));
        assert!(rendered.contains("-1.2%"));
        assert_eq!(rendered.lines().count(), 2);
    }

    #[test]
    fn test_unknown_symbol_is_not_found() {
        let html = page(&[card("BTC", "Bitcoin", "63000", "-1.2%")]);

        let err = prices().snapshot_from_page(&html, "xrp").unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.to_string().contains("None"));
    }

    #[test]
    fn test_first_match_wins() {
        let cards = vec![
            MarketCard {
                symbol: "USDT".into(),
                name: "Tether".into(),
                price: "1.00".into(),
                change: "0%".into(),
            },
            MarketCard {
                symbol: "usdt".into(),
                name: "Tether (dup)".into(),
                price: "1.01".into(),
                change: "0.1%".into(),
            },
        ];
        let card = find_card(cards, "Usdt").unwrap();
        assert_eq!(card.name, "Tether");
    }

    #[test]
    fn test_unexpected_page_is_layout_error() {
        let err = prices()
            .snapshot_from_page("<html><body>Access denied</body></html>", "btc")
            .unwrap_err();
        assert!(matches!(err, PriceError::Layout(_)));
    }

    struct FixedExtractor(Vec<MarketCard>);

    impl CardExtractor for FixedExtractor {
        fn extract(&self, _document: &Html) -> Result<Vec<MarketCard>, PriceError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_custom_extractor_is_used() {
        let extractor = FixedExtractor(vec![MarketCard {
            symbol: "SOL".into(),
            name: "Solana".into(),
            price: "150".into(),
            change: "+3%".into(),
        }]);
        let prices = MarketPrices::with_extractor("http://unused", Duration::from_secs(1), Box::new(extractor));

        let snapshot = prices.snapshot_from_page("", "sol").unwrap();
        assert_eq!(snapshot, PriceSnapshot { display_price: "150".into(), daily_change: "+3%".into() });
    }

    #[tokio::test]
    async fn test_client_is_lazy_and_closable() {
        let prices = prices();
        assert!(!prices.is_open().await);

        prices.client().await.unwrap();
        assert!(prices.is_open().await);

        prices.close().await;
        assert!(!prices.is_open().await);
        prices.close().await;
    }

    #[tokio::test]
    async fn test_connection_failure_is_http_error() {
        // Port 9 (discard) is not listening on loopback in test environments.
        let err = prices().get_price("btc").await.unwrap_err();
        assert!(matches!(err, PriceError::Http(_)));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever writing a response.
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let prices = MarketPrices::new(format!("http://{addr}/markets"), Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = prices.get_price("btc").await.unwrap_err();

        assert!(matches!(err, PriceError::Http(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
        server.abort();
    }
}
