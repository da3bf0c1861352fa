//! Card extraction from the market-overview page.
//!
//! The page has no stable semantic markup, so the default extractor walks
//! the DOM by position: a fixed-height list container holds one `div` per
//! asset, and inside each card the n-th nested `div` carries the field we
//! want. Any layout change upstream breaks this; keeping it behind
//! [`CardExtractor`] lets tests and future layouts swap the traversal.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::bot::market::PriceError;

/// One row of the market list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCard {
    /// Short ticker as shown on the page, e.g. `BTC`.
    pub symbol: String,
    /// Long display name, e.g. `Bitcoin`.
    pub name: String,
    pub price: String,
    /// Daily percentage change, e.g. `-1.2%`.
    pub change: String,
}

pub trait CardExtractor: Send + Sync {
    /// Pull every recognizable card out of a parsed page.
    fn extract(&self, document: &Html) -> Result<Vec<MarketCard>, PriceError>;
}

/// Structural extractor for the Binance markets overview layout.
pub struct OverviewExtractor {
    container: Selector,
    card: Selector,
    link: Selector,
    div: Selector,
    ltr: Selector,
}

impl OverviewExtractor {
    pub fn new() -> Self {
        Self {
            container: selector(r#"div[style="min-height:800px"]"#),
            card: selector("div.css-vlibs4"),
            link: selector("a"),
            div: selector("div"),
            ltr: selector(r#"div[style="direction:ltr"]"#),
        }
    }

    fn parse_card(&self, element: ElementRef<'_>) -> Option<MarketCard> {
        let link = element.select(&self.link).next()?;
        // Divs under the link in document order: [2] is the ticker, the first
        // div inside [3] is the long name.
        let divs: Vec<ElementRef<'_>> = link.select(&self.div).collect();
        let symbol = divs.get(2)?;
        let name = divs.get(3)?.select(&self.div).next()?;

        let mut ltr = element.select(&self.ltr);
        let price = ltr.next()?;
        let change = ltr.next()?;

        Some(MarketCard {
            symbol: text_of(*symbol),
            name: text_of(name),
            price: text_of(price),
            change: text_of(change),
        })
    }
}

impl Default for OverviewExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CardExtractor for OverviewExtractor {
    fn extract(&self, document: &Html) -> Result<Vec<MarketCard>, PriceError> {
        let container = document
            .select(&self.container)
            .next()
            .ok_or_else(|| PriceError::Layout("market list container not found".into()))?;

        let mut cards = Vec::new();
        for (index, element) in container.select(&self.card).enumerate() {
            match self.parse_card(element) {
                Some(card) => cards.push(card),
                None => debug!("Skipping card {} with unexpected layout", index),
            }
        }

        if cards.is_empty() {
            return Err(PriceError::Layout("no market cards found".into()));
        }
        debug!("Extracted {} market cards", cards.len());
        Ok(cards)
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{card, page};
    use super::*;

    fn extract(html: &str) -> Result<Vec<MarketCard>, PriceError> {
        OverviewExtractor::new().extract(&Html::parse_document(html))
    }

    #[test]
    fn test_extracts_all_fields() {
        let html = page(&[
            card("BTC", "Bitcoin", "63000", "-1.2%"),
            card("ETH", "Ethereum", "3 100,55", "+0.4%"),
        ]);

        let cards = extract(&html).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(
            cards[0],
            MarketCard {
                symbol: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                price: "63000".to_string(),
                change: "-1.2%".to_string(),
            }
        );
        assert_eq!(cards[1].symbol, "ETH");
        assert_eq!(cards[1].price, "3 100,55");
    }

    #[test]
    fn test_skips_malformed_cards() {
        let broken = r#"<div class="css-vlibs4"><a><div>only one</div></a></div>"#.to_string();
        let html = page(&[broken, card("SOL", "Solana", "150", "+3.0%")]);

        let cards = extract(&html).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].symbol, "SOL");
    }

    #[test]
    fn test_missing_container_is_layout_error() {
        let html = r#"<html><body><div class="css-vlibs4"></div></body></html>"#;
        assert!(matches!(extract(html), Err(PriceError::Layout(_))));
    }

    #[test]
    fn test_empty_container_is_layout_error() {
        let html = page(&[]);
        assert!(matches!(extract(&html), Err(PriceError::Layout(_))));
    }

    #[test]
    fn test_cards_outside_container_are_ignored() {
        let html = format!(
            "{}{}",
            card("DOGE", "Dogecoin", "0.1", "+9%"),
            page(&[card("ADA", "Cardano", "0.4", "-2%")])
        );

        let symbols: Vec<String> = extract(&html).unwrap().into_iter().map(|c| c.symbol).collect();
        assert_eq!(symbols, vec!["ADA"]);
    }
}
