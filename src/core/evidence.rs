pub const DEFAULT_SOLD_OUT_PHRASES: &[&str] = &[
    "uitverkocht",
    "tijdelijk niet leverbaar",
    "niet op voorraad",
    "niet beschikbaar",
    "sold out",
    "out of stock",
    "unavailable",
    "currently unavailable",
];

pub const DEFAULT_IN_STOCK_PHRASES: &[&str] = &[
    "op voorraad",
    "morgen in huis",
    "direct leverbaar",
    "in stock",
    "available now",
    "add to cart",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceVerdict {
    SoldOut { phrase: String },
    Available { phrase: String },
    Inconclusive,
}

impl EvidenceVerdict {
    /// Inconclusive evidence resolves to `false`.
    pub fn in_stock(&self) -> bool {
        matches!(self, EvidenceVerdict::Available { .. })
    }
}

/// Classifies page text by phrase matching: sold-out phrases win over in-stock ones.
#[derive(Debug, Clone)]
pub struct EvidenceClassifier {
    sold_out: Vec<String>,
    in_stock: Vec<String>,
}

impl EvidenceClassifier {
    pub fn new<S: AsRef<str>>(sold_out: &[S], in_stock: &[S]) -> Self {
        let normalize = |phrases: &[S]| {
            phrases
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        };

        Self {
            sold_out: normalize(sold_out),
            in_stock: normalize(in_stock),
        }
    }

    pub fn classify(&self, body_text: &str) -> EvidenceVerdict {
        let body = body_text.to_lowercase();

        if let Some(phrase) = self.sold_out.iter().find(|p| body.contains(p.as_str())) {
            return EvidenceVerdict::SoldOut {
                phrase: phrase.clone(),
            };
        }

        if let Some(phrase) = self.in_stock.iter().find(|p| body.contains(p.as_str())) {
            return EvidenceVerdict::Available {
                phrase: phrase.clone(),
            };
        }

        EvidenceVerdict::Inconclusive
    }
}

impl Default for EvidenceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SOLD_OUT_PHRASES, DEFAULT_IN_STOCK_PHRASES)
    }
}
