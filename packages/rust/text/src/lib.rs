//! Tokenization and stemming for free-text matching.
//!
//! Every token goes through a naive plural normalizer (`boxes` → `box`,
//! `chairs` → `chair`). A [`TokenStemmer`] may be layered on top; when none is
//! configured or the enhanced stemmer is not compiled in, the naive
//! normalizer is used alone.

use std::sync::Arc;

use tracing::debug;

use repath_shared::StemmerKind;

// ---------------------------------------------------------------------------
// Stemmer strategy
// ---------------------------------------------------------------------------

/// A linguistic stemmer applied after plural normalization.
pub trait TokenStemmer: Send + Sync {
    /// Reduce a lowercase token to its stem.
    fn stem(&self, token: &str) -> String;

    /// Human-readable stemmer name for tracing.
    fn name(&self) -> &str;
}

/// English Snowball stemmer backed by `rust-stemmers`.
#[cfg(feature = "snowball")]
pub struct SnowballStemmer {
    inner: rust_stemmers::Stemmer,
}

#[cfg(feature = "snowball")]
impl SnowballStemmer {
    pub fn english() -> Self {
        Self {
            inner: rust_stemmers::Stemmer::create(rust_stemmers::Algorithm::English),
        }
    }
}

#[cfg(feature = "snowball")]
impl TokenStemmer for SnowballStemmer {
    fn stem(&self, token: &str) -> String {
        self.inner.stem(token).into_owned()
    }

    fn name(&self) -> &str {
        "snowball-english"
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Splits free text into normalized tokens.
///
/// Cloning is cheap; the stemmer is shared.
#[derive(Clone, Default)]
pub struct Tokenizer {
    stemmer: Option<Arc<dyn TokenStemmer>>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("stemmer", &self.stemmer_name())
            .finish()
    }
}

impl Tokenizer {
    /// Tokenizer using the naive plural normalizer only.
    pub fn naive() -> Self {
        Self { stemmer: None }
    }

    /// Tokenizer layering `stemmer` over the naive normalizer.
    pub fn with_stemmer(stemmer: Arc<dyn TokenStemmer>) -> Self {
        Self {
            stemmer: Some(stemmer),
        }
    }

    /// Build the tokenizer selected by configuration.
    ///
    /// Asking for a stemmer that is not compiled in falls back to the naive
    /// normalizer.
    pub fn from_kind(kind: StemmerKind) -> Self {
        match kind {
            StemmerKind::None => Self::naive(),
            StemmerKind::Snowball => snowball_or_naive(),
        }
    }

    /// Name of the active stemmer, `naive` when none is layered on.
    pub fn stemmer_name(&self) -> &str {
        self.stemmer.as_deref().map_or("naive", |s| s.name())
    }

    /// Lowercase `text`, split it on runs of non-alphanumerics, and normalize
    /// each token. Empty tokens are dropped.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
            .filter_map(|raw| self.interpret(raw))
            .collect()
    }

    /// Tokenize several texts into one flat token list.
    pub fn tokenize_all<'a, I>(&self, texts: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts.into_iter().flat_map(|t| self.tokenize(t)).collect()
    }

    fn interpret(&self, raw: &str) -> Option<String> {
        let normalized = strip_plural(raw);
        if normalized.is_empty() {
            return None;
        }
        match &self.stemmer {
            Some(stemmer) if normalized.bytes().any(|b| b.is_ascii_lowercase()) => {
                let stemmed = stemmer.stem(normalized);
                (!stemmed.is_empty()).then_some(stemmed)
            }
            _ => Some(normalized.to_string()),
        }
    }
}

#[cfg(feature = "snowball")]
fn snowball_or_naive() -> Tokenizer {
    Tokenizer::with_stemmer(Arc::new(SnowballStemmer::english()))
}

#[cfg(not(feature = "snowball"))]
fn snowball_or_naive() -> Tokenizer {
    debug!("snowball stemmer not compiled in, using naive normalizer");
    Tokenizer::naive()
}

/// Strip a trailing `es` or `s` from tokens longer than three characters.
pub fn strip_plural(token: &str) -> &str {
    if token.len() > 3 {
        if let Some(stripped) = token.strip_suffix("es") {
            return stripped;
        }
        if let Some(stripped) = token.strip_suffix('s') {
            return stripped;
        }
    }
    token
}

/// Lowercase `text` and drop everything outside `[a-z0-9]`.
///
/// `"Fort Collins"` becomes `"fortcollins"`.
pub fn to_city_slug(text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if slug.is_empty() && !text.trim().is_empty() {
        debug!(text, "city slug is empty after normalization");
    }
    slug
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
