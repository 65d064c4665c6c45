//! Source attribution and severity flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Calibrated severity of an extracted term.
///
/// Ordered by severity so that `max()` over a set of flags yields the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flag {
    Green,
    Amber,
    Red,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Amber => "AMBER",
            Self::Red => "RED",
        }
    }

    /// Lenient parse of a service-supplied flag.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "GREEN" => Some(Self::Green),
            "AMBER" | "YELLOW" => Some(Self::Amber),
            "RED" => Some(Self::Red),
            _ => None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractional page coordinates (0.0..=1.0) of a quoted region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Clamp into the unit square; rejects degenerate boxes.
    pub fn normalized(self) -> Option<Self> {
        let clamp = |v: f64| v.clamp(0.0, 1.0);
        if !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()) {
            return None;
        }
        let bbox = Self {
            x: clamp(self.x),
            y: clamp(self.y),
            width: clamp(self.width),
            height: clamp(self.height),
        };
        (bbox.width > 0.0 && bbox.height > 0.0).then_some(bbox)
    }
}

/// Where in a document an extracted value was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Verbatim quoted text.
    pub quote: String,
    /// 1-based page number, when known.
    pub page: Option<u32>,
    /// Section or clause reference, e.g. "4.2(b)".
    pub section: Option<String>,
    pub bbox: Option<BoundingBox>,
    /// Reference to a rendered snippet produced by the snippet renderer.
    pub snippet_ref: Option<String>,
    /// Filename the quote came from, when the value aggregates several documents.
    pub document: Option<String>,
}

impl SourceLocation {
    pub fn quote(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            page: None,
            section: None,
            bbox: None,
            snippet_ref: None,
            document: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// A textual value backed by a source quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedText {
    pub value: String,
    pub source: SourceLocation,
}

/// A numeric value backed by a source quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedNumber {
    pub value: f64,
    pub currency: Option<String>,
    pub source: SourceLocation,
}
