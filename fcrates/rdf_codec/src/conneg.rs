//! I define content negotiation (RFC 7231 proactive
//! negotiation) over a set of representable media types.
//!

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use mime::Mime;
use tracing::debug;

/// A quality weight, as defined in
/// [RFC7231 §5.3.1](https://datatracker.ietf.org/doc/html/rfc7231#section-5.3.1).
/// Stored in thousandths, in `0..=1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QValue(u16);

impl QValue {
    /// Maximum q-value, `q=1`.
    pub const MAX: QValue = QValue(1000);

    /// Zero q-value, `q=0`. Marks a range as not acceptable.
    pub const ZERO: QValue = QValue(0);
}

impl Default for QValue {
    #[inline]
    fn default() -> Self {
        Self::MAX
    }
}

impl Display for QValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", (self.0 as f32) / 1000.0)
    }
}

/// An error in parsing a q-value.
#[derive(Debug, thiserror::Error)]
#[error("Invalid qvalue.")]
pub struct InvalidQValueError;

impl FromStr for QValue {
    type Err = InvalidQValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // At most three decimal digits are significant.
        let v: f32 = s.trim().parse().map_err(|_| InvalidQValueError)?;
        if !(0.0..=1.0).contains(&v) {
            return Err(InvalidQValueError);
        }
        Ok(Self((v * 1000.0).round() as u16))
    }
}

/// This enum denotes specificity of a given media range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MediaRangeSpecificity {
    /// Specificity of `*/*`.
    StarStar,
    /// Specificity of `<type>/*`.
    TypeStar,
    /// Specificity of `<type>/<subtype>`.
    Exact,
}

impl From<&Mime> for MediaRangeSpecificity {
    #[inline]
    fn from(media_range: &Mime) -> Self {
        if media_range.type_() == mime::STAR {
            Self::StarStar
        } else if media_range.subtype() == mime::STAR {
            Self::TypeStar
        } else {
            Self::Exact
        }
    }
}

/// A single accept-value: a media range with its weight and
/// resolved specificity.
#[derive(Debug, Clone)]
struct AcceptValue {
    media_range: Mime,
    weight: QValue,
    specificity: MediaRangeSpecificity,
}

impl AcceptValue {
    /// Parse a single accept-value. Returns `None` on
    /// malformed input, which negotiation skips over.
    fn parse(value: &str) -> Option<Self> {
        let media_range: Mime = value.trim().parse().ok()?;
        let weight = media_range
            .get_param("q")
            .map(|q| q.as_str().parse().unwrap_or(QValue::ZERO))
            .unwrap_or_default();
        let specificity = MediaRangeSpecificity::from(&media_range);
        Some(Self {
            media_range,
            weight,
            specificity,
        })
    }

    /// Check if this range matches given concrete media type.
    fn matches(&self, media_type: &Mime) -> bool {
        match self.specificity {
            MediaRangeSpecificity::StarStar => true,
            MediaRangeSpecificity::TypeStar => self.media_range.type_() == media_type.type_(),
            MediaRangeSpecificity::Exact => {
                self.media_range.essence_str() == media_type.essence_str()
            }
        }
    }
}

/// An error indicating none of the representable media types
/// is acceptable to the client.
#[derive(Debug, thiserror::Error)]
#[error("No representable media type is acceptable.")]
pub struct NotAcceptableError;

/// A proactive content negotiator over a fixed set of
/// representable media types.
///
/// Selection follows RFC 7231 precedence: for each
/// representable type the most specific matching range assigns
/// the weight; the representable type with the highest weight
/// wins; ties resolve to the earliest entry in the
/// (server-preference-ordered) representable set. A bare or
/// absent `Accept` header behaves as `*/*`, and so resolves to
/// the first representable type.
#[derive(Debug, Clone)]
pub struct Negotiator {
    /// Representable media types, in server preference order.
    available: Vec<Mime>,
}

impl Negotiator {
    /// Create a new negotiator over given representable media
    /// types, in server preference order. The first entry is
    /// the default representation.
    pub fn new(available: Vec<Mime>) -> Self {
        debug_assert!(!available.is_empty());
        Self { available }
    }

    /// Get the default representation's media type.
    #[inline]
    pub fn default_media_type(&self) -> &Mime {
        &self.available[0]
    }

    /// Negotiate a representation for given `Accept` header
    /// value.
    pub fn negotiate(&self, accept: Option<&str>) -> Result<Mime, NotAcceptableError> {
        let accept_values: Vec<AcceptValue> = accept
            .unwrap_or_default()
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .filter_map(AcceptValue::parse)
            .collect();

        // Absent, empty, or wholly malformed headers behave
        // as `*/*`.
        if accept_values.is_empty() {
            return Ok(self.default_media_type().clone());
        }

        let mut chosen: Option<(usize, QValue)> = None;

        for (index, candidate) in self.available.iter().enumerate() {
            // The most specific matching range assigns the
            // candidate's weight.
            let weight = accept_values
                .iter()
                .filter(|av| av.matches(candidate))
                .max_by(|a, b| a.specificity.cmp(&b.specificity))
                .map(|av| av.weight)
                .unwrap_or(QValue::ZERO);

            if weight == QValue::ZERO {
                continue;
            }

            // Strictly-greater keeps the earliest (most
            // preferred) candidate on ties.
            if chosen.map_or(true, |(_, w)| weight.cmp(&w) == Ordering::Greater) {
                chosen = Some((index, weight));
            }
        }

        let (index, weight) = chosen.ok_or(NotAcceptableError)?;
        debug!(
            "Negotiated {} with q={}.",
            self.available[index], weight
        );
        Ok(self.available[index].clone())
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
