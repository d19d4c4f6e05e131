//! I define listing options for membership queries:
//! pagination, filters, and sort specs.
//!

use chrono::{DateTime, Utc};
use kosha_space::resource::MemberKind;
use serde::{Deserialize, Serialize};

/// Bounds on pagination limits.
pub const MIN_LIMIT: u32 = 1;
/// Maximum page size.
pub const MAX_LIMIT: u32 = 1000;
/// Default page size.
pub const DEFAULT_LIMIT: u32 = 50;

/// A pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page size, clamped to `[1, 1000]`.
    pub limit: u32,

    /// Offset into the sorted member list.
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Create a pagination window, clamping the limit into
    /// its valid range.
    pub fn new(limit: u32, offset: u64) -> Self {
        Self {
            limit: limit.clamp(MIN_LIMIT, MAX_LIMIT),
            offset,
        }
    }
}

/// A filter over container members. All present clauses are
/// conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberFilter {
    /// Restrict to members of this kind.
    pub member_kind: Option<MemberKind>,

    /// Restrict to members whose content type starts with
    /// this prefix.
    pub content_type_prefix: Option<String>,

    /// Restrict to members whose name matches this glob
    /// (`*` and `?` wildcards).
    pub name_pattern: Option<String>,

    /// Restrict to members joined at or after this instant.
    pub created_after: Option<DateTime<Utc>>,

    /// Restrict to members joined at or before this instant.
    pub created_before: Option<DateTime<Utc>>,

    /// Restrict to members at least this large.
    pub min_size: Option<u64>,

    /// Restrict to members at most this large.
    pub max_size: Option<u64>,
}

impl MemberFilter {
    /// Whether the filter has no clauses at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A sortable member field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Sort by member name.
    Name,
    /// Sort by joining instant.
    CreatedAt,
    /// Sort by last index update instant.
    UpdatedAt,
    /// Sort by member size.
    Size,
    /// Sort by member kind.
    Kind,
}

impl SortField {
    /// Backing column of this field.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "joined_at",
            Self::UpdatedAt => "updated_at",
            Self::Size => "size_bytes",
            Self::Kind => "member_type",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = UnknownSortFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            "size" => Ok(Self::Size),
            "type" => Ok(Self::Kind),
            other => Err(UnknownSortFieldError(other.to_owned())),
        }
    }
}

/// An error for unknown sort fields.
#[derive(Debug, thiserror::Error)]
#[error("Unknown sort field: {0}")]
pub struct UnknownSortFieldError(pub String);

/// A sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = UnknownSortDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(UnknownSortDirectionError(other.to_owned())),
        }
    }
}

/// An error for unknown sort directions.
#[derive(Debug, thiserror::Error)]
#[error("Unknown sort direction: {0}")]
pub struct UnknownSortDirectionError(pub String);

/// A sort spec. Ties always break by member id, ascending, so
/// any sort yields a total order and pagination never skips or
/// duplicates members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field to sort by.
    pub field: SortField,

    /// Direction.
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Name,
            direction: SortDirection::Asc,
        }
    }
}

/// Options of one listing call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingOptions {
    /// Pagination window.
    pub pagination: Pagination,

    /// Member filter.
    pub filter: MemberFilter,

    /// Sort spec.
    pub sort: SortSpec,
}

#[cfg(test)]
mod tests {
    use claims::assert_ok_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, MIN_LIMIT)]
    #[case(1, 1)]
    #[case(50, 50)]
    #[case(1000, 1000)]
    #[case(5000, MAX_LIMIT)]
    fn limits_are_clamped(#[case] requested: u32, #[case] effective: u32) {
        assert_eq!(Pagination::new(requested, 0).limit, effective);
    }

    #[rstest]
    #[case("name", SortField::Name)]
    #[case("created_at", SortField::CreatedAt)]
    #[case("updated_at", SortField::UpdatedAt)]
    #[case("size", SortField::Size)]
    #[case("type", SortField::Kind)]
    fn sort_fields_parse(#[case] s: &str, #[case] expected: SortField) {
        assert_ok_eq!(s.parse::<SortField>(), expected);
    }

    #[test]
    fn default_listing_is_first_page_by_name() {
        let options = ListingOptions::default();
        assert_eq!(options.pagination.limit, DEFAULT_LIMIT);
        assert_eq!(options.pagination.offset, 0);
        assert_eq!(options.sort.field, SortField::Name);
        assert_eq!(options.sort.direction, SortDirection::Asc);
        assert!(options.filter.is_empty());
    }
}
