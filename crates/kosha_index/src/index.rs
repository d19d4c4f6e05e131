//! I define the sql-backed membership index.
//!

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use kosha_space::{
    resource::{MemberKind, MembershipEdge},
    OpaqueId,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::options::{ListingOptions, MemberFilter, Pagination};

/// An error from the membership index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Underlying database error.
    #[error("Database error in membership index.")]
    Db(#[from] sqlx::Error),

    /// A persisted edge row doesn't decode.
    #[error("Corrupt membership edge ({parent_id}, {member_id}).")]
    CorruptEdge {
        /// Parent id of the corrupt row.
        parent_id: String,
        /// Member id of the corrupt row.
        member_id: String,
    },
}

/// The parent → member edge index.
///
/// The index exclusively owns the `membership_edges` table. An
/// edge exists iff a member resource exists with the edge's
/// parent as its parent container. After a mutation returns,
/// subsequent reads in the same process observe it.
#[derive(Debug, Clone)]
pub struct MembershipIndex {
    pool: SqlitePool,
}

impl MembershipIndex {
    /// Create a new index over given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotently create the backing schema.
    pub async fn init_schema(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS membership_edges (
                parent_id    TEXT NOT NULL,
                member_id    TEXT NOT NULL,
                member_type  TEXT NOT NULL,
                name         TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size_bytes   INTEGER NOT NULL,
                joined_at    TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                PRIMARY KEY (parent_id, member_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_edges_parent_name ON membership_edges (parent_id, name);",
            "CREATE INDEX IF NOT EXISTS idx_edges_parent_joined ON membership_edges (parent_id, joined_at);",
            "CREATE INDEX IF NOT EXISTS idx_edges_parent_type ON membership_edges (parent_id, member_type);",
            "CREATE INDEX IF NOT EXISTS idx_edges_member ON membership_edges (member_id);",
        ] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Record given edge. Idempotent: re-adding an existing
    /// `(parent, member)` pair refreshes the member's
    /// attributes while keeping its joining instant and its
    /// join-time name.
    #[tracing::instrument(skip_all, fields(parent_id = %edge.parent_id, member_id = %edge.member_id))]
    pub async fn add_member(&self, edge: &MembershipEdge) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            INSERT INTO membership_edges
                (parent_id, member_id, member_type, name, content_type, size_bytes, joined_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT (parent_id, member_id) DO UPDATE SET
                member_type  = excluded.member_type,
                content_type = excluded.content_type,
                size_bytes   = excluded.size_bytes,
                updated_at   = excluded.updated_at
            "#,
        )
        .bind(edge.parent_id.to_string())
        .bind(edge.member_id.to_string())
        .bind(edge.member_kind.as_str())
        .bind(&edge.name)
        .bind(&edge.content_type)
        .bind(edge.size_bytes as i64)
        .bind(edge.joined_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove the edge for given `(parent, member)` pair.
    /// Returns whether an edge was present. Removing an absent
    /// edge is a no-op, never an index corruption.
    #[tracing::instrument(skip(self))]
    pub async fn remove_member(
        &self,
        parent_id: OpaqueId,
        member_id: OpaqueId,
    ) -> Result<bool, IndexError> {
        let result = sqlx::query(
            "DELETE FROM membership_edges WHERE parent_id = ?1 AND member_id = ?2",
        )
        .bind(parent_id.to_string())
        .bind(member_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List one page of members of given parent.
    #[tracing::instrument(skip(self, options))]
    pub async fn list_members(
        &self,
        parent_id: OpaqueId,
        options: &ListingOptions,
    ) -> Result<Vec<MembershipEdge>, IndexError> {
        let pagination = Pagination::new(options.pagination.limit, options.pagination.offset);

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT parent_id, member_id, member_type, name, content_type, size_bytes, joined_at \
             FROM membership_edges WHERE parent_id = ",
        );
        qb.push_bind(parent_id.to_string());
        push_filter(&mut qb, &options.filter);

        qb.push(format!(
            " ORDER BY {} {}, member_id ASC",
            options.sort.field.column(),
            options.sort.direction.keyword()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(pagination.limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(pagination.offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_edge).collect()
    }

    /// Count the members of given parent matching given
    /// filter. Exact, never cached.
    #[tracing::instrument(skip(self, filter))]
    pub async fn count_members(
        &self,
        parent_id: OpaqueId,
        filter: &MemberFilter,
    ) -> Result<u64, IndexError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) AS n FROM membership_edges WHERE parent_id = ",
        );
        qb.push_bind(parent_id.to_string());
        push_filter(&mut qb, filter);

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    /// Member count and size sum of given parent, unfiltered.
    pub async fn stats(&self, parent_id: OpaqueId) -> Result<(u64, u64), IndexError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n, COALESCE(SUM(size_bytes), 0) AS total \
             FROM membership_edges WHERE parent_id = ?1",
        )
        .bind(parent_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get::<i64, _>("n") as u64, row.get::<i64, _>("total") as u64))
    }

    /// Stream the members of given parent lazily, pulling one
    /// sql page at a time.
    ///
    /// The stream is finite and not restartable. Cancellation
    /// is honored at each page boundary; callers may also just
    /// drop the stream early.
    pub fn stream_members(
        &self,
        parent_id: OpaqueId,
        options: ListingOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<MembershipEdge, IndexError>> {
        let index = self.clone();

        Box::pin(async_stream::try_stream! {
            let page_size = Pagination::new(options.pagination.limit, 0).limit;
            let mut offset = options.pagination.offset;

            loop {
                if cancel.is_cancelled() {
                    debug!("Member stream over {} cancelled.", parent_id);
                    break;
                }

                let page_options = ListingOptions {
                    pagination: Pagination::new(page_size, offset),
                    filter: options.filter.clone(),
                    sort: options.sort,
                };
                let page = index.list_members(parent_id, &page_options).await?;
                let page_len = page.len();

                for edge in page {
                    yield edge;
                }

                if page_len < page_size as usize {
                    break;
                }
                offset += page_len as u64;
            }
        })
    }
}

/// Append the WHERE clauses of given filter.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MemberFilter) {
    if let Some(kind) = filter.member_kind {
        qb.push(" AND member_type = ");
        qb.push_bind(kind.as_str());
    }
    if let Some(prefix) = &filter.content_type_prefix {
        qb.push(" AND content_type LIKE ");
        qb.push_bind(format!("{}%", escape_like(prefix)));
        qb.push(" ESCAPE '\\'");
    }
    if let Some(pattern) = &filter.name_pattern {
        qb.push(" AND name LIKE ");
        qb.push_bind(glob_to_like(pattern));
        qb.push(" ESCAPE '\\'");
    }
    if let Some(after) = filter.created_after {
        qb.push(" AND joined_at >= ");
        qb.push_bind(after);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND joined_at <= ");
        qb.push_bind(before);
    }
    if let Some(min) = filter.min_size {
        qb.push(" AND size_bytes >= ");
        qb.push_bind(min as i64);
    }
    if let Some(max) = filter.max_size {
        qb.push(" AND size_bytes <= ");
        qb.push_bind(max as i64);
    }
}

/// Escape `LIKE` metacharacters in a literal fragment.
fn escape_like(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Translate a glob pattern (`*`, `?`) into a `LIKE` pattern.
fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Decode one row into an edge.
fn decode_edge(row: &sqlx::sqlite::SqliteRow) -> Result<MembershipEdge, IndexError> {
    let parent_id: String = row.get("parent_id");
    let member_id: String = row.get("member_id");
    let corrupt = || IndexError::CorruptEdge {
        parent_id: parent_id.clone(),
        member_id: member_id.clone(),
    };

    Ok(MembershipEdge {
        parent_id: parent_id.parse().map_err(|_| corrupt())?,
        member_id: member_id.parse().map_err(|_| corrupt())?,
        member_kind: row
            .get::<String, _>("member_type")
            .parse::<MemberKind>()
            .map_err(|_| corrupt())?,
        joined_at: row.get::<DateTime<Utc>, _>("joined_at"),
        content_type: row.get("content_type"),
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        name: row.get("name"),
    })
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use claims::assert_ok;
    use futures::StreamExt;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::options::{SortDirection, SortField, SortSpec};

    pub async fn test_index() -> MembershipIndex {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let index = MembershipIndex::new(pool);
        index.init_schema().await.unwrap();
        index
    }

    pub fn edge(parent_id: OpaqueId, name: &str, size: u64, kind: MemberKind) -> MembershipEdge {
        MembershipEdge {
            parent_id,
            member_id: OpaqueId::generate(),
            member_kind: kind,
            joined_at: Utc::now(),
            content_type: if kind == MemberKind::Container {
                "application/ld+json".into()
            } else {
                "text/turtle".into()
            },
            size_bytes: size,
            name: name.to_owned(),
        }
    }

    async fn seeded(parent_id: OpaqueId, count: usize) -> MembershipIndex {
        let index = test_index().await;
        for i in 0..count {
            let kind = if i % 5 == 0 {
                MemberKind::Container
            } else {
                MemberKind::Resource
            };
            index
                .add_member(&edge(parent_id, &format!("member-{:04}", i), i as u64, kind))
                .await
                .unwrap();
        }
        index
    }

    #[tokio::test]
    async fn add_then_remove_leaves_no_edge() {
        let index = test_index().await;
        let parent_id = OpaqueId::generate();
        let e = edge(parent_id, "doc", 10, MemberKind::Resource);

        index.add_member(&e).await.unwrap();
        assert!(index.remove_member(parent_id, e.member_id).await.unwrap());

        let members = index
            .list_members(parent_id, &ListingOptions::default())
            .await
            .unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let index = test_index().await;
        let parent_id = OpaqueId::generate();
        let e = edge(parent_id, "doc", 10, MemberKind::Resource);

        index.add_member(&e).await.unwrap();
        assert!(index.remove_member(parent_id, e.member_id).await.unwrap());
        // The second removal reports absence, and corrupts
        // nothing.
        assert!(!index.remove_member(parent_id, e.member_id).await.unwrap());
        assert_eq!(index.stats(parent_id).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn re_add_refreshes_attributes_idempotently() {
        let index = test_index().await;
        let parent_id = OpaqueId::generate();
        let mut e = edge(parent_id, "doc", 10, MemberKind::Resource);

        index.add_member(&e).await.unwrap();
        e.size_bytes = 99;
        index.add_member(&e).await.unwrap();

        let members = index
            .list_members(parent_id, &ListingOptions::default())
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].size_bytes, 99);
    }

    #[tokio::test]
    async fn listing_sorts_by_name_with_id_tiebreak() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 10).await;

        let members = index
            .list_members(parent_id, &ListingOptions::default())
            .await
            .unwrap();
        let names: Vec<_> = members.iter().map(|m| m.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn pagination_exhausts_without_duplicates() {
        let parent_id = OpaqueId::generate();
        let total = 137usize;
        let index = seeded(parent_id, total).await;

        let mut seen = HashSet::new();
        let mut offset = 0u64;
        let limit = 25u32;
        loop {
            let page = index
                .list_members(
                    parent_id,
                    &ListingOptions {
                        pagination: Pagination::new(limit, offset),
                        sort: SortSpec {
                            field: SortField::Size,
                            direction: SortDirection::Desc,
                        },
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            for member in &page {
                assert!(seen.insert(member.member_id), "duplicate member in pages");
            }
            if page.len() < limit as usize {
                break;
            }
            offset += page.len() as u64;
        }
        assert_eq!(seen.len(), total);
    }

    #[tokio::test]
    async fn filters_restrict_and_count_agrees() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 50).await;

        let filter = MemberFilter {
            member_kind: Some(MemberKind::Container),
            ..Default::default()
        };
        let count = index.count_members(parent_id, &filter).await.unwrap();
        assert_eq!(count, 10);

        let listed = index
            .list_members(
                parent_id,
                &ListingOptions {
                    pagination: Pagination::new(1000, 0),
                    filter,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 10);
        assert!(listed.iter().all(|m| m.member_kind == MemberKind::Container));
    }

    #[tokio::test]
    async fn name_glob_filter_matches() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 30).await;

        let listed = index
            .list_members(
                parent_id,
                &ListingOptions {
                    pagination: Pagination::new(1000, 0),
                    filter: MemberFilter {
                        name_pattern: Some("member-000?".into()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 10);
    }

    #[tokio::test]
    async fn size_window_filter_matches() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 30).await;

        let count = index
            .count_members(
                parent_id,
                &MemberFilter {
                    min_size: Some(10),
                    max_size: Some(19),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn content_type_prefix_filter_matches() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 20).await;

        let count = index
            .count_members(
                parent_id,
                &MemberFilter {
                    content_type_prefix: Some("text/".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(count, 16);
    }

    #[tokio::test]
    async fn stats_sums_sizes() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 4).await;
        // Sizes are 0 + 1 + 2 + 3.
        assert_eq!(index.stats(parent_id).await.unwrap(), (4, 6));
    }

    #[tokio::test]
    async fn stream_yields_all_members_across_pages() {
        let parent_id = OpaqueId::generate();
        let total = 57usize;
        let index = seeded(parent_id, total).await;

        let stream = index.stream_members(
            parent_id,
            ListingOptions {
                pagination: Pagination::new(10, 0),
                ..Default::default()
            },
            CancellationToken::new(),
        );
        let members: Vec<_> = stream.map(|r| assert_ok!(r)).collect().await;
        assert_eq!(members.len(), total);

        let distinct: HashSet<_> = members.iter().map(|m| m.member_id).collect();
        assert_eq!(distinct.len(), total);
    }

    #[tokio::test]
    async fn stream_stops_at_cancellation() {
        let parent_id = OpaqueId::generate();
        let index = seeded(parent_id, 50).await;

        let cancel = CancellationToken::new();
        let mut stream = index.stream_members(
            parent_id,
            ListingOptions {
                pagination: Pagination::new(10, 0),
                ..Default::default()
            },
            cancel.clone(),
        );

        let mut yielded = 0usize;
        while let Some(member) = stream.next().await {
            member.unwrap();
            yielded += 1;
            if yielded == 10 {
                cancel.cancel();
            }
        }
        // The in-flight page drains; the next boundary stops.
        assert!(yielded < 50);
        assert!(yielded >= 10);
    }
}
