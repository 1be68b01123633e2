use sqlx::SqliteConnection;

use super::SqliteStore;
use crate::error::StoreError;
use crate::types::Tag;

fn tag_from_row((id, name, is_system): (i64, String, i64)) -> Tag {
    Tag {
        id,
        name,
        is_system: is_system != 0,
    }
}

pub(super) async fn load_tags(
    conn: &mut SqliteConnection,
    skill_id: i64,
) -> Result<Vec<Tag>, StoreError> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT t.id, t.name, t.is_system FROM skill_tags st \
         JOIN tags t ON t.id = st.tag_id \
         WHERE st.skill_id = ? ORDER BY st.position",
    )
    .bind(skill_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(tag_from_row).collect())
}

/// Replace the tag set of a skill.
///
/// Identifiers are tag ids or tag names; an id match wins over a name match.
/// Existing tags are attached first, then unknown names are created as
/// non-system tags while fewer than `max_tags` are attached. Anything beyond
/// the cap is dropped.
pub(super) async fn replace_tags(
    conn: &mut SqliteConnection,
    skill_id: i64,
    idents: &[String],
    max_tags: usize,
) -> Result<Vec<Tag>, StoreError> {
    let mut seen = std::collections::HashSet::new();
    let idents: Vec<&str> = idents
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .collect();

    let mut matched: Vec<Tag> = Vec::new();
    let mut unknown: Vec<&str> = Vec::new();
    for ident in idents {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, is_system FROM tags \
             WHERE CAST(id AS TEXT) = ? OR name = ? \
             ORDER BY CAST(id AS TEXT) = ? DESC LIMIT 1",
        )
        .bind(ident)
        .bind(ident)
        .bind(ident)
        .fetch_optional(&mut *conn)
        .await?;

        match row.map(tag_from_row) {
            Some(tag) if matched.iter().all(|t| t.id != tag.id) => matched.push(tag),
            Some(_) => {}
            None => unknown.push(ident),
        }
    }

    if matched.len() > max_tags {
        tracing::debug!(skill_id, dropped = matched.len() - max_tags, "tag cap reached");
        matched.truncate(max_tags);
    }

    for name in unknown {
        if matched.len() >= max_tags {
            tracing::debug!(skill_id, tag = name, "tag cap reached, not creating tag");
            continue;
        }
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO tags (name, is_system) VALUES (?, 0) RETURNING id")
                .bind(name)
                .fetch_one(&mut *conn)
                .await?;
        matched.push(Tag {
            id,
            name: name.to_owned(),
            is_system: false,
        });
    }

    sqlx::query("DELETE FROM skill_tags WHERE skill_id = ?")
        .bind(skill_id)
        .execute(&mut *conn)
        .await?;

    for (position, tag) in (0_i64..).zip(&matched) {
        sqlx::query("INSERT INTO skill_tags (skill_id, tag_id, position) VALUES (?, ?, ?)")
            .bind(skill_id)
            .bind(tag.id)
            .bind(position)
            .execute(&mut *conn)
            .await?;
    }

    Ok(matched)
}

impl SqliteStore {
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let rows: Vec<(i64, String, i64)> =
            sqlx::query_as("SELECT id, name, is_system FROM tags ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(tag_from_row).collect())
    }

    /// Create a system tag, or return the existing tag with that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn ensure_system_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let row: (i64, String, i64) = sqlx::query_as(
            "INSERT INTO tags (name, is_system) VALUES (?, 1) \
             ON CONFLICT(name) DO UPDATE SET is_system = 1 \
             RETURNING id, name, is_system",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(tag_from_row(row))
    }
}
