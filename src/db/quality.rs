// Quality definitions and profiles.
//
// A definition is a named size band for one media type; a profile is an
// ordered set of definitions with an optional cutoff. Items are ordered by
// insertion, lowest rank first.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::error::{MediarrError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityDefinition {
    pub id: i64,
    pub name: String,
    pub media_type: String,
    pub preferred_size: f64,
    pub min_size: f64,
    pub max_size: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NewQualityDefinition {
    pub name: String,
    pub media_type: String,
    pub preferred_size: f64,
    pub min_size: f64,
    pub max_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i64,
    pub name: String,
    pub cutoff_quality_id: Option<i64>,
    pub upgrade_allowed: bool,
    /// Ordered lowest rank first.
    pub items: Vec<QualityDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct NewQualityProfile {
    pub name: String,
    pub cutoff_quality_id: Option<i64>,
    pub upgrade_allowed: bool,
    /// Definition ids in rank order, lowest first.
    pub quality_definition_ids: Vec<i64>,
}

fn map_definition(row: &rusqlite::Row) -> rusqlite::Result<QualityDefinition> {
    Ok(QualityDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        media_type: row.get(2)?,
        preferred_size: row.get(3)?,
        min_size: row.get(4)?,
        max_size: row.get(5)?,
    })
}

fn definition_exists(conn: &Connection, id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM quality_definition WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Store {
    // ----- quality_definition -----

    pub fn create_quality_definition(&self, def: &NewQualityDefinition) -> Result<i64> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO quality_definition (name, media_type, preferred_size, min_size, max_size)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![def.name, def.media_type, def.preferred_size, def.min_size, def.max_size],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_quality_definition(&self, id: i64) -> Result<QualityDefinition> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, name, media_type, preferred_size, min_size, max_size
                 FROM quality_definition WHERE id = ?1",
                params![id],
                map_definition,
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("quality definition {}", id)))
        })
    }

    pub fn list_quality_definitions(&self, media_type: Option<&str>) -> Result<Vec<QualityDefinition>> {
        self.read(|conn| {
            let definitions = match media_type {
                Some(mt) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, name, media_type, preferred_size, min_size, max_size
                         FROM quality_definition WHERE media_type = ?1 ORDER BY id ASC",
                    )?;
                    let rows = stmt
                        .query_map(params![mt], map_definition)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, name, media_type, preferred_size, min_size, max_size
                         FROM quality_definition ORDER BY id ASC",
                    )?;
                    let rows = stmt
                        .query_map([], map_definition)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(definitions)
        })
    }

    pub fn delete_quality_definition(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM quality_definition WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("quality definition {}", id)));
            }
            Ok(())
        })
    }

    // ----- quality_profile -----

    /// Create a profile and its ordered items. The cutoff and every item
    /// must reference an existing definition.
    pub fn create_quality_profile(&self, profile: &NewQualityProfile) -> Result<i64> {
        self.with_tx(|tx| {
            if let Some(cutoff) = profile.cutoff_quality_id {
                if !definition_exists(tx, cutoff)? {
                    return Err(MediarrError::NotFound(format!("quality definition {}", cutoff)));
                }
            }
            tx.execute(
                "INSERT INTO quality_profile (name, cutoff_quality_id, upgrade_allowed)
                 VALUES (?1, ?2, ?3)",
                params![profile.name, profile.cutoff_quality_id, profile.upgrade_allowed],
            )?;
            let id = tx.last_insert_rowid();
            for definition_id in &profile.quality_definition_ids {
                if !definition_exists(tx, *definition_id)? {
                    return Err(MediarrError::NotFound(format!(
                        "quality definition {}",
                        definition_id
                    )));
                }
                tx.execute(
                    "INSERT INTO quality_profile_item (quality_profile_id, quality_definition_id)
                     VALUES (?1, ?2)",
                    params![id, definition_id],
                )?;
            }
            Ok(id)
        })
    }

    pub fn get_quality_profile(&self, id: i64) -> Result<QualityProfile> {
        self.read(|conn| {
            let header = conn
                .query_row(
                    "SELECT id, name, cutoff_quality_id, upgrade_allowed
                     FROM quality_profile WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                            row.get::<_, bool>(3)?,
                        ))
                    },
                )
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("quality profile {}", id)))?;

            let mut stmt = conn.prepare(
                "SELECT d.id, d.name, d.media_type, d.preferred_size, d.min_size, d.max_size
                 FROM quality_profile_item i
                 JOIN quality_definition d ON d.id = i.quality_definition_id
                 WHERE i.quality_profile_id = ?1
                 ORDER BY i.id ASC",
            )?;
            let items = stmt
                .query_map(params![id], map_definition)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(QualityProfile {
                id: header.0,
                name: header.1,
                cutoff_quality_id: header.2,
                upgrade_allowed: header.3,
                items,
            })
        })
    }

    pub fn list_quality_profiles(&self) -> Result<Vec<QualityProfile>> {
        let ids: Vec<i64> = self.read(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM quality_profile ORDER BY id ASC")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })?;
        ids.into_iter().map(|id| self.get_quality_profile(id)).collect()
    }

    /// Update the cutoff and upgrade flag. The cutoff must reference an
    /// existing definition when non-null.
    pub fn update_quality_profile_cutoff(
        &self,
        id: i64,
        cutoff_quality_id: Option<i64>,
        upgrade_allowed: bool,
    ) -> Result<()> {
        self.with_tx(|tx| {
            if let Some(cutoff) = cutoff_quality_id {
                if !definition_exists(tx, cutoff)? {
                    return Err(MediarrError::NotFound(format!("quality definition {}", cutoff)));
                }
            }
            let rows = tx.execute(
                "UPDATE quality_profile SET cutoff_quality_id = ?1, upgrade_allowed = ?2 WHERE id = ?3",
                params![cutoff_quality_id, upgrade_allowed, id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("quality profile {}", id)));
            }
            Ok(())
        })
    }

    pub fn delete_quality_profile(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM quality_profile WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("quality profile {}", id)));
            }
            Ok(())
        })
    }
}
