//! Virtual pet care.
//!
//! Each user owns exactly one pet, created at registration. Feeding and
//! playing nudge happiness/growth, clamped to [0, 100], and award a small
//! fixed amount of XP through the same transactional path as everything
//! else.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::Database;
use crate::error::ApiError;
use crate::rewards::{XpRewards, apply_xp};

/// Pet state as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct VirtualPet {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub happiness: i64,
    pub growth: i64,
    pub accessories: Vec<String>,
    pub last_fed: i64,
}

/// What a care action did: the updated pet and the XP it earned.
#[derive(Debug, Clone, Serialize)]
pub struct CareOutcome {
    pub pet: VirtualPet,
    pub xp_gained: i64,
}

/// Virtual pet service.
#[derive(Clone)]
pub struct PetKeeper {
    db: Database,
}

impl PetKeeper {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The user's pet, if the row exists.
    pub fn get(&self, user_id: i64) -> Result<Option<VirtualPet>, ApiError> {
        get_pet(&self.db.conn(), user_id)
    }

    /// Feed the pet: happiness +15 (clamped), stamps last_fed, +5 XP.
    pub fn feed(&self, user_id: i64) -> Result<CareOutcome, ApiError> {
        self.care(user_id, |tx| {
            tx.execute(
                r#"UPDATE virtual_pets SET
                       happiness = MIN(100, MAX(0, happiness + 15)),
                       last_fed = ?1
                   WHERE user_id = ?2"#,
                rusqlite::params![Utc::now().timestamp_millis(), user_id],
            )
        })
    }

    /// Play with the pet: happiness +10, growth +5 (clamped), +5 XP.
    pub fn play(&self, user_id: i64) -> Result<CareOutcome, ApiError> {
        self.care(user_id, |tx| {
            tx.execute(
                r#"UPDATE virtual_pets SET
                       happiness = MIN(100, MAX(0, happiness + 10)),
                       growth = MIN(100, MAX(0, growth + 5))
                   WHERE user_id = ?1"#,
                [user_id],
            )
        })
    }

    fn care<F>(&self, user_id: i64, mutate: F) -> Result<CareOutcome, ApiError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let updated = mutate(&tx)?;
        if updated == 0 {
            return Err(ApiError::not_found("Pet not found"));
        }

        apply_xp(&tx, user_id, XpRewards::PET_CARE)?;

        let pet = get_pet(&tx, user_id)?
            .ok_or_else(|| ApiError::not_found("Pet not found"))?;

        tx.commit()?;
        Ok(CareOutcome {
            pet,
            xp_gained: XpRewards::PET_CARE,
        })
    }
}

fn get_pet(conn: &Connection, user_id: i64) -> Result<Option<VirtualPet>, ApiError> {
    let pet = conn
        .query_row(
            r#"SELECT name, type, happiness, growth, accessories, last_fed
               FROM virtual_pets WHERE user_id = ?1"#,
            [user_id],
            map_pet,
        )
        .optional()?;
    Ok(pet)
}

fn map_pet(row: &Row) -> rusqlite::Result<VirtualPet> {
    let accessories_raw: String = row.get(4)?;
    Ok(VirtualPet {
        name: row.get(0)?,
        kind: row.get(1)?,
        happiness: row.get(2)?,
        growth: row.get(3)?,
        // Stored as a JSON array; a corrupt value degrades to empty.
        accessories: serde_json::from_str(&accessories_raw).unwrap_or_default(),
        last_fed: row.get(5)?,
    })
}
