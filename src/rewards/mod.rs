//! XP, level, achievement, and streak primitives.
//!
//! The reward loop is deliberately simple: fixed XP awards per event and a
//! flat level curve. Levels are always derived from XP, never stored
//! independently of it.

pub mod achievements;
pub mod streaks;

use anyhow::Result;
use rusqlite::Connection;

/// XP awards for the various player actions.
pub struct XpRewards;

impl XpRewards {
    /// Marking a word as learned for the first time.
    pub const WORD_LEARNED: i64 = 10;

    /// Quiz answer the player remembered.
    pub const QUIZ_REMEMBERED: i64 = 15;

    /// Quiz answer the player forgot (participation).
    pub const QUIZ_FORGOT: i64 = 5;

    /// Feeding or playing with the virtual pet.
    pub const PET_CARE: i64 = 5;
}

/// Level for a given XP total.
pub fn level_for_xp(xp: i64) -> i64 {
    xp / 100 + 1
}

/// Add XP to a user and recompute the level in the same statement.
///
/// Both column expressions read the pre-update row, so xp and level can
/// never drift apart. Returns the new (xp, level).
pub fn apply_xp(conn: &Connection, user_id: i64, amount: i64) -> Result<(i64, i64)> {
    conn.execute(
        "UPDATE users SET xp = xp + ?1, level = (xp + ?1) / 100 + 1 WHERE id = ?2",
        rusqlite::params![amount, user_id],
    )?;
    let row = conn.query_row(
        "SELECT xp, level FROM users WHERE id = ?1",
        [user_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(row)
}
