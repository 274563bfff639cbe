pub mod id;
mod plan;
mod rows;

use crate::Error;
use plan::Write;
use rows::{team_from_row, MatchRow};

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use knockout_core::render::BracketView;
use knockout_core::{Bracket, Chance, Match, MatchId, Propagation, Team, TeamId};
use knockout_core::{Tournament, TournamentId};
use sqlx::error::DatabaseError;
use sqlx::mysql::{MySql, MySqlDatabaseError, MySqlPool, MySqlRow};
use sqlx::{Executor, Row, Transaction};

macro_rules! get_one {
    ($query:expr) => {
        match $query {
            Ok(v) => v,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    };
}

/// `ER_DUP_ENTRY`: Duplicate entry for a unique or primary key.
const ER_DUP_ENTRY: u16 = 1062;

/// Returns `true` if `err` is a duplicate entry for the unique index `key`.
pub fn is_duplicate_entry(err: &sqlx::Error, key: &str) -> bool {
    match err {
        sqlx::Error::Database(err) => match err.try_downcast_ref::<MySqlDatabaseError>() {
            Some(err) => is_duplicate_key(err.number(), err.message(), key),
            None => false,
        },
        _ => false,
    }
}

fn is_duplicate_key(number: u16, message: &str, key: &str) -> bool {
    if number != ER_DUP_ENTRY {
        return false;
    }

    // "Duplicate entry 'x' for key 'name'". Since MySQL 8.0.19 the key is prefixed with the
    // table name.
    match message.rsplit_once(" for key '") {
        Some((_, name)) => {
            let name = name.strip_suffix('\'').unwrap_or(name);
            name.rsplit('.').next() == Some(key)
        }
        None => false,
    }
}

/// Returns the query selecting all matches of a tournament. With `lock` the rows stay locked
/// until the surrounding transaction ends.
fn matches_query(table_prefix: &str, lock: bool) -> String {
    let mut sql = format!("SELECT * FROM {table_prefix}matches WHERE tournament_id = ?");
    if lock {
        sql.push_str(" FOR UPDATE");
    }

    sql
}

#[derive(Clone, Debug)]
pub struct Store {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl Store {
    #[inline]
    pub fn teams(&self) -> TeamsClient<'_> {
        TeamsClient { store: self }
    }

    #[inline]
    pub fn tournaments(&self) -> TournamentsClient<'_> {
        TournamentsClient { store: self }
    }

    #[inline]
    pub fn enrollments(&self, id: TournamentId) -> EnrollmentsClient<'_> {
        EnrollmentsClient { store: self, id }
    }

    #[inline]
    pub fn bracket(&self, id: TournamentId) -> BracketClient<'_> {
        BracketClient { store: self, id }
    }

    #[inline]
    pub fn matches(&self) -> MatchesClient<'_> {
        MatchesClient { store: self }
    }

    /// Creates all tables if they don't exist yet.
    pub async fn init(&self) -> Result<(), Error> {
        let prefix = &self.table_prefix;

        let tables = [
            format!("CREATE TABLE IF NOT EXISTS {prefix}teams (id BIGINT UNSIGNED PRIMARY KEY, name VARCHAR(255) NOT NULL UNIQUE, asset TEXT NULL)"),
            format!("CREATE TABLE IF NOT EXISTS {prefix}tournaments (id BIGINT UNSIGNED PRIMARY KEY, name TEXT NOT NULL, game TEXT NOT NULL, size INT UNSIGNED NOT NULL, created DATETIME NOT NULL)"),
            format!("CREATE TABLE IF NOT EXISTS {prefix}enrollments (tournament_id BIGINT UNSIGNED NOT NULL, team_id BIGINT UNSIGNED NOT NULL, PRIMARY KEY (tournament_id, team_id))"),
            format!("CREATE TABLE IF NOT EXISTS {prefix}matches (id BIGINT UNSIGNED PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, round INT UNSIGNED NOT NULL, match_number INT UNSIGNED NOT NULL, team1 BIGINT UNSIGNED NULL, team2 BIGINT UNSIGNED NULL, score1 INT UNSIGNED NULL, score2 INT UNSIGNED NULL, winner BIGINT UNSIGNED NULL, next_match_id BIGINT UNSIGNED NULL, next_slot TINYINT UNSIGNED NULL, INDEX (tournament_id))"),
        ];

        for sql in tables {
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        log::info!("Initialized tables with prefix {:?}", prefix);

        Ok(())
    }

    async fn fetch_matches<'c, E>(
        &self,
        executor: E,
        id: TournamentId,
        lock: bool,
    ) -> Result<Vec<Match>, Error>
    where
        E: Executor<'c, Database = MySql>,
    {
        let sql = matches_query(&self.table_prefix, lock);

        let rows = sqlx::query(&sql).bind(id.0).fetch_all(executor).await?;

        rows.iter()
            .map(|row| MatchRow::from_row(row)?.into_match())
            .collect()
    }

    /// Executes the planned `writes` within `tx`.
    async fn apply(
        &self,
        tx: &mut Transaction<'_, MySql>,
        writes: &[Write],
    ) -> Result<(), Error> {
        let prefix = &self.table_prefix;

        for write in writes {
            match write {
                Write::DeleteMatches(id) => {
                    let res =
                        sqlx::query(&format!("DELETE FROM {prefix}matches WHERE tournament_id = ?"))
                            .bind(id.0)
                            .execute(&mut *tx)
                            .await?;

                    if res.rows_affected() != 0 {
                        log::info!(
                            "Discarding {} matches of tournament {}",
                            res.rows_affected(),
                            id
                        );
                    }
                }
                Write::InsertMatch(row) => {
                    sqlx::query(&format!(
                        "INSERT INTO {prefix}matches (id, tournament_id, round, match_number, team1, team2, score1, score2, winner, next_match_id, next_slot) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                    ))
                    .bind(row.id)
                    .bind(row.tournament_id)
                    .bind(row.round)
                    .bind(row.match_number)
                    .bind(row.team1)
                    .bind(row.team2)
                    .bind(row.score1)
                    .bind(row.score2)
                    .bind(row.winner)
                    .bind(row.next_match_id)
                    .bind(row.next_slot)
                    .execute(&mut *tx)
                    .await?;
                }
                Write::UpdateMatch(row) => {
                    sqlx::query(&format!(
                        "UPDATE {prefix}matches SET team1 = ?, team2 = ?, score1 = ?, score2 = ?, winner = ? WHERE id = ?"
                    ))
                    .bind(row.team1)
                    .bind(row.team2)
                    .bind(row.score1)
                    .bind(row.score2)
                    .bind(row.winner)
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        Ok(())
    }
}

fn tournament_from_row(row: &MySqlRow) -> Result<Tournament, Error> {
    let id = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let game: String = row.try_get("game")?;
    let size: u32 = row.try_get("size")?;
    let created: DateTime<Utc> = row.try_get("created")?;

    Ok(Tournament::new(
        TournamentId(id),
        name,
        game,
        size as usize,
        created,
    )?)
}

#[derive(Copy, Clone, Debug)]
pub struct TeamsClient<'a> {
    store: &'a Store,
}

impl<'a> TeamsClient<'a> {
    /// Returns a list of all [`Team`]s, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if an database error occured.
    pub async fn list(&self) -> Result<Vec<Team>, Error> {
        let sql = format!(
            "SELECT id, name, asset FROM {}teams ORDER BY name",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).fetch(&self.store.pool);

        let mut teams = Vec::new();
        while let Some(row) = rows.try_next().await? {
            teams.push(team_from_row(&row)?);
        }

        Ok(teams)
    }

    /// Returns the [`Team`] with the given `id`. Returns `None` if no team with the given `id`
    /// exists.
    pub async fn get(&self, id: TeamId) -> Result<Option<Team>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, name, asset FROM {}teams WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(team_from_row(&row)?))
    }

    /// Inserts a new [`Team`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if a team with the same name exists.
    pub async fn insert(&self, name: &str, asset: Option<&str>) -> Result<Team, Error> {
        let team = Team {
            id: id::team(),
            name: name.to_owned(),
            asset: asset.map(str::to_owned),
        };

        let res = sqlx::query(&format!(
            "INSERT INTO {}teams (id, name, asset) VALUES (?, ?, ?)",
            self.store.table_prefix
        ))
        .bind(team.id.0)
        .bind(&team.name)
        .bind(&team.asset)
        .execute(&self.store.pool)
        .await;

        match res {
            Ok(_) => Ok(team),
            Err(err) if is_duplicate_entry(&err, "name") => Err(Error::AlreadyExists("team")),
            Err(err) => Err(err.into()),
        }
    }

    /// Replaces the asset of the team with the given `id`.
    pub async fn update_asset(&self, id: TeamId, asset: Option<&str>) -> Result<(), Error> {
        // Select first, MySQL reports 0 affected rows if the value didn't change.
        if self.get(id).await?.is_none() {
            return Err(Error::NotFound("team"));
        }

        sqlx::query(&format!(
            "UPDATE {}teams SET asset = ? WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(asset)
        .bind(id.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TournamentsClient<'a> {
    store: &'a Store,
}

impl<'a> TournamentsClient<'a> {
    /// Returns a list of all [`Tournament`]s, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if an database error occured.
    pub async fn list(&self) -> Result<Vec<Tournament>, Error> {
        let sql = format!(
            "SELECT id, name, game, size, created FROM {}tournaments ORDER BY created",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).fetch(&self.store.pool);

        let mut tournaments = Vec::new();
        while let Some(row) = rows.try_next().await? {
            tournaments.push(tournament_from_row(&row)?);
        }

        Ok(tournaments)
    }

    /// Returns the [`Tournament`] with the given `id`. Returns `None` if no tournament with the
    /// given `id` exists.
    pub async fn get(&self, id: TournamentId) -> Result<Option<Tournament>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, name, game, size, created FROM {}tournaments WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(tournament_from_row(&row)?))
    }

    /// Inserts a new [`Tournament`] with `size` teams.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if `size` is not a power of two or an database error occured.
    pub async fn insert(&self, name: &str, game: &str, size: usize) -> Result<Tournament, Error> {
        let tournament = Tournament::new(id::tournament(), name, game, size, Utc::now())?;

        sqlx::query(&format!(
            "INSERT INTO {}tournaments (id, name, game, size, created) VALUES (?, ?, ?, ?, ?)",
            self.store.table_prefix
        ))
        .bind(tournament.id.0)
        .bind(&tournament.name)
        .bind(&tournament.game)
        .bind(tournament.size() as u32)
        .bind(tournament.created)
        .execute(&self.store.pool)
        .await?;

        Ok(tournament)
    }

    /// Deletes the [`Tournament`] with the given `id` together with its enrollments and
    /// matches.
    pub async fn delete(&self, id: TournamentId) -> Result<(), Error> {
        let prefix = &self.store.table_prefix;
        let mut tx = self.store.pool.begin().await?;

        for table in ["matches", "enrollments"] {
            sqlx::query(&format!(
                "DELETE FROM {prefix}{table} WHERE tournament_id = ?"
            ))
            .bind(id.0)
            .execute(&mut tx)
            .await?;
        }

        let res = sqlx::query(&format!("DELETE FROM {prefix}tournaments WHERE id = ?"))
            .bind(id.0)
            .execute(&mut tx)
            .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound("tournament"));
        }

        tx.commit().await?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct EnrollmentsClient<'a> {
    store: &'a Store,
    id: TournamentId,
}

impl<'a> EnrollmentsClient<'a> {
    /// Returns all [`Team`]s enrolled in the tournament.
    pub async fn list(&self) -> Result<Vec<Team>, Error> {
        let prefix = &self.store.table_prefix;
        let sql = format!(
            "SELECT t.id, t.name, t.asset FROM {prefix}teams t INNER JOIN {prefix}enrollments e ON e.team_id = t.id WHERE e.tournament_id = ? ORDER BY t.name"
        );

        let mut rows = sqlx::query(&sql).bind(self.id.0).fetch(&self.store.pool);

        let mut teams = Vec::new();
        while let Some(row) = rows.try_next().await? {
            teams.push(team_from_row(&row)?);
        }

        Ok(teams)
    }

    /// Enrolls the team `team` in the tournament.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tournament or team doesn't exist and
    /// [`Error::AlreadyExists`] if the team is already enrolled.
    pub async fn insert(&self, team: TeamId) -> Result<(), Error> {
        if self.store.tournaments().get(self.id).await?.is_none() {
            return Err(Error::NotFound("tournament"));
        }

        if self.store.teams().get(team).await?.is_none() {
            return Err(Error::NotFound("team"));
        }

        let res = sqlx::query(&format!(
            "INSERT INTO {}enrollments (tournament_id, team_id) VALUES (?, ?)",
            self.store.table_prefix
        ))
        .bind(self.id.0)
        .bind(team.0)
        .execute(&self.store.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_entry(&err, "PRIMARY") => {
                Err(Error::AlreadyExists("enrollment"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the team `team` from the tournament.
    pub async fn delete(&self, team: TeamId) -> Result<(), Error> {
        let res = sqlx::query(&format!(
            "DELETE FROM {}enrollments WHERE tournament_id = ? AND team_id = ?",
            self.store.table_prefix
        ))
        .bind(self.id.0)
        .bind(team.0)
        .execute(&self.store.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound("enrollment"));
        }

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct BracketClient<'a> {
    store: &'a Store,
    id: TournamentId,
}

impl<'a> BracketClient<'a> {
    /// Returns the [`Bracket`] of the tournament. Returns `None` if no bracket was generated yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tournament doesn't exist.
    pub async fn get(&self) -> Result<Option<Bracket>, Error> {
        let tournament = self
            .store
            .tournaments()
            .get(self.id)
            .await?
            .ok_or(Error::NotFound("tournament"))?;

        let matches = self
            .store
            .fetch_matches(&self.store.pool, self.id, false)
            .await?;
        if matches.is_empty() {
            return Ok(None);
        }

        Ok(Some(Bracket::resume(self.id, tournament.size(), matches)?))
    }

    /// Generates a new bracket from the enrolled teams, replacing the existing bracket.
    ///
    /// The number of enrolled teams is checked before the existing bracket is removed. If the
    /// check fails the existing bracket is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tournament doesn't exist or a
    /// [`knockout_core::Error::SizeMismatch`] if the number of enrolled teams is not equal to
    /// the size of the tournament.
    pub async fn generate<C>(&self, chance: &mut C) -> Result<Bracket, Error>
    where
        C: Chance + ?Sized,
    {
        let prefix = &self.store.table_prefix;
        let mut tx = self.store.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT size FROM {prefix}tournaments WHERE id = ? FOR UPDATE"
        ))
        .bind(self.id.0)
        .fetch_optional(&mut tx)
        .await?
        .ok_or(Error::NotFound("tournament"))?;

        let size: u32 = row.try_get("size")?;

        let teams = sqlx::query(&format!(
            "SELECT team_id FROM {prefix}enrollments WHERE tournament_id = ? ORDER BY team_id"
        ))
        .bind(self.id.0)
        .fetch_all(&mut tx)
        .await?
        .iter()
        .map(|row| row.try_get("team_id").map(TeamId))
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        // Fails before anything is written if the number of teams doesn't match.
        let plan = plan::generate(self.id, size as usize, teams, chance, id::next_match)?;
        self.store.apply(&mut tx, &plan.writes).await?;

        tx.commit().await?;

        log::info!(
            "Generated bracket with {} matches for tournament {}",
            plan.output.matches().len(),
            self.id
        );

        Ok(plan.output)
    }

    /// Returns the champion of the tournament. Returns `None` if the final has not been decided
    /// yet.
    pub async fn champion(&self) -> Result<Option<Team>, Error> {
        let champion = match self.get().await?.and_then(|bracket| bracket.champion()) {
            Some(team) => team,
            None => return Ok(None),
        };

        self.store.teams().get(champion).await
    }

    /// Returns the [`BracketView`] of the tournament.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tournament doesn't exist or no bracket was generated.
    pub async fn view(&self) -> Result<BracketView, Error> {
        let tournament = self
            .store
            .tournaments()
            .get(self.id)
            .await?
            .ok_or(Error::NotFound("tournament"))?;

        let bracket = self.get().await?.ok_or(Error::NotFound("bracket"))?;

        let prefix = &self.store.table_prefix;
        let sql = format!(
            "SELECT DISTINCT t.id, t.name, t.asset FROM {prefix}teams t INNER JOIN {prefix}matches m ON t.id IN (m.team1, m.team2) WHERE m.tournament_id = ?"
        );

        let mut rows = sqlx::query(&sql).bind(self.id.0).fetch(&self.store.pool);

        let mut teams = Vec::new();
        while let Some(row) = rows.try_next().await? {
            teams.push(team_from_row(&row)?);
        }

        Ok(BracketView::new(&tournament, &bracket, &teams))
    }
}

#[derive(Copy, Clone, Debug)]
pub struct MatchesClient<'a> {
    store: &'a Store,
}

impl<'a> MatchesClient<'a> {
    /// Returns the [`Match`] with the given `id`.
    pub async fn get(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT * FROM {}matches WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(MatchRow::from_row(&row)?.into_match()?))
    }

    /// Records the result of the match `id` and moves the winner into the next match. Both
    /// matches are written in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the match doesn't exist or an [`knockout_core::Error`] if
    /// the result cannot be recorded (e.g. the teams of the match are not known yet).
    pub async fn record_result<C>(
        &self,
        id: MatchId,
        score1: u32,
        score2: u32,
        chance: &mut C,
    ) -> Result<Propagation, Error>
    where
        C: Chance + ?Sized,
    {
        let tournament_id = self
            .get(id)
            .await?
            .ok_or(Error::NotFound("match"))?
            .tournament_id;

        let tournament = self
            .store
            .tournaments()
            .get(tournament_id)
            .await?
            .ok_or(Error::NotFound("tournament"))?;

        let mut tx = self.store.pool.begin().await?;

        // Locks all matches of the bracket until the transaction ends.
        let matches = self
            .store
            .fetch_matches(&mut tx, tournament_id, true)
            .await?;

        let plan = plan::record_result(
            tournament_id,
            tournament.size(),
            matches,
            id,
            (score1, score2),
            chance,
        )?;
        self.store.apply(&mut tx, &plan.writes).await?;

        tx.commit().await?;

        log::info!(
            "Recorded result {}:{} for match {}, team {} advances",
            score1,
            score2,
            id,
            plan.output.winner
        );

        Ok(plan.output)
    }
}
