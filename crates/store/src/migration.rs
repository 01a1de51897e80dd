//! Copy flat collections into the indexed store.
//!
//! Every record is inserted with add semantics. A record whose key already
//! exists is counted as already migrated and left untouched; any other failure
//! is recorded and the remaining records are still attempted. The flat copy is
//! never modified, so running a migration twice yields the same indexed
//! content as running it once.

use std::fmt;

use shopkart_core::{DecodeIssue, EntityType, Order, Product, Record, User};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::flat::{FlatMedium, FlatStore};
use crate::indexed::IndexedStore;
use crate::session::CURRENT_USER_KEY;

/// A record that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    /// Record key.
    pub id: i64,
    /// Error text.
    pub reason: String,
}

/// Migration outcome for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReport {
    /// Entity type migrated.
    pub entity: EntityType,
    /// Records inserted by this run.
    pub migrated: usize,
    /// Records whose key was already present.
    pub already_present: usize,
    /// Records rejected for any other reason.
    pub failed: Vec<FailedRecord>,
    /// Flat elements the codec could not read.
    pub dropped: Vec<DecodeIssue>,
}

impl EntityReport {
    const fn new(entity: EntityType) -> Self {
        Self {
            entity,
            migrated: 0,
            already_present: 0,
            failed: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

impl fmt::Display for EntityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} migrated, {} already present, {} failed, {} unreadable",
            self.entity,
            self.migrated,
            self.already_present,
            self.failed.len(),
            self.dropped.len()
        )
    }
}

/// Outcome of a full migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// One entry per entity type, in migration order.
    pub entities: Vec<EntityReport>,
    /// Whether the logged-in user from the legacy session was inserted.
    pub session_user_migrated: bool,
}

impl MigrationReport {
    /// Report for one entity type.
    #[must_use]
    pub fn entity(&self, entity: EntityType) -> Option<&EntityReport> {
        self.entities.iter().find(|r| r.entity == entity)
    }

    /// Records inserted across all entity types.
    #[must_use]
    pub fn total_migrated(&self) -> usize {
        self.entities.iter().map(|r| r.migrated).sum()
    }

    /// Records that failed across all entity types.
    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.entities.iter().map(|r| r.failed.len()).sum()
    }
}

/// Moves flat data into the indexed store.
#[derive(Debug)]
pub struct Migrator<'a, M> {
    flat: &'a FlatStore<M>,
    indexed: &'a IndexedStore,
}

impl<'a, M: FlatMedium> Migrator<'a, M> {
    /// Create a migrator over the two stores.
    #[must_use]
    pub const fn new(flat: &'a FlatStore<M>, indexed: &'a IndexedStore) -> Self {
        Self { flat, indexed }
    }

    /// Migrate every entity type, then the legacy session user.
    ///
    /// # Errors
    ///
    /// Returns an error only if a medium cannot be read at all. Per-record
    /// failures are reported, not returned.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<MigrationReport> {
        let mut entities = Vec::with_capacity(EntityType::ALL.len());
        for entity in EntityType::ALL {
            let report = match entity {
                EntityType::Products => self.migrate::<Product>().await?,
                EntityType::Users => self.migrate::<User>().await?,
                EntityType::Orders => self.migrate::<Order>().await?,
            };
            info!(%report, "Migrated collection");
            entities.push(report);
        }
        let session_user_migrated = self.migrate_session_user().await?;

        Ok(MigrationReport {
            entities,
            session_user_migrated,
        })
    }

    /// Migrate one entity type.
    ///
    /// # Errors
    ///
    /// Returns an error only if the flat medium cannot be read.
    #[instrument(skip(self), fields(entity = %R::ENTITY))]
    pub async fn migrate<R: Record>(&self) -> Result<EntityReport> {
        let decoded = self.flat.read_all::<R>().await?;
        let mut report = EntityReport::new(R::ENTITY);
        report.dropped = decoded.issues;

        for record in &decoded.records {
            let id = record.key();
            match self.indexed.add(record).await {
                Ok(()) => report.migrated += 1,
                Err(e) if e.is_duplicate_key() => {
                    debug!(id, "Already migrated");
                    report.already_present += 1;
                }
                Err(e) => {
                    warn!(id, error = %e, "Record not migrated");
                    report.failed.push(FailedRecord {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn migrate_session_user(&self) -> Result<bool> {
        let Some(mut user) = self.flat.get_json::<User>(CURRENT_USER_KEY).await? else {
            return Ok(false);
        };
        // Tokens stay in the session.
        user.token = None;
        match self.indexed.add(&user).await {
            Ok(()) => {
                info!(user_id = %user.id, "Migrated session user");
                Ok(true)
            }
            Err(e) if e.is_duplicate_key() => Ok(false),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Session user not migrated");
                Ok(false)
            }
        }
    }
}
