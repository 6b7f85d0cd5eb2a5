//! [`SqliteStore`] — the SQLite implementation of [`TrackerStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use pricewatch_core::{
  entity::{Entity, TaggedEntity},
  history::{HistoryPoint, Observation},
  membership::ListMembership,
  run::{Run, RunId, RunOutcome, RunStatus, StoreStats},
  store::{RecordOutcome, RunScope, TrackerStore},
};
use rusqlite::OptionalExtension as _;
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{
    RawEntity, RawHistoryPoint, RawMembership, RawRun, decode_dt,
    decode_price, encode_dt, encode_price, encode_run_status, encode_status,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Pricewatch tracker store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. SQLite's
/// own locking enforces the single-writer discipline; a second writer
/// surfaces as [`Error::StoreBusy`], never as silent corruption.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one run row by id.
  async fn fetch_run(&self, run_id: RunId) -> Result<Option<Run>> {
    let raw: Option<RawRun> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, list_id, started_at, completed_at, observed_count, status
               FROM runs WHERE id = ?1",
              rusqlite::params![run_id],
              |row| {
                Ok(RawRun {
                  id:             row.get(0)?,
                  list_id:        row.get(1)?,
                  started_at:     row.get(2)?,
                  completed_at:   row.get(3)?,
                  observed_count: row.get(4)?,
                  status:         row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRun::into_run).transpose()
  }
}

// ─── TrackerStore impl ───────────────────────────────────────────────────────

impl TrackerStore for SqliteStore {
  type Error = Error;

  // ── Runs ──────────────────────────────────────────────────────────────────

  async fn begin_run(&self, list_id: &str) -> Result<Run> {
    // Refuse while an in-progress run exists for this list. A dangling run
    // left behind by a crash blocks new runs until it is finalized.
    let list = list_id.to_owned();
    let open: Option<RunId> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id FROM runs WHERE list_id = ?1 AND status = 'in_progress'",
              rusqlite::params![list],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    if let Some(run_id) = open {
      return Err(Error::RunInProgress { list_id: list_id.to_owned(), run_id });
    }

    let started_at = Utc::now();
    let list = list_id.to_owned();
    let at_str = encode_dt(started_at);

    let id: RunId = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO runs (list_id, started_at, status)
           VALUES (?1, ?2, 'in_progress')",
          rusqlite::params![list, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    info!(run_id = id, list_id, "run started");

    Ok(Run {
      id,
      list_id: list_id.to_owned(),
      started_at,
      completed_at: None,
      observed_count: 0,
      status: RunStatus::InProgress,
    })
  }

  async fn end_run(
    &self,
    run_id: RunId,
    outcome: RunOutcome,
    observed_count: u64,
  ) -> Result<Run> {
    let completed_at = Utc::now();
    let at_str = encode_dt(completed_at);
    let status_str = encode_run_status(RunStatus::from(outcome)).to_owned();
    let count = observed_count as i64;

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE runs
           SET completed_at = ?1, observed_count = ?2, status = ?3
           WHERE id = ?4 AND status = 'in_progress'",
          rusqlite::params![at_str, count, status_str, run_id],
        )?)
      })
      .await?;

    if changed == 0 {
      // Distinguish a missing run from one finalized earlier.
      return match self.fetch_run(run_id).await? {
        None => Err(Error::RunNotFound(run_id)),
        Some(_) => Err(Error::RunNotActive(run_id)),
      };
    }

    info!(run_id, observed_count, ?outcome, "run finalized");

    self
      .fetch_run(run_id)
      .await?
      .ok_or(Error::RunNotFound(run_id))
  }

  async fn run(&self, run_id: RunId) -> Result<Option<Run>> {
    self.fetch_run(run_id).await
  }

  async fn latest_completed_run(
    &self,
    list_id: Option<&str>,
  ) -> Result<Option<Run>> {
    let list = list_id.map(str::to_owned);

    let raw: Option<RawRun> = self
      .conn
      .call(move |conn| {
        let map = |row: &rusqlite::Row<'_>| {
          Ok(RawRun {
            id:             row.get(0)?,
            list_id:        row.get(1)?,
            started_at:     row.get(2)?,
            completed_at:   row.get(3)?,
            observed_count: row.get(4)?,
            status:         row.get(5)?,
          })
        };

        let row = if let Some(list) = list {
          conn
            .query_row(
              "SELECT id, list_id, started_at, completed_at, observed_count, status
               FROM runs
               WHERE status = 'completed' AND list_id = ?1
               ORDER BY started_at DESC LIMIT 1",
              rusqlite::params![list],
              map,
            )
            .optional()?
        } else {
          conn
            .query_row(
              "SELECT id, list_id, started_at, completed_at, observed_count, status
               FROM runs
               WHERE status = 'completed'
               ORDER BY started_at DESC LIMIT 1",
              [],
              map,
            )
            .optional()?
        };
        Ok(row)
      })
      .await?;

    raw.map(RawRun::into_run).transpose()
  }

  // ── Observations — append-only writes ─────────────────────────────────────

  async fn record(
    &self,
    run_id: RunId,
    observation: Observation,
  ) -> Result<RecordOutcome> {
    let obs = observation;
    let handle = obs.handle.clone();
    let at_str = encode_dt(obs.observed_at);
    let price_val = encode_price(obs.price);
    let status_str = encode_status(obs.status).to_owned();

    let outcome: RecordOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Idempotence: an at-least-once redelivery of the same observation
        // must not create a second history point.
        let duplicate: bool = tx
          .query_row(
            "SELECT 1 FROM history_points WHERE handle = ?1 AND observed_at = ?2",
            rusqlite::params![obs.handle, at_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if duplicate {
          return Ok(RecordOutcome {
            new_entity:   false,
            deduped:      true,
            price_change: None,
          });
        }

        // Projection upsert, guarded so an out-of-order observation never
        // regresses current_*.
        let existing: Option<(Option<f64>, String)> = tx
          .query_row(
            "SELECT current_price, last_seen FROM entities WHERE handle = ?1",
            rusqlite::params![obs.handle],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let (new_entity, price_change, advances) = match &existing {
          None => {
            tx.execute(
              "INSERT INTO entities
                 (handle, display_name, current_price, current_status,
                  first_seen, last_seen, last_run_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
              rusqlite::params![
                obs.handle,
                obs.display_name,
                price_val,
                status_str,
                at_str,
                run_id
              ],
            )?;
            (true, None, true)
          }
          Some((old_price, last_seen)) if at_str >= *last_seen => {
            tx.execute(
              "UPDATE entities
               SET display_name   = COALESCE(?2, display_name),
                   current_price  = ?3,
                   current_status = ?4,
                   last_seen      = ?5,
                   last_run_id    = ?6
               WHERE handle = ?1",
              rusqlite::params![
                obs.handle,
                obs.display_name,
                price_val,
                status_str,
                at_str,
                run_id
              ],
            )?;

            let change = (*old_price != price_val)
              .then(|| (decode_price(*old_price), decode_price(price_val)));
            (false, change, true)
          }
          Some(_) => (false, None, false),
        };

        tx.execute(
          "INSERT INTO history_points (handle, price, status, observed_at, run_id)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![obs.handle, price_val, status_str, at_str, run_id],
        )?;

        // Membership reconciliation under the same recency guard: open tags
        // present now but not open; close tags open but absent now.
        if advances {
          let open: Vec<String> = {
            let mut stmt = tx.prepare(
              "SELECT tag FROM list_memberships
               WHERE handle = ?1 AND removed_at IS NULL",
            )?;
            let rows = stmt
              .query_map(rusqlite::params![obs.handle], |row| row.get(0))?
              .collect::<rusqlite::Result<Vec<String>>>()?;
            rows
          };

          for tag in obs.tags.iter().filter(|t| !open.contains(t)) {
            tx.execute(
              "INSERT INTO list_memberships (handle, tag, added_at, run_id)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![obs.handle, tag, at_str, run_id],
            )?;
          }

          for tag in open.iter().filter(|t| !obs.tags.contains(t)) {
            tx.execute(
              "UPDATE list_memberships
               SET removed_at = ?3
               WHERE handle = ?1 AND tag = ?2 AND removed_at IS NULL",
              rusqlite::params![obs.handle, tag, at_str],
            )?;
          }
        }

        tx.commit()?;

        Ok(RecordOutcome { new_entity, deduped: false, price_change })
      })
      .await?;

    if let Some((old, new)) = outcome.price_change {
      info!(%handle, %old, %new, "price change recorded");
    } else {
      debug!(%handle, run_id, deduped = outcome.deduped, "observation recorded");
    }

    Ok(outcome)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn entity(&self, handle: &str) -> Result<Option<Entity>> {
    let handle = handle.to_owned();

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT handle, display_name, current_price, current_status,
                      first_seen, last_seen, last_run_id
               FROM entities WHERE handle = ?1",
              rusqlite::params![handle],
              |row| {
                Ok(RawEntity {
                  handle:         row.get(0)?,
                  display_name:   row.get(1)?,
                  current_price:  row.get(2)?,
                  current_status: row.get(3)?,
                  first_seen:     row.get(4)?,
                  last_seen:      row.get(5)?,
                  last_run_id:    row.get(6)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn entities(&self, scope: RunScope) -> Result<Vec<TaggedEntity>> {
    let (raws, mut tag_map): (Vec<RawEntity>, HashMap<String, Vec<String>>) =
      self
        .conn
        .call(move |conn| {
          let map = |row: &rusqlite::Row<'_>| {
            Ok(RawEntity {
              handle:         row.get(0)?,
              display_name:   row.get(1)?,
              current_price:  row.get(2)?,
              current_status: row.get(3)?,
              first_seen:     row.get(4)?,
              last_seen:      row.get(5)?,
              last_run_id:    row.get(6)?,
            })
          };

          let raws = match scope {
            RunScope::AllHistory => {
              let mut stmt = conn.prepare(
                "SELECT handle, display_name, current_price, current_status,
                        first_seen, last_seen, last_run_id
                 FROM entities ORDER BY handle",
              )?;
              let rows = stmt
                .query_map([], map)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
              rows
            }
            RunScope::Run(run_id) => {
              let mut stmt = conn.prepare(
                "SELECT handle, display_name, current_price, current_status,
                        first_seen, last_seen, last_run_id
                 FROM entities
                 WHERE handle IN
                   (SELECT DISTINCT handle FROM history_points WHERE run_id = ?1)
                 ORDER BY handle",
              )?;
              let rows = stmt
                .query_map(rusqlite::params![run_id], map)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
              rows
            }
          };

          // Open tags for all entities in one pass; joined in Rust so tag
          // text is never ambiguous in a concatenated column.
          let mut stmt = conn.prepare(
            "SELECT handle, tag FROM list_memberships
             WHERE removed_at IS NULL
             ORDER BY handle, tag",
          )?;
          let pairs = stmt
            .query_map([], |row| {
              Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          let mut tag_map: HashMap<String, Vec<String>> = HashMap::new();
          for (handle, tag) in pairs {
            tag_map.entry(handle).or_default().push(tag);
          }

          Ok((raws, tag_map))
        })
        .await?;

    raws
      .into_iter()
      .map(|raw| {
        let tags = tag_map.remove(&raw.handle).unwrap_or_default();
        Ok(TaggedEntity { entity: raw.into_entity()?, tags })
      })
      .collect()
  }

  async fn history(&self, handle: &str) -> Result<Vec<HistoryPoint>> {
    let handle = handle.to_owned();

    let raws: Vec<RawHistoryPoint> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, handle, price, status, observed_at, run_id
           FROM history_points
           WHERE handle = ?1
           ORDER BY observed_at ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![handle], |row| {
            Ok(RawHistoryPoint {
              id:          row.get(0)?,
              handle:      row.get(1)?,
              price:       row.get(2)?,
              status:      row.get(3)?,
              observed_at: row.get(4)?,
              run_id:      row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryPoint::into_point).collect()
  }

  async fn history_since(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<HistoryPoint>> {
    let since_str = since.map(encode_dt);

    let raws: Vec<RawHistoryPoint> = self
      .conn
      .call(move |conn| {
        let map = |row: &rusqlite::Row<'_>| {
          Ok(RawHistoryPoint {
            id:          row.get(0)?,
            handle:      row.get(1)?,
            price:       row.get(2)?,
            status:      row.get(3)?,
            observed_at: row.get(4)?,
            run_id:      row.get(5)?,
          })
        };

        let rows = if let Some(cutoff) = since_str {
          let mut stmt = conn.prepare(
            "SELECT id, handle, price, status, observed_at, run_id
             FROM history_points
             WHERE observed_at >= ?1
             ORDER BY handle, observed_at",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![cutoff], map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        } else {
          let mut stmt = conn.prepare(
            "SELECT id, handle, price, status, observed_at, run_id
             FROM history_points
             ORDER BY handle, observed_at",
          )?;
          let rows = stmt
            .query_map([], map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryPoint::into_point).collect()
  }

  async fn memberships(&self, handle: &str) -> Result<Vec<ListMembership>> {
    let handle = handle.to_owned();

    let raws: Vec<RawMembership> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, handle, tag, added_at, removed_at, run_id
           FROM list_memberships
           WHERE handle = ?1
           ORDER BY added_at, tag",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![handle], |row| {
            Ok(RawMembership {
              id:         row.get(0)?,
              handle:     row.get(1)?,
              tag:        row.get(2)?,
              added_at:   row.get(3)?,
              removed_at: row.get(4)?,
              run_id:     row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawMembership::into_membership)
      .collect()
  }

  async fn stats(&self) -> Result<StoreStats> {
    let (entities, completed_runs, history_points, last_str): (
      i64,
      i64,
      i64,
      Option<String>,
    ) = self
      .conn
      .call(|conn| {
        let entities: i64 =
          conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))?;
        let completed_runs: i64 = conn.query_row(
          "SELECT COUNT(*) FROM runs WHERE status = 'completed'",
          [],
          |r| r.get(0),
        )?;
        let history_points: i64 = conn
          .query_row("SELECT COUNT(*) FROM history_points", [], |r| r.get(0))?;
        let last: Option<String> = conn
          .query_row(
            "SELECT started_at FROM runs
             WHERE status = 'completed'
             ORDER BY started_at DESC LIMIT 1",
            [],
            |r| r.get(0),
          )
          .optional()?;
        Ok((entities, completed_runs, history_points, last))
      })
      .await?;

    Ok(StoreStats {
      entities:          entities.max(0) as u64,
      completed_runs:    completed_runs.max(0) as u64,
      history_points:    history_points.max(0) as u64,
      last_completed_at: last_str.as_deref().map(decode_dt).transpose()?,
    })
  }
}
