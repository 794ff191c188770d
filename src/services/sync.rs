use std::collections::hash_map::Entry;
use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{property_queries, sync_queries};
use crate::error::EngineError;
use crate::models::history::PriceHistoryEntry;
use crate::models::job::{SearchJob, SearchStatus};
use crate::models::observation::PriceObservation;
use crate::models::property::Property;
use crate::models::sync::{SyncReport, TableCounts, UnmappedProperty, UnmappedReason};

/// Trimmed property name → id within one hotel. When several properties
/// share a trimmed name the lowest id keeps it; the others come back as
/// `(id, name)` collisions.
pub fn name_map(properties: &[Property]) -> (HashMap<String, i64>, Vec<(i64, String)>) {
    let mut ordered: Vec<&Property> = properties.iter().collect();
    ordered.sort_by_key(|p| p.id);

    let mut names = HashMap::new();
    let mut collisions = Vec::new();
    for p in ordered {
        match names.entry(p.name.trim().to_string()) {
            Entry::Occupied(_) => collisions.push((p.id, p.name.clone())),
            Entry::Vacant(slot) => {
                slot.insert(p.id);
            }
        }
    }
    (names, collisions)
}

/// Source property id → destination property id, joined on name. Source
/// properties without a destination namesake are returned separately.
pub fn compose_id_map(
    source: &HashMap<String, i64>,
    destination: &HashMap<String, i64>,
) -> (HashMap<i64, i64>, Vec<UnmappedProperty>) {
    let mut mapped = HashMap::new();
    let mut unmapped = Vec::new();
    for (name, source_id) in source {
        match destination.get(name) {
            Some(dest_id) => {
                mapped.insert(*source_id, *dest_id);
            }
            None => unmapped.push(UnmappedProperty {
                source_property_id: *source_id,
                name: name.clone(),
                reason: UnmappedReason::NoDestinationMatch,
            }),
        }
    }
    unmapped.sort_by_key(|u| u.source_property_id);
    (mapped, unmapped)
}

/// A source job re-keyed for the destination.
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub source_id: Uuid,
    pub job: SearchJob,
}

/// Rows re-keyed for the destination, ready to insert.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub jobs: Vec<PlannedJob>,
    pub observations: Vec<PriceObservation>,
    pub history: Vec<PriceHistoryEntry>,
    pub skipped: TableCounts,
}

/// Rewrite foreign keys of source rows into destination ids. Jobs get new
/// ids; observations follow their job. Rows whose property has no mapping are
/// counted as skipped. Jobs still open in the source arrive CANCELLED, since
/// no worker in the destination drives them.
pub fn plan(
    property_map: &HashMap<i64, i64>,
    dest_hotel_id: i64,
    jobs: Vec<SearchJob>,
    observations: Vec<PriceObservation>,
    history: Vec<PriceHistoryEntry>,
) -> SyncPlan {
    let mut out = SyncPlan::default();
    let mut job_map: HashMap<Uuid, Uuid> = HashMap::new();

    for mut job in jobs {
        let Some(&property_id) = property_map.get(&job.property_id) else {
            out.skipped.search_jobs += 1;
            continue;
        };
        let source_id = job.id;
        let new_id = Uuid::new_v4();
        job_map.insert(source_id, new_id);
        job.id = new_id;
        job.property_id = property_id;
        job.hotel_id = dest_hotel_id;
        if !job.status.is_terminal() {
            let note = format!("replicated while {}", job.status);
            job.error_log.get_or_insert(note);
            job.status = SearchStatus::Cancelled;
            job.completed_at = Some(job.completed_at.unwrap_or(job.updated_at));
        }
        out.jobs.push(PlannedJob { source_id, job });
    }

    for mut obs in observations {
        let (Some(&property_id), Some(&search_id)) =
            (property_map.get(&obs.property_id), job_map.get(&obs.search_id))
        else {
            out.skipped.price_observations += 1;
            continue;
        };
        obs.property_id = property_id;
        obs.search_id = search_id;
        out.observations.push(obs);
    }

    for mut entry in history {
        let Some(&property_id) = property_map.get(&entry.property_id) else {
            out.skipped.price_history += 1;
            continue;
        };
        entry.property_id = property_id;
        out.history.push(entry);
    }

    out
}

/// Replicates one hotel's searches, quotes and price history from a source
/// database into a destination database with its own primary keys.
pub struct SyncMapper {
    source: PgPool,
    destination: PgPool,
}

impl SyncMapper {
    pub fn new(source: PgPool, destination: PgPool) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Full replace of the hotel's replicated rows in the destination. Rows
    /// created natively in the destination are left alone.
    ///
    /// Deletes and inserts run in one destination transaction, so readers see
    /// either the previous copy or the new one.
    pub async fn run(&self, source_hotel_id: i64, dest_hotel_id: i64) -> Result<SyncReport, EngineError> {
        let dest_properties = property_queries::list_hotel_properties(&self.destination, dest_hotel_id, false).await?;
        let source_properties = property_queries::list_hotel_properties(&self.source, source_hotel_id, false).await?;
        if dest_properties.is_empty() {
            return Err(EngineError::Validation(format!(
                "destination hotel {} has no properties to map onto",
                dest_hotel_id
            )));
        }

        let (source_names, source_collisions) = name_map(&source_properties);
        let (dest_names, dest_collisions) = name_map(&dest_properties);
        for (property_id, name) in &dest_collisions {
            warn!(
                dest_hotel_id,
                property_id,
                name = %name,
                "Destination property name repeats; its rows map to the lowest id"
            );
        }

        let (property_map, mut unmapped) = compose_id_map(&source_names, &dest_names);
        unmapped.extend(
            source_collisions
                .into_iter()
                .map(|(source_property_id, name)| UnmappedProperty {
                    source_property_id,
                    name,
                    reason: UnmappedReason::DuplicateSourceName,
                }),
        );
        unmapped.sort_by_key(|u| u.source_property_id);
        for u in &unmapped {
            let err = EngineError::UnmappedReference {
                source_property_id: u.source_property_id,
                name: u.name.clone(),
            };
            warn!(hotel_id = source_hotel_id, reason = ?u.reason, error = %err, "Skipping rows of unmapped property");
        }

        let source_ids: Vec<i64> = source_properties.iter().map(|p| p.id).collect();
        let jobs = sync_queries::jobs_for_properties(&self.source, &source_ids).await?;
        let observations = sync_queries::observations_for_properties(&self.source, &source_ids).await?;
        let history = sync_queries::history_for_properties(&self.source, &source_ids).await?;

        let mut plan = plan(&property_map, dest_hotel_id, jobs, observations, history);
        let dest_ids: Vec<i64> = dest_properties.iter().map(|p| p.id).collect();

        let mut tx = self.destination.begin().await?;
        let deleted = sync_queries::delete_scope(&mut tx, &dest_ids).await?;
        for planned in &plan.jobs {
            sync_queries::insert_job_row(&mut tx, &planned.job, planned.source_id).await?;
        }
        let mut observations_inserted = 0;
        for obs in &plan.observations {
            if sync_queries::insert_observation_row(&mut tx, obs).await? {
                observations_inserted += 1;
            } else {
                // a native quote already holds the (property, date, scraped_at) slot
                plan.skipped.price_observations += 1;
            }
        }
        for entry in &plan.history {
            sync_queries::insert_history_row(&mut tx, entry).await?;
        }
        tx.commit().await?;

        let report = SyncReport {
            hotel_id: source_hotel_id,
            deleted,
            inserted: TableCounts {
                search_jobs: plan.jobs.len() as u64,
                price_observations: observations_inserted,
                price_history: plan.history.len() as u64,
            },
            skipped: plan.skipped,
            unmapped,
        };

        info!(
            hotel_id = source_hotel_id,
            dest_hotel_id,
            inserted = report.inserted.total(),
            skipped = report.skipped.total(),
            deleted = report.deleted.total(),
            unmapped = report.unmapped.len(),
            "Hotel sync finished"
        );

        Ok(report)
    }
}
