//! IVF: partition embeddings into k-means clusters, probe the nearest few
//! at query time. Centroids are the authoritative cluster
//! representative after the final k-means iteration — a fresh `build` is
//! required to reflect new rows, there is no incremental update.

use rand::seq::SliceRandom;

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;
use docstore_core::schema::TableSchema;
use docstore_storage::queries::{ivf_store, vector_store};
use docstore_storage::StorageEngine;

use crate::distance;

const MAX_ITERATIONS: usize = 25;

fn cluster_count(configured: usize, n: usize) -> usize {
    let k = if configured > 0 {
        configured
    } else {
        (n as f64).sqrt().round().max(1.0) as usize
    };
    k.min(n).max(1)
}

pub fn build(engine: &StorageEngine, schema: &TableSchema, configured_clusters: usize) -> DocstoreResult<()> {
    let rows = engine.with_reader(|conn| vector_store::scan_all(conn, schema))?;
    if rows.is_empty() {
        return engine.with_writer(|conn| ivf_store::clear(conn, schema));
    }

    let dim = rows[0].1.len();
    let k = cluster_count(configured_clusters, rows.len());

    let mut rng = rand::thread_rng();
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<Vec<f32>> = indices.iter().take(k).map(|&i| rows[i].1.clone()).collect();

    let mut assignments = vec![0usize; rows.len()];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, (_, embedding)) in rows.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (c_idx, centroid) in centroids.iter().enumerate() {
                let d = distance::euclidean(embedding, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c_idx;
                }
            }
            if assignments[i] != best {
                changed = true;
                assignments[i] = best;
            }
        }

        let mut sums = vec![vec![0.0_f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, (_, embedding)) in rows.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for (d, val) in embedding.iter().enumerate() {
                sums[c][d] += *val as f64;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for d in 0..dim {
                centroids[c][d] = (sums[c][d] / counts[c] as f64) as f32;
            }
        }

        if !changed {
            break;
        }
    }

    engine.with_writer(|conn| {
        ivf_store::clear(conn, schema)?;
        for (i, (record_id, _)) in rows.iter().enumerate() {
            let cluster = assignments[i];
            ivf_store::write_member(conn, schema, cluster as i64, &centroids[cluster], *record_id)?;
        }
        Ok(())
    })
}

pub fn search(
    engine: &StorageEngine,
    schema: &TableSchema,
    query: &[f32],
    k: usize,
    probes: usize,
) -> DocstoreResult<Vec<(RecordId, f64)>> {
    let metric = schema.vector.as_ref().map(|v| v.metric).unwrap_or_default();
    let centroids = engine.with_reader(|conn| ivf_store::centroids(conn, schema))?;
    if centroids.is_empty() {
        return crate::exact::search(engine, schema, query, k);
    }

    let mut ranked_clusters: Vec<(i64, f64)> = centroids
        .iter()
        .map(|(id, centroid)| (*id, distance::score(metric, query, centroid)))
        .collect();
    ranked_clusters.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let probe_n = probes.max(1).min(ranked_clusters.len());
    let mut candidates: Vec<RecordId> = Vec::new();
    for (cluster_id, _) in ranked_clusters.iter().take(probe_n) {
        let members = engine.with_reader(|conn| ivf_store::cluster_members(conn, schema, *cluster_id))?;
        candidates.extend(members);
    }

    let mut scored = Vec::new();
    for id in candidates {
        if let Some(embedding) = engine.with_reader(|conn| vector_store::read(conn, schema, id))? {
            scored.push((id, distance::score(metric, query, &embedding)));
        }
    }
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.dedup_by_key(|(id, _)| *id);
    scored.truncate(k);
    Ok(scored)
}
