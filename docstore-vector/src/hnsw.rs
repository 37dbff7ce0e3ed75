//! HNSW: multi-layer proximity graph, greedy descent from the top layer
//! down to an `ef`-bounded best-first search at the bottom.
//!
//! Layer assignment is geometric: `L = floor(-ln(U) * mL)` with
//! `mL = 1 / ln(M)`, the standard Malkov/Yashunin distribution — a node's
//! expected layer count is proportional to `1/ln(M)`, so raising `M`
//! flattens the graph.

use std::collections::{HashMap, HashSet};

use petgraph::graphmap::UnGraphMap;
use rand::Rng;

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;
use docstore_core::schema::{DistanceMetric, TableSchema};
use docstore_storage::queries::{hnsw_store, vector_store};
use docstore_storage::StorageEngine;

use crate::distance;

fn sim(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    distance::score(metric, a, b)
}

fn sample_layer(m_l: f64, rng: &mut impl Rng) -> usize {
    let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    (-u.ln() * m_l).floor().max(0.0) as usize
}

fn greedy_closest(
    graph: &UnGraphMap<RecordId, ()>,
    embeddings: &HashMap<RecordId, Vec<f32>>,
    start: RecordId,
    query: &[f32],
    metric: DistanceMetric,
) -> RecordId {
    let mut current = start;
    let mut current_score = sim(metric, &embeddings[&current], query);
    loop {
        let mut improved = false;
        for neighbor in graph.neighbors(current) {
            let s = sim(metric, &embeddings[&neighbor], query);
            if s > current_score {
                current_score = s;
                current = neighbor;
                improved = true;
            }
        }
        if !improved {
            break;
        }
    }
    current
}

fn search_layer(
    graph: &UnGraphMap<RecordId, ()>,
    embeddings: &HashMap<RecordId, Vec<f32>>,
    entry: RecordId,
    query: &[f32],
    ef: usize,
    metric: DistanceMetric,
) -> Vec<(RecordId, f64)> {
    let mut visited = HashSet::new();
    visited.insert(entry);
    let mut result = vec![(entry, sim(metric, &embeddings[&entry], query))];
    let mut frontier = vec![entry];

    while let Some(current) = frontier.pop() {
        for neighbor in graph.neighbors(current) {
            if visited.insert(neighbor) {
                let s = sim(metric, &embeddings[&neighbor], query);
                result.push((neighbor, s));
                frontier.push(neighbor);
            }
        }
        if result.len() >= ef.max(1) * 4 {
            break;
        }
    }

    result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    result.truncate(ef.max(1));
    result
}

fn prune(graph: &mut UnGraphMap<RecordId, ()>, node: RecordId, embeddings: &HashMap<RecordId, Vec<f32>>, m: usize, metric: DistanceMetric) {
    let neighbors: Vec<RecordId> = graph.neighbors(node).collect();
    if neighbors.len() <= m {
        return;
    }
    let node_embedding = &embeddings[&node];
    let mut scored: Vec<(RecordId, f64)> = neighbors
        .iter()
        .map(|&n| (n, sim(metric, node_embedding, &embeddings[&n])))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let keep: HashSet<RecordId> = scored.into_iter().take(m).map(|(id, _)| id).collect();
    for n in neighbors {
        if !keep.contains(&n) {
            graph.remove_edge(node, n);
        }
    }
}

pub fn build(engine: &StorageEngine, schema: &TableSchema, m: usize, ef_construction: usize) -> DocstoreResult<()> {
    let rows = engine.with_reader(|conn| vector_store::scan_all(conn, schema))?;
    engine.with_writer(|conn| hnsw_store::clear(conn, schema))?;
    if rows.is_empty() {
        return Ok(());
    }

    let metric = schema.vector.as_ref().map(|v| v.metric).unwrap_or_default();
    let m = m.max(2);
    let m_l = 1.0 / (m as f64).ln();

    let embeddings: HashMap<RecordId, Vec<f32>> = rows.iter().cloned().collect();
    let mut rng = rand::thread_rng();
    let mut layers: Vec<UnGraphMap<RecordId, ()>> = Vec::new();
    let mut node_layer: HashMap<RecordId, usize> = HashMap::new();
    let mut entry_point: Option<RecordId> = None;

    for (id, embedding) in &rows {
        let layer = sample_layer(m_l, &mut rng);
        node_layer.insert(*id, layer);
        while layers.len() <= layer {
            layers.push(UnGraphMap::new());
        }
        for layer_graph in layers.iter_mut().take(layer + 1) {
            layer_graph.add_node(*id);
        }

        let Some(ep) = entry_point else {
            entry_point = Some(*id);
            continue;
        };
        let ep_layer = node_layer[&ep];
        let mut cur = ep;

        for lc in (layer + 1..=ep_layer).rev() {
            cur = greedy_closest(&layers[lc], &embeddings, cur, embedding, metric);
        }

        for lc in (0..=layer.min(ep_layer)).rev() {
            let candidates = search_layer(&layers[lc], &embeddings, cur, embedding, ef_construction, metric);
            for (neighbor, _) in candidates.iter().take(m) {
                layers[lc].add_edge(*id, *neighbor, ());
                prune(&mut layers[lc], *neighbor, &embeddings, m, metric);
            }
            prune(&mut layers[lc], *id, &embeddings, m, metric);
            if let Some((best, _)) = candidates.first() {
                cur = *best;
            }
        }

        if layer > ep_layer {
            entry_point = Some(*id);
        }
    }

    engine.with_writer(|conn| {
        for (id, layer) in &node_layer {
            hnsw_store::write_node(conn, schema, *id, *layer as i64)?;
        }
        for (lc, graph) in layers.iter().enumerate() {
            for (a, b, ()) in graph.all_edges() {
                hnsw_store::write_edge(conn, schema, a, lc as i64, b)?;
                hnsw_store::write_edge(conn, schema, b, lc as i64, a)?;
            }
        }
        Ok(())
    })
}

fn db_greedy_closest(
    engine: &StorageEngine,
    schema: &TableSchema,
    embeddings: &HashMap<RecordId, Vec<f32>>,
    start: RecordId,
    query: &[f32],
    layer: i64,
    metric: DistanceMetric,
) -> DocstoreResult<RecordId> {
    let mut current = start;
    let mut current_score = sim(metric, &embeddings[&current], query);
    loop {
        let neighbors = engine.with_reader(|conn| hnsw_store::neighbors(conn, schema, current, layer))?;
        let mut improved = false;
        for neighbor in neighbors {
            let Some(embedding) = embeddings.get(&neighbor) else { continue };
            let s = sim(metric, embedding, query);
            if s > current_score {
                current_score = s;
                current = neighbor;
                improved = true;
            }
        }
        if !improved {
            return Ok(current);
        }
    }
}

fn db_search_layer(
    engine: &StorageEngine,
    schema: &TableSchema,
    embeddings: &HashMap<RecordId, Vec<f32>>,
    entry: RecordId,
    query: &[f32],
    ef: usize,
    layer: i64,
    metric: DistanceMetric,
) -> DocstoreResult<Vec<(RecordId, f64)>> {
    let mut visited = HashSet::new();
    visited.insert(entry);
    let mut result = vec![(entry, sim(metric, &embeddings[&entry], query))];
    let mut frontier = vec![entry];

    while let Some(current) = frontier.pop() {
        let neighbors = engine.with_reader(|conn| hnsw_store::neighbors(conn, schema, current, layer))?;
        for neighbor in neighbors {
            if visited.insert(neighbor) {
                let Some(embedding) = embeddings.get(&neighbor) else { continue };
                result.push((neighbor, sim(metric, embedding, query)));
                frontier.push(neighbor);
            }
        }
        if result.len() >= ef.max(1) * 4 {
            break;
        }
    }

    result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    result.truncate(ef.max(1));
    Ok(result)
}

pub fn search(
    engine: &StorageEngine,
    schema: &TableSchema,
    query: &[f32],
    k: usize,
    ef_search: usize,
) -> DocstoreResult<Vec<(RecordId, f64)>> {
    let metric = schema.vector.as_ref().map(|v| v.metric).unwrap_or_default();
    let entry = engine.with_reader(|conn| hnsw_store::entry_point(conn, schema))?;
    let Some((entry_id, entry_layer)) = entry else {
        return crate::exact::search(engine, schema, query, k);
    };

    let rows = engine.with_reader(|conn| vector_store::scan_all(conn, schema))?;
    let embeddings: HashMap<RecordId, Vec<f32>> = rows.into_iter().collect();

    let mut cur = entry_id;
    for lc in (1..=entry_layer).rev() {
        cur = db_greedy_closest(engine, schema, &embeddings, cur, query, lc, metric)?;
    }

    let mut candidates = db_search_layer(engine, schema, &embeddings, cur, query, ef_search, 0, metric)?;
    candidates.truncate(k);
    Ok(candidates)
}
