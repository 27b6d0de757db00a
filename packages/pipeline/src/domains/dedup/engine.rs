//! Batch clustering of unchecked listings into candidate duplicate groups.
//!
//! Each pass claims a slice of the never-checked backlog, pulls every
//! ungrouped listing from the same cities as comparison partners, scores
//! pairs, and connects pairs above the threshold into clusters. A pair is
//! only scored when at least one side belongs to the claimed batch, so
//! already-checked listings cannot re-pair among themselves; they rejoin a
//! cluster only when a new arrival bridges them.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::{debug, info};

use crate::common::utils::normalize_text;
use crate::common::ListingId;
use crate::domains::dedup::commands::DedupBatchCommand;
use crate::domains::dedup::models::ListingGroup;
use crate::domains::dedup::scoring::{PairScorer, WeightedScorer};
use crate::domains::listings::models::Listing;
use crate::kernel::PipelineDeps;

/// A connected component of matching pairs, ready to persist.
#[derive(Debug)]
struct Cluster {
    member_ids: Vec<ListingId>,
    primary_id: ListingId,
    /// Mean score of the component's matching edges.
    score: f64,
    city: Option<String>,
}

/// Job handler for [`DedupBatchCommand`].
pub async fn run_dedup_batch(_cmd: DedupBatchCommand, deps: &PipelineDeps) -> Result<()> {
    let claimed = Listing::claim_dedup_batch(deps.config.dedup_batch_size, &deps.db_pool).await?;
    if claimed.is_empty() {
        debug!("no listings awaiting dedup");
        return Ok(());
    }

    let mut cities: Vec<String> = claimed
        .iter()
        .filter_map(|l| l.city.as_ref())
        .map(|c| c.trim().to_lowercase())
        .collect();
    cities.sort();
    cities.dedup();
    let include_missing_city = claimed.iter().any(|l| l.city.is_none());

    let partners = Listing::find_dedup_pool(&cities, include_missing_city, &deps.db_pool).await?;

    let claimed_ids: HashSet<ListingId> = claimed.iter().map(|l| l.id).collect();
    let mut listings = claimed;
    listings.extend(
        partners
            .into_iter()
            .filter(|l| !claimed_ids.contains(&l.id)),
    );

    let scorer = WeightedScorer::default();
    let clusters = build_clusters(
        &listings,
        &claimed_ids,
        &scorer,
        deps.config.dedup_score_threshold,
    );

    let mut grouped: HashSet<ListingId> = HashSet::new();
    let mut groups_created = 0usize;
    for cluster in &clusters {
        if persist_cluster(cluster, deps).await? {
            groups_created += 1;
            grouped.extend(cluster.member_ids.iter().copied());
        } else {
            debug!(
                members = cluster.member_ids.len(),
                "cluster member consumed concurrently, deferring"
            );
        }
    }

    let unmatched: Vec<ListingId> = claimed_ids
        .iter()
        .filter(|id| !grouped.contains(id))
        .copied()
        .collect();
    let released = if unmatched.is_empty() {
        0
    } else {
        Listing::mark_dedup_checked(&unmatched, &deps.db_pool).await?
    };

    info!(
        batch = claimed_ids.len(),
        pool = listings.len(),
        groups = groups_created,
        grouped = grouped.len(),
        released,
        "dedup pass finished"
    );
    Ok(())
}

/// Score pairs and connect matches into clusters. Pure so the policy can be
/// exercised without a database.
fn build_clusters(
    listings: &[Listing],
    claimed: &HashSet<ListingId>,
    scorer: &dyn PairScorer,
    threshold: f64,
) -> Vec<Cluster> {
    // Bucket by normalized city. Listings without a city share one bucket;
    // cross-city pairs are never scored.
    let mut buckets: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    for (idx, listing) in listings.iter().enumerate() {
        let key = listing.city.as_ref().map(|c| normalize_text(c));
        buckets.entry(key).or_default().push(idx);
    }

    let mut uf = UnionFind::new(listings.len());
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();
    for bucket in buckets.values() {
        for (pos, &i) in bucket.iter().enumerate() {
            for &j in &bucket[pos + 1..] {
                let (a, b) = (&listings[i], &listings[j]);
                if !claimed.contains(&a.id) && !claimed.contains(&b.id) {
                    continue;
                }
                let score = scorer.score(a, b);
                if score >= threshold {
                    edges.push((i, j, score));
                    uf.union(i, j);
                }
            }
        }
    }

    // Mean edge score per component.
    let mut edge_sums: HashMap<usize, (f64, usize)> = HashMap::new();
    for &(a, _, score) in &edges {
        let root = uf.find(a);
        let entry = edge_sums.entry(root).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;
    }

    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..listings.len() {
        let root = uf.find(idx);
        if edge_sums.contains_key(&root) {
            members.entry(root).or_default().push(idx);
        }
    }

    let mut clusters: Vec<Cluster> = members
        .into_iter()
        .filter(|(_, idxs)| idxs.len() >= 2)
        .filter_map(|(root, idxs)| {
            let (sum, count) = edge_sums[&root];
            let member_refs: Vec<&Listing> = idxs.iter().map(|&i| &listings[i]).collect();
            let primary = pick_primary(&member_refs)?;
            Some(Cluster {
                member_ids: idxs.iter().map(|&i| listings[i].id).collect(),
                primary_id: primary.id,
                score: sum / count as f64,
                city: primary.city.clone(),
            })
        })
        .collect();
    // Highest-confidence clusters first
    clusters.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    clusters
}

/// Most complete member wins; age breaks ties (older first). Also used by
/// the review workflow when the primary is removed from a group.
pub(crate) fn pick_primary<'a>(members: &[&'a Listing]) -> Option<&'a Listing> {
    let mut iter = members.iter();
    let mut best = *iter.next()?;
    for &candidate in iter {
        let candidate_key = (candidate.completeness(), std::cmp::Reverse(candidate.created_at));
        let best_key = (best.completeness(), std::cmp::Reverse(best.created_at));
        if candidate_key > best_key {
            best = candidate;
        }
    }
    Some(best)
}

/// Create the group and attach members, re-validating membership under lock.
/// Returns false when a member was consumed since scoring.
async fn persist_cluster(cluster: &Cluster, deps: &PipelineDeps) -> Result<bool> {
    let mut tx = deps.db_pool.begin().await?;

    let free = Listing::lock_for_grouping(&mut tx, &cluster.member_ids).await?;
    if free.len() < cluster.member_ids.len() {
        tx.rollback().await?;
        return Ok(false);
    }

    let group = ListingGroup::create(&mut tx, cluster.score, cluster.city.as_deref()).await?;
    for &id in &cluster.member_ids {
        Listing::set_group(&mut tx, id, group.id, id == cluster.primary_id).await?;
    }
    tx.commit().await?;

    info!(
        group_id = %group.id,
        members = cluster.member_ids.len(),
        score = format!("{:.3}", cluster.score),
        "listing group created"
    );
    Ok(true)
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            self.parent[root_a] = root_b;
        }
    }
}
