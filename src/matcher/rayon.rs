//! Rayon-parallel nearest-neighbour search (feature-gated).
//!
//! Each query descriptor is independent, so queries are distributed across
//! threads and collected back in query order.

use crate::features::Descriptors;
use crate::matcher::knn::two_nearest;
use crate::matcher::{judge, MatchConfig, QueryOutcome};
use rayon::prelude::*;

pub(crate) fn query_outcomes_par(
    query: &Descriptors,
    train: &Descriptors,
    cfg: &MatchConfig,
) -> Vec<QueryOutcome> {
    query
        .as_slice()
        .par_chunks_exact(query.dim())
        .enumerate()
        .map(|(idx, q)| judge(idx, two_nearest(q, train, cfg.metric), cfg.ratio_threshold))
        .collect()
}
