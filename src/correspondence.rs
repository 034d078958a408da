// Slot correspondence between consecutive shapes.
// Greedy nearest-neighbour in percent-space, processed in slot order, with optional
// region reservations for known shape pairs. Pure and deterministic.

use crate::types::{Dot, RegionReservation, Shape};

/// Which shapes a transition goes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionHint<'a> {
    pub from_id: &'a str,
    pub to_id: &'a str,
}

/// Extend `dots` with centred ghosts up to `count`.
pub fn pad_with_ghosts(dots: &[Dot], count: usize) -> Vec<Dot> {
    let mut padded = dots.to_vec();
    if padded.len() < count {
        padded.resize(count, Dot::ghost());
    }
    padded
}

/// Assign every slot of `previous` a dot of `target`, producing exactly `master_count` dots.
///
/// Reservations whose patterns match `hint` run first, each pairing a cohort of
/// previous slots with target dots inside its region. The generic pass then walks
/// the remaining slots in index order and takes the closest unused target dot.
/// Slots left over once targets run out become ghosts.
pub fn map_dots(
    previous: &[Dot],
    target: &Shape,
    master_count: usize,
    hint: TransitionHint<'_>,
    reservations: &[RegionReservation],
) -> Vec<Dot> {
    let prev = pad_with_ghosts(previous, master_count);
    let next = pad_with_ghosts(&target.dots, master_count);

    let mut used = vec![false; next.len()];
    let mut result: Vec<Option<Dot>> = vec![None; master_count];

    for rule in reservations.iter().filter(|r| r.applies(hint.from_id, hint.to_id)) {
        let cohort = cohort_slots(&prev[..master_count], rule, master_count);
        let candidates: Vec<usize> = (0..next.len())
            .filter(|&j| !used[j] && rule.region.contains(&next[j]))
            .collect();
        for i in cohort {
            if result[i].is_some() {
                continue;
            }
            if let Some(j) = nearest_unused(&prev[i], &next, candidates.iter().copied(), &used) {
                result[i] = Some(next[j]);
                used[j] = true;
            }
        }
    }

    for i in 0..master_count {
        if result[i].is_some() {
            continue;
        }
        let slot = match nearest_unused(&prev[i], &next, 0..next.len(), &used) {
            Some(j) => {
                used[j] = true;
                next[j]
            }
            None => Dot::ghost(),
        };
        result[i] = Some(slot);
    }

    result.into_iter().map(|d| d.unwrap_or_else(Dot::ghost)).collect()
}

/// Left-most previous slots left of the cohort bound, capped at the cohort size.
fn cohort_slots(prev: &[Dot], rule: &RegionReservation, master_count: usize) -> Vec<usize> {
    let mut slots: Vec<usize> = (0..prev.len())
        .filter(|&i| prev[i].x_percent < rule.cohort.max_x_percent)
        .collect();
    slots.sort_by(|&a, &b| prev[a].x_percent.total_cmp(&prev[b].x_percent));
    slots.truncate(rule.cohort.size(master_count));
    slots
}

/// First strictly-closest unused candidate; ties go to the earlier index.
fn nearest_unused(
    from: &Dot,
    next: &[Dot],
    candidates: impl Iterator<Item = usize>,
    used: &[bool],
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for j in candidates {
        if used[j] {
            continue;
        }
        let d2 = from.dist2(&next[j]);
        if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
            best = Some((j, d2));
        }
    }
    best.map(|(j, _)| j)
}
