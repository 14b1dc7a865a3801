//! Many-objective ranking: preference sorting, non-domination fronts, and
//! crowding distance (§4.8 `rank by preference + non-domination`, `assign
//! crowding distance within each front`, `select`).

use indexmap::{IndexMap, IndexSet};

use crate::domain::test_case::TestCaseId;
use crate::domain::target::TargetId;

/// One individual's objective vector: its distance against every goal
/// that was `current` this generation.
pub type ObjectiveVector = IndexMap<TargetId, f64>;

/// The preference front: for each objective, the individual(s) achieving
/// the minimum distance for that objective. An individual need only be
/// best on one objective to join this front.
pub fn preference_front(
    objectives: &IndexSet<TargetId>,
    population: &IndexMap<TestCaseId, ObjectiveVector>,
) -> IndexSet<TestCaseId> {
    let mut front = IndexSet::new();
    for objective in objectives {
        let mut best: Option<(TestCaseId, f64)> = None;
        for (id, values) in population {
            let Some(&value) = values.get(objective) else { continue };
            match best {
                None => best = Some((*id, value)),
                Some((_, best_value)) if value < best_value => best = Some((*id, value)),
                _ => {}
            }
        }
        if let Some((winners_objective, best_value)) = best {
            // Include every individual tied for the minimum, not just the
            // first one found, so ties don't arbitrarily exclude equally
            // good candidates from the preference front.
            for (id, values) in population {
                if values.get(objective).copied() == Some(best_value) {
                    front.insert(*id);
                }
            }
            let _ = winners_objective;
        }
    }
    front
}

fn dominates(a: &ObjectiveVector, b: &ObjectiveVector, objectives: &IndexSet<TargetId>) -> bool {
    let mut strictly_better_somewhere = false;
    for objective in objectives {
        let av = a.get(objective).copied().unwrap_or(f64::INFINITY);
        let bv = b.get(objective).copied().unwrap_or(f64::INFINITY);
        if av > bv {
            return false;
        }
        if av < bv {
            strictly_better_somewhere = true;
        }
    }
    strictly_better_somewhere
}

/// Fast non-dominated sort (Deb et al.) over `ids`, restricted to
/// `objectives`. Returns fronts in dominance order, front 0 first.
pub fn fast_non_dominated_sort(
    objectives: &IndexSet<TargetId>,
    population: &IndexMap<TestCaseId, ObjectiveVector>,
    ids: &IndexSet<TestCaseId>,
) -> Vec<Vec<TestCaseId>> {
    let ids: Vec<TestCaseId> = ids.iter().copied().collect();
    let mut dominated_by: IndexMap<TestCaseId, Vec<TestCaseId>> = IndexMap::new();
    let mut domination_count: IndexMap<TestCaseId, usize> = IndexMap::new();
    let empty = ObjectiveVector::new();

    for &p in &ids {
        dominated_by.insert(p, Vec::new());
        domination_count.insert(p, 0);
    }

    for &p in &ids {
        for &q in &ids {
            if p == q {
                continue;
            }
            let pv = population.get(&p).unwrap_or(&empty);
            let qv = population.get(&q).unwrap_or(&empty);
            if dominates(pv, qv, objectives) {
                dominated_by.get_mut(&p).unwrap().push(q);
            } else if dominates(qv, pv, objectives) {
                *domination_count.get_mut(&p).unwrap() += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current_front: Vec<TestCaseId> =
        ids.iter().copied().filter(|id| domination_count[id] == 0).collect();

    while !current_front.is_empty() {
        let mut next_front = Vec::new();
        for &p in &current_front {
            for &q in &dominated_by[&p] {
                let count = domination_count.get_mut(&q).unwrap();
                *count -= 1;
                if *count == 0 {
                    next_front.push(q);
                }
            }
        }
        fronts.push(std::mem::take(&mut current_front));
        current_front = next_front;
    }

    fronts
}

/// Crowding distance within one front, restricted to `objectives`.
/// Boundary individuals (min/max per objective) get `f64::INFINITY`.
pub fn crowding_distance(
    objectives: &IndexSet<TargetId>,
    front: &[TestCaseId],
    population: &IndexMap<TestCaseId, ObjectiveVector>,
) -> IndexMap<TestCaseId, f64> {
    let mut distance: IndexMap<TestCaseId, f64> = front.iter().map(|id| (*id, 0.0)).collect();
    if front.len() <= 2 {
        for id in front {
            distance.insert(*id, f64::INFINITY);
        }
        return distance;
    }

    let empty = ObjectiveVector::new();
    for objective in objectives {
        let mut sorted: Vec<TestCaseId> = front.to_vec();
        sorted.sort_by(|a, b| {
            let av = population.get(a).unwrap_or(&empty).get(objective).copied().unwrap_or(f64::INFINITY);
            let bv = population.get(b).unwrap_or(&empty).get(objective).copied().unwrap_or(f64::INFINITY);
            av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal)
        });

        let min = population.get(&sorted[0]).unwrap_or(&empty).get(objective).copied().unwrap_or(0.0);
        let max = population
            .get(&sorted[sorted.len() - 1])
            .unwrap_or(&empty)
            .get(objective)
            .copied()
            .unwrap_or(0.0);
        let span = max - min;

        distance.insert(sorted[0], f64::INFINITY);
        distance.insert(sorted[sorted.len() - 1], f64::INFINITY);

        if span <= 0.0 {
            continue;
        }
        for window in sorted.windows(3) {
            let (prev, mid, next) = (window[0], window[1], window[2]);
            let prev_v = population.get(&prev).unwrap_or(&empty).get(objective).copied().unwrap_or(0.0);
            let next_v = population.get(&next).unwrap_or(&empty).get(objective).copied().unwrap_or(0.0);
            if let Some(d) = distance.get_mut(&mid) {
                if d.is_finite() {
                    *d += (next_v - prev_v) / span;
                }
            }
        }
    }

    distance
}

/// Selects up to `population_size` ids from `combined` (parents ∪
/// offspring): full fronts while capacity allows, then the highest
/// crowding-distance members of the first front that doesn't fully fit
/// (§4.8 `select`).
pub fn rank_and_select(
    objectives: &IndexSet<TargetId>,
    population: &IndexMap<TestCaseId, ObjectiveVector>,
    combined: &IndexSet<TestCaseId>,
    population_size: usize,
) -> Vec<TestCaseId> {
    let mut selected = Vec::new();
    let mut remaining: IndexSet<TestCaseId> = combined.clone();

    let preferred = preference_front(objectives, population);
    let preferred: Vec<TestCaseId> = preferred.into_iter().filter(|id| remaining.contains(id)).collect();

    if preferred.len() <= population_size {
        selected.extend(preferred.iter().copied());
        for id in &preferred {
            remaining.shift_remove(id);
        }
    } else {
        let distances = crowding_distance(objectives, &preferred, population);
        let mut ranked = preferred;
        ranked.sort_by(|a, b| {
            distances[b].partial_cmp(&distances[a]).unwrap_or(std::cmp::Ordering::Equal)
        });
        selected.extend(ranked.into_iter().take(population_size));
        for id in &selected {
            remaining.shift_remove(id);
        }
        return selected;
    }

    let fronts = fast_non_dominated_sort(objectives, population, &remaining);
    for front in fronts {
        if selected.len() >= population_size {
            break;
        }
        let room = population_size - selected.len();
        if front.len() <= room {
            selected.extend(front);
        } else {
            let distances = crowding_distance(objectives, &front, population);
            let mut ranked = front;
            ranked.sort_by(|a, b| {
                distances[b].partial_cmp(&distances[a]).unwrap_or(std::cmp::Ordering::Equal)
            });
            selected.extend(ranked.into_iter().take(room));
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objectives(ids: &[u64]) -> IndexSet<TargetId> {
        ids.iter().map(|i| TargetId(*i)).collect()
    }

    fn vector(pairs: &[(u64, f64)]) -> ObjectiveVector {
        pairs.iter().map(|(id, v)| (TargetId(*id), *v)).collect()
    }

    #[test]
    fn preference_front_includes_best_per_objective() {
        let objs = objectives(&[1, 2]);
        let mut pop = IndexMap::new();
        pop.insert(TestCaseId(1), vector(&[(1, 0.0), (2, 5.0)]));
        pop.insert(TestCaseId(2), vector(&[(1, 3.0), (2, 0.0)]));
        pop.insert(TestCaseId(3), vector(&[(1, 2.0), (2, 2.0)]));

        let front = preference_front(&objs, &pop);
        assert!(front.contains(&TestCaseId(1)));
        assert!(front.contains(&TestCaseId(2)));
        assert!(!front.contains(&TestCaseId(3)));
    }

    #[test]
    fn dominated_individual_lands_in_a_later_front() {
        let objs = objectives(&[1, 2]);
        let mut pop = IndexMap::new();
        pop.insert(TestCaseId(1), vector(&[(1, 0.0), (2, 0.0)]));
        pop.insert(TestCaseId(2), vector(&[(1, 1.0), (2, 1.0)]));
        let ids: IndexSet<TestCaseId> = [TestCaseId(1), TestCaseId(2)].into_iter().collect();

        let fronts = fast_non_dominated_sort(&objs, &pop, &ids);
        assert_eq!(fronts[0], vec![TestCaseId(1)]);
        assert_eq!(fronts[1], vec![TestCaseId(2)]);
    }

    #[test]
    fn boundary_individuals_get_infinite_crowding_distance() {
        let objs = objectives(&[1]);
        let mut pop = IndexMap::new();
        pop.insert(TestCaseId(1), vector(&[(1, 0.0)]));
        pop.insert(TestCaseId(2), vector(&[(1, 5.0)]));
        pop.insert(TestCaseId(3), vector(&[(1, 10.0)]));

        let front = vec![TestCaseId(1), TestCaseId(2), TestCaseId(3)];
        let distances = crowding_distance(&objs, &front, &pop);
        assert_eq!(distances[&TestCaseId(1)], f64::INFINITY);
        assert_eq!(distances[&TestCaseId(3)], f64::INFINITY);
        assert!(distances[&TestCaseId(2)].is_finite());
    }

    #[test]
    fn rank_and_select_trims_to_population_size() {
        let objs = objectives(&[1]);
        let mut pop = IndexMap::new();
        for i in 1..=5u64 {
            pop.insert(TestCaseId(i), vector(&[(1, i as f64)]));
        }
        let combined: IndexSet<TestCaseId> = (1..=5).map(TestCaseId).collect();

        let selected = rank_and_select(&objs, &pop, &combined, 3);
        assert_eq!(selected.len(), 3);
    }
}
