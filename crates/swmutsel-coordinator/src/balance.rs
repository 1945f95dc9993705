/// Longest-processing-time assignment: items sorted by descending cost, each
/// given to the currently lightest bin. Ties go to the lower bin index and
/// equal costs keep their input order, so the result is deterministic.
///
/// Returns the item indices of each bin, in ascending order.
pub fn assign_lpt(costs: &[usize], bins: usize) -> Vec<Vec<usize>> {
    let mut assignment = vec![Vec::new(); bins];
    if bins == 0 {
        return assignment;
    }
    let mut order: Vec<usize> = (0..costs.len()).collect();
    order.sort_by(|&a, &b| costs[b].cmp(&costs[a]).then(a.cmp(&b)));

    let mut load = vec![0usize; bins];
    for item in order {
        let lightest = (0..bins).min_by_key(|&b| (load[b], b)).unwrap_or(0);
        load[lightest] += costs[item];
        assignment[lightest].push(item);
    }
    for bin in &mut assignment {
        bin.sort_unstable();
    }
    assignment
}
