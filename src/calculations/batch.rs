use crate::calendar::WorkingDayCalendar;
use crate::tree::TaskTree;
use rayon::prelude::*;

/// Resolve every node of every tree, one tree per worker.
///
/// Trees share nothing but the calendar, so they can run side by side.
/// Returns, per tree, how many nodes ended up with both dates.
pub fn resolve_trees<C>(trees: &mut [TaskTree], calendar: &C) -> Vec<usize>
where
    C: WorkingDayCalendar + Sync + ?Sized,
{
    trees
        .par_iter_mut()
        .map(|tree| tree.resolve_all(calendar))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WorkCalendar;
    use crate::tree::TaskNode;
    use chrono::NaiveDate;

    #[test]
    fn each_tree_is_resolved_independently() {
        let cal = WorkCalendar::weekends_only();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let mut trees: Vec<TaskTree> = (0..8)
            .map(|i| TaskTree::new(TaskNode::new(i, "t").with_start(monday).with_duration(i64::from(i))))
            .collect();
        trees.push(TaskTree::new(TaskNode::new(100, "undated")));

        let counts = resolve_trees(&mut trees, &cal);

        assert_eq!(counts.len(), 9);
        assert!(counts[..8].iter().all(|c| *c == 1));
        assert_eq!(counts[8], 0);
        let fifth = trees[5].root();
        assert_eq!(
            trees[5].node(fifth).calculated_end(),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }
}
