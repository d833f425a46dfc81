use crate::rows::GanttRow;
use chrono::NaiveDate;
use polars::prelude::PlSmallStr;
use polars::prelude::*;

const EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(date) => date,
    None => panic!("epoch out of range"),
};

fn date_to_i32(date: NaiveDate) -> i32 {
    (date - EPOCH).num_days() as i32
}

fn date_series(name: &'static str, dates: impl Iterator<Item = Option<NaiveDate>>) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = dates.map(|d| d.map(date_to_i32)).collect();
    Series::new(PlSmallStr::from_static(name), days).cast(&DataType::Date)
}

/// Gantt rows as a `DataFrame`, one row per task, dates as `Date` columns.
pub fn rows_to_dataframe(rows: &[GanttRow]) -> PolarsResult<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(11);

    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    columns.push(Series::new(PlSmallStr::from_static("id"), ids).into_column());

    let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
    columns.push(Series::new(PlSmallStr::from_static("title"), titles).into_column());

    let kinds: Vec<&str> = rows.iter().map(|r| r.kind.as_str()).collect();
    columns.push(Series::new(PlSmallStr::from_static("kind"), kinds).into_column());

    let depths: Vec<u32> = rows.iter().map(|r| r.depth as u32).collect();
    columns.push(Series::new(PlSmallStr::from_static("depth"), depths).into_column());

    columns.push(date_series("start", rows.iter().map(|r| r.start))?.into_column());
    columns.push(date_series("end", rows.iter().map(|r| r.end))?.into_column());

    let working_days: Vec<Option<i64>> = rows.iter().map(|r| r.working_days).collect();
    columns.push(Series::new(PlSmallStr::from_static("working_days"), working_days).into_column());

    let progress: Vec<Option<i32>> = rows.iter().map(|r| r.progress).collect();
    columns.push(Series::new(PlSmallStr::from_static("progress"), progress).into_column());

    let predecessors: Vec<Option<i32>> = rows.iter().map(|r| r.predecessor_id).collect();
    columns.push(Series::new(PlSmallStr::from_static("predecessor_id"), predecessors).into_column());

    let relations: Vec<Option<&str>> = rows
        .iter()
        .map(|r| r.relation_type.as_ref().map(|t| t.as_str()))
        .collect();
    columns.push(Series::new(PlSmallStr::from_static("relation_type"), relations).into_column());

    let external: Vec<bool> = rows.iter().map(|r| r.external_predecessor).collect();
    columns.push(
        Series::new(PlSmallStr::from_static("external_predecessor"), external).into_column(),
    );

    DataFrame::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{RelationType, TaskKind};

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dataframe_has_one_row_per_task_with_date_columns() {
        let rows = vec![
            GanttRow {
                id: 1,
                title: "Design".into(),
                kind: TaskKind::Activity,
                depth: 1,
                start: Some(d(2024, 1, 1)),
                end: Some(d(2024, 1, 5)),
                working_days: Some(5),
                progress: Some(40),
                predecessor_id: None,
                relation_type: None,
                external_predecessor: false,
            },
            GanttRow {
                id: 2,
                title: "Build".into(),
                kind: TaskKind::Milestone,
                depth: 1,
                start: None,
                end: None,
                working_days: None,
                progress: None,
                predecessor_id: Some(1),
                relation_type: Some(RelationType::FinishStart),
                external_predecessor: false,
            },
        ];

        let df = rows_to_dataframe(&rows).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 11);
        assert_eq!(df.column("start").unwrap().dtype(), &DataType::Date);

        let starts = df.column("start").unwrap().date().unwrap();
        assert_eq!(starts.get(0), Some(date_to_i32(d(2024, 1, 1))));
        assert_eq!(starts.get(1), None);

        let relation = df.column("relation_type").unwrap().str().unwrap();
        assert_eq!(relation.get(1), Some("FINISH_START"));
    }
}
