//! Grouped counts over the incident table.
//!
//! Every function here is pure: it reads the table and returns a fresh
//! result. Rows that cannot take part in a grouping (missing or malformed
//! date, null category) are excluded and counted, never silently dropped.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::error::AnalysisError;
use crate::models::{
    CategoryFrequency, CategoryRanking, Field, IncidentDate, IncidentTable, ShareBreakdown,
    YearCategoryShare, YearlyCount, YearlyCounts,
};

/// Count incidents per calendar year.
pub fn count_by_year(table: &IncidentTable) -> YearlyCounts {
    let mut by_year: BTreeMap<i32, usize> = BTreeMap::new();
    let mut missing_dates = 0;
    let mut malformed_dates = 0;

    for incident in &table.incidents {
        match incident.incident_date {
            Some(IncidentDate::Parsed(_)) => {
                if let Some(year) = incident.year() {
                    *by_year.entry(year).or_default() += 1;
                }
            }
            Some(IncidentDate::Malformed(_)) => malformed_dates += 1,
            None => missing_dates += 1,
        }
    }

    YearlyCounts {
        counts: by_year
            .into_iter()
            .map(|(year, count)| YearlyCount { year, count })
            .collect(),
        missing_dates,
        malformed_dates,
    }
}

/// Rank the values of `field` by frequency and keep the top `k`.
///
/// Nulls are excluded from the ranking but reported in
/// [`CategoryRanking::missing`]. Ties keep first-appearance order.
pub fn top_categories(
    table: &IncidentTable,
    field: &Field,
    k: usize,
) -> Result<CategoryRanking, AnalysisError> {
    let value = table.accessor(field);
    let mut tally = Tally::default();
    let mut missing = 0;

    for incident in &table.incidents {
        match value(incident) {
            Some(category) => tally.add(category),
            None => missing += 1,
        }
    }

    let non_null = table.len() - missing;
    if non_null == 0 {
        return Err(AnalysisError::insufficient(format!(
            "no non-null values in column '{}'",
            field
        )));
    }

    let ranked = tally.ranked();
    let distinct = ranked.len();

    let entries = ranked
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(idx, (category, count))| CategoryFrequency {
            category: category.to_string(),
            count,
            rank: idx + 1,
        })
        .collect();

    Ok(CategoryRanking {
        field: field.clone(),
        entries,
        non_null,
        missing,
        distinct,
    })
}

/// Share of each category among a year's incidents.
///
/// The denominator for a year is the number of incidents in that year
/// whose `field` is non-null; nulls are not part of any share. With an
/// empty `subset` every observed category is reported and each year's
/// shares sum to 1. Otherwise only the listed categories are reported,
/// in the order given.
pub fn share_by_year_and_category(
    table: &IncidentTable,
    field: &Field,
    subset: &[String],
) -> Result<ShareBreakdown, AnalysisError> {
    let value = table.accessor(field);
    let mut by_year: BTreeMap<i32, Tally> = BTreeMap::new();
    let mut undated = 0;
    let mut missing_field = 0;

    for incident in &table.incidents {
        let Some(year) = incident.year() else {
            undated += 1;
            continue;
        };
        match value(incident) {
            Some(category) => by_year.entry(year).or_default().add(category),
            None => missing_field += 1,
        }
    }

    if by_year.is_empty() {
        return Err(AnalysisError::insufficient(format!(
            "no dated rows with a value in column '{}'",
            field
        )));
    }

    let mut shares = Vec::new();
    for (year, tally) in by_year {
        let year_total = tally.total();
        if year_total == 0 {
            continue;
        }

        let rows: Vec<(&str, usize)> = if subset.is_empty() {
            tally.ranked()
        } else {
            subset
                .iter()
                .map(|category| (category.as_str(), tally.count(category)))
                .filter(|(_, count)| *count > 0)
                .collect()
        };

        shares.extend(rows.into_iter().map(|(category, count)| YearCategoryShare {
            year,
            category: category.to_string(),
            count,
            share: count as f64 / year_total as f64,
        }));
    }

    Ok(ShareBreakdown {
        field: field.clone(),
        subset: subset.to_vec(),
        shares,
        undated,
        missing_field,
    })
}

/// Null counts for each named field, keyed by column name.
pub fn missing_by_field(table: &IncidentTable, fields: &[Field]) -> BTreeMap<String, usize> {
    fields
        .iter()
        .map(|field| (field.to_string(), table.missing_count(field)))
        .collect()
}

/// Category counts that remember first-appearance order.
#[derive(Debug, Default)]
struct Tally<'a> {
    order: Vec<&'a str>,
    counts: HashMap<&'a str, usize>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, category: &'a str) {
        let count = self.counts.entry(category).or_insert_with(|| {
            self.order.push(category);
            0
        });
        *count += 1;
    }

    fn count(&self, category: &str) -> usize {
        self.counts.get(category).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Categories by descending count; the stable sort keeps ties in
    /// first-appearance order.
    fn ranked(&self) -> Vec<(&'a str, usize)> {
        let mut ranked: Vec<(&'a str, usize)> = self
            .order
            .iter()
            .map(|category| (*category, self.count(category)))
            .collect();
        ranked.sort_by_key(|(_, count)| Reverse(*count));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_incidents, LoadOptions};
    use crate::models::Incident;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn row(date: Option<&str>, bias: Option<&str>, location: Option<&str>) -> Incident {
        Incident {
            incident_date: date.map(|d| match NaiveDate::parse_from_str(d, "%Y-%m-%d") {
                Ok(parsed) => IncidentDate::Parsed(parsed),
                Err(_) => IncidentDate::Malformed(d.to_string()),
            }),
            bias_desc: bias.map(String::from),
            location_name: location.map(String::from),
            extra: Vec::new(),
        }
    }

    fn table(rows: Vec<Incident>) -> IncidentTable {
        IncidentTable::new(PathBuf::from("test.csv"), Vec::new(), rows)
    }

    fn fixture() -> IncidentTable {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_incidents.csv");
        load_incidents(&path, &LoadOptions::default()).unwrap()
    }

    #[test]
    fn test_count_by_year_partitions_rows() {
        let table = fixture();
        let yearly = count_by_year(&table);

        assert_eq!(yearly.missing_dates, 2);
        assert_eq!(yearly.malformed_dates, 1);
        assert_eq!(yearly.total(), table.len() - yearly.excluded());

        let counts: Vec<(i32, usize)> = yearly.counts.iter().map(|c| (c.year, c.count)).collect();
        assert_eq!(
            counts,
            vec![(1991, 4), (1992, 3), (1993, 5), (1994, 4), (1995, 5)]
        );
    }

    #[test]
    fn test_count_by_year_one_entry_per_year() {
        let table = table(vec![
            row(Some("2001-01-01"), None, None),
            row(Some("1999-06-01"), None, None),
            row(Some("2001-12-31"), None, None),
            row(Some("bogus"), None, None),
        ]);
        let yearly = count_by_year(&table);

        assert_eq!(
            yearly.counts,
            vec![
                YearlyCount { year: 1999, count: 1 },
                YearlyCount { year: 2001, count: 2 },
            ]
        );
        assert_eq!(yearly.malformed_dates, 1);
        assert_eq!(yearly.gaps(), vec![2000]);
    }

    #[test]
    fn test_top_categories_ranking() {
        let table = fixture();
        let ranking = top_categories(&table, &Field::Bias, 5).unwrap();

        assert_eq!(ranking.missing, 1);
        assert_eq!(ranking.non_null, 23);
        assert_eq!(ranking.distinct, 7);
        assert_eq!(ranking.entries.len(), 5);

        let names: Vec<&str> = ranking.entries.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Anti-Black or African American",
                "Anti-Jewish",
                "Anti-Gay (Male)",
                // Tied at 2; Anti-White appears first in the file
                "Anti-White",
                "Anti-Hispanic or Latino",
            ]
        );
        assert_eq!(ranking.entries[0].count, 9);
        assert_eq!(ranking.entries[0].rank, 1);
        assert_eq!(ranking.entries[4].rank, 5);
    }

    #[test]
    fn test_top_categories_sorted_and_bounded() {
        let table = fixture();
        for k in 0..10 {
            let ranking = top_categories(&table, &Field::Location, k).unwrap();
            assert!(ranking.entries.len() <= k);
            assert!(ranking
                .entries
                .windows(2)
                .all(|pair| pair[0].count >= pair[1].count));
        }
    }

    #[test]
    fn test_top_categories_tie_break_is_first_appearance() {
        let table = table(vec![
            row(None, Some("B"), None),
            row(None, Some("A"), None),
            row(None, Some("A"), None),
            row(None, Some("B"), None),
            row(None, Some("C"), None),
        ]);
        let ranking = top_categories(&table, &Field::Bias, 3).unwrap();
        let names: Vec<&str> = ranking.entries.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_top_categories_all_null_is_insufficient() {
        let table = table(vec![row(None, None, None), row(None, None, None)]);
        let err = top_categories(&table, &Field::Bias, 3).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));

        let err = top_categories(&table, &Field::Column("nope".into()), 3).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[test]
    fn test_shares_sum_to_one_per_year() {
        let table = fixture();
        let breakdown = share_by_year_and_category(&table, &Field::Bias, &[]).unwrap();

        for year in 1991..=1995 {
            let total: f64 = breakdown.for_year(year).map(|s| s.share).sum();
            assert!((total - 1.0).abs() < 1e-9, "year {} sums to {}", year, total);
        }
        assert!(breakdown
            .shares
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.share)));
    }

    #[test]
    fn test_share_denominator_excludes_nulls() {
        // 1993 has five dated rows, one with a null bias
        let table = fixture();
        let breakdown = share_by_year_and_category(&table, &Field::Bias, &[]).unwrap();

        let jewish_1993 = breakdown
            .for_year(1993)
            .find(|s| s.category == "Anti-Jewish")
            .unwrap();
        assert_eq!(jewish_1993.count, 1);
        assert!((jewish_1993.share - 0.25).abs() < 1e-12);

        assert_eq!(breakdown.undated, 3);
        assert_eq!(breakdown.missing_field, 1);
    }

    #[test]
    fn test_share_subset() {
        let table = fixture();
        let subset = vec!["Anti-Jewish".to_string(), "Anti-Asian".to_string()];
        let breakdown = share_by_year_and_category(&table, &Field::Bias, &subset).unwrap();

        assert!(breakdown
            .shares
            .iter()
            .all(|s| subset.contains(&s.category)));
        // Anti-Asian only appears on a malformed-date row
        assert!(breakdown.shares.iter().all(|s| s.category != "Anti-Asian"));
        let years: Vec<i32> = breakdown.shares.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![1991, 1992, 1993, 1994, 1995]);
    }

    #[test]
    fn test_share_no_dated_rows_is_insufficient() {
        let table = table(vec![
            row(None, Some("A"), None),
            row(Some("2001-01-01"), None, None),
        ]);
        let err = share_by_year_and_category(&table, &Field::Bias, &[]).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[test]
    fn test_missing_by_field() {
        let table = fixture();
        let missing = missing_by_field(&table, &[Field::Bias, Field::Location]);
        assert_eq!(missing.get("bias_desc"), Some(&1));
        assert_eq!(missing.get("location_name"), Some(&2));
    }
}
