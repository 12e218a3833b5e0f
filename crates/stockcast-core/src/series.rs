use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One product's units sold per calendar day, duplicates summed, ordered by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    points: Vec<(NaiveDate, f64)>,
}

impl DailySeries {
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (date, units) in observations {
            *by_date.entry(date).or_insert(0.0) += units;
        }
        Self {
            points: by_date.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, y)| *y)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }

    /// Days between the first and last observation.
    pub fn span_days(&self) -> i64 {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        }
    }

    /// Mean of the last `window` values, or of all of them when fewer exist.
    /// `0.0` for an empty series.
    pub fn tail_mean(&self, window: usize) -> f64 {
        let take = window.min(self.points.len());
        if take == 0 {
            return 0.0;
        }
        let sum: f64 = self.points[self.points.len() - take..]
            .iter()
            .map(|(_, y)| y)
            .sum();
        sum / take as f64
    }
}
