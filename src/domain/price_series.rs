//! Net-asset-value price series.

use crate::domain::error::GridError;

/// One observation: unix timestamp in seconds and a positive price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Immutable series with strictly increasing timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Builds a series from points in any order.
    ///
    /// Points are sorted by timestamp; when a timestamp repeats, the last
    /// occurrence in the input wins. Non-positive or non-finite prices are
    /// rejected.
    pub fn from_points(code: &str, mut points: Vec<PricePoint>) -> Result<Self, GridError> {
        if let Some(bad) = points
            .iter()
            .find(|p| !p.price.is_finite() || p.price <= 0.0)
        {
            return Err(GridError::MalformedSource {
                code: code.to_string(),
                reason: format!("invalid price {} at {}", bad.price, bad.timestamp),
            });
        }

        // Stable sort keeps input order among equal timestamps, so the
        // later duplicate is the one retained below.
        points.sort_by_key(|p| p.timestamp);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }
        Ok(Self { points: deduped })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Index of the first point whose timestamp is not less than `timestamp`.
    pub fn lower_bound(&self, timestamp: i64) -> usize {
        self.points.partition_point(|p| p.timestamp < timestamp)
    }

    /// Points in `[start, end)`, empty when the range is inverted or out of bounds.
    pub fn window(&self, start: usize, end: usize) -> &[PricePoint] {
        if start >= end || end > self.points.len() {
            return &[];
        }
        &self.points[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(i64, f64)]) -> PriceSeries {
        PriceSeries::from_points(
            "TEST",
            pairs.iter().map(|&(t, p)| PricePoint::new(t, p)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn sorts_by_timestamp() {
        let s = series(&[(30, 1.3), (10, 1.1), (20, 1.2)]);
        let ts: Vec<i64> = s.points().iter().map(|p| p.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn duplicate_timestamp_keeps_last() {
        let s = series(&[(10, 1.0), (20, 2.0), (10, 1.5)]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.points()[0], PricePoint::new(10, 1.5));
    }

    #[test]
    fn rejects_non_positive_price() {
        let result = PriceSeries::from_points("BAD", vec![PricePoint::new(1, 0.0)]);
        match result {
            Err(GridError::MalformedSource { code, .. }) => assert_eq!(code, "BAD"),
            other => panic!("expected MalformedSource, got {other:?}"),
        }
    }

    #[test]
    fn rejects_nan_price() {
        let result = PriceSeries::from_points("BAD", vec![PricePoint::new(1, f64::NAN)]);
        assert!(result.is_err());
    }

    #[test]
    fn lower_bound_semantics() {
        let s = series(&[(10, 1.0), (20, 1.0), (30, 1.0)]);
        assert_eq!(s.lower_bound(0), 0);
        assert_eq!(s.lower_bound(10), 0);
        assert_eq!(s.lower_bound(11), 1);
        assert_eq!(s.lower_bound(30), 2);
        assert_eq!(s.lower_bound(31), 3);
    }

    #[test]
    fn window_bounds() {
        let s = series(&[(10, 1.0), (20, 2.0), (30, 3.0)]);
        assert_eq!(s.window(1, 3).len(), 2);
        assert!(s.window(2, 2).is_empty());
        assert!(s.window(2, 1).is_empty());
        assert!(s.window(0, 4).is_empty());
    }

    #[test]
    fn empty_series() {
        let s = PriceSeries::default();
        assert!(s.is_empty());
        assert!(s.first().is_none());
        assert_eq!(s.lower_bound(100), 0);
    }
}
