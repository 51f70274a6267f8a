//! Data structures for sets of points of arbitrary dimension.

use itertools::Itertools;

use crate::{
    constants::EMPTY_PLACEHOLDER,
    error::{BuildError, Result},
};

pub type Coordinate = i64;

/// An ordered set of points, stored flat with `dims` coordinates per point.
///
/// The order of the points is the order in which they were supplied, and is
/// kept by [`PointSet::median_split`]. Ties on a split coordinate are broken by
/// this order, which is what makes the build independent of the worker count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointSet {
    data: Vec<Coordinate>,
    dims: usize,
}

/// Result of splitting a non-empty point set at its median.
#[derive(Debug)]
pub struct MedianSplit {
    pub median: Vec<Coordinate>,
    pub low: PointSet,
    pub high: PointSet,
}

impl PointSet {
    /// Create a point set from a flat buffer of `npoints * dims` coordinates.
    pub fn new(data: Vec<Coordinate>, dims: usize) -> Result<PointSet> {
        if dims == 0 {
            return Err(BuildError::InvalidConfiguration(
                "dims must be at least 1".to_string(),
            ));
        }
        if data.len() % dims != 0 {
            return Err(BuildError::InvalidConfiguration(format!(
                "{} coordinates cannot be split into points of {} dims",
                data.len(),
                dims
            )));
        }
        if data.contains(&EMPTY_PLACEHOLDER) {
            return Err(BuildError::InvalidConfiguration(format!(
                "coordinate {} is reserved as the empty placeholder",
                EMPTY_PLACEHOLDER
            )));
        }
        Ok(PointSet { data, dims })
    }

    pub fn empty(dims: usize) -> PointSet {
        PointSet {
            data: Vec::new(),
            dims,
        }
    }

    /// Number of points. A set without dimensions holds none.
    pub fn len(&self) -> usize {
        self.data.len().checked_div(self.dims).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> &[Coordinate] {
        &self.data[index * self.dims..(index + 1) * self.dims]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Coordinate]> {
        self.data.chunks_exact(self.dims.max(1))
    }

    pub fn as_flat(&self) -> &[Coordinate] {
        &self.data
    }

    /// Split at the median along `depth % dims`.
    ///
    /// The median is the point at sorted position `len / 2`, sorting stably so
    /// equal coordinates keep their input order. Points sorted before it form
    /// `low`, points after it form `high`; both keep input order.
    pub fn median_split(self, depth: usize) -> Option<MedianSplit> {
        if self.is_empty() {
            return None;
        }

        let axis = depth % self.dims;
        let npoints = self.len();
        let mid = npoints / 2;

        let mut position = vec![0; npoints];
        (0..npoints)
            .sorted_by_key(|&i| self.get(i)[axis])
            .enumerate()
            .for_each(|(sorted, i)| position[i] = sorted);

        let mut median = Vec::with_capacity(self.dims);
        let mut low = Vec::with_capacity(mid * self.dims);
        let mut high = Vec::with_capacity((npoints - mid - 1) * self.dims);

        for (i, point) in self.iter().enumerate() {
            match position[i] {
                p if p < mid => low.extend_from_slice(point),
                p if p > mid => high.extend_from_slice(point),
                _ => median.extend_from_slice(point),
            }
        }

        Some(MedianSplit {
            median,
            low: PointSet {
                data: low,
                dims: self.dims,
            },
            high: PointSet {
                data: high,
                dims: self.dims,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The six point, two dimensional staircase.
    fn staircase() -> PointSet {
        PointSet::new(vec![9, 1, 8, 2, 7, 3, 6, 4, 5, 5, 4, 6], 2).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(PointSet::new(vec![1, 2, 3], 0).is_err());
        assert!(PointSet::new(vec![1, 2, 3], 2).is_err());
        assert!(PointSet::new(vec![1, EMPTY_PLACEHOLDER], 2).is_err());
        assert!(PointSet::new(Vec::new(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_points() {
        let points = staircase();
        assert_eq!(points.len(), 6);
        assert_eq!(points.get(2), &[7, 3]);
        assert_eq!(points.iter().last().unwrap(), &[4, 6]);
    }

    #[test]
    fn test_median_split_takes_upper_middle() {
        let split = staircase().median_split(0).unwrap();

        assert_eq!(split.median, vec![7, 3]);
        assert_eq!(split.low.as_flat(), &[6, 4, 5, 5, 4, 6]);
        assert_eq!(split.high.as_flat(), &[9, 1, 8, 2]);
    }

    #[test]
    fn test_median_split_cycles_axis() {
        let split = staircase().median_split(1).unwrap();

        assert_eq!(split.median, vec![6, 4]);
        assert_eq!(split.low.len(), 3);
        assert_eq!(split.high.as_flat(), &[5, 5, 4, 6]);
    }

    #[test]
    fn test_median_split_ties_follow_input_order() {
        let points = PointSet::new(vec![3, 0, 3, 1, 3, 2, 3, 3], 2).unwrap();
        let split = points.median_split(0).unwrap();

        assert_eq!(split.median, vec![3, 2]);
        assert_eq!(split.low.as_flat(), &[3, 0, 3, 1]);
        assert_eq!(split.high.as_flat(), &[3, 3]);
    }

    #[test]
    fn test_median_split_edge_cases() {
        assert!(PointSet::empty(2).median_split(0).is_none());

        let single = PointSet::new(vec![1, 2, 3], 3).unwrap().median_split(5).unwrap();
        assert_eq!(single.median, vec![1, 2, 3]);
        assert!(single.low.is_empty());
        assert!(single.high.is_empty());
    }

    #[test]
    fn test_empty_without_dims() {
        let points = PointSet::empty(0);
        assert_eq!(points.len(), 0);
        assert!(points.is_empty());
        assert_eq!(points.iter().count(), 0);
        assert!(points.median_split(1).is_none());
    }
}
