use geo::algorithm::contains::Contains;
use geo::bounding_rect::BoundingRect;
use geo::{MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};

// Wrapper for RTree indexing
#[derive(Clone)]
struct FeatureEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Bounding-box index over drawn features, used to turn a pointer position into a feature.
#[derive(Clone, Default)]
pub struct FeatureIndex {
    tree: RTree<FeatureEnvelope>,
}

impl FeatureIndex {
    /// `geometries[i]` belongs to feature `i`; features without geometry are never hit.
    pub fn build<'a>(geometries: impl IntoIterator<Item = Option<&'a MultiPolygon<f64>>>) -> Self {
        let items: Vec<FeatureEnvelope> = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(index, geometry)| {
                let rect = geometry?.bounding_rect()?;
                Some(FeatureEnvelope {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Feature containing the point. When several overlap, the one drawn last (highest
    /// index) is on top and wins.
    pub fn locate(&self, geometries: &[Option<&MultiPolygon<f64>>], lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|index| {
                geometries
                    .get(*index)
                    .copied()
                    .flatten()
                    .is_some_and(|geometry| geometry.contains(&point))
            })
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    #[test]
    fn finds_containing_feature() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(20.0, 0.0, 10.0);
        let geoms = vec![Some(&a), None, Some(&b)];
        let index = FeatureIndex::build(geoms.iter().copied());

        assert_eq!(index.locate(&geoms, 5.0, 5.0), Some(0));
        assert_eq!(index.locate(&geoms, 25.0, 5.0), Some(2));
        assert_eq!(index.locate(&geoms, 15.0, 5.0), None);
    }

    #[test]
    fn overlapping_features_prefer_topmost() {
        let base = square(0.0, 0.0, 10.0);
        let overlay = square(2.0, 2.0, 3.0);
        let geoms = vec![Some(&base), Some(&overlay)];
        let index = FeatureIndex::build(geoms.iter().copied());

        assert_eq!(index.locate(&geoms, 3.0, 3.0), Some(1));
        assert_eq!(index.locate(&geoms, 8.0, 8.0), Some(0));
    }
}
