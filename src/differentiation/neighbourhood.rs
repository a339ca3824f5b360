use crate::natural::NaturalCoordinates;
use crate::triangulation::Triangulation;

use super::DerivativeCache;

/// Fill `cache.first`, `cache.lambda` and `cache.second` with the sites a
/// local Taylor fit around the anchor of `nc` draws on.
///
/// * Anchor on a site: its one-ring, unit weights.
/// * Anchor inside the hull: its natural neighbours, weighted by their
///   coordinates when `use_sibson_weight` is set.
/// * Anchor on (or projected onto) the hull: the edge endpoints and their
///   one-rings, unit weights.
///
/// With `wide` set, the one-rings of the first neighbourhood are added as a
/// second neighbourhood, excluding the anchor and the first neighbourhood.
///
/// Returns `false` when the anchor is undefined and there is nothing to fit.
pub(crate) fn taylor_neighbourhood(
    tri: &Triangulation,
    nc: &NaturalCoordinates,
    wide: bool,
    use_sibson_weight: bool,
    cache: &mut DerivativeCache,
) -> bool {
    cache.first.clear();
    cache.lambda.clear();
    cache.second.clear();

    let anchor = match nc.len() {
        0 => return false,
        1 => {
            let i = nc.indices()[0];
            cache.first.extend_from_slice(tri.ring(i));
            Some(i)
        }
        2 => {
            for &i in nc.indices() {
                cache.first.push(i);
                cache.first.extend_from_slice(tri.ring(i));
            }
            cache.first.sort_unstable();
            cache.first.dedup();
            None
        }
        _ => {
            cache.first.extend_from_slice(nc.indices());
            if use_sibson_weight {
                cache.lambda.extend_from_slice(nc.coordinates());
            }
            None
        }
    };
    cache.lambda.resize(cache.first.len(), 1.0);

    if wide {
        for &j in cache.first.iter() {
            cache.second.extend_from_slice(tri.ring(j));
        }
        cache.second.sort_unstable();
        cache.second.dedup();
        let first = &cache.first;
        cache
            .second
            .retain(|k| Some(*k) != anchor && !first.contains(k));
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;

    /// 3x3 grid of unit spacing, site `3 * i + j` at `(i, j)`
    fn grid() -> Triangulation {
        let points = (0..3)
            .flat_map(|i| (0..3).map(move |j| [i as f64, j as f64 + 0.01 * (i * j) as f64]))
            .collect();
        Triangulation::new(points).unwrap()
    }

    #[test]
    fn test_site_neighbourhoods() {
        let tri = grid();
        let mut cache = DerivativeCache::new();
        let centre = NaturalCoordinates::new(vec![1.0], vec![4], tri.point(4)).unwrap();

        assert!(taylor_neighbourhood(&tri, &centre, false, true, &mut cache));
        assert_eq!(cache.first, tri.ring(4));
        assert!(cache.lambda.iter().all(|&w| w == 1.0));
        assert!(cache.second.is_empty());

        // Centre's two-ring covers the rest of the grid, never the centre itself
        assert!(taylor_neighbourhood(&tri, &centre, true, true, &mut cache));
        assert_eq!(cache.num_neighbours(), 8);
        assert!(!cache.second.contains(&4));
        assert!(cache.second.iter().all(|k| !cache.first.contains(k)));
    }

    #[test]
    fn test_point_neighbourhoods() {
        let tri = grid();
        let mut cache = DerivativeCache::new();

        let nc = NaturalCoordinates::new(vec![0.5, 0.25, 0.25], vec![0, 1, 3], [0.3, 0.3])
            .unwrap();
        assert!(taylor_neighbourhood(&tri, &nc, false, true, &mut cache));
        assert_eq!(cache.first, vec![0, 1, 3]);
        assert_eq!(cache.lambda, vec![0.5, 0.25, 0.25]);

        assert!(taylor_neighbourhood(&tri, &nc, false, false, &mut cache));
        assert_eq!(cache.lambda, vec![1.0; 3]);

        // Two-point coordinates pull in the endpoints' rings
        let edge = NaturalCoordinates::new(vec![0.5, 0.5], vec![0, 1], [0.0, 0.5]).unwrap();
        assert!(taylor_neighbourhood(&tri, &edge, false, true, &mut cache));
        assert!(cache.first.contains(&0) && cache.first.contains(&1));
        assert!(cache.first.len() > 2);

        let undefined = NaturalCoordinates::new(vec![], vec![], [9.0, 9.0]).unwrap();
        assert!(!taylor_neighbourhood(&tri, &undefined, true, true, &mut cache));
    }
}
