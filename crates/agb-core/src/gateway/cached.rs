use super::{CollectionHandle, RasterHandle, Reducer, RegionStats, RemoteBackend};
use crate::assets::AssetKey;
use crate::cache::{Memo, MemoStats};
use crate::error::GatewayError;
use crate::geometry::Region;

/// Everything a reduction result depends on. Floats are keyed by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReduceKey {
    asset: AssetKey,
    bands: Vec<String>,
    region: Vec<[u64; 2]>,
    reducers: Vec<Reducer>,
    scale: u64,
    max_pixels: u64,
}

/// Memoizing wrapper: identical queries reach the inner backend once per
/// process, or once per [`CachedBackend::clear`]. Failures are not cached.
pub struct CachedBackend<B> {
    inner: B,
    rasters: Memo<AssetKey, RasterHandle>,
    collections: Memo<AssetKey, CollectionHandle>,
    reductions: Memo<ReduceKey, RegionStats>,
}

/// Per-query-kind cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheReport {
    pub rasters: MemoStats,
    pub collections: MemoStats,
    pub reductions: MemoStats,
}

impl<B: RemoteBackend> CachedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, rasters: Memo::new(), collections: Memo::new(), reductions: Memo::new() }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Forget every cached result.
    pub fn clear(&self) {
        self.rasters.clear();
        self.collections.clear();
        self.reductions.clear();
    }

    pub fn report(&self) -> CacheReport {
        CacheReport {
            rasters: self.rasters.stats(),
            collections: self.collections.stats(),
            reductions: self.reductions.stats(),
        }
    }
}

impl<B: RemoteBackend> RemoteBackend for CachedBackend<B> {
    fn fetch_raster(&self, key: &AssetKey) -> Result<RasterHandle, GatewayError> {
        self.rasters.get_or_try_insert_with(key.clone(), || {
            log::info!("cache miss: raster {key}");
            self.inner.fetch_raster(key)
        })
    }

    fn fetch_feature_collection(&self, key: &AssetKey) -> Result<CollectionHandle, GatewayError> {
        self.collections.get_or_try_insert_with(key.clone(), || {
            log::info!("cache miss: feature collection {key}");
            self.inner.fetch_feature_collection(key)
        })
    }

    fn reduce_region(
        &self,
        raster: &RasterHandle,
        region: &Region,
        reducers: &[Reducer],
        scale: f64,
        max_pixels: f64,
    ) -> Result<RegionStats, GatewayError> {
        let key = ReduceKey {
            asset: raster.key().clone(),
            bands: raster.active_bands().into_iter().map(str::to_string).collect(),
            region: region.fingerprint(),
            reducers: reducers.to_vec(),
            scale: scale.to_bits(),
            max_pixels: max_pixels.to_bits(),
        };
        self.reductions.get_or_try_insert_with(key, || {
            log::info!("cache miss: reduce_region {} over {}", raster.key(), region.name());
            self.inner.reduce_region(raster, region, reducers, scale, max_pixels)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Counts calls per query kind; fails for keys ending in `missing`.
    #[derive(Default)]
    struct Counting {
        calls: RefCell<Vec<&'static str>>,
    }

    impl Counting {
        fn count(&self, what: &str) -> usize {
            self.calls.borrow().iter().filter(|c| **c == what).count()
        }
    }

    impl RemoteBackend for Counting {
        fn fetch_raster(&self, key: &AssetKey) -> Result<RasterHandle, GatewayError> {
            self.calls.borrow_mut().push("raster");
            if key.as_str().ends_with("missing") {
                return Err(GatewayError::NotFound(key.clone()));
            }
            Ok(RasterHandle::new(key.clone(), vec!["agbd".into()]))
        }

        fn fetch_feature_collection(&self, key: &AssetKey) -> Result<CollectionHandle, GatewayError> {
            self.calls.borrow_mut().push("collection");
            Ok(CollectionHandle::new(key.clone(), vec![]))
        }

        fn reduce_region(
            &self,
            _raster: &RasterHandle,
            _region: &Region,
            _reducers: &[Reducer],
            scale: f64,
            _max_pixels: f64,
        ) -> Result<RegionStats, GatewayError> {
            self.calls.borrow_mut().push("reduce");
            let mut s = RegionStats::new();
            s.insert("agbd_mean", scale);
            Ok(s)
        }
    }

    #[test]
    fn identical_calls_hit_inner_once() {
        let cached = CachedBackend::new(Counting::default());
        let key = AssetKey::new("p/agb/agb_2021");
        let a = cached.fetch_raster(&key).unwrap();
        let b = cached.fetch_raster(&key).unwrap();
        assert_eq!(a, b);
        cached.fetch_feature_collection(&key).unwrap();
        cached.fetch_feature_collection(&key).unwrap();
        assert_eq!(cached.inner().count("raster"), 1);
        assert_eq!(cached.inner().count("collection"), 1);
        assert_eq!(cached.report().rasters.hits, 1);
    }

    #[test]
    fn reductions_keyed_on_every_argument() {
        let cached = CachedBackend::new(Counting::default());
        let raster = cached.fetch_raster(&AssetKey::new("p/agb/agb_2021")).unwrap();
        let region = Region::tanjung_puting();
        let r1 = cached.reduce_region(&raster, &region, &Reducer::MEAN_MIN_MAX, 100.0, 1e10).unwrap();
        let r2 = cached.reduce_region(&raster, &region, &Reducer::MEAN_MIN_MAX, 100.0, 1e10).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(cached.inner().count("reduce"), 1);

        let r3 = cached.reduce_region(&raster, &region, &Reducer::MEAN_MIN_MAX, 250.0, 1e10).unwrap();
        assert_eq!(r3.get("agbd_mean"), Some(250.0));
        cached.reduce_region(&raster, &region, &[Reducer::Mean], 100.0, 1e10).unwrap();
        let selected = raster.select("agbd").unwrap();
        cached.reduce_region(&selected, &region, &Reducer::MEAN_MIN_MAX, 100.0, 1e10).unwrap();
        assert_eq!(cached.inner().count("reduce"), 3);
    }

    #[test]
    fn failures_retry_on_next_call() {
        let cached = CachedBackend::new(Counting::default());
        let key = AssetKey::new("p/agb/missing");
        assert!(cached.fetch_raster(&key).is_err());
        assert!(cached.fetch_raster(&key).is_err());
        assert_eq!(cached.inner().count("raster"), 2);
    }

    #[test]
    fn clear_forces_refetch() {
        let cached = CachedBackend::new(Counting::default());
        let key = AssetKey::new("p/agb/RMSE_per_year");
        cached.fetch_feature_collection(&key).unwrap();
        cached.clear();
        cached.fetch_feature_collection(&key).unwrap();
        assert_eq!(cached.inner().count("collection"), 2);
        assert_eq!(cached.report().collections.entries, 1);
    }
}
