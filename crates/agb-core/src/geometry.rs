//! Study-area boundary used to scope region reductions.

use serde::Serialize;

use crate::coords::{Bbox, LatLon};

/// Tanjung Puting National Park boundary, `[lon, lat]` pairs in ring order.
/// The ring is closed by [`Region::new`].
const TANJUNG_PUTING_RING: [[f64; 2]; 57] = [
    [111.88610442456644, -2.634969034682339],
    [111.89125426587503, -2.655546449659222],
    [111.90876372632425, -2.6850401460514184],
    [111.89331420239847, -2.7049308420876907],
    [111.89606078442972, -2.7176195640997145],
    [111.88679107007425, -2.7258500152053013],
    [111.89331420239847, -2.7601429536574984],
    [111.86001189526957, -2.792034498640716],
    [111.84730895337503, -2.7807182425493235],
    [111.82430632886332, -2.791348668036572],
    [111.78379424390238, -2.794091988050556],
    [111.78001769360941, -2.800264434634048],
    [111.79203398999613, -2.8174099487121724],
    [111.785167534918, -2.838327133809131],
    [111.75838836011332, -2.8379842321801423],
    [111.75529845532816, -2.830097466660325],
    [111.75941832837503, -2.8108946830231907],
    [111.71272643384378, -2.77694613303973],
    [111.70208342847269, -2.7790036488120053],
    [111.70311339673441, -2.8095230435033094],
    [111.72268279370707, -2.8225535537691324],
    [111.7273823921613, -3.2221912287192493],
    [111.61477252888005, -3.2194489851511228],
    [111.62033831194752, -3.6005620583326463],
    [112.19162737444752, -3.5950797206625347],
    [112.19986712054127, -3.2420871034107583],
    [112.3001173646819, -3.243458195531875],
    [112.26990496233815, -3.207809198385169],
    [112.25023871982027, -3.206395602312007],
    [112.2571051748984, -3.176230053218437],
    [112.2406256827109, -3.033617484950588],
    [112.22002631747652, -2.892357644516766],
    [112.18294746005465, -2.844352678960637],
    [112.13788608216097, -2.7840007481915663],
    [112.13033298157504, -2.7593104271303273],
    [112.11385348938754, -2.759996276327663],
    [112.04114594826174, -2.5469780477290866],
    [112.02432313332034, -2.5469780477290866],
    [111.95771851906252, -2.546292080361117],
    [111.9505087412305, -2.5425192533115304],
    [111.94398560890627, -2.547321031276085],
    [111.9292227304883, -2.572358582696896],
    [111.92973771461916, -2.576817273307101],
    [111.92699113258791, -2.5783606625738598],
    [111.9292227304883, -2.585563121046636],
    [111.92441621193362, -2.5884783902399673],
    [111.92613282570315, -2.591736624343633],
    [111.9233862436719, -2.593965937582822],
    [111.92544618019534, -2.597224157554991],
    [111.9175497568555, -2.593451481030129],
    [111.92098298439456, -2.599967915223642],
    [111.91136994728518, -2.597567127589645],
    [111.9123999155469, -2.6047694767833836],
    [111.90484681496096, -2.602711666925904],
    [111.90484681496096, -2.610599919778431],
    [111.89523377785159, -2.614029579495644],
    [111.89832368263674, -2.621917761255445],
];

/// Mean Earth radius in metres (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// An immutable polygon with a single closed outer ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    name: String,
    /// Closed ring: first vertex repeated at the end.
    ring: Vec<LatLon>,
}

impl Region {
    /// Build a region from `[lon, lat]` vertices. The ring is closed if the
    /// caller left it open. Returns `None` for fewer than three distinct
    /// vertices or any non-finite coordinate.
    pub fn new(name: impl Into<String>, vertices: &[[f64; 2]]) -> Option<Self> {
        let mut ring: Vec<LatLon> = vertices.iter().map(|&[lon, lat]| LatLon::new(lat, lon)).collect();
        if ring.iter().any(|p| !p.is_valid()) {
            return None;
        }
        let mut distinct: Vec<[u64; 2]> = ring.iter().map(|p| [p.lon.to_bits(), p.lat.to_bits()]).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 {
            return None;
        }
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        Some(Self { name: name.into(), ring })
    }

    /// The national park boundary every statistic is computed over.
    pub fn tanjung_puting() -> Self {
        let ring: Vec<LatLon> = TANJUNG_PUTING_RING
            .iter()
            .chain(std::iter::once(&TANJUNG_PUTING_RING[0]))
            .map(|&[lon, lat]| LatLon::new(lat, lon))
            .collect();
        Self { name: "Tanjung Puting National Park".to_string(), ring }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ring(&self) -> &[LatLon] {
        &self.ring
    }

    /// GeoJSON-style `[[[lon, lat], ...]]` coordinates.
    pub fn coordinates(&self) -> Vec<Vec<[f64; 2]>> {
        vec![self.ring.iter().map(|p| [p.lon, p.lat]).collect()]
    }

    pub fn bbox(&self) -> Bbox {
        let mut b = Bbox {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for p in &self.ring {
            b.min_lon = b.min_lon.min(p.lon);
            b.max_lon = b.max_lon.max(p.lon);
            b.min_lat = b.min_lat.min(p.lat);
            b.max_lat = b.max_lat.max(p.lat);
        }
        b
    }

    /// Even-odd ray casting in planar lon/lat space.
    pub fn contains(&self, p: LatLon) -> bool {
        if !self.bbox().contains(p) {
            return false;
        }
        let mut inside = false;
        for edge in self.ring.windows(2) {
            let (a, b) = (edge[0], edge[1]);
            if (a.lat > p.lat) != (b.lat > p.lat) {
                let t = (p.lat - a.lat) / (b.lat - a.lat);
                if p.lon < a.lon + t * (b.lon - a.lon) {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Area on a spherical Earth, in hectares.
    pub fn area_ha(&self) -> f64 {
        // The ring is closed, so the open vertex list is ring[..n].
        let open = &self.ring[..self.ring.len() - 1];
        let n = open.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let prev = open[(i + n - 1) % n].lon.to_radians();
                let next = open[(i + 1) % n].lon.to_radians();
                (next - prev) * open[i].lat.to_radians().sin()
            })
            .sum();
        (twice * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs() / 10_000.0
    }

    /// Bit patterns of every vertex, for use in cache keys.
    pub fn fingerprint(&self) -> Vec<[u64; 2]> {
        self.ring.iter().map(|p| [p.lon.to_bits(), p.lat.to_bits()]).collect()
    }
}
