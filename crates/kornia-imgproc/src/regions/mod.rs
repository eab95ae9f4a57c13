//! Connected region extraction with outer boundary contours.

/// Disjoint-set forest used for labeling.
pub mod union_find;

/// Boundary tracing.
pub mod contour;

use glam::IVec2;
use kornia_image::Image;

pub use contour::trace_boundary;
pub use union_find::UnionFind;

/// Constraints a connected region must satisfy to be reported.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionConfig {
    /// Minimum number of pixels.
    pub min_size: usize,
    /// Maximum number of pixels.
    pub max_size: usize,
    /// Smallest pixel value a region may have.
    pub min_value: u8,
    /// Largest pixel value a region may have.
    pub max_value: u8,
    /// Drop regions that touch the image border.
    pub skip_border: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_size: 40,
            max_size: 2 << 20,
            min_value: 0,
            max_value: 255,
            skip_border: true,
        }
    }
}

/// A 4-connected set of equal-valued pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRegion {
    /// Index of the region in the extraction result.
    pub id: usize,
    /// Pixel value shared by all pixels of the region.
    pub value: u8,
    /// Number of pixels.
    pub size: usize,
    /// Inclusive top-left corner of the bounding box.
    pub min: IVec2,
    /// Inclusive bottom-right corner of the bounding box.
    pub max: IVec2,
    /// Cyclic outer boundary starting at the raster-first pixel.
    pub boundary: Vec<IVec2>,
}

impl ImageRegion {
    /// Center of the bounding box.
    pub fn center(&self) -> glam::Vec2 {
        (self.min + self.max).as_vec2() * 0.5
    }
}

struct RegionStats {
    value: u8,
    start: IVec2,
    size: usize,
    min: IVec2,
    max: IVec2,
}

/// Extract the 4-connected regions of `src` whose value lies in `[min_value, max_value]`.
///
/// Regions are reported in raster order of their first pixel and carry their 8-connected
/// outer boundary.
///
/// # Example
///
/// ```
/// use kornia_image::Image;
/// use kornia_imgproc::regions::{find_regions, RegionConfig};
///
/// let mask = Image::<u8, 1>::from_fn([20, 20].into(), |x, y| {
///     [if (5..15).contains(&x) && (5..15).contains(&y) { 255 } else { 0 }]
/// });
///
/// let config = RegionConfig { min_value: 255, ..Default::default() };
/// let regions = find_regions(&mask, &config);
///
/// assert_eq!(regions.len(), 1);
/// assert_eq!(regions[0].size, 100);
/// assert_eq!(regions[0].boundary.len(), 36);
/// ```
pub fn find_regions(src: &Image<u8, 1>, config: &RegionConfig) -> Vec<ImageRegion> {
    let (w, h) = (src.width(), src.height());
    let data = src.as_slice();
    let wanted = |v: u8| v >= config.min_value && v <= config.max_value;

    let mut uf = UnionFind::new(w * h);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let v = data[i];
            if !wanted(v) {
                continue;
            }
            if x > 0 && data[i - 1] == v {
                uf.connect(i, i - 1);
            }
            if y > 0 && data[i - w] == v {
                uf.connect(i, i - w);
            }
        }
    }

    // labels are 1-based, 0 marks pixels outside any candidate region
    let mut labels = vec![0u32; w * h];
    let mut root_to_label = vec![0u32; w * h];
    let mut stats: Vec<RegionStats> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if !wanted(data[i]) {
                continue;
            }
            let root = uf.get_representative(i);
            let p = IVec2::new(x as i32, y as i32);
            if root_to_label[root] == 0 {
                stats.push(RegionStats {
                    value: data[i],
                    start: p,
                    size: 0,
                    min: p,
                    max: p,
                });
                root_to_label[root] = stats.len() as u32;
            }
            let label = root_to_label[root];
            labels[i] = label;
            let s = &mut stats[label as usize - 1];
            s.size += 1;
            s.min = s.min.min(p);
            s.max = s.max.max(p);
        }
    }

    let last = IVec2::new(w as i32 - 1, h as i32 - 1);
    stats
        .iter()
        .enumerate()
        .filter(|(_, s)| s.size >= config.min_size && s.size <= config.max_size)
        .filter(|(_, s)| {
            !config.skip_border
                || (s.min.x > 0 && s.min.y > 0 && s.max.x < last.x && s.max.y < last.y)
        })
        .enumerate()
        .map(|(id, (label, s))| ImageRegion {
            id,
            value: s.value,
            size: s.size,
            min: s.min,
            max: s.max,
            boundary: trace_boundary(&labels, w, h, s.start, label as u32 + 1),
        })
        .collect()
}
