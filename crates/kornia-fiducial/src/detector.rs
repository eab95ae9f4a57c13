use std::{fmt, str::FromStr, sync::Arc};

use glam::Vec2;
use kornia_image::Image;
use kornia_imgproc::{
    corners::{CssConfig, CssCornerDetector},
    filter::median_blur,
    morphology::{self, Kernel, KernelShape},
    regions::{find_regions, RegionConfig},
    threshold::{local_threshold, LocalThresholdConfig},
};

use crate::{
    errors::FiducialError,
    heuristics::{recover_quad, CornerHeuristics, DebugCorners},
    quad::{refine_edges, TiltedQuad},
};

/// Smallest smoothing sigma used when it is derived from the boundary length.
const MIN_DYNAMIC_SIGMA: f32 = 1.0;

/// Largest smoothing sigma used when it is derived from the boundary length.
const MAX_DYNAMIC_SIGMA: f32 = 7.0;

/// Binary value of the regions searched for quads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QuadColor {
    /// Only black (0) regions.
    BlackOnly,
    /// Only white (255) regions.
    #[default]
    WhiteOnly,
    /// Black and white regions.
    BlackAndWhite,
}

impl QuadColor {
    /// The inclusive range of binary values a region may have.
    pub fn value_range(&self) -> (u8, u8) {
        match self {
            QuadColor::BlackOnly => (0, 0),
            QuadColor::WhiteOnly => (255, 255),
            QuadColor::BlackAndWhite => (0, 255),
        }
    }
}

impl TryFrom<i32> for QuadColor {
    type Error = FiducialError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QuadColor::BlackOnly),
            1 => Ok(QuadColor::WhiteOnly),
            2 => Ok(QuadColor::BlackAndWhite),
            v => Err(FiducialError::InvalidQuadColor(v.to_string())),
        }
    }
}

impl FromStr for QuadColor {
    type Err = FiducialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words = s.split_whitespace().collect::<Vec<_>>();
        match words.as_slice() {
            ["black", "only"] => Ok(QuadColor::BlackOnly),
            ["white", "only"] => Ok(QuadColor::WhiteOnly),
            ["black", "and", "white"] => Ok(QuadColor::BlackAndWhite),
            _ => Err(FiducialError::InvalidQuadColor(s.to_string())),
        }
    }
}

impl fmt::Display for QuadColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuadColor::BlackOnly => "black only",
            QuadColor::WhiteOnly => "white only",
            QuadColor::BlackAndWhite => "black and white",
        };
        f.write_str(s)
    }
}

/// Square mask size of the post processing filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MaskSize {
    /// 3x3 mask.
    #[default]
    Three,
    /// 5x5 mask.
    Five,
}

impl MaskSize {
    /// Side length of the mask.
    pub fn size(&self) -> usize {
        match self {
            MaskSize::Three => 3,
            MaskSize::Five => 5,
        }
    }
}

impl FromStr for MaskSize {
    type Err = FiducialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3x3" => Ok(MaskSize::Three),
            "5x5" => Ok(MaskSize::Five),
            _ => Err(FiducialError::InvalidFilter(s.to_string())),
        }
    }
}

impl fmt::Display for MaskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.size())
    }
}

/// Filter applied to the binary image before region extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PostFilter {
    /// No filtering.
    #[default]
    None,
    /// Median filter.
    Median(MaskSize),
    /// Erosion with a box element.
    Erosion(MaskSize),
    /// Dilation with a box element.
    Dilation(MaskSize),
    /// Erosion followed by dilation.
    Opening(MaskSize),
    /// Dilation followed by erosion.
    Closing(MaskSize),
}

impl FromStr for PostFilter {
    type Err = FiducialError;

    /// Parse `"<kind>"` or `"<kind> <mask size>"`, e.g. `"median 5x5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let kind = parts.next().unwrap_or_default();
        let mask = match parts.next() {
            Some(m) => m.parse()?,
            None => MaskSize::default(),
        };
        if parts.next().is_some() {
            return Err(FiducialError::InvalidFilter(s.to_string()));
        }

        match kind {
            "none" => Ok(PostFilter::None),
            "median" => Ok(PostFilter::Median(mask)),
            "erosion" => Ok(PostFilter::Erosion(mask)),
            "dilatation" | "dilation" => Ok(PostFilter::Dilation(mask)),
            "opening" => Ok(PostFilter::Opening(mask)),
            "closing" => Ok(PostFilter::Closing(mask)),
            _ => Err(FiducialError::InvalidFilter(s.to_string())),
        }
    }
}

/// A post filter ready to be applied.
#[derive(Debug, Clone)]
enum CompiledFilter {
    Median(usize),
    Erode(Kernel),
    Dilate(Kernel),
    Open(Kernel),
    Close(Kernel),
}

impl CompiledFilter {
    fn build(filter: PostFilter) -> Result<Option<Self>, FiducialError> {
        let kernel = |m: MaskSize| Kernel::new(KernelShape::Box { size: m.size() });
        Ok(match filter {
            PostFilter::None => None,
            PostFilter::Median(m) => Some(CompiledFilter::Median(m.size())),
            PostFilter::Erosion(m) => Some(CompiledFilter::Erode(kernel(m)?)),
            PostFilter::Dilation(m) => Some(CompiledFilter::Dilate(kernel(m)?)),
            PostFilter::Opening(m) => Some(CompiledFilter::Open(kernel(m)?)),
            PostFilter::Closing(m) => Some(CompiledFilter::Close(kernel(m)?)),
        })
    }

    fn apply(&self, src: &Image<u8, 1>, dst: &mut Image<u8, 1>) -> Result<(), FiducialError> {
        match self {
            CompiledFilter::Median(size) => median_blur(src, dst, *size)?,
            CompiledFilter::Erode(k) => morphology::erode(src, dst, k)?,
            CompiledFilter::Dilate(k) => morphology::dilate(src, dst, k)?,
            CompiledFilter::Open(k) => morphology::open(src, dst, k)?,
            CompiledFilter::Close(k) => morphology::close(src, dst, k)?,
        }
        Ok(())
    }
}

/// Options of the [`QuadDetector`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuadDetectorConfig {
    /// Binarization parameters.
    pub threshold: LocalThresholdConfig,
    /// Region extraction parameters. The value range is overridden by `quad_color`.
    pub region: RegionConfig,
    /// Corner detection parameters.
    pub css: CssConfig,
    /// Filter applied to the binary image.
    pub filter: PostFilter,
    /// Binary value of the searched regions.
    pub quad_color: QuadColor,
    /// Refine the corners by fitting lines to the region boundary.
    pub refine_edges: bool,
    /// Derive the corner smoothing sigma from the boundary length.
    pub dynamic_sigma: bool,
    /// Strategies used to recover quads from more than four corners.
    pub heuristics: CornerHeuristics,
    /// Minimum rating of a recovered quad.
    pub min_quad_rating: f32,
    /// Keep the intermediate corner sets of the last detection.
    pub debug_corners: bool,
}

impl Default for QuadDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: LocalThresholdConfig::default(),
            region: RegionConfig::default(),
            css: CssConfig::default(),
            filter: PostFilter::None,
            quad_color: QuadColor::WhiteOnly,
            refine_edges: true,
            dynamic_sigma: true,
            heuristics: CornerHeuristics::default(),
            min_quad_rating: 0.3,
            debug_corners: false,
        }
    }
}

/// Finds quadrilateral marker candidates in grayscale images.
///
/// Every call to [`QuadDetector::detect`] binarizes the image, extracts the connected
/// regions of the configured color and keeps those whose boundary has four corners.
pub struct QuadDetector {
    config: QuadDetectorConfig,
    css: CssCornerDetector,
    filter: Option<(PostFilter, Option<CompiledFilter>)>,
    binary: Option<Image<u8, 1>>,
    quads: Vec<TiltedQuad>,
    debug: DebugCorners,
}

impl QuadDetector {
    /// Creates a new detector with the given configuration.
    pub fn new(config: QuadDetectorConfig) -> Self {
        Self {
            css: CssCornerDetector::new(config.css.clone()),
            config,
            filter: None,
            binary: None,
            quads: Vec::new(),
            debug: DebugCorners::default(),
        }
    }

    /// Returns a reference to the detector configuration.
    #[inline]
    pub fn config(&self) -> &QuadDetectorConfig {
        &self.config
    }

    /// Replaces the configuration. Derived state is rebuilt on the next detection.
    pub fn set_config(&mut self, config: QuadDetectorConfig) {
        self.css = CssCornerDetector::new(config.css.clone());
        self.config = config;
    }

    /// Switches the binary value of the searched regions.
    #[inline]
    pub fn set_quad_color(&mut self, color: QuadColor) {
        self.config.quad_color = color;
    }

    /// Switches the post processing filter.
    #[inline]
    pub fn set_filter(&mut self, filter: PostFilter) {
        self.config.filter = filter;
    }

    /// The quads found by the last detection.
    #[inline]
    pub fn quads(&self) -> &[TiltedQuad] {
        &self.quads
    }

    /// The binary image used by the last detection.
    #[inline]
    pub fn last_binary_image(&self) -> Option<&Image<u8, 1>> {
        self.binary.as_ref()
    }

    /// The corner sets collected by the last detection when `debug_corners` is set.
    #[inline]
    pub fn debug_corners(&self) -> &DebugCorners {
        &self.debug
    }

    fn update_filter(&mut self) -> Result<(), FiducialError> {
        let wanted = self.config.filter;
        if self.filter.as_ref().map(|(f, _)| *f) != Some(wanted) {
            log::debug!("rebuilding post filter {wanted:?}");
            self.filter = Some((wanted, CompiledFilter::build(wanted)?));
        }
        Ok(())
    }

    fn binarize(&mut self, src: &Image<u8, 1>) -> Result<Image<u8, 1>, FiducialError> {
        let mut binary = match self.binary.take() {
            Some(b) if b.size() == src.size() => b,
            _ => Image::from_size_val(src.size(), 0)?,
        };
        local_threshold(src, &mut binary, &self.config.threshold)?;

        if let Some((_, Some(filter))) = &self.filter {
            let mut filtered = Image::from_size_val(src.size(), 0)?;
            filter.apply(&binary, &mut filtered)?;
            binary = filtered;
        }
        Ok(binary)
    }

    /// Detects quads in a grayscale image.
    ///
    /// # Arguments
    ///
    /// * `src` - The grayscale input image.
    ///
    /// # Returns
    ///
    /// The detected quads; the same list is available through [`QuadDetector::quads`]
    /// until the next call.
    ///
    /// # Errors
    ///
    /// Returns [`FiducialError::InvalidInput`] for an empty image. Regions that do not
    /// yield a quad are skipped silently.
    pub fn detect(&mut self, src: &Image<u8, 1>) -> Result<&[TiltedQuad], FiducialError> {
        if src.is_empty() {
            return Err(FiducialError::InvalidInput);
        }

        self.update_filter()?;
        let binary = self.binarize(src)?;

        self.quads.clear();
        self.debug.clear();

        let (min_value, max_value) = self.config.quad_color.value_range();
        let region_config = RegionConfig {
            min_value,
            max_value,
            ..self.config.region.clone()
        };
        let regions = find_regions(&binary, &region_config);
        self.binary = Some(binary);

        let debug_enabled = self.config.debug_corners;
        let mut rejected = 0;
        for region in regions {
            let region = Arc::new(region);
            let boundary = &region.boundary;

            if self.config.dynamic_sigma {
                let sigma = (boundary.len() as f32 * (3.2 / 60.0) - 0.5)
                    .clamp(MIN_DYNAMIC_SIGMA, MAX_DYNAMIC_SIGMA);
                self.css.set_sigma(sigma);
            }
            let corners = self.css.detect(boundary);
            if debug_enabled {
                self.debug.all.push(corners.clone());
            }

            if self.config.heuristics.any() && corners.len() > 4 {
                let debug = debug_enabled.then_some(&mut self.debug);
                // recovered corners are not boundary pixels, so they are kept unrefined
                match recover_quad(
                    &corners,
                    self.config.min_quad_rating,
                    self.config.heuristics,
                    debug,
                ) {
                    Some(c) => self.quads.push(TiltedQuad::new(c, region.clone())),
                    None => rejected += 1,
                }
                continue;
            }

            let Ok(mut corners) = <[Vec2; 4]>::try_from(corners.as_slice()) else {
                rejected += 1;
                continue;
            };
            if self.config.refine_edges {
                if let Err(e) = refine_edges(&mut corners, boundary) {
                    log::trace!("region {} rejected: {e}", region.id);
                    rejected += 1;
                    continue;
                }
            }
            self.quads.push(TiltedQuad::new(corners, region.clone()));
        }

        log::debug!(
            "found {} quads, rejected {} regions",
            self.quads.len(),
            rejected
        );

        Ok(&self.quads)
    }
}
