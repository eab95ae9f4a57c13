use std::{fmt, str::FromStr};

use glam::Vec2;
use kornia_image::{Image, ImageSize};
use kornia_imgproc::{resize::resize_nearest, rotate::rotate90};

use crate::{errors::FiducialError, templates::TemplateLoader};

/// Identifier reported for quads that did not match any template.
pub const REJECTED_ID: usize = 999_999;

/// Smallest supported matching dimension.
pub const MIN_MATCHING_DIM: usize = 4;

/// Largest supported matching dimension.
pub const MAX_MATCHING_DIM: usize = 256;

/// Distance used to compare a patch against the templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MatchMetric {
    /// Fraction of pixels whose binary values disagree.
    #[default]
    BinaryHamming,
    /// Euclidean distance of the gray values.
    GraySqrDist,
    /// Distance derived from the normalized cross correlation.
    GrayNcc,
}

impl FromStr for MatchMetric {
    type Err = FiducialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "binary hamming" => Ok(MatchMetric::BinaryHamming),
            "gray sqrdist" => Ok(MatchMetric::GraySqrDist),
            "gray ncc" => Ok(MatchMetric::GrayNcc),
            _ => Err(FiducialError::InvalidMetric(s.to_string())),
        }
    }
}

impl fmt::Display for MatchMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchMetric::BinaryHamming => "binary hamming",
            MatchMetric::GraySqrDist => "gray sqrdist",
            MatchMetric::GrayNcc => "gray ncc",
        })
    }
}

/// Options of the [`MarkerMatcher`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatcherConfig {
    /// The comparison metric.
    pub metric: MatchMetric,
    /// Side length of the square working resolution.
    pub matching_dim: usize,
    /// Matches with an error at or above this value are rejected.
    pub max_error: f32,
    /// Ratio of the marker border width to the marker dimension.
    pub border_ratio: f32,
    /// Report rejected patches with [`REJECTED_ID`] instead of dropping them.
    pub return_rejected: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            metric: MatchMetric::BinaryHamming,
            matching_dim: 32,
            max_error: 0.1,
            border_ratio: 0.4,
            return_rejected: false,
        }
    }
}

/// A reference marker image in the library.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTemplate {
    /// Position in the library.
    pub id: usize,
    /// Name the template was added with.
    pub name: String,
    /// The grayscale reference image at its original resolution.
    pub image: Image<u8, 1>,
    /// Physical side lengths of the printed marker, if known.
    pub physical_size: Option<Vec2>,
}

/// Result of classifying a patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// The best template, `None` if there was nothing to compare against.
    pub id: Option<usize>,
    /// Number of quarter turns of the best template rotation, in `0..4`.
    pub rotation: usize,
    /// Error of the best match.
    pub error: f32,
}

/// Selects templates to remove from the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSelector {
    /// The first template with each of the given names.
    Names(Vec<String>),
    /// Every template.
    All,
}

// the four quarter turns of a template at the working resolution
type Rotations = [Vec<u8>; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EngineKey {
    metric: MatchMetric,
    dim: usize,
    revision: u64,
}

/// Templates prepared for one metric.
#[derive(Debug)]
enum MatchEngine {
    BinaryHamming(Vec<Rotations>),
    GraySqrDist(Vec<Rotations>),
    GrayNcc(Vec<Rotations>),
}

impl MatchEngine {
    fn build(
        templates: &[MarkerTemplate],
        metric: MatchMetric,
        dim: usize,
    ) -> Result<Self, FiducialError> {
        let binary = metric == MatchMetric::BinaryHamming;
        let mut prepared = Vec::with_capacity(templates.len());
        for template in templates {
            let mut scaled = Image::from_size_val([dim, dim].into(), 0u8)?;
            resize_nearest(&template.image, &mut scaled)?;
            if binary {
                scaled
                    .as_slice_mut()
                    .iter_mut()
                    .for_each(|v| *v = if *v > 128 { 255 } else { 0 });
            }

            let r1 = rotate90(&scaled);
            let r2 = rotate90(&r1);
            let r3 = rotate90(&r2);
            prepared.push([scaled.into_vec(), r1.into_vec(), r2.into_vec(), r3.into_vec()]);
        }

        Ok(match metric {
            MatchMetric::BinaryHamming => MatchEngine::BinaryHamming(prepared),
            MatchMetric::GraySqrDist => MatchEngine::GraySqrDist(prepared),
            MatchMetric::GrayNcc => MatchEngine::GrayNcc(prepared),
        })
    }

    fn best_match(&self, patch: &[u8]) -> MatchResult {
        let (prepared, error): (_, fn(&[u8], &[u8]) -> f32) = match self {
            MatchEngine::BinaryHamming(p) => (p, hamming_error),
            MatchEngine::GraySqrDist(p) => (p, sqr_dist_error),
            MatchEngine::GrayNcc(p) => (p, ncc_error),
        };

        let mut best = MatchResult {
            id: None,
            rotation: 0,
            error: f32::INFINITY,
        };
        for (id, rotations) in prepared.iter().enumerate() {
            // first rotation with the smallest error
            let (rotation, err) = rotations
                .iter()
                .map(|t| error(patch, t))
                .enumerate()
                .fold((0, f32::INFINITY), |acc, (r, e)| if e < acc.1 { (r, e) } else { acc });
            if err < best.error {
                best = MatchResult {
                    id: Some(id),
                    rotation,
                    error: err,
                };
            }
        }
        best
    }
}

fn hamming_error(a: &[u8], b: &[u8]) -> f32 {
    let disagreeing = a
        .iter()
        .zip(b)
        .filter(|&(&a, &b)| (a > 127) != (b & 1 == 1))
        .count();
    disagreeing as f32 / a.len() as f32
}

fn sqr_dist_error(a: &[u8], b: &[u8]) -> f32 {
    let n = a.len();
    if n < 2 {
        return 0.0;
    }
    let sum = a.iter().zip(b).fold(0.0f32, |acc, (&a, &b)| {
        let d = a as i32 - b as i32;
        acc + (d * d) as f32
    });
    sum.sqrt() / (255 * n) as f32
}

// Not a textbook correlation coefficient: a perfect match yields sqrt(n - 1) / n and
// anti-correlated patches are not comparable at all.
fn ncc_error(a: &[u8], b: &[u8]) -> f32 {
    let n = a.len();
    if n < 2 {
        return 0.0;
    }
    let mean = |v: &[u8]| v.iter().map(|&x| x as f32).sum::<f32>() / n as f32;
    let (mean_a, mean_b) = (mean(a), mean(b));

    let (mut var_a, mut var_b, mut cross) = (0.0f32, 0.0f32, 0.0f32);
    for (&x, &y) in a.iter().zip(b) {
        let da = (x as f32 - mean_a) as i32;
        let db = (y as f32 - mean_b) as i32;
        var_a += (da * da) as f32;
        var_b += (db * db) as f32;
        cross += (da * db) as f32;
    }

    let err = (var_a.sqrt() * var_b.sqrt() * (n - 1) as f32 / cross).sqrt() / n as f32;
    if err.is_finite() && err >= 0.0 {
        err
    } else {
        f32::INFINITY
    }
}

/// Identifies rectified marker patches against a library of reference templates.
///
/// Each template is compared in its four quarter turns, so the reported rotation tells
/// how the marker appears in the patch. The prepared template copies are rebuilt lazily
/// after the library, the metric or the matching dimension changed.
///
/// # Example
///
/// ```
/// use kornia_image::Image;
/// use kornia_fiducial::matcher::{MarkerMatcher, MatcherConfig};
///
/// let template = Image::<u8, 1>::from_fn([4, 4].into(), |x, y| {
///     [if x == 1 && y < 3 { 0 } else { 255 }]
/// });
///
/// let mut matcher = MarkerMatcher::new(MatcherConfig::default())?;
/// matcher.add_template("bar", template.clone())?;
///
/// let result = matcher.classify(&template)?;
/// assert_eq!(result.id, Some(0));
/// assert_eq!(result.rotation, 0);
/// # Ok::<(), kornia_fiducial::FiducialError>(())
/// ```
#[derive(Debug)]
pub struct MarkerMatcher {
    config: MatcherConfig,
    templates: Vec<MarkerTemplate>,
    revision: u64,
    engine: Option<(EngineKey, MatchEngine)>,
    patch: Image<u8, 1>,
}

impl MarkerMatcher {
    /// Creates an empty matcher.
    ///
    /// # Errors
    ///
    /// Returns [`FiducialError::InvalidMatchingDim`] if the matching dimension is out of range
    /// and [`FiducialError::InvalidBorderRatio`] if the border ratio is not in `[0, 1]`.
    pub fn new(config: MatcherConfig) -> Result<Self, FiducialError> {
        check_matching_dim(config.matching_dim)?;
        check_border_ratio(config.border_ratio)?;
        Ok(Self {
            patch: Image::from_size_val([config.matching_dim, config.matching_dim].into(), 0)?,
            config,
            templates: Vec::new(),
            revision: 0,
            engine: None,
        })
    }

    /// Returns a reference to the matcher configuration.
    #[inline]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: MatcherConfig) -> Result<(), FiducialError> {
        check_matching_dim(config.matching_dim)?;
        check_border_ratio(config.border_ratio)?;
        self.config = config;
        Ok(())
    }

    /// Selects the comparison metric.
    pub fn set_metric(&mut self, metric: MatchMetric) {
        self.config.metric = metric;
    }

    /// Selects the working resolution.
    pub fn set_matching_dim(&mut self, dim: usize) -> Result<(), FiducialError> {
        check_matching_dim(dim)?;
        self.config.matching_dim = dim;
        Ok(())
    }

    /// Sets the ratio of the marker border width to the marker dimension.
    pub fn set_border_ratio(&mut self, border_ratio: f32) -> Result<(), FiducialError> {
        check_border_ratio(border_ratio)?;
        self.config.border_ratio = border_ratio;
        Ok(())
    }

    /// The templates in the library, ordered by id.
    #[inline]
    pub fn templates(&self) -> &[MarkerTemplate] {
        &self.templates
    }

    /// The template with the given id.
    pub fn template(&self, id: usize) -> Option<&MarkerTemplate> {
        self.templates.get(id)
    }

    /// Adds a template and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`FiducialError::InvalidInput`] if the image is empty.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        image: Image<u8, 1>,
    ) -> Result<usize, FiducialError> {
        self.push_template(name.into(), image, None)
    }

    /// Adds a template together with the physical size of the printed marker.
    pub fn add_sized_template(
        &mut self,
        name: impl Into<String>,
        image: Image<u8, 1>,
        physical_size: Vec2,
    ) -> Result<usize, FiducialError> {
        self.push_template(name.into(), image, Some(physical_size))
    }

    fn push_template(
        &mut self,
        name: String,
        image: Image<u8, 1>,
        physical_size: Option<Vec2>,
    ) -> Result<usize, FiducialError> {
        if image.is_empty() {
            return Err(FiducialError::InvalidInput);
        }
        let id = self.templates.len();
        self.templates.push(MarkerTemplate {
            id,
            name,
            image,
            physical_size,
        });
        self.revision += 1;
        Ok(id)
    }

    /// Adds several templates and returns how many were added.
    ///
    /// Templates before the first invalid image are kept.
    pub fn add_templates<I, S>(&mut self, templates: I) -> Result<usize, FiducialError>
    where
        I: IntoIterator<Item = (S, Image<u8, 1>)>,
        S: Into<String>,
    {
        let mut added = 0;
        for (name, image) in templates {
            self.add_template(name, image)?;
            added += 1;
        }
        Ok(added)
    }

    /// Adds the templates resolved by `loader` for the given specifier.
    pub fn load_templates(
        &mut self,
        loader: &impl TemplateLoader,
        spec: &str,
    ) -> Result<usize, FiducialError> {
        let loaded = loader.load(spec)?;
        log::debug!("loaded {} templates for '{spec}'", loaded.len());
        self.add_templates(loaded)
    }

    /// Removes templates and renumbers the remaining ones densely.
    ///
    /// Returns the number of removed templates. Unknown names are ignored.
    pub fn remove_templates(&mut self, selector: TemplateSelector) -> usize {
        let before = self.templates.len();
        match selector {
            TemplateSelector::All => self.templates.clear(),
            TemplateSelector::Names(names) => {
                for name in names {
                    if let Some(idx) = self.templates.iter().position(|t| t.name == name) {
                        self.templates.remove(idx);
                    }
                }
                for (id, template) in self.templates.iter_mut().enumerate() {
                    template.id = id;
                }
            }
        }

        let removed = before - self.templates.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    /// Sizes of the rectified patch with and without the marker border.
    pub fn quad_rectification_sizes(&self) -> (ImageSize, ImageSize) {
        let d = self.config.matching_dim;
        let with_border = ((1.0 + self.config.border_ratio) * d as f32) as usize;
        (
            [with_border, with_border].into(),
            [d, d].into(),
        )
    }

    fn update_engine(&mut self) -> Result<(), FiducialError> {
        let key = EngineKey {
            metric: self.config.metric,
            dim: self.config.matching_dim,
            revision: self.revision,
        };
        if self.engine.as_ref().map(|(k, _)| *k) != Some(key) {
            log::debug!(
                "preparing {} templates for {} at {}x{}",
                self.templates.len(),
                key.metric,
                key.dim,
                key.dim
            );
            let engine = MatchEngine::build(&self.templates, key.metric, key.dim)?;
            self.engine = Some((key, engine));
        }
        Ok(())
    }

    /// Finds the best matching template and rotation for a patch.
    ///
    /// The patch is scaled to the working resolution when its size differs. No error
    /// threshold is applied; see [`MarkerMatcher::classify_patch`].
    ///
    /// # Errors
    ///
    /// Returns [`FiducialError::InvalidInput`] if the patch is empty.
    pub fn classify(&mut self, patch: &Image<u8, 1>) -> Result<MatchResult, FiducialError> {
        if patch.is_empty() {
            return Err(FiducialError::InvalidInput);
        }
        if self.templates.is_empty() {
            log::warn!("no marker templates loaded");
            return Ok(MatchResult {
                id: None,
                rotation: 0,
                error: f32::INFINITY,
            });
        }

        self.update_engine()?;

        let dim = self.config.matching_dim;
        let data = if patch.size() == [dim, dim].into() {
            patch.as_slice()
        } else {
            if self.patch.size() != [dim, dim].into() {
                self.patch = Image::from_size_val([dim, dim].into(), 0)?;
            }
            resize_nearest(patch, &mut self.patch)?;
            self.patch.as_slice()
        };

        match &self.engine {
            Some((_, engine)) => Ok(engine.best_match(data)),
            None => Err(FiducialError::InvalidInput),
        }
    }

    /// Classifies a patch and applies the acceptance threshold.
    ///
    /// Returns `None` for a rejected patch, or a result with the id [`REJECTED_ID`] and
    /// rotation zero when `return_rejected` is set.
    pub fn classify_patch(
        &mut self,
        patch: &Image<u8, 1>,
    ) -> Result<Option<MatchResult>, FiducialError> {
        let result = self.classify(patch)?;
        if result.id.is_some() && result.error < self.config.max_error {
            Ok(Some(result))
        } else if self.config.return_rejected {
            Ok(Some(MatchResult {
                id: Some(REJECTED_ID),
                rotation: 0,
                error: result.error,
            }))
        } else {
            Ok(None)
        }
    }
}

fn check_matching_dim(dim: usize) -> Result<(), FiducialError> {
    if (MIN_MATCHING_DIM..=MAX_MATCHING_DIM).contains(&dim) {
        Ok(())
    } else {
        Err(FiducialError::InvalidMatchingDim(dim))
    }
}

fn check_border_ratio(border_ratio: f32) -> Result<(), FiducialError> {
    if (0.0..=1.0).contains(&border_ratio) {
        Ok(())
    } else {
        Err(FiducialError::InvalidBorderRatio(border_ratio))
    }
}

/// Renders a printable marker: the template surrounded by a black border, scaled to `size`.
///
/// The border adds `border_ratio` times the template size to each dimension, split evenly
/// between both sides.
pub fn create_marker_image(
    template: &Image<u8, 1>,
    size: ImageSize,
    border_ratio: f32,
) -> Result<Image<u8, 1>, FiducialError> {
    if template.is_empty()
        || size.area() == 0
        || !border_ratio.is_finite()
        || border_ratio < 0.0
    {
        return Err(FiducialError::InvalidInput);
    }

    let (w, h) = (template.width(), template.height());
    let canvas_size = ImageSize {
        width: (w as f32 * (1.0 + border_ratio)) as usize,
        height: (h as f32 * (1.0 + border_ratio)) as usize,
    };
    let x0 = (w as f32 * border_ratio * 0.5) as usize;
    let y0 = (h as f32 * border_ratio * 0.5) as usize;

    let mut canvas = Image::from_size_val(canvas_size, 0u8)?;
    let cw = canvas.width();
    let dst = canvas.as_slice_mut();
    for (y, row) in template.as_slice().chunks_exact(w).enumerate() {
        let start = (y0 + y) * cw + x0;
        dst[start..start + w].copy_from_slice(row);
    }

    let mut marker = Image::from_size_val(size, 0u8)?;
    resize_nearest(&canvas, &mut marker)?;
    Ok(marker)
}
