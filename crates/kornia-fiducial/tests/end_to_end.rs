//! Detection of synthetic markers from the binary image up to the template id.

use glam::Vec2;
use kornia_fiducial::{
    create_marker_image, FiducialDetector, FiducialDetectorConfig, FiducialError, QuadColor,
    QuadDetector, QuadDetectorConfig,
};
use kornia_image::{Image, ImageSize};
use kornia_imgproc::calibration::DistortionModel;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const SIZE: ImageSize = ImageSize {
    width: 200,
    height: 200,
};

// 4x4 cells with a black L that has no rotational symmetry
fn template() -> Image<u8, 1> {
    let cells = [
        255, 255, 255, 255, //
        255, 0, 0, 255, //
        255, 0, 255, 255, //
        255, 255, 255, 255,
    ];
    Image::from_fn([4, 4].into(), |x, y| [cells[y * 4 + x]])
}

// the marker rendered at 120x120 on a white background, top left at (40, 40)
fn marker_scene(marker: &Image<u8, 1>) -> Image<u8, 1> {
    Image::from_fn(SIZE, |x, y| {
        if (40..160).contains(&x) && (40..160).contains(&y) {
            [marker.as_slice()[(y - 40) * 120 + x - 40]]
        } else {
            [255]
        }
    })
}

fn rotate_scene(scene: &Image<u8, 1>, quarter_turns: usize) -> Image<u8, 1> {
    kornia_imgproc::rotate::rotate90_n(scene, quarter_turns)
}

fn detector() -> Result<FiducialDetector, Box<dyn std::error::Error>> {
    let mut config = FiducialDetectorConfig::default();
    config.quad.quad_color = QuadColor::BlackOnly;
    config.matcher.border_ratio = 0.5;

    let mut detector = FiducialDetector::new(config)?;
    detector.matcher_mut().add_template("ell", template())?;
    Ok(detector)
}

#[test]
fn white_square_is_one_quad() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let image = Image::from_fn(SIZE, |x, y| {
        let inside = (70..130).contains(&x) && (70..130).contains(&y);
        [if inside { 255 } else { 0 }]
    });

    let mut detector = QuadDetector::new(QuadDetectorConfig {
        quad_color: QuadColor::WhiteOnly,
        ..Default::default()
    });
    let quads = detector.detect(&image)?;
    assert_eq!(quads.len(), 1);

    let expected = [
        Vec2::new(70.0, 70.0),
        Vec2::new(130.0, 70.0),
        Vec2::new(130.0, 130.0),
        Vec2::new(70.0, 130.0),
    ];
    for e in expected {
        let nearest = quads[0]
            .corners
            .iter()
            .map(|c| c.distance(e))
            .fold(f32::INFINITY, f32::min);
        assert!(nearest < 2.0, "no corner near {e}: {:?}", quads[0].corners);
    }
    Ok(())
}

#[test]
fn marker_is_identified() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let marker = create_marker_image(&template(), [120, 120].into(), 0.5)?;
    let scene = marker_scene(&marker);

    let mut detector = detector()?;
    let fiducials = detector.detect(&scene)?;
    let found = fiducials.iter().filter(|f| f.id == 0).collect::<Vec<_>>();
    assert_eq!(found.len(), 1);

    let fiducial = found[0];
    assert_eq!(fiducial.name.as_deref(), Some("ell"));
    assert!(fiducial.error < 0.1);
    assert!(fiducial.center.distance(Vec2::new(99.5, 99.5)) < 1.0);

    // marker order starts at the top left corner of the template
    let expected = [
        Vec2::new(40.0, 40.0),
        Vec2::new(159.0, 40.0),
        Vec2::new(159.0, 159.0),
        Vec2::new(40.0, 159.0),
    ];
    for (c, e) in fiducial.corners.iter().zip(expected) {
        assert!(c.distance(e) < 1.5, "{c} vs {e}");
    }
    Ok(())
}

#[test]
fn rotated_marker_keeps_its_corner_order() -> TestResult {
    let marker = create_marker_image(&template(), [120, 120].into(), 0.5)?;
    let scene = marker_scene(&marker);
    let mut detector = detector()?;

    for turns in 1..4 {
        let rotated = rotate_scene(&scene, turns);
        let fiducials = detector.detect(&rotated)?;
        let fiducial = fiducials
            .iter()
            .find(|f| f.id == 0)
            .ok_or("marker not found")?;

        // follow the template top left corner through the quarter turns
        let mut top_left = Vec2::new(40.0, 40.0);
        for _ in 0..turns {
            top_left = Vec2::new(top_left.y, 199.0 - top_left.x);
        }
        assert!(
            fiducial.corners[0].distance(top_left) < 1.5,
            "{turns} turns: {} vs {top_left}",
            fiducial.corners[0]
        );
    }
    Ok(())
}

#[test]
fn unknown_marker_is_dropped_or_flagged() -> TestResult {
    let marker = create_marker_image(&template(), [120, 120].into(), 0.5)?;
    let scene = marker_scene(&marker);

    let mut detector = detector()?;
    detector
        .matcher_mut()
        .remove_templates(kornia_fiducial::TemplateSelector::All);
    let blank = Image::from_size_val([4, 4].into(), 255u8)?;
    detector.matcher_mut().add_template("blank", blank)?;
    assert!(detector.detect(&scene)?.is_empty());

    let mut config = detector.matcher().config().clone();
    config.return_rejected = true;
    detector.matcher_mut().set_config(config)?;
    let fiducials = detector.detect(&scene)?;
    assert!(!fiducials.is_empty());
    assert!(fiducials
        .iter()
        .all(|f| f.id == kornia_fiducial::REJECTED_ID && f.name.is_none()));
    Ok(())
}

#[test]
fn corners_are_undistorted() -> TestResult {
    let marker = create_marker_image(&template(), [120, 120].into(), 0.5)?;
    let scene = marker_scene(&marker);
    let mut detector = detector()?;

    let distorted = detector.detect(&scene)?;
    let raw = distorted.iter().find(|f| f.id == 0).ok_or("marker not found")?;

    let model = DistortionModel::from_coefficients([
        -0.05, 0.01, 0.001, -0.001, 0.0, 100.0, 100.0, 100.0, 100.0,
    ]);
    detector.set_distortion(Some(model));
    let corrected = detector.detect(&scene)?;
    let fiducial = corrected
        .iter()
        .find(|f| f.id == 0)
        .ok_or("marker not found")?;

    for (c, r) in fiducial.corners.iter().zip(raw.corners.iter()) {
        assert!(model.apply(*c).distance(*r) < 0.1, "{c} vs {r}");
    }
    assert!(model.apply(fiducial.center).distance(raw.center) < 0.1);
    Ok(())
}

#[test]
fn negative_border_ratio_is_rejected() -> TestResult {
    let mut config = FiducialDetectorConfig::default();
    config.matcher.border_ratio = -0.2;
    assert!(matches!(
        FiducialDetector::new(config),
        Err(FiducialError::InvalidBorderRatio(_))
    ));

    let mut detector = detector()?;
    assert!(detector.matcher_mut().set_border_ratio(-0.2).is_err());
    let frame = Image::from_size_val([64, 64].into(), 0u8)?;
    assert!(detector.detect(&frame)?.is_empty());
    Ok(())
}
