//! Recovery of quads whose outline is broken up by occluding objects.
//!
//! When the corner detector reports more than four corners, the longest polygon edge is
//! assumed to be a real marker edge and the remaining two corners are guessed from the
//! other corner candidates.

use glam::Vec2;

/// Which corner recovery strategies are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CornerHeuristics {
    /// Intersect the edges next to the second longest edge.
    pub intersection: bool,
    /// Walk along perpendicular directions to the nearest corner candidates.
    pub perpendicular: bool,
    /// Mirror the second longest edge at the bisector of the longest one.
    pub mirror: bool,
}

impl CornerHeuristics {
    /// All strategies enabled.
    pub fn all() -> Self {
        Self {
            intersection: true,
            perpendicular: true,
            mirror: true,
        }
    }

    /// Whether any strategy is enabled.
    pub fn any(&self) -> bool {
        self.intersection || self.perpendicular || self.mirror
    }
}

/// Intermediate corner sets collected while detecting quads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugCorners {
    /// All corner candidates per region.
    pub all: Vec<Vec<Vec2>>,
    /// End points of the longest edge per recovered region.
    pub longest: Vec<Vec<Vec2>>,
    /// End points of the second longest edge per recovered region.
    pub second_longest: Vec<Vec<Vec2>>,
    /// Quads proposed by the perpendicular strategy.
    pub perpendicular: Vec<Vec<Vec2>>,
    /// Quads proposed by the intersection strategy.
    pub intersection: Vec<Vec<Vec2>>,
    /// Quads proposed by the mirror strategy.
    pub mirror: Vec<Vec<Vec2>>,
}

impl DebugCorners {
    /// Remove all collected corners.
    pub fn clear(&mut self) {
        self.all.clear();
        self.longest.clear();
        self.second_longest.clear();
        self.perpendicular.clear();
        self.intersection.clear();
        self.mirror.clear();
    }
}

fn edges(corners: &[Vec2]) -> Vec<Vec2> {
    let n = corners.len();
    (0..n).map(|i| corners[(i + 1) % n] - corners[i]).collect()
}

/// Rectangularity score of a quad in `[0, 1]`, higher is better.
///
/// Non-finite scores are returned for degenerate quads and never pass a threshold.
pub fn quad_rating(corners: &[Vec2; 4]) -> f32 {
    let v = edges(corners);
    let len: Vec<f32> = v.iter().map(|e| e.length()).collect();

    let len_quot1 = (len[0] / len[2]).min(len[2] / len[0]);
    let len_quot2 = (len[1] / len[3]).min(len[3] / len[1]);
    let dp1 = v[0].normalize().dot(v[2].normalize()).abs().min(0.1);
    let dp2 = v[1].normalize().dot(v[3].normalize()).abs().min(0.1);

    let avg_len1 = 0.5 * (len[0] + len[2]);
    let avg_len2 = 0.5 * (len[1] + len[3]);

    // penalizes elongated quads
    let avg_len_rating = (avg_len1 / avg_len2).min(avg_len2 / avg_len1) * (dp1 / dp2).min(dp2 / dp1);
    let len_rating =
        (dp1 / len_quot2).min(len_quot2 / dp1) * (dp2 / len_quot1).min(len_quot1 / dp2);

    0.5 * (len_rating + avg_len_rating)
}

/// Sort points by their angle around the centroid.
pub fn order_clockwise(points: &mut [Vec2]) {
    if points.is_empty() {
        return;
    }
    let center = points.iter().copied().sum::<Vec2>() / points.len() as f32;
    let angle = |p: &Vec2| (p.y - center.y).atan2(p.x - center.x);
    points.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
}

fn intersect_lines(o1: Vec2, d1: Vec2, o2: Vec2, d2: Vec2) -> Option<Vec2> {
    let den = d1.perp_dot(d2);
    if den.abs() < f32::EPSILON {
        return None;
    }
    let t = (o2 - o1).perp_dot(d2) / den;
    let p = o1 + d1 * t;
    p.is_finite().then_some(p)
}

/// The longest polygon edge together with its neighbouring corners.
struct Anchor<'a> {
    corners: &'a [Vec2],
    start_idx: usize,
    end_idx: usize,
}

impl Anchor<'_> {
    fn start(&self) -> Vec2 {
        self.corners[self.start_idx]
    }

    fn end(&self) -> Vec2 {
        self.corners[self.end_idx]
    }

    fn at(&self, idx: isize) -> Vec2 {
        let n = self.corners.len() as isize;
        self.corners[idx.rem_euclid(n) as usize]
    }

    fn post_end(&self) -> Vec2 {
        self.at(self.end_idx as isize + 1)
    }

    fn pre_start(&self) -> Vec2 {
        self.at(self.start_idx as isize - 1)
    }

    // true if the edge after the anchor is longer than the one before it
    fn post_is_longer(&self) -> bool {
        (self.post_end() - self.end()).length() > (self.start() - self.pre_start()).length()
    }

    fn second_longest(&self) -> [Vec2; 2] {
        if self.post_is_longer() {
            [self.end(), self.post_end()]
        } else {
            [self.pre_start(), self.start()]
        }
    }
}

fn corners_by_intersection(anchor: &Anchor) -> Vec<Vec2> {
    let (third, o1, d1, o2, d2) = if anchor.post_is_longer() {
        let post = anchor.post_end();
        let pre = anchor.pre_start();
        let after_post = anchor.at(anchor.end_idx as isize + 2);
        (post, pre, anchor.start() - pre, post, after_post - post)
    } else {
        let post = anchor.post_end();
        let pre = anchor.pre_start();
        let before_pre = anchor.at(anchor.start_idx as isize - 2);
        (pre, post, anchor.end() - post, pre, before_pre - pre)
    };

    let mut quad = vec![third];
    if let Some(p) = intersect_lines(o1, d1, o2, d2) {
        quad.push(p);
    }
    quad
}

fn corners_by_perpendicular(anchor: &Anchor) -> Vec<Vec2> {
    let (mut start, mut end) = (anchor.start(), anchor.end());
    let ref_len = (end - start).length();
    let mut quad = Vec::with_capacity(2);

    for _ in 0..2 {
        let orth = (end - start).perp().normalize() * ref_len;
        let target = end + orth;
        let nearest = anchor
            .corners
            .iter()
            .copied()
            .fold((f32::MAX, end), |(best, p), c| {
                let dist = c.distance(target);
                if dist < best {
                    (dist, c)
                } else {
                    (best, p)
                }
            })
            .1;
        quad.push(nearest);
        start = end;
        end = nearest;
    }
    quad
}

fn corners_by_mirror(anchor: &Anchor) -> Vec<Vec2> {
    let (start, end) = (anchor.start(), anchor.end());
    let axis_origin = (start + end) * 0.5;
    let axis = (end - start).perp().normalize();

    let third = if anchor.post_is_longer() {
        anchor.post_end()
    } else {
        anchor.pre_start()
    };

    let rel = third - axis_origin;
    let proj = axis * rel.dot(axis);
    vec![third, axis_origin + proj * 2.0 - rel]
}

fn propose(anchor: &Anchor, partial: Vec<Vec2>) -> (Vec<Vec2>, f32) {
    let mut quad = partial;
    quad.push(anchor.start());
    quad.push(anchor.end());
    order_clockwise(&mut quad);

    let rating = match <[Vec2; 4]>::try_from(quad.as_slice()) {
        Ok(q) => quad_rating(&q),
        Err(_) => -1.0,
    };
    (quad, rating)
}

/// Try to recover a quad from more than four corner candidates.
///
/// Every enabled strategy proposes a quad built on the longest edge of the candidate
/// polygon; the best rated proposal is returned if its rating exceeds `min_rating`.
///
/// # Arguments
///
/// * `corners` - The corner candidates in boundary order.
/// * `min_rating` - Minimum [`quad_rating`] of an accepted quad.
/// * `heuristics` - The enabled strategies.
/// * `debug` - Collects the proposals when given.
pub fn recover_quad(
    corners: &[Vec2],
    min_rating: f32,
    heuristics: CornerHeuristics,
    mut debug: Option<&mut DebugCorners>,
) -> Option<[Vec2; 4]> {
    if !heuristics.any() || corners.len() < 3 {
        return None;
    }

    let mut start_idx = 0;
    let mut max_len = 0.0;
    for (i, e) in edges(corners).iter().enumerate() {
        if e.length() > max_len {
            start_idx = i;
            max_len = e.length();
        }
    }
    let anchor = Anchor {
        corners,
        start_idx,
        end_idx: (start_idx + 1) % corners.len(),
    };

    if let Some(d) = debug.as_deref_mut() {
        d.longest.push(vec![anchor.start(), anchor.end()]);
    }

    let mut inter = (Vec::new(), -1.0);
    let mut perp = (Vec::new(), -1.0);
    let mut mirror = (Vec::new(), -1.0);

    if heuristics.intersection {
        inter = propose(&anchor, corners_by_intersection(&anchor));
        if let Some(d) = debug.as_deref_mut() {
            d.second_longest.push(anchor.second_longest().to_vec());
            d.intersection.push(inter.0.clone());
        }
    }
    if heuristics.perpendicular {
        perp = propose(&anchor, corners_by_perpendicular(&anchor));
        if let Some(d) = debug.as_deref_mut() {
            d.perpendicular.push(perp.0.clone());
        }
    }
    if heuristics.mirror {
        mirror = propose(&anchor, corners_by_mirror(&anchor));
        if let Some(d) = debug.as_deref_mut() {
            d.second_longest.push(anchor.second_longest().to_vec());
            d.mirror.push(mirror.0.clone());
        }
    }

    let best = if perp.1 > inter.1 {
        if perp.1 > mirror.1 {
            perp
        } else {
            mirror
        }
    } else if inter.1 > mirror.1 {
        inter
    } else {
        mirror
    };

    if best.1 > min_rating {
        <[Vec2; 4]>::try_from(best.0.as_slice()).ok()
    } else {
        None
    }
}
