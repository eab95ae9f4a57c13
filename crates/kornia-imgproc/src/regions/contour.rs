use glam::IVec2;

// 8-neighbourhood, counter-clockwise with y pointing down:
// E, NE, N, NW, W, SW, S, SE
const DX: [i32; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY: [i32; 8] = [0, -1, -1, -1, 0, 1, 1, 1];

/// Trace the outer boundary of the 8-connected set of pixels labelled `target`.
///
/// `start` must be the first pixel of the set in raster order. The result is a cyclic
/// sequence of boundary pixels where consecutive entries are 8-neighbours and the start
/// pixel appears exactly once. A single isolated pixel yields a one-element boundary.
///
/// # Arguments
///
/// * `labels` - Row-major label map.
/// * `width` - Width of the label map.
/// * `height` - Height of the label map.
/// * `start` - Raster-first pixel of the set.
/// * `target` - Label of the set to trace.
pub fn trace_boundary(
    labels: &[u32],
    width: usize,
    height: usize,
    start: IVec2,
    target: u32,
) -> Vec<IVec2> {
    let inside = |p: IVec2| {
        p.x >= 0
            && p.y >= 0
            && (p.x as usize) < width
            && (p.y as usize) < height
            && labels[p.y as usize * width + p.x as usize] == target
    };

    let mut points = vec![start];
    let mut dir = 7usize;
    let mut curr = start;

    // every boundary pixel is visited at most four times
    for _ in 0..4 * width * height + 8 {
        let first = if dir % 2 == 0 { (dir + 7) % 8 } else { (dir + 6) % 8 };
        let next = (0..8).map(|i| (first + i) % 8).find_map(|d| {
            let q = curr + IVec2::new(DX[d], DY[d]);
            inside(q).then_some((d, q))
        });

        let Some((d, q)) = next else {
            return points;
        };
        dir = d;
        curr = q;
        points.push(q);

        // stop once the first step is about to be repeated
        let n = points.len();
        if n >= 4 && points[n - 1] == points[1] && points[n - 2] == points[0] {
            points.truncate(n - 2);
            return points;
        }
    }

    points
}
