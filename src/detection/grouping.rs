//! Merge overlapping raw detections into final face regions

use crate::types::FaceRegion;

/// Two rectangles belong to the same object when every edge is within `eps` of the smaller size
fn similar(a: &FaceRegion, b: &FaceRegion, eps: f64) -> bool {
    let delta = eps
        * f64::from(a.width.min(b.width) + a.height.min(b.height))
        * 0.5;
    f64::from((a.x - b.x).abs()) <= delta
        && f64::from((a.y - b.y).abs()) <= delta
        && f64::from((a.x + a.width - b.x - b.width).abs()) <= delta
        && f64::from((a.y + a.height - b.y - b.height).abs()) <= delta
}

/// Label equivalence classes of `rects` under [`similar`]
fn partition(rects: &[FaceRegion], eps: f64) -> (Vec<usize>, usize) {
    let mut parent: Vec<usize> = (0..rects.len()).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while let Some(&p) = parent.get(i) {
            if p == i {
                break;
            }
            let grand = parent.get(p).copied().unwrap_or(p);
            if let Some(slot) = parent.get_mut(i) {
                *slot = grand;
            }
            i = p;
        }
        i
    }

    for (i, a) in rects.iter().enumerate() {
        for (j, b) in rects.iter().enumerate().skip(i + 1) {
            if similar(a, b, eps) {
                let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                if ri != rj {
                    if let Some(slot) = parent.get_mut(rj) {
                        *slot = ri;
                    }
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; rects.len()];
    let mut labels = Vec::with_capacity(rects.len());
    let mut classes = 0;
    for i in 0..rects.len() {
        let r = root(&mut parent, i);
        let label = match class_of_root.get(r).copied() {
            Some(existing) if existing != usize::MAX => existing,
            _ => {
                if let Some(slot) = class_of_root.get_mut(r) {
                    *slot = classes;
                }
                classes += 1;
                classes - 1
            },
        };
        labels.push(label);
    }
    (labels, classes)
}

/// Cluster raw detections, average each cluster and keep clusters with more than `min_neighbors` members
///
/// Clusters that sit inside a stronger cluster are dropped as well.
pub fn group_rectangles(rects: &[FaceRegion], min_neighbors: usize, eps: f64) -> Vec<FaceRegion> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, classes) = partition(rects, eps);
    let mut sums = vec![[0_i64; 4]; classes];
    let mut counts = vec![0_usize; classes];
    for (rect, &label) in rects.iter().zip(&labels) {
        if let (Some(sum), Some(count)) = (sums.get_mut(label), counts.get_mut(label)) {
            sum[0] += i64::from(rect.x);
            sum[1] += i64::from(rect.y);
            sum[2] += i64::from(rect.width);
            sum[3] += i64::from(rect.height);
            *count += 1;
        }
    }

    let averaged: Vec<FaceRegion> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| {
            let s = 1.0 / count.max(1) as f64;
            let avg = |v: i64| (v as f64 * s).round() as i32;
            FaceRegion::new(avg(sum[0]), avg(sum[1]), avg(sum[2]), avg(sum[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, (r1, &n1)) in averaged.iter().zip(&counts).enumerate() {
        if n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().zip(&counts).enumerate().any(|(j, (r2, &n2))| {
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (f64::from(r2.width) * eps).round() as i32;
            let dy = (f64::from(r2.height) * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.x + r1.width <= r2.x + r2.width + dx
                && r1.y + r1.height <= r2.y + r2.height + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            grouped.push(*r1);
        }
    }
    grouped
}
