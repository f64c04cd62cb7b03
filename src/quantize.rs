//! Generalized LBG (Linde-Buzo-Gray) vector quantization over colour
//! vectors.
//!
//! The quantizer seeds a single cluster with the global mean, then grows the
//! codebook by repeatedly splitting the most distorted clusters and relaxing
//! the result with nearest-centroid refinement passes. Clusters are threaded
//! through two intrusive lists by their `next` index: one ordered by
//! descending distortion (split candidates) and one of empty clusters
//! awaiting recycling.

use crate::color::Colorf;

/// One quantization cluster.
#[derive(Debug, Clone, Copy)]
pub struct Cluster {
  pub centroid: Colorf,
  /// Running sum of the member points.
  train: Colorf,
  /// Running sum of per-channel absolute deviation from the centroid.
  dev: Colorf,
  /// Total perceptual distortion of the members.
  distortion: f32,
  /// Most distorted member seen while training.
  max_dist_idx: i32,
  max_dist_val: f32,
  /// Number of points currently assigned.
  count: u32,
  /// Link for the intrusive distortion/empty lists, -1 terminates.
  next: i32,
}

impl Default for Cluster {
  fn default() -> Self {
    Cluster {
      centroid: Colorf::ZERO,
      train: Colorf::ZERO,
      dev: Colorf::ZERO,
      distortion: 0.0,
      max_dist_idx: -1,
      max_dist_val: 0.0,
      count: 0,
      next: -1,
    }
  }
}

impl Cluster {
  /// Clears training statistics while keeping the centroid and list link.
  fn clear_training(&mut self) {
    self.train = Colorf::ZERO;
    self.dev = Colorf::ZERO;
    self.distortion = 0.0;
    self.max_dist_idx = -1;
    self.max_dist_val = 0.0;
    self.count = 0;
  }

  /// Accumulates point `idx`. `dist` is its perceptual distance to the
  /// current centroid, measured before any resolve.
  fn train_point(&mut self, px: Colorf, idx: usize, dist: f32) {
    self.train = self.train + px;
    self.dev = self.dev + (px - self.centroid).abs();
    self.distortion += dist;
    if dist > self.max_dist_val {
      self.max_dist_idx = idx as i32;
      self.max_dist_val = dist;
    }
    self.count += 1;
  }

  /// Moves the centroid to the mean of the trained points. An empty set
  /// leaves the centroid untouched and reports failure.
  fn resolve(&mut self) -> bool {
    if self.count == 0 {
      return false;
    }
    self.centroid = self.train / self.count as f32;
    true
  }

  /// Mean absolute deviation of the members, the per-channel step used to
  /// offset a split pair away from the shared centroid.
  fn split_step(&self) -> Colorf {
    self.dev / self.count as f32
  }

  pub fn point_count(&self) -> u32 {
    self.count
  }

  pub fn distortion(&self) -> f32 {
    self.distortion
  }
}

/// Inserts `idx` into the distortion list (head = most distorted, descending)
/// and returns the new head. Zero-distortion clusters are not splittable and
/// are left out. On equal distortion the earlier-inserted cluster stays
/// nearer the head.
fn insert_by_distortion(clusters: &mut [Cluster], idx: usize, head: i32) -> i32 {
  let dist = clusters[idx].distortion;
  if dist == 0.0 {
    return head;
  }
  let mut prev = -1i32;
  let mut cur = head;
  while cur != -1 && dist <= clusters[cur as usize].distortion {
    prev = cur;
    cur = clusters[cur as usize].next;
  }
  clusters[idx].next = cur;
  if prev == -1 {
    idx as i32
  } else {
    clusters[prev as usize].next = idx as i32;
    head
  }
}

/// Re-clusters the members of `owner` between the clusters `lo` and `hi` by
/// nearest centroid and resolves both.
fn recluster(clusters: &mut [Cluster], lo: usize, hi: usize, owner: i32, data: &[Colorf], assignments: &mut [i32]) {
  clusters[lo].clear_training();
  clusters[hi].clear_training();
  let lo_c = clusters[lo].centroid;
  let hi_c = clusters[hi].centroid;
  for (i, &px) in data.iter().enumerate() {
    if assignments[i] != owner {
      continue;
    }
    let to_lo = px.perceptual_dist2(lo_c);
    let to_hi = px.perceptual_dist2(hi_c);
    if to_hi < to_lo {
      assignments[i] = hi as i32;
      clusters[hi].train_point(px, i, to_hi);
    } else {
      assignments[i] = lo as i32;
      clusters[lo].train_point(px, i, to_lo);
    }
  }
  clusters[lo].resolve();
  clusters[hi].resolve();
}

/// Splits `src` into the pair (`src`, `dst`): both centroids are offset from
/// the source centroid by its deviation step, then the source's former
/// members are re-clustered between the two by nearest centroid.
///
/// A perfectly symmetric member set can tie every point onto one side and
/// leave the other empty; when that happens the empty half is reseeded on
/// the survivor's most distorted member point and the pair is re-clustered
/// once more.
fn split(clusters: &mut [Cluster], src: usize, dst: usize, data: &[Colorf], assignments: &mut [i32]) {
  let step = clusters[src].split_step();
  let mid = clusters[src].centroid;
  clusters[src].centroid = mid - step;
  clusters[dst].centroid = mid + step;
  recluster(clusters, src, dst, src as i32, data, assignments);

  let (full, hole) = if clusters[dst].count == 0 {
    (src, dst)
  } else if clusters[src].count == 0 {
    (dst, src)
  } else {
    return;
  };
  let seed = clusters[full].max_dist_idx;
  if seed < 0 {
    return;
  }
  clusters[hole].centroid = data[seed as usize];
  recluster(clusters, full, hole, full as i32, data, assignments);
}

/// Runs vector quantization over `data`, converging up to `clusters.len()`
/// centroids and writing each point's cluster index into `assignments`.
///
/// Returns the number of clusters actually brought into play; degenerate
/// data (empty, or fewer unique colours than requested) resolves fewer
/// clusters and is not an error. Unused cluster slots keep zero centroids.
pub fn quantize(clusters: &mut [Cluster], data: &[Colorf], assignments: &mut [i32], passes: u32) -> usize {
  let k = clusters.len();
  if k == 0 || data.is_empty() {
    return 0;
  }
  debug_assert_eq!(data.len(), assignments.len());
  let passes = passes.max(1);

  // seed cluster 0 with the arithmetic mean of the whole set
  for c in clusters.iter_mut() {
    *c = Cluster::default();
  }
  let mut sum = Colorf::ZERO;
  for (i, &px) in data.iter().enumerate() {
    assignments[i] = 0;
    sum = sum + px;
  }
  clusters[0].centroid = sum / data.len() as f32;

  // retrain against the mean so the distortion statistics are populated
  let seed_c = clusters[0].centroid;
  for (i, &px) in data.iter().enumerate() {
    let d = px.perceptual_dist2(seed_c);
    clusters[0].train_point(px, i, d);
  }
  clusters[0].resolve();
  if clusters[0].distortion == 0.0 {
    // every point is identical; one cluster describes the set
    return 1;
  }

  let mut head = insert_by_distortion(clusters, 0, -1);
  let mut empty_head = -1i32;
  let mut active = 1usize;
  let mut last_total = f32::INFINITY;
  let mut total = 0.0f32;

  while active < k {
    if head == -1 {
      break; // nothing left worth splitting
    }

    // binary-splitting round: one split per cluster active at round entry
    let rounds = active;
    for _ in 0..rounds {
      let src = match head {
        -1 => break,
        s => {
          head = clusters[s as usize].next;
          s as usize
        }
      };
      let dst = if empty_head != -1 {
        let d = empty_head as usize;
        empty_head = clusters[d].next;
        d
      } else if active < k {
        active += 1;
        active - 1
      } else {
        break; // target count reached
      };
      split(clusters, src, dst, data, assignments);
      for idx in [src, dst] {
        if clusters[idx].count > 0 {
          head = insert_by_distortion(clusters, idx, head);
        } else {
          clusters[idx].next = empty_head;
          empty_head = idx as i32;
        }
      }
    }

    // refinement passes over the grown codebook
    let mut pass_last = f32::INFINITY;
    for pass in 0..passes {
      total = 0.0;
      for c in clusters[..active].iter_mut() {
        c.clear_training();
      }
      for (i, &px) in data.iter().enumerate() {
        let mut best = 0usize;
        let mut best_dist = f32::INFINITY;
        for (j, c) in clusters[..active].iter().enumerate() {
          let d = px.perceptual_dist2(c.centroid);
          if d < best_dist {
            best = j;
            best_dist = d;
          }
        }
        assignments[i] = best as i32;
        clusters[best].train_point(px, i, best_dist);
        total += best_dist;
      }

      head = -1;
      empty_head = -1;
      for j in 0..active {
        if clusters[j].resolve() {
          head = insert_by_distortion(clusters, j, head);
        } else {
          clusters[j].next = empty_head;
          empty_head = j as i32;
        }
      }

      // recycle collapsed clusters out of the most distorted ones
      while empty_head != -1 && head != -1 {
        let src = head as usize;
        head = clusters[src].next;
        let dst = empty_head as usize;
        empty_head = clusters[dst].next;
        split(clusters, src, dst, data, assignments);
      }

      log::trace!("refinement pass {pass}: {active} clusters, total distortion {total}");
      if total == 0.0 || total >= pass_last {
        break;
      }
      pass_last = total;
    }

    // stop growing once the solution stops moving
    if total == 0.0 || total == last_total {
      break;
    }
    last_total = total;
  }

  log::debug!(
    "quantized {} points into {active} of {k} clusters, total distortion {total}",
    data.len()
  );
  active
}
