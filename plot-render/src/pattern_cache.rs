//! Bounded LRU cache of device-space outlines for path collections.
//!
//! Collection elements that share a shape, a linear transform, a draw
//! operation, a line width and a dash pattern differ only by a translation,
//! so their outline is tessellated once at the origin and then filled at
//! each element's offset. The cache lives for one collection draw.

use crate::path::{load_path, Path, Snapper};
use crate::style::DrawOp;
use crate::transform::linear_part;
use kurbo::Affine;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Maximum number of bytes retained by one collection's outline cache.
pub(crate) const PATTERN_CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Translation-invariant signature of one element's outline. Equality
/// compares the full path content; the content hash only speeds up lookups.
#[derive(Debug, Clone)]
pub(crate) struct PatternKey<'p> {
    path: &'p Path,
    path_hash: u64,
    /// Bits of the linear part of the device matrix.
    linear: [u64; 4],
    op: DrawOp,
    line_width: u64,
    dash: Option<(Vec<u64>, u64)>,
}

impl<'p> PatternKey<'p> {
    pub(crate) fn new(
        path: &'p Path,
        matrix: &Affine,
        op: DrawOp,
        line_width: f64,
        dash: Option<&(Vec<f64>, f64)>,
    ) -> Self {
        let [a, b, c, d, _, _] = matrix.as_coeffs();
        let (line_width, dash) = match op {
            DrawOp::Fill => (0, None),
            DrawOp::Stroke => (
                line_width.to_bits(),
                dash.map(|(list, offset)| {
                    (list.iter().map(|v| v.to_bits()).collect(), offset.to_bits())
                }),
            ),
        };
        Self {
            path,
            path_hash: path.content_hash(),
            linear: [a.to_bits(), b.to_bits(), c.to_bits(), d.to_bits()],
            op,
            line_width,
            dash,
        }
    }
}

impl PartialEq for PatternKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.path_hash == other.path_hash
            && self.linear == other.linear
            && self.op == other.op
            && self.line_width == other.line_width
            && self.dash == other.dash
            && self.path.same_content(other.path)
    }
}

impl Eq for PatternKey<'_> {}

impl Hash for PatternKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path_hash.hash(state);
        self.linear.hash(state);
        self.op.hash(state);
        self.line_width.hash(state);
        self.dash.hash(state);
    }
}

/// Tessellate `path` under the linear part of `matrix`: the filled region for
/// [`DrawOp::Fill`], the stroke outline for [`DrawOp::Stroke`].
pub(crate) fn outline(
    path: &Path,
    matrix: &Affine,
    op: DrawOp,
    stroke: Option<&tiny_skia::Stroke>,
) -> Option<tiny_skia::Path> {
    let loaded = load_path(path, &linear_part(matrix), Snapper::Off)?;
    match op {
        DrawOp::Fill => Some(loaded),
        DrawOp::Stroke => loaded.stroke(stroke?, 1.0),
    }
}

/// Hit and miss counters of a collection draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Outlines reused from the cache.
    pub hits: usize,
    /// Outlines tessellated and inserted.
    pub misses: usize,
    /// Outlines tessellated with the cache disabled.
    pub bypassed: usize,
}

impl CacheStats {
    /// Number of tessellations performed.
    pub fn tessellations(&self) -> usize {
        self.misses + self.bypassed
    }
}

#[derive(Debug)]
struct PatternEntry {
    outline: Arc<tiny_skia::Path>,
    size_bytes: usize,
    last_used: u64,
}

#[derive(Debug)]
pub(crate) struct PatternCache<'p> {
    enabled: bool,
    max_bytes: usize,
    total_bytes: usize,
    clock: u64,
    entries: HashMap<PatternKey<'p>, PatternEntry>,
    stats: CacheStats,
}

fn path_bytes(path: &tiny_skia::Path) -> usize {
    path.points().len() * std::mem::size_of::<tiny_skia::Point>() + path.verbs().len()
}

impl<'p> PatternCache<'p> {
    /// A cache holding at most `max_bytes` of outlines; a disabled cache
    /// tessellates every lookup.
    pub(crate) fn new(max_bytes: usize, enabled: bool) -> Self {
        Self {
            enabled,
            max_bytes,
            total_bytes: 0,
            clock: 0,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    fn touch(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// The cached outline for `key`, tessellating it with `tessellate` on a
    /// miss. `None` when the outline is empty.
    pub(crate) fn get_or_insert(
        &mut self,
        key: PatternKey<'p>,
        tessellate: impl FnOnce() -> Option<tiny_skia::Path>,
    ) -> Option<Arc<tiny_skia::Path>> {
        if !self.enabled {
            self.stats.bypassed += 1;
            return tessellate().map(Arc::new);
        }

        let now = self.touch();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = now;
            self.stats.hits += 1;
            return Some(entry.outline.clone());
        }

        self.stats.misses += 1;
        let outline = Arc::new(tessellate()?);
        let size_bytes = path_bytes(&outline);
        if size_bytes <= self.max_bytes {
            self.total_bytes += size_bytes;
            self.entries.insert(
                key,
                PatternEntry {
                    outline: outline.clone(),
                    size_bytes,
                    last_used: now,
                },
            );
            self.shrink();
        }
        Some(outline)
    }

    /// Drop least recently used outlines until the byte budget holds.
    fn shrink(&mut self) {
        while self.total_bytes > self.max_bytes {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            let Some(entry) = oldest.and_then(|key| self.entries.remove(&key)) else {
                break;
            };
            self.total_bytes -= entry.size_bytes;
            log::trace!(target: "render", "evicted {} byte outline", entry.size_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Path {
        Path::rectangle(0.0, 0.0, 1.0, 1.0)
    }

    fn key<'p>(path: &'p Path, matrix: &Affine, op: DrawOp) -> PatternKey<'p> {
        PatternKey::new(path, matrix, op, 2.0, None)
    }

    #[test]
    fn test_key_ignores_translation() {
        let a = Affine::new([10.0, 0.0, 0.0, -10.0, 5.0, 7.0]);
        let b = Affine::new([10.0, 0.0, 0.0, -10.0, 50.0, 70.0]);
        let c = Affine::new([20.0, 0.0, 0.0, -10.0, 5.0, 7.0]);
        let path = square();
        assert_eq!(key(&path, &a, DrawOp::Fill), key(&path, &b, DrawOp::Fill));
        assert_ne!(key(&path, &a, DrawOp::Fill), key(&path, &c, DrawOp::Fill));
        assert_ne!(key(&path, &a, DrawOp::Fill), key(&path, &a, DrawOp::Stroke));
    }

    #[test]
    fn test_fill_key_ignores_stroke_settings() {
        let m = Affine::scale(3.0);
        let path = square();
        let dash = (vec![1.0, 2.0], 0.0);
        assert_eq!(
            PatternKey::new(&path, &m, DrawOp::Fill, 1.0, Some(&dash)),
            PatternKey::new(&path, &m, DrawOp::Fill, 4.0, None)
        );
        assert_ne!(
            PatternKey::new(&path, &m, DrawOp::Stroke, 1.0, Some(&dash)),
            PatternKey::new(&path, &m, DrawOp::Stroke, 1.0, None)
        );
    }

    #[test]
    fn test_hash_collision_does_not_share_outline() {
        let m = Affine::scale(10.0);
        let small = square();
        let wide = Path::rectangle(0.0, 0.0, 2.0, 1.0);
        assert_eq!(small.len(), wide.len());
        let first = key(&small, &m, DrawOp::Fill);
        let mut colliding = key(&wide, &m, DrawOp::Fill);
        colliding.path_hash = first.path_hash;
        assert_ne!(first, colliding);

        let mut cache = PatternCache::new(PATTERN_CACHE_MAX_BYTES, true);
        let a = cache
            .get_or_insert(first, || outline(&small, &m, DrawOp::Fill, None))
            .unwrap();
        let b = cache
            .get_or_insert(colliding, || outline(&wide, &m, DrawOp::Fill, None))
            .unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(a.bounds().width(), 10.0);
        assert_eq!(b.bounds().width(), 20.0);
    }

    #[test]
    fn test_hits_and_misses() {
        let mut cache = PatternCache::new(PATTERN_CACHE_MAX_BYTES, true);
        let m = Affine::scale(10.0);
        let path = square();
        let mut created = 0;
        for _ in 0..5 {
            let result = cache.get_or_insert(key(&path, &m, DrawOp::Fill), || {
                created += 1;
                outline(&path, &m, DrawOp::Fill, None)
            });
            assert!(result.is_some());
        }
        assert_eq!(created, 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 4,
                misses: 1,
                bypassed: 0
            }
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disabled_cache_tessellates_every_time() {
        let mut cache = PatternCache::new(PATTERN_CACHE_MAX_BYTES, false);
        let m = Affine::scale(10.0);
        let path = square();
        for _ in 0..3 {
            cache.get_or_insert(key(&path, &m, DrawOp::Fill), || {
                outline(&path, &m, DrawOp::Fill, None)
            });
        }
        assert_eq!(cache.stats().bypassed, 3);
        assert_eq!(cache.stats().tessellations(), 3);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let m = Affine::scale(10.0);
        let small = square();
        let other = Path::rectangle(0.0, 0.0, 2.0, 1.0);
        let size = path_bytes(&outline(&small, &m, DrawOp::Fill, None).unwrap());
        let mut cache = PatternCache::new(size, true);
        cache.get_or_insert(key(&small, &m, DrawOp::Fill), || {
            outline(&small, &m, DrawOp::Fill, None)
        });
        cache.get_or_insert(key(&other, &m, DrawOp::Fill), || {
            outline(&other, &m, DrawOp::Fill, None)
        });
        assert_eq!(cache.len(), 1);
        assert!(cache.total_bytes() <= size);
        // The first entry was evicted and must be tessellated again.
        cache.get_or_insert(key(&small, &m, DrawOp::Fill), || {
            outline(&small, &m, DrawOp::Fill, None)
        });
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_stroke_outline_is_wider_than_fill() {
        let m = Affine::scale(10.0);
        let path = square();
        let stroke = tiny_skia::Stroke {
            width: 2.0,
            ..Default::default()
        };
        let fill = outline(&path, &m, DrawOp::Fill, None).unwrap();
        let stroked = outline(&path, &m, DrawOp::Stroke, Some(&stroke)).unwrap();
        assert!(stroked.bounds().width() > fill.bounds().width());
        assert!(outline(&path, &m, DrawOp::Stroke, None).is_none());
    }
}
