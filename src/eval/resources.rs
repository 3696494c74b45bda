// eval/resources.rs - External numeric providers and parameter values
//
// Curves, noise generators and images are opaque read-only resources that
// nodes reference through parameters. Every provider exposes both a scalar
// sampler and a cheap conservative bound, which the interval analyzer uses
// as an opaque leaf value. Providers must be safe to read from many threads.

use crate::eval::interval::Interval;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A 1D transfer curve.
pub trait CurveSource: Send + Sync + fmt::Debug {
    fn sample(&self, x: f64) -> f64;

    /// Bound of `sample` over the whole real line.
    fn range(&self) -> Interval;

    /// Bound of `sample` over `input`. Implementors may tighten this; the
    /// default falls back to the global range.
    fn range_over(&self, _input: Interval) -> Interval {
        self.range()
    }
}

/// A coherent noise generator sampled in 2D or 3D.
pub trait NoiseSource: Send + Sync + fmt::Debug {
    fn sample_2d(&self, x: f64, y: f64) -> f64;
    fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64;

    /// Bound of both samplers over all inputs.
    fn range(&self) -> Interval;
}

/// A single-channel 2D image.
pub trait ImageSource: Send + Sync + fmt::Debug {
    fn sample(&self, x: f64, y: f64) -> f64;

    /// Bound of `sample` over all inputs.
    fn range(&self) -> Interval;
}

// ── Parameter values ────────────────────────────────────────────────

/// The kind of value a node parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Curve,
    Noise,
    Image,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::Curve => "curve",
            ParamKind::Noise => "noise",
            ParamKind::Image => "image",
        }
    }

    /// The value a freshly created node holds for this kind of parameter.
    pub(crate) fn default_value(self, number: f64) -> ParamValue {
        match self {
            ParamKind::Number => ParamValue::Number(number),
            ParamKind::Curve => ParamValue::Curve(None),
            ParamKind::Noise => ParamValue::Noise(None),
            ParamKind::Image => ParamValue::Image(None),
        }
    }
}

/// A node parameter. Resource parameters may be unassigned (`None`), which
/// is allowed while editing but rejected by the compiler.
#[derive(Clone, Debug)]
pub enum ParamValue {
    Number(f64),
    Curve(Option<Arc<dyn CurveSource>>),
    Noise(Option<Arc<dyn NoiseSource>>),
    Image(Option<Arc<dyn ImageSource>>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Number(_) => ParamKind::Number,
            ParamValue::Curve(_) => ParamKind::Curve,
            ParamValue::Noise(_) => ParamKind::Noise,
            ParamValue::Image(_) => ParamKind::Image,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn curve(curve: impl CurveSource + 'static) -> Self {
        ParamValue::Curve(Some(Arc::new(curve)))
    }

    pub fn noise(noise: impl NoiseSource + 'static) -> Self {
        ParamValue::Noise(Some(Arc::new(noise)))
    }

    pub fn image(image: impl ImageSource + 'static) -> Self {
        ParamValue::Image(Some(Arc::new(image)))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

/// Compare two shared resources by identity (data pointer only).
fn same_arc<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

fn same_opt<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_arc(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Number(a), ParamValue::Number(b)) => a == b,
            (ParamValue::Curve(a), ParamValue::Curve(b)) => same_opt(a, b),
            (ParamValue::Noise(a), ParamValue::Noise(b)) => same_opt(a, b),
            (ParamValue::Image(a), ParamValue::Image(b)) => same_opt(a, b),
            _ => false,
        }
    }
}

// ── Resource library ────────────────────────────────────────────────

/// Named resources, used to resolve resource parameters when loading a
/// graph document and to name them again when saving one.
#[derive(Default, Clone)]
pub struct ResourceLibrary {
    curves: FxHashMap<String, Arc<dyn CurveSource>>,
    noises: FxHashMap<String, Arc<dyn NoiseSource>>,
    images: FxHashMap<String, Arc<dyn ImageSource>>,
}

impl ResourceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_curve(&mut self, name: impl Into<String>, curve: Arc<dyn CurveSource>) {
        self.curves.insert(name.into(), curve);
    }

    pub fn add_noise(&mut self, name: impl Into<String>, noise: Arc<dyn NoiseSource>) {
        self.noises.insert(name.into(), noise);
    }

    pub fn add_image(&mut self, name: impl Into<String>, image: Arc<dyn ImageSource>) {
        self.images.insert(name.into(), image);
    }

    /// Resolve `name` into a parameter value of the requested kind.
    pub fn resolve(&self, kind: ParamKind, name: &str) -> Option<ParamValue> {
        match kind {
            ParamKind::Number => None,
            ParamKind::Curve => self
                .curves
                .get(name)
                .map(|c| ParamValue::Curve(Some(c.clone()))),
            ParamKind::Noise => self
                .noises
                .get(name)
                .map(|n| ParamValue::Noise(Some(n.clone()))),
            ParamKind::Image => self
                .images
                .get(name)
                .map(|i| ParamValue::Image(Some(i.clone()))),
        }
    }

    /// Reverse lookup: the library name of the resource held by `value`.
    pub fn name_of(&self, value: &ParamValue) -> Option<&str> {
        fn find<'a, T: ?Sized>(map: &'a FxHashMap<String, Arc<T>>, r: &Arc<T>) -> Option<&'a str> {
            map.iter()
                .find(|(_, v)| same_arc(v, r))
                .map(|(k, _)| k.as_str())
        }
        match value {
            ParamValue::Curve(Some(c)) => find(&self.curves, c),
            ParamValue::Noise(Some(n)) => find(&self.noises, n),
            ParamValue::Image(Some(i)) => find(&self.images, i),
            _ => None,
        }
    }
}
