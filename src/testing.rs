use rand::distr::StandardUniform;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Fixed random seed to support repeatable testing
const SEED: [u8; 32] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6,
    5, 4, 3, 2, 1,
];

/// Get a random number generator with a const seed for repeatable testing
pub fn rng_fixed_seed() -> StdRng {
    StdRng::from_seed(SEED)
}

/// Generate `n` random numbers using provided generator
pub fn randn<T>(rng: &mut StdRng, n: usize) -> Vec<T>
where
    StandardUniform: rand::distr::Distribution<T>,
{
    std::iter::repeat_with(|| rng.random::<T>())
        .take(n)
        .collect()
}

/// `n` uniformly random sites in the unit square, as separate coordinate arrays
pub fn random_sites(rng: &mut StdRng, n: usize) -> (Vec<f64>, Vec<f64>) {
    let x = randn::<f64>(rng, n);
    let y = randn::<f64>(rng, n);
    (x, y)
}

/// Smooth test surface with mixed curvature
pub fn franke_like(x: f64, y: f64) -> f64 {
    (x * y).sin() - (x - y).cos() * (-(x - y).powi(2)).exp()
}

/// Analytic gradient of [`franke_like`]
pub fn franke_like_gradient(x: f64, y: f64) -> [f64; 2] {
    let d = x - y;
    let e = (-d * d).exp();
    // d/dd of -cos(d) exp(-d^2)
    let g = d.sin() * e + 2.0 * d * d.cos() * e;
    [y * (x * y).cos() + g, x * (x * y).cos() - g]
}
