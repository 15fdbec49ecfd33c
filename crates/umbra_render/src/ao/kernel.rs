//! Sampling data shared by the GPU passes and the CPU reference: the
//! hemisphere kernel, the tiled rotation noise and the binomial blur weights.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use umbra_core::params::{SSAO_BLUR_MAX_RADIUS, SSAO_MAX_SAMPLES, SSAO_NOISE_SIZE};
use umbra_math::Vec3;

/// Seed for the kernel and noise, so every run samples the same pattern.
pub const KERNEL_SEED: u64 = 0x5eed_a0;

/// Hemisphere kernel and rotation noise generated from one seeded stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    /// `SSAO_MAX_SAMPLES` offsets in the +Z hemisphere, denser near the origin
    pub kernel: Vec<Vec3>,
    /// `SSAO_NOISE_SIZE²` rotation vectors in the XY plane, row-major
    pub noise: Vec<Vec3>,
}

impl SampleSet {
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = rotation_noise(&mut rng);
        let kernel = hemisphere_kernel(&mut rng);
        Self { kernel, noise }
    }

    /// Noise vector for a pixel; the tile repeats across the screen.
    pub fn noise_at(&self, x: i32, y: i32) -> Vec3 {
        let size = SSAO_NOISE_SIZE as i32;
        let (tx, ty) = (x.rem_euclid(size), y.rem_euclid(size));
        self.noise[(ty * size + tx) as usize]
    }
}

impl Default for SampleSet {
    fn default() -> Self {
        Self::generate(KERNEL_SEED)
    }
}

fn symmetric(rng: &mut StdRng) -> f32 {
    rng.gen_range(-1.0..=1.0)
}

fn rotation_noise(rng: &mut StdRng) -> Vec<Vec3> {
    (0..SSAO_NOISE_SIZE * SSAO_NOISE_SIZE)
        .map(|_| Vec3::new(symmetric(rng), symmetric(rng), 0.0))
        .collect()
}

fn hemisphere_kernel(rng: &mut StdRng) -> Vec<Vec3> {
    (0..SSAO_MAX_SAMPLES)
        .map(|_| {
            let direction = Vec3::new(symmetric(rng), symmetric(rng), symmetric(rng) * 0.35 + 0.65).normalize();
            let x = symmetric(rng) * 0.5 + 0.5;
            direction * lerp(0.1, 1.0, x * x)
        })
        .collect()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// `n` choose `k`.
pub fn binomial(n: u32, k: u32) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k as u64).fold(1u64, |acc, i| acc * (n as u64 - i) / (i + 1))
}

/// Square table of one-sided binomial weights, row-major.
///
/// Row `r` holds the weights of a blur of radius `r`: entry `i` is
/// `C(2r, r - i)`, the weight of the tap `i` texels from the center. Entries
/// past the radius are zero.
pub fn binomial_weights() -> Vec<u32> {
    let size = SSAO_BLUR_MAX_RADIUS;
    let mut table = vec![0u32; (size * size) as usize];
    for r in 0..size {
        for i in 0..=r {
            table[(r * size + i) as usize] = binomial(2 * r, r - i) as u32;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_in_hemisphere() {
        let samples = SampleSet::default();
        assert_eq!(samples.kernel.len(), SSAO_MAX_SAMPLES as usize);
        for k in &samples.kernel {
            assert!(k.z > 0.0);
            let length = k.length();
            assert!(length >= 0.1 - 0.0001 && length <= 1.0 + 0.0001);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(SampleSet::generate(7), SampleSet::generate(7));
        assert_ne!(SampleSet::generate(7).kernel, SampleSet::generate(8).kernel);
    }

    #[test]
    fn test_noise_tiles() {
        let samples = SampleSet::default();
        assert_eq!(samples.noise.len(), 16);
        assert_eq!(samples.noise_at(1, 2), samples.noise_at(5, 6));
        assert_eq!(samples.noise_at(-1, 0), samples.noise_at(3, 0));
        assert!(samples.noise.iter().all(|n| n.z == 0.0));
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(4, 2), 6);
        assert_eq!(binomial(30, 15), 155_117_520);
        assert_eq!(binomial(3, 5), 0);
    }

    #[test]
    fn test_weight_rows() {
        let table = binomial_weights();
        let size = SSAO_BLUR_MAX_RADIUS as usize;

        assert_eq!(&table[0..2], &[1, 0]);
        assert_eq!(&table[size..size + 3], &[2, 1, 0]);
        assert_eq!(&table[2 * size..2 * size + 3], &[6, 4, 1]);

        // Full row sums to 2^(2r)
        let r = 15;
        let row = &table[r * size..r * size + size];
        let sum: u64 = row[0] as u64 + 2 * row[1..].iter().map(|w| *w as u64).sum::<u64>();
        assert_eq!(sum, 1u64 << (2 * r));
    }
}
