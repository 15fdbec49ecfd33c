//! CPU reference of the AO pipeline.
//!
//! Mirrors the post-processing shaders texel for texel: integer pixel
//! coordinates, edge clamping and the same estimator math. Used by the tests
//! and handy for checking a GPU capture by hand.

use rayon::prelude::*;
use umbra_core::params::SSAO_BLUR_MAX_RADIUS;
use umbra_core::AoSettings;
use umbra_math::{IVec2, Mat3, Mat4, Vec2, Vec3};

use super::kernel::SampleSet;

const HBAO_BIAS: f32 = std::f32::consts::PI / 6.0;

/// Camera projection and screen size the buffers were rendered with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSpace {
    pub proj: Mat4,
    pub near: f32,
    pub far: f32,
    pub width: u32,
    pub height: u32,
}

impl ViewSpace {
    pub fn is_orthographic(&self) -> bool {
        self.proj.w_axis.w > 0.5
    }

    /// Hardware depth to positive view distance.
    pub fn linear_depth(&self, depth: f32) -> f32 {
        let (n, f) = (self.near, self.far);
        if self.is_orthographic() {
            n + depth * (f - n)
        } else {
            n * f / (f - depth * (f - n))
        }
    }

    /// View-space position of a pixel center at the given hardware depth.
    pub fn view_position(&self, coord: IVec2, depth: f32) -> Vec3 {
        let uv = (coord.as_vec2() + Vec2::splat(0.5)) / Vec2::new(self.width as f32, self.height as f32);
        let ndc = Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
        let lin = self.linear_depth(depth);
        let p = &self.proj;
        if self.is_orthographic() {
            Vec3::new(
                (ndc.x - p.w_axis.x) / p.x_axis.x,
                (ndc.y - p.w_axis.y) / p.y_axis.y,
                -lin,
            )
        } else {
            Vec3::new(ndc.x * lin / p.x_axis.x, ndc.y * lin / p.y_axis.y, -lin)
        }
    }

    /// Pixel a view-space point lands on.
    pub fn project_to_coord(&self, view_pos: Vec3) -> IVec2 {
        let clip = self.proj * view_pos.extend(1.0);
        let ndc = clip.truncate().truncate() / clip.w;
        let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        (uv * Vec2::new(self.width as f32, self.height as f32)).floor().as_ivec2()
    }

    pub fn is_background(&self, p: Vec3) -> bool {
        -p.z >= self.far - 0.001
    }

    fn clamp_coord(&self, coord: IVec2) -> IVec2 {
        coord.clamp(IVec2::ZERO, IVec2::new(self.width as i32 - 1, self.height as i32 - 1))
    }

    fn index(&self, coord: IVec2) -> usize {
        let c = self.clamp_coord(coord);
        (c.y as u32 * self.width + c.x as u32) as usize
    }
}

/// View-space positions of every pixel, row-major.
pub struct PositionBuffer {
    pub view: ViewSpace,
    positions: Vec<Vec3>,
}

impl PositionBuffer {
    /// Reconstruct positions from a hardware depth buffer.
    pub fn from_depth(view: ViewSpace, depth: &[f32]) -> Self {
        let width = view.width as usize;
        let mut positions = vec![Vec3::ZERO; width * view.height as usize];
        positions.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = view.view_position(IVec2::new(x as i32, y as i32), depth[y * width + x]);
            }
        });
        Self { view, positions }
    }

    pub fn load(&self, coord: IVec2) -> Vec3 {
        self.positions[self.view.index(coord)]
    }

    /// Normal from the neighbors, taking the side with the smaller depth step.
    pub fn reconstruct_normal(&self, coord: IVec2) -> Vec3 {
        let p = self.load(coord);
        let right = self.load(coord + IVec2::X) - p;
        let left = p - self.load(coord - IVec2::X);
        let down = self.load(coord + IVec2::Y) - p;
        let up = p - self.load(coord - IVec2::Y);

        let dx = if right.z.abs() < left.z.abs() { right } else { left };
        let dy = if down.z.abs() < up.z.abs() { down } else { up };
        dy.cross(dx).try_normalize().unwrap_or(Vec3::Z)
    }

    /// Hemisphere occlusion at one pixel, 0 (open) to 1 (fully occluded).
    pub fn ssao(&self, coord: IVec2, samples: &SampleSet, settings: &AoSettings) -> f32 {
        let p = self.load(coord);
        if self.view.is_background(p) {
            return 0.0;
        }

        let tbn = tangent_frame(self.reconstruct_normal(coord), samples.noise_at(coord.x, coord.y));
        let count = (settings.samples as usize).clamp(1, samples.kernel.len());
        let radius = settings.radius;

        let occlusion: f32 = samples.kernel[..count]
            .iter()
            .map(|k| {
                let sample_pos = p + tbn * *k * radius;
                let scene_z = self.load(self.view.project_to_coord(sample_pos)).z;
                let delta = sample_pos.z - scene_z;
                if delta < 0.0 {
                    smoothstep(0.0, 1.0, 1.0 - delta.abs() / radius)
                } else {
                    0.0
                }
            })
            .sum();
        occlusion / count as f32
    }

    /// Horizon-scanning occlusion at one pixel, 0 (open) upward.
    pub fn hbao(&self, coord: IVec2, samples: &SampleSet, settings: &AoSettings) -> f32 {
        let p = self.load(coord);
        if self.view.is_background(p) {
            return 0.0;
        }

        let tbn = tangent_frame(self.reconstruct_normal(coord), samples.noise_at(coord.x, coord.y));
        let count = settings.samples.max(1);
        let increment = std::f32::consts::TAU / count as f32;

        let occlusion: f32 = (0..count)
            .map(|k| {
                let angle = increment * k as f32;
                let direction = tbn * Vec3::new(angle.cos(), angle.sin(), 0.0);
                let jitter = samples.noise_at(coord.x + k as i32, coord.y).x;
                self.horizon_occlusion(p, direction, jitter, settings)
            })
            .sum();
        occlusion / count as f32
    }

    fn horizon_occlusion(&self, p: Vec3, direction: Vec3, jitter: f32, settings: &AoSettings) -> f32 {
        let radius = settings.radius;
        let steps = settings.steps.max(1);
        let t = direction.z.atan2(direction.truncate().length());
        let increment = radius / steps as f32 * (1.0 + 0.2 * jitter);
        let slope_bias = HBAO_BIAS * (3.0 * t) / std::f32::consts::PI;

        let mut m = t;
        let mut max_len = 0.0;
        for i in 1..=steps {
            let sample_pos = p + direction * increment * i as f32;
            let d = self.load(self.view.project_to_coord(sample_pos)) - p;
            let l = d.length();
            if l > radius || l < 0.001 {
                continue;
            }
            let h = d.z.atan2(d.truncate().length());
            if h > m + HBAO_BIAS + slope_bias {
                m = h;
                max_len = l;
            }
        }

        let x = max_len / radius;
        (m.sin() - t.sin()) * (1.0 - x * x).max(0.0)
    }

    /// The stored AO map (`1 - occlusion`) for every pixel.
    pub fn occlusion_map(&self, samples: &SampleSet, settings: &AoSettings) -> Vec<f32> {
        let width = self.view.width as usize;
        let mut map = vec![1.0; self.positions.len()];
        map.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let coord = IVec2::new(x as i32, y as i32);
                let occlusion = match settings.algorithm {
                    umbra_core::AoAlgorithm::Ssao => self.ssao(coord, samples, settings),
                    umbra_core::AoAlgorithm::Hbao => self.hbao(coord, samples, settings),
                };
                *out = 1.0 - occlusion;
            }
        });
        map
    }
}

/// Orthonormal frame around `n`, rotated toward `rotation`.
pub fn tangent_frame(n: Vec3, rotation: Vec3) -> Mat3 {
    let mut tangent = rotation - n * rotation.dot(n);
    if tangent.length_squared() < 1e-6 {
        let axis = if n.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
        tangent = axis - n * axis.dot(n);
    }
    let tangent = tangent.normalize();
    Mat3::from_cols(tangent, n.cross(tangent), n)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// One pass of the separable binomial blur along `direction` ((1, 0) or (0, 1)).
pub fn gaussian_blur_pass(values: &[f32], width: u32, height: u32, radius: u32, direction: IVec2, weights: &[u32]) -> Vec<f32> {
    let radius = radius.min(SSAO_BLUR_MAX_RADIUS - 1) as i32;
    let row_weights: Vec<f32> = (0..=radius)
        .map(|i| weights[(radius as u32 * SSAO_BLUR_MAX_RADIUS + i as u32) as usize] as f32)
        .collect();
    let max = IVec2::new(width as i32 - 1, height as i32 - 1);

    let mut out = vec![0.0; values.len()];
    out.par_chunks_mut(width as usize).enumerate().for_each(|(y, row)| {
        for (x, value) in row.iter_mut().enumerate() {
            let center = IVec2::new(x as i32, y as i32);
            let (mut acc, mut total) = (0.0, 0.0);
            for i in -radius..=radius {
                let c = (center + direction * i).clamp(IVec2::ZERO, max);
                let w = row_weights[i.unsigned_abs() as usize];
                acc += values[(c.y * width as i32 + c.x) as usize] * w;
                total += w;
            }
            *value = acc / total.max(1.0);
        }
    });
    out
}

/// Single-pass box blur over `(2 * size + 1)²` texels.
pub fn box_blur(values: &[f32], width: u32, height: u32, size: u32) -> Vec<f32> {
    let size = size.min(SSAO_BLUR_MAX_RADIUS - 1) as i32;
    let max = IVec2::new(width as i32 - 1, height as i32 - 1);
    let side = (2 * size + 1) as f32;

    let mut out = vec![0.0; values.len()];
    out.par_chunks_mut(width as usize).enumerate().for_each(|(y, row)| {
        for (x, value) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for v in -size..=size {
                for u in -size..=size {
                    let c = (IVec2::new(x as i32 + u, y as i32 + v)).clamp(IVec2::ZERO, max);
                    acc += values[(c.y * width as i32 + c.x) as usize];
                }
            }
            *value = acc / (side * side);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ao::kernel::binomial_weights;
    use umbra_core::AoAlgorithm;

    const W: u32 = 64;
    const H: u32 = 64;

    fn view_space() -> ViewSpace {
        ViewSpace {
            proj: Mat4::perspective_rh(60.0_f32.to_radians(), 1.0, 0.1, 100.0),
            near: 0.1,
            far: 100.0,
            width: W,
            height: H,
        }
    }

    fn depth_at(view: &ViewSpace, distance: f32) -> f32 {
        view.proj.project_point3(Vec3::new(0.0, 0.0, -distance)).z
    }

    /// Plane facing the camera at `distance`, with the right half raised to `step`.
    fn step_depth(view: &ViewSpace, distance: f32, step: Option<f32>) -> Vec<f32> {
        let base = depth_at(view, distance);
        let raised = step.map(|s| depth_at(view, s)).unwrap_or(base);
        (0..H)
            .flat_map(|_| (0..W).map(move |x| if x >= W / 2 { raised } else { base }))
            .collect()
    }

    #[test]
    fn test_linear_depth_round_trip() {
        let view = view_space();
        let d = depth_at(&view, 2.0);
        assert!((view.linear_depth(d) - 2.0).abs() < 0.001);
        assert!((view.linear_depth(0.0) - 0.1).abs() < 0.0001);
        assert!((view.linear_depth(1.0) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_reconstruction_projects_back() {
        let view = view_space();
        let coord = IVec2::new(10, 50);
        let p = view.view_position(coord, depth_at(&view, 3.0));

        assert!((p.z + 3.0).abs() < 0.001);
        assert_eq!(view.project_to_coord(p), coord);
    }

    #[test]
    fn test_orthographic_reconstruction() {
        let view = ViewSpace {
            proj: Mat4::orthographic_rh(-2.0, 2.0, -2.0, 2.0, 0.1, 10.0),
            far: 10.0,
            ..view_space()
        };
        assert!(view.is_orthographic());
        let coord = IVec2::new(0, 0);
        let p = view.view_position(coord, 0.5);

        assert!((p.z + (0.1 + 0.5 * 9.9)).abs() < 0.001);
        assert!(p.x < -1.9 && p.y > 1.9);
        assert_eq!(view.project_to_coord(p), coord);
    }

    #[test]
    fn test_flat_plane_normal_faces_camera() {
        let view = view_space();
        let buffer = PositionBuffer::from_depth(view, &step_depth(&view, 2.0, None));
        let n = buffer.reconstruct_normal(IVec2::new(20, 20));

        assert!((n - Vec3::Z).length() < 0.001);
    }

    #[test]
    fn test_flat_plane_is_unoccluded() {
        let view = view_space();
        let buffer = PositionBuffer::from_depth(view, &step_depth(&view, 2.0, None));
        let samples = SampleSet::default();
        let coord = IVec2::new(W as i32 / 2, H as i32 / 2);

        for algorithm in AoAlgorithm::ALL {
            let settings = AoSettings {
                algorithm,
                ..AoSettings::default()
            };
            let occlusion = match algorithm {
                AoAlgorithm::Ssao => buffer.ssao(coord, &samples, &settings),
                AoAlgorithm::Hbao => buffer.hbao(coord, &samples, &settings),
            };
            assert!(occlusion.abs() < 0.01, "{:?}: {}", algorithm, occlusion);
        }
    }

    #[test]
    fn test_step_is_occluded() {
        let view = view_space();
        let buffer = PositionBuffer::from_depth(view, &step_depth(&view, 2.0, Some(1.8)));
        let samples = SampleSet::default();
        let coord = IVec2::new(W as i32 / 2 - 2, H as i32 / 2);
        let settings = AoSettings {
            radius: 0.5,
            ..AoSettings::default()
        };

        assert!(buffer.ssao(coord, &samples, &settings) > 0.0);
        assert!(buffer.hbao(coord, &samples, &settings) > 0.0);
    }

    #[test]
    fn test_background_reports_no_occlusion() {
        let view = view_space();
        let depth = vec![1.0; (W * H) as usize];
        let buffer = PositionBuffer::from_depth(view, &depth);
        let samples = SampleSet::default();
        let map = buffer.occlusion_map(&samples, &AoSettings::default());

        assert!(map.iter().all(|v| (*v - 1.0).abs() < 0.0001));
    }

    #[test]
    fn test_gaussian_blur_keeps_constant() {
        let weights = binomial_weights();
        let values = vec![0.7; (W * H) as usize];
        for radius in [0, 1, 3, 15] {
            let horizontal = gaussian_blur_pass(&values, W, H, radius, IVec2::X, &weights);
            let blurred = gaussian_blur_pass(&horizontal, W, H, radius, IVec2::Y, &weights);
            assert!(blurred.iter().all(|v| (*v - 0.7).abs() < 0.00001));
        }
    }

    #[test]
    fn test_gaussian_blur_spreads_a_spike() {
        let weights = binomial_weights();
        let mut values = vec![0.0; (W * H) as usize];
        values[(10 * W + 10) as usize] = 1.0;
        let blurred = gaussian_blur_pass(&values, W, H, 1, IVec2::X, &weights);

        assert!((blurred[(10 * W + 10) as usize] - 0.5).abs() < 0.0001);
        assert!((blurred[(10 * W + 11) as usize] - 0.25).abs() < 0.0001);
        assert_eq!(blurred[(11 * W + 10) as usize], 0.0);
    }

    #[test]
    fn test_box_blur_is_normalized() {
        let values = vec![0.3; (W * H) as usize];
        let blurred = box_blur(&values, W, H, 2);
        assert!(blurred.iter().all(|v| (*v - 0.3).abs() < 0.00001));
    }

    #[test]
    fn test_tangent_frame_is_orthonormal() {
        let n = Vec3::new(0.0, 0.0, 1.0);
        let frame = tangent_frame(n, Vec3::new(0.0, 0.0, 1.0));
        assert!((frame.x_axis.dot(n)).abs() < 0.0001);
        assert!((frame.y_axis.length() - 1.0).abs() < 0.0001);
        assert_eq!(frame.z_axis, n);
    }
}
