//! Side panel that edits the scene parameters between frames.

use umbra_core::params::{SSAO_BLUR_MAX_RADIUS, SSAO_MAX_SAMPLES};
use umbra_core::{AoAlgorithm, BlurKind, NormalSource, SceneParams};
use umbra_math::{OrbitCamera, Vec3, Vec4};

/// Read-only numbers shown in the panel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelStats {
    pub fps: f32,
    pub objects: usize,
    pub triangles: usize,
    pub width: u32,
    pub height: u32,
    pub shadows_active: bool,
    pub ao_active: bool,
}

/// Actions the panel asks the renderer to take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelResponse {
    pub frame_scene: bool,
}

pub fn scene_panel(
    ctx: &egui::Context,
    stats: &PanelStats,
    camera: &mut OrbitCamera,
    params: &mut SceneParams,
) -> PanelResponse {
    let mut response = PanelResponse::default();

    egui::SidePanel::left("scene_panel")
        .default_width(300.0)
        .show(ctx, |ui| {
            ui.heading("Umbra");
            ui.separator();

            ui.label(format!("FPS: {:.1}", stats.fps));
            ui.label(format!("Resolution: {}x{}", stats.width, stats.height));
            ui.label(format!("Objects: {}  Triangles: {}", stats.objects, stats.triangles));
            ui.separator();

            ui.collapsing("Camera", |ui| {
                ui.checkbox(&mut camera.perspective, "Perspective");
                ui.add(egui::Slider::new(&mut camera.fov_y, 10.0..=120.0).text("FOV"));
                let eye = camera.position();
                ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", eye.x, eye.y, eye.z));
                ui.label(format!("Distance: {:.2}", camera.distance));
                ui.label(format!("Near: {:.2}  Far: {:.2}", camera.near, camera.far));
                if ui.button("Frame scene (F)").clicked() {
                    response.frame_scene = true;
                }
            });

            ui.separator();

            ui.collapsing("Lights", |ui| {
                let lights = &mut params.lights;
                ui.horizontal(|ui| {
                    ui.label("Ambient");
                    color_edit(ui, &mut lights.ambient.color);
                });
                ui.add(egui::Slider::new(&mut lights.ambient.color.w, 0.0..=1.0).text("Ambient intensity"));

                ui.separator();
                let directional = &mut lights.directional;
                direction_edit(ui, &mut directional.direction);
                ui.horizontal(|ui| {
                    ui.label("Diffuse");
                    color_edit(ui, &mut directional.diffuse);
                });
                ui.horizontal(|ui| {
                    ui.label("Specular");
                    color_edit(ui, &mut directional.specular);
                });

                ui.separator();
                ui.checkbox(&mut params.draw.shadows, "Shadows");
                ui.label(if stats.shadows_active { "Shadow map: active" } else { "Shadow map: skipped" });
                ui.add(egui::Slider::new(&mut directional.bias, 0.0..=0.05).text("Bias"));
                ui.add(egui::Slider::new(&mut directional.slope_bias, 0.0..=0.05).text("Slope bias"));
                ui.add(egui::Slider::new(&mut directional.softness, 0.0..=1.0).text("Softness"));
            });

            ui.separator();

            ui.collapsing("Ambient Occlusion", |ui| {
                ui.checkbox(&mut params.draw.ssao, "Enabled");
                let ao = &mut params.lights.ambient.ao;

                egui::ComboBox::from_label("Algorithm")
                    .selected_text(ao.algorithm.label())
                    .show_ui(ui, |ui| {
                        for algorithm in AoAlgorithm::ALL {
                            ui.selectable_value(&mut ao.algorithm, algorithm, algorithm.label());
                        }
                    });
                ui.add(egui::Slider::new(&mut ao.radius, 0.01..=1.0).text("Radius"));
                let samples_label = match ao.algorithm {
                    AoAlgorithm::Ssao => "Samples",
                    AoAlgorithm::Hbao => "Directions",
                };
                ui.add(egui::Slider::new(&mut ao.samples, 1..=SSAO_MAX_SAMPLES).text(samples_label));
                if ao.algorithm == AoAlgorithm::Hbao {
                    ui.add(egui::Slider::new(&mut ao.steps, 1..=SSAO_MAX_SAMPLES).text("Steps"));
                }

                egui::ComboBox::from_label("Blur")
                    .selected_text(match ao.blur {
                        BlurKind::Gaussian => "Gaussian",
                        BlurKind::Box => "Box",
                    })
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut ao.blur, BlurKind::Gaussian, "Gaussian");
                        ui.selectable_value(&mut ao.blur, BlurKind::Box, "Box");
                    });
                ui.add(egui::Slider::new(&mut ao.blur_radius, 0..=SSAO_BLUR_MAX_RADIUS - 1).text("Blur radius"));
                ui.add(egui::Slider::new(&mut ao.strength, 0.0..=5.0).text("Strength"));

                egui::ComboBox::from_label("Normals")
                    .selected_text(match ao.normals {
                        NormalSource::Reconstructed => "Reconstructed",
                        NormalSource::Prepass => "Pre-pass",
                    })
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut ao.normals, NormalSource::Reconstructed, "Reconstructed");
                        ui.selectable_value(&mut ao.normals, NormalSource::Prepass, "Pre-pass");
                    });

                if params.draw.ssao && !stats.ao_active {
                    ui.colored_label(egui::Color32::YELLOW, "AO unavailable, see log");
                }
            });

            ui.separator();

            ui.collapsing("Debug", |ui| {
                let debug = &mut params.debug;
                ui.checkbox(&mut debug.grid, "Grid");
                ui.checkbox(&mut debug.bounding_box, "Bounding box");
                ui.checkbox(&mut debug.lights, "Light arrow");
                ui.checkbox(&mut debug.ao_pass, "Show AO pass");
            });

            ui.separator();

            ui.collapsing("Controls", |ui| {
                ui.label("Left Mouse: Orbit");
                ui.label("Scroll Wheel: Dolly");
                ui.label("F: Frame scene");
                ui.label("Tab: Toggle panel");
            });
        });

    response
}

fn color_edit(ui: &mut egui::Ui, color: &mut Vec4) {
    let mut rgba = color.to_array();
    // Alpha is edited separately as intensity
    let alpha = rgba[3];
    if ui.color_edit_button_rgba_unmultiplied(&mut rgba).changed() {
        *color = Vec4::new(rgba[0], rgba[1], rgba[2], alpha);
    }
}

fn direction_edit(ui: &mut egui::Ui, direction: &mut Vec3) {
    let mut components = direction.to_array();
    let mut changed = false;
    for (value, label) in components.iter_mut().zip(["Direction X", "Direction Y", "Direction Z"]) {
        changed |= ui.add(egui::Slider::new(value, -1.0..=1.0).text(label)).changed();
    }
    // A zero direction would leave the light undefined
    if changed && Vec3::from_array(components).length_squared() > 1e-6 {
        *direction = Vec3::from_array(components);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_runs_headless_without_edits() {
        let ctx = egui::Context::default();
        let mut camera = OrbitCamera::new(Vec3::ZERO, 10.0, 1.0);
        let mut params = SceneParams::default();
        let stats = PanelStats {
            fps: 60.0,
            objects: 4,
            triangles: 200,
            width: 800,
            height: 800,
            shadows_active: true,
            ao_active: true,
        };

        let mut response = PanelResponse::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            response = scene_panel(ctx, &stats, &mut camera, &mut params);
        });

        assert_eq!(params, SceneParams::default());
        assert!(!response.frame_scene);
        assert!(camera.perspective);
    }
}
