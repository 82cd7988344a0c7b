// studio.rs: minimal product shot: carpet on a shadow-catcher floor

use crate::camera::CameraPreset;
use crate::config::CarpetSpec;
use crate::mesh;
use crate::scene::{flat, place, rgb, Light, Material, MaterialKind, Scene, StagedScene};
use glam::{Mat4, Vec3};

const FLOOR_SIZE: f32 = 20.0;
const BACKDROP_HEIGHT: f32 = 8.0;
const BACKDROP_DISTANCE: f32 = 6.0;
const CARPET_LIFT: f32 = 0.002;

pub fn build_studio(carpet: Option<&CarpetSpec>) -> StagedScene {
    let mut scene = Scene::new(rgb(0xeceae6));
    let root = scene.add_group("studio", None, Mat4::IDENTITY);

    let (width, depth) = carpet.map(CarpetSpec::scene_size).unwrap_or((0.0, 0.0));

    scene.add_mesh(
        "shadow_catcher",
        Some(root),
        flat(0.0, 0.0, 0.0),
        mesh::plane(FLOOR_SIZE, FLOOR_SIZE),
        Material::color(0xf4f2ee).kind(MaterialKind::ShadowCatcher {
            half_extent: [width * 0.5, depth * 0.5],
        }),
    );
    scene.add_mesh(
        "backdrop",
        Some(root),
        place(0.0, BACKDROP_HEIGHT / 2.0, -BACKDROP_DISTANCE, 0.0),
        mesh::plane(FLOOR_SIZE, BACKDROP_HEIGHT),
        Material::color(0xeceae6),
    );

    let carpet = carpet.map(|spec| {
        let (w, d) = spec.scene_size();
        log::debug!("studio carpet {w:.2} x {d:.2} units");
        let id = scene.add_mesh(
            "carpet",
            Some(root),
            flat(0.0, CARPET_LIFT, 0.0),
            mesh::plane(w, d),
            Material::color(0xffffff),
        );
        if let Some(node) = scene.node_mut(id) {
            node.visible = false;
        }
        id
    });

    scene.add_light(Light::Ambient {
        color: [1.0, 1.0, 1.0],
        intensity: 0.2,
    });
    scene.add_light(Light::Hemisphere {
        sky: [1.0, 1.0, 1.0],
        ground: rgb(0xb8b2a8),
        intensity: 0.6,
    });
    scene.add_light(Light::Directional {
        direction: Vec3::new(-0.5, -1.0, -0.4).normalize(),
        color: [1.0, 1.0, 1.0],
        intensity: 0.9,
    });
    scene.add_light(Light::Directional {
        direction: Vec3::new(0.6, -0.7, 0.5).normalize(),
        color: rgb(0xe8eef8),
        intensity: 0.35,
    });

    StagedScene {
        scene,
        carpet,
        camera: CameraPreset::product(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeCm;

    #[test]
    fn carpet_plane_is_size_in_meters() {
        let spec = CarpetSpec::new("rug.png", SizeCm::new(200.0, 300.0).unwrap());
        let staged = build_studio(Some(&spec));
        let carpet = staged.carpet.unwrap();
        let (min, max) = staged.scene.world_bounds(carpet).unwrap();
        let size = max - min;
        assert!((size.x - 2.0).abs() < 1e-5);
        assert!((size.z - 3.0).abs() < 1e-5);

        let floor = staged.scene.find("shadow_catcher").unwrap();
        let kind = staged.scene.node(floor).unwrap().material().unwrap().kind;
        assert_eq!(kind, MaterialKind::ShadowCatcher { half_extent: [1.0, 1.5] });
    }

    #[test]
    fn studio_has_no_furniture() {
        let spec = CarpetSpec::new("rug.png", SizeCm::new(120.0, 180.0).unwrap());
        let staged = build_studio(Some(&spec));
        assert_eq!(staged.scene.mesh_ids().len(), 3);
        assert_eq!(staged.camera, CameraPreset::product());
    }

    #[test]
    fn empty_studio_still_builds() {
        let staged = build_studio(None);
        assert!(staged.carpet.is_none());
        assert_eq!(staged.scene.mesh_ids().len(), 2);
    }
}
