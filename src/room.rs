// room.rs: furnished living room with the carpet placed at true scale
//
// All offsets are in meters. The room is open toward +Z, where the camera sits.

use crate::camera::CameraPreset;
use crate::config::CarpetSpec;
use crate::mesh::{self, Mesh};
use crate::procedural;
use crate::scene::{flat, place, rgb, Light, Material, MaterialKind, NodeId, Scene, StagedScene};
use glam::{Mat4, Quat, Vec3};
use image::RgbaImage;
use std::f32::consts::FRAC_PI_2;

pub const ROOM_WIDTH: f32 = 8.0;
pub const ROOM_DEPTH: f32 = 7.0;
pub const ROOM_HEIGHT: f32 = 3.0;

/// Center of the rug in front of the sofa.
pub const SEATING_CENTER: Vec3 = Vec3::new(0.0, 0.0, -1.0);
/// Lifted slightly off the floor to avoid z-fighting.
pub const CARPET_LIFT: f32 = 0.005;
/// Neutral rug used when no carpet is supplied, width x depth.
pub const DEFAULT_RUG_SIZE: (f32, f32) = (2.0, 1.4);

const BACK_WALL_Z: f32 = -ROOM_DEPTH / 2.0;
const SOFA_Z: f32 = BACK_WALL_Z + 0.6;

/// Optional replacements for the procedural room materials.
#[derive(Debug, Clone, Default)]
pub struct RoomTextures {
    pub wood: Option<RgbaImage>,
    pub wall: Option<RgbaImage>,
    pub fabric: Option<RgbaImage>,
    pub sky: Option<RgbaImage>,
}

#[derive(Debug, Clone, Default)]
pub struct RoomSceneBuilder {
    textures: RoomTextures,
    carpet: Option<CarpetSpec>,
}

impl RoomSceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn textures(mut self, textures: RoomTextures) -> Self {
        self.textures = textures;
        self
    }

    pub fn carpet(mut self, carpet: Option<CarpetSpec>) -> Self {
        self.carpet = carpet;
        self
    }

    pub fn build(self) -> StagedScene {
        let mut scene = Scene::new(rgb(0xf2efe9));
        let root = scene.add_group("room", None, Mat4::IDENTITY);

        let fabric = match self.textures.fabric {
            Some(tex) => Material::textured(tex).repeat(2.0, 1.0),
            None => Material::color(0x9a9a94),
        };

        build_shell(&mut scene, root, self.textures.wood, self.textures.wall);
        build_sofa(&mut scene, root, &fabric);
        build_accent_chair(&mut scene, root);
        build_coffee_table(&mut scene, root);
        build_side_table(&mut scene, root);
        build_lamps(&mut scene, root);
        build_wall_art(&mut scene, root);
        build_plant(&mut scene, root);
        build_window(&mut scene, root, self.textures.sky);
        add_lighting(&mut scene);

        let carpet = match &self.carpet {
            Some(spec) => Some(place_carpet(&mut scene, root, spec)),
            None => {
                place_default_rug(&mut scene, root);
                None
            }
        };

        log::debug!("room built with {} nodes", scene.len());
        StagedScene {
            scene,
            carpet,
            camera: CameraPreset::room(SEATING_CENTER + Vec3::new(0.0, 0.5, 0.0)),
        }
    }
}

fn build_shell(scene: &mut Scene, root: NodeId, wood: Option<RgbaImage>, wall: Option<RgbaImage>) {
    let floor = match wood {
        Some(tex) => Material::textured(tex).repeat(4.0, 4.0),
        None => Material::textured(procedural::wood_grain(procedural::WOOD_TEXTURE_SIZE)).repeat(4.0, 4.0),
    }
    .shiny(0.25);
    scene.add_mesh("floor", Some(root), flat(0.0, 0.0, 0.0), mesh::plane(ROOM_WIDTH, ROOM_DEPTH), floor);

    let feature = match wall {
        Some(tex) => Material::textured(tex).repeat(3.0, 1.0),
        None => Material::textured(procedural::wall_dots(procedural::WALL_TEXTURE_SIZE)).repeat(6.0, 2.25),
    };
    scene.add_mesh(
        "feature_wall",
        Some(root),
        place(0.0, ROOM_HEIGHT / 2.0, BACK_WALL_Z, 0.0),
        mesh::plane(ROOM_WIDTH, ROOM_HEIGHT),
        feature,
    );

    let neutral = Material::color(0xeeeae4);
    scene.add_mesh(
        "left_wall",
        Some(root),
        place(-ROOM_WIDTH / 2.0, ROOM_HEIGHT / 2.0, 0.0, FRAC_PI_2),
        mesh::plane(ROOM_DEPTH, ROOM_HEIGHT),
        neutral.clone(),
    );
    scene.add_mesh(
        "right_wall",
        Some(root),
        place(ROOM_WIDTH / 2.0, ROOM_HEIGHT / 2.0, 0.0, -FRAC_PI_2),
        mesh::plane(ROOM_DEPTH, ROOM_HEIGHT),
        neutral,
    );
    scene.add_mesh(
        "ceiling",
        Some(root),
        Mat4::from_rotation_translation(Quat::from_rotation_x(FRAC_PI_2), Vec3::new(0.0, ROOM_HEIGHT, 0.0)),
        mesh::plane(ROOM_WIDTH, ROOM_DEPTH),
        Material::color(0xfbfaf8),
    );

    // baseboards along the three walls
    let trim = Material::color(0xf7f5f0);
    scene.add_mesh(
        "baseboard_back",
        Some(root),
        place(0.0, 0.05, BACK_WALL_Z + 0.01, 0.0),
        mesh::cuboid(ROOM_WIDTH, 0.1, 0.02),
        trim.clone(),
    );
    for (name, x) in [("baseboard_left", -ROOM_WIDTH / 2.0 + 0.01), ("baseboard_right", ROOM_WIDTH / 2.0 - 0.01)] {
        scene.add_mesh(name, Some(root), place(x, 0.05, 0.0, 0.0), mesh::cuboid(0.02, 0.1, ROOM_DEPTH), trim.clone());
    }
}

fn add_part(scene: &mut Scene, parent: NodeId, name: &str, at: Mat4, mesh: Mesh, material: &Material) -> NodeId {
    scene.add_mesh(name, Some(parent), at, mesh, material.clone())
}

fn build_sofa(scene: &mut Scene, root: NodeId, fabric: &Material) {
    let sofa = scene.add_group("sofa", Some(root), place(0.0, 0.0, SOFA_Z, 0.0));
    let legs = Material::color(0x3b2a1e);
    let accent = Material::color(0xc7a27a);

    add_part(scene, sofa, "sofa_base", place(0.0, 0.225, 0.0, 0.0), mesh::cuboid(2.4, 0.25, 0.9), fabric);
    for (i, x) in [-0.57f32, 0.57].into_iter().enumerate() {
        add_part(
            scene,
            sofa,
            &format!("sofa_cushion_{i}"),
            place(x, 0.425, 0.05, 0.0),
            mesh::cuboid(1.1, 0.15, 0.75),
            fabric,
        );
    }
    add_part(scene, sofa, "sofa_back", place(0.0, 0.6, -0.35, 0.0), mesh::cuboid(2.4, 0.5, 0.2), fabric);
    for (i, x) in [-1.2f32, 1.2].into_iter().enumerate() {
        add_part(scene, sofa, &format!("sofa_arm_{i}"), place(x, 0.5, 0.0, 0.0), mesh::cuboid(0.2, 0.3, 0.9), fabric);
    }
    for (i, (x, z)) in [(-1.1f32, -0.38f32), (1.1, -0.38), (-1.1, 0.38), (1.1, 0.38)].into_iter().enumerate() {
        add_part(scene, sofa, &format!("sofa_leg_{i}"), place(x, 0.05, z, 0.0), mesh::cuboid(0.06, 0.1, 0.06), &legs);
    }
    for (i, (x, yaw)) in [(-0.8f32, 0.15f32), (0.8, -0.15)].into_iter().enumerate() {
        add_part(scene, sofa, &format!("sofa_pillow_{i}"), place(x, 0.65, -0.2, yaw), mesh::cuboid(0.4, 0.4, 0.12), &accent);
    }
}

fn build_accent_chair(scene: &mut Scene, root: NodeId) {
    let chair = scene.add_group("accent_chair", Some(root), place(2.1, 0.0, -1.0, -FRAC_PI_2 * 0.65));
    let upholstery = Material::color(0xc8963e);

    add_part(scene, chair, "chair_base", place(0.0, 0.2, 0.0, 0.0), mesh::cuboid(0.8, 0.4, 0.8), &upholstery);
    add_part(scene, chair, "chair_back", place(0.0, 0.65, -0.33, 0.0), mesh::cuboid(0.8, 0.5, 0.14), &upholstery);
    add_part(
        scene,
        chair,
        "chair_cushion",
        Mat4::from_scale_rotation_translation(Vec3::new(1.0, 0.35, 1.0), Quat::IDENTITY, Vec3::new(0.0, 0.44, 0.05)),
        mesh::sphere(0.33, 12, 20),
        &upholstery.clone().shiny(0.1),
    );
}

fn build_coffee_table(scene: &mut Scene, root: NodeId) {
    let table = scene.add_group("coffee_table", Some(root), place(SEATING_CENTER.x, 0.0, SEATING_CENTER.z, 0.0));
    let wood = Material::color(0x6b4a2f).shiny(0.4);

    add_part(scene, table, "coffee_table_top", place(0.0, 0.42, 0.0, 0.0), mesh::cuboid(1.1, 0.05, 0.6), &wood);
    for (i, (x, z)) in [(-0.5f32, -0.25f32), (0.5, -0.25), (-0.5, 0.25), (0.5, 0.25)].into_iter().enumerate() {
        add_part(scene, table, &format!("coffee_table_leg_{i}"), place(x, 0.2, z, 0.0), mesh::cuboid(0.05, 0.4, 0.05), &wood);
    }
}

fn build_side_table(scene: &mut Scene, root: NodeId) {
    let table = scene.add_group("side_table", Some(root), place(-1.65, 0.0, SOFA_Z, 0.0));
    let metal = Material::color(0x2f2f2f).shiny(0.6);
    let top = Material::color(0x8b6a4a).shiny(0.3);

    add_part(scene, table, "side_table_foot", place(0.0, 0.01, 0.0, 0.0), mesh::cylinder(0.18, 0.18, 0.02, 24), &metal);
    add_part(scene, table, "side_table_stem", place(0.0, 0.28, 0.0, 0.0), mesh::cylinder(0.03, 0.03, 0.52, 12), &metal);
    add_part(scene, table, "side_table_top", place(0.0, 0.56, 0.0, 0.0), mesh::cylinder(0.25, 0.25, 0.04, 32), &top);
}

struct Lamp {
    name: &'static str,
    at: Vec3,
    parts: &'static [(&'static str, f32, f32, f32, f32)],
    light_y: f32,
    intensity: f32,
    range: f32,
}

// (part, radius_top, radius_bottom, height, center_y); the last part is the shade
const PENDANT: &[(&str, f32, f32, f32, f32)] = &[("cord", 0.01, 0.01, 1.2, 2.4), ("shade", 0.05, 0.3, 0.25, 1.7)];
const TABLE_LAMP: &[(&str, f32, f32, f32, f32)] = &[("base", 0.08, 0.1, 0.25, 0.705), ("shade", 0.12, 0.2, 0.22, 0.92)];
const FLOOR_LAMP: &[(&str, f32, f32, f32, f32)] =
    &[("foot", 0.2, 0.2, 0.03, 0.015), ("pole", 0.02, 0.02, 1.55, 0.8), ("shade", 0.15, 0.22, 0.3, 1.7)];

fn build_lamps(scene: &mut Scene, root: NodeId) {
    let lamps = [
        Lamp {
            name: "pendant_lamp",
            at: SEATING_CENTER,
            parts: PENDANT,
            light_y: 1.6,
            intensity: 0.8,
            range: 5.0,
        },
        Lamp {
            name: "table_lamp",
            at: Vec3::new(-1.65, 0.0, SOFA_Z),
            parts: TABLE_LAMP,
            light_y: 0.95,
            intensity: 0.6,
            range: 3.0,
        },
        Lamp {
            name: "floor_lamp",
            at: Vec3::new(3.3, 0.0, SOFA_Z),
            parts: FLOOR_LAMP,
            light_y: 1.6,
            intensity: 0.5,
            range: 4.0,
        },
    ];

    let metal = Material::color(0x2b2b2b).shiny(0.5);
    let shade = Material::color(0xfff4e0).glow(0.8).kind(MaterialKind::Unlit);
    let warm = rgb(0xffd8a8);

    for lamp in lamps {
        let group = scene.add_group(lamp.name, Some(root), place(lamp.at.x, 0.0, lamp.at.z, 0.0));
        for (i, &(part, top, bottom, height, y)) in lamp.parts.iter().enumerate() {
            let material = if i + 1 == lamp.parts.len() { &shade } else { &metal };
            add_part(
                scene,
                group,
                &format!("{}_{part}", lamp.name),
                place(0.0, y, 0.0, 0.0),
                mesh::cylinder(top, bottom, height, 24),
                material,
            );
        }
        scene.add_light(Light::Point {
            position: Vec3::new(lamp.at.x, lamp.light_y, lamp.at.z),
            color: warm,
            intensity: lamp.intensity,
            range: lamp.range,
        });
    }
}

fn build_wall_art(scene: &mut Scene, root: NodeId) {
    let frame = Material::color(0x1f1b18);
    for (i, (x, canvas)) in [(-0.65f32, 0xc0714f_u32), (0.65, 0x8ca48a)].into_iter().enumerate() {
        let art = scene.add_group(&format!("wall_art_{i}"), Some(root), place(x, 1.65, BACK_WALL_Z + 0.03, 0.0));
        add_part(scene, art, &format!("wall_art_{i}_frame"), Mat4::IDENTITY, mesh::cuboid(0.9, 0.65, 0.04), &frame);
        add_part(
            scene,
            art,
            &format!("wall_art_{i}_canvas"),
            place(0.0, 0.0, 0.021, 0.0),
            mesh::plane(0.78, 0.53),
            &Material::color(canvas),
        );
    }
}

fn build_plant(scene: &mut Scene, root: NodeId) {
    let plant = scene.add_group("plant", Some(root), place(-3.3, 0.0, SOFA_Z, 0.0));
    let pot = Material::color(0xd8cfc4).shiny(0.2);
    let leaves = Material::color(0x4f7a4a);

    add_part(scene, plant, "plant_pot", place(0.0, 0.225, 0.0, 0.0), mesh::cylinder(0.22, 0.17, 0.45, 24), &pot);
    add_part(scene, plant, "plant_foliage", place(0.0, 0.85, 0.0, 0.0), mesh::sphere(0.38, 12, 18), &leaves);
    add_part(scene, plant, "plant_foliage_top", place(0.15, 1.15, 0.05, 0.0), mesh::sphere(0.28, 10, 16), &leaves);
}

fn build_window(scene: &mut Scene, root: NodeId, sky: Option<RgbaImage>) {
    // faces +X from the left wall
    let window = scene.add_group("window", Some(root), place(-ROOM_WIDTH / 2.0 + 0.02, 1.55, -0.5, FRAC_PI_2));
    let frame = Material::color(0xfafafa);

    let glass = match sky {
        Some(tex) => Material::textured(tex),
        None => Material::color(0xbcd9f2),
    }
    .glow(1.0)
    .kind(MaterialKind::Unlit);
    add_part(scene, window, "window_glass", Mat4::IDENTITY, mesh::plane(1.7, 1.5), &glass);

    let bars: [(&str, Vec3, (f32, f32, f32)); 5] = [
        ("window_top", Vec3::new(0.0, 0.78, 0.02), (1.88, 0.08, 0.08)),
        ("window_bottom", Vec3::new(0.0, -0.78, 0.02), (1.88, 0.08, 0.08)),
        ("window_left", Vec3::new(-0.9, 0.0, 0.02), (0.08, 1.6, 0.08)),
        ("window_right", Vec3::new(0.9, 0.0, 0.02), (0.08, 1.6, 0.08)),
        ("window_mullion", Vec3::new(0.0, 0.0, 0.02), (0.05, 1.5, 0.05)),
    ];
    for (name, at, (w, h, d)) in bars {
        add_part(scene, window, name, Mat4::from_translation(at), mesh::cuboid(w, h, d), &frame);
    }
}

fn add_lighting(scene: &mut Scene) {
    scene.add_light(Light::Ambient {
        color: [1.0, 1.0, 1.0],
        intensity: 0.25,
    });
    scene.add_light(Light::Hemisphere {
        sky: rgb(0xfdfbf7),
        ground: rgb(0x8a7560),
        intensity: 0.45,
    });
    // sunlight through the window
    scene.add_light(Light::Directional {
        direction: Vec3::new(1.0, -0.8, 0.3).normalize(),
        color: rgb(0xfff1dc),
        intensity: 1.2,
    });
}

fn place_carpet(scene: &mut Scene, root: NodeId, spec: &CarpetSpec) -> NodeId {
    let (width, depth) = spec.scene_size();
    let id = scene.add_mesh(
        "carpet",
        Some(root),
        flat(SEATING_CENTER.x, CARPET_LIFT, SEATING_CENTER.z),
        mesh::plane(width, depth),
        Material::color(0xffffff),
    );
    // shown once the texture arrives
    if let Some(node) = scene.node_mut(id) {
        node.visible = false;
    }
    id
}

fn place_default_rug(scene: &mut Scene, root: NodeId) -> NodeId {
    let (width, depth) = DEFAULT_RUG_SIZE;
    scene.add_mesh(
        "rug",
        Some(root),
        flat(SEATING_CENTER.x, CARPET_LIFT, SEATING_CENTER.z),
        mesh::plane(width, depth),
        Material::color(0xd9d2c5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeCm;

    fn carpet_spec(w: f32, h: f32) -> CarpetSpec {
        CarpetSpec::new("rug.png", SizeCm::new(w, h).unwrap())
    }

    fn extent(scene: &Scene, id: NodeId) -> Vec3 {
        let (min, max) = scene.world_bounds(id).unwrap();
        max - min
    }

    #[test]
    fn carpet_is_placed_at_physical_scale() {
        let staged = RoomSceneBuilder::new().carpet(Some(carpet_spec(160.0, 230.0))).build();
        let carpet = staged.carpet.unwrap();
        let size = extent(&staged.scene, carpet);
        assert!((size.x - 1.6).abs() < 1e-5);
        assert!((size.z - 2.3).abs() < 1e-5);
        assert!(size.y.abs() < 1e-5);

        let (min, max) = staged.scene.world_bounds(carpet).unwrap();
        let center = (min + max) * 0.5;
        assert!((center - Vec3::new(SEATING_CENTER.x, CARPET_LIFT, SEATING_CENTER.z)).length() < 1e-5);
        assert!(!staged.scene.is_visible(carpet));
        assert!(staged.scene.find("rug").is_none());
    }

    #[test]
    fn missing_carpet_falls_back_to_neutral_rug() {
        let staged = RoomSceneBuilder::new().build();
        assert!(staged.carpet.is_none());
        let rug = staged.scene.find("rug").unwrap();
        let size = extent(&staged.scene, rug);
        assert!((size.x - 2.0).abs() < 1e-5 && (size.z - 1.4).abs() < 1e-5);
        assert!(staged.scene.is_visible(rug));
    }

    #[test]
    fn failed_carpet_leaves_no_rug() {
        let mut staged = RoomSceneBuilder::new().carpet(Some(carpet_spec(200.0, 300.0))).build();
        let removed = staged.remove_carpet();
        assert_eq!(removed.len(), 1);
        assert!(staged.scene.find("carpet").is_none());
        assert!(staged.scene.find("rug").is_none());
    }

    #[test]
    fn loaded_texture_reveals_carpet() {
        let mut staged = RoomSceneBuilder::new().carpet(Some(carpet_spec(200.0, 300.0))).build();
        let id = staged.apply_carpet_texture(RgbaImage::new(4, 4)).unwrap();
        assert!(staged.scene.is_visible(id));
    }

    #[test]
    fn room_has_furniture_and_lights() {
        let staged = RoomSceneBuilder::new().build();
        for name in [
            "floor", "feature_wall", "left_wall", "right_wall", "ceiling", "sofa", "accent_chair",
            "coffee_table", "side_table", "pendant_lamp", "table_lamp", "floor_lamp", "wall_art_0",
            "wall_art_1", "plant", "window",
        ] {
            assert!(staged.scene.find(name).is_some(), "missing {name}");
        }
        let points = staged
            .scene
            .lights
            .iter()
            .filter(|l| matches!(l, Light::Point { .. }))
            .count();
        assert_eq!(points, 3);
    }

    #[test]
    fn build_is_deterministic() {
        let a = RoomSceneBuilder::new().build();
        let b = RoomSceneBuilder::new().build();
        assert_eq!(a.scene.len(), b.scene.len());
        let floor_a = a.scene.node(a.scene.find("floor").unwrap()).unwrap();
        let floor_b = b.scene.node(b.scene.find("floor").unwrap()).unwrap();
        assert_eq!(floor_a.material().unwrap().texture, floor_b.material().unwrap().texture);
    }

    #[test]
    fn overrides_replace_procedural_textures() {
        let wood = RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
        let staged = RoomSceneBuilder::new()
            .textures(RoomTextures {
                wood: Some(wood.clone()),
                ..RoomTextures::default()
            })
            .build();
        let floor = staged.scene.node(staged.scene.find("floor").unwrap()).unwrap();
        assert_eq!(floor.material().unwrap().texture.as_ref(), Some(&wood));
        let sofa_base = staged.scene.node(staged.scene.find("sofa_base").unwrap()).unwrap();
        assert!(sofa_base.material().unwrap().texture.is_none());
    }

    #[test]
    fn furniture_stays_inside_the_room() {
        let staged = RoomSceneBuilder::new().build();
        let half = Vec3::new(ROOM_WIDTH / 2.0, 0.0, ROOM_DEPTH / 2.0) + Vec3::splat(1e-3);
        for id in staged.scene.mesh_ids() {
            let (min, max) = staged.scene.world_bounds(id).unwrap();
            assert!(min.x >= -half.x && max.x <= half.x, "{:?}", staged.scene.node(id).unwrap().name);
            assert!(min.z >= -half.z && max.z <= half.z);
            assert!(min.y >= -1e-3 && max.y <= ROOM_HEIGHT + 1e-3);
        }
    }
}
