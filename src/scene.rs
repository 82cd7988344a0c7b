// scene.rs: node arena, materials and lights shared by the room and studio builders

use crate::camera::CameraPreset;
use crate::mesh::Mesh;
use glam::{Mat4, Quat, Vec3};
use image::RgbaImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Hex sRGB color to linear RGB.
pub fn rgb(hex: u32) -> [f32; 3] {
    let to_linear = |c: u32| {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [
        to_linear((hex >> 16) & 0xff),
        to_linear((hex >> 8) & 0xff),
        to_linear(hex & 0xff),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MaterialKind {
    #[default]
    Lit,
    /// Ignores lights; used for glass panes and emissive shades.
    Unlit,
    /// Floor that darkens softly under a rectangle of the given half extent (XZ).
    ShadowCatcher { half_extent: [f32; 2] },
}

#[derive(Debug, Clone)]
pub struct Material {
    pub color: [f32; 3],
    pub texture: Option<RgbaImage>,
    pub uv_repeat: [f32; 2],
    pub emissive: f32,
    pub shininess: f32,
    pub kind: MaterialKind,
}

impl Material {
    pub fn color(hex: u32) -> Self {
        Self {
            color: rgb(hex),
            texture: None,
            uv_repeat: [1.0, 1.0],
            emissive: 0.0,
            shininess: 0.0,
            kind: MaterialKind::Lit,
        }
    }

    /// White base so the texture shows its own colors.
    pub fn textured(texture: RgbaImage) -> Self {
        Self {
            texture: Some(texture),
            ..Self::color(0xffffff)
        }
    }

    pub fn repeat(mut self, u: f32, v: f32) -> Self {
        self.uv_repeat = [u, v];
        self
    }

    pub fn shiny(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn glow(mut self, emissive: f32) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn kind(mut self, kind: MaterialKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: [f32; 3], intensity: f32 },
    Hemisphere { sky: [f32; 3], ground: [f32; 3], intensity: f32 },
    /// `direction` points from the light toward the scene.
    Directional { direction: Vec3, color: [f32; 3], intensity: f32 },
    Point { position: Vec3, color: [f32; 3], intensity: f32, range: f32 },
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh { mesh: Mesh, material: Material },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Mat4,
    pub visible: bool,
    pub kind: NodeKind,
}

impl Node {
    pub fn material(&self) -> Option<&Material> {
        match &self.kind {
            NodeKind::Mesh { material, .. } => Some(material),
            NodeKind::Group => None,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh { mesh, .. } => Some(mesh),
            NodeKind::Group => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<Option<Node>>,
    pub lights: Vec<Light>,
    pub background: [f32; 3],
}

impl Scene {
    pub fn new(background: [f32; 3]) -> Self {
        Self {
            nodes: Vec::new(),
            lights: Vec::new(),
            background,
        }
    }

    pub fn add_group(&mut self, name: &str, parent: Option<NodeId>, transform: Mat4) -> NodeId {
        self.insert(name, parent, transform, NodeKind::Group)
    }

    pub fn add_mesh(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        transform: Mat4,
        mesh: Mesh,
        material: Material,
    ) -> NodeId {
        self.insert(name, parent, transform, NodeKind::Mesh { mesh, material })
    }

    fn insert(&mut self, name: &str, parent: Option<NodeId>, transform: Mat4, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = parent.filter(|p| self.node(*p).is_some());
        self.nodes.push(Some(Node {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            transform,
            visible: true,
            kind,
        }));
        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.children.push(id);
        }
        id
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.ids().find(|id| self.node(*id).is_some_and(|n| n.name == name))
    }

    /// Live node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i))
    }

    pub fn mesh_ids(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.node(*id).is_some_and(|n| n.mesh().is_some()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes a node and its whole subtree. Returns every removed id.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        if let Some(parent) = node.parent {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                stack.extend(node.children);
                removed.push(next);
            }
        }
        removed
    }

    pub fn world_transform(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.node(id)?;
        let mut m = node.transform;
        while let Some(parent) = node.parent {
            node = self.node(parent)?;
            m = node.transform * m;
        }
        Some(m)
    }

    /// Visible only if the node and all of its ancestors are.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.node(c) {
                Some(n) if n.visible => cur = n.parent,
                _ => return false,
            }
        }
        true
    }

    /// World-space axis-aligned bounds of a mesh node.
    pub fn world_bounds(&self, id: NodeId) -> Option<(Vec3, Vec3)> {
        let mesh = self.node(id)?.mesh()?;
        let world = self.world_transform(id)?;
        let (lo, hi) = mesh.bounds();
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            let p = world.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }

    /// Replaces the texture of a mesh node in place and makes it visible.
    pub fn set_texture(&mut self, id: NodeId, texture: RgbaImage) -> bool {
        match self.node_mut(id) {
            Some(Node {
                kind: NodeKind::Mesh { material, .. },
                visible,
                ..
            }) => {
                material.texture = Some(texture);
                material.color = [1.0, 1.0, 1.0];
                *visible = true;
                true
            }
            _ => false,
        }
    }
}

/// A finished scene, the carpet node still waiting for its texture, and the
/// camera framing that suits it.
#[derive(Debug, Clone)]
pub struct StagedScene {
    pub scene: Scene,
    pub carpet: Option<NodeId>,
    pub camera: CameraPreset,
}

impl StagedScene {
    pub fn apply_carpet_texture(&mut self, texture: RgbaImage) -> Option<NodeId> {
        let id = self.carpet?;
        self.scene.set_texture(id, texture).then_some(id)
    }

    /// Drops the carpet node entirely. Returns the removed ids.
    pub fn remove_carpet(&mut self) -> Vec<NodeId> {
        match self.carpet.take() {
            Some(id) => self.scene.remove(id),
            None => Vec::new(),
        }
    }
}

/// Translation with an optional turn about Y.
pub fn place(x: f32, y: f32, z: f32, yaw: f32) -> Mat4 {
    Mat4::from_rotation_translation(Quat::from_rotation_y(yaw), Vec3::new(x, y, z))
}

/// XY plane laid flat (facing +Y) at the given position.
pub fn flat(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_rotation_translation(
        Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        Vec3::new(x, y, z),
    )
}
