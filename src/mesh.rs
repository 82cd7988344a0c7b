// mesh.rs: primitive mesh factory (plane, box, sphere, cylinder)

use glam::Vec3;
use std::f32::consts::{PI, TAU};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Axis-aligned bounds in local space.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Plane in the XY plane facing +Z, centered at the origin.
pub fn plane(width: f32, height: f32) -> Mesh {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let n = [0.0, 0.0, 1.0];
    Mesh {
        vertices: vec![
            Vertex { position: [-hw, -hh, 0.0], normal: n, uv: [0.0, 1.0] },
            Vertex { position: [hw, -hh, 0.0], normal: n, uv: [1.0, 1.0] },
            Vertex { position: [hw, hh, 0.0], normal: n, uv: [1.0, 0.0] },
            Vertex { position: [-hw, hh, 0.0], normal: n, uv: [0.0, 0.0] },
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// Box centered at the origin.
pub fn cuboid(width: f32, height: f32, depth: f32) -> Mesh {
    let h = Vec3::new(width, height, depth) * 0.5;
    // (normal, u axis, v axis)
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        let center = normal * h;
        let du = u * h;
        let dv = v * h;
        let corners = [
            (center - du - dv, [0.0, 1.0]),
            (center + du - dv, [1.0, 1.0]),
            (center + du + dv, [1.0, 0.0]),
            (center - du + dv, [0.0, 0.0]),
        ];
        for (p, uv) in corners {
            vertices.push(Vertex {
                position: p.to_array(),
                normal: normal.to_array(),
                uv,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    Mesh { vertices, indices }
}

/// UV sphere. `lat` rings from pole to pole, `lon` segments around Y.
pub fn sphere(radius: f32, lat: usize, lon: usize) -> Mesh {
    let lat = lat.max(2);
    let lon = lon.max(3);
    let mut vertices = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::with_capacity(lat * lon * 6);

    for i in 0..=lat {
        let theta = PI * (i as f32) / (lat as f32);
        let (sin_t, cos_t) = theta.sin_cos();

        for j in 0..=lon {
            let phi = TAU * (j as f32) / (lon as f32);
            let n = Vec3::new(phi.cos() * sin_t, cos_t, phi.sin() * sin_t);
            vertices.push(Vertex {
                position: (n * radius).to_array(),
                normal: n.to_array(),
                uv: [(j as f32) / (lon as f32), (i as f32) / (lat as f32)],
            });
        }
    }

    for i in 0..lat {
        for j in 0..lon {
            let a = (i * (lon + 1) + j) as u32;
            let b = a + (lon + 1) as u32;
            indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
        }
    }

    Mesh { vertices, indices }
}

/// Capped cylinder (or cone frustum) along Y, centered at the origin.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Mesh {
    let segments = segments.max(3);
    let half = height * 0.5;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // slope of the side wall for normals
    let slope = (radius_bottom - radius_top) / height.max(f32::EPSILON);

    for j in 0..=segments {
        let a = TAU * (j as f32) / (segments as f32);
        let (s, c) = a.sin_cos();
        let normal = Vec3::new(c, slope, s).normalize_or_zero();
        let u = j as f32 / segments as f32;
        vertices.push(Vertex {
            position: [radius_top * c, half, radius_top * s],
            normal: normal.to_array(),
            uv: [u, 0.0],
        });
        vertices.push(Vertex {
            position: [radius_bottom * c, -half, radius_bottom * s],
            normal: normal.to_array(),
            uv: [u, 1.0],
        });
    }
    for j in 0..segments as u32 {
        let t0 = j * 2;
        let b0 = t0 + 1;
        let t1 = t0 + 2;
        let b1 = t0 + 3;
        indices.extend_from_slice(&[t0, t1, b0, b0, t1, b1]);
    }

    for (y, radius, normal) in [(half, radius_top, Vec3::Y), (-half, radius_bottom, Vec3::NEG_Y)] {
        if radius <= 0.0 {
            continue;
        }
        let center = vertices.len() as u32;
        vertices.push(Vertex {
            position: [0.0, y, 0.0],
            normal: normal.to_array(),
            uv: [0.5, 0.5],
        });
        for j in 0..=segments {
            let a = TAU * (j as f32) / (segments as f32);
            let (s, c) = a.sin_cos();
            vertices.push(Vertex {
                position: [radius * c, y, radius * s],
                normal: normal.to_array(),
                uv: [0.5 + 0.5 * c, 0.5 + 0.5 * s],
            });
        }
        for j in 0..segments as u32 {
            let (p0, p1) = (center + 1 + j, center + 2 + j);
            if normal.y > 0.0 {
                indices.extend_from_slice(&[center, p1, p0]);
            } else {
                indices.extend_from_slice(&[center, p0, p1]);
            }
        }
    }

    Mesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_in_range(mesh: &Mesh) -> bool {
        mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len())
    }

    #[test]
    fn plane_has_requested_extent() {
        let mesh = plane(2.0, 3.0);
        let (min, max) = mesh.bounds();
        assert_eq!(max - min, Vec3::new(2.0, 3.0, 0.0));
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn cuboid_is_closed_and_sized() {
        let mesh = cuboid(1.0, 2.0, 3.0);
        let (min, max) = mesh.bounds();
        assert_eq!(max - min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.triangle_count(), 12);
        assert!(indices_in_range(&mesh));
    }

    #[test]
    fn cuboid_faces_wind_outward() {
        let mesh = cuboid(1.0, 1.0, 1.0);
        for tri in mesh.indices.chunks(3) {
            let p: Vec<Vec3> = tri.iter().map(|&i| Vec3::from(mesh.vertices[i as usize].position)).collect();
            let n = Vec3::from(mesh.vertices[tri[0] as usize].normal);
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            assert!(face.dot(n) > 0.0);
        }
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let mesh = sphere(0.5, 8, 12);
        assert_eq!(mesh.vertices.len(), 9 * 13);
        assert!(indices_in_range(&mesh));
        for v in &mesh.vertices {
            assert!((Vec3::from(v.position).length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn cone_skips_degenerate_cap() {
        let cone = cylinder(0.0, 0.3, 0.4, 16);
        let frustum = cylinder(0.1, 0.3, 0.4, 16);
        assert!(cone.vertices.len() < frustum.vertices.len());
        assert!(indices_in_range(&cone));
        let (min, max) = frustum.bounds();
        assert!((max.y - min.y - 0.4).abs() < 1e-6);
    }
}
