// procedural.rs: tileable placeholder textures for the room

use image::{Rgba, RgbaImage};

pub const WOOD_TEXTURE_SIZE: u32 = 256;
pub const WALL_TEXTURE_SIZE: u32 = 128;

/// Small deterministic hash, so the room looks the same on every build.
fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

fn unit(seed: u32) -> f32 {
    (hash(seed) & 0xffff) as f32 / 65535.0
}

fn shade(base: [u8; 3], factor: f32) -> Rgba<u8> {
    let c = |v: u8| (v as f32 * factor).round().clamp(0.0, 255.0) as u8;
    Rgba([c(base[0]), c(base[1]), c(base[2]), 255])
}

/// Oak planks running along X: per-plank tint, wavy grain lines and dark seams.
/// Planks tile vertically and the grain period divides the width, so edges wrap.
pub fn wood_grain(size: u32) -> RgbaImage {
    let size = size.max(16);
    let planks = 4u32;
    let plank_h = size / planks;
    let base = [176u8, 132, 88];

    RgbaImage::from_fn(size, size, |x, y| {
        let plank = (y / plank_h.max(1)).min(planks - 1);
        let in_plank = y % plank_h.max(1);
        if in_plank == 0 {
            return shade(base, 0.55);
        }

        let tint = 0.85 + 0.2 * unit(plank * 31 + 7);
        let u = x as f32 / size as f32 * std::f32::consts::TAU;
        let wobble = (u * 2.0 + plank as f32).sin() * 2.5 + (u * 5.0).sin() * 0.8;
        let line = ((in_plank as f32 + wobble) * 0.9).sin();
        let grain = 1.0 - 0.08 * line.abs().powf(6.0) - 0.04 * (1.0 - line.abs());
        let speck = 0.97 + 0.03 * unit(x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663));
        shade(base, tint * grain * speck)
    })
}

/// Plaster with a regular grid of soft dots for the accent wall.
pub fn wall_dots(size: u32) -> RgbaImage {
    let size = size.max(8);
    let cell = (size / 8).max(4);
    let base = [86u8, 110, 104];
    let radius = cell as f32 * 0.18;

    RgbaImage::from_fn(size, size, |x, y| {
        let cx = (x % cell) as f32 - cell as f32 * 0.5 + 0.5;
        let cy = (y % cell) as f32 - cell as f32 * 0.5 + 0.5;
        let d = (cx * cx + cy * cy).sqrt();
        let dot = (1.0 - (d - radius).max(0.0) / 1.5).clamp(0.0, 1.0);
        let grit = 0.98 + 0.02 * unit(x ^ (y << 12));
        shade(base, (1.0 + 0.12 * dot) * grit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textures_are_deterministic() {
        assert_eq!(wood_grain(64), wood_grain(64));
        assert_eq!(wall_dots(64), wall_dots(64));
    }

    #[test]
    fn textures_have_requested_size_and_are_opaque() {
        let wood = wood_grain(WOOD_TEXTURE_SIZE);
        assert_eq!(wood.dimensions(), (WOOD_TEXTURE_SIZE, WOOD_TEXTURE_SIZE));
        assert!(wood.pixels().all(|p| p[3] == 255));

        let wall = wall_dots(WALL_TEXTURE_SIZE);
        assert_eq!(wall.dimensions(), (WALL_TEXTURE_SIZE, WALL_TEXTURE_SIZE));
    }

    #[test]
    fn wood_has_dark_plank_seams() {
        let wood = wood_grain(64);
        let seam = wood.get_pixel(10, 16)[0];
        let board = wood.get_pixel(10, 24)[0];
        assert!(seam < board);
    }

    #[test]
    fn dots_are_lighter_than_the_plaster() {
        let wall = wall_dots(64);
        for cell_origin in [0, 8, 40] {
            let center = wall.get_pixel(cell_origin + 3, cell_origin + 3)[1];
            let corner = wall.get_pixel(cell_origin, cell_origin)[1];
            assert!(center > corner);
        }
    }
}
