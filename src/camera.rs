// camera.rs: orbit camera rig driven by spherical coordinates

use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_3, FRAC_PI_4, PI, TAU};

/// Smallest distance phi keeps from either pole.
pub const PHI_EPSILON: f32 = 0.01;

pub const ROTATION_SPEED: f32 = 0.005;
pub const ZOOM_SPEED: f32 = 0.01;
pub const ZOOM_STEP: f32 = 0.5;
/// Radians per second.
pub const AUTO_ROTATE_SPEED: f32 = 0.5;

const FOV_Y: f32 = FRAC_PI_4;
const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
    pub target: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLimits {
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_phi: f32,
    pub max_phi: f32,
}

/// Defaults a rig returns to on `reset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPreset {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
    pub target: Vec3,
    pub limits: CameraLimits,
}

impl CameraPreset {
    /// Studio/product viewer framing around the origin.
    pub fn product() -> Self {
        Self {
            radius: 6.0,
            theta: FRAC_PI_4,
            phi: FRAC_PI_3,
            target: Vec3::ZERO,
            limits: CameraLimits {
                min_radius: 3.0,
                max_radius: 12.0,
                min_phi: PHI_EPSILON,
                max_phi: PI - PHI_EPSILON,
            },
        }
    }

    /// Living room framing; the camera stays above the floor.
    pub fn room(target: Vec3) -> Self {
        Self {
            radius: 5.0,
            theta: FRAC_PI_4,
            phi: 60f32.to_radians(),
            target,
            limits: CameraLimits {
                min_radius: 2.0,
                max_radius: 10.0,
                min_phi: PHI_EPSILON,
                max_phi: 85f32.to_radians(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    state: CameraState,
    preset: CameraPreset,
    pub rotation_speed: f32,
    pub zoom_speed: f32,
    pub zoom_step: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    dragging: bool,
    last_pointer: (f32, f32),
}

impl OrbitCamera {
    pub fn new(preset: CameraPreset) -> Self {
        Self {
            state: CameraState {
                radius: preset.radius,
                theta: preset.theta,
                phi: preset.phi,
                target: preset.target,
            },
            preset,
            rotation_speed: ROTATION_SPEED,
            zoom_speed: ZOOM_SPEED,
            zoom_step: ZOOM_STEP,
            auto_rotate: false,
            auto_rotate_speed: AUTO_ROTATE_SPEED,
            dragging: false,
            last_pointer: (0.0, 0.0),
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn limits(&self) -> &CameraLimits {
        &self.preset.limits
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn on_pointer_down(&mut self, x: f32, y: f32) {
        self.dragging = true;
        self.last_pointer = (x, y);
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if !self.dragging {
            return;
        }
        let dx = x - self.last_pointer.0;
        let dy = y - self.last_pointer.1;
        self.state.theta = wrap_angle(self.state.theta - dx * self.rotation_speed);
        self.state.phi = self.clamp_phi(self.state.phi - dy * self.rotation_speed);
        self.last_pointer = (x, y);
    }

    pub fn on_pointer_up(&mut self) {
        self.dragging = false;
    }

    pub fn on_wheel(&mut self, delta_y: f32) {
        if !delta_y.is_finite() {
            return;
        }
        self.state.radius = self.clamp_radius(self.state.radius + delta_y * self.zoom_speed);
    }

    pub fn zoom_in(&mut self) {
        self.state.radius = self.clamp_radius(self.state.radius - self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.state.radius = self.clamp_radius(self.state.radius + self.zoom_step);
    }

    /// Restores radius/theta/phi. The look-at target is left alone.
    pub fn reset(&mut self) {
        self.state.radius = self.preset.radius;
        self.state.theta = self.preset.theta;
        self.state.phi = self.preset.phi;
        self.dragging = false;
    }

    pub fn update(&mut self, dt: f32) {
        if self.auto_rotate && !self.dragging && dt.is_finite() && dt > 0.0 {
            self.state.theta = wrap_angle(self.state.theta + self.auto_rotate_speed * dt);
        }
    }

    pub fn eye(&self) -> Vec3 {
        let CameraState {
            radius,
            theta,
            phi,
            target,
        } = self.state;
        target
            + Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.cos(),
                radius * phi.sin() * theta.sin(),
            )
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.state.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        Mat4::perspective_rh(FOV_Y, aspect, NEAR, FAR)
    }

    /// 100% at the closest allowed radius, 0% at the farthest.
    pub fn zoom_level(&self) -> f32 {
        let CameraLimits {
            min_radius,
            max_radius,
            ..
        } = self.preset.limits;
        let span = max_radius - min_radius;
        if span <= f32::EPSILON {
            return 100.0;
        }
        ((max_radius - self.state.radius) / span * 100.0).clamp(0.0, 100.0)
    }

    fn clamp_phi(&self, phi: f32) -> f32 {
        let min = self.preset.limits.min_phi.max(PHI_EPSILON);
        let max = self.preset.limits.max_phi.min(PI - PHI_EPSILON);
        if phi.is_nan() {
            return self.state.phi;
        }
        phi.clamp(min, max)
    }

    fn clamp_radius(&self, radius: f32) -> f32 {
        radius.clamp(self.preset.limits.min_radius, self.preset.limits.max_radius)
    }
}

fn wrap_angle(angle: f32) -> f32 {
    if angle.is_finite() {
        angle.rem_euclid(TAU)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn drag_then_release_only_turns_theta() {
        let mut cam = OrbitCamera::new(CameraPreset::product());
        let before = *cam.state();

        cam.on_pointer_down(100.0, 100.0);
        cam.on_pointer_move(150.0, 100.0);
        cam.on_pointer_up();

        let after = *cam.state();
        let expected = (before.theta - 50.0 * ROTATION_SPEED).rem_euclid(TAU);
        assert!(approx(after.theta, expected));
        assert_eq!(after.phi, before.phi);
        assert_eq!(after.radius, before.radius);

        cam.on_pointer_move(400.0, 300.0);
        assert_eq!(*cam.state(), after);
    }

    #[test]
    fn phi_never_reaches_the_poles() {
        let mut cam = OrbitCamera::new(CameraPreset::product());
        cam.on_pointer_down(0.0, 0.0);
        let mut y = 0.0;
        for step in [5000.0, -12000.0, 3.0, 40000.0, -80000.0, 17.0] {
            y += step;
            cam.on_pointer_move(0.0, y);
            let phi = cam.state().phi;
            assert!(phi >= PHI_EPSILON && phi <= PI - PHI_EPSILON, "phi {phi}");
            assert!(phi > 0.0 && phi < PI);
        }
    }

    #[test]
    fn room_preset_stays_above_the_floor() {
        let mut cam = OrbitCamera::new(CameraPreset::room(Vec3::ZERO));
        cam.on_pointer_down(0.0, 0.0);
        cam.on_pointer_move(0.0, -10_000.0);
        assert!(cam.eye().y > 0.0);
    }

    #[test]
    fn radius_stays_clamped() {
        let mut cam = OrbitCamera::new(CameraPreset::product());
        for delta in [1e4, -3.0, -1e5, 250.0, f32::NAN] {
            cam.on_wheel(delta);
            let r = cam.state().radius;
            assert!((3.0..=12.0).contains(&r), "radius {r}");
        }
        for _ in 0..40 {
            cam.zoom_in();
        }
        assert_eq!(cam.state().radius, 3.0);
        assert_eq!(cam.zoom_level(), 100.0);
        for _ in 0..40 {
            cam.zoom_out();
        }
        assert_eq!(cam.state().radius, 12.0);
        assert_eq!(cam.zoom_level(), 0.0);
    }

    #[test]
    fn zoom_buttons_move_by_half_a_unit() {
        let mut cam = OrbitCamera::new(CameraPreset::product());
        cam.zoom_in();
        assert!(approx(cam.state().radius, 5.5));
        cam.zoom_out();
        cam.zoom_out();
        assert!(approx(cam.state().radius, 6.5));
    }

    #[test]
    fn reset_is_idempotent_and_keeps_target() {
        let target = Vec3::new(0.0, 0.4, -1.0);
        let mut cam = OrbitCamera::new(CameraPreset::room(target));
        cam.on_pointer_down(0.0, 0.0);
        cam.on_pointer_move(77.0, -31.0);
        cam.on_wheel(120.0);

        cam.reset();
        let once = *cam.state();
        cam.reset();
        assert_eq!(*cam.state(), once);
        assert_eq!(once.radius, 5.0);
        assert!(approx(once.theta, FRAC_PI_4));
        assert!(approx(once.phi, 60f32.to_radians()));
        assert_eq!(once.target, target);
    }

    #[test]
    fn auto_rotate_advances_theta_only() {
        let mut cam = OrbitCamera::new(CameraPreset::product());
        cam.auto_rotate = true;
        let start = *cam.state();
        let dt = 1.0 / 60.0;
        for _ in 0..30 {
            cam.update(dt);
        }
        let end = *cam.state();
        let expected = (start.theta + 30.0 * AUTO_ROTATE_SPEED * dt).rem_euclid(TAU);
        assert!(approx(end.theta, expected));
        assert_eq!(end.radius, start.radius);
        assert_eq!(end.phi, start.phi);
    }

    #[test]
    fn auto_rotate_pauses_while_dragging() {
        let mut cam = OrbitCamera::new(CameraPreset::product());
        cam.auto_rotate = true;
        cam.on_pointer_down(10.0, 10.0);
        let theta = cam.state().theta;
        cam.update(0.5);
        assert_eq!(cam.state().theta, theta);
    }

    #[test]
    fn eye_follows_spherical_coordinates() {
        let cam = OrbitCamera::new(CameraPreset::product());
        let eye = cam.eye();
        assert!(approx(eye.length(), 6.0));
        assert!(approx(eye.y, 6.0 * FRAC_PI_3.cos()));
        assert!(approx(eye.x, eye.z));
        assert!(cam.view_matrix().is_finite());
        assert!(cam.projection_matrix(0.0).is_finite());
    }
}
