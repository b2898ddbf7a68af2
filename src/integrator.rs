/*
 * Integrator Module
 *
 * Advances one bird by an elapsed-time increment: the heading rotates toward
 * the desired direction by at most turn_rate * dt radians, then the position
 * advances along the new heading at the movement speed.
 *
 * The rotation never needs the actual angle between the headings. The blend
 * axis is the component of the desired direction orthogonal to the current
 * heading; since both are unit length and orthogonal, the blend is itself a
 * unit vector.
 */

use glam::Vec3;

use crate::bird::Bird;
use crate::params::SimulationParams;

// Rotate the unit vector `dir` toward the unit vector `desired` by `angle`
// radians. When the two are parallel or anti-parallel the rotation plane is
// undefined and `dir` is returned unchanged.
pub fn rotate_toward(dir: Vec3, desired: Vec3, angle: f32) -> Vec3 {
    let ortho = dir.cross(desired).cross(dir);
    match ortho.try_normalize() {
        Some(axis) => {
            let rotated = angle.cos() * dir + angle.sin() * axis;
            // Renormalize against floating-point drift
            rotated.try_normalize().unwrap_or(dir)
        }
        None => dir,
    }
}

// Apply one tick to a bird. A degenerate force sum (desired = None) holds the
// current heading; the position still advances.
pub fn integrate(bird: &mut Bird, desired: Option<Vec3>, dt: f32, params: &SimulationParams) {
    if let Some(target) = desired {
        bird.dir = rotate_toward(bird.dir, target, params.turn_rate * dt);
    }
    bird.pos += bird.dir * params.move_speed * dt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_angle_is_bounded_and_norm_preserved() {
        let dir = Vec3::X;
        let desired = Vec3::new(0.3, 0.8, -0.5).normalize();
        for &angle in &[0.01_f32, 0.1, 0.4, 1.2] {
            let rotated = rotate_toward(dir, desired, angle);
            assert!((rotated.length() - 1.0).abs() < 1e-5);
            let turned = dir.dot(rotated).clamp(-1.0, 1.0).acos();
            assert!(
                turned <= angle + 1e-4,
                "turned {turned} exceeds the max step {angle}"
            );
        }
    }

    #[test]
    fn parallel_and_antiparallel_targets_hold_the_heading() {
        let dir = Vec3::Z;
        assert_eq!(rotate_toward(dir, Vec3::Z, 0.5), dir);
        assert_eq!(rotate_toward(dir, Vec3::NEG_Z, 0.5), dir);
    }

    #[test]
    fn position_advances_along_the_new_heading() {
        let params = SimulationParams {
            move_speed: 2.0,
            turn_rate: 1.5,
            ..SimulationParams::default()
        };
        let mut bird = Bird::new(Vec3::ZERO, Vec3::X);
        integrate(&mut bird, None, 0.5, &params);
        assert_eq!(bird.dir, Vec3::X);
        assert_eq!(bird.pos, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_moves_the_heading_toward_the_target() {
        let params = SimulationParams::default();
        let mut bird = Bird::new(Vec3::ZERO, Vec3::X);
        let before = bird.dir.dot(Vec3::Y);
        integrate(&mut bird, Some(Vec3::Y), 0.1, &params);
        assert!(bird.dir.dot(Vec3::Y) > before);
        assert!((bird.dir.length() - 1.0).abs() < 1e-5);
    }
}
