use nalgebra::{Matrix3, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use uom::si::angle::radian;
use uom::si::f64::Angle;

use super::geometry::ModuleMap;
use crate::config::ConfigError;

/// Module speeds below this are treated as standing still when picking an angle
const MIN_MODULE_SPEED: f64 = 1e-9;

/// Robot-relative chassis velocity.
/// vx forward (m/s), vy left (m/s), omega counter-clockwise (rad/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega.is_finite()
    }
}

/// Target for a single module: wheel speed along the direction `angle`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwerveModuleState {
    pub speed_mps: f64,
    pub angle: Angle,
}

impl Default for SwerveModuleState {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl SwerveModuleState {
    pub fn new(speed_mps: f64, angle_rad: f64) -> Self {
        Self {
            speed_mps,
            angle: Angle::new::<radian>(angle_rad),
        }
    }

    /// ## Minimize steering travel.
    /// Instead of turning more than 90 degrees away from `current`, turn to the
    /// opposite heading and run the wheel backwards.
    pub fn optimize(self, current: Angle) -> Self {
        let delta = wrap_angle(self.angle.get::<radian>() - current.get::<radian>());
        if delta.abs() > FRAC_PI_2 {
            Self::new(
                -self.speed_mps,
                wrap_angle(self.angle.get::<radian>() + PI),
            )
        } else {
            self
        }
    }
}

/// Wrap radians into (-PI, PI]
pub fn wrap_angle(rad: f64) -> f64 {
    let wrapped = (rad + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// ## Swerve kinematics for four modules.
/// Built once from the module locations. Holds the 8x3 inverse-kinematics matrix
/// (two rows per module, canonical order) and its least-squares pseudo-inverse
/// for going back from module states to chassis speeds. Immutable, so it can sit
/// behind an `Arc` and be used from any thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SwerveKinematics {
    locations: ModuleMap<Vector2<f64>>,
    inverse: SMatrix<f64, 8, 3>,
    forward: SMatrix<f64, 3, 8>,
}

impl SwerveKinematics {
    pub fn new(locations: &ModuleMap<Vector2<f64>>) -> Result<Self, ConfigError> {
        let mut inverse = SMatrix::<f64, 8, 3>::zeros();

        // module velocity = chassis velocity + omega x r
        //   [vx_i]   [1 0 -y_i] [vx   ]
        //   [vy_i] = [0 1  x_i] [vy   ]
        //                       [omega]
        for (position, location) in locations.iter() {
            let row = 2 * position.index();
            inverse[(row, 0)] = 1.0;
            inverse[(row, 2)] = -location.y;
            inverse[(row + 1, 1)] = 1.0;
            inverse[(row + 1, 2)] = location.x;
        }

        let transpose = inverse.transpose();
        let normal: Matrix3<f64> = transpose * inverse;
        let normal_inv = normal
            .try_inverse()
            .ok_or(ConfigError::DegenerateGeometry)?;

        Ok(Self {
            locations: *locations,
            inverse,
            forward: normal_inv * transpose,
        })
    }

    /// ## Chassis speeds -> per-module speed and angle.
    /// Angles are wrapped to (-PI, PI]. A module that isn't moving reports angle 0.
    pub fn to_module_states(&self, speeds: ChassisSpeeds) -> ModuleMap<SwerveModuleState> {
        let module_velocities = self.inverse * Vector3::new(speeds.vx, speeds.vy, speeds.omega);

        ModuleMap::from_fn(|position| {
            let row = 2 * position.index();
            let v = Vector2::new(module_velocities[row], module_velocities[row + 1]);
            let speed = v.norm();
            let angle = if speed < MIN_MODULE_SPEED {
                0.0
            } else {
                wrap_angle(v.y.atan2(v.x))
            };
            SwerveModuleState::new(speed, angle)
        })
    }

    /// Module states -> best-fit chassis speeds (least squares over all four modules)
    pub fn to_chassis_speeds(&self, states: &ModuleMap<SwerveModuleState>) -> ChassisSpeeds {
        let mut module_velocities = SVector::<f64, 8>::zeros();
        for (position, state) in states.iter() {
            let row = 2 * position.index();
            let angle = state.angle.get::<radian>();
            module_velocities[row] = state.speed_mps * angle.cos();
            module_velocities[row + 1] = state.speed_mps * angle.sin();
        }

        let chassis = self.forward * module_velocities;
        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }

    /// X-lock: every wheel points along its own position vector at zero speed
    pub fn brake_states(&self) -> ModuleMap<SwerveModuleState> {
        self.locations
            .map(|_, location| SwerveModuleState::new(0.0, location.y.atan2(location.x)))
    }
}

/// ## Scales module speeds so none exceeds `max_speed_mps`.
/// All modules are scaled by the same factor, so the direction of travel is kept.
pub fn desaturate_wheel_speeds(
    states: ModuleMap<SwerveModuleState>,
    max_speed_mps: f64,
) -> ModuleMap<SwerveModuleState> {
    let fastest = states
        .iter()
        .map(|(_, state)| state.speed_mps.abs())
        .fold(0.0, f64::max);

    if fastest > max_speed_mps {
        let scale = max_speed_mps / fastest;
        states.map(|_, state| SwerveModuleState {
            speed_mps: state.speed_mps * scale,
            angle: state.angle,
        })
    } else {
        states
    }
}

/// One-line summary for debug logs
pub fn format_states(states: &ModuleMap<SwerveModuleState>) -> String {
    states
        .iter()
        .map(|(position, state)| {
            format!(
                "{}={:.2}m/s@{:.1}deg",
                position.short_name(),
                state.speed_mps,
                state.angle.get::<radian>().to_degrees()
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swerve::geometry::{GeometryConfig, resolve};
    use std::f64::consts::FRAC_PI_4;

    const EPS: f64 = 1e-9;

    fn square_kinematics() -> SwerveKinematics {
        SwerveKinematics::new(&resolve(&GeometryConfig::new(1.0, 1.0).unwrap())).unwrap()
    }

    fn robot_kinematics() -> SwerveKinematics {
        SwerveKinematics::new(&resolve(&GeometryConfig::new(0.6604, 0.4826).unwrap())).unwrap()
    }

    fn assert_state(state: &SwerveModuleState, speed: f64, angle: f64) {
        assert!(
            (state.speed_mps - speed).abs() < EPS,
            "speed {} != {}",
            state.speed_mps,
            speed
        );
        assert!(
            (state.angle.get::<radian>() - angle).abs() < EPS,
            "angle {} != {}",
            state.angle.get::<radian>(),
            angle
        );
    }

    fn assert_speeds(actual: ChassisSpeeds, expected: ChassisSpeeds) {
        assert!((actual.vx - expected.vx).abs() < EPS, "{actual:?} != {expected:?}");
        assert!((actual.vy - expected.vy).abs() < EPS, "{actual:?} != {expected:?}");
        assert!((actual.omega - expected.omega).abs() < EPS, "{actual:?} != {expected:?}");
    }

    #[test]
    fn test_zero_speeds() {
        let states = square_kinematics().to_module_states(ChassisSpeeds::zero());
        for (_, state) in states.iter() {
            assert_state(state, 0.0, 0.0);
        }
    }

    #[test]
    fn test_forward() {
        let states = square_kinematics().to_module_states(ChassisSpeeds::new(1.0, 0.0, 0.0));
        for (_, state) in states.iter() {
            assert_state(state, 1.0, 0.0);
        }
    }

    #[test]
    fn test_strafe_left() {
        let states = square_kinematics().to_module_states(ChassisSpeeds::new(0.0, 0.5, 0.0));
        for (_, state) in states.iter() {
            assert_state(state, 0.5, FRAC_PI_2);
        }
    }

    #[test]
    fn test_counter_clockwise_rotation() {
        // modules sit at (+-0.5, +-0.5); omega x r has magnitude sqrt(0.5)
        let states = square_kinematics().to_module_states(ChassisSpeeds::new(0.0, 0.0, 1.0));
        let speed = 0.5f64.hypot(0.5);

        assert_state(&states.front_left, speed, 3.0 * FRAC_PI_4);
        assert_state(&states.front_right, speed, FRAC_PI_4);
        assert_state(&states.back_left, speed, -3.0 * FRAC_PI_4);
        assert_state(&states.back_right, speed, -FRAC_PI_4);
    }

    #[test]
    fn test_round_trip_translation() {
        let kinematics = robot_kinematics();
        let speeds = ChassisSpeeds::new(2.0, -1.25, 0.0);
        let back = kinematics.to_chassis_speeds(&kinematics.to_module_states(speeds));
        assert_speeds(back, speeds);
    }

    #[test]
    fn test_round_trip_rotation() {
        let kinematics = robot_kinematics();
        let speeds = ChassisSpeeds::new(0.0, 0.0, 2.0 * PI);
        let back = kinematics.to_chassis_speeds(&kinematics.to_module_states(speeds));
        assert_speeds(back, speeds);
    }

    #[test]
    fn test_round_trip_combined() {
        let kinematics = robot_kinematics();
        let speeds = ChassisSpeeds::new(-3.1, 0.4, -1.7);
        let back = kinematics.to_chassis_speeds(&kinematics.to_module_states(speeds));
        assert_speeds(back, speeds);
    }

    #[test]
    fn test_desaturate() {
        let kinematics = robot_kinematics();
        let states = kinematics.to_module_states(ChassisSpeeds::new(5.0, 0.0, 2.0 * PI));
        let fastest_before = states.iter().map(|(_, s)| s.speed_mps).fold(0.0, f64::max);
        assert!(fastest_before > 5.0);

        let scaled = desaturate_wheel_speeds(states, 5.0);
        let fastest_after = scaled.iter().map(|(_, s)| s.speed_mps).fold(0.0, f64::max);
        assert!((fastest_after - 5.0).abs() < EPS);

        // angles untouched, ratios preserved
        let ratio = fastest_after / fastest_before;
        for ((_, before), (_, after)) in states.iter().zip(scaled.iter()) {
            assert_eq!(before.angle, after.angle);
            assert!((after.speed_mps - before.speed_mps * ratio).abs() < EPS);
        }
    }

    #[test]
    fn test_desaturate_leaves_slow_states_alone() {
        let states = robot_kinematics().to_module_states(ChassisSpeeds::new(1.0, 1.0, 0.0));
        assert_eq!(desaturate_wheel_speeds(states, 5.0), states);
    }

    #[test]
    fn test_optimize_flips_large_turns() {
        let state = SwerveModuleState::new(2.0, 3.0 * FRAC_PI_4);
        let optimized = state.optimize(Angle::new::<radian>(0.0));
        assert_state(&optimized, -2.0, -FRAC_PI_4);
    }

    #[test]
    fn test_optimize_keeps_small_turns() {
        let state = SwerveModuleState::new(2.0, FRAC_PI_4);
        assert_eq!(state.optimize(Angle::new::<radian>(0.0)), state);
    }

    #[test]
    fn test_brake_states_point_outward() {
        let states = square_kinematics().brake_states();
        assert_state(&states.front_left, 0.0, FRAC_PI_4);
        assert_state(&states.front_right, 0.0, -FRAC_PI_4);
        assert_state(&states.back_left, 0.0, 3.0 * FRAC_PI_4);
        assert_state(&states.back_right, 0.0, -3.0 * FRAC_PI_4);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(2.5 * PI) - FRAC_PI_2).abs() < EPS);
        assert!((wrap_angle(-PI) - PI).abs() < EPS);
        assert!((wrap_angle(-FRAC_PI_2) + FRAC_PI_2).abs() < EPS);
    }
}
