//! Virtual sensors.
//!
//! Every reading is computed from the current world state on demand. Noise,
//! when configured, is drawn from a generator seeded by the world seed, the
//! step index and the sensor index, so identical runs read identical values
//! and no generator state is carried between ticks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use robosim_math::{perp, wrap_angle, Pose2, Vec2};
use robosim_scenario::{EncoderSource, SensorDesc, SensorKind as SensorKindDesc};
use serde::{Deserialize, Serialize};

use crate::body::Body;
use crate::error::{PhysicsError, Result};
use crate::ids::{ActuatorId, BodyId};
use crate::traction::Actuator;

/// Largest distance reading that still reports a hit.
const MAX_HIT_READING: f64 = 1.0 - f64::EPSILON;

/// Sensor flavor, resolved against the world.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorKind {
    /// Ray cast along the mount +X axis.
    Distance {
        /// Maximum range (m).
        range: f64,
        /// Noise standard deviation on the normalized reading.
        noise_std: f64,
    },
    /// Line intensity under the mount point.
    Line {
        /// Noise standard deviation.
        noise_std: f64,
    },
    /// Line intensities along the mount +Y axis.
    LineArray {
        /// Lateral sample offsets (m).
        offsets: Vec<f64>,
        /// Noise standard deviation on each sample.
        noise_std: f64,
    },
    /// Host heading and yaw rate.
    Imu {
        /// Heading noise standard deviation (rad).
        heading_noise_std: f64,
        /// Yaw rate noise standard deviation (rad/s).
        gyro_noise_std: f64,
    },
    /// Wheel rotation of an actuator.
    Encoder {
        /// Observed wheel.
        actuator: ActuatorId,
        /// Integrated quantity.
        source: EncoderSource,
    },
}

/// A sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorValue {
    /// Hit distance over range. Exactly 1.0 when nothing is in range and
    /// strictly below 1.0 on a hit, noise included.
    Distance {
        /// Normalized reading.
        reading: f64,
    },
    /// Line intensity, typically 0 off a line and 1 on it.
    Line {
        /// Sampled intensity.
        intensity: f64,
    },
    /// One intensity per sample offset, in offset order.
    LineArray {
        /// Sampled intensities.
        intensities: Vec<f64>,
    },
    /// Orientation and angular velocity.
    Imu {
        /// Heading wrapped into (-π, π].
        heading: f64,
        /// Yaw rate (rad/s).
        angular_velocity: f64,
    },
    /// Wheel rotation (rad).
    Encoder {
        /// Rotation since the previous query.
        delta: f64,
        /// Rotation since load or reset.
        total: f64,
    },
}

impl SensorValue {
    /// The primary scalar of the reading: distance reading, line intensity,
    /// mean line array intensity, IMU heading or encoder delta.
    pub fn scalar(&self) -> f64 {
        match self {
            Self::Distance { reading } => *reading,
            Self::Line { intensity } => *intensity,
            Self::LineArray { intensities } if intensities.is_empty() => 0.0,
            Self::LineArray { intensities } => {
                intensities.iter().sum::<f64>() / intensities.len() as f64
            }
            Self::Imu { heading, .. } => *heading,
            Self::Encoder { delta, .. } => *delta,
        }
    }
}

/// A sensor mounted on a body.
#[derive(Debug, Clone)]
pub struct Sensor {
    pub(crate) name: String,
    pub(crate) body: BodyId,
    /// Mount pose in the host's center-of-mass frame.
    pub(crate) mount: Pose2,
    pub(crate) kind: SensorKind,
    /// Encoder total at the previous query.
    pub(crate) baseline: f64,
}

/// Read-only view of the state sensors observe.
pub(crate) struct SensorContext<'a> {
    pub bodies: &'a [Body],
    pub actuators: &'a [Actuator],
    pub floor_line_intensity: f64,
    pub seed: u64,
    pub step: u64,
}

impl Sensor {
    /// Resolve a sensor description. `actuator` is the resolved encoder
    /// target, if the sensor is an encoder.
    pub(crate) fn from_desc(
        desc: &SensorDesc,
        body_id: BodyId,
        body: &Body,
        actuator: Option<(ActuatorId, &Actuator)>,
    ) -> Result<Self> {
        let invalid = |reason: &str| PhysicsError::InvalidParameter {
            owner: desc.name.clone(),
            reason: reason.to_string(),
        };
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        let kind = match &desc.kind {
            SensorKindDesc::Distance { range, noise_std } => {
                if !(range.is_finite() && *range > 0.0) {
                    return Err(invalid("range must be positive"));
                }
                if !non_negative(*noise_std) {
                    return Err(invalid("noise_std must be non-negative"));
                }
                SensorKind::Distance {
                    range: *range,
                    noise_std: *noise_std,
                }
            }
            SensorKindDesc::Line { noise_std } => {
                if !non_negative(*noise_std) {
                    return Err(invalid("noise_std must be non-negative"));
                }
                SensorKind::Line {
                    noise_std: *noise_std,
                }
            }
            SensorKindDesc::LineArray { offsets, noise_std } => {
                if offsets.is_empty() {
                    return Err(invalid("line array needs at least one offset"));
                }
                if offsets.iter().any(|o| !o.is_finite()) {
                    return Err(invalid("offsets must be finite"));
                }
                if !non_negative(*noise_std) {
                    return Err(invalid("noise_std must be non-negative"));
                }
                SensorKind::LineArray {
                    offsets: offsets.clone(),
                    noise_std: *noise_std,
                }
            }
            SensorKindDesc::Imu {
                heading_noise_std,
                gyro_noise_std,
            } => {
                if !(non_negative(*heading_noise_std) && non_negative(*gyro_noise_std)) {
                    return Err(invalid("noise_std must be non-negative"));
                }
                SensorKind::Imu {
                    heading_noise_std: *heading_noise_std,
                    gyro_noise_std: *gyro_noise_std,
                }
            }
            SensorKindDesc::Encoder {
                actuator: name,
                source,
            } => {
                let (id, motor) = actuator.ok_or_else(|| PhysicsError::MissingActuator {
                    sensor: desc.name.clone(),
                    actuator: name.clone(),
                })?;
                if *source == EncoderSource::Commanded && !motor.has_command_scale() {
                    return Err(invalid(
                        "commanded encoder needs a wheel with max_force or a torque model",
                    ));
                }
                SensorKind::Encoder {
                    actuator: id,
                    source: *source,
                }
            }
        };

        let mount = Pose2::from_array(desc.mount_pose);
        if !mount.is_finite() {
            return Err(invalid("mount_pose must be finite"));
        }
        Ok(Self {
            name: desc.name.clone(),
            body: body_id,
            mount: Pose2 {
                position: body.local_from_frame(&mount.position),
                angle: mount.angle,
            },
            kind,
            baseline: 0.0,
        })
    }

    /// Name from the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host body.
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Sensor flavor.
    pub fn kind(&self) -> &SensorKind {
        &self.kind
    }

    /// World pose of the sensor.
    pub(crate) fn world_pose(&self, bodies: &[Body]) -> Pose2 {
        bodies[self.body.index()].pose.compose(&self.mount)
    }

    /// Current encoder total, if this is an encoder.
    pub(crate) fn encoder_total(&self, actuators: &[Actuator]) -> Option<f64> {
        match self.kind {
            SensorKind::Encoder { actuator, source } => {
                let motor = &actuators[actuator.index()];
                Some(match source {
                    EncoderSource::Realized => motor.realized_rotation,
                    EncoderSource::Commanded => motor.commanded_rotation,
                })
            }
            _ => None,
        }
    }

    /// Compute the reading. `index` is this sensor's position in the world.
    pub(crate) fn evaluate(&self, index: usize, ctx: &SensorContext<'_>) -> SensorValue {
        let pose = self.world_pose(ctx.bodies);
        let host = &ctx.bodies[self.body.index()];
        let mut noise = NoiseSource::new(ctx.seed, ctx.step, index);

        match self.kind {
            SensorKind::Distance { range, noise_std } => {
                let reading = match cast_ray(ctx.bodies, &pose.position, &pose.heading(), range, Some(self.body)) {
                    Some(t) => (t / range + noise.sample(noise_std)).clamp(0.0, MAX_HIT_READING),
                    None => 1.0,
                };
                SensorValue::Distance { reading }
            }
            SensorKind::Line { noise_std } => {
                let intensity = sample_line(ctx.bodies, &pose.position, ctx.floor_line_intensity);
                SensorValue::Line {
                    intensity: intensity + noise.sample(noise_std),
                }
            }
            SensorKind::LineArray {
                ref offsets,
                noise_std,
            } => {
                let across = perp(&pose.heading());
                let intensities = offsets
                    .iter()
                    .map(|&o| {
                        let point = pose.position + across * o;
                        sample_line(ctx.bodies, &point, ctx.floor_line_intensity) + noise.sample(noise_std)
                    })
                    .collect();
                SensorValue::LineArray { intensities }
            }
            SensorKind::Imu {
                heading_noise_std,
                gyro_noise_std,
            } => SensorValue::Imu {
                heading: wrap_angle(pose.angle + noise.sample(heading_noise_std)),
                angular_velocity: host.angular_velocity + noise.sample(gyro_noise_std),
            },
            SensorKind::Encoder { .. } => {
                let total = self.encoder_total(ctx.actuators).unwrap_or(0.0);
                SensorValue::Encoder {
                    delta: total - self.baseline,
                    total,
                }
            }
        }
    }
}

/// First hit of a world ray against solid bodies, as a distance along `dir`.
pub(crate) fn cast_ray(
    bodies: &[Body],
    origin: &Vec2,
    dir: &Vec2,
    range: f64,
    exclude: Option<BodyId>,
) -> Option<f64> {
    bodies
        .iter()
        .enumerate()
        .filter(|(i, b)| b.is_solid() && exclude.map_or(true, |e| e.index() != *i))
        .filter(|(_, b)| {
            // reject bodies whose bounding circle the ray cannot reach
            let to_center = b.pose.position - origin;
            let along = to_center.dot(dir).clamp(0.0, range);
            (to_center - dir * along).norm() <= b.shape.bounding_radius()
        })
        .filter_map(|(_, b)| {
            let local_origin = b.pose.inverse_transform_point(origin);
            let local_dir = robosim_math::rotate(dir, -b.pose.angle);
            b.shape.ray_cast_local(&local_origin, &local_dir, range)
        })
        .min_by(f64::total_cmp)
}

/// Highest line intensity among non-robot line surfaces covering `point`,
/// or `floor` when there are none.
pub(crate) fn sample_line(bodies: &[Body], point: &Vec2, floor: f64) -> f64 {
    bodies
        .iter()
        .filter(|b| !b.is_robot)
        .filter_map(|b| b.material.line_intensity.map(|v| (b, v)))
        .filter(|(b, _)| b.shape.contains_local(&b.pose.inverse_transform_point(point)))
        .map(|(_, v)| v)
        .reduce(f64::max)
        .unwrap_or(floor)
}

/// Per-evaluation Gaussian noise.
struct NoiseSource {
    seed: u64,
    rng: Option<StdRng>,
}

impl NoiseSource {
    fn new(seed: u64, step: u64, index: usize) -> Self {
        let mut h = seed ^ 0x9E37_79B9_7F4A_7C15;
        for word in [step, index as u64] {
            h = splitmix(h ^ word);
        }
        Self { seed: h, rng: None }
    }

    /// Zero-mean normal sample; draws nothing when `std_dev` is zero.
    fn sample(&mut self, std_dev: f64) -> f64 {
        if std_dev <= 0.0 {
            return 0.0;
        }
        let seed = self.seed;
        let rng = self.rng.get_or_insert_with(|| StdRng::seed_from_u64(seed));
        // Box-Muller
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        z * std_dev
    }
}

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
