//! Hobby servo driver.
//!
//! Standard 50 Hz servo signal: a 20 ms frame with a 544-2400 µs high
//! pulse mapping linearly onto 0-180°. Generic over any
//! [`SetDutyCycle`] channel, so on ESP-IDF it sits on an LEDC channel
//! and on the host on a recording fake.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::ActuatorPort;

/// Frame rate expected by hobby servos.
pub const SERVO_FREQUENCY_HZ: u32 = 50;

const FRAME_US: u16 = 20_000;
const MIN_PULSE_US: u16 = 544;
const MAX_PULSE_US: u16 = 2_400;
const MAX_ANGLE: u8 = 180;

/// Pulse width for `angle` degrees (clamped to 0-180).
pub fn pulse_width_us(angle: u8) -> u16 {
    let angle = u32::from(angle.min(MAX_ANGLE));
    let span = u32::from(MAX_PULSE_US - MIN_PULSE_US);
    MIN_PULSE_US + (span * angle / u32::from(MAX_ANGLE)) as u16
}

pub struct ServoDriver<P> {
    pwm: P,
    angle: Option<u8>,
}

impl<P: SetDutyCycle> ServoDriver<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm, angle: None }
    }

    /// Last angle successfully written to the channel.
    pub fn angle(&self) -> Option<u8> {
        self.angle
    }

    pub fn write(&mut self, angle: u8) -> Result<(), P::Error> {
        let angle = angle.min(MAX_ANGLE);
        self.pwm
            .set_duty_cycle_fraction(pulse_width_us(angle), FRAME_US)?;
        self.angle = Some(angle);
        Ok(())
    }

    pub fn into_inner(self) -> P {
        self.pwm
    }
}

impl<P: SetDutyCycle> ActuatorPort for ServoDriver<P> {
    fn set_position(&mut self, angle: u8) {
        if let Err(e) = self.write(angle) {
            warn!("Servo: PWM write failed: {:?}", e);
        }
    }
}
