//! Time-based color/alpha oscillation.

use std::f32::consts::TAU;

use glam::{Vec3, Vec4};
use worldspace_common::time::elapsed_secs;
use worldspace_entities::{PulseMode, PulsePropertyGroup};

/// Whether `pulse` changes anything at all.
pub fn is_pulsing(pulse: &PulsePropertyGroup) -> bool {
    pulse.period != 0.0
        && (pulse.color_mode != PulseMode::None || pulse.alpha_mode != PulseMode::None)
}

/// Pulse factor in `[min, max]`, at `max` on every whole period.
pub fn pulse_factor(pulse: &PulsePropertyGroup, start_usec: u64, now_usec: u64) -> f32 {
    let t = elapsed_secs(start_usec, now_usec);
    0.5 * ((t * TAU / pulse.period).cos() + 1.0) * (pulse.max - pulse.min) + pulse.min
}

fn modulate(value: f32, mode: PulseMode, factor: f32) -> f32 {
    match mode {
        PulseMode::None => value,
        PulseMode::InPhase => value * factor,
        PulseMode::OutPhase => value * (1.0 - factor),
    }
}

pub fn calculate_pulse_color(
    color: Vec4,
    pulse: &PulsePropertyGroup,
    start_usec: u64,
    now_usec: u64,
) -> Vec4 {
    if !is_pulsing(pulse) {
        return color;
    }
    let factor = pulse_factor(pulse, start_usec, now_usec);
    let rgb = calculate_rgb(color.truncate(), pulse.color_mode, factor);
    rgb.extend(modulate(color.w, pulse.alpha_mode, factor))
}

/// Color-only variant; the alpha mode is ignored.
pub fn calculate_pulse_color_rgb(
    color: Vec3,
    pulse: &PulsePropertyGroup,
    start_usec: u64,
    now_usec: u64,
) -> Vec3 {
    if !is_pulsing(pulse) {
        return color;
    }
    let factor = pulse_factor(pulse, start_usec, now_usec);
    calculate_rgb(color, pulse.color_mode, factor)
}

fn calculate_rgb(color: Vec3, mode: PulseMode, factor: f32) -> Vec3 {
    Vec3::new(
        modulate(color.x, mode, factor),
        modulate(color.y, mode, factor),
        modulate(color.z, mode, factor),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldspace_common::USECS_PER_SECOND;

    fn pulse(period: f32, color: PulseMode, alpha: PulseMode) -> PulsePropertyGroup {
        PulsePropertyGroup {
            min: 0.2,
            max: 0.8,
            period,
            color_mode: color,
            alpha_mode: alpha,
        }
    }

    const COLOR: Vec4 = Vec4::new(0.5, 0.25, 1.0, 0.9);

    #[test]
    fn zero_period_is_identity() {
        let p = pulse(0.0, PulseMode::InPhase, PulseMode::OutPhase);
        for t in [0, 123_456, 7 * USECS_PER_SECOND] {
            assert_eq!(calculate_pulse_color(COLOR, &p, 0, t), COLOR);
        }
    }

    #[test]
    fn no_modes_is_identity() {
        let p = pulse(2.0, PulseMode::None, PulseMode::None);
        assert_eq!(calculate_pulse_color(COLOR, &p, 0, 500_000), COLOR);
        let rgb = COLOR.truncate();
        assert_eq!(calculate_pulse_color_rgb(rgb, &p, 0, 500_000), rgb);
    }

    #[test]
    fn factor_at_period_start_is_max() {
        let p = pulse(1.0, PulseMode::InPhase, PulseMode::None);
        assert!((pulse_factor(&p, 0, 0) - 0.8).abs() < 1e-5);
        assert!((pulse_factor(&p, 0, USECS_PER_SECOND / 2) - 0.2).abs() < 1e-5);
    }

    #[test]
    fn pulse_is_periodic() {
        let p = pulse(0.5, PulseMode::InPhase, PulseMode::OutPhase);
        let period = USECS_PER_SECOND / 2;
        for t in [0, 100_000, 333_333] {
            let a = calculate_pulse_color(COLOR, &p, 0, t);
            let b = calculate_pulse_color(COLOR, &p, 0, t + period);
            let c = calculate_pulse_color(COLOR, &p, 0, t + 4 * period);
            assert!(a.abs_diff_eq(b, 1e-4));
            assert!(a.abs_diff_eq(c, 1e-4));
        }
    }

    #[test]
    fn modes_apply_per_channel_group() {
        let p = pulse(1.0, PulseMode::OutPhase, PulseMode::None);
        let out = calculate_pulse_color(COLOR, &p, 0, 0);
        // factor is 0.8 at t=0, so out-of-phase scales rgb by 0.2.
        assert!(out.truncate().abs_diff_eq(COLOR.truncate() * 0.2, 1e-5));
        assert_eq!(out.w, COLOR.w);

        let p = pulse(1.0, PulseMode::None, PulseMode::InPhase);
        let out = calculate_pulse_color(COLOR, &p, 0, 0);
        assert_eq!(out.truncate(), COLOR.truncate());
        assert!((out.w - COLOR.w * 0.8).abs() < 1e-5);
    }
}
