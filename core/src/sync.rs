/// Fraction of the window peak a sample must reach to count as carrier
const PEAK_RATIO: f64 = 0.9;
/// A preceding half-cycle at least this loud means the burst started earlier
const WALK_BACK_RATIO: f64 = 0.5;

/// Locate the first full carrier cycle of a burst.
///
/// Searches `samples[..search_window]` for its absolute peak, then for the
/// first sample at or above 90% of it. The coarse estimate is a quarter
/// cycle before that sample. When the rising edge can be seen, the result
/// is snapped to it instead: the last sample at or below the level the
/// burst's first two samples are expected to average, walking back whole
/// cycles while louder carrier precedes it.
///
/// `lead_fraction` is the sub-sample offset of the burst's first bit in
/// its window (0 when the burst starts on a sample).
///
/// Returns `None` when the window holds no signal.
pub fn find_first_cycle(
    samples: &[i32],
    search_window: usize,
    samples_per_cycle: f64,
    lead_fraction: f64,
) -> Option<usize> {
    let window = &samples[..search_window.min(samples.len())];
    let peak = window.iter().map(|s| s.unsigned_abs()).max()? as f64;
    if peak == 0.0 {
        return None;
    }

    let first_loud = window
        .iter()
        .position(|&s| s as f64 >= PEAK_RATIO * peak)?;

    let quarter = samples_per_cycle / 4.0;
    let span = samples_per_cycle.ceil() as usize;
    let edge = edge_threshold(peak, samples_per_cycle, lead_fraction);

    let Some(mut start) = rising_edge(window, first_loud, span, edge) else {
        return Some((first_loud as f64 - quarter).max(0.0) as usize);
    };

    loop {
        let lo = start.saturating_sub(span);
        let Some(louder) = (lo..start)
            .rev()
            .find(|&k| window[k] as f64 >= WALK_BACK_RATIO * peak)
        else {
            break;
        };
        match rising_edge(window, louder, span, edge) {
            Some(earlier) => start = earlier,
            None => break,
        }
    }

    Some(start)
}

/// Mean of the first two samples of a burst at phase `lead_fraction` samples in
fn edge_threshold(peak: f64, samples_per_cycle: f64, lead_fraction: f64) -> f64 {
    let angle = |x: f64| (2.0 * std::f64::consts::PI * x / samples_per_cycle).sin();
    let first = -angle(lead_fraction);
    let second = angle(1.0 - lead_fraction);
    peak * (first + second) / 2.0
}

/// Last sample at or below `edge` within one cycle before `from`
fn rising_edge(samples: &[i32], from: usize, span: usize, edge: f64) -> Option<usize> {
    let lo = from.saturating_sub(span);
    (lo..from).rev().find(|&k| samples[k] as f64 <= edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulator::ToneModulator;

    fn burst(lead_silence: usize, frequency: u32, frame_rate: u32) -> Vec<i32> {
        let mut samples = vec![0i32; lead_silence];
        let rendered = ToneModulator::new(frequency, frame_rate, 1).render(&[true; 20]);
        samples.extend(rendered.iter().map(|&s| s as i32));
        samples
    }

    #[test]
    fn test_silence_has_no_cycle() {
        assert_eq!(find_first_cycle(&[0; 1000], 1000, 24.0, 0.0), None);
        assert_eq!(find_first_cycle(&[], 1000, 24.0, 0.0), None);
    }

    #[test]
    fn test_only_negative_peak_has_no_cycle() {
        let samples = [0, -100, -20, 10, 0];
        assert_eq!(find_first_cycle(&samples, 5, 6.0, 0.0), None);
    }

    #[test]
    fn test_finds_burst_start() {
        for lead in [0, 1, 7, 500] {
            let samples = burst(lead, 2000, 48000);
            assert_eq!(
                find_first_cycle(&samples, samples.len(), 24.0, 0.0),
                Some(lead),
                "lead silence {}",
                lead
            );
        }
    }

    #[test]
    fn test_finds_burst_start_fractional_cycle() {
        let samples = burst(333, 7000, 44100);
        assert_eq!(find_first_cycle(&samples, samples.len(), 6.3, 0.0), Some(333));
    }

    #[test]
    fn test_walks_back_over_quiet_first_cycle() {
        let mut samples = burst(100, 2000, 48000);
        // First cycle at 60% of full scale
        for s in &mut samples[100..124] {
            *s = *s * 6 / 10;
        }
        assert_eq!(find_first_cycle(&samples, samples.len(), 24.0, 0.0), Some(100));
    }

    #[test]
    fn test_window_limits_search() {
        let samples = burst(1000, 2000, 48000);
        assert_eq!(find_first_cycle(&samples, 900, 24.0, 0.0), None);
    }
}
