//! Audio input seam
//!
//! The visualizer reads one amplitude spectrum per frame from a single
//! [`AudioProvider`]. Hosts with several producers merge them with
//! [`MixedProvider`] before handing the result to the core.

/// Number of frequency bins in a spectrum frame
pub const SPECTRUM_LEN: usize = 256;

/// One frame of 8-bit amplitudes, low frequencies first.
///
/// Providers may hand over any length; bins past the end read as silence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spectrum {
    bins: Vec<u8>,
}

impl Spectrum {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    /// A full-length frame of silence
    pub fn silent() -> Self {
        Self {
            bins: vec![0; SPECTRUM_LEN],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    #[inline]
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Amplitude at `index`, zero when out of range
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.bins.get(index).copied().unwrap_or(0)
    }

    /// Mean amplitude over `[start, end)`.
    /// Missing bins count as zero; an empty range is silent.
    pub fn band_average(&self, start: usize, end: usize) -> f32 {
        if end <= start {
            return 0.0;
        }
        let sum: u32 = (start..end).map(|i| self.get(i) as u32).sum();
        sum as f32 / (end - start) as f32
    }

    /// Per-bin saturating sum into `self`, growing to the longer length
    pub fn saturating_accumulate(&mut self, other: &Spectrum) {
        if other.bins.len() > self.bins.len() {
            self.bins.resize(other.bins.len(), 0);
        }
        for (dst, &src) in self.bins.iter_mut().zip(&other.bins) {
            *dst = dst.saturating_add(src);
        }
    }
}

/// Something that can be polled once per frame for a spectrum.
///
/// Implementations must not block: return the most recent pre-computed frame
/// or `None` when no audio is playing.
pub trait AudioProvider {
    fn spectrum(&mut self) -> Option<Spectrum>;

    /// Advance any internal clock. Called once per frame before `spectrum`.
    fn advance(&mut self, _dt: f32) {}

    fn name(&self) -> &str;
}

/// Composes several providers into one by summing bins (clamped at 255).
/// Returns `None` only when every source is silent.
#[derive(Default)]
pub struct MixedProvider {
    sources: Vec<Box<dyn AudioProvider>>,
}

impl MixedProvider {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Box<dyn AudioProvider>) -> Self {
        self.sources.push(source);
        self
    }
}

impl AudioProvider for MixedProvider {
    fn spectrum(&mut self) -> Option<Spectrum> {
        let mut mixed: Option<Spectrum> = None;
        for source in &mut self.sources {
            if let Some(frame) = source.spectrum() {
                match mixed.as_mut() {
                    Some(acc) => acc.saturating_accumulate(&frame),
                    None => mixed = Some(frame),
                }
            }
        }
        mixed
    }

    fn advance(&mut self, dt: f32) {
        for source in &mut self.sources {
            source.advance(dt);
        }
    }

    fn name(&self) -> &str {
        "mix"
    }
}

/// Procedural spectrum producer: a decaying kick on a fixed tempo plus a slow
/// drifting pad. Stands in for real players so the host has something to
/// react to without decoding audio.
pub struct PulseSource {
    name: String,
    bpm: f32,
    /// Center bin of the pad band
    pad_center: f32,
    pad_width: f32,
    level: f32,
    time: f32,
    playing: bool,
}

impl PulseSource {
    pub fn new(name: impl Into<String>, bpm: f32, pad_center: f32, level: f32) -> Self {
        Self {
            name: name.into(),
            bpm: bpm.max(1.0),
            pad_center,
            pad_width: 24.0,
            level: level.clamp(0.0, 1.0),
            time: 0.0,
            playing: true,
        }
    }

    pub fn with_pad_width(mut self, width: f32) -> Self {
        self.pad_width = width.max(1.0);
        self
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Spectrum at an absolute time, a pure function of `t`
    pub fn frame_at(&self, t: f32) -> Spectrum {
        let beat_len = 60.0 / self.bpm;
        let since_beat = t.rem_euclid(beat_len);
        let kick = (-since_beat * 9.0).exp();
        let pad_center = self.pad_center + (t * 0.3).sin() * self.pad_width;

        let bins = (0..SPECTRUM_LEN)
            .map(|i| {
                let f = i as f32;
                // Kick lives in the bottom bins and rolls off quickly
                let low = kick * (-f / 18.0).exp();
                let d = (f - pad_center) / self.pad_width;
                let pad = 0.45 * (-d * d).exp() * (0.75 + 0.25 * (t * 1.7 + f * 0.05).sin());
                let v = (low + pad).min(1.0) * self.level * 255.0;
                v.clamp(0.0, 255.0) as u8
            })
            .collect();

        Spectrum::new(bins)
    }
}

impl AudioProvider for PulseSource {
    fn spectrum(&mut self) -> Option<Spectrum> {
        if self.playing {
            Some(self.frame_at(self.time))
        } else {
            None
        }
    }

    fn advance(&mut self, dt: f32) {
        if self.playing {
            self.time += dt;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<Spectrum>);

    impl AudioProvider for Fixed {
        fn spectrum(&mut self) -> Option<Spectrum> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_band_average_handles_short_arrays() {
        let s = Spectrum::new(vec![100, 200]);
        assert_eq!(s.band_average(0, 2), 150.0);
        // Bins 2 and 3 are missing and count as zero
        assert_eq!(s.band_average(0, 4), 75.0);
        assert_eq!(s.band_average(10, 20), 0.0);
        assert_eq!(s.band_average(5, 5), 0.0);
        assert_eq!(s.band_average(6, 3), 0.0);
    }

    #[test]
    fn test_mix_sums_and_saturates() {
        let mut mix = MixedProvider::new()
            .with_source(Box::new(Fixed(Some(Spectrum::new(vec![200, 10, 0])))))
            .with_source(Box::new(Fixed(Some(Spectrum::new(vec![100, 10])))));
        let out = mix.spectrum().unwrap();
        assert_eq!(out.bins(), &[255, 20, 0]);
    }

    #[test]
    fn test_mix_skips_silent_sources() {
        let mut mix = MixedProvider::new()
            .with_source(Box::new(Fixed(None)))
            .with_source(Box::new(Fixed(Some(Spectrum::new(vec![7; 4])))));
        assert_eq!(mix.spectrum().unwrap().bins(), &[7, 7, 7, 7]);

        let mut silent = MixedProvider::new().with_source(Box::new(Fixed(None)));
        assert!(silent.spectrum().is_none());
        assert!(MixedProvider::new().spectrum().is_none());
    }

    #[test]
    fn test_pulse_source_full_length_and_deterministic() {
        let src = PulseSource::new("kick", 90.0, 96.0, 0.9);
        let a = src.frame_at(1.25);
        let b = src.frame_at(1.25);
        assert_eq!(a, b);
        assert_eq!(a.len(), SPECTRUM_LEN);
    }

    #[test]
    fn test_pulse_source_kick_is_loud_on_the_beat() {
        let src = PulseSource::new("kick", 120.0, 200.0, 1.0);
        let on_beat = src.frame_at(0.0).get(0);
        let off_beat = src.frame_at(0.45).get(0);
        assert!(on_beat > off_beat, "{} <= {}", on_beat, off_beat);
    }

    #[test]
    fn test_paused_source_reports_none() {
        let mut src = PulseSource::new("pad", 70.0, 64.0, 0.5);
        src.set_playing(false);
        src.advance(1.0);
        assert!(src.spectrum().is_none());
    }
}
