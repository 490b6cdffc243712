//! Step grid, sample-accurate step clock and the session that ties them to a
//! player
//!
//! The session is the scheduler collaborator of the effects core: it decides
//! which tracks fire on each step and calls `Player::trigger` for them. It
//! has no say in how a trigger is routed.

use log::{debug, info};

use crate::config::SequencerConfig;
use crate::playback::Player;
use crate::samples::SampleBank;

/// One row of the grid
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRow {
    /// Identifier the sample bank resolves
    pub sample: String,
    pub volume: f32,
    steps: Vec<bool>,
}

impl TrackRow {
    pub fn steps(&self) -> &[bool] {
        &self.steps
    }
}

/// Tracks × steps grid of on/off cells
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    steps: usize,
    tracks: Vec<TrackRow>,
}

impl Pattern {
    pub fn new(steps: usize) -> Self {
        Self {
            steps: steps.max(1),
            tracks: Vec::new(),
        }
    }

    /// Kick on the beat, snare on the backbeat, hat on every eighth
    pub fn basic_beat(steps: usize) -> Self {
        let mut pattern = Self::new(steps);
        let kick = pattern.add_track("kick", 1.0);
        let snare = pattern.add_track("snare", 0.8);
        let hat = pattern.add_track("hat", 0.5);
        for step in 0..pattern.steps {
            pattern.set(kick, step, step % 4 == 0);
            pattern.set(snare, step, step % 8 == 4);
            pattern.set(hat, step, step % 2 == 0);
        }
        pattern
    }

    /// Append an empty row and return its track index
    pub fn add_track(&mut self, sample: impl Into<String>, volume: f32) -> usize {
        self.tracks.push(TrackRow {
            sample: sample.into(),
            volume: volume.clamp(0.0, 1.0),
            steps: vec![false; self.steps],
        });
        self.tracks.len() - 1
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, track: usize) -> Option<&TrackRow> {
        self.tracks.get(track)
    }

    pub fn is_active(&self, track: usize, step: usize) -> bool {
        self.tracks
            .get(track)
            .and_then(|row| row.steps.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, track: usize, step: usize, on: bool) {
        if let Some(cell) = self.tracks.get_mut(track).and_then(|row| row.steps.get_mut(step)) {
            *cell = on;
        }
    }

    /// Flip a cell and return its new state; out-of-range cells stay off
    pub fn toggle(&mut self, track: usize, step: usize) -> bool {
        match self.tracks.get_mut(track).and_then(|row| row.steps.get_mut(step)) {
            Some(cell) => {
                *cell = !*cell;
                *cell
            }
            None => false,
        }
    }

    pub fn set_volume(&mut self, track: usize, volume: f32) {
        if let Some(row) = self.tracks.get_mut(track) {
            row.volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn clear_track(&mut self, track: usize) {
        if let Some(row) = self.tracks.get_mut(track) {
            row.steps.fill(false);
        }
    }

    pub fn clear(&mut self) {
        for row in &mut self.tracks {
            row.steps.fill(false);
        }
    }

    /// Tracks with an active cell at `step`, in track order
    pub fn active_tracks(&self, step: usize) -> Vec<usize> {
        (0..self.tracks.len())
            .filter(|&track| self.is_active(track, step))
            .collect()
    }
}

/// Sample-accurate step timing
///
/// Step boundaries are kept as a fractional sample position so rounding
/// never accumulates drift over long runs.
pub struct StepClock {
    bpm: f32,
    sample_rate: f32,
    steps_per_beat: usize,
    steps: usize,
    samples_per_step: f64,

    sample_count: u64,
    next_step_at: f64,
    next_step: usize,
    // The step that fired most recently, for display
    playhead: usize,
    running: bool,
}

impl StepClock {
    pub fn new(config: &SequencerConfig, sample_rate: f32) -> Self {
        Self {
            bpm: config.bpm,
            sample_rate,
            steps_per_beat: config.steps_per_beat,
            steps: config.steps,
            samples_per_step: Self::samples_per_step(config.bpm, sample_rate, config.steps_per_beat),
            sample_count: 0,
            next_step_at: 0.0,
            next_step: 0,
            playhead: 0,
            running: false,
        }
    }

    fn samples_per_step(bpm: f32, sample_rate: f32, steps_per_beat: usize) -> f64 {
        let seconds_per_beat = 60.0 / bpm as f64;
        seconds_per_beat / steps_per_beat.max(1) as f64 * sample_rate as f64
    }

    /// Start from the current position; the next step fires immediately
    pub fn start(&mut self) {
        self.running = true;
        self.next_step_at = self.sample_count as f64;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Back to step 0 at sample 0
    pub fn reset(&mut self) {
        self.sample_count = 0;
        self.next_step_at = 0.0;
        self.next_step = 0;
        self.playhead = 0;
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.clamp(20.0, 400.0);
        self.samples_per_step = Self::samples_per_step(self.bpm, self.sample_rate, self.steps_per_beat);
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn playhead(&self) -> usize {
        self.playhead
    }

    /// Frames left before the next step boundary, or `None` while stopped
    pub fn frames_until_step(&self) -> Option<u64> {
        if !self.running {
            return None;
        }
        Some((self.next_step_at.round() as u64).saturating_sub(self.sample_count))
    }

    /// The step due at the current sample, if any, advancing past it
    pub fn take_due_step(&mut self) -> Option<usize> {
        if !self.running || self.sample_count < self.next_step_at.round() as u64 {
            return None;
        }
        self.playhead = self.next_step;
        self.next_step = (self.next_step + 1) % self.steps.max(1);
        self.next_step_at += self.samples_per_step;
        Some(self.playhead)
    }

    pub fn advance(&mut self, frames: u64) {
        self.sample_count += frames;
    }
}

/// A player driven by a pattern
pub struct Session {
    player: Player,
    pattern: Pattern,
    clock: StepClock,
    bank: SampleBank,
}

impl Session {
    pub fn new(player: Player, pattern: Pattern, config: &SequencerConfig, bank: SampleBank) -> Self {
        let clock = StepClock::new(config, player.sample_rate());
        Self {
            player,
            pattern,
            clock,
            bank,
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn pattern_mut(&mut self) -> &mut Pattern {
        &mut self.pattern
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut StepClock {
        &mut self.clock
    }

    pub fn bank_mut(&mut self) -> &mut SampleBank {
        &mut self.bank
    }

    pub fn play(&mut self) {
        info!("playing at {} bpm", self.clock.bpm());
        self.clock.start();
    }

    pub fn stop(&mut self) {
        info!("stopped");
        self.clock.stop();
    }

    /// Render a block, firing every step that falls inside it on its exact
    /// frame
    pub fn render(&mut self, out: &mut [f32]) {
        let mut offset = 0;
        while offset < out.len() {
            if let Some(step) = self.clock.take_due_step() {
                self.fire(step);
            }
            let remaining = out.len() - offset;
            let chunk = match self.clock.frames_until_step() {
                Some(frames) => (frames as usize).clamp(1, remaining),
                None => remaining,
            };
            self.player.render(&mut out[offset..offset + chunk]);
            self.clock.advance(chunk as u64);
            offset += chunk;
        }
    }

    fn fire(&mut self, step: usize) {
        let tracks = self.pattern.active_tracks(step);
        if !tracks.is_empty() {
            debug!("step {}: tracks {:?}", step, tracks);
        }
        for track in tracks {
            let Some(row) = self.pattern.track(track) else {
                continue;
            };
            let (sample, volume) = (row.sample.clone(), row.volume);
            self.player.trigger_sample(Some(track), &mut self.bank, &sample, volume);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_toggle_and_clear() {
        let mut pattern = Pattern::new(8);
        let track = pattern.add_track("kick", 1.0);
        assert!(pattern.toggle(track, 3));
        assert!(pattern.is_active(track, 3));
        assert!(!pattern.toggle(track, 3));
        assert!(!pattern.toggle(track, 99));

        pattern.set(track, 0, true);
        pattern.set(track, 4, true);
        assert_eq!(pattern.active_tracks(4), vec![track]);
        pattern.clear_track(track);
        assert!(!pattern.is_active(track, 4));
        pattern.set(track, 4, true);
        pattern.clear();
        assert!(pattern.active_tracks(0).is_empty());
    }

    #[test]
    fn test_basic_beat_layout() {
        let pattern = Pattern::basic_beat(16);
        assert_eq!(pattern.track_count(), 3);
        assert_eq!(pattern.active_tracks(0), vec![0, 2]);
        assert_eq!(pattern.active_tracks(4), vec![0, 1, 2]);
        assert!(pattern.active_tracks(1).is_empty());
    }

    #[test]
    fn test_clock_steps_on_exact_frames() {
        // 120 bpm, 4 steps per beat at 8 kHz = 1000 frames per step
        let config = SequencerConfig::new(120.0, 4, 4);
        let mut clock = StepClock::new(&config, 8000.0);
        assert_eq!(clock.frames_until_step(), None);

        clock.start();
        let mut fired = Vec::new();
        for frame in 0..5000u64 {
            if let Some(step) = clock.take_due_step() {
                fired.push((frame, step));
            }
            clock.advance(1);
        }
        assert_eq!(fired, vec![(0, 0), (1000, 1), (2000, 2), (3000, 3), (4000, 0)]);
        assert_eq!(clock.playhead(), 0);
    }

    #[test]
    fn test_clock_fractional_steps_do_not_drift() {
        // 1000.5 frames per step
        let config = SequencerConfig::new(120.0, 16, 4);
        let mut clock = StepClock::new(&config, 8004.0);
        clock.start();
        let mut last = 0;
        for frame in 0..100_100u64 {
            if clock.take_due_step().is_some() {
                last = frame;
            }
            clock.advance(1);
        }
        assert_eq!(last, 100_050);
    }
}
