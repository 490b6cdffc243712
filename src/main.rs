//! Play the default beat live, or bounce it to a WAV file.
//!
//! Samples are looked up as `<samples>/<name>.wav`; a missing one is
//! replaced by a synthesized tone so the pattern is always audible.

#[cfg(feature = "native")]
mod cli {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{anyhow, bail, Context};
    use clap::Parser;
    use log::{info, warn};

    use gridbeat::bounce::bounce_to_wav;
    use gridbeat::platform::{AudioOutput, CpalOutput};
    use gridbeat::samples::{SampleBank, SampleBuffer};
    use gridbeat::sequencer::{Pattern, Session};
    use gridbeat::utils::init_logger;
    use gridbeat::{EffectKind, EffectsConfig, Player, PlayerConfig, SequencerConfig};

    #[derive(Parser, Debug)]
    #[command(name = "gridbeat", version, about = "Step sequencer with per-track effect chains")]
    struct Args {
        /// Tempo in beats per minute
        #[arg(long, default_value_t = 120.0)]
        bpm: f32,

        /// How long to play or bounce, in seconds
        #[arg(long, default_value_t = 8.0, value_parser = parse_seconds)]
        seconds: f32,

        /// Directory holding kick.wav, snare.wav and hat.wav
        #[arg(long, default_value = "samples")]
        samples: PathBuf,

        /// Render offline to this WAV file instead of playing live
        #[arg(long)]
        bounce: Option<PathBuf>,

        /// Sample rate used when bouncing
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Add an effect to a track, e.g. `--effect 1:reverb` (repeatable)
        #[arg(long = "effect", value_parser = parse_effect)]
        effects: Vec<(usize, EffectKind)>,

        /// Play everything dry
        #[arg(long)]
        no_effects: bool,
    }

    fn parse_effect(arg: &str) -> anyhow::Result<(usize, EffectKind)> {
        let (track, kind) = arg
            .split_once(':')
            .ok_or_else(|| anyhow!("expected TRACK:KIND, got '{}'", arg))?;
        let track = track.trim().parse().with_context(|| format!("bad track in '{}'", arg))?;
        Ok((track, kind.parse()?))
    }

    fn parse_seconds(arg: &str) -> anyhow::Result<f32> {
        let seconds: f32 = arg.trim().parse().with_context(|| format!("bad duration '{}'", arg))?;
        if !seconds.is_finite() || seconds < 0.0 {
            bail!("duration must be a finite number of seconds, got '{}'", arg);
        }
        Ok(seconds)
    }

    fn load_kit(root: &Path, pattern: &Pattern, sample_rate: f32) -> SampleBank {
        let mut bank = SampleBank::new(root);
        for track in 0..pattern.track_count() {
            let Some(row) = pattern.track(track) else {
                continue;
            };
            if let Err(err) = bank.acquire(&row.sample) {
                warn!("{:#}; using a synthesized '{}'", err, row.sample);
                let tone = match row.sample.as_str() {
                    "kick" => SampleBuffer::decaying_tone(sample_rate, 160.0, 45.0, 0.25),
                    "snare" => SampleBuffer::decaying_tone(sample_rate, 330.0, 180.0, 0.12),
                    _ => SampleBuffer::decaying_tone(sample_rate, 7000.0, 6000.0, 0.03),
                };
                bank.insert(row.sample.clone(), tone);
            }
        }
        bank
    }

    fn build_session(args: &Args, sample_rate: f32) -> Session {
        let config = PlayerConfig::new(sample_rate)
            .with_effects_enabled(!args.no_effects)
            .with_effects(EffectsConfig::default());
        let mut player = Player::new(config);

        if let Some(engine) = player.effects_engine_mut() {
            for &(track, kind) in &args.effects {
                match engine.add_effect(track, kind) {
                    Some(id) => info!("track {}: {} ({})", track, kind, id),
                    None => warn!("track {}: could not add {}", track, kind),
                }
            }
        }

        let sequencer = SequencerConfig::new(args.bpm, 16, 4);
        let pattern = Pattern::basic_beat(sequencer.steps);
        let bank = load_kit(&args.samples, &pattern, sample_rate);
        Session::new(player, pattern, &sequencer, bank)
    }

    pub fn run() -> anyhow::Result<()> {
        init_logger();
        let args = Args::parse();
        let seconds = args.seconds;

        if let Some(path) = &args.bounce {
            let sample_rate = args.sample_rate as f32;
            let mut session = build_session(&args, sample_rate);
            session.play();
            let frames = (seconds * sample_rate) as usize;
            bounce_to_wav(&mut session, frames, path)?;
            return Ok(());
        }

        let mut output = CpalOutput::new();
        output.initialize()?;
        let session = build_session(&args, output.sample_rate());
        let session = Arc::new(Mutex::new(session));
        session
            .lock()
            .map_err(|_| anyhow!("session lock poisoned"))?
            .play();

        output.create_stream(session.clone())?;
        output.start()?;
        std::thread::sleep(Duration::from_secs_f32(seconds));
        output.stop()?;
        Ok(())
    }

}

#[cfg(feature = "native")]
fn main() -> anyhow::Result<()> {
    cli::run()
}

#[cfg(not(feature = "native"))]
fn main() {
    println!("This binary is only available with the 'native' feature enabled.");
}
