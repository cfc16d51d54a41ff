//! Completion chime: three ascending tones with fade envelopes

use std::env;
use std::f32::consts::TAU;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crossterm::tty::IsTty;
use thiserror::Error;
use tracing::{debug, warn};

/// Peak gain reached after the fade-in
const PEAK_GAIN: f32 = 0.2;

/// Gain at the end of the fade-out
const FLOOR_GAIN: f32 = 0.01;

/// Fade-in length in seconds
const ATTACK_SECS: f32 = 0.05;

/// Sample rate used when rendering the chime for a player
pub const SAMPLE_RATE: u32 = 44_100;

/// Command-line players tried in order
pub const PLAYERS: &[&str] = &["paplay", "pw-play", "aplay", "afplay"];

/// Errors from an audio sink
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio unavailable: {0}")]
    Unavailable(String),

    #[error("Audio I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A single sine tone inside the chime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency in Hz
    pub frequency: f32,
    /// Start offset from the beginning of the chime
    pub offset: Duration,
    /// Length including the fade-out
    pub length: Duration,
}

impl Tone {
    pub const fn new(frequency: f32, offset_ms: u64, length_ms: u64) -> Self {
        Self {
            frequency,
            offset: Duration::from_millis(offset_ms),
            length: Duration::from_millis(length_ms),
        }
    }

    /// Envelope gain `t` seconds after the tone starts
    ///
    /// Linear ramp 0 -> 0.2 over the attack, then exponential decay to 0.01
    /// at the tone's end. Silent outside the tone.
    pub fn gain_at(&self, t: f32) -> f32 {
        let length = self.length.as_secs_f32();
        if t < 0.0 || t > length {
            return 0.0;
        }
        if t < ATTACK_SECS {
            return PEAK_GAIN * t / ATTACK_SECS;
        }
        let decay = (t - ATTACK_SECS) / (length - ATTACK_SECS).max(f32::EPSILON);
        PEAK_GAIN * (FLOOR_GAIN / PEAK_GAIN).powf(decay)
    }
}

/// The completion chime (C5, E5, G5)
#[derive(Debug, Clone, PartialEq)]
pub struct Chime {
    tones: Vec<Tone>,
}

impl Default for Chime {
    fn default() -> Self {
        Self {
            tones: vec![
                Tone::new(523.25, 0, 500),
                Tone::new(659.25, 150, 500),
                Tone::new(783.99, 300, 700),
            ],
        }
    }
}

impl Chime {
    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    /// Time until the last tone has faded
    pub fn total_length(&self) -> Duration {
        self.tones
            .iter()
            .map(|t| t.offset + t.length)
            .max()
            .unwrap_or_default()
    }

    /// Synthesize mono PCM samples in [-1, 1]
    pub fn samples(&self, sample_rate: u32) -> Vec<f32> {
        debug!(sample_rate, "Chime::samples: called");
        let rate = sample_rate as f32;
        let count = (self.total_length().as_secs_f32() * rate).ceil() as usize;

        (0..count)
            .map(|i| {
                let t = i as f32 / rate;
                self.tones
                    .iter()
                    .map(|tone| {
                        let local = t - tone.offset.as_secs_f32();
                        tone.gain_at(local) * (TAU * tone.frequency * local).sin()
                    })
                    .sum::<f32>()
                    .clamp(-1.0, 1.0)
            })
            .collect()
    }
}

/// Something that can make the chime audible
pub trait AudioSink: Send {
    fn play(&self, chime: &Chime) -> Result<(), AudioError>;
}

/// Encode mono samples as a 16-bit PCM WAV file
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// First of `names` present as a file in one of the `search_path` directories
pub fn find_player(names: &[&str], search_path: &OsStr) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect();
    names
        .iter()
        .flat_map(|name| dirs.iter().map(move |dir| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Renders the chime to a WAV file and hands it to a system audio player
#[derive(Debug)]
pub struct PlayerSink {
    players: Vec<String>,
    file: PathBuf,
}

impl Default for PlayerSink {
    fn default() -> Self {
        Self::with_players(PLAYERS, env::temp_dir().join("unstuck-chime.wav"))
    }
}

impl PlayerSink {
    pub fn with_players(players: &[&str], file: impl AsRef<Path>) -> Self {
        Self {
            players: players.iter().map(|p| p.to_string()).collect(),
            file: file.as_ref().to_path_buf(),
        }
    }
}

impl AudioSink for PlayerSink {
    fn play(&self, chime: &Chime) -> Result<(), AudioError> {
        debug!(file = %self.file.display(), "PlayerSink::play: called");
        let search_path = env::var_os("PATH").unwrap_or_default();
        let names: Vec<&str> = self.players.iter().map(String::as_str).collect();
        let player = find_player(&names, &search_path)
            .ok_or_else(|| AudioError::Unavailable("no audio player found".to_string()))?;

        fs::write(&self.file, wav_bytes(&chime.samples(SAMPLE_RATE), SAMPLE_RATE))?;

        let file = self.file.clone();
        std::thread::spawn(move || {
            let status = Command::new(&player)
                .arg(&file)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(s) if s.success() => debug!(player = %player.display(), "PlayerSink: chime played"),
                Ok(s) => warn!(player = %player.display(), status = %s, "PlayerSink: player failed"),
                Err(e) => warn!(player = %player.display(), error = %e, "PlayerSink: could not run player"),
            }
        });
        Ok(())
    }
}

/// Tries `primary`, falling back when it reports an error
pub struct FallbackSink {
    primary: Box<dyn AudioSink>,
    fallback: Box<dyn AudioSink>,
}

impl FallbackSink {
    pub fn new(primary: Box<dyn AudioSink>, fallback: Box<dyn AudioSink>) -> Self {
        Self { primary, fallback }
    }
}

impl Default for FallbackSink {
    /// Synthesized chime through a player, else the terminal bell
    fn default() -> Self {
        Self::new(Box::new(PlayerSink::default()), Box::new(BellSink))
    }
}

impl AudioSink for FallbackSink {
    fn play(&self, chime: &Chime) -> Result<(), AudioError> {
        match self.primary.play(chime) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(error = %e, "FallbackSink::play: primary failed, using fallback");
                self.fallback.play(chime)
            }
        }
    }
}

/// Rings the terminal bell once per tone, at the tone offsets
#[derive(Debug, Default)]
pub struct BellSink;

impl AudioSink for BellSink {
    fn play(&self, chime: &Chime) -> Result<(), AudioError> {
        debug!("BellSink::play: called");
        if !io::stdout().is_tty() {
            return Err(AudioError::Unavailable("stdout is not a terminal".to_string()));
        }

        let offsets: Vec<Duration> = chime.tones().iter().map(|t| t.offset).collect();
        std::thread::spawn(move || {
            let mut elapsed = Duration::ZERO;
            for offset in offsets {
                std::thread::sleep(offset.saturating_sub(elapsed));
                elapsed = offset;
                let mut stdout = io::stdout();
                if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
                    warn!(error = %e, "BellSink: could not ring bell");
                    break;
                }
            }
        });
        Ok(())
    }
}

/// Discards the chime
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, _chime: &Chime) -> Result<(), AudioError> {
        debug!("NullSink::play: called");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_chime_ascends() {
        let chime = Chime::default();
        let tones = chime.tones();
        assert_eq!(tones.len(), 3);
        assert!(tones.windows(2).all(|w| w[0].frequency < w[1].frequency));
        assert!(tones.windows(2).all(|w| w[0].offset < w[1].offset));
        assert_eq!(chime.total_length(), Duration::from_millis(1000));
    }

    #[test]
    fn test_envelope_shape() {
        let tone = Tone::new(440.0, 0, 500);
        assert_eq!(tone.gain_at(0.0), 0.0);
        assert!((tone.gain_at(0.025) - 0.1).abs() < 1e-4);
        assert!((tone.gain_at(0.05) - PEAK_GAIN).abs() < 1e-4);
        assert!((tone.gain_at(0.5) - FLOOR_GAIN).abs() < 1e-4);
        assert_eq!(tone.gain_at(0.6), 0.0);
        assert_eq!(tone.gain_at(-0.1), 0.0);
    }

    #[test]
    fn test_envelope_decays_monotonically() {
        let tone = Tone::new(440.0, 0, 700);
        let gains: Vec<f32> = (5..70).map(|i| tone.gain_at(i as f32 / 100.0)).collect();
        assert!(gains.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_samples_length_and_range() {
        let samples = Chime::default().samples(8000);
        assert_eq!(samples.len(), 8000);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(samples.iter().any(|s| s.abs() > 0.05));
        // Silent at the very start of the fade-in
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn test_wav_header_and_length() {
        let samples = Chime::default().samples(8000);
        let wav = wav_bytes(&samples, 8000);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 8000);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 16_000);
        assert_eq!(wav.len(), 44 + samples.len() * 2);
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()) as usize, wav.len() - 8);
    }

    #[test]
    fn test_wav_samples_scaled_to_i16() {
        let wav = wav_bytes(&[0.0, 1.0, -1.0, 2.0], 8000);
        let value = |i: usize| i16::from_le_bytes([wav[44 + i * 2], wav[45 + i * 2]]);
        assert_eq!(value(0), 0);
        assert_eq!(value(1), i16::MAX);
        assert_eq!(value(2), -i16::MAX);
        assert_eq!(value(3), i16::MAX);
    }

    #[test]
    fn test_find_player_in_search_path() {
        let empty = tempfile::TempDir::new().unwrap();
        let bin = tempfile::TempDir::new().unwrap();
        fs::write(bin.path().join("aplay"), b"").unwrap();
        let search = env::join_paths([empty.path(), bin.path()]).unwrap();

        assert_eq!(find_player(&["paplay", "aplay"], &search), Some(bin.path().join("aplay")));
        assert_eq!(find_player(&["paplay"], &search), None);
    }

    #[test]
    fn test_player_sink_without_player_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("chime.wav");
        let sink = PlayerSink::with_players(&["unstuck-no-such-player"], &file);

        let err = sink.play(&Chime::default()).unwrap_err();
        assert!(matches!(err, AudioError::Unavailable(_)));
        assert!(!file.exists());
    }

    struct Failing;

    impl AudioSink for Failing {
        fn play(&self, _chime: &Chime) -> Result<(), AudioError> {
            Err(AudioError::Unavailable("no device".to_string()))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl AudioSink for Counting {
        fn play(&self, _chime: &Chime) -> Result<(), AudioError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = FallbackSink::new(Box::new(Failing), Box::new(Counting(calls.clone())));

        assert!(sink.play(&Chime::default()).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_skipped_when_primary_plays() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = FallbackSink::new(Box::new(Counting(calls.clone())), Box::new(Failing));

        assert!(sink.play(&Chime::default()).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_sink_succeeds() {
        assert!(NullSink.play(&Chime::default()).is_ok());
    }
}
