//! Playback service feeding entries through the player.

use anyhow::Result;
use cadenza_audio::{AudioPlayer, DecoderHandle, ParserEvent, RenderEvent};
use cadenza_core::{AudioEntry, AudioSource, PlayerConfig, PlayerError, PublicState, StopReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Render ticks per second of audio.
const TICKS_PER_SECOND: u32 = 50;

/// Drives an [`AudioPlayer`] with simulated collaborators.
///
/// Local files are read from disk; remote and named streams are
/// synthesized as silence. All input is treated as raw PCM in the entry's
/// output format.
pub struct PlaybackService {
    player: Arc<AudioPlayer>,
    next_decoder: AtomicU64,
    simulated_seconds: f64,
}

impl PlaybackService {
    pub fn new(config: PlayerConfig) -> Result<Self> {
        let player = AudioPlayer::new(config)?;
        Ok(Self {
            player: Arc::new(player),
            next_decoder: AtomicU64::new(1),
            simulated_seconds: 2.0,
        })
    }

    /// Length of synthesized streams.
    #[must_use]
    pub fn with_simulated_seconds(mut self, seconds: f64) -> Self {
        self.simulated_seconds = seconds;
        self
    }

    pub const fn player(&self) -> &Arc<AudioPlayer> {
        &self.player
    }

    /// Start the first entry and queue the rest behind it.
    pub fn load(&self, entries: Vec<AudioEntry>) {
        let mut entries = entries.into_iter();
        if let Some(first) = entries.next() {
            self.player.play(first);
        }
        for entry in entries {
            self.player.queue(entry);
        }
    }

    /// Play queued entries until the queue runs dry or playback stops.
    pub async fn run(&self) -> Result<()> {
        while let Some(id) = self.player.advance() {
            let Some(entry) = self.player.take_for_decode() else {
                warn!("Entry {id} vanished before decoding");
                continue;
            };
            self.decode(entry).await?;

            if matches!(
                self.player.state(),
                PublicState::Stopped | PublicState::Disposed | PublicState::Error
            ) {
                break;
            }
        }
        info!("Playback finished: {:?}", self.player.state());
        Ok(())
    }

    async fn decode(&self, entry: AudioEntry) -> Result<()> {
        let handle = DecoderHandle(self.next_decoder.fetch_add(1, Ordering::Relaxed));
        self.player.attach_decoder(handle, entry.id.clone());
        debug!("Decoder {handle:?} started for {}", entry.source.describe());

        let data = match self.fetch(&entry).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                self.player.report_error(PlayerError::DataNotFound);
                return Ok(());
            }
            Err(e) => {
                warn!("Failed to read {}: {e}", entry.source.describe());
                self.player.report_error(PlayerError::DataNotFound);
                return Ok(());
            }
        };

        self.player
            .handle_parser_event(ParserEvent::ReadyToProducePackets);
        self.player
            .handle_parser_event(ParserEvent::FormatKnown(entry.output_format));

        let chunk_size = self.player.config().buffer_capacity;
        let mut landed = 0;
        for chunk in data.chunks(chunk_size) {
            self.player.push_bytes(chunk)?;
            landed += self.player.drain_bytes().len();
            self.player
                .handle_parser_event(ParserEvent::PacketsAvailable(1));
        }
        self.player.finish_buffering(&entry.id);

        let format = entry.output_format;
        let total_frames = (landed / format.bytes_per_frame().max(1) as usize) as u64;
        self.player.set_duration(format.frames_to_seconds(total_frames));
        self.render(format.sample_rate, total_frames).await;

        self.player.detach_decoder(handle);
        Ok(())
    }

    async fn fetch(&self, entry: &AudioEntry) -> std::io::Result<Vec<u8>> {
        match &entry.source {
            AudioSource::Local(path) => tokio::fs::read(path).await,
            AudioSource::Remote { .. } | AudioSource::Stream { .. } => {
                let format = entry.output_format;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let frames = (self.simulated_seconds * f64::from(format.sample_rate)) as usize;
                Ok(vec![0; frames * format.bytes_per_frame() as usize])
            }
        }
    }

    async fn render(&self, sample_rate: u32, total_frames: u64) {
        let frames_per_tick = u64::from(sample_rate / TICKS_PER_SECOND).max(1);
        let tick = Duration::from_secs(1) / TICKS_PER_SECOND;
        let mut rendered = 0;

        self.player.handle_render_event(RenderEvent::Started);
        while rendered < total_frames {
            tokio::time::sleep(tick).await;
            let state = self.player.state();
            if state == PublicState::Paused {
                continue;
            }
            if !state.is_active() {
                return;
            }
            let frames = frames_per_tick.min(total_frames - rendered);
            self.player.report_rendered_frames(frames);
            rendered += frames;
        }
        self.player
            .handle_render_event(RenderEvent::Finished(StopReason::Eof));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cadenza_audio::PlayerNotification;
    use cadenza_core::{AudioEntryId, OutputFormat};

    fn stream(id: &str) -> AudioEntry {
        AudioEntry::new(
            AudioEntryId::new(id),
            AudioSource::Stream { name: id.into() },
            OutputFormat::default(),
        )
    }

    fn service() -> PlaybackService {
        let config = PlayerConfig {
            progress_interval_ms: 10,
            buffer_capacity: 4096,
            ..PlayerConfig::default()
        };
        PlaybackService::new(config)
            .unwrap()
            .with_simulated_seconds(0.1)
    }

    #[tokio::test]
    async fn test_runs_queue_to_completion() {
        let service = service();
        service.load(vec![stream("a"), stream("b")]);
        service.run().await.unwrap();

        let player = service.player();
        assert_eq!(player.state(), PublicState::Stopped);
        assert_eq!(player.stop_reason(), StopReason::Eof);

        let finished: Vec<_> = std::iter::from_fn(|| player.try_recv_notification())
            .filter_map(|n| match n {
                PlayerNotification::DidFinishPlaying { id, stop_reason, .. } => {
                    Some((id, stop_reason))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            finished,
            vec![
                (AudioEntryId::new("a"), StopReason::Eof),
                (AudioEntryId::new("b"), StopReason::Eof),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_reports_error() {
        let service = service();
        service.load(vec![AudioEntry::from_path("/nonexistent/cadenza.pcm")]);
        service.run().await.unwrap();

        let player = service.player();
        assert_eq!(player.state(), PublicState::Error);
        assert!(std::iter::from_fn(|| player.try_recv_notification()).any(|n| n
            == PlayerNotification::UnexpectedError(PlayerError::DataNotFound)));
    }
}
