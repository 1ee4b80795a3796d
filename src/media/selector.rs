//! Picks the concrete stream(s) to fetch for a requested tier.
//!
//! Selection is a pure function of the resolved catalog and the tier. When
//! several candidates tie on the ranking key (bitrate or framerate) any of them
//! may be returned.

use crate::error::PipelineError;
use crate::media::{QualityTier, StreamDescriptor, StreamKind};

/// Container a progressive stream must use to be delivered as-is.
pub const DELIVERY_CONTAINER: &str = "mp4";

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Single(StreamDescriptor),
    /// Separate elementary streams that must be muxed before delivery.
    Pair {
        video: StreamDescriptor,
        audio: StreamDescriptor,
    },
}

impl Selection {
    /// Streams in fetch order.
    pub fn streams(&self) -> Vec<&StreamDescriptor> {
        match self {
            Selection::Single(stream) => vec![stream],
            Selection::Pair { video, audio } => vec![video, audio],
        }
    }
}

pub fn select(streams: &[StreamDescriptor], tier: QualityTier) -> Result<Selection, PipelineError> {
    match tier {
        QualityTier::Audio => best_audio(streams)
            .cloned()
            .map(Selection::Single)
            .ok_or_else(|| PipelineError::unavailable(tier, "no audio-only stream")),
        QualityTier::P360 | QualityTier::P720 => {
            let height = tier.height();
            // Exact height only. A 480p stream never stands in for 360p.
            streams
                .iter()
                .find(|s| {
                    s.kind == StreamKind::Progressive
                        && s.height == height
                        && s.container.eq_ignore_ascii_case(DELIVERY_CONTAINER)
                })
                .cloned()
                .map(Selection::Single)
                .ok_or_else(|| {
                    PipelineError::unavailable(
                        tier,
                        format!("no {} progressive {} stream", tier, DELIVERY_CONTAINER),
                    )
                })
        }
        QualityTier::P1080 => {
            let video = streams
                .iter()
                .filter(|s| s.kind == StreamKind::Video && s.height == tier.height())
                .max_by(|a, b| a.fps.unwrap_or(0.0).total_cmp(&b.fps.unwrap_or(0.0)))
                .ok_or_else(|| PipelineError::unavailable(tier, "no 1080p video-only stream"))?;
            let audio = best_audio(streams)
                .ok_or_else(|| PipelineError::unavailable(tier, "no audio-only stream to pair with"))?;
            Ok(Selection::Pair {
                video: video.clone(),
                audio: audio.clone(),
            })
        }
    }
}

fn best_audio(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    streams
        .iter()
        .filter(|s| s.kind == StreamKind::Audio)
        .max_by(|a, b| {
            a.bitrate_kbps
                .unwrap_or(0.0)
                .total_cmp(&b.bitrate_kbps.unwrap_or(0.0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{audio, progressive, video};

    #[test]
    fn picks_exact_progressive_match() {
        let catalog = vec![progressive("18", 360, "mp4"), progressive("22", 480, "mp4")];

        let selection = select(&catalog, QualityTier::P360).unwrap();
        assert_eq!(selection, Selection::Single(catalog[0].clone()));
    }

    #[test]
    fn no_1080p_entries_is_unavailable() {
        let catalog = vec![progressive("18", 360, "mp4"), progressive("22", 480, "mp4")];

        let err = select(&catalog, QualityTier::P1080).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StreamUnavailable { tier: QualityTier::P1080, .. }
        ));
    }

    #[test]
    fn progressive_tiers_do_not_fall_back_to_nearest_resolution() {
        let catalog = vec![progressive("22", 480, "mp4"), progressive("37", 1080, "mp4")];

        assert!(select(&catalog, QualityTier::P720).is_err());
        assert!(select(&catalog, QualityTier::P360).is_err());
    }

    #[test]
    fn progressive_tiers_require_the_delivery_container() {
        let catalog = vec![progressive("43", 360, "webm")];

        assert!(select(&catalog, QualityTier::P360).is_err());
    }

    #[test]
    fn video_only_streams_never_satisfy_progressive_tiers() {
        let catalog = vec![video("136", 720, 30.0, "mp4"), audio("140", 128.0)];

        assert!(select(&catalog, QualityTier::P720).is_err());
    }

    #[test]
    fn audio_tier_takes_highest_bitrate() {
        let catalog = vec![audio("139", 128.0), audio("251", 160.0)];

        let selection = select(&catalog, QualityTier::Audio).unwrap();
        assert_eq!(selection, Selection::Single(catalog[1].clone()));
    }

    #[test]
    fn audio_tier_without_audio_streams_is_unavailable() {
        let catalog = vec![progressive("18", 360, "mp4")];

        assert!(matches!(
            select(&catalog, QualityTier::Audio),
            Err(PipelineError::StreamUnavailable { tier: QualityTier::Audio, .. })
        ));
    }

    #[test]
    fn full_hd_pairs_fastest_video_with_best_audio() {
        let catalog = vec![
            video("137", 1080, 30.0, "mp4"),
            video("299", 1080, 60.0, "mp4"),
            video("136", 720, 60.0, "mp4"),
            audio("139", 48.0),
            audio("140", 128.0),
        ];

        let selection = select(&catalog, QualityTier::P1080).unwrap();
        assert_eq!(
            selection,
            Selection::Pair {
                video: catalog[1].clone(),
                audio: catalog[4].clone(),
            }
        );
        let order: Vec<_> = selection.streams().iter().map(|s| s.format_id.as_str()).collect();
        assert_eq!(order, ["299", "140"]);
    }

    #[test]
    fn full_hd_needs_both_halves() {
        let video_only = vec![video("137", 1080, 30.0, "mp4")];
        let audio_only = vec![audio("140", 128.0), progressive("37", 1080, "mp4")];

        assert!(select(&video_only, QualityTier::P1080).is_err());
        assert!(select(&audio_only, QualityTier::P1080).is_err());
    }

    #[test]
    fn selection_is_repeatable() {
        let catalog = vec![
            video("137", 1080, 30.0, "mp4"),
            audio("140", 128.0),
            progressive("18", 360, "mp4"),
        ];

        for tier in [QualityTier::Audio, QualityTier::P360, QualityTier::P1080] {
            assert_eq!(select(&catalog, tier).unwrap(), select(&catalog, tier).unwrap());
        }
    }
}
