//! The downstream track "fixer" — out of scope beyond
//! its call shape. Timestamp normalization and gap removal are explicit
//! non-goals of this crate; what's modeled here is only the seam
//! `Demuxer::fix`/`demux_and_fix` compose through, kept behind a trait so
//! the core stays testable against fakes rather than a real fixer.

use base::Error;

use crate::track::{AudioTrack, MetadataTrack, VideoTrack};

/// Borrowed view of the demuxer's three tracks, handed to a [`Fixer`].
pub struct Tracks<'a> {
    pub video: &'a mut VideoTrack,
    pub audio: &'a mut AudioTrack,
    pub metadata: &'a mut MetadataTrack,
}

/// External collaborator that normalizes timestamps and removes gaps.
/// Implementations live outside this crate; `demux` never calls this
/// itself, only `Demuxer::fix`/`demux_and_fix` do.
pub trait Fixer {
    fn fix(
        &mut self,
        tracks: Tracks<'_>,
        start_time: Option<i64>,
        discontinuity: bool,
        contiguous: bool,
    ) -> Result<(), Error>;
}

/// A fixer that does nothing: useful for callers that only want raw demux
/// output, and for exercising `demux_and_fix`'s composition in tests
/// without pulling in a real timestamp-normalization implementation.
#[derive(Debug, Default)]
pub struct NoopFixer;

impl Fixer for NoopFixer {
    fn fix(
        &mut self,
        _tracks: Tracks<'_>,
        _start_time: Option<i64>,
        _discontinuity: bool,
        _contiguous: bool,
    ) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_fixer_leaves_tracks_untouched() {
        let mut video = VideoTrack::default();
        let mut audio = AudioTrack::default();
        let mut metadata = MetadataTrack::default();
        let mut fixer = NoopFixer;
        fixer
            .fix(
                Tracks {
                    video: &mut video,
                    audio: &mut audio,
                    metadata: &mut metadata,
                },
                None,
                false,
                true,
            )
            .unwrap();
        assert!(video.samples.is_empty());
    }
}
