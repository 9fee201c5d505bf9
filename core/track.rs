//! The demuxer's owned output records: three tracks (video, audio,
//! metadata) plus the per-sample types a demuxer needs to produce.
//!
//! Plain data structs with a handful of derived traits and no behavior
//! beyond simple accessors; the state machine that populates these lives
//! in `demuxer.rs`.

use derive_more::Debug;
use pretty_hex::PrettyHex as _;

use crate::amf::AmfValue;
use crate::sei::SeiMessage;

/// Video codec identity. HEVC carries a `vps`; AVC never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Avc,
    Hevc,
}

/// Audio codec identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    G711ALaw,
    G711MuLaw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSample {
    pub pts: i64,
    pub dts: i64,
    #[debug("{} nal(s), {} byte(s)", self.units.len(), self.units.iter().map(Vec::len).sum::<usize>())]
    pub units: Vec<Vec<u8>>,
    pub keyframe: bool,
    pub gop_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    pub pts: i64,
    #[debug("{}", self.data.hex_dump())]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlvScriptSample {
    pub value: AmfValue,
    pub pts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeiSample {
    pub message: SeiMessage,
    pub pts: i64,
}

/// The video track. Parameter sets and codec geometry persist across
/// `demux` calls; only `samples` and `warnings` are cleared per call (see
/// `Demuxer::demux`'s preprocessing rules).
#[derive(Debug, Clone, Default)]
pub struct VideoTrack {
    pub present: bool,
    pub timescale: u32,
    pub format_timescale: u32,
    pub codec_kind: Option<VideoCodec>,
    pub codec: Option<String>,
    pub width: u32,
    pub height: u32,
    pub sar_ratio: (u32, u32),
    pub fps_num: u32,
    pub fps_den: u32,
    #[debug("{} entr(ies)", self.sps.len())]
    pub sps: Vec<Vec<u8>>,
    #[debug("{} entr(ies)", self.pps.len())]
    pub pps: Vec<Vec<u8>>,
    #[debug("{} entr(ies)", self.vps.len())]
    pub vps: Vec<Vec<u8>>,
    pub nal_unit_size: u8,
    #[debug("{:?}", self.hvcc.as_deref().map(|d| d.hex_dump()))]
    pub hvcc: Option<Vec<u8>>,
    pub samples: Vec<VideoSample>,
    pub warnings: Vec<String>,
}

impl VideoTrack {
    /// Drops everything but `present`: used on a full `discontinuity`
    /// reset and on unsupported-codec / malformed-config self-healing.
    pub fn reset(&mut self) {
        let present = self.present;
        *self = VideoTrack::default();
        self.present = present;
    }

    /// Clears only the per-call transient fields (samples/warnings),
    /// leaving codec identity and parameter sets untouched.
    pub fn clear_transient(&mut self) {
        self.samples.clear();
        self.warnings.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioTrack {
    pub present: bool,
    pub timescale: u32,
    pub format_timescale: u32,
    pub codec_kind: Option<AudioCodec>,
    pub codec: Option<String>,
    pub sample_rate: u32,
    pub sample_size: u8,
    pub channel_count: u8,
    #[debug("{:?}", self.config.as_deref().map(|d| d.hex_dump()))]
    pub config: Option<Vec<u8>>,
    pub object_type: Option<u8>,
    pub sample_rate_index: Option<u8>,
    pub samples: Vec<AudioSample>,
    pub warnings: Vec<String>,
}

impl AudioTrack {
    pub fn reset(&mut self) {
        let present = self.present;
        *self = AudioTrack::default();
        self.present = present;
    }

    pub fn clear_transient(&mut self) {
        self.samples.clear();
        self.warnings.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataTrack {
    pub flv_script_samples: Vec<FlvScriptSample>,
    pub sei_samples: Vec<SeiSample>,
}

impl MetadataTrack {
    pub fn reset(&mut self) {
        *self = MetadataTrack::default();
    }

    pub fn clear_transient(&mut self) {
        self.flv_script_samples.clear();
        self.sei_samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_reset_preserves_present_flag() {
        let mut t = VideoTrack {
            present: true,
            width: 1920,
            ..Default::default()
        };
        t.reset();
        assert!(t.present);
        assert_eq!(t.width, 0);
    }

    #[test]
    fn clear_transient_keeps_parameter_sets() {
        let mut t = VideoTrack {
            sps: vec![vec![1, 2, 3]],
            samples: vec![VideoSample {
                pts: 0,
                dts: 0,
                units: vec![],
                keyframe: false,
                gop_id: 0,
            }],
            ..Default::default()
        };
        t.clear_transient();
        assert!(t.samples.is_empty());
        assert_eq!(t.sps, vec![vec![1, 2, 3]]);
    }
}
