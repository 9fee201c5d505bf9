// This file is part of flvdemux.

pub mod aac;
pub mod amf;
pub mod avc;
pub mod bitreader;
pub mod demuxer;
pub mod fixer;
pub mod hevc;
pub mod nal;
pub mod sei;
pub mod track;

pub use crate::demuxer::{probe, Demuxer};
pub use crate::fixer::{Fixer, NoopFixer, Tracks};
pub use crate::track::{
    AudioCodec, AudioSample, AudioTrack, FlvScriptSample, MetadataTrack, SeiSample, VideoCodec,
    VideoSample, VideoTrack,
};
