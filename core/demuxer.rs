//! FLV framing state machine: header probe, tag loop, remainder buffering,
//! and the audio/video/script tag dispatchers.
//!
//! This is the crate's central component: an owned mutable state machine
//! behind a single entry-point method, the way a synchronous,
//! re-entrant-per-call buffer parser is naturally structured.

use base::{bail, Error};
use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::aac::parse_audio_specific_config;
use crate::amf;
use crate::avc::parse_avc_decoder_configuration_record;
use crate::bitreader::{read_i24, read_u24, read_u32};
use crate::hevc::parse_hevc_decoder_configuration_record;
use crate::nal;
use crate::sei::parse_sei;
use crate::track::{
    AudioCodec, AudioSample, AudioTrack, FlvScriptSample, MetadataTrack, SeiSample, VideoCodec,
    VideoSample, VideoTrack,
};

const TAG_HEADER_LEN: usize = 11;
const PREV_TAG_SIZE_LEN: usize = 4;
const FLV_HEADER_LEN: usize = 9;

const TAG_TYPE_AUDIO: u8 = 8;
const TAG_TYPE_VIDEO: u8 = 9;
const TAG_TYPE_SCRIPT: u8 = 18;

const AUDIO_FORMAT_ALAW: u8 = 7;
const AUDIO_FORMAT_MULAW: u8 = 8;
const AUDIO_FORMAT_AAC: u8 = 10;

const VIDEO_CODEC_AVC: u8 = 7;
const VIDEO_CODEC_HEVC: u8 = 12;

/// Returns true iff `data` opens with a well-formed FLV signature: `FLV`
/// + version 1, and a header-length field of at least 9. Pure; no state.
pub fn probe(data: &[u8]) -> bool {
    data.len() >= FLV_HEADER_LEN
        && data[0..4] == [0x46, 0x4c, 0x56, 0x01]
        && read_u32(data, 5) >= 9
}

/// Owns the cross-call state machine and the three output tracks. Not
/// re-entrant: concurrent calls to `demux` on the same instance are a
/// programming error left to the caller to avoid.
#[derive(Debug, Default)]
pub struct Demuxer {
    header_parsed: bool,
    remaining_data: Option<Bytes>,
    gop_id: u32,
    needs_add_meta_before_key_frame_nal: bool,
    video: VideoTrack,
    audio: AudioTrack,
    metadata: MetadataTrack,
}

impl Demuxer {
    pub fn new() -> Self {
        Demuxer {
            needs_add_meta_before_key_frame_nal: true,
            ..Default::default()
        }
    }

    pub fn video(&self) -> &VideoTrack {
        &self.video
    }

    pub fn audio(&self) -> &AudioTrack {
        &self.audio
    }

    pub fn metadata(&self) -> &MetadataTrack {
        &self.metadata
    }

    /// Parses as many whole tags out of `data` (prefixed with any buffered
    /// remainder) as the buffer allows, updating the three owned tracks in
    /// place.
    pub fn demux(&mut self, data: &[u8], discontinuity: bool, contiguous: bool) -> Result<(), Error> {
        if discontinuity || !contiguous {
            self.remaining_data = None;
        }
        if discontinuity {
            self.header_parsed = false;
            self.video.reset();
            self.audio.reset();
            self.metadata.reset();
        } else {
            self.video.clear_transient();
            self.audio.clear_transient();
            self.metadata.clear_transient();
        }

        let mut working = BytesMut::new();
        let data: &[u8] = if !discontinuity {
            if let Some(rem) = self.remaining_data.take() {
                working.extend_from_slice(&rem);
                working.extend_from_slice(data);
                &working
            } else {
                data
            }
        } else {
            data
        };

        if data.is_empty() {
            return Ok(());
        }

        let mut cursor;
        if !self.header_parsed {
            // A header split across calls looks like "not enough bytes
            // yet", not a bad signature: buffer and wait for more.
            if data.len() < FLV_HEADER_LEN {
                self.remaining_data = Some(Bytes::copy_from_slice(data));
                return Ok(());
            }
            if !probe(data) {
                bail!(InvalidContainer, msg("bad FLV signature"));
            }
            // The header's own length field plus the first
            // "previous tag size" field (normally 9 + 4 = 13 bytes) may
            // itself be split across calls; wait for all of it before
            // committing `headerParsed`, so the cursor this function
            // returns never runs past the end of `data`.
            let needed = read_u32(data, 5) as usize + 4;
            if data.len() < needed {
                self.remaining_data = Some(Bytes::copy_from_slice(data));
                return Ok(());
            }
            let flags = data[4];
            self.audio.present = flags & 0x04 != 0;
            self.video.present = flags & 0x01 != 0;
            self.header_parsed = true;
            cursor = needed;
            tracing::debug!(
                audio = self.audio.present,
                video = self.video.present,
                "FLV header parsed"
            );
        } else {
            cursor = 0;
        }

        while cursor + TAG_HEADER_LEN + PREV_TAG_SIZE_LEN <= data.len() {
            let tag_type = data[cursor];
            let data_size = read_u24(data, cursor + 1) as usize;
            if cursor + TAG_HEADER_LEN + data_size + PREV_TAG_SIZE_LEN > data.len() {
                break;
            }
            let ts_ext = u32::from(data[cursor + 7]);
            let ts_low = read_u24(data, cursor + 4);
            let timestamp = i64::from((ts_ext << 24) | ts_low);
            let body = &data[cursor + TAG_HEADER_LEN..cursor + TAG_HEADER_LEN + data_size];

            tracing::trace!(tag_type, data_size, timestamp, "dispatching FLV tag");
            match tag_type {
                TAG_TYPE_AUDIO => self.parse_audio(body, timestamp),
                TAG_TYPE_VIDEO => self.parse_video(body, timestamp),
                TAG_TYPE_SCRIPT => self.parse_script(body, timestamp),
                other => warn!(tag_type = other, "unknown FLV tag type, skipping"),
            }

            let prev_tag_size_off = cursor + TAG_HEADER_LEN + data_size;
            let prev_tag_size = read_u32(data, prev_tag_size_off);
            let expected = (TAG_HEADER_LEN + data_size) as u32;
            if prev_tag_size != expected {
                warn!(prev_tag_size, expected, "previousTagSize mismatch");
            }

            cursor = prev_tag_size_off + PREV_TAG_SIZE_LEN;
        }

        if cursor < data.len() {
            self.remaining_data = Some(Bytes::copy_from_slice(&data[cursor..]));
        } else {
            self.remaining_data = None;
        }

        self.video.timescale = 1000;
        self.video.format_timescale = 1000;
        self.audio.format_timescale = 1000;
        self.audio.timescale = if self.audio.sample_rate > 0 {
            self.audio.sample_rate
        } else {
            0
        };

        // Self-healing: the container header lied about what's present.
        if !self.video.present && !self.video.samples.is_empty() {
            self.video.reset();
        }
        if !self.audio.present && !self.audio.samples.is_empty() {
            self.audio.reset();
        }

        Ok(())
    }

    /// Composes with the external [`crate::fixer::Fixer`] collaborator.
    /// Neither this nor `demux` mutates core state beyond its own call.
    pub fn fix<F: crate::fixer::Fixer>(
        &mut self,
        fixer: &mut F,
        start_time: Option<i64>,
        discontinuity: bool,
        contiguous: bool,
    ) -> Result<(), Error> {
        fixer.fix(
            crate::fixer::Tracks {
                video: &mut self.video,
                audio: &mut self.audio,
                metadata: &mut self.metadata,
            },
            start_time,
            discontinuity,
            contiguous,
        )
    }

    pub fn demux_and_fix<F: crate::fixer::Fixer>(
        &mut self,
        fixer: &mut F,
        data: &[u8],
        discontinuity: bool,
        contiguous: bool,
        start_time: Option<i64>,
    ) -> Result<(), Error> {
        self.demux(data, discontinuity, contiguous)?;
        self.fix(fixer, start_time, discontinuity, contiguous)
    }

    fn parse_audio(&mut self, body: &[u8], pts: i64) {
        if body.is_empty() {
            warn!("empty audio tag body");
            return;
        }
        let format = body[0] >> 4;
        match format {
            AUDIO_FORMAT_ALAW | AUDIO_FORMAT_MULAW => {
                self.audio.sample_rate = 8000;
                self.audio.sample_size = if (body[0] >> 1) & 1 == 1 { 16 } else { 8 };
                self.audio.channel_count = if body[0] & 1 == 1 { 2 } else { 1 };
                self.audio.codec_kind = Some(if format == AUDIO_FORMAT_ALAW {
                    AudioCodec::G711ALaw
                } else {
                    AudioCodec::G711MuLaw
                });
                self.audio.codec = Some(
                    if format == AUDIO_FORMAT_ALAW {
                        "g711-alaw"
                    } else {
                        "g711-mulaw"
                    }
                    .to_string(),
                );
                if body.len() > 1 {
                    self.audio.samples.push(AudioSample {
                        pts,
                        data: body[1..].to_vec(),
                    });
                }
            }
            AUDIO_FORMAT_AAC => self.parse_aac_audio(body, pts),
            other => {
                let msg = format!("unsupported audio format {other}, resetting audio track");
                warn!("{msg}");
                self.audio.reset();
                self.audio.warnings.push(msg);
            }
        }
    }

    fn parse_aac_audio(&mut self, body: &[u8], pts: i64) {
        if body.len() < 2 {
            warn!("truncated AAC audio tag body");
            return;
        }
        let packet_type = body[1];
        match packet_type {
            0 => match parse_audio_specific_config(&body[2..]) {
                Ok(cfg) => {
                    self.audio.codec_kind = Some(AudioCodec::Aac);
                    self.audio.codec = Some(cfg.codec);
                    self.audio.channel_count = cfg.channel_count;
                    self.audio.sample_rate = cfg.sample_rate;
                    self.audio.config = Some(cfg.config);
                    self.audio.object_type = Some(cfg.object_type);
                    self.audio.sample_rate_index = Some(cfg.sampling_frequency_index);
                }
                Err(e) => {
                    let msg = format!("malformed AudioSpecificConfig, resetting audio track: {e}");
                    warn!("{msg}");
                    self.audio.reset();
                    self.audio.warnings.push(msg);
                }
            },
            1 => {
                self.audio.samples.push(AudioSample {
                    pts,
                    data: body[2..].to_vec(),
                });
            }
            other => {
                let msg = format!("unsupported AACPacketType {other}");
                warn!("{msg}");
                self.audio.warnings.push(msg);
            }
        }
    }

    fn parse_video(&mut self, body: &[u8], dts: i64) {
        if body.len() < 6 {
            warn!("video tag body too short");
            return;
        }
        let frame_type = body[0] >> 4;
        let codec_id = body[0] & 0x0f;
        let codec = match codec_id {
            VIDEO_CODEC_AVC => VideoCodec::Avc,
            VIDEO_CODEC_HEVC => VideoCodec::Hevc,
            other => {
                let msg = format!("unsupported video codec id {other}, resetting video track");
                warn!("{msg}");
                self.video.reset();
                self.video.warnings.push(msg);
                return;
            }
        };
        self.video.codec_kind = Some(codec);

        let packet_type = body[1];
        let cts = i64::from(read_i24(body, 2));

        match packet_type {
            0 => self.parse_video_config(codec, &body[5..]),
            1 => self.parse_video_nalus(codec, &body[5..], dts, cts, frame_type == 1),
            2 => {} // end of sequence
            other => {
                let msg = format!("unsupported video packet type {other}");
                warn!("{msg}");
                self.video.warnings.push(msg);
            }
        }
    }

    fn parse_video_config(&mut self, codec: VideoCodec, config: &[u8]) {
        match codec {
            VideoCodec::Avc => match parse_avc_decoder_configuration_record(config) {
                Ok(cfg) => {
                    if !cfg.sps.is_empty() {
                        self.video.sps = cfg.sps;
                    }
                    if !cfg.pps.is_empty() {
                        self.video.pps = cfg.pps;
                    }
                    self.video.nal_unit_size = cfg.nal_unit_size;
                    if let Some(sps) = cfg.parsed_sps {
                        self.video.codec = Some(sps.codec);
                        self.video.width = sps.width;
                        self.video.height = sps.height;
                        self.video.sar_ratio = sps.sar_ratio;
                        self.video.fps_num = sps.fps_num;
                        self.video.fps_den = sps.fps_den;
                    }
                }
                Err(e) => {
                    let msg = format!("malformed AVCDecoderConfigurationRecord: {e}");
                    warn!("{msg}");
                    self.video.warnings.push(msg);
                }
            },
            VideoCodec::Hevc => match parse_hevc_decoder_configuration_record(config) {
                Ok(cfg) => {
                    if self.video.hvcc.is_none() {
                        self.video.hvcc = Some(config.to_vec());
                    }
                    if !cfg.vps.is_empty() {
                        self.video.vps = cfg.vps;
                    }
                    if !cfg.sps.is_empty() {
                        self.video.sps = cfg.sps;
                    }
                    if !cfg.pps.is_empty() {
                        self.video.pps = cfg.pps;
                    }
                    self.video.nal_unit_size = cfg.nal_unit_size;
                    if let Some(sps) = cfg.parsed_sps {
                        self.video.codec = Some(sps.codec);
                        self.video.width = sps.width;
                        self.video.height = sps.height;
                        self.video.sar_ratio = sps.sar_ratio;
                        self.video.fps_num = sps.fps_num;
                        self.video.fps_den = sps.fps_den;
                    }
                }
                Err(e) => {
                    let msg = format!("malformed HEVCDecoderConfigurationRecord: {e}");
                    warn!("{msg}");
                    self.video.warnings.push(msg);
                }
            },
        }
    }

    fn parse_video_nalus(
        &mut self,
        codec: VideoCodec,
        payload: &[u8],
        dts: i64,
        cts: i64,
        frame_type_is_key: bool,
    ) {
        let parsed = nal::parse_avcc(payload, self.video.nal_unit_size);
        let mut units: Vec<Vec<u8>> = parsed.into_iter().map(|u| u.to_vec()).collect();

        if codec == VideoCodec::Hevc {
            self.apply_hevc_parameter_set_latch(&mut units);
        } else {
            self.needs_add_meta_before_key_frame_nal = false;
        }

        if units.is_empty() {
            let msg = "NALU video tag produced no units".to_string();
            warn!("{msg}");
            self.video.warnings.push(msg);
            return;
        }

        let pts = dts + cts;
        let mut keyframe = false;
        let mut sei_messages = Vec::new();
        for unit in &units {
            let (nal_type, header_len) = match codec {
                VideoCodec::Avc => (nal::avc_nal_type(unit), crate::sei::avc_header_len()),
                VideoCodec::Hevc => (nal::hevc_nal_type(unit), crate::sei::hevc_header_len()),
            };
            let Some(nal_type) = nal_type else { continue };
            let is_keyframe_nal = match codec {
                VideoCodec::Avc => nal_type == 5,
                VideoCodec::Hevc => (16..=23).contains(&nal_type),
            };
            if is_keyframe_nal {
                keyframe = true;
            }
            let is_sei_nal = match codec {
                VideoCodec::Avc => nal_type == 6,
                VideoCodec::Hevc => nal_type == 39 || nal_type == 40,
            };
            if is_sei_nal && unit.len() > header_len {
                for message in parse_sei(&unit[header_len..]) {
                    sei_messages.push(SeiSample { message, pts });
                }
            }
        }

        self.metadata.sei_samples.extend(sei_messages);

        // frameType == 1 ("keyframe/seek frame") is the other signal the
        // sample is a keyframe, independent of the per-NAL scan above.
        if frame_type_is_key {
            keyframe = true;
        }

        if keyframe {
            self.gop_id += 1;
        }
        self.video.samples.push(VideoSample {
            pts,
            dts,
            units,
            keyframe,
            gop_id: self.gop_id,
        });
    }

    /// On every HEVC NALU tag, either clear the latch because
    /// a VPS is already present, or (while the latch is set) prepend
    /// `vps[0]`/`sps[0]`/`pps[0]` ahead of the tag's own units.
    fn apply_hevc_parameter_set_latch(&mut self, units: &mut Vec<Vec<u8>>) {
        let has_vps = units
            .iter()
            .any(|u| nal::hevc_nal_type(u) == Some(32));
        if has_vps {
            self.needs_add_meta_before_key_frame_nal = false;
            return;
        }
        if !self.needs_add_meta_before_key_frame_nal {
            return;
        }
        let mut prefix = Vec::new();
        if let Some(vps) = self.video.vps.first() {
            prefix.push(vps.clone());
        }
        if let Some(sps) = self.video.sps.first() {
            prefix.push(sps.clone());
        }
        if let Some(pps) = self.video.pps.first() {
            prefix.push(pps.clone());
        }
        prefix.append(units);
        *units = prefix;
        self.needs_add_meta_before_key_frame_nal = false;
    }

    fn parse_script(&mut self, body: &[u8], pts: i64) {
        match amf::parse(body) {
            Ok((value, _consumed)) => self
                .metadata
                .flv_script_samples
                .push(FlvScriptSample { value, pts }),
            Err(e) => warn!(error = %e, "malformed AMF script tag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLV_HEADER_AV: [u8; 9] = [0x46, 0x4c, 0x56, 0x01, 0x05, 0x00, 0x00, 0x00, 0x09];
    const PREV_TAG_SIZE_0: [u8; 4] = [0, 0, 0, 0];

    #[rustfmt::skip]
    const AVC_DECODER_CONFIG: [u8; 38] = [
        0x01, 0x4d, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x17,
        0x67, 0x4d, 0x00, 0x1f, 0x9a, 0x66, 0x02, 0x80,
        0x2d, 0xff, 0x35, 0x01, 0x01, 0x01, 0x40, 0x00,
        0x00, 0xfa, 0x00, 0x00, 0x1d, 0x4c, 0x01, 0x01,
        0x00, 0x04, 0x68, 0xee, 0x3c, 0x80,
    ];

    #[rustfmt::skip]
    const HEVC_DECODER_CONFIG: [u8; 52] = [
        0x01, 0x01, 0x60, 0x00, 0x00, 0x00, 0x90, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x78, 0xf0, 0x00, 0xfc,
        0xfd, 0xf8, 0xf8, 0x00, 0x00, 0x0f, 0x03, 0xa0,
        0x00, 0x01, 0x00, 0x18, 0x40, 0x01, 0x0c, 0x01,
        0xff, 0xff, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00,
        0x90, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00,
        0x78, 0x95, 0x98, 0x09,
    ];

    /// Builds one FLV tag (11-byte header, body, trailing prevTagSize).
    fn build_tag(tag_type: u8, timestamp: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(tag_type);
        let data_size = body.len() as u32;
        out.extend_from_slice(&data_size.to_be_bytes()[1..]); // u24
        out.extend_from_slice(&timestamp.to_be_bytes()[1..]); // timestamp low 24 bits
        out.push((timestamp >> 24) as u8); // timestamp extension (high byte)
        out.extend_from_slice(&[0, 0, 0]); // streamId, unused
        out.extend_from_slice(body);
        let prev_tag_size = 11 + data_size;
        out.extend_from_slice(&prev_tag_size.to_be_bytes());
        out
    }

    fn flv_stream(tags: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&FLV_HEADER_AV);
        out.extend_from_slice(&PREV_TAG_SIZE_0);
        for tag in tags {
            out.extend_from_slice(tag);
        }
        out
    }

    fn avcc_nal(nal: &[u8]) -> Vec<u8> {
        let mut out = (nal.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(nal);
        out
    }

    fn video_body(frame_type: u8, codec_id: u8, packet_type: u8, cts: i32, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(frame_type << 4) | codec_id, packet_type];
        let cts_bytes = cts.to_be_bytes();
        out.extend_from_slice(&cts_bytes[1..]); // low 24 bits of cts
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn empty_stream_yields_no_samples_or_warnings() {
        let mut d = Demuxer::new();
        let data = flv_stream(&[]);
        d.demux(&data, false, true).unwrap();
        assert!(d.video().present);
        assert!(d.audio().present);
        assert!(d.video().samples.is_empty());
        assert!(d.audio().samples.is_empty());
        assert!(d.video().warnings.is_empty());
        assert!(d.audio().warnings.is_empty());
    }

    #[test]
    fn aac_config_tag_sets_audio_fields_with_no_samples() {
        let mut d = Demuxer::new();
        let tag = build_tag(TAG_TYPE_AUDIO, 0, &[0xAF, 0x00, 0x12, 0x10]);
        let data = flv_stream(&[tag]);
        d.demux(&data, false, true).unwrap();
        assert_eq!(d.audio().codec_kind, Some(AudioCodec::Aac));
        assert_eq!(d.audio().sample_rate, 44100);
        assert_eq!(d.audio().channel_count, 2);
        assert!(d.audio().samples.is_empty());
    }

    fn avc_idr_stream() -> Vec<u8> {
        let config_body = video_body(1, VIDEO_CODEC_AVC, 0, 0, &AVC_DECODER_CONFIG);
        let config_tag = build_tag(TAG_TYPE_VIDEO, 0, &config_body);

        let nal = avcc_nal(&[0x65, 0xAA, 0xBB]); // type 5 = IDR
        let nalu_body = video_body(1, VIDEO_CODEC_AVC, 1, 0, &nal);
        let nalu_tag = build_tag(TAG_TYPE_VIDEO, 40, &nalu_body);

        flv_stream(&[config_tag, nalu_tag])
    }

    #[test]
    fn avc_config_then_idr_produces_one_keyframe_sample() {
        let mut d = Demuxer::new();
        let data = avc_idr_stream();
        d.demux(&data, false, true).unwrap();
        assert_eq!(d.video().samples.len(), 1);
        let sample = &d.video().samples[0];
        assert!(sample.keyframe);
        assert_eq!(sample.gop_id, 1);
        assert_eq!(sample.dts, 40);
        assert_eq!(sample.pts, 40);
    }

    // Splitting the input at any byte boundary across two contiguous
    // `demux` calls must reproduce the single-call result.
    #[test]
    fn truncated_tail_across_calls_matches_single_call() {
        let data = avc_idr_stream();

        let mut reference = Demuxer::new();
        reference.demux(&data, false, true).unwrap();
        let expected_samples = reference.video().samples.len();

        for split in 1..data.len() {
            let (a, b) = data.split_at(split);
            let mut d = Demuxer::new();
            d.demux(a, false, true).unwrap();
            d.demux(b, false, true).unwrap();
            assert_eq!(
                d.video().samples.len(),
                expected_samples,
                "split at {split} produced a different sample count"
            );
            if let (Some(got), Some(want)) =
                (d.video().samples.last(), reference.video().samples.last())
            {
                assert_eq!(got.units, want.units, "split at {split} changed NAL payload");
            }
        }
    }

    // A HEVC NALU tag with no VPS triggers the parameter-set
    // pre-insertion latch; a following tag does not re-trigger it.
    #[test]
    fn hevc_latch_prepends_parameter_sets_once() {
        let mut d = Demuxer::new();
        let config_body = video_body(1, VIDEO_CODEC_HEVC, 0, 0, &HEVC_DECODER_CONFIG);
        let config_tag = build_tag(TAG_TYPE_VIDEO, 0, &config_body);

        // NAL type 1 (trailing), no VPS.
        let trailing_nal = avcc_nal(&[0x02, 0x01, 0xCC]);
        let first_body = video_body(0, VIDEO_CODEC_HEVC, 1, 0, &trailing_nal);
        let first_tag = build_tag(TAG_TYPE_VIDEO, 0, &first_body);

        let second_nal = avcc_nal(&[0x02, 0x01, 0xDD]);
        let second_body = video_body(0, VIDEO_CODEC_HEVC, 1, 40, &second_nal);
        let second_tag = build_tag(TAG_TYPE_VIDEO, 40, &second_body);

        let data = flv_stream(&[config_tag, first_tag, second_tag]);
        d.demux(&data, false, true).unwrap();

        assert_eq!(d.video().samples.len(), 2);
        let first = &d.video().samples[0];
        assert_eq!(first.units.len(), 4); // vps, sps, pps, trailing
        assert_eq!(first.units[0], d.video().vps[0]);
        assert_eq!(first.units[1], d.video().sps[0]);
        assert_eq!(first.units[2], d.video().pps[0]);
        assert_eq!(first.units[3], vec![0x02, 0x01, 0xCC]);

        let second = &d.video().samples[1];
        assert_eq!(second.units.len(), 1); // no re-insertion
        assert_eq!(second.units[0], vec![0x02, 0x01, 0xDD]);
    }

    #[test]
    fn unknown_video_codec_resets_track_and_continues() {
        let mut d = Demuxer::new();
        let bad_body = video_body(1, 3, 0, 0, &[0, 0, 0, 0, 0, 0]);
        let bad_tag = build_tag(TAG_TYPE_VIDEO, 0, &bad_body);

        let audio_tag = build_tag(TAG_TYPE_AUDIO, 0, &[0xAF, 0x00, 0x12, 0x10]);

        let data = flv_stream(&[bad_tag, audio_tag]);
        d.demux(&data, false, true).unwrap();

        assert!(d.video().samples.is_empty());
        assert!(!d.video().warnings.is_empty());
        assert_eq!(d.audio().codec_kind, Some(AudioCodec::Aac));
    }

    // A discontinuity reset clears headerParsed and drops any buffered
    // remainder.
    #[test]
    fn discontinuity_reset_clears_header_and_remainder() {
        let mut d = Demuxer::new();
        let data = avc_idr_stream();
        // Split mid-stream so a remainder is buffered.
        let (a, _b) = data.split_at(data.len() - 3);
        d.demux(a, false, true).unwrap();
        assert!(d.remaining_data.is_some());

        d.demux(&[], true, true).unwrap();
        assert!(!d.header_parsed);
        assert!(d.remaining_data.is_none());
    }

    // gopId increments exactly once per keyframe sample and is monotonic
    // non-decreasing across calls.
    #[test]
    fn gop_id_increments_once_per_keyframe() {
        let mut d = Demuxer::new();
        let config_body = video_body(1, VIDEO_CODEC_AVC, 0, 0, &AVC_DECODER_CONFIG);
        let config_tag = build_tag(TAG_TYPE_VIDEO, 0, &config_body);

        let idr = avcc_nal(&[0x65, 0x01]);
        let non_idr = avcc_nal(&[0x61, 0x02]); // type 1, not a keyframe

        let tag1 = build_tag(TAG_TYPE_VIDEO, 0, &video_body(1, VIDEO_CODEC_AVC, 1, 0, &idr));
        let tag2 = build_tag(TAG_TYPE_VIDEO, 40, &video_body(0, VIDEO_CODEC_AVC, 1, 0, &non_idr));
        let tag3 = build_tag(TAG_TYPE_VIDEO, 80, &video_body(1, VIDEO_CODEC_AVC, 1, 0, &idr));

        let data = flv_stream(&[config_tag, tag1, tag2, tag3]);
        d.demux(&data, false, true).unwrap();

        let samples = &d.video().samples;
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].gop_id, 1);
        assert_eq!(samples[1].gop_id, 1);
        assert_eq!(samples[2].gop_id, 2);
    }

    // If the header advertises no audio but audio samples were parsed
    // anyway, the audio track is reset (self-healed) before return.
    #[test]
    fn self_healing_resets_track_not_advertised_by_header() {
        let mut d = Demuxer::new();
        let mut data = Vec::new();
        // flags byte = 0x01: video only, no audio.
        data.extend_from_slice(&[0x46, 0x4c, 0x56, 0x01, 0x01, 0x00, 0x00, 0x00, 0x09]);
        data.extend_from_slice(&PREV_TAG_SIZE_0);
        let config_tag = build_tag(TAG_TYPE_AUDIO, 0, &[0xAF, 0x00, 0x12, 0x10]);
        let frame_tag = build_tag(TAG_TYPE_AUDIO, 23, &[0xAF, 0x01, 0xDE, 0xAD]);
        data.extend_from_slice(&config_tag);
        data.extend_from_slice(&frame_tag);

        d.demux(&data, false, true).unwrap();
        assert!(!d.audio().present);
        assert!(d.audio().samples.is_empty());
        assert!(d.audio().codec.is_none());
    }

    #[test]
    fn probe_rejects_bad_signature() {
        assert!(!probe(&[0x46, 0x4c, 0x58, 0x01, 0, 0, 0, 0, 9]));
        assert!(probe(&FLV_HEADER_AV));
    }

    #[test]
    fn invalid_signature_is_fatal() {
        let mut d = Demuxer::new();
        let mut bad = FLV_HEADER_AV;
        bad[3] = 0x02; // wrong version
        let err = d.demux(&bad, false, true).unwrap_err();
        assert_eq!(err.kind(), base::ErrorKind::InvalidContainer);
    }
}
