//! MPEG-4 AudioSpecificConfig parsing.
//!
//! Only the fields an audio track needs are extracted: `codec`,
//! `channelCount`, `sampleRate`, `config` (the raw bytes, re-emitted
//! verbatim since downstream remuxers need them in an `esds`/`mp4a` box),
//! `objectType`, and `samplingFrequencyIndex`.

use base::{bail, Error};

use crate::bitreader::BitReader;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub codec: String,
    pub channel_count: u8,
    pub sample_rate: u32,
    pub config: Vec<u8>,
    pub object_type: u8,
    pub sampling_frequency_index: u8,
}

/// Parses an AudioSpecificConfig (ISO/IEC 14496-3 section 1.6.2.1). Only the
/// leading fields are decoded; any GASpecificConfig tail is ignored since
/// nothing downstream needs it.
pub fn parse_audio_specific_config(data: &[u8]) -> Result<AudioSpecificConfig, Error> {
    if data.len() < 2 {
        bail!(Internal, msg("AudioSpecificConfig too short"));
    }
    let mut r = BitReader::new(data);
    let mut object_type = r.read_bits(5)? as u8;
    if object_type == 31 {
        // Escape code: object type is 32 + the next 6 bits.
        object_type = 32 + r.read_bits(6)? as u8;
    }
    let sampling_frequency_index = r.read_bits(4)? as u8;
    let sample_rate = if sampling_frequency_index == 0x0f {
        r.read_bits(24)?
    } else {
        *SAMPLE_RATES
            .get(sampling_frequency_index as usize)
            .ok_or_else(|| base::err!(Internal, msg("bad samplingFrequencyIndex")))?
    };
    let channel_config = r.read_bits(4)?;
    let channel_count = match channel_config {
        0 => 0, // defined by an enclosing PCE; we don't chase that here
        1..=6 => channel_config as u8,
        7 => 8,
        _ => bail!(Internal, msg("bad channelConfiguration {channel_config}")),
    };

    let codec = format!("mp4a.40.{object_type}");

    Ok(AudioSpecificConfig {
        codec,
        channel_count,
        sample_rate,
        config: data.to_vec(),
        object_type,
        sampling_frequency_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aac_lc_stereo_44100() {
        // object type 2 (AAC LC), freq index 4 (44100), channels 2, no SBR/PS.
        // 0b00010 0100 0010 000 -> 12 10
        let cfg = parse_audio_specific_config(&[0x12, 0x10]).unwrap();
        assert_eq!(cfg.object_type, 2);
        assert_eq!(cfg.sampling_frequency_index, 4);
        assert_eq!(cfg.sample_rate, 44100);
        assert_eq!(cfg.channel_count, 2);
        assert_eq!(cfg.codec, "mp4a.40.2");
        assert_eq!(cfg.config, vec![0x12, 0x10]);
    }

    #[test]
    fn rejects_truncated_config() {
        assert!(parse_audio_specific_config(&[0x12]).is_err());
    }
}
