//! AVCDecoderConfigurationRecord parsing (ISO/IEC 14496-15 section 5.2.4.1).
//!
//! The record framing itself (profile/level bytes, NAL length size,
//! SPS/PPS arrays) is hand-parsed; the SPS *fields* (width, height, SAR,
//! frame rate) are pulled from the `h264-reader` crate rather than
//! re-deriving H.264's SPS bit layout by hand (the HEVC parser in
//! `hevc.rs` has no equivalent crate available and does derive it by
//! hand).

use base::{bail, err, Error};

use crate::bitreader::read_u16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSps {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub sar_ratio: (u32, u32),
    pub fps_num: u32,
    pub fps_den: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvcDecoderConfig {
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
    pub nal_unit_size: u8,
    pub parsed_sps: Option<ParsedSps>,
}

/// Parses an AVCDecoderConfigurationRecord starting at `data[0]`.
pub fn parse_avc_decoder_configuration_record(data: &[u8]) -> Result<AvcDecoderConfig, Error> {
    if data.len() < 7 {
        bail!(Internal, msg("AVCDecoderConfigurationRecord too short"));
    }
    // data[0] = configurationVersion, data[1..4] = profile/compat/level,
    // data[4] = 0b111111 + lengthSizeMinusOne.
    let nal_unit_size = (data[4] & 0x03) + 1;
    crate::nal::check_length_size(nal_unit_size)?;

    let mut off = 5;
    let num_sps = (data[off] & 0x1f) as usize;
    off += 1;
    let mut sps = Vec::with_capacity(num_sps);
    for _ in 0..num_sps {
        if off + 2 > data.len() {
            bail!(Internal, msg("truncated SPS length"));
        }
        let len = read_u16(data, off) as usize;
        off += 2;
        if off + len > data.len() {
            bail!(Internal, msg("truncated SPS body"));
        }
        sps.push(data[off..off + len].to_vec());
        off += len;
    }

    if off >= data.len() {
        bail!(Internal, msg("AVCDecoderConfigurationRecord missing PPS count"));
    }
    let num_pps = data[off] as usize;
    off += 1;
    let mut pps = Vec::with_capacity(num_pps);
    for _ in 0..num_pps {
        if off + 2 > data.len() {
            bail!(Internal, msg("truncated PPS length"));
        }
        let len = read_u16(data, off) as usize;
        off += 2;
        if off + len > data.len() {
            bail!(Internal, msg("truncated PPS body"));
        }
        pps.push(data[off..off + len].to_vec());
        off += len;
    }

    let parsed_sps = sps.first().and_then(|s| parse_sps_fields(s).ok());

    Ok(AvcDecoderConfig {
        sps,
        pps,
        nal_unit_size,
        parsed_sps,
    })
}

/// Extracts the fields a video track needs from a raw (NAL-header
/// included) SPS, via `h264-reader`'s SPS syntax parser.
fn parse_sps_fields(sps_nal: &[u8]) -> Result<ParsedSps, Error> {
    if sps_nal.is_empty() {
        bail!(Internal, msg("empty SPS"));
    }
    // h264-reader's RBSP decoder expects the payload without the NAL header
    // byte, with emulation-prevention bytes still present (it removes them
    // itself).
    let rbsp = decode_rbsp(&sps_nal[1..]);
    let parsed = h264_reader::nal::sps::SeqParameterSet::from_bytes(&rbsp)
        .map_err(|e| err!(Internal, msg("bad AVC SPS: {e:?}")))?;

    let profile_idc = sps_nal.get(1).copied().unwrap_or(0);
    let constraint_flags = sps_nal.get(2).copied().unwrap_or(0);
    let level_idc = sps_nal.get(3).copied().unwrap_or(0);
    let codec = format!("avc1.{profile_idc:02x}{constraint_flags:02x}{level_idc:02x}");

    let (width, height) = parsed
        .pixel_dimensions()
        .map_err(|e| err!(Internal, msg("bad AVC SPS dimensions: {e:?}")))?;

    let sar_ratio = parsed
        .vui_parameters
        .as_ref()
        .and_then(|v| v.aspect_ratio_info.as_ref())
        .and_then(|a| a.clone().get())
        .map(|(w, h)| (u32::from(w), u32::from(h)))
        .unwrap_or((1, 1));

    let (fps_num, fps_den) = parsed
        .vui_parameters
        .as_ref()
        .and_then(|v| v.timing_info.as_ref())
        .map(|t| (t.time_scale, t.num_units_in_tick * 2))
        .unwrap_or((0, 0));

    Ok(ParsedSps {
        codec,
        width,
        height,
        sar_ratio,
        fps_num,
        fps_den,
    })
}

/// Removes emulation-prevention bytes from an encoded NAL payload (minus
/// header byte), matching `h264-reader`'s own RBSP decoding convention.
fn decode_rbsp(encoded: &[u8]) -> Vec<u8> {
    crate::nal::remove_epb(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const AVC_DECODER_CONFIG_TEST_INPUT: [u8; 38] = [
        0x01, 0x4d, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x17,
        0x67, 0x4d, 0x00, 0x1f, 0x9a, 0x66, 0x02, 0x80,
        0x2d, 0xff, 0x35, 0x01, 0x01, 0x01, 0x40, 0x00,
        0x00, 0xfa, 0x00, 0x00, 0x1d, 0x4c, 0x01, 0x01,
        0x00, 0x04, 0x68, 0xee, 0x3c, 0x80,
    ];

    #[test]
    fn parses_sps_pps_and_nal_unit_size() {
        let cfg = parse_avc_decoder_configuration_record(&AVC_DECODER_CONFIG_TEST_INPUT).unwrap();
        assert_eq!(cfg.nal_unit_size, 4);
        assert_eq!(cfg.sps.len(), 1);
        assert_eq!(cfg.pps.len(), 1);
        let parsed = cfg.parsed_sps.expect("SPS should parse");
        assert_eq!(parsed.codec, "avc1.4d001f");
        assert_eq!(parsed.width, 1280);
        assert_eq!(parsed.height, 720);
    }

    #[test]
    fn rejects_short_record() {
        assert!(parse_avc_decoder_configuration_record(&[0x01, 0x4d]).is_err());
    }
}
