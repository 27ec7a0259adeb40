//! IEEE-float WAV container for raw session audio.

/// Size of the canonical RIFF/WAVE header written by `encode_float32_wav`
pub const WAV_HEADER_LEN: usize = 44;

const FORMAT_IEEE_FLOAT: u16 = 3;
const BITS_PER_SAMPLE: u16 = 32;
const BYTES_PER_SAMPLE: u32 = 4;

/// Wrap little-endian f32 PCM in a 44-byte RIFF/WAVE header.
///
/// The PCM bytes are copied after the header unmodified.
pub fn encode_float32_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    // Saturate rather than wrap; validated configs never reach the limits
    let data_size = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let block_align = u16::try_from(channels as u32 * BYTES_PER_SAMPLE).unwrap_or(u16::MAX);
    let byte_rate = sample_rate.saturating_mul(block_align as u32);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&data_size.saturating_add(36).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_IEEE_FLOAT.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Header fields of a WAV produced by `encode_float32_wav`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the canonical 44-byte header; None if the layout doesn't match.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < WAV_HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }

        let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
        let u32_at =
            |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);

        Some(Self {
            format_tag: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }
}

/// Duration of f32 PCM in milliseconds
pub fn pcm_duration_ms(byte_len: usize, sample_rate: u32, channels: u16) -> u64 {
    let bytes_per_second = channels as u64 * sample_rate as u64 * BYTES_PER_SAMPLE as u64;
    if bytes_per_second == 0 {
        return 0;
    }
    (byte_len as u64 * 1000) / bytes_per_second
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::chunk::samples_to_le_bytes;

    #[test]
    fn test_header_layout() {
        let pcm = samples_to_le_bytes(&[0.25; 10]);
        let wav = encode_float32_wav(&pcm, 16000, 1);

        assert_eq!(wav.len(), WAV_HEADER_LEN + 40);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[4..8], &(36u32 + 40).to_le_bytes());
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[16..20], &16u32.to_le_bytes());
        assert_eq!(&wav[20..22], &3u16.to_le_bytes());
        assert_eq!(&wav[22..24], &1u16.to_le_bytes());
        assert_eq!(&wav[24..28], &16000u32.to_le_bytes());
        assert_eq!(&wav[28..32], &64000u32.to_le_bytes());
        assert_eq!(&wav[32..34], &4u16.to_le_bytes());
        assert_eq!(&wav[34..36], &32u16.to_le_bytes());
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(&wav[40..44], &40u32.to_le_bytes());
        assert_eq!(&wav[44..], &pcm[..]);
    }

    #[test]
    fn test_stereo_rates() {
        let wav = encode_float32_wav(&[], 48000, 2);
        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.byte_rate, 48000 * 2 * 4);
        assert_eq!(header.block_align, 8);
        assert_eq!(header.data_size, 0);
        assert_eq!(wav.len(), WAV_HEADER_LEN);
    }

    #[test]
    fn test_oversized_format_saturates() {
        let wav = encode_float32_wav(&[], 1_100_000_000, u16::MAX);
        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.byte_rate, u32::MAX);
        assert_eq!(header.block_align, u16::MAX);
        assert_eq!(header.sample_rate, 1_100_000_000);
    }

    #[test]
    fn test_parse_round_trips_header_fields() {
        let pcm = vec![0u8; 4 * 441];
        let wav = encode_float32_wav(&pcm, 44100, 1);
        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.format_tag, 3);
        assert_eq!(header.channels, 1);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bits_per_sample, 32);
        assert_eq!(header.data_size as usize, pcm.len());
    }

    #[test]
    fn test_parse_rejects_non_wav() {
        assert!(WavHeader::parse(b"OggS").is_none());
        assert!(WavHeader::parse(&[0u8; 64]).is_none());
    }

    #[test]
    fn test_pcm_duration() {
        // 1600 f32 samples at 16kHz mono = 100ms
        assert_eq!(pcm_duration_ms(1600 * 4, 16000, 1), 100);
        assert_eq!(pcm_duration_ms(48000 * 2 * 4, 48000, 2), 1000);
        assert_eq!(pcm_duration_ms(1024, 0, 1), 0);
    }
}
