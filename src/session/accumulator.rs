use crate::audio::{AudioChunk, ChunkKind};

/// All audio captured since the last successful start, split by track
///
/// Independent of the recovery buffer: rotation never touches it.
#[derive(Debug, Default, Clone)]
pub struct SessionAccumulator {
    raw_chunks: Vec<AudioChunk>,
    encoded_chunks: Vec<AudioChunk>,
    raw_bytes: usize,
    encoded_bytes: usize,
    raw_duration_ms: u64,
    encoded_duration_ms: u64,
    encoded_mime_type: Option<String>,
}

impl SessionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: AudioChunk, kind: &ChunkKind) {
        match kind {
            ChunkKind::Raw => self.push_raw(chunk),
            ChunkKind::Encoded { mime_type } => self.push_encoded(chunk, mime_type.as_deref()),
        }
    }

    pub fn push_raw(&mut self, chunk: AudioChunk) {
        self.raw_bytes += chunk.len();
        self.raw_duration_ms += chunk.duration_ms;
        self.raw_chunks.push(chunk);
    }

    /// The first MIME type seen for the session sticks.
    pub fn push_encoded(&mut self, chunk: AudioChunk, mime_type: Option<&str>) {
        if self.encoded_mime_type.is_none() {
            self.encoded_mime_type = mime_type.map(str::to_string);
        }
        self.encoded_bytes += chunk.len();
        self.encoded_duration_ms += chunk.duration_ms;
        self.encoded_chunks.push(chunk);
    }

    /// Raw track concatenated in arrival order
    pub fn raw_audio(&self) -> Vec<u8> {
        concat(&self.raw_chunks, self.raw_bytes)
    }

    /// Encoded track concatenated in arrival order
    pub fn encoded_audio(&self) -> Vec<u8> {
        concat(&self.encoded_chunks, self.encoded_bytes)
    }

    pub fn raw_chunks(&self) -> &[AudioChunk] {
        &self.raw_chunks
    }

    pub fn encoded_chunks(&self) -> &[AudioChunk] {
        &self.encoded_chunks
    }

    pub fn raw_bytes(&self) -> usize {
        self.raw_bytes
    }

    pub fn encoded_bytes(&self) -> usize {
        self.encoded_bytes
    }

    pub fn raw_duration_ms(&self) -> u64 {
        self.raw_duration_ms
    }

    pub fn encoded_duration_ms(&self) -> u64 {
        self.encoded_duration_ms
    }

    pub fn encoded_mime_type(&self) -> Option<&str> {
        self.encoded_mime_type.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_chunks.is_empty() && self.encoded_chunks.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn concat(chunks: &[AudioChunk], total: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(total);
    for chunk in chunks {
        out.extend_from_slice(&chunk.bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(bytes: Vec<u8>, timestamp_ms: u64) -> AudioChunk {
        AudioChunk {
            bytes: bytes.into(),
            timestamp_ms,
            duration_ms: 100,
            sample_rate: 16000,
        }
    }

    #[test]
    fn test_raw_bytes_equal_sum_of_chunks() {
        let mut acc = SessionAccumulator::new();
        let mut expected = Vec::new();

        for i in 0..7u8 {
            let bytes = vec![i; 4 * (i as usize + 1)];
            expected.extend_from_slice(&bytes);
            acc.push_raw(chunk(bytes, i as u64 * 100));
        }

        assert_eq!(acc.raw_bytes(), expected.len());
        assert_eq!(acc.raw_audio(), expected);
        assert_eq!(acc.raw_duration_ms(), 700);
        assert_eq!(acc.encoded_bytes(), 0);
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut acc = SessionAccumulator::new();
        acc.push(chunk(vec![1, 2, 3, 4], 0), &ChunkKind::Raw);
        acc.push(
            chunk(vec![9, 9], 100),
            &ChunkKind::Encoded {
                mime_type: Some("audio/ogg".to_string()),
            },
        );

        assert_eq!(acc.raw_audio(), vec![1, 2, 3, 4]);
        assert_eq!(acc.encoded_audio(), vec![9, 9]);
        assert_eq!(acc.raw_chunks().len(), 1);
        assert_eq!(acc.encoded_chunks().len(), 1);
    }

    #[test]
    fn test_first_mime_type_wins() {
        let mut acc = SessionAccumulator::new();
        acc.push_encoded(chunk(vec![1], 0), None);
        acc.push_encoded(chunk(vec![2], 100), Some("audio/webm"));
        acc.push_encoded(chunk(vec![3], 200), Some("audio/ogg"));
        assert_eq!(acc.encoded_mime_type(), Some("audio/webm"));
    }

    #[test]
    fn test_clear() {
        let mut acc = SessionAccumulator::new();
        acc.push_raw(chunk(vec![0; 8], 0));
        acc.push_encoded(chunk(vec![0; 8], 0), Some("audio/webm"));
        acc.clear();

        assert!(acc.is_empty());
        assert_eq!(acc.raw_bytes(), 0);
        assert_eq!(acc.encoded_duration_ms(), 0);
        assert_eq!(acc.encoded_mime_type(), None);
    }
}
