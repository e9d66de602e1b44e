use std::path::Path;

// Best-effort duration probe for staged voice payloads. Returns seconds, or
// 0.0 when the duration cannot be determined - callers treat unknown as
// within limit rather than turning a probe failure into a user-facing denial.
// The read goes through tokio so a large payload never stalls the executor.
pub async fn probe_duration(path: &Path) -> f64 {
    match tokio::fs::read(path).await {
        Ok(bytes) => duration_from_bytes(&bytes),
        Err(_) => 0.0,
    }
}

fn duration_from_bytes(bytes: &[u8]) -> f64 {
    if bytes.starts_with(b"OggS") {
        ogg_duration(bytes)
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12).map(|b| b == b"WAVE").unwrap_or(false)
    {
        wav_duration(bytes)
    } else {
        0.0
    }
}

pub fn within_limit(duration: f64, max_secs: u64) -> bool {
    duration <= max_secs as f64
}

// Last-page granule position. Voice notes are Ogg/Opus, where granules are
// always 48 kHz samples regardless of the encoded rate.
fn ogg_duration(bytes: &[u8]) -> f64 {
    let mut last_granule = None;
    let mut pos = 0;

    while let Some(offset) = find(&bytes[pos..], b"OggS") {
        let page = pos + offset;
        // stream structure version must be 0
        if bytes.get(page + 4) == Some(&0) {
            if let Some(raw) = bytes.get(page + 6..page + 14) {
                let granule = u64::from_le_bytes(raw.try_into().unwrap());
                // -1 marks a page where no packet completes
                if granule != u64::MAX {
                    last_granule = Some(granule);
                }
            }
        }
        pos = page + 4;
    }

    match last_granule {
        Some(granule) => granule as f64 / 48_000.0,
        None => 0.0,
    }
}

fn wav_duration(bytes: &[u8]) -> f64 {
    let mut byte_rate = 0u32;
    let mut data_len = 0u32;

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());

        if id == b"fmt " {
            if let Some(raw) = bytes.get(pos + 16..pos + 20) {
                byte_rate = u32::from_le_bytes(raw.try_into().unwrap());
            }
        } else if id == b"data" {
            data_len = size;
        }

        // chunks are word-aligned
        pos += 8 + size as usize + (size as usize & 1);
    }

    if byte_rate == 0 {
        0.0
    } else {
        f64::from(data_len) / f64::from(byte_rate)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
