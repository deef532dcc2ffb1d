//! Segment boundary derivation.
//!
//! Splits a media duration into fixed-length time spans. The last span takes
//! whatever remains; an exact multiple never yields an empty trailing span.

use crate::manifest::types::{InputEntry, InputManifest};
use crate::segment::types::SegmentSpan;
use crate::types::StreamError;

/// Plan spans of `chunk_len` seconds covering `duration` seconds.
pub fn plan_segments(duration: f64, chunk_len: f64) -> Result<Vec<SegmentSpan>, StreamError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(StreamError::SourceUnavailable(format!(
            "cannot split media: duration is {duration}"
        )));
    }
    if !chunk_len.is_finite() || chunk_len <= 0.0 {
        return Err(StreamError::SourceUnavailable(format!(
            "cannot split media: chunk length is {chunk_len}"
        )));
    }

    let whole = (duration / chunk_len).floor() as u32;
    let count = whole + u32::from(duration % chunk_len > 0.0);

    let spans = (0..count)
        .map(|index| {
            let start = f64::from(index) * chunk_len;
            SegmentSpan {
                index,
                start,
                duration: chunk_len.min(duration - start),
            }
        })
        .collect();

    Ok(spans)
}

/// The input manifest an external splitter writes for a plan (`chunkNNN.<ext>` names).
pub fn plan_input_manifest(duration: f64, chunk_len: f64, ext: &str) -> Result<InputManifest, StreamError> {
    let chunks = plan_segments(duration, chunk_len)?
        .into_iter()
        .map(|span| InputEntry {
            filename: span.filename(ext),
            start: Some(span.start),
            duration: Some(span.duration),
        })
        .collect();
    Ok(InputManifest { init: None, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_becomes_short_last_span() {
        let spans = plan_segments(25.0, 10.0).unwrap();
        let got: Vec<(f64, f64)> = spans.iter().map(|s| (s.start, s.duration)).collect();
        assert_eq!(got, vec![(0.0, 10.0), (10.0, 10.0), (20.0, 5.0)]);
        assert_eq!(spans[2].index, 2);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let spans = plan_segments(30.0, 10.0).unwrap();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.duration == 10.0));
    }

    #[test]
    fn short_media_is_one_span() {
        let spans = plan_segments(4.5, 10.0).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].duration, 4.5);
    }

    #[test]
    fn zero_or_nan_duration_is_source_unavailable() {
        assert!(matches!(plan_segments(0.0, 10.0), Err(StreamError::SourceUnavailable(_))));
        assert!(matches!(plan_segments(f64::NAN, 10.0), Err(StreamError::SourceUnavailable(_))));
        assert!(matches!(plan_segments(10.0, 0.0), Err(StreamError::SourceUnavailable(_))));
    }

    #[test]
    fn input_manifest_names_follow_index() {
        let m = plan_input_manifest(12.0, 10.0, "mp4").unwrap();
        assert_eq!(m.chunks[0].filename, "chunk000.mp4");
        assert_eq!(m.chunks[1].filename, "chunk001.mp4");
        assert_eq!(m.chunks[1].duration, Some(2.0));

        let span = plan_segments(12.0, 10.0).unwrap()[1];
        assert_eq!(span.filename("ts"), "chunk001.ts");
    }
}
