use std::fmt;
use num_enum::TryFromPrimitive;

/// Render a raw registry id as its enum variant name, or as hex when unknown.
pub fn enum_name_or_hex<T>(raw: T::Primitive) -> String
where
    T: TryFromPrimitive + fmt::Debug,
    T::Primitive: fmt::LowerHex,
{
    match T::try_from_primitive(raw) {
        Ok(variant) => format!("{:?}", variant),
        Err(_) => format!("0x{:x}", raw),
    }
}

/// Flatten decrypted segments into a single plaintext blob.
pub fn segments_to_plaintext(segments: &[impl AsRef<[u8]>]) -> Vec<u8> {
    let total = segments.iter().map(|s| s.as_ref().len()).sum();
    let mut out = Vec::with_capacity(total);
    for s in segments {
        out.extend_from_slice(s.as_ref());
    }
    out
}

/// Strip any directory prefix from a manifest filename.
///
/// Input manifests written by external splitters sometimes carry
/// `chunks/chunk000.mp4`; only the base name is resolved against a directory.
pub fn base_name(filename: &str) -> &str {
    filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}
