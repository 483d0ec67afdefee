//! Upload ingestion: size cap, metadata scrub, content-addressed store,
//! MIME sniff, markdown fragment.

use exif::{In, Reader, Tag};
use img_parts::jpeg::{markers, Jpeg, JpegSegment};
use img_parts::{Bytes, ImageEXIF};
use log::debug;
use ssb_msg::BlobLink;

use crate::{error::ComposeError, store::BlobStore};

/// Uploads above 5 MiB are rejected before any parsing or store write.
pub const MAX_BLOB_BYTES: usize = 5 * (1 << 20);

const GENERIC_MIME: &str = "application/octet-stream";

/// One uploaded file, already decoded by the HTTP layer.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Outcome of the metadata scrub. Payloads that are not a recognized
/// embedded-metadata format pass through untouched; that is expected and
/// never surfaced as an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sanitized {
    Cleaned(Vec<u8>),
    Passthrough,
}

/// Strip embedded metadata from a JPEG, keeping only the orientation tag so
/// the image still displays with the right rotation. GPS position, capture
/// times and device info are all dropped.
pub fn scrub_metadata(bytes: &[u8]) -> Sanitized {
    let mut jpeg = match Jpeg::from_bytes(Bytes::copy_from_slice(bytes)) {
        Ok(jpeg) => jpeg,
        Err(_) => return Sanitized::Passthrough,
    };

    let orientation = jpeg.exif().and_then(|raw| read_orientation(&raw));
    jpeg.set_exif(None);

    if let Some(value) = orientation {
        let mut contents = b"Exif\0\0".to_vec();
        contents.extend_from_slice(&orientation_only_exif(value));
        let segment = JpegSegment::new_with_contents(markers::APP1, Bytes::from(contents));

        // APP1 belongs with the leading application segments, and always
        // before the scan; a short file may have nothing else in front.
        let segments = jpeg.segments_mut();
        let at = segments
            .iter()
            .position(|segment| segment.marker() == markers::SOS)
            .unwrap_or(segments.len())
            .min(3);
        segments.insert(at, segment);
    }

    Sanitized::Cleaned(jpeg.encoder().bytes().to_vec())
}

fn read_orientation(raw: &[u8]) -> Option<u16> {
    let exif = Reader::new().read_raw(raw.to_vec()).ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    field.value.get_uint(0).map(|value| value as u16)
}

// Minimal little-endian TIFF holding a single 0th-IFD entry: tag 0x0112
// (Orientation), type SHORT, count 1.
fn orientation_only_exif(value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(26);
    out.extend_from_slice(b"II\x2a\x00");
    out.extend_from_slice(&8u32.to_le_bytes()); // offset of the 0th IFD
    out.extend_from_slice(&1u16.to_le_bytes()); // entry count
    out.extend_from_slice(&0x0112u16.to_le_bytes());
    out.extend_from_slice(&3u16.to_le_bytes()); // SHORT
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&[0, 0]); // pad the 4-byte value field
    out.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
    out
}

/// Sanitize and store one upload. Returns `None` for a zero-length payload
/// (no attachment, nothing stored). The MIME type comes from sniffing the
/// stored bytes, never from anything the client declared.
pub async fn ingest<B: BlobStore + ?Sized>(
    store: &B,
    attachment: &Attachment,
) -> Result<Option<BlobLink>, ComposeError> {
    let size = attachment.bytes.len();
    if size > MAX_BLOB_BYTES {
        return Err(ComposeError::PayloadTooLarge { size });
    }
    if size == 0 {
        return Ok(None);
    }

    let bytes = match scrub_metadata(&attachment.bytes) {
        Sanitized::Cleaned(bytes) => bytes,
        Sanitized::Passthrough => {
            debug!(
                "{}: no embedded metadata to scrub, storing as-is",
                attachment.filename
            );
            attachment.bytes.clone()
        }
    };

    let link = store.add(&bytes).await?;

    let mime_type = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| GENERIC_MIME.to_string());

    Ok(Some(BlobLink {
        link,
        name: Some(attachment.filename.clone()),
        size: Some(bytes.len() as u64),
        mime_type: Some(mime_type),
    }))
}

/// Markdown fragment for an ingested upload, newline-prefixed so it splits
/// cleanly from the text it gets appended to. Audio and video are tagged
/// inside the image syntax so a renderer can tell playable media apart.
pub fn markdown_fragment(blob: &BlobLink) -> String {
    let name = blob.name.as_deref().unwrap_or("blob");
    let mime_type = blob.mime_type.as_deref().unwrap_or(GENERIC_MIME);
    let link = &blob.link;

    if mime_type.starts_with("image/") {
        format!("\n![{}]({})", name, link)
    } else if mime_type.starts_with("audio/") {
        format!("\n![audio:{}]({})", name, link)
    } else if mime_type.starts_with("video/") {
        format!("\n![video:{}]({})", name, link)
    } else {
        format!("\n[{}]({})", name, link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlobStore;

    fn attachment(bytes: Vec<u8>, filename: &str) -> Attachment {
        Attachment {
            bytes,
            filename: filename.to_string(),
        }
    }

    // Single-component scan header followed by EOI as the entropy data.
    const SCAN: [u8; 12] = [
        0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0xFF, 0xD9,
    ];

    // SOI, one APP1 segment carrying `exif_payload`, a minimal scan, EOI.
    fn jpeg_with_exif(exif_payload: &[u8]) -> Vec<u8> {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(exif_payload);

        let mut out = vec![0xFF, 0xD8];
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&SCAN);
        out
    }

    // Little-endian TIFF with a Make field ("abc") and an Orientation field.
    fn two_field_exif(orientation: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"II\x2a\x00");
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&0x010fu16.to_le_bytes()); // Make
        out.extend_from_slice(&2u16.to_le_bytes()); // ASCII
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(b"abc\0");
        out.extend_from_slice(&0x0112u16.to_le_bytes()); // Orientation
        out.extend_from_slice(&3u16.to_le_bytes()); // SHORT
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&orientation.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    #[test]
    fn scrub_keeps_orientation_and_drops_other_metadata() {
        let original = jpeg_with_exif(&two_field_exif(6));
        let Sanitized::Cleaned(clean) = scrub_metadata(&original) else {
            panic!("expected a cleaned jpeg");
        };

        let jpeg = Jpeg::from_bytes(Bytes::from(clean)).unwrap();
        let raw = jpeg.exif().expect("orientation should survive the scrub");
        let exif = Reader::new().read_raw(raw.to_vec()).unwrap();
        assert_eq!(exif.fields().count(), 1);
        let field = exif.get_field(Tag::Orientation, In::PRIMARY).unwrap();
        assert_eq!(field.value.get_uint(0), Some(6));
    }

    #[test]
    fn scrub_without_orientation_strips_everything() {
        // Make only, no orientation
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II\x2a\x00");
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x010fu16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&4u32.to_le_bytes());
        tiff.extend_from_slice(b"abc\0");
        tiff.extend_from_slice(&0u32.to_le_bytes());

        let original = jpeg_with_exif(&tiff);
        let Sanitized::Cleaned(clean) = scrub_metadata(&original) else {
            panic!("expected a cleaned jpeg");
        };
        let jpeg = Jpeg::from_bytes(Bytes::from(clean)).unwrap();
        assert!(jpeg.exif().is_none());
    }

    #[test]
    fn scrub_reinserts_orientation_before_the_scan() {
        // JFIF APP0 ahead of the metadata segment
        let mut original = vec![0xFF, 0xD8];
        original.extend_from_slice(&[
            0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
            0x00, 0x01, 0x00, 0x00,
        ]);
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&two_field_exif(3));
        original.extend_from_slice(&[0xFF, 0xE1]);
        original.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        original.extend_from_slice(&payload);
        original.extend_from_slice(&SCAN);

        let Sanitized::Cleaned(clean) = scrub_metadata(&original) else {
            panic!("expected a cleaned jpeg");
        };
        let jpeg = Jpeg::from_bytes(Bytes::from(clean)).unwrap();
        let segments = jpeg.segments();
        assert_eq!(segments[0].marker(), markers::APP0);
        assert_eq!(segments[1].marker(), markers::APP1);
        let raw = jpeg.exif().unwrap();
        assert_eq!(read_orientation(&raw), Some(3));
    }

    #[test]
    fn scrub_passes_other_formats_through() {
        assert_eq!(scrub_metadata(b"plain text bytes"), Sanitized::Passthrough);
    }

    #[tokio::test]
    async fn rejects_payload_over_the_cap() {
        let store = MemoryBlobStore::new();
        let too_big = attachment(vec![0u8; MAX_BLOB_BYTES + 1], "big.bin");
        let err = ingest(&store, &too_big).await.unwrap_err();
        assert!(matches!(err, ComposeError::PayloadTooLarge { .. }));
        // rejected before any store write
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn accepts_payload_at_exactly_the_cap() {
        let store = MemoryBlobStore::new();
        let at_cap = attachment(vec![0u8; MAX_BLOB_BYTES], "big.bin");
        let blob = ingest(&store, &at_cap).await.unwrap().unwrap();
        assert_eq!(blob.size, Some(MAX_BLOB_BYTES as u64));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn zero_length_payload_is_no_attachment() {
        let store = MemoryBlobStore::new();
        let empty = attachment(Vec::new(), "empty.bin");
        assert!(ingest(&store, &empty).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn identical_bytes_yield_identical_refs() {
        let store = MemoryBlobStore::new();
        let first = ingest(&store, &attachment(b"same bytes".to_vec(), "a.bin"))
            .await
            .unwrap()
            .unwrap();
        let second = ingest(&store, &attachment(b"same bytes".to_vec(), "b.bin"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.link, second.link);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn jpeg_upload_is_scrubbed_and_gets_an_image_fragment() {
        let store = MemoryBlobStore::new();
        let original = jpeg_with_exif(&two_field_exif(6));
        let blob = ingest(&store, &attachment(original, "photo.jpg"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(blob.mime_type.as_deref(), Some("image/jpeg"));
        assert!(markdown_fragment(&blob).starts_with("\n![photo.jpg]("));

        // the stored bytes kept orientation and nothing else
        let stored = store.get(&blob.link).unwrap();
        let jpeg = Jpeg::from_bytes(Bytes::from(stored)).unwrap();
        let raw = jpeg.exif().unwrap();
        let exif = Reader::new().read_raw(raw.to_vec()).unwrap();
        assert_eq!(exif.fields().count(), 1);
    }

    #[tokio::test]
    async fn mime_comes_from_sniffing_not_the_filename() {
        let store = MemoryBlobStore::new();
        // PNG magic number behind a misleading filename
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 16]);
        let blob = ingest(&store, &attachment(bytes, "notes.txt"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blob.mime_type.as_deref(), Some("image/png"));
        assert!(markdown_fragment(&blob).starts_with("\n![notes.txt]("));
    }

    #[tokio::test]
    async fn unrecognized_bytes_fall_back_to_a_plain_link() {
        let store = MemoryBlobStore::new();
        let blob = ingest(&store, &attachment(b"just some text".to_vec(), "notes.txt"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blob.mime_type.as_deref(), Some(GENERIC_MIME));
        let fragment = markdown_fragment(&blob);
        assert!(fragment.starts_with("\n[notes.txt]("));
        assert!(!fragment.starts_with("\n!["));
    }

    #[test]
    fn audio_and_video_fragments_are_tagged() {
        let link = "&51ZXxNYIvTDCoNTE9R94NiEg3JAZAxWtKn4h4SmBwyY=.sha256"
            .parse()
            .unwrap();
        let mut blob = BlobLink {
            link,
            name: Some("song.ogg".to_string()),
            size: None,
            mime_type: Some("audio/ogg".to_string()),
        };
        assert!(markdown_fragment(&blob).starts_with("\n![audio:song.ogg]("));
        blob.mime_type = Some("video/mp4".to_string());
        assert!(markdown_fragment(&blob).starts_with("\n![video:song.ogg]("));
    }
}
