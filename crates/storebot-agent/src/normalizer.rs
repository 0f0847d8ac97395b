// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds inbound attachments into the text the assistant sees.

use std::sync::Arc;

use storebot_meta::{Attachment, AttachmentKind, MediaRehoster};
use tracing::{debug, warn};

/// Cue placed before customer-sent image URLs.
pub const IMAGE_CUE: &str = "Do you have items that look like this?";

/// Turns text plus attachments into a single prompt string.
#[derive(Clone, Default)]
pub struct AttachmentNormalizer {
    rehoster: Option<Arc<MediaRehoster>>,
}

impl AttachmentNormalizer {
    pub fn new(rehoster: Option<Arc<MediaRehoster>>) -> Self {
        Self { rehoster }
    }

    /// Platform CDN images are re-hosted when a token is available; any
    /// failure keeps the original URL. The result may be empty, in which case
    /// the caller drops the event.
    pub async fn format_message_with_attachments(
        &self,
        text: &str,
        attachments: &[Attachment],
        access_token: Option<&str>,
    ) -> String {
        let mut image_urls = Vec::new();
        let mut others = Vec::new();

        for attachment in attachments {
            match attachment.kind {
                AttachmentKind::Image => {
                    image_urls.push(self.image_url(&attachment.url, access_token).await);
                }
                _ => others.push(describe_attachment(attachment)),
            }
        }

        let mut sections = Vec::with_capacity(3);
        let text = text.trim();
        if !text.is_empty() {
            sections.push(text.to_string());
        }
        if !image_urls.is_empty() {
            sections.push(format!("{IMAGE_CUE}\n{}", image_urls.join("\n")));
        }
        if !others.is_empty() {
            sections.push(others.join("\n"));
        }
        sections.join("\n\n")
    }

    async fn image_url(&self, url: &str, access_token: Option<&str>) -> String {
        let (Some(rehoster), Some(token)) = (&self.rehoster, access_token) else {
            return url.to_string();
        };
        if !rehoster.is_platform_cdn(url) {
            return url.to_string();
        }
        match rehoster.rehost(url, token).await {
            Ok(public_url) => {
                debug!(public_url = %public_url, "customer image re-hosted");
                public_url
            }
            Err(e) => {
                warn!(error = %e, "image re-hosting failed, keeping original url");
                url.to_string()
            }
        }
    }
}

fn describe_attachment(attachment: &Attachment) -> String {
    let url = &attachment.url;
    match attachment.kind {
        AttachmentKind::Video => format!("[Video: {url}]"),
        AttachmentKind::Audio => format!("[Audio: {url}]"),
        AttachmentKind::File => format!(
            "[File: {} - {url}]",
            attachment.title.as_deref().unwrap_or("Document")
        ),
        AttachmentKind::Image | AttachmentKind::Other => format!("[Attachment: {url}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storebot_meta::GraphClient;
    use storebot_test_utils::MockBlobStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attachment(kind: AttachmentKind, url: &str) -> Attachment {
        Attachment {
            kind,
            url: url.to_string(),
            title: None,
        }
    }

    #[tokio::test]
    async fn text_only_is_trimmed() {
        let normalizer = AttachmentNormalizer::default();
        let out = normalizer
            .format_message_with_attachments("  hello  ", &[], None)
            .await;
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn nothing_yields_empty_string() {
        let normalizer = AttachmentNormalizer::default();
        let out = normalizer
            .format_message_with_attachments("   ", &[], Some("tok"))
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn mixed_sections_are_ordered_and_separated() {
        let normalizer = AttachmentNormalizer::default();
        let mut file = attachment(AttachmentKind::File, "https://x/f.pdf");
        file.title = Some("menu.pdf".into());
        let attachments = vec![
            attachment(AttachmentKind::Video, "https://x/v.mp4"),
            attachment(AttachmentKind::Image, "https://x/a.jpg"),
            file,
            attachment(AttachmentKind::Image, "https://x/b.jpg"),
            attachment(AttachmentKind::Audio, "https://x/a.mp3"),
            attachment(AttachmentKind::Other, "https://x/o"),
        ];
        let out = normalizer
            .format_message_with_attachments("price?", &attachments, None)
            .await;
        assert_eq!(
            out,
            "price?\n\n\
             Do you have items that look like this?\nhttps://x/a.jpg\nhttps://x/b.jpg\n\n\
             [Video: https://x/v.mp4]\n[File: menu.pdf - https://x/f.pdf]\n\
             [Audio: https://x/a.mp3]\n[Attachment: https://x/o]"
        );
    }

    #[tokio::test]
    async fn image_only_has_no_leading_blank_line() {
        let normalizer = AttachmentNormalizer::default();
        let out = normalizer
            .format_message_with_attachments(
                "",
                &[attachment(AttachmentKind::Image, "https://x/a.jpg")],
                None,
            )
            .await;
        assert_eq!(out, format!("{IMAGE_CUE}\nhttps://x/a.jpg"));
    }

    async fn rehosting_normalizer(server: &MockServer, blob: Arc<MockBlobStore>) -> AttachmentNormalizer {
        let graph = GraphClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let rehoster = MediaRehoster::new(graph, blob, vec![server.address().ip().to_string()], "facebook-images");
        AttachmentNormalizer::new(Some(Arc::new(rehoster)))
    }

    #[tokio::test]
    async fn cdn_images_are_rehosted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdn/pic.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;
        let blob = Arc::new(MockBlobStore::new());
        let normalizer = rehosting_normalizer(&server, blob.clone()).await;

        let url = format!("{}/cdn/pic.png", server.uri());
        let out = normalizer
            .format_message_with_attachments("", &[attachment(AttachmentKind::Image, &url)], Some("tok"))
            .await;

        let uploads = blob.uploads().await;
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].key.starts_with("facebook-images/"));
        assert!(uploads[0].key.ends_with(".png"));
        assert_eq!(out, format!("{IMAGE_CUE}\nhttps://blob.test/{}", uploads[0].key));
    }

    #[tokio::test]
    async fn rehost_failure_keeps_original_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let blob = Arc::new(MockBlobStore::new());
        let normalizer = rehosting_normalizer(&server, blob.clone()).await;

        let url = format!("{}/cdn/pic.jpg", server.uri());
        let out = normalizer
            .format_message_with_attachments("look", &[attachment(AttachmentKind::Image, &url)], Some("tok"))
            .await;

        assert_eq!(out, format!("look\n\n{IMAGE_CUE}\n{url}"));
        assert!(blob.uploads().await.is_empty());
    }

    #[tokio::test]
    async fn without_token_images_are_not_rehosted() {
        let server = MockServer::start().await;
        let blob = Arc::new(MockBlobStore::new());
        let normalizer = rehosting_normalizer(&server, blob.clone()).await;

        let url = format!("{}/cdn/pic.jpg", server.uri());
        let out = normalizer
            .format_message_with_attachments("", &[attachment(AttachmentKind::Image, &url)], None)
            .await;
        assert_eq!(out, format!("{IMAGE_CUE}\n{url}"));
        assert!(blob.uploads().await.is_empty());
    }
}
