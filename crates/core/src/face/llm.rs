use crate::face::{FaceEmotion, FaceEmotionClassifier, FaceError, ImageUpload};
use crate::llm::{InlineImage, LlmClient, LlmRequest};
use crate::prompt::{face_prompt, parse_face_emotion};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

/// Classifies facial expressions by asking a vision-capable LLM.
#[derive(Clone)]
pub struct LlmFaceClassifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmFaceClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

impl FaceEmotionClassifier for LlmFaceClassifier {
    fn classify(&self, image: ImageUpload) -> BoxFuture<'_, Result<FaceEmotion, FaceError>> {
        async move {
            if image.bytes.is_empty() {
                return Err(FaceError::EmptyImage);
            }
            let request = LlmRequest::text(face_prompt()).with_image(InlineImage {
                mime_type: image.content_type,
                data: image.bytes,
            });
            let reply = self.llm.generate(request).await?;
            let emotion = parse_face_emotion(&reply);
            tracing::debug!(%emotion, "face classified");
            Ok(emotion)
        }
        .boxed()
    }
}
