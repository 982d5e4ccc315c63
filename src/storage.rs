use log::warn;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::ServiceResult;

const TEMP_DIR: &str = "temp";
const PDF_DIR: &str = "pdfs";
const AUDIO_DIR: &str = "audio";

/// Object storage backed by a local directory tree. Files are addressed by
/// URLs under `/files/…`, which the HTTP layer serves from the same root.
#[derive(Clone)]
pub struct Storage {
    root: PathBuf,
    public_base_url: String,
}

impl Storage {
    /// Create the storage layout (temp, pdfs, audio folders)
    pub async fn init(config: &StorageConfig) -> ServiceResult<Self> {
        let storage = Storage {
            root: config.root.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        };

        for dir in [TEMP_DIR, PDF_DIR, AUDIO_DIR] {
            tokio::fs::create_dir_all(storage.root.join(dir)).await?;
        }

        Ok(storage)
    }

    /// Root directory served under `/files`
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Scratch directory for intermediate artifacts (OCR rasters etc.)
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    fn url_for(&self, relative: &str) -> String {
        format!("{}/files/{}", self.public_base_url, relative)
    }

    /// Store a lecture's source PDF, returning its public URL
    pub async fn store_pdf(&self, lecture_id: Uuid, bytes: &[u8]) -> ServiceResult<String> {
        let relative = format!("{}/{}.pdf", PDF_DIR, lecture_id);
        tokio::fs::write(self.root.join(&relative), bytes).await?;
        Ok(self.url_for(&relative))
    }

    /// Store one page's generated lecture audio, returning its public URL
    pub async fn store_page_audio(
        &self,
        lecture_id: Uuid,
        page_number: i32,
        bytes: &[u8],
    ) -> ServiceResult<String> {
        let dir = format!("{}/{}", AUDIO_DIR, lecture_id);
        tokio::fs::create_dir_all(self.root.join(&dir)).await?;

        let relative = format!("{}/page_{}.mp3", dir, page_number);
        tokio::fs::write(self.root.join(&relative), bytes).await?;
        Ok(self.url_for(&relative))
    }

    /// Remove everything stored for a lecture. Missing files are not an
    /// error; other failures are logged and swallowed so deletion of the
    /// relational rows is never blocked by stray artifacts.
    pub async fn remove_lecture_artifacts(&self, lecture_id: Uuid) {
        let pdf = self.root.join(format!("{}/{}.pdf", PDF_DIR, lecture_id));
        if let Err(e) = tokio::fs::remove_file(&pdf).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove {}: {}", pdf.display(), e);
            }
        }

        let audio = self.root.join(format!("{}/{}", AUDIO_DIR, lecture_id));
        if let Err(e) = tokio::fs::remove_dir_all(&audio).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove {}: {}", audio.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn test_config(root: &std::path::Path) -> StorageConfig {
        StorageConfig {
            root: root.to_path_buf(),
            public_base_url: "http://localhost:8000/".to_string(),
        }
    }

    #[tokio::test]
    async fn stores_pdf_and_builds_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::init(&test_config(dir.path())).await.unwrap();
        let id = Uuid::new_v4();

        let url = storage.store_pdf(id, b"%PDF-1.4").await.unwrap();

        assert_eq!(url, format!("http://localhost:8000/files/pdfs/{}.pdf", id));
        assert!(dir.path().join(format!("pdfs/{}.pdf", id)).exists());
    }

    #[tokio::test]
    async fn page_audio_lands_in_per_lecture_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::init(&test_config(dir.path())).await.unwrap();
        let id = Uuid::new_v4();

        let url = storage.store_page_audio(id, 3, &[0xff, 0xfb]).await.unwrap();

        assert!(url.ends_with(&format!("audio/{}/page_3.mp3", id)));
        assert!(dir.path().join(format!("audio/{}/page_3.mp3", id)).exists());
    }

    #[tokio::test]
    async fn removing_artifacts_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::init(&test_config(dir.path())).await.unwrap();

        // Nothing stored for this lecture; must not panic or error
        storage.remove_lecture_artifacts(Uuid::new_v4()).await;
    }
}
