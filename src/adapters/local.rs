use crate::core::ObjectStorage;
use crate::domain::model::ObjectLocator;
use crate::utils::error::{IngestError, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

/// 以 `root/<bucket>/<name>` 模擬物件儲存，方便離線測試
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, locator: &ObjectLocator) -> PathBuf {
        self.root.join(&locator.bucket).join(&locator.name)
    }
}

impl ObjectStorage for LocalStorage {
    async fn read_object(&self, locator: &ObjectLocator) -> Result<Vec<u8>> {
        let path = self.object_path(locator);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(IngestError::ObjectNotFound {
                locator: locator.to_string(),
            }),
            Err(e) => Err(IngestError::transfer(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_object(&self, locator: &ObjectLocator, data: Vec<u8>) -> Result<()> {
        let path = self.object_path(locator);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, data).await?;
        Ok(())
    }
}
