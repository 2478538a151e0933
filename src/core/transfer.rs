use crate::domain::model::ObjectLocator;
use crate::domain::ports::ObjectStorage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 發佈物件的固定前綴
pub const OUTPUT_PREFIX: &str = "output";

/// 下載到 `<dest_dir>/<basename>`，回傳本地路徑
pub async fn fetch_object<S: ObjectStorage>(
    storage: &S,
    locator: &ObjectLocator,
    dest_dir: &Path,
) -> Result<PathBuf> {
    tracing::info!("⬇️ Downloading {}", locator);
    let data = storage.read_object(locator).await?;

    let dest = dest_dir.join(locator.basename());
    tokio::fs::write(&dest, &data).await?;

    tracing::debug!("Downloaded {} bytes to {}", data.len(), dest.display());
    Ok(dest)
}

/// 上傳到 `gs://<bucket>/output/<name>`，已存在的物件直接覆寫
pub async fn publish_object<S: ObjectStorage>(
    storage: &S,
    bucket: &str,
    local_file: &Path,
    name: &str,
) -> Result<String> {
    let locator = ObjectLocator::new(bucket, format!("{}/{}", OUTPUT_PREFIX, name));
    let data = tokio::fs::read(local_file).await?;

    tracing::info!("⬆️ Uploading {} bytes to {}", data.len(), locator);
    storage.write_object(&locator, data).await?;

    Ok(locator.to_string())
}
