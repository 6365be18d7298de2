use crate::config::UploadConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// 公開ファイルホストへのアップロード
///
/// ローカルファイルをHTTP PUTで送信し、成功時はレスポンスボディに
/// 含まれる公開URLを返す。リトライは行わない。
pub struct Uploader {
    base_url: String,
    client: reqwest::Client,
}

impl Uploader {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("アップロード用HTTPクライアントの作成に失敗")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }

    /// ファイルをアップロードして公開URLを取得
    ///
    /// 送信先は `{base_url}/{ファイル名}`。2xx以外のステータスおよび
    /// 通信エラーは失敗として扱う。
    ///
    /// # Errors
    ///
    /// ファイルが読めない、通信に失敗した、またはサーバーが
    /// 成功ステータスを返さなかった場合にエラーを返す。
    pub async fn upload(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("ファイル名を取得できません: {:?}", path))?;

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("アップロード対象の読み込みに失敗: {:?}", path))?;

        let url = object_url(&self.base_url, file_name);
        log::info!("アップロード開始: {} ({}バイト)", url, data.len());

        let response = self
            .client
            .put(url.as_str())
            .body(data)
            .send()
            .await
            .with_context(|| format!("アップロードリクエストに失敗: {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("アップロード失敗: {} - {}", status, body);
        }

        let retrieval_url = response
            .text()
            .await
            .context("アップロードレスポンスの読み取りに失敗")?
            .trim()
            .to_string();

        log::info!("アップロード成功: {}", retrieval_url);
        Ok(retrieval_url)
    }
}

/// アップロード先URLを組み立てる
fn object_url(base_url: &str, file_name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url("https://transfer.sh", "baby.wav"),
            "https://transfer.sh/baby.wav"
        );
        // 末尾スラッシュは二重にならない
        assert_eq!(
            object_url("https://transfer.sh/", "baby.wav"),
            "https://transfer.sh/baby.wav"
        );
    }

    #[tokio::test]
    async fn test_upload_missing_file_fails() {
        let uploader = Uploader::new(&UploadConfig {
            base_url: "https://example.invalid".to_string(),
            timeout_seconds: 1,
        })
        .unwrap();

        let result = uploader.upload(Path::new("/nonexistent/missing.wav")).await;
        assert!(result.is_err());
    }
}
