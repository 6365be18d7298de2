use crate::config::LineConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

/// LINEのテキストメッセージ
#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl TextMessage {
    fn new(text: &str) -> Self {
        Self {
            kind: "text",
            text: text.to_string(),
        }
    }
}

/// LINE Messaging API のプッシュリクエストボディ
#[derive(Debug, Serialize)]
struct PushMessageRequest {
    to: String,
    messages: Vec<TextMessage>,
}

/// LINE Messaging API によるプッシュ通知
///
/// 設定されたユーザーIDに対してテキストメッセージを送信する。
/// 通知の失敗はパイプラインを中断させてはならないため、`send` は
/// エラーをログに記録するだけで呼び出し側には伝播しない。
pub struct LineNotifier {
    config: LineConfig,
    client: reqwest::Client,
}

impl LineNotifier {
    pub fn new(config: &LineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("LINE通知用HTTPクライアントの作成に失敗")?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// テキストメッセージを送信（ベストエフォート）
    ///
    /// 失敗してもエラーを返さず、ログに記録するだけ。
    pub async fn send(&self, text: &str) {
        match self.push_message(text).await {
            Ok(()) => log::info!("LINEメッセージを送信しました"),
            Err(e) => log::error!("LINEメッセージの送信に失敗: {:#}", e),
        }
    }

    async fn push_message(&self, text: &str) -> Result<()> {
        let request = PushMessageRequest {
            to: self.config.user_id.clone(),
            messages: vec![TextMessage::new(text)],
        };

        let url = format!(
            "{}/v2/bot/message/push",
            self.config.api_base.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url.as_str())
            .bearer_auth(&self.config.channel_access_token)
            .json(&request)
            .send()
            .await
            .context("LINE APIへのリクエストに失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LINE APIエラー: {} - {}", status, body);
        }

        Ok(())
    }
}
