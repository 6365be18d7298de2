use crate::capture;
use crate::config::Config;
use crate::notifier::LineNotifier;
use crate::serial_source::SerialByteSource;
use crate::spectrogram::SpectrogramRenderer;
use crate::types::CaptureOutcome;
use crate::uploader::Uploader;
use crate::wav_writer::WavFileWriter;
use anyhow::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

/// シリアル接続の障害時に送る通知文
const MSG_SOURCE_FAILURE: &str = "録音に失敗しました（シリアル接続エラー）。";

/// 無音のまま終了した場合の通知文
const MSG_NO_AUDIO: &str = "音声は検出されませんでした。";

/// WAVファイルを保存できなかった場合の通知文
const MSG_WRITE_FAILURE: &str = "音を検知しましたが、録音の保存に失敗しました。";

/// スペクトログラム生成ステージの結果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpectrogramStatus {
    /// 設定で無効化されている
    Skipped,
    /// 生成に成功
    Rendered,
    /// 生成に失敗（パイプラインは継続）
    Failed,
}

/// パイプラインを1回実行する
///
/// 録音 → WAV保存 → スペクトログラム生成 → アップロード → LINE通知 →
/// 後始末、の順に直列実行する。各ステージの失敗は縮退して継続し、
/// どの経路でも最後に必ず通知を試みる。
///
/// # Errors
///
/// HTTPクライアントの構築に失敗した場合のみエラーを返す。
/// それ以外のステージ失敗はログに記録して縮退する。
pub async fn run(config: &Config) -> Result<()> {
    let notifier = LineNotifier::new(&config.line)?;
    let uploader = Uploader::new(&config.upload)?;

    // 1. シリアルポートを開いて録音
    let source = match SerialByteSource::open(&config.serial) {
        Ok(source) => source,
        Err(e) => {
            log::error!("シリアルポートを開けませんでした: {:#}", e);
            notifier.send(MSG_SOURCE_FAILURE).await;
            return Ok(());
        }
    };

    let outcome = match capture::capture(
        source,
        config.audio.sample_rate,
        Duration::from_secs(config.audio.inactivity_timeout_secs),
        Duration::from_millis(config.audio.poll_interval_ms),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("録音中にシリアル接続が切断されました: {:#}", e);
            notifier.send(MSG_SOURCE_FAILURE).await;
            return Ok(());
        }
    };

    let clip = match outcome {
        CaptureOutcome::Audio(clip) => clip,
        CaptureOutcome::Empty => {
            notifier.send(MSG_NO_AUDIO).await;
            return Ok(());
        }
    };

    // 2. WAVファイルとして保存
    let wav_path = Path::new(&config.output.wav_path);
    let writer = WavFileWriter::new(wav_path, config.audio.sample_rate);
    if let Err(e) = writer.write(&clip) {
        log::error!("WAVファイルの保存に失敗: {:#}", e);
        notifier.send(MSG_WRITE_FAILURE).await;
        return Ok(());
    }

    // 3. メルスペクトログラム生成（ベストエフォート）
    let image_path = Path::new(&config.spectrogram.image_path);
    let spectrogram = if config.spectrogram.enabled {
        let renderer = SpectrogramRenderer::new(&config.spectrogram);
        match renderer.render(wav_path, image_path) {
            Ok(()) => SpectrogramStatus::Rendered,
            Err(e) => {
                log::warn!("スペクトログラムの生成に失敗（処理は継続）: {:#}", e);
                SpectrogramStatus::Failed
            }
        }
    } else {
        SpectrogramStatus::Skipped
    };

    // 4. アップロード（失敗してもリンクなしで通知する）
    let retrieval_url = match uploader.upload(wav_path).await {
        Ok(url) => Some(url),
        Err(e) => {
            log::error!("アップロードに失敗: {:#}", e);
            None
        }
    };

    // 5. LINE通知
    let detected_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let message = detection_message(
        clip.duration_seconds(),
        &detected_at,
        retrieval_url.as_deref(),
        spectrogram,
    );
    notifier.send(&message).await;

    // 6. 後始末
    if config.output.cleanup {
        remove_file_best_effort(wav_path);
        if config.spectrogram.enabled {
            remove_file_best_effort(image_path);
        }
    }

    Ok(())
}

/// 検知通知のメッセージ本文を組み立てる
///
/// 各ステージの成否を反映する。アップロードに失敗した場合は
/// リンクの代わりにその旨を伝える。
fn detection_message(
    duration_seconds: f64,
    detected_at: &str,
    retrieval_url: Option<&str>,
    spectrogram: SpectrogramStatus,
) -> String {
    let mut message = format!(
        "音を検知しました！\n検知時刻: {}\n録音時間: 約{:.2}秒\n",
        detected_at, duration_seconds
    );

    match retrieval_url {
        Some(url) => message.push_str(&format!("録音リンク: {}\n", url)),
        None => message.push_str("録音のアップロードに失敗したため、リンクはありません。\n"),
    }

    match spectrogram {
        SpectrogramStatus::Rendered => {
            message.push_str("メルスペクトログラムを生成しました。");
        }
        SpectrogramStatus::Failed => {
            message.push_str("メルスペクトログラムの生成に失敗しました。");
        }
        SpectrogramStatus::Skipped => {}
    }

    message.trim_end().to_string()
}

/// ローカルファイルをベストエフォートで削除
///
/// ファイルが存在しない場合は何もしない。
fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::info!("ローカルファイルを削除しました: {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("ローカルファイルの削除に失敗: {:?} - {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detection_message_with_url() {
        let message = detection_message(
            1.5,
            "2025-01-02 14:30:15",
            Some("https://transfer.sh/baby.wav"),
            SpectrogramStatus::Rendered,
        );

        assert!(message.contains("音を検知しました！"));
        assert!(message.contains("検知時刻: 2025-01-02 14:30:15"));
        assert!(message.contains("約1.50秒"));
        assert!(message.contains("録音リンク: https://transfer.sh/baby.wav"));
        assert!(message.contains("メルスペクトログラムを生成しました。"));
    }

    #[test]
    fn test_detection_message_without_url() {
        // アップロード失敗時はリンクを含まず、失敗の旨を伝える
        let message = detection_message(
            0.5,
            "2025-01-02 14:30:15",
            None,
            SpectrogramStatus::Skipped,
        );

        assert!(!message.contains("録音リンク"));
        assert!(message.contains("アップロードに失敗したため、リンクはありません"));
        assert!(!message.contains("スペクトログラム"));
    }

    #[test]
    fn test_detection_message_spectrogram_failed() {
        let message = detection_message(
            2.0,
            "2025-01-02 14:30:15",
            Some("https://transfer.sh/baby.wav"),
            SpectrogramStatus::Failed,
        );

        assert!(message.contains("メルスペクトログラムの生成に失敗しました。"));
    }

    #[test]
    fn test_remove_file_best_effort_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cleanup.txt");
        fs::write(&path, b"x").unwrap();

        remove_file_best_effort(&path);
        assert!(!path.exists());

        // 2回目（存在しないファイル）でもパニックしない
        remove_file_best_effort(&path);
    }
}
