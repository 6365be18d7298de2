use crate::config::SerialConfig;
use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// ポーリング可能なバイト列の供給源
///
/// キャプチャループが依存する唯一のインターフェース。
/// 1回の `poll()` で「いま読み取れるバイト列」を返す。
/// データが無いことはエラーではなく、空のVecで表現する。
///
/// テストでは台本化したチャンクを返すフェイク実装を注入できる。
pub trait ByteSource {
    /// 現在読み取り可能なバイト列を取得
    ///
    /// # Returns
    /// * `Ok(bytes)` - 読み取れたバイト列（空 = このティックは無活動）
    /// * `Err(_)` - 接続レベルの障害。キャプチャは即座に中断される
    fn poll(&mut self) -> Result<Vec<u8>>;
}

/// シリアルポートからのバイト入力
///
/// Arduino等のマイコンがストリーミングする生PCMバイト列を受信する。
/// 読み取りタイムアウトを短く設定し、キャプチャループ側の
/// 無音タイムアウト判定が停滞しないようにしている。
pub struct SerialByteSource {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialByteSource {
    /// シリアルポートを開く
    ///
    /// # Errors
    ///
    /// ポートが存在しない、または開けない場合にエラーを返す。
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .with_context(|| {
                format!(
                    "シリアルポートを開けません: {} ({}bps)",
                    config.port, config.baud_rate
                )
            })?;

        log::info!(
            "シリアルポートを開きました: {} ({}bps)",
            config.port,
            config.baud_rate
        );

        Ok(Self {
            port,
            path: config.port.clone(),
        })
    }
}

impl ByteSource for SerialByteSource {
    fn poll(&mut self) -> Result<Vec<u8>> {
        // 受信バッファに溜まっているバイト数を確認（非ブロッキング）
        let available = self
            .port
            .bytes_to_read()
            .with_context(|| format!("シリアルポートの状態取得に失敗: {}", self.path))?
            as usize;

        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // タイムアウトはデータ無しとして扱う
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(Vec::new())
            }
            Err(e) => {
                Err(e).with_context(|| format!("シリアルポートの読み取りに失敗: {}", self.path))
            }
        }
    }
}

impl Drop for SerialByteSource {
    fn drop(&mut self) {
        log::debug!("シリアルポートを閉じます: {}", self.path);
    }
}
