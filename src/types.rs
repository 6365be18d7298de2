/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// 1サンプルあたりのバイト数（16ビットモノラル）
pub const BYTES_PER_SAMPLE: usize = 2;

/// キャプチャされた音声データ
///
/// シリアルポートから到着した順に蓄積された生バイト列。
/// リトルエンディアンの16ビット符号付きPCM（モノラル）として解釈される。
///
/// # Examples
///
/// ```
/// # use cry_relay::types::AudioClip;
/// let clip = AudioClip {
///     bytes: vec![0u8; 32000], // 1秒分 @ 16kHz
///     sample_rate: 16000,
/// };
/// assert_eq!(clip.duration_seconds(), 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct AudioClip {
    /// 到着順の生バイト列
    pub bytes: Vec<u8>,

    /// サンプリングレート (Hz)
    pub sample_rate: u32,
}

impl AudioClip {
    /// 録音時間（秒）
    ///
    /// `バイト数 / (サンプリングレート × 2)` で計算する。
    pub fn duration_seconds(&self) -> f64 {
        self.bytes.len() as f64 / (self.sample_rate as f64 * BYTES_PER_SAMPLE as f64)
    }

    /// バイト列をリトルエンディアンのi16サンプル列にデコード
    ///
    /// 末尾に半端な1バイトが残る場合、16ビットコンテナでは表現できないため
    /// 切り捨てる。
    pub fn samples(&self) -> Vec<SampleI16> {
        self.bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// キャプチャの終了結果
///
/// 「何も聞こえなかった」(Empty) と「リンクが切れた」(呼び出し側のErr) を
/// 区別できるように、正常終了の2つの形をここで表現する。
#[derive(Clone, Debug)]
pub enum CaptureOutcome {
    /// 1バイト以上の音声データを受信して終了
    Audio(AudioClip),

    /// タイムアウトまで1バイトも受信しなかった（エラーではない）
    Empty,
}

impl CaptureOutcome {
    /// 音声データを受信したかどうか
    pub fn has_audio(&self) -> bool {
        matches!(self, CaptureOutcome::Audio(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_seconds() {
        let clip = AudioClip {
            bytes: vec![0u8; 32000],
            sample_rate: 16000,
        };
        assert_eq!(clip.duration_seconds(), 1.0);

        // 300バイト @ 16kHz ≈ 0.009375秒
        let clip = AudioClip {
            bytes: vec![0u8; 300],
            sample_rate: 16000,
        };
        assert!((clip.duration_seconds() - 0.009375).abs() < 1e-9);
    }

    #[test]
    fn test_samples_little_endian() {
        let clip = AudioClip {
            bytes: vec![0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80],
            sample_rate: 16000,
        };
        assert_eq!(clip.samples(), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_samples_odd_trailing_byte() {
        // 半端な末尾バイトは切り捨てられる
        let clip = AudioClip {
            bytes: vec![0x01, 0x00, 0xAB],
            sample_rate: 16000,
        };
        assert_eq!(clip.samples(), vec![1]);
    }

    #[test]
    fn test_capture_outcome_has_audio() {
        let outcome = CaptureOutcome::Audio(AudioClip {
            bytes: vec![0u8; 2],
            sample_rate: 16000,
        });
        assert!(outcome.has_audio());
        assert!(!CaptureOutcome::Empty.has_audio());
    }
}
