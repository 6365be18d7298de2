use crate::serial_source::ByteSource;
use crate::types::{AudioClip, CaptureOutcome};
use anyhow::Result;
use std::time::{Duration, Instant};

/// 無音タイムアウト方式の録音ループ
///
/// バイト供給源をポーリングし、新しいデータが届くたびに蓄積する。
/// 最後にデータを受信してから `inactivity_timeout` を超えて静寂が続いた
/// 時点で録音を終了する。
///
/// # 状態遷移
///
/// 1. **Listening**: `poll()` → データがあれば蓄積して `last_activity` を更新
/// 2. 経過時間が `inactivity_timeout` を超えたら **Done**
/// 3. それ以外は `poll_interval` だけスリープして 1. へ戻る
///
/// `last_activity` は1バイト以上受信したティックでのみ前進する。
/// 空のポーリングはエラーではなく、単なる無活動として扱う。
///
/// # 終了条件について
///
/// 最大録音時間の上限は意図的に設けていない。鳴りやまない音源に対しては
/// 録音が無制限に続く（既知の制限）。
///
/// # Arguments
///
/// * `source` - バイト供給源。値渡しのため、正常終了・空振り・障害の
///   どの経路でも関数を抜ける時点で必ずドロップ（クローズ）される
/// * `sample_rate` - サンプリングレート (Hz)。録音時間の計算に使用
/// * `inactivity_timeout` - この時間データが途絶えたら録音終了
/// * `poll_interval` - ポーリング間のスリープ時間
///
/// # Returns
///
/// * `Ok(CaptureOutcome::Audio(_))` - 1バイト以上受信して終了
/// * `Ok(CaptureOutcome::Empty)` - 1バイトも受信せずタイムアウト
/// * `Err(_)` - ポーリング中に接続レベルの障害が発生
pub async fn capture<S: ByteSource>(
    mut source: S,
    sample_rate: u32,
    inactivity_timeout: Duration,
    poll_interval: Duration,
) -> Result<CaptureOutcome> {
    log::info!(
        "録音を開始します (無音タイムアウト: {}秒)",
        inactivity_timeout.as_secs_f64()
    );

    let mut buffer: Vec<u8> = Vec::new();
    let mut last_activity = Instant::now();

    loop {
        // 障害時は `?` で即座に抜け、sourceはドロップされる
        let chunk = source.poll()?;

        if !chunk.is_empty() {
            if buffer.is_empty() {
                log::info!("最初のデータを受信しました");
            }
            buffer.extend_from_slice(&chunk);
            last_activity = Instant::now();
        }

        if last_activity.elapsed() > inactivity_timeout {
            log::info!(
                "無音タイムアウト ({}秒) に達したため録音を終了します",
                inactivity_timeout.as_secs_f64()
            );
            break;
        }

        tokio::time::sleep(poll_interval).await;
    }

    drop(source);

    if buffer.is_empty() {
        log::info!("タイムアウトまでに音声データを受信しませんでした");
        return Ok(CaptureOutcome::Empty);
    }

    let clip = AudioClip {
        bytes: buffer,
        sample_rate,
    };
    log::info!(
        "録音完了: {}バイト (約{:.2}秒)",
        clip.bytes.len(),
        clip.duration_seconds()
    );
    Ok(CaptureOutcome::Audio(clip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// テスト用の台本化バイト供給源
    ///
    /// ポーリングごとに台本のステップを1つ消費する。
    /// 台本が尽きた後は無活動（空Vec）を返し続ける。
    /// ドロップ時にフラグを立て、クローズされたことを観測できるようにする。
    enum Step {
        /// このティックでチャンクを返す
        Chunk(Vec<u8>),
        /// 指定時間の静寂を挟んでから無活動を返す
        Gap(Duration),
        /// 接続レベルの障害を発生させる
        Fault,
    }

    struct ScriptedSource {
        steps: VecDeque<Step>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            (
                Self {
                    steps: steps.into(),
                    closed: closed.clone(),
                },
                closed,
            )
        }
    }

    impl ByteSource for ScriptedSource {
        fn poll(&mut self) -> Result<Vec<u8>> {
            match self.steps.pop_front() {
                Some(Step::Chunk(bytes)) => Ok(bytes),
                Some(Step::Gap(duration)) => {
                    std::thread::sleep(duration);
                    Ok(Vec::new())
                }
                Some(Step::Fault) => anyhow::bail!("シリアル接続が切断されました (テスト)"),
                None => Ok(Vec::new()),
            }
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(100);
    const POLL_INTERVAL: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_accumulates_in_arrival_order() {
        // タイムアウト未満の間隔で届くチャンクは全て到着順に連結される
        let (source, _) = ScriptedSource::new(vec![
            Step::Chunk(vec![1, 2, 3]),
            Step::Gap(Duration::from_millis(20)),
            Step::Chunk(vec![4, 5]),
            Step::Gap(Duration::from_millis(20)),
            Step::Chunk(vec![6]),
        ]);

        let outcome = capture(source, 16000, TIMEOUT, POLL_INTERVAL).await.unwrap();
        match outcome {
            CaptureOutcome::Audio(clip) => assert_eq!(clip.bytes, vec![1, 2, 3, 4, 5, 6]),
            CaptureOutcome::Empty => panic!("音声データがあるはず"),
        }
    }

    #[tokio::test]
    async fn test_terminates_on_inactivity_and_reports_duration() {
        // 100バイト×3回、間隔はタイムアウト未満、その後静寂 → 300バイト
        let (source, _) = ScriptedSource::new(vec![
            Step::Chunk(vec![0u8; 100]),
            Step::Gap(Duration::from_millis(30)),
            Step::Chunk(vec![0u8; 100]),
            Step::Gap(Duration::from_millis(30)),
            Step::Chunk(vec![0u8; 100]),
        ]);

        let start = Instant::now();
        let outcome = capture(source, 16000, TIMEOUT, POLL_INTERVAL).await.unwrap();
        let elapsed = start.elapsed();

        match outcome {
            CaptureOutcome::Audio(clip) => {
                assert_eq!(clip.bytes.len(), 300);
                // 300 / (16000 * 2) = 0.009375秒
                assert!((clip.duration_seconds() - 0.009375).abs() < 1e-9);
            }
            CaptureOutcome::Empty => panic!("音声データがあるはず"),
        }

        // 最後のチャンクの後、タイムアウト分は待っているはず
        assert!(elapsed >= TIMEOUT);
    }

    #[tokio::test]
    async fn test_empty_when_no_bytes_received() {
        // 1バイトも届かなければ長さゼロの成功ではなくEmptyを返す
        let (source, closed) = ScriptedSource::new(vec![]);

        let outcome = capture(source, 16000, TIMEOUT, POLL_INTERVAL).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::Empty));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_source_fault_aborts_and_closes() {
        // データ受信後の障害でも即座に中断し、供給源はクローズされる
        let (source, closed) = ScriptedSource::new(vec![
            Step::Chunk(vec![1, 2, 3]),
            Step::Fault,
        ]);

        let result = capture(source, 16000, TIMEOUT, POLL_INTERVAL).await;
        assert!(result.is_err());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_source_closed_on_normal_completion() {
        let (source, closed) = ScriptedSource::new(vec![Step::Chunk(vec![1, 2])]);

        let outcome = capture(source, 16000, TIMEOUT, POLL_INTERVAL).await.unwrap();
        assert!(outcome.has_audio());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_polls_do_not_reset_timer() {
        // 無活動ポーリングでlast_activityが前進しないことの確認。
        // 台本が尽きた後は空ポーリングのみなので、データ受信から
        // ほぼタイムアウト時間ちょうどで終了するはず。
        let (source, _) = ScriptedSource::new(vec![Step::Chunk(vec![9u8; 10])]);

        let start = Instant::now();
        let _ = capture(source, 16000, TIMEOUT, POLL_INTERVAL).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= TIMEOUT);
        // タイムアウトの数倍も待つことはない
        assert!(elapsed < TIMEOUT * 3);
    }
}
