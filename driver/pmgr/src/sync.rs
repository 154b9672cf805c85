//! 完成事件
//!
//! hw mode 切换完成（无论成功失败）时置位，供 bring-up / 测试工具阻塞等待。
//! 无标准时钟时用忙等轮询，时长与 CPU 频率相关。

use core::sync::atomic::{AtomicBool, Ordering};

/// 忙等时每毫秒的轮询次数（启发式近似）
pub const LOOPS_PER_MS: u32 = 1000;

/// 一次性完成事件（reset -> set -> wait）
pub struct CompletionEvent {
    signaled: AtomicBool,
}

impl CompletionEvent {
    pub const fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
        }
    }

    /// 发起新的切换请求前清除
    #[inline]
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn set(&self) {
        self.signaled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// 最多等待约 timeout_ms 毫秒；Ok(()) 表示已置位，Err(()) 表示超时
    pub fn wait_timeout_ms(&self, timeout_ms: u32) -> Result<(), ()> {
        let limit = timeout_ms.saturating_mul(LOOPS_PER_MS);
        for _ in 0..limit {
            if self.is_set() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        if self.is_set() {
            Ok(())
        } else {
            Err(())
        }
    }
}

impl Default for CompletionEvent {
    fn default() -> Self {
        Self::new()
    }
}
