//! 策略管理器错误类型
//!
//! 同步查询返回 `PmResult`；异步 hw mode 切换的失败通过完成回调的 status 上报。
//! 与平台胶水层交互时可转换为 errno（`Result<_, i32>` 接口）或 `AxError`。

use axerrno::AxError;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    /// 引擎未初始化或设备对象缺失
    InvalidContext,
    /// 连接表或信道 / 权重缓冲已满
    CapacityExceeded,
    /// 无匹配的 hw mode id / PCL 类型 / 连接
    NotFound,
    /// 已有 hw mode 切换在进行中
    Busy,
    /// 芯片不具备所需能力（如非 DBS 芯片请求 DBS）
    Unsupported,
    /// 参数非法（空列表、越界下标等）
    InvalidArgument,
}

pub type PmResult<T = ()> = Result<T, PolicyError>;

impl PolicyError {
    /// 对应的负 errno，供 `Result<_, i32>` 风格的接口使用
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidContext => -19, // -ENODEV
            Self::CapacityExceeded => -28, // -ENOSPC
            Self::NotFound => -2,        // -ENOENT
            Self::Busy => -16,           // -EBUSY
            Self::Unsupported => -95,    // -EOPNOTSUPP
            Self::InvalidArgument => -22, // -EINVAL
        }
    }
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidContext => "policy manager context not initialized",
            Self::CapacityExceeded => "capacity exceeded",
            Self::NotFound => "not found",
            Self::Busy => "hw mode change already in progress",
            Self::Unsupported => "unsupported by hardware",
            Self::InvalidArgument => "invalid argument",
        };
        f.write_str(s)
    }
}

impl From<PolicyError> for AxError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::InvalidContext => AxError::BadState,
            PolicyError::CapacityExceeded => AxError::NoMemory,
            PolicyError::NotFound => AxError::NotFound,
            PolicyError::Busy => AxError::ResourceBusy,
            PolicyError::Unsupported => AxError::Unsupported,
            PolicyError::InvalidArgument => AxError::InvalidInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_and_axerror_mapping() {
        assert_eq!(PolicyError::Busy.errno(), -16);
        assert_eq!(PolicyError::InvalidArgument.errno(), -22);
        assert_eq!(AxError::from(PolicyError::Busy), AxError::ResourceBusy);
        assert_eq!(AxError::from(PolicyError::InvalidContext), AxError::BadState);
    }
}
