use thiserror::Error;

/// 比对核心的错误类型。
///
/// 区间为空、DP 剪枝、候选比对不可行都不是错误，而是正常的控制流；
/// 这里只收录需要上报给调用方的情况。
#[derive(Debug, Error)]
pub enum Error {
    /// 编码超出 3-bit 字母表
    #[error("invalid character encoding {enc} at position {position}")]
    InvalidCharacter { enc: u8, position: u64 },

    #[error("requested position {position} out of range [0,{length})")]
    PositionOutOfRange { position: u64, length: u64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// 单个 query 的工作区超出容量上限，query 必须中止
    #[error("per-query {resource} capacity exhausted (limit {limit})")]
    CapacityExceeded { resource: &'static str, limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
