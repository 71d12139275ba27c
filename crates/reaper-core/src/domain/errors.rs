//! Errors - エラー型と分類
//!
//! 管理サービス呼び出しの失敗はすべて `ServiceError` で表現します。
//! reaper はどの分類でもプロセスを止めず、そのサイクルを打ち切って次の
//! interval で再試行します。分類はログレベルの選択にだけ使います。

use thiserror::Error;

/// ErrorKind は外部呼び出しエラーの分類
///
/// - Transient: 一時的なエラー（quota, ネットワーク, 5xx）
/// - Permanent: 恒久的なエラー（権限不足, 存在しないリソースなど）
/// - Infrastructure: 応答が解釈できない（想定外の body など）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Operation that failed against the management service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListClusters,
    ListActiveJobs,
    DeleteCluster,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ListClusters => "list clusters",
            Self::ListActiveJobs => "list active jobs",
            Self::DeleteCluster => "delete cluster",
        };
        f.write_str(name)
    }
}

/// ServiceError は管理サービス呼び出しの失敗
#[derive(Debug, Error)]
#[error("{operation} failed (kind: {kind:?}): {message}")]
pub struct ServiceError {
    kind: ErrorKind,
    operation: Operation,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, operation, message)
    }

    pub fn permanent(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, operation, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}
