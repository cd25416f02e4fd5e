use crate::filter::OPERATORS;
use std::fmt;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `where_op`に知らない演算子が渡された。リクエストは送られていません
    #[error(
        "Value {operator} is invalid comparison operator: Member must satisfy value set: [{}]",
        valid_operators()
    )]
    InvalidOperator { operator: String },
    /// `*_or_fail`で見つからなかった
    #[error("No query results for model [{model}]{}", key_suffix(.key))]
    ModelNotFound {
        model: &'static str,
        key: Option<String>,
    },
    /// まだ保存していないrecordを消そうとした
    #[error("Model [{model}] has not been persisted")]
    NotPersisted { model: &'static str },
    #[error(transparent)]
    Bulk(BulkError),
    #[error(transparent)]
    Client(#[from] dynamodb_utils::Error),
    #[error(transparent)]
    Serde(#[from] serde_dynamo::Error),
}

fn valid_operators() -> String {
    OPERATORS
        .iter()
        .map(|(token, _)| *token)
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_deref().map(|k| format!(" {k}")).unwrap_or_default()
}

/// まとめて削除・復元したときの一部失敗
#[derive(Debug)]
pub struct BulkError {
    /// 成功した件数
    pub succeeded: usize,
    /// 失敗したitemのkeyとエラー
    pub failures: Vec<(String, Error)>,
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} items failed",
            self.failures.len(),
            self.succeeded + self.failures.len()
        )?;
        if let Some((key, error)) = self.failures.first() {
            write!(f, " (first: {key}: {error})")?;
        }
        Ok(())
    }
}

impl std::error::Error for BulkError {}
