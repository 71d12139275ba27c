//! State - クラスタの運用状態
//!
//! 管理サービスが返す `status.state` 文字列を表現します。
//! 未知の文字列は `Unrecognized` として保持し、reconciler は何もしません。

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// ClusterState はクラスタの運用状態を表現
///
/// # 状態
/// - creating: プロビジョニング中
/// - updating: 構成変更中（idle tick をリセット）
/// - running: 稼働中（job の有無を確認する唯一の状態）
/// - error: 異常（即削除）
/// - deleting: 削除中（誰が削除したかは問わない）
/// - unrecognized: 上記以外（pass-through）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterState {
    Creating,
    Updating,
    Running,
    Error,
    Deleting,
    Unrecognized(String),
}

impl ClusterState {
    pub fn parse(value: &str) -> Self {
        match value {
            "CREATING" => Self::Creating,
            "UPDATING" => Self::Updating,
            "RUNNING" => Self::Running,
            "ERROR" => Self::Error,
            "DELETING" => Self::Deleting,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "CREATING",
            Self::Updating => "UPDATING",
            Self::Running => "RUNNING",
            Self::Error => "ERROR",
            Self::Deleting => "DELETING",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClusterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClusterState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::creating("CREATING", ClusterState::Creating)]
    #[case::updating("UPDATING", ClusterState::Updating)]
    #[case::running("RUNNING", ClusterState::Running)]
    #[case::error("ERROR", ClusterState::Error)]
    #[case::deleting("DELETING", ClusterState::Deleting)]
    fn known_states_are_parsed(#[case] raw: &str, #[case] expected: ClusterState) {
        assert_eq!(ClusterState::parse(raw), expected);
        assert_eq!(expected.as_str(), raw);
    }

    #[test]
    fn unknown_state_is_kept_verbatim() {
        let state = ClusterState::parse("STOPPED");
        assert_eq!(state, ClusterState::Unrecognized("STOPPED".to_string()));
        assert_eq!(state.to_string(), "STOPPED");
    }

    #[test]
    fn deserializes_from_json_string() {
        let state: ClusterState = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(state, ClusterState::Running);

        let state: ClusterState = serde_json::from_str("\"STATE_UNSPECIFIED\"").unwrap();
        assert!(matches!(state, ClusterState::Unrecognized(_)));
    }
}
