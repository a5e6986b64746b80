// ドキュメント変更イベント
//
// 単一ドキュメントの状態遷移を表す(before, after)のペア。
// `after`が存在しない場合は削除を意味する。

use super::document_snapshot::DocumentSnapshot;
use std::fmt;

/// 変更の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// 新規作成（beforeが存在しない）
    Create,
    /// 更新（before/afterとも存在）
    Update,
    /// 削除（afterが存在しない）
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// 単一ドキュメントの変更イベント
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    before: DocumentSnapshot,
    after: DocumentSnapshot,
}

impl ChangeEvent {
    /// 新しい変更イベントを作成
    pub fn new(before: DocumentSnapshot, after: DocumentSnapshot) -> Self {
        Self { before, after }
    }

    /// 変更前のスナップショット
    pub fn before(&self) -> &DocumentSnapshot {
        &self.before
    }

    /// 変更後のスナップショット
    pub fn after(&self) -> &DocumentSnapshot {
        &self.after
    }

    /// 変更の種別を判定
    ///
    /// `after`の存在のみで削除かどうかを決める（beforeも存在しない場合も削除扱い）。
    pub fn kind(&self) -> ChangeKind {
        if !self.after.exists() {
            ChangeKind::Delete
        } else if self.before.exists() {
            ChangeKind::Update
        } else {
            ChangeKind::Create
        }
    }
}
