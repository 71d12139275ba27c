//! IdGenerator port - ID 生成の抽象化
//!
//! 各ポーリングサイクルに ULID ベースの `CycleId` を振ります。
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::CycleId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はサイクル ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（reaper loop を spawn できるように）
pub trait IdGenerator: Send + Sync {
    /// Cycle ID を生成
    fn generate_cycle_id(&self) -> CycleId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// これにより、テスト時に FixedClock を使って timestamp 部分を固定できます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_cycle_id(&self) -> CycleId {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        CycleId::from(ulid)
    }
}
