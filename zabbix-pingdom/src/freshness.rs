//! 最終値の鮮度判定

/// 鮮度判定の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// 閾値内に更新されている
    Fresh,
    /// 閾値を超えて更新がない
    Stale,
}

/// `last_value_secs` が `now_secs - threshold_minutes*60` より厳密に新しければ `Fresh`
///
/// A value recorded exactly at the cutoff is `Stale`.
pub fn evaluate(last_value_secs: i64, now_secs: i64, threshold_minutes: u32) -> Freshness {
    let cutoff = now_secs - i64::from(threshold_minutes) * 60;
    if last_value_secs > cutoff {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}
