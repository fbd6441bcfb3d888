//! 配对：先均匀洗牌，再让第 i 位送礼给第 (i+1) mod n 位。
//!
//! 结果总是一个覆盖所有人的单环，因此没有人抽到自己。
//! 它并不是在全部错排中均匀抽样。

use super::error::{SantaError, SantaResult};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::hash::Hash;

/// 生成 (送礼人, 收礼人) 配对。
///
/// 至少需要 2 个元素，且 `key` 不能重复，否则返回 `InvalidInput`。
pub fn pair_up<T, K, F, R>(items: &[T], key: F, rng: &mut R) -> SantaResult<Vec<(T, T)>>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
    R: Rng + ?Sized,
{
    if items.len() < 2 {
        return Err(SantaError::InvalidInput(format!(
            "至少需要 2 名参与者，当前 {} 名",
            items.len()
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    if !items.iter().all(|item| seen.insert(key(item))) {
        return Err(SantaError::InvalidInput("参与者重复".to_string()));
    }

    let mut order = items.to_vec();
    order.shuffle(rng);

    let n = order.len();
    Ok((0..n)
        .map(|i| (order[i].clone(), order[(i + 1) % n].clone()))
        .collect())
}
