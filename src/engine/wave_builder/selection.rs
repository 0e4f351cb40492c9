// ==========================================
// 组波选单策略（纯函数）
// ==========================================
// 输入: 可组波订单（order_date 升序, order_id 升序）
// 输出: 入波订单（按入选顺序）
// ==========================================

use crate::config::WaveConfig;
use crate::domain::order::EligibleOrder;
use crate::domain::types::WaveType;
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

/// 按波次类型选单
pub fn select_orders(
    candidates: Vec<EligibleOrder>,
    wave_type: WaveType,
    max_orders: usize,
    config: &WaveConfig,
) -> Vec<EligibleOrder> {
    if max_orders == 0 {
        return Vec::new();
    }
    match wave_type {
        WaveType::WavePicking => candidates.into_iter().take(max_orders).collect(),
        WaveType::ZonePicking => select_zone_round_robin(candidates, max_orders),
        WaveType::BatchPicking => select_batches(
            candidates,
            max_orders,
            config.batch_similarity_threshold,
            config.batch_max_attached,
        ),
        WaveType::DiscretePicking => {
            let cap = max_orders.min(config.discrete_max_orders);
            candidates
                .into_iter()
                .filter(|o| {
                    o.order.priority >= config.discrete_min_priority
                        || o.line_count <= config.discrete_max_lines
                })
                .take(cap)
                .collect()
        }
    }
}

/// 主导库区: 出现次数最多者，同次数取编码较小者
pub fn dominant_zone<'a>(zones: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for zone in zones {
        *counts.entry(zone).or_default() += 1;
    }
    // BTreeMap 升序遍历 + 严格大于: 同次数保留编码较小者
    let mut best: Option<(&str, usize)> = None;
    for (zone, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((zone, count));
        }
    }
    best.map(|(zone, _)| zone.to_string())
}

/// 区域轮转: 每轮按剩余量降序（同量按库区编码升序）各取一单
///
/// 无主导库区的订单归入末位桶
fn select_zone_round_robin(candidates: Vec<EligibleOrder>, max_orders: usize) -> Vec<EligibleOrder> {
    let mut buckets: BTreeMap<Option<String>, Vec<EligibleOrder>> = BTreeMap::new();
    for order in candidates {
        buckets
            .entry(order.dominant_zone.clone())
            .or_default()
            .push(order);
    }
    let mut buckets: Vec<(Option<String>, VecDeque<EligibleOrder>)> = buckets
        .into_iter()
        .map(|(zone, orders)| (zone, orders.into()))
        .collect();

    let mut selected = Vec::with_capacity(max_orders);
    while selected.len() < max_orders {
        buckets.retain(|(_, orders)| !orders.is_empty());
        if buckets.is_empty() {
            break;
        }
        buckets.sort_by(|(za, a), (zb, b)| {
            b.len().cmp(&a.len()).then_with(|| zone_key(za).cmp(&zone_key(zb)))
        });
        for (_, orders) in buckets.iter_mut() {
            if selected.len() >= max_orders {
                break;
            }
            if let Some(order) = orders.pop_front() {
                selected.push(order);
            }
        }
    }
    selected
}

fn zone_key(zone: &Option<String>) -> (bool, &str) {
    match zone {
        Some(z) => (false, z.as_str()),
        None => (true, ""),
    }
}

/// SKU 集合的 Jaccard 相似度（输入已排序去重）
pub fn jaccard(a: &[i64], b: &[i64]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let (mut i, mut j, mut common) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                common += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - common;
    common as f64 / union as f64
}

/// 批量聚类: 以行数最多的未用订单为种子，附加最相似的若干未用订单
fn select_batches(
    candidates: Vec<EligibleOrder>,
    max_orders: usize,
    threshold: f64,
    max_attached: usize,
) -> Vec<EligibleOrder> {
    let n = candidates.len();
    let mut used = vec![false; n];
    let mut picked: Vec<usize> = Vec::with_capacity(max_orders.min(n));

    while picked.len() < max_orders {
        // 行数最多；同行数取靠前者
        let seed = (0..n)
            .filter(|&i| !used[i])
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if candidates[b].line_count >= candidates[i].line_count => Some(b),
                _ => Some(i),
            });
        let Some(seed) = seed else {
            break;
        };
        used[seed] = true;
        picked.push(seed);

        let mut scored: Vec<(usize, f64)> = (0..n)
            .filter(|&i| !used[i])
            .map(|i| (i, jaccard(&candidates[seed].sku_ids, &candidates[i].sku_ids)))
            .filter(|&(_, sim)| sim > threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        for (i, _) in scored.into_iter().take(max_attached) {
            if picked.len() >= max_orders {
                break;
            }
            used[i] = true;
            picked.push(i);
        }
    }

    let mut slots: Vec<Option<EligibleOrder>> = candidates.into_iter().map(Some).collect();
    picked.into_iter().filter_map(|i| slots[i].take()).collect()
}
